//! Cross-cutting properties checked through the public surface: memoized
//! lookups agree with plain scans, mapping is deterministic, and remap error
//! is bounded by the palette's granularity.

use shockquant::{DitherMode, Palette, QuantizeConfig};

/// Deterministic pseudo-random colors via Knuth's multiplicative hash.
fn noise_colors(n: usize, salt: u32) -> Vec<u32> {
    (0..n as u32)
        .map(|i| i.wrapping_add(salt).wrapping_mul(2654435761) & 0xffffff)
        .collect()
}

fn squared_distance(a: u32, b: u32) -> i32 {
    let dr = ((a >> 16) & 0xff) as i32 - ((b >> 16) & 0xff) as i32;
    let dg = ((a >> 8) & 0xff) as i32 - ((b >> 8) & 0xff) as i32;
    let db = (a & 0xff) as i32 - (b & 0xff) as i32;
    dr * dr + dg * dg + db * db
}

fn reference_nearest(table: &[u32], pixel: u32) -> u8 {
    let mut best = 0usize;
    let mut best_d = i32::MAX;
    for (i, &entry) in table.iter().enumerate() {
        let d = squared_distance(pixel & 0xffffff, entry);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best as u8
}

#[test]
fn optimized_lookup_matches_reference_scan() {
    for &len in &[8usize, 33, 100, 256] {
        let table = noise_colors(len, 7);
        let mut palette = Palette::new(&table, true).unwrap();
        let pixels = noise_colors(4096, 99);

        let mut indexes = vec![0u8; pixels.len()];
        palette.map(&pixels, &mut indexes).unwrap();

        for (&pixel, &index) in pixels.iter().zip(indexes.iter()) {
            let reference = reference_nearest(&table, pixel);
            if index != reference {
                // Ties may resolve differently; distances must then agree
                let got = squared_distance(pixel, table[index as usize]);
                let want = squared_distance(pixel, table[reference as usize]);
                assert_eq!(got, want, "palette {len}, pixel {pixel:06x}");
            }
        }
    }
}

#[test]
fn cached_results_match_first_resolution() {
    let table = noise_colors(64, 3);
    let mut palette = Palette::new(&table, true).unwrap();

    // Query the same colors twice; the second pass is served from the cache
    let pixels = noise_colors(512, 17);
    let mut first = vec![0u8; pixels.len()];
    let mut second = vec![0u8; pixels.len()];
    palette.map(&pixels, &mut first).unwrap();
    palette.map(&pixels, &mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn map_is_a_pure_function_of_palette_and_pixels() {
    let table = noise_colors(48, 21);
    let pixels = noise_colors(1024, 5);

    let mut a = vec![0u8; pixels.len()];
    let mut b = vec![0u8; pixels.len()];
    Palette::new(&table, true)
        .unwrap()
        .map(&pixels, &mut a)
        .unwrap();
    Palette::new(&table, true)
        .unwrap()
        .map(&pixels, &mut b)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn remap_error_bounded_by_666_cube_diagonal() {
    // Palette holding all 6-6-6 levels: any pixel is at most half a level
    // step (25 per channel) from some entry.
    let levels = [0u32, 51, 102, 153, 204, 255];
    let mut table = Vec::with_capacity(216);
    for &r in &levels {
        for &g in &levels {
            for &b in &levels {
                table.push((r << 16) | (g << 8) | b);
            }
        }
    }
    let mut palette = Palette::new(&table, true).unwrap();

    let pixels = noise_colors(4096, 41);
    let mut indexes = vec![0u8; pixels.len()];
    palette.map(&pixels, &mut indexes).unwrap();

    for (&pixel, &index) in pixels.iter().zip(indexes.iter()) {
        let d = squared_distance(pixel, table[index as usize]);
        assert!(
            d <= 3 * 25 * 25,
            "pixel {pixel:06x} landed {d} away from entry {index}"
        );
    }
}

#[test]
fn dithered_pixels_reconstruct_from_indices() {
    let width = 24;
    let height = 16;
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 255 / width) + (y * 255 / height)) as u32 / 2;
            pixels.push((v << 16) | (v << 8) | v);
        }
    }

    let config = QuantizeConfig::new()
        .max_colors(8)
        .dither(DitherMode::FloydSteinberg);
    let result = shockquant::quantize(&pixels, width, height, &config).unwrap();

    let table = result.color_table();
    let quantized = result.quantized_pixels().unwrap();
    for (&pixel, &index) in quantized.iter().zip(result.indices().iter()) {
        assert_eq!(pixel, table[index as usize]);
    }
}

#[test]
fn exact_palette_pixels_pass_through_dither_unchanged() {
    // Pixels that already sit on palette entries quantize with zero error,
    // so nothing is ever diffused and the image survives byte for byte.
    let table = [0x000000u32, 0x3366cc, 0x99cc33, 0xffffff];
    let width = 12;
    let height = 9;
    let pixels: Vec<u32> = (0..width * height)
        .map(|i| table[(i * 7) % table.len()])
        .collect();

    let mut palette = Palette::new(&table, false).unwrap();
    let mut buffer = pixels.clone();
    let mut indexes = vec![0u8; pixels.len()];
    palette
        .dither(&mut buffer, &mut indexes, width, height)
        .unwrap();

    assert_eq!(buffer, pixels);
    for (&pixel, &index) in pixels.iter().zip(indexes.iter()) {
        assert_eq!(table[index as usize], pixel);
    }
}

#[test]
fn extraction_is_deterministic() {
    let pixels = noise_colors(2048, 13);
    let config = QuantizeConfig::new().max_colors(32);

    let a = shockquant::quantize(&pixels, 64, 32, &config).unwrap();
    let b = shockquant::quantize(&pixels, 64, 32, &config).unwrap();
    assert_eq!(a.color_table(), b.color_table());
    assert_eq!(a.indices(), b.indices());
}
