use crate::cache::NearestMemo;
use crate::color::COLOR_MASK;
use crate::palette::{palette_index, CandidateSource};

/// Floyd–Steinberg diffusion weights in sixteenths; the zero row entries sit
/// at and left of the current pixel.
const DIFFUSION: [[u16; 3]; 2] = [[0, 0, 7], [3, 5, 1]];
/// Fraction of the quantization error that is diffused at all.
const ATTENUATION: f64 = 0.75;

/// Channel masks keep each channel in its packed bit position through the
/// 16.16 fixed-point arithmetic.
const R_MASK: i64 = 0xff_0000;
const G_MASK: i64 = 0x00_ff00;
const B_MASK: i64 = 0x00_00ff;

#[inline]
fn remap_one<M: NearestMemo, S: CandidateSource>(
    table: &[u32],
    memo: &mut M,
    source: &S,
    pixels: &mut [u32],
    indexes: &mut [u8],
    i: usize,
) {
    let index = palette_index(table, memo, source, pixels[i] & COLOR_MASK);
    indexes[i] = index;
    pixels[i] = table[usize::from(index)];
}

/// Floyd–Steinberg error diffusion over a row-major `width × height` image,
/// in place on both buffers.
///
/// Errors spread right and down only, so the first and last columns and the
/// bottom row are mapped plainly to keep every diffusion target in bounds.
/// Images too small to hold the diffusion window are mapped plainly
/// throughout.
pub(crate) fn dither<M: NearestMemo, S: CandidateSource>(
    table: &[u32],
    memo: &mut M,
    source: &S,
    pixels: &mut [u32],
    indexes: &mut [u8],
    width: usize,
    height: usize,
) {
    let rows = DIFFUSION.len();
    let cols = DIFFUSION[0].len();

    if width <= cols || height <= rows {
        for i in 0..width * height {
            remap_one(table, memo, source, pixels, indexes, i);
        }
        return;
    }

    // Flattened neighbor offsets and 16.16 fixed-point weights, attenuated
    // and normalized in one step.
    let mut offsets = [0usize; 4];
    let mut weights = [0i64; 4];
    let mut taps = 0usize;
    let total: u16 = DIFFUSION.iter().flatten().sum();
    for (dy, row) in DIFFUSION.iter().enumerate() {
        for (dx, &w) in row.iter().enumerate() {
            if w == 0 {
                continue;
            }
            offsets[taps] = dy * width + dx - cols / 2;
            weights[taps] =
                (f64::from(w) * 65535.0 * ATTENUATION / f64::from(total)) as i64;
            taps += 1;
        }
    }

    for y in 0..height - rows + 1 {
        let row = y * width;
        for x in 0..cols / 2 {
            remap_one(table, memo, source, pixels, indexes, row + x);
        }

        for x in cols / 2..width - cols / 2 {
            let i = row + x;
            let old = pixels[i] & COLOR_MASK;
            let index = palette_index(table, memo, source, old);
            let new = table[usize::from(index)];
            pixels[i] = new;
            indexes[i] = index;

            let err_r = (old as i64 & R_MASK) - (new as i64 & R_MASK);
            let err_g = (old as i64 & G_MASK) - (new as i64 & G_MASK);
            let err_b = (old as i64 & B_MASK) - (new as i64 & B_MASK);

            for (&offset, &weight) in offsets[..taps].iter().zip(&weights[..taps]) {
                let j = i + offset;
                let dst = pixels[j] as i64;
                let r = ((dst & R_MASK) + ((err_r * weight) >> 16)).clamp(0, 0xff_ffff) & R_MASK;
                let g = ((dst & G_MASK) + ((err_g * weight) >> 16)).clamp(0, 0x00_ffff) & G_MASK;
                let b = ((dst & B_MASK) + ((err_b * weight) >> 16)).clamp(0, B_MASK);
                pixels[j] = (r | g | b) as u32;
            }
        }

        for x in width - cols / 2..width {
            remap_one(table, memo, source, pixels, indexes, row + x);
        }
    }

    for i in (height - rows + 1) * width..height * width {
        remap_one(table, memo, source, pixels, indexes, i);
    }
}
