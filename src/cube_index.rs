extern crate alloc;
use alloc::vec;
use alloc::vec::Vec;

use rgb::RGB;

use crate::color::{self, ColorBox};

/// Cubes per axis; RGB space splits into `N³` sub-cubes of side `256 / N`.
const N: usize = 16;
const CUBE_SIZE: usize = 256 / N;
pub(crate) const CUBE_COUNT: usize = N * N * N;

/// Header record naming one cube's candidate list inside the packed buffer.
#[derive(Debug, Clone, Copy, Default)]
struct CubeList {
    count: u32,
    offset: u32,
}

/// Per-cube pruned candidate lists over a fixed palette.
///
/// For every axis-aligned 16³ sub-cube, the list holds every palette index
/// that can be the nearest entry for some point inside the cube, so a query
/// only ever scans its own cube's list. Admission works on Voronoi planes:
/// a candidate enters the list unless the perpendicular bisector against its
/// nearest already-admitted entry leaves the whole cube on the admitted
/// entry's side.
#[derive(Debug)]
pub(crate) struct CubeIndex {
    heads: Vec<CubeList>,
    entries: Vec<u8>,
}

#[inline]
fn cube_of(c: RGB<u8>) -> usize {
    (usize::from(c.r) >> 4) << 8 | (usize::from(c.g) >> 4) << 4 | (usize::from(c.b) >> 4)
}

impl CubeIndex {
    pub fn build(table: &[u32]) -> Self {
        let len = table.len();
        let colors: Vec<RGB<u8>> = table.iter().map(|&c| color::unpack(c)).collect();

        // Pairwise squared distances, and each row again sorted by distance
        // so the admission sweep can stop early.
        let mut dist = vec![0i32; len * len];
        for i in 0..len {
            for j in 0..i {
                let d = color::distance_sq(colors[i], colors[j]);
                dist[i * len + j] = d;
                dist[j * len + i] = d;
            }
        }
        let mut by_distance: Vec<(i32, u8)> = vec![(0, 0); len * len];
        for i in 0..len {
            let row = &mut by_distance[i * len..(i + 1) * len];
            for (j, slot) in row.iter_mut().enumerate() {
                *slot = (dist[i * len + j], j as u8);
            }
            row.sort_unstable_by_key(|&(d, _)| d);
        }

        // Palette entries bucketed by the cube their own color falls in
        let mut members: Vec<Vec<u8>> = vec![Vec::new(); CUBE_COUNT];
        for (i, &c) in colors.iter().enumerate() {
            members[cube_of(c)].push(i as u8);
        }

        let mut heads = vec![CubeList::default(); CUBE_COUNT];
        let mut entries: Vec<u8> = Vec::with_capacity(CUBE_COUNT * 4);

        let mut cube = 0usize;
        for r in 0..N {
            for g in 0..N {
                for b in 0..N {
                    let rect = ColorBox {
                        rs: (r * CUBE_SIZE) as i32,
                        re: (r * CUBE_SIZE + CUBE_SIZE) as i32,
                        gs: (g * CUBE_SIZE) as i32,
                        ge: (g * CUBE_SIZE + CUBE_SIZE) as i32,
                        bs: (b * CUBE_SIZE) as i32,
                        be: (b * CUBE_SIZE + CUBE_SIZE) as i32,
                    };

                    // Seed: among resident entries the one whose worst corner
                    // is farthest; with no residents, the entry approaching
                    // the cube closest. The radius covers the worst case
                    // where an admitted entry dominates only part of the
                    // cube, hence the factor of four.
                    let (seed, search_range) = if members[cube].is_empty() {
                        let mut seed = 0u8;
                        let mut nearest = i32::MAX;
                        for (i, &c) in colors.iter().enumerate() {
                            let d = color::dist_to_rect(c, rect);
                            if d < nearest {
                                nearest = d;
                                seed = i as u8;
                            }
                        }
                        (seed, color::farthest_corner_sq(colors[seed as usize], rect) << 2)
                    } else {
                        let mut seed = 0u8;
                        let mut worst = 0i32;
                        for &i in &members[cube] {
                            let d = color::farthest_corner_sq(colors[i as usize], rect);
                            if d > worst {
                                worst = d;
                                seed = i;
                            }
                        }
                        (seed, worst << 2)
                    };

                    let start = entries.len();
                    entries.push(seed);

                    let seed_row = &by_distance[usize::from(seed) * len..(usize::from(seed) + 1) * len];
                    for &(d, candidate) in &seed_row[1..] {
                        if d >= search_range {
                            break;
                        }
                        // Nearest already-admitted entry to the candidate
                        let cand_row = &dist[usize::from(candidate) * len..];
                        let mut nearest = seed;
                        let mut nearest_d = cand_row[usize::from(seed)];
                        for &admitted in &entries[start + 1..] {
                            let d = cand_row[usize::from(admitted)];
                            if d < nearest_d {
                                nearest_d = d;
                                nearest = admitted;
                            }
                        }
                        if color::bisector_reaches_rect(
                            colors[usize::from(nearest)],
                            colors[usize::from(candidate)],
                            rect,
                        ) {
                            entries.push(candidate);
                        }
                    }

                    heads[cube] = CubeList {
                        count: (entries.len() - start) as u32,
                        offset: start as u32,
                    };
                    cube += 1;
                }
            }
        }

        Self { heads, entries }
    }

    /// Candidate palette indices for the cube containing `color`
    /// (24-bit, top byte clear). Never empty.
    #[inline]
    pub fn candidates(&self, color: u32) -> &[u8] {
        let head = self.heads[cube_of(color::unpack(color))];
        &self.entries[head.offset as usize..(head.offset + head.count) as usize]
    }
}
