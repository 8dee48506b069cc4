extern crate alloc;
use alloc::vec::Vec;

use crate::cache::{DoubleCache, NearestMemo, SingleCache};
use crate::color::{self, COLOR_MASK};
use crate::cube_index::CubeIndex;
use crate::dither;
use crate::error::QuantizeError;

/// Largest table a one-byte index space can address.
pub(crate) const MAX_TABLE_LEN: usize = 256;
/// Below this length a plain scan beats the cube index, so optimization is
/// not engaged.
const MIN_OPTIMIZE_LEN: usize = 8;

/// How an uncached nearest-entry lookup is answered.
pub(crate) trait CandidateSource {
    fn nearest(&self, table: &[u32], color: u32) -> u8;
}

/// Linear scan over the whole table.
pub(crate) struct FullScan;

impl CandidateSource for FullScan {
    fn nearest(&self, table: &[u32], color: u32) -> u8 {
        let c = color::unpack(color);
        let mut best = 0usize;
        let mut best_d = i32::MAX;
        for (i, &entry) in table.iter().enumerate() {
            let d = color::distance_sq(c, color::unpack(entry));
            if d < best_d {
                best = i;
                best_d = d;
                if d == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}

impl CandidateSource for CubeIndex {
    fn nearest(&self, table: &[u32], color: u32) -> u8 {
        let list = self.candidates(color);
        if list.len() == 1 {
            return list[0];
        }

        let c = color::unpack(color);
        let mut best = 0u8;
        let mut best_d = i32::MAX;
        for &index in list {
            let d = color::distance_sq(c, color::unpack(table[usize::from(index)]));
            if d == 0 {
                return index;
            }
            if d < best_d {
                best_d = d;
                best = index;
            }
        }
        best
    }
}

/// Memoized nearest-entry resolution: cache hit, or source lookup + store.
#[inline]
pub(crate) fn palette_index<M: NearestMemo, S: CandidateSource>(
    table: &[u32],
    memo: &mut M,
    source: &S,
    color: u32,
) -> u8 {
    if let Some(index) = memo.get(color) {
        return index;
    }
    let index = source.nearest(table, color);
    memo.put(color, index);
    index
}

fn map_pixels<M: NearestMemo, S: CandidateSource>(
    table: &[u32],
    memo: &mut M,
    source: &S,
    pixels: &[u32],
    indexes: &mut [u8],
) {
    for (&pixel, index) in pixels.iter().zip(indexes.iter_mut()) {
        *index = palette_index(table, memo, source, pixel & COLOR_MASK);
    }
}

/// One of the four cache/lookup layouts, fixed at construction so the
/// per-pixel loops run against concrete types.
#[derive(Debug)]
enum Lookup {
    SingleScan(SingleCache),
    SingleCube(SingleCache, CubeIndex),
    DoubleScan(DoubleCache),
    DoubleCube(DoubleCache, CubeIndex),
}

/// A fixed color table with memoized nearest-entry lookup and optional
/// error-diffusion remapping.
///
/// The internal layout is chosen from the table length and the `optimize`
/// flag: tables of 256 entries need a presence bitmap beside the index
/// cache (index 255 would collide with the single cache's empty marker),
/// and tables of at least 8 entries can trade construction time for the
/// per-cube candidate index. Tiny tables always use the plain scan.
///
/// The caches memoize across calls, so reusing one `Palette` over many
/// frames keeps getting cheaper. The table is fixed for the palette's
/// lifetime.
#[derive(Debug)]
pub struct Palette {
    table: Vec<u32>,
    lookup: Lookup,
}

impl Palette {
    /// Build a palette over `table`, masking every entry down to 24 bits.
    /// Tables longer than 256 entries cannot be addressed by one-byte
    /// indices and are rejected. An empty table is accepted and maps every
    /// pixel to index 0.
    pub fn new(table: &[u32], optimize: bool) -> Result<Self, QuantizeError> {
        if table.len() > MAX_TABLE_LEN {
            return Err(QuantizeError::PaletteTooLarge(table.len()));
        }
        let table: Vec<u32> = table.iter().map(|&c| c & COLOR_MASK).collect();

        let lookup = if table.len() < MIN_OPTIMIZE_LEN {
            Lookup::SingleScan(SingleCache::new())
        } else if optimize {
            let cubes = CubeIndex::build(&table);
            if table.len() < MAX_TABLE_LEN {
                Lookup::SingleCube(SingleCache::new(), cubes)
            } else {
                Lookup::DoubleCube(DoubleCache::new(), cubes)
            }
        } else if table.len() < MAX_TABLE_LEN {
            Lookup::SingleScan(SingleCache::new())
        } else {
            Lookup::DoubleScan(DoubleCache::new())
        };

        Ok(Self { table, lookup })
    }

    pub fn color_table(&self) -> &[u32] {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Nearest palette index for a single pixel (top byte ignored).
    pub fn nearest(&mut self, pixel: u32) -> u8 {
        let color = pixel & COLOR_MASK;
        let table = &self.table;
        match &mut self.lookup {
            Lookup::SingleScan(memo) => palette_index(table, memo, &FullScan, color),
            Lookup::SingleCube(memo, cubes) => palette_index(table, memo, cubes, color),
            Lookup::DoubleScan(memo) => palette_index(table, memo, &FullScan, color),
            Lookup::DoubleCube(memo, cubes) => palette_index(table, memo, cubes, color),
        }
    }

    /// Map every pixel to its nearest palette index.
    pub fn map(&mut self, pixels: &[u32], indexes: &mut [u8]) -> Result<(), QuantizeError> {
        if indexes.len() < pixels.len() {
            return Err(QuantizeError::BufferTooSmall {
                pixels: pixels.len(),
                indexes: indexes.len(),
            });
        }
        let table = &self.table;
        match &mut self.lookup {
            Lookup::SingleScan(memo) => map_pixels(table, memo, &FullScan, pixels, indexes),
            Lookup::SingleCube(memo, cubes) => map_pixels(table, memo, cubes, pixels, indexes),
            Lookup::DoubleScan(memo) => map_pixels(table, memo, &FullScan, pixels, indexes),
            Lookup::DoubleCube(memo, cubes) => map_pixels(table, memo, cubes, pixels, indexes),
        }
        Ok(())
    }

    /// Map a `width × height` image with Floyd–Steinberg error diffusion,
    /// in place: `pixels` is overwritten with the quantized colors while
    /// `indexes` receives the palette indices.
    pub fn dither(
        &mut self,
        pixels: &mut [u32],
        indexes: &mut [u8],
        width: usize,
        height: usize,
    ) -> Result<(), QuantizeError> {
        let area = width * height;
        if pixels.len() < area {
            return Err(QuantizeError::DimensionMismatch {
                len: pixels.len(),
                width,
                height,
            });
        }
        if indexes.len() < area {
            return Err(QuantizeError::BufferTooSmall {
                pixels: area,
                indexes: indexes.len(),
            });
        }
        if self.table.is_empty() {
            // Nothing to quantize against; every index is 0 and the pixels
            // stay untouched.
            for index in &mut indexes[..area] {
                *index = 0;
            }
            return Ok(());
        }

        let table = &self.table;
        match &mut self.lookup {
            Lookup::SingleScan(memo) => {
                dither::dither(table, memo, &FullScan, pixels, indexes, width, height)
            }
            Lookup::SingleCube(memo, cubes) => {
                dither::dither(table, memo, cubes, pixels, indexes, width, height)
            }
            Lookup::DoubleScan(memo) => {
                dither::dither(table, memo, &FullScan, pixels, indexes, width, height)
            }
            Lookup::DoubleCube(memo, cubes) => {
                dither::dither(table, memo, cubes, pixels, indexes, width, height)
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn layout_name(&self) -> &'static str {
        match self.lookup {
            Lookup::SingleScan(_) => "single-scan",
            Lookup::SingleCube(..) => "single-cube",
            Lookup::DoubleScan(_) => "double-scan",
            Lookup::DoubleCube(..) => "double-cube",
        }
    }
}
