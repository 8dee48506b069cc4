#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod cache;
mod color;
mod cube_index;
mod dither;
pub mod error;
pub mod extract;
mod histogram;
mod kernel;
mod order;
pub mod palette;

pub use error::QuantizeError;
pub use extract::ColorExtractor;
pub use palette::Palette;

use alloc::vec;
use alloc::vec::Vec;

/// Dithering mode for the remap stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherMode {
    /// Nearest color only.
    None,
    /// Floyd–Steinberg error diffusion at 3/4 strength.
    FloydSteinberg,
}

impl Default for DitherMode {
    fn default() -> Self {
        Self::None
    }
}

/// Configuration for one-call quantization.
#[derive(Debug, Clone)]
pub struct QuantizeConfig {
    /// Number of palette entries to extract (1..=256).
    pub max_colors: u32,
    /// Colors guaranteed to occupy the front of the palette, in order.
    pub force_colors: Vec<u32>,
    /// Build the per-cube candidate index for faster remapping. Only
    /// engaged for palettes of at least 8 entries.
    pub optimize: bool,
    /// Dithering mode for the remap stage.
    pub dither: DitherMode,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            max_colors: 256,
            force_colors: Vec::new(),
            optimize: true,
            dither: DitherMode::None,
        }
    }
}

impl QuantizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_colors(mut self, n: u32) -> Self {
        self.max_colors = n;
        self
    }

    pub fn force_colors(mut self, colors: Vec<u32>) -> Self {
        self.force_colors = colors;
        self
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn dither(mut self, mode: DitherMode) -> Self {
        self.dither = mode;
        self
    }
}

/// Quantization result: the extracted color table and the per-pixel indices
/// into it.
#[derive(Debug)]
pub struct QuantizeResult {
    table: Vec<u32>,
    indices: Vec<u8>,
    pixels: Option<Vec<u32>>,
}

impl QuantizeResult {
    /// The extracted color table, forced colors first. May hold fewer than
    /// the requested `max_colors` when the image had too few colors.
    pub fn color_table(&self) -> &[u32] {
        &self.table
    }

    /// The palette index of each pixel, row-major.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Number of colors in the table.
    pub fn palette_len(&self) -> usize {
        self.table.len()
    }

    /// The quantized pixel buffer, present in dither mode.
    pub fn quantized_pixels(&self) -> Option<&[u32]> {
        self.pixels.as_deref()
    }
}

/// Extract a palette from the image and remap it in one call.
///
/// Pixels are packed `0x00RRGGBB`; the top byte is ignored on input.
pub fn quantize(
    pixels: &[u32],
    width: usize,
    height: usize,
    config: &QuantizeConfig,
) -> Result<QuantizeResult, QuantizeError> {
    if width == 0 || height == 0 {
        return Err(QuantizeError::ZeroDimension);
    }
    if pixels.len() != width * height {
        return Err(QuantizeError::DimensionMismatch {
            len: pixels.len(),
            width,
            height,
        });
    }
    if config.max_colors < 1 || config.max_colors > 256 {
        return Err(QuantizeError::InvalidMaxColors(config.max_colors));
    }

    let mut extractor = ColorExtractor::new();
    extractor.add_bitmap(pixels);
    let table = extractor.color_table(config.max_colors as usize, &config.force_colors)?;

    let mut palette = Palette::new(&table, config.optimize)?;
    let mut indices = vec![0u8; pixels.len()];
    let quantized = match config.dither {
        DitherMode::None => {
            palette.map(pixels, &mut indices)?;
            None
        }
        DitherMode::FloydSteinberg => {
            let mut buffer = pixels.to_vec();
            palette.dither(&mut buffer, &mut indices, width, height)?;
            Some(buffer)
        }
    };

    Ok(QuantizeResult {
        table,
        indices,
        pixels: quantized,
    })
}
