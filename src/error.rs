use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuantizeError {
    #[error("color table capacity {capacity} cannot hold {forced} forced colors")]
    TableTooSmall { capacity: usize, forced: usize },

    #[error("palette length {0} exceeds the 256-entry limit of one-byte indices")]
    PaletteTooLarge(usize),

    #[error("index buffer length {indexes} is smaller than pixel count {pixels}")]
    BufferTooSmall { pixels: usize, indexes: usize },

    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not cover dimensions {width}x{height}")]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    #[error("max_colors must be between 1 and 256, got {0}")]
    InvalidMaxColors(u32),
}
