extern crate alloc;
use alloc::vec;
use alloc::vec::Vec;

/// Cubic Gaussian suppression kernel over channel offsets in `[-size, size]³`.
///
/// Weights are 16-bit fixed point: 65535 at the center, falling off as
/// `exp(-(dr² + dg² + db²) / (size² · affect))`. Larger `affect` widens the
/// bell. One octant is computed and mirrored into the other seven.
#[derive(Debug)]
pub(crate) struct Kernel {
    size: i32,
    side: usize,
    weights: Vec<u16>,
}

impl Kernel {
    pub fn build(size: u32, affect: f64) -> Self {
        let side = (2 * size + 1) as usize;
        let radius = size as usize;

        let mut axis = vec![0.0f64; radius + 1];
        for (i, term) in axis.iter_mut().enumerate() {
            let v = (i as f64 - size as f64) / size as f64;
            *term = -(v * v) / affect;
        }

        let mut weights = vec![0u16; side * side * side];
        let last = side - 1;
        for r in 0..=radius {
            for g in 0..=radius {
                for b in 0..=radius {
                    let w = ((axis[r] + axis[g] + axis[b]).exp() * 65535.0) as u16;
                    for &ri in &[r, last - r] {
                        for &gi in &[g, last - g] {
                            for &bi in &[b, last - b] {
                                weights[(ri * side + gi) * side + bi] = w;
                            }
                        }
                    }
                }
            }
        }

        Self {
            size: size as i32,
            side,
            weights,
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// Weight at channel offsets `(dr, dg, db)`, each in `[-size, size]`.
    #[inline]
    pub fn weight(&self, dr: i32, dg: i32, db: i32) -> u16 {
        let r = (dr + self.size) as usize;
        let g = (dg + self.size) as usize;
        let b = (db + self.size) as usize;
        self.weights[(r * self.side + g) * self.side + b]
    }
}
