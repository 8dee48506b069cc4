extern crate alloc;
use alloc::vec::Vec;

use rgb::RGB;

use crate::color::{self, COLOR_MASK};
use crate::error::QuantizeError;
use crate::histogram::Histogram;
use crate::kernel::Kernel;
use crate::order::OrderIndex;

const MAX_KERNEL_SIZE: u32 = 28;
/// Reduction leaves colors alone once only counts at or below this remain in
/// the small buckets.
const SKIP_MIN_COUNT: u32 = 3;
/// Gain of the tanh reference curve driving the shaping variable.
const CURVE_GAIN: f64 = 2.0;

const E: f64 = core::f64::consts::E;
const PI: f64 = core::f64::consts::PI;

/// Accumulates pixel statistics across one or more bitmaps and extracts a
/// representative color table.
///
/// Extraction repeatedly takes the most frequent remaining color and
/// suppresses a Gaussian-weighted neighborhood around it in RGB space, so
/// each new entry lands in a region the previous ones have not already
/// claimed. A control loop widens or narrows the suppression kernel to keep
/// the fraction of consumed pixels near a tanh-shaped reference curve.
///
/// The histogram spans the whole 24-bit color space (two ≈16M-entry tables),
/// so an extractor is a heavyweight object meant to be reused via
/// [`reset`](Self::reset) rather than rebuilt per frame.
#[derive(Debug)]
pub struct ColorExtractor {
    hist: Histogram,
}

impl Default for ColorExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorExtractor {
    pub fn new() -> Self {
        Self {
            hist: Histogram::new(),
        }
    }

    /// Drop all accumulated counts, making the extractor ready for a fresh
    /// set of bitmaps.
    pub fn reset(&mut self) {
        self.hist.reset();
    }

    /// Accumulate pixels into the histogram. The top byte of each pixel is
    /// ignored. May be called repeatedly to pool several bitmaps into one
    /// extraction.
    pub fn add_bitmap(&mut self, pixels: &[u32]) {
        self.hist.add_bitmap(pixels);
    }

    /// Total number of pixels accumulated since the last reset.
    pub fn pixel_total(&self) -> u64 {
        self.hist.pixel_total()
    }

    /// Extract up to `table_len` colors, with `force_colors` guaranteed to
    /// occupy the front of the table.
    ///
    /// Returns fewer than `table_len` colors when the histogram runs dry
    /// first. Extraction consumes the accumulated counts; call
    /// [`reset`](Self::reset) and re-add bitmaps before extracting again.
    pub fn color_table(
        &mut self,
        table_len: usize,
        force_colors: &[u32],
    ) -> Result<Vec<u32>, QuantizeError> {
        if table_len < force_colors.len() {
            return Err(QuantizeError::TableTooSmall {
                capacity: table_len,
                forced: force_colors.len(),
            });
        }

        let mut table: Vec<u32> = Vec::with_capacity(table_len);
        let mut order = OrderIndex::build(&mut self.hist);
        let max_count = order.max_count();

        let force_count = force_colors.len();
        let min_kernel_size = min_kernel_size(table_len, force_count);
        let mut pixel_total = self.hist.pixel_total() as f64;

        // Phase 1: forced colors claim their neighborhoods first, at the
        // narrowest kernel and with the tallest bump the histogram holds.
        if force_count > 0 {
            let kernel = Kernel::build(min_kernel_size, 1.0 / PI);
            for &forced in force_colors {
                let color = forced & COLOR_MASK;
                pixel_total -=
                    absorb(&mut self.hist, &mut order, &kernel, color, max_count) as f64;
                table.push(color);
            }
        }

        if table.len() == table_len {
            return Ok(table);
        }

        // Phase 2: iterative most-frequent pick. The shaping variable x0
        // starts at zero and is consulted before its first update, so the
        // first iteration always runs the minimum kernel at affect 1/e.
        let mut kernel = Kernel::build(min_kernel_size, 1.0 / E);
        let mut prev_kernel_size = min_kernel_size;
        let mut prev_affect = 1.0 / E;
        let mut x0 = 0.0f64;
        let mut consumed = 0.0f64;
        let mut picked: Vec<ColorMass> = Vec::with_capacity(table_len - force_count);

        while table.len() < table_len {
            let Some((color, count)) = order.pop_max(0) else {
                break;
            };
            let slot = self.hist.slot_mut(color);
            slot.count = 0;
            slot.node = 0;
            table.push(color);

            let kernel_size = ((x0 * f64::from(MAX_KERNEL_SIZE)).round() as u32)
                .clamp(min_kernel_size, MAX_KERNEL_SIZE);
            let affect = ((x0 * (PI - 1.0) + 1.0) / E).clamp(1.0 / E, PI / E);

            let a0 = (table.len() - 1) as f64 / table_len as f64;
            let b0 = consumed / pixel_total;
            let reference = (smooth(CURVE_GAIN * a0) * 1.08).min(1.0);
            let mut dx = smooth(CURVE_GAIN * (a0 + 1.0 / table_len as f64))
                - smooth(CURVE_GAIN * a0);
            dx += dx * smooth(8.0 * ((reference - b0) * (1.0 - a0) + (reference - x0) * a0));
            x0 = (x0 + dx).clamp(0.0, 1.0);

            if prev_kernel_size != kernel_size || (prev_affect - affect).abs() > 0.01 {
                kernel = Kernel::build(kernel_size, affect);
                prev_kernel_size = kernel_size;
                prev_affect = affect;
            }

            let absorbed = absorb(&mut self.hist, &mut order, &kernel, color, count);
            let mass = u64::from(count) + absorbed;
            consumed += mass as f64;
            picked.push(ColorMass::new(color, mass));
        }

        if table.len() < table_len {
            // Histogram ran dry; hand back the partial table as-is.
            return Ok(table);
        }

        // Phase 3: fold whatever is still live into the nearest picked entry
        // by mass-weighted mean, then rewrite the non-forced entries from
        // the folded means.
        while let Some((color, count)) = order.pop_max(SKIP_MIN_COUNT) {
            let slot = self.hist.slot_mut(color);
            slot.count = 0;
            slot.node = 0;

            let c = color::unpack(color);
            let mut fold_into = 0;
            let mut best = f64::INFINITY;
            for (i, entry) in picked.iter().enumerate() {
                let d = entry.distance_sq(c);
                if d < best {
                    best = d;
                    fold_into = i;
                }
            }
            picked[fold_into].fold(c, u64::from(count));
        }

        for (i, entry) in picked.iter().enumerate() {
            table[force_count + i] = entry.packed();
        }
        Ok(table)
    }
}

/// Narrowest kernel used for a given extraction: shrinks exponentially with
/// the number of entries left to pick, floored at 2.
fn min_kernel_size(table_len: usize, force_count: usize) -> u32 {
    let span = (table_len - force_count) as f64;
    let size = (f64::from(MAX_KERNEL_SIZE) * (-span / 64.0).exp()).round() as u32;
    size.clamp(2, MAX_KERNEL_SIZE - 1)
}

fn smooth(x: f64) -> f64 {
    x.tanh()
}

/// Subtract a Gaussian bump of the given `height` centered on `color` from
/// every live neighbor in the histogram, relinking each touched color in the
/// order index. The per-color decrement saturates at the live count. Returns
/// the total mass removed.
fn absorb(
    hist: &mut Histogram,
    order: &mut OrderIndex,
    kernel: &Kernel,
    color: u32,
    height: u32,
) -> u64 {
    let center = color::unpack(color);
    let rc = i32::from(center.r);
    let gc = i32::from(center.g);
    let bc = i32::from(center.b);
    let size = kernel.size();
    let mut removed = 0u64;

    for r in (rc - size).max(0)..=(rc + size).min(255) {
        for g in (gc - size).max(0)..=(gc + size).min(255) {
            for b in (bc - size).max(0)..=(bc + size).min(255) {
                let packed = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
                let count = hist.slot(packed).count;
                if count == 0 {
                    continue;
                }

                let weight = kernel.weight(r - rc, g - gc, b - bc);
                let decrement = ((u64::from(height) * u64::from(weight)) >> 16) as u32;
                let new_count = count.saturating_sub(decrement);
                if new_count == count {
                    continue;
                }

                removed += u64::from(count - new_count);
                let node = hist.slot(packed).node;
                let slot = hist.slot_mut(packed);
                slot.count = new_count;
                if new_count == 0 {
                    slot.node = 0;
                }
                order.remove(node, count);
                if new_count != 0 {
                    order.reinsert(node, new_count);
                }
            }
        }
    }
    removed
}

/// Running mass-weighted mean of the colors folded into one picked entry.
#[derive(Debug, Clone, Copy)]
struct ColorMass {
    r: f64,
    g: f64,
    b: f64,
    mass: f64,
}

impl ColorMass {
    fn new(color: u32, mass: u64) -> Self {
        let c = color::unpack(color);
        Self {
            r: f64::from(c.r),
            g: f64::from(c.g),
            b: f64::from(c.b),
            mass: mass as f64,
        }
    }

    fn distance_sq(&self, c: RGB<u8>) -> f64 {
        let dr = f64::from(c.r) - self.r;
        let dg = f64::from(c.g) - self.g;
        let db = f64::from(c.b) - self.b;
        dr * dr + dg * dg + db * db
    }

    fn fold(&mut self, c: RGB<u8>, mass: u64) {
        let mass = mass as f64;
        let total = self.mass + mass;
        self.r = (self.r * self.mass + f64::from(c.r) * mass) / total;
        self.g = (self.g * self.mass + f64::from(c.g) * mass) / total;
        self.b = (self.b * self.mass + f64::from(c.b) * mass) / total;
        self.mass = total;
    }

    fn packed(&self) -> u32 {
        color::pack(RGB {
            r: self.r.round() as u8,
            g: self.g.round() as u8,
            b: self.b.round() as u8,
        })
    }
}
