// Canvas -> classifier input.
// Each block_size×block_size block of the canvas becomes one grid cell:
// mean RGB -> luminance -> normalized to [-1, 1].

use crate::error::Error;
use crate::types::{FeatureVector, PixelBuffer};

/// BT.709 luminosity weights (R, G, B).
const LUMA_R: f64 = 0.2126;
const LUMA_G: f64 = 0.7152;
const LUMA_B: f64 = 0.0722;

/// Fixed geometry of one preprocessing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub canvas_size: usize,
    pub block_size: usize,
    pub grid_size: usize,
}

impl Geometry {
    #[cfg(test)]
    pub const MNIST: Geometry = Geometry { canvas_size: 280, block_size: 10, grid_size: 28 };

    /// Rejects geometries whose blocks don't tile the canvas exactly.
    pub fn validate(&self) -> Result<(), Error> {
        if self.block_size == 0 || self.grid_size == 0 {
            return Err(Error::InvalidInput(format!(
                "block size ({}) and grid size ({}) must be nonzero",
                self.block_size, self.grid_size
            )));
        }
        let covered = self.grid_size.checked_mul(self.block_size);
        if covered != Some(self.canvas_size) {
            return Err(Error::InvalidInput(format!(
                "grid {} x block {} does not cover canvas {}",
                self.grid_size, self.block_size, self.canvas_size
            )));
        }
        Ok(())
    }
}

/// Downsample `buffer` into a `grid_size²` feature vector.
///
/// Fails fast with [`Error::InvalidInput`] when the buffer is not
/// `canvas_size`×`canvas_size` or the blocks don't tile the canvas.
pub fn preprocess(
    buffer: &PixelBuffer,
    canvas_size: usize,
    block_size: usize,
    grid_size: usize,
) -> Result<FeatureVector, Error> {
    let geometry = Geometry { canvas_size, block_size, grid_size };
    geometry.validate()?;

    if buffer.width != canvas_size || buffer.height != canvas_size {
        return Err(Error::InvalidInput(format!(
            "expected {canvas_size}x{canvas_size} buffer, got {}x{}",
            buffer.width, buffer.height
        )));
    }
    // Overflow here can't match any real buffer length
    let expected = canvas_size.checked_mul(canvas_size).and_then(|n| n.checked_mul(4));
    if expected != Some(buffer.data.len()) {
        return Err(Error::InvalidInput(format!(
            "expected {canvas_size}x{canvas_size} RGBA bytes, got {}",
            buffer.data.len()
        )));
    }

    let count = (block_size * block_size) as f64;
    let mut values = Vec::with_capacity(grid_size * grid_size);

    for gy in 0..grid_size {
        for gx in 0..grid_size {
            // Sum the block channel by channel (alpha is accumulated but unused)
            let (mut r, mut g, mut b, mut _a) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
            for dy in 0..block_size {
                let row = (gy * block_size + dy) * canvas_size;
                for dx in 0..block_size {
                    let i = (row + gx * block_size + dx) * 4;
                    r += buffer.data[i] as f64;
                    g += buffer.data[i + 1] as f64;
                    b += buffer.data[i + 2] as f64;
                    _a += buffer.data[i + 3] as f64;
                }
            }

            let gray = LUMA_R * (r / count) + LUMA_G * (g / count) + LUMA_B * (b / count);
            let normalized = (gray / 255.0) * 2.0 - 1.0;
            values.push(normalized.clamp(-1.0, 1.0) as f32);
        }
    }

    Ok(FeatureVector::from_values(grid_size, values))
}

/// [`preprocess`] with a [`Geometry`] bundle.
pub fn preprocess_with(buffer: &PixelBuffer, geometry: Geometry) -> Result<FeatureVector, Error> {
    preprocess(buffer, geometry.canvas_size, geometry.block_size, geometry.grid_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn uniform(v: u8) -> PixelBuffer {
        PixelBuffer::filled(280, 280, [v, v, v, 255])
    }

    #[test]
    fn output_has_one_value_per_cell_in_range() {
        // Diagonal gradient so blocks differ from each other
        let mut buf = PixelBuffer::new(280, 280);
        for y in 0..280 {
            for x in 0..280 {
                let v = ((x + y) % 256) as u8;
                buf.set_pixel(x, y, [v, 255 - v, v / 2, 255]);
            }
        }
        let fv = preprocess(&buf, 280, 10, 28).unwrap();
        assert_eq!(fv.len(), 784);
        assert_eq!(fv.grid_size(), 28);
        assert!(fv.as_slice().iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn black_canvas_is_minus_one() {
        let fv = preprocess(&uniform(0), 280, 10, 28).unwrap();
        assert!(fv.as_slice().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn transparent_canvas_is_minus_one() {
        let fv = preprocess_with(&PixelBuffer::new(280, 280), Geometry::MNIST).unwrap();
        assert!(fv.as_slice().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn white_canvas_is_one() {
        let fv = preprocess(&uniform(255), 280, 10, 28).unwrap();
        assert!(fv.as_slice().iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn mid_gray_is_just_above_zero() {
        let expected = 2.0 * (128.0 / 255.0) - 1.0;
        let fv = preprocess(&uniform(128), 280, 10, 28).unwrap();
        assert!(fv.as_slice().iter().all(|&v| (v - expected).abs() < EPS));
        assert!((fv.at(0, 0) - 0.0039).abs() < EPS);
    }

    #[test]
    fn same_buffer_same_output() {
        let mut buf = uniform(30);
        buf.set_pixel(140, 77, [255, 255, 255, 255]);
        let a = preprocess(&buf, 280, 10, 28).unwrap();
        let b = preprocess(&buf, 280, 10, 28).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blocks_are_laid_out_row_major() {
        // Paint the whole block at grid column 2, row 1
        let mut buf = uniform(0);
        for y in 10..20 {
            for x in 20..30 {
                buf.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let fv = preprocess(&buf, 280, 10, 28).unwrap();
        assert!((fv.as_slice()[28 + 2] - 1.0).abs() < 1e-6);
        assert!((fv.at(2, 1) - 1.0).abs() < 1e-6);
        assert_eq!(fv.at(1, 2), -1.0);
        let lit = fv.as_slice().iter().filter(|&&v| v > -1.0).count();
        assert_eq!(lit, 1);
    }

    #[test]
    fn partial_block_is_averaged() {
        // Half of block (0,0) white -> mean gray 127.5 -> 0.0
        let mut buf = uniform(0);
        for y in 0..10 {
            for x in 0..5 {
                buf.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let fv = preprocess(&buf, 280, 10, 28).unwrap();
        assert!(fv.at(0, 0).abs() < EPS);
    }

    #[test]
    fn channels_use_luminosity_weights() {
        let red = PixelBuffer::filled(280, 280, [255, 0, 0, 255]);
        let fv = preprocess(&red, 280, 10, 28).unwrap();
        assert!((fv.at(5, 5) - (2.0 * 0.2126 - 1.0)).abs() < EPS);

        let green = PixelBuffer::filled(280, 280, [0, 255, 0, 255]);
        let fv = preprocess(&green, 280, 10, 28).unwrap();
        assert!((fv.at(5, 5) - (2.0 * 0.7152 - 1.0)).abs() < EPS);
    }

    #[test]
    fn alpha_does_not_change_the_result() {
        let opaque = PixelBuffer::filled(280, 280, [200, 100, 50, 255]);
        let clear = PixelBuffer::filled(280, 280, [200, 100, 50, 0]);
        assert_eq!(
            preprocess(&opaque, 280, 10, 28).unwrap(),
            preprocess(&clear, 280, 10, 28).unwrap()
        );
    }

    #[test]
    fn other_geometries_work_when_they_tile() {
        let fv = preprocess(&PixelBuffer::filled(12, 12, [255, 255, 255, 255]), 12, 3, 4).unwrap();
        assert_eq!(fv.len(), 16);
    }

    #[test]
    fn wrong_buffer_size_is_rejected() {
        let buf = PixelBuffer::new(200, 280);
        assert!(matches!(preprocess(&buf, 280, 10, 28), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn truncated_data_is_rejected() {
        let buf = PixelBuffer { width: 280, height: 280, data: vec![0; 280 * 280 * 3] };
        assert!(matches!(preprocess(&buf, 280, 10, 28), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn oversized_geometry_fails_instead_of_overflowing() {
        let buf = PixelBuffer::new(2, 2);
        assert!(matches!(preprocess(&buf, 2, 2, usize::MAX), Err(Error::InvalidInput(_))));
        assert!(matches!(preprocess(&buf, 2, usize::MAX, 2), Err(Error::InvalidInput(_))));
        let huge = Geometry { canvas_size: usize::MAX, block_size: 1, grid_size: usize::MAX };
        assert!(huge.validate().is_ok());
        let buf = PixelBuffer { width: usize::MAX, height: usize::MAX, data: vec![0; 16] };
        assert!(matches!(preprocess_with(&buf, huge), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn uneven_tiling_is_rejected() {
        let buf = PixelBuffer::new(280, 280);
        assert!(matches!(preprocess(&buf, 280, 9, 28), Err(Error::InvalidInput(_))));
        assert!(matches!(preprocess(&buf, 280, 0, 28), Err(Error::InvalidInput(_))));
    }
}
