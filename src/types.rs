// Core types shared by the canvas, the preprocessor and the window.

use crate::error::Error;
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;

/// What the window shows each frame.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,     // window width (pixels)
    pub height: usize,    // window height (pixels)
    pub pixels: Vec<u32>, // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }
}

/// Snapshot of RGBA samples, row-major, origin top-left.
/// `data.len()` is `width * height * 4` for anything built through the constructors.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Fully transparent black, like a freshly cleared canvas.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self { width, height, data }
    }

    pub fn from_rgba_image(img: RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        Self { width: w as usize, height: h as usize, data: img.into_raw() }
    }

    /// Decode any format `image` understands and stretch it to `size`×`size`.
    pub fn from_image_file(path: &Path, size: usize) -> Result<Self, Error> {
        let img = image::open(path)?;
        let resized = img.resize_exact(size as u32, size as u32, FilterType::Triangle);
        Ok(Self::from_rgba_image(resized.to_rgba8()))
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage, Error> {
        RgbaImage::from_raw(self.width as u32, self.height as u32, self.data.clone()).ok_or_else(|| {
            Error::InvalidInput(format!(
                "pixel buffer {}x{} holds {} bytes",
                self.width,
                self.height,
                self.data.len()
            ))
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let i = (y * self.width + x) * 4;
        self.data[i..i + 4].copy_from_slice(&rgba);
    }
}

/// Normalized classifier input: `grid_size²` values in [-1, 1], row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    grid_size: usize,
    values: Vec<f32>,
}

impl FeatureVector {
    pub(crate) fn from_values(grid_size: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), grid_size * grid_size);
        Self { grid_size, values }
    }

    #[cfg(test)]
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Value of grid cell (x, y).
    #[cfg(test)]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.grid_size + x]
    }
}

/// One line to rasterize, in logical canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from_x: f32,
    pub from_y: f32,
    pub to_x: f32,
    pub to_y: f32,
}

#[cfg(test)]
impl Segment {
    pub fn length(&self) -> f32 {
        let dx = self.to_x - self.from_x;
        let dy = self.to_y - self.from_y;
        (dx * dx + dy * dy).sqrt()
    }
}
