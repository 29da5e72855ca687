// The drawing surface: an RGBA canvas that strokes are rasterized into and
// that the preprocessor reads back.

use crate::draw::{plot_text_5x7, text_width_5x7};
use crate::types::{PixelBuffer, Segment};

/// Scale for the 5x7 placeholder font (about 14px tall on a 280 canvas).
const PLACEHOLDER_TEXT_SCALE: i32 = 2;

pub struct DrawingSurface {
    pixels: PixelBuffer,
    line_width: f32,
    stroke_color: [u8; 3],
    placeholder_color: [u8; 3],
}

impl DrawingSurface {
    /// A cleared (transparent) `size`×`size` canvas.
    pub fn new(size: usize, line_width: f32, stroke_color: [u8; 3], placeholder_color: [u8; 3]) -> Self {
        Self { pixels: PixelBuffer::new(size, size), line_width, stroke_color, placeholder_color }
    }

    pub fn size(&self) -> usize {
        self.pixels.width
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Snapshot of the whole canvas.
    pub fn image_data(&self) -> PixelBuffer {
        self.pixels.clone()
    }

    pub fn clear(&mut self) {
        self.pixels.data.fill(0);
    }

    /// Clear, then write `text` centered in the placeholder color.
    pub fn show_text(&mut self, text: &str) {
        self.clear();
        let size = self.size() as i32;
        let x = (size - text_width_5x7(text, PLACEHOLDER_TEXT_SCALE)) / 2;
        let y = (size - 7 * PLACEHOLDER_TEXT_SCALE) / 2;
        let [r, g, b] = self.placeholder_color;
        let pixels = &mut self.pixels;
        plot_text_5x7(x, y, text, PLACEHOLDER_TEXT_SCALE, |px, py| {
            if px >= 0 && py >= 0 && (px as usize) < pixels.width && (py as usize) < pixels.height {
                pixels.set_pixel(px as usize, py as usize, [r, g, b, 255]);
            }
        });
    }

    /// Stroke one segment with round ends, `line_width` wide.
    /// Edge pixels get partial coverage (1px ramp) and are blended source-over.
    pub fn stroke(&mut self, seg: &Segment) {
        let radius = self.line_width / 2.0;
        let w = self.pixels.width as i32;
        let h = self.pixels.height as i32;

        // Bounding box of the capsule, clipped to the canvas
        let x0 = ((seg.from_x.min(seg.to_x) - radius - 1.0).floor() as i32).max(0);
        let y0 = ((seg.from_y.min(seg.to_y) - radius - 1.0).floor() as i32).max(0);
        let x1 = ((seg.from_x.max(seg.to_x) + radius + 1.0).ceil() as i32).min(w - 1);
        let y1 = ((seg.from_y.max(seg.to_y) + radius + 1.0).ceil() as i32).min(h - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                // Distance from the pixel center to the segment
                let d = distance_to_segment(x as f32 + 0.5, y as f32 + 0.5, seg);
                let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
                if coverage <= 0.0 { continue; }
                self.blend(x as usize, y as usize, coverage);
            }
        }
    }

    fn blend(&mut self, x: usize, y: usize, alpha: f32) {
        let [dr, dg, db, da] = self.pixels.pixel(x, y);
        let da = da as f32 / 255.0;
        let out_a = alpha + da * (1.0 - alpha);
        let mix = |s: u8, d: u8| -> u8 {
            let v = (s as f32 * alpha + d as f32 * da * (1.0 - alpha)) / out_a;
            v.round().clamp(0.0, 255.0) as u8
        };
        let [sr, sg, sb] = self.stroke_color;
        let rgba = [mix(sr, dr), mix(sg, dg), mix(sb, db), (out_a * 255.0).round().clamp(0.0, 255.0) as u8];
        self.pixels.set_pixel(x, y, rgba);
    }
}

fn distance_to_segment(px: f32, py: f32, seg: &Segment) -> f32 {
    let (ax, ay) = (seg.from_x, seg.from_y);
    let (dx, dy) = (seg.to_x - ax, seg.to_y - ay);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 { (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0) } else { 0.0 };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}
