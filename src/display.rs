// Prediction panel: one bar per digit class, tallest one highlighted.

use crate::draw::{draw_text_5x7, fill_rect, text_width_5x7};
use crate::types::FrameBuffer;

pub const CLASS_COUNT: usize = 10;

/// Panel geometry, in window pixels.
pub const PANEL_WIDTH: usize = 16 + CLASS_COUNT * BAR_PITCH;
const BAR_PITCH: usize = 24;
const BAR_WIDTH: i32 = 16;
const PANEL_MARGIN: i32 = 8;
const LABEL_SCALE: i32 = 2;
const HINT_SCALE: i32 = 1;

/// Key help printed across the top of the panel.
pub const HINT_TEXT: &str = "C: CLEAR  S: SAVE  ESC: QUIT";

const PANEL_BG: u32 = 0x00_20_20_20;
const TRACK_COLOR: u32 = 0x00_30_30_30;
const BAR_COLOR: u32 = 0x00_88_88_88;
const TOP_BAR_COLOR: u32 = 0x00_33_CC_FF;
const LABEL_COLOR: u32 = 0x00_DE_DE_DE;
const HINT_COLOR: u32 = 0x00_9A_9A_9A;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub height_percent: f32,
    pub top_prediction: bool,
}

impl Default for Bar {
    fn default() -> Self {
        Self { height_percent: 0.0, top_prediction: false }
    }
}

#[derive(Default)]
pub struct PredictionDisplay {
    bars: [Bar; CLASS_COUNT],
}

impl PredictionDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn bars(&self) -> &[Bar; CLASS_COUNT] {
        &self.bars
    }

    /// Zero height, neutral style, for every class.
    pub fn clear(&mut self) {
        self.bars = [Bar::default(); CLASS_COUNT];
    }

    /// Set bar i to `probabilities[i] * 100` percent; every class equal to the
    /// maximum is highlighted. Extra values are ignored, missing ones read as 0.
    pub fn apply(&mut self, probabilities: &[f32]) {
        let max = probabilities.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        for (i, bar) in self.bars.iter_mut().enumerate() {
            let p = probabilities.get(i).copied().unwrap_or(0.0);
            bar.height_percent = p * 100.0;
            bar.top_prediction = probabilities.get(i).is_some() && p == max;
        }
    }

    /// Index of the highlighted class, if any.
    #[cfg(test)]
    pub fn top_class(&self) -> Option<usize> {
        self.bars.iter().position(|b| b.top_prediction)
    }

    /// Draw the panel into `fb` starting at column `x`, spanning the full height.
    pub fn render(&self, fb: &mut FrameBuffer, x: i32) {
        let height = fb.height as i32;
        fill_rect(fb, x, 0, PANEL_WIDTH as i32, height, PANEL_BG);

        let hint_x = x + (PANEL_WIDTH as i32 - text_width_5x7(HINT_TEXT, HINT_SCALE)) / 2;
        draw_text_5x7(fb, hint_x, PANEL_MARGIN, HINT_TEXT, HINT_SCALE, HINT_COLOR);

        let label_h = 7 * LABEL_SCALE;
        let track_top = PANEL_MARGIN + 7 * HINT_SCALE + 6;
        let track_bottom = height - PANEL_MARGIN - label_h - 4;
        let track_h = (track_bottom - track_top).max(0);

        for (i, bar) in self.bars.iter().enumerate() {
            let bx = x + PANEL_MARGIN + (i * BAR_PITCH) as i32;
            fill_rect(fb, bx, track_top, BAR_WIDTH, track_h, TRACK_COLOR);

            let frac = (bar.height_percent / 100.0).clamp(0.0, 1.0);
            let filled = (frac * track_h as f32).round() as i32;
            let color = if bar.top_prediction { TOP_BAR_COLOR } else { BAR_COLOR };
            fill_rect(fb, bx, track_bottom - filled, BAR_WIDTH, filled, color);

            let label = i.to_string();
            let lx = bx + (BAR_WIDTH - text_width_5x7(&label, LABEL_SCALE)) / 2;
            let label_color = if bar.top_prediction { TOP_BAR_COLOR } else { LABEL_COLOR };
            draw_text_5x7(fb, lx, track_bottom + 4, &label, LABEL_SCALE, label_color);
        }
    }
}
