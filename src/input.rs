// Abstract input: the session only sees these events, never the window.

use crate::stroke::{LeaveTarget, PointerEvent};
#[cfg(test)]
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Clear,
    SaveSnapshot,
    Quit,
}

/// Anything that can hand the session a batch of events per frame.
pub trait InputSource {
    fn poll_events(&mut self) -> Vec<InputEvent>;
}

/// Turns per-frame mouse samples (position + button level) into pointer events.
///
/// minifb only reports whether the button is held when sampled
/// (`get_mouse_down`), with no press/release edges for the mouse. A click that
/// starts and ends between two frames (under ~16 ms at 60 fps) leaves no dot.
pub struct PointerSampler {
    canvas_extent: f32, // canvas occupies [0, extent) in both axes
    prev_pos: Option<(f32, f32)>,
    prev_on_canvas: bool,
    prev_down: bool,
}

impl PointerSampler {
    pub fn new(canvas_extent: f32) -> Self {
        Self { canvas_extent, prev_pos: None, prev_on_canvas: false, prev_down: false }
    }

    /// `pos` is None while the pointer is outside the window.
    pub fn sample(&mut self, pos: Option<(f32, f32)>, down: bool) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let canvas_pos = pos.filter(|&(x, y)| {
            x >= 0.0 && y >= 0.0 && x < self.canvas_extent && y < self.canvas_extent
        });

        // Leaving: out of the window entirely, or from the canvas onto the panel
        if self.prev_pos.is_some() && pos.is_none() {
            events.push(InputEvent::Pointer(PointerEvent::Leave { related: LeaveTarget::Outside }));
        } else if self.prev_on_canvas && pos.is_some() && canvas_pos.is_none() {
            events.push(InputEvent::Pointer(PointerEvent::Leave { related: LeaveTarget::Sibling }));
        }

        // Canvas only sees presses and moves that happen over it
        if let Some((x, y)) = canvas_pos {
            if down && !self.prev_down {
                events.push(InputEvent::Pointer(PointerEvent::Down { x, y }));
            } else if pos != self.prev_pos {
                events.push(InputEvent::Pointer(PointerEvent::Move { x, y }));
            }
        }

        // Release anywhere in the window ends the stroke
        if !down && self.prev_down {
            events.push(InputEvent::Pointer(PointerEvent::Up));
        }

        self.prev_pos = pos;
        self.prev_on_canvas = canvas_pos.is_some();
        self.prev_down = down;
        events
    }
}

/// Replays a fixed list of frames; each `poll_events` returns the next one.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedInput {
    frames: VecDeque<Vec<InputEvent>>,
}

#[cfg(test)]
impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, events: Vec<InputEvent>) {
        self.frames.push_back(events);
    }

    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
impl InputSource for ScriptedInput {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        // Out of frames means the script is over
        self.frames.pop_front().unwrap_or_else(|| vec![InputEvent::Quit])
    }
}
