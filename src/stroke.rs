// Pointer samples -> line segments.
// Idle (button up) / Drawing (button down). While drawing, every move
// draws a line from the last position to the new one.

use crate::types::Segment;

/// Offset applied to the last position on pointer-down so the first line has
/// nonzero length and rasterizes as a dot.
pub const DOT_EPSILON: f32 = 0.001;

/// Where the pointer went when it left the drawing area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveTarget {
    /// Left the window entirely.
    Outside,
    /// Moved onto another element of the same window (e.g. the prediction panel).
    Sibling,
}

/// Raw pointer events, in display pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave { related: LeaveTarget },
}

/// What the tracker asks the drawing surface to do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCommand {
    /// Wipe the placeholder text before the first stroke.
    ClearSurface,
    Line(Segment),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeState {
    pub drawing: bool,
    pub last_x: f32,
    pub last_y: f32,
    pub placeholder_shown: bool,
}

impl Default for StrokeState {
    fn default() -> Self {
        Self { drawing: false, last_x: 0.0, last_y: 0.0, placeholder_shown: true }
    }
}

pub struct StrokeTracker {
    state: StrokeState,
    display_scale: f32, // display pixels per logical canvas pixel
}

impl StrokeTracker {
    pub fn new(display_scale: f32) -> Self {
        Self { state: StrokeState::default(), display_scale }
    }

    #[cfg(test)]
    pub fn state(&self) -> StrokeState {
        self.state
    }

    #[cfg(test)]
    pub fn is_drawing(&self) -> bool {
        self.state.drawing
    }

    /// Back to Idle with the placeholder flag set (used by Clear).
    pub fn reset(&mut self) {
        self.state = StrokeState::default();
    }

    /// Feed one event; returns the draw commands it produced, in order.
    pub fn handle(&mut self, event: PointerEvent) -> Vec<DrawCommand> {
        let mut out = Vec::new();
        match event {
            PointerEvent::Down { x, y } => {
                self.state.drawing = true;
                if self.state.placeholder_shown {
                    out.push(DrawCommand::ClearSurface);
                    self.state.placeholder_shown = false;
                }
                let (lx, ly) = self.to_canvas(x, y);
                self.state.last_x = lx + DOT_EPSILON;
                self.state.last_y = ly + DOT_EPSILON;
                self.pointer_move(x, y, &mut out);
            }
            PointerEvent::Move { x, y } => self.pointer_move(x, y, &mut out),
            PointerEvent::Up => self.state.drawing = false,
            PointerEvent::Leave { related } => {
                // A sibling leave keeps the stroke alive; only a real window exit ends it.
                if related == LeaveTarget::Outside {
                    self.state.drawing = false;
                }
            }
        }
        out
    }

    fn pointer_move(&mut self, x: f32, y: f32, out: &mut Vec<DrawCommand>) {
        let (x, y) = self.to_canvas(x, y);
        if self.state.drawing {
            out.push(DrawCommand::Line(Segment {
                from_x: self.state.last_x,
                from_y: self.state.last_y,
                to_x: x,
                to_y: y,
            }));
        }
        // Tracked while idle too, so the next down-then-move starts from here
        self.state.last_x = x;
        self.state.last_y = y;
    }

    #[inline]
    fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.display_scale, y / self.display_scale)
    }
}
