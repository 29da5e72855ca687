//! The drawing session: the one owner of all mutable UI state.
//!
//! Input events go through the stroke tracker onto the canvas; every stroked
//! segment re-preprocesses the whole canvas and submits it to the inference
//! worker. Completions are drained once per frame and shown as bars.

use crate::canvas::DrawingSurface;
use crate::config::Config;
use crate::display::PredictionDisplay;
use crate::draw::blit_canvas;
use crate::error::Error;
use crate::inference::{InferenceClient, InferenceEvent};
use crate::input::{InputEvent, InputSource};
use crate::model::{first_output, OutputMap};
use crate::preprocess::{preprocess_with, Geometry};
use crate::stroke::{DrawCommand, StrokeTracker};
use crate::types::{FrameBuffer, Segment};
use log::*;
use std::path::{Path, PathBuf};

pub const LOADING_TEXT: &str = "LOADING...";
pub const PROMPT_TEXT: &str = "DRAW A NUMBER HERE!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Model not loaded (or failed to load); input is ignored.
    Loading,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct DrawingSession {
    geometry: Geometry,
    display_scale: f32,
    canvas_extent: usize,
    snapshot_path: PathBuf,
    discard_stale: bool,

    tracker: StrokeTracker,
    surface: DrawingSurface,
    display: PredictionDisplay,
    inference: InferenceClient,
    phase: Phase,

    /// Newest sequence number whose result is on screen.
    latest_applied: u64,
    /// Requests up to this sequence number were issued before the last clear.
    cleared_through: u64,
}

impl DrawingSession {
    pub fn new(config: &Config, inference: InferenceClient) -> Self {
        let mut surface = DrawingSurface::new(
            config.canvas.size,
            config.canvas.line_width,
            config.canvas.stroke_color,
            config.canvas.placeholder_color,
        );
        surface.show_text(LOADING_TEXT);

        Self {
            geometry: config.geometry(),
            display_scale: config.canvas.display_scale,
            canvas_extent: config.canvas_extent(),
            snapshot_path: config.snapshot_path.clone(),
            discard_stale: config.inference.discard_stale,
            tracker: StrokeTracker::new(config.canvas.display_scale),
            surface,
            display: PredictionDisplay::new(),
            inference,
            phase: Phase::Loading,
            latest_applied: 0,
            cleared_through: 0,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    #[cfg(test)]
    pub fn display(&self) -> &PredictionDisplay {
        &self.display
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &StrokeTracker {
        &self.tracker
    }

    /// One frame: apply the input batch, then drain finished inferences.
    pub fn step(&mut self, input: &mut impl InputSource) -> Control {
        let mut control = Control::Continue;
        for event in input.poll_events() {
            if self.handle_input(event) == Control::Quit {
                control = Control::Quit;
                break;
            }
        }
        self.pump_inference();
        control
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Control {
        if event == InputEvent::Quit {
            return Control::Quit;
        }
        if self.phase == Phase::Loading {
            trace!("Session: Ignoring {event:?} while the model loads");
            return Control::Continue;
        }
        match event {
            InputEvent::Pointer(pointer) => {
                for command in self.tracker.handle(pointer) {
                    match command {
                        DrawCommand::ClearSurface => self.clear_surface(),
                        DrawCommand::Line(segment) => self.draw_line(&segment),
                    }
                }
            }
            InputEvent::Clear => self.clear(),
            InputEvent::SaveSnapshot => {
                let path = self.snapshot_path.clone();
                match self.save_snapshot(&path) {
                    Ok(()) => info!("Session: Saved canvas to {}", path.display()),
                    Err(e) => warn!("Session: Could not save canvas: {e}"),
                }
            }
            InputEvent::Quit => return Control::Quit,
        }
        Control::Continue
    }

    /// Blank canvas, idle tracker with placeholder flag, empty bars.
    /// No inference is triggered.
    pub fn clear(&mut self) {
        debug!("Session: Clear");
        self.clear_surface();
        self.tracker.reset();
        self.cleared_through = self.inference.last_seq();
    }

    fn clear_surface(&mut self) {
        self.surface.clear();
        self.display.clear();
    }

    fn draw_line(&mut self, segment: &Segment) {
        self.surface.stroke(segment);
        self.request_prediction();
    }

    /// Preprocess the whole canvas and queue it for the worker.
    fn request_prediction(&mut self) {
        let features = match preprocess_with(&self.surface.image_data(), self.geometry) {
            Ok(f) => f,
            Err(e) => {
                error!("Session: Preprocessing failed: {e}");
                return;
            }
        };
        if let Err(e) = self.inference.submit(features) {
            warn!("Session: {e}");
        }
    }

    /// Apply every event the worker has produced since the last frame.
    pub fn pump_inference(&mut self) {
        for event in self.inference.poll_events() {
            self.on_inference_event(event);
        }
    }

    fn on_inference_event(&mut self, event: InferenceEvent) {
        match event {
            InferenceEvent::Ready => {
                info!("Session: Model ready");
                self.phase = Phase::Ready;
                self.tracker.reset();
                self.surface.show_text(PROMPT_TEXT);
            }
            InferenceEvent::LoadFailed(e) => {
                // Stays in Loading for good; nothing retries
                error!("Session: Model load failed, staying in loading state: {e}");
            }
            InferenceEvent::Completed { seq, outputs } => self.on_completed(seq, &outputs),
            InferenceEvent::Failed { seq, error } => {
                warn!("Session: Inference {seq} failed: {error}");
            }
        }
    }

    fn on_completed(&mut self, seq: u64, outputs: &OutputMap) {
        if self.discard_stale && (seq <= self.cleared_through || seq < self.latest_applied) {
            debug!("Session: Dropping stale result {seq} (shown {}, cleared through {})",
                self.latest_applied, self.cleared_through);
            return;
        }
        match first_output(outputs) {
            Some(probabilities) => {
                trace!("Session: Result {seq}: {probabilities:?}");
                self.display.apply(probabilities);
                self.latest_applied = self.latest_applied.max(seq);
            }
            None => warn!("Session: Result {seq} has no outputs"),
        }
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), Error> {
        self.surface.image_data().to_rgba_image()?.save(path)?;
        Ok(())
    }

    /// Canvas on the left, prediction panel right of it.
    pub fn render(&self, fb: &mut FrameBuffer) {
        blit_canvas(fb, self.surface.pixels(), self.display_scale);
        self.display.render(fb, self.canvas_extent as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{CLASS_COUNT, PANEL_WIDTH};
    use crate::inference::InferenceRequest;
    use crate::input::ScriptedInput;
    use crate::stroke::{LeaveTarget, PointerEvent};
    use std::sync::mpsc::{channel, Receiver, Sender};

    struct Harness {
        session: DrawingSession,
        requests: Receiver<InferenceRequest>,
        events: Sender<InferenceEvent>,
    }

    impl Harness {
        fn new(config: Config) -> Self {
            let (work_tx, requests) = channel();
            let (events, event_rx) = channel();
            let session = DrawingSession::new(&config, InferenceClient::from_channels(work_tx, event_rx));
            Self { session, requests, events }
        }

        fn ready() -> Self {
            let mut h = Self::new(Config::default());
            h.send(InferenceEvent::Ready);
            h
        }

        fn send(&mut self, event: InferenceEvent) {
            self.events.send(event).unwrap();
            self.session.pump_inference();
        }

        fn complete(&mut self, seq: u64, top: usize) {
            let mut probs = vec![0.0f32; CLASS_COUNT];
            probs[top] = 1.0;
            let mut outputs = OutputMap::new();
            outputs.insert("probabilities".into(), probs);
            self.send(InferenceEvent::Completed { seq, outputs });
        }

        fn pointer(&mut self, event: PointerEvent) {
            self.session.handle_input(InputEvent::Pointer(event));
        }

        fn submitted(&self) -> Vec<u64> {
            self.requests.try_iter().map(|r| r.seq).collect()
        }
    }

    fn count_color(session: &DrawingSession, rgb: [u8; 3]) -> usize {
        session
            .surface()
            .pixels()
            .data
            .chunks(4)
            .filter(|p| p[3] == 255 && p[..3] == rgb)
            .count()
    }

    #[test_log::test]
    fn input_is_ignored_until_the_model_is_ready() {
        let mut h = Harness::new(Config::default());
        assert_eq!(h.session.phase(), Phase::Loading);
        assert!(count_color(&h.session, [222, 222, 222]) > 0); // "LOADING..."

        h.pointer(PointerEvent::Down { x: 10.0, y: 10.0 });
        h.session.handle_input(InputEvent::Clear);
        assert!(h.submitted().is_empty());
        assert!(!h.session.tracker().is_drawing());
    }

    #[test_log::test]
    fn load_failure_keeps_the_loading_state() {
        let mut h = Harness::new(Config::default());
        h.send(InferenceEvent::LoadFailed(Error::ModelLoad("missing".into())));
        assert_eq!(h.session.phase(), Phase::Loading);
        h.pointer(PointerEvent::Down { x: 10.0, y: 10.0 });
        assert!(h.submitted().is_empty());
    }

    #[test_log::test]
    fn first_touch_clears_the_prompt_and_draws_a_dot() {
        let mut h = Harness::ready();
        assert_eq!(h.session.phase(), Phase::Ready);
        assert!(count_color(&h.session, [222, 222, 222]) > 0); // prompt

        h.pointer(PointerEvent::Down { x: 140.0, y: 140.0 });
        assert_eq!(count_color(&h.session, [222, 222, 222]), 0);
        assert_eq!(h.session.surface().pixels().pixel(140, 140), [255, 255, 255, 255]);
        assert_eq!(h.submitted(), vec![1]);
    }

    #[test_log::test]
    fn every_segment_requests_a_prediction() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.pointer(PointerEvent::Move { x: 60.0, y: 60.0 });
        h.pointer(PointerEvent::Move { x: 70.0, y: 60.0 });
        h.pointer(PointerEvent::Up);
        h.pointer(PointerEvent::Move { x: 200.0, y: 200.0 });
        assert_eq!(h.submitted(), vec![1, 2, 3]);
        assert_eq!(h.session.surface().pixels().pixel(200, 200), [0, 0, 0, 0]);
    }

    #[test_log::test]
    fn submitted_features_reflect_the_canvas() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 5.0, y: 5.0 });
        let request = h.requests.try_recv().unwrap();
        assert_eq!(request.features.len(), 784);
        assert!(request.features.at(0, 0) > 0.9);
        assert_eq!(request.features.at(27, 27), -1.0);
    }

    #[test_log::test]
    fn completions_update_the_bars() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.complete(1, 4);
        assert_eq!(h.session.display().top_class(), Some(4));
        assert_eq!(h.session.display().bars()[4].height_percent, 100.0);
    }

    #[test_log::test]
    fn failed_inference_leaves_the_bars_alone() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.pointer(PointerEvent::Move { x: 55.0, y: 50.0 });
        h.complete(1, 6);
        h.send(InferenceEvent::Failed { seq: 2, error: Error::Inference("boom".into()) });
        assert_eq!(h.session.display().top_class(), Some(6));
    }

    #[test_log::test]
    fn stale_results_are_dropped_by_default() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.pointer(PointerEvent::Move { x: 60.0, y: 50.0 });
        h.complete(2, 8);
        h.complete(1, 3);
        assert_eq!(h.session.display().top_class(), Some(8));
    }

    #[test_log::test]
    fn last_completion_wins_when_stale_results_are_kept() {
        let mut config = Config::default();
        config.inference.discard_stale = false;
        let mut h = Harness::new(config);
        h.send(InferenceEvent::Ready);
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.pointer(PointerEvent::Move { x: 60.0, y: 50.0 });
        h.complete(2, 8);
        h.complete(1, 3);
        assert_eq!(h.session.display().top_class(), Some(3));
    }

    #[test_log::test]
    fn clear_resets_everything_and_drops_pending_results() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.complete(1, 2);
        h.pointer(PointerEvent::Move { x: 80.0, y: 50.0 });

        h.session.handle_input(InputEvent::Clear);
        let state = h.session.tracker().state();
        assert!(!state.drawing);
        assert!(state.placeholder_shown);
        assert_eq!(h.session.display().top_class(), None);
        assert!(h.session.surface().image_data().data.iter().all(|&b| b == 0));

        // Result of the pre-clear move arrives late
        h.complete(2, 9);
        assert_eq!(h.session.display().top_class(), None);

        // Drawing again needs no second clear
        h.pointer(PointerEvent::Down { x: 100.0, y: 100.0 });
        assert!(h.session.tracker().is_drawing());
        assert!(!h.session.tracker().state().placeholder_shown);
        assert_eq!(h.submitted(), vec![1, 2, 3]);
        h.complete(3, 5);
        assert_eq!(h.session.display().top_class(), Some(5));
    }

    #[test_log::test]
    fn sibling_leave_keeps_the_stroke_going() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 50.0, y: 50.0 });
        h.pointer(PointerEvent::Leave { related: LeaveTarget::Sibling });
        h.pointer(PointerEvent::Move { x: 60.0, y: 50.0 });
        h.pointer(PointerEvent::Leave { related: LeaveTarget::Outside });
        h.pointer(PointerEvent::Move { x: 70.0, y: 50.0 });
        assert_eq!(h.submitted(), vec![1, 2]);
    }

    #[test_log::test]
    fn step_runs_a_scripted_session() {
        let mut h = Harness::ready();
        let mut input = ScriptedInput::new();
        input.push_frame(vec![InputEvent::Pointer(PointerEvent::Down { x: 20.0, y: 20.0 })]);
        input.push_frame(vec![
            InputEvent::Pointer(PointerEvent::Move { x: 40.0, y: 20.0 }),
            InputEvent::Pointer(PointerEvent::Up),
        ]);
        assert_eq!(h.session.step(&mut input), Control::Continue);
        assert_eq!(h.session.step(&mut input), Control::Continue);
        assert_eq!(h.session.step(&mut input), Control::Quit);
        assert_eq!(h.submitted(), vec![1, 2]);
    }

    #[test_log::test]
    fn display_scale_maps_window_pixels_to_canvas_pixels() {
        let config = Config::from_json(r#"{ "canvas": { "display_scale": 0.5 } }"#).unwrap();
        let mut h = Harness::new(config);
        h.send(InferenceEvent::Ready);
        h.pointer(PointerEvent::Down { x: 100.0, y: 100.0 });
        assert_eq!(h.session.surface().pixels().pixel(200, 200), [255, 255, 255, 255]);
    }

    #[test]
    fn render_fills_canvas_and_panel() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 140.0, y: 140.0 });
        let mut fb = FrameBuffer::new(280 + PANEL_WIDTH, 280);
        h.session.render(&mut fb);
        assert_eq!(fb.pixels[140 * fb.width + 140], 0x00FF_FFFF);
        assert_ne!(fb.pixels[2 * fb.width + 281], 0);
    }

    #[test]
    fn snapshot_is_written_as_png() {
        let mut h = Harness::ready();
        h.pointer(PointerEvent::Down { x: 140.0, y: 140.0 });
        let path = std::env::temp_dir().join(format!("digit_sketch_test_{}.png", std::process::id()));
        h.session.save_snapshot(&path).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();
        assert_eq!(img.dimensions(), (280, 280));
        assert_eq!(img.get_pixel(140, 140).0, [255, 255, 255, 255]);
    }
}
