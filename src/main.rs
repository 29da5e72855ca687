// What you SEE:
// • Left: a black canvas. It says "LOADING..." until the model is up,
//   then "DRAW A NUMBER HERE!".
// • Hold Left Mouse on the canvas to draw; the bars on the right show how
//   sure the model is about each digit, the top one highlighted.
// • C clears, S saves the canvas as PNG, ESC quits.
//
// `digit-sketch --classify digit.png` skips the window and prints the
// prediction for an image file.

mod canvas;
mod config;
mod display;
mod draw;
mod error;
mod inference;
mod input;
mod model;
mod preprocess;
mod session;
mod stroke;
mod types;

use config::Config;
use display::{HINT_TEXT, PANEL_WIDTH};
use draw::Drawer;
use error::Error;
use inference::spawn_inference_thread;
use log::{info, warn};
use model::{first_output, DenseNetwork, InferenceEngine};
use preprocess::preprocess_with;
use session::{Control, DrawingSession};
use std::path::{Path, PathBuf};
use types::{FrameBuffer, PixelBuffer};

/// Shortest window we open, so the bars stay readable on small canvases.
const MIN_WINDOW_HEIGHT: usize = 160;

const USAGE: &str = "usage: digit-sketch [--config FILE.json] [--classify IMAGE]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    classify: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, Error> {
        let mut out = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => out.config = Some(Self::value(&arg, args.next())?),
                "--classify" => out.classify = Some(Self::value(&arg, args.next())?),
                other => return Err(Error::Config(format!("unknown argument '{other}'\n{USAGE}"))),
            }
        }
        Ok(out)
    }

    fn value(flag: &str, next: Option<String>) -> Result<PathBuf, Error> {
        next.map(PathBuf::from)
            .ok_or_else(|| Error::Config(format!("{flag} needs a path\n{USAGE}")))
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = Config::load(args.config.as_deref())?;
    info!("Configuration loaded ({}).", args.config.as_deref().map_or("defaults".into(), |p| p.display().to_string()));

    match &args.classify {
        Some(image) => classify(&config, image),
        None => run_window(&config),
    }
}

/// Headless: one image in, ten probabilities out.
fn classify(config: &Config, image: &Path) -> Result<(), Error> {
    let mut model = DenseNetwork::load(&config.model.path)?;
    let pixels = PixelBuffer::from_image_file(image, config.canvas.size)?;
    let features = preprocess_with(&pixels, config.geometry())?;

    let outputs = model.run(&[features])?;
    let probabilities = first_output(&outputs)
        .ok_or_else(|| Error::Inference("model produced no outputs".into()))?;

    for (digit, p) in probabilities.iter().enumerate() {
        println!("{digit}: {p:.4}");
    }
    if let Some((digit, p)) = probabilities.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)) {
        println!("prediction: {digit} ({:.1}%)", p * 100.0);
    }
    Ok(())
}

fn run_window(config: &Config) -> Result<(), Error> {
    /* --- Model worker ---
       Loads in the background; the canvas shows "LOADING..." meanwhile. */
    let model_path = config.model.path.clone();
    let inference = spawn_inference_thread(move || DenseNetwork::load(&model_path))?;

    /* --- Window + screen buffer ---
       Canvas square on the left, prediction bars to its right. */
    let extent = config.canvas_extent();
    let mut screen = FrameBuffer::new(extent + PANEL_WIDTH, extent.max(MIN_WINDOW_HEIGHT));
    let mut drawer = Drawer::new(
        &config.window.title,
        screen.width,
        screen.height,
        extent,
        config.window.target_fps,
    )?;

    let mut session = DrawingSession::new(config, inference);
    info!("Window open. {HINT_TEXT}");

    /* ------------------------------ Main loop ------------------------------ */
    loop {
        /* 1) Input + finished inferences (strokes land on the canvas here) */
        if session.step(&mut drawer) == Control::Quit {
            break;
        }

        /* 2) Compose canvas + bars and present */
        session.render(&mut screen);
        if let Err(e) = drawer.present(&screen) {
            warn!("Present failed: {e}");
            return Err(e);
        }
    }

    info!("digit-sketch exited.");
    Ok(())
}
