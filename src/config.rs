//! Runtime configuration.
//!
//! Everything has a default matching the classic 280px canvas / 28×28 MNIST
//! grid, so the app runs without a config file. A JSON file passed with
//! `--config` overrides any subset of the fields.

use crate::error::Error;
use crate::preprocess::Geometry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub preprocess: PreprocessConfig,
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub window: WindowConfig,
    /// Where the S key writes the canvas PNG.
    pub snapshot_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            preprocess: PreprocessConfig::default(),
            model: ModelConfig::default(),
            inference: InferenceConfig::default(),
            window: WindowConfig::default(),
            snapshot_path: PathBuf::from("digit_sketch_snapshot.png"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Logical canvas side length in pixels.
    pub size: usize,
    /// Display pixels per logical canvas pixel.
    pub display_scale: f32,
    pub line_width: f32,
    pub stroke_color: [u8; 3],
    pub placeholder_color: [u8; 3],
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            size: 280,
            display_scale: 1.0,
            line_width: 28.0,
            stroke_color: [255, 255, 255],
            placeholder_color: [0xde, 0xde, 0xde],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub block_size: usize,
    pub grid_size: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { block_size: 10, grid_size: 28 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("digit_recognition_model.json") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Drop completions older than the newest one already shown.
    /// `false` applies every completion in arrival order.
    pub discard_stale: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { discard_stale: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub target_fps: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Digit Sketch".to_string(), target_fps: 60 }
    }
}

impl Config {
    /// Defaults when `path` is None, otherwise the file merged over defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let config = match path {
            None => Config::default(),
            Some(p) => {
                let text = fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("read {}: {e}", p.display())))?;
                Self::from_json(&text)?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Config(format!("parse: {e}")))
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            canvas_size: self.canvas.size,
            block_size: self.preprocess.block_size,
            grid_size: self.preprocess.grid_size,
        }
    }

    /// Side of the on-screen canvas square, in window pixels.
    pub fn canvas_extent(&self) -> usize {
        (self.canvas.size as f32 * self.canvas.display_scale).round() as usize
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.geometry().validate().map_err(|e| Error::Config(e.to_string()))?;
        if !(self.canvas.display_scale > 0.0) {
            return Err(Error::Config(format!(
                "display_scale must be positive, got {}",
                self.canvas.display_scale
            )));
        }
        if !(self.canvas.line_width > 0.0) {
            return Err(Error::Config(format!("line_width must be positive, got {}", self.canvas.line_width)));
        }
        Ok(())
    }
}
