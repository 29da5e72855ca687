//! Digit classifier behind a small load/run contract.
//!
//! [`InferenceEngine`] is what the inference worker drives. The bundled
//! implementation, [`DenseNetwork`], is a feed-forward network stored as JSON:
//!
//! ```json
//! {
//!   "output_name": "probabilities",
//!   "layers": [
//!     { "inputs": 784, "outputs": 10, "activation": "softmax",
//!       "weights": [/* outputs * inputs, row-major */], "biases": [/* outputs */] }
//!   ]
//! }
//! ```
//!
//! README.md has a complete example and an ONNX -> JSON conversion script.

use crate::display::CLASS_COUNT;
use crate::error::Error;
use crate::types::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Output name -> flat tensor data.
pub type OutputMap = BTreeMap<String, Vec<f32>>;

pub trait InferenceEngine: Send + 'static {
    /// Run the model on a batch of inputs.
    fn run(&mut self, inputs: &[FeatureVector]) -> Result<OutputMap, Error>;
}

/// First output of a run, like reading the first value of the map.
pub fn first_output(outputs: &OutputMap) -> Option<&[f32]> {
    outputs.values().next().map(Vec::as_slice)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Relu,
    Sigmoid,
    Softmax,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub activation: Activation,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

impl DenseLayer {
    /// y = act(W x + b), W is `outputs` rows of `inputs` columns.
    fn forward(&self, x: &[f32]) -> Vec<f32> {
        let mut y = vec![0.0f32; self.outputs];
        matmul(&mut y, x, &self.weights, self.outputs, self.inputs);
        for (v, b) in y.iter_mut().zip(&self.biases) {
            *v += b;
        }
        match self.activation {
            Activation::Identity => {}
            Activation::Relu => y.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Sigmoid => y.iter_mut().for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
            Activation::Softmax => softmax(&mut y),
        }
        y
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseNetwork {
    #[serde(default = "default_output_name")]
    pub output_name: String,
    pub layers: Vec<DenseLayer>,
}

fn default_output_name() -> String {
    "probabilities".to_string()
}

impl DenseNetwork {
    /// Read and validate a model file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::ModelLoad(format!(
                "read {}: {e} (see \"The model file\" in README.md to produce one)",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, Error> {
        let net: DenseNetwork =
            serde_json::from_str(text).map_err(|e| Error::ModelLoad(format!("parse: {e}")))?;
        net.validate()?;
        Ok(net)
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.inputs)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.layers.is_empty() {
            return Err(Error::ModelLoad("model has no layers".into()));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.inputs.checked_mul(layer.outputs) != Some(layer.weights.len()) {
                return Err(Error::ModelLoad(format!(
                    "layer {i}: {} weights for {}x{}",
                    layer.weights.len(),
                    layer.outputs,
                    layer.inputs
                )));
            }
            if layer.biases.len() != layer.outputs {
                return Err(Error::ModelLoad(format!(
                    "layer {i}: {} biases for {} outputs",
                    layer.biases.len(),
                    layer.outputs
                )));
            }
            if i > 0 && self.layers[i - 1].outputs != layer.inputs {
                return Err(Error::ModelLoad(format!(
                    "layer {i} takes {} inputs but layer {} gives {}",
                    layer.inputs,
                    i - 1,
                    self.layers[i - 1].outputs
                )));
            }
        }
        let classes = self.layers.last().map_or(0, |l| l.outputs);
        if classes != CLASS_COUNT {
            return Err(Error::ModelLoad(format!("model predicts {classes} classes, expected {CLASS_COUNT}")));
        }
        Ok(())
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.layers.iter().fold(input.to_vec(), |x, layer| layer.forward(&x))
    }
}

impl InferenceEngine for DenseNetwork {
    fn run(&mut self, inputs: &[FeatureVector]) -> Result<OutputMap, Error> {
        let mut data = Vec::with_capacity(inputs.len() * CLASS_COUNT);
        for input in inputs {
            if input.len() != self.input_size() {
                return Err(Error::Inference(format!(
                    "model takes {} inputs, got {}",
                    self.input_size(),
                    input.len()
                )));
            }
            data.extend(self.forward(input.as_slice()));
        }
        let mut outputs = OutputMap::new();
        outputs.insert(self.output_name.clone(), data);
        Ok(outputs)
    }
}

/// xout = W x, W is `n` rows of `d` columns (row-major).
fn matmul(xout: &mut [f32], x: &[f32], w: &[f32], n: usize, d: usize) {
    for i in 0..n {
        let row = &w[i * d..(i + 1) * d];
        xout[i] = row.iter().zip(x).map(|(a, b)| a * b).sum();
    }
}

/// In-place softmax (max-subtracted for stability).
fn softmax(x: &mut [f32]) {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in x.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in x.iter_mut() {
            *v /= sum;
        }
    }
}
