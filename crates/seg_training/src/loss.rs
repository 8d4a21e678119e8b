//! LogitNorm cross-entropy.
//!
//! Logits are rescaled to unit L2 norm along the class dimension, divided
//! by a temperature and passed through softmax. The resulting probabilities
//! are then fed to a class-weighted cross-entropy, which applies its own
//! log-softmax; the double normalization is part of the loss definition.

use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Int, Tensor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Added to the L2 norm before dividing.
pub const LOGIT_NORM_EPSILON: f64 = 1e-7;

#[derive(Debug, Error)]
pub enum LossError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogitNormLossConfig {
    /// One weight per class.
    pub weights: Vec<f32>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_temperature() -> f64 {
    1.0
}

impl LogitNormLossConfig {
    pub fn new(weights: Vec<f32>) -> Self {
        Self {
            weights,
            temperature: default_temperature(),
        }
    }

    /// Unit weights for `num_classes` classes.
    pub fn uniform(num_classes: usize) -> Self {
        Self::new(vec![1.0; num_classes])
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<LogitNormLoss<B>, LossError> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(LossError::InvalidArgument(format!(
                "temperature must be finite and > 0, got {}",
                self.temperature
            )));
        }
        if self.weights.is_empty() {
            return Err(LossError::InvalidArgument(
                "class weight vector is empty".to_string(),
            ));
        }
        if let Some((class, w)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(LossError::InvalidArgument(format!(
                "weight for class {class} must be finite and >= 0, got {w}"
            )));
        }
        let cross_entropy = CrossEntropyLossConfig::new()
            .with_weights(Some(self.weights.clone()))
            .init(device);
        Ok(LogitNormLoss {
            cross_entropy,
            num_classes: self.weights.len(),
            temperature: self.temperature,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogitNormLoss<B: Backend> {
    cross_entropy: CrossEntropyLoss<B>,
    num_classes: usize,
    temperature: f64,
}

impl<B: Backend> LogitNormLoss<B> {
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Softmax of the L2-normalized, temperature-scaled logits.
    pub fn probabilities<const D: usize>(&self, output: Tensor<B, D>) -> Tensor<B, D> {
        let norms = output.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        let normalized = output / norms.add_scalar(LOGIT_NORM_EPSILON);
        softmax(normalized.div_scalar(self.temperature), 1)
    }

    /// Loss for `output` of shape `[batch, classes, ...]` against `target`
    /// class indices of shape `[batch, ...]`. Returns a one-element tensor.
    pub fn forward<const D: usize, const DT: usize>(
        &self,
        output: Tensor<B, D>,
        target: Tensor<B, DT, Int>,
    ) -> Result<Tensor<B, 1>, LossError> {
        let out_dims = output.dims();
        let target_dims = target.dims();
        tracing::debug!(output_shape = ?out_dims, target_shape = ?target_dims, "logit-norm loss");
        self.check_shapes(&out_dims, &target_dims)?;
        self.check_targets(&target)?;

        let probs = self.probabilities(output);

        // Move the class dimension last, then flatten every other dimension
        // so each row is one batch/spatial location.
        let mut axes = [0isize; D];
        for (i, axis) in axes.iter_mut().enumerate() {
            *axis = match i {
                0 => 0,
                i if i == D - 1 => 1,
                i => (i + 1) as isize,
            };
        }
        let locations: usize = target_dims.iter().product();
        let rows = probs.permute(axes).reshape([locations, self.num_classes]);
        let targets = target.reshape([locations]);
        Ok(self.cross_entropy.forward(rows, targets))
    }

    fn check_shapes(&self, out_dims: &[usize], target_dims: &[usize]) -> Result<(), LossError> {
        if out_dims.len() < 2 {
            return Err(LossError::InvalidArgument(format!(
                "output must have a class dimension, got shape {out_dims:?}"
            )));
        }
        if target_dims.len() + 1 != out_dims.len() {
            return Err(LossError::InvalidArgument(format!(
                "target rank {} does not match output rank {} minus the class dimension",
                target_dims.len(),
                out_dims.len()
            )));
        }
        if out_dims[1] != self.num_classes {
            return Err(LossError::InvalidArgument(format!(
                "output has {} classes but {} class weights were configured",
                out_dims[1], self.num_classes
            )));
        }
        let expected: Vec<usize> = out_dims
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, d)| *d)
            .collect();
        if expected != target_dims {
            return Err(LossError::InvalidArgument(format!(
                "target shape {target_dims:?} does not match output shape {out_dims:?}"
            )));
        }
        if expected.iter().product::<usize>() == 0 {
            return Err(LossError::InvalidArgument(
                "cannot compute loss over an empty batch".to_string(),
            ));
        }
        Ok(())
    }

    fn check_targets<const DT: usize>(&self, target: &Tensor<B, DT, Int>) -> Result<(), LossError> {
        let min: i64 = target.clone().min().into_scalar().elem();
        let max: i64 = target.clone().max().into_scalar().elem();
        if min < 0 || max >= self.num_classes as i64 {
            return Err(LossError::InvalidArgument(format!(
                "target class indices must lie in [0, {}), got range [{min}, {max}]",
                self.num_classes
            )));
        }
        Ok(())
    }
}
