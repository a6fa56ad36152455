use std::path::Path;
use tch::{kind::Kind, CModule, Device, Tensor};

use crate::artifacts::Classifier;
use crate::error::{ArtifactError, PredictError};

/// TorchScript classifier. Accepts `[1, n]` float input and returns either
/// `[1, 2]` class probabilities or a single `[1, 1]` P(Breakdown).
pub struct TorchClassifier {
    model: CModule,
    device: Device,
    n_features: usize,
    positive_col: i64,
}

impl TorchClassifier {
    pub fn load(path: &Path, n_features: usize) -> Result<Self, ArtifactError> {
        let device = Device::Cpu;
        let model = CModule::load_on_device(path, device)?;

        // Output shape from a dummy forward
        let dummy = Tensor::zeros([1, n_features as i64], (Kind::Float, device));
        let t = model.forward_ts(&[dummy])?;
        let sz = t.size();
        let positive_col = positive_column(&sz)?;
        tracing::debug!(?sz, positive_col, "loaded TorchScript classifier");

        Ok(Self {
            model,
            device,
            n_features,
            positive_col,
        })
    }
}

/// Column of P(Breakdown) in a `[1, 2]` or `[1, 1]` output.
fn positive_column(sz: &[i64]) -> Result<i64, ArtifactError> {
    match sz {
        [1, 2] => Ok(1),
        [1, 1] => Ok(0),
        _ => Err(ArtifactError::invalid(
            "classifier",
            format!("unexpected TorchScript output size {sz:?}"),
        )),
    }
}

impl Classifier for TorchClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_probability(&self, x: &[f64]) -> Result<f64, PredictError> {
        if x.len() != self.n_features {
            return Err(PredictError::ShapeMismatch {
                stage: "classifier",
                expected: self.n_features,
                got: x.len(),
            });
        }
        let x32: Vec<f32> = x.iter().map(|v| *v as f32).collect();
        let input = Tensor::from_slice(&x32)
            .reshape([1, self.n_features as i64])
            .to_device(self.device);

        let out = self
            .model
            .forward_ts(&[input])
            .map_err(|e| PredictError::Backend(e.to_string()))?;
        out.f_double_value(&[0, self.positive_col])
            .map_err(|e| PredictError::Backend(e.to_string()))
    }
}
