use serde::Serialize;
use std::path::Path;

use crate::artifacts::{load_classifier, Classifier, Encoder, Scaler};
use crate::error::{ArtifactError, PredictError};
use crate::types::TripRecord;

/// Probabilities at or above this are called a breakdown.
pub const THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Breakdown,
    #[serde(rename = "Running Late")]
    RunningLate,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Breakdown => "Breakdown",
            Self::RunningLate => "Running Late",
        }
    }

    /// Label as shown on the page.
    pub fn badge(self) -> &'static str {
        match self {
            Self::Breakdown => "🚨 Breakdown",
            Self::RunningLate => "⏱️ Running Late",
        }
    }
}

/// Thresholded classifier output. `confidence` is the probability of the
/// chosen class and always lies in [0.5, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub outcome: Outcome,
    pub probability: f64,
    pub confidence: f64,
}

impl Prediction {
    pub fn from_probability(p: f64) -> Result<Self, PredictError> {
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(PredictError::InvalidProbability(p));
        }
        let (outcome, confidence) = if p >= THRESHOLD {
            (Outcome::Breakdown, p)
        } else {
            (Outcome::RunningLate, 1.0 - p)
        };
        Ok(Self {
            outcome,
            probability: p,
            confidence,
        })
    }

    /// Confidence as a percentage with one decimal, e.g. `73.0%`.
    pub fn confidence_text(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// The loaded artifact set: encoder -> scaler -> classifier. Immutable once
/// built, so one instance is shared by every request.
pub struct Model {
    encoder: Encoder,
    scaler: Scaler,
    classifier: Box<dyn Classifier>,
    trace: bool,
}

impl Model {
    /// Wires the three stages together, refusing any width disagreement.
    pub fn new(
        encoder: Encoder,
        scaler: Scaler,
        classifier: Box<dyn Classifier>,
    ) -> Result<Self, ArtifactError> {
        if encoder.width() != scaler.width() {
            return Err(ArtifactError::Incompatible {
                left: "encoder",
                left_width: encoder.width(),
                right: "scaler",
                right_width: scaler.width(),
            });
        }
        if classifier.n_features() != scaler.width() {
            return Err(ArtifactError::Incompatible {
                left: "classifier",
                left_width: classifier.n_features(),
                right: "scaler",
                right_width: scaler.width(),
            });
        }
        Ok(Self {
            encoder,
            scaler,
            classifier,
            trace: false,
        })
    }

    pub fn load(
        encoder_path: &Path,
        scaler_path: &Path,
        classifier_path: &Path,
    ) -> Result<Self, ArtifactError> {
        let encoder = Encoder::load(encoder_path)?;
        let scaler = Scaler::load(scaler_path)?;
        let classifier = load_classifier(classifier_path, scaler.width())?;
        Self::new(encoder, scaler, classifier)
    }

    /// Logs summary statistics of every scaled feature vector.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn n_features(&self) -> usize {
        self.scaler.width()
    }

    pub fn columns(&self) -> &[String] {
        self.encoder.columns()
    }

    /// P(Breakdown) for one record.
    pub fn predict_proba(&self, record: &TripRecord) -> Result<f64, PredictError> {
        let encoded = self.encoder.transform(record)?;
        let scaled = self.scaler.transform(&encoded)?;
        if self.trace {
            self.trace_features(&scaled);
        }
        self.classifier.predict_probability(&scaled)
    }

    pub fn predict(&self, record: &TripRecord) -> Result<Prediction, PredictError> {
        Prediction::from_probability(self.predict_proba(record)?)
    }

    fn trace_features(&self, vec: &[f64]) {
        let nz = vec.iter().filter(|x| **x != 0.0).count();
        let mean = if vec.is_empty() {
            0.0
        } else {
            vec.iter().sum::<f64>() / (vec.len() as f64)
        };
        let std = if vec.len() < 2 {
            0.0
        } else {
            (vec.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (vec.len() as f64)).sqrt()
        };
        let sample: Vec<String> = self
            .encoder
            .columns()
            .iter()
            .zip(vec)
            .take(6)
            .map(|(name, v)| format!("{name}={v:.3}"))
            .collect();
        tracing::info!(
            "features in_dim={} nonzero={} mean={:.3} std={:.3} sample=[{}]",
            vec.len(),
            nz,
            mean,
            std,
            sample.join(", ")
        );
    }
}
