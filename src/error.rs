use std::path::PathBuf;

/// A form submission that cannot become a complete trip record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("missing field {0}")]
    Missing(&'static str),
    #[error("{field}: {value:?} is not one of the allowed values")]
    NotInSet { field: &'static str, value: String },
    #[error("{field}: {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: u8,
        max: u8,
    },
}

/// Failure of one pass through encode -> scale -> predict.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    /// The encoder was never fitted on this value.
    #[error("unseen category {value:?} in column {column}")]
    UnseenCategory { column: String, value: String },
    /// Artifact version skew: a stage got a vector of the wrong width.
    #[error("{stage} expects {expected} features, got {got}")]
    ShapeMismatch {
        stage: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("classifier returned invalid probability {0}")]
    InvalidProbability(f64),
    #[error("classifier backend failed: {0}")]
    Backend(String),
}

impl PredictError {
    /// Only an unseen category can be fixed by changing the input.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, Self::UnseenCategory { .. })
    }
}

/// Startup failures while loading the encoder, scaler or classifier.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid {artifact}: {reason}")]
    Invalid {
        artifact: &'static str,
        reason: String,
    },
    #[error("{left} width {left_width} does not match {right} width {right_width}")]
    Incompatible {
        left: &'static str,
        left_width: usize,
        right: &'static str,
        right_width: usize,
    },
    #[error("unsupported classifier format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[cfg(feature = "torch")]
    #[error("torch: {0}")]
    Torch(#[from] tch::TchError),
}

impl ArtifactError {
    pub(crate) fn invalid(artifact: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            artifact,
            reason: reason.into(),
        }
    }
}
