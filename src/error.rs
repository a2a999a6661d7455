// Error taxonomy shared by the training and serving paths.
use std::path::PathBuf;

use thiserror::Error;

/// Rejections caused by the incoming record itself. These surface to the
/// caller as a 400 with the offending fields named.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Missing features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),
    #[error("Invalid numeric input detected: {}", .0.join(", "))]
    InvalidNumeric(Vec<String>),
}

/// Failures while persisting or loading the fitted artifacts. Fatal at
/// startup; the service keeps running but refuses predictions.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact file not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode artifact: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("encoder produces {encoder} features but the model was fitted with {model}")]
    FeatureCountMismatch { encoder: usize, model: usize },
    #[error("model predicts {found} targets, expected {expected}")]
    TargetCountMismatch { expected: usize, found: usize },
}

/// Failures in the fitted model itself: fitting, metric computation, or the
/// per-call invariant check. None of these are caller errors.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("least squares solve failed: {0}")]
    Solve(#[from] linfa_linalg::LinalgError),
    #[error("metric computation failed: {0}")]
    Metrics(#[from] linfa::Error),
    #[error("encoded vector has {got} features but the model was fitted with {expected}")]
    FeatureCountMismatch { got: usize, expected: usize },
}
