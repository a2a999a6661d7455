// Persistence of the two fitted artifacts. Both are JSON files produced and
// consumed by this crate only; the layout is not a compatibility surface.
use std::fs;
use std::path::Path;

use tracing::info;

use crate::encoder::FeatureEncoder;
use crate::error::ArtifactError;
use crate::model::BudgetModel;
use crate::schema::NUM_TARGETS;

pub const ENCODER_FILE: &str = "encoder.json";
pub const MODEL_FILE: &str = "model.json";

/// The fitted encoder and model, loaded once and held read-only.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub encoder: FeatureEncoder,
    pub model: BudgetModel,
}

/// Writes both artifacts into `dir`, creating it if needed.
pub fn save(dir: &Path, encoder: &FeatureEncoder, model: &BudgetModel) -> Result<(), ArtifactError> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(ENCODER_FILE), serde_json::to_vec(encoder)?)?;
    fs::write(dir.join(MODEL_FILE), serde_json::to_vec(model)?)?;
    info!(dir = %dir.display(), "saved encoder and model artifacts");
    Ok(())
}

/// Loads both artifacts and cross-checks that the encoder's output length
/// matches the model's fitted feature count. A mismatch means the artifacts
/// come from different training runs and is fatal, not a per-request error.
pub fn load(dir: &Path) -> Result<Artifacts, ArtifactError> {
    let encoder_path = dir.join(ENCODER_FILE);
    let model_path = dir.join(MODEL_FILE);
    for path in [&encoder_path, &model_path] {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.clone()));
        }
    }

    let encoder: FeatureEncoder = serde_json::from_str(&fs::read_to_string(&encoder_path)?)?;
    let model: BudgetModel = serde_json::from_str(&fs::read_to_string(&model_path)?)?;

    if encoder.output_len() != model.n_features() {
        return Err(ArtifactError::FeatureCountMismatch {
            encoder: encoder.output_len(),
            model: model.n_features(),
        });
    }
    // The handler addresses all three outputs by position; a model with the
    // wrong target count must stay a startup error, not a request panic.
    if model.targets().len() != NUM_TARGETS {
        return Err(ArtifactError::TargetCountMismatch {
            expected: NUM_TARGETS,
            found: model.targets().len(),
        });
    }

    info!(
        dir = %dir.display(),
        features = encoder.output_len(),
        "loaded encoder and model artifacts"
    );
    Ok(Artifacts { encoder, model })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{TripInput, CATEGORICAL_FEATURES, NUMERIC_FEATURES, TARGETS};
    use ndarray::Array2;

    fn fixture() -> (FeatureEncoder, BudgetModel) {
        let rows = vec![
            TripInput {
                numeric: [2.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0],
                categorical: ["Short".into(), "Spain".into()],
            },
            TripInput {
                numeric: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0],
                categorical: ["Long".into(), "France".into()],
            },
        ];
        let encoder = FeatureEncoder::fit(&rows, &NUMERIC_FEATURES, &CATEGORICAL_FEATURES);
        let x = encoder.transform_batch(&rows);
        let y = Array2::from_shape_vec((2, 3), vec![500.0, 200.0, 150.0, 900.0, 350.0, 80.0]).unwrap();
        let targets: Vec<&str> = TARGETS.to_vec();
        let model = BudgetModel::fit(&x, &y, &targets).unwrap();
        (encoder, model)
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join("trip_budget_artifacts_roundtrip");
        let (encoder, model) = fixture();
        save(&dir, &encoder, &model).unwrap();
        let loaded = load(&dir).unwrap();
        assert_eq!(loaded.encoder.output_len(), encoder.output_len());
        assert_eq!(loaded.model.n_features(), model.n_features());
        assert_eq!(loaded.model.targets(), model.targets());
    }

    #[test]
    fn mismatched_feature_counts_fail_at_load() {
        let dir = std::env::temp_dir().join("trip_budget_artifacts_feature_mismatch");
        let (encoder, _) = fixture();
        // model fitted against a different column count than the encoder emits
        let x = Array2::from_shape_vec((2, 4), vec![1.0, 0.0, 2.0, 1.0, 0.0, 1.0, 3.0, 0.0]).unwrap();
        let y = Array2::from_shape_vec((2, 3), vec![500.0, 200.0, 150.0, 900.0, 350.0, 80.0]).unwrap();
        let targets: Vec<&str> = TARGETS.to_vec();
        let narrow_model = BudgetModel::fit(&x, &y, &targets).unwrap();

        save(&dir, &encoder, &narrow_model).unwrap();
        match load(&dir) {
            Err(ArtifactError::FeatureCountMismatch { encoder: e, model: m }) => {
                assert_eq!(e, encoder.output_len());
                assert_eq!(m, 4);
            }
            other => panic!("expected FeatureCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn wrong_target_count_fails_at_load() {
        let dir = std::env::temp_dir().join("trip_budget_artifacts_target_mismatch");
        let (encoder, _) = fixture();
        let rows = vec![
            TripInput {
                numeric: [2.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0],
                categorical: ["Short".into(), "Spain".into()],
            },
            TripInput {
                numeric: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0],
                categorical: ["Long".into(), "France".into()],
            },
        ];
        let x = encoder.transform_batch(&rows);
        let y = Array2::from_shape_vec((2, 2), vec![500.0, 200.0, 900.0, 350.0]).unwrap();
        let two_target_model = BudgetModel::fit(&x, &y, &["Hotel Budget in EUR", "Food Budget in EUR"]).unwrap();

        save(&dir, &encoder, &two_target_model).unwrap();
        match load(&dir) {
            Err(ArtifactError::TargetCountMismatch { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected TargetCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_artifact_is_reported_with_its_path() {
        let dir = std::env::temp_dir().join("trip_budget_artifacts_missing");
        let _ = std::fs::remove_dir_all(&dir);
        match load(&dir) {
            Err(ArtifactError::NotFound(path)) => {
                assert!(path.ends_with(ENCODER_FILE));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
