// One-hot feature encoding fitted at training time and replayed verbatim at
// serving time. The encoder is immutable after `fit`; serving never refits.
use std::collections::BTreeSet;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::schema::TripInput;

/// Fitted feature encoder: ordered numeric feature names, ordered categorical
/// feature names, and one sorted vocabulary per categorical feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    numeric_features: Vec<String>,
    categorical_features: Vec<String>,
    vocabularies: Vec<Vec<String>>,
}

impl FeatureEncoder {
    /// Fits vocabularies from training rows. Rows must already be projected
    /// into the order given by `numeric_features` / `categorical_features`.
    /// Vocabularies are sorted, so fitting is deterministic: the same data
    /// always yields the same category positions.
    pub fn fit(rows: &[TripInput], numeric_features: &[&str], categorical_features: &[&str]) -> Self {
        let vocabularies = (0..categorical_features.len())
            .map(|j| {
                let distinct: BTreeSet<&str> =
                    rows.iter().map(|row| row.categorical[j].as_str()).collect();
                distinct.into_iter().map(String::from).collect()
            })
            .collect();

        FeatureEncoder {
            numeric_features: numeric_features.iter().map(|s| s.to_string()).collect(),
            categorical_features: categorical_features.iter().map(|s| s.to_string()).collect(),
            vocabularies,
        }
    }

    /// Length of every encoded vector this encoder produces.
    pub fn output_len(&self) -> usize {
        self.numeric_features.len() + self.vocabularies.iter().map(Vec::len).sum::<usize>()
    }

    /// Encodes one row: numeric values in canonical order, then one one-hot
    /// block per categorical feature, each block ordered by its vocabulary.
    /// A category never seen at fit time leaves its whole block at zero.
    pub fn transform(&self, row: &TripInput) -> Array1<f64> {
        let mut out = Array1::zeros(self.output_len());
        for (i, value) in row.numeric.iter().enumerate() {
            out[i] = *value;
        }
        let mut offset = self.numeric_features.len();
        for (j, vocabulary) in self.vocabularies.iter().enumerate() {
            if let Ok(pos) = vocabulary.binary_search_by(|v| v.as_str().cmp(row.categorical[j].as_str())) {
                out[offset + pos] = 1.0;
            }
            offset += vocabulary.len();
        }
        out
    }

    /// Encodes a batch of rows into a design matrix, one row per record.
    pub fn transform_batch(&self, rows: &[TripInput]) -> Array2<f64> {
        let mut out = Array2::zeros((rows.len(), self.output_len()));
        for (i, row) in rows.iter().enumerate() {
            out.row_mut(i).assign(&self.transform(row));
        }
        out
    }

    /// Names of the encoded columns, one-hot columns as `feature=category`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric_features.clone();
        for (feature, vocabulary) in self.categorical_features.iter().zip(&self.vocabularies) {
            for category in vocabulary {
                names.push(format!("{feature}={category}"));
            }
        }
        names
    }
}
