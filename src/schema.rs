// Canonical feature schema plus validation of incoming records. Every record,
// whether it comes from the training CSV or a JSON request, is projected into
// this fixed order before it reaches the encoder.
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;

pub const NUM_NUMERIC: usize = 8;
pub const NUM_CATEGORICAL: usize = 2;
pub const NUM_TARGETS: usize = 3;

/// Numeric features in canonical order. The first two are counts, the rest
/// are boolean interest flags stored as 0/1.
pub const NUMERIC_FEATURES: [&str; NUM_NUMERIC] = [
    "# Adults",
    "# Children & Babies",
    "Theme Parks",
    "Hidden Gems",
    "Cultural Attractions",
    "Beach or Pools",
    "Sunset Spots",
    "Nature Getaway",
];

/// The six interest flags, normalized to exactly {0,1} before encoding.
pub const FLAG_FEATURES: [&str; 6] = [
    "Theme Parks",
    "Hidden Gems",
    "Cultural Attractions",
    "Beach or Pools",
    "Sunset Spots",
    "Nature Getaway",
];

pub const CATEGORICAL_FEATURES: [&str; NUM_CATEGORICAL] = ["Trip Duration Category", "Country"];

/// All ten required input features. Order here is the request-validation
/// order, not the encoded order; encoding uses the numeric/categorical lists.
pub const ALL_FEATURES: [&str; 10] = [
    "# Adults",
    "# Children & Babies",
    "Trip Duration Category",
    "Country",
    "Theme Parks",
    "Hidden Gems",
    "Cultural Attractions",
    "Beach or Pools",
    "Sunset Spots",
    "Nature Getaway",
];

pub const TARGETS: [&str; NUM_TARGETS] = [
    "Hotel Budget in EUR",
    "Food Budget in EUR",
    "Activity Budget in EUR",
];

/// A validated record projected into canonical feature order: numeric values
/// (flags already 0/1) followed by the two category strings.
#[derive(Debug, Clone, PartialEq)]
pub struct TripInput {
    pub numeric: [f64; NUM_NUMERIC],
    pub categorical: [String; NUM_CATEGORICAL],
}

impl TripInput {
    /// Validates and normalizes a raw JSON record. Missing keys and
    /// unparsable numerics are collected exhaustively so the caller sees
    /// every offending field at once, not just the first.
    pub fn from_json(data: &Map<String, Value>) -> Result<Self, SchemaError> {
        let missing: Vec<String> = ALL_FEATURES
            .iter()
            .filter(|name| !data.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingFeatures(missing));
        }

        let mut numeric = [0.0; NUM_NUMERIC];
        let mut invalid = Vec::new();
        for (i, name) in NUMERIC_FEATURES.iter().enumerate() {
            let value = &data[*name];
            if FLAG_FEATURES.contains(name) {
                numeric[i] = normalize_flag(name, value);
            } else {
                match parse_numeric(value) {
                    Some(v) => numeric[i] = v,
                    None => invalid.push(name.to_string()),
                }
            }
        }
        if !invalid.is_empty() {
            return Err(SchemaError::InvalidNumeric(invalid));
        }

        let mut categorical: [String; NUM_CATEGORICAL] = Default::default();
        for (i, name) in CATEGORICAL_FEATURES.iter().enumerate() {
            categorical[i] = categorical_value(&data[*name]);
        }

        Ok(TripInput { numeric, categorical })
    }
}

/// Parses a plain numeric feature. Accepts JSON numbers, numeric strings and
/// booleans; anything else, or a non-finite result, is invalid.
fn parse_numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Normalizes an interest flag to exactly 0.0 or 1.0. Unrecognized strings
/// silently fall back to 0 (kept for compatibility with the trained model);
/// the fallback is logged so the quirk is at least visible server-side.
pub fn normalize_flag(name: &str, value: &Value) -> f64 {
    match value {
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => {
            if n.as_f64().map(|v| v != 0.0).unwrap_or(false) {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => 1.0,
            "false" | "0" | "no" => 0.0,
            other => {
                warn!(feature = name, value = other, "unrecognized flag value, treating as 0");
                0.0
            }
        },
        other => {
            warn!(feature = name, ?other, "non-scalar flag value, treating as 0");
            0.0
        }
    }
}

/// Categorical features are expected as strings. Other scalars are rendered
/// to their string form (an unseen category simply encodes to a zero block);
/// null maps to the same "Missing" bucket the training imputation uses.
fn categorical_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "Missing".to_string(),
        other => other.to_string(),
    }
}
