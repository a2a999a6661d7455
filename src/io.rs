// CSV ingestion for training. Reads the historical trip extraction, skips
// rows it cannot make sense of, and cleans the survivors into canonical
// `TripInput` rows plus target vectors.
use std::error::Error;
use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use tracing::warn;

use crate::schema::{TripInput, NUM_TARGETS};

/// One row of the training CSV: the ten feature columns plus the three
/// budget targets. Everything is optional; cleaning decides what to do with
/// the gaps.
#[derive(Debug, Deserialize)]
pub struct TripCsvRecord {
    #[serde(rename = "# Adults")]
    pub adults: Option<f64>,
    #[serde(rename = "# Children & Babies")]
    pub children: Option<f64>,
    #[serde(rename = "Trip Duration Category")]
    pub trip_duration: Option<String>,
    #[serde(rename = "Country")]
    pub country: Option<String>,
    #[serde(rename = "Theme Parks")]
    pub theme_parks: Option<f64>,
    #[serde(rename = "Hidden Gems")]
    pub hidden_gems: Option<f64>,
    #[serde(rename = "Cultural Attractions")]
    pub cultural_attractions: Option<f64>,
    #[serde(rename = "Beach or Pools")]
    pub beach_or_pools: Option<f64>,
    #[serde(rename = "Sunset Spots")]
    pub sunset_spots: Option<f64>,
    #[serde(rename = "Nature Getaway")]
    pub nature_getaway: Option<f64>,
    #[serde(rename = "Hotel Budget in EUR")]
    pub hotel_budget: Option<f64>,
    #[serde(rename = "Food Budget in EUR")]
    pub food_budget: Option<f64>,
    #[serde(rename = "Activity Budget in EUR")]
    pub activity_budget: Option<f64>,
}

/// Loads the raw CSV. Blank lines, rows with the wrong field count, and rows
/// that fail to deserialize are skipped with a warning rather than aborting
/// the whole run.
pub fn load_csv(path: &Path) -> Result<Vec<TripCsvRecord>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .has_headers(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();
    let expected_len = headers.len();

    let mut out = Vec::new();
    for result in rdr.records() {
        let raw: StringRecord = result?;

        if raw.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if raw.len() != expected_len {
            warn!(
                line = raw.position().map(|p| p.line()).unwrap_or(0),
                expected = expected_len,
                found = raw.len(),
                "skipping row with wrong field count"
            );
            continue;
        }

        match raw.deserialize::<TripCsvRecord>(Some(&headers)) {
            Ok(rec) => out.push(rec),
            Err(e) => {
                warn!(
                    line = raw.position().map(|p| p.line()).unwrap_or(0),
                    error = %e,
                    "skipping malformed row"
                );
            }
        }
    }

    Ok(out)
}

/// Cleans raw CSV rows into canonical inputs and target rows. Rows missing
/// any target are dropped; missing numerics impute to 0, missing categoricals
/// to "Missing", and the interest flags collapse to exactly {0,1}. A literal
/// `NaN`/`inf` cell parses as a valid float, so non-finite values get the
/// same treatment as missing ones: targets drop the row, features impute
/// to 0. One poisoned cell would otherwise spread through the whole fit.
pub fn clean(records: &[TripCsvRecord]) -> (Vec<TripInput>, Vec<[f64; NUM_TARGETS]>) {
    let mut inputs = Vec::new();
    let mut targets = Vec::new();

    for r in records {
        let target = |v: Option<f64>| v.filter(|x| x.is_finite());
        let (hotel, food, activity) = match (
            target(r.hotel_budget),
            target(r.food_budget),
            target(r.activity_budget),
        ) {
            (Some(h), Some(f), Some(a)) => (h, f, a),
            _ => continue,
        };

        let numeric = |v: Option<f64>| v.filter(|x| x.is_finite()).unwrap_or(0.0);
        let flag = |v: Option<f64>| if numeric(v) != 0.0 { 1.0 } else { 0.0 };
        let category = |v: &Option<String>| match v {
            Some(s) if !s.trim().is_empty() => s.clone(),
            _ => "Missing".to_string(),
        };

        inputs.push(TripInput {
            numeric: [
                numeric(r.adults),
                numeric(r.children),
                flag(r.theme_parks),
                flag(r.hidden_gems),
                flag(r.cultural_attractions),
                flag(r.beach_or_pools),
                flag(r.sunset_spots),
                flag(r.nature_getaway),
            ],
            categorical: [category(&r.trip_duration), category(&r.country)],
        });
        targets.push([hotel, food, activity]);
    }

    (inputs, targets)
}
