// Ties the modules together: `train` fits and persists the artifacts from a
// historical CSV extraction, `serve` loads them and answers predictions.
use std::error::Error;
use std::path::{Path, PathBuf};

mod artifacts;
mod encoder;
mod error;
mod http;
mod io;
mod model;
mod schema;

use clap::{Parser, Subcommand};
use encoder::FeatureEncoder;
use model::BudgetModel;
use ndarray::Array2;
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use schema::{TripInput, CATEGORICAL_FEATURES, NUMERIC_FEATURES, TARGETS};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SPLIT_SEED: u64 = 42;
const TEST_FRACTION: f64 = 0.2;
const DEFAULT_PORT: u16 = 5001;
const MAX_PLOTTED_FEATURES: usize = 20;

#[derive(Parser)]
#[command(name = "trip-budget", about = "Trains and serves the trip budget prediction model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit the feature encoder and linear model from a historical CSV
    Train {
        /// Path to the training CSV (10 feature + 3 target columns)
        #[arg(default_value = "data/trips.csv")]
        data: PathBuf,
        /// Directory the fitted artifacts are written to
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        /// Skip rendering feature_importances.png
        #[arg(long)]
        no_plot: bool,
    },
    /// Serve predictions over HTTP from previously trained artifacts
    Serve {
        /// Directory the fitted artifacts are loaded from
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        /// Listen port; falls back to the PORT env var, then 5001
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train { data, artifacts, no_plot } => run_train(&data, &artifacts, no_plot),
        Command::Serve { artifacts, port } => run_serve(&artifacts, port).await,
    }
}

/// Full offline pipeline: load, clean, split, fit encoder then model, report
/// test metrics, persist both artifacts, draw the coefficient chart.
fn run_train(data: &Path, artifacts_dir: &Path, no_plot: bool) -> Result<(), Box<dyn Error>> {
    info!(path = %data.display(), "loading training data");
    let raw = io::load_csv(data)?;
    let (inputs, targets) = io::clean(&raw);
    if inputs.is_empty() {
        return Err("no usable rows after cleaning; check the input CSV".into());
    }
    info!(raw = raw.len(), cleaned = inputs.len(), "cleaned training data");

    // Reproducible 80/20 split, fixed seed.
    let mut indices: Vec<usize> = (0..inputs.len()).collect();
    let mut rng = StdRng::seed_from_u64(SPLIT_SEED);
    indices.shuffle(&mut rng);
    let test_len = (inputs.len() as f64 * TEST_FRACTION).ceil() as usize;
    let (test_idx, train_idx) = indices.split_at(test_len);

    let gather = |idx: &[usize]| -> (Vec<TripInput>, Array2<f64>) {
        let rows: Vec<TripInput> = idx.iter().map(|&i| inputs[i].clone()).collect();
        let mut y = Array2::zeros((idx.len(), TARGETS.len()));
        for (row, &i) in idx.iter().enumerate() {
            for (col, value) in targets[i].iter().enumerate() {
                y[(row, col)] = *value;
            }
        }
        (rows, y)
    };
    let (train_rows, y_train) = gather(train_idx);
    let (test_rows, y_test) = gather(test_idx);

    // Fit on the training split only; the encoder never sees test data.
    let encoder = FeatureEncoder::fit(&train_rows, &NUMERIC_FEATURES, &CATEGORICAL_FEATURES);
    let x_train = encoder.transform_batch(&train_rows);
    let x_test = encoder.transform_batch(&test_rows);
    info!(
        train = x_train.nrows(),
        test = x_test.nrows(),
        features = encoder.output_len(),
        "encoded feature matrices"
    );

    let target_names: Vec<&str> = TARGETS.to_vec();
    let model = BudgetModel::fit(&x_train, &y_train, &target_names)?;

    if x_test.nrows() > 1 {
        let report = model.evaluate(&x_test, &y_test)?;
        println!("\n--- Model Evaluation (Combined Targets) ---");
        println!("Mean Squared Error (MSE): {:.2}", report.mse);
        println!("R-squared (R2): {:.2}", report.r2);
        println!("\n--- Metrics Per Target ---");
        for target in &report.per_target {
            println!("  {}:", target.target);
            println!("    MSE: {:.2}", target.mse);
            println!("    R2: {:.2}", target.r2);
        }
    } else {
        warn!("test split too small to evaluate, skipping metrics");
    }

    artifacts::save(artifacts_dir, &encoder, &model)?;

    if !no_plot {
        let importances = feature_importances(&encoder, &model);
        plot_importances(&importances, "feature_importances.png")?;
        println!("Wrote feature_importances.png");
    }

    Ok(())
}

/// Mean absolute coefficient per encoded feature across the three targets,
/// largest first, capped so the chart stays readable.
fn feature_importances(encoder: &FeatureEncoder, model: &BudgetModel) -> Vec<(String, f64)> {
    let mut importances: Vec<(String, f64)> = encoder
        .feature_names()
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let mean_abs = (0..TARGETS.len())
                .map(|j| model.weights_for(j)[i].abs())
                .sum::<f64>()
                / TARGETS.len() as f64;
            (name, mean_abs)
        })
        .collect();
    importances.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    importances.truncate(MAX_PLOTTED_FEATURES);
    importances
}

/// Draws a horizontal bar chart of coefficient magnitudes, one bar per
/// encoded feature, labeled Y ticks.
fn plot_importances(results: &[(String, f64)], out_path: &str) -> Result<(), Box<dyn Error>> {
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    let values: Vec<f64> = results.iter().map(|(_, v)| *v).collect();
    let count = results.len();

    let max_value = values.iter().cloned().fold(0.0_f64, f64::max);
    let x_range = 0.0..(max_value * 1.1).max(1.0);

    let root = BitMapBackend::new(out_path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Mean |coefficient| per encoded feature", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(220)
        .build_cartesian_2d(x_range, 0..count)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(count)
        .y_label_formatter(&|idx| {
            let i = *idx;
            if i < count {
                names[i].to_string()
            } else {
                String::new()
            }
        })
        .x_desc("Mean |coefficient|")
        .y_desc("Encoded feature")
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, &value)| {
        Rectangle::new([(0.0, i), (value, i + 1)], BLUE.mix(0.5).filled())
    }))?;

    root.present()?;
    Ok(())
}

/// Loads the artifacts once and serves. On a load failure the server still
/// comes up, logs the cause, and answers every prediction with a 500.
async fn run_serve(artifacts_dir: &Path, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let artifacts = match artifacts::load(artifacts_dir) {
        Ok(loaded) => Some(std::sync::Arc::new(loaded)),
        Err(load_error) => {
            error!(error = %load_error, "artifacts failed to load; predictions will be refused");
            None
        }
    };

    let port = port
        .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(DEFAULT_PORT);

    http::serve(format!("0.0.0.0:{port}"), http::ApiState { artifacts }).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    const HEADER: &str = "# Adults,# Children & Babies,Trip Duration Category,Country,\
Theme Parks,Hidden Gems,Cultural Attractions,Beach or Pools,Sunset Spots,Nature Getaway,\
Hotel Budget in EUR,Food Budget in EUR,Activity Budget in EUR";

    fn write_training_csv(path: &Path) {
        let mut f = File::create(path).unwrap();
        writeln!(f, "{HEADER}").unwrap();
        let durations = ["Short", "Medium", "Long"];
        let countries = ["Spain", "France", "Italy", "Japan"];
        for i in 0..24usize {
            let adults = i % 4 + 1;
            let children = i % 3;
            writeln!(
                f,
                "{adults},{children},{},{},{},{},{},{},{},{},{},{},{}",
                durations[i % 3],
                countries[i % 4],
                i % 2,
                (i + 1) % 2,
                i % 2,
                (i / 2) % 2,
                0,
                1,
                300 * adults + 100 * children,
                90 * adults + 20,
                50 + 30 * (i % 2),
            )
            .unwrap();
        }
    }

    /// End to end: train from CSV, reload the artifacts, predict the sample
    /// trip. The encoded length must match the fitted feature count and the
    /// response must carry exactly three finite budgets.
    #[test]
    fn train_then_predict_round_trip() {
        let dir = std::env::temp_dir().join("trip_budget_train_e2e");
        std::fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("trips.csv");
        let artifacts_dir = dir.join("artifacts");
        write_training_csv(&csv_path);

        run_train(&csv_path, &artifacts_dir, true).unwrap();

        let loaded = artifacts::load(&artifacts_dir).unwrap();
        assert_eq!(loaded.encoder.output_len(), loaded.model.n_features());

        let sample = serde_json::json!({
            "# Adults": 2,
            "# Children & Babies": 1,
            "Trip Duration Category": "Short",
            "Country": "Spain",
            "Theme Parks": 1,
            "Hidden Gems": 0,
            "Cultural Attractions": 1,
            "Beach or Pools": 1,
            "Sunset Spots": 0,
            "Nature Getaway": 0
        });
        let input = TripInput::from_json(sample.as_object().unwrap()).unwrap();
        let encoded = loaded.encoder.transform(&input);
        assert_eq!(encoded.len(), loaded.encoder.output_len());

        let outputs = loaded.model.predict(&encoded).unwrap();
        assert_eq!(outputs.len(), TARGETS.len());
        assert!(outputs.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn importances_are_sorted_and_capped() {
        let dir = std::env::temp_dir().join("trip_budget_importances");
        std::fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("trips.csv");
        write_training_csv(&csv_path);

        let raw = io::load_csv(&csv_path).unwrap();
        let (inputs, targets) = io::clean(&raw);
        let encoder = FeatureEncoder::fit(&inputs, &NUMERIC_FEATURES, &CATEGORICAL_FEATURES);
        let x = encoder.transform_batch(&inputs);
        let mut y = Array2::zeros((targets.len(), TARGETS.len()));
        for (i, t) in targets.iter().enumerate() {
            for (j, v) in t.iter().enumerate() {
                y[(i, j)] = *v;
            }
        }
        let target_names: Vec<&str> = TARGETS.to_vec();
        let model = BudgetModel::fit(&x, &y, &target_names).unwrap();

        let importances = feature_importances(&encoder, &model);
        assert!(importances.len() <= MAX_PLOTTED_FEATURES);
        assert!(importances.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}
