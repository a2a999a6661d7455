// HTTP surface: the prediction endpoint plus a static landing page. The
// fitted artifacts live behind `ApiState` and are only ever read.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::artifacts::Artifacts;
use crate::schema::TripInput;

/// Shared request-handler state. `artifacts` is `None` when loading failed at
/// startup; the service then stays up but refuses predictions.
#[derive(Clone)]
pub struct ApiState {
    pub artifacts: Option<Arc<Artifacts>>,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    predicted_budgets: PredictedBudgets,
}

/// Fixed key order for display; serde keeps the declaration order.
#[derive(Debug, Serialize)]
struct PredictedBudgets {
    #[serde(rename = "Hotel Budget in EUR")]
    hotel: f64,
    #[serde(rename = "Food Budget in EUR")]
    food: f64,
    #[serde(rename = "Activity Budget in EUR")]
    activity: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub async fn serve(addr: String, state: ApiState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);
    let addr: SocketAddr = addr.parse()?;
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// `POST /predict`: validate, encode with the fitted encoder, apply the
/// linear model, answer with the three named budgets. Schema problems are the
/// caller's fault (400, fields named); everything else is opaque (500, detail
/// in the logs only).
async fn predict(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let artifacts = match &state.artifacts {
        Some(artifacts) => artifacts,
        None => {
            return internal_error("Model or preprocessor not loaded. Check server logs.");
        }
    };

    let Json(payload) = match payload {
        Ok(json) => json,
        Err(rejection) => return bad_request(format!("Invalid JSON body: {rejection}")),
    };
    let data = match payload.as_object() {
        Some(map) => map,
        None => return bad_request("Expected a JSON object of trip features.".to_string()),
    };

    let input = match TripInput::from_json(data) {
        Ok(input) => input,
        Err(schema_error) => return bad_request(schema_error.to_string()),
    };

    let encoded = artifacts.encoder.transform(&input);
    let outputs = match artifacts.model.predict(&encoded) {
        Ok(outputs) => outputs,
        Err(model_error) => {
            error!(error = %model_error, "prediction failed");
            return internal_error("An error occurred during prediction.");
        }
    };

    info!(
        hotel = outputs[0],
        food = outputs[1],
        activity = outputs[2],
        "prediction served"
    );
    (
        StatusCode::OK,
        Json(PredictResponse {
            predicted_budgets: PredictedBudgets {
                hotel: outputs[0],
                food: outputs[1],
                activity: outputs[2],
            },
        }),
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message.to_string() }),
    )
        .into_response()
}
