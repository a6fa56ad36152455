use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::PredictError;
use crate::form::FormInput;
use crate::model::{Model, Prediction};
use crate::render::{self, ResultView};
use crate::types::TripRecord;

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub mdl: Arc<Model>,
}

impl AppState {
    pub fn new(mdl: Model) -> Self {
        Self { mdl: Arc::new(mdl) }
    }
}

// ---------- Response types ----------

#[derive(serde::Serialize)]
pub struct Out {
    pub label: &'static str,
    pub probability: f64,
    pub confidence: f64,
    pub confidence_text: String,
    pub record: TripRecord,
}

type Failure = (StatusCode, String);

fn status_for(e: &PredictError) -> StatusCode {
    if e.is_user_recoverable() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// One full round trip: widgets -> record -> prediction.
fn evaluate(mdl: &Model, input: &FormInput) -> Result<(TripRecord, Prediction), Failure> {
    let record = input.to_record().map_err(|e| {
        tracing::warn!("rejected form: {e}");
        (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;
    let pred = mdl.predict(&record).map_err(|e| {
        tracing::warn!(route = record.route().as_str(), "prediction failed: {e}");
        (status_for(&e), e.to_string())
    })?;
    tracing::debug!(
        label = pred.outcome.label(),
        confidence = pred.confidence,
        "prediction"
    );
    Ok((record, pred))
}

// ---------- Handlers ----------

pub async fn index(State(state): State<AppState>) -> (StatusCode, Html<String>) {
    show(&state, &FormInput::default())
}

pub async fn submit(
    State(state): State<AppState>,
    Form(input): Form<FormInput>,
) -> (StatusCode, Html<String>) {
    show(&state, &input)
}

fn show(state: &AppState, input: &FormInput) -> (StatusCode, Html<String>) {
    match evaluate(&state.mdl, input) {
        Ok((_, pred)) => (
            StatusCode::OK,
            Html(render::page(input, Some(ResultView::Prediction(&pred)))),
        ),
        Err((status, msg)) => (
            status,
            Html(render::page(input, Some(ResultView::Error(&msg)))),
        ),
    }
}

pub async fn predict(
    State(state): State<AppState>,
    Json(input): Json<FormInput>,
) -> Result<Json<Out>, (StatusCode, Json<serde_json::Value>)> {
    let (record, pred) = evaluate(&state.mdl, &input)
        .map_err(|(status, msg)| (status, Json(json!({ "error": msg }))))?;
    Ok(Json(Out {
        label: pred.outcome.label(),
        probability: pred.probability,
        confidence: pred.confidence,
        confidence_text: pred.confidence_text(),
        record,
    }))
}

pub async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "n_features": state.mdl.n_features() }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/api/predict", post(predict))
        .route("/healthz", get(healthz))
        .with_state(state)
}
