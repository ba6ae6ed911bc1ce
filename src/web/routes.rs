use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::Router;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::constants::UPDATE_SENTIMENT_EVENT;
use crate::pipeline::Stage;
use crate::pubsub::PushEnvelope;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/analyze/posts", any(analyze_posts))
        .route("/api/analyze/entity", any(analyze_entity))
        .route("/api/analyze/sentiment", any(analyze_sentiment))
        .route("/api/pubsub/push", post(pubsub_push))
        .route("/healthz", get(health))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    filename: Option<String>,
}

async fn analyze_posts(
    State(state): State<AppState>,
    method: Method,
    params: Option<Query<AnalyzeParams>>,
) -> Response {
    start_stage(&state, Stage::Full, &method, params)
}

async fn analyze_entity(
    State(state): State<AppState>,
    method: Method,
    params: Option<Query<AnalyzeParams>>,
) -> Response {
    start_stage(&state, Stage::Entity, &method, params)
}

async fn analyze_sentiment(
    State(state): State<AppState>,
    method: Method,
    params: Option<Query<AnalyzeParams>>,
) -> Response {
    start_stage(&state, Stage::Sentiment, &method, params)
}

/// Validate the request and hand the file to a background stage.
///
/// The method is checked before the query; an unparseable query counts as a
/// missing filename.
fn start_stage(
    state: &AppState,
    stage: Stage,
    method: &Method,
    params: Option<Query<AnalyzeParams>>,
) -> Response {
    if method != Method::GET {
        return (StatusCode::BAD_REQUEST, "must be GET request").into_response();
    }

    // This file must live within the configured bucket prefix
    let Some(filename) = params
        .and_then(|Query(params)| params.filename)
        .filter(|f| !f.is_empty())
    else {
        return (StatusCode::BAD_REQUEST, "missing required input filename").into_response();
    };

    info!(stage = %stage, filename = %filename, "Analysis requested");
    let body = format!("analyzing \"{filename}\"");
    state.analyzer.spawn(stage, filename);

    (StatusCode::OK, body).into_response()
}

/// Pub/Sub push subscription endpoint chaining entity analysis into sentiment.
async fn pubsub_push(State(state): State<AppState>, body: Bytes) -> Response {
    let event = match PushEnvelope::decode_event(&body) {
        Ok(event) => event,
        Err(e) => {
            // Any non-2xx makes Pub/Sub redeliver, and a malformed message never gets better
            warn!("Dropping malformed push message: {e}");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    if event.event_type != UPDATE_SENTIMENT_EVENT {
        // Acknowledge so Pub/Sub does not redeliver events meant for someone else
        warn!(event_type = %event.event_type, "Ignoring unknown event type");
        return StatusCode::NO_CONTENT.into_response();
    }

    if event.payload.is_empty() {
        warn!("Dropping sentiment trigger with no filename");
        return StatusCode::NO_CONTENT.into_response();
    }

    info!(filename = %event.payload, "Sentiment stage triggered by pub/sub");
    state.analyzer.spawn(Stage::Sentiment, event.payload);

    StatusCode::NO_CONTENT.into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    let pubsub = if state.config.pubsub_enabled {
        "enabled"
    } else {
        "disabled"
    };
    (StatusCode::OK, format!("ok (pubsub {pubsub})")).into_response()
}
