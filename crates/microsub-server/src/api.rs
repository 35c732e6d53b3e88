//! Thin HTTP glue for the two network entry points the ingestion engine
//! itself owns: the WebSub callback (C8) and the webmention receiver (C9).
//!
//! The rest of §6 -- the authenticated Microsub API surface, SSE events,
//! OPML export -- is routing and session plumbing external to the core and
//! is not reimplemented here (see spec "Out of scope").

use super::*;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Form, Router};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub processor: Processor,
    pub client: reqwest::Client,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let mount = state.config.microsub.mount_path.clone();
    Router::new()
        .route(&format!("{mount}/websub/{{feed_id}}"), get(websub_verify).post(websub_push))
        .route("/webmention", axum::routing::post(webmention_receive))
        .with_state(state)
}

#[derive(Deserialize)]
struct WebSubVerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.topic")]
    topic: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.lease_seconds")]
    lease_seconds: Option<i64>,
}

/// `GET /websub/{feedId}`: hub verification (§4.7 "Verify", §6).
async fn websub_verify(
    State(state): State<AppState>,
    Path(feed_id): Path<i64>,
    Query(q): Query<WebSubVerifyQuery>,
) -> Result<String, ApiError> {
    if q.mode != "subscribe" && q.mode != "unsubscribe" {
        return Err(ApiError::validation("unsupported hub.mode"));
    }
    let lease = q.lease_seconds.unwrap_or(state.config.microsub.websub_lease_seconds);
    verify_subscription(&state.db, feed_id, &q.topic, &q.challenge, lease).await.map_err(|err| match err {
        WebSubError::UnknownFeed => ApiError::NotFound("feed"),
        other => ApiError::validation(other.to_string()),
    })
}

/// `POST /websub/{feedId}`: content push (§4.7 "Receive"). The signature
/// check is the only thing allowed to block the response; once it passes,
/// acknowledge 200 immediately and hand the body to the Processor in the
/// background (§4.7, §5 "a WebSub push acknowledgment precedes background
/// processing").
async fn websub_push(
    State(state): State<AppState>,
    Path(feed_id): Path<i64>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, ApiError> {
    let feed = state.db.get_feed_by_id(feed_id).await?.ok_or(ApiError::NotFound("feed"))?;

    if let Some(secret) = &feed.websub.secret {
        let signature = headers
            .get("x-hub-signature-256")
            .or_else(|| headers.get("x-hub-signature"))
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Auth)?;
        verify_signature(secret, signature, &body).map_err(|_| ApiError::Auth)?;
    }

    let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body_str = String::from_utf8_lossy(&body).into_owned();
    let processor = state.processor.clone();
    tokio::spawn(async move {
        if let Err(err) = processor.process_push(&feed, &body_str, content_type.as_deref()).await {
            tracing::warn!(feed_id = feed.id, error = %err, "websub push processing failed");
        }
    });
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct WebmentionForm {
    source: String,
    target: String,
}

/// `POST /webmention`: accept and acknowledge immediately, verify in the
/// background (§4.8 "Receive").
async fn webmention_receive(State(state): State<AppState>, Form(form): Form<WebmentionForm>) -> Result<StatusCode, ApiError> {
    validate_request(&form.source, &form.target)?;
    let db = state.db.clone();
    let client = state.client.clone();
    tokio::spawn(async move {
        webmention::process(&client, &db, &form.source, &form.target).await;
    });
    Ok(StatusCode::ACCEPTED)
}
