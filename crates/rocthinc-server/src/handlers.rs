//! HTTP handlers for the webhook and license lookups.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use rocthinc_license::{LicenseError, LicenseStatus, LicenseStore};

use crate::export::{self, ExportFormat};
use crate::signature::{SIGNATURE_HEADER, verify};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LicenseStore>,
    pub webhook_secret: String,
    pub http: reqwest::Client,
}

/// Billing events this app reacts to. Everything else is acknowledged and
/// ignored so the provider's retry queue is not poisoned.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum BillingEvent {
    SubscriptionActivated { user_email: String, plan: Option<String> },
    SubscriptionExpired { user_email: String },
}

pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    // Signature first: an unauthenticated request must not touch the table.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let Some(signature) = signature else {
        tracing::warn!("webhook rejected: missing signature");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing signature" })));
    };
    if !verify(&state.webhook_secret, &body, signature) {
        tracing::warn!("webhook rejected: invalid signature");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid signature" })));
    }

    let event: BillingEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(_) => {
            // Authenticated but unknown or malformed: acknowledge, do nothing.
            tracing::debug!("webhook ignored: unrecognized event");
            return (StatusCode::OK, Json(json!({ "status": "ignored" })));
        }
    };

    let result = match &event {
        BillingEvent::SubscriptionActivated { user_email, plan } => {
            state.store.record(user_email, LicenseStatus::Active, plan.as_deref())
        }
        BillingEvent::SubscriptionExpired { user_email } => {
            state.store.record(user_email, LicenseStatus::Expired, None)
        }
    };

    match result {
        Ok(record) => {
            tracing::info!(email = %record.user_email, status = %record.status, "license updated");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "user_email": record.user_email,
                    "license_status": record.status,
                })),
            )
        }
        Err(LicenseError::Transition { email, from, to }) => {
            tracing::warn!(%email, %from, %to, "webhook rejected: forbidden transition");
            (
                StatusCode::CONFLICT,
                Json(json!({ "error": format!("cannot transition {from} -> {to}") })),
            )
        }
        Err(error) => {
            tracing::error!(%error, "license store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "storage failure" })),
            )
        }
    }
}

pub async fn get_license(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.store.get(&email) {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(json!({
                "user_email": record.user_email,
                "status": record.status,
                "plan": record.plan,
                "updated_at": record.updated_at,
            })),
        ),
        Ok(None) => (
            StatusCode::OK,
            Json(json!({ "user_email": email, "status": LicenseStatus::None, "plan": null })),
        ),
        Err(error) => {
            tracing::error!(%error, "license store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "storage failure" })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub url: String,
    pub formats: Option<Vec<ExportFormat>>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub url: String,
    pub formats: Option<String>,
}

pub async fn export_page(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Response {
    let formats = request
        .formats
        .unwrap_or_else(|| export::DEFAULT_FORMATS.to_vec());
    run_export(&state, &request.url, &formats).await
}

pub async fn export_page_query(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let formats = match &query.formats {
        Some(list) => export::parse_formats(list),
        None => export::DEFAULT_FORMATS.to_vec(),
    };
    run_export(&state, &query.url, &formats).await
}

async fn run_export(state: &AppState, url: &str, formats: &[ExportFormat]) -> Response {
    let html = match export::fetch_page(&state.http, url).await {
        Ok(html) => html,
        Err(error) => {
            tracing::warn!(%url, %error, "export fetch failed");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": error.to_string() })))
                .into_response();
        }
    };
    let page = export::extract_page(url, &html);
    match export::build_zip(&page, formats) {
        Ok(bytes) => {
            tracing::info!(%url, source = page.source, "page exported");
            (
                [
                    (header::CONTENT_TYPE, "application/zip"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"conversation_export.zip\"",
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!(%error, "export packaging failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "export packaging failed" })),
            )
                .into_response()
        }
    }
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })))
}
