//! Fallback Gateway: HTTP publish and history for peers without a connection.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use framecast_core::constants::{API_KEY_HEADER, APP_ID_HEADER};
use framecast_core::{NotificationDraft, NotificationRecord};
use framecast_settings::AppPermission;
use serde::Serialize;
use tracing::warn;

use crate::auth::{KeyCheck, check_key};
use crate::broker::{Broker, PublishPath};
use crate::server::AppState;

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}

/// `(status, {"error": message})`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Check `X-API-Key` against the App Registration table.
///
/// Requests without a key, or with no table configured, pass.
#[allow(clippy::result_large_err)]
pub fn authorize(
    broker: &Broker,
    headers: &HeaderMap,
    permission: AppPermission,
) -> Result<(), Response> {
    match check_key(broker.app_registry(), header(headers, API_KEY_HEADER)) {
        KeyCheck::Unchecked => Ok(()),
        KeyCheck::Known(key) if key.allows(permission) => Ok(()),
        KeyCheck::Known(key) => {
            warn!(app = %key.name, ?permission, "app key lacks permission");
            Err(api_error(StatusCode::FORBIDDEN, "API key lacks permission"))
        }
        KeyCheck::Unknown => Err(api_error(StatusCode::UNAUTHORIZED, "Invalid API key")),
    }
}

/// `POST /notifications`
pub async fn create_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NotificationDraft>, JsonRejection>,
) -> Response {
    if let Err(denied) = authorize(&state.broker, &headers, AppPermission::Publish) {
        return denied;
    }
    let Json(draft) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "rejected notification body");
            return api_error(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let producer = header(&headers, APP_ID_HEADER);
    match publish(&state.broker, draft, producer) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(message) => api_error(StatusCode::BAD_REQUEST, message),
    }
}

fn publish(
    broker: &Arc<Broker>,
    draft: NotificationDraft,
    producer: Option<&str>,
) -> Result<NotificationRecord, String> {
    broker
        .publish(draft, producer, PublishPath::Http)
        .map_err(|e| {
            warn!(error = %e, "rejected notification");
            e.to_string()
        })
}

/// `GET /notifications`
pub async fn list_notifications(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&state.broker, &headers, AppPermission::Subscribe) {
        return denied;
    }
    Json(state.broker.list_history()).into_response()
}
