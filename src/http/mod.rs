//! HTTP surface.
//!
//! One axum router serving the provider webhook, the latest-response
//! lookup, and the alarm control and observation endpoints:
//!
//! | Route | |
//! |---|---|
//! | `POST /webhook/sms` | inbound SMS, answers with TwiML |
//! | `GET /responses[?phone=]` | latest reply per sender |
//! | `POST /alarm/trigger` | start an episode |
//! | `POST /alarm/reset` | end the episode |
//! | `GET /alarm` | current snapshot |
//! | `GET /alarm/stream` | snapshot per state change (SSE) |

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AcklineError, ConfigError, EscalationError};
use crate::escalation::EscalationController;
use crate::event::{AcknowledgmentEvent, InboundSms, RecipientId};
use crate::observability::metrics;
use crate::store::Store;

/// Shared handler state.
pub struct AppState {
    /// The alarm state machine.
    pub controller: EscalationController,
    /// Where inbound replies are appended.
    pub store: Arc<dyn Store>,
    /// Text returned to the sender in the TwiML reply.
    pub reply_message: String,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("controller", &self.controller)
            .field("reply_message", &self.reply_message)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Server
// ============================================================================

/// Binds the listener and serves `router` until `cancel` fires.
///
/// Returns the server task and the bound address (useful when binding to
/// port 0 in tests).
///
/// # Errors
///
/// Returns [`AcklineError::Io`] if the address cannot be bound.
pub async fn serve(
    bind_addr: &str,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> Result<(JoinHandle<()>, SocketAddr), AcklineError> {
    let listener = TcpListener::bind(bind_addr).await?;
    let bound_addr = listener.local_addr()?;
    let app = router(state);

    let handle = tokio::spawn(async move {
        info!(%bound_addr, "HTTP server started");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await
            .ok();
        debug!("HTTP server shut down");
    });

    Ok((handle, bound_addr))
}

/// Builds the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook/sms", post(handle_inbound_sms))
        .route("/responses", get(handle_responses))
        .route("/alarm", get(handle_snapshot))
        .route("/alarm/trigger", post(handle_trigger))
        .route("/alarm/reset", post(handle_reset))
        .route("/alarm/stream", get(handle_stream))
        .with_state(state)
}

// ============================================================================
// Webhook
// ============================================================================

/// TwiML content type.
const TWIML_CONTENT_TYPE: &str = "text/xml";

async fn handle_inbound_sms(
    State(state): State<Arc<AppState>>,
    payload: Result<Form<InboundSms>, FormRejection>,
) -> Response {
    let Form(sms) = match payload {
        Ok(form) => form,
        Err(rejection) => {
            metrics::record_inbound("rejected");
            debug!(error = %rejection, "webhook payload rejected");
            return error_response(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    let event = match sms.into_event(Utc::now()) {
        Ok(event) => event,
        Err(e) => {
            metrics::record_inbound("rejected");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    debug!(
        recipient = %event.recipient_id(),
        acknowledgment = event.is_acknowledgment(),
        "inbound reply"
    );

    if let Err(e) = state.store.append_event(event).await {
        metrics::record_inbound("error");
        warn!(error = %e, "failed to store inbound reply");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to store reply");
    }
    metrics::record_inbound("stored");

    (
        [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)],
        twiml_reply(&state.reply_message),
    )
        .into_response()
}

/// Renders a TwiML `<Message>` reply.
#[must_use]
pub fn twiml_reply(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(message)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Latest responses
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResponsesQuery {
    phone: Option<String>,
}

/// Latest reply from one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    /// Sender address.
    pub phone: RecipientId,
    /// Normalized reply text.
    pub response: String,
    /// Reply text as received.
    pub original_message: String,
    /// Whether the reply acknowledges.
    pub is_acknowledged: bool,
    /// Server receive time.
    pub timestamp: DateTime<Utc>,
    /// Provider message id.
    pub message_sid: Option<String>,
}

impl From<&AcknowledgmentEvent> for ResponseEntry {
    fn from(event: &AcknowledgmentEvent) -> Self {
        Self {
            phone: event.recipient_id().clone(),
            response: event.normalized_text(),
            original_message: event.raw_text().to_string(),
            is_acknowledged: event.is_acknowledgment(),
            timestamp: event.created_at(),
            message_sid: event.message_sid().map(str::to_string),
        }
    }
}

async fn handle_responses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResponsesQuery>,
) -> Response {
    let latest = match state.store.latest_by_recipient().await {
        Ok(latest) => latest,
        Err(e) => {
            warn!(error = %e, "failed to read responses");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read responses");
        }
    };

    match query.phone {
        Some(phone) => {
            let phone = RecipientId::new(phone);
            let entry = latest
                .iter()
                .find(|e| e.recipient_id() == &phone)
                .map(ResponseEntry::from);
            Json(json!({ "phone": phone, "response": entry })).into_response()
        }
        None => {
            let entries: Vec<ResponseEntry> = latest.iter().map(ResponseEntry::from).collect();
            Json(json!({ "responses": entries })).into_response()
        }
    }
}

// ============================================================================
// Alarm control
// ============================================================================

async fn handle_snapshot(State(state): State<Arc<AppState>>) -> Response {
    Json(state.controller.snapshot()).into_response()
}

/// Dispatch runs on its own task so a disconnecting client cannot cut it
/// short before outcomes are recorded.
async fn handle_trigger(State(state): State<Arc<AppState>>) -> Response {
    let controller = state.controller.clone();
    let dispatch = tokio::spawn(async move { controller.trigger().await });
    match dispatch.await {
        Ok(Ok(report)) => Json(report).into_response(),
        Ok(Err(e @ EscalationError::AlreadyTriggered)) => {
            error_response(StatusCode::CONFLICT, &e.to_string())
        }
        Ok(Err(e)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        Err(e) => {
            warn!(error = %e, "trigger task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "trigger task failed")
        }
    }
}

async fn handle_reset(State(state): State<Arc<AppState>>) -> Response {
    let reset = state.controller.reset();
    Json(json!({ "reset": reset })).into_response()
}

async fn handle_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = WatchStream::new(state.controller.subscribe()).filter_map(|snapshot| {
        SseEvent::default()
            .event("snapshot")
            .json_data(&snapshot)
            .ok()
            .map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Normalizes a bind address.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if the result is not a socket
/// address.
pub fn parse_bind_addr(input: &str) -> Result<String, ConfigError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidValue {
            field: "server.bind".to_string(),
            value: input.to_string(),
            expected: format!("a socket address ({e})"),
        })?;
    Ok(addr)
}
