//! Event callback endpoint.
//!
//! The platform both verifies endpoint ownership (`url_verification`) and
//! delivers events here. Once an event parses, the answer is always
//! `{code: 0}`: anything else makes the platform retry and eventually alert.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};

use crate::errors::AppError;
use crate::models::webhook::{EventEnvelope, RecordChangedBroadcast, WebhookReply, RECORD_CHANGED_EVENT};
use crate::AppState;

/// Decide what to do with one callback body.
pub async fn handle_webhook_event(state: &AppState, raw_body: &[u8]) -> Result<WebhookReply, AppError> {
    let envelope: EventEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::Validation(format!("webhook body must be a JSON object: {}", e)))?;

    if envelope.is_url_verification() {
        tracing::info!("webhook url verification challenge");
        return Ok(WebhookReply::Challenge {
            challenge: envelope.challenge.unwrap_or_default(),
        });
    }

    let event_type = envelope.event_type().unwrap_or_default();
    let event_id = envelope.event_id().unwrap_or_default();
    tracing::debug!(event_type, event_id, "webhook event received");

    if event_type == RECORD_CHANGED_EVENT {
        if let Some((table_id, actions)) = envelope.record_change() {
            if state.config.is_watched_table(table_id) {
                broadcast_record_change(state, table_id, actions).await;
            } else {
                tracing::debug!(table_id, "record change for unwatched table, ignoring");
            }
        }
    }

    Ok(WebhookReply::ack())
}

/// Push to the broadcaster. Failures are logged and swallowed.
async fn broadcast_record_change(state: &AppState, table_id: &str, actions: serde_json::Value) {
    let payload = RecordChangedBroadcast {
        table_id: table_id.to_string(),
        actions,
        timestamp: chrono::Utc::now().timestamp_millis(),
    };
    let data = match serde_json::to_value(&payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(table_id, error = %e, "failed to encode broadcast payload");
            return;
        }
    };

    let channel = &state.config.pusher_channel;
    let event = &state.config.pusher_event;
    match state.broadcaster.trigger(channel, event, &data).await {
        Ok(()) => tracing::info!(table_id, channel = %channel, "record change broadcast"),
        Err(e) => tracing::error!(table_id, error = %e, "broadcast failed"),
    }
}

/// POST /api/webhook
pub async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<WebhookReply>, AppError> {
    Ok(Json(handle_webhook_event(&state, &body).await?))
}
