use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::Identity;
use crate::errors::AppError;
use crate::models::envelope::{ok, ApiResult};
use crate::models::field::FieldPage;
use crate::models::message::{self, MessageKind, OutgoingMessage, DEFAULT_RECEIVE_ID_TYPE};
use crate::models::record::{BatchDeleted, DeletedRecord, RecordData, RecordPage, TableRef};
use crate::proxy::signature::{self, SignParameters};
use crate::AppState;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

#[derive(Deserialize)]
pub struct SignQuery {
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct TableQuery {
    pub base_id: Option<String>,
    pub table_id: Option<String>,
    pub page_size: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub base_id: Option<String>,
    pub table_id: Option<String>,
    pub record_id: Option<String>,
    pub fields: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub struct BatchDeleteRequest {
    pub base_id: Option<String>,
    pub table_id: Option<String>,
    pub records: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub receive_id: Option<String>,
    pub receive_id_type: Option<String>,
    pub msg_type: Option<String>,
    #[serde(default)]
    pub content: Value,
}

#[derive(Serialize)]
pub struct PusherPublicConfig {
    pub key: String,
    pub cluster: String,
}

// ── Input helpers ────────────────────────────────────────────

/// Empty strings count as absent, as they do for the browser client.
fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

fn table_ref(base_id: &Option<String>, table_id: &Option<String>, msg: &str) -> Result<TableRef, AppError> {
    match (present(base_id), present(table_id)) {
        (Some(b), Some(t)) => Ok(TableRef::new(b, t)),
        _ => Err(AppError::validation(msg)),
    }
}

/// Parse a JSON body; an empty body reads as `{}` so that missing-field
/// messages stay the same whether the body was absent or incomplete.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &body[..] };
    serde_json::from_slice(raw)
        .map_err(|e| AppError::Validation(format!("invalid request body: {}", e)))
}

fn parse_page_size(raw: &Option<String>) -> Result<u32, AppError> {
    match present(raw) {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(s) => match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AppError::Validation(format!(
                "page_size must be a positive integer, got '{}'",
                s
            ))),
        },
    }
}

// ── Auth ─────────────────────────────────────────────────────

/// GET /api/get_user_access_token?code=: exchange a login code for a user token
pub async fn get_user_access_token(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CodeQuery>,
) -> ApiResult<Value> {
    let code = present(&q.code).ok_or_else(|| AppError::validation("code is required"))?;

    let app_token = state.upstream.app_access_token(&state.config.messaging).await?;
    let user_token = state.upstream.user_access_token(&app_token, code).await?;
    tracing::info!("user access token issued");
    ok(user_token)
}

/// GET /api/get_sign_parameters?url=: JSAPI handshake signature for a page
pub async fn get_sign_parameters(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SignQuery>,
) -> ApiResult<SignParameters> {
    let url = signature::decode_page_url(q.url.as_deref().unwrap_or_default());
    tracing::debug!(url = %url, "computing JSAPI signature");

    let token = state.tenant_token(Identity::Messaging).await?;
    let ticket = state.upstream.jsapi_ticket(&token).await?;

    ok(signature::sign_parameters(
        &state.config.messaging.app_id,
        &ticket,
        &url,
        &state.config.noncestr,
        chrono::Utc::now().timestamp_millis(),
    ))
}

// ── Base records ─────────────────────────────────────────────

/// GET /api/base/records: one page of records
#[tracing::instrument(skip_all)]
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TableQuery>,
) -> ApiResult<RecordPage> {
    let table = table_ref(&q.base_id, &q.table_id, "base_id and table_id are required")?;
    let page_size = parse_page_size(&q.page_size)?;

    let token = state.tenant_token(Identity::Base).await?;
    let page = state
        .upstream
        .list_records(&token, &table, page_size, present(&q.page_token))
        .await?;
    ok(page)
}

/// GET /api/base/fields: table schema
pub async fn get_fields(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TableQuery>,
) -> ApiResult<FieldPage> {
    let table = table_ref(&q.base_id, &q.table_id, "base_id and table_id are required")?;

    let token = state.tenant_token(Identity::Base).await?;
    ok(state.upstream.list_fields(&token, &table).await?)
}

/// POST /api/base/record: create a record
#[tracing::instrument(skip_all)]
pub async fn create_record(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<RecordData> {
    let req: RecordRequest = parse_body(&body)?;
    let msg = "base_id, table_id, and fields are required";
    let table = table_ref(&req.base_id, &req.table_id, msg)?;
    let fields = req.fields.ok_or_else(|| AppError::validation(msg))?;

    let token = state.tenant_token(Identity::Base).await?;
    let created = state.upstream.create_record(&token, &table, &fields).await?;
    tracing::info!(table_id = %table.table_id, record_id = %created.record.record_id, "record created");
    ok(created)
}

/// PUT /api/base/record: patch the given fields of a record
#[tracing::instrument(skip_all)]
pub async fn update_record(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<RecordData> {
    let req: RecordRequest = parse_body(&body)?;
    let msg = "base_id, table_id, record_id, and fields are required";
    let table = table_ref(&req.base_id, &req.table_id, msg)?;
    let record_id = present(&req.record_id).ok_or_else(|| AppError::validation(msg))?;
    let fields = req.fields.as_ref().ok_or_else(|| AppError::validation(msg))?;

    let token = state.tenant_token(Identity::Base).await?;
    let updated = state
        .upstream
        .update_record(&token, &table, record_id, fields)
        .await?;
    tracing::info!(table_id = %table.table_id, record_id, "record updated");
    ok(updated)
}

/// DELETE /api/base/record: delete one record
#[tracing::instrument(skip_all)]
pub async fn delete_record(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<DeletedRecord> {
    let req: RecordRequest = parse_body(&body)?;
    let msg = "base_id, table_id, and record_id are required";
    let table = table_ref(&req.base_id, &req.table_id, msg)?;
    let record_id = present(&req.record_id).ok_or_else(|| AppError::validation(msg))?;

    let token = state.tenant_token(Identity::Base).await?;
    let deleted = state.upstream.delete_record(&token, &table, record_id).await?;
    tracing::info!(table_id = %table.table_id, record_id, "record deleted");
    ok(deleted)
}

/// POST /api/base/records/batch_delete: delete several records at once
#[tracing::instrument(skip_all)]
pub async fn batch_delete_records(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<BatchDeleted> {
    let req: BatchDeleteRequest = parse_body(&body)?;
    let msg = "base_id, table_id, and records array are required";
    let table = table_ref(&req.base_id, &req.table_id, msg)?;
    let records = req
        .records
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::validation(msg))?;

    let token = state.tenant_token(Identity::Base).await?;
    let result = state
        .upstream
        .batch_delete_records(&token, &table, &records)
        .await?;
    tracing::info!(table_id = %table.table_id, count = result.count, "records deleted");
    ok(result)
}

// ── Messaging & contacts ─────────────────────────────────────

/// POST /api/message/send: send a text or card message
#[tracing::instrument(skip_all)]
pub async fn send_message(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Value> {
    let req: SendMessageRequest = parse_body(&body)?;
    let msg = "receive_id, msg_type, and content are required";
    let (receive_id, msg_type) = match (present(&req.receive_id), present(&req.msg_type)) {
        (Some(r), Some(m)) if !message::content_is_empty(&req.content) => (r, m),
        _ => return Err(AppError::validation(msg)),
    };
    let receive_id_type = present(&req.receive_id_type).unwrap_or(DEFAULT_RECEIVE_ID_TYPE);

    // Format first: a broken card must never reach the network.
    let content = message::format_content(&MessageKind::parse(msg_type), &req.content)?;
    let outgoing = OutgoingMessage {
        receive_id: receive_id.to_string(),
        msg_type: msg_type.to_string(),
        content,
    };

    let token = state.tenant_token(Identity::Messaging).await?;
    let sent = state
        .upstream
        .send_message(&token, receive_id_type, &outgoing)
        .await?;
    tracing::info!(msg_type, receive_id_type, "message sent");
    ok(sent)
}

/// GET /api/org/users: users available as message recipients
pub async fn list_org_users(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let token = state.tenant_token(Identity::Messaging).await?;
    ok(state.upstream.list_org_users(&token).await?)
}

/// GET /api/pusher/config: public half of the broadcaster config
pub async fn pusher_config(State(state): State<Arc<AppState>>) -> ApiResult<PusherPublicConfig> {
    let pusher = state
        .config
        .pusher
        .as_ref()
        .ok_or_else(|| AppError::validation("broadcaster is not configured"))?;
    ok(PusherPublicConfig {
        key: pusher.key.clone(),
        cluster: pusher.cluster.clone(),
    })
}
