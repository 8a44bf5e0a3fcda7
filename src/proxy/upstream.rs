/// HTTP client for the open platform.
///
/// Every call goes through `send_enveloped`, which turns the provider's
/// `{code, msg, data}` envelope into `Result<_, AppError>`. Token handling
/// lives in `TokenCache`; methods here take the bearer token as an argument.
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::cache::IssuedToken;
use crate::config::AppCredentials;
use crate::errors::AppError;
use crate::models::envelope::{ProviderEnvelope, TokenEnvelope};
use crate::models::field::FieldPage;
use crate::models::message::OutgoingMessage;
use crate::models::record::{BatchDeleted, DeletedRecord, RecordData, RecordPage, TableRef};

/// Page size used for schema reads; tables never have more columns than this.
pub const FIELDS_PAGE_SIZE: u32 = 100;
pub const ORG_USERS_PAGE_SIZE: u32 = 50;
/// Upper bound on per-user lookups in the contact-scope fallback.
pub const ORG_USERS_FALLBACK_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
struct TicketData {
    #[serde(default)]
    ticket: String,
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(16)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(token)
    }

    /// Send and unwrap the provider envelope. `op` names the operation in logs
    /// and is the fallback message when the provider gives none.
    async fn send_enveloped(&self, req: RequestBuilder, op: &str) -> Result<Option<Value>, AppError> {
        let resp = req.send().await.map_err(|e| {
            tracing::warn!(op, error = %e, "upstream request failed");
            AppError::from(e)
        })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| {
            tracing::warn!(op, error = %e, "failed to read upstream body");
            AppError::from(e)
        })?;

        // Non-2xx responses usually still carry the envelope; its msg wins.
        let envelope: ProviderEnvelope<Value> = serde_json::from_slice(&bytes).map_err(|_| {
            tracing::warn!(op, status = %status, "upstream body is not a provider envelope");
            AppError::Network(format!(
                "{}: upstream returned HTTP {} with an unreadable body",
                op,
                status.as_u16()
            ))
        })?;

        let code = envelope.code;
        envelope.into_result(op).inspect_err(|e| {
            tracing::warn!(op, code, status = %status, error = %e, "provider rejected request");
        })
    }

    async fn send_typed<T: DeserializeOwned>(&self, req: RequestBuilder, op: &str) -> Result<T, AppError> {
        let data = self.send_enveloped(req, op).await?.unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| {
            tracing::warn!(op, error = %e, "unexpected provider payload");
            AppError::Network(format!("{}: unexpected response from provider", op))
        })
    }

    // ── Auth ─────────────────────────────────────────────────

    async fn exchange(&self, path: &str, creds: &AppCredentials, op: &str) -> Result<TokenEnvelope, AppError> {
        let resp = self
            .client
            .post(self.url(path))
            .json(&json!({ "app_id": creds.app_id, "app_secret": creds.app_secret }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(op, app_id = %creds.app_id, error = %e, "token exchange request failed");
                AppError::from(e)
            })?;

        let status = resp.status();
        let envelope: TokenEnvelope = resp.json().await.map_err(|_| {
            AppError::Network(format!("{}: upstream returned HTTP {} with an unreadable body", op, status.as_u16()))
        })?;

        if envelope.code != 0 {
            tracing::warn!(op, app_id = %creds.app_id, code = envelope.code, msg = %envelope.msg, "token exchange rejected");
            let msg = if envelope.msg.is_empty() {
                format!("{} request error", op)
            } else {
                envelope.msg
            };
            return Err(AppError::TokenAcquisition(msg));
        }
        Ok(envelope)
    }

    /// Exchange an app ID/secret for a tenant access token.
    pub async fn tenant_access_token(&self, creds: &AppCredentials) -> Result<IssuedToken, AppError> {
        let env = self
            .exchange("auth/v3/tenant_access_token/internal", creds, "tenant_access_token")
            .await?;
        match env.tenant_access_token {
            Some(token) if !token.is_empty() => Ok(IssuedToken {
                token,
                expires_in: env.expire.unwrap_or(0),
            }),
            _ => Err(AppError::TokenAcquisition(
                "tenant_access_token missing from provider response".to_string(),
            )),
        }
    }

    pub async fn app_access_token(&self, creds: &AppCredentials) -> Result<String, AppError> {
        let env = self
            .exchange("auth/v3/app_access_token/internal", creds, "app_access_token")
            .await?;
        env.app_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::TokenAcquisition("app_access_token missing from provider response".to_string()))
    }

    /// Exchange a login pre-authorization code for the user's access token.
    pub async fn user_access_token(&self, app_token: &str, code: &str) -> Result<Value, AppError> {
        let req = self
            .request(Method::POST, "authen/v1/access_token", app_token)
            .json(&json!({ "grant_type": "authorization_code", "code": code }));
        Ok(self
            .send_enveloped(req, "access_token request error")
            .await?
            .unwrap_or(Value::Null))
    }

    /// Fetch a JSAPI ticket. Any failure, including a missing ticket, is a
    /// ticket error; transport failures stay network errors.
    pub async fn jsapi_ticket(&self, token: &str) -> Result<String, AppError> {
        let req = self
            .request(Method::POST, "jssdk/ticket/get", token)
            .json(&json!({}));
        let data: Option<TicketData> = match self.send_typed(req, "get jssdk ticket request error").await {
            Ok(d) => d,
            Err(AppError::Provider(msg)) => return Err(AppError::TicketAcquisition(msg)),
            Err(e) => return Err(e),
        };
        match data {
            Some(d) if !d.ticket.is_empty() => Ok(d.ticket),
            _ => Err(AppError::TicketAcquisition(
                "jsapi ticket missing from provider response".to_string(),
            )),
        }
    }

    // ── Base records ─────────────────────────────────────────

    pub async fn list_records(
        &self,
        token: &str,
        table: &TableRef,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<RecordPage, AppError> {
        let mut req = self
            .request(Method::GET, &table.path("records"), token)
            .query(&[("page_size", page_size.to_string())]);
        // The provider reads any page_token, even an empty one, as a continuation.
        if let Some(pt) = page_token.filter(|t| !t.is_empty()) {
            req = req.query(&[("page_token", pt)]);
        }
        self.send_typed(req, "Failed to fetch records").await
    }

    pub async fn list_fields(&self, token: &str, table: &TableRef) -> Result<FieldPage, AppError> {
        let req = self
            .request(Method::GET, &table.path("fields"), token)
            .query(&[("page_size", FIELDS_PAGE_SIZE.to_string())]);
        self.send_typed(req, "Failed to fetch fields").await
    }

    pub async fn create_record(
        &self,
        token: &str,
        table: &TableRef,
        fields: &Map<String, Value>,
    ) -> Result<RecordData, AppError> {
        let req = self
            .request(Method::POST, &table.path("records"), token)
            .json(&json!({ "fields": fields }));
        self.send_typed(req, "Failed to create record").await
    }

    /// Only the keys in `fields` are sent; the provider merges them into the row.
    pub async fn update_record(
        &self,
        token: &str,
        table: &TableRef,
        record_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<RecordData, AppError> {
        let path = table.path(&format!("records/{}", urlencoding::encode(record_id)));
        let req = self
            .request(Method::PUT, &path, token)
            .json(&json!({ "fields": fields }));
        self.send_typed(req, "Failed to update record").await
    }

    pub async fn delete_record(
        &self,
        token: &str,
        table: &TableRef,
        record_id: &str,
    ) -> Result<DeletedRecord, AppError> {
        let path = table.path(&format!("records/{}", urlencoding::encode(record_id)));
        let req = self.request(Method::DELETE, &path, token);
        self.send_enveloped(req, "Failed to delete record").await?;
        Ok(DeletedRecord {
            deleted: true,
            record_id: record_id.to_string(),
        })
    }

    pub async fn batch_delete_records(
        &self,
        token: &str,
        table: &TableRef,
        record_ids: &[String],
    ) -> Result<BatchDeleted, AppError> {
        if record_ids.is_empty() {
            return Err(AppError::validation("records must be a non-empty array"));
        }
        let req = self
            .request(Method::POST, &table.path("records/batch_delete"), token)
            .json(&json!({ "records": record_ids }));
        self.send_enveloped(req, "Failed to batch delete records").await?;
        Ok(BatchDeleted {
            deleted: true,
            count: record_ids.len(),
        })
    }

    // ── Messaging & contacts ─────────────────────────────────

    pub async fn send_message(
        &self,
        token: &str,
        receive_id_type: &str,
        message: &OutgoingMessage,
    ) -> Result<Value, AppError> {
        let req = self
            .request(Method::POST, "im/v1/messages", token)
            .query(&[("receive_id_type", receive_id_type)])
            .json(message);
        Ok(self
            .send_enveloped(req, "Failed to send message")
            .await?
            .unwrap_or(Value::Null))
    }

    /// Users of the root department, or, when the app lacks that scope, the
    /// users visible through the app's contact scope.
    pub async fn list_org_users(&self, token: &str) -> Result<Value, AppError> {
        let req = self
            .request(Method::GET, "contact/v3/users/find_by_department", token)
            .query(&[
                ("department_id", "0".to_string()),
                ("page_size", ORG_USERS_PAGE_SIZE.to_string()),
            ]);

        let primary_err = match self.send_enveloped(req, "Failed to get users. Check app scopes.").await {
            Ok(data) => return Ok(data.unwrap_or(Value::Null)),
            Err(AppError::Provider(msg)) => msg,
            Err(e) => return Err(e),
        };

        tracing::info!(reason = %primary_err, "find_by_department rejected, trying contact scopes");
        let req = self
            .request(Method::GET, "contact/v3/scopes", token)
            .query(&[
                ("page_size", ORG_USERS_PAGE_SIZE.to_string()),
                ("user_id_type", "open_id".to_string()),
            ]);
        let scopes = self
            .send_enveloped(req, "Failed to get contact scopes")
            .await
            .ok()
            .flatten()
            .unwrap_or(Value::Null);

        let user_ids: Vec<String> = scopes
            .get("user_ids")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .take(ORG_USERS_FALLBACK_LIMIT)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        if user_ids.is_empty() {
            return Err(AppError::Provider(primary_err));
        }

        let lookups = user_ids.iter().map(|id| self.get_user(token, id));
        let users: Vec<Value> = futures::future::join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .collect();

        Ok(json!({ "items": users }))
    }

    /// Single user by open_id; `None` on any failure.
    async fn get_user(&self, token: &str, open_id: &str) -> Option<Value> {
        let path = format!("contact/v3/users/{}", urlencoding::encode(open_id));
        let req = self
            .request(Method::GET, &path, token)
            .query(&[("user_id_type", "open_id")]);
        match self.send_enveloped(req, "Failed to get user").await {
            Ok(Some(data)) => data.get("user").cloned().filter(|u| !u.is_null()),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(open_id, error = %e, "user lookup failed, skipping");
                None
            }
        }
    }
}
