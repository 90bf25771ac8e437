//! Lumiere backend API
//!
//! [`Backend`] lists every endpoint the client consumes. [`HttpBackend`] is the
//! `reqwest` implementation; tests substitute an in-memory fake.

pub mod http;
pub mod models;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

pub use http::HttpBackend;
pub use models::*;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Attach (or drop) the token sent as `X-Auth-Token`.
    fn set_auth_token(&self, token: Option<String>);

    // Chat
    /// Returns the answer as an HTML fragment.
    async fn ask(&self, request: &AskRequest) -> ClientResult<String>;
    async fn rate(&self, request: &RateRequest) -> ClientResult<RateOutcome>;
    async fn new_session(&self, requester: &str) -> ClientResult<()>;
    async fn translate(&self, request: &TranslateRequest) -> ClientResult<Translation>;

    // Agents and memory
    async fn agent_stats(&self, requester: &str) -> ClientResult<Vec<AgentStat>>;
    async fn agent_memory(&self, specialty: &str, requester: &str) -> ClientResult<AgentMemory>;
    async fn memory_fact(&self, specialty: &str, requester: &str) -> ClientResult<String>;
    async fn memory_items(&self, requester: &str) -> ClientResult<Vec<MemoryItem>>;
    async fn create_memory_item(&self, requester: &str, text: &str, scope: &str) -> ClientResult<MemoryItem>;
    async fn update_memory_item(&self, requester: &str, id: &str, text: &str) -> ClientResult<MemoryItem>;
    async fn delete_memory_item(&self, requester: &str, id: &str) -> ClientResult<()>;
    async fn memory_scopes(&self, requester: &str) -> ClientResult<MemoryScopes>;
    async fn set_memory_scopes(&self, requester: &str, scopes: &[String]) -> ClientResult<Vec<String>>;
    async fn reset_memory(&self, requester: &str, clear_reminders: bool) -> ClientResult<MemoryResetOutcome>;

    // Reminders
    async fn reminders(&self) -> ClientResult<Vec<Reminder>>;
    async fn due_reminders(&self) -> ClientResult<Vec<Reminder>>;
    async fn add_reminder(&self, text: &str, requester: &str) -> ClientResult<Reminder>;
    async fn toggle_reminder(&self, id: &str, requester: &str) -> ClientResult<Reminder>;
    async fn delete_reminder(&self, id: &str) -> ClientResult<()>;

    // Saved chats
    async fn history_sessions(&self, requester: &str) -> ClientResult<Vec<HistorySessionSummary>>;
    async fn history_session(&self, id: &str, requester: &str) -> ClientResult<HistorySession>;
    /// Returns the id the backend stored the session under.
    async fn save_history(&self, request: &SaveSessionRequest) -> ClientResult<String>;
    async fn delete_history(&self, id: &str, requester: &str) -> ClientResult<()>;

    // Marketplace
    async fn chain_action(&self, action: &ChainAction) -> ClientResult<()>;
    async fn marketplace(&self, requester: &str) -> ClientResult<MarketSnapshot>;

    // Metaverse
    async fn presence(&self, requester: &str) -> ClientResult<PresenceSnapshot>;
    async fn travel(&self, requester: &str, zone: &str) -> ClientResult<PresenceSnapshot>;
    async fn videos(&self, query: &str, specialty: &str) -> ClientResult<Vec<Video>>;

    // Auth
    async fn login(&self, username: &str, password: &str) -> ClientResult<AuthSession>;
    async fn register(&self, username: &str, password: &str) -> ClientResult<AuthUser>;
    async fn logout(&self) -> ClientResult<()>;
    async fn me(&self) -> ClientResult<AuthStatus>;
    async fn auth_mode(&self) -> ClientResult<AuthMode>;

    // Preferences
    async fn set_theme(&self, theme: &str) -> ClientResult<()>;
    async fn set_accent(&self, accent: &str) -> ClientResult<()>;
    async fn set_model(&self, model: &str) -> ClientResult<()>;

    // Uploaded context
    async fn upload_context(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<UploadedItem>;
    async fn uploaded_context(&self) -> ClientResult<Vec<UploadedItem>>;
    async fn clear_uploaded_context(&self) -> ClientResult<()>;

    // Operational panels
    async fn usage_log(&self) -> ClientResult<UsageLog>;
    async fn evaluation_report(&self, requester: &str) -> ClientResult<Value>;
    async fn checkpoints(&self, requester: &str) -> ClientResult<CheckpointList>;
    async fn create_checkpoint(&self, requester: &str, notes: &str) -> ClientResult<Checkpoint>;
    async fn promote_checkpoint(&self, requester: &str, id: &str) -> ClientResult<()>;
    async fn run_regression(&self, requester: &str) -> ClientResult<RegressionRun>;
}

/// Reject bodies shaped `{"error": "..."}` whose status is absent or `"error"`.
pub(crate) fn check_envelope(body: Value) -> ClientResult<Value> {
    if let Some(obj) = body.as_object() {
        let status = obj.get("status").and_then(Value::as_str);
        if let Some(error) = obj.get("error").and_then(Value::as_str) {
            if status.is_none() || status == Some("error") {
                return Err(ClientError::Backend(error.to_string()));
            }
        }
        if status == Some("error") {
            return Err(ClientError::Backend("Request failed".to_string()));
        }
    }
    Ok(body)
}

/// Pull `field` out of a checked body and decode it.
pub(crate) fn field<T: serde::de::DeserializeOwned>(body: &Value, field: &str) -> ClientResult<T> {
    let value = body.get(field).cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_without_status_is_backend_error() {
        let err = check_envelope(json!({"error": "Not found"})).unwrap_err();
        assert!(matches!(err, ClientError::Backend(ref m) if m == "Not found"));
    }

    #[test]
    fn test_explicit_error_status() {
        assert!(check_envelope(json!({"status": "error"})).is_err());
        assert!(check_envelope(json!({"status": "error", "error": "bad"})).is_err());
    }

    #[test]
    fn test_ok_bodies_pass_through() {
        let body = json!({"status": "ok", "item": {"id": "a1"}});
        assert_eq!(check_envelope(body.clone()).unwrap(), body);
        assert!(check_envelope(json!([1, 2, 3])).is_ok());
        assert!(check_envelope(json!({"status": "ok", "error": null})).is_ok());
    }

    #[test]
    fn test_field_decodes_nested_value() {
        let body = json!({"id": "s-42"});
        let id: String = field(&body, "id").unwrap();
        assert_eq!(id, "s-42");
        assert!(field::<String>(&body, "missing").is_err());
    }
}
