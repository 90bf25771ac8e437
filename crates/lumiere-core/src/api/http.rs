use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{multipart, Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::models::*;
use super::{check_envelope, field, Backend};
use crate::error::{ClientError, ClientResult};

pub const AUTH_HEADER: &str = "X-Auth-Token";

pub struct HttpBackend {
    client: Client,
    base_url: String,
    ask_timeout: Option<Duration>,
    auth_token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            ask_timeout: None,
            auth_token: RwLock::new(None),
        }
    }

    /// Abort question requests that take longer than `timeout`.
    pub fn with_ask_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ask_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "backend request");
        self.authorized(self.client.request(method, url))
    }

    /// Request to a path holding backend ids. Each segment is percent-encoded
    /// so an id can't escape into another route.
    fn request_at(&self, method: Method, segments: &[&str]) -> ClientResult<RequestBuilder> {
        let url = self.url(segments)?;
        tracing::debug!(%method, %url, "backend request");
        Ok(self.authorized(self.client.request(method, url)))
    }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::validation(format!("invalid backend URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::validation(format!("invalid backend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth_token.read().as_deref() {
            Some(token) => builder.header(AUTH_HEADER, token),
            None => builder,
        }
    }

    async fn send_json(&self, builder: RequestBuilder) -> ClientResult<Value> {
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        let body: Value = response.json().await?;
        check_envelope(body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<T> {
        let body = self.send_json(self.request(Method::GET, path).query(query)).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn post(&self, path: &str, payload: &Value) -> ClientResult<Value> {
        self.send_json(self.request(Method::POST, path).json(payload)).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write() = token;
    }

    async fn ask(&self, request: &AskRequest) -> ClientResult<String> {
        let mut query = vec![
            ("q", request.question.as_str()),
            ("requester", request.requester.as_str()),
        ];
        if let Some(ctx) = request.ctx.as_deref() {
            query.push(("ctx", ctx));
        }

        let mut builder = self.request(Method::GET, request.mode.path()).query(&query);
        if let Some(timeout) = self.ask_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| match self.ask_timeout {
            Some(timeout) if e.is_timeout() => ClientError::Timeout(timeout),
            _ => ClientError::Transport(e),
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        let text = response.text().await.map_err(|e| match self.ask_timeout {
            Some(timeout) if e.is_timeout() => ClientError::Timeout(timeout),
            _ => ClientError::Transport(e),
        })?;
        Ok(text)
    }

    async fn rate(&self, request: &RateRequest) -> ClientResult<RateOutcome> {
        let body = self.post("/rate", &serde_json::to_value(request)?).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn new_session(&self, requester: &str) -> ClientResult<()> {
        self.post("/session/new", &json!({ "requester": requester })).await?;
        Ok(())
    }

    async fn translate(&self, request: &TranslateRequest) -> ClientResult<Translation> {
        let body = self.post("/translate/text", &serde_json::to_value(request)?).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn agent_stats(&self, requester: &str) -> ClientResult<Vec<AgentStat>> {
        self.get("/agent-stats", &[("requester", requester)]).await
    }

    async fn agent_memory(&self, specialty: &str, requester: &str) -> ClientResult<AgentMemory> {
        self.get("/agent-memory", &[("specialty", specialty), ("requester", requester)]).await
    }

    async fn memory_fact(&self, specialty: &str, requester: &str) -> ClientResult<String> {
        let body: Value = self
            .get("/memory-fact", &[("specialty", specialty), ("requester", requester)])
            .await?;
        field(&body, "fact")
    }

    async fn memory_items(&self, requester: &str) -> ClientResult<Vec<MemoryItem>> {
        let body: Value = self.get("/memory/items", &[("requester", requester)]).await?;
        field(&body, "items")
    }

    async fn create_memory_item(&self, requester: &str, text: &str, scope: &str) -> ClientResult<MemoryItem> {
        let body = self
            .post(
                "/memory/items",
                &json!({ "requester": requester, "text": text, "scope": scope, "source": "manual" }),
            )
            .await?;
        field(&body, "item")
    }

    async fn update_memory_item(&self, requester: &str, id: &str, text: &str) -> ClientResult<MemoryItem> {
        let builder = self
            .request_at(Method::PATCH, &["memory", "items", id])?
            .json(&json!({ "requester": requester, "text": text }));
        let body = self.send_json(builder).await?;
        field(&body, "item")
    }

    async fn delete_memory_item(&self, requester: &str, id: &str) -> ClientResult<()> {
        let builder = self
            .request_at(Method::DELETE, &["memory", "items", id])?
            .query(&[("requester", requester)]);
        self.send_json(builder).await?;
        Ok(())
    }

    async fn memory_scopes(&self, requester: &str) -> ClientResult<MemoryScopes> {
        self.get("/memory/scopes", &[("requester", requester)]).await
    }

    async fn set_memory_scopes(&self, requester: &str, scopes: &[String]) -> ClientResult<Vec<String>> {
        let body = self
            .post("/memory/scopes", &json!({ "requester": requester, "active_scopes": scopes }))
            .await?;
        field(&body, "active_scopes")
    }

    async fn reset_memory(&self, requester: &str, clear_reminders: bool) -> ClientResult<MemoryResetOutcome> {
        let body = self
            .post("/memory/reset", &json!({ "requester": requester, "clear_reminders": clear_reminders }))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn reminders(&self) -> ClientResult<Vec<Reminder>> {
        self.get("/reminders", &[]).await
    }

    async fn due_reminders(&self) -> ClientResult<Vec<Reminder>> {
        let due: DueReminders = self.get("/reminders/due", &[("channel", "browser")]).await?;
        Ok(due.items)
    }

    async fn add_reminder(&self, text: &str, requester: &str) -> ClientResult<Reminder> {
        let body = self
            .post("/reminders", &json!({ "text": text, "requester": requester }))
            .await?;
        field(&body, "item")
    }

    async fn toggle_reminder(&self, id: &str, requester: &str) -> ClientResult<Reminder> {
        let builder = self
            .request_at(Method::POST, &["reminders", id, "toggle"])?
            .query(&[("requester", requester)]);
        let body = self.send_json(builder).await?;
        field(&body, "item")
    }

    async fn delete_reminder(&self, id: &str) -> ClientResult<()> {
        let builder = self.request_at(Method::DELETE, &["reminders", id])?;
        self.send_json(builder).await?;
        Ok(())
    }

    async fn history_sessions(&self, requester: &str) -> ClientResult<Vec<HistorySessionSummary>> {
        let body: Value = self.get("/history/sessions", &[("requester", requester)]).await?;
        field(&body, "sessions")
    }

    async fn history_session(&self, id: &str, requester: &str) -> ClientResult<HistorySession> {
        let builder = self
            .request_at(Method::GET, &["history", "sessions", id])?
            .query(&[("requester", requester)]);
        let body = self.send_json(builder).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn save_history(&self, request: &SaveSessionRequest) -> ClientResult<String> {
        let body = self.post("/history/sessions", &serde_json::to_value(request)?).await?;
        field(&body, "id")
    }

    async fn delete_history(&self, id: &str, requester: &str) -> ClientResult<()> {
        let builder = self
            .request_at(Method::DELETE, &["history", "sessions", id])?
            .query(&[("requester", requester)]);
        self.send_json(builder).await?;
        Ok(())
    }

    async fn chain_action(&self, action: &ChainAction) -> ClientResult<()> {
        self.post(action.path(), &serde_json::to_value(action)?).await?;
        Ok(())
    }

    async fn marketplace(&self, requester: &str) -> ClientResult<MarketSnapshot> {
        self.get("/chain/marketplace", &[("requester", requester)]).await
    }

    async fn presence(&self, requester: &str) -> ClientResult<PresenceSnapshot> {
        self.get("/metaverse/state", &[("requester", requester)]).await
    }

    async fn travel(&self, requester: &str, zone: &str) -> ClientResult<PresenceSnapshot> {
        let body = self
            .post("/metaverse/travel", &json!({ "requester": requester, "zone": zone }))
            .await?;
        if body.get("status").and_then(Value::as_str) == Some("disabled") {
            return Ok(PresenceSnapshot {
                enabled: false,
                ..PresenceSnapshot::default()
            });
        }
        field(&body, "state")
    }

    async fn videos(&self, query: &str, specialty: &str) -> ClientResult<Vec<Video>> {
        let body: Value = self
            .get("/metaverse/videos", &[("q", query), ("specialty", specialty)])
            .await?;
        field(&body, "videos")
    }

    async fn login(&self, username: &str, password: &str) -> ClientResult<AuthSession> {
        let body = self
            .post("/auth/login", &json!({ "username": username, "password": password }))
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn register(&self, username: &str, password: &str) -> ClientResult<AuthUser> {
        let body = self
            .post("/auth/register", &json!({ "username": username, "password": password }))
            .await?;
        field(&body, "user")
    }

    async fn logout(&self) -> ClientResult<()> {
        self.post("/auth/logout", &json!({})).await?;
        Ok(())
    }

    async fn me(&self) -> ClientResult<AuthStatus> {
        self.get("/auth/me", &[]).await
    }

    async fn auth_mode(&self) -> ClientResult<AuthMode> {
        self.get("/auth/mode", &[]).await
    }

    async fn set_theme(&self, theme: &str) -> ClientResult<()> {
        self.post("/set-theme", &json!({ "theme": theme })).await?;
        Ok(())
    }

    async fn set_accent(&self, accent: &str) -> ClientResult<()> {
        self.post("/set-accent", &json!({ "accent": accent })).await?;
        Ok(())
    }

    async fn set_model(&self, model: &str) -> ClientResult<()> {
        self.post("/set-model", &json!({ "model": model })).await?;
        Ok(())
    }

    async fn upload_context(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<UploadedItem> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let body = self
            .send_json(self.request(Method::POST, "/upload-context").multipart(form))
            .await?;
        field(&body, "item")
    }

    async fn uploaded_context(&self) -> ClientResult<Vec<UploadedItem>> {
        self.get("/uploaded-context", &[]).await
    }

    async fn clear_uploaded_context(&self) -> ClientResult<()> {
        self.send_json(self.request(Method::DELETE, "/uploaded-context")).await?;
        Ok(())
    }

    async fn usage_log(&self) -> ClientResult<UsageLog> {
        self.get("/usage-log", &[]).await
    }

    async fn evaluation_report(&self, requester: &str) -> ClientResult<Value> {
        self.get("/evaluation/report", &[("requester", requester)]).await
    }

    async fn checkpoints(&self, requester: &str) -> ClientResult<CheckpointList> {
        self.get("/checkpoints/list", &[("requester", requester)]).await
    }

    async fn create_checkpoint(&self, requester: &str, notes: &str) -> ClientResult<Checkpoint> {
        let body = self
            .post("/checkpoints/create", &json!({ "requester": requester, "notes": notes }))
            .await?;
        field(&body, "checkpoint")
    }

    async fn promote_checkpoint(&self, requester: &str, id: &str) -> ClientResult<()> {
        let builder = self
            .request_at(Method::POST, &["checkpoints", id, "promote"])?
            .json(&json!({ "requester": requester }));
        self.send_json(builder).await?;
        Ok(())
    }

    async fn run_regression(&self, requester: &str) -> ClientResult<RegressionRun> {
        self.get("/quality/regression/run", &[("requester", requester)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/");
        assert_eq!(backend.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let backend = HttpBackend::new("http://127.0.0.1:9");
        let err = backend.agent_stats("local_user").await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err}");
    }

    #[test]
    fn test_id_segments_are_percent_encoded() {
        let backend = HttpBackend::new("http://localhost:8000");
        let url = backend.url(&["reminders", "a/b?c", "toggle"]).unwrap();
        assert_eq!(url.path(), "/reminders/a%2Fb%3Fc/toggle");
        assert_eq!(url.query(), None);

        let prefixed = HttpBackend::new("http://localhost:8000/api/");
        let url = prefixed.url(&["history", "sessions", "s-1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/history/sessions/s-1");
    }

    #[test]
    fn test_bad_base_url_is_validation_error() {
        let backend = HttpBackend::new("not a url");
        let err = backend.url(&["reminders", "r-1"]).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    fn slow_question() -> AskRequest {
        AskRequest {
            mode: AskMode::Ask,
            question: "Still there?".to_string(),
            requester: "local_user".to_string(),
            ctx: None,
            session: 0,
        }
    }

    #[tokio::test]
    async fn test_ask_timeout_aborts_request() {
        let backend = HttpBackend::new(&silent_server().await)
            .with_ask_timeout(Some(Duration::from_secs(1)));

        let err = backend.ask(&slow_question()).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(t) if t == Duration::from_secs(1)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_timed_out_question_can_be_retried() {
        use crate::{ChatRole, MemoryStore, PanelBoard, SilentNotifier, ViewController};
        use std::sync::Arc;

        let backend = HttpBackend::new(&silent_server().await)
            .with_ask_timeout(Some(Duration::from_secs(1)));
        let mut controller = ViewController::new(
            Arc::new(backend),
            Box::new(MemoryStore::new()),
            PanelBoard::new(),
            Arc::new(SilentNotifier),
            Some("local_user"),
        );

        controller.ask(AskMode::Live, "Still there?").await;

        let state = controller.state();
        let failed = state.last_failed.clone().expect("failure recorded");
        assert_eq!(failed.question, "Still there?");
        assert_eq!(failed.mode, AskMode::Live);
        assert!(!state.busy);
        let last = state.messages.last().expect("error message");
        assert_eq!(last.role, ChatRole::System);
        assert!(last.content_text.contains("timed out"), "{}", last.content_text);
    }
}
