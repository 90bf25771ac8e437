#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use lumiere_core::api::*;
use lumiere_core::{ClientError, ClientResult, MemoryStore, Notifier, PanelBoard, ViewController};

/// In-memory backend. Every call is recorded by name; any name passed to
/// [`FakeBackend::fail`] returns a backend error until recovered.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    stats_delay: Mutex<Option<Duration>>,

    pub token: Mutex<Option<String>>,
    pub answer: Mutex<String>,
    pub asked: Mutex<Vec<AskRequest>>,
    pub rated: Mutex<Vec<RateRequest>>,
    pub stats: Mutex<Vec<AgentStat>>,
    pub reminders: Mutex<Vec<Reminder>>,
    pub due: Mutex<Vec<Reminder>>,
    pub saved: Mutex<Vec<SaveSessionRequest>>,
    pub sessions: Mutex<Vec<HistorySession>>,
    pub memory: Mutex<Vec<MemoryItem>>,
    pub presence_enabled: Mutex<bool>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        *backend.answer.lock() = answer_html("Kofi", "finance", "m-1", "Budget first.");
        *backend.presence_enabled.lock() = true;
        backend
    }

    pub fn with_stats(self, stats: Vec<AgentStat>) -> Self {
        *self.stats.lock() = stats;
        self
    }

    pub fn with_stats_delay(self, delay: Duration) -> Self {
        *self.stats_delay.lock() = Some(delay);
        self
    }

    pub fn fail(&self, call: &str) {
        self.failing.lock().insert(call.to_string());
    }

    pub fn recover(&self, call: &str) {
        self.failing.lock().remove(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c == call)
    }

    fn record(&self, call: &str) -> ClientResult<()> {
        self.calls.lock().push(call.to_string());
        if self.failing.lock().contains(call) {
            return Err(ClientError::Backend(format!("{call} failed")));
        }
        Ok(())
    }

    fn id(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub fn answer_html(name: &str, specialty: &str, message_id: &str, body: &str) -> String {
    format!(
        r#"<p>{body}</p><div class="thumbs-rating"><button data-message-id="{message_id}">👍</button></div><small class="answer-meta" data-agent="{specialty}" data-level="2">Answered by: {name} ({specialty} · Level 2)</small>"#
    )
}

pub fn stat(name: &str, specialty: &str) -> AgentStat {
    AgentStat {
        name: name.to_string(),
        specialty: specialty.to_string(),
        category: "general".to_string(),
        accuracy: 80.0,
        level: 2,
        token: None,
    }
}

pub fn reminder(id: &str, text: &str) -> Reminder {
    Reminder {
        id: id.to_string(),
        text: text.to_string(),
        done: false,
        due_at: Some("2026-01-01T09:00:00".to_string()),
        created_at: None,
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn set_auth_token(&self, token: Option<String>) {
        *self.token.lock() = token;
    }

    async fn ask(&self, request: &AskRequest) -> ClientResult<String> {
        self.asked.lock().push(request.clone());
        self.record("ask")?;
        Ok(self.answer.lock().clone())
    }

    async fn rate(&self, request: &RateRequest) -> ClientResult<RateOutcome> {
        self.rated.lock().push(request.clone());
        self.record("rate")?;
        Ok(RateOutcome::default())
    }

    async fn new_session(&self, _requester: &str) -> ClientResult<()> {
        self.record("new_session")
    }

    async fn translate(&self, request: &TranslateRequest) -> ClientResult<Translation> {
        self.record("translate")?;
        Ok(Translation {
            translated_text: format!("[{}] {}", request.target_lang, request.text),
            provider: "fake".to_string(),
            target_lang: request.target_lang.clone(),
            warning: None,
        })
    }

    async fn agent_stats(&self, _requester: &str) -> ClientResult<Vec<AgentStat>> {
        self.record("agent_stats")?;
        let delay = *self.stats_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.stats.lock().clone())
    }

    async fn agent_memory(&self, specialty: &str, _requester: &str) -> ClientResult<AgentMemory> {
        self.record("agent_memory")?;
        Ok(AgentMemory {
            specialty: specialty.to_string(),
            name: specialty.to_string(),
            level: Some(1),
            history: Vec::new(),
            facts: vec![format!("{specialty} fact")],
        })
    }

    async fn memory_fact(&self, specialty: &str, _requester: &str) -> ClientResult<String> {
        self.record("memory_fact")?;
        Ok(format!("A {specialty} fact"))
    }

    async fn memory_items(&self, _requester: &str) -> ClientResult<Vec<MemoryItem>> {
        self.record("memory_items")?;
        Ok(self.memory.lock().clone())
    }

    async fn create_memory_item(&self, _requester: &str, text: &str, scope: &str) -> ClientResult<MemoryItem> {
        self.record("create_memory_item")?;
        let item = MemoryItem {
            id: self.id("mem-"),
            text: text.to_string(),
            scope: scope.to_string(),
            confidence: 1.0,
        };
        self.memory.lock().push(item.clone());
        Ok(item)
    }

    async fn update_memory_item(&self, _requester: &str, id: &str, text: &str) -> ClientResult<MemoryItem> {
        self.record("update_memory_item")?;
        let mut memory = self.memory.lock();
        let item = memory
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ClientError::Backend("Not found".to_string()))?;
        item.text = text.to_string();
        Ok(item.clone())
    }

    async fn delete_memory_item(&self, _requester: &str, id: &str) -> ClientResult<()> {
        self.record("delete_memory_item")?;
        self.memory.lock().retain(|i| i.id != id);
        Ok(())
    }

    async fn memory_scopes(&self, _requester: &str) -> ClientResult<MemoryScopes> {
        self.record("memory_scopes")?;
        Ok(MemoryScopes {
            active_scopes: vec!["personal".to_string()],
            available_scopes: vec!["personal".to_string(), "work".to_string()],
        })
    }

    async fn set_memory_scopes(&self, _requester: &str, scopes: &[String]) -> ClientResult<Vec<String>> {
        self.record("set_memory_scopes")?;
        Ok(scopes.to_vec())
    }

    async fn reset_memory(&self, _requester: &str, clear_reminders: bool) -> ClientResult<MemoryResetOutcome> {
        self.record("reset_memory")?;
        self.memory.lock().clear();
        let mut removed = 0;
        if clear_reminders {
            let mut reminders = self.reminders.lock();
            removed = reminders.len();
            reminders.clear();
        }
        Ok(MemoryResetOutcome {
            reminders_removed: removed,
        })
    }

    async fn reminders(&self) -> ClientResult<Vec<Reminder>> {
        self.record("reminders")?;
        Ok(self.reminders.lock().clone())
    }

    async fn due_reminders(&self) -> ClientResult<Vec<Reminder>> {
        self.record("due_reminders")?;
        Ok(self.due.lock().clone())
    }

    async fn add_reminder(&self, text: &str, _requester: &str) -> ClientResult<Reminder> {
        self.record("add_reminder")?;
        let created = Reminder {
            id: self.id("r"),
            text: text.to_string(),
            done: false,
            due_at: None,
            created_at: Some("2026-10-15T09:00:00".to_string()),
        };
        self.reminders.lock().push(created.clone());
        Ok(created)
    }

    async fn toggle_reminder(&self, id: &str, _requester: &str) -> ClientResult<Reminder> {
        self.record("toggle_reminder")?;
        let mut reminders = self.reminders.lock();
        let item = reminders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ClientError::Backend("Not found".to_string()))?;
        item.done = !item.done;
        Ok(item.clone())
    }

    async fn delete_reminder(&self, id: &str) -> ClientResult<()> {
        self.record("delete_reminder")?;
        self.reminders.lock().retain(|r| r.id != id);
        Ok(())
    }

    async fn history_sessions(&self, _requester: &str) -> ClientResult<Vec<HistorySessionSummary>> {
        self.record("history_sessions")?;
        Ok(self
            .sessions
            .lock()
            .iter()
            .map(|s| HistorySessionSummary {
                id: s.id.clone(),
                title: s.title.clone(),
                created_at: s.created_at.clone(),
                updated_at: s.updated_at.clone(),
                message_count: s.messages.len(),
            })
            .collect())
    }

    async fn history_session(&self, id: &str, _requester: &str) -> ClientResult<HistorySession> {
        self.record("history_session")?;
        self.sessions
            .lock()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| ClientError::Backend("Session not found".to_string()))
    }

    async fn save_history(&self, request: &SaveSessionRequest) -> ClientResult<String> {
        self.record("save_history")?;
        let id = self.id("s-");
        self.saved.lock().push(request.clone());
        self.sessions.lock().push(HistorySession {
            id: id.clone(),
            title: request.title.clone(),
            created_at: None,
            updated_at: None,
            messages: request.messages.clone(),
        });
        Ok(id)
    }

    async fn delete_history(&self, id: &str, _requester: &str) -> ClientResult<()> {
        self.record("delete_history")?;
        self.sessions.lock().retain(|s| s.id != id);
        Ok(())
    }

    async fn chain_action(&self, action: &ChainAction) -> ClientResult<()> {
        self.record(action.path())
    }

    async fn marketplace(&self, _requester: &str) -> ClientResult<MarketSnapshot> {
        self.record("marketplace")?;
        Ok(MarketSnapshot {
            network: Some("simulated".to_string()),
            listed: Vec::new(),
            recent_events: Vec::new(),
        })
    }

    async fn presence(&self, _requester: &str) -> ClientResult<PresenceSnapshot> {
        self.record("presence")?;
        Ok(PresenceSnapshot {
            enabled: *self.presence_enabled.lock(),
            ..PresenceSnapshot::default()
        })
    }

    async fn travel(&self, requester: &str, zone: &str) -> ClientResult<PresenceSnapshot> {
        self.record("travel")?;
        let enabled = *self.presence_enabled.lock();
        Ok(PresenceSnapshot {
            enabled,
            me: enabled.then(|| Presence {
                display_name: requester.to_string(),
                zone: zone.to_string(),
                ..Presence::default()
            }),
            ..PresenceSnapshot::default()
        })
    }

    async fn videos(&self, query: &str, _specialty: &str) -> ClientResult<Vec<Video>> {
        self.record("videos")?;
        Ok(vec![Video {
            title: format!("About {query}"),
            ..Video::default()
        }])
    }

    async fn login(&self, username: &str, password: &str) -> ClientResult<AuthSession> {
        self.record("login")?;
        if password != "secret" {
            return Err(ClientError::Backend("Invalid credentials".to_string()));
        }
        Ok(AuthSession {
            token: format!("tok-{username}"),
            expires_at: None,
            user: AuthUser {
                username: username.to_string(),
                role: "user".to_string(),
                tenant_id: "default".to_string(),
            },
        })
    }

    async fn register(&self, username: &str, _password: &str) -> ClientResult<AuthUser> {
        self.record("register")?;
        Ok(AuthUser {
            username: username.to_string(),
            role: "user".to_string(),
            tenant_id: "default".to_string(),
        })
    }

    async fn logout(&self) -> ClientResult<()> {
        self.record("logout")
    }

    async fn me(&self) -> ClientResult<AuthStatus> {
        self.record("me")?;
        let token = self.token.lock().clone();
        Ok(AuthStatus {
            authenticated: token.is_some(),
            user: token.map(|t| AuthUser {
                username: t.trim_start_matches("tok-").to_string(),
                role: "user".to_string(),
                tenant_id: "default".to_string(),
            }),
        })
    }

    async fn auth_mode(&self) -> ClientResult<AuthMode> {
        self.record("auth_mode")?;
        Ok(AuthMode::default())
    }

    async fn set_theme(&self, _theme: &str) -> ClientResult<()> {
        self.record("set_theme")
    }

    async fn set_accent(&self, _accent: &str) -> ClientResult<()> {
        self.record("set_accent")
    }

    async fn set_model(&self, _model: &str) -> ClientResult<()> {
        self.record("set_model")
    }

    async fn upload_context(&self, file_name: &str, bytes: Vec<u8>) -> ClientResult<UploadedItem> {
        self.record("upload_context")?;
        Ok(UploadedItem {
            id: self.id("u-"),
            name: file_name.to_string(),
            content_type: "text/plain".to_string(),
            size: bytes.len() as u64,
            summary: String::new(),
        })
    }

    async fn uploaded_context(&self) -> ClientResult<Vec<UploadedItem>> {
        self.record("uploaded_context")?;
        Ok(Vec::new())
    }

    async fn clear_uploaded_context(&self) -> ClientResult<()> {
        self.record("clear_uploaded_context")
    }

    async fn usage_log(&self) -> ClientResult<UsageLog> {
        self.record("usage_log")?;
        Ok(UsageLog::default())
    }

    async fn evaluation_report(&self, _requester: &str) -> ClientResult<Value> {
        self.record("evaluation_report")?;
        Ok(json!({"overall": 0.9}))
    }

    async fn checkpoints(&self, _requester: &str) -> ClientResult<CheckpointList> {
        self.record("checkpoints")?;
        Ok(CheckpointList::default())
    }

    async fn create_checkpoint(&self, requester: &str, notes: &str) -> ClientResult<Checkpoint> {
        self.record("create_checkpoint")?;
        Ok(Checkpoint {
            id: self.id("cp-"),
            created_at: None,
            created_by: Some(requester.to_string()),
            notes: notes.to_string(),
            status: "candidate".to_string(),
        })
    }

    async fn promote_checkpoint(&self, _requester: &str, _id: &str) -> ClientResult<()> {
        self.record("promote_checkpoint")
    }

    async fn run_regression(&self, _requester: &str) -> ClientResult<RegressionRun> {
        self.record("run_regression")?;
        Ok(RegressionRun {
            passed: false,
            checks: vec![
                RegressionCheck {
                    name: "answers".to_string(),
                    pass: true,
                },
                RegressionCheck {
                    name: "ratings".to_string(),
                    pass: false,
                },
            ],
        })
    }
}

/// Counts chimes and keeps what was spoken.
#[derive(Default)]
pub struct RecordingNotifier {
    pub chimes: AtomicUsize,
    pub spoken: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn chimes(&self) -> usize {
        self.chimes.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn chime(&self) {
        self.chimes.fetch_add(1, Ordering::SeqCst);
    }

    fn speak(&self, text: &str) {
        self.spoken.lock().push(text.to_string());
    }
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub controller: ViewController<PanelBoard>,
}

pub fn harness(backend: FakeBackend, store: MemoryStore) -> Harness {
    let backend = Arc::new(backend);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = ViewController::new(
        backend.clone(),
        Box::new(store),
        PanelBoard::new(),
        notifier.clone(),
        Some("ama"),
    );
    Harness {
        backend,
        notifier,
        controller,
    }
}

pub fn default_harness() -> Harness {
    harness(
        FakeBackend::new().with_stats(vec![stat("Kofi", "finance"), stat("Esi", "language")]),
        MemoryStore::new(),
    )
}
