//! UI-agnostic application state types
//!
//! Everything a front end renders lives in [`AppState`], owned by the view
//! controller and handed to render functions by reference.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{
    AgentMemory, AgentStat, AskMode, CheckpointList, HistoryMessage, HistorySessionSummary,
    MarketSnapshot, MemoryItem, MemoryScopes, PresenceSnapshot, RegressionRun, Reminder,
    UploadedItem, UsageLog, Video,
};
use crate::reminders::ReminderAlert;
use crate::theme::ThemeState;
use crate::view::ViewState;

pub const TOAST_LIFETIME: Duration = Duration::from_secs(3);

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub label: String,
    pub content_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    /// ISO-8601, UTC
    pub timestamp: String,
    /// Specialty of the answering agent (AI messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
    System,
}

impl ChatMessage {
    pub fn new(role: ChatRole, label: &str, content_text: &str) -> Self {
        Self {
            role,
            label: label.to_string(),
            content_text: content_text.to_string(),
            content_html: None,
            timestamp: now_iso(),
            agent: None,
            level: None,
            message_id: None,
            translation: None,
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(ChatRole::User, "You", text)
    }

    pub fn system(text: &str) -> Self {
        Self::new(ChatRole::System, "System", text)
    }

    pub fn to_history(&self) -> HistoryMessage {
        HistoryMessage {
            ts: self.timestamp.clone(),
            label: self.label.clone(),
            content_text: self.content_text.clone(),
        }
    }

    /// Rebuild a transcript entry from a saved session. Saved sessions keep
    /// only the label, so the role is inferred from it.
    pub fn from_history(msg: &HistoryMessage, user_label: &str) -> Self {
        let role = if msg.label == "You" || msg.label == user_label {
            ChatRole::User
        } else if msg.label == "System" {
            ChatRole::System
        } else {
            ChatRole::Ai
        };
        Self {
            timestamp: msg.ts.clone(),
            ..Self::new(role, &msg.label, &msg.content_text)
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Backend timestamps are often naive local-less ISO strings.
    chrono::NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// The question that last failed, kept so the user can retry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFailed {
    pub question: String,
    pub mode: AskMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub expires_at: Instant,
}

/// Everything the screens render.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub view: ViewState,
    pub acting_as: String,
    pub model: Option<String>,

    // Chat
    pub messages: Vec<ChatMessage>,
    pub ask_mode: AskMode,
    pub busy: bool,
    /// Bumped whenever the transcript is replaced, so late answers can be dropped.
    pub session: u64,
    pub last_failed: Option<LastFailed>,
    pub current_specialty: Option<String>,

    // Snapshots, replaced wholesale on every refresh
    pub agent_stats: Vec<AgentStat>,
    pub memory_fact: Option<String>,
    pub memory_items: Vec<MemoryItem>,
    pub memory_scopes: MemoryScopes,
    pub agent_memory: Option<AgentMemory>,
    pub reminders: Vec<Reminder>,
    pub history: Vec<HistorySessionSummary>,
    pub marketplace: MarketSnapshot,
    pub presence: Option<PresenceSnapshot>,
    pub videos: Vec<Video>,
    pub uploads: Vec<UploadedItem>,
    pub usage: Option<UsageLog>,
    pub evaluation: Option<serde_json::Value>,
    pub checkpoints: CheckpointList,
    pub regression: Option<RegressionRun>,

    /// Specialties picked for the comparison radar (at most two).
    pub compare: BTreeSet<String>,

    pub alert: Option<ReminderAlert>,
    pub toasts: Vec<Toast>,
    pub theme: ThemeState,
    pub accent: Option<String>,
    pub tts_enabled: bool,
    pub auto_translate: Option<String>,
    pub avatar_growth: u32,
    pub auth_user: Option<String>,
    pub auth_required: bool,
}

impl AppState {
    pub fn toast(&mut self, message: impl Into<String>) {
        self.push_toast(message.into(), ToastLevel::Info);
    }

    pub fn toast_error(&mut self, message: impl Into<String>) {
        self.push_toast(message.into(), ToastLevel::Error);
    }

    fn push_toast(&mut self, message: String, level: ToastLevel) {
        self.toasts.push(Toast {
            message,
            level,
            expires_at: Instant::now() + TOAST_LIFETIME,
        });
    }

    /// Drop toasts whose lifetime has passed.
    pub fn prune_toasts(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
    }

    pub fn stat_for(&self, specialty: &str) -> Option<&AgentStat> {
        self.agent_stats.iter().find(|s| s.specialty == specialty)
    }

    /// Display label for the agent that owns `specialty`, falling back to the brand name.
    pub fn agent_label(&self, specialty: Option<&str>) -> String {
        specialty
            .and_then(|s| self.stat_for(s))
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "Lumiere".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_round_trip_keeps_roles() {
        let user = ChatMessage::user("hello");
        let back = ChatMessage::from_history(&user.to_history(), "ama");
        assert_eq!(back.role, ChatRole::User);
        assert_eq!(back.content_text, "hello");
        assert_eq!(back.timestamp, user.timestamp);

        let ai = HistoryMessage {
            ts: now_iso(),
            label: "Kofi".to_string(),
            content_text: "hi".to_string(),
        };
        assert_eq!(ChatMessage::from_history(&ai, "ama").role, ChatRole::Ai);
    }

    #[test]
    fn test_toasts_expire() {
        let mut state = AppState::default();
        state.toast("saved");
        state.toast_error("failed");
        state.prune_toasts(Instant::now());
        assert_eq!(state.toasts.len(), 2);
        state.prune_toasts(Instant::now() + TOAST_LIFETIME + Duration::from_millis(1));
        assert!(state.toasts.is_empty());
    }

    #[test]
    fn test_parse_timestamps() {
        assert!(parse_timestamp("2026-02-03T09:40:16Z").is_some());
        assert!(parse_timestamp("2026-02-03T09:40:16.123456").is_some());
        assert!(parse_timestamp("2026-02-03T09:40:16+01:00").is_some());
        assert!(parse_timestamp("tomorrow").is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChatRole::Ai).unwrap(), "\"ai\"");
    }
}
