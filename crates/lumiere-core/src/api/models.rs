//! Request and response bodies exchanged with the Lumiere backend.

use serde::{Deserialize, Serialize};

/// Which question endpoint handles a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AskMode {
    #[default]
    Ask,
    Debate,
    Live,
}

impl AskMode {
    pub fn path(&self) -> &'static str {
        match self {
            AskMode::Ask => "/ask",
            AskMode::Debate => "/debate",
            AskMode::Live => "/ask-live",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AskMode::Ask => "Ask",
            AskMode::Debate => "Debate",
            AskMode::Live => "Live web",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            AskMode::Ask => AskMode::Debate,
            AskMode::Debate => AskMode::Live,
            AskMode::Live => AskMode::Ask,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub mode: AskMode,
    pub question: String,
    pub requester: String,
    /// Recent visible turns, sent so follow-ups keep their context.
    pub ctx: Option<String>,
    /// Chat session the question belongs to. Never sent.
    pub session: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentToken {
    #[serde(default)]
    pub mint_address: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub holder: Option<String>,
    #[serde(default)]
    pub listed: bool,
    #[serde(default)]
    pub list_price_sol: Option<f64>,
    #[serde(default)]
    pub rent_price_sol_per_hour: Option<f64>,
    #[serde(default)]
    pub value_score: Option<f64>,
    #[serde(default)]
    pub train_score: Option<f64>,
    #[serde(default)]
    pub usage_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStat {
    pub name: String,
    pub specialty: String,
    #[serde(default)]
    pub category: String,
    pub accuracy: f64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub token: Option<AgentToken>,
}

fn default_level() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMemory {
    pub specialty: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub history: Vec<serde_json::Value>,
    #[serde(default)]
    pub facts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DueReminders {
    #[serde(default)]
    pub items: Vec<Reminder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateRequest {
    pub message_id: String,
    pub value: i32,
    pub agent: String,
    pub requester: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RateOutcome {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub review_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub ts: String,
    pub label: String,
    pub content_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySessionSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySession {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub messages: Vec<HistoryMessage>,
    pub requester: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryScopes {
    #[serde(default)]
    pub active_scopes: Vec<String>,
    #[serde(default)]
    pub available_scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemoryResetOutcome {
    #[serde(default)]
    pub reminders_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketListing {
    #[serde(default)]
    pub token_key: String,
    pub specialty: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub price_sol: Option<f64>,
    #[serde(default)]
    pub mint_address: Option<String>,
    #[serde(default)]
    pub value_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub listed: Vec<MarketListing>,
    #[serde(default)]
    pub recent_events: Vec<serde_json::Value>,
}

/// A simulated ledger action on an agent token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChainAction {
    Mint {
        specialty: String,
        owner: String,
    },
    List {
        specialty: String,
        seller: String,
        price_sol: f64,
    },
    Buy {
        specialty: String,
        buyer: String,
    },
    Rent {
        specialty: String,
        renter: String,
        hours: u32,
    },
    Train {
        specialty: String,
        requester: String,
        signal: i32,
    },
}

impl ChainAction {
    pub fn path(&self) -> &'static str {
        match self {
            ChainAction::Mint { .. } => "/chain/mint-agent",
            ChainAction::List { .. } => "/chain/list-agent",
            ChainAction::Buy { .. } => "/chain/buy-agent",
            ChainAction::Rent { .. } => "/chain/rent-agent",
            ChainAction::Train { .. } => "/chain/train-agent",
        }
    }

    pub fn specialty(&self) -> &str {
        match self {
            ChainAction::Mint { specialty, .. }
            | ChainAction::List { specialty, .. }
            | ChainAction::Buy { specialty, .. }
            | ChainAction::Rent { specialty, .. }
            | ChainAction::Train { specialty, .. } => specialty,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ChainAction::Mint { .. } => "Minted",
            ChainAction::List { .. } => "Listed",
            ChainAction::Buy { .. } => "Bought",
            ChainAction::Rent { .. } => "Rented",
            ChainAction::Train { .. } => "Trained",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub zone_label: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub me: Option<Presence>,
    #[serde(default)]
    pub online: Vec<Presence>,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for PresenceSnapshot {
    fn default() -> Self {
        Self {
            enabled: true,
            zones: Vec::new(),
            me: None,
            online: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub username: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthMode {
    #[serde(default)]
    pub auth_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslateRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub requester: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Translation {
    pub translated_text: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub target_lang: String,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UsageRow {
    pub specialty: String,
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub ratings_up: u64,
    #[serde(default)]
    pub ratings_down: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UsageLog {
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub agents: Vec<UsageRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckpointList {
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub active_checkpoint_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegressionCheck {
    pub name: String,
    #[serde(default)]
    pub pass: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegressionRun {
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub checks: Vec<RegressionCheck>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_stat_tolerates_missing_fields() {
        let stat: AgentStat = serde_json::from_value(json!({
            "name": "Kofi",
            "specialty": "finance",
            "accuracy": 72.5
        }))
        .unwrap();
        assert_eq!(stat.level, 1);
        assert_eq!(stat.category, "");
        assert!(stat.token.is_none());
    }

    #[test]
    fn test_chain_action_bodies() {
        let rent = ChainAction::Rent {
            specialty: "language".to_string(),
            renter: "ama".to_string(),
            hours: 2,
        };
        assert_eq!(rent.path(), "/chain/rent-agent");
        assert_eq!(
            serde_json::to_value(&rent).unwrap(),
            json!({"specialty": "language", "renter": "ama", "hours": 2})
        );
    }

    #[test]
    fn test_disabled_presence_snapshot() {
        let snap: PresenceSnapshot =
            serde_json::from_value(json!({"enabled": false, "zones": [], "me": null, "online": []}))
                .unwrap();
        assert!(!snap.enabled);
        assert!(snap.me.is_none());
    }

    #[test]
    fn test_ask_mode_cycle() {
        assert_eq!(AskMode::Ask.next(), AskMode::Debate);
        assert_eq!(AskMode::Live.next(), AskMode::Ask);
        assert_eq!(AskMode::Live.path(), "/ask-live");
    }
}
