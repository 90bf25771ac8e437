//! Client-local key/value state
//!
//! Small string values that survive restarts: theme, accent, acting-as name,
//! the auth token, the last active screen, and so on. The file-backed store
//! rewrites the whole JSON map on every change.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::error::ClientResult;

/// Keys the client persists.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const ACCENT: &str = "accent";
    pub const ACTING_AS: &str = "acting_as";
    pub const TTS_ENABLED: &str = "tts_enabled";
    pub const AUTO_TRANSLATE: &str = "auto_translate";
    pub const TRANSLATE_TARGET: &str = "translate_target";
    pub const AVATAR_GROWTH: &str = "avatar_growth";
    pub const AVATAR_PROFILES: &str = "agent_avatar_profiles";
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const AUTH_USER: &str = "auth_user";
    pub const ONBOARDING_DONE: &str = "onboarding_done";
    pub const TOUR_DONE: &str = "tour_done";
    pub const CURRENT_VIEW: &str = "current_view";
    pub const MODEL: &str = "model";
}

pub trait LocalStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&mut self, key: &str) -> ClientResult<()>;

    fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key).as_deref(), Some("true") | Some("1"))
    }

    fn set_bool(&mut self, key: &str, value: bool) -> ClientResult<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> ClientResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// JSON-file store, one flat object of string values.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is reset rather than blocking startup.
    pub fn open(path: &Path) -> Self {
        let values = fs::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(values) => Some(values),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "discarding unreadable local store");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    /// Open the store in the user's data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(&Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("lumiere").join("store.json"))
    }

    fn flush(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> ClientResult<()> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> ClientResult<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
