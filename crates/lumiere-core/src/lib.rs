pub mod answer;
pub mod api;
pub mod avatar;
pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod poll;
pub mod reminders;
pub mod state;
pub mod store;
pub mod theme;
pub mod view;

// Re-export main types for convenience
pub use api::{AskMode, Backend, HttpBackend};
pub use config::Config;
pub use controller::ViewController;
pub use error::{ClientError, ClientResult};
pub use notify::{Notifier, SilentNotifier};
pub use poll::{PollKind, PollUpdate, Pollers};
pub use state::{AppState, ChatMessage, ChatRole};
pub use store::{FileStore, LocalStore, MemoryStore};
pub use theme::ThemePref;
pub use view::{PanelBoard, ViewState, ViewSurface};
