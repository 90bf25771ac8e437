use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use lumiere_core::api::{AskRequest, Zone};
use lumiere_core::{
    Backend, ClientError, ClientResult, Config, PanelBoard, PollUpdate, Pollers, ViewController,
    ViewState,
};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::notify::TerminalNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text field with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }
}

/// What a popup prompt collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Reminder,
    MemoryItem,
    MemoryEdit,
    ActingAs,
    Accent,
    Model,
    Travel,
    VideoSearch,
    LoginUser,
    LoginPassword,
    RegisterUser,
    RegisterPassword,
    SaveTitle,
    Translate,
    AutoTranslate,
    ListPrice,
    RentHours,
    Upload,
    Checkpoint,
    ResetMemory,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::Reminder => "New reminder",
            PromptKind::MemoryItem => "Remember (text, or scope: text)",
            PromptKind::MemoryEdit => "Edit memory",
            PromptKind::ActingAs => "Acting as",
            PromptKind::Accent => "Accent colour (#rrggbb)",
            PromptKind::Model => "Model",
            PromptKind::Travel => "Travel to zone",
            PromptKind::VideoSearch => "Search videos",
            PromptKind::LoginUser | PromptKind::RegisterUser => "Username",
            PromptKind::LoginPassword | PromptKind::RegisterPassword => "Password",
            PromptKind::SaveTitle => "Save chat as (blank for first question)",
            PromptKind::Translate => "Translate into (language code)",
            PromptKind::AutoTranslate => "Auto-translate answers into (blank to stop)",
            PromptKind::ListPrice => "List price (SOL)",
            PromptKind::RentHours => "Rent for how many hours",
            PromptKind::Upload => "Upload file (path)",
            PromptKind::Checkpoint => "Checkpoint notes",
            PromptKind::ResetMemory => "Reset memory. Also clear reminders? (y/n)",
        }
    }

    pub fn masked(&self) -> bool {
        matches!(self, PromptKind::LoginPassword | PromptKind::RegisterPassword)
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: TextInput,
    /// Id, specialty or username the answer applies to.
    pub target: Option<String>,
}

impl Prompt {
    pub fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            input: TextInput::default(),
            target: None,
        }
    }

    pub fn for_target(kind: PromptKind, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(kind)
        }
    }
}

type AskTask = (AskRequest, JoinHandle<ClientResult<String>>);

pub struct App {
    // Core state
    pub should_quit: bool,
    pub controller: ViewController<PanelBoard>,
    pub notifier: Arc<TerminalNotifier>,
    pub input_mode: InputMode,

    // Chat composer
    pub composer: TextInput,
    pub selected_message: Option<usize>,
    pub query_task: Option<AskTask>,

    // Popups
    pub prompt: Option<Prompt>,
    pub show_welcome: bool,

    // Selection in the active screen's list
    pub list_state: ListState,

    // Animation state
    pub animation_frame: u8,

    pollers: Pollers,
}

impl App {
    pub fn new(
        config: &Config,
        controller: ViewController<PanelBoard>,
        notifier: Arc<TerminalNotifier>,
        poll_tx: UnboundedSender<PollUpdate>,
    ) -> Self {
        let pollers = Pollers::start(
            config,
            controller.backend(),
            controller.poll_context(),
            poll_tx,
        );
        let show_welcome = controller.needs_onboarding();

        Self {
            should_quit: false,
            controller,
            notifier,
            input_mode: InputMode::Normal,
            composer: TextInput::default(),
            selected_message: None,
            query_task: None,
            prompt: None,
            show_welcome,
            list_state: ListState::default(),
            animation_frame: 0,
            pollers,
        }
    }

    pub async fn start(&mut self) {
        self.controller.start().await;
        self.reset_selection();
    }

    pub fn view(&self) -> ViewState {
        self.controller.state().view
    }

    pub fn is_loading(&self) -> bool {
        self.query_task.is_some()
    }

    pub async fn activate(&mut self, view: ViewState) {
        self.controller.activate(view.as_str()).await;
        self.reset_selection();
    }

    pub fn dismiss_welcome(&mut self) {
        self.show_welcome = false;
        self.controller.complete_onboarding();
    }

    // ---------------------------------------------------------------
    // Questions
    // ---------------------------------------------------------------

    pub fn send_question(&mut self) {
        if self.query_task.is_some() {
            return;
        }
        let question = self.composer.text.clone();
        let mode = self.controller.state().ask_mode;
        if let Some(request) = self.controller.prepare_ask(mode, &question) {
            self.composer.take();
            self.spawn_ask(request);
        }
    }

    pub fn retry(&mut self) {
        if self.query_task.is_none() {
            if let Some(request) = self.controller.prepare_retry() {
                self.spawn_ask(request);
            }
        }
    }

    pub fn simplify(&mut self) {
        if self.query_task.is_none() {
            if let Some(request) = self.controller.prepare_simplify() {
                self.spawn_ask(request);
            }
        }
    }

    pub fn edit_failed(&mut self) {
        if let Some(question) = self.controller.edit() {
            self.composer = TextInput::with_text(&question);
            self.input_mode = InputMode::Editing;
        }
    }

    fn spawn_ask(&mut self, request: AskRequest) {
        let backend = self.controller.backend();
        let sent = request.clone();
        self.selected_message = None;
        self.query_task = Some((
            request,
            tokio::spawn(async move { backend.ask(&sent).await }),
        ));
    }

    /// Apply the answer once the background request has finished.
    pub async fn poll_query_task(&mut self) {
        let finished = self
            .query_task
            .as_ref()
            .is_some_and(|(_, handle)| handle.is_finished());
        if !finished {
            return;
        }
        if let Some((request, handle)) = self.query_task.take() {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(ClientError::Backend(format!("request task failed: {err}"))),
            };
            self.controller.finish_ask(&request, result).await;
        }
    }

    // ---------------------------------------------------------------
    // Time and polling
    // ---------------------------------------------------------------

    pub fn tick(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.controller.tick(Instant::now());
    }

    pub fn on_poll(&mut self, update: PollUpdate) {
        self.controller.apply_poll(update, Instant::now());
        self.clamp_selection();
    }

    // ---------------------------------------------------------------
    // List selection
    // ---------------------------------------------------------------

    pub fn list_len(&self) -> usize {
        let state = self.controller.state();
        match self.view() {
            ViewState::Chat => state.messages.len(),
            ViewState::Agents | ViewState::Compare | ViewState::Marketplace => {
                state.agent_stats.len()
            }
            ViewState::Memory => state.memory_items.len(),
            ViewState::History => state.history.len(),
            ViewState::Reminders => state.reminders.len(),
            ViewState::Metaverse => self.zones().len(),
        }
    }

    pub fn zones(&self) -> &[Zone] {
        self.controller
            .state()
            .presence
            .as_ref()
            .map(|p| p.zones.as_slice())
            .unwrap_or(&[])
    }

    pub fn selected(&self) -> Option<usize> {
        if self.view() == ViewState::Chat {
            self.selected_message
        } else {
            self.list_state.selected()
        }
    }

    pub fn select_next(&mut self) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        let next = self.selected().map(|i| (i + 1).min(len - 1)).unwrap_or(0);
        self.set_selected(Some(next));
    }

    pub fn select_prev(&mut self) {
        let len = self.list_len();
        if len == 0 {
            return;
        }
        let prev = self.selected().map(|i| i.saturating_sub(1)).unwrap_or(len - 1);
        self.set_selected(Some(prev));
    }

    fn set_selected(&mut self, index: Option<usize>) {
        if self.view() == ViewState::Chat {
            self.selected_message = index;
        } else {
            self.list_state.select(index);
        }
    }

    pub fn reset_selection(&mut self) {
        let first = (self.list_len() > 0).then_some(0);
        self.list_state.select(first);
        self.selected_message = None;
    }

    pub fn clamp_selection(&mut self) {
        let len = self.list_len();
        match self.list_state.selected() {
            Some(_) if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            None if len > 0 => self.list_state.select(Some(0)),
            _ => {}
        }
    }

    /// Specialty of the agent row under the cursor.
    pub fn selected_specialty(&self) -> Option<String> {
        let index = self.list_state.selected()?;
        self.controller
            .state()
            .agent_stats
            .get(index)
            .map(|s| s.specialty.clone())
    }

    pub fn selected_id(&self) -> Option<String> {
        let index = self.list_state.selected()?;
        let state = self.controller.state();
        match self.view() {
            ViewState::Memory => state.memory_items.get(index).map(|i| i.id.clone()),
            ViewState::History => state.history.get(index).map(|s| s.id.clone()),
            ViewState::Reminders => state.reminders.get(index).map(|r| r.id.clone()),
            ViewState::Metaverse => self.zones().get(index).map(|z| z.id.clone()),
            _ => None,
        }
    }

    // ---------------------------------------------------------------
    // Prompts
    // ---------------------------------------------------------------

    pub fn open_prompt(&mut self, prompt: Prompt) {
        self.prompt = Some(prompt);
    }

    /// Act on the submitted prompt. Multi-step prompts open their next step.
    pub async fn submit_prompt(&mut self) {
        let Some(mut prompt) = self.prompt.take() else {
            return;
        };
        let value = prompt.input.take();
        let target = prompt.target.take().unwrap_or_default();
        let c = &mut self.controller;

        match prompt.kind {
            PromptKind::Reminder => c.add_reminder(&value).await,
            PromptKind::MemoryItem => {
                let (scope, text) = match value.split_once(':') {
                    Some((scope, text)) if !scope.trim().contains(' ') => (scope.trim(), text),
                    _ => ("", value.as_str()),
                };
                c.add_memory_item(text, scope).await;
            }
            PromptKind::MemoryEdit => c.update_memory_item(&target, &value).await,
            PromptKind::ActingAs => c.set_acting_as(&value),
            PromptKind::Accent => c.set_accent(&value).await,
            PromptKind::Model => c.set_model(&value).await,
            PromptKind::Travel => c.travel(&value).await,
            PromptKind::VideoSearch => c.search_videos(&value).await,
            PromptKind::LoginUser => {
                self.prompt = Some(Prompt::for_target(PromptKind::LoginPassword, value));
            }
            PromptKind::LoginPassword => {
                c.login(&target, &value).await;
            }
            PromptKind::RegisterUser => {
                self.prompt = Some(Prompt::for_target(PromptKind::RegisterPassword, value));
            }
            PromptKind::RegisterPassword => {
                c.register(&target, &value).await;
            }
            PromptKind::SaveTitle => {
                let title = Some(value.as_str()).filter(|t| !t.trim().is_empty());
                c.save_current_session(title).await;
            }
            PromptKind::Translate => {
                if let Ok(index) = target.parse::<usize>() {
                    c.translate_message(index, value.trim()).await;
                }
            }
            PromptKind::AutoTranslate => c.set_auto_translate(Some(value.as_str())),
            PromptKind::ListPrice => {
                let price = value.trim().parse::<f64>().unwrap_or(0.0);
                c.list_agent(&target, price).await;
            }
            PromptKind::RentHours => {
                let hours = value.trim().parse::<u32>().unwrap_or(0);
                c.rent_agent(&target, hours).await;
            }
            PromptKind::Upload => {
                let path = PathBuf::from(shellish_trim(&value));
                c.upload_context(&path).await;
            }
            PromptKind::Checkpoint => c.create_checkpoint(&value).await,
            PromptKind::ResetMemory => {
                let answer = value.trim().to_lowercase();
                if answer == "y" || answer == "yes" {
                    c.reset_memory(true).await;
                } else if answer == "n" || answer == "no" {
                    c.reset_memory(false).await;
                }
            }
        }
        self.clamp_selection();
    }

    pub fn shutdown(&mut self) {
        self.pollers.stop();
        if let Some((_, handle)) = self.query_task.take() {
            handle.abort();
        }
    }
}

/// Strip the quotes terminals add when a file is dragged in.
fn shellish_trim(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '\'' || c == '"')
}
