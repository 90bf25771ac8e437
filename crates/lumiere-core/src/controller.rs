//! The view controller
//!
//! Owns the application state and applies every user action and poll result
//! to it. Each operation talks to the backend through [`Backend`], records the
//! outcome in [`AppState`], and degrades failures to toasts; nothing here
//! returns an error to the front end.
//!
//! Long requests (questions) are split so a front end can run them off its
//! event loop: [`ViewController::prepare_ask`] validates and records the
//! question, the caller awaits [`Backend::ask`] wherever it likes, and
//! [`ViewController::finish_ask`] applies the result. [`ViewController::ask`]
//! does all three in place.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::answer::parse_answer;
use crate::api::{
    AgentStat, AskMode, AskRequest, Backend, ChainAction, RateRequest, Reminder,
    SaveSessionRequest, TranslateRequest,
};
use crate::avatar::{AvatarProfile, AvatarProfiles, GrowthStage};
use crate::error::{ClientError, ClientResult};
use crate::notify::Notifier;
use crate::poll::{PollContext, PollUpdate, SharedPollContext};
use crate::reminders::{DueAlerter, ReminderAlert};
use crate::state::{AppState, ChatMessage, ChatRole, LastFailed};
use crate::store::{keys, LocalStore};
use crate::theme::{self, ThemePref, ThemeState};
use crate::view::{PanelBoard, ViewState, ViewSurface};

pub const SIMPLIFY_PREFIX: &str = "Please answer briefly and in simple terms: ";
/// Upper bound on the conversation context sent with a question.
pub const CONTEXT_CHAR_LIMIT: usize = 2000;
/// How many recent turns go into that context.
pub const CONTEXT_TURNS: usize = 6;
pub const COMPARE_LIMIT: usize = 2;
const SESSION_TITLE_CHARS: usize = 40;
const DEFAULT_SPECIALTY: &str = "personal";

pub struct ViewController<S: ViewSurface = PanelBoard> {
    state: AppState,
    store: Box<dyn LocalStore>,
    backend: Arc<dyn Backend>,
    surface: S,
    notifier: Arc<dyn Notifier>,
    alerter: DueAlerter,
    avatars: AvatarProfiles,
    poll_ctx: SharedPollContext,
}

impl<S: ViewSurface> ViewController<S> {
    /// Build a controller and restore everything the local store remembers.
    /// `default_actor` is used when no acting-as name was ever stored.
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Box<dyn LocalStore>,
        surface: S,
        notifier: Arc<dyn Notifier>,
        default_actor: Option<&str>,
    ) -> Self {
        let mut state = AppState {
            view: ViewState::resolve(store.get(keys::CURRENT_VIEW).as_deref().unwrap_or("chat")),
            theme: ThemeState::restore(store.get(keys::THEME).as_deref(), theme::detect_system_dark()),
            accent: store.get(keys::ACCENT).and_then(|a| theme::normalize_accent(&a)),
            model: store.get(keys::MODEL).filter(|m| !m.is_empty()),
            tts_enabled: store.get_bool(keys::TTS_ENABLED),
            avatar_growth: store
                .get(keys::AVATAR_GROWTH)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            auth_user: store.get(keys::AUTH_USER).filter(|u| !u.is_empty()),
            ..AppState::default()
        };

        state.acting_as = store
            .get(keys::ACTING_AS)
            .or_else(|| default_actor.map(str::to_string))
            .unwrap_or_default();

        if store.get_bool(keys::AUTO_TRANSLATE) {
            state.auto_translate =
                Some(store.get(keys::TRANSLATE_TARGET).unwrap_or_else(|| "en".to_string()));
        }

        let token = store.get(keys::AUTH_TOKEN).filter(|t| !t.is_empty());
        backend.set_auth_token(token);

        let avatars = AvatarProfiles::parse(store.get(keys::AVATAR_PROFILES).as_deref());
        let poll_ctx = Arc::new(RwLock::new(PollContext {
            requester: state.acting_as.clone(),
            specialty: None,
        }));

        Self {
            state,
            store,
            backend,
            surface,
            notifier,
            alerter: DueAlerter::new(),
            avatars,
            poll_ctx,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn store(&self) -> &dyn LocalStore {
        self.store.as_ref()
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    /// Shared with the pollers so they follow acting-as and agent changes.
    pub fn poll_context(&self) -> SharedPollContext {
        self.poll_ctx.clone()
    }

    pub fn requester(&self) -> String {
        self.state.acting_as.clone()
    }

    fn specialty(&self) -> String {
        self.state
            .current_specialty
            .clone()
            .unwrap_or_else(|| DEFAULT_SPECIALTY.to_string())
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            tracing::warn!(key, %err, "could not persist local setting");
        }
    }

    fn persist_bool(&mut self, key: &str, value: bool) {
        if let Err(err) = self.store.set_bool(key, value) {
            tracing::warn!(key, %err, "could not persist local setting");
        }
    }

    fn forget(&mut self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            tracing::warn!(key, %err, "could not remove local setting");
        }
    }

    fn report(&mut self, context: &str, err: ClientError) {
        tracing::warn!(%err, "{context}");
        match err {
            ClientError::Validation(message) => self.state.toast_error(message),
            err if err.is_network() => self
                .state
                .toast_error(format!("{context}: could not reach the server ({err})")),
            err => self.state.toast_error(format!("{context}: {err}")),
        }
    }

    fn reject(&mut self, message: &str) {
        self.report("Invalid input", ClientError::validation(message));
    }

    // ---------------------------------------------------------------
    // Lifecycle and navigation
    // ---------------------------------------------------------------

    /// First paint: show the restored screen and load what the header needs.
    pub async fn start(&mut self) {
        let view = self.state.view;
        self.activate(view.as_str()).await;
        self.auth_mode().await;
        if self.store.get(keys::AUTH_TOKEN).is_some() {
            self.refresh_auth().await;
        }
        self.refresh_live_panels().await;
    }

    /// Switch to `requested`, or to chat when it names no known screen.
    pub async fn activate(&mut self, requested: &str) -> ViewState {
        let view = ViewState::resolve(requested);
        if ViewState::from_str(requested).is_none() {
            tracing::debug!(requested, "unknown view, falling back to chat");
        }

        self.persist(keys::CURRENT_VIEW, view.as_str());
        self.surface.select_nav(view);
        self.surface.hide_all();
        for panel in view.panels() {
            self.surface.reveal(*panel);
        }
        self.state.view = view;
        tracing::info!(view = view.as_str(), "view activated");

        match view {
            ViewState::Chat => {}
            ViewState::Agents => self.refresh_agent_stats().await,
            ViewState::Memory => self.refresh_memory().await,
            ViewState::Compare => {
                self.refresh_agent_stats().await;
                self.prune_compare();
            }
            ViewState::History => self.refresh_history().await,
            ViewState::Reminders => self.refresh_reminders().await,
            ViewState::Marketplace => self.refresh_marketplace().await,
            ViewState::Metaverse => self.refresh_presence().await,
        }
        view
    }

    /// Save the current chat (if any), open a fresh backend session and
    /// return to an empty chat screen.
    pub async fn start_new_session(&mut self) {
        if !self.state.messages.is_empty() {
            if let Err(err) = self.save_log(None).await {
                self.report("Could not save chat history", err);
            }
        }

        let requester = self.requester();
        if let Err(err) = self.backend.new_session(&requester).await {
            self.report("Could not start a new session", err);
        }

        self.replace_transcript(Vec::new());
        self.activate(ViewState::Chat.as_str()).await;
        tracing::info!("new session started");
    }

    fn replace_transcript(&mut self, messages: Vec<ChatMessage>) {
        self.state.messages = messages;
        self.state.last_failed = None;
        self.state.session += 1;
    }

    pub fn needs_onboarding(&self) -> bool {
        !self.store.get_bool(keys::ONBOARDING_DONE)
    }

    pub fn complete_onboarding(&mut self) {
        self.persist_bool(keys::ONBOARDING_DONE, true);
        self.persist_bool(keys::TOUR_DONE, true);
    }

    // ---------------------------------------------------------------
    // Questions
    // ---------------------------------------------------------------

    /// Pick the endpoint the next question goes to.
    pub fn set_ask_mode(&mut self, mode: AskMode) {
        self.state.ask_mode = mode;
    }

    /// Validate a question and record it in the transcript. Returns the
    /// request to send, or `None` when nothing should be sent.
    pub fn prepare_ask(&mut self, mode: AskMode, question: &str) -> Option<AskRequest> {
        let question = question.trim();
        if question.is_empty() {
            self.reject("Type a question first.");
            return None;
        }
        if self.state.busy {
            self.state.toast("Still waiting for the previous answer.");
            return None;
        }

        let ctx = self.recent_context();
        self.state.messages.push(ChatMessage::user(question));
        self.state.busy = true;
        self.state.ask_mode = mode;

        Some(AskRequest {
            mode,
            question: question.to_string(),
            requester: self.requester(),
            ctx,
            session: self.state.session,
        })
    }

    /// Apply the outcome of a request built by [`Self::prepare_ask`].
    pub async fn finish_ask(&mut self, request: &AskRequest, result: ClientResult<String>) {
        if request.session != self.state.session {
            tracing::info!(mode = ?request.mode, "dropping answer for a replaced chat");
            self.state.busy = false;
            return;
        }

        match result {
            Ok(html) => {
                let parsed = parse_answer(&html);
                let label = parsed
                    .agent_name
                    .clone()
                    .unwrap_or_else(|| self.state.agent_label(parsed.agent.as_deref()));

                let mut message = ChatMessage::new(ChatRole::Ai, &label, &parsed.text);
                message.content_html = Some(parsed.html);
                message.agent = parsed.agent.clone();
                message.level = parsed.level;
                message.message_id = parsed.message_id;
                self.state.messages.push(message);
                self.state.last_failed = None;

                if let Some(agent) = parsed.agent {
                    self.poll_ctx.write().specialty = Some(agent.clone());
                    self.state.current_specialty = Some(agent);
                }
                self.bump_avatar_growth();

                if let Some(target) = self.state.auto_translate.clone() {
                    let index = self.state.messages.len() - 1;
                    self.translate_message(index, &target).await;
                }

                self.refresh_live_panels().await;
            }
            Err(err) => {
                tracing::warn!(mode = ?request.mode, %err, "question failed");
                self.state
                    .messages
                    .push(ChatMessage::system(&format!("Error: {err}")));
                self.state.last_failed = Some(LastFailed {
                    question: request.question.clone(),
                    mode: request.mode,
                });
                self.state
                    .toast_error("The answer did not arrive. Retry, simplify, or edit the question.");
            }
        }
        self.state.busy = false;
    }

    pub async fn ask(&mut self, mode: AskMode, question: &str) {
        if let Some(request) = self.prepare_ask(mode, question) {
            self.run_ask(request).await;
        }
    }

    async fn run_ask(&mut self, request: AskRequest) {
        let result = self.backend.ask(&request).await;
        self.finish_ask(&request, result).await;
    }

    /// The identical failed question, ready to send again.
    pub fn prepare_retry(&mut self) -> Option<AskRequest> {
        let Some(failed) = self.state.last_failed.clone() else {
            self.reject("Nothing to retry.");
            return None;
        };
        self.prepare_ask(failed.mode, &failed.question)
    }

    /// The failed question with a request for a shorter, plainer answer.
    pub fn prepare_simplify(&mut self) -> Option<AskRequest> {
        let Some(failed) = self.state.last_failed.clone() else {
            self.reject("Nothing to simplify.");
            return None;
        };
        self.prepare_ask(failed.mode, &format!("{SIMPLIFY_PREFIX}{}", failed.question))
    }

    pub async fn retry(&mut self) {
        if let Some(request) = self.prepare_retry() {
            self.run_ask(request).await;
        }
    }

    pub async fn simplify(&mut self) {
        if let Some(request) = self.prepare_simplify() {
            self.run_ask(request).await;
        }
    }

    /// Hand the failed question back for editing. Nothing is sent.
    pub fn edit(&mut self) -> Option<String> {
        self.state.last_failed.take().map(|failed| failed.question)
    }

    /// Last few visible turns as "label: text" lines, newest kept when the
    /// character limit cuts.
    fn recent_context(&self) -> Option<String> {
        let mut turns: Vec<String> = self
            .state
            .messages
            .iter()
            .rev()
            .filter(|m| m.role != ChatRole::System)
            .take(CONTEXT_TURNS)
            .map(|m| format!("{}: {}", m.label, m.content_text.trim()))
            .collect();
        turns.reverse();

        if turns.is_empty() {
            return None;
        }
        Some(tail_chars(&turns.join("\n"), CONTEXT_CHAR_LIMIT).to_string())
    }

    async fn refresh_live_panels(&mut self) {
        let backend = self.backend.clone();
        let requester = self.requester();
        let specialty = self.specialty();

        let (stats, fact, reminders) = futures_util::join!(
            backend.agent_stats(&requester),
            backend.memory_fact(&specialty, &requester),
            backend.reminders(),
        );

        self.apply_stats(stats);
        self.apply_fact(fact);
        match reminders {
            Ok(list) => self.state.reminders = list,
            Err(err) => tracing::warn!(%err, "reminder refresh failed"),
        }
    }

    fn bump_avatar_growth(&mut self) {
        let before = GrowthStage::from_count(self.state.avatar_growth);
        self.state.avatar_growth = self.state.avatar_growth.saturating_add(1);
        let growth = self.state.avatar_growth.to_string();
        self.persist(keys::AVATAR_GROWTH, &growth);

        let after = GrowthStage::from_count(self.state.avatar_growth);
        if after != before {
            self.state
                .toast(format!("Your avatar grew: {}", after.display_name()));
        }
    }

    pub fn growth_stage(&self) -> GrowthStage {
        GrowthStage::from_count(self.state.avatar_growth)
    }

    pub fn avatar_profile(&self, specialty: &str) -> AvatarProfile {
        self.avatars.get(specialty)
    }

    pub fn set_avatar_profile(&mut self, specialty: &str, profile: AvatarProfile) {
        self.avatars.set(specialty, profile);
        let json = self.avatars.to_json();
        self.persist(keys::AVATAR_PROFILES, &json);
    }

    /// Thumbs up or down on the AI message at `index`.
    pub async fn rate(&mut self, index: usize, up: bool) {
        let target = self
            .state
            .messages
            .get(index)
            .map(|m| (m.message_id.clone(), m.agent.clone()));
        let Some((message_id, agent)) = target else {
            self.reject("No such message.");
            return;
        };
        let Some(message_id) = message_id else {
            self.reject("This message cannot be rated.");
            return;
        };
        let agent = agent
            .or_else(|| self.state.current_specialty.clone())
            .unwrap_or_default();

        let request = RateRequest {
            message_id,
            value: if up { 1 } else { -1 },
            agent,
            requester: self.requester(),
        };
        let result = self.backend.rate(&request).await;
        match result {
            Ok(outcome) if outcome.review_status.as_deref() == Some("pending") => {
                self.state.toast("Rating recorded and queued for review.");
            }
            Ok(_) => self.state.toast("Thanks for the feedback."),
            Err(err) => return self.report("Rating failed", err),
        }
        self.refresh_agent_stats().await;
    }

    /// Translate the message at `index` into `target_lang` and keep the
    /// result alongside the original.
    pub async fn translate_message(&mut self, index: usize, target_lang: &str) {
        let Some(text) = self
            .state
            .messages
            .get(index)
            .map(|m| m.content_text.clone())
            .filter(|t| !t.trim().is_empty())
        else {
            self.reject("Nothing to translate.");
            return;
        };

        let request = TranslateRequest {
            text,
            source_lang: "auto".to_string(),
            target_lang: target_lang.to_string(),
            requester: self.requester(),
        };
        let result = self.backend.translate(&request).await;
        match result {
            Ok(translation) => {
                if let Some(warning) = translation.warning.as_deref() {
                    self.state.toast(warning.to_string());
                }
                if let Some(message) = self.state.messages.get_mut(index) {
                    message.translation = Some(translation.translated_text);
                }
            }
            Err(err) => self.report("Translation failed", err),
        }
    }

    // ---------------------------------------------------------------
    // Polling and alerts
    // ---------------------------------------------------------------

    /// Apply one poll result. Poll failures are logged, never toasted.
    pub fn apply_poll(&mut self, update: PollUpdate, now: Instant) {
        match update {
            PollUpdate::AgentStats(result) => self.apply_stats(result),
            PollUpdate::MemoryFact(result) => self.apply_fact(result),
            PollUpdate::DueReminders(Ok(due)) => self.on_due(&due, now),
            PollUpdate::DueReminders(Err(err)) => tracing::debug!(%err, "due poll failed"),
            PollUpdate::Presence(Ok(snapshot)) => self.state.presence = Some(snapshot),
            PollUpdate::Presence(Err(err)) => tracing::debug!(%err, "presence poll failed"),
        }
    }

    fn apply_stats(&mut self, result: ClientResult<Vec<AgentStat>>) {
        match result {
            Ok(stats) => {
                self.state.agent_stats = stats;
                self.prune_compare();
            }
            Err(err) => tracing::debug!(%err, "agent stats refresh failed"),
        }
    }

    fn apply_fact(&mut self, result: ClientResult<String>) {
        match result {
            Ok(fact) => {
                let fact = fact.trim().to_string();
                self.state.memory_fact = (!fact.is_empty()).then_some(fact);
            }
            Err(err) => tracing::debug!(%err, "memory fact refresh failed"),
        }
    }

    /// Raise an alert for due reminders that have not alerted recently.
    pub fn on_due(&mut self, due: &[Reminder], now: Instant) {
        let fresh = self.alerter.observe(due, now);
        if fresh.is_empty() {
            return;
        }

        self.notifier.chime();
        let mut reminders = self
            .state
            .alert
            .take()
            .map(|alert| alert.reminders)
            .unwrap_or_default();
        for reminder in fresh {
            if !reminders.iter().any(|r| r.id == reminder.id) {
                reminders.push(reminder);
            }
        }
        self.state.alert = Some(ReminderAlert::new(reminders, now));
    }

    /// Hide the alert. Its pending repeat goes with it; the reminders stay
    /// as they are.
    pub fn acknowledge_alert(&mut self) {
        if self.state.alert.take().is_some() {
            tracing::info!("reminder alert acknowledged");
        }
    }

    /// Time-driven housekeeping: the alert's one-shot repeat and toast expiry.
    pub fn tick(&mut self, now: Instant) {
        if let Some(alert) = self.state.alert.as_mut() {
            if alert.take_repeat(now) {
                let spoken = alert.spoken_text();
                self.notifier.chime();
                self.notifier.speak(&spoken);
            }
        }
        self.state.prune_toasts(now);
    }

    // ---------------------------------------------------------------
    // Agents and comparison
    // ---------------------------------------------------------------

    pub async fn refresh_agent_stats(&mut self) {
        let requester = self.requester();
        let result = self.backend.agent_stats(&requester).await;
        match result {
            Ok(stats) => {
                self.state.agent_stats = stats;
                self.prune_compare();
            }
            Err(err) => self.report("Could not load agent stats", err),
        }
    }

    /// Select or deselect an agent for the comparison radar.
    pub fn toggle_compare(&mut self, specialty: &str) {
        if self.state.compare.remove(specialty) {
            return;
        }
        if self.state.stat_for(specialty).is_none() {
            self.reject("That agent is not available.");
            return;
        }
        if self.state.compare.len() >= COMPARE_LIMIT {
            self.reject("Pick at most two agents to compare.");
            return;
        }
        self.state.compare.insert(specialty.to_string());
    }

    fn prune_compare(&mut self) {
        let stats = &self.state.agent_stats;
        self.state
            .compare
            .retain(|specialty| stats.iter().any(|s| &s.specialty == specialty));
    }

    // ---------------------------------------------------------------
    // Reminders
    // ---------------------------------------------------------------

    pub async fn refresh_reminders(&mut self) {
        let result = self.backend.reminders().await;
        match result {
            Ok(list) => self.state.reminders = list,
            Err(err) => self.report("Could not load reminders", err),
        }
    }

    pub async fn add_reminder(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.reject("Reminder text is empty.");
            return;
        }
        let requester = self.requester();
        let result = self.backend.add_reminder(text, &requester).await;
        match result {
            Ok(reminder) => {
                tracing::info!(id = %reminder.id, "reminder added");
                self.state.toast("Reminder added.");
                self.refresh_reminders().await;
            }
            Err(err) => self.report("Could not add reminder", err),
        }
    }

    pub async fn toggle_reminder(&mut self, id: &str) {
        let requester = self.requester();
        let result = self.backend.toggle_reminder(id, &requester).await;
        match result {
            Ok(_) => self.refresh_reminders().await,
            Err(err) => self.report("Could not update reminder", err),
        }
    }

    pub async fn delete_reminder(&mut self, id: &str) {
        let result = self.backend.delete_reminder(id).await;
        match result {
            Ok(()) => self.refresh_reminders().await,
            Err(err) => self.report("Could not delete reminder", err),
        }
    }

    // ---------------------------------------------------------------
    // Saved chats
    // ---------------------------------------------------------------

    pub async fn refresh_history(&mut self) {
        let requester = self.requester();
        let result = self.backend.history_sessions(&requester).await;
        match result {
            Ok(sessions) => self.state.history = sessions,
            Err(err) => self.report("Could not load history", err),
        }
    }

    /// Title for the current chat: its first question, shortened.
    pub fn session_title(&self) -> String {
        self.state
            .messages
            .iter()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content_text.trim().chars().take(SESSION_TITLE_CHARS).collect::<String>())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled chat".to_string())
    }

    async fn save_log(&mut self, title: Option<&str>) -> ClientResult<String> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.session_title());
        let request = SaveSessionRequest {
            id: None,
            title,
            messages: self.state.messages.iter().map(ChatMessage::to_history).collect(),
            requester: self.requester(),
        };
        let id = self.backend.save_history(&request).await?;
        tracing::info!(%id, messages = request.messages.len(), "chat saved");
        Ok(id)
    }

    pub async fn save_current_session(&mut self, title: Option<&str>) -> Option<String> {
        if self.state.messages.is_empty() {
            self.reject("Nothing to save yet.");
            return None;
        }
        match self.save_log(title).await {
            Ok(id) => {
                self.state.toast("Chat saved.");
                self.refresh_history().await;
                Some(id)
            }
            Err(err) => {
                self.report("Could not save chat", err);
                None
            }
        }
    }

    /// Replace the transcript with a saved chat and show it.
    pub async fn open_history_session(&mut self, id: &str) {
        let requester = self.requester();
        let result = self.backend.history_session(id, &requester).await;
        match result {
            Ok(session) => {
                let user_label = self.state.acting_as.clone();
                let messages = session
                    .messages
                    .iter()
                    .map(|m| ChatMessage::from_history(m, &user_label))
                    .collect();
                self.replace_transcript(messages);
                self.activate(ViewState::Chat.as_str()).await;
            }
            Err(err) => self.report("Could not open chat", err),
        }
    }

    pub async fn delete_history_session(&mut self, id: &str) {
        let requester = self.requester();
        let result = self.backend.delete_history(id, &requester).await;
        match result {
            Ok(()) => self.refresh_history().await,
            Err(err) => self.report("Could not delete chat", err),
        }
    }

    // ---------------------------------------------------------------
    // Memory
    // ---------------------------------------------------------------

    pub async fn refresh_memory(&mut self) {
        let backend = self.backend.clone();
        let requester = self.requester();
        let specialty = self.specialty();

        let (items, scopes, agent) = futures_util::join!(
            backend.memory_items(&requester),
            backend.memory_scopes(&requester),
            backend.agent_memory(&specialty, &requester),
        );

        match items {
            Ok(items) => self.state.memory_items = items,
            Err(err) => self.report("Could not load memory", err),
        }
        match scopes {
            Ok(scopes) => self.state.memory_scopes = scopes,
            Err(err) => tracing::warn!(%err, "memory scopes refresh failed"),
        }
        match agent {
            Ok(memory) => self.state.agent_memory = Some(memory),
            Err(err) => tracing::warn!(%err, "agent memory refresh failed"),
        }
    }

    pub async fn add_memory_item(&mut self, text: &str, scope: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.reject("Memory text is empty.");
            return;
        }
        let scope = match scope.trim() {
            "" => DEFAULT_SPECIALTY,
            s => s,
        };
        let requester = self.requester();
        let result = self.backend.create_memory_item(&requester, text, scope).await;
        match result {
            Ok(_) => {
                self.state.toast("Saved to memory.");
                self.refresh_memory().await;
            }
            Err(err) => self.report("Could not save memory", err),
        }
    }

    pub async fn update_memory_item(&mut self, id: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.reject("Memory text is empty.");
            return;
        }
        let requester = self.requester();
        let result = self.backend.update_memory_item(&requester, id, text).await;
        match result {
            Ok(updated) => {
                if let Some(item) = self.state.memory_items.iter_mut().find(|i| i.id == updated.id) {
                    *item = updated;
                }
            }
            Err(err) => self.report("Could not update memory", err),
        }
    }

    pub async fn delete_memory_item(&mut self, id: &str) {
        let requester = self.requester();
        let result = self.backend.delete_memory_item(&requester, id).await;
        match result {
            Ok(()) => self.state.memory_items.retain(|i| i.id != id),
            Err(err) => self.report("Could not delete memory", err),
        }
    }

    pub async fn set_memory_scopes(&mut self, scopes: Vec<String>) {
        let requester = self.requester();
        let result = self.backend.set_memory_scopes(&requester, &scopes).await;
        match result {
            Ok(active) => self.state.memory_scopes.active_scopes = active,
            Err(err) => self.report("Could not update memory scopes", err),
        }
    }

    /// Focus an agent: the memory panel, the fact poller and ratings follow it.
    pub async fn load_agent_memory(&mut self, specialty: &str) {
        let specialty = specialty.trim().to_lowercase();
        if specialty.is_empty() {
            self.reject("Pick an agent first.");
            return;
        }
        self.state.current_specialty = Some(specialty.clone());
        self.poll_ctx.write().specialty = Some(specialty.clone());

        let requester = self.requester();
        let result = self.backend.agent_memory(&specialty, &requester).await;
        match result {
            Ok(memory) => self.state.agent_memory = Some(memory),
            Err(err) => self.report("Could not load agent memory", err),
        }
    }

    pub async fn refresh_memory_fact(&mut self) {
        let requester = self.requester();
        let specialty = self.specialty();
        let result = self.backend.memory_fact(&specialty, &requester).await;
        self.apply_fact(result);
    }

    pub async fn reset_memory(&mut self, clear_reminders: bool) {
        let requester = self.requester();
        let result = self.backend.reset_memory(&requester, clear_reminders).await;
        match result {
            Ok(outcome) => {
                self.replace_transcript(Vec::new());
                self.state.memory_fact = None;
                if clear_reminders {
                    self.state.toast(format!(
                        "Memory reset. {} reminders removed.",
                        outcome.reminders_removed
                    ));
                    self.refresh_reminders().await;
                } else {
                    self.state.toast("Memory reset.");
                }
                self.refresh_memory().await;
            }
            Err(err) => self.report("Could not reset memory", err),
        }
    }

    // ---------------------------------------------------------------
    // Marketplace
    // ---------------------------------------------------------------

    pub async fn refresh_marketplace(&mut self) {
        let requester = self.requester();
        let result = self.backend.marketplace(&requester).await;
        match result {
            Ok(snapshot) => self.state.marketplace = snapshot,
            Err(err) => self.report("Could not load marketplace", err),
        }
    }

    async fn chain(&mut self, action: ChainAction) {
        if action.specialty().trim().is_empty() {
            self.reject("Pick an agent first.");
            return;
        }
        let result = self.backend.chain_action(&action).await;
        match result {
            Ok(()) => {
                tracing::info!(path = action.path(), specialty = action.specialty(), "chain action");
                self.state
                    .toast(format!("{} {}.", action.verb(), action.specialty()));
                self.refresh_marketplace().await;
                self.refresh_agent_stats().await;
            }
            Err(err) => self.report("Marketplace action failed", err),
        }
    }

    pub async fn mint_agent(&mut self, specialty: &str) {
        let owner = self.requester();
        self.chain(ChainAction::Mint {
            specialty: specialty.to_string(),
            owner,
        })
        .await;
    }

    pub async fn list_agent(&mut self, specialty: &str, price_sol: f64) {
        if !(price_sol.is_finite() && price_sol > 0.0) {
            self.reject("Price must be greater than zero.");
            return;
        }
        let seller = self.requester();
        self.chain(ChainAction::List {
            specialty: specialty.to_string(),
            seller,
            price_sol,
        })
        .await;
    }

    pub async fn buy_agent(&mut self, specialty: &str) {
        let buyer = self.requester();
        self.chain(ChainAction::Buy {
            specialty: specialty.to_string(),
            buyer,
        })
        .await;
    }

    pub async fn rent_agent(&mut self, specialty: &str, hours: u32) {
        if hours == 0 {
            self.reject("Rent for at least one hour.");
            return;
        }
        let renter = self.requester();
        self.chain(ChainAction::Rent {
            specialty: specialty.to_string(),
            renter,
            hours,
        })
        .await;
    }

    pub async fn train_agent(&mut self, specialty: &str, signal: i32) {
        let requester = self.requester();
        self.chain(ChainAction::Train {
            specialty: specialty.to_string(),
            requester,
            signal: signal.signum(),
        })
        .await;
    }

    // ---------------------------------------------------------------
    // Metaverse
    // ---------------------------------------------------------------

    pub async fn refresh_presence(&mut self) {
        let requester = self.requester();
        let result = self.backend.presence(&requester).await;
        match result {
            Ok(snapshot) => self.state.presence = Some(snapshot),
            Err(err) => self.report("Could not load presence", err),
        }
    }

    pub async fn travel(&mut self, zone: &str) {
        let zone = zone.trim();
        if zone.is_empty() {
            self.reject("Pick a zone first.");
            return;
        }
        let requester = self.requester();
        let result = self.backend.travel(&requester, zone).await;
        match result {
            Ok(snapshot) if !snapshot.enabled => {
                self.state.toast("The metaverse is disabled on this server.");
                self.state.presence = Some(snapshot);
            }
            Ok(snapshot) => {
                self.state.toast(format!("Travelled to {zone}."));
                self.state.presence = Some(snapshot);
            }
            Err(err) => self.report("Travel failed", err),
        }
    }

    pub async fn search_videos(&mut self, query: &str) {
        let specialty = self.state.current_specialty.clone().unwrap_or_default();
        let result = self.backend.videos(query.trim(), &specialty).await;
        match result {
            Ok(videos) => self.state.videos = videos,
            Err(err) => self.report("Video search failed", err),
        }
    }

    // ---------------------------------------------------------------
    // Preferences
    // ---------------------------------------------------------------

    pub async fn set_theme(&mut self, pref: ThemePref) {
        self.state.theme.set_pref(pref);
        self.persist(keys::THEME, pref.as_str());
        let result = self.backend.set_theme(pref.as_str()).await;
        if let Err(err) = result {
            self.report("Theme saved locally only", err);
        }
    }

    /// Feed a system appearance change; ignored under an explicit preference.
    pub fn on_system_appearance(&mut self, prefers_dark: bool) -> bool {
        self.state.theme.on_system_change(prefers_dark)
    }

    pub async fn set_accent(&mut self, input: &str) {
        let Some(accent) = theme::normalize_accent(input) else {
            self.reject("Accent must be a colour like #3b82f6.");
            return;
        };
        self.persist(keys::ACCENT, &accent);
        self.state.accent = Some(accent.clone());
        let result = self.backend.set_accent(&accent).await;
        if let Err(err) = result {
            self.report("Accent saved locally only", err);
        }
    }

    pub async fn set_model(&mut self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            self.reject("Model name is empty.");
            return;
        }
        let result = self.backend.set_model(model).await;
        match result {
            Ok(()) => {
                self.persist(keys::MODEL, model);
                self.state.model = Some(model.to_string());
                self.state.toast(format!("Model set to {model}."));
            }
            Err(err) => self.report("Could not switch model", err),
        }
    }

    /// Change the display name sent as `requester`. Empty lets the backend
    /// pick its default.
    pub fn set_acting_as(&mut self, name: &str) {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.forget(keys::ACTING_AS);
        } else {
            self.persist(keys::ACTING_AS, &name);
        }
        self.poll_ctx.write().requester = name.clone();
        tracing::info!(acting_as = %name, "acting-as changed");
        self.state.acting_as = name;
    }

    pub fn set_tts(&mut self, enabled: bool) {
        self.state.tts_enabled = enabled;
        self.persist_bool(keys::TTS_ENABLED, enabled);
    }

    /// Translate every new answer into `target`, or stop when `None`.
    pub fn set_auto_translate(&mut self, target: Option<&str>) {
        let target = target.map(str::trim).filter(|t| !t.is_empty());
        self.persist_bool(keys::AUTO_TRANSLATE, target.is_some());
        if let Some(target) = target {
            self.persist(keys::TRANSLATE_TARGET, target);
        }
        self.state.auto_translate = target.map(str::to_string);
    }

    // ---------------------------------------------------------------
    // Auth
    // ---------------------------------------------------------------

    pub async fn login(&mut self, username: &str, password: &str) -> bool {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            self.reject("Username and password are required.");
            return false;
        }
        let result = self.backend.login(username, password).await;
        match result {
            Ok(session) => {
                self.backend.set_auth_token(Some(session.token.clone()));
                self.persist(keys::AUTH_TOKEN, &session.token);
                self.persist(keys::AUTH_USER, &session.user.username);
                if self.state.acting_as.is_empty() {
                    self.set_acting_as(&session.user.username);
                }
                self.state
                    .toast(format!("Signed in as {}.", session.user.username));
                self.state.auth_user = Some(session.user.username);
                true
            }
            Err(err) => {
                self.report("Sign-in failed", err);
                false
            }
        }
    }

    pub async fn register(&mut self, username: &str, password: &str) -> bool {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            self.reject("Username and password are required.");
            return false;
        }
        let result = self.backend.register(username, password).await;
        match result {
            Ok(user) => {
                self.state
                    .toast(format!("Account {} created. Sign in to continue.", user.username));
                true
            }
            Err(err) => {
                self.report("Registration failed", err);
                false
            }
        }
    }

    /// Sign out. The local token is dropped even if the server call fails.
    pub async fn logout(&mut self) {
        let result = self.backend.logout().await;
        if let Err(err) = result {
            tracing::warn!(%err, "logout call failed");
        }
        self.clear_auth();
        self.state.toast("Signed out.");
    }

    fn clear_auth(&mut self) {
        self.backend.set_auth_token(None);
        self.forget(keys::AUTH_TOKEN);
        self.forget(keys::AUTH_USER);
        self.state.auth_user = None;
    }

    pub async fn refresh_auth(&mut self) {
        let result = self.backend.me().await;
        match result {
            Ok(status) if status.authenticated => {
                self.state.auth_user = status.user.map(|u| u.username);
            }
            Ok(_) => {
                if self.state.auth_user.is_some() {
                    self.state.toast("Your session expired. Sign in again.");
                }
                self.clear_auth();
            }
            Err(err) => tracing::warn!(%err, "auth check failed"),
        }
    }

    pub async fn auth_mode(&mut self) {
        let result = self.backend.auth_mode().await;
        match result {
            Ok(mode) => self.state.auth_required = mode.auth_required,
            Err(err) => tracing::debug!(%err, "auth mode unavailable"),
        }
    }

    // ---------------------------------------------------------------
    // Uploaded context
    // ---------------------------------------------------------------

    pub async fn upload_context(&mut self, path: &Path) {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            self.reject("Not a file path.");
            return;
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => return self.report("Could not read file", err.into()),
        };

        let result = self.backend.upload_context(&file_name, bytes).await;
        match result {
            Ok(item) => {
                self.state.toast(format!("Uploaded {}.", item.name));
                self.state.uploads.push(item);
            }
            Err(err) => self.report("Upload failed", err),
        }
    }

    pub async fn list_uploads(&mut self) {
        let result = self.backend.uploaded_context().await;
        match result {
            Ok(items) => self.state.uploads = items,
            Err(err) => self.report("Could not list uploads", err),
        }
    }

    pub async fn clear_uploads(&mut self) {
        let result = self.backend.clear_uploaded_context().await;
        match result {
            Ok(()) => {
                self.state.uploads.clear();
                self.state.toast("Uploaded context cleared.");
            }
            Err(err) => self.report("Could not clear uploads", err),
        }
    }

    // ---------------------------------------------------------------
    // Analytics
    // ---------------------------------------------------------------

    pub async fn usage_log(&mut self) {
        let result = self.backend.usage_log().await;
        match result {
            Ok(log) => self.state.usage = Some(log),
            Err(err) => self.report("Could not load usage", err),
        }
    }

    pub async fn evaluation_report(&mut self) {
        let requester = self.requester();
        let result = self.backend.evaluation_report(&requester).await;
        match result {
            Ok(report) => self.state.evaluation = Some(report),
            Err(err) => self.report("Could not load evaluation", err),
        }
    }

    pub async fn list_checkpoints(&mut self) {
        let requester = self.requester();
        let result = self.backend.checkpoints(&requester).await;
        match result {
            Ok(list) => self.state.checkpoints = list,
            Err(err) => self.report("Could not load checkpoints", err),
        }
    }

    pub async fn create_checkpoint(&mut self, notes: &str) {
        let requester = self.requester();
        let result = self.backend.create_checkpoint(&requester, notes.trim()).await;
        match result {
            Ok(checkpoint) => {
                self.state.toast(format!("Checkpoint {} created.", checkpoint.id));
                self.list_checkpoints().await;
            }
            Err(err) => self.report("Could not create checkpoint", err),
        }
    }

    pub async fn promote_checkpoint(&mut self, id: &str) {
        let requester = self.requester();
        let result = self.backend.promote_checkpoint(&requester, id).await;
        match result {
            Ok(()) => {
                self.state.toast(format!("Checkpoint {id} promoted."));
                self.list_checkpoints().await;
            }
            Err(err) => self.report("Could not promote checkpoint", err),
        }
    }

    pub async fn run_regression(&mut self) {
        let requester = self.requester();
        let result = self.backend.run_regression(&requester).await;
        match result {
            Ok(run) => {
                let failed = run.checks.iter().filter(|c| !c.pass).count();
                if run.passed {
                    self.state.toast("Regression suite passed.");
                } else {
                    self.state
                        .toast_error(format!("Regression suite failed ({failed} checks)."));
                }
                self.state.regression = Some(run);
            }
            Err(err) => self.report("Could not run regression suite", err),
        }
    }
}

/// The last `max` characters of `s`.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - max)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_chars_keeps_the_end() {
        assert_eq!(tail_chars("hello", 10), "hello");
        assert_eq!(tail_chars("hello", 3), "llo");
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
    }
}
