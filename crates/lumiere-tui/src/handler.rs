use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lumiere_core::ViewState;

use crate::app::{App, InputMode, Prompt, PromptKind, TextInput};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Poll(update) => app.on_poll(update),
        AppEvent::Tick => app.tick(),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    if app.show_welcome {
        app.dismiss_welcome();
        return Ok(());
    }

    if app.prompt.is_some() {
        handle_prompt(app, key).await;
        return Ok(());
    }

    // A due alert takes the keyboard until it's acknowledged
    if app.controller.state().alert.is_some()
        && matches!(key.code, KeyCode::Esc | KeyCode::Char('A') | KeyCode::Enter)
    {
        app.controller.acknowledge_alert();
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

/// Shared line editing for the composer and prompts. Returns false when the
/// key isn't an editing key.
fn edit_text(input: &mut TextInput, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(c) => input.insert(c),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.left(),
        KeyCode::Right => input.right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        _ => return false,
    }
    true
}

async fn handle_prompt(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.prompt = None,
        KeyCode::Enter => app.submit_prompt().await,
        _ => {
            if let Some(prompt) = app.prompt.as_mut() {
                edit_text(&mut prompt.input, key);
            }
        }
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            app.send_question();
            app.input_mode = InputMode::Normal;
        }
        _ => {
            edit_text(&mut app.composer, key);
        }
    }
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Screen switching and session keys work on every screen
    if let KeyCode::Char(c) = key.code {
        if let Some(view) = ViewState::from_hotkey(c) {
            app.activate(view).await;
            return;
        }
    }

    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('n') => {
            app.controller.start_new_session().await;
            app.reset_selection();
            return;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next();
            return;
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_prev();
            return;
        }
        KeyCode::Char('T') => {
            let next = app.controller.state().theme.pref().next();
            app.controller.set_theme(next).await;
            return;
        }
        KeyCode::Char('C') => {
            app.open_prompt(Prompt::new(PromptKind::Accent));
            return;
        }
        KeyCode::Char('M') => {
            app.open_prompt(Prompt::new(PromptKind::Model));
            return;
        }
        KeyCode::Char('@') => {
            app.open_prompt(Prompt::new(PromptKind::ActingAs));
            return;
        }
        KeyCode::Char('v') => {
            let enabled = !app.controller.state().tts_enabled;
            app.controller.set_tts(enabled);
            app.notifier.set_speech(enabled);
            return;
        }
        KeyCode::Char('L') => {
            app.open_prompt(Prompt::new(PromptKind::LoginUser));
            return;
        }
        KeyCode::Char('N') => {
            app.open_prompt(Prompt::new(PromptKind::RegisterUser));
            return;
        }
        KeyCode::Char('O') => {
            app.controller.logout().await;
            return;
        }
        KeyCode::Char('U') => {
            app.open_prompt(Prompt::new(PromptKind::Upload));
            return;
        }
        _ => {}
    }

    match app.view() {
        ViewState::Chat => handle_chat(app, key).await,
        ViewState::Agents => handle_agents(app, key).await,
        ViewState::Memory => handle_memory(app, key).await,
        ViewState::Compare => handle_compare(app, key),
        ViewState::History => handle_history(app, key).await,
        ViewState::Reminders => handle_reminders(app, key).await,
        ViewState::Marketplace => handle_marketplace(app, key).await,
        ViewState::Metaverse => handle_metaverse(app, key).await,
    }
}

async fn handle_chat(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Char('m') => {
            let next = app.controller.state().ask_mode.next();
            app.controller.set_ask_mode(next);
        }
        KeyCode::Char('r') => app.retry(),
        KeyCode::Char('s') => app.simplify(),
        KeyCode::Char('e') => app.edit_failed(),
        KeyCode::Char('+') | KeyCode::Char('-') => {
            if let Some(index) = app.selected_message {
                app.controller.rate(index, key.code == KeyCode::Char('+')).await;
            }
        }
        KeyCode::Char('t') => {
            if let Some(index) = app.selected_message {
                app.open_prompt(Prompt::for_target(PromptKind::Translate, index.to_string()));
            }
        }
        KeyCode::Char('a') => app.open_prompt(Prompt::new(PromptKind::AutoTranslate)),
        KeyCode::Char('S') => app.open_prompt(Prompt::new(PromptKind::SaveTitle)),
        KeyCode::Esc => app.selected_message = None,
        _ => {}
    }
}

async fn handle_agents(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            if let Some(specialty) = app.selected_specialty() {
                app.controller.load_agent_memory(&specialty).await;
            }
        }
        KeyCode::Char('u') => {
            app.controller.usage_log().await;
            app.controller.evaluation_report().await;
            app.controller.list_checkpoints().await;
        }
        KeyCode::Char('c') => app.open_prompt(Prompt::new(PromptKind::Checkpoint)),
        KeyCode::Char('p') => {
            let newest = app
                .controller
                .state()
                .checkpoints
                .checkpoints
                .last()
                .map(|c| c.id.clone());
            if let Some(id) = newest {
                app.controller.promote_checkpoint(&id).await;
            }
        }
        KeyCode::Char('g') => app.controller.run_regression().await,
        KeyCode::Char('R') => app.controller.refresh_agent_stats().await,
        KeyCode::Char('y') => {
            if let Some(specialty) = app.selected_specialty() {
                let mut profile = app.controller.avatar_profile(&specialty);
                profile.shape = profile.shape.next();
                app.controller.set_avatar_profile(&specialty, profile);
            }
        }
        _ => {}
    }
}

async fn handle_memory(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('a') => app.open_prompt(Prompt::new(PromptKind::MemoryItem)),
        KeyCode::Char('e') | KeyCode::Enter => {
            let selected = app
                .list_state
                .selected()
                .and_then(|i| app.controller.state().memory_items.get(i))
                .map(|item| (item.id.clone(), item.text.clone()));
            if let Some((id, text)) = selected {
                let mut prompt = Prompt::for_target(PromptKind::MemoryEdit, id);
                prompt.input = TextInput::with_text(&text);
                app.open_prompt(prompt);
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = app.selected_id() {
                app.controller.delete_memory_item(&id).await;
                app.clamp_selection();
            }
        }
        KeyCode::Char(' ') => {
            // Toggle the selected item's scope in the active set
            let scope = app
                .list_state
                .selected()
                .and_then(|i| app.controller.state().memory_items.get(i))
                .map(|item| item.scope.clone());
            if let Some(scope) = scope {
                let mut active = app.controller.state().memory_scopes.active_scopes.clone();
                if let Some(pos) = active.iter().position(|s| *s == scope) {
                    active.remove(pos);
                } else {
                    active.push(scope);
                }
                app.controller.set_memory_scopes(active).await;
            }
        }
        KeyCode::Char('R') => app.open_prompt(Prompt::new(PromptKind::ResetMemory)),
        KeyCode::Char('l') => {
            if let Some(specialty) = app.controller.state().current_specialty.clone() {
                app.controller.load_agent_memory(&specialty).await;
            }
        }
        KeyCode::Char('f') => app.controller.refresh_memory_fact().await,
        KeyCode::Char('u') => app.controller.list_uploads().await,
        KeyCode::Char('x') => app.controller.clear_uploads().await,
        _ => {}
    }
}

fn handle_compare(app: &mut App, key: KeyEvent) {
    if matches!(key.code, KeyCode::Char(' ') | KeyCode::Enter) {
        if let Some(specialty) = app.selected_specialty() {
            app.controller.toggle_compare(&specialty);
        }
    }
}

async fn handle_history(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            if let Some(id) = app.selected_id() {
                app.controller.open_history_session(&id).await;
                app.reset_selection();
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = app.selected_id() {
                app.controller.delete_history_session(&id).await;
                app.clamp_selection();
            }
        }
        KeyCode::Char('S') => app.open_prompt(Prompt::new(PromptKind::SaveTitle)),
        _ => {}
    }
}

async fn handle_reminders(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('a') => app.open_prompt(Prompt::new(PromptKind::Reminder)),
        KeyCode::Char(' ') | KeyCode::Enter => {
            if let Some(id) = app.selected_id() {
                app.controller.toggle_reminder(&id).await;
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = app.selected_id() {
                app.controller.delete_reminder(&id).await;
                app.clamp_selection();
            }
        }
        _ => {}
    }
}

async fn handle_marketplace(app: &mut App, key: KeyEvent) {
    let Some(specialty) = app.selected_specialty() else {
        return;
    };
    match key.code {
        KeyCode::Char('x') => app.controller.mint_agent(&specialty).await,
        KeyCode::Char('p') => app.open_prompt(Prompt::for_target(PromptKind::ListPrice, specialty)),
        KeyCode::Char('b') => app.controller.buy_agent(&specialty).await,
        KeyCode::Char('h') => app.open_prompt(Prompt::for_target(PromptKind::RentHours, specialty)),
        KeyCode::Char('+') => app.controller.train_agent(&specialty, 1).await,
        KeyCode::Char('-') => app.controller.train_agent(&specialty, -1).await,
        _ => {}
    }
}

async fn handle_metaverse(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            if let Some(zone) = app.selected_id() {
                app.controller.travel(&zone).await;
            }
        }
        KeyCode::Char('t') => app.open_prompt(Prompt::new(PromptKind::Travel)),
        KeyCode::Char('/') => app.open_prompt(Prompt::new(PromptKind::VideoSearch)),
        _ => {}
    }
}
