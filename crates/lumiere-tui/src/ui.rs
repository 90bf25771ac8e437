use lumiere_core::api::AgentStat;
use lumiere_core::state::{parse_timestamp, ToastLevel};
use lumiere_core::theme::accent_rgb;
use lumiere_core::{ChatRole, ViewState};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, Prompt};

/// Colours derived from the theme preference and accent.
#[derive(Debug, Clone, Copy)]
struct Palette {
    accent: Color,
    text: Color,
    muted: Color,
    surface: Color,
}

impl Palette {
    fn from_app(app: &App) -> Self {
        let state = app.controller.state();
        let accent = state
            .accent
            .as_deref()
            .and_then(hex_color)
            .unwrap_or(Color::Cyan);
        if state.theme.is_dark() {
            Self {
                accent,
                text: Color::White,
                muted: Color::DarkGray,
                surface: Color::Black,
            }
        } else {
            Self {
                accent,
                text: Color::Black,
                muted: Color::Gray,
                surface: Color::White,
            }
        }
    }

    fn block(&self, title: String, focused: bool) -> Block<'static> {
        let border = if focused { self.accent } else { self.muted };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title)
    }

    fn highlight(&self) -> Style {
        Style::default()
            .bg(self.accent)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    }
}

fn hex_color(hex: &str) -> Option<Color> {
    accent_rgb(hex).map(|(r, g, b)| Color::Rgb(r, g, b))
}

fn short_time(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

fn meter(value: f64, max: f64, width: usize) -> String {
    let filled = ((value / max).clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::from_app(app);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, palette, frame, header_area);

    frame.render_widget(
        Block::default().style(Style::default().bg(palette.surface).fg(palette.text)),
        body_area,
    );
    match app.view() {
        ViewState::Chat => render_chat(app, palette, frame, body_area),
        ViewState::Agents => render_agents(app, palette, frame, body_area),
        ViewState::Memory => render_memory(app, palette, frame, body_area),
        ViewState::Compare => render_compare(app, palette, frame, body_area),
        ViewState::History => render_history(app, palette, frame, body_area),
        ViewState::Reminders => render_reminders(app, palette, frame, body_area),
        ViewState::Marketplace => render_marketplace(app, palette, frame, body_area),
        ViewState::Metaverse => render_metaverse(app, palette, frame, body_area),
    }

    render_footer(app, frame, footer_area);
    render_toasts(app, frame, body_area);

    // Popups, highest priority last
    if let Some(prompt) = &app.prompt {
        render_prompt(prompt, palette, frame, area);
    }
    if app.controller.state().alert.is_some() {
        render_alert(app, frame, area);
    }
    if app.show_welcome {
        render_welcome(palette, frame, area);
    }
}

fn render_header(app: &App, palette: Palette, frame: &mut Frame, area: Rect) {
    let state = app.controller.state();

    let mut spans = vec![Span::styled(
        " Lumiere ",
        Style::default().fg(palette.accent).bold(),
    )];
    for view in ViewState::all() {
        let label = format!(" {} {} ", view.hotkey(), view.display_name());
        let style = if view == state.view {
            Style::default().bg(palette.accent).fg(Color::Black).bold()
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(label, style));
    }

    let stage = app.controller.growth_stage();
    let who = match &state.auth_user {
        Some(user) => format!(" {} (signed in as {}) ", state.acting_as, user),
        None if state.auth_required => format!(" {} (sign in required) ", state.acting_as),
        None => format!(" {} ", state.acting_as),
    };
    spans.extend([
        Span::styled(who, Style::default().fg(Color::White)),
        Span::styled(
            format!("{} {} ", stage.glyph(), stage.display_name()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("{} ", state.theme.pref().as_str()),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn hint(key: &str, label: &str) -> [Span<'static>; 2] {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    [
        Span::styled(format!(" {key} "), key_style),
        Span::styled(format!(" {label} "), label_style),
    ]
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = format!(" {} ", app.view().display_name().to_uppercase());

    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints: Vec<Span> = Vec::new();
    if app.prompt.is_some() {
        hints.extend(hint("Enter", "ok"));
        hints.extend(hint("Esc", "cancel"));
    } else if app.input_mode == InputMode::Editing {
        hints.extend(hint("Enter", "send"));
        hints.extend(hint("Esc", "stop typing"));
    } else {
        let keys: &[(&str, &str)] = match app.view() {
            ViewState::Chat => &[
                ("i", "ask"),
                ("m", "mode"),
                ("r", "retry"),
                ("s", "simplify"),
                ("e", "edit"),
                ("+/-", "rate"),
                ("t", "translate"),
                ("S", "save"),
            ],
            ViewState::Agents => &[
                ("Enter", "memory"),
                ("y", "avatar"),
                ("u", "usage"),
                ("c", "checkpoint"),
                ("p", "promote"),
                ("g", "regression"),
            ],
            ViewState::Memory => &[
                ("a", "add"),
                ("e", "edit"),
                ("d", "delete"),
                ("Space", "scope"),
                ("u", "uploads"),
                ("x", "clear uploads"),
                ("R", "reset"),
            ],
            ViewState::Compare => &[("Space", "compare")],
            ViewState::History => &[("Enter", "open"), ("d", "delete"), ("S", "save")],
            ViewState::Reminders => &[("a", "add"), ("Space", "done"), ("d", "delete")],
            ViewState::Marketplace => &[
                ("x", "mint"),
                ("p", "list"),
                ("b", "buy"),
                ("h", "rent"),
                ("+/-", "train"),
            ],
            ViewState::Metaverse => &[("Enter", "travel"), ("/", "videos")],
        };
        for &(key, label) in keys {
            hints.extend(hint(key, label));
        }
        hints.extend(hint("1-8", "screens"));
        hints.extend(hint("n", "new"));
        hints.extend(hint("q", "quit"));
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Rows a set of lines occupies once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum::<usize>()
        .min(u16::MAX as usize) as u16
}

fn render_chat(app: &App, palette: Palette, frame: &mut Frame, area: Rect) {
    let state = app.controller.state();
    let fact_height = if state.memory_fact.is_some() { 1 } else { 0 };
    let [chat_area, fact_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(fact_height),
        Constraint::Length(3),
    ])
    .areas(area);

    let title = match &state.current_specialty {
        Some(specialty) => format!(" {} ", state.agent_label(Some(specialty.as_str()))),
        None => " Chat ".to_string(),
    };
    let chat_block = palette.block(title, app.input_mode == InputMode::Normal);

    let mut lines: Vec<Line> = Vec::new();
    let mut selected_start = None;
    for (i, msg) in state.messages.iter().enumerate() {
        let selected = app.selected_message == Some(i);
        if selected {
            selected_start = Some(lines.len());
        }
        let marker = if selected { "▶ " } else { "" };
        let (name, style) = match msg.role {
            ChatRole::User => (
                format!("{marker}{}:", msg.label),
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
            ChatRole::Ai => {
                let glyph = msg
                    .agent
                    .as_deref()
                    .map(|s| app.controller.avatar_profile(s).shape.glyph())
                    .unwrap_or("●");
                let name = match msg.level {
                    Some(level) => format!("{marker}{glyph} {} (Lv {level}):", msg.label),
                    None => format!("{marker}{glyph} {}:", msg.label),
                };
                (name, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            }
            ChatRole::System => (
                format!("{marker}{}:", msg.label),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
        };
        lines.push(Line::from(vec![
            Span::styled(name, style),
            Span::styled(
                format!(" {}", short_time(&msg.timestamp)),
                Style::default().fg(palette.muted),
            ),
        ]));
        for line in msg.content_text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        if let Some(translation) = &msg.translation {
            lines.push(Line::from(Span::styled(
                format!("↳ {translation}"),
                Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
            )));
        }
        lines.push(Line::default());
    }

    if app.is_loading() {
        lines.push(Line::from(Span::styled(
            "Lumiere:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask Lumiere anything...",
            Style::default().fg(palette.muted),
        )));
    }

    // Follow the newest message unless one is selected
    let inner_width = chat_area.width.saturating_sub(2);
    let inner_height = chat_area.height.saturating_sub(2);
    let scroll = match selected_start {
        Some(start) => wrapped_height(&lines[..start], inner_width),
        None => wrapped_height(&lines, inner_width).saturating_sub(inner_height),
    };

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(chat, chat_area);

    if let Some(fact) = &state.memory_fact {
        let fact_line = Paragraph::new(Line::from(vec![
            Span::styled(" ✦ ", Style::default().fg(palette.accent)),
            Span::styled(fact.clone(), Style::default().fg(palette.muted).italic()),
        ]));
        frame.render_widget(fact_line, fact_area);
    }

    let model = state.model.as_deref().unwrap_or("default model");
    let mut input_title = format!(" {} · {} ", state.ask_mode.display_name(), model);
    if let Some(target) = &state.auto_translate {
        input_title.push_str(&format!("· auto-translate {target} "));
    }
    if state.last_failed.is_some() {
        input_title.push_str("· r retry, e edit ");
    }
    let input_block = palette.block(input_title, app.input_mode == InputMode::Editing);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.composer.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .composer
        .text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(palette.accent))
        .block(input_block);
    frame.render_widget(input, input_area);

    // Show cursor when editing
    if app.input_mode == InputMode::Editing && app.prompt.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn agent_row(app: &App, stat: &AgentStat, palette: Palette) -> Line<'static> {
    let profile = app.controller.avatar_profile(&stat.specialty);
    let color = hex_color(&profile.color).unwrap_or(palette.accent);
    Line::from(vec![
        Span::styled(format!("{} ", profile.shape.glyph()), Style::default().fg(color)),
        Span::styled(format!("{:<12}", stat.name), Style::default().bold()),
        Span::styled(
            format!("{:<12}", stat.specialty),
            Style::default().fg(palette.muted),
        ),
        Span::raw(format!("Lv {:<3}", stat.level)),
        Span::styled(meter(stat.accuracy, 100.0, 10), Style::default().fg(color)),
        Span::raw(format!(" {:>5.1}%", stat.accuracy)),
    ])
}

fn render_agents(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let [list_area, side_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);

    let state = app.controller.state();
    let items: Vec<ListItem> = state
        .agent_stats
        .iter()
        .map(|stat| ListItem::new(agent_row(app, stat, palette)))
        .collect();
    let list = List::new(items)
        .block(palette.block(format!(" Agents ({}) ", state.agent_stats.len()), true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.list_state);

    let state = app.controller.state();
    let mut lines: Vec<Line> = Vec::new();
    let heading = |text: &str| {
        Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        ))
    };

    lines.push(heading("Usage"));
    match &state.usage {
        Some(usage) if !usage.agents.is_empty() => {
            for row in &usage.agents {
                lines.push(Line::from(format!(
                    "  {:<12} {:>4} msgs  +{} / -{}",
                    row.specialty, row.messages, row.ratings_up, row.ratings_down
                )));
            }
        }
        Some(_) => lines.push(Line::from("  No usage yet.")),
        None => lines.push(Line::from(Span::styled(
            "  Press u to load.",
            Style::default().fg(palette.muted),
        ))),
    }

    lines.push(Line::default());
    lines.push(heading("Checkpoints"));
    let active = state.checkpoints.active_checkpoint_id.as_deref();
    for checkpoint in &state.checkpoints.checkpoints {
        let marker = if Some(checkpoint.id.as_str()) == active { "*" } else { " " };
        lines.push(Line::from(format!(
            " {marker}{} {} {}",
            checkpoint.id, checkpoint.status, checkpoint.notes
        )));
    }

    if let Some(run) = &state.regression {
        lines.push(Line::default());
        let (verdict, color) = if run.passed {
            ("Regression passed", Color::Green)
        } else {
            ("Regression failed", Color::Red)
        };
        lines.push(Line::from(Span::styled(verdict, Style::default().fg(color).bold())));
        for check in &run.checks {
            let mark = if check.pass { "✓" } else { "✗" };
            lines.push(Line::from(format!("  {mark} {}", check.name)));
        }
    }

    if let Some(evaluation) = &state.evaluation {
        lines.push(Line::default());
        lines.push(heading("Evaluation"));
        if let Some(fields) = evaluation.as_object() {
            for (key, value) in fields {
                lines.push(Line::from(format!("  {key}: {value}")));
            }
        }
    }

    let side = Paragraph::new(Text::from(lines))
        .block(palette.block(" Analytics ".to_string(), false))
        .wrap(Wrap { trim: true });
    frame.render_widget(side, side_area);
}

fn render_memory(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let [list_area, side_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);

    let state = app.controller.state();
    let active = &state.memory_scopes.active_scopes;
    let items: Vec<ListItem> = state
        .memory_items
        .iter()
        .map(|item| {
            let scope_style = if active.contains(&item.scope) {
                Style::default().fg(palette.accent)
            } else {
                Style::default().fg(palette.muted)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", item.scope), scope_style),
                Span::raw(item.text.clone()),
                Span::styled(
                    format!(" ({:.0}%)", item.confidence * 100.0),
                    Style::default().fg(palette.muted),
                ),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(palette.block(" Memory ".to_string(), true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.list_state);

    let state = app.controller.state();
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        "Scopes",
        Style::default().fg(palette.accent).bold(),
    ))];
    for scope in &state.memory_scopes.available_scopes {
        let mark = if active.contains(scope) { "✓" } else { " " };
        lines.push(Line::from(format!("  {mark} {scope}")));
    }

    if let Some(memory) = &state.agent_memory {
        lines.push(Line::default());
        let level = memory.level.map(|l| format!(" (Lv {l})")).unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("{}{}", memory.name, level),
            Style::default().fg(palette.accent).bold(),
        )));
        if memory.facts.is_empty() {
            lines.push(Line::from("  Nothing learned yet."));
        }
        for fact in &memory.facts {
            lines.push(Line::from(format!("  • {fact}")));
        }
        lines.push(Line::from(Span::styled(
            format!("  {} past exchanges", memory.history.len()),
            Style::default().fg(palette.muted),
        )));
    }

    if !state.uploads.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Uploads",
            Style::default().fg(palette.accent).bold(),
        )));
        for upload in &state.uploads {
            lines.push(Line::from(format!("  {} ({} bytes)", upload.name, upload.size)));
        }
    }

    let side = Paragraph::new(Text::from(lines))
        .block(palette.block(" Scopes and agent memory ".to_string(), false))
        .wrap(Wrap { trim: true });
    frame.render_widget(side, side_area);
}

fn render_compare(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let [list_area, side_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

    let state = app.controller.state();
    let items: Vec<ListItem> = state
        .agent_stats
        .iter()
        .map(|stat| {
            let mark = if state.compare.contains(&stat.specialty) { "[x]" } else { "[ ]" };
            ListItem::new(format!("{mark} {} ({})", stat.name, stat.specialty))
        })
        .collect();
    let list = List::new(items)
        .block(palette.block(" Pick up to two ".to_string(), true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.list_state);

    let state = app.controller.state();
    let max_level = state.agent_stats.iter().map(|s| s.level).max().unwrap_or(1).max(1) as f64;
    let mut lines: Vec<Line> = Vec::new();
    for specialty in &state.compare {
        let Some(stat) = state.stat_for(specialty) else {
            continue;
        };
        let profile = app.controller.avatar_profile(specialty);
        let color = hex_color(&profile.color).unwrap_or(palette.accent);
        lines.push(Line::from(Span::styled(
            format!("{} {}", profile.shape.glyph(), stat.name),
            Style::default().fg(color).bold(),
        )));
        lines.push(Line::from(vec![
            Span::raw("  accuracy "),
            Span::styled(meter(stat.accuracy, 100.0, 20), Style::default().fg(color)),
            Span::raw(format!(" {:.1}%", stat.accuracy)),
        ]));
        lines.push(Line::from(vec![
            Span::raw("  level    "),
            Span::styled(meter(stat.level as f64, max_level, 20), Style::default().fg(color)),
            Span::raw(format!(" {}", stat.level)),
        ]));
        lines.push(Line::default());
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Select agents to compare.",
            Style::default().fg(palette.muted),
        )));
    }

    let side = Paragraph::new(Text::from(lines))
        .block(palette.block(" Comparison ".to_string(), false));
    frame.render_widget(side, side_area);
}

fn render_history(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let state = app.controller.state();
    let items: Vec<ListItem> = state
        .history
        .iter()
        .map(|session| {
            let when = session
                .updated_at
                .as_deref()
                .or(session.created_at.as_deref())
                .unwrap_or("");
            ListItem::new(Line::from(vec![
                Span::styled(session.title.clone(), Style::default().bold()),
                Span::styled(
                    format!("  {} messages  {}", session.message_count, when),
                    Style::default().fg(palette.muted),
                ),
            ]))
        })
        .collect();
    let title = if items.is_empty() {
        " Saved chats (none yet) ".to_string()
    } else {
        " Saved chats ".to_string()
    };
    let list = List::new(items)
        .block(palette.block(title, true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_reminders(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let state = app.controller.state();
    let items: Vec<ListItem> = state
        .reminders
        .iter()
        .map(|reminder| {
            let (mark, style) = if reminder.done {
                ("[x]", Style::default().fg(palette.muted).add_modifier(Modifier::CROSSED_OUT))
            } else {
                ("[ ]", Style::default())
            };
            let mut spans = vec![Span::styled(format!("{mark} {}", reminder.text), style)];
            if let Some(due) = &reminder.due_at {
                spans.push(Span::styled(
                    format!("  due {due}"),
                    Style::default().fg(palette.muted),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let list = List::new(items)
        .block(palette.block(" Reminders ".to_string(), true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_marketplace(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let [list_area, side_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);

    let state = app.controller.state();
    let items: Vec<ListItem> = state
        .agent_stats
        .iter()
        .map(|stat| {
            let status = match &stat.token {
                None => Span::styled("not minted", Style::default().fg(palette.muted)),
                Some(token) if token.listed => Span::styled(
                    format!("listed {:.2} SOL", token.list_price_sol.unwrap_or(0.0)),
                    Style::default().fg(Color::Green),
                ),
                Some(token) => Span::raw(format!(
                    "held by {}",
                    token
                        .holder
                        .as_deref()
                        .or(token.owner.as_deref())
                        .unwrap_or("nobody")
                )),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<14}", stat.name), Style::default().bold()),
                status,
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(palette.block(" Agent tokens ".to_string(), true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.list_state);

    let market = &app.controller.state().marketplace;
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        format!("Network: {}", market.network.as_deref().unwrap_or("unknown")),
        Style::default().fg(palette.muted),
    ))];
    lines.push(Line::default());
    if market.listed.is_empty() {
        lines.push(Line::from("Nothing listed."));
    }
    for listing in &market.listed {
        lines.push(Line::from(format!(
            "{} ({})  {:.2} SOL",
            listing.agent_name,
            listing.specialty,
            listing.price_sol.unwrap_or(0.0)
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!("{} recent events", market.recent_events.len()),
        Style::default().fg(palette.muted),
    )));

    let side = Paragraph::new(Text::from(lines))
        .block(palette.block(" Listings ".to_string(), false))
        .wrap(Wrap { trim: true });
    frame.render_widget(side, side_area);
}

fn render_metaverse(app: &mut App, palette: Palette, frame: &mut Frame, area: Rect) {
    let enabled = app
        .controller
        .state()
        .presence
        .as_ref()
        .is_some_and(|p| p.enabled);
    if !enabled {
        let notice = Paragraph::new("The metaverse is disabled on this server.")
            .style(Style::default().fg(palette.muted))
            .block(palette.block(" Metaverse ".to_string(), false));
        frame.render_widget(notice, area);
        return;
    }

    let [list_area, side_area] =
        Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).areas(area);

    let state = app.controller.state();
    let presence = state.presence.as_ref();
    let here = presence.and_then(|p| p.me.as_ref()).map(|me| me.zone.as_str());
    let zones = presence.map(|p| p.zones.as_slice()).unwrap_or(&[]);
    let items: Vec<ListItem> = zones
        .iter()
        .map(|zone| {
            let mark = if Some(zone.id.as_str()) == here { "● " } else { "  " };
            ListItem::new(vec![
                Line::from(Span::styled(
                    format!("{mark}{}", zone.label),
                    Style::default().bold(),
                )),
                Line::from(Span::styled(
                    format!("  {}", zone.description),
                    Style::default().fg(palette.muted),
                )),
            ])
        })
        .collect();
    let list = List::new(items)
        .block(palette.block(" Zones ".to_string(), true))
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, list_area, &mut app.list_state);

    let state = app.controller.state();
    let mut lines: Vec<Line> = vec![Line::from(Span::styled(
        "Online",
        Style::default().fg(palette.accent).bold(),
    ))];
    if let Some(presence) = &state.presence {
        for person in &presence.online {
            lines.push(Line::from(format!(
                "  {} in {} ({})",
                person.display_name, person.zone_label, person.status
            )));
        }
    }
    if !state.videos.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Videos",
            Style::default().fg(palette.accent).bold(),
        )));
        for video in &state.videos {
            lines.push(Line::from(format!("  {}", video.title)));
            lines.push(Line::from(Span::styled(
                format!("    {}", video.url),
                Style::default().fg(palette.muted),
            )));
        }
    }

    let side = Paragraph::new(Text::from(lines))
        .block(palette.block(" Presence ".to_string(), false))
        .wrap(Wrap { trim: true });
    frame.render_widget(side, side_area);
}

fn render_toasts(app: &App, frame: &mut Frame, area: Rect) {
    let toasts = &app.controller.state().toasts;
    let width = 48.min(area.width);
    for (i, toast) in toasts.iter().rev().take(4).enumerate() {
        let y = area.bottom().saturating_sub(1 + i as u16);
        if y <= area.y {
            break;
        }
        let rect = Rect::new(area.right().saturating_sub(width), y, width, 1);
        let style = match toast.level {
            ToastLevel::Info => Style::default().bg(Color::Blue).fg(Color::White),
            ToastLevel::Error => Style::default().bg(Color::Red).fg(Color::White),
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(Paragraph::new(format!(" {}", toast.message)).style(style), rect);
    }
}

fn render_alert(app: &App, frame: &mut Frame, area: Rect) {
    let Some(alert) = &app.controller.state().alert else {
        return;
    };
    let popup_area = centered(area, 50, alert.reminders.len() as u16 + 4);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Reminder due ");

    let mut lines: Vec<Line> = alert
        .reminders
        .iter()
        .map(|r| Line::from(format!(" • {}", r.text)))
        .collect();
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        " Enter to acknowledge",
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), popup_area);
}

fn render_prompt(prompt: &Prompt, palette: Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 60, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" {} ", prompt.kind.title()));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let display_text = if prompt.kind.masked() {
        "*".repeat(prompt.input.text.chars().count())
    } else {
        prompt.input.text.clone()
    };
    let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(palette.accent)),
        input_area,
    );

    let cursor_x = prompt.input.cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
}

fn render_welcome(palette: Palette, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 60, 12);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent))
        .title(" Welcome to Lumiere ");
    let lines = vec![
        Line::from("Lumiere routes each question to a specialist agent."),
        Line::default(),
        Line::from(" 1-8  switch screens"),
        Line::from(" i    ask a question from the Chat screen"),
        Line::from(" @    choose who you are acting as"),
        Line::from(" L    sign in, O to sign out"),
        Line::from(" T    cycle light, dark and system themes"),
        Line::default(),
        Line::from(Span::styled(
            "Press any key to begin.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(lines)).block(block).wrap(Wrap { trim: false }),
        popup_area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_clamps() {
        assert_eq!(meter(50.0, 100.0, 4), "██░░");
        assert_eq!(meter(150.0, 100.0, 4), "████");
        assert_eq!(meter(-3.0, 100.0, 2), "░░");
    }

    #[test]
    fn test_wrapped_height_counts_blank_lines() {
        let lines = vec![Line::from("abcdef"), Line::default()];
        assert_eq!(wrapped_height(&lines, 4), 3);
    }

    #[test]
    fn test_centered_fits_inside() {
        let area = Rect::new(0, 0, 20, 10);
        let popup = centered(area, 60, 5);
        assert!(popup.width <= 16);
        assert_eq!(popup.height, 5);
    }
}
