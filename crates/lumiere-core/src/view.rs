//! Screens and the panels that belong to them
//!
//! The client shows exactly one screen at a time. Each screen owns a fixed
//! group of panels; switching screens hides every managed panel and then
//! reveals the group of the new one. Front ends implement [`ViewSurface`] to
//! receive those instructions; [`PanelBoard`] is the headless implementation
//! the terminal UI reads from and tests assert against.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ViewState {
    #[default]
    Chat,
    Agents,
    Memory,
    Compare,
    History,
    Reminders,
    Marketplace,
    Metaverse,
}

impl ViewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::Chat => "chat",
            ViewState::Agents => "agents",
            ViewState::Memory => "memory",
            ViewState::Compare => "compare",
            ViewState::History => "history",
            ViewState::Reminders => "reminders",
            ViewState::Marketplace => "marketplace",
            ViewState::Metaverse => "metaverse",
        }
    }

    /// Exact identifier match. Case and surrounding whitespace count.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(ViewState::Chat),
            "agents" => Some(ViewState::Agents),
            "memory" => Some(ViewState::Memory),
            "compare" => Some(ViewState::Compare),
            "history" => Some(ViewState::History),
            "reminders" => Some(ViewState::Reminders),
            "marketplace" => Some(ViewState::Marketplace),
            "metaverse" => Some(ViewState::Metaverse),
            _ => None,
        }
    }

    /// Resolve a requested identifier, substituting chat for anything unknown.
    pub fn resolve(requested: &str) -> Self {
        Self::from_str(requested).unwrap_or_default()
    }

    pub fn all() -> Vec<ViewState> {
        vec![
            ViewState::Chat,
            ViewState::Agents,
            ViewState::Memory,
            ViewState::Compare,
            ViewState::History,
            ViewState::Reminders,
            ViewState::Marketplace,
            ViewState::Metaverse,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ViewState::Chat => "Chat",
            ViewState::Agents => "Agents",
            ViewState::Memory => "Memory",
            ViewState::Compare => "Compare",
            ViewState::History => "History",
            ViewState::Reminders => "Reminders",
            ViewState::Marketplace => "Marketplace",
            ViewState::Metaverse => "Metaverse",
        }
    }

    /// Number key bound to this screen in the navigation bar (1-8).
    pub fn hotkey(&self) -> char {
        match self {
            ViewState::Chat => '1',
            ViewState::Agents => '2',
            ViewState::Memory => '3',
            ViewState::Compare => '4',
            ViewState::History => '5',
            ViewState::Reminders => '6',
            ViewState::Marketplace => '7',
            ViewState::Metaverse => '8',
        }
    }

    pub fn from_hotkey(c: char) -> Option<Self> {
        Self::all().into_iter().find(|v| v.hotkey() == c)
    }

    /// Panels revealed when this screen is active.
    pub fn panels(&self) -> &'static [Panel] {
        match self {
            ViewState::Chat => &[Panel::Transcript, Panel::Composer],
            ViewState::Agents => &[Panel::AgentStats],
            ViewState::Memory => &[Panel::MemoryItems, Panel::AgentMemory],
            ViewState::Compare => &[Panel::CompareRadar],
            ViewState::History => &[Panel::HistoryList],
            ViewState::Reminders => &[Panel::ReminderList],
            ViewState::Marketplace => &[Panel::Marketplace],
            ViewState::Metaverse => &[Panel::Presence, Panel::Videos],
        }
    }
}

/// A region of the screen that view switching shows or hides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Panel {
    Transcript,
    Composer,
    AgentStats,
    MemoryItems,
    AgentMemory,
    CompareRadar,
    HistoryList,
    ReminderList,
    Marketplace,
    Presence,
    Videos,
}

impl Panel {
    pub fn all() -> Vec<Panel> {
        ViewState::all()
            .iter()
            .flat_map(|v| v.panels().iter().copied())
            .collect()
    }
}

/// Receives show/hide instructions from the view controller.
pub trait ViewSurface: Send {
    /// Mark `view`'s navigation control as selected and clear all others.
    fn select_nav(&mut self, view: ViewState);
    /// Hide every managed panel.
    fn hide_all(&mut self);
    /// Reveal one panel.
    fn reveal(&mut self, panel: Panel);
}

/// Headless surface: remembers the selected nav entry and the visible panels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelBoard {
    selected: Option<ViewState>,
    visible: BTreeSet<Panel>,
}

impl PanelBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<ViewState> {
        self.selected
    }

    pub fn is_visible(&self, panel: Panel) -> bool {
        self.visible.contains(&panel)
    }

    pub fn visible_panels(&self) -> Vec<Panel> {
        self.visible.iter().copied().collect()
    }

    /// Screens whose whole panel group is currently visible.
    pub fn visible_groups(&self) -> Vec<ViewState> {
        ViewState::all()
            .into_iter()
            .filter(|v| v.panels().iter().all(|p| self.visible.contains(p)))
            .collect()
    }
}

impl ViewSurface for PanelBoard {
    fn select_nav(&mut self, view: ViewState) {
        self.selected = Some(view);
    }

    fn hide_all(&mut self) {
        self.visible.clear();
    }

    fn reveal(&mut self, panel: Panel) {
        self.visible.insert(panel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_identifiers() {
        for view in ViewState::all() {
            assert_eq!(ViewState::from_str(view.as_str()), Some(view));
        }
    }

    #[test]
    fn test_unknown_resolves_to_chat() {
        assert_eq!(ViewState::resolve("bogus"), ViewState::Chat);
        assert_eq!(ViewState::resolve(""), ViewState::Chat);
        assert_eq!(ViewState::resolve("  History "), ViewState::Chat);
        assert_eq!(ViewState::resolve("Agents"), ViewState::Chat);
    }

    #[test]
    fn test_panel_groups_are_disjoint() {
        let all = Panel::all();
        let unique: BTreeSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
    }

    #[test]
    fn test_hotkeys() {
        assert_eq!(ViewState::from_hotkey('1'), Some(ViewState::Chat));
        assert_eq!(ViewState::from_hotkey('8'), Some(ViewState::Metaverse));
        assert_eq!(ViewState::from_hotkey('9'), None);
    }

    #[test]
    fn test_board_tracks_groups() {
        let mut board = PanelBoard::new();
        board.select_nav(ViewState::Metaverse);
        board.hide_all();
        for p in ViewState::Metaverse.panels() {
            board.reveal(*p);
        }
        assert_eq!(board.visible_groups(), vec![ViewState::Metaverse]);
        assert_eq!(board.selected(), Some(ViewState::Metaverse));
        assert!(!board.is_visible(Panel::Transcript));
    }
}
