//! Due-reminder alerting
//!
//! The due poll keeps returning a reminder for as long as it is overdue, so
//! alerts are de-duplicated per reminder id: once alerted, the same id stays
//! quiet for [`SEEN_WINDOW`]. An alert that is still on screen after
//! [`REPEAT_DELAY`] chimes once more, spoken this time. "Seen" only governs
//! alerting; it never marks a reminder done.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::api::Reminder;

pub const SEEN_WINDOW: Duration = Duration::from_secs(90);
pub const REPEAT_DELAY: Duration = Duration::from_secs(7);

/// An alert currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderAlert {
    pub reminders: Vec<Reminder>,
    pub fired_at: Instant,
    /// When the one-shot escalation is due; `None` once it fired.
    pub repeat_at: Option<Instant>,
}

impl ReminderAlert {
    pub fn new(reminders: Vec<Reminder>, now: Instant) -> Self {
        Self {
            reminders,
            fired_at: now,
            repeat_at: Some(now + REPEAT_DELAY),
        }
    }

    /// True exactly once, when the escalation comes due.
    pub fn take_repeat(&mut self, now: Instant) -> bool {
        match self.repeat_at {
            Some(at) if now >= at => {
                self.repeat_at = None;
                true
            }
            _ => false,
        }
    }

    /// Sentence used for the spoken escalation.
    pub fn spoken_text(&self) -> String {
        let tasks: Vec<&str> = self.reminders.iter().map(|r| r.text.as_str()).collect();
        format!("Reminder: {}", tasks.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct DueAlerter {
    seen: HashMap<String, Instant>,
    window: Duration,
}

impl Default for DueAlerter {
    fn default() -> Self {
        Self::new()
    }
}

impl DueAlerter {
    pub fn new() -> Self {
        Self::with_window(SEEN_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            window,
        }
    }

    /// Feed one poll's worth of due reminders. Returns the ones that should
    /// alert now and marks them seen.
    pub fn observe(&mut self, due: &[Reminder], now: Instant) -> Vec<Reminder> {
        let window = self.window;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) < window);

        let mut fresh = Vec::new();
        for reminder in due {
            if reminder.done || self.seen.contains_key(&reminder.id) {
                continue;
            }
            self.seen.insert(reminder.id.clone(), now);
            fresh.push(reminder.clone());
        }

        if !fresh.is_empty() {
            tracing::info!(count = fresh.len(), "due reminders alerting");
        }
        fresh
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
