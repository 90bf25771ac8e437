//! Periodic refreshes
//!
//! One repeating timer per data kind. Every tick spawns its own fetch, so a
//! slow response never delays or absorbs the next tick; results go down a
//! channel and whichever arrives last wins. Dropping a [`PollHandle`] stops
//! its timer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::api::{AgentStat, Backend, PresenceSnapshot, Reminder};
use crate::config::Config;
use crate::error::ClientResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollKind {
    AgentStats,
    MemoryFact,
    DueReminders,
    Presence,
}

/// Result of one poll fetch.
#[derive(Debug)]
pub enum PollUpdate {
    AgentStats(ClientResult<Vec<AgentStat>>),
    MemoryFact(ClientResult<String>),
    DueReminders(ClientResult<Vec<Reminder>>),
    Presence(ClientResult<PresenceSnapshot>),
}

impl PollUpdate {
    pub fn kind(&self) -> PollKind {
        match self {
            PollUpdate::AgentStats(_) => PollKind::AgentStats,
            PollUpdate::MemoryFact(_) => PollKind::MemoryFact,
            PollUpdate::DueReminders(_) => PollKind::DueReminders,
            PollUpdate::Presence(_) => PollKind::Presence,
        }
    }
}

/// Who is asking and about which agent; read on every tick so changes apply
/// to the next fetch.
#[derive(Debug, Clone, Default)]
pub struct PollContext {
    pub requester: String,
    pub specialty: Option<String>,
}

pub type SharedPollContext = Arc<RwLock<PollContext>>;

pub async fn fetch(kind: PollKind, backend: &dyn Backend, ctx: &PollContext) -> PollUpdate {
    let specialty = ctx.specialty.as_deref().unwrap_or("personal");
    match kind {
        PollKind::AgentStats => PollUpdate::AgentStats(backend.agent_stats(&ctx.requester).await),
        PollKind::MemoryFact => {
            PollUpdate::MemoryFact(backend.memory_fact(specialty, &ctx.requester).await)
        }
        PollKind::DueReminders => PollUpdate::DueReminders(backend.due_reminders().await),
        PollKind::Presence => PollUpdate::Presence(backend.presence(&ctx.requester).await),
    }
}

/// A running poll timer. Stops when cancelled or dropped.
#[derive(Debug)]
pub struct PollHandle {
    kind: PollKind,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn kind(&self) -> PollKind {
        self.kind
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling `kind` every `period`. The first fetch happens one period
/// from now.
pub fn spawn(
    kind: PollKind,
    period: Duration,
    backend: Arc<dyn Backend>,
    ctx: SharedPollContext,
    tx: UnboundedSender<PollUpdate>,
) -> PollHandle {
    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            let backend = backend.clone();
            let snapshot = ctx.read().clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let update = fetch(kind, backend.as_ref(), &snapshot).await;
                let _ = tx.send(update);
            });
        }
        tracing::debug!(?kind, "poller stopped");
    });

    PollHandle { kind, task }
}

/// The client's standard set of pollers.
#[derive(Debug, Default)]
pub struct Pollers {
    handles: Vec<PollHandle>,
}

impl Pollers {
    pub fn start(
        config: &Config,
        backend: Arc<dyn Backend>,
        ctx: SharedPollContext,
        tx: UnboundedSender<PollUpdate>,
    ) -> Self {
        let schedule = [
            (PollKind::AgentStats, config.stats_poll_secs),
            (PollKind::MemoryFact, config.fact_poll_secs),
            (PollKind::DueReminders, config.due_poll_secs),
            (PollKind::Presence, config.presence_poll_secs),
        ];

        let handles = schedule
            .into_iter()
            .filter(|(_, secs)| *secs > 0)
            .map(|(kind, secs)| {
                spawn(kind, Duration::from_secs(secs), backend.clone(), ctx.clone(), tx.clone())
            })
            .collect();

        Self { handles }
    }

    pub fn kinds(&self) -> Vec<PollKind> {
        self.handles.iter().map(PollHandle::kind).collect()
    }

    pub fn stop(&mut self) {
        for handle in &self.handles {
            handle.cancel();
        }
        self.handles.clear();
    }
}
