//! # State registry - shared table of managed process states.
//!
//! The registry is the single source of truth observers read. Every supervisor
//! writes only the entry bearing its own name; dashboards read snapshots and
//! subscribe to change notifications.
//!
//! ## Architecture
//! ```text
//! Supervisor "zone0" ──┐ set_state / set_pid
//! Supervisor "world" ──┼──────────────────────► RwLock<HashMap<name, Entry>>
//! Supervisor "ucs"   ──┘                                │ (only on real change)
//!                                                       ▼
//!                                      notify(Change) ─► [queue O1] ─► observer 1
//!                                                    └─► [queue O2] ─► observer 2
//!
//! Observers: snapshot() ─► Snapshot { processes, zones: ZoneSummary }
//! ```
//!
//! ## Rules
//! - Entries are created on first write and never removed.
//! - A write that does not change the stored value sends no notification.
//! - Notifications are sent after the table lock is released.
//! - A full notification queue blocks the writer (backpressure, not an error);
//!   queues whose receiver was dropped are pruned.
//! - Entries whose name contains `zone` are aggregated in [`ZoneSummary`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;

use crate::state::AppState;

/// What changed in a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// New lifecycle state.
    State(AppState),
    /// New OS process id (0 = not running).
    Pid(u32),
}

/// Change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Process whose entry changed.
    pub name: Arc<str>,
    /// New value.
    pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
struct Entry {
    state: AppState,
    pid: u32,
    started_at: Instant,
}

impl Entry {
    fn new() -> Self {
        Self {
            state: AppState::Unknown,
            pid: 0,
            started_at: Instant::now(),
        }
    }
}

/// Point-in-time view of one managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Logical name.
    pub name: String,
    /// Current state.
    pub state: AppState,
    /// OS process id (0 = not running).
    pub pid: u32,
    /// Time since the entry's start time was last reset.
    pub uptime: Duration,
}

impl ProcessStatus {
    /// Uptime rounded to its coarsest unit (`0s`, `42s`, `5m`, `3h`, `2d`).
    pub fn uptime_label(&self) -> String {
        format_uptime(self.uptime)
    }

    /// True if the entry is aggregated as a zone worker.
    pub fn is_zone(&self) -> bool {
        is_zone(&self.name)
    }
}

/// Aggregate counts over zone entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneSummary {
    pub total: usize,
    pub unknown: usize,
    pub starting: usize,
    pub running: usize,
    pub sleeping: usize,
    pub erroring: usize,
    pub restarting: usize,
    pub stopped: usize,
}

impl ZoneSummary {
    fn count(&mut self, state: AppState) {
        self.total += 1;
        let slot = match state {
            AppState::Unknown => &mut self.unknown,
            AppState::Starting => &mut self.starting,
            AppState::Running => &mut self.running,
            AppState::Sleeping => &mut self.sleeping,
            AppState::Erroring => &mut self.erroring,
            AppState::Restarting => &mut self.restarting,
            AppState::Stopped => &mut self.stopped,
        };
        *slot += 1;
    }
}

/// Read-consistent copy of the whole registry.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Every entry, sorted by name.
    pub processes: Vec<ProcessStatus>,
    /// Counts over zone entries.
    pub zones: ZoneSummary,
}

impl Snapshot {
    /// Entries reported individually (everything that is not a zone).
    pub fn others(&self) -> impl Iterator<Item = &ProcessStatus> {
        self.processes.iter().filter(|p| !p.is_zone())
    }

    /// Looks up one entry by name.
    pub fn get(&self, name: &str) -> Option<&ProcessStatus> {
        self.processes.iter().find(|p| p.name == name)
    }
}

/// Concurrency-safe table of managed process states.
pub struct Registry {
    entries: RwLock<HashMap<String, Entry>>,
    subscribers: Mutex<Vec<mpsc::Sender<Change>>>,
    capacity: usize,
}

impl Registry {
    /// Creates an empty registry whose notification queues hold `capacity` items.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        })
    }

    /// Registers a new observer.
    ///
    /// The receiver gets one [`Change`] per effective write made after this call.
    /// Dropping it unsubscribes.
    pub fn subscribe(&self) -> mpsc::Receiver<Change> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Upserts the state of `name`; notifies only if it differs from the stored one.
    pub async fn set_state(&self, name: &str, state: AppState) {
        let changed = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(name.to_string()).or_insert_with(Entry::new);
            let changed = entry.state != state;
            entry.state = state;
            changed
        };

        if changed {
            self.notify(name, ChangeKind::State(state)).await;
        }
    }

    /// Upserts the pid of `name`; `0` also resets its start time.
    ///
    /// Notifies only if the pid differs from the stored one.
    pub async fn set_pid(&self, name: &str, pid: u32) {
        let changed = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(name.to_string()).or_insert_with(Entry::new);
            if pid == 0 {
                entry.started_at = Instant::now();
            }
            let changed = entry.pid != pid;
            entry.pid = pid;
            changed
        };

        if changed {
            self.notify(name, ChangeKind::Pid(pid)).await;
        }
    }

    /// Returns a copy of all entries plus zone aggregates.
    pub async fn snapshot(&self) -> Snapshot {
        let entries = self.entries.read().await;
        let now = Instant::now();

        let mut snap = Snapshot::default();
        for (name, e) in entries.iter() {
            if is_zone(name) {
                snap.zones.count(e.state);
            }
            snap.processes.push(ProcessStatus {
                name: name.clone(),
                state: e.state,
                pid: e.pid,
                uptime: now.saturating_duration_since(e.started_at),
            });
        }
        drop(entries);

        snap.processes.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        snap
    }

    /// Current state of `name`, if it has an entry.
    pub async fn state(&self, name: &str) -> Option<AppState> {
        self.entries.read().await.get(name).map(|e| e.state)
    }

    /// Current pid of `name`, if it has an entry.
    pub async fn pid(&self, name: &str) -> Option<u32> {
        self.entries.read().await.get(name).map(|e| e.pid)
    }

    /// Sorted names of entries not yet `Stopped` or still holding a live pid.
    pub async fn not_stopped(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut names: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.state.is_terminal() || e.pid != 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    async fn notify(&self, name: &str, kind: ChangeKind) {
        let senders: Vec<mpsc::Sender<Change>> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if senders.is_empty() {
            return;
        }

        let change = Change {
            name: Arc::from(name),
            kind,
        };
        let mut closed = false;
        for tx in &senders {
            if tx.send(change.clone()).await.is_err() {
                closed = true;
            }
        }

        if closed {
            self.subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tx| !tx.is_closed());
        }
    }
}

/// Zone workers are recognised by name.
pub fn is_zone(name: &str) -> bool {
    name.contains("zone")
}

/// Renders an uptime the way dashboards show it.
///
/// Below one second → `0s`; otherwise rounded to seconds, minutes, hours or
/// days depending on magnitude.
pub fn format_uptime(d: Duration) -> String {
    const MIN: u64 = 60;
    const HOUR: u64 = 60 * MIN;
    const DAY: u64 = 24 * HOUR;

    if d < Duration::from_secs(1) {
        return "0s".to_string();
    }
    let round = |unit: u64| (d.as_millis() as u64 + unit * 500) / (unit * 1000);

    let secs = d.as_secs();
    if secs < MIN {
        format!("{}s", round(1))
    } else if secs < HOUR {
        format!("{}m", round(MIN))
    } else if secs < DAY {
        format!("{}h", round(HOUR))
    } else {
        format!("{}d", round(DAY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_state_creates_entry() {
        let reg = Registry::new(16);
        assert_eq!(reg.state("world").await, None);

        reg.set_state("world", AppState::Starting).await;
        assert_eq!(reg.state("world").await, Some(AppState::Starting));
        assert_eq!(reg.pid("world").await, Some(0));
    }

    #[tokio::test]
    async fn test_repeated_state_notifies_once() {
        let reg = Registry::new(16);
        let mut rx = reg.subscribe();

        for _ in 0..5 {
            reg.set_state("zone0", AppState::Running).await;
        }

        let first = rx.try_recv().unwrap();
        assert_eq!(first.kind, ChangeKind::State(AppState::Running));
        assert_eq!(&*first.name, "zone0");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_repeated_pid_notifies_once() {
        let reg = Registry::new(16);
        let mut rx = reg.subscribe();

        for _ in 0..5 {
            reg.set_pid("ucs", 4242).await;
        }

        assert_eq!(rx.try_recv().unwrap().kind, ChangeKind::Pid(4242));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pid_zero_on_new_entry_is_not_a_change() {
        let reg = Registry::new(16);
        let mut rx = reg.subscribe();

        reg.set_pid("ucs", 0).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(reg.pid("ucs").await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pid_zero_resets_uptime() {
        let reg = Registry::new(16);
        reg.set_pid("world", 10).await;

        tokio::time::advance(Duration::from_secs(90)).await;
        let snap = reg.snapshot().await;
        assert_eq!(snap.get("world").unwrap().uptime, Duration::from_secs(90));

        reg.set_pid("world", 0).await;
        let snap = reg.snapshot().await;
        assert_eq!(snap.get("world").unwrap().uptime, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonzero_pid_keeps_uptime() {
        let reg = Registry::new(16);
        reg.set_pid("world", 10).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        reg.set_pid("world", 11).await;

        let snap = reg.snapshot().await;
        assert_eq!(snap.get("world").unwrap().uptime, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_snapshot_aggregates_zones() {
        let reg = Registry::new(64);
        reg.set_state("zone0", AppState::Running).await;
        reg.set_state("zone1", AppState::Sleeping).await;
        reg.set_state("zone2", AppState::Sleeping).await;
        reg.set_state("zone3", AppState::Restarting).await;
        reg.set_state("world", AppState::Running).await;
        reg.set_state("ucs", AppState::Erroring).await;

        let snap = reg.snapshot().await;
        assert_eq!(
            snap.zones,
            ZoneSummary {
                total: 4,
                running: 1,
                sleeping: 2,
                restarting: 1,
                ..ZoneSummary::default()
            }
        );

        let others: Vec<&str> = snap.others().map(|p| p.name.as_str()).collect();
        assert_eq!(others, ["ucs", "world"]);
        assert_eq!(snap.processes.len(), 6);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_notified() {
        let reg = Registry::new(4);
        let mut a = reg.subscribe();
        let mut b = reg.subscribe();

        reg.set_state("world", AppState::Starting).await;

        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let reg = Registry::new(1);
        let rx = reg.subscribe();
        drop(rx);

        reg.set_state("world", AppState::Starting).await;
        reg.set_state("world", AppState::Running).await;
        assert!(reg.subscribers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let reg = Registry::new(1);
        let mut rx = reg.subscribe();
        reg.set_state("world", AppState::Starting).await;

        let writer = {
            let reg = Arc::clone(&reg);
            tokio::spawn(async move { reg.set_state("world", AppState::Running).await })
        };
        tokio::task::yield_now().await;
        assert!(!writer.is_finished());

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::State(AppState::Starting));
        writer.await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::State(AppState::Running));
    }

    #[tokio::test]
    async fn test_not_stopped() {
        let reg = Registry::new(16);
        reg.set_state("zone0", AppState::Stopped).await;
        reg.set_state("world", AppState::Running).await;
        reg.set_state("ucs", AppState::Restarting).await;
        reg.set_state("zone1", AppState::Stopped).await;
        reg.set_pid("zone1", 77).await;

        assert_eq!(reg.not_stopped().await, ["ucs", "world", "zone1"]);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_millis(400)), "0s");
        assert_eq!(format_uptime(Duration::from_millis(42_400)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(5 * 60 + 20)), "5m");
        assert_eq!(format_uptime(Duration::from_secs(5 * 60 + 40)), "6m");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 100)), "3h");
        assert_eq!(format_uptime(Duration::from_secs(2 * 86_400 + 3600)), "2d");
    }
}
