//! Snapshot store with a serialized action queue.
//!
//! # Data Flow
//! ```text
//! tracker milestone
//!     → Dispatcher::dispatch (mpsc queue)
//!     → reducer task (one action at a time)
//!     → ArcSwap<Snapshot> (wait-free reads)
//!     → broadcast (every new snapshot, in order)
//! ```
//!
//! # Design Decisions
//! - Single writer: only the reducer task stores snapshots
//! - Every action yields a new `Arc<Snapshot>`; old snapshots are never mutated
//! - After teardown, dispatch is refused and queued actions are discarded

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::state::accounts::AccountSourceState;
use crate::state::snapshot::{Action, Snapshot, Tracker};

/// Snapshots buffered per subscriber before it starts lagging.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

struct Shared {
    current: ArcSwap<Snapshot>,
    changes: broadcast::Sender<Arc<Snapshot>>,
    mounted: AtomicBool,
}

impl Shared {
    fn apply(&self, action: Action) {
        let tracker = action.tracker();
        if !self.mounted.load(Ordering::SeqCst) {
            metrics::record_dropped_action(tracker.label());
            tracing::trace!(tracker = tracker.label(), "Discarding queued action after teardown");
            return;
        }

        let next = Arc::new(self.current.load().reduce(action));
        self.current.store(next.clone());

        let state = next.label_for(tracker);
        metrics::record_transition(tracker.label(), state);
        if let (Tracker::Accounts, AccountSourceState::Ready(accounts)) = (tracker, &next.accounts) {
            metrics::record_account_count(accounts.len());
        }
        tracing::debug!(tracker = tracker.label(), state = state, "Snapshot updated");

        let _ = self.changes.send(next);
    }
}

/// Owner of the current snapshot.
pub struct Store {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Action>,
}

impl Store {
    /// Create a store and spawn its reducer task.
    ///
    /// The task exits when `shutdown` is triggered.
    pub fn spawn(shutdown: &Shutdown) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            current: ArcSwap::from_pointee(Snapshot::default()),
            changes,
            mounted: AtomicBool::new(true),
        });

        tokio::spawn(run_reducer(shared.clone(), rx, shutdown.clone()));

        Self { shared, tx }
    }

    /// Handle for trackers to submit milestones.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            tx: self.tx.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current.load_full()
    }

    /// Receive every snapshot produced from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.shared.changes.subscribe()
    }

    /// Wait for the first snapshot matching `pred`, starting with the current one.
    ///
    /// Returns `None` if the store stops producing snapshots first.
    pub async fn wait_for<F>(&self, pred: F) -> Option<Arc<Snapshot>>
    where
        F: Fn(&Snapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let current = self.snapshot();
        if pred(&current) {
            return Some(current);
        }
        loop {
            match rx.recv().await {
                Ok(snapshot) if pred(&snapshot) => return Some(snapshot),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let current = self.snapshot();
                    if pred(&current) {
                        return Some(current);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Freeze the snapshot: nothing dispatched from now on is applied.
    pub fn teardown(&self) {
        self.shared.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.mounted.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("mounted", &self.is_mounted())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Submits milestones to a [`Store`].
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Action>,
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Queue an action. Returns `false` once the store is torn down.
    pub fn dispatch(&self, action: impl Into<Action>) -> bool {
        let action = action.into();
        if !self.shared.mounted.load(Ordering::SeqCst) {
            metrics::record_dropped_action(action.tracker().label());
            tracing::trace!(tracker = action.tracker().label(), "Ignoring action after teardown");
            return false;
        }
        self.tx.send(action).is_ok()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current.load_full()
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.mounted.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

async fn run_reducer(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Action>, shutdown: Shutdown) {
    let stopped = shutdown.signalled();
    tokio::pin!(stopped);

    loop {
        tokio::select! {
            biased;
            _ = &mut stopped => break,
            action = rx.recv() => match action {
                Some(action) => shared.apply(action),
                None => break,
            },
        }
    }
    tracing::debug!("Reducer stopped");
}
