//! Refresh scheduler: `fetch -> engine -> publish` on a fixed period, plus
//! manual refreshes.
//!
//! At most one pass runs at a time. A tick or refresh request that arrives
//! while a pass is in flight is skipped rather than queued, so snapshots are
//! published strictly in generation order and never partially.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::engine::{Engine, Snapshot};
use crate::source::{ReadingQuery, ReadingSource};

// ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// A new snapshot with this generation was published.
    Published(u64),
    /// Another pass was already running.
    Skipped,
    /// The fetch failed; the previous snapshot stays current.
    Failed(String),
}

pub struct Scheduler {
    engine: Arc<Engine>,
    source: Arc<ReadingSource>,
    window: chrono::Duration,
    /// Held for the whole pass; guards the last published generation.
    gate: Mutex<u64>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, source: Arc<ReadingSource>, window: chrono::Duration) -> Arc<Self> {
        // ---
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::empty()));
        Arc::new(Self {
            engine,
            source,
            window,
            gate: Mutex::new(0),
            tx,
        })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn source(&self) -> &Arc<ReadingSource> {
        &self.source
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Latest published snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Run one pass unless one is already in flight.
    pub async fn run_pass(&self) -> PassOutcome {
        // ---
        let Ok(mut last_generation) = self.gate.try_lock() else {
            debug!("Refresh skipped: previous pass still running");
            return PassOutcome::Skipped;
        };

        let now = Utc::now();
        let query = ReadingQuery {
            start: now - self.window,
            end: now,
            device_id: None,
        };

        let batch = match self.source.fetch(&query).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to fetch readings: {}", e);
                return PassOutcome::Failed(e.to_string());
            }
        };

        let report = batch.ingest();

        let generation = *last_generation + 1;
        let snapshot = self.engine.snapshot(generation, report, now);
        info!(
            "Published snapshot {} ({} readings, {} rejected)",
            generation, snapshot.accepted, snapshot.rejected
        );
        self.tx.send_replace(Arc::new(snapshot));
        *last_generation = generation;

        PassOutcome::Published(generation)
    }

    /// Spawn the periodic loop. The first pass runs immediately.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        // ---
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.run_pass().await;
            }
        })
    }
}
