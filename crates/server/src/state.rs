//! `AppContext`: the immutable, `Arc`-wrapped handle bundle built once at
//! startup and passed explicitly to every consumer and background task.
//!
//! Grounded on the teacher's `AppState` aggregation pattern — one struct
//! holding every shared resource, constructed once, never reached for via
//! ambient globals. Per spec §5's "process-wide handle bundle".

use std::sync::Arc;

use sentinel_broker::Broker;
use sentinel_connector::{IssueTracker, MailboxConnector};
use sentinel_core::Config;
use sentinel_graph::ParentGraph;
use sentinel_notify::ChatNotifier;
use sentinel_router::Router;
use sentinel_textgen::{TextGenerator, WorkerPool};
use tokio::sync::broadcast;

use crate::db::Database;
use crate::dedup::{BatchDedup, TimeWindowDedup};
use crate::supervisor::HealthReport;

/// Everything a consumer or background task needs, bundled once and shared
/// by `Arc` clone. No field here is ever mutated in place; reloadable state
/// (trigger snapshot, parent graph) uses its own internal `ArcSwap`.
pub struct AppContext {
    pub config: Config,
    pub db: Database,
    pub broker: Arc<Broker>,
    pub router: Arc<Router>,
    pub parent_graph: Arc<ParentGraph>,
    pub worker_pool: WorkerPool,
    pub text_generator: Arc<dyn TextGenerator>,
    pub notifier: ChatNotifier,
    pub tracker: Arc<dyn IssueTracker>,
    pub mailbox: Arc<dyn MailboxConnector>,
    pub health_tx: broadcast::Sender<HealthReport>,
    pub storage_root: String,
    pub time_window_dedup: TimeWindowDedup,
    /// In-batch dedup, reset at the start of each ingester run (spec §2/§9
    /// glossary's `(trigger_name, resource_name, subject)` signature).
    pub batch_dedup: BatchDedup,
}

impl AppContext {
    pub fn health_subscribe(&self) -> broadcast::Receiver<HealthReport> {
        self.health_tx.subscribe()
    }
}
