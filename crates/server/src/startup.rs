//! Process bootstrap: build the `AppContext` from `Config`, declare broker
//! topology, run migrations, and spawn every background task.
//!
//! Grounded on the teacher's two-phase startup (build the handle bundle, then
//! spawn tasks against it) per spec §5/§9's documented shutdown sequence:
//! stop the supervisor, stop the scheduler, cancel consumers, drain the
//! worker pool, close broker/db.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use sentinel_broker::{Broker, Topology};
use sentinel_connector::{IssueTracker, JiraTracker, MailboxConnector, StaticMailbox};
use sentinel_core::Config;
use sentinel_graph::ParentGraph;
use sentinel_notify::ChatNotifier;
use sentinel_router::Router;
use sentinel_textgen::{EchoGenerator, HttpTextGenerator, TextGenerator, WorkerPool};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::db::Database;
use crate::dedup::{BatchDedup, TimeWindowDedup};
use crate::error::ServerError;
use crate::pipeline::{actioner, classifier, run_stage, summarizer};
use crate::state::AppContext;
use crate::supervisor::{new_health_channel, ConsumerSlot, Supervisor};

const STORAGE_ROOT_ENV: &str = "SENTINEL_STORAGE_ROOT";
const TEXTGEN_URL_ENV: &str = "TEXTGEN_BASE_URL";
const TEAM_UUID_PREFIX: &str = "TEAM_UUID_";

/// Per-stage prefetch, spec §4.2/§5: classifier=1 (default broker prefetch),
/// summarizer=2 (bounds in-flight summarization work), actioner=1.
const CLASS_PREFETCH: u16 = 1;
const SUMM_PREFETCH: u16 = 2;
const JIRA_PREFETCH: u16 = 1;

/// Build the fully wired `AppContext`. Fallible steps (db connect, broker
/// connect, migrations, topology) run here; anything that can be satisfied
/// with a safe local default (text generator, mailbox) falls back to one
/// when its external dependency isn't configured.
pub async fn build_app_context(config: Config) -> Result<Arc<AppContext>, ServerError> {
    let db = Database::connect(&config.database.url).await?;
    db.run_migrations().await?;

    let topology = Topology::from_config(&config.broker);
    let broker = Broker::connect(&config.broker.url, topology).await?;
    broker.declare_topology().await?;

    let mappings = db.load_trigger_mappings().await?;
    let relationships = db.load_parent_child_relationships().await?;
    let team_uuids = team_uuids_from_env();

    let router = Arc::new(Router::new(
        mappings,
        config.webhook.team_webhooks.clone(),
        config.webhook.general_webhook.clone(),
        team_uuids,
    ));
    let parent_graph = Arc::new(ParentGraph::new(relationships));

    let text_generator: Arc<dyn TextGenerator> = match std::env::var(TEXTGEN_URL_ENV) {
        Ok(url) if !url.is_empty() => Arc::new(HttpTextGenerator::new(url)),
        _ => Arc::new(EchoGenerator),
    };

    let tracker: Arc<dyn IssueTracker> = if config.tracker.is_configured() {
        Arc::new(JiraTracker::new(
            config.tracker.base_url.clone().unwrap_or_default(),
            config.tracker.email.clone().unwrap_or_default(),
            config.tracker.api_token.clone().unwrap_or_default(),
        ))
    } else {
        Arc::new(JiraTracker::new(String::new(), String::new(), String::new()))
    };

    let mailbox: Arc<dyn MailboxConnector> = Arc::new(StaticMailbox::default());

    let (health_tx, _) = new_health_channel();

    let ctx = Arc::new(AppContext {
        worker_pool: WorkerPool::new(config.worker_pool.size),
        time_window_dedup: TimeWindowDedup::new(config.dedup.window_hours),
        batch_dedup: BatchDedup::new(),
        storage_root: std::env::var(STORAGE_ROOT_ENV).unwrap_or_else(|_| "./storage".to_string()),
        config,
        db,
        broker: Arc::new(broker),
        router,
        parent_graph,
        text_generator,
        notifier: ChatNotifier::new(),
        tracker,
        mailbox,
        health_tx,
    });

    Ok(ctx)
}

fn team_uuids_from_env() -> HashMap<String, Uuid> {
    let mut map = HashMap::new();
    for (key, value) in std::env::vars() {
        if let Some(team) = key.strip_prefix(TEAM_UUID_PREFIX) {
            if let Ok(uuid) = Uuid::parse_str(&value) {
                map.insert(team.to_lowercase().replace('_', " "), uuid);
            }
        }
    }
    map
}

/// A running server: every background task's handle, kept so the process can
/// shut down in the documented order rather than just exiting.
pub struct RunningServer {
    pub ctx: Arc<AppContext>,
    pub supervisor: Arc<Supervisor>,
    pub scheduler: Arc<crate::scheduler::Scheduler>,
    consumers: Vec<Arc<ConsumerSlot>>,
    supervisor_task: JoinHandle<()>,
}

impl RunningServer {
    /// Stop order: supervisor -> scheduler -> consumers -> worker pool drains
    /// naturally once no new work is offered. The broker connection and db
    /// pool close when `ctx` drops.
    pub async fn shutdown(self) {
        info!("shutdown: stopping supervisor");
        self.supervisor.pause();
        self.supervisor_task.abort();

        info!("shutdown: stopping scheduler");
        self.scheduler.abort().await;

        info!("shutdown: cancelling consumers");
        for consumer in &self.consumers {
            consumer.abort().await;
        }

        info!("shutdown complete");
    }
}

/// Spawn the scheduler, the three pipeline consumers, and the supervisor that
/// watches over all of them.
pub fn spawn_background_tasks(ctx: Arc<AppContext>) -> RunningServer {
    let scheduler = Arc::new(crate::scheduler::Scheduler::new(ctx.clone()));

    let classify_consumer = spawn_consumer_slot(
        ctx.clone(),
        "classifier",
        ctx.config.broker.class_queue.clone(),
        "dlq.class".to_string(),
        CLASS_PREFETCH,
        classifier::handle,
    );
    let summarize_consumer = spawn_consumer_slot(
        ctx.clone(),
        "summarizer",
        ctx.config.broker.summ_queue.clone(),
        "dlq.summ".to_string(),
        SUMM_PREFETCH,
        summarizer::handle,
    );
    let action_consumer = spawn_consumer_slot(
        ctx.clone(),
        "actioner",
        ctx.config.broker.jira_queue.clone(),
        "dlq.jira".to_string(),
        JIRA_PREFETCH,
        actioner::handle,
    );

    let consumer_slots = vec![classify_consumer.clone(), summarize_consumer.clone(), action_consumer.clone()];

    let supervisor = Arc::new(Supervisor::new(ctx.clone(), consumer_slots.clone(), scheduler.clone()));
    let supervisor_task = tokio::spawn(supervisor.clone().run());

    RunningServer {
        ctx,
        supervisor,
        scheduler,
        consumers: consumer_slots,
        supervisor_task,
    }
}

/// Build one stage's `ConsumerSlot`. `ConsumerSlot::new` spawns the first
/// live consumer task itself, so the slot returned here is the single
/// source of truth for that stage's running task — nothing else spawns a
/// competing instance. `handler` is a plain async fn item (e.g.
/// `classifier::handle`); those are zero-sized and `Copy`, so the same
/// value can be reused to respawn the stage after a crash without boxing.
fn spawn_consumer_slot<F, Fut>(
    ctx: Arc<AppContext>,
    name: &str,
    queue_name: String,
    dlq_routing_key: String,
    prefetch: u16,
    handler: F,
) -> Arc<ConsumerSlot>
where
    F: Fn(Arc<AppContext>, Vec<u8>, u32) -> Fut + Copy + Send + Sync + 'static,
    Fut: Future<Output = crate::pipeline::Outcome> + Send,
{
    let max_retries = ctx.config.dedup.max_retries;
    let consumer_tag = name.to_string();

    Arc::new(ConsumerSlot::new(name, move || {
        tokio::spawn(run_stage(
            ctx.clone(),
            queue_name.clone(),
            dlq_routing_key.clone(),
            consumer_tag.clone(),
            prefetch,
            max_retries,
            handler,
        ))
    }))
}
