//! Supervisor (watchdog): probes each subsystem every 60s, restarts failed
//! consumers, and broadcasts a status document to subscribers.
//!
//! Grounded on `examples/original_source/app/core/monitoring/watchdog.py`'s
//! `SystemWatchdog`: the probe set (postgres/rabbitmq/scheduler/consumers),
//! the 60s interval, the ~5s startup-validation wait, and pause()/resume().
//! The source's RabbitMQ-process-restart-via-subprocess path has no
//! counterpart here — out-of-process service restart is not something this
//! workspace can or should own; a DOWN broker is reported and left to the
//! platform's own restart policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::AppContext;

const PROBE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);
const STARTUP_WAIT: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Paused,
    Initializing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: OverallStatus,
    pub checks: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// A single consumer's lifecycle handle: a restart closure producing a fresh
/// task, and the currently running task. The first task is spawned in
/// `new()` so the slot always tracks the one real consumer instance — the
/// supervisor's startup-validation pass and `ensure_running` both observe
/// that same handle rather than racing a second consumer into existence.
pub struct ConsumerSlot {
    name: String,
    spawn: Box<dyn Fn() -> JoinHandle<()> + Send + Sync>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConsumerSlot {
    pub fn new(name: impl Into<String>, spawn: impl Fn() -> JoinHandle<()> + Send + Sync + 'static) -> Self {
        let initial = spawn();
        Self { name: name.into(), spawn: Box::new(spawn), task: tokio::sync::Mutex::new(Some(initial)) }
    }

    async fn ensure_running(&self) -> String {
        let mut task = self.task.lock().await;
        let needs_restart = match task.as_ref() {
            Some(handle) => handle.is_finished(),
            None => true,
        };

        if needs_restart {
            warn!(consumer = %self.name, "consumer not running, restarting");
            *task = Some((self.spawn)());
            "RESTARTING".to_string()
        } else {
            "UP".to_string()
        }
    }

    async fn is_finished(&self) -> bool {
        match self.task.lock().await.as_ref() {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Stop the slot's current task, if any. Used by shutdown to cancel the
    /// one live consumer this slot tracks.
    pub async fn abort(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
    }
}

pub struct Supervisor {
    ctx: Arc<AppContext>,
    consumers: Vec<Arc<ConsumerSlot>>,
    scheduler: Arc<crate::scheduler::Scheduler>,
    paused: AtomicBool,
}

impl Supervisor {
    pub fn new(ctx: Arc<AppContext>, consumers: Vec<Arc<ConsumerSlot>>, scheduler: Arc<crate::scheduler::Scheduler>) -> Self {
        Self { ctx, consumers, scheduler, paused: AtomicBool::new(false) }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("supervisor paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("supervisor resumed");
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Run the periodic probe loop. Spawned once at startup; runs until the
    /// process shuts down.
    pub async fn run(self: Arc<Self>) {
        tokio::time::sleep(STARTUP_WAIT).await;

        let mut startup_failed = false;
        for consumer in &self.consumers {
            if consumer.is_finished().await {
                warn!(consumer = %consumer.name, "consumer failed to start");
                startup_failed = true;
            }
        }
        if startup_failed {
            info!("supervisor detected startup failure, running recovery pass");
            self.probe_once().await;
        } else {
            info!("supervisor: all consumers up after startup wait");
        }

        let mut ticker = tokio::time::interval(PROBE_INTERVAL);
        loop {
            ticker.tick().await;
            self.probe_once().await;
        }
    }

    async fn probe_once(&self) -> HealthReport {
        if self.is_paused() {
            let report = HealthReport { overall: OverallStatus::Paused, checks: HashMap::new(), timestamp: Utc::now() };
            let _ = self.ctx.health_tx.send(report.clone());
            return report;
        }

        let mut checks = HashMap::new();

        checks.insert("database".to_string(), Self::probe_label(self.ctx.db.health_check().await));
        checks.insert("broker".to_string(), Self::probe_label(self.ctx.broker.health_check().await));
        checks.insert("scheduler".to_string(), self.scheduler.ensure_running().await);

        for consumer in &self.consumers {
            checks.insert(consumer.name.clone(), consumer.ensure_running().await);
        }

        let overall = if checks.values().all(|v| v == "UP") {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };

        let report = HealthReport { overall, checks, timestamp: Utc::now() };
        info!(overall = ?report.overall, "supervisor probe complete");
        let _ = self.ctx.health_tx.send(report.clone());
        report
    }

    fn probe_label<T, E: std::fmt::Display>(result: Result<T, E>) -> String {
        match result {
            Ok(_) => "UP".to_string(),
            Err(e) => format!("DOWN: {e}"),
        }
    }
}

pub fn new_health_channel() -> (broadcast::Sender<HealthReport>, broadcast::Receiver<HealthReport>) {
    broadcast::channel(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_serializes_uppercase() {
        let json = serde_json::to_string(&OverallStatus::Degraded).unwrap();
        assert_eq!(json, "\"DEGRADED\"");
    }
}
