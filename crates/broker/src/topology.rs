//! Queue/exchange topology: the classify -> summarize -> act pipeline plus
//! one dead-letter queue per stage, all hanging off a single direct DLX.
//!
//! Declaration is idempotent (AMQP `declare` is a no-op if the definition
//! already matches) and happens once at startup; a mismatch or a broker that
//! refuses the declare is a startup fault, not a runtime one.

use sentinel_core::config::BrokerConfig;

/// One stage's queue plus its dead-letter routing.
#[derive(Debug, Clone)]
pub struct QueueSpec {
    pub name: String,
    pub dlq_name: String,
    pub dlq_routing_key: String,
}

/// The full pipeline topology: main exchange, DLX, and one `QueueSpec` per stage.
#[derive(Debug, Clone)]
pub struct Topology {
    pub exchange: String,
    pub dlx_exchange: String,
    pub class: QueueSpec,
    pub summ: QueueSpec,
    pub jira: QueueSpec,
}

impl Topology {
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            exchange: "sentinel".to_string(),
            dlx_exchange: config.dlx_exchange.clone(),
            class: QueueSpec {
                name: config.class_queue.clone(),
                dlq_name: config.class_dlq.clone(),
                dlq_routing_key: "dlq.class".to_string(),
            },
            summ: QueueSpec {
                name: config.summ_queue.clone(),
                dlq_name: config.summ_dlq.clone(),
                dlq_routing_key: "dlq.summ".to_string(),
            },
            jira: QueueSpec {
                name: config.jira_queue.clone(),
                dlq_name: config.jira_dlq.clone(),
                dlq_routing_key: "dlq.jira".to_string(),
            },
        }
    }

    pub fn queues(&self) -> [&QueueSpec; 3] {
        [&self.class, &self.summ, &self.jira]
    }
}
