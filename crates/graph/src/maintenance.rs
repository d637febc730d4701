//! Two-tier maintenance-window suppression: a machine is suppressed if it, or
//! its immediate parent, has an ongoing maintenance window.
//!
//! Grounded on `mentenance_checker.py`'s `check_maintenance_status`: check the
//! machine first, then its single parent, and fail open (never suppress) if
//! the maintenance source itself errors — a lookup failure must not block an
//! otherwise-actionable alert.

use async_trait::async_trait;
use tracing::warn;

use crate::error::GraphError;
use crate::parent_graph::ParentGraph;

/// Whatever backs the "is this server in an ongoing maintenance window"
/// question. The server crate implements this against its maintenance_window
/// table; tests use an in-memory stand-in.
#[async_trait]
pub trait MaintenanceSource: Send + Sync {
    async fn is_ongoing(&self, server_name: &str) -> Result<bool, GraphError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionCheck {
    pub suppressed: bool,
    /// The server whose maintenance window caused the suppression, if any.
    pub blocking_entity: Option<String>,
}

impl SuppressionCheck {
    fn clear() -> Self {
        Self { suppressed: false, blocking_entity: None }
    }

    fn blocked_by(entity: impl Into<String>) -> Self {
        Self { suppressed: true, blocking_entity: Some(entity.into()) }
    }
}

pub async fn check_suppression(
    graph: &ParentGraph,
    source: &dyn MaintenanceSource,
    machine_id: &str,
) -> SuppressionCheck {
    if machine_id.is_empty() {
        return SuppressionCheck::blocked_by("");
    }

    match source.is_ongoing(machine_id).await {
        Ok(true) => return SuppressionCheck::blocked_by(machine_id),
        Ok(false) => {}
        Err(e) => {
            warn!(machine_id, error = %e, "maintenance source error, failing open");
            return SuppressionCheck::clear();
        }
    }

    if let Some(parent_id) = graph.parent_of(machine_id) {
        match source.is_ongoing(&parent_id).await {
            Ok(true) => return SuppressionCheck::blocked_by(parent_id),
            Ok(false) => {}
            Err(e) => {
                warn!(machine_id, %parent_id, error = %e, "maintenance source error, failing open");
                return SuppressionCheck::clear();
            }
        }
    }

    SuppressionCheck::clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::domain::ParentChildRelationship;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeSource {
        ongoing: Mutex<HashSet<String>>,
        erroring: Mutex<HashSet<String>>,
    }

    impl FakeSource {
        fn new(ongoing: &[&str]) -> Self {
            Self {
                ongoing: Mutex::new(ongoing.iter().map(|s| s.to_string()).collect()),
                erroring: Mutex::new(HashSet::new()),
            }
        }

        fn erroring_on(ids: &[&str]) -> Self {
            Self {
                ongoing: Mutex::new(HashSet::new()),
                erroring: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl MaintenanceSource for FakeSource {
        async fn is_ongoing(&self, server_name: &str) -> Result<bool, GraphError> {
            if self.erroring.lock().unwrap().contains(server_name) {
                return Err(GraphError::Source("db unreachable".to_string()));
            }
            Ok(self.ongoing.lock().unwrap().contains(server_name))
        }
    }

    fn graph_with(child: &str, parent: &str) -> ParentGraph {
        ParentGraph::new(vec![ParentChildRelationship {
            parent_id: parent.to_string(),
            child_id: child.to_string(),
        }])
    }

    #[tokio::test]
    async fn suppresses_when_machine_itself_is_under_maintenance() {
        let graph = graph_with("db-01", "rack-a");
        let source = FakeSource::new(&["db-01"]);
        let result = check_suppression(&graph, &source, "db-01").await;
        assert!(result.suppressed);
        assert_eq!(result.blocking_entity, Some("db-01".to_string()));
    }

    #[tokio::test]
    async fn suppresses_when_parent_is_under_maintenance() {
        let graph = graph_with("db-01", "rack-a");
        let source = FakeSource::new(&["rack-a"]);
        let result = check_suppression(&graph, &source, "db-01").await;
        assert!(result.suppressed);
        assert_eq!(result.blocking_entity, Some("rack-a".to_string()));
    }

    #[tokio::test]
    async fn unblocked_when_neither_is_under_maintenance() {
        let graph = graph_with("db-01", "rack-a");
        let source = FakeSource::new(&[]);
        let result = check_suppression(&graph, &source, "db-01").await;
        assert!(!result.suppressed);
    }

    #[tokio::test]
    async fn fails_open_on_source_error() {
        let graph = graph_with("db-01", "rack-a");
        let source = FakeSource::erroring_on(&["db-01"]);
        let result = check_suppression(&graph, &source, "db-01").await;
        assert!(!result.suppressed);
    }

    #[tokio::test]
    async fn empty_machine_id_is_suppressed_without_querying() {
        let graph = graph_with("db-01", "rack-a");
        let source = FakeSource::new(&[]);
        let result = check_suppression(&graph, &source, "").await;
        assert!(result.suppressed);
    }
}
