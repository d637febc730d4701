//! Child -> parent machine containment map.
//!
//! Mirrors `sentinel-router`'s reference-table snapshot: the full map is
//! rebuilt and atomically swapped on reload rather than mutated in place, so
//! an in-flight lookup never observes a torn mix of old and new edges.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use sentinel_core::domain::ParentChildRelationship;

pub struct ParentGraph {
    parents: ArcSwap<HashMap<String, String>>,
}

impl ParentGraph {
    pub fn new(relationships: Vec<ParentChildRelationship>) -> Self {
        Self { parents: ArcSwap::from_pointee(Self::build(relationships)) }
    }

    fn build(relationships: Vec<ParentChildRelationship>) -> HashMap<String, String> {
        relationships
            .into_iter()
            .map(|r| (r.child_id, r.parent_id))
            .collect()
    }

    pub fn reload(&self, relationships: Vec<ParentChildRelationship>) {
        self.parents.store(Arc::new(Self::build(relationships)));
    }

    /// The immediate parent of `child_id`, or `None` if it has no recorded parent.
    pub fn parent_of(&self, child_id: &str) -> Option<String> {
        self.parents.load().get(child_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(child: &str, parent: &str) -> ParentChildRelationship {
        ParentChildRelationship { parent_id: parent.to_string(), child_id: child.to_string() }
    }

    #[test]
    fn looks_up_immediate_parent() {
        let graph = ParentGraph::new(vec![rel("db-01", "rack-a"), rel("rack-a", "dc-1")]);
        assert_eq!(graph.parent_of("db-01"), Some("rack-a".to_string()));
        assert_eq!(graph.parent_of("rack-a"), Some("dc-1".to_string()));
    }

    #[test]
    fn unknown_child_has_no_parent() {
        let graph = ParentGraph::new(vec![rel("db-01", "rack-a")]);
        assert_eq!(graph.parent_of("unknown-host"), None);
    }

    #[test]
    fn reload_replaces_the_whole_map() {
        let graph = ParentGraph::new(vec![rel("db-01", "rack-a")]);
        graph.reload(vec![rel("db-01", "rack-b")]);
        assert_eq!(graph.parent_of("db-01"), Some("rack-b".to_string()));
    }
}
