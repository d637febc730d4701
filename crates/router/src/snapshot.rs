//! Atomic, read-mostly snapshot of the trigger-mapping reference table plus a
//! concurrent match-result cache invalidated on reload.
//!
//! Readers never observe a torn state: `reload()` builds the new `Vec` fully
//! before swapping the pointer, so any in-flight reader sees either the
//! pre-reload or the post-reload list in its entirety, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use sentinel_core::domain::TriggerMapping;

use crate::matcher::MatchResult;

pub struct TriggerSnapshot {
    mappings: ArcSwap<Vec<TriggerMapping>>,
    cache: DashMap<String, MatchResult>,
}

impl TriggerSnapshot {
    pub fn new(mappings: Vec<TriggerMapping>) -> Self {
        Self {
            mappings: ArcSwap::from_pointee(mappings),
            cache: DashMap::new(),
        }
    }

    pub fn load(&self) -> Arc<Vec<TriggerMapping>> {
        self.mappings.load_full()
    }

    /// Replace the live reference table wholesale and drop every cached
    /// match — a stale cache entry pointing at a removed trigger would
    /// otherwise outlive the reload indefinitely.
    pub fn reload(&self, mappings: Vec<TriggerMapping>) {
        self.mappings.store(Arc::new(mappings));
        self.cache.clear();
    }

    pub fn cached(&self, normalized_key: &str) -> Option<MatchResult> {
        self.cache.get(normalized_key).map(|entry| entry.clone())
    }

    pub fn cache_insert(&self, normalized_key: String, result: MatchResult) {
        self.cache.insert(normalized_key, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(trigger: &str) -> TriggerMapping {
        TriggerMapping {
            trigger_name: trigger.to_string(),
            team: "General".to_string(),
            priority: "P3".to_string(),
            responsible_person: None,
            recommended_action: None,
            actionable: true,
        }
    }

    #[test]
    fn reload_clears_cache() {
        let snapshot = TriggerSnapshot::new(vec![mapping("High CPU")]);
        snapshot.cache_insert(
            "high cpu".to_string(),
            MatchResult {
                team: "SAP Basis".to_string(),
                confidence: 1.0,
                matched_trigger: "High CPU".to_string(),
                responsible_person: None,
                priority: "P1".to_string(),
                recommended_action: None,
                actionable: true,
            },
        );
        assert!(snapshot.cached("high cpu").is_some());

        snapshot.reload(vec![mapping("Low Disk")]);
        assert!(snapshot.cached("high cpu").is_none());
        assert_eq!(snapshot.load().len(), 1);
        assert_eq!(snapshot.load()[0].trigger_name, "Low Disk");
    }
}
