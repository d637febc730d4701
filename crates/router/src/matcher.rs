//! Trigger-to-team matcher and team-to-channel/assignee resolution.
//!
//! The classifier's "which trigger is this" lookup and the actioner's
//! "which team owns this trigger" lookup are the same mechanism: both ask
//! `Router::match_trigger` for the best-scoring reference row.

use std::collections::HashMap;

use sentinel_core::domain::TriggerMapping;
use uuid::Uuid;

use crate::normalize::normalize;
use crate::similarity::score;
use crate::snapshot::TriggerSnapshot;

const SHORT_CIRCUIT_SCORE: f64 = 0.9;
const ACCEPT_THRESHOLD: f64 = 0.75;
const GENERAL_TEAM: &str = "General";
const GENERAL_PRIORITY: &str = "P3";

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub team: String,
    pub confidence: f64,
    pub matched_trigger: String,
    pub responsible_person: Option<String>,
    /// The matched reference row's priority, or a conservative default
    /// (`"P3"`) when nothing matched closely enough to trust its priority.
    pub priority: String,
    /// The matched reference row's remediation advice, if any.
    pub recommended_action: Option<String>,
    /// Whether the matched trigger opens a ticket. Defaults to `true` on the
    /// `General` fallback so an unrecognized trigger still gets a ticket
    /// rather than being silently dropped as informational.
    pub actionable: bool,
}

/// How to pick among multiple groups a resource belongs to. Only
/// `FirstExactMatch` is implemented; the variant exists so a future
/// strategy can be added without changing callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSelectionStrategy {
    FirstExactMatch,
}

impl Default for GroupSelectionStrategy {
    fn default() -> Self {
        GroupSelectionStrategy::FirstExactMatch
    }
}

pub struct Router {
    snapshot: TriggerSnapshot,
    team_webhooks: HashMap<String, String>,
    general_webhook: Option<String>,
    team_uuids: HashMap<String, Uuid>,
    group_strategy: GroupSelectionStrategy,
}

impl Router {
    pub fn new(
        mappings: Vec<TriggerMapping>,
        team_webhooks: HashMap<String, String>,
        general_webhook: Option<String>,
        team_uuids: HashMap<String, Uuid>,
    ) -> Self {
        Self {
            snapshot: TriggerSnapshot::new(mappings),
            team_webhooks,
            general_webhook,
            team_uuids,
            group_strategy: GroupSelectionStrategy::default(),
        }
    }

    pub fn reload_triggers(&self, mappings: Vec<TriggerMapping>) {
        self.snapshot.reload(mappings);
    }

    /// Best-effort match of a raw trigger name against the reference table.
    /// Returns `("General", best_score, best_trigger, None)` when nothing
    /// scores above the acceptance threshold.
    pub fn match_trigger(&self, trigger_name: &str) -> MatchResult {
        let normalized_input = normalize(trigger_name);

        if let Some(cached) = self.snapshot.cached(&normalized_input) {
            return cached;
        }

        let mappings = self.snapshot.load();
        let mut best: Option<(f64, &TriggerMapping)> = None;

        for mapping in mappings.iter() {
            let normalized_candidate = normalize(&mapping.trigger_name);
            let candidate_score = score(&normalized_input, &normalized_candidate);

            if candidate_score >= SHORT_CIRCUIT_SCORE {
                let result = MatchResult {
                    team: mapping.team.clone(),
                    confidence: candidate_score,
                    matched_trigger: mapping.trigger_name.clone(),
                    responsible_person: mapping.responsible_person.clone(),
                    priority: mapping.priority.clone(),
                    recommended_action: mapping.recommended_action.clone(),
                    actionable: mapping.actionable,
                };
                self.snapshot.cache_insert(normalized_input, result.clone());
                return result;
            }

            match best {
                Some((best_score, _)) if candidate_score <= best_score => {}
                _ => best = Some((candidate_score, mapping)),
            }
        }

        let result = match best {
            Some((best_score, mapping)) if best_score >= ACCEPT_THRESHOLD => MatchResult {
                team: mapping.team.clone(),
                confidence: best_score,
                matched_trigger: mapping.trigger_name.clone(),
                responsible_person: mapping.responsible_person.clone(),
                priority: mapping.priority.clone(),
                recommended_action: mapping.recommended_action.clone(),
                actionable: mapping.actionable,
            },
            Some((best_score, mapping)) => MatchResult {
                team: GENERAL_TEAM.to_string(),
                confidence: best_score,
                matched_trigger: mapping.trigger_name.clone(),
                responsible_person: None,
                priority: GENERAL_PRIORITY.to_string(),
                recommended_action: None,
                actionable: true,
            },
            None => MatchResult {
                team: GENERAL_TEAM.to_string(),
                confidence: 0.0,
                matched_trigger: String::new(),
                responsible_person: None,
                priority: GENERAL_PRIORITY.to_string(),
                recommended_action: None,
                actionable: true,
            },
        };

        self.snapshot.cache_insert(normalized_input, result.clone());
        result
    }

    /// Pick among a resource's candidate groups per the configured strategy,
    /// falling back to `"General"` if none match.
    pub fn resolve_group(&self, candidate_groups: &[String], matched_team: &str) -> String {
        match self.group_strategy {
            GroupSelectionStrategy::FirstExactMatch => candidate_groups
                .iter()
                .find(|g| g.eq_ignore_ascii_case(matched_team))
                .cloned()
                .unwrap_or_else(|| GENERAL_TEAM.to_string()),
        }
    }

    /// Resolve a team name to a chat webhook URL: exact match, then
    /// case-insensitive substring match (either direction), then the
    /// general fallback.
    pub fn resolve_channel(&self, team: &str) -> Option<String> {
        if let Some(url) = self.team_webhooks.get(team) {
            return Some(url.clone());
        }

        let team_lower = team.to_lowercase();
        if let Some(url) = self.team_webhooks.get(&team_lower) {
            return Some(url.clone());
        }

        for (key, url) in &self.team_webhooks {
            let key_lower = key.to_lowercase();
            if key_lower.contains(&team_lower) || team_lower.contains(&key_lower) {
                return Some(url.clone());
            }
        }

        self.general_webhook.clone()
    }

    /// Resolve a team name to its external tracker team UUID. `None` means
    /// "skip team assignment", not "fail ticket creation".
    pub fn team_uuid_for(&self, team: &str) -> Option<Uuid> {
        self.team_uuids
            .get(team)
            .or_else(|| self.team_uuids.get(&team.to_lowercase()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router_with(triggers: &[(&str, &str)]) -> Router {
        let mappings = triggers
            .iter()
            .map(|(trigger, team)| TriggerMapping {
                trigger_name: trigger.to_string(),
                team: team.to_string(),
                priority: "P3".to_string(),
                responsible_person: None,
                recommended_action: None,
                actionable: true,
            })
            .collect();
        Router::new(mappings, HashMap::new(), None, HashMap::new())
    }

    #[test]
    fn exact_match_short_circuits_above_threshold() {
        let router = router_with(&[("High CPU", "SAP Basis"), ("Low Disk", "Storage")]);
        let result = router.match_trigger("High CPU");
        assert_eq!(result.team, "SAP Basis");
        assert!(result.confidence >= 0.9);
    }

    #[test]
    fn dissimilar_trigger_falls_back_to_general() {
        let router = router_with(&[("High CPU", "SAP Basis")]);
        let result = router.match_trigger("Completely unrelated garbage text");
        assert_eq!(result.team, "General");
    }

    #[test]
    fn matching_is_symmetric_with_itself() {
        let router = router_with(&[("High CPU Usage", "SAP Basis")]);
        let once = router.match_trigger("High CPU Usage");
        let twice = router.match_trigger("High CPU Usage");
        assert_eq!(once, twice);
    }

    #[test]
    fn channel_resolution_falls_back_to_general() {
        let mut webhooks = HashMap::new();
        webhooks.insert("sap basis".to_string(), "https://example.com/sap".to_string());
        let router = Router::new(vec![], webhooks, Some("https://example.com/general".to_string()), HashMap::new());

        assert_eq!(router.resolve_channel("SAP Basis"), Some("https://example.com/sap".to_string()));
        assert_eq!(router.resolve_channel("Unknown Team"), Some("https://example.com/general".to_string()));
    }

    #[test]
    fn team_uuid_missing_entry_returns_none() {
        let router = Router::new(vec![], HashMap::new(), None, HashMap::new());
        assert_eq!(router.team_uuid_for("Storage"), None);
    }

    #[test]
    fn group_selection_falls_back_to_general_without_exact_match() {
        let router = router_with(&[]);
        let groups = vec!["Networking".to_string(), "Storage".to_string()];
        assert_eq!(router.resolve_group(&groups, "SAP Basis"), "General");
        assert_eq!(router.resolve_group(&groups, "Storage"), "Storage");
    }
}
