//! Types for the lead rule engine: a `LeadSnapshot`, a
//! `RuleContext`, an ordered list of `Rule`s, and the minimal-diff
//! `Updates` the engine produces.
//!
//! Conditions and actions are modeled as closed structs with
//! `#[serde(deny_unknown_fields)]` rather than a free-form attribute bag —
//! the same "enumerate the contract, reject unknown kinds at ingress"
//! policy applied to a generic predicate tree,
//! specialized to a fixed field set instead of a
//! tagged-enum list, so literal example payloads
//! deserialize unchanged (e.g. `{"conditions":{"text_includes":["price"]}}`).

use serde::{Deserialize, Serialize};
use wireline_core::model::LeadSnapshot;

pub use wireline_core::model::LeadSnapshot as Snapshot;

/// Free-form signals/text carried alongside the lead snapshot — the
/// trigger payload a rule set is evaluated against (an inbound message's
/// text, or an explicit `/v1/leads/:id/signals` call).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleContext {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub signals: Vec<String>,
}

/// All listed conditions must hold (AND). Every field defaults to "not
/// specified", which is vacuously satisfied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConditions {
    #[serde(default)]
    pub text_includes: Vec<String>,
    #[serde(default)]
    pub signals_any: Vec<String>,
    #[serde(default)]
    pub tags_any: Vec<String>,
    #[serde(default)]
    pub tags_all: Vec<String>,
    #[serde(default)]
    pub stage_in: Vec<String>,
    #[serde(default)]
    pub source_in: Vec<String>,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
}

/// Actions applied in a fixed order, regardless
/// of field declaration order in the payload: add_tags, remove_tags,
/// set_stage, (set_score wins over score_delta), assign_queue, set_source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleActions {
    #[serde(default)]
    pub add_tags: Vec<String>,
    #[serde(default)]
    pub remove_tags: Vec<String>,
    #[serde(default)]
    pub set_stage: Option<String>,
    #[serde(default)]
    pub set_score: Option<f64>,
    #[serde(default)]
    pub score_delta: Option<f64>,
    #[serde(default)]
    pub assign_queue: Option<String>,
    #[serde(default)]
    pub set_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: RuleConditions,
    #[serde(default)]
    pub actions: RuleActions,
    #[serde(default)]
    pub stop_on_match: bool,
    #[serde(default)]
    pub priority: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// A reference to a rule that matched during evaluation, carried in the
/// engine's output so callers can record which rules fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRule {
    pub rule_id: Option<String>,
    pub index: usize,
}

/// Minimal diff of the fields a rule pass actually changed. Fields are
/// `None`/empty when unaffected so callers can apply the diff as a sparse
/// patch instead of overwriting the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updates {
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub set_stage: Option<String>,
    /// Absolute score set by a `set_score` action. Wins over `score_delta`
    /// per the action-order rule that `set_score` wins over `score_delta`.
    pub set_score: Option<f64>,
    pub score_delta: f64,
    pub assign_queue: Option<String>,
    pub set_source: Option<String>,
    pub matched_rules: Vec<MatchedRule>,
}

impl Updates {
    pub fn is_empty(&self) -> bool {
        self.add_tags.is_empty()
        && self.remove_tags.is_empty()
        && self.set_stage.is_none()
        && self.set_score.is_none()
        && self.score_delta == 0.0
        && self.assign_queue.is_none()
        && self.set_source.is_none()
    }

    /// Applies this diff onto a snapshot, returning the updated snapshot —
    /// used by callers (and by the engine's own idempotence tests) to
    /// materialize the effect of a rule pass.
    pub fn apply_to(&self, mut snapshot: LeadSnapshot) -> LeadSnapshot {
        for tag in &self.add_tags {
            if !snapshot.tags.contains(tag) {
                snapshot.tags.push(tag.clone());
            }
        }
        if !self.remove_tags.is_empty() {
            snapshot.tags.retain(|t| !self.remove_tags.contains(t));
        }
        if let Some(stage) = &self.set_stage {
            snapshot.stage = stage.clone();
        }
        if let Some(score) = self.set_score {
            snapshot.score = score;
        } else {
            snapshot.score += self.score_delta;
        }
        if let Some(queue) = &self.assign_queue {
            snapshot
            .metadata
            .insert("assignment_queue".to_string(), serde_json::json!(queue));
        }
        if let Some(source) = &self.set_source {
            snapshot.source = Some(source.clone());
        }
        snapshot
    }
}
