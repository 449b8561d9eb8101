//! Pure evaluation helpers for `condition` nodes and edge selection,
//! generalizing a decision/split `StepResult`/`evaluate_condition` shape
//! down to a typed `tags_any`/`text_includes`/`min_score` predicate and
//! an `AmbiguousBranch` edge-selection rule.

use crate::types::{Edge, NodeKind};
use wireline_core::model::LeadSnapshot;

/// Outcome of evaluating one node.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed { output: serde_json::Value },
    Waiting { wake_at: chrono::DateTime<chrono::Utc> },
    Failed { error: String },
    /// `condition` node result: the branch label to follow next.
    Branch { label: &'static str },
    /// `send_message` node dispatched an outbound Message; the step stays
    /// `Running` until a later sweep observes the Message reach a
    /// terminal status.
    Dispatched {
        message_id: wireline_core::ids::MessageId,
        wake_at: chrono::DateTime<chrono::Utc>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct JourneyEvaluator;

impl JourneyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates a `condition` node's predicate against the run's lead
    /// context. All provided fields are ANDed, same as the lead rule
    /// engine's condition semantics, reused here because
    /// a `condition` node is the identical shape.
    pub fn evaluate_condition(
        &self,
        tags_any: &[String],
        text_includes: &[String],
        min_score: Option<f64>,
        lead: &LeadSnapshot,
        text: Option<&str>,
    ) -> bool {
        if !tags_any.is_empty() && !tags_any.iter().any(|t| lead.tags.contains(t)) {
            return false;
        }
        if !text_includes.is_empty() {
            let Some(text) = text else { return false };
            let text = text.to_lowercase();
            if !text_includes.iter().any(|needle| text.contains(&needle.to_lowercase())) {
                return false;
            }
        }
        if let Some(min) = min_score {
            if lead.score < min {
                return false;
            }
        }
        true
    }

    /// Picks the next edge out of `node_id` given an optional branch
    /// label (the outcome of a `condition` node). Non-condition nodes
    /// pass `label: None`: exactly one outgoing edge is taken, zero edges
    /// ends the run, and more than one is ambiguous.
    ///
    /// `condition` nodes pass `Some(label)`: an edge with a matching
    /// `label` is preferred; if none carries that label, a single
    /// unlabeled edge is taken as the fallback; more than one unlabeled edge is `AmbiguousBranch`.
    pub fn select_edge(&self, edges: &[&Edge], label: Option<&str>) -> EdgeSelection {
        if edges.is_empty() {
            return EdgeSelection::None;
        }
        if let Some(label) = label {
            if let Some(edge) = edges.iter().find(|e| e.label.as_deref() == Some(label)) {
                return EdgeSelection::One((*edge).clone());
            }
            let unlabeled: Vec<_> = edges.iter().filter(|e| e.label.is_none()).collect();
            return match unlabeled.len() {
                0 => EdgeSelection::None,
                1 => EdgeSelection::One((*unlabeled[0]).clone()),
                _ => EdgeSelection::Ambiguous,
            };
        }
        match edges.len() {
            1 => EdgeSelection::One((*edges[0]).clone()),
            _ => EdgeSelection::Ambiguous,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EdgeSelection {
    One(Edge),
    None,
    Ambiguous,
}

/// Whether `kind` is a `condition` node (used by the engine to decide
/// whether edge selection needs a branch label).
pub fn is_condition(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Condition { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(tags: &[&str], score: f64) -> LeadSnapshot {
        LeadSnapshot {
            tags: tags.iter().map(|s| s.to_string()).collect(),
            stage: "new".to_string(),
            score,
            source: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn condition_tags_any_matches() {
        let eval = JourneyEvaluator::new();
        assert!(eval.evaluate_condition(&["purchase".to_string()], &[], None, &lead(&["purchase"], 0.0), None));
        assert!(!eval.evaluate_condition(&["purchase".to_string()], &[], None, &lead(&["other"], 0.0), None));
    }

    #[test]
    fn single_unlabeled_edge_is_unambiguous() {
        let eval = JourneyEvaluator::new();
        let e1 = Edge { from: "a".into(), to: "b".into(), label: None };
        let edges = vec![&e1];
        assert!(matches!(eval.select_edge(&edges, None), EdgeSelection::One(_)));
    }

    #[test]
    fn multiple_unlabeled_edges_are_ambiguous() {
        let eval = JourneyEvaluator::new();
        let e1 = Edge { from: "a".into(), to: "b".into(), label: None };
        let e2 = Edge { from: "a".into(), to: "c".into(), label: None };
        let edges = vec![&e1, &e2];
        assert!(matches!(eval.select_edge(&edges, None), EdgeSelection::Ambiguous));
    }

    #[test]
    fn labeled_edge_picked_by_branch() {
        let eval = JourneyEvaluator::new();
        let e1 = Edge { from: "a".into(), to: "b".into(), label: Some("true".into()) };
        let e2 = Edge { from: "a".into(), to: "c".into(), label: Some("false".into()) };
        let edges = vec![&e1, &e2];
        match eval.select_edge(&edges, Some("false")) {
            EdgeSelection::One(edge) => assert_eq!(edge.to, "c"),
            other => panic!("expected a single edge, got {other:?}"),
        }
    }

    #[test]
    fn missing_labeled_edge_falls_back_to_single_unlabeled() {
        let eval = JourneyEvaluator::new();
        let e1 = Edge { from: "a".into(), to: "b".into(), label: None };
        let edges = vec![&e1];
        match eval.select_edge(&edges, Some("true")) {
            EdgeSelection::One(edge) => assert_eq!(edge.to, "b"),
            other => panic!("expected fallback edge, got {other:?}"),
        }
    }
}
