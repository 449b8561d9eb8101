//! Pure lead rule engine. No I/O, no mutable process
//! state — `apply` is a function of its three inputs and nothing else,
//! the same purity guarantee a pure segment-predicate evaluator gives.

use crate::types::{MatchedRule, Rule, RuleConditions, RuleContext, Updates};
use wireline_core::model::LeadSnapshot;

/// Evaluates `rules` in order against `snapshot`/`context` and returns the
/// minimal diff of fields that changed plus the list of matched rules.
/// Disabled rules are skipped entirely. `stop_on_match` halts evaluation
/// after the rule that set it matches. Malformed rules never panic —
/// there is nothing to malform once deserialization has enforced the
/// closed contract, so "never throws" falls out of purity for free.
#[must_use]
pub fn apply(snapshot: &LeadSnapshot, context: &RuleContext, rules: &[Rule]) -> Updates {
    let mut working = snapshot.clone();
    let mut updates = Updates::default();

    for (index, rule) in rules.iter().enumerate() {
        if !rule.enabled {
            continue;
        }
        if !conditions_match(&rule.conditions, &working, context) {
            continue;
        }

        apply_actions(&rule.actions, &mut working, &mut updates);
        updates.matched_rules.push(MatchedRule {
                rule_id: rule.id.clone(),
                index,
            });

        if rule.stop_on_match {
            break;
        }
    }

    updates
}

fn conditions_match(cond: &RuleConditions, snapshot: &LeadSnapshot, ctx: &RuleContext) -> bool {
    if !cond.text_includes.is_empty() {
        let text = match &ctx.text {
            Some(t) => t.to_lowercase(),
            None => return false,
        };
        if !cond.text_includes.iter().any(|needle| text.contains(&needle.to_lowercase())) {
            return false;
        }
    }

    if !cond.signals_any.is_empty() && !cond.signals_any.iter().any(|s| ctx.signals.contains(s)) {
        return false;
    }

    if !cond.tags_any.is_empty() && !cond.tags_any.iter().any(|t| snapshot.tags.contains(t)) {
        return false;
    }

    if !cond.tags_all.is_empty() && !cond.tags_all.iter().all(|t| snapshot.tags.contains(t)) {
        return false;
    }

    if !cond.stage_in.is_empty() && !cond.stage_in.contains(&snapshot.stage) {
        return false;
    }

    if !cond.source_in.is_empty() {
        match &snapshot.source {
            Some(source) if cond.source_in.contains(source) => {}
            _ => return false,
        }
    }

    let score = snapshot.score;
    if let Some(min) = cond.min_score {
        if score < min {
            return false;
        }
    }
    if let Some(max) = cond.max_score {
        if score > max {
            return false;
        }
    }

    true
}

/// Applies one matched rule's actions, in the fixed order
/// lists, updating both the working snapshot (so later rules in the same
/// pass see this rule's effects) and the accumulated diff.
fn apply_actions(actions: &crate::types::RuleActions, working: &mut LeadSnapshot, updates: &mut Updates) {
    for tag in &actions.add_tags {
        if !working.tags.contains(tag) {
            working.tags.push(tag.clone());
        }
        if !updates.add_tags.contains(tag) {
            updates.add_tags.push(tag.clone());
        }
        updates.remove_tags.retain(|t| t != tag);
    }

    if !actions.remove_tags.is_empty() {
        working.tags.retain(|t| !actions.remove_tags.contains(t));
        for tag in &actions.remove_tags {
            updates.add_tags.retain(|t| t != tag);
            if !updates.remove_tags.contains(tag) {
                updates.remove_tags.push(tag.clone());
            }
        }
    }

    if let Some(stage) = &actions.set_stage {
        working.stage = stage.clone();
        updates.set_stage = Some(stage.clone());
    }

    if let Some(score) = actions.set_score {
        working.score = score;
        updates.set_score = Some(score);
        updates.score_delta = 0.0;
    } else if let Some(delta) = actions.score_delta {
        working.score += delta;
        if updates.set_score.is_none() {
            updates.score_delta += delta;
        }
    }

    if let Some(queue) = &actions.assign_queue {
        working
        .metadata
        .insert("assignment_queue".to_string(), serde_json::json!(queue));
        updates.assign_queue = Some(queue.clone());
    }

    if let Some(source) = &actions.set_source {
        working.source = Some(source.clone());
        updates.set_source = Some(source.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RuleActions, RuleConditions};

    fn base_snapshot() -> LeadSnapshot {
        LeadSnapshot {
            tags: vec![],
            stage: "new".to_string(),
            score: 0.0,
            source: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn scenario_1_inbound_price_rule() {
        let snapshot = base_snapshot();
        let ctx = RuleContext {
            text: Some("I want the price".to_string()),
            signals: vec![],
        };
        let rules = vec![Rule {
                id: Some("r1".to_string()),
                enabled: true,
                conditions: RuleConditions {
                    text_includes: vec!["price".to_string()],
                    ..Default::default()
                },
                actions: RuleActions {
                    add_tags: vec!["price-intent".to_string()],
                    score_delta: Some(5.0),
                    set_source: Some("inbound".to_string()),
                    ..Default::default()
                },
                stop_on_match: false,
                priority: None,
            }];

        let updates = apply(&snapshot, &ctx, &rules);
        assert_eq!(updates.add_tags, vec!["price-intent".to_string()]);
        assert_eq!(updates.score_delta, 5.0);
        assert_eq!(updates.set_source, Some("inbound".to_string()));
        assert_eq!(updates.matched_rules.len(), 1);
    }

    #[test]
    fn scenario_2_signal_stage_change_with_stop() {
        let mut snapshot = base_snapshot();
        snapshot.tags = vec!["price-intent".to_string()];
        snapshot.score = 5.0;
        snapshot.source = Some("inbound".to_string());

        let ctx = RuleContext {
            text: Some("ready to buy".to_string()),
            signals: vec!["purchase".to_string()],
        };
        let rules = vec![Rule {
                id: Some("r2".to_string()),
                enabled: true,
                conditions: RuleConditions {
                    signals_any: vec!["purchase".to_string()],
                    ..Default::default()
                },
                actions: RuleActions {
                    add_tags: vec!["high-intent".to_string()],
                    set_stage: Some("qualified".to_string()),
                    score_delta: Some(10.0),
                    assign_queue: Some("sales".to_string()),
                    ..Default::default()
                },
                stop_on_match: true,
                priority: None,
            }];

        let updates = apply(&snapshot, &ctx, &rules);
        let result = updates.apply_to(snapshot);
        assert_eq!(result.stage, "qualified");
        assert_eq!(result.score, 15.0);
        assert_eq!(
            result.metadata.get("assignment_queue"),
            Some(&serde_json::json!("sales"))
        );
        assert!(!updates.matched_rules.is_empty());
    }

    #[test]
    fn empty_conditions_are_vacuously_true() {
        let snapshot = base_snapshot();
        let ctx = RuleContext::default();
        let rules = vec![Rule {
                id: None,
                enabled: true,
                conditions: RuleConditions::default(),
                actions: RuleActions {
                    add_tags: vec!["always".to_string()],
                    ..Default::default()
                },
                stop_on_match: false,
                priority: None,
            }];
        let updates = apply(&snapshot, &ctx, &rules);
        assert_eq!(updates.add_tags, vec!["always".to_string()]);
    }

    #[test]
    fn disabled_rule_never_matches() {
        let snapshot = base_snapshot();
        let ctx = RuleContext::default();
        let rules = vec![Rule {
                id: None,
                enabled: false,
                conditions: RuleConditions::default(),
                actions: RuleActions {
                    add_tags: vec!["nope".to_string()],
                    ..Default::default()
                },
                stop_on_match: false,
                priority: None,
            }];
        let updates = apply(&snapshot, &ctx, &rules);
        assert!(updates.is_empty());
    }

    #[test]
    fn set_score_wins_over_score_delta() {
        let snapshot = base_snapshot();
        let ctx = RuleContext::default();
        let rules = vec![Rule {
                id: None,
                enabled: true,
                conditions: RuleConditions::default(),
                actions: RuleActions {
                    set_score: Some(42.0),
                    score_delta: Some(7.0),
                    ..Default::default()
                },
                stop_on_match: false,
                priority: None,
            }];
        let updates = apply(&snapshot, &ctx, &rules);
        let result = updates.apply_to(snapshot);
        assert_eq!(result.score, 42.0);
    }

    /// P3: applying the same rule set to the same snapshot+context twice
    /// yields identical diffs.
    #[test]
    fn p3_rule_idempotence() {
        let snapshot = base_snapshot();
        let ctx = RuleContext {
            text: Some("price please".to_string()),
            signals: vec!["purchase".to_string()],
        };
        let rules = vec![Rule {
                id: Some("r".to_string()),
                enabled: true,
                conditions: RuleConditions {
                    text_includes: vec!["price".to_string()],
                    ..Default::default()
                },
                actions: RuleActions {
                    add_tags: vec!["tag".to_string()],
                    score_delta: Some(3.0),
                    ..Default::default()
                },
                stop_on_match: false,
                priority: None,
            }];

        let first = apply(&snapshot, &ctx, &rules);
        let second = apply(&snapshot, &ctx, &rules);
        assert_eq!(first, second);
    }

    #[test]
    fn stop_on_match_halts_subsequent_rules() {
        let snapshot = base_snapshot();
        let ctx = RuleContext::default();
        let rules = vec![
            Rule {
                id: Some("first".to_string()),
                enabled: true,
                conditions: RuleConditions::default(),
                actions: RuleActions {
                    add_tags: vec!["a".to_string()],
                    ..Default::default()
                },
                stop_on_match: true,
                priority: None,
            },
            Rule {
                id: Some("second".to_string()),
                enabled: true,
                conditions: RuleConditions::default(),
                actions: RuleActions {
                    add_tags: vec!["b".to_string()],
                    ..Default::default()
                },
                stop_on_match: false,
                priority: None,
            },
        ];
        let updates = apply(&snapshot, &ctx, &rules);
        assert_eq!(updates.add_tags, vec!["a".to_string()]);
        assert_eq!(updates.matched_rules.len(), 1);
    }
}
