//! Glue between C1/C2/C4/C5 that the engine crates deliberately don't
//! wire together themselves. The
//! API layer is where an inbound message's text/signals actually reach
//! the rule engine, where a rule-driven stage/tag change actually
//! triggers a journey, and where a stage transition actually triggers
//! conversion attribution.

use chrono::Utc;

use wireline_core::error::WireResult;
use wireline_core::event_bus::make_event;
use wireline_core::ids::{ConversationId, LeadId};
use wireline_core::model::EventType;
use wireline_rules::{RuleContext, Updates};

use crate::conversion::detect_and_attribute;
use crate::state::AppState;

/// Evaluates this org's rule set against `lead_id`'s current snapshot and
/// the given trigger context, applies the resulting diff, fires the
/// matching journey triggers (`inbound_message`, `tag_change`,
/// `stage_change`), and runs conversion detection. Returns the diff
/// actually applied so callers (e.g. the signals endpoint) can echo it
/// back to the caller.
pub async fn apply_rules_and_trigger(
    state: &AppState,
    lead_id: LeadId,
    conversation_id: Option<ConversationId>,
    text: Option<&str>,
    signals: &[String],
) -> WireResult<Updates> {
    let Some(lead) = state.leads.get(&lead_id) else {
        return Ok(Updates::default());
    };

    let rules = state.rule_sets.get(&lead.org_id).map(|r| r.value().clone()).unwrap_or_default();
    let context = RuleContext { text: text.map(|s| s.to_string()), signals: signals.to_vec() };
    let updates = wireline_rules::apply(&lead.snapshot(), &context, &rules);

    if !updates.is_empty() {
        state.leads.update(&lead_id, |l| {
                let snapshot = updates.apply_to(l.snapshot());
                l.tags = snapshot.tags;
                l.stage = snapshot.stage;
                l.score = snapshot.score;
                l.source = snapshot.source;
                l.metadata = snapshot.metadata;
                l.last_activity_at = Utc::now();
            });

        let mut event = make_event(lead.org_id, EventType::LeadRuleMatched);
        event.lead_id = Some(lead_id);
        state.events.emit(event);
    }

    let settings = state.analytics_settings_for(lead.org_id);
    detect_and_attribute(
        &state.leads,
        &state.attribution,
        state.events.as_ref(),
        lead_id,
        settings.attribution_window_days,
        None,
        Utc::now(),
    );

    if let (Some(text), Some(conversation_id)) = (text, conversation_id) {
        let _ = state.journeys.handle_inbound(lead.org_id, lead_id, conversation_id, text).await;
    }

    if !updates.add_tags.is_empty() || !updates.remove_tags.is_empty() {
        if let Some(current) = state.leads.get(&lead_id) {
            let _ = state.journeys.handle_tag_change(lead.org_id, lead_id, &current.tags).await;
        }
    }

    if let Some(stage) = &updates.set_stage {
        let _ = state.journeys.handle_stage_change(lead.org_id, lead_id, stage).await;
    }

    Ok(updates)
}
