//! Shared conversion-detection helper. Every surface that can set a Lead's `stage` (the rule
//! engine via `/v1/leads/:id/signals`, CRM ingestion, journey
//! `tag_update` nodes) funnels through this one function so the
//! attribution trigger (I3/P2) never runs twice or gets skipped.

use chrono::{DateTime, Utc};
use wireline_analytics::{Attribution, AttributionEngine, CreditModel};
use wireline_core::event_bus::{make_event, EventSink};
use wireline_core::ids::LeadId;
use wireline_core::model::{EventType, CONVERTED_STAGE};
use wireline_core::store::LeadStore;

/// Every credit model a conversion distributes rows under. This is the
/// only writer of Attribution rows, so `/v1/attribution/report` can only
/// serve a model if it's computed here.
const ALL_CREDIT_MODELS: [CreditModel; 3] = [CreditModel::FirstTouch, CreditModel::LastTouch, CreditModel::Linear];

/// Re-checks `lead_id` after a stage-mutating write: if its stage is now
/// `converted` and `converted_at` wasn't already set, stamps
/// `converted_at`, distributes attribution credit under every credit
/// model over the default lookback window, and emits `LeadConverted`. A
/// no-op (returns `None`) for every other case, including the
/// already-converted one (P2: `converted_at` never moves once set).
pub fn detect_and_attribute(
    leads: &LeadStore,
    attribution: &AttributionEngine,
    events: &dyn EventSink,
    lead_id: LeadId,
    window_days: i64,
    revenue_amount: Option<f64>,
    now: DateTime<Utc>,
) -> Option<Vec<Attribution>> {
    let lead = leads.get(&lead_id)?;
    if lead.stage != CONVERTED_STAGE || lead.converted_at.is_some() {
        return None;
    }

    let updated = leads.update(&lead_id, |l| l.mark_converted(now))?;
    let converted_at = updated.converted_at?;

    let mut rows = Vec::new();
    for model in ALL_CREDIT_MODELS {
        rows.extend(attribution.attribute(updated.org_id, lead_id, converted_at, model, window_days, revenue_amount));
    }

    let mut event = make_event(updated.org_id, EventType::LeadConverted);
    event.lead_id = Some(lead_id);
    events.emit(event);

    Some(rows)
}
