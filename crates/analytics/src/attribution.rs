//! Credit distribution: on conversion, spreads credit
//! across a lead's touchpoint set under a chosen `CreditModel`, then
//! attaches incoming `RevenueEvent`s to a campaign either directly or via
//! the lead's most recent `last_touch` attribution.
//!
//! Generalizes a `RevenueAttributionEngine::attribute` shape
//! (first/last/fractional credit over
//! a `Vec<ConversionEvent>` keyed by `user_id`) to per-touchpoint weighted
//! rows keyed by `(lead_id, conversion_at, model)`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use wireline_core::ids::{AttributionId, CampaignId, LeadId, OrgId, RevenueEventId};

use crate::touchpoints::TouchpointSource;
use crate::types::{Attribution, CreditModel, RevenueEvent};

/// The Attribution/RevenueEvent bookkeeping `AttributionEngine` wraps,
/// pulled out so its idempotency rules (upsert-by-key, dedup-by-external-id,
/// last-touch fallback resolution) are unit-testable without constructing
/// a `TouchpointSource` — the same split the rest of this workspace draws
/// between pure logic and the Redis-backed engines around it.
#[derive(Default)]
pub struct RevenueLedger {
    rows: Arc<DashMap<LeadId, Vec<Attribution>>>,
    revenue: Arc<DashMap<RevenueEventId, RevenueEvent>>,
    revenue_by_external_id: Arc<DashMap<(OrgId, String), RevenueEventId>>,
}

impl RevenueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts `new_rows` under `(lead_id, conversion_at, model)`,
    /// replacing any rows previously written for that key.
    pub fn upsert(&self, lead_id: LeadId, conversion_at: DateTime<Utc>, model: CreditModel, new_rows: Vec<Attribution>) {
        let conversion_key = conversion_at.timestamp_millis();
        let mut bucket = self.rows.entry(lead_id).or_default();
        bucket.retain(|r| !(r.conversion_at.timestamp_millis() == conversion_key && r.model == model));
        bucket.extend(new_rows);
    }

    pub fn attributions_for_lead(&self, lead_id: LeadId) -> Vec<Attribution> {
        self.rows.get(&lead_id).map(|r| r.clone()).unwrap_or_default()
    }

    /// Every Attribution row written for `org_id`, across every lead —
    /// the scan `RollupEngine::aggregate` uses to count attributed
    /// conversions in a date/scope window.
    pub fn all_rows_for_org(&self, org_id: OrgId) -> Vec<Attribution> {
        self.rows.iter().flat_map(|r| r.value().clone()).filter(|a| a.org_id == org_id).collect()
    }

    /// Every RevenueEvent recorded for `org_id`.
    pub fn all_revenue_for_org(&self, org_id: OrgId) -> Vec<RevenueEvent> {
        self.revenue.iter().map(|r| r.value().clone()).filter(|e| e.org_id == org_id).collect()
    }

    /// Records an incoming RevenueEvent, resolving `attributed_campaign_id`
    /// and deduplicating by
    /// `(org, external_id)` when an external id is present — a repeat
    /// delivery of the same webhook returns the already-recorded event
    /// unchanged rather than double-counting it in rollups.
    pub fn record_revenue_event(&self, mut event: RevenueEvent, lookback_days: i64) -> RevenueEvent {
        if let Some(external_id) = event.external_id.clone() {
            let key = (event.org_id, external_id);
            if let Some(existing_id) = self.revenue_by_external_id.get(&key) {
                if let Some(existing) = self.revenue.get(&existing_id) {
                    return existing.clone();
                }
            }
            event.attributed_campaign_id = self.resolve_campaign(&event, lookback_days);
            self.revenue_by_external_id.insert(key, event.id);
            self.revenue.insert(event.id, event.clone());
            return event;
        }

        event.attributed_campaign_id = self.resolve_campaign(&event, lookback_days);
        self.revenue.insert(event.id, event.clone());
        event
    }

    fn resolve_campaign(&self, event: &RevenueEvent, lookback_days: i64) -> Option<CampaignId> {
        if event.campaign_id.is_some() {
            return event.campaign_id;
        }
        let lead_id = event.lead_id?;
        let rows = self.rows.get(&lead_id)?;
        resolve_campaign_from_rows(&rows, event.received_at, lookback_days)
    }
}

/// The credit `touchpoints[index]` earns under `model`, given `n` total
/// touchpoints. Pulled out as a pure function so the per-model math is
/// testable without standing up a `TouchpointSource`.
fn credit_weight(model: CreditModel, index: usize, n: usize) -> f64 {
    match model {
        CreditModel::FirstTouch => {
            if index == 0 {
                1.0
            } else {
                0.0
            }
        }
        CreditModel::LastTouch => {
            if index == n - 1 {
                1.0
            } else {
                0.0
            }
        }
        CreditModel::Linear => 1.0 / n as f64,
    }
}

/// Picks the campaign of the most recent `last_touch` Attribution row
/// whose `conversion_at` falls within `[received_at - lookback, received_at]`.
/// Pure so it's testable on hand-built rows, without a `RevenueLedger`.
fn resolve_campaign_from_rows(rows: &[Attribution], received_at: DateTime<Utc>, lookback_days: i64) -> Option<CampaignId> {
    let window_start = received_at - Duration::days(lookback_days);
    rows.iter()
    .filter(|r| r.model == CreditModel::LastTouch && r.conversion_at >= window_start && r.conversion_at <= received_at)
    .max_by_key(|r| r.conversion_at)
    .and_then(|r| r.touchpoint_campaign_id)
}

/// Distributes credit for one lead's conversions and keeps every
/// Attribution row ever computed for it, so later reads (the
/// `/v1/attribution/report` surface, revenue attachment fallback) don't
/// need to recompute anything.
pub struct AttributionEngine {
    source: TouchpointSource,
    ledger: RevenueLedger,
}

impl AttributionEngine {
    pub fn new(source: TouchpointSource) -> Self {
        Self { source, ledger: RevenueLedger::new() }
    }

    /// Computes and upserts the Attribution rows for one conversion.
    ///
    /// `revenue_amount` is the amount known at conversion time, if any
    /// (e.g. a purchase event fired in the same request that flips the
    /// lead to `converted`) — each row's `amount_credit` is `weight *
    /// revenue_amount`. When revenue arrives later via
    /// [`AttributionEngine::record_revenue_event`], that path never
    /// rewrites these rows; it only resolves which campaign the revenue
    /// attaches to.
    ///
    /// Returns an empty vec when the touchpoint set is empty, which also
    /// satisfies P4 vacuously.
    pub fn attribute(
        &self,
        org_id: OrgId,
        lead_id: LeadId,
        conversion_at: DateTime<Utc>,
        model: CreditModel,
        window_days: i64,
        revenue_amount: Option<f64>,
    ) -> Vec<Attribution> {
        let touchpoints = self.source.touchpoints_for(lead_id, conversion_at, window_days);
        let n = touchpoints.len();

        let mut new_rows = Vec::new();
        for (i, tp) in touchpoints.iter().enumerate() {
            let weight = credit_weight(model, i, n);
            if weight == 0.0 {
                continue;
            }
            new_rows.push(Attribution {
                    id: AttributionId::new(),
                    org_id,
                    lead_id,
                    conversion_at,
                    model,
                    touchpoint_ref: tp.reference.clone(),
                    touchpoint_channel_id: tp.channel_id,
                    touchpoint_campaign_id: tp.campaign_id,
                    weight,
                    amount_credit: weight * revenue_amount.unwrap_or(0.0),
                });
        }

        self.ledger.upsert(lead_id, conversion_at, model, new_rows.clone());
        new_rows
    }

    pub fn attributions_for_lead(&self, lead_id: LeadId) -> Vec<Attribution> {
        self.ledger.attributions_for_lead(lead_id)
    }

    pub fn all_rows_for_org(&self, org_id: OrgId) -> Vec<Attribution> {
        self.ledger.all_rows_for_org(org_id)
    }

    pub fn all_revenue_for_org(&self, org_id: OrgId) -> Vec<RevenueEvent> {
        self.ledger.all_revenue_for_org(org_id)
    }

    pub fn record_revenue_event(&self, event: RevenueEvent, lookback_days: i64) -> RevenueEvent {
        self.ledger.record_revenue_event(event, lookback_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TouchpointKind;

    fn last_touch_row(lead_id: LeadId, conversion_at: DateTime<Utc>, campaign_id: Option<CampaignId>) -> Attribution {
        Attribution {
            id: AttributionId::new(),
            org_id: OrgId::new(),
            lead_id,
            conversion_at,
            model: CreditModel::LastTouch,
            touchpoint_ref: "t".to_string(),
            touchpoint_channel_id: None,
            touchpoint_campaign_id: campaign_id,
            weight: 1.0,
            amount_credit: 0.0,
        }
    }

    #[test]
    fn revenue_falls_back_to_last_touch_campaign() {
        let ledger = RevenueLedger::new();
        let lead_id = LeadId::new();
        let campaign_id = CampaignId::new();
        let now = Utc::now();
        ledger.upsert(lead_id, now, CreditModel::LastTouch, vec![last_touch_row(lead_id, now, Some(campaign_id))]);

        let event = RevenueEvent {
            id: RevenueEventId::new(),
            org_id: OrgId::new(),
            lead_id: Some(lead_id),
            campaign_id: None,
            amount: 42.0,
            currency: "usd".to_string(),
            external_id: None,
            received_at: now,
            attributed_campaign_id: None,
        };
        let recorded = ledger.record_revenue_event(event, 30);
        assert_eq!(recorded.attributed_campaign_id, Some(campaign_id));
    }

    #[test]
    fn revenue_outside_window_is_unattributed() {
        let ledger = RevenueLedger::new();
        let lead_id = LeadId::new();
        let campaign_id = CampaignId::new();
        let conversion_at = Utc::now() - Duration::days(45);
        ledger.upsert(lead_id, conversion_at, CreditModel::LastTouch, vec![last_touch_row(lead_id, conversion_at, Some(campaign_id))]);

        let event = RevenueEvent {
            id: RevenueEventId::new(),
            org_id: OrgId::new(),
            lead_id: Some(lead_id),
            campaign_id: None,
            amount: 42.0,
            currency: "usd".to_string(),
            external_id: None,
            received_at: Utc::now(),
            attributed_campaign_id: None,
        };
        let recorded = ledger.record_revenue_event(event, 30);
        assert_eq!(recorded.attributed_campaign_id, None);
    }

    #[test]
    fn revenue_dedups_by_external_id() {
        let ledger = RevenueLedger::new();
        let org_id = OrgId::new();
        let base = RevenueEvent {
            id: RevenueEventId::new(),
            org_id,
            lead_id: None,
            campaign_id: Some(CampaignId::new()),
            amount: 10.0,
            currency: "usd".to_string(),
            external_id: Some("ext-1".to_string()),
            received_at: Utc::now(),
            attributed_campaign_id: None,
        };
        let first = ledger.record_revenue_event(base.clone(), 30);
        let mut retry = base;
        retry.id = RevenueEventId::new();
        retry.amount = 999.0;
        let second = ledger.record_revenue_event(retry, 30);
        assert_eq!(first.id, second.id);
        assert_eq!(second.amount, 10.0);
    }

    #[test]
    fn upsert_replaces_rows_for_same_conversion_and_model() {
        let ledger = RevenueLedger::new();
        let lead_id = LeadId::new();
        let now = Utc::now();
        ledger.upsert(lead_id, now, CreditModel::Linear, vec![last_touch_row(lead_id, now, None)]);
        ledger.upsert(lead_id, now, CreditModel::Linear, vec![last_touch_row(lead_id, now, None), last_touch_row(lead_id, now, None)]);
        assert_eq!(ledger.attributions_for_lead(lead_id).len(), 2);
    }

    #[test]
    fn touchpoint_kind_roundtrips_through_serde() {
        let kind = TouchpointKind::JourneyStep;
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"journey_step\"");
    }

    #[test]
    fn linear_splits_credit_evenly_across_three_touchpoints() {
        let weights: Vec<f64> = (0..3).map(|i| credit_weight(CreditModel::Linear, i, 3)).collect();
        assert_eq!(weights, vec![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn first_touch_credits_only_the_first_touchpoint() {
        assert_eq!(credit_weight(CreditModel::FirstTouch, 0, 4), 1.0);
        for i in 1..4 {
            assert_eq!(credit_weight(CreditModel::FirstTouch, i, 4), 0.0);
        }
    }

    #[test]
    fn last_touch_credits_only_the_final_touchpoint() {
        for i in 0..3 {
            assert_eq!(credit_weight(CreditModel::LastTouch, i, 4), 0.0);
        }
        assert_eq!(credit_weight(CreditModel::LastTouch, 3, 4), 1.0);
    }
}
