//! Attribution + analytics types: credit models,
//! touchpoints, weighted `Attribution` rows, revenue events, and the
//! `AnalyticsDaily` rollup row. Generalizes an
//! `AttributionModel`/`AttributionResult`/`ConversionEvent`/`Touchpoint`
//! shapes in `crates/reporting/src/attribution.rs` from a single
//! aggregate-per-campaign result into per-touchpoint weighted rows, which
//! is what the `Attribution` entity and invariant I5 require.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use wireline_core::ids::{AttributionId, CampaignId, ChannelId, LeadId, OrgId, RevenueEventId};

/// The three credit models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditModel {
    FirstTouch,
    LastTouch,
    Linear,
}

impl CreditModel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "first_touch" => Some(CreditModel::FirstTouch),
            "last_touch" => Some(CreditModel::LastTouch),
            "linear" => Some(CreditModel::Linear),
            _ => None,
        }
    }
}

/// Which underlying record a touchpoint's opaque reference resolves to.
/// Attribution rows weakly reference touchpoints by this tag plus an id
/// string, so a pruned touchpoint never blocks writing or reading an
/// Attribution row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchpointKind {
    Message,
    JourneyStep,
}

/// One touchpoint in a conversion's ordered sequence:
/// either an outbound Message or a completed `send_message` journey step.
/// Both count as independent touchpoints (see DESIGN.md) even when a
/// journey step dispatched the very Message also present in the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub kind: TouchpointKind,
    /// Opaque reference: a `MessageId` or `JourneyRunStepId` rendered as a
    /// string, so it never becomes a foreign key constraint.
    pub reference: String,
    pub channel_id: Option<ChannelId>,
    pub campaign_id: Option<CampaignId>,
    pub timestamp: DateTime<Utc>,
}

/// `{id, lead_id, conversion_at, model, touchpoint_ref, weight, amount_credit}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub id: AttributionId,
    pub org_id: OrgId,
    pub lead_id: LeadId,
    pub conversion_at: DateTime<Utc>,
    pub model: CreditModel,
    pub touchpoint_ref: String,
    pub touchpoint_channel_id: Option<ChannelId>,
    pub touchpoint_campaign_id: Option<CampaignId>,
    pub weight: f64,
    pub amount_credit: f64,
}

/// `{id, lead_id?, campaign_id?, amount, currency, external_id?, received_at}`.
/// Dedup by `(org, external_id)` when `external_id` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueEvent {
    pub id: RevenueEventId,
    pub org_id: OrgId,
    pub lead_id: Option<LeadId>,
    pub campaign_id: Option<CampaignId>,
    pub amount: f64,
    pub currency: String,
    pub external_id: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Set once the event resolves to a campaign (directly or via the
    /// lead's most recent `last_touch` Attribution) — `None` means the
    /// event is stored unattributed.
    pub attributed_campaign_id: Option<CampaignId>,
}

/// Which slice of an org's traffic one `AnalyticsDaily` row covers.
/// Unique per `(org, date, scope)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Scope {
    Org,
    Channel(ChannelId),
    Campaign(CampaignId),
}

/// `{org, date, channel_id?, campaign_id?, outbound_sent, ...}`.
/// Rollup recomputation overwrites these fields absolutely
/// (I6: monotonically non-decreasing under re-aggregation from the same
/// growing event log, never reset to a smaller value by a stale caller
/// racing a newer one — enforced by `RollupEngine::recompute` only ever
/// upserting a freshly computed row, never merging with the old one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsDaily {
    pub org_id: OrgId,
    pub date: NaiveDate,
    pub scope: Scope,
    pub outbound_sent: u64,
    pub outbound_delivered: u64,
    pub outbound_failed: u64,
    pub inbound_count: u64,
    pub response_count: u64,
    pub lead_created: u64,
    pub lead_converted: u64,
    pub attributed_conversions: u64,
    pub attributed_revenue: f64,
    pub computed_at: DateTime<Utc>,
}

impl AnalyticsDaily {
    /// `delivery_rate = delivered / max(sent, 1)`.
    pub fn delivery_rate(&self) -> f64 {
        self.outbound_delivered as f64 / self.outbound_sent.max(1) as f64
    }

    /// `response_rate = responses / max(sent, 1)`.
    pub fn response_rate(&self) -> f64 {
        self.response_count as f64 / self.outbound_sent.max(1) as f64
    }

    /// `conversion_rate = converted / max(created, 1)`.
    pub fn conversion_rate(&self) -> f64 {
        self.lead_converted as f64 / self.lead_created.max(1) as f64
    }
}

/// `ROI = (revenue - cost) / max(cost, 1)`, computed wherever a cost
/// figure is available alongside a rollup row (campaigns carry their own
/// `cost` field; org/channel scopes have none).
pub fn roi(revenue: f64, cost: f64) -> f64 {
    (revenue - cost) / cost.max(1.0)
}
