//! Daily rollups and realtime windows. `recompute`
//! aggregates counters for one `(org, date, scope)` directly from the
//! authoritative stores — the same store-scanning shape
//! `CampaignEngine::compute_roi` uses for its per-campaign rates — and
//! upserts the result absolutely, never merging with a prior row, which is
//! what keeps re-aggregation idempotent (I6, P5).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use dashmap::DashMap;
use wireline_core::ids::{ChannelId, OrgId};
use wireline_core::model::{Message, MessageDirection, MessageLinkage, MessageStatus};
use wireline_core::store::{ConversationStore, LeadStore, MessageStore};

use crate::attribution::AttributionEngine;
use crate::types::{AnalyticsDaily, Scope};

pub struct RollupEngine {
    messages: Arc<MessageStore>,
    conversations: Arc<ConversationStore>,
    leads: Arc<LeadStore>,
    campaigns: Option<Arc<wireline_campaigns::CampaignEngine>>,
    attribution: Arc<AttributionEngine>,
    response_window_hours: i64,
    rows: Arc<DashMap<(OrgId, NaiveDate, Scope), AnalyticsDaily>>,
}

impl RollupEngine {
    pub fn new(
        messages: Arc<MessageStore>,
        conversations: Arc<ConversationStore>,
        leads: Arc<LeadStore>,
        campaigns: Option<Arc<wireline_campaigns::CampaignEngine>>,
        attribution: Arc<AttributionEngine>,
        response_window_hours: i64,
    ) -> Self {
        Self {
            messages,
            conversations,
            leads,
            campaigns,
            attribution,
            response_window_hours,
            rows: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, org_id: OrgId, date: NaiveDate, scope: Scope) -> Option<AnalyticsDaily> {
        self.rows.get(&(org_id, date, scope)).map(|r| r.clone())
    }

    /// Recomputes and upserts the `(org, date, scope)` row. Always replaces
    /// the prior row wholesale: a second call with an unchanged event log
    /// yields byte-for-byte the same counters (P5).
    pub fn recompute(&self, org_id: OrgId, date: NaiveDate, scope: Scope) -> AnalyticsDaily {
        let day_start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
        let day_end = day_start + Duration::days(1);
        let row = self.aggregate(org_id, day_start, day_end, scope, date);
        self.rows.insert((org_id, date, scope), row.clone());
        row
    }

    /// On-demand counters for the trailing `window_minutes`, capped at
    /// `max_window_minutes`. Not stored —
    /// realtime reads always recompute from the stores directly.
    pub fn realtime_window(&self, org_id: OrgId, scope: Scope, window_minutes: i64, max_window_minutes: i64) -> AnalyticsDaily {
        let window_minutes = window_minutes.clamp(1, max_window_minutes);
        let end = Utc::now();
        let start = end - Duration::minutes(window_minutes);
        self.aggregate(org_id, start, end, scope, start.date_naive())
    }

    fn aggregate(&self, org_id: OrgId, start: DateTime<Utc>, end: DateTime<Utc>, scope: Scope, date: NaiveDate) -> AnalyticsDaily {
        let conversations = self.conversations.list_by_org(org_id);
        let scoped_conversations: Vec<_> = conversations
        .into_iter()
        .filter(|c| matches!(scope, Scope::Org | Scope::Campaign(_)) || matches!(scope, Scope::Channel(ch) if c.channel_id == ch))
        .collect();

        let mut outbound_sent = 0u64;
        let mut outbound_delivered = 0u64;
        let mut outbound_failed = 0u64;
        let mut inbound_count = 0u64;
        let mut response_count = 0u64;

        for conversation in &scoped_conversations {
            let messages = self.messages.list_by_conversation(conversation.id);
            let outbound: Vec<&Message> = messages
            .iter()
            .filter(|m| m.direction == MessageDirection::Out && self.message_in_scope(m, scope))
            .collect();

            for m in &outbound {
                if m.received_at < start || m.received_at >= end {
                    continue;
                }
                let (sent, delivered, failed) = outbound_status_buckets(m.status);
                if sent {
                    outbound_sent += 1;
                }
                if delivered {
                    outbound_delivered += 1;
                }
                if failed {
                    outbound_failed += 1;
                }
            }

            if matches!(scope, Scope::Campaign(_)) {
                // Inbound messages carry no campaign linkage; a campaign
                // scope only ever aggregates the sends it dispatched.
                continue;
            }

            for m in messages.iter().filter(|m| m.direction == MessageDirection::In) {
                if m.received_at < start || m.received_at >= end {
                    continue;
                }
                inbound_count += 1;
                let responds_to_outbound = outbound.iter().any(|o| {
                        m.received_at > o.received_at
                        && m.received_at - o.received_at <= Duration::hours(self.response_window_hours)
                    });
                if responds_to_outbound {
                    response_count += 1;
                }
            }
        }

        let (lead_created, lead_converted) = self.lead_counts(org_id, start, end, scope);
        let attribution_rows = self.attribution.all_rows_for_org(org_id);
        let attributed_conversions = attribution_rows
        .iter()
        .filter(|a| a.conversion_at >= start && a.conversion_at < end && attribution_in_scope(a.touchpoint_channel_id, a.touchpoint_campaign_id, scope))
        .map(|a| a.lead_id)
        .collect::<HashSet<_>>()
        .len() as u64;

        let attributed_revenue: f64 = self
        .attribution
        .all_revenue_for_org(org_id)
        .iter()
        .filter(|e| e.received_at >= start && e.received_at < end && revenue_in_scope(e.attributed_campaign_id, scope))
        .map(|e| e.amount)
        .sum();

        AnalyticsDaily {
            org_id,
            date,
            scope,
            outbound_sent,
            outbound_delivered,
            outbound_failed,
            inbound_count,
            response_count,
            lead_created,
            lead_converted,
            attributed_conversions,
            attributed_revenue,
            computed_at: Utc::now(),
        }
    }

    fn message_in_scope(&self, message: &Message, scope: Scope) -> bool {
        match scope {
            Scope::Org | Scope::Channel(_) => true,
            Scope::Campaign(campaign_id) => match message.linkage {
                Some(MessageLinkage::CampaignSend { campaign_send_id }) => self
                .campaigns
                .as_ref()
                .and_then(|c| c.campaign_for_send(campaign_send_id))
                == Some(campaign_id),
                _ => false,
            },
        }
    }

    fn lead_counts(&self, org_id: OrgId, start: DateTime<Utc>, end: DateTime<Utc>, scope: Scope) -> (u64, u64) {
        let leads = self.leads.list_by_org(org_id);
        match scope {
            Scope::Org => {
                let created = leads.iter().filter(|l| l.created_at >= start && l.created_at < end).count() as u64;
                let converted = leads
                .iter()
                .filter(|l| l.converted_at.map(|at| at >= start && at < end).unwrap_or(false))
                .count() as u64;
                (created, converted)
            }
            Scope::Channel(channel_id) => {
                let contacts_on_channel: HashSet<_> = self
                .conversations
                .list_by_org(org_id)
                .into_iter()
                .filter(|c| c.channel_id == channel_id)
                .map(|c| c.contact_id)
                .collect();
                let created = leads
                .iter()
                .filter(|l| contacts_on_channel.contains(&l.contact_id) && l.created_at >= start && l.created_at < end)
                .count() as u64;
                let converted = leads
                .iter()
                .filter(|l| contacts_on_channel.contains(&l.contact_id) && l.converted_at.map(|at| at >= start && at < end).unwrap_or(false))
                .count() as u64;
                (created, converted)
            }
            Scope::Campaign(campaign_id) => {
                let Some(campaigns) = &self.campaigns else {
                    return (0, 0);
                };
                let leads_sent_to: HashSet<_> = campaigns
                .list_sends_by_org(org_id)
                .into_iter()
                .filter(|(cid, _)| *cid == campaign_id)
                .map(|(_, send)| send.lead_id)
                .collect();
                let converted = leads
                .iter()
                .filter(|l| leads_sent_to.contains(&l.id) && l.converted_at.map(|at| at >= start && at < end).unwrap_or(false))
                .count() as u64;
                (0, converted)
            }
        }
    }
}

/// `(is_sent, is_delivered, is_failed)` for one outbound Message's status.
/// `sent` and `failed` are disjoint: a failed send never reached `sent` in
/// the monotone status chain, so it must not inflate both buckets.
fn outbound_status_buckets(status: MessageStatus) -> (bool, bool, bool) {
    let sent = matches!(status, MessageStatus::Sent | MessageStatus::Delivered | MessageStatus::Read);
    let delivered = matches!(status, MessageStatus::Delivered | MessageStatus::Read);
    let failed = status == MessageStatus::Failed;
    (sent, delivered, failed)
}

fn attribution_in_scope(channel_id: Option<ChannelId>, campaign_id: Option<wireline_core::ids::CampaignId>, scope: Scope) -> bool {
    match scope {
        Scope::Org => true,
        Scope::Channel(ch) => channel_id == Some(ch),
        Scope::Campaign(cid) => campaign_id == Some(cid),
    }
}

fn revenue_in_scope(event_campaign_id: Option<wireline_core::ids::CampaignId>, scope: Scope) -> bool {
    match scope {
        Scope::Org => true,
        Scope::Channel(_) => false,
        Scope::Campaign(cid) => event_campaign_id == Some(cid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_scope_always_in_scope() {
        assert!(attribution_in_scope(None, None, Scope::Org));
        assert!(revenue_in_scope(None, Scope::Org));
    }

    #[test]
    fn channel_revenue_is_never_scoped() {
        assert!(!revenue_in_scope(Some(wireline_core::ids::CampaignId::new()), Scope::Channel(ChannelId::new())));
    }

    #[test]
    fn campaign_scope_requires_matching_campaign() {
        let cid = wireline_core::ids::CampaignId::new();
        assert!(attribution_in_scope(None, Some(cid), Scope::Campaign(cid)));
        assert!(!attribution_in_scope(None, Some(wireline_core::ids::CampaignId::new()), Scope::Campaign(cid)));
    }

    #[test]
    fn failed_sends_never_count_as_sent() {
        let (sent, delivered, failed) = outbound_status_buckets(MessageStatus::Failed);
        assert!(!sent);
        assert!(!delivered);
        assert!(failed);
    }

    #[test]
    fn sent_delivered_and_read_all_count_as_sent() {
        for status in [MessageStatus::Sent, MessageStatus::Delivered, MessageStatus::Read] {
            let (sent, _, failed) = outbound_status_buckets(status);
            assert!(sent);
            assert!(!failed);
        }
    }

    #[test]
    fn pending_counts_as_neither_sent_nor_failed() {
        let (sent, delivered, failed) = outbound_status_buckets(MessageStatus::Pending);
        assert!(!sent);
        assert!(!delivered);
        assert!(!failed);
    }
}
