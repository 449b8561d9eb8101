//! Touchpoint set construction: for a conversion at `t_c`
//! with lookback window `W`, every outbound Message and completed
//! `send_message` journey step for the lead within `[t_c - W, t_c]`,
//! ordered ascending by timestamp with ties broken by reference id.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use wireline_core::ids::LeadId;
use wireline_core::model::MessageDirection;
use wireline_core::store::{ConversationStore, LeadStore, MessageStore};
use wireline_journey::JourneyEngine;

use crate::types::{Touchpoint, TouchpointKind};

pub struct TouchpointSource {
    pub messages: Arc<MessageStore>,
    pub conversations: Arc<ConversationStore>,
    pub leads: Arc<LeadStore>,
    pub journeys: Arc<JourneyEngine>,
    pub campaigns: Option<Arc<wireline_campaigns::CampaignEngine>>,
}

impl TouchpointSource {
    /// Builds the ordered touchpoint sequence for `lead_id`'s conversion
    /// at `conversion_at`, looking back `window_days` days.
    pub fn touchpoints_for(
        &self,
        lead_id: LeadId,
        conversion_at: DateTime<Utc>,
        window_days: i64,
    ) -> Vec<Touchpoint> {
        let window_start = conversion_at - Duration::days(window_days);
        let mut out = Vec::new();

        if let Some(lead) = self.leads.get(&lead_id) {
            for conversation in self.conversations.list_by_contact(lead.contact_id) {
                for message in self.messages.list_by_conversation(conversation.id) {
                    if message.direction != MessageDirection::Out {
                        continue;
                    }
                    if message.received_at < window_start || message.received_at > conversion_at {
                        continue;
                    }
                    let campaign_id = message.linkage.as_ref().and_then(|l| match l {
                            wireline_core::model::MessageLinkage::CampaignSend { campaign_send_id } => self
                            .campaigns
                            .as_ref()
                            .and_then(|c| c.campaign_for_send(*campaign_send_id)),
                            wireline_core::model::MessageLinkage::JourneyRunStep { .. } => None,
                        });
                    out.push(Touchpoint {
                            kind: TouchpointKind::Message,
                            reference: message.id.to_string(),
                            channel_id: Some(conversation.channel_id),
                            campaign_id,
                            timestamp: message.received_at,
                        });
                }
            }
        }

        for step in self.journeys.completed_send_message_steps(lead_id) {
            let Some(completed_at) = step.completed_at else { continue };
            if completed_at < window_start || completed_at > conversion_at {
                continue;
            }
            out.push(Touchpoint {
                    kind: TouchpointKind::JourneyStep,
                    reference: step.id.to_string(),
                    channel_id: None,
                    campaign_id: None,
                    timestamp: completed_at,
                });
        }

        order_touchpoints(out)
    }
}

/// Ascending by timestamp, ties broken by reference id ascending.
/// Pulled out as a pure function so it's testable without standing up
/// the full store/engine graph `TouchpointSource` wraps.
pub fn order_touchpoints(mut points: Vec<Touchpoint>) -> Vec<Touchpoint> {
    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.reference.cmp(&b.reference)));
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn point(reference: &str, timestamp: DateTime<Utc>) -> Touchpoint {
        Touchpoint {
            kind: TouchpointKind::Message,
            reference: reference.to_string(),
            channel_id: None,
            campaign_id: None,
            timestamp,
        }
    }

    #[test]
    fn orders_ascending_by_timestamp() {
        let points = vec![point("b", ts(20)), point("a", ts(10)), point("c", ts(30))];
        let ordered = order_touchpoints(points);
        assert_eq!(ordered.iter().map(|p| p.reference.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn breaks_ties_on_reference() {
        let points = vec![point("z", ts(10)), point("a", ts(10))];
        let ordered = order_touchpoints(points);
        assert_eq!(ordered.iter().map(|p| p.reference.as_str()).collect::<Vec<_>>(), vec!["a", "z"]);
    }
}
