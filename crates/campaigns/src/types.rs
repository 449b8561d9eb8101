//! Campaign/CampaignSend records, generalizing a campaign
//! scheduling shape from an ad-spend/bid domain to a
//! message-blast one: a Campaign resolves a Segment of Leads into
//! CampaignSends at `schedule_at`, then tracks each send to a terminal
//! status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wireline_core::ids::{CampaignId, CampaignSendId, ChannelId, LeadId, MessageId, OrgId};

use crate::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CampaignCounters {
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub org_id: OrgId,
    pub name: String,
    pub channel_id: ChannelId,
    pub text: String,
    pub segment: Segment,
    pub status: CampaignStatus,
    pub schedule_at: Option<DateTime<Utc>>,
    pub cost: f64,
    pub counters: CampaignCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSend {
    pub id: CampaignSendId,
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub status: SendStatus,
    pub message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rate/ROI snapshot for `PUT /v1/campaigns/:id/roi`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRoi {
    pub campaign_id: CampaignId,
    pub queued: u64,
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
    pub responses: u64,
    pub conversions: u64,
    pub delivery_rate: f64,
    pub response_rate: f64,
    pub conversion_rate: f64,
    pub revenue: f64,
    pub cost: f64,
    pub roi: f64,
}
