//! Campaign orchestration engine: audience preview,
//! scheduling, the periodic materialization tick, and per-send
//! reconciliation against Message status. Generalizes an ad-spend
//! campaign-scheduling shape into a message-blast
//! one over the shared Lead/Message stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use wireline_cache::{AdvisoryLock, RedisCache};
use wireline_channels::MessagePipeline;
use wireline_core::error::{WireError, WireResult};
use wireline_core::event_bus::{make_event, EventSink};
use wireline_core::ids::{CampaignId, CampaignSendId, OrgId};
use wireline_core::model::{EventType, MessageLinkage, MessageStatus};
use wireline_core::store::{ChannelStore, ContactStore, LeadStore, MessageStore};

use crate::types::{Campaign, CampaignCounters, CampaignRoi, CampaignSend, CampaignStatus, SendStatus};

#[derive(Clone)]
pub struct CampaignEngine {
    campaigns: Arc<DashMap<CampaignId, Campaign>>,
    sends: Arc<DashMap<CampaignId, Vec<CampaignSend>>>,
    leads: Arc<LeadStore>,
    channels: Arc<ChannelStore>,
    contacts: Arc<ContactStore>,
    messages: Arc<MessageStore>,
    pipeline: Arc<MessagePipeline>,
    cache: Arc<RedisCache>,
    events: Arc<dyn EventSink>,
}

impl CampaignEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        leads: Arc<LeadStore>,
        channels: Arc<ChannelStore>,
        contacts: Arc<ContactStore>,
        messages: Arc<MessageStore>,
        pipeline: Arc<MessagePipeline>,
        cache: Arc<RedisCache>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            campaigns: Arc::new(DashMap::new()),
            sends: Arc::new(DashMap::new()),
            leads,
            channels,
            contacts,
            messages,
            pipeline,
            cache,
            events,
        }
    }

    pub fn create_campaign(&self, campaign: Campaign) -> CampaignId {
        let id = campaign.id;
        info!(campaign_id = %id, name = %campaign.name, "Creating campaign");
        self.campaigns.insert(id, campaign);
        id
    }

    pub fn get_campaign(&self, id: &CampaignId) -> Option<Campaign> {
        self.campaigns.get(id).map(|r| r.clone())
    }

    pub fn list_campaigns(&self, org_id: OrgId) -> Vec<Campaign> {
        self.campaigns.iter().map(|r| r.value().clone()).filter(|c| c.org_id == org_id).collect()
    }

    pub fn list_sends(&self, campaign_id: CampaignId) -> Vec<CampaignSend> {
        self.sends.get(&campaign_id).map(|s| s.clone()).unwrap_or_default()
    }

    /// All sends for every campaign in `org_id`, paired with their owning
    /// campaign id — the join C5's analytics rollup uses to scope
    /// outbound-message counters by campaign.
    pub fn list_sends_by_org(&self, org_id: OrgId) -> Vec<(CampaignId, CampaignSend)> {
        self.campaigns
        .iter()
        .filter(|c| c.org_id == org_id)
        .flat_map(|c| {
                let campaign_id = c.id;
                self.sends
                .get(&campaign_id)
                .map(|s| s.clone())
                .unwrap_or_default()
                .into_iter()
                .map(move |send| (campaign_id, send))
            })
        .collect()
    }

    /// Resolves the campaign owning a given send, by linear scan — used
    /// to map a Message's `CampaignSend` linkage back to a `campaign_id`
    /// for per-campaign analytics scoping.
    pub fn campaign_for_send(&self, send_id: CampaignSendId) -> Option<CampaignId> {
        self.sends.iter().find_map(|entry| {
                entry.value().iter().find(|s| s.id == send_id).map(|_| *entry.key())
            })
    }

    /// `PreviewAudience(segment)`: count at call time, no
    /// side effects.
    pub fn preview_audience(&self, org_id: OrgId, campaign: &Campaign) -> usize {
        let now = Utc::now();
        self.leads
        .list_by_org(org_id)
        .iter()
        .filter(|lead| campaign.segment.matches(lead, now))
        .count()
    }

    pub fn schedule_campaign(&self, id: &CampaignId, schedule_at: DateTime<Utc>) -> WireResult<()> {
        let now = Utc::now();
        if schedule_at <= now {
            return Err(WireError::InvalidInput("schedule_at must be in the future".to_string()));
        }
        let mut campaign = self
        .campaigns
        .get_mut(id)
        .ok_or_else(|| WireError::NotFound(format!("campaign {id}")))?;
        if campaign.status != CampaignStatus::Draft {
            return Err(WireError::Conflict(format!("campaign {id} is not in draft")));
        }
        campaign.status = CampaignStatus::Scheduled;
        campaign.schedule_at = Some(schedule_at);
        campaign.updated_at = now;

        let mut event = make_event(campaign.org_id, EventType::CampaignScheduled);
        event.campaign_id = Some(*id);
        self.events.emit(event);
        Ok(())
    }

    /// `CancelCampaign(c)`: terminal unless already
    /// `completed`.
    pub fn cancel_campaign(&self, id: &CampaignId) -> WireResult<()> {
        let mut campaign = self
        .campaigns
        .get_mut(id)
        .ok_or_else(|| WireError::NotFound(format!("campaign {id}")))?;
        if campaign.status == CampaignStatus::Completed {
            return Err(WireError::Conflict(format!("campaign {id} already completed")));
        }
        campaign.status = CampaignStatus::Cancelled;
        campaign.updated_at = Utc::now();
        Ok(())
    }

    /// `TickScheduler()`: single-writer per org, guarded
    /// by a named advisory lock. Reconciles in-flight sends first, then
    /// materializes any campaign whose `schedule_at` has arrived.
    pub async fn tick_scheduler(&self, org_id: OrgId, now: DateTime<Utc>) -> WireResult<Vec<CampaignId>> {
        let lock_key = format!("campaign_scheduler:{org_id}");
        let lock = AdvisoryLock::try_acquire(self.cache.clone(), lock_key, 30_000)
        .await
        .map_err(|e| WireError::TransientDependency(e.to_string()))?;
        let Some(lock) = lock else { return Ok(Vec::new()) };

        self.sync_sends(org_id);

        let due: Vec<CampaignId> = self
        .campaigns
        .iter()
        .filter(|c| {
                c.org_id == org_id
                && c.status == CampaignStatus::Scheduled
                && c.schedule_at.is_some_and(|at| at <= now)
            })
        .map(|c| c.id)
        .collect();

        let mut materialized = Vec::new();
        for campaign_id in &due {
            if let Err(e) = self.materialize(*campaign_id, now).await {
                warn!(campaign_id = %campaign_id, error = %e, "Failed to materialize campaign");
                continue;
            }
            materialized.push(*campaign_id);
        }

        self.sync_sends(org_id);
        if let Err(e) = lock.release().await {
            warn!(org_id = %org_id, error = %e, "Failed to release campaign scheduler lock");
        }
        Ok(materialized)
    }

    async fn materialize(&self, campaign_id: CampaignId, now: DateTime<Utc>) -> WireResult<()> {
        let campaign = self
        .campaigns
        .get(&campaign_id)
        .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?
        .clone();
        let channel = self
        .channels
        .get(&campaign.channel_id)
        .ok_or_else(|| WireError::InvalidInput(format!("unknown channel {}", campaign.channel_id)))?;

        if let Some(mut c) = self.campaigns.get_mut(&campaign_id) {
            c.status = CampaignStatus::Running;
            c.updated_at = now;
        }

        let audience = self.leads.list_by_org(campaign.org_id);
        let mut sends = Vec::with_capacity(audience.len());
        for lead in audience.iter().filter(|l| campaign.segment.matches(l, now)) {
            let opted_out = lead
            .metadata
            .get("opted_out")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
            let send_id = CampaignSendId::new();

            if opted_out {
                sends.push(CampaignSend {
                        id: send_id,
                        campaign_id,
                        lead_id: lead.id,
                        status: SendStatus::Skipped,
                        message_id: None,
                        created_at: now,
                        updated_at: now,
                    });
                continue;
            }

            let Some(contact) = self.contacts.get(&lead.contact_id) else {
                sends.push(CampaignSend {
                        id: send_id,
                        campaign_id,
                        lead_id: lead.id,
                        status: SendStatus::Skipped,
                        message_id: None,
                        created_at: now,
                        updated_at: now,
                    });
                continue;
            };
            let Some(to) = contact.phone.clone().or(contact.email.clone()) else {
                sends.push(CampaignSend {
                        id: send_id,
                        campaign_id,
                        lead_id: lead.id,
                        status: SendStatus::Skipped,
                        message_id: None,
                        created_at: now,
                        updated_at: now,
                    });
                continue;
            };

            match self
            .pipeline
            .send_outbound(&channel, &to, &campaign.text, Some(MessageLinkage::CampaignSend { campaign_send_id: send_id }))
            .await
            {
                Ok(message_id) => {
                    sends.push(CampaignSend {
                            id: send_id,
                            campaign_id,
                            lead_id: lead.id,
                            status: SendStatus::Pending,
                            message_id: Some(message_id),
                            created_at: now,
                            updated_at: now,
                        });
                    let mut event = make_event(campaign.org_id, EventType::CampaignSendQueued);
                    event.campaign_id = Some(campaign_id);
                    event.lead_id = Some(lead.id);
                    self.events.emit(event);
                }
                Err(e) => {
                    warn!(campaign_id = %campaign_id, lead_id = %lead.id, error = %e, "Outbound dispatch failed during materialization");
                    sends.push(CampaignSend {
                            id: send_id,
                            campaign_id,
                            lead_id: lead.id,
                            status: SendStatus::Failed,
                            message_id: None,
                            created_at: now,
                            updated_at: now,
                        });
                }
            }
        }

        if let Some(mut c) = self.campaigns.get_mut(&campaign_id) {
            c.counters.queued += sends.iter().filter(|s| s.status == SendStatus::Pending).count() as u64;
            c.counters.skipped += sends.iter().filter(|s| s.status == SendStatus::Skipped).count() as u64;
            c.counters.failed += sends.iter().filter(|s| s.status == SendStatus::Failed).count() as u64;
        }
        self.sends.insert(campaign_id, sends);
        self.maybe_complete(campaign_id, now);
        Ok(())
    }

    /// Propagates terminal Message status onto the owning CampaignSend,
    /// recomputing counters and completion idempotently — scanning all
    /// non-terminal sends is safe to call repeatedly.
    fn sync_sends(&self, org_id: OrgId) {
        let campaign_ids: Vec<CampaignId> = self.campaigns.iter().filter(|c| c.org_id == org_id).map(|c| c.id).collect();
        let now = Utc::now();
        for campaign_id in campaign_ids {
            let Some(mut sends) = self.sends.get_mut(&campaign_id) else { continue };
            let mut newly_sent = 0u64;
            let mut newly_failed = 0u64;
            for send in sends.iter_mut() {
                if send.status != SendStatus::Pending {
                    continue;
                }
                let Some(message_id) = send.message_id else { continue };
                let Some(message) = self.messages.get(&message_id) else { continue };
                match message.status {
                    MessageStatus::Sent | MessageStatus::Delivered | MessageStatus::Read => {
                        send.status = SendStatus::Sent;
                        send.updated_at = now;
                        newly_sent += 1;
                    }
                    MessageStatus::Failed => {
                        send.status = SendStatus::Failed;
                        send.updated_at = now;
                        newly_failed += 1;
                    }
                    MessageStatus::Pending => {}
                }
            }
            drop(sends);

            if newly_sent > 0 || newly_failed > 0 {
                if let Some(mut c) = self.campaigns.get_mut(&campaign_id) {
                    c.counters.sent += newly_sent;
                    c.counters.failed += newly_failed;
                    c.updated_at = now;
                }
                let mut event = make_event(org_id, EventType::CampaignSendTerminal);
                event.campaign_id = Some(campaign_id);
                self.events.emit(event);
            }
            self.maybe_complete(campaign_id, now);
        }
    }

    fn maybe_complete(&self, campaign_id: CampaignId, now: DateTime<Utc>) {
        let Some(mut campaign) = self.campaigns.get_mut(&campaign_id) else { return };
        if campaign.status != CampaignStatus::Running {
            return;
        }
        let all_terminal = self
        .sends
        .get(&campaign_id)
        .map(|sends| sends.iter().all(|s| s.status != SendStatus::Pending))
        .unwrap_or(true);
        if all_terminal {
            campaign.status = CampaignStatus::Completed;
            campaign.updated_at = now;
        }
    }

    /// Rate/ROI snapshot. `revenue` and `cost` are supplied by the caller (the
    /// attribution engine and the campaign's own budget respectively) to
    /// keep this crate from depending on `wireline-analytics`.
    pub fn compute_roi(&self, campaign_id: CampaignId, revenue: f64, response_window_hours: i64) -> WireResult<CampaignRoi> {
        let campaign = self
        .campaigns
        .get(&campaign_id)
        .ok_or_else(|| WireError::NotFound(format!("campaign {campaign_id}")))?
        .clone();
        let sends = self.sends.get(&campaign_id).map(|s| s.clone()).unwrap_or_default();

        let sent = sends.iter().filter(|s| s.status == SendStatus::Sent).count() as u64;
        let failed = sends.iter().filter(|s| s.status == SendStatus::Failed).count() as u64;
        let skipped = sends.iter().filter(|s| s.status == SendStatus::Skipped).count() as u64;
        let queued = campaign.counters.queued.max(sent + failed);

        let mut delivered = 0u64;
        let mut responses = 0u64;
        let mut conversions = 0u64;
        for send in sends.iter().filter(|s| s.status == SendStatus::Sent) {
            let Some(message_id) = send.message_id else { continue };
            let Some(message) = self.messages.get(&message_id) else { continue };
            if matches!(message.status, MessageStatus::Delivered | MessageStatus::Read) {
                delivered += 1;
            }

            let window_end = message.received_at + chrono::Duration::hours(response_window_hours);
            let responded = self
            .messages
            .list_by_conversation(message.conversation_id)
            .iter()
            .any(|m| {
                    m.direction == wireline_core::model::MessageDirection::In
                    && m.received_at > message.received_at
                    && m.received_at <= window_end
                });
            if responded {
                responses += 1;
            }

            if let Some(lead) = self.leads.get(&send.lead_id) {
                if lead.converted_at.is_some_and(|at| at >= send.created_at) {
                    conversions += 1;
                }
            }
        }

        let cost = campaign.cost;
        Ok(CampaignRoi {
                campaign_id,
                queued,
                sent,
                delivered,
                failed,
                skipped,
                responses,
                conversions,
                delivery_rate: delivered as f64 / sent.max(1) as f64,
                response_rate: responses as f64 / sent.max(1) as f64,
                conversion_rate: conversions as f64 / queued.max(1) as f64,
                revenue,
                cost,
                roi: (revenue - cost) / cost.max(1.0),
            })
    }
}
