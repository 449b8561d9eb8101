//! Journey orchestration engine: trigger evaluation,
//! Run/Step creation, and the periodic sweep that advances due steps.
//! Generalizes a `DashMap<Uuid, Journey>` +
//! `DashMap<Uuid, JourneyInstance>`, `enter_journey`/`process_step`) to the
//! spec's Run/Step split and its five closed node kinds.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{info, warn};

use wireline_cache::{AdvisoryLock, RedisCache};
use wireline_channels::MessagePipeline;
use wireline_core::error::{WireError, WireResult};
use wireline_core::event_bus::{make_event, EventSink};
use wireline_core::ids::{ConversationId, JourneyId, JourneyRunId, JourneyRunStepId, LeadId, OrgId};
use wireline_core::model::{EventType, MessageLinkage, MessageStatus};
use wireline_core::store::{ChannelStore, ContactStore, LeadStore, MessageStore};

use crate::evaluator::{EdgeSelection, JourneyEvaluator, StepOutcome};
use crate::state_machine::{run_can_transition, step_can_transition};
use crate::types::{Journey, JourneyRun, JourneyRunStep, JourneyStatus, NodeKind, RunStatus, StepStatus, Trigger};

/// Default debounce window for journey trigger idempotency.
const TRIGGER_DEBOUNCE_MS: u64 = 60_000;
const WEBHOOK_TIMEOUT: StdDuration = StdDuration::from_secs(10);
const WEBHOOK_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct JourneyEngine {
    journeys: Arc<DashMap<JourneyId, Journey>>,
    runs: Arc<DashMap<JourneyRunId, JourneyRun>>,
    steps: Arc<DashMap<JourneyRunId, Vec<JourneyRunStep>>>,
    evaluator: JourneyEvaluator,
    pipeline: Arc<MessagePipeline>,
    channels: Arc<ChannelStore>,
    contacts: Arc<ContactStore>,
    leads: Arc<LeadStore>,
    messages: Arc<MessageStore>,
    cache: Arc<RedisCache>,
    http: reqwest::Client,
    events: Arc<dyn EventSink>,
}

impl JourneyEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: Arc<MessagePipeline>,
        channels: Arc<ChannelStore>,
        contacts: Arc<ContactStore>,
        leads: Arc<LeadStore>,
        messages: Arc<MessageStore>,
        cache: Arc<RedisCache>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            journeys: Arc::new(DashMap::new()),
            runs: Arc::new(DashMap::new()),
            steps: Arc::new(DashMap::new()),
            evaluator: JourneyEvaluator::new(),
            pipeline,
            channels,
            contacts,
            leads,
            messages,
            cache,
            http: reqwest::Client::new(),
            events,
        }
    }

    pub fn create_journey(&self, journey: Journey) -> JourneyId {
        let id = journey.id;
        info!(journey_id = %id, name = %journey.name, "Creating journey");
        self.journeys.insert(id, journey);
        id
    }

    pub fn get_journey(&self, id: &JourneyId) -> Option<Journey> {
        self.journeys.get(id).map(|r| r.clone())
    }

    pub fn list_journeys(&self, org_id: OrgId) -> Vec<Journey> {
        self.journeys.iter().map(|r| r.value().clone()).filter(|j| j.org_id == org_id).collect()
    }

    pub fn update_status(&self, id: &JourneyId, status: JourneyStatus) -> WireResult<()> {
        let mut entry = self
        .journeys
        .get_mut(id)
        .ok_or_else(|| WireError::NotFound(format!("journey {id}")))?;
        entry.status = status;
        entry.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_run(&self, id: &JourneyRunId) -> Option<JourneyRun> {
        self.runs.get(id).map(|r| r.clone())
    }

    pub fn list_runs(&self, journey_id: JourneyId) -> Vec<JourneyRun> {
        self.runs.iter().map(|r| r.value().clone()).filter(|r| r.journey_id == journey_id).collect()
    }

    pub fn list_steps(&self, run_id: JourneyRunId) -> Vec<JourneyRunStep> {
        self.steps.get(&run_id).map(|s| s.clone()).unwrap_or_default()
    }

    /// Every completed `send_message` step for `lead_id`, across all of its
    /// Runs — the journey-side half of C5's touchpoint set.
    pub fn completed_send_message_steps(&self, lead_id: LeadId) -> Vec<JourneyRunStep> {
        let run_ids: Vec<JourneyRunId> = self
        .runs
        .iter()
        .filter(|r| r.lead_id == Some(lead_id))
        .map(|r| r.id)
        .collect();

        let mut out = Vec::new();
        for run_id in run_ids {
            let Some(journey) = self.runs.get(&run_id).and_then(|r| self.journeys.get(&r.journey_id).map(|j| j.clone())) else {
                continue;
            };
            let Some(steps) = self.steps.get(&run_id) else { continue };
            for step in steps.iter() {
                if step.status != StepStatus::Completed {
                    continue;
                }
                if matches!(journey.node(&step.node_id).map(|n| &n.kind), Some(NodeKind::SendMessage { .. })) {
                    out.push(step.clone());
                }
            }
        }
        out
    }

    /// Cancels a Run if it hasn't reached a terminal state. In-flight steps
    /// are left to complete normally; the sweep stops enqueuing further
    /// steps once it observes the cancellation.
    pub fn cancel_run(&self, run_id: JourneyRunId) -> WireResult<()> {
        let mut run = self
        .runs
        .get_mut(&run_id)
        .ok_or_else(|| WireError::NotFound(format!("journey run {run_id}")))?;
        if matches!(run.status, RunStatus::Pending | RunStatus::Running) {
            run.status = RunStatus::Cancelled;
            run.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// `StartRun` — the sole entry point that creates a Run.
    pub fn start_run(
        &self,
        journey: &Journey,
        trigger_type: &str,
        lead_id: Option<LeadId>,
        conversation_id: Option<ConversationId>,
        input: serde_json::Value,
    ) -> WireResult<JourneyRunId> {
        if journey.status != JourneyStatus::Active {
            return Err(WireError::Conflict(format!("journey {} is not active", journey.id)));
        }
        let entry = journey
        .entry_node()
        .ok_or_else(|| WireError::InvalidInput(format!("journey {} has no nodes", journey.id)))?;

        let now = Utc::now();
        let run = JourneyRun {
            id: JourneyRunId::new(),
            org_id: journey.org_id,
            journey_id: journey.id,
            lead_id,
            conversation_id,
            trigger_type: trigger_type.to_string(),
            status: RunStatus::Pending,
            started_at: now,
            completed_at: None,
        };
        let step = JourneyRunStep {
            id: JourneyRunStepId::new(),
            run_id: run.id,
            node_id: entry.id.clone(),
            step_index: 0,
            status: StepStatus::Pending,
            wake_at: None,
            attempts: 0,
            input,
            output: serde_json::Value::Null,
            error: None,
            completed_at: None,
        };

        let mut event = make_event(journey.org_id, EventType::JourneyEntered);
        event.lead_id = lead_id;
        self.events.emit(event);

        info!(run_id = %run.id, journey_id = %journey.id, trigger = trigger_type, "Journey run started");
        self.runs.insert(run.id, run.clone());
        self.steps.insert(run.id, vec![step]);
        Ok(run.id)
    }

    /// Starts a Run for `journey`'s `trigger` if the trigger's predicate
    /// holds against the given text and the journey's debounce window
    /// hasn't already suppressed this `(journey, lead, trigger_kind)`
    /// combination.
    async fn maybe_start(
        &self,
        journey: &Journey,
        lead_id: Option<LeadId>,
        conversation_id: Option<ConversationId>,
        trigger_kind: &'static str,
        input: serde_json::Value,
    ) -> WireResult<Option<JourneyRunId>> {
        let dedup_key = format!(
            "journey-trigger:{}:{}:{}",
            journey.id,
            lead_id.map(|l| l.to_string()).unwrap_or_default(),
            trigger_kind
        );
        let first_seen = self
        .cache
        .set_nx(&dedup_key, "1", TRIGGER_DEBOUNCE_MS)
        .await
        .map_err(|e| WireError::TransientDependency(e.to_string()))?;
        if !first_seen {
            return Ok(None);
        }
        Ok(Some(self.start_run(journey, trigger_kind, lead_id, conversation_id, input)?))
    }

    /// `inbound_message` trigger: matched by `text_includes`.
    pub async fn handle_inbound(
        &self,
        org_id: OrgId,
        lead_id: LeadId,
        conversation_id: ConversationId,
        text: &str,
    ) -> WireResult<Vec<JourneyRunId>> {
        let candidates: Vec<Journey> = self
        .journeys
        .iter()
        .map(|r| r.value().clone())
        .filter(|j| j.org_id == org_id && j.status == JourneyStatus::Active)
        .collect();

        let mut started = Vec::new();
        for journey in &candidates {
            for trigger in &journey.triggers {
                if let Trigger::InboundMessage { text_includes } = trigger {
                    let matched = text_includes.is_empty()
                    || text_includes.iter().any(|needle| {
                            text.to_lowercase().contains(&needle.to_lowercase())
                        });
                    if matched {
                        if let Some(run_id) = self
                        .maybe_start(journey, Some(lead_id), Some(conversation_id), "inbound_message", serde_json::json!({"text": text}))
                        .await?
                        {
                            started.push(run_id);
                        }
                    }
                }
            }
        }
        Ok(started)
    }

    /// `tag_change` trigger: tag set enters `tags_any`.
    pub async fn handle_tag_change(&self, org_id: OrgId, lead_id: LeadId, tags: &[String]) -> WireResult<Vec<JourneyRunId>> {
        let candidates: Vec<Journey> = self
        .journeys
        .iter()
        .map(|r| r.value().clone())
        .filter(|j| j.org_id == org_id && j.status == JourneyStatus::Active)
        .collect();

        let mut started = Vec::new();
        for journey in &candidates {
            for trigger in &journey.triggers {
                if let Trigger::TagChange { tags_any } = trigger {
                    if tags_any.iter().any(|t| tags.contains(t)) {
                        if let Some(run_id) = self
                        .maybe_start(journey, Some(lead_id), None, "tag_change", serde_json::json!({"tags": tags}))
                        .await?
                        {
                            started.push(run_id);
                        }
                    }
                }
            }
        }
        Ok(started)
    }

    /// `stage_change` trigger: stage enters `stages`.
    pub async fn handle_stage_change(&self, org_id: OrgId, lead_id: LeadId, stage: &str) -> WireResult<Vec<JourneyRunId>> {
        let candidates: Vec<Journey> = self
        .journeys
        .iter()
        .map(|r| r.value().clone())
        .filter(|j| j.org_id == org_id && j.status == JourneyStatus::Active)
        .collect();

        let mut started = Vec::new();
        for journey in &candidates {
            for trigger in &journey.triggers {
                if let Trigger::StageChange { stages } = trigger {
                    if stages.iter().any(|s| s == stage) {
                        if let Some(run_id) = self
                        .maybe_start(journey, Some(lead_id), None, "stage_change", serde_json::json!({"stage": stage}))
                        .await?
                        {
                            started.push(run_id);
                        }
                    }
                }
            }
        }
        Ok(started)
    }

    /// `time` trigger sweep: a scheduled UTC instant, or leads whose
    /// `last_activity_at` falls within the configured day window. Runs
    /// alongside the step sweep on the same scheduler interval.
    pub async fn handle_time_triggers(&self, org_id: OrgId, now: DateTime<Utc>) -> WireResult<Vec<JourneyRunId>> {
        let candidates: Vec<Journey> = self
        .journeys
        .iter()
        .map(|r| r.value().clone())
        .filter(|j| j.org_id == org_id && j.status == JourneyStatus::Active)
        .collect();

        let mut started = Vec::new();
        for journey in &candidates {
            for trigger in &journey.triggers {
                let Trigger::Time { at, last_activity_within_days } = trigger else { continue };

                if let Some(at) = at {
                    if now >= *at {
                        let dedup = format!("journey-trigger:{}:at:{}", journey.id, at.timestamp());
                        if self.first_seen(&dedup, TRIGGER_DEBOUNCE_MS).await? {
                            started.push(self.start_run(journey, "time", None, None, serde_json::json!({"at": at}))?);
                        }
                    }
                }

                if let Some(days) = last_activity_within_days {
                    for lead in self.leads.list_by_org(org_id) {
                        let cutoff = now - chrono::Duration::days(*days);
                        if lead.last_activity_at >= cutoff {
                            let today = now.date_naive();
                            let dedup = format!("journey-trigger:{}:{}:time:{}", journey.id, lead.id, today);
                            if self.first_seen(&dedup, 24 * 60 * 60 * 1000).await? {
                                started.push(self.start_run(journey, "time", Some(lead.id), None, serde_json::json!({}))?);
                            }
                        }
                    }
                }
            }
        }
        Ok(started)
    }

    async fn first_seen(&self, key: &str, ttl_ms: u64) -> WireResult<bool> {
        self.cache
        .set_nx(key, "1", ttl_ms)
        .await
        .map_err(|e| WireError::TransientDependency(e.to_string()))
    }

    /// Periodic sweep (`JOURNEY_SCHEDULER_INTERVAL_MS`): advances every Run
    /// with unresolved work, one Run at a time, each under its own
    /// advisory lock.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<JourneyRunStepId> {
        let due_runs: Vec<JourneyRunId> = self
        .runs
        .iter()
        .filter(|r| matches!(r.status, RunStatus::Pending | RunStatus::Running | RunStatus::Cancelled))
        .filter(|r| {
                self.steps
                .get(&r.id)
                .map(|s| matches!(s.last().map(|l| l.status), Some(StepStatus::Pending) | Some(StepStatus::Running)))
                .unwrap_or(false)
            })
        .map(|r| r.id)
        .collect();

        let mut advanced = Vec::new();
        for run_id in due_runs {
            let lock_key = format!("journey_run_lock:{run_id}");
            let lock = match AdvisoryLock::try_acquire(self.cache.clone(), lock_key, 30_000).await {
                Ok(Some(lock)) => lock,
                Ok(None) => continue,
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "Failed to acquire journey run lock");
                    continue;
                }
            };
            if let Some(step_id) = self.advance_run(run_id, now).await {
                advanced.push(step_id);
            }
            if let Err(e) = lock.release().await {
                warn!(run_id = %run_id, error = %e, "Failed to release journey run lock");
            }
        }
        advanced
    }

    async fn advance_run(&self, run_id: JourneyRunId, now: DateTime<Utc>) -> Option<JourneyRunStepId> {
        let run = self.runs.get(&run_id)?.clone();
        let journey = self.journeys.get(&run.journey_id)?.clone();
        let current = {
            let steps = self.steps.get(&run_id)?;
            steps.last()?.clone()
        };

        if let Some(wake_at) = current.wake_at {
            if wake_at > now {
                return None; // I4: remains pending/running until wake_at
            }
        }
        if !matches!(current.status, StepStatus::Pending | StepStatus::Running) {
            return None;
        }

        let Some(node) = journey.node(&current.node_id).cloned() else {
            self.fail_run(run_id, current.id, "node referenced by step no longer exists in journey".to_string());
            return Some(current.id);
        };

        // Status-guarded pending->running.
        if run_can_transition(run.status, RunStatus::Running) {
            if let Some(mut r) = self.runs.get_mut(&run_id) {
                r.status = RunStatus::Running;
            }
        }

        let outcome = self.execute_node(&node.kind, &run, &current, now).await;
        self.apply_outcome(&journey, run_id, current.id, &current.node_id, outcome, now);
        Some(current.id)
    }

    async fn execute_node(
        &self,
        kind: &NodeKind,
        run: &JourneyRun,
        step: &JourneyRunStep,
        now: DateTime<Utc>,
    ) -> StepOutcome {
        match kind {
            NodeKind::Delay { delay_minutes } => {
                if step.wake_at.is_none() {
                    StepOutcome::Waiting { wake_at: now + chrono::Duration::minutes(*delay_minutes) }
                } else {
                    StepOutcome::Completed { output: serde_json::json!({}) }
                }
            }
            NodeKind::Condition { tags_any, text_includes, min_score } => {
                let Some(lead_id) = run.lead_id else {
                    return StepOutcome::Failed { error: "condition node requires a lead".to_string() };
                };
                let Some(lead) = self.leads.get(&lead_id) else {
                    return StepOutcome::Failed { error: "lead not found".to_string() };
                };
                let text = step.input.get("text").and_then(|v| v.as_str());
                let matched = self.evaluator.evaluate_condition(tags_any, text_includes, *min_score, &lead.snapshot(), text);
                StepOutcome::Branch { label: if matched { "true" } else { "false" } }
            }
            NodeKind::TagUpdate { add_tags, remove_tags, set_stage } => {
                let Some(lead_id) = run.lead_id else {
                    return StepOutcome::Failed { error: "tag_update node requires a lead".to_string() };
                };
                let updated = self.leads.update(&lead_id, |lead| {
                        for tag in add_tags {
                            if !lead.tags.contains(tag) {
                                lead.tags.push(tag.clone());
                            }
                        }
                        lead.tags.retain(|t| !remove_tags.contains(t));
                        if let Some(stage) = set_stage {
                            lead.stage = stage.clone();
                        }
                    });
                if updated.is_none() {
                    return StepOutcome::Failed { error: "lead not found".to_string() };
                }
                StepOutcome::Completed { output: serde_json::json!({}) }
            }
            NodeKind::SendMessage { channel_id, text } => {
                if step.status == StepStatus::Running {
                    // Already dispatched; poll the linked Message's status.
                    let Some(message_id) = step.output.get("message_id").and_then(|v| serde_json::from_value(v.clone()).ok()) else {
                        return StepOutcome::Failed { error: "send_message step lost its message id".to_string() };
                    };
                    return match self.messages.get(&message_id).map(|m| m.status) {
                        Some(MessageStatus::Sent) | Some(MessageStatus::Delivered) | Some(MessageStatus::Read) => {
                            StepOutcome::Completed { output: serde_json::json!({"message_id": message_id}) }
                        }
                        Some(MessageStatus::Failed) => StepOutcome::Failed { error: "outbound message failed".to_string() },
                        _ => StepOutcome::Waiting { wake_at: now + chrono::Duration::seconds(5) },
                    };
                }

                let Some(channel) = self.channels.get(channel_id) else {
                    return StepOutcome::Failed { error: format!("unknown channel {channel_id}") };
                };
                let Some(lead_id) = run.lead_id else {
                    return StepOutcome::Failed { error: "send_message node requires a lead".to_string() };
                };
                let Some(lead) = self.leads.get(&lead_id) else {
                    return StepOutcome::Failed { error: "lead not found".to_string() };
                };
                let Some(contact) = self.contacts.get(&lead.contact_id) else {
                    return StepOutcome::Failed { error: "contact not found".to_string() };
                };
                let Some(to) = contact.phone.or(contact.email) else {
                    return StepOutcome::Failed { error: "contact has no channel identity".to_string() };
                };

                match self
                .pipeline
                .send_outbound(&channel, &to, text, Some(MessageLinkage::JourneyRunStep { step_id: step.id }))
                .await
                {
                    Ok(message_id) => StepOutcome::Waiting { wake_at: now + chrono::Duration::seconds(1) }.with_dispatch(message_id),
                    Err(e) => StepOutcome::Failed { error: e.to_string() },
                }
            }
            NodeKind::Webhook { url, method, headers, body } => self.execute_webhook(url, method, headers, body).await,
        }
    }

    async fn execute_webhook(
        &self,
        url: &str,
        method: &str,
        headers: &std::collections::HashMap<String, String>,
        body: &Option<serde_json::Value>,
    ) -> StepOutcome {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::POST);
        for attempt in 0..WEBHOOK_MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(StdDuration::from_millis(1000 * 2u64.pow(attempt - 1))).await;
            }
            let mut req = self.http.request(method.clone(), url).timeout(WEBHOOK_TIMEOUT);
            for (k, v) in headers {
                req = req.header(k.as_str(), v.as_str());
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return StepOutcome::Completed { output: serde_json::json!({"status": resp.status().as_u16()}) };
                }
                Ok(resp) => {
                    warn!(url, status = resp.status().as_u16(), attempt, "Webhook node returned non-2xx");
                }
                Err(e) => {
                    warn!(url, error = %e, attempt, "Webhook node request failed");
                }
            }
        }
        StepOutcome::Failed { error: format!("webhook to {url} failed after {WEBHOOK_MAX_ATTEMPTS} attempts") }
    }

    fn apply_outcome(
        &self,
        journey: &Journey,
        run_id: JourneyRunId,
        step_id: JourneyRunStepId,
        node_id: &str,
        outcome: StepOutcome,
        now: DateTime<Utc>,
    ) {
        let Some(mut steps) = self.steps.get_mut(&run_id) else { return };
        let Some(step) = steps.iter_mut().find(|s| s.id == step_id) else { return };

        match outcome {
            StepOutcome::Waiting { wake_at } => {
                if step.status == StepStatus::Pending && step_can_transition(StepStatus::Pending, StepStatus::Running) {
                    step.status = StepStatus::Running;
                    step.attempts += 1;
                }
                step.wake_at = Some(wake_at);
                return;
            }
            StepOutcome::Dispatched { message_id, wake_at } => {
                step.status = StepStatus::Running;
                step.attempts += 1;
                step.output = serde_json::json!({"message_id": message_id});
                step.wake_at = Some(wake_at);
                return;
            }
            StepOutcome::Completed { output } => {
                step.status = StepStatus::Completed;
                step.output = output;
                step.completed_at = Some(now);
            }
            StepOutcome::Failed { error } => {
                step.status = StepStatus::Failed;
                step.error = Some(error);
                step.completed_at = Some(now);
            }
            StepOutcome::Branch { label } => {
                step.status = StepStatus::Completed;
                step.output = serde_json::json!({"branch": label});
                step.completed_at = Some(now);
            }
        }
        drop(steps);

        // Re-borrow for the completed/failed path, now deciding the run's
        // fate and (on success) the next step.
        let completed = {
            let steps = self.steps.get(&run_id);
            steps.and_then(|s| s.iter().find(|s| s.id == step_id).map(|s| s.status)).unwrap_or(StepStatus::Pending)
        };

        match completed {
            StepStatus::Failed => self.fail_run(run_id, step_id, "step failed".to_string()),
            StepStatus::Completed => {
                let label = {
                    let steps = self.steps.get(&run_id).unwrap();
                    steps
                    .iter()
                    .find(|s| s.id == step_id)
                    .and_then(|s| s.output.get("branch").and_then(|b| b.as_str()).map(|s| s.to_string()))
                };
                self.advance_to_next(journey, run_id, node_id, label.as_deref(), now);
            }
            _ => {}
        }
    }

    fn advance_to_next(&self, journey: &Journey, run_id: JourneyRunId, node_id: &str, label: Option<&str>, now: DateTime<Utc>) {
        let Some(run) = self.runs.get(&run_id).map(|r| r.clone()) else { return };
        if run.status == RunStatus::Cancelled {
            return; // cancellation halts before the next step
        }

        let edges = journey.outgoing_edges(node_id);
        match self.evaluator.select_edge(&edges, label) {
            EdgeSelection::One(edge) => {
                let Some(next_node) = journey.node(&edge.to) else {
                    self.fail_run(run_id, JourneyRunStepId::new(), format!("edge target {} does not exist", edge.to));
                    return;
                };
                let prev_output = {
                    let steps = self.steps.get(&run_id).unwrap();
                    steps.last().map(|s| s.output.clone()).unwrap_or(serde_json::Value::Null)
                };
                let mut steps = self.steps.get_mut(&run_id).unwrap();
                let next_index = steps.len() as u32;
                steps.push(JourneyRunStep {
                        id: JourneyRunStepId::new(),
                        run_id,
                        node_id: next_node.id.clone(),
                        step_index: next_index,
                        status: StepStatus::Pending,
                        wake_at: None,
                        attempts: 0,
                        input: prev_output,
                        output: serde_json::Value::Null,
                        error: None,
                        completed_at: None,
                    });
            }
            EdgeSelection::None => {
                if let Some(mut r) = self.runs.get_mut(&run_id) {
                    r.status = RunStatus::Completed;
                    r.completed_at = Some(now);
                }
                let mut event = make_event(journey.org_id, EventType::JourneyCompleted);
                event.lead_id = run.lead_id;
                self.events.emit(event);
            }
            EdgeSelection::Ambiguous => {
                self.fail_run(run_id, JourneyRunStepId::new(), "AmbiguousBranch: multiple unlabeled outgoing edges".to_string());
            }
        }
    }

    fn fail_run(&self, run_id: JourneyRunId, _step_id: JourneyRunStepId, error: String) {
        if let Some(mut r) = self.runs.get_mut(&run_id) {
            r.status = RunStatus::Failed;
            r.completed_at = Some(Utc::now());
            warn!(run_id = %run_id, error, "Journey run failed");
            let mut event = make_event(r.org_id, EventType::JourneyFailed);
            event.lead_id = r.lead_id;
            self.events.emit(event);
        }
    }
}

impl StepOutcome {
    /// Helper to thread a dispatched Message id alongside a `Waiting`
    /// outcome for `send_message` nodes, without growing the public enum
    /// with a send-specific variant every other node would have to match.
    fn with_dispatch(self, message_id: wireline_core::ids::MessageId) -> StepOutcome {
        match self {
            StepOutcome::Waiting { wake_at } => StepOutcome::Dispatched { message_id, wake_at },
            other => other,
        }
    }
}
