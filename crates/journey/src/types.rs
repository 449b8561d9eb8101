//! Journey state machine types: a node/edge graph
//! definition plus per-run/per-step execution records, generalizing the
//! teacher's `Journey`/`JourneyInstance`/`StepExecution` shape
//! (`crates/journey/src/types.rs`) from a generic action/wait/decision/
//! split graph down to five closed node kinds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wireline_core::ids::{ChannelId, ConversationId, JourneyId, JourneyRunId, JourneyRunStepId, LeadId, OrgId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

/// The sole entry point that creates a Run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", deny_unknown_fields)]
pub enum Trigger {
    InboundMessage {
        text_includes: Vec<String>,
    },
    TagChange {
        tags_any: Vec<String>,
    },
    StageChange {
        stages: Vec<String>,
    },
    Time {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
        #[serde(default)]
        last_activity_within_days: Option<i64>,
    },
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::InboundMessage { .. } => "inbound_message",
            Trigger::TagChange { .. } => "tag_change",
            Trigger::StageChange { .. } => "stage_change",
            Trigger::Time { .. } => "time",
        }
    }
}

/// The five closed node kinds. Unknown kinds are
/// rejected at ingress (`deny_unknown_fields` + the closed tag set),
/// following "dynamic configs -> enumerated contracts."
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", deny_unknown_fields)]
pub enum NodeKind {
    SendMessage {
        channel_id: ChannelId,
        text: String,
    },
    Delay {
        delay_minutes: i64,
    },
    Condition {
        #[serde(default)]
        tags_any: Vec<String>,
        #[serde(default)]
        text_includes: Vec<String>,
        #[serde(default)]
        min_score: Option<f64>,
    },
    TagUpdate {
        #[serde(default)]
        add_tags: Vec<String>,
        #[serde(default)]
        remove_tags: Vec<String>,
        #[serde(default)]
        set_stage: Option<String>,
    },
    Webhook {
        url: String,
        #[serde(default = "default_webhook_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<serde_json::Value>,
    },
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// A directed edge between two nodes. `label` is the branch name a
/// `condition` node's outcome (`"true"`/`"false"`) picks among.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub id: JourneyId,
    pub org_id: OrgId,
    pub name: String,
    pub status: JourneyStatus,
    pub triggers: Vec<Trigger>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Journey {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The node a new Run starts at. An open question not pinned down elsewhere; resolved as
    /// the first node in declaration order (see DESIGN.md).
    pub fn entry_node(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == node_id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyRun {
    pub id: JourneyRunId,
    pub org_id: OrgId,
    pub journey_id: JourneyId,
    pub lead_id: Option<LeadId>,
    pub conversation_id: Option<ConversationId>,
    pub trigger_type: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyRunStep {
    pub id: JourneyRunStepId,
    pub run_id: JourneyRunId,
    pub node_id: String,
    pub step_index: u32,
    pub status: StepStatus,
    pub wake_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}
