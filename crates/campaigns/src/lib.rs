//! Campaign orchestrator: segment-based audience
//! resolution, scheduling, the periodic materialization tick, and
//! per-send reconciliation against Message status.

pub mod engine;
pub mod segment;
pub mod types;

pub use engine::CampaignEngine;
pub use segment::Segment;
pub use types::{Campaign, CampaignCounters, CampaignRoi, CampaignSend, CampaignStatus, SendStatus};
