//! Opaque, `Uuid`-backed identifiers for every durable entity.
//!
//! Every row in the data model carries an `organization_id`; `OrgId` is the
//! tenant boundary nothing else crosses. The remaining newtypes exist so a
//! `LeadId` and a `CampaignId` can't be swapped at a call site by accident.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(OrgId);
opaque_id!(ChannelId);
opaque_id!(ContactId);
opaque_id!(ConversationId);
opaque_id!(MessageId);
opaque_id!(LeadId);
opaque_id!(CampaignId);
opaque_id!(CampaignSendId);
opaque_id!(JourneyId);
opaque_id!(JourneyRunId);
opaque_id!(JourneyRunStepId);
opaque_id!(AttributionId);
opaque_id!(RevenueEventId);
