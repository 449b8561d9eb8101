//! Attribution + analytics: touchpoint-set
//! construction, first/last/linear credit distribution, revenue
//! attachment, daily rollups and realtime windows, plus the background
//! event logger every other component emits into via `EventSink`.

pub mod attribution;
pub mod logger;
pub mod rollup;
pub mod touchpoints;
pub mod types;

pub use attribution::{AttributionEngine, RevenueLedger};
pub use logger::EventLogger;
pub use rollup::RollupEngine;
pub use touchpoints::TouchpointSource;
pub use types::{AnalyticsDaily, Attribution, CreditModel, RevenueEvent, Scope, Touchpoint, TouchpointKind};
