#![warn(clippy::unwrap_used)]
//! Lead rule engine — a pure function from
//! `(LeadSnapshot, RuleContext, &[Rule])` to a minimal `Updates` diff.
//! No I/O, no shared state; callers own persistence and routing.

pub mod engine;
pub mod types;

pub use engine::apply;
pub use types::{MatchedRule, Rule, RuleActions, RuleConditions, RuleContext, Updates};
