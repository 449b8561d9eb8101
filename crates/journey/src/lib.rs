//! Journey state machine: a trigger/node/edge graph
//! definition, the engine that starts and advances Runs against it, and
//! the pure evaluation/transition helpers it relies on.

pub mod engine;
pub mod evaluator;
pub mod state_machine;
pub mod types;

pub use engine::JourneyEngine;
pub use evaluator::{EdgeSelection, JourneyEvaluator, StepOutcome};
pub use state_machine::{run_can_transition, step_can_transition};
pub use types::{
    Edge, Journey, JourneyRun, JourneyRunStep, JourneyStatus, Node, NodeKind, RunStatus, StepStatus, Trigger,
};
