//! Finite state-transition guards for `RunStatus`/`StepStatus`, generalizing
//! a `Vec<StateTransition>` table checked by
//! `can_transition` to this crate's run/step lifecycles. The engine uses
//! these as the status-guarded transition used in place of
//! a real row-level compare-and-swap.

use crate::types::{RunStatus, StepStatus};

/// Whether a Run may move `from -> to`. Terminal states
/// (`Completed`/`Failed`/`Cancelled`) never transition further.
pub fn run_can_transition(from: RunStatus, to: RunStatus) -> bool {
    use RunStatus::*;
    matches!(
        (from, to),
        (Pending, Running)
        | (Pending, Cancelled)
        | (Running, Completed)
        | (Running, Failed)
        | (Running, Cancelled)
    )
}

/// Whether a Step may move `from -> to`. `Pending -> Pending` (re-arming
/// `wake_at` on a `delay` node) is not a transition handled here; callers
/// mutate `wake_at` in place without changing `status`.
pub fn step_can_transition(from: StepStatus, to: StepStatus) -> bool {
    use StepStatus::*;
    matches!(
        (from, to),
        (Pending, Running) | (Running, Completed) | (Running, Failed) | (Running, Skipped)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_terminal_states_have_no_outgoing_transitions() {
        for terminal in [RunStatus::Completed, RunStatus::Failed, RunStatus::Cancelled] {
            for to in [RunStatus::Pending, RunStatus::Running, RunStatus::Completed, RunStatus::Failed, RunStatus::Cancelled] {
                assert!(!run_can_transition(terminal, to));
            }
        }
    }

    #[test]
    fn step_pending_to_running_allowed_once() {
        assert!(step_can_transition(StepStatus::Pending, StepStatus::Running));
        assert!(!step_can_transition(StepStatus::Running, StepStatus::Pending));
    }
}
