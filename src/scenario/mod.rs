//! Scenario engines: step-indexed sub-state-machines driven once per
//! orchestrator tick. No step blocks; absence of progress re-runs the same
//! step on the next tick.

pub mod check_in;
pub mod dialogue;
pub mod reminder;

use tracing::warn;

use crate::gateway::messages::Completion;
use crate::gateway::Gateway;
use crate::tick::Tick;

pub trait Scenario: Send {
    /// Resets the scenario cursor and arms step 1.
    fn start(&mut self, tick: Tick);

    /// Advances at most a few steps; called once per orchestrator tick.
    fn update(&mut self, gateway: &Gateway, tick: Tick);

    fn is_complete(&self) -> bool;
}

/// Issue-once / poll-until-acknowledged helper shared by both scenarios.
///
/// The first call with `waiting == false` runs `issue` and flips the flag;
/// subsequent calls poll the completion mailbox for `key`. The scenarios
/// have no failure branch, so a `Failed` acknowledgment advances exactly
/// like `Complete` but is logged. The acknowledgment is cleared on
/// consumption so a stale one cannot satisfy a later step.
pub(crate) fn await_completion<F>(gateway: &Gateway, waiting: &mut bool, key: &str, issue: F) -> bool
where
    F: FnOnce(&Gateway),
{
    if !*waiting {
        issue(gateway);
        *waiting = true;
        return false;
    }
    match gateway.bus.completion(key) {
        Some(status) => {
            gateway.bus.acknowledge_completion(key);
            if status == Completion::Failed {
                warn!("remote action '{}' reported failure, continuing", key);
            }
            *waiting = false;
            true
        }
        None => false,
    }
}
