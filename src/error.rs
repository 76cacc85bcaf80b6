use std::time::Duration;

use crate::gateway::messages::BranchName;

/// The one error type that crosses component boundaries.
///
/// Transport and payload problems never get this far: the gateway logs and
/// drops them, and the next tick's poll is the retry. Barrier timeouts are
/// the errors that matter: they abort branch activation instead of wedging
/// the orchestrator loop forever.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown service name '{0}'")]
    UnknownService(String),

    #[error("{branch} branch activation timed out after {waited:?} waiting for ready services")]
    ReadinessTimeout { branch: BranchName, waited: Duration },

    #[error("services never reported awake, gave up after {waited:?}")]
    StartupTimeout { waited: Duration },
}
