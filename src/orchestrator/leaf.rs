//! Leaf bindings: declarative pointers to an external service's control
//! contract. A leaf never implements behaviour itself; every operation is a
//! `{service_name, cmd, time}` command published through the gateway, and the
//! backing service is expected to echo a status update once it has applied
//! the command.

use tracing::info;

use crate::gateway::messages::{BranchName, ServiceName};
use crate::gateway::Gateway;

/// Whether a branch can run without this service. Optional leaves still get
/// the full set_up/start/end sequence; the distinction is reserved for the
/// readiness policy of degraded deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Critical,
    Optional,
}

#[derive(Debug, Clone, Copy)]
pub struct Leaf {
    pub service: ServiceName,
    pub priority: Priority,
    pub branch: BranchName,
}

impl Leaf {
    pub fn critical(service: ServiceName, branch: BranchName) -> Self {
        Self { service, priority: Priority::Critical, branch }
    }

    pub fn optional(service: ServiceName, branch: BranchName) -> Self {
        Self { service, priority: Priority::Optional, branch }
    }

    /// One-time setup command; idempotent on the service side.
    pub fn set_up(&self, gateway: &Gateway) {
        info!("setting up {} for {} branch", self.service, self.branch);
        gateway.behaviour_controller(self.service, "set_up");
    }

    pub fn start(&self, gateway: &Gateway) {
        info!("starting {} for {} branch", self.service, self.branch);
        gateway.behaviour_controller(self.service, "start");
    }

    /// Per-tick hook; the services run autonomously, so nothing to do yet.
    pub fn update(&self, _gateway: &Gateway) {}

    pub fn end(&self, gateway: &Gateway) {
        info!("ending {} for {} branch", self.service, self.branch);
        // Tearing down the check-in UI also releases the check-in control so
        // the front end returns to its idle page.
        if self.branch == BranchName::CheckIn && self.service == ServiceName::UserInterface {
            gateway.end_check_in();
        }
        gateway.behaviour_controller(self.service, "end");
    }
}
