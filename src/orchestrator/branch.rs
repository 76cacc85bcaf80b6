//! A branch: an ordered bundle of leaf bindings plus, for the interactive
//! branches, the scenario engine that runs once the branch is live.

use std::time::Duration;

use tracing::info;

use crate::error::CoreError;
use crate::gateway::messages::{BranchName, RunStatus, ServiceStatus};
use crate::gateway::Gateway;
use crate::retry::RetryPolicy;
use crate::scenario::Scenario;
use crate::tick::Tick;

use super::leaf::Leaf;

pub struct Branch {
    pub name: BranchName,
    leaves: Vec<Leaf>,
    running: bool,
    scenario: Option<Box<dyn Scenario>>,
    scenario_active: bool,
}

impl Branch {
    pub fn new(name: BranchName, leaves: Vec<Leaf>, scenario: Option<Box<dyn Scenario>>) -> Self {
        Self { name, leaves, running: false, scenario, scenario_active: false }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Activation protocol: set_up every leaf, hold at the readiness barrier
    /// until every backing service reports `ready`, then start the leaves
    /// serially with a spacing sleep so each service digests its start
    /// command before the next is issued.
    ///
    /// The barrier is the only place a branch suspends the orchestrator loop;
    /// no other branch work is meaningful until readiness is achieved. An
    /// unresponsive service surfaces as `ReadinessTimeout` instead of wedging
    /// the loop forever.
    pub async fn activate(
        &mut self,
        gateway: &Gateway,
        readiness: &RetryPolicy,
        start_spacing: Duration,
    ) -> Result<(), CoreError> {
        info!("activating {} branch", self.name);
        for leaf in &self.leaves {
            leaf.set_up(gateway);
        }

        info!("waiting for services of the {} branch", self.name);
        let leaves = &self.leaves;
        readiness
            .run_until(|| {
                leaves
                    .iter()
                    .all(|leaf| gateway.bus.service_status(leaf.service) == ServiceStatus::Ready)
            })
            .await
            .map_err(|timeout| CoreError::ReadinessTimeout {
                branch: self.name,
                waited: timeout.waited,
            })?;

        for leaf in &self.leaves {
            leaf.start(gateway);
            tokio::time::sleep(start_spacing).await;
        }
        self.running = true;
        info!("{} branch has started", self.name);
        Ok(())
    }

    /// Leaves are idempotent on double-end, so deactivation never fails.
    pub fn deactivate(&mut self, gateway: &Gateway) {
        info!("deactivating {} branch", self.name);
        for leaf in &self.leaves {
            leaf.end(gateway);
        }
        self.scenario_active = false;
        self.running = false;
    }

    /// Per-tick work: leaf updates, scenario arming and driving. The scenario
    /// starts only once the branch is live and the externally requested
    /// status flips to `Enabled`.
    pub fn update(&mut self, gateway: &Gateway, tick: Tick) {
        for leaf in &self.leaves {
            leaf.update(gateway);
        }

        if self.running
            && !self.scenario_active
            && gateway.bus.run_status(self.name) == RunStatus::Enabled
        {
            if let Some(scenario) = self.scenario.as_mut() {
                scenario.start(tick);
                self.scenario_active = true;
            }
        }

        if self.scenario_active {
            if let Some(scenario) = self.scenario.as_mut() {
                scenario.update(gateway, tick);
                if scenario.is_complete() {
                    info!("{} scenario completed", self.name);
                    self.scenario_active = false;
                }
            }
        }
    }
}
