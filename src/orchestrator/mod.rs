//! Behaviour orchestrator.
//!
//! Owns the three mutually exclusive branches and decides, once per tick,
//! which one should be live. Mutual exclusion is structural: switching always
//! fully deactivates the outgoing branch before the incoming one is
//! activated, so two branches can never be running at the same instant.

pub mod branch;
pub mod leaf;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::fsm::{Mode, TaskEvent};
use crate::gateway::messages::{BranchName, RunStatus, ServiceName, ServiceStatus};
use crate::gateway::Gateway;
use crate::retry::RetryPolicy;
use crate::scenario::check_in::CheckInScenario;
use crate::scenario::reminder::ReminderScenario;
use crate::tick::{Tick, TICK_MS};

use branch::Branch;
use leaf::Leaf;

/// Cooldown before a failed reminder-fallback activation is retried.
pub const REARM_COOLDOWN_TICKS: u64 = 30_000 / TICK_MS;

pub struct Orchestrator {
    gateway: Arc<Gateway>,
    fsm_rx: mpsc::Receiver<Mode>,
    task_tx: mpsc::Sender<TaskEvent>,
    branches: HashMap<BranchName, Branch>,
    current: Option<BranchName>,
    tracked_mode: Option<Mode>,
    readiness: RetryPolicy,
    startup: RetryPolicy,
    start_spacing: Duration,
    tick: Tick,
    /// Set when the reminder fallback failed to activate; cleared on re-arm.
    reminder_rearm_at: Option<Tick>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<Gateway>,
        fsm_rx: mpsc::Receiver<Mode>,
        task_tx: mpsc::Sender<TaskEvent>,
        config: &CoreConfig,
    ) -> Self {
        use BranchName::{CheckIn, Configuring, Reminder};

        let mut branches = HashMap::new();

        let reminder = Branch::new(
            Reminder,
            vec![
                Leaf::critical(ServiceName::UserInterface, Reminder),
                Leaf::critical(ServiceName::Reminder, Reminder),
                Leaf::critical(ServiceName::Database, Reminder),
            ],
            Some(Box::new(ReminderScenario::new(&config.participant_name))),
        );
        branches.insert(Reminder, reminder);

        let check_in = Branch::new(
            CheckIn,
            vec![
                Leaf::critical(ServiceName::UserInterface, CheckIn),
                Leaf::critical(ServiceName::VoiceAssistant, CheckIn),
                Leaf::critical(ServiceName::Database, CheckIn),
                Leaf::optional(ServiceName::RobotController, CheckIn),
            ],
            Some(Box::new(CheckInScenario::with_day(config.first_day, config.day_override))),
        );
        branches.insert(CheckIn, check_in);

        let configuring = Branch::new(
            Configuring,
            vec![
                Leaf::critical(ServiceName::UserInterface, Configuring),
                Leaf::critical(ServiceName::Configurations, Configuring),
                Leaf::critical(ServiceName::Database, Configuring),
            ],
            None,
        );
        branches.insert(Configuring, configuring);

        Self {
            gateway,
            fsm_rx,
            task_tx,
            branches,
            current: None,
            tracked_mode: None,
            readiness: config.readiness,
            startup: config.startup,
            start_spacing: config.start_spacing,
            tick: Tick::new(),
            reminder_rearm_at: None,
        }
    }

    pub fn current_branch(&self) -> Option<BranchName> {
        self.current
    }

    pub fn is_branch_running(&self, name: BranchName) -> bool {
        self.branches[&name].is_running()
    }

    pub fn tracked_mode(&self) -> Option<Mode> {
        self.tracked_mode
    }

    /// Startup barrier: request status from every service and wait until all
    /// tracked services report `Awake`. Once they do, tell the database to
    /// push system state to its subscribers and publish the full status table
    /// for the UI.
    pub async fn wait_for_services(&self) -> Result<(), CoreError> {
        info!("waiting for all services to wake up");
        let gateway = &self.gateway;
        self.startup
            .run_until(|| {
                gateway.request_service_status();
                ServiceName::TRACKED
                    .into_iter()
                    .all(|s| gateway.bus.service_status(s) == ServiceStatus::Awake)
            })
            .await
            .map_err(|timeout| CoreError::StartupTimeout { waited: timeout.waited })?;

        info!("all services awake");
        gateway.behaviour_controller(ServiceName::Database, "update_system_state");
        gateway.publish_system_status();
        Ok(())
    }

    /// One orchestrator tick.
    pub async fn update(&mut self) -> Result<(), CoreError> {
        self.tick = self.tick.next();

        // 1. Drain the state machine's announcements into the tracked mode.
        self.check_state_machine_queue();

        // 2. User-requested behaviours take the branch over.
        self.check_for_user_requested_events().await?;

        // 3. Nothing current: fall back to the reminder branch.
        if self.current.is_none() {
            self.transition_to_branch(BranchName::Reminder).await?;
        }

        // A failed fallback activation re-arms itself after a cooldown, so
        // the system does not idle forever when services come up late.
        if let Some(mark) = self.reminder_rearm_at {
            if self.tick.since(mark) >= REARM_COOLDOWN_TICKS {
                info!("re-arming the reminder branch after its activation cooldown");
                self.reminder_rearm_at = None;
                self.gateway.bus.set_run_status(BranchName::Reminder, RunStatus::Standby);
            }
        }

        // 4. Reconcile the requested status with the branch's running flag.
        self.manage_behaviour().await?;

        // 5. Drive the live branch.
        if let Some(name) = self.current {
            let branch = self.branches.get_mut(&name).expect("branch registered");
            branch.update(&self.gateway, self.tick);
        }
        Ok(())
    }

    /// Hardware-mode announcements (`Sleep`/`Active`) only update the
    /// bookkeeping: the live branch does not change underneath a scenario
    /// because of routine switch toggling.
    fn check_state_machine_queue(&mut self) {
        if let Ok(mode) = self.fsm_rx.try_recv() {
            if self.tracked_mode != Some(mode) {
                self.tracked_mode = Some(mode);
            }
        }
    }

    async fn check_for_user_requested_events(&mut self) -> Result<(), CoreError> {
        let bus = &self.gateway.bus;
        if bus.run_status(BranchName::CheckIn) != RunStatus::Disabled
            && self.current != Some(BranchName::CheckIn)
        {
            info!("check-in requested, taking over the branch");
            self.transition_to_branch(BranchName::CheckIn).await?;
            self.tracked_mode = Some(Mode::Interacting);
        } else if bus.run_status(BranchName::Configuring) != RunStatus::Disabled
            && self.current != Some(BranchName::Configuring)
        {
            info!("configuration requested, taking over the branch");
            self.transition_to_branch(BranchName::Configuring).await?;
            self.tracked_mode = Some(Mode::Configuring);
        }
        Ok(())
    }

    /// Requested-but-idle branches are (re)activated; a branch whose request
    /// was withdrawn is torn down and the system falls back to the reminder
    /// branch.
    async fn manage_behaviour(&mut self) -> Result<(), CoreError> {
        let Some(name) = self.current else { return Ok(()) };
        let requested = self.gateway.bus.run_status(name);
        let running = self.branches[&name].is_running();

        if requested != RunStatus::Disabled && !running {
            self.activate_current(name).await?;
        } else if requested == RunStatus::Disabled && running {
            info!("{} branch request withdrawn", name);
            self.transition_to_branch(BranchName::Reminder).await?;
            self.tracked_mode = Some(Mode::Active);
        }
        Ok(())
    }

    /// Deactivate-then-activate switch; this ordering is the mutual-exclusion
    /// guarantee. Entering the reminder branch rearms it on standby.
    async fn transition_to_branch(&mut self, name: BranchName) -> Result<(), CoreError> {
        if let Some(current) = self.current {
            let outgoing = self.branches.get_mut(&current).expect("branch registered");
            if outgoing.is_running() {
                outgoing.deactivate(&self.gateway);
            }
        }
        self.current = Some(name);
        if name == BranchName::Reminder {
            self.gateway.bus.set_run_status(BranchName::Reminder, RunStatus::Standby);
        }
        self.activate_current(name).await?;

        let event = match name {
            BranchName::Reminder => TaskEvent::Reminder,
            BranchName::CheckIn => TaskEvent::CheckIn,
            BranchName::Configuring => TaskEvent::Configuring,
        };
        if self.task_tx.try_send(event).is_err() {
            warn!("state machine task queue full, dropping {:?}", event);
        }
        Ok(())
    }

    /// A readiness timeout aborts the activation: the failure is reported,
    /// the request is withdrawn so reconciliation does not retry in a tight
    /// loop, and the error propagates to the tick boundary.
    async fn activate_current(&mut self, name: BranchName) -> Result<(), CoreError> {
        let branch = self.branches.get_mut(&name).expect("branch registered");
        match branch.activate(&self.gateway, &self.readiness, self.start_spacing).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.gateway.report_activation_failure(name);
                self.gateway.bus.set_run_status(name, RunStatus::Disabled);
                if name == BranchName::Reminder {
                    self.reminder_rearm_at = Some(self.tick);
                }
                Err(e)
            }
        }
    }

    /// Driver loop. A failed tick is logged and the loop continues; a single
    /// bad tick must never take the process down.
    pub async fn run(mut self, tick_interval: Duration) {
        info!("orchestrator started");
        let mut cadence = interval(tick_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            cadence.tick().await;
            if let Err(e) = self.update().await {
                error!("orchestrator tick failed: {}", e);
            }
        }
    }
}
