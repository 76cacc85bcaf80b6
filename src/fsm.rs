//! Deliberative finite state machine.
//!
//! Owns the one current [`Mode`]. Two queues feed it: edge-triggered mode
//! events from the reactive arbitrator, and task events from the behaviour
//! orchestrator. Both are drained each tick in that fixed order, one event
//! per source per tick, so at most one transition fires per source.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Off,
    Sleep,
    Active,
    Interacting,
    Configuring,
    Error,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Off => "Off",
            Mode::Sleep => "Sleep",
            Mode::Active => "Active",
            Mode::Interacting => "Interacting",
            Mode::Configuring => "Configuring",
            Mode::Error => "Error",
        }
    }

    /// Hardware modes track the physical switch; they never interrupt a task
    /// mode (see `apply_arbitrator`).
    pub fn is_hardware(self) -> bool {
        matches!(self, Mode::Sleep | Mode::Active)
    }

    /// Task modes are entered on behalf of a running scenario.
    pub fn is_task(self) -> bool {
        matches!(self, Mode::Interacting | Mode::Configuring)
    }
}

/// Emitted by the orchestrator when a branch takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    CheckIn,
    Configuring,
    Reminder,
}

impl TaskEvent {
    pub fn target_mode(self) -> Mode {
        match self {
            TaskEvent::CheckIn => Mode::Interacting,
            TaskEvent::Configuring => Mode::Configuring,
            TaskEvent::Reminder => Mode::Active,
        }
    }
}

pub struct StateMachine {
    gateway: Arc<Gateway>,
    arbitrator_rx: mpsc::Receiver<Mode>,
    task_rx: mpsc::Receiver<TaskEvent>,
    /// State announcements for the orchestrator's tracked mode.
    announce_tx: mpsc::Sender<Mode>,
    current: Mode,
    last_hardware_mode: Mode,
}

impl StateMachine {
    pub fn new(
        gateway: Arc<Gateway>,
        arbitrator_rx: mpsc::Receiver<Mode>,
        task_rx: mpsc::Receiver<TaskEvent>,
        announce_tx: mpsc::Sender<Mode>,
    ) -> Self {
        let machine = Self {
            gateway,
            arbitrator_rx,
            task_rx,
            announce_tx,
            current: Mode::Sleep,
            last_hardware_mode: Mode::Sleep,
        };
        enter(Mode::Sleep);
        machine
    }

    pub fn current(&self) -> Mode {
        self.current
    }

    pub fn last_hardware_mode(&self) -> Mode {
        self.last_hardware_mode
    }

    /// One tick: arbitrator queue first, then the task queue.
    pub fn tick(&mut self) {
        if let Ok(mode) = self.arbitrator_rx.try_recv() {
            self.apply_arbitrator(mode);
        }
        if let Ok(task) = self.task_rx.try_recv() {
            self.apply_task(task);
        }
    }

    /// Arbitrator events are direct transitions, except that routine
    /// switch/sleep toggling never tears down a scenario in progress: while a
    /// task mode is current, incoming hardware modes only update the
    /// `last_hardware_mode` bookkeeping. `Error` and `Off` always apply.
    fn apply_arbitrator(&mut self, target: Mode) {
        if target == self.current {
            return;
        }
        if target.is_hardware() {
            self.last_hardware_mode = target;
            if self.current.is_task() {
                debug!(
                    "holding {} through hardware change to {}",
                    self.current.name(),
                    target.name()
                );
                return;
            }
        }
        self.transition_to(target);
    }

    fn apply_task(&mut self, event: TaskEvent) {
        let target = event.target_mode();
        if target != self.current {
            self.transition_to(target);
        }
    }

    fn transition_to(&mut self, next: Mode) {
        exit(self.current);
        info!("{} -> {}", self.current.name(), next.name());
        self.current = next;
        enter(next);
        self.gateway.publish_fsm_state(next);
        if self.announce_tx.try_send(next).is_err() {
            warn!("orchestrator announce queue full, dropping {}", next.name());
        }
    }

    pub async fn run(mut self, tick_interval: Duration) {
        info!("state machine started in {}", self.current.name());
        let mut cadence = interval(tick_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            cadence.tick().await;
            self.tick();
        }
    }
}

// Entry/exit hooks. Logging only for now; the hardware power-up/down actions
// belong to the services, commanded by the orchestrator's branches.
fn enter(mode: Mode) {
    debug!("entering {}", mode.name());
}

fn exit(mode: Mode) {
    debug!("exiting {}", mode.name());
}
