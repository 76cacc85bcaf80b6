//! Reactive layer: a small subsumption-style arbitrator.
//!
//! Polls the critical signals every tick and computes the mode the system
//! should be in by strict priority. Edge-triggered on the computed target,
//! not the inputs, so a steady signal never floods the state machine's queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::fsm::Mode;
use crate::gateway::Gateway;

pub struct ReactiveArbitrator {
    gateway: Arc<Gateway>,
    event_tx: mpsc::Sender<Mode>,
    last_emitted: Option<Mode>,
}

impl ReactiveArbitrator {
    pub fn new(gateway: Arc<Gateway>, event_tx: mpsc::Sender<Mode>) -> Self {
        Self { gateway, event_tx, last_emitted: None }
    }

    pub fn last_emitted(&self) -> Option<Mode> {
        self.last_emitted
    }

    /// Priority: error first, then anything that should wake the device
    /// (switch on, or a pending reminder), then default to sleep. A signal
    /// whose topic has not arrived yet reads as false.
    pub fn detect_critical_condition(&mut self) {
        let signals = self.gateway.bus.critical_signals();

        let target = if signals.error_active {
            Mode::Error
        } else if signals.switch_on || signals.reminder_pending {
            Mode::Active
        } else {
            Mode::Sleep
        };

        if self.last_emitted == Some(target) {
            return;
        }
        match self.event_tx.try_send(target) {
            Ok(()) => {
                info!("critical condition -> {}", target.name());
                self.last_emitted = Some(target);
            }
            // Queue full: keep last_emitted unchanged so the edge is retried
            // next tick instead of lost.
            Err(_) => warn!("state machine queue full, retrying {} next tick", target.name()),
        }
    }

    pub async fn run(mut self, tick_interval: Duration) {
        info!("reactive arbitrator started");
        let mut cadence = interval(tick_interval);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            cadence.tick().await;
            self.detect_critical_condition();
        }
    }
}
