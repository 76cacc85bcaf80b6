//! Gateway to the pub/sub fabric the rest of the fleet lives on.
//!
//! The transport itself (framing, QoS, retained messages) is someone else's
//! problem: we consume a [`Transport`] that can publish, and whoever owns the
//! wire calls [`Gateway::ingest`] with every inbound message. Inbound traffic
//! lands in [`BusState`], a last-known-value cache the three control loops
//! read; nothing in here blocks and nothing assumes delivery ordering.

pub mod messages;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::fsm::Mode;
use crate::scenario::dialogue::ResponseFormat;

use messages::{
    flag_payload, topics, BehaviourCommand, Completion, CompletionMsg, ControlCommand,
    CriticalSignals, ReminderSentMsg, RunStatus, ServiceName, ServiceStatus, ServiceStatusMsg,
    SpeechCommand, UserResponseMsg,
};

/// The only thing the core asks of the wire. Implementations bridge to the
/// real broker; tests record what was published.
pub trait Transport: Send + Sync {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[derive(Debug)]
struct BusInner {
    critical: CriticalSignals,
    system_status: HashMap<ServiceName, ServiceStatus>,
    behaviour_running: HashMap<messages::BranchName, RunStatus>,
    // One-shot mailbox: a second completion for the same key before
    // acknowledgment overwrites the first.
    completions: HashMap<String, Completion>,
    user_response: Option<String>,
}

impl Default for BusInner {
    fn default() -> Self {
        let behaviour_running = messages::BranchName::ALL
            .into_iter()
            .map(|b| (b, RunStatus::Disabled))
            .collect();
        Self {
            critical: CriticalSignals::default(),
            system_status: HashMap::new(),
            behaviour_running,
            completions: HashMap::new(),
            user_response: None,
        }
    }
}

/// Last-known-value cache behind the gateway. Written by transport callbacks
/// (possibly on a transport-owned thread), read by all three loops.
#[derive(Debug, Default)]
pub struct BusState {
    inner: RwLock<BusInner>,
}

impl BusState {
    pub fn critical_signals(&self) -> CriticalSignals {
        self.inner.read().expect("bus lock poisoned").critical
    }

    pub fn service_status(&self, service: ServiceName) -> ServiceStatus {
        self.inner
            .read()
            .expect("bus lock poisoned")
            .system_status
            .get(&service)
            .copied()
            .unwrap_or_default()
    }

    pub fn system_status_snapshot(&self) -> HashMap<String, ServiceStatus> {
        self.inner
            .read()
            .expect("bus lock poisoned")
            .system_status
            .iter()
            .map(|(k, v)| (k.wire().to_string(), *v))
            .collect()
    }

    pub fn run_status(&self, branch: messages::BranchName) -> RunStatus {
        self.inner
            .read()
            .expect("bus lock poisoned")
            .behaviour_running
            .get(&branch)
            .copied()
            .unwrap_or(RunStatus::Disabled)
    }

    pub fn set_run_status(&self, branch: messages::BranchName, status: RunStatus) {
        self.inner
            .write()
            .expect("bus lock poisoned")
            .behaviour_running
            .insert(branch, status);
    }

    /// Peeks the completion mailbox without consuming it.
    pub fn completion(&self, behaviour: &str) -> Option<Completion> {
        self.inner
            .read()
            .expect("bus lock poisoned")
            .completions
            .get(behaviour)
            .copied()
    }

    /// Clears a consumed acknowledgment so a stale one cannot re-trigger a
    /// later step with the same key.
    pub fn acknowledge_completion(&self, behaviour: &str) {
        self.inner
            .write()
            .expect("bus lock poisoned")
            .completions
            .remove(behaviour);
    }

    /// Takes the latest user response, clearing it. Empty responses stay in
    /// place from the caller's point of view: they are returned as `None`.
    pub fn take_user_response(&self) -> Option<String> {
        let mut inner = self.inner.write().expect("bus lock poisoned");
        match inner.user_response.take() {
            Some(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    fn record_status(&self, service: ServiceName, status: ServiceStatus) {
        self.inner
            .write()
            .expect("bus lock poisoned")
            .system_status
            .insert(service, status);
    }

    fn record_completion(&self, behaviour: String, status: Completion) {
        self.inner
            .write()
            .expect("bus lock poisoned")
            .completions
            .insert(behaviour, status);
    }

    fn record_user_response(&self, content: Option<String>) {
        self.inner.write().expect("bus lock poisoned").user_response = content;
    }

    fn update_critical<F: FnOnce(&mut CriticalSignals)>(&self, f: F) {
        f(&mut self.inner.write().expect("bus lock poisoned").critical)
    }

    fn disable_all_branches(&self) {
        let mut inner = self.inner.write().expect("bus lock poisoned");
        for status in inner.behaviour_running.values_mut() {
            *status = RunStatus::Disabled;
        }
    }
}

/// Publish side plus the inbound cache. Cheap to share: every component holds
/// an `Arc<Gateway>`.
pub struct Gateway {
    transport: Arc<dyn Transport>,
    pub bus: BusState,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, bus: BusState::default() }
    }

    /// Publish failures are logged and dropped; the next tick's poll is the
    /// retry mechanism, not this call.
    pub fn publish(&self, topic: &str, payload: &str) {
        if let Err(e) = self.transport.publish(topic, payload) {
            warn!("publish to '{}' failed, dropping: {}", topic, e);
        }
    }

    pub fn publish_json<T: Serialize>(&self, topic: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => self.publish(topic, &payload),
            Err(e) => warn!("could not encode payload for '{}': {}", topic, e),
        }
    }

    // --- outbound, one method per topic family ---

    pub fn request_service_status(&self) {
        self.publish(topics::REQUEST_SERVICE_STATUS, "");
    }

    pub fn publish_system_status(&self) {
        self.publish_json(topics::PUBLISH_SYSTEM_STATUS, &self.bus.system_status_snapshot());
    }

    pub fn behaviour_controller(&self, service: ServiceName, cmd: &str) {
        debug!("control command '{}' -> {}", cmd, service);
        self.publish_json(&topics::control_cmd(service.wire()), &ControlCommand::new(service, cmd));
    }

    pub fn publish_robot_speech(&self, message_type: &str, content: &str) {
        let msg = SpeechCommand {
            sender: "orchestrator".to_string(),
            message_type: message_type.to_string(),
            content: content.to_string(),
        };
        self.publish_json(topics::ROBOT_SPEECH, &msg);
    }

    pub fn publish_robot_behaviour_command(&self, cmd: &str) {
        let msg = BehaviourCommand {
            sender: "orchestrator".to_string(),
            message_type: "request".to_string(),
            cmd: cmd.to_string(),
            time: messages::wall_time(),
        };
        self.publish_json(topics::ROBOT_BEHAVIOUR, &msg);
    }

    /// Asks the speech service to collect a user response in the given shape.
    pub fn publish_collect_response(&self, expected: ResponseFormat) {
        self.behaviour_controller(ServiceName::VoiceAssistant, expected.wire());
    }

    pub fn publish_reminder_sent(&self, message: &str) {
        let msg = ReminderSentMsg { reminder_message: message.to_string() };
        self.publish_json(topics::SAVE_REMINDER, &msg);
    }

    pub fn publish_fsm_state(&self, mode: Mode) {
        self.publish(topics::FSM_STATE, mode.name());
    }

    pub fn end_check_in(&self) {
        self.publish(topics::CHECK_IN_CONTROL, "0");
    }

    pub fn report_activation_failure(&self, branch: messages::BranchName) {
        self.publish(topics::BEHAVIOUR_STATUS_UPDATE, &format!("activation_failed:{branch}"));
    }

    // --- inbound ---

    /// Routes one inbound message into the cache. Called by the transport for
    /// every subscribed topic. Malformed payloads are logged and discarded;
    /// there is no corrective action to take.
    pub fn ingest(&self, topic: &str, payload: &str) {
        match topic {
            topics::CHECK_IN_CONTROL => {
                if flag_payload(payload) {
                    info!("check-in requested");
                    self.bus.set_run_status(messages::BranchName::CheckIn, RunStatus::Enabled);
                } else {
                    // Ending a check-in stands the whole system down.
                    info!("check-in ended");
                    self.bus.disable_all_branches();
                }
            }
            topics::CONFIGURE_CONTROL => {
                let status =
                    if flag_payload(payload) { RunStatus::Enabled } else { RunStatus::Disabled };
                self.bus.set_run_status(messages::BranchName::Configuring, status);
            }
            topics::START_REMINDER => {
                let status =
                    if flag_payload(payload) { RunStatus::Enabled } else { RunStatus::Disabled };
                self.bus.set_run_status(messages::BranchName::Reminder, status);
            }
            topics::ROBOT_CONTROL_STATUS => match serde_json::from_str::<CompletionMsg>(payload) {
                Ok(msg) => {
                    debug!("completion '{:?}' for '{}'", msg.status, msg.behaviour_name);
                    self.bus.record_completion(msg.behaviour_name, msg.status);
                }
                Err(e) => warn!("discarding malformed payload on '{}': {}", topic, e),
            },
            topics::CONVERSATION_HISTORY => match serde_json::from_str::<UserResponseMsg>(payload)
            {
                Ok(msg) => self.bus.record_user_response(msg.content),
                Err(e) => warn!("discarding malformed payload on '{}': {}", topic, e),
            },
            topics::SWITCH_STATE => {
                self.bus.update_critical(|c| c.switch_on = flag_payload(payload));
            }
            topics::REMINDER_SIGNAL => {
                self.bus.update_critical(|c| c.reminder_pending = flag_payload(payload));
            }
            topics::ERROR_SIGNAL => {
                self.bus.update_critical(|c| c.error_active = flag_payload(payload));
            }
            t if t.ends_with(topics::STATUS_SUFFIX) => {
                match serde_json::from_str::<ServiceStatusMsg>(payload) {
                    Ok(msg) => match ServiceName::parse(&msg.service_name) {
                        Ok(service) => self.bus.record_status(service, msg.status),
                        Err(e) => warn!("discarding status update: {}", e),
                    },
                    Err(e) => warn!("discarding malformed payload on '{}': {}", topic, e),
                }
            }
            other => debug!("ignoring message on unrecognized topic '{}'", other),
        }
    }
}
