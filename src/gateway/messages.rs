use std::fmt;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn wall_time() -> String {
    Local::now().format(TIME_FMT).to_string()
}

/// Topic names shared with the rest of the fleet. Services follow the
/// `<service>_status` / `<service>_control_cmd` convention; everything else
/// is a fixed name.
pub mod topics {
    pub const REQUEST_SERVICE_STATUS: &str = "request/service_status";
    pub const PUBLISH_SYSTEM_STATUS: &str = "publish/system_status";
    pub const ROBOT_SPEECH: &str = "robot_tts";
    pub const ROBOT_BEHAVIOUR: &str = "robot_behaviour_command";
    pub const ROBOT_CONTROL_STATUS: &str = "robot_control_status";
    pub const FSM_STATE: &str = "fsm/state";
    pub const SAVE_REMINDER: &str = "save_reminder";
    pub const CHECK_IN_CONTROL: &str = "check_in_controller";
    pub const CONFIGURE_CONTROL: &str = "configure";
    pub const START_REMINDER: &str = "start_reminder";
    pub const CONVERSATION_HISTORY: &str = "conversation/history";
    pub const BEHAVIOUR_STATUS_UPDATE: &str = "behaviour_status_update";
    pub const SWITCH_STATE: &str = "robot/switch_state";
    pub const REMINDER_SIGNAL: &str = "robot/reminder";
    pub const ERROR_SIGNAL: &str = "robot/error";

    pub const STATUS_SUFFIX: &str = "_status";

    pub fn control_cmd(service: &str) -> String {
        format!("{service}_control_cmd")
    }
}

/// The external services this core knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    UserInterface,
    VoiceAssistant,
    RobotController,
    Reminder,
    Database,
    Configurations,
    Peripherals,
}

impl ServiceName {
    /// Services expected to report `Awake` before the orchestrator declares
    /// itself ready. `Configurations` is served by the user interface and has
    /// no standalone process, so it is excluded from the startup barrier.
    pub const TRACKED: [ServiceName; 6] = [
        ServiceName::VoiceAssistant,
        ServiceName::RobotController,
        ServiceName::UserInterface,
        ServiceName::Reminder,
        ServiceName::Database,
        ServiceName::Peripherals,
    ];

    pub fn wire(self) -> &'static str {
        match self {
            ServiceName::UserInterface => "user_interface",
            ServiceName::VoiceAssistant => "speech_recognition",
            // Status topic is robot_status; robot_control_status is reserved
            // for behaviour completion acks.
            ServiceName::RobotController => "robot",
            ServiceName::Reminder => "reminder",
            ServiceName::Database => "database",
            ServiceName::Configurations => "configurations",
            ServiceName::Peripherals => "peripherals",
        }
    }

    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name {
            "user_interface" => Ok(ServiceName::UserInterface),
            "speech_recognition" => Ok(ServiceName::VoiceAssistant),
            "robot" => Ok(ServiceName::RobotController),
            "reminder" => Ok(ServiceName::Reminder),
            "database" => Ok(ServiceName::Database),
            "configurations" => Ok(ServiceName::Configurations),
            "peripherals" => Ok(ServiceName::Peripherals),
            other => Err(CoreError::UnknownService(other.to_string())),
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

/// Top-level behaviours. Exactly one branch may be running at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchName {
    Reminder,
    CheckIn,
    Configuring,
}

impl BranchName {
    pub const ALL: [BranchName; 3] =
        [BranchName::Reminder, BranchName::CheckIn, BranchName::Configuring];

    pub fn wire(self) -> &'static str {
        match self {
            BranchName::Reminder => "reminder",
            BranchName::CheckIn => "check_in",
            BranchName::Configuring => "configuring",
        }
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

/// Last reported status of an external service. Last write wins; there is no
/// sequencing between a control command we sent and the status that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceStatus {
    Awake,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "failure")]
    Failure,
    #[default]
    #[serde(rename = "", other)]
    Unknown,
}

/// Requested run status of a branch, set from the outside (UI toggle,
/// reminder schedule) and consumed by the orchestrator's reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Enabled,
    Disabled,
    Standby,
}

/// One-shot completion acknowledgment for a remote action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    Complete,
    Failed,
}

/// Safety-critical inputs sampled by the reactive arbitrator. Never owned
/// here; a topic that has not arrived yet reads as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriticalSignals {
    pub switch_on: bool,
    pub reminder_pending: bool,
    pub error_active: bool,
}

// --- wire envelopes ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusMsg {
    pub service_name: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMsg {
    pub behaviour_name: String,
    pub status: Completion,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlCommand {
    pub service_name: String,
    pub cmd: String,
    pub time: String,
}

impl ControlCommand {
    pub fn new(service: ServiceName, cmd: &str) -> Self {
        Self {
            service_name: service.wire().to_string(),
            cmd: cmd.to_string(),
            time: wall_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechCommand {
    pub sender: String,
    pub message_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviourCommand {
    pub sender: String,
    pub message_type: String,
    pub cmd: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponseMsg {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSentMsg {
    pub reminder_message: String,
}

/// Parses the one-character controls used on the `check_in_controller`,
/// `configure` and `start_reminder` topics, plus the loose boolean spellings
/// the peripherals publish on the critical-signal topics.
pub fn flag_payload(payload: &str) -> bool {
    matches!(payload.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on")
}
