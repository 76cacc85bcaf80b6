mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use keel::error::CoreError;
use keel::fsm::{Mode, TaskEvent};
use keel::gateway::messages::{BranchName, RunStatus, ServiceName};
use keel::orchestrator::Orchestrator;
use keel::retry::RetryPolicy;
use keel::CoreConfig;

use common::{gateway, report_all_awake, report_status, RecordingTransport};

struct Harness {
    orchestrator: Orchestrator,
    fsm_tx: mpsc::Sender<Mode>,
    task_rx: mpsc::Receiver<TaskEvent>,
    transport: Arc<RecordingTransport>,
    gw: Arc<keel::gateway::Gateway>,
}

fn harness() -> Harness {
    let (transport, gw) = gateway();
    let (fsm_tx, fsm_rx) = mpsc::channel(8);
    let (task_tx, task_rx) = mpsc::channel(8);
    let config = CoreConfig {
        readiness: RetryPolicy::immediate(3),
        startup: RetryPolicy::immediate(3),
        start_spacing: Duration::ZERO,
        ..CoreConfig::default()
    };
    let orchestrator = Orchestrator::new(gw.clone(), fsm_rx, task_tx, &config);
    Harness { orchestrator, fsm_tx, task_rx, transport, gw }
}

fn mark_ready(gw: &keel::gateway::Gateway, services: &[ServiceName]) {
    for service in services {
        report_status(gw, *service, "ready");
    }
}

const REMINDER_SERVICES: [ServiceName; 3] =
    [ServiceName::UserInterface, ServiceName::Reminder, ServiceName::Database];

const CHECK_IN_SERVICES: [ServiceName; 4] = [
    ServiceName::UserInterface,
    ServiceName::VoiceAssistant,
    ServiceName::Database,
    ServiceName::RobotController,
];

#[tokio::test]
async fn startup_barrier_waits_for_the_whole_fleet() {
    let h = harness();

    // Nobody has reported awake: the barrier must give up, not hang.
    let err = h.orchestrator.wait_for_services().await.unwrap_err();
    assert!(matches!(err, CoreError::StartupTimeout { .. }));
    assert!(h.transport.count_on("request/service_status") > 0, "the barrier polls actively");

    // Everyone awake: the barrier clears and the status table goes out.
    report_all_awake(&h.gw);
    h.orchestrator.wait_for_services().await.expect("all awake, barrier should clear");
    assert_eq!(h.transport.count_on("publish/system_status"), 1);

    let db_cmds = h.transport.messages_on("database_control_cmd");
    assert!(
        db_cmds.iter().any(|p| p.contains("update_system_state")),
        "database is told to push system state after startup"
    );
}

#[tokio::test]
async fn one_missing_service_holds_the_barrier() {
    let h = harness();
    for service in ServiceName::TRACKED {
        if service != ServiceName::Peripherals {
            report_status(&h.gw, service, "Awake");
        }
    }
    let err = h.orchestrator.wait_for_services().await.unwrap_err();
    assert!(matches!(err, CoreError::StartupTimeout { .. }), "one laggard must hold the barrier");
}

#[tokio::test]
async fn idle_system_falls_back_to_the_reminder_branch() {
    let mut h = harness();
    mark_ready(&h.gw, &REMINDER_SERVICES);

    h.orchestrator.update().await.expect("reminder activation should succeed");

    assert_eq!(h.orchestrator.current_branch(), Some(BranchName::Reminder));
    assert!(h.orchestrator.is_branch_running(BranchName::Reminder));
    assert_eq!(
        h.gw.bus.run_status(BranchName::Reminder),
        RunStatus::Standby,
        "the fallback branch arms on standby, it does not run its scenario"
    );
    assert_eq!(h.task_rx.try_recv(), Ok(TaskEvent::Reminder), "state machine is told");
}

#[tokio::test]
async fn activation_orders_set_up_before_start() {
    let mut h = harness();
    mark_ready(&h.gw, &REMINDER_SERVICES);
    h.orchestrator.update().await.unwrap();

    let cmds: Vec<serde_json::Value> = h
        .transport
        .messages_on("reminder_control_cmd")
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    let cmds: Vec<&str> = cmds.iter().map(|m| m["cmd"].as_str().unwrap()).collect();
    assert_eq!(cmds, vec!["set_up", "start"], "set_up must precede start");
}

#[tokio::test]
async fn check_in_request_takes_over_and_reminder_is_torn_down() {
    let mut h = harness();
    mark_ready(&h.gw, &REMINDER_SERVICES);
    h.orchestrator.update().await.unwrap();
    assert!(h.orchestrator.is_branch_running(BranchName::Reminder));
    h.task_rx.try_recv().ok();
    h.transport.clear();

    // The UI enables a check-in.
    h.gw.ingest("check_in_controller", "1");
    mark_ready(&h.gw, &CHECK_IN_SERVICES);
    h.orchestrator.update().await.expect("check-in activation should succeed");

    assert_eq!(h.orchestrator.current_branch(), Some(BranchName::CheckIn));
    assert!(h.orchestrator.is_branch_running(BranchName::CheckIn));
    assert!(
        !h.orchestrator.is_branch_running(BranchName::Reminder),
        "mutual exclusion: the outgoing branch is down before the new one is up"
    );
    assert_eq!(h.orchestrator.tracked_mode(), Some(Mode::Interacting));
    assert_eq!(h.task_rx.try_recv(), Ok(TaskEvent::CheckIn));

    // The reminder leaves received their end commands.
    let ended = h
        .transport
        .messages_on("reminder_control_cmd")
        .iter()
        .any(|p| p.contains(r#""cmd":"end""#));
    assert!(ended, "outgoing leaves must be ended");
}

#[tokio::test]
async fn withdrawn_request_falls_back_to_reminder() {
    let mut h = harness();
    mark_ready(&h.gw, &REMINDER_SERVICES);
    mark_ready(&h.gw, &CHECK_IN_SERVICES);
    h.gw.ingest("check_in_controller", "1");
    h.orchestrator.update().await.unwrap();
    assert_eq!(h.orchestrator.current_branch(), Some(BranchName::CheckIn));

    // The UI ends the check-in; everything stands down and the reminder
    // branch comes back on standby.
    h.gw.ingest("check_in_controller", "0");
    h.orchestrator.update().await.unwrap();

    assert_eq!(h.orchestrator.current_branch(), Some(BranchName::Reminder));
    assert!(h.orchestrator.is_branch_running(BranchName::Reminder));
    assert!(!h.orchestrator.is_branch_running(BranchName::CheckIn));
    assert_eq!(h.orchestrator.tracked_mode(), Some(Mode::Active));
}

#[tokio::test]
async fn readiness_timeout_aborts_and_reports() {
    let mut h = harness();
    // Check-in requested but its services never report ready.
    h.gw.ingest("check_in_controller", "1");

    let err = h.orchestrator.update().await.unwrap_err();
    assert!(
        matches!(err, CoreError::ReadinessTimeout { branch: BranchName::CheckIn, .. }),
        "got {err}"
    );

    // No start command may have been issued.
    for topic in ["user_interface_control_cmd", "speech_recognition_control_cmd"] {
        let started =
            h.transport.messages_on(topic).iter().any(|p| p.contains(r#""cmd":"start""#));
        assert!(!started, "a branch that never became ready must not be started");
    }

    // The failure is reported and the request withdrawn so the next tick does
    // not spin on the same activation.
    assert!(h.transport.count_on("behaviour_status_update") > 0);
    assert_eq!(h.gw.bus.run_status(BranchName::CheckIn), RunStatus::Disabled);
}

#[tokio::test]
async fn failed_fallback_rearms_after_a_cooldown() {
    let mut h = harness();

    // Services are down at boot: the reminder fallback times out.
    let err = h.orchestrator.update().await.unwrap_err();
    assert!(matches!(err, CoreError::ReadinessTimeout { branch: BranchName::Reminder, .. }));
    assert_eq!(h.gw.bus.run_status(BranchName::Reminder), RunStatus::Disabled);

    // Within the cooldown nothing is retried.
    for _ in 0..10 {
        h.orchestrator.update().await.unwrap();
    }
    assert!(!h.orchestrator.is_branch_running(BranchName::Reminder));
    assert_eq!(h.gw.bus.run_status(BranchName::Reminder), RunStatus::Disabled);

    // The fleet comes up late; once the cooldown elapses the fallback
    // re-arms and activates on its own.
    mark_ready(&h.gw, &REMINDER_SERVICES);
    for _ in 0..=keel::orchestrator::REARM_COOLDOWN_TICKS {
        let _ = h.orchestrator.update().await;
    }
    assert!(h.orchestrator.is_branch_running(BranchName::Reminder));
    assert_eq!(h.gw.bus.run_status(BranchName::Reminder), RunStatus::Standby);
}

#[tokio::test]
async fn configuring_request_enters_the_configuring_branch() {
    let mut h = harness();
    mark_ready(
        &h.gw,
        &[ServiceName::UserInterface, ServiceName::Configurations, ServiceName::Database],
    );
    h.gw.ingest("configure", "1");

    h.orchestrator.update().await.unwrap();

    assert_eq!(h.orchestrator.current_branch(), Some(BranchName::Configuring));
    assert_eq!(h.orchestrator.tracked_mode(), Some(Mode::Configuring));
    assert_eq!(h.task_rx.try_recv(), Ok(TaskEvent::Configuring));
}

#[tokio::test]
async fn fsm_announcements_update_the_tracked_mode() {
    let mut h = harness();
    mark_ready(&h.gw, &REMINDER_SERVICES);

    h.fsm_tx.try_send(Mode::Sleep).unwrap();
    h.orchestrator.update().await.unwrap();
    assert_eq!(h.orchestrator.tracked_mode(), Some(Mode::Sleep));

    // A routine hardware announcement does not change the live branch.
    assert_eq!(h.orchestrator.current_branch(), Some(BranchName::Reminder));
}
