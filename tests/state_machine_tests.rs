mod common;

use tokio::sync::mpsc;

use keel::fsm::{Mode, StateMachine, TaskEvent};

use common::gateway;

struct Harness {
    machine: StateMachine,
    arb_tx: mpsc::Sender<Mode>,
    task_tx: mpsc::Sender<TaskEvent>,
    announce_rx: mpsc::Receiver<Mode>,
    transport: std::sync::Arc<common::RecordingTransport>,
}

fn harness() -> Harness {
    let (transport, gw) = gateway();
    let (arb_tx, arb_rx) = mpsc::channel(8);
    let (task_tx, task_rx) = mpsc::channel(8);
    let (announce_tx, announce_rx) = mpsc::channel(8);
    let machine = StateMachine::new(gw, arb_rx, task_rx, announce_tx);
    Harness { machine, arb_tx, task_tx, announce_rx, transport }
}

#[tokio::test]
async fn boots_asleep() {
    let h = harness();
    assert_eq!(h.machine.current(), Mode::Sleep);
    assert_eq!(h.machine.last_hardware_mode(), Mode::Sleep);
}

#[tokio::test]
async fn arbitrator_event_transitions_and_announces() {
    let mut h = harness();

    h.arb_tx.try_send(Mode::Active).unwrap();
    h.machine.tick();

    assert_eq!(h.machine.current(), Mode::Active);
    assert_eq!(h.announce_rx.try_recv(), Ok(Mode::Active), "orchestrator must hear transitions");
    assert_eq!(
        h.transport.messages_on("fsm/state"),
        vec!["Active".to_string()],
        "every transition is published"
    );
}

#[tokio::test]
async fn repeated_target_is_idempotent() {
    let mut h = harness();

    h.arb_tx.try_send(Mode::Active).unwrap();
    h.machine.tick();
    h.transport.clear();

    // Same target again: no transition, no publish, no announcement.
    h.arb_tx.try_send(Mode::Active).unwrap();
    h.machine.tick();

    assert_eq!(h.machine.current(), Mode::Active);
    assert_eq!(h.transport.count_on("fsm/state"), 0, "no-op transition must not republish");
    h.announce_rx.try_recv().ok(); // first announcement
    assert!(h.announce_rx.try_recv().is_err());
}

#[tokio::test]
async fn hardware_toggle_never_interrupts_a_task() {
    let mut h = harness();

    // Enter a task mode on behalf of the check-in branch.
    h.task_tx.try_send(TaskEvent::CheckIn).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Interacting);

    // The lid switch flips mid-conversation. The scenario must survive.
    h.arb_tx.try_send(Mode::Sleep).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Interacting, "switch toggle must not end the task");
    assert_eq!(h.machine.last_hardware_mode(), Mode::Sleep, "bookkeeping still tracks hardware");

    h.arb_tx.try_send(Mode::Active).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Interacting);
    assert_eq!(h.machine.last_hardware_mode(), Mode::Active);
}

#[tokio::test]
async fn error_preempts_a_task() {
    let mut h = harness();

    h.task_tx.try_send(TaskEvent::Configuring).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Configuring);

    // Error is not a hardware mode: it always applies.
    h.arb_tx.try_send(Mode::Error).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Error, "error must preempt any mode");
}

#[tokio::test]
async fn recovers_from_error_when_signal_clears() {
    let mut h = harness();

    h.arb_tx.try_send(Mode::Error).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Error);

    // Arbitrator re-evaluates once the signal clears and emits the edge.
    h.arb_tx.try_send(Mode::Active).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Active, "cleared error must release the machine");
}

#[tokio::test]
async fn one_event_per_queue_per_tick() {
    let mut h = harness();

    h.arb_tx.try_send(Mode::Active).unwrap();
    h.arb_tx.try_send(Mode::Error).unwrap();
    h.machine.tick();
    // Only the first queued event fired this tick.
    assert_eq!(h.machine.current(), Mode::Active);

    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Error, "second event lands on the next tick");
}

#[tokio::test]
async fn task_events_map_to_their_modes() {
    let mut h = harness();

    h.task_tx.try_send(TaskEvent::Reminder).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Active);

    h.task_tx.try_send(TaskEvent::CheckIn).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Interacting);

    h.task_tx.try_send(TaskEvent::Configuring).unwrap();
    h.machine.tick();
    assert_eq!(h.machine.current(), Mode::Configuring);
}
