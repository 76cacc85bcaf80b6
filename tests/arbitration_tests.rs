mod common;

use tokio::sync::mpsc;

use keel::fsm::Mode;
use keel::reactive::ReactiveArbitrator;

use common::gateway;

#[tokio::test]
async fn error_outranks_everything() {
    let (_transport, gw) = gateway();
    let (tx, mut rx) = mpsc::channel(8);
    let mut arbitrator = ReactiveArbitrator::new(gw.clone(), tx);

    // All three signals asserted at once. Error must win.
    gw.ingest("robot/switch_state", "1");
    gw.ingest("robot/reminder", "1");
    gw.ingest("robot/error", "1");
    arbitrator.detect_critical_condition();

    assert_eq!(rx.try_recv(), Ok(Mode::Error), "error signal must outrank wake signals");
}

#[tokio::test]
async fn switch_or_reminder_wakes_the_device() {
    let (_transport, gw) = gateway();
    let (tx, mut rx) = mpsc::channel(8);
    let mut arbitrator = ReactiveArbitrator::new(gw.clone(), tx);

    // Switch alone.
    gw.ingest("robot/switch_state", "1");
    arbitrator.detect_critical_condition();
    assert_eq!(rx.try_recv(), Ok(Mode::Active), "switch on should wake");

    // Switch off, reminder pending: still awake.
    gw.ingest("robot/switch_state", "0");
    gw.ingest("robot/reminder", "1");
    arbitrator.detect_critical_condition();
    assert!(rx.try_recv().is_err(), "target unchanged, no event expected");
    assert_eq!(arbitrator.last_emitted(), Some(Mode::Active));

    // Both clear: back to sleep.
    gw.ingest("robot/reminder", "0");
    arbitrator.detect_critical_condition();
    assert_eq!(rx.try_recv(), Ok(Mode::Sleep), "all signals clear should sleep");
}

#[tokio::test]
async fn absent_signals_read_as_sleep() {
    let (_transport, gw) = gateway();
    let (tx, mut rx) = mpsc::channel(8);
    let mut arbitrator = ReactiveArbitrator::new(gw, tx);

    // Nothing ever arrived on the signal topics.
    arbitrator.detect_critical_condition();
    assert_eq!(rx.try_recv(), Ok(Mode::Sleep), "no signals should default to sleep");
}

#[tokio::test]
async fn steady_signal_emits_exactly_one_event() {
    let (_transport, gw) = gateway();
    let (tx, mut rx) = mpsc::channel(8);
    let mut arbitrator = ReactiveArbitrator::new(gw.clone(), tx);

    gw.ingest("robot/switch_state", "1");
    for _ in 0..50 {
        arbitrator.detect_critical_condition();
    }

    assert_eq!(rx.try_recv(), Ok(Mode::Active));
    assert!(rx.try_recv().is_err(), "steady input must not flood the queue");
}

#[tokio::test]
async fn full_queue_retries_the_edge_next_tick() {
    let (_transport, gw) = gateway();
    let (tx, mut rx) = mpsc::channel(1);
    let mut arbitrator = ReactiveArbitrator::new(gw.clone(), tx);

    // First tick fills the single-slot queue with Sleep.
    arbitrator.detect_critical_condition();
    assert_eq!(arbitrator.last_emitted(), Some(Mode::Sleep));

    // Switch flips while the consumer is stalled: the send fails and the
    // edge must not be recorded as delivered.
    gw.ingest("robot/switch_state", "1");
    arbitrator.detect_critical_condition();
    assert_eq!(arbitrator.last_emitted(), Some(Mode::Sleep), "failed send must not latch");

    // Consumer drains; the next tick delivers the retried edge.
    assert_eq!(rx.try_recv(), Ok(Mode::Sleep));
    arbitrator.detect_critical_condition();
    assert_eq!(rx.try_recv(), Ok(Mode::Active), "edge should be retried after a full queue");
}
