use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keel::fsm::{Mode, StateMachine, TaskEvent};
use keel::gateway::{Gateway, Transport, TransportError};
use keel::orchestrator::Orchestrator;
use keel::reactive::ReactiveArbitrator;
use keel::CoreConfig;

/// Stand-in transport: logs outbound traffic. The broker bridge implements
/// [`Transport`] for the real wire and feeds inbound messages to
/// `Gateway::ingest`; swapping it in is the only integration point.
struct LogTransport;

impl Transport for LogTransport {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        info!("[OUT] {} <- {}", topic, payload);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    info!("keel booting");

    let config = CoreConfig::from_env();
    let gateway = Arc::new(Gateway::new(Arc::new(LogTransport)));

    // Cross-loop queues. Bounded: a stuck consumer drops events with a log
    // line instead of growing without limit.
    let (arb_tx, arb_rx) = mpsc::channel::<Mode>(32);
    let (task_tx, task_rx) = mpsc::channel::<TaskEvent>(32);
    let (announce_tx, announce_rx) = mpsc::channel::<Mode>(32);

    let arbitrator = ReactiveArbitrator::new(gateway.clone(), arb_tx);
    let state_machine = StateMachine::new(gateway.clone(), arb_rx, task_rx, announce_tx);
    let orchestrator = Orchestrator::new(gateway.clone(), announce_rx, task_tx, &config);

    tokio::spawn(arbitrator.run(config.tick_interval));
    tokio::spawn(state_machine.run(config.tick_interval));

    // The orchestrator holds everything until the fleet is awake; nothing
    // else is meaningful before then.
    orchestrator.wait_for_services().await?;
    info!("keel ready");
    orchestrator.run(config.tick_interval).await;
    Ok(())
}
