pub mod config;
pub mod error;
pub mod fsm;
pub mod gateway;
pub mod orchestrator;
pub mod reactive;
pub mod retry;
pub mod scenario;
pub mod tick;

pub use config::CoreConfig;
pub use error::CoreError;
pub use fsm::StateMachine;
pub use orchestrator::Orchestrator;
pub use reactive::ReactiveArbitrator;
