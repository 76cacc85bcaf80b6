use std::env;
use std::time::Duration;

use chrono::Weekday;

use crate::retry::RetryPolicy;
use crate::tick::TICK_MS;

/// Runtime knobs for the core. Defaults match the deployed cadence; each can
/// be overridden through the environment the supervisor hands us.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Cadence of all three control loops.
    pub tick_interval: Duration,
    /// Name spliced into the reminder message templates.
    pub participant_name: String,
    /// Selects the onboarding dialogue graph instead of the weekday one.
    pub first_day: bool,
    /// Replays a fixed weekday's graph instead of reading the clock.
    pub day_override: Option<Weekday>,
    /// Readiness barrier: every leaf service must report ready.
    pub readiness: RetryPolicy,
    /// Startup barrier: every tracked service must report awake. More
    /// generous than readiness; services may still be booting.
    pub startup: RetryPolicy,
    /// Pause between serialized leaf start commands.
    pub start_spacing: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(TICK_MS),
            participant_name: "friend".to_string(),
            first_day: false,
            day_override: None,
            readiness: RetryPolicy::new(150, Duration::from_millis(200), Duration::from_secs(30)),
            startup: RetryPolicy::new(600, Duration::from_millis(500), Duration::from_secs(300)),
            start_spacing: Duration::from_millis(400),
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var("PARTICIPANT_NAME") {
            if !name.is_empty() {
                config.participant_name = name;
            }
        }
        if let Ok(flag) = env::var("FIRST_DAY_OF_STUDY") {
            config.first_day = matches!(flag.as_str(), "1" | "true");
        }
        if let Ok(ms) = env::var("TICK_INTERVAL_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                config.tick_interval = Duration::from_millis(ms);
            }
        }
        config
    }
}
