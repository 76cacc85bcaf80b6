//! Reminder delivery: a fixed five-step script.
//!
//! 1. drive off the charger, wait for the acknowledgment;
//! 2. play the reminder animation;
//! 3. speak the reminder message, wait for the acknowledgment;
//! 4. send the robot home and put the branch on standby;
//! 5. mark complete and persist the spoken text.

use rand::Rng;
use tracing::info;

use crate::gateway::messages::{BranchName, RunStatus};
use crate::gateway::Gateway;
use crate::tick::Tick;

use super::{await_completion, Scenario};

const TEMPLATES: [&str; 4] = [
    "Hi {name}! This is your daily reminder to work on your goal.",
    "Hello {name}, just checking in: now is a good moment for your goal.",
    "{name}, a quick reminder about the goal you set for yourself.",
    "Hey {name}! Don't forget the plan you made. A small step now counts.",
];

pub struct ReminderScenario {
    participant: String,
    step: u8,
    complete: bool,
    waiting_for_response: bool,
    message: String,
}

impl ReminderScenario {
    pub fn new(participant: &str) -> Self {
        Self {
            participant: participant.to_string(),
            step: 0,
            complete: false,
            waiting_for_response: false,
            message: String::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn pick_message(&self) -> String {
        let template = TEMPLATES[rand::rng().random_range(0..TEMPLATES.len())];
        template.replace("{name}", &self.participant)
    }
}

impl Scenario for ReminderScenario {
    fn start(&mut self, _tick: Tick) {
        self.step = 1;
        self.complete = false;
        self.waiting_for_response = false;
        self.message = self.pick_message();
        info!("reminder scenario started");
    }

    fn update(&mut self, gateway: &Gateway, _tick: Tick) {
        if self.complete {
            return;
        }

        if self.step == 1 {
            let done =
                await_completion(gateway, &mut self.waiting_for_response, "drive off charger", |g| {
                    g.publish_robot_behaviour_command("drive off charger")
                });
            if done {
                self.step = 2;
            }
        }

        if self.step == 2 {
            gateway.publish_robot_behaviour_command("reminder");
            self.step = 3;
        }

        if self.step == 3 {
            let message = self.message.clone();
            let done = await_completion(gateway, &mut self.waiting_for_response, "greeting", |g| {
                g.publish_robot_speech("greeting", &message)
            });
            if done {
                self.step = 4;
            }
        }

        if self.step == 4 {
            gateway.publish_robot_behaviour_command("return_home");
            gateway.bus.set_run_status(BranchName::Reminder, RunStatus::Standby);
            self.step = 5;
            return;
        }

        if self.step == 5 {
            self.complete = true;
            self.step = 0;
            gateway.publish_reminder_sent(&self.message);
            info!("reminder scenario complete");
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}
