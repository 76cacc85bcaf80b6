//! Check-in: greet the participant, walk today's dialogue graph, say goodbye.
//!
//! The dialogue loop is the long pole: for every node it speaks the prompt,
//! waits for the "question spoken" acknowledgment, asks the speech service to
//! collect a response in the expected format, then waits for a non-empty
//! response. While waiting, silence longer than the backchannel window
//! triggers a single filler animation and resets the wait timer.

use chrono::{Datelike, Local, Weekday};
use tracing::info;

use crate::gateway::messages::{BranchName, RunStatus};
use crate::gateway::Gateway;
use crate::tick::{Tick, TICK_MS};

use super::dialogue::{graph_for, DialogueGraph, DialogueNode, VALIDATION_PROMPT};
use super::{await_completion, Scenario};

const GREETING: &str = "Hello! Welcome to your daily check-in.";
const FAREWELL: &str = "Thank you for checking in. Have a great day!";

/// 10 seconds of silence before a backchannel filler.
pub const BACKCHANNEL_TICKS: u64 = 10_000 / TICK_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialoguePhase {
    Speak,
    AwaitSpoken,
    Collect,
    AwaitResponse,
}

pub struct CheckInScenario {
    first_day: bool,
    day_override: Option<Weekday>,
    step: u8,
    complete: bool,
    waiting_for_response: bool,
    graph: Option<&'static DialogueGraph>,
    current: Option<&'static DialogueNode>,
    repeat_validation: bool,
    phase: DialoguePhase,
    wait_mark: Tick,
}

impl CheckInScenario {
    pub fn new(first_day: bool) -> Self {
        Self::with_day(first_day, None)
    }

    /// Pins the weekday instead of reading the clock. Used by tests and by
    /// operators replaying a specific day's graph.
    pub fn with_day(first_day: bool, day: Option<Weekday>) -> Self {
        Self {
            first_day,
            day_override: day,
            step: 0,
            complete: false,
            waiting_for_response: false,
            graph: None,
            current: None,
            repeat_validation: false,
            phase: DialoguePhase::Speak,
            wait_mark: Tick::new(),
        }
    }

    pub fn current_node(&self) -> Option<&'static DialogueNode> {
        self.current
    }

    fn maybe_backchannel(&mut self, gateway: &Gateway, tick: Tick) {
        if tick.since(self.wait_mark) >= BACKCHANNEL_TICKS {
            info!("no acknowledgment within the window, sending backchannel");
            gateway.publish_robot_behaviour_command("backchannel");
            self.wait_mark = tick;
        }
    }

    fn dialogue_tick(&mut self, gateway: &Gateway, tick: Tick) {
        let Some(node) = self.current else {
            self.step = 5;
            return;
        };

        match self.phase {
            DialoguePhase::Speak => {
                if self.repeat_validation {
                    gateway.publish_robot_speech(
                        "question",
                        &format!("{VALIDATION_PROMPT} {}", node.prompt),
                    );
                } else {
                    gateway.publish_robot_speech("question", node.prompt);
                }
                self.phase = DialoguePhase::AwaitSpoken;
                self.wait_mark = tick;
            }
            DialoguePhase::AwaitSpoken => {
                if gateway.bus.completion("question").is_some() {
                    gateway.bus.acknowledge_completion("question");
                    self.phase = DialoguePhase::Collect;
                } else {
                    self.maybe_backchannel(gateway, tick);
                }
            }
            DialoguePhase::Collect => {
                gateway.publish_collect_response(node.format);
                self.phase = DialoguePhase::AwaitResponse;
                self.wait_mark = tick;
            }
            DialoguePhase::AwaitResponse => match gateway.bus.take_user_response() {
                Some(response) => self.advance(gateway, node, &response),
                None => self.maybe_backchannel(gateway, tick),
            },
        }
    }

    fn advance(&mut self, gateway: &Gateway, node: &'static DialogueNode, response: &str) {
        if node.sentiment {
            if let Some(rating) = super::dialogue::parse_rating(response) {
                let animation = match rating {
                    r if r < 5 => "sad",
                    r if r <= 7 => "happy",
                    _ => "excited",
                };
                gateway.publish_robot_behaviour_command(animation);
            }
        }

        let graph = self.graph.expect("dialogue graph selected in step 3");
        match graph.next(node.id, response) {
            Some(next) => {
                self.repeat_validation = next.id == node.id;
                self.current = Some(next);
                self.phase = DialoguePhase::Speak;
            }
            None => {
                info!("dialogue graph '{}' terminated", graph.name);
                self.current = None;
                self.step = 5;
            }
        }
    }
}

impl Scenario for CheckInScenario {
    fn start(&mut self, tick: Tick) {
        self.step = 1;
        self.complete = false;
        self.waiting_for_response = false;
        self.graph = None;
        self.current = None;
        self.repeat_validation = false;
        self.phase = DialoguePhase::Speak;
        self.wait_mark = tick;
        info!("check-in scenario started");
    }

    fn update(&mut self, gateway: &Gateway, tick: Tick) {
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
            let done = await_completion(gateway, &mut self.waiting_for_response, "greeting", |g| {
                g.publish_robot_speech("greeting", GREETING)
            });
            if done {
                self.step = 3;
            }
        }

        if self.step == 3 {
            gateway.publish_robot_behaviour_command("look_up");
            let day = self.day_override.unwrap_or_else(|| Local::now().weekday());
            let graph = graph_for(self.first_day, day);
            info!("running '{}' dialogue graph", graph.name);
            self.graph = Some(graph);
            self.current = Some(graph.entry());
            self.phase = DialoguePhase::Speak;
            self.step = 4;
            return;
        }

        if self.step == 4 {
            self.dialogue_tick(gateway, tick);
            return;
        }

        if self.step == 5 {
            let done = await_completion(gateway, &mut self.waiting_for_response, "farewell", |g| {
                g.publish_robot_speech("farewell", FAREWELL)
            });
            if done {
                gateway.bus.set_run_status(BranchName::CheckIn, RunStatus::Standby);
                gateway.end_check_in();
                self.step = 6;
            }
            return;
        }

        if self.step == 6 {
            self.complete = true;
            self.step = 0;
            info!("check-in scenario complete");
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}
