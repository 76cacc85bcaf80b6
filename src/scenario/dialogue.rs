//! Per-day dialogue graphs for the check-in conversation.
//!
//! Eight graphs: one onboarding graph for a participant's first day, and one
//! per weekday. Each graph is a deterministic function
//! `next(current, response) -> Option<&DialogueNode>`; `None` terminates the
//! conversation. The graphs are fixed at compile time; the core does no
//! language understanding beyond yes-substring matching and digit extraction.

use chrono::Weekday;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    OpenEnded,
    ClosedEnded,
    Short,
}

impl ResponseFormat {
    /// Command string understood by the speech service.
    pub fn wire(self) -> &'static str {
        match self {
            ResponseFormat::OpenEnded => "open-ended",
            ResponseFormat::ClosedEnded => "closed-ended",
            ResponseFormat::Short => "short",
        }
    }
}

/// Where a node sends the conversation once a response is in.
#[derive(Debug, Clone, Copy)]
pub enum Routing {
    /// Open-ended: advance unconditionally; `None` terminates.
    Open(Option<NodeId>),
    /// Closed-ended: a "yes" substring picks the yes subgraph, anything else
    /// the no subgraph.
    Closed { yes: NodeId, no: NodeId },
    /// Numeric scale 1..=10, bucketed `<5`, `5..=7`, `>7`. An unparsable or
    /// out-of-range response self-loops on the same node.
    Scale { low: Option<NodeId>, mid: Option<NodeId>, high: Option<NodeId> },
}

#[derive(Debug, Clone, Copy)]
pub struct DialogueNode {
    pub id: NodeId,
    pub prompt: &'static str,
    pub format: ResponseFormat,
    /// Scale answers on sentiment-tied nodes drive an expressive animation.
    pub sentiment: bool,
    pub routing: Routing,
}

#[derive(Debug)]
pub struct DialogueGraph {
    pub name: &'static str,
    nodes: &'static [DialogueNode],
}

/// Spoken before re-issuing a scale prompt that got an invalid answer.
pub const VALIDATION_PROMPT: &str = "Please give me a number between 1 and 10.";

impl DialogueGraph {
    pub fn entry(&self) -> &'static DialogueNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &'static DialogueNode {
        &self.nodes[id.0]
    }

    /// The transition function. Returning the current node again signals a
    /// validation self-loop; the caller re-issues the prompt.
    pub fn next(&self, current: NodeId, response: &str) -> Option<&'static DialogueNode> {
        let node = self.node(current);
        match node.routing {
            Routing::Open(next) => next.map(|id| self.node(id)),
            Routing::Closed { yes, no } => {
                let id = if response.to_ascii_lowercase().contains("yes") { yes } else { no };
                Some(self.node(id))
            }
            Routing::Scale { low, mid, high } => match parse_rating(response) {
                None => Some(node),
                Some(r) if r < 5 => low.map(|id| self.node(id)),
                Some(r) if r <= 7 => mid.map(|id| self.node(id)),
                Some(_) => high.map(|id| self.node(id)),
            },
        }
    }
}

/// First integer found in the response, accepted only in 1..=10.
pub fn parse_rating(response: &str) -> Option<i32> {
    let digits: String = response
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let value: i32 = digits.parse().ok()?;
    (1..=10).contains(&value).then_some(value)
}

/// Selects the graph for today. The first-day flag overrides the weekday.
pub fn graph_for(first_day: bool, day: Weekday) -> &'static DialogueGraph {
    if first_day {
        return &FIRST_DAY;
    }
    match day {
        Weekday::Mon => &MONDAY,
        Weekday::Tue => &TUESDAY,
        Weekday::Wed => &WEDNESDAY,
        Weekday::Thu => &THURSDAY,
        Weekday::Fri => &FRIDAY,
        Weekday::Sat => &SATURDAY,
        Weekday::Sun => &SUNDAY,
    }
}

const PROGRESS_PROMPT: &str = "How would you rate your progress on a scale of 1 to 10?";
const OBSTACLES_PROMPT: &str = "What obstacles kept you from meeting your goals?";
const FEELING_PROMPT: &str = "And how are you feeling right now, on a scale of 1 to 10?";
const FEEL_BETTER_PROMPT: &str = "What would help you feel a little better today?";
const DECLINED_PROMPT: &str =
    "That's okay. Is there anything on your mind you'd like to share?";

/// Shared weekday shape. Node 0 is a closed-ended opener; declining routes to
/// a single low-pressure question. Accepting leads through the progress scale
/// into a day-flavoured reflection, then a closing sentiment scale.
const fn weekday_nodes(
    opener: &'static str,
    mid_reflection: &'static str,
    high_reflection: &'static str,
) -> [DialogueNode; 8] {
    [
        DialogueNode {
            id: NodeId(0),
            prompt: opener,
            format: ResponseFormat::ClosedEnded,
            sentiment: false,
            routing: Routing::Closed { yes: NodeId(1), no: NodeId(6) },
        },
        DialogueNode {
            id: NodeId(1),
            prompt: PROGRESS_PROMPT,
            format: ResponseFormat::Short,
            sentiment: true,
            routing: Routing::Scale {
                low: Some(NodeId(2)),
                mid: Some(NodeId(3)),
                high: Some(NodeId(4)),
            },
        },
        DialogueNode {
            id: NodeId(2),
            prompt: OBSTACLES_PROMPT,
            format: ResponseFormat::OpenEnded,
            sentiment: false,
            routing: Routing::Open(Some(NodeId(5))),
        },
        DialogueNode {
            id: NodeId(3),
            prompt: mid_reflection,
            format: ResponseFormat::OpenEnded,
            sentiment: false,
            routing: Routing::Open(Some(NodeId(5))),
        },
        DialogueNode {
            id: NodeId(4),
            prompt: high_reflection,
            format: ResponseFormat::OpenEnded,
            sentiment: false,
            routing: Routing::Open(Some(NodeId(5))),
        },
        DialogueNode {
            id: NodeId(5),
            prompt: FEELING_PROMPT,
            format: ResponseFormat::Short,
            sentiment: true,
            routing: Routing::Scale { low: Some(NodeId(7)), mid: None, high: None },
        },
        DialogueNode {
            id: NodeId(6),
            prompt: DECLINED_PROMPT,
            format: ResponseFormat::OpenEnded,
            sentiment: false,
            routing: Routing::Open(None),
        },
        DialogueNode {
            id: NodeId(7),
            prompt: FEEL_BETTER_PROMPT,
            format: ResponseFormat::OpenEnded,
            sentiment: false,
            routing: Routing::Open(None),
        },
    ]
}

static MONDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "It's Monday. Are you ready to plan your week?",
    "What specific goals do you have for this week?",
    "What strategies will you use to achieve these goals?",
);
static MONDAY: DialogueGraph = DialogueGraph { name: "monday", nodes: &MONDAY_NODES };

static TUESDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "Good day! Would you like to do your Tuesday check-in?",
    "What would you like to reflect on this week?",
    "What did you learn from your reflections?",
);
static TUESDAY: DialogueGraph = DialogueGraph { name: "tuesday", nodes: &TUESDAY_NODES };

static WEDNESDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "Hello! Shall we do your midweek check-in?",
    "What can you improve next week?",
    "What specific actions will you take to improve?",
);
static WEDNESDAY: DialogueGraph = DialogueGraph { name: "wednesday", nodes: &WEDNESDAY_NODES };

static THURSDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "Hi! Are you up for your Thursday check-in?",
    "What strategies worked well for you?",
    "How can you apply these strategies in the future?",
);
static THURSDAY: DialogueGraph = DialogueGraph { name: "thursday", nodes: &THURSDAY_NODES };

static FRIDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "Happy Friday! Ready for a quick check-in?",
    "What is your main goal for today?",
    "What strategies will you use to achieve this goal?",
);
static FRIDAY: DialogueGraph = DialogueGraph { name: "friday", nodes: &FRIDAY_NODES };

static SATURDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "Good day! Shall we look at how your week went?",
    "What have you done to stay on track with your behaviour change goals?",
    "What will you do differently next week?",
);
static SATURDAY: DialogueGraph = DialogueGraph { name: "saturday", nodes: &SATURDAY_NODES };

static SUNDAY_NODES: [DialogueNode; 8] = weekday_nodes(
    "Hello! Would you like to wrap up your week together?",
    "What strategies helped you this week?",
    "How can you build on these strategies for next week?",
);
static SUNDAY: DialogueGraph = DialogueGraph { name: "sunday", nodes: &SUNDAY_NODES };

// Onboarding graph: runs once, regardless of weekday.
static FIRST_DAY_NODES: [DialogueNode; 6] = [
    DialogueNode {
        id: NodeId(0),
        prompt: "Hello! I'm your check-in companion. Is this a good time to get started?",
        format: ResponseFormat::ClosedEnded,
        sentiment: false,
        routing: Routing::Closed { yes: NodeId(1), no: NodeId(5) },
    },
    DialogueNode {
        id: NodeId(1),
        prompt: "To begin, what name would you like me to call you?",
        format: ResponseFormat::OpenEnded,
        sentiment: false,
        routing: Routing::Open(Some(NodeId(2))),
    },
    DialogueNode {
        id: NodeId(2),
        prompt: "What behaviour change would you like to work on together?",
        format: ResponseFormat::OpenEnded,
        sentiment: false,
        routing: Routing::Open(Some(NodeId(3))),
    },
    DialogueNode {
        id: NodeId(3),
        prompt: "How confident are you about this change, on a scale of 1 to 10?",
        format: ResponseFormat::Short,
        sentiment: true,
        routing: Routing::Scale { low: Some(NodeId(4)), mid: None, high: None },
    },
    DialogueNode {
        id: NodeId(4),
        prompt: "What support would make this change easier for you?",
        format: ResponseFormat::OpenEnded,
        sentiment: false,
        routing: Routing::Open(None),
    },
    DialogueNode {
        id: NodeId(5),
        prompt: "No trouble at all. What brought you here today?",
        format: ResponseFormat::OpenEnded,
        sentiment: false,
        routing: Routing::Open(None),
    },
];
static FIRST_DAY: DialogueGraph = DialogueGraph { name: "first_day", nodes: &FIRST_DAY_NODES };
