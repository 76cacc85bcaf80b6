#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use keel::gateway::messages::ServiceName;
use keel::gateway::{Gateway, Transport, TransportError};

/// Records every publish so tests can assert on outbound traffic.
pub struct RecordingTransport {
    pub published: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { published: Mutex::new(Vec::new()) })
    }

    pub fn messages_on(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn count_on(&self, topic: &str) -> usize {
        self.published.lock().unwrap().iter().filter(|(t, _)| t == topic).count()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

impl Transport for RecordingTransport {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        self.published.lock().unwrap().push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

pub fn gateway() -> (Arc<RecordingTransport>, Arc<Gateway>) {
    let transport = RecordingTransport::new();
    let gateway = Arc::new(Gateway::new(transport.clone()));
    (transport, gateway)
}

/// Feeds a `<service>_status` message through the gateway as if the service
/// had published it.
pub fn report_status(gateway: &Gateway, service: ServiceName, status: &str) {
    let topic = format!("{}_status", service.wire());
    let payload = format!(r#"{{"service_name":"{}","status":"{}"}}"#, service.wire(), status);
    gateway.ingest(&topic, &payload);
}

pub fn report_all_awake(gateway: &Gateway) {
    for service in ServiceName::TRACKED {
        report_status(gateway, service, "Awake");
    }
}

/// Acknowledges a remote action by name, the way the robot controller does.
pub fn acknowledge(gateway: &Gateway, behaviour: &str) {
    let payload = format!(r#"{{"behaviour_name":"{}","status":"complete"}}"#, behaviour);
    gateway.ingest("robot_control_status", &payload);
}

/// Injects a transcribed user response.
pub fn user_says(gateway: &Gateway, content: &str) {
    let payload = format!(r#"{{"content":"{}"}}"#, content);
    gateway.ingest("conversation/history", &payload);
}
