#![cfg(test)]

use std::sync::{Arc, Mutex};

use crate::component::Component;
use crate::dependency::Dependency;
use crate::registry::{
    InMemoryServiceRegistry, Properties, ServiceHandle, ServiceRegistry, SharedServiceRegistry,
};

// ===== MOCK COMPONENTS AND SERVICES =====

/// Component implementation that records every callback it receives
#[derive(Debug)]
pub struct Probe {
    name: String,
    events: Mutex<Vec<String>>,
    bound_properties: Mutex<Vec<Properties>>,
    // Shared across probes when the relative order of components matters
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl Probe {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
            bound_properties: Mutex::new(Vec::new()),
            journal: None,
        })
    }

    pub fn with_journal(name: &str, journal: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
            bound_properties: Mutex::new(Vec::new()),
            journal: Some(journal),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record(&self, event: impl Into<String>) {
        let event = event.into();
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("{}:{}", self.name, event));
        }
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events equal to `event`
    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    pub fn record_properties(&self, properties: &Properties) {
        self.bound_properties.lock().unwrap().push(properties.clone());
    }

    pub fn bound_properties(&self) -> Vec<Properties> {
        self.bound_properties.lock().unwrap().clone()
    }
}

/// Plain service object published directly by tests
#[derive(Debug)]
pub struct TestService {
    pub name: String,
}

pub fn new_registry() -> (Arc<InMemoryServiceRegistry>, SharedServiceRegistry) {
    let registry = Arc::new(InMemoryServiceRegistry::new());
    let shared: SharedServiceRegistry = registry.clone();
    (registry, shared)
}

pub fn publish(
    registry: &InMemoryServiceRegistry,
    service_type: &str,
    name: &str,
    properties: Properties,
) -> ServiceHandle {
    registry
        .publish(
            service_type,
            Arc::new(TestService {
                name: name.to_string(),
            }),
            properties,
            None,
        )
        .expect("publish should succeed")
}

/// Dependency on `TestService`s recording "bind:<name>", "unbind:<name>" and "change:<name>"
pub fn recording_dependency(service_type: &str, required: bool) -> Dependency {
    Dependency::new()
        .set_service(service_type)
        .set_required(required)
        .set_bind(|probe: &Probe, service: &TestService| {
            probe.record(format!("bind:{}", service.name));
            Ok(())
        })
        .set_unbind(|probe: &Probe, service: &TestService| {
            probe.record(format!("unbind:{}", service.name));
            Ok(())
        })
        .set_change(|probe: &Probe, service: &TestService| {
            probe.record(format!("change:{}", service.name));
            Ok(())
        })
}

/// Component backed by `probe`, recording "start" and "stop"
pub fn probe_component(probe: &Arc<Probe>) -> Component {
    Component::new()
        .set_name(probe.name().to_string())
        .set_shared_implementation(Arc::clone(probe))
        .on_start(|probe: &Probe| {
            probe.record("start");
            Ok(())
        })
        .on_stop(|probe: &Probe| {
            probe.record("stop");
            Ok(())
        })
}
