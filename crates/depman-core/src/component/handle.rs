use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::component::state::{ComponentFailure, ComponentId, ComponentState};
use crate::registry::{Properties, ServiceHandle};

/// State a component worker shares with its handles (internal)
pub(crate) struct ComponentShared {
    state: watch::Sender<ComponentState>,
    registration: Mutex<Option<(ServiceHandle, Properties)>>,
    failures: Mutex<Vec<ComponentFailure>>,
    // Manager-wide failure log, shared by every component of one manager
    manager_failures: Arc<Mutex<Vec<ComponentFailure>>>,
    record_failures: bool,
}

impl ComponentShared {
    pub(crate) fn new(
        manager_failures: Arc<Mutex<Vec<ComponentFailure>>>,
        record_failures: bool,
    ) -> Self {
        let (state, _) = watch::channel(ComponentState::Inactive);
        Self {
            state,
            registration: Mutex::new(None),
            failures: Mutex::new(Vec::new()),
            manager_failures,
            record_failures,
        }
    }

    pub(crate) fn set_state(&self, state: ComponentState) {
        self.state.send_replace(state);
    }

    pub(crate) fn state(&self) -> ComponentState {
        *self.state.borrow()
    }

    pub(crate) fn set_registration(&self, registration: Option<(ServiceHandle, Properties)>) {
        if let Ok(mut slot) = self.registration.lock() {
            *slot = registration;
        }
    }

    pub(crate) fn record_failure(&self, failure: ComponentFailure) {
        log::error!("{}", failure);
        if !self.record_failures {
            return;
        }
        if let Ok(mut manager_failures) = self.manager_failures.lock() {
            manager_failures.push(failure.clone());
        }
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(failure);
        }
    }
}

/// Owner-side view of an added component.
///
/// Cheap to clone; all clones observe the same component.
#[derive(Clone)]
pub struct ComponentHandle {
    id: ComponentId,
    name: Arc<str>,
    shared: Arc<ComponentShared>,
}

impl ComponentHandle {
    pub(crate) fn new(id: ComponentId, name: &str, shared: Arc<ComponentShared>) -> Self {
        Self {
            id,
            name: Arc::from(name),
            shared,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> ComponentState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ComponentState::Active
    }

    /// Receiver notified on every state change
    pub fn state_changes(&self) -> watch::Receiver<ComponentState> {
        self.shared.state.subscribe()
    }

    /// Wait until the component reaches `state`; `false` on timeout
    pub async fn wait_for_state(&self, state: ComponentState, timeout: Duration) -> bool {
        let mut changes = self.state_changes();
        match tokio::time::timeout(timeout, changes.wait_for(|current| *current == state)).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Handle of the component's own published service, if published
    pub fn registration(&self) -> Option<ServiceHandle> {
        self.shared
            .registration
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|(handle, _)| handle.clone()))
    }

    /// Properties the component's service is currently published with
    pub fn published_properties(&self) -> Option<Properties> {
        self.shared
            .registration
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|(_, properties)| properties.clone()))
    }

    /// Failures recorded for this component, oldest first
    pub fn failures(&self) -> Vec<ComponentFailure> {
        self.shared
            .failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
