use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tokio::sync::{mpsc, oneshot};

use crate::component::callbacks::{self, Instance, LifecycleFn};
use crate::component::definition::{Component, Implementation, ProvidedInterface};
use crate::component::handle::ComponentShared;
use crate::component::state::{ComponentFailure, ComponentId, ComponentState, FailurePhase};
use crate::dependency::Dependency;
use crate::kernel::constants::APP_NAME;
use crate::propagation::PropertyPropagator;
use crate::registry::{
    Properties, RegistryError, ServiceEvent, ServiceEventKind, ServiceHandle, ServiceId,
    ServiceReference, SharedServiceRegistry,
};

/// Messages queued to a component worker
pub(crate) enum ComponentMessage {
    /// Construct the instance and bind the services already known
    Init { initial: Vec<ServiceReference> },
    /// A registry event for one of the component's service types
    Event(ServiceEvent),
    /// Acknowledge once everything queued before this message is processed
    Flush(oneshot::Sender<()>),
    /// Tear down and exit
    Shutdown(oneshot::Sender<()>),
}

/// Bookkeeping for one declared dependency
struct TrackedDependency {
    dependency: Dependency,
    // Matching services in discovery order; the first one is promoted on loss
    tracked: Vec<ServiceReference>,
    bound: Option<ServiceId>,
}

impl TrackedDependency {
    fn new(dependency: Dependency) -> Self {
        Self {
            dependency,
            tracked: Vec::new(),
            bound: None,
        }
    }

    fn position(&self, id: ServiceId) -> Option<usize> {
        self.tracked.iter().position(|reference| reference.id() == id)
    }

    fn bound_reference(&self) -> Option<&ServiceReference> {
        let id = self.bound?;
        self.tracked.iter().find(|reference| reference.id() == id)
    }

    fn is_satisfied(&self) -> bool {
        !self.dependency.is_required() || self.bound.is_some()
    }

    fn service_type(&self) -> Option<String> {
        self.dependency.service_type().map(str::to_string)
    }
}

/// Callbacks owed after the bookkeeping for one message was updated
#[derive(Default)]
struct Transition {
    unbind: Vec<(usize, ServiceReference)>,
    bind: Vec<usize>,
    changed: Vec<usize>,
}

/// Per-component state machine, driven by one task.
///
/// Every message is handled to completion before the next one is taken off
/// the queue, so transitions and callbacks of one component never interleave.
pub(crate) struct ComponentWorker {
    id: ComponentId,
    name: String,
    implementation: Option<Implementation>,
    instance: Option<Instance>,
    interface: Option<ProvidedInterface>,
    dependencies: Vec<TrackedDependency>,
    start: Option<LifecycleFn>,
    stop: Option<LifecycleFn>,
    state: ComponentState,
    registration: Option<ServiceHandle>,
    published: Option<Properties>,
    // Propagate failures already reported, as (service type, message)
    propagate_failures: BTreeSet<(String, String)>,
    registry: SharedServiceRegistry,
    shared: Arc<ComponentShared>,
    processed: Arc<AtomicU64>,
}

impl ComponentWorker {
    pub(crate) fn new(
        id: ComponentId,
        component: Component,
        registry: SharedServiceRegistry,
        shared: Arc<ComponentShared>,
        processed: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id,
            name: component.name,
            implementation: component.implementation,
            instance: None,
            interface: component.interface,
            dependencies: component
                .dependencies
                .into_iter()
                .map(TrackedDependency::new)
                .collect(),
            start: component.start,
            stop: component.stop,
            state: ComponentState::Inactive,
            registration: None,
            published: None,
            propagate_failures: BTreeSet::new(),
            registry,
            shared,
            processed,
        }
    }

    /// Run the worker on its own named thread.
    ///
    /// Callbacks are plain blocking calls; a slow one only holds up this
    /// component, never the runtime driving routers and other components.
    pub(crate) fn spawn(
        self,
        inbox: mpsc::UnboundedReceiver<ComponentMessage>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("{}-{}", APP_NAME, self.id))
            .spawn(move || self.run(inbox))
    }

    /// Consume the inbox until shutdown or until every sender is gone
    fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ComponentMessage>) {
        while let Some(message) = inbox.blocking_recv() {
            match message {
                ComponentMessage::Init { initial } => self.instantiate(initial),
                ComponentMessage::Event(event) => self.handle_event(event),
                ComponentMessage::Flush(ack) => {
                    let _ = ack.send(());
                    continue;
                }
                ComponentMessage::Shutdown(ack) => {
                    self.teardown();
                    self.processed.fetch_add(1, Ordering::SeqCst);
                    let _ = ack.send(());
                    return;
                }
            }
            self.processed.fetch_add(1, Ordering::SeqCst);
        }
        // Manager dropped without removing us
        self.teardown();
    }

    fn instantiate(&mut self, initial: Vec<ServiceReference>) {
        let Some(implementation) = self.implementation.take() else {
            log::warn!("Component '{}' ({}) instantiated twice, ignoring", self.name, self.id);
            return;
        };
        self.instance = Some(implementation.instantiate());
        self.set_state(ComponentState::Instantiated);

        let mut transition = Transition::default();
        for reference in &initial {
            for index in 0..self.dependencies.len() {
                if self.dependencies[index].dependency.matches(reference) {
                    self.track_at(index, reference, &mut transition);
                }
            }
        }
        // The snapshot arrives grouped by service type; bind in declaration order
        transition.bind.sort_unstable();
        self.apply(transition);
    }

    fn handle_event(&mut self, event: ServiceEvent) {
        if self.instance.is_none() {
            log::warn!("Component '{}' received a service event before instantiation", self.name);
            return;
        }
        let ServiceEvent { kind, reference } = event;
        let id = reference.id();
        log::debug!("Component '{}' handling {} of {}", self.name, kind, reference.handle());

        let mut transition = Transition::default();
        for index in 0..self.dependencies.len() {
            let matches = self.dependencies[index].dependency.matches(&reference);
            let position = self.dependencies[index].position(id);
            match (kind, position, matches) {
                (ServiceEventKind::Added, None, true) => {
                    self.track_at(index, &reference, &mut transition)
                }
                (ServiceEventKind::Removed, Some(_), _) => {
                    self.untrack_at(index, id, &mut transition)
                }
                (ServiceEventKind::Modified, Some(pos), true) => {
                    let dependency = &mut self.dependencies[index];
                    dependency.tracked[pos] = reference.clone();
                    if dependency.bound == Some(id) {
                        transition.changed.push(index);
                    }
                }
                // The new properties no longer satisfy the filter
                (ServiceEventKind::Modified, Some(_), false) => {
                    self.untrack_at(index, id, &mut transition)
                }
                // The new properties satisfy the filter for the first time
                (ServiceEventKind::Modified, None, true) => {
                    self.track_at(index, &reference, &mut transition)
                }
                _ => {}
            }
        }
        self.apply(transition);
    }

    fn track_at(&mut self, index: usize, reference: &ServiceReference, transition: &mut Transition) {
        let dependency = &mut self.dependencies[index];
        if dependency.position(reference.id()).is_some() {
            return;
        }
        dependency.tracked.push(reference.clone());
        if dependency.bound.is_none() {
            dependency.bound = Some(reference.id());
            transition.bind.push(index);
        }
    }

    fn untrack_at(&mut self, index: usize, id: ServiceId, transition: &mut Transition) {
        let dependency = &mut self.dependencies[index];
        let Some(position) = dependency.position(id) else {
            return;
        };
        let removed = dependency.tracked.remove(position);
        if dependency.bound == Some(id) {
            // Oldest remaining alternate by discovery order
            dependency.bound = dependency.tracked.first().map(ServiceReference::id);
            transition.unbind.push((index, removed));
            if dependency.bound.is_some() {
                transition.bind.push(index);
            }
        }
    }

    /// Run the callbacks owed by a bookkeeping change, then settle the lifecycle
    fn apply(&mut self, transition: Transition) {
        if self.state == ComponentState::Active && !self.is_satisfied() {
            self.deactivate();
        }
        for (index, reference) in &transition.unbind {
            self.invoke_unbind(*index, reference);
        }
        for index in transition.bind {
            self.invoke_bind(index);
        }
        for index in transition.changed {
            self.invoke_change(index);
        }
        self.reconcile();
    }

    fn reconcile(&mut self) {
        if self.is_satisfied() {
            if self.state == ComponentState::Active {
                self.refresh_registration();
            } else {
                self.activate();
            }
        } else {
            let resting = self.resting_state();
            if self.state != resting {
                self.set_state(resting);
            }
        }
    }

    fn activate(&mut self) {
        self.invoke_lifecycle(FailurePhase::Start);
        self.set_state(ComponentState::Active);
        log::info!("Component '{}' ({}) is active", self.name, self.id);
        self.register();
    }

    fn deactivate(&mut self) {
        self.invoke_lifecycle(FailurePhase::Stop);
        let resting = self.resting_state();
        self.set_state(resting);
        log::info!("Component '{}' ({}) lost a required dependency, now {}", self.name, self.id, resting);
        self.unregister();
    }

    fn teardown(&mut self) {
        if self.instance.is_none() {
            self.set_state(ComponentState::Inactive);
            return;
        }
        if self.state == ComponentState::Active {
            self.invoke_lifecycle(FailurePhase::Stop);
            self.unregister();
        }
        for index in 0..self.dependencies.len() {
            let dependency = &mut self.dependencies[index];
            let bound = dependency.bound_reference().cloned();
            dependency.bound = None;
            dependency.tracked.clear();
            if let Some(reference) = bound {
                self.invoke_unbind(index, &reference);
            }
        }
        self.set_state(ComponentState::Inactive);
        log::info!("Component '{}' ({}) removed", self.name, self.id);
    }

    fn is_satisfied(&self) -> bool {
        self.dependencies.iter().all(TrackedDependency::is_satisfied)
    }

    fn resting_state(&self) -> ComponentState {
        if self.dependencies.iter().any(|d| d.bound.is_some()) {
            ComponentState::PartiallyBound
        } else {
            ComponentState::Instantiated
        }
    }

    fn set_state(&mut self, state: ComponentState) {
        log::debug!("Component '{}' state {} -> {}", self.name, self.state, state);
        self.state = state;
        self.shared.set_state(state);
    }

    /// Static properties merged with every bound propagating dependency.
    ///
    /// A propagate failure is reported once, and again only after it cleared.
    fn compute_properties(&mut self) -> Option<Properties> {
        let interface = self.interface.as_ref()?;
        let instance = self.instance.as_ref()?;
        let propagation = PropertyPropagator::compute_properties(
            &interface.properties,
            instance,
            self.dependencies
                .iter()
                .map(|d| (&d.dependency, d.bound_reference())),
        );
        let current: BTreeSet<(String, String)> = propagation
            .failures
            .into_iter()
            .map(|failure| (failure.service_type, failure.error.to_string()))
            .collect();
        for (service_type, message) in current.difference(&self.propagate_failures) {
            self.fail(FailurePhase::Propagate, Some(service_type.clone()), message.clone());
        }
        self.propagate_failures = current;
        Some(propagation.properties)
    }

    fn register(&mut self) {
        let (Some(interface), Some(instance)) = (self.interface.as_ref(), self.instance.as_ref()) else {
            return;
        };
        let service_type = interface.service_type.clone();
        let instance = Arc::clone(instance);
        let Some(properties) = self.compute_properties() else {
            return;
        };
        match self.registry.publish(&service_type, instance, properties.clone(), Some(self.id)) {
            Ok(handle) => {
                log::info!("Component '{}' published {} with {}", self.name, handle, properties);
                self.shared.set_registration(Some((handle.clone(), properties.clone())));
                self.registration = Some(handle);
                self.published = Some(properties);
            }
            Err(e) => self.fail(FailurePhase::Publish, Some(service_type), e.to_string()),
        }
    }

    fn refresh_registration(&mut self) {
        let Some(handle) = self.registration.clone() else {
            return;
        };
        let Some(properties) = self.compute_properties() else {
            return;
        };
        if self.published.as_ref() == Some(&properties) {
            return;
        }
        match self.registry.update_properties(&handle, properties.clone()) {
            Ok(()) => {
                log::info!("Component '{}' republished {} with {}", self.name, handle, properties);
                self.shared.set_registration(Some((handle, properties.clone())));
                self.published = Some(properties);
            }
            Err(e) => self.fail(
                FailurePhase::Republish,
                Some(handle.service_type().to_string()),
                e.to_string(),
            ),
        }
    }

    fn unregister(&mut self) {
        let Some(handle) = self.registration.take() else {
            return;
        };
        self.published = None;
        self.propagate_failures.clear();
        self.shared.set_registration(None);
        match self.registry.unpublish(&handle) {
            Ok(()) => log::info!("Component '{}' unpublished {}", self.name, handle),
            // The registry dropped every service when it went away
            Err(RegistryError::Unavailable) => {
                log::debug!("Registry unavailable while unpublishing {}", handle)
            }
            Err(e) => self.fail(
                FailurePhase::Unpublish,
                Some(handle.service_type().to_string()),
                e.to_string(),
            ),
        }
    }

    fn invoke_lifecycle(&self, phase: FailurePhase) {
        let slot = match phase {
            FailurePhase::Start => self.start.as_ref(),
            _ => self.stop.as_ref(),
        };
        let (Some(slot), Some(instance)) = (slot, self.instance.as_ref()) else {
            return;
        };
        if let Err(error) = callbacks::guarded(|| slot(instance)) {
            self.fail(phase, None, error.to_string());
        }
    }

    fn invoke_bind(&self, index: usize) {
        let dependency = &self.dependencies[index];
        let (Some(slot), Some(reference), Some(instance)) = (
            dependency.dependency.bind_slot(),
            dependency.bound_reference(),
            self.instance.as_ref(),
        ) else {
            return;
        };
        log::debug!("Component '{}' binding {}", self.name, reference.handle());
        if let Err(error) = callbacks::guarded(|| slot.invoke(instance, reference)) {
            self.fail(FailurePhase::Bind, dependency.service_type(), error.to_string());
        }
    }

    fn invoke_unbind(&self, index: usize, reference: &ServiceReference) {
        let dependency = &self.dependencies[index];
        let (Some(slot), Some(instance)) = (dependency.dependency.unbind_slot(), self.instance.as_ref()) else {
            return;
        };
        log::debug!("Component '{}' unbinding {}", self.name, reference.handle());
        if let Err(error) = callbacks::guarded(|| slot(instance, reference)) {
            self.fail(FailurePhase::Unbind, dependency.service_type(), error.to_string());
        }
    }

    fn invoke_change(&self, index: usize) {
        let dependency = &self.dependencies[index];
        let (Some(slot), Some(reference), Some(instance)) = (
            dependency.dependency.change_slot(),
            dependency.bound_reference(),
            self.instance.as_ref(),
        ) else {
            return;
        };
        if let Err(error) = callbacks::guarded(|| slot(instance, reference)) {
            self.fail(FailurePhase::Change, dependency.service_type(), error.to_string());
        }
    }

    fn fail(&self, phase: FailurePhase, service_type: Option<String>, message: String) {
        self.shared.record_failure(ComponentFailure {
            component: self.id,
            component_name: self.name.clone(),
            phase,
            service_type,
            message,
        });
    }
}
