//! # Dependency Manager
//!
//! Owns the components added to it and the service trackers they need.
//!
//! ## Execution model
//!
//! - One **router task per tracked service type** reads the registry
//!   subscription and forwards every event, in registry order, to each
//!   interested component in the order the components were added.
//! - One **worker thread per component** handles its queue one message at a
//!   time: bookkeeping, callbacks, lifecycle transitions, and publishing of
//!   the component's own service.
//!
//! Components therefore never run concurrently with themselves, while
//! different components progress independently. Callbacks run on the
//! component's own thread, so a callback that blocks stalls that component
//! only. [`DependencyManager::settle`] waits until every router and worker
//! queue has drained.
mod tracker;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::component::handle::ComponentShared;
use crate::component::worker::{ComponentMessage, ComponentWorker};
use crate::component::{
    Component, ComponentError, ComponentFailure, ComponentHandle, ComponentId, ComponentState,
};
use crate::config::ManagerConfig;
use crate::dependency::Dependency;
use crate::kernel::KernelComponent;
use crate::kernel::constants::{APP_NAME, APP_VERSION};
use crate::kernel::error::{Error, ManagerPhase, Result};
use crate::registry::{ServiceReference, SharedServiceRegistry};
use tracker::{RouterCommand, ServiceTracker, flush_router};

/// A component added to the manager (internal)
struct ManagedComponent {
    handle: ComponentHandle,
    service_types: Vec<String>,
    sender: mpsc::UnboundedSender<ComponentMessage>,
    thread: thread::JoinHandle<()>,
}

#[derive(Default)]
struct ManagerState {
    trackers: BTreeMap<String, ServiceTracker>,
    // Add order
    components: Vec<ManagedComponent>,
}

impl ManagerState {
    /// Take out the trackers among `service_types` no remaining component depends on
    fn release_unused_trackers(&mut self, service_types: &[String]) -> Vec<ServiceTracker> {
        let mut unused = Vec::new();
        for service_type in service_types {
            let in_use = self
                .components
                .iter()
                .any(|managed| managed.service_types.contains(service_type));
            if !in_use {
                if let Some(tracker) = self.trackers.remove(service_type) {
                    unused.push(tracker);
                }
            }
        }
        unused
    }
}

/// Runtime that drives components against a [`ServiceRegistry`](crate::registry::ServiceRegistry).
///
/// Must be used from within a tokio runtime.
pub struct DependencyManager {
    config: ManagerConfig,
    registry: SharedServiceRegistry,
    state: Mutex<ManagerState>,
    // Messages handled by routers and workers; unchanged across a drain round means quiescent
    processed: Arc<AtomicU64>,
    failures: Arc<StdMutex<Vec<ComponentFailure>>>,
    next_component_id: AtomicU64,
    shut_down: AtomicBool,
}

impl DependencyManager {
    /// Create a manager with the default configuration
    pub fn new(registry: SharedServiceRegistry) -> Self {
        Self::with_config(registry, ManagerConfig::default())
    }

    pub fn with_config(registry: SharedServiceRegistry, config: ManagerConfig) -> Self {
        log::debug!(
            "Creating dependency manager '{}' ({} {})",
            config.name,
            APP_NAME,
            APP_VERSION
        );
        Self {
            config,
            registry,
            state: Mutex::new(ManagerState::default()),
            processed: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(StdMutex::new(Vec::new())),
            next_component_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedServiceRegistry {
        &self.registry
    }

    /// Fresh, unconfigured component definition
    pub fn create_component(&self) -> Component {
        Component::new()
    }

    /// Fresh, unconfigured dependency declaration
    pub fn create_service_dependency(&self) -> Dependency {
        Dependency::new()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ComponentError::ManagerShutDown {
                manager: self.config.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Take ownership of `component` and start tracking its dependencies.
    ///
    /// The component is instantiated and bound to the services already
    /// published; if every required dependency is satisfied it is started
    /// and its service published. Returns without waiting for that to
    /// happen; use [`settle`](Self::settle) or
    /// [`ComponentHandle::wait_for_state`] to observe it.
    pub async fn add(&self, component: Component) -> Result<ComponentHandle> {
        self.ensure_running()?;
        component.validate()?;

        let id = ComponentId::new(self.next_component_id.fetch_add(1, Ordering::SeqCst));
        let service_types = component.service_types();
        let shared = Arc::new(ComponentShared::new(
            Arc::clone(&self.failures),
            self.config.record_failures,
        ));
        let handle = ComponentHandle::new(id, component.name(), Arc::clone(&shared));

        let (sender, inbox) = mpsc::unbounded_channel();
        let worker = ComponentWorker::new(
            id,
            component,
            Arc::clone(&self.registry),
            shared,
            Arc::clone(&self.processed),
        );
        // Nothing routes to the worker until it is registered below
        let thread = worker.spawn(inbox).map_err(|e| {
            Error::lifecycle(
                ManagerPhase::Add,
                format!("cannot start worker for '{}': {}", handle.name(), e),
            )
        })?;

        let mut state = self.state.lock().await;
        for service_type in &service_types {
            if !state.trackers.contains_key(service_type) {
                let tracker =
                    ServiceTracker::spawn(&self.registry, service_type, Arc::clone(&self.processed));
                // Let the replay of existing services land before the snapshot
                tracker.flush().await;
                state.trackers.insert(service_type.clone(), tracker);
            }
        }

        // Hold every involved tracker so no event falls between snapshot and registration
        let tracker_states: Vec<_> = service_types
            .iter()
            .filter_map(|service_type| state.trackers.get(service_type).map(ServiceTracker::state))
            .collect();
        let mut guards = Vec::with_capacity(tracker_states.len());
        for tracker_state in &tracker_states {
            guards.push(tracker_state.lock().await);
        }

        let initial: Vec<ServiceReference> = guards.iter().flat_map(|guard| guard.snapshot()).collect();
        if sender.send(ComponentMessage::Init { initial }).is_err() {
            return Err(ComponentError::WorkerGone {
                component: handle.name().to_string(),
            }
            .into());
        }
        for guard in guards.iter_mut() {
            guard.register(id, sender.clone());
        }
        drop(guards);

        state.components.push(ManagedComponent {
            handle: handle.clone(),
            service_types,
            sender,
            thread,
        });
        log::info!(
            "Manager '{}' added component '{}' ({})",
            self.config.name,
            handle.name(),
            id
        );
        Ok(handle)
    }

    /// Stop tracking and tear the component down.
    ///
    /// Returns once `stop`, every unbind callback and the withdrawal of the
    /// component's service have completed.
    pub async fn remove(&self, handle: &ComponentHandle) -> Result<()> {
        self.remove_by_id(handle.id()).await
    }

    pub async fn remove_by_id(&self, id: ComponentId) -> Result<()> {
        self.ensure_running()?;
        let (managed, unused) = {
            let mut state = self.state.lock().await;
            let position = state
                .components
                .iter()
                .position(|managed| managed.handle.id() == id)
                .ok_or(ComponentError::NotFound { id })?;
            let managed = state.components.remove(position);
            for service_type in &managed.service_types {
                if let Some(tracker) = state.trackers.get(service_type) {
                    tracker.unregister(id).await;
                }
            }
            let unused = state.release_unused_trackers(&managed.service_types);
            (managed, unused)
        };
        let result = self.stop_component(managed, ManagerPhase::Remove).await;
        for tracker in unused {
            tracker.close().await;
        }
        result
    }

    async fn stop_component(&self, managed: ManagedComponent, phase: ManagerPhase) -> Result<()> {
        let ManagedComponent {
            handle,
            sender,
            thread,
            ..
        } = managed;
        let (ack, done) = oneshot::channel();
        if sender.send(ComponentMessage::Shutdown(ack)).is_err() || done.await.is_err() {
            return Err(ComponentError::WorkerGone {
                component: handle.name().to_string(),
            }
            .into());
        }
        drop(sender);
        // The worker exits right after acknowledging
        let joined = tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|_| "worker thread panicked".to_string()));
        if let Err(message) = joined {
            return Err(Error::lifecycle(
                phase,
                format!("worker of '{}' failed: {}", handle.name(), message),
            ));
        }
        log::info!(
            "Manager '{}' removed component '{}' ({})",
            self.config.name,
            handle.name(),
            handle.id()
        );
        Ok(())
    }

    /// Wait until every queued registry event and component message is handled.
    ///
    /// Gives up with a [`ManagerPhase::Settle`] error after the configured
    /// number of rounds if the system keeps producing work.
    pub async fn settle(&self) -> Result<()> {
        for _ in 0..self.config.settle_rounds.max(1) {
            let before = self.processed.load(Ordering::SeqCst);
            let (routers, workers): (Vec<mpsc::UnboundedSender<RouterCommand>>, Vec<_>) = {
                let state = self.state.lock().await;
                (
                    state.trackers.values().map(ServiceTracker::control).collect(),
                    state
                        .components
                        .iter()
                        .map(|managed| managed.sender.clone())
                        .collect(),
                )
            };
            for control in &routers {
                flush_router(control).await;
            }
            for sender in &workers {
                flush_component(sender).await;
            }
            if self.processed.load(Ordering::SeqCst) == before {
                return Ok(());
            }
        }
        Err(Error::lifecycle(
            ManagerPhase::Settle,
            format!(
                "still busy after {} drain rounds",
                self.config.settle_rounds.max(1)
            ),
        ))
    }

    /// Remove every component, most recently added first, and stop tracking.
    ///
    /// Idempotent; the manager rejects `add`/`remove` afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (components, trackers) = {
            let mut state = self.state.lock().await;
            (
                std::mem::take(&mut state.components),
                std::mem::take(&mut state.trackers),
            )
        };
        log::info!(
            "Shutting down manager '{}' ({} components)",
            self.config.name,
            components.len()
        );

        let mut first_error = None;
        for managed in components.into_iter().rev() {
            for service_type in &managed.service_types {
                if let Some(tracker) = trackers.get(service_type) {
                    tracker.unregister(managed.handle.id()).await;
                }
            }
            if let Err(e) = self.stop_component(managed, ManagerPhase::Shutdown).await {
                log::error!("Error while shutting down manager '{}': {}", self.config.name, e);
                first_error.get_or_insert(e);
            }
        }
        for tracker in trackers.into_values() {
            tracker.close().await;
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Handles of all managed components, in add order
    pub async fn components(&self) -> Vec<ComponentHandle> {
        let state = self.state.lock().await;
        state
            .components
            .iter()
            .map(|managed| managed.handle.clone())
            .collect()
    }

    pub async fn component(&self, id: ComponentId) -> Option<ComponentHandle> {
        let state = self.state.lock().await;
        state
            .components
            .iter()
            .find(|managed| managed.handle.id() == id)
            .map(|managed| managed.handle.clone())
    }

    pub async fn component_state(&self, id: ComponentId) -> Option<ComponentState> {
        self.component(id).await.map(|handle| handle.state())
    }

    /// Services currently published under `service_type`
    pub fn find(&self, service_type: &str) -> Result<Vec<ServiceReference>> {
        Ok(self.registry.find(service_type)?)
    }

    /// Failures recorded across all components, oldest first
    pub fn failures(&self) -> Vec<ComponentFailure> {
        self.failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default()
    }

    /// Service types with a live tracker
    pub async fn tracked_service_types(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .trackers
            .values()
            .map(|tracker| tracker.service_type().to_string())
            .collect()
    }
}

async fn flush_component(sender: &mpsc::UnboundedSender<ComponentMessage>) -> bool {
    let (ack, done) = oneshot::channel();
    if sender.send(ComponentMessage::Flush(ack)).is_err() {
        return false;
    }
    done.await.is_ok()
}

impl fmt::Debug for DependencyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyManager")
            .field("name", &self.config.name)
            .field("registry", &self.registry)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for DependencyManager {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn initialize(&self) -> Result<()> {
        log::info!("Initializing dependency manager '{}'", self.config.name);
        self.ensure_running()
    }

    async fn start(&self) -> Result<()> {
        self.ensure_running()?;
        self.settle().await
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown().await
    }
}
