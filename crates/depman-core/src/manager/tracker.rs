use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::component::ComponentId;
use crate::component::worker::ComponentMessage;
use crate::registry::{
    ServiceEvent, ServiceEventKind, ServiceReference, SharedServiceRegistry, Subscription,
};

/// A component queue registered with a tracker
struct Listener {
    component: ComponentId,
    sender: mpsc::UnboundedSender<ComponentMessage>,
}

/// Services known for one type, plus the components listening to it
#[derive(Default)]
pub(crate) struct TrackerState {
    // Discovery order
    known: Vec<ServiceReference>,
    // Add order; events fan out in this order
    listeners: Vec<Listener>,
}

impl TrackerState {
    pub(crate) fn snapshot(&self) -> Vec<ServiceReference> {
        self.known.clone()
    }

    pub(crate) fn register(
        &mut self,
        component: ComponentId,
        sender: mpsc::UnboundedSender<ComponentMessage>,
    ) {
        self.listeners.push(Listener { component, sender });
    }

    pub(crate) fn unregister(&mut self, component: ComponentId) {
        self.listeners.retain(|listener| listener.component != component);
    }

    fn record(&mut self, event: &ServiceEvent) {
        let id = event.reference.id();
        let position = self.known.iter().position(|r| r.id() == id);
        match (event.kind, position) {
            (ServiceEventKind::Added, None) => self.known.push(event.reference.clone()),
            (ServiceEventKind::Removed, Some(pos)) => {
                self.known.remove(pos);
            }
            (ServiceEventKind::Modified, Some(pos)) => self.known[pos] = event.reference.clone(),
            (ServiceEventKind::Modified, None) => self.known.push(event.reference.clone()),
            _ => {}
        }
    }

    /// Forward to every listener; listeners whose worker is gone are dropped
    fn dispatch(&mut self, event: ServiceEvent) {
        self.record(&event);
        self.listeners
            .retain(|listener| listener.sender.send(ComponentMessage::Event(event.clone())).is_ok());
    }
}

/// Commands accepted by a router task
pub(crate) enum RouterCommand {
    /// Acknowledge once every event already in the subscription is dispatched
    Flush(oneshot::Sender<()>),
}

/// Subscription to one service type, routed to the interested components.
///
/// One router task per service type reads the registry subscription and
/// fans every event out to the listeners in the order they were added.
pub(crate) struct ServiceTracker {
    service_type: String,
    state: Arc<Mutex<TrackerState>>,
    control: mpsc::UnboundedSender<RouterCommand>,
    task: JoinHandle<()>,
}

impl ServiceTracker {
    /// Subscribe to `service_type` and spawn the router task.
    ///
    /// A registry that refuses the subscription is treated as one that has
    /// no services of that type.
    pub(crate) fn spawn(
        registry: &SharedServiceRegistry,
        service_type: &str,
        processed: Arc<AtomicU64>,
    ) -> Self {
        let subscription = match registry.subscribe(service_type, None) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                log::warn!("Could not subscribe to service type '{}': {}", service_type, e);
                None
            }
        };
        let state = Arc::new(Mutex::new(TrackerState::default()));
        let (control, commands) = mpsc::unbounded_channel();
        let task = tokio::spawn(route(
            service_type.to_string(),
            subscription,
            Arc::clone(&state),
            commands,
            processed,
        ));
        log::debug!("Tracking service type '{}'", service_type);
        Self {
            service_type: service_type.to_string(),
            state,
            control,
            task,
        }
    }

    pub(crate) fn service_type(&self) -> &str {
        &self.service_type
    }

    pub(crate) fn state(&self) -> Arc<Mutex<TrackerState>> {
        Arc::clone(&self.state)
    }

    /// Sender used to flush the router without holding the tracker
    pub(crate) fn control(&self) -> mpsc::UnboundedSender<RouterCommand> {
        self.control.clone()
    }

    pub(crate) async fn flush(&self) -> bool {
        flush_router(&self.control).await
    }

    pub(crate) async fn unregister(&self, component: ComponentId) {
        self.state.lock().await.unregister(component);
    }

    /// Stop routing and wait for the router to drop its subscription
    pub(crate) async fn close(self) {
        self.task.abort();
        let _ = self.task.await;
        log::debug!("Stopped tracking service type '{}'", self.service_type);
    }
}

/// Wait until the router behind `control` has drained its subscription.
///
/// Returns `false` when the router is no longer running.
pub(crate) async fn flush_router(control: &mpsc::UnboundedSender<RouterCommand>) -> bool {
    let (ack, done) = oneshot::channel();
    if control.send(RouterCommand::Flush(ack)).is_err() {
        return false;
    }
    done.await.is_ok()
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<ServiceEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => None,
    }
}

async fn route(
    service_type: String,
    mut subscription: Option<Subscription>,
    state: Arc<Mutex<TrackerState>>,
    mut commands: mpsc::UnboundedReceiver<RouterCommand>,
    processed: Arc<AtomicU64>,
) {
    let mut open = subscription.is_some();
    loop {
        tokio::select! {
            // Drain events before answering a flush
            biased;

            event = next_event(&mut subscription), if open => {
                match event {
                    Some(event) => state.lock().await.dispatch(event),
                    None => {
                        // The registry went away; everything it held is gone
                        open = false;
                        let mut state = state.lock().await;
                        let known = state.snapshot();
                        log::warn!(
                            "Subscription for '{}' closed, withdrawing {} known services",
                            service_type,
                            known.len()
                        );
                        for reference in known {
                            state.dispatch(ServiceEvent::removed(reference));
                        }
                    }
                }
                processed.fetch_add(1, Ordering::SeqCst);
            }
            command = commands.recv() => match command {
                Some(RouterCommand::Flush(ack)) => {
                    let _ = ack.send(());
                }
                None => break,
            },
        }
    }
    log::debug!("Router for '{}' exiting", service_type);
}
