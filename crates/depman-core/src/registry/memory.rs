use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::component::ComponentId;
use crate::registry::{
    Properties, RegistryError, RegistryResult, ServiceEvent, ServiceFilter, ServiceHandle,
    ServiceId, ServiceObject, ServiceReference, ServiceRegistry, Subscription, SubscriptionId,
};

/// One live subscription (internal)
struct Subscriber {
    id: SubscriptionId,
    service_type: String,
    filter: Option<ServiceFilter>,
    sender: mpsc::UnboundedSender<ServiceEvent>,
}

impl Subscriber {
    fn wants(&self, reference: &ServiceReference) -> bool {
        self.service_type == reference.service_type()
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(reference.properties()))
    }
}

/// Registry contents, guarded by one lock (internal)
struct RegistryState {
    available: bool,
    next_service_id: ServiceId,
    next_subscription_id: SubscriptionId,
    // BTreeMap keyed by id keeps publication order for `find`
    services: BTreeMap<ServiceId, ServiceReference>,
    subscribers: Vec<Subscriber>,
}

impl RegistryState {
    /// Send to every subscriber, dropping the ones whose receiver is gone
    fn notify<F>(&mut self, mut event_for: F)
    where
        F: FnMut(&Subscriber) -> Option<ServiceEvent>,
    {
        self.subscribers.retain(|subscriber| match event_for(subscriber) {
            Some(event) => subscriber.sender.send(event).is_ok(),
            None => !subscriber.sender.is_closed(),
        });
    }
}

/// In-process [`ServiceRegistry`].
///
/// Events are sent while the registry lock is held, so every subscriber of a
/// service type observes the same event order.
pub struct InMemoryServiceRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                available: true,
                next_service_id: 1,
                next_subscription_id: 1,
                services: BTreeMap::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> RegistryResult<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| RegistryError::Poisoned {
            component: "registry_state".to_string(),
        })
    }

    /// Lock and fail fast when the registry has been shut down
    fn lock_available(&self) -> RegistryResult<MutexGuard<'_, RegistryState>> {
        let state = self.lock()?;
        if !state.available {
            return Err(RegistryError::Unavailable);
        }
        Ok(state)
    }

    /// Take the registry down.
    ///
    /// Every published service is dropped, every subscription stream ends and
    /// all further operations return [`RegistryError::Unavailable`].
    pub fn shutdown(&self) -> RegistryResult<()> {
        let mut state = self.lock()?;
        if !state.available {
            return Ok(());
        }
        log::info!(
            "Shutting down service registry ({} services, {} subscriptions)",
            state.services.len(),
            state.subscribers.len()
        );
        state.available = false;
        state.services.clear();
        // Dropping the senders closes every subscription stream
        state.subscribers.clear();
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.lock().map(|state| state.available).unwrap_or(false)
    }

    /// Number of services currently published
    pub fn service_count(&self) -> usize {
        self.lock().map(|state| state.services.len()).unwrap_or(0)
    }

    /// Number of live subscriptions for `service_type`
    pub fn subscription_count(&self, service_type: &str) -> usize {
        self.lock()
            .map(|state| {
                state
                    .subscribers
                    .iter()
                    .filter(|s| s.service_type == service_type && !s.sender.is_closed())
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for InMemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Avoid holding the lock while formatting anything large
        let (services, subscribers, available) = match self.state.lock() {
            Ok(state) => (state.services.len(), state.subscribers.len(), state.available),
            Err(_) => (0, 0, false),
        };
        f.debug_struct("InMemoryServiceRegistry")
            .field("services", &services)
            .field("subscribers", &subscribers)
            .field("available", &available)
            .finish()
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn publish(
        &self,
        service_type: &str,
        instance: ServiceObject,
        properties: Properties,
        owner: Option<ComponentId>,
    ) -> RegistryResult<ServiceHandle> {
        let mut state = self.lock_available()?;
        let id = state.next_service_id;
        state.next_service_id += 1;

        let handle = ServiceHandle::new(id, service_type);
        let reference = ServiceReference::new(handle.clone(), properties, instance, owner);
        state.services.insert(id, reference.clone());
        log::debug!("Published service {} with {}", handle, reference.properties());

        state.notify(|subscriber| {
            subscriber
                .wants(&reference)
                .then(|| ServiceEvent::added(reference.clone()))
        });
        Ok(handle)
    }

    fn unpublish(&self, handle: &ServiceHandle) -> RegistryResult<()> {
        let mut state = self.lock_available()?;
        let reference = state
            .services
            .remove(&handle.id())
            .ok_or_else(|| RegistryError::ServiceNotFound { handle: handle.to_string() })?;
        log::debug!("Unpublished service {}", handle);

        state.notify(|subscriber| {
            subscriber
                .wants(&reference)
                .then(|| ServiceEvent::removed(reference.clone()))
        });
        Ok(())
    }

    fn update_properties(
        &self,
        handle: &ServiceHandle,
        properties: Properties,
    ) -> RegistryResult<()> {
        let mut state = self.lock_available()?;
        let previous = state
            .services
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| RegistryError::ServiceNotFound { handle: handle.to_string() })?;
        let updated = previous.with_properties(properties);
        state.services.insert(handle.id(), updated.clone());
        log::debug!("Updated properties of service {} to {}", handle, updated.properties());

        // A filtered subscriber sees a service enter or leave its view as add/remove
        state.notify(|subscriber| match (subscriber.wants(&previous), subscriber.wants(&updated)) {
            (true, true) => Some(ServiceEvent::modified(updated.clone())),
            (true, false) => Some(ServiceEvent::removed(updated.clone())),
            (false, true) => Some(ServiceEvent::added(updated.clone())),
            (false, false) => None,
        });
        Ok(())
    }

    fn find(&self, service_type: &str) -> RegistryResult<Vec<ServiceReference>> {
        let state = self.lock_available()?;
        Ok(state
            .services
            .values()
            .filter(|reference| reference.service_type() == service_type)
            .cloned()
            .collect())
    }

    fn subscribe(
        &self,
        service_type: &str,
        filter: Option<ServiceFilter>,
    ) -> RegistryResult<Subscription> {
        let mut state = self.lock_available()?;
        let id = state.next_subscription_id;
        state.next_subscription_id += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            id,
            service_type: service_type.to_string(),
            filter,
            sender,
        };

        // Replay what is already there before any live event can be sent
        for reference in state.services.values().filter(|r| subscriber.wants(r)) {
            // The receiver is held right here, the send cannot fail
            let _ = subscriber.sender.send(ServiceEvent::added(reference.clone()));
        }
        log::debug!("Subscription {} opened for service type '{}'", subscriber.id, service_type);
        state.subscribers.push(subscriber);

        Ok(Subscription::new(id, service_type, receiver))
    }
}
