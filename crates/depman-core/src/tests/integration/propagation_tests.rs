#![cfg(test)]

use std::sync::Arc;

use crate::component::{CallbackError, Component, ComponentState, FailurePhase};
use crate::manager::DependencyManager;
use crate::registry::{Properties, ServiceEventKind, ServiceReference, ServiceRegistry};
use crate::tests::integration::common::{Probe, new_registry, publish, recording_dependency};

const C2_SERVICE: &str = "C2Service";
const C3_SERVICE: &str = "C3Service";

/// C1 binds C2 together with the properties C2 was published with
fn consumer(manager: &DependencyManager, probe: &Arc<Probe>) -> Component {
    manager
        .create_component()
        .set_name("c1")
        .set_shared_implementation(Arc::clone(probe))
        .add(
            manager
                .create_service_dependency()
                .set_service(C2_SERVICE)
                .set_required(true)
                .set_bind_with_properties(|probe: &Probe, properties: &Properties, _service: &Probe| {
                    probe.record_properties(properties);
                    Ok(())
                }),
        )
}

fn provider(manager: &DependencyManager, probe: &Arc<Probe>, value: &str) -> Component {
    manager
        .create_component()
        .set_name("c3")
        .set_shared_implementation(Arc::clone(probe))
        .set_interface(C3_SERVICE, Properties::new().with("foo2", value))
}

#[tokio::test]
async fn test_raw_propagation_reaches_consumer() {
    let (_registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let (c1, c2, c3) = (Probe::new("c1"), Probe::new("c2"), Probe::new("c3"));

    let middle = manager
        .create_component()
        .set_name("c2")
        .set_shared_implementation(Arc::clone(&c2))
        .set_interface(C2_SERVICE, Properties::new().with("foo", "bar"))
        .add(
            manager
                .create_service_dependency()
                .set_service(C3_SERVICE)
                .set_required(true)
                .set_propagate(true),
        );

    let h1 = manager.add(consumer(&manager, &c1)).await.unwrap();
    let h2 = manager.add(middle).await.unwrap();
    let h3 = manager.add(provider(&manager, &c3, "bar2")).await.unwrap();
    manager.settle().await.unwrap();

    assert_eq!(h1.state(), ComponentState::Active);
    assert_eq!(h2.state(), ComponentState::Active);
    assert_eq!(h3.state(), ComponentState::Active);

    let expected = Properties::new().with("foo", "bar").with("foo2", "bar2");
    assert_eq!(h2.published_properties(), Some(expected.clone()));
    // Exactly one bind, carrying both the static and the propagated property
    assert_eq!(c1.bound_properties(), vec![expected]);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_callback_propagation_replaces_raw_properties() {
    let (_registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let (c1, c2, c3) = (Probe::new("c1"), Probe::new("c2"), Probe::new("c3"));

    let middle = manager
        .create_component()
        .set_name("c2")
        .set_shared_implementation(Arc::clone(&c2))
        .set_interface(C2_SERVICE, Properties::new().with("foo", "bar"))
        .add(
            manager
                .create_service_dependency()
                .set_service(C3_SERVICE)
                .set_required(true)
                .set_propagate_callback(|probe: &Probe, reference: &ServiceReference| {
                    probe.record(format!("propagate:{}", reference.handle()));
                    Ok(Properties::new().with("foo2", "bar2"))
                }),
        );

    let h1 = manager.add(consumer(&manager, &c1)).await.unwrap();
    let h2 = manager.add(middle).await.unwrap();
    // The provider's own value must not leak through a callback dependency
    manager.add(provider(&manager, &c3, "raw")).await.unwrap();
    manager.settle().await.unwrap();

    assert!(h1.is_active());
    let published = h2.published_properties().expect("c2 should be published");
    assert_eq!(published.get_str("foo"), Some("bar"));
    assert_eq!(published.get_str("foo2"), Some("bar2"));
    assert_eq!(c1.bound_properties(), vec![published]);
    assert!(c2.events().iter().any(|e| e.starts_with("propagate:C3Service#")));

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_one_republish_per_provider_transition() {
    let (registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let (c2, c3) = (Probe::new("c2"), Probe::new("c3"));

    let mut observer = registry.subscribe(C2_SERVICE, None).unwrap();

    // Optional, so c2 stays published while c3 is away
    let middle = manager
        .create_component()
        .set_name("c2")
        .set_shared_implementation(Arc::clone(&c2))
        .set_interface(C2_SERVICE, Properties::new().with("foo", "bar"))
        .on_start(|probe: &Probe| {
            probe.record("start");
            Ok(())
        })
        .add(
            manager
                .create_service_dependency()
                .set_service(C3_SERVICE)
                .set_required(false)
                .set_propagate(true),
        );
    let h2 = manager.add(middle).await.unwrap();
    manager.settle().await.unwrap();

    let h3 = manager.add(provider(&manager, &c3, "bar2")).await.unwrap();
    manager.settle().await.unwrap();
    assert_eq!(
        h2.published_properties().and_then(|p| p.get_str("foo2").map(str::to_string)),
        Some("bar2".to_string())
    );

    manager.remove(&h3).await.unwrap();
    manager.settle().await.unwrap();
    assert_eq!(h2.published_properties(), Some(Properties::new().with("foo", "bar")));

    let c3_again = Probe::new("c3");
    manager.add(provider(&manager, &c3_again, "bar3")).await.unwrap();
    manager.settle().await.unwrap();

    let mut seen = Vec::new();
    while let Some(event) = observer.try_recv() {
        seen.push((event.kind, event.reference.properties().get_str("foo2").map(str::to_string)));
    }
    assert_eq!(
        seen,
        vec![
            (ServiceEventKind::Added, None),
            (ServiceEventKind::Modified, Some("bar2".to_string())),
            (ServiceEventKind::Modified, None),
            (ServiceEventKind::Modified, Some("bar3".to_string())),
        ]
    );
    // Republishing never restarts the component
    assert_eq!(c2.count("start"), 1);
    assert_eq!(h2.state(), ComponentState::Active);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_later_dependency_wins_on_collision() {
    let (registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let probe = Probe::new("merger");

    publish(
        &registry,
        "First",
        "first",
        Properties::new().with("shared", "first").with("only-first", 1),
    );
    publish(
        &registry,
        "Second",
        "second",
        Properties::new().with("shared", "second"),
    );

    let component = manager
        .create_component()
        .set_name("merger")
        .set_shared_implementation(Arc::clone(&probe))
        .set_interface("Merged", Properties::new().with("shared", "static"))
        .add(manager.create_service_dependency().set_service("First").set_required(true).set_propagate(true))
        .add(manager.create_service_dependency().set_service("Second").set_required(true).set_propagate(true));
    let handle = manager.add(component).await.unwrap();
    manager.settle().await.unwrap();

    let published = handle.published_properties().unwrap();
    assert_eq!(published.get_str("shared"), Some("second"));
    assert_eq!(published.get("only-first").and_then(|v| v.as_i64()), Some(1));

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_modified_provider_properties_are_republished() {
    let (registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let probe = Probe::new("c2");

    let source = publish(
        &registry,
        C3_SERVICE,
        "source",
        Properties::new().with("foo2", "v1"),
    );
    let component = manager
        .create_component()
        .set_name("c2")
        .set_shared_implementation(Arc::clone(&probe))
        .set_interface(C2_SERVICE, Properties::new())
        .on_start(|probe: &Probe| {
            probe.record("start");
            Ok(())
        })
        .add(
            recording_dependency(C3_SERVICE, true)
                .set_propagate(true),
        );
    let handle = manager.add(component).await.unwrap();
    manager.settle().await.unwrap();
    assert_eq!(handle.published_properties().unwrap().get_str("foo2"), Some("v1"));

    registry
        .update_properties(&source, Properties::new().with("foo2", "v2"))
        .unwrap();
    manager.settle().await.unwrap();

    assert_eq!(handle.published_properties().unwrap().get_str("foo2"), Some("v2"));
    assert_eq!(probe.count("start"), 1);
    assert_eq!(probe.count("change:source"), 1);

    manager.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failing_propagate_callback_recorded_once() {
    let (registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let probe = Probe::new("c2");

    publish(&registry, C3_SERVICE, "source", Properties::new());
    let component = manager
        .create_component()
        .set_name("c2")
        .set_shared_implementation(Arc::clone(&probe))
        .set_interface(C2_SERVICE, Properties::new().with("foo", "bar"))
        .add(
            manager
                .create_service_dependency()
                .set_service(C3_SERVICE)
                .set_required(true)
                .set_propagate_callback(|_probe: &Probe, _reference: &ServiceReference| {
                    Err(CallbackError::from("no properties today"))
                }),
        )
        .add(recording_dependency("Noise", false));
    let handle = manager.add(component).await.unwrap();
    manager.settle().await.unwrap();

    // Every one of these reconciles and recomputes the properties
    let noise = publish(&registry, "Noise", "noise", Properties::new().with("n", 0));
    for n in 1..5 {
        registry
            .update_properties(&noise, Properties::new().with("n", n))
            .unwrap();
    }
    registry.unpublish(&noise).unwrap();
    manager.settle().await.unwrap();

    assert!(handle.is_active());
    assert_eq!(probe.count("change:noise"), 4);
    let failures = handle.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].phase, FailurePhase::Propagate);
    assert_eq!(failures[0].message, "no properties today");
    assert_eq!(handle.published_properties(), Some(Properties::new().with("foo", "bar")));

    manager.shutdown().await.unwrap();
}
