#![cfg(test)]

use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;

use crate::component::ComponentState;
use crate::manager::DependencyManager;
use crate::registry::{Properties, ServiceRegistry};
use crate::tests::integration::common::{Probe, new_registry, probe_component, publish, recording_dependency};

const PRODUCERS: usize = 4;
const STEPS: usize = 40;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_leave_consistent_state() {
    let (registry, shared) = new_registry();
    let manager = DependencyManager::new(shared);
    let required = Probe::new("required");
    let optional = Probe::new("optional");

    let required_handle = manager
        .add(probe_component(&required).add(recording_dependency("Churn", true)))
        .await
        .unwrap();
    let optional_handle = manager
        .add(probe_component(&optional).add(recording_dependency("Churn", false)))
        .await
        .unwrap();

    // Decide the interleavings up front; the tasks only replay them
    let mut rng = rand::thread_rng();
    let plans: Vec<Vec<bool>> = (0..PRODUCERS)
        .map(|_| (0..STEPS).map(|_| rng.gen_bool(0.6)).collect())
        .collect();

    let tasks = plans.into_iter().enumerate().map(|(producer, plan)| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let mut published = Vec::new();
            for (step, publish_next) in plan.into_iter().enumerate() {
                if publish_next || published.is_empty() {
                    let name = format!("p{}-{}", producer, step);
                    published.push(publish(&registry, "Churn", &name, Properties::new()));
                } else {
                    let handle = published.remove(0);
                    registry.unpublish(&handle).unwrap();
                }
                tokio::task::yield_now().await;
            }
        })
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }
    manager.settle().await.unwrap();

    let present = registry.find("Churn").unwrap().len();
    assert!(present > 0, "every producer keeps at least one service");

    for (probe, handle) in [(&required, &required_handle), (&optional, &optional_handle)] {
        assert_eq!(handle.state(), ComponentState::Active);
        let binds = probe.events().iter().filter(|e| e.starts_with("bind:")).count();
        let unbinds = probe.events().iter().filter(|e| e.starts_with("unbind:")).count();
        assert_eq!(binds, unbinds + 1, "exactly one service bound for {}", probe.name());
        let starts = probe.count("start");
        let stops = probe.count("stop");
        assert_eq!(starts, stops + 1);
    }
    // An optional dependency never stops its component
    assert_eq!(optional.count("start"), 1);
    assert_eq!(optional.count("stop"), 0);

    manager.shutdown().await.unwrap();
    for probe in [&required, &optional] {
        let binds = probe.events().iter().filter(|e| e.starts_with("bind:")).count();
        let unbinds = probe.events().iter().filter(|e| e.starts_with("unbind:")).count();
        assert_eq!(binds, unbinds);
        assert_eq!(probe.count("start"), probe.count("stop"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_share_one_tracker() {
    let (registry, shared) = new_registry();
    let manager = Arc::new(DependencyManager::new(shared));
    publish(&registry, "Shared", "shared", Properties::new());

    let probes: Vec<_> = (0..8).map(|i| Probe::new(&format!("consumer-{}", i))).collect();
    let adds = probes.iter().map(|probe| {
        let manager = Arc::clone(&manager);
        let component = probe_component(probe).add(recording_dependency("Shared", true));
        async move { manager.add(component).await }
    });
    let handles: Vec<_> = join_all(adds)
        .await
        .into_iter()
        .collect::<crate::kernel::error::Result<_>>()
        .unwrap();
    manager.settle().await.unwrap();

    assert_eq!(manager.tracked_service_types().await, vec!["Shared".to_string()]);
    assert_eq!(registry.subscription_count("Shared"), 1);
    for (probe, handle) in probes.iter().zip(&handles) {
        assert!(handle.is_active());
        assert_eq!(probe.events(), vec!["bind:shared", "start"]);
    }

    manager.shutdown().await.unwrap();
}
