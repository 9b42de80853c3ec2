//! Canned component graphs runnable from the command line.
use std::sync::Arc;

use clap::ValueEnum;
use depman_core::{Component, DependencyManager, Properties, Result, ServiceReference};

const C2_SERVICE: &str = "C2Service";
const C3_SERVICE: &str = "C3Service";
const CHURN_SERVICE: &str = "Churn";

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// C1 -> C2 -> C3, C2 forwards C3's properties as they are
    Propagate,
    /// Same chain, C3 publishes no properties and C2's callback supplies them
    PropagateCallback,
    /// Publish and withdraw services under one required dependency
    Churn,
}

/// Implementation object for scenario components
#[derive(Debug)]
struct Node {
    name: String,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

fn node(manager: &DependencyManager, name: &str) -> Component {
    manager
        .create_component()
        .set_name(name)
        .set_implementation(Node::new(name))
        .on_start(|node: &Node| {
            log::info!("{} started", node.name);
            Ok(())
        })
        .on_stop(|node: &Node| {
            log::info!("{} stopped", node.name);
            Ok(())
        })
}

fn consumer(manager: &DependencyManager) -> Component {
    node(manager, "c1").add(
        manager
            .create_service_dependency()
            .set_service(C2_SERVICE)
            .set_required(true)
            .set_bind_with_properties(|node: &Node, properties: &Properties, provider: &Node| {
                log::info!("{} bound {} with {}", node.name, provider.name, properties);
                Ok(())
            }),
    )
}

fn provider(manager: &DependencyManager, properties: Properties) -> Component {
    node(manager, "c3").set_interface(C3_SERVICE, properties)
}

async fn chain(manager: &DependencyManager, by_callback: bool) -> Result<()> {
    let mut upstream = manager
        .create_service_dependency()
        .set_service(C3_SERVICE)
        .set_required(true);
    upstream = if by_callback {
        upstream.set_propagate_callback(|node: &Node, reference: &ServiceReference| {
            log::info!("{} computing properties for {}", node.name, reference.handle());
            Ok(Properties::new().with("foo2", "bar2"))
        })
    } else {
        upstream.set_propagate(true)
    };
    let middle = node(manager, "c2")
        .set_interface(C2_SERVICE, Properties::new().with("foo", "bar"))
        .add(upstream);

    manager.add(consumer(manager)).await?;
    manager.add(middle).await?;
    let provided = if by_callback {
        Properties::new()
    } else {
        Properties::new().with("foo2", "bar2")
    };
    manager.add(provider(manager, provided)).await?;
    Ok(())
}

async fn churn(manager: &DependencyManager, rounds: usize) -> Result<()> {
    let watcher = node(manager, "watcher").add(
        manager
            .create_service_dependency()
            .set_service(CHURN_SERVICE)
            .set_required(true)
            .set_bind(|node: &Node, service: &Node| {
                log::info!("{} bound {}", node.name, service.name);
                Ok(())
            }),
    );
    manager.add(watcher).await?;

    let registry = manager.registry();
    let mut live = Vec::new();
    for round in 0..rounds {
        let name = format!("churn-{}", round);
        let properties = Properties::new().with("round", round as i64);
        live.push(registry.publish(CHURN_SERVICE, Arc::new(Node::new(&name)), properties, None)?);
        // Keep at most two services alive, withdrawing the oldest
        if live.len() > 2 {
            let oldest = live.remove(0);
            registry.unpublish(&oldest)?;
        }
        manager.settle().await?;
    }
    Ok(())
}

pub async fn run(manager: &DependencyManager, scenario: Scenario, rounds: usize) -> Result<()> {
    log::debug!("Running scenario {:?}", scenario);
    match scenario {
        Scenario::Propagate => chain(manager, false).await,
        Scenario::PropagateCallback => chain(manager, true).await,
        Scenario::Churn => churn(manager, rounds).await,
    }
}
