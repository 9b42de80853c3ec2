#![cfg(test)]

use std::io::Write;

use crate::component::ComponentState;
use crate::config::{ConfigFormat, DeclaredService, TopologyConfig, parse};
use crate::manager::DependencyManager;
use crate::tests::integration::common::new_registry;

const CHAIN: &str = r#"{
    "manager": { "name": "chain" },
    "components": [
        {
            "name": "consumer",
            "dependencies": [ { "service": "Middle" } ]
        },
        {
            "name": "middle",
            "provides": "Middle",
            "properties": { "foo": "bar" },
            "dependencies": [
                { "service": "Backend", "propagate": true, "filter": { "region": "eu" } },
                { "service": "Metrics", "required": false }
            ]
        }
    ],
    "services": [
        { "service": "Backend", "properties": { "region": "us", "foo2": "wrong" } },
        { "service": "Backend", "properties": { "region": "eu", "foo2": "bar2" } }
    ]
}"#;

#[tokio::test]
async fn test_topology_installs_chain() {
    let topology: TopologyConfig = parse(CHAIN, ConfigFormat::Json).unwrap();
    assert_eq!(topology.manager.name, "chain");
    assert!(topology.components[0].dependencies[0].required);

    let (_registry, shared) = new_registry();
    let manager = DependencyManager::with_config(shared, topology.manager.clone());
    let installed = topology.install(&manager).await.unwrap();
    manager.settle().await.unwrap();

    assert_eq!(installed.components.len(), 2);
    assert_eq!(installed.services.len(), 2);
    for handle in &installed.components {
        assert_eq!(handle.state(), ComponentState::Active, "{} not active", handle.name());
    }

    let middle = &installed.components[1];
    let published = middle.published_properties().unwrap();
    assert_eq!(published.get_str("foo"), Some("bar"));
    assert_eq!(published.get_str("foo2"), Some("bar2"));
    assert_eq!(published.get_str("region"), Some("eu"));

    let backends = manager.find("Backend").unwrap();
    assert_eq!(
        backends[0].downcast::<DeclaredService>().map(|s| s.service_type.as_str()),
        Some("Backend")
    );

    manager.shutdown().await.unwrap();
}

#[test]
fn test_topology_loaded_from_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(CHAIN.as_bytes()).unwrap();

    let topology = TopologyConfig::load(file.path()).unwrap();
    assert_eq!(topology.components.len(), 2);
    assert_eq!(topology.services.len(), 2);
}

#[test]
fn test_topology_rejects_duplicate_names() {
    let data = r#"{ "components": [ { "name": "twin" }, { "name": "twin" } ] }"#;
    let topology: TopologyConfig = parse(data, ConfigFormat::Json).unwrap();
    let err = topology.validate().unwrap_err();
    assert!(err.to_string().contains("declared twice"));
}
