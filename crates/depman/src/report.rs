use depman_core::{ComponentHandle, DependencyManager};

/// Render one line per component plus the service it publishes, if any.
pub fn render(components: &[ComponentHandle]) -> String {
    let mut out = String::new();
    for handle in components {
        out.push_str(&format!("{} [{}]: {}\n", handle.name(), handle.id(), handle.state()));
        match (handle.registration(), handle.published_properties()) {
            (Some(registration), Some(properties)) => {
                out.push_str(&format!("  publishes {} {}\n", registration, properties));
            }
            _ => out.push_str("  not published\n"),
        }
        for failure in handle.failures() {
            out.push_str(&format!("  failure: {}\n", failure));
        }
    }
    out
}

/// Print the state of every component still owned by `manager`
pub async fn print(manager: &DependencyManager) {
    let components = manager.components().await;
    print!("{}", render(&components));
}
