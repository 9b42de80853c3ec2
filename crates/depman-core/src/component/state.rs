use std::fmt;

/// Identity of a component within one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component-{}", self.0)
    }
}

/// Lifecycle state of a component.
///
/// `Active` holds exactly when every required dependency has a bound service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentState {
    /// Not added yet, or torn down
    #[default]
    Inactive,
    /// Instance constructed, nothing bound
    Instantiated,
    /// Some dependencies bound, at least one required dependency missing
    PartiallyBound,
    /// All required dependencies bound, `start` has run
    Active,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Inactive => write!(f, "inactive"),
            ComponentState::Instantiated => write!(f, "instantiated"),
            ComponentState::PartiallyBound => write!(f, "partially-bound"),
            ComponentState::Active => write!(f, "active"),
        }
    }
}

/// Where a reported failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Bind,
    Unbind,
    Change,
    Start,
    Stop,
    Propagate,
    Publish,
    Republish,
    Unpublish,
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailurePhase::Bind => "bind",
            FailurePhase::Unbind => "unbind",
            FailurePhase::Change => "change",
            FailurePhase::Start => "start",
            FailurePhase::Stop => "stop",
            FailurePhase::Propagate => "propagate",
            FailurePhase::Publish => "publish",
            FailurePhase::Republish => "republish",
            FailurePhase::Unpublish => "unpublish",
        };
        write!(f, "{}", name)
    }
}

/// A callback or registry failure recorded for a component.
///
/// Failures never change the component's dependency bookkeeping; they are
/// kept so the owner can inspect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFailure {
    pub component: ComponentId,
    pub component_name: String,
    pub phase: FailurePhase,
    /// Service type of the dependency involved, if any
    pub service_type: Option<String>,
    pub message: String,
}

impl fmt::Display for ComponentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service_type {
            Some(service_type) => write!(
                f,
                "{} ({}) {} failed for '{}': {}",
                self.component_name, self.component, self.phase, service_type, self.message
            ),
            None => write!(
                f,
                "{} ({}) {} failed: {}",
                self.component_name, self.component, self.phase, self.message
            ),
        }
    }
}
