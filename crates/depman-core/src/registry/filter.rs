use std::fmt;
use std::sync::Arc;

use crate::registry::properties::{Properties, PropertyValue};

type Predicate = Arc<dyn Fn(&Properties) -> bool + Send + Sync>;

/// Predicate over service properties, used by subscriptions and dependencies
#[derive(Clone)]
pub struct ServiceFilter {
    description: String,
    predicate: Predicate,
}

impl ServiceFilter {
    /// Wrap an arbitrary predicate; `description` is used in logs and `Display`
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Properties) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Matches services whose `key` property equals `value`
    pub fn equals(key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        let key = key.into();
        let value = value.into();
        let description = format!("({}={})", key, value);
        Self::new(description, move |props| props.get(&key) == Some(&value))
    }

    /// Matches services that carry `key` with any value
    pub fn present(key: impl Into<String>) -> Self {
        let key = key.into();
        let description = format!("({}=*)", key);
        Self::new(description, move |props| props.contains_key(&key))
    }

    /// Matches services carrying every entry of `required`
    pub fn all_of(required: Properties) -> Self {
        let description = format!("(&{})", required);
        Self::new(description, move |props| props.contains_all(&required))
    }

    /// Conjunction of two filters
    pub fn and(self, other: ServiceFilter) -> Self {
        let description = format!("(&{}{})", self.description, other.description);
        let (left, right) = (self.predicate, other.predicate);
        Self {
            description,
            predicate: Arc::new(move |props| left(props) && right(props)),
        }
    }

    pub fn matches(&self, properties: &Properties) -> bool {
        (self.predicate)(properties)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for ServiceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFilter")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ServiceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}
