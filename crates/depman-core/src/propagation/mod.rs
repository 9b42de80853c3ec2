//! # Property Propagation
//!
//! Computes the property set a component publishes its own service under:
//! the component's static properties, overlaid with the contribution of every
//! bound dependency marked "propagate", in declaration order.
use std::collections::BTreeSet;

use crate::component::callbacks::{self, CallbackError, Instance};
use crate::dependency::{Dependency, Propagate};
use crate::registry::{Properties, ServiceReference};

/// A propagate callback that failed; its dependency contributed nothing
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationFailure {
    /// Declaration index of the dependency
    pub index: usize,
    pub service_type: String,
    pub error: CallbackError,
}

/// Outcome of one property computation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propagation {
    pub properties: Properties,
    /// Keys contributed by more than one propagating dependency; the later one won
    pub conflicts: Vec<String>,
    pub failures: Vec<PropagationFailure>,
}

/// Stateless merger of static and propagated properties
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyPropagator;

impl PropertyPropagator {
    /// Merge `static_properties` with what every bound propagating dependency contributes.
    ///
    /// `sources` yields each dependency in declaration order together with its
    /// currently bound service, if any. Unbound dependencies contribute nothing.
    /// The result only depends on the inputs, so computing twice without a
    /// registry change yields the same map.
    pub fn compute_properties<'a, I>(
        static_properties: &Properties,
        instance: &Instance,
        sources: I,
    ) -> Propagation
    where
        I: IntoIterator<Item = (&'a Dependency, Option<&'a ServiceReference>)>,
    {
        let mut propagation = Propagation {
            properties: static_properties.clone(),
            ..Propagation::default()
        };
        let mut propagated_keys: BTreeSet<String> = BTreeSet::new();

        for (index, (dependency, bound)) in sources.into_iter().enumerate() {
            let Some(reference) = bound else {
                continue;
            };
            let contribution = match dependency.propagate() {
                Propagate::None => continue,
                Propagate::Raw => reference.properties().clone(),
                Propagate::Callback(f) => match callbacks::guarded(|| f(instance, reference)) {
                    Ok(properties) => properties,
                    Err(error) => {
                        propagation.failures.push(PropagationFailure {
                            index,
                            service_type: reference.service_type().to_string(),
                            error,
                        });
                        continue;
                    }
                },
            };

            for key in contribution.keys() {
                if !propagated_keys.insert(key.to_string()) {
                    log::debug!(
                        "Property '{}' propagated by more than one dependency, '{}' wins",
                        key,
                        reference.service_type()
                    );
                    propagation.conflicts.push(key.to_string());
                }
            }
            propagation.properties.overlay(&contribution);
        }
        propagation
    }
}
