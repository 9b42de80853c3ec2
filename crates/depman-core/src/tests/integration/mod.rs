#![cfg(test)]

pub mod common;
pub mod churn_tests;
pub mod propagation_tests;
pub mod topology_tests;
