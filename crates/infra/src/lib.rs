//! Infrastructure layer: stores, the reconcile engine, configuration.

pub mod config;
pub mod reconcile;
pub mod store;
