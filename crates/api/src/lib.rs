//! HTTP API: administrative routes over the reconcile engine.

pub mod app;
