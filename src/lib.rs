//! Video claim verification orchestration.
//!
//! This library provides the task registry that runs the external
//! verification pipeline, the durable batch ledger and monitor that track
//! many tasks at once, the gallery importer, and the pure helpers (verdict
//! classification, search query generation) used around them.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
