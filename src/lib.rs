//! Geofenced incident alerts.
//!
//! Location reports are matched against active incident zones, every check
//! is logged, and checks that land inside a zone are announced to a webhook
//! through a Redis-backed delivery queue.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod kafka;
pub mod models;
pub mod processor;
pub mod queue;
pub mod store;
pub mod webhook;

pub use error::{Error, Result};
