//! # Metrics Module
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text exposition
//! - `controller_metrics` - Reconciliation latency, pass/error/requeue counters, store operations

pub mod controller_metrics;
pub mod registry;

pub use controller_metrics::*;
pub use registry::*;
