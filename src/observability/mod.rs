//! # Observability
//!
//! Prometheus metrics and the Kubernetes event audit trail.

pub mod events;
pub mod metrics;
