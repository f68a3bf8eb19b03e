//! # Controller
//!
//! Reconcilers, connection handling and the HTTP surface (metrics, probes,
//! admission review).

pub mod admission;
pub mod backoff;
pub mod reconciler;
pub mod resolver;
pub mod server;
