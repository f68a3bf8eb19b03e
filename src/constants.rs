//! # Constants
//!
//! Default values shared by the controller, reconcilers and HTTP server.
//! Environment variables in [`crate::config`] override the tunable ones.

/// Field manager / event reporter name
pub const CONTROLLER_NAME: &str = "mongodb-data-controller";

/// Finalizer guarding the external MongoDB record of a MongoDBData resource
pub const DATA_FINALIZER: &str = "mongo.snappcloud.io/mongodb-data-finalizer";

/// Bounded timeout for connect + ping against the target MongoDB
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Requeue delay when a referenced MongoDBConfig does not exist (yet)
pub const DEFAULT_DEPENDENCY_REQUEUE_SECS: u64 = 20;

/// Requeue delay after a connection or store failure
pub const DEFAULT_TRANSIENT_REQUEUE_SECS: u64 = 30;

/// Error-policy Fibonacci backoff bounds (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// HTTP server port for metrics, probes and admission review
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
