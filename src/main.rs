//! # MongoDB Data Controller
//!
//! A Kubernetes controller that keeps MongoDB documents in sync with
//! `MongoDBData` custom resources.
//!
//! ## Overview
//!
//! 1. **MongoDBConfig** (cluster-scoped) names a MongoDB connection string and a
//!    collection; the controller verifies it can connect and reports `ready`
//! 2. **MongoDBData** (namespaced) references a MongoDBConfig by name and carries
//!    a document body; the controller inserts it into
//!    `<namespace>.<collection>`, keeps it updated, and deletes it when the
//!    resource is deleted (guarded by a finalizer)
//!
//! ## Features
//!
//! - **Idempotent writes**: record ids derive from the resource uid, so retries never duplicate
//! - **Admission review**: `/validate/mongodbconfig` and `/validate/mongodbdata`
//! - **Prometheus metrics**: `/metrics`, including `mongodb_data_latency_histogram`
//! - **Health probes**: `/healthz` and `/readyz`

use anyhow::Result;
use mongodb_data_controller::runtime::initialization::initialize;
use mongodb_data_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    run_watch_loop(init_result.client, init_result.reconciler).await?;

    init_result
        .server_state
        .is_ready
        .store(false, std::sync::atomic::Ordering::Relaxed);
    Ok(())
}
