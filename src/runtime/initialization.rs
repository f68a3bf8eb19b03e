//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{load_config, ServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::observability::events::KubeEventSink;
use crate::provider::MongoConnector;
use crate::store::{KubeResourceStore, ResourceStore};
use anyhow::{Context, Result};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - Kubernetes client creation
/// - HTTP server startup
/// - Reconciler setup
/// - Startup summary of existing resources
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is opened
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mongodb_data_controller=info".into()),
        )
        .init();

    info!("Starting MongoDB Data Controller v{}", env!("CARGO_PKG_VERSION"));

    let (controller_config, server_config) = load_config();
    info!(?controller_config, ?server_config, "Configuration loaded");

    observability::metrics::register_metrics()?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let store: Arc<dyn ResourceStore> = Arc::new(KubeResourceStore::new(client.clone()));

    let server_state = Arc::new(ServerState::new(Arc::clone(&store)));
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });
    wait_for_server_ready(&server_config, &server_state, &server_handle).await?;

    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        Arc::new(MongoConnector),
        Arc::new(KubeEventSink::new(client.clone(), CONTROLLER_NAME)),
        controller_config,
    ));

    summarize_existing_resources(store.as_ref()).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    config: &ServerConfig,
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log what the controller is about to manage
///
/// The watch delivers every existing object on start, so this only reports;
/// a failing list means the CRDs are most likely not installed.
async fn summarize_existing_resources(store: &dyn ResourceStore) {
    let startup_span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.summary",
        operation = "summarize_existing_resources"
    );
    let _guard = startup_span.enter();

    match store.list_configs().await {
        Ok(configs) => {
            let ready = configs.iter().filter(|c| c.is_ready()).count();
            info!(
                "Found {} MongoDBConfig resources ({} ready)",
                configs.len(),
                ready
            );
        }
        Err(e) => {
            error!("MongoDBConfig is not queryable; {}. Is the CRD installed?", e);
            error!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        }
    }

    match store.list_data().await {
        Ok(documents) => {
            let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for document in &documents {
                by_namespace
                    .entry(document.namespace().unwrap_or_default())
                    .or_default()
                    .push(document.name_any());
            }

            info!(
                "Found {} MongoDBData resources in {} namespaces",
                documents.len(),
                by_namespace.len()
            );
            for (namespace, mut names) in by_namespace {
                names.sort();
                let listed = if names.len() <= 3 {
                    names.join(", ")
                } else {
                    format!("{}, ... ({} total)", names[..3].join(", "), names.len())
                };
                info!("Namespace: {}", namespace);
                info!("  Resources ({}): {}", names.len(), listed);
            }
        }
        Err(e) => {
            error!("MongoDBData is not queryable; {}. Is the CRD installed?", e);
            warn!("Continuing despite CRD queryability check failure - controller will retry");
        }
    }
}
