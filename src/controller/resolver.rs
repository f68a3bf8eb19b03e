//! # Connection Resolver
//!
//! Opens a short-lived connection for one reconciliation pass: connect, then
//! ping the primary, both bounded by one timeout. Nothing is cached between
//! passes and failures are never retried here; the caller requeues.

use crate::provider::{DocumentStore, StoreConnector, StoreError};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ConnectionResolver {
    connector: Arc<dyn StoreConnector>,
    timeout: Duration,
}

impl ConnectionResolver {
    pub fn new(connector: Arc<dyn StoreConnector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Connect to `uri` and verify the primary answers a ping
    pub async fn resolve(&self, uri: &str) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let redacted = redact_uri(uri);
        debug!(uri = %redacted, timeout = ?self.timeout, "Resolving MongoDB connection");

        let attempt = async {
            let store = self.connector.connect(uri, self.timeout).await?;
            store.ping().await?;
            Ok::<_, StoreError>(store)
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(store)) => Ok(store),
            Ok(Err(e)) => {
                warn!(uri = %redacted, error = %e, "MongoDB connection failed");
                Err(e)
            }
            Err(_) => {
                warn!(uri = %redacted, timeout = ?self.timeout, "MongoDB connection timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

/// Mask the password of a connection string for logging
pub fn redact_uri(uri: &str) -> String {
    let Ok(pattern) = Regex::new(r"^(mongodb(?:\+srv)?://[^:@/]+):[^@/]*@") else {
        return uri.to_string();
    };
    pattern.replace(uri, "$1:****@").into_owned()
}
