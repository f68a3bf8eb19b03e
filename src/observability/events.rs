//! # Audit Events
//!
//! Human-readable audit trail of status projections. Every projection that
//! changes an object's observable status is mirrored as a Kubernetes Event on
//! that object: `Warning` for failed conditions, `Normal` otherwise.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
}

impl Severity {
    /// Warning when the observation failed
    pub fn from_status(status: bool) -> Self {
        if status {
            Severity::Normal
        } else {
            Severity::Warning
        }
    }
}

/// Sink for audit events
#[async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Publish one event; delivery failures are logged, never propagated
    async fn publish(
        &self,
        reference: ObjectReference,
        severity: Severity,
        reason: &str,
        message: &str,
    );
}

/// Publishes events through the Kubernetes events API
pub struct KubeEventSink {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(
        &self,
        reference: ObjectReference,
        severity: Severity,
        reason: &str,
        message: &str,
    ) {
        let event = Event {
            type_: match severity {
                Severity::Normal => EventType::Normal,
                Severity::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, &reference).await {
            warn!(
                object = reference.name.as_deref().unwrap_or_default(),
                reason, error = %e,
                "Failed to publish event"
            );
        }
    }
}

/// One event captured by [`RecordingEventSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// `namespace/name` (just `name` for cluster-scoped objects)
    pub object: String,
    pub severity: Severity,
    pub reason: String,
    pub message: String,
}

/// Keeps published events in memory
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(
        &self,
        reference: ObjectReference,
        severity: Severity,
        reason: &str,
        message: &str,
    ) {
        let name = reference.name.unwrap_or_default();
        let object = match reference.namespace {
            Some(namespace) => format!("{namespace}/{name}"),
            None => name,
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                object,
                severity,
                reason: reason.to_string(),
                message: message.to_string(),
            });
    }
}
