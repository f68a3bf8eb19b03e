//! # Status Projection
//!
//! Single mutation point for the observable state of both kinds. A projection
//! sets the summary field, upserts the reason-keyed condition, persists through
//! the status subresource and mirrors the change as an audit event.
//!
//! CRITICAL: a projection that changes nothing is skipped entirely (no status
//! write, no event) so reconciliation does not feed its own watch.

use super::types::{Reconciler, ReconcilerError};
use crate::crd::{
    set_status_condition, Condition, ConfigConditionType, DocumentState, MongoDBConfig,
    MongoDBData,
};
use crate::observability::events::Severity;
use crate::store::{ResourceError, ResourceStore};
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use std::fmt::Display;
use tracing::debug;

/// Kinds whose status can be projected
#[async_trait]
pub trait StatusProjection: Resource<DynamicType = ()> + Clone + Send + Sync {
    /// Reason code; doubles as the condition type
    type Reason: Copy + Display + Send;

    /// Set the top-level summary field(s) for `reason`
    fn apply_summary(&mut self, reason: Self::Reason, status: bool);

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    /// Structural status equality
    fn same_status(&self, other: &Self) -> bool;

    async fn persist_status(&self, store: &dyn ResourceStore) -> Result<Self, ResourceError>;
}

#[async_trait]
impl StatusProjection for MongoDBConfig {
    type Reason = ConfigConditionType;

    fn apply_summary(&mut self, reason: ConfigConditionType, status: bool) {
        let summary = self.status.get_or_insert_with(Default::default);
        summary.ready = status;
        summary.last_condition_type = Some(reason);
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }

    fn same_status(&self, other: &Self) -> bool {
        self.status == other.status
    }

    async fn persist_status(&self, store: &dyn ResourceStore) -> Result<Self, ResourceError> {
        store.replace_config_status(self).await
    }
}

#[async_trait]
impl StatusProjection for MongoDBData {
    type Reason = DocumentState;

    fn apply_summary(&mut self, reason: DocumentState, _status: bool) {
        self.status.get_or_insert_with(Default::default).state = Some(reason);
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }

    fn same_status(&self, other: &Self) -> bool {
        self.status == other.status
    }

    async fn persist_status(&self, store: &dyn ResourceStore) -> Result<Self, ResourceError> {
        store.replace_data_status(self).await
    }
}

/// Project an outcome onto `object` as read at the start of the pass
pub async fn project<K: StatusProjection>(
    ctx: &Reconciler,
    object: &K,
    reason: K::Reason,
    status: bool,
    message: &str,
) -> Result<K, ReconcilerError> {
    project_onto(ctx, object, object.clone(), reason, status, message).await
}

/// Project an outcome onto `next`, a copy of `current` carrying local field
/// assignments (e.g. a freshly written record id)
pub async fn project_onto<K: StatusProjection>(
    ctx: &Reconciler,
    current: &K,
    mut next: K,
    reason: K::Reason,
    status: bool,
    message: &str,
) -> Result<K, ReconcilerError> {
    let reason_code = reason.to_string();
    next.apply_summary(reason, status);
    set_status_condition(
        next.conditions_mut(),
        Condition::new(&reason_code, status, message, current.meta().generation),
    );

    if next.same_status(current) {
        debug!(
            object = %current.name_any(),
            reason = %reason_code,
            "Skipping status update - status unchanged"
        );
        return Ok(next);
    }

    let persisted = next.persist_status(ctx.store.as_ref()).await?;
    ctx.events
        .publish(
            current.object_ref(&()),
            Severity::from_status(status),
            &reason_code,
            message,
        )
        .await;
    debug!(
        object = %current.name_any(),
        reason = %reason_code,
        status,
        "Status projected"
    );
    Ok(persisted)
}
