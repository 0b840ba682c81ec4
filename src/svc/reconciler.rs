//! # Reconciler module
//!
//! The per-kind reconcile contract (C6). A reconciler
//! receives the latest known state of a single resource and drives it
//! towards the desired state; it must be idempotent -- reconciling the
//! same state twice produces the same result and no extra side effects.
//!
//! Deletion is cooperative: once a resource carries a
//! `deletionTimestamp`, the reconciler is expected to run whatever
//! teardown it owns (gateway objects, external resources, ...) and only
//! then transition `Phase::Deleted`; the controller hard-deletes the
//! underlying row once it observes that phase, mirroring a
//! finalizer-driven deletion flow without a separate finalizer list.

use async_trait::async_trait;

use crate::svc::{resource::Resource, store::StoreError};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Failed(String),
}

/// Implemented once per managed kind `T`. The controller runtime (C5)
/// is generic over `R: Reconciler<T>` and drives it to completion for
/// every dequeued key.
#[async_trait]
pub trait Reconciler<T>: Send + Sync
where
    T: Resource,
{
    /// Converge `obj` one step towards its desired state. Must be safe
    /// to call repeatedly against the same observed state.
    async fn reconcile(&self, obj: &mut T) -> Result<(), ReconcileError>;

    /// Runs before `reconcile`. An error here skips `reconcile` entirely;
    /// the controller records it as the object's failure and re-enqueues,
    /// the same as an error from `reconcile` itself.
    async fn before(&self, _obj: &T) -> Result<(), ReconcileError> {
        Ok(())
    }

    /// Runs after `reconcile` regardless of outcome. Errors here are
    /// logged by the controller and never change the reconcile result.
    async fn after(&self, _obj: &T, _result: &Result<(), ReconcileError>) {}
}
