//! # Controller runtime
//!
//! Binds an `Informer`, a `WorkQueue`, a pool of workers and a
//! `Reconciler` together for one resource kind `T` (C5).
//! Grounded on a per-CRD watch-and-reconcile loop and a typed polling
//! client loop, generalized to any `T: Resource` and to this crate's
//! polling `Informer` in place of a Kubernetes watch stream.

use std::{collections::HashMap, marker::PhantomData, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::svc::{
    informer::Informer,
    key::Key,
    queue::WorkQueue,
    reconciler::Reconciler,
    resource::{Phase, Resource},
    store::{ObjectStore, StoreError},
};

#[cfg(feature = "metrics")]
use crate::svc::telemetry;

const DRAIN_BUDGET: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("worker task panicked, {0}")]
    WorkerJoin(#[from] tokio::task::JoinError),
}

/// Runtime for one resource kind. Owns its own work queue and informer;
/// `Orchestrator` (C8) holds one `Controller` per registered kind.
pub struct Controller<T, S, R> {
    name: String,
    workers: usize,
    resync_interval: Duration,
    store: Arc<S>,
    reconciler: Arc<R>,
    _kind: PhantomData<T>,
}

impl<T, S, R> Controller<T, S, R>
where
    T: Resource,
    S: ObjectStore<T> + 'static,
    R: Reconciler<T> + 'static,
{
    pub fn new(
        name: impl Into<String>,
        store: Arc<S>,
        reconciler: Arc<R>,
        workers: usize,
        resync_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            workers,
            resync_interval,
            store,
            reconciler,
            _kind: PhantomData,
        }
    }

    /// Runs until `cancel` fires, then drains in-flight work for up to
    /// `DRAIN_BUDGET` before returning.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), Error> {
        let queue: WorkQueue<Key> = WorkQueue::new();
        let informer = Informer::new(self.store.clone(), queue.clone(), self.resync_interval);
        let cache = informer.cache();

        let informer_handle = tokio::spawn(informer.run(cancel.clone()));

        let worker_handles: Vec<_> = (0..self.workers)
            .map(|id| {
                tokio::spawn(Self::worker_loop(
                    id,
                    self.name.clone(),
                    queue.clone(),
                    cache.clone(),
                    self.store.clone(),
                    self.reconciler.clone(),
                ))
            })
            .collect();

        cancel.cancelled().await;
        info!(controller = %self.name, "shutting down, draining in-flight work");
        queue.shutdown().await;

        let drain = futures::future::join_all(worker_handles);
        if tokio::time::timeout(DRAIN_BUDGET, drain).await.is_err() {
            warn!(controller = %self.name, budget_secs = DRAIN_BUDGET.as_secs(), "worker drain exceeded budget, abandoning remaining in-flight work");
        }

        informer_handle.await?;
        Ok(())
    }

    async fn worker_loop(
        id: usize,
        name: String,
        queue: WorkQueue<Key>,
        cache: Arc<Mutex<HashMap<Key, T>>>,
        store: Arc<S>,
        reconciler: Arc<R>,
    ) {
        while let Some(key) = queue.get().await {
            let seed = { cache.lock().await.get(&key).cloned() };

            let Some(seed) = seed else {
                queue.forget(&key).await;
                queue.done(&key).await;
                continue;
            };

            let mut obj = match store.get(seed.metadata().id).await {
                Ok(obj) => obj,
                Err(err) if matches!(err, StoreError::ResourceNotFound) => {
                    queue.forget(&key).await;
                    queue.done(&key).await;
                    continue;
                }
                Err(err) => {
                    warn!(controller = %name, worker = id, key = %key, error = %err, "object store read failed, backing off");
                    queue.add_rate_limited(key.clone()).await;
                    queue.done(&key).await;
                    continue;
                }
            };

            if obj.deleted() && obj.status().phase == Some(Phase::Deleted) {
                match store.delete(obj.metadata().id).await {
                    Ok(()) => {
                        info!(controller = %name, key = %key, "hard-deleted resource after cooperative cleanup");
                        queue.forget(&key).await;
                    }
                    Err(err) => {
                        error!(controller = %name, worker = id, key = %key, error = %err, "hard delete failed, backing off");
                        queue.add_rate_limited(key.clone()).await;
                    }
                }
                queue.done(&key).await;
                continue;
            }

            let before_status = obj.status().clone();

            let result = match reconciler.before(&obj).await {
                Ok(()) => reconciler.reconcile(&mut obj).await,
                Err(err) => Err(err),
            };

            if let Err(err) = &result {
                obj.status_mut().transition(Phase::Failed, Some(err));
            }

            if obj.status() != &before_status {
                if let Err(err) = store.update_status(obj.metadata().id, obj.status().clone()).await {
                    warn!(controller = %name, worker = id, key = %key, error = %err, "status write-back failed");
                }
            }

            #[cfg(feature = "metrics")]
            telemetry::observe_reconcile(T::KIND_TAG, result.is_ok());

            match &result {
                Ok(()) => queue.forget(&key).await,
                Err(_) => queue.add_rate_limited(key.clone()).await,
            }

            reconciler.after(&obj, &result).await;
            queue.done(&key).await;
        }

        info!(controller = %name, worker = id, "worker stopped, queue drained");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use async_trait::async_trait;

    use super::*;
    use crate::svc::{
        reconciler::ReconcileError,
        resource::{Metadata, Status},
        store::ListOption,
    };

    #[derive(Clone, Debug)]
    struct Widget {
        metadata: Metadata,
        status: Status,
    }

    impl Resource for Widget {
        const KIND_TAG: &'static str = "widget";

        fn metadata(&self) -> &Metadata {
            &self.metadata
        }
        fn metadata_mut(&mut self) -> &mut Metadata {
            &mut self.metadata
        }
        fn status(&self) -> &Status {
            &self.status
        }
        fn status_mut(&mut self) -> &mut Status {
            &mut self.status
        }
    }

    fn widget(id: i64) -> Widget {
        Widget {
            metadata: Metadata {
                id,
                name: format!("w{id}"),
                workspace: "default".into(),
                labels: Default::default(),
                annotations: Default::default(),
                kind: "widget".into(),
                api_version: "v1".into(),
                creation_timestamp: String::new(),
                update_timestamp: String::new(),
                deletion_timestamp: String::new(),
            },
            status: Status::default(),
        }
    }

    struct FakeStore(Mutex<Map<i64, Widget>>);

    impl FakeStore {
        fn seeded(widgets: Vec<Widget>) -> Self {
            Self(Mutex::new(widgets.into_iter().map(|w| (w.metadata.id, w)).collect()))
        }
    }

    #[async_trait]
    impl ObjectStore<Widget> for FakeStore {
        async fn list(&self, _opts: &ListOption) -> Result<Vec<Widget>, StoreError> {
            Ok(self.0.lock().await.values().cloned().collect())
        }
        async fn get(&self, id: i64) -> Result<Widget, StoreError> {
            self.0.lock().await.get(&id).cloned().ok_or(StoreError::ResourceNotFound)
        }
        async fn create(&self, obj: Widget) -> Result<Widget, StoreError> {
            Ok(obj)
        }
        async fn update(&self, obj: Widget) -> Result<Widget, StoreError> {
            Ok(obj)
        }
        async fn update_status(&self, id: i64, status: Status) -> Result<(), StoreError> {
            let mut rows = self.0.lock().await;
            let obj = rows.get_mut(&id).ok_or(StoreError::ResourceNotFound)?;
            obj.status = status;
            Ok(())
        }
        async fn delete(&self, id: i64) -> Result<(), StoreError> {
            self.0.lock().await.remove(&id).map(|_| ()).ok_or(StoreError::ResourceNotFound)
        }
    }

    struct AlwaysRuns;

    #[async_trait]
    impl Reconciler<Widget> for AlwaysRuns {
        async fn reconcile(&self, obj: &mut Widget) -> Result<(), ReconcileError> {
            obj.status.transition(Phase::Running, None);
            Ok(())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Reconciler<Widget> for AlwaysFails {
        async fn reconcile(&self, _obj: &mut Widget) -> Result<(), ReconcileError> {
            Err(ReconcileError::Failed("boom".into()))
        }
    }

    /// Seeds the cache and queue with one widget, runs `worker_loop`
    /// against `store`/`reconciler` until the queue drains, and returns
    /// the final stored state.
    async fn drive(store: Arc<FakeStore>, reconciler: Arc<impl Reconciler<Widget> + 'static>, seed: Widget) -> Result<Widget, StoreError> {
        let queue: WorkQueue<Key> = WorkQueue::new();
        let cache = Arc::new(Mutex::new(HashMap::new()));
        let id = seed.metadata.id;
        let key = seed.key();

        cache.lock().await.insert(key.clone(), seed);
        queue.add(key).await;
        queue.shutdown().await;

        Controller::<Widget, FakeStore, _>::worker_loop(0, "widget".into(), queue, cache, store.clone(), reconciler).await;

        store.get(id).await
    }

    #[tokio::test]
    async fn successful_reconcile_transitions_running_and_writes_back_status() {
        let store = Arc::new(FakeStore::seeded(vec![widget(1)]));

        let result = drive(store, Arc::new(AlwaysRuns), widget(1)).await.unwrap();

        assert_eq!(result.status.phase, Some(Phase::Running));
    }

    #[tokio::test]
    async fn failed_reconcile_transitions_failed_and_records_error_message() {
        let store = Arc::new(FakeStore::seeded(vec![widget(1)]));

        let result = drive(store, Arc::new(AlwaysFails), widget(1)).await.unwrap();

        assert_eq!(result.status.phase, Some(Phase::Failed));
        assert_eq!(result.status.error_message, "boom");
    }

    #[tokio::test]
    async fn cooperative_deletion_hard_deletes_once_phase_is_deleted() {
        let mut deleting = widget(1);
        deleting.metadata.deletion_timestamp = "2026-07-28T00:00:00Z".into();
        deleting.status.phase = Some(Phase::Deleted);

        let store = Arc::new(FakeStore::seeded(vec![deleting.clone()]));

        let result = drive(store, Arc::new(AlwaysRuns), deleting).await;

        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn missing_from_store_forgets_the_key_without_reconciling() {
        // seed the cache with a widget that no longer exists in the store
        let store = Arc::new(FakeStore::seeded(vec![]));

        let err = drive(store, Arc::new(AlwaysFails), widget(7)).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
