//! # Informer module
//!
//! Polling differ between the object store and an in-memory cache (C4).
//! Detects Added/Updated/Deleted transitions and pushes the
//! affected resource's `Key` onto the work queue; the cache itself
//! doubles as the lister a `Controller` worker consults instead of
//! re-fetching by id on every reconcile.
//!
//! Grounded on the poll-and-diff shape of a typed external-API client's
//! polling loop, generalized from a single concrete resource kind to
//! any `T: Resource`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::svc::{
    key::Key,
    queue::WorkQueue,
    resource::Resource,
    store::{ListOption, ObjectStore, StoreError},
};

#[cfg(feature = "metrics")]
use crate::svc::telemetry;

/// What changed about a cached resource, used only for logging -- the
/// work queue itself only ever carries a `Key`, a worker always
/// re-reads the latest state from the cache before reconciling.
#[derive(Debug, PartialEq, Eq)]
enum Delta {
    Added,
    Updated,
    Deleted,
}

pub struct Informer<T, S> {
    store: Arc<S>,
    queue: WorkQueue<Key>,
    cache: Arc<Mutex<HashMap<Key, T>>>,
    resync_interval: Duration,
}

impl<T, S> Informer<T, S>
where
    T: Resource,
    S: ObjectStore<T>,
{
    pub fn new(store: Arc<S>, queue: WorkQueue<Key>, resync_interval: Duration) -> Self {
        Self {
            store,
            queue,
            cache: Arc::new(Mutex::new(HashMap::new())),
            resync_interval,
        }
    }

    /// Shared handle to the last-seen cache, consulted by `Controller`
    /// workers to resolve a dequeued `Key` back to its resource.
    pub fn cache(&self) -> Arc<Mutex<HashMap<Key, T>>> {
        self.cache.clone()
    }

    pub async fn run(self, cancel: CancellationToken) {
        loop {
            if let Err(err) = self.resync().await {
                warn!(kind = T::KIND_TAG, error = %err, "informer list failed, will retry next resync");
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(kind = T::KIND_TAG, "informer stopping");
                    return;
                }
                _ = tokio::time::sleep(self.resync_interval) => {}
            }
        }
    }

    async fn resync(&self) -> Result<(), StoreError> {
        let listed = self.store.list(&ListOption::default()).await?;

        let mut next = HashMap::with_capacity(listed.len());
        for obj in listed {
            next.insert(obj.key(), obj);
        }

        let mut cache = self.cache.lock().await;

        let mut deltas = Vec::new();
        for (key, obj) in &next {
            match cache.get(key) {
                None => deltas.push((key.clone(), Delta::Added)),
                Some(prev) if prev.metadata().update_timestamp != obj.metadata().update_timestamp => {
                    deltas.push((key.clone(), Delta::Updated))
                }
                Some(prev) if prev.metadata().deletion_timestamp != obj.metadata().deletion_timestamp => {
                    deltas.push((key.clone(), Delta::Updated))
                }
                _ => {}
            }
        }

        for key in cache.keys() {
            if !next.contains_key(key) {
                deltas.push((key.clone(), Delta::Deleted));
            }
        }

        *cache = next;
        drop(cache);

        for (key, delta) in deltas {
            trace!(kind = T::KIND_TAG, key = %key, delta = ?delta, "informer diff");
            self.queue.add(key).await;
        }

        #[cfg(feature = "metrics")]
        telemetry::observe_queue_depth(T::KIND_TAG, self.queue.len().await);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::svc::resource::{Metadata, Status};

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

    fn widget(id: i64, update_timestamp: &str) -> Widget {
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
                update_timestamp: update_timestamp.into(),
                deletion_timestamp: String::new(),
            },
            status: Status::default(),
        }
    }

    struct FakeStore(Mutex<Vec<Widget>>);

    #[async_trait]
    impl ObjectStore<Widget> for FakeStore {
        async fn list(&self, _opts: &ListOption) -> Result<Vec<Widget>, StoreError> {
            Ok(self.0.lock().await.clone())
        }
        async fn get(&self, id: i64) -> Result<Widget, StoreError> {
            self.0
                .lock()
                .await
                .iter()
                .find(|w| w.metadata.id == id)
                .cloned()
                .ok_or(StoreError::ResourceNotFound)
        }
        async fn create(&self, obj: Widget) -> Result<Widget, StoreError> {
            Ok(obj)
        }
        async fn update(&self, obj: Widget) -> Result<Widget, StoreError> {
            Ok(obj)
        }
        async fn update_status(&self, _id: i64, _status: Status) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete(&self, _id: i64) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_resync_enqueues_every_listed_resource_as_added() {
        let store = Arc::new(FakeStore(Mutex::new(vec![widget(1, "t1"), widget(2, "t1")])));
        let queue = WorkQueue::new();
        let informer = Informer::new(store, queue.clone(), Duration::from_secs(30));

        informer.resync().await.unwrap();

        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn unchanged_resource_is_not_requeued_on_second_resync() {
        let store = Arc::new(FakeStore(Mutex::new(vec![widget(1, "t1")])));
        let queue = WorkQueue::new();
        let informer = Informer::new(store, queue.clone(), Duration::from_secs(30));

        informer.resync().await.unwrap();
        queue.get().await;
        informer.resync().await.unwrap();

        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn updated_timestamp_requeues_the_resource() {
        let store = Arc::new(FakeStore(Mutex::new(vec![widget(1, "t1")])));
        let queue = WorkQueue::new();
        let informer = Informer::new(store.clone(), queue.clone(), Duration::from_secs(30));

        informer.resync().await.unwrap();
        queue.get().await;

        store.0.lock().await[0].metadata.update_timestamp = "t2".into();
        informer.resync().await.unwrap();

        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn resource_removed_from_the_list_is_requeued_as_a_delete_diff() {
        let store = Arc::new(FakeStore(Mutex::new(vec![widget(1, "t1")])));
        let queue = WorkQueue::new();
        let informer = Informer::new(store.clone(), queue.clone(), Duration::from_secs(30));

        informer.resync().await.unwrap();
        queue.get().await;

        store.0.lock().await.clear();
        informer.resync().await.unwrap();

        assert_eq!(queue.len().await, 1);
    }
}
