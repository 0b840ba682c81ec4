//! # In-memory object store
//!
//! A process-local, non-persistent `ObjectStore<T>` implementation.
//! The production REST-over-HTTP table store driver is a separate
//! concern this crate does not ship -- this is the one concrete
//! backend this crate ships, so the App Orchestrator (C8) is runnable
//! standalone; embedding this crate against a real object store means
//! supplying your own `ObjectStore<T>` impl and handing it to
//! `Orchestrator::new` instead.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::svc::{
    resource::{Resource, Status},
    store::{Filter, ListOption, ObjectStore, Operator, StoreError},
};

pub struct InMemoryStore<T> {
    rows: Mutex<BTreeMap<i64, T>>,
    next_id: AtomicI64,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(value: &serde_json::Value, filter: &Filter) -> bool {
    let Some(field) = filter
        .column
        .split("->")
        .try_fold(value, |acc, segment| acc.get(segment))
    else {
        return false;
    };

    match filter.operator {
        Operator::Eq => field == &filter.value,
        Operator::Neq => field != &filter.value,
        Operator::Gt => compare(field, &filter.value).is_some_and(|o| o.is_gt()),
        Operator::Gte => compare(field, &filter.value).is_some_and(|o| o.is_ge()),
        Operator::Lt => compare(field, &filter.value).is_some_and(|o| o.is_lt()),
        Operator::Lte => compare(field, &filter.value).is_some_and(|o| o.is_le()),
        Operator::Like => match (field.as_str(), filter.value.as_str()) {
            (Some(field), Some(pattern)) => field.contains(pattern),
            _ => false,
        },
        Operator::In => filter
            .value
            .as_array()
            .is_some_and(|values| values.contains(field)),
    }
}

fn compare(a: &serde_json::Value, b: &serde_json::Value) -> Option<std::cmp::Ordering> {
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

#[async_trait]
impl<T> ObjectStore<T> for InMemoryStore<T>
where
    T: Resource + serde::Serialize,
{
    async fn list(&self, opts: &ListOption) -> Result<Vec<T>, StoreError> {
        let rows = self.rows.lock().await;

        let mut items: Vec<T> = rows
            .values()
            .filter(|obj| {
                let Ok(value) = serde_json::to_value(obj) else {
                    return false;
                };
                opts.filters.iter().all(|filter| matches(&value, filter))
            })
            .cloned()
            .collect();

        if let Some(offset) = opts.offset {
            items = items.into_iter().skip(offset as usize).collect();
        }

        if let Some(limit) = opts.limit {
            items.truncate(limit as usize);
        }

        Ok(items)
    }

    async fn get(&self, id: i64) -> Result<T, StoreError> {
        self.rows
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::ResourceNotFound)
    }

    async fn create(&self, mut obj: T) -> Result<T, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        obj.metadata_mut().id = id;
        obj.metadata_mut().creation_timestamp = crate::svc::resource::now().to_rfc3339();
        obj.metadata_mut().update_timestamp = obj.metadata().creation_timestamp.clone();

        self.rows.lock().await.insert(id, obj.clone());
        Ok(obj)
    }

    async fn update(&self, mut obj: T) -> Result<T, StoreError> {
        let mut rows = self.rows.lock().await;

        if !rows.contains_key(&obj.metadata().id) {
            return Err(StoreError::ResourceNotFound);
        }

        obj.metadata_mut().update_timestamp = crate::svc::resource::now().to_rfc3339();
        rows.insert(obj.metadata().id, obj.clone());
        Ok(obj)
    }

    async fn update_status(&self, id: i64, status: Status) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let obj = rows.get_mut(&id).ok_or(StoreError::ResourceNotFound)?;
        *obj.status_mut() = status;
        obj.metadata_mut().update_timestamp = crate::svc::resource::now().to_rfc3339();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.rows
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::ResourceNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svc::{kinds::cluster::Cluster, resource::Metadata};

    fn cluster(name: &str) -> Cluster {
        Cluster {
            metadata: Metadata {
                id: 0,
                name: name.into(),
                workspace: "default".into(),
                labels: Default::default(),
                annotations: Default::default(),
                kind: "cluster".into(),
                api_version: "v1".into(),
                creation_timestamp: String::new(),
                update_timestamp: String::new(),
                deletion_timestamp: String::new(),
            },
            spec: crate::svc::kinds::cluster::ClusterSpec {
                serve_address: "http://127.0.0.1:8000".into(),
            },
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn create_assigns_an_immutable_incrementing_id() {
        let store: InMemoryStore<Cluster> = InMemoryStore::new();

        let a = store.create(cluster("a")).await.unwrap();
        let b = store.create(cluster("b")).await.unwrap();

        assert_eq!(a.metadata.id, 1);
        assert_eq!(b.metadata.id, 2);
    }

    #[tokio::test]
    async fn get_after_delete_is_not_found() {
        let store: InMemoryStore<Cluster> = InMemoryStore::new();
        let created = store.create(cluster("a")).await.unwrap();

        store.delete(created.metadata.id).await.unwrap();

        assert!(store.get(created.metadata.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_applies_equality_filter_on_nested_column() {
        let store: InMemoryStore<Cluster> = InMemoryStore::new();
        store.create(cluster("a")).await.unwrap();
        store.create(cluster("b")).await.unwrap();

        let opts = ListOption::default().with_filter(Filter::new(
            "name",
            Operator::Eq,
            serde_json::json!("b"),
        ));

        let found = store.list(&opts).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name, "b");
    }
}
