//! # Object store module
//!
//! Typed list/get/create/update/delete interface for each resource kind
//! (C1, "Object store interface"). The concrete REST-over-HTTP
//! table store driver is a separate concern this crate does not ship --
//! only the trait and its supporting types live here. Grounded on a
//! typed external-client shape and the CRUD helpers of an in-cluster
//! resource client.

use async_trait::async_trait;

use crate::svc::resource::{Resource, Status};

pub mod memory;

// -----------------------------------------------------------------------------
// Filter / ListOption

/// Comparison operator for a `Filter`. Column addressing is
/// JSON-pointer-style, e.g. `metadata->name`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
}

#[derive(Clone, Debug)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: Operator, value: serde_json::Value) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, Default)]
pub struct ListOption {
    pub filters: Vec<Filter>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order: Option<(String, Order)>,
}

impl ListOption {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

// -----------------------------------------------------------------------------
// StoreError

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("resource not found")]
    ResourceNotFound,
    #[error("object store transport error, {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to (de)serialize object store payload, {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ResourceNotFound)
    }
}

// -----------------------------------------------------------------------------
// ObjectStore trait

/// Typed CRUD interface the engine consumes for every resource kind `T`.
/// The concrete driver (a REST-over-HTTP table store) is a collaborator
/// plugged in at the orchestrator boundary; this crate only depends on
/// the trait.
#[async_trait]
pub trait ObjectStore<T>: Send + Sync
where
    T: Resource,
{
    async fn list(&self, opts: &ListOption) -> Result<Vec<T>, StoreError>;

    async fn get(&self, id: i64) -> Result<T, StoreError>;

    async fn create(&self, obj: T) -> Result<T, StoreError>;

    async fn update(&self, obj: T) -> Result<T, StoreError>;

    async fn update_status(&self, id: i64, status: Status) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}
