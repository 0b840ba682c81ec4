//! # Endpoint kind
//!
//! An internally-served inference endpoint: a model running somewhere
//! inside a `Cluster`, exposed to callers through the gateway.
//! Reconciling an `Endpoint` looks up its `Cluster`, derives the
//! Service/Route/Plugin projection (spec §4.5 "Service/Route/Plugin
//! derivation"), converges it through the gateway (C7), and publishes
//! the resulting public URL to `Status.serviceUrl`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::svc::{
    gateway::{projection, GatewayClient},
    kinds::cluster::Cluster,
    reconciler::{ReconcileError, Reconciler},
    resource::{Metadata, Phase, Resource, Status},
    store::{Filter, ListOption, ObjectStore, Operator},
};

/// Inference task the model backing this endpoint serves, chosen from
/// the fixed lattice spec §3 names (`model.task`).
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTask {
    TextGeneration,
    TextEmbedding,
    TextRerank,
}

impl ModelTask {
    /// AI-statistics `route_type` this task maps to (spec §4.5 "Plugin
    /// set derivation"). `TextGeneration` is also the default when a
    /// task is otherwise unrecognized.
    pub fn route_type(self) -> &'static str {
        match self {
            ModelTask::TextGeneration => projection::ROUTE_TYPE_CHAT_COMPLETIONS,
            ModelTask::TextEmbedding => projection::ROUTE_TYPE_EMBEDDINGS,
            ModelTask::TextRerank => projection::ROUTE_TYPE_RERANK,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct ModelRef {
    pub task: ModelTask,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct EndpointSpec {
    /// Name of the `Cluster` resource this endpoint is scheduled on, in
    /// the same workspace as this `Endpoint`.
    #[serde(rename = "cluster")]
    pub cluster: String,
    #[serde(rename = "model")]
    pub model: ModelRef,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Endpoint {
    #[serde(flatten)]
    pub metadata: Metadata,
    #[serde(rename = "spec")]
    pub spec: EndpointSpec,
    #[serde(rename = "status", default)]
    pub status: Status,
}

impl Resource for Endpoint {
    const KIND_TAG: &'static str = "endpoint";

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

pub struct EndpointReconciler<C> {
    gateway: Arc<dyn GatewayClient>,
    clusters: Arc<C>,
}

impl<C> EndpointReconciler<C>
where
    C: ObjectStore<Cluster>,
{
    pub fn new(gateway: Arc<dyn GatewayClient>, clusters: Arc<C>) -> Self {
        Self { gateway, clusters }
    }

    async fn find_cluster(&self, workspace: &str, name: &str) -> Result<Option<Cluster>, ReconcileError> {
        let opts = ListOption::default()
            .with_filter(Filter::new("workspace", Operator::Eq, serde_json::json!(workspace)))
            .with_filter(Filter::new("name", Operator::Eq, serde_json::json!(name)));

        let mut found = self.clusters.list(&opts).await?;
        Ok(found.pop())
    }
}

#[async_trait]
impl<C> Reconciler<Endpoint> for EndpointReconciler<C>
where
    C: ObjectStore<Cluster> + Send + Sync,
{
    async fn reconcile(&self, obj: &mut Endpoint) -> Result<(), ReconcileError> {
        let key = obj.key();

        if obj.deleted() {
            self.gateway
                .delete_endpoint(&key)
                .await
                .map_err(|err| ReconcileError::Failed(err.to_string()))?;

            obj.status.transition(Phase::Deleted, None);
            return Ok(());
        }

        let cluster = self.find_cluster(&obj.metadata.workspace, &obj.spec.cluster).await?;

        let Some(cluster) = cluster.filter(Cluster::initialized) else {
            // Validation error (spec §7): write Failed + message, then
            // re-enqueue rate-limited so convergence resumes once the
            // cluster is initialized (scenario S5).
            return Err(ReconcileError::Failed(
                "cluster is never initialized".to_string(),
            ));
        };

        let serve_address = cluster
            .status
            .serve_address
            .as_deref()
            .expect("initialized() guarantees serve_address is set");

        let projection = projection::endpoint_projection(
            &key,
            &obj.metadata.workspace,
            &obj.metadata.name,
            obj.spec.model.task.route_type(),
            serve_address,
        )
        .map_err(|err| ReconcileError::Failed(err.to_string()))?;

        self.gateway
            .sync_endpoint(&projection)
            .await
            .map_err(|err| ReconcileError::Failed(err.to_string()))?;

        obj.status.service_url = Some(self.gateway.serve_url(&projection));
        obj.status.transition(Phase::Running, None);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait as async_trait_;

    use super::*;
    use crate::svc::{gateway::GatewayError, gateway::projection::DesiredProjection, store::StoreError};

    struct FakeGateway {
        writes: std::sync::atomic::AtomicUsize,
    }

    impl Default for FakeGateway {
        fn default() -> Self {
            Self {
                writes: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    #[async_trait_]
    impl GatewayClient for FakeGateway {
        async fn init(&self) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn sync_endpoint(&self, _projection: &DesiredProjection) -> Result<(), GatewayError> {
            self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
        async fn delete_endpoint(&self, _key: &crate::svc::key::Key) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn sync_external_endpoint(&self, _projection: &DesiredProjection) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn delete_external_endpoint(&self, _key: &crate::svc::key::Key) -> Result<(), GatewayError> {
            Ok(())
        }
        fn serve_url(&self, projection: &DesiredProjection) -> String {
            format!("https://gw.test{}", projection.route.path)
        }
    }

    struct FakeClusterStore(Vec<Cluster>);

    #[async_trait_]
    impl ObjectStore<Cluster> for FakeClusterStore {
        async fn list(&self, opts: &ListOption) -> Result<Vec<Cluster>, StoreError> {
            let name = opts
                .filters
                .iter()
                .find(|f| f.column == "name")
                .and_then(|f| f.value.as_str())
                .unwrap_or_default();
            Ok(self.0.iter().filter(|c| c.metadata.name == name).cloned().collect())
        }
        async fn get(&self, id: i64) -> Result<Cluster, StoreError> {
            self.0
                .iter()
                .find(|c| c.metadata.id == id)
                .cloned()
                .ok_or(StoreError::ResourceNotFound)
        }
        async fn create(&self, obj: Cluster) -> Result<Cluster, StoreError> {
            Ok(obj)
        }
        async fn update(&self, obj: Cluster) -> Result<Cluster, StoreError> {
            Ok(obj)
        }
        async fn update_status(&self, _id: i64, _status: Status) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete(&self, _id: i64) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn metadata(id: i64, name: &str, workspace: &str, kind: &str) -> Metadata {
        Metadata {
            id,
            name: name.into(),
            workspace: workspace.into(),
            labels: Default::default(),
            annotations: Default::default(),
            kind: kind.into(),
            api_version: "v1".into(),
            creation_timestamp: String::new(),
            update_timestamp: String::new(),
            deletion_timestamp: String::new(),
        }
    }

    fn running_cluster() -> Cluster {
        let mut cluster = Cluster {
            metadata: metadata(1, "default", "default", "cluster"),
            spec: crate::svc::kinds::cluster::ClusterSpec {
                serve_address: "http://llama3.default.svc:8000".into(),
            },
            status: Status::default(),
        };
        cluster.status.phase = Some(Phase::Running);
        cluster.status.serve_address = Some(cluster.spec.serve_address.clone());
        cluster
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            metadata: metadata(1, "llama3", "default", "endpoint"),
            spec: EndpointSpec {
                cluster: "default".into(),
                model: ModelRef {
                    task: ModelTask::TextGeneration,
                },
            },
            status: Status::default(),
        }
    }

    #[tokio::test]
    async fn reconcile_publishes_serve_url_and_transitions_running() {
        let reconciler = EndpointReconciler::new(
            Arc::new(FakeGateway::default()),
            Arc::new(FakeClusterStore(vec![running_cluster()])),
        );
        let mut obj = endpoint();

        reconciler.reconcile(&mut obj).await.unwrap();

        assert_eq!(obj.status.phase, Some(Phase::Running));
        assert_eq!(
            obj.status.service_url.unwrap(),
            "https://gw.test/workspace/default/endpoint/llama3"
        );
    }

    #[tokio::test]
    async fn uninitialized_cluster_fails_reconcile_for_backoff_retry() {
        let mut cluster = running_cluster();
        cluster.status = Status::default();

        let reconciler =
            EndpointReconciler::new(Arc::new(FakeGateway::default()), Arc::new(FakeClusterStore(vec![cluster])));
        let mut obj = endpoint();

        let err = reconciler.reconcile(&mut obj).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Failed(msg) if msg.contains("cluster is never initialized")));
    }

    #[tokio::test]
    async fn missing_cluster_fails_reconcile() {
        let reconciler = EndpointReconciler::new(Arc::new(FakeGateway::default()), Arc::new(FakeClusterStore(vec![])));
        let mut obj = endpoint();

        let err = reconciler.reconcile(&mut obj).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Failed(msg) if msg.contains("cluster is never initialized")));
    }

    #[tokio::test]
    async fn deleted_resource_tears_down_gateway_objects_and_transitions_deleted() {
        let reconciler = EndpointReconciler::new(
            Arc::new(FakeGateway::default()),
            Arc::new(FakeClusterStore(vec![running_cluster()])),
        );
        let mut obj = endpoint();
        obj.metadata.deletion_timestamp = "2026-01-01T00:00:00Z".into();

        reconciler.reconcile(&mut obj).await.unwrap();

        assert_eq!(obj.status.phase, Some(Phase::Deleted));
    }
}
