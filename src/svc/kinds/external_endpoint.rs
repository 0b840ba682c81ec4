//! # ExternalEndpoint kind
//!
//! A proxy in front of an inference provider outside the cluster (a
//! hosted model API). Reconciling converges the same gateway
//! Service/Route/Plugin machinery as `Endpoint` (C7), pointed at the
//! parsed `Spec.Upstream.Url` instead of an in-cluster cluster address,
//! and injects an `Authorization` header when `Spec.Auth` is set (spec
//! §4.5 "Plugin set derivation").

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::svc::{
    gateway::{projection, GatewayClient},
    reconciler::{ReconcileError, Reconciler},
    resource::{Metadata, Phase, Resource, Status},
};

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    ApiKey,
    #[serde(other)]
    Unknown,
}

impl AuthType {
    fn as_str(self) -> &'static str {
        match self {
            AuthType::Bearer => "bearer",
            AuthType::ApiKey => "api_key",
            AuthType::Unknown => "unknown",
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct ExternalAuth {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    pub credential: String,
}

/// One of the three route kinds the gateway's AI-statistics plugin
/// understands (spec §3, §4.5). Serializes to the literal path string
/// the spec uses on the wire (e.g. `RouteType=/v1/chat/completions` in
/// scenario S2), not a symbolic tag.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
pub enum RouteType {
    #[serde(rename = "/v1/chat/completions")]
    ChatCompletions,
    #[serde(rename = "/v1/embeddings")]
    Embeddings,
    #[serde(rename = "/v1/rerank")]
    Rerank,
}

impl RouteType {
    pub fn as_path(self) -> &'static str {
        match self {
            RouteType::ChatCompletions => projection::ROUTE_TYPE_CHAT_COMPLETIONS,
            RouteType::Embeddings => projection::ROUTE_TYPE_EMBEDDINGS,
            RouteType::Rerank => projection::ROUTE_TYPE_RERANK,
        }
    }
}

fn default_timeout_ms() -> u64 {
    60_000
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Upstream {
    pub url: String,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct ExternalEndpointSpec {
    #[serde(rename = "upstream")]
    pub upstream: Upstream,
    #[serde(rename = "auth", default)]
    pub auth: Option<ExternalAuth>,
    #[serde(rename = "routeType")]
    pub route_type: RouteType,
    #[serde(rename = "timeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct ExternalEndpoint {
    #[serde(flatten)]
    pub metadata: Metadata,
    #[serde(rename = "spec")]
    pub spec: ExternalEndpointSpec,
    #[serde(rename = "status", default)]
    pub status: Status,
}

impl Resource for ExternalEndpoint {
    const KIND_TAG: &'static str = "externalendpoint";

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

pub struct ExternalEndpointReconciler {
    gateway: Arc<dyn GatewayClient>,
}

impl ExternalEndpointReconciler {
    pub fn new(gateway: Arc<dyn GatewayClient>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Reconciler<ExternalEndpoint> for ExternalEndpointReconciler {
    async fn reconcile(&self, obj: &mut ExternalEndpoint) -> Result<(), ReconcileError> {
        let key = obj.key();

        if obj.deleted() {
            self.gateway
                .delete_external_endpoint(&key)
                .await
                .map_err(|err| ReconcileError::Failed(err.to_string()))?;

            obj.status.transition(Phase::Deleted, None);
            return Ok(());
        }

        let auth_header_value = obj
            .spec
            .auth
            .as_ref()
            .map(|auth| projection::external_auth_header_value(auth.auth_type.as_str(), &auth.credential));

        let projection = projection::external_endpoint_projection(
            &key,
            &obj.metadata.workspace,
            &obj.metadata.name,
            &obj.spec.upstream.url,
            obj.spec.route_type.as_path(),
            obj.spec.timeout_ms,
            auth_header_value.as_deref(),
        )
        .map_err(|err| ReconcileError::Failed(err.to_string()))?;

        self.gateway
            .sync_external_endpoint(&projection)
            .await
            .map_err(|err| ReconcileError::Failed(err.to_string()))?;

        obj.status.service_url = Some(self.gateway.serve_url(&projection));
        obj.status.transition(Phase::Running, None);

        Ok(())
    }
}
