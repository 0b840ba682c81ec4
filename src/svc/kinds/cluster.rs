//! # Cluster kind
//!
//! Registers a compute cluster (a pool of inference nodes) that
//! `Endpoint` resources schedule onto. Bootstrapping and placement
//! inside the cluster is out of scope for this engine (spec §1); the
//! one thing the core needs from it is the address its serving process
//! answers on, which the Endpoint gateway projection (C7) resolves into
//! a Service's `(scheme, host, port)` (spec §4.5 "Service derivation").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::svc::{
    reconciler::{ReconcileError, Reconciler},
    resource::{Metadata, Phase, Resource, Status},
};

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct ClusterSpec {
    /// Address the cluster's serving process answers on, e.g.
    /// `http://10.0.4.12:8000`. Provisioning and health-checking that
    /// process is delegated elsewhere; the core only parses this.
    #[serde(rename = "serveAddress")]
    pub serve_address: String,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Cluster {
    #[serde(flatten)]
    pub metadata: Metadata,
    #[serde(rename = "spec")]
    pub spec: ClusterSpec,
    #[serde(rename = "status", default)]
    pub status: Status,
}

impl Resource for Cluster {
    const KIND_TAG: &'static str = "cluster";

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

impl Cluster {
    /// `true` once this cluster has a running, addressable serve
    /// process -- the precondition the Endpoint reconciler checks
    /// before deriving a gateway Service from it.
    pub fn initialized(&self) -> bool {
        self.status.phase == Some(Phase::Running) && self.status.serve_address.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ClusterReconciler;

#[async_trait]
impl Reconciler<Cluster> for ClusterReconciler {
    async fn reconcile(&self, obj: &mut Cluster) -> Result<(), ReconcileError> {
        if obj.deleted() {
            obj.status.transition(Phase::Deleted, None);
            return Ok(());
        }

        if url::Url::parse(&obj.spec.serve_address).is_err() {
            return Err(ReconcileError::Failed(format!(
                "cluster serve address '{}' is not a valid url",
                obj.spec.serve_address
            )));
        }

        obj.status.serve_address = Some(obj.spec.serve_address.clone());
        obj.status.transition(Phase::Running, None);

        Ok(())
    }
}
