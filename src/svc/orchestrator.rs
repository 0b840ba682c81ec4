//! # Orchestrator module
//!
//! The App Orchestrator (C8): initializes the Scheme, the
//! Object Store, the Gateway client and the HTTP admin surface, builds
//! one `Controller` per registered kind, and runs them all concurrently
//! under a single cancellation handle until termination. Grounded on
//! `cmd::daemon`'s spawn-then-join-on-ctrl_c shape.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::svc::{
    cfg::Configuration,
    controller::Controller,
    gateway::{self, GatewayClient, GatewayError},
    http,
    kinds::{
        apikey::{ApiKey, ApiKeyReconciler},
        cluster::{Cluster, ClusterReconciler},
        endpoint::{Endpoint, EndpointReconciler},
        engine::{Engine, EngineReconciler},
        external_endpoint::{ExternalEndpoint, ExternalEndpointReconciler},
        image_registry::{ImageRegistry, ImageRegistryReconciler},
        model_registry::{ModelRegistry, ModelRegistryReconciler},
        role::{Role, RoleReconciler},
        workspace::{Workspace, WorkspaceReconciler},
    },
    scheme::Scheme,
    store::memory::InMemoryStore,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to build gateway client, {0}")]
    Gateway(#[from] GatewayError),
}

/// One `Controller` task per registered kind, plus the admin HTTP
/// surface, wired against the in-memory reference object store (the
/// production driver is out of scope, see `svc::store::memory`).
pub struct Orchestrator {
    config: Arc<Configuration>,
    scheme: Scheme,
    gateway: Arc<dyn GatewayClient>,
    cluster_store: Arc<InMemoryStore<Cluster>>,
    engine_store: Arc<InMemoryStore<Engine>>,
    endpoint_store: Arc<InMemoryStore<Endpoint>>,
    external_endpoint_store: Arc<InMemoryStore<ExternalEndpoint>>,
    apikey_store: Arc<InMemoryStore<ApiKey>>,
    role_store: Arc<InMemoryStore<Role>>,
    workspace_store: Arc<InMemoryStore<Workspace>>,
    image_registry_store: Arc<InMemoryStore<ImageRegistry>>,
    model_registry_store: Arc<InMemoryStore<ModelRegistry>>,
}

impl Orchestrator {
    pub async fn new(config: Arc<Configuration>) -> Result<Self, Error> {
        let gateway = gateway::build(&config.gateway)?;
        gateway.init().await?;

        Ok(Self {
            config,
            scheme: Scheme::default(),
            gateway,
            cluster_store: Arc::new(InMemoryStore::new()),
            engine_store: Arc::new(InMemoryStore::new()),
            endpoint_store: Arc::new(InMemoryStore::new()),
            external_endpoint_store: Arc::new(InMemoryStore::new()),
            apikey_store: Arc::new(InMemoryStore::new()),
            role_store: Arc::new(InMemoryStore::new()),
            workspace_store: Arc::new(InMemoryStore::new()),
            image_registry_store: Arc::new(InMemoryStore::new()),
            model_registry_store: Arc::new(InMemoryStore::new()),
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Blocks until SIGINT/ctrl-c, then drains every controller.
    pub async fn run(self) -> Result<(), Error> {
        let cancel = CancellationToken::new();
        let resync = Duration::from_secs(self.config.controller.resync_interval_seconds);
        let workers = self.config.controller.workers;

        let mut handles = Vec::new();

        handles.push(tokio::spawn(
            Controller::new(
                "cluster",
                self.cluster_store.clone(),
                Arc::new(ClusterReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "engine",
                self.engine_store.clone(),
                Arc::new(EngineReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "endpoint",
                self.endpoint_store.clone(),
                Arc::new(EndpointReconciler::new(self.gateway.clone(), self.cluster_store.clone())),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "externalendpoint",
                self.external_endpoint_store.clone(),
                Arc::new(ExternalEndpointReconciler::new(self.gateway.clone())),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "apikey",
                self.apikey_store.clone(),
                Arc::new(ApiKeyReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "role",
                self.role_store.clone(),
                Arc::new(RoleReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "workspace",
                self.workspace_store.clone(),
                Arc::new(WorkspaceReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "imageregistry",
                self.image_registry_store.clone(),
                Arc::new(ImageRegistryReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        handles.push(tokio::spawn(
            Controller::new(
                "modelregistry",
                self.model_registry_store.clone(),
                Arc::new(ModelRegistryReconciler),
                workers,
                resync,
            )
            .run(cancel.clone()),
        ));

        let http_cancel = cancel.clone();
        let config = self.config.clone();
        let http_handle = tokio::spawn(async move {
            tokio::select! {
                result = http::server::serve(config) => {
                    if let Err(err) = result {
                        error!(error = %err, "admin http server exited unexpectedly");
                    }
                }
                _ = http_cancel.cancelled() => {}
            }
        });

        info!(workers, "orchestrator started, every registered kind has a controller running");

        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");

        cancel.cancel();

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "controller task did not exit cleanly");
            }
        }

        let _ = http_handle.await;

        Ok(())
    }
}
