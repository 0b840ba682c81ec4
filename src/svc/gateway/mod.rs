//! # Gateway module
//!
//! Client abstraction for the external HTTP gateway that fronts
//! `Endpoint` and `ExternalEndpoint` traffic (C7). The
//! concrete driver is selected at startup from `gateway.kind` in
//! configuration; only the trait and the registry that builds a driver
//! from it live in this crate's public surface, mirroring the way
//! `ObjectStore` stays driver-agnostic in `svc::store`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::svc::{cfg::Gateway as GatewayConfig, key::Key};

pub mod kong;
pub mod none;
pub mod projection;

use projection::DesiredProjection;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("gateway driver '{0}' is not supported")]
    NotSupported(String),
    #[error("gateway transport error, {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned unexpected status {0} for {1}")]
    UnexpectedStatus(reqwest::StatusCode, &'static str),
}

/// Driven by the `Endpoint`/`ExternalEndpoint` reconcilers to converge
/// gateway-side Service/Route/Plugin objects towards a `DesiredProjection`
/// computed by `gateway::projection`, and to tear them down on deletion.
///
/// Every method must be idempotent: calling `sync_*` repeatedly with an
/// unchanged projection issues zero gateway write calls on the second
/// invocation (spec §8, testable property 3), and `delete_*` on an
/// already-absent object succeeds silently.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Runs once at startup, before any controller begins reconciling.
    async fn init(&self) -> Result<(), GatewayError>;

    /// Converge the gateway objects described by `projection`.
    async fn sync_endpoint(&self, projection: &DesiredProjection) -> Result<(), GatewayError>;
    /// Delete the Route (its plugins vanish with it) and Service
    /// backing `key`, in that order. Not-found at any step is success.
    async fn delete_endpoint(&self, key: &Key) -> Result<(), GatewayError>;

    async fn sync_external_endpoint(&self, projection: &DesiredProjection) -> Result<(), GatewayError>;
    async fn delete_external_endpoint(&self, key: &Key) -> Result<(), GatewayError>;

    /// `GetServeUrl` (spec §4.5): the proxy-base-url this driver is
    /// configured with, joined with the projection's Route path.
    fn serve_url(&self, projection: &DesiredProjection) -> String;
}

/// Builds the configured driver, or `GatewayError::NotSupported` if
/// `gateway.kind` names neither built-in driver.
pub fn build(config: &GatewayConfig) -> Result<Arc<dyn GatewayClient>, GatewayError> {
    match config.kind.as_str() {
        "kong" => Ok(Arc::new(kong::KongDriver::new(config)?)),
        "none" => Ok(Arc::new(none::NoneDriver::default())),
        other => Err(GatewayError::NotSupported(other.to_string())),
    }
}
