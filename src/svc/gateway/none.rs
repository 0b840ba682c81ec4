//! # None driver
//!
//! No-op gateway driver for `gateway.kind = "none"`: useful for local
//! development and for the supplemented kinds' tests, where no real
//! Kong instance is reachable. Still computes a deterministic serve
//! URL from the projection so `Status.serviceUrl` is populated the same
//! way a real driver would.

use async_trait::async_trait;

use super::{projection::DesiredProjection, GatewayClient, GatewayError};
use crate::svc::key::Key;

#[derive(Default)]
pub struct NoneDriver;

#[async_trait]
impl GatewayClient for NoneDriver {
    async fn init(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn sync_endpoint(&self, _projection: &DesiredProjection) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_endpoint(&self, _key: &Key) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn sync_external_endpoint(&self, _projection: &DesiredProjection) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_external_endpoint(&self, _key: &Key) -> Result<(), GatewayError> {
        Ok(())
    }

    fn serve_url(&self, projection: &DesiredProjection) -> String {
        format!("http://unrouted.invalid{}", projection.route.path)
    }
}
