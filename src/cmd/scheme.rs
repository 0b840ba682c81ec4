//! # Scheme command module
//!
//! Read-only introspection command that prints the Scheme Registry (C2):
//! the kind-name to table-name mapping every controller is built from.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Args as ClapArgs;

use crate::{
    cmd::Executor,
    svc::{cfg::Configuration, scheme::Scheme as SchemeRegistry},
};

// -----------------------------------------------------------------------------
// Error enum

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to serialize scheme registry, {0}")]
    Serialize(serde_json::Error),
}

// -----------------------------------------------------------------------------
// Scheme struct

#[derive(ClapArgs, Clone, Debug)]
pub struct Scheme {}

#[async_trait]
impl Executor for Scheme {
    type Error = Error;

    async fn execute(&self, _config: Arc<Configuration>) -> Result<(), Self::Error> {
        let scheme = SchemeRegistry::default();
        let descriptors = scheme.descriptors();

        println!(
            "{}",
            serde_json::to_string_pretty(&descriptors).map_err(Error::Serialize)?
        );

        Ok(())
    }
}
