//! # Command module
//!
//! This module provides command line interface structures and helpers, and
//! the `daemon` entrypoint that builds and runs the App Orchestrator (C8).

use std::{io, sync::Arc};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::svc::{
    cfg::Configuration,
    orchestrator::{self, Orchestrator},
};

pub mod scheme;

// -----------------------------------------------------------------------------
// Executor trait

#[async_trait]
pub trait Executor {
    type Error;

    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error>;
}

// -----------------------------------------------------------------------------
// CommandError enum

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("failed to execute command '{0}', {1}")]
    Execution(String, Arc<CommandError>),
    #[error("failed to print scheme registry, {0}")]
    Scheme(scheme::Error),
}

// -----------------------------------------------------------------------------
// Command enum

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Print the scheme registry (kind name to table name mapping)
    Scheme(scheme::Scheme),
}

#[async_trait]
impl Executor for Command {
    type Error = CommandError;

    async fn execute(&self, config: Arc<Configuration>) -> Result<(), Self::Error> {
        match self {
            Self::Scheme(scheme) => scheme
                .execute(config)
                .await
                .map_err(CommandError::Scheme)
                .map_err(|err| CommandError::Execution("scheme".into(), Arc::new(err))),
        }
    }
}

// -----------------------------------------------------------------------------
// Args struct

#[derive(Parser, Clone, Debug)]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Args {
    /// Increase log verbosity
    #[arg(short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
    /// Specify location of configuration
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<std::path::PathBuf>,
    /// Check if configuration is healthy
    #[arg(short = 't', long = "check", global = true)]
    pub check: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

// -----------------------------------------------------------------------------
// DaemonError enum

#[derive(thiserror::Error, Debug)]
pub enum DaemonError {
    #[error("failed to handle termination signal, {0}")]
    SigTerm(io::Error),
    #[error("failed to build orchestrator, {0}")]
    Orchestrator(orchestrator::Error),
}

// -----------------------------------------------------------------------------
// Error enum
//
// Aggregates the two independent paths `main` can take -- running a
// one-shot `Command` or running the `daemon` -- behind one type so
// `main.rs` has a single error to propagate.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Command(CommandError),
    #[error("{0}")]
    Daemon(DaemonError),
}

impl From<CommandError> for Error {
    fn from(err: CommandError) -> Self {
        Self::Command(err)
    }
}

impl From<DaemonError> for Error {
    fn from(err: DaemonError) -> Self {
        Self::Daemon(err)
    }
}

// -----------------------------------------------------------------------------
// daemon function

pub async fn daemon(config: Arc<Configuration>) -> Result<(), DaemonError> {
    let orchestrator = Orchestrator::new(config)
        .await
        .map_err(DaemonError::Orchestrator)?;

    info!("Starting Neutree-Core orchestrator, spawning one controller per registered kind");

    let handle = tokio::spawn(async move { orchestrator.run().await });

    tokio::signal::ctrl_c()
        .await
        .map_err(DaemonError::SigTerm)?;

    info!("Termination signal received, stopping controllers");

    if let Err(err) = handle.await {
        if !err.is_panic() {
            error!(
                error = err.to_string(),
                "orchestrator task did not exit cleanly"
            );
        }
    }

    Ok(())
}
