//! # Configuration module
//!
//! This module provides utilities and helpers to interact with the
//! configuration

use std::{
    convert::TryFrom,
    env::{self, VarError},
    path::PathBuf,
};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// -----------------------------------------------------------------------------
// Constants

pub const SERVER_LISTEN: &str = "0.0.0.0:8000";
pub const CONTROLLER_WORKERS: usize = 5;
pub const RESYNC_INTERVAL_SECONDS: u64 = 30;

// -----------------------------------------------------------------------------
// Store structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Store {
    #[serde(rename = "url")]
    pub url: String,
    #[serde(rename = "jwtSecret")]
    pub jwt_secret: String,
}

// -----------------------------------------------------------------------------
// Gateway structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Gateway {
    #[serde(rename = "kind")]
    pub kind: String,
    #[serde(rename = "adminUrl")]
    pub admin_url: String,
    #[serde(rename = "proxyUrl")]
    pub proxy_url: String,
    #[serde(rename = "logRemoteWriteUrl", default)]
    pub log_remote_write_url: Option<String>,
    /// Prefix Kong expects on a route path to treat it as a regex
    /// (`~` on Kong >= 2.x). Left configurable rather than hardcoded
    /// since it has changed across gateway major versions.
    #[serde(rename = "regexPathPrefix", default = "default_regex_path_prefix")]
    pub regex_path_prefix: String,
}

fn default_regex_path_prefix() -> String {
    "~".to_string()
}

// -----------------------------------------------------------------------------
// Server structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Server {
    #[serde(rename = "listen")]
    pub listen: String,
}

// -----------------------------------------------------------------------------
// Controller structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct ControllerConfig {
    #[serde(rename = "workers")]
    pub workers: usize,
    #[serde(rename = "resyncIntervalSeconds")]
    pub resync_interval_seconds: u64,
}

// -----------------------------------------------------------------------------
// Cluster structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Cluster {
    #[serde(rename = "defaultVersion")]
    pub default_version: String,
}

// -----------------------------------------------------------------------------
// Observability structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Observability {
    #[serde(rename = "collectConfigPaths", default)]
    pub collect_config_paths: Vec<PathBuf>,
}

// -----------------------------------------------------------------------------
// Auth structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Auth {
    #[serde(rename = "endpoint")]
    pub endpoint: String,
}

// -----------------------------------------------------------------------------
// ConfigurationError enum

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to load configuration, {0}")]
    Build(ConfigError),
    #[error("failed to deserialize configuration, {0}")]
    Deserialize(ConfigError),
    #[error("failed to set default for key '{0}', {1}")]
    Default(String, ConfigError),
    #[error("failed to retrieve environment variable '{0}', {1}")]
    EnvironmentVariable(&'static str, VarError),
}

// -----------------------------------------------------------------------------
// Sentry structure

#[cfg(feature = "tracker")]
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Sentry {
    #[serde(rename = "dsn")]
    pub dsn: Option<String>,
}

// -----------------------------------------------------------------------------
// Jaeger structure

#[cfg(feature = "trace")]
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
pub struct Jaeger {
    pub endpoint: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

// -----------------------------------------------------------------------------
// Configuration structures

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Configuration {
    #[serde(rename = "store")]
    pub store: Store,
    #[serde(rename = "gateway")]
    pub gateway: Gateway,
    #[serde(rename = "server")]
    pub server: Server,
    #[serde(rename = "controller")]
    pub controller: ControllerConfig,
    #[serde(rename = "cluster")]
    pub cluster: Cluster,
    #[serde(rename = "observability", default = "Default::default")]
    pub observability: Observability,
    #[serde(rename = "auth")]
    pub auth: Auth,
    #[cfg(feature = "tracker")]
    #[serde(rename = "sentry", default = "Default::default")]
    pub sentry: Sentry,
    #[cfg(feature = "trace")]
    #[serde(rename = "jaeger")]
    pub jaeger: Option<Jaeger>,
}

fn defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, Error> {
    builder
        .set_default("store.url", "")
        .map_err(|err| Error::Default("store.url".into(), err))?
        .set_default("store.jwtSecret", "")
        .map_err(|err| Error::Default("store.jwtSecret".into(), err))?
        .set_default("gateway.kind", "none")
        .map_err(|err| Error::Default("gateway.kind".into(), err))?
        .set_default("gateway.adminUrl", "")
        .map_err(|err| Error::Default("gateway.adminUrl".into(), err))?
        .set_default("gateway.proxyUrl", "")
        .map_err(|err| Error::Default("gateway.proxyUrl".into(), err))?
        .set_default("gateway.regexPathPrefix", "~")
        .map_err(|err| Error::Default("gateway.regexPathPrefix".into(), err))?
        .set_default("server.listen", SERVER_LISTEN)
        .map_err(|err| Error::Default("server.listen".into(), err))?
        .set_default("controller.workers", CONTROLLER_WORKERS as i64)
        .map_err(|err| Error::Default("controller.workers".into(), err))?
        .set_default(
            "controller.resyncIntervalSeconds",
            RESYNC_INTERVAL_SECONDS as i64,
        )
        .map_err(|err| Error::Default("controller.resyncIntervalSeconds".into(), err))?
        .set_default("cluster.defaultVersion", "latest")
        .map_err(|err| Error::Default("cluster.defaultVersion".into(), err))?
        .set_default("auth.endpoint", "")
        .map_err(|err| Error::Default("auth.endpoint".into(), err))
}

impl TryFrom<PathBuf> for Configuration {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        defaults(Config::builder())?
            .add_source(Environment::with_prefix(
                &env!("CARGO_PKG_NAME").replace('-', "_"),
            ))
            .add_source(File::from(path).required(true))
            .build()
            .map_err(Error::Build)?
            .try_deserialize()
            .map_err(Error::Deserialize)
    }
}

impl Configuration {
    pub fn try_default() -> Result<Self, Error> {
        defaults(Config::builder())?
            .add_source(Environment::with_prefix(
                &env!("CARGO_PKG_NAME").replace('-', "_"),
            ))
            .add_source(
                File::from(PathBuf::from(format!(
                    "/usr/share/{}/config",
                    env!("CARGO_PKG_NAME")
                )))
                .required(false),
            )
            .add_source(
                File::from(PathBuf::from(format!(
                    "/etc/{}/config",
                    env!("CARGO_PKG_NAME")
                )))
                .required(false),
            )
            .add_source(
                File::from(PathBuf::from(format!(
                    "{}/.config/{}/config",
                    env::var("HOME").map_err(|err| Error::EnvironmentVariable("HOME", err))?,
                    env!("CARGO_PKG_NAME")
                )))
                .required(false),
            )
            .add_source(
                File::from(PathBuf::from(format!(
                    "{}/.local/share/{}/config",
                    env::var("HOME").map_err(|err| Error::EnvironmentVariable("HOME", err))?,
                    env!("CARGO_PKG_NAME")
                )))
                .required(false),
            )
            .add_source(File::from(PathBuf::from("config")).required(false))
            .build()
            .map_err(Error::Build)?
            .try_deserialize()
            .map_err(Error::Deserialize)
    }

    /// Prints a message about missing value for configuration key
    pub fn help(&self) {
        #[cfg(feature = "metrics")]
        info!("Build with 'metrics' feature flag");

        #[cfg(feature = "trace")]
        info!("Build with 'trace' feature flag");

        #[cfg(feature = "tracker")]
        info!("Build with 'tracker' feature flag");

        if self.store.url.is_empty() {
            warn!("Configuration key 'store.url' has an empty value");
        }

        if self.store.jwt_secret.is_empty() {
            warn!("Configuration key 'store.jwtSecret' has an empty value");
        }

        if self.gateway.admin_url.is_empty() && self.gateway.kind != "none" {
            warn!("Configuration key 'gateway.adminUrl' has an empty value");
        }
    }
}
