//! # Resource module
//!
//! The abstract `Resource` handle every managed kind satisfies, realized
//! as a typed trait instead of runtime reflection, so every controller
//! is statically dispatched over its concrete kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::svc::key::Key;

// -----------------------------------------------------------------------------
// Phase lattice

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Pending,
    Running,
    Failed,
    Deleted,
}

// -----------------------------------------------------------------------------
// Metadata structure

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Metadata {
    #[serde(rename = "id")]
    pub id: i64,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "workspace")]
    pub workspace: String,
    #[serde(rename = "labels", default)]
    pub labels: std::collections::BTreeMap<String, String>,
    #[serde(rename = "annotations", default)]
    pub annotations: std::collections::BTreeMap<String, String>,
    #[serde(rename = "kind")]
    pub kind: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(rename = "creationTimestamp", default)]
    pub creation_timestamp: String,
    #[serde(rename = "updateTimestamp", default)]
    pub update_timestamp: String,
    #[serde(rename = "deletionTimestamp", default)]
    pub deletion_timestamp: String,
}

impl Metadata {
    pub fn deleted(&self) -> bool {
        !self.deletion_timestamp.is_empty()
    }
}

// -----------------------------------------------------------------------------
// Status structure

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
pub struct Status {
    #[serde(rename = "phase", default)]
    pub phase: Option<Phase>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
    #[serde(rename = "lastTransitionTime", default)]
    pub last_transition_time: String,
    /// Kind-specific field, e.g. the public URL of an Endpoint or
    /// ExternalEndpoint once the gateway projection has converged.
    #[serde(rename = "serviceUrl", default)]
    pub service_url: Option<String>,
    /// Kind-specific field: a `Cluster`'s discovered serve address
    /// (`scheme://host:port`), consumed by the Endpoint gateway
    /// projection (spec §4.5 "Service derivation"). Unset on every
    /// other kind.
    #[serde(rename = "serveAddress", default)]
    pub serve_address: Option<String>,
}

impl Status {
    pub fn now() -> String {
        Utc::now().to_rfc3339()
    }

    pub fn transition(&mut self, phase: Phase, error: Option<&dyn std::fmt::Display>) {
        self.phase = Some(phase);
        self.error_message = error.map(|err| err.to_string()).unwrap_or_default();
        self.last_transition_time = Self::now();
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

// -----------------------------------------------------------------------------
// Resource trait

/// Typed handle every managed kind satisfies. The engine (C3–C6) is
/// generic over `T: Resource`, dispatched statically per controller --
/// no reflection.
pub trait Resource: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Short, stable tag used to build this kind's `Key`s, e.g.
    /// `"endpoint"`, `"externalendpoint"`, `"cluster"`.
    const KIND_TAG: &'static str;

    fn metadata(&self) -> &Metadata;
    fn metadata_mut(&mut self) -> &mut Metadata;
    fn status(&self) -> &Status;
    fn status_mut(&mut self) -> &mut Status;

    fn key(&self) -> Key {
        let metadata = self.metadata();
        Key::new(
            &metadata.workspace,
            Self::KIND_TAG,
            metadata.id,
            &metadata.name,
        )
    }

    fn deleted(&self) -> bool {
        self.metadata().deleted()
    }
}
