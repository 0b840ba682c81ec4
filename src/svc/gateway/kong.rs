//! # Kong driver
//!
//! Talks to a Kong admin API to converge Service/Route/Plugin objects
//! for `Endpoint`/`ExternalEndpoint` resources (C7). Object names are
//! derived deterministically from the resource `Key` (`gateway::projection`)
//! so repeated convergence of the same resource always touches the
//! same gateway objects, and every write is preceded by a read so an
//! unchanged projection issues no writes at all (spec §4.5
//! "Convergence algorithm", §8 testable property 3).

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use super::{
    projection::{self, DesiredPlugin, DesiredProjection, DesiredRoute, DesiredService},
    GatewayClient, GatewayError,
};
use crate::svc::{cfg::Gateway as GatewayConfig, key::Key};

/// Tag attached to every gateway object this crate creates, so garbage
/// collection never touches objects it did not create.
const MANAGED_TAG: &str = "neutree-core-managed";

pub struct KongDriver {
    http: reqwest::Client,
    admin_url: String,
    proxy_url: String,
    regex_path_prefix: String,
}

impl KongDriver {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            admin_url: config.admin_url.trim_end_matches('/').to_string(),
            proxy_url: config.proxy_url.trim_end_matches('/').to_string(),
            regex_path_prefix: config.regex_path_prefix.clone(),
        })
    }

    fn regex_path(&self, path: &str) -> String {
        format!("{}^{path}", self.regex_path_prefix)
    }

    async fn get_object(&self, collection: &str, name: &str) -> Result<Option<serde_json::Value>, GatewayError> {
        let res = self
            .http
            .get(format!("{}/{collection}/{name}", self.admin_url))
            .send()
            .await?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !res.status().is_success() {
            return Err(GatewayError::UnexpectedStatus(res.status(), "get object"));
        }

        Ok(Some(res.json().await?))
    }

    async fn put_object(&self, collection: &str, name: &str, body: serde_json::Value) -> Result<(), GatewayError> {
        let res = self
            .http
            .put(format!("{}/{collection}/{name}", self.admin_url))
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(GatewayError::UnexpectedStatus(res.status(), "upsert object"));
        }

        Ok(())
    }

    async fn delete_named(&self, url: &str) -> Result<(), GatewayError> {
        let res = self.http.delete(url).send().await?;

        if !res.status().is_success() && res.status() != StatusCode::NOT_FOUND {
            return Err(GatewayError::UnexpectedStatus(res.status(), "delete"));
        }

        Ok(())
    }

    fn service_differs(current: &serde_json::Value, desired: &DesiredService) -> bool {
        current.get("host").and_then(|v| v.as_str()) != Some(desired.host.as_str())
            || current.get("port").and_then(|v| v.as_u64()) != Some(desired.port as u64)
            || current.get("protocol").and_then(|v| v.as_str()) != Some(desired.scheme.as_str())
            || current.get("path").and_then(|v| v.as_str()) != Some(desired.path.as_str())
            || current.get("read_timeout").and_then(|v| v.as_u64()) != Some(desired.read_timeout_ms)
    }

    async fn converge_service(&self, desired: &DesiredService) -> Result<(), GatewayError> {
        let current = self.get_object("services", &desired.name).await?;

        if let Some(current) = &current {
            if !Self::service_differs(current, desired) {
                return Ok(());
            }
        }

        let body = json!({
            "host": desired.host,
            "port": desired.port,
            "protocol": desired.scheme,
            "path": desired.path,
            "read_timeout": desired.read_timeout_ms,
            "tags": [MANAGED_TAG],
        });

        self.put_object("services", &desired.name, body).await
    }

    fn route_differs(&self, current: &serde_json::Value, service_name: &str, desired: &DesiredRoute) -> bool {
        let want_path = self.regex_path(&desired.path);

        let current_path = current
            .get("paths")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_str());
        let current_service_name = current
            .get("service")
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str());

        current_path != Some(want_path.as_str()) || current_service_name != Some(service_name)
    }

    async fn converge_route(&self, service_name: &str, desired: &DesiredRoute) -> Result<(), GatewayError> {
        let current = self.get_object("routes", &desired.name).await?;

        if let Some(current) = &current {
            if !self.route_differs(current, service_name, desired) {
                return Ok(());
            }
        }

        let body = json!({
            "paths": [self.regex_path(&desired.path)],
            "protocols": desired.protocols,
            "service": {"name": service_name},
            "strip_path": true,
            "tags": [MANAGED_TAG],
        });

        self.put_object("routes", &desired.name, body).await
    }

    async fn converge_plugin(&self, route_name: &str, desired: &DesiredPlugin) -> Result<(), GatewayError> {
        let existing = self.get_object(&format!("routes/{route_name}/plugins"), &desired.instance_name).await?;

        let merged = match &existing {
            Some(current) => {
                let current_config = current.get("config").cloned().unwrap_or(serde_json::Value::Null);
                let merged = projection::deep_merge(&current_config, &desired.config);
                if merged == current_config {
                    return Ok(());
                }
                merged
            }
            None => desired.config.clone(),
        };

        let body = json!({
            "name": desired.plugin_name,
            "instance_name": desired.instance_name,
            "config": merged,
            "tags": [MANAGED_TAG],
        });

        self.put_object(&format!("routes/{route_name}/plugins"), &desired.instance_name, body)
            .await
    }

    /// Remove plugins this crate manages on `route_name` that are no
    /// longer present in `desired` (spec §4.5 "Plugin reconciliation at
    /// Route scope").
    async fn gc_orphan_plugins(&self, route_name: &str, desired: &BTreeMap<String, ()>) -> Result<(), GatewayError> {
        let res = self
            .http
            .get(format!("{}/routes/{route_name}/plugins", self.admin_url))
            .send()
            .await?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        if !res.status().is_success() {
            return Err(GatewayError::UnexpectedStatus(res.status(), "list plugins"));
        }

        let body: serde_json::Value = res.json().await?;
        let Some(data) = body.get("data").and_then(|d| d.as_array()) else {
            return Ok(());
        };

        for plugin in data {
            let tagged = plugin
                .get("tags")
                .and_then(|t| t.as_array())
                .map(|tags| tags.iter().any(|t| t.as_str() == Some(MANAGED_TAG)))
                .unwrap_or(false);

            let instance_name = plugin.get("instance_name").and_then(|n| n.as_str()).unwrap_or_default();

            if tagged && !desired.contains_key(instance_name) {
                debug!(route = route_name, plugin = instance_name, "garbage collecting orphaned plugin");
                self.delete_named(&format!(
                    "{}/routes/{route_name}/plugins/{instance_name}",
                    self.admin_url
                ))
                .await?;
            }
        }

        Ok(())
    }

    async fn converge(&self, projection: &DesiredProjection) -> Result<(), GatewayError> {
        self.converge_service(&projection.service).await?;
        self.converge_route(&projection.service.name, &projection.route).await?;

        for plugin in &projection.plugins {
            self.converge_plugin(&projection.route.name, plugin).await?;
        }

        self.gc_orphan_plugins(&projection.route.name, &projection.plugin_names()).await
    }

    async fn teardown(&self, key: &Key, resource_kind: &str) -> Result<(), GatewayError> {
        let name = projection::object_name(resource_kind, key);

        self.delete_named(&format!("{}/routes/{name}", self.admin_url)).await?;
        self.delete_named(&format!("{}/services/{name}", self.admin_url)).await?;

        Ok(())
    }
}

#[async_trait]
impl GatewayClient for KongDriver {
    async fn init(&self) -> Result<(), GatewayError> {
        let res = self.http.get(format!("{}/status", self.admin_url)).send().await?;

        if !res.status().is_success() {
            tracing::warn!(status = %res.status(), "kong admin API did not respond healthy during init");
        }

        Ok(())
    }

    async fn sync_endpoint(&self, projection: &DesiredProjection) -> Result<(), GatewayError> {
        self.converge(projection).await
    }

    async fn delete_endpoint(&self, key: &Key) -> Result<(), GatewayError> {
        self.teardown(key, "endpoint").await
    }

    async fn sync_external_endpoint(&self, projection: &DesiredProjection) -> Result<(), GatewayError> {
        self.converge(projection).await
    }

    async fn delete_external_endpoint(&self, key: &Key) -> Result<(), GatewayError> {
        self.teardown(key, "external-endpoint").await
    }

    fn serve_url(&self, projection: &DesiredProjection) -> String {
        format!("{}{}", self.proxy_url, projection.route.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_path_applies_configured_prefix() {
        let driver = KongDriver {
            http: reqwest::Client::new(),
            admin_url: "http://kong-admin".into(),
            proxy_url: "https://proxy".into(),
            regex_path_prefix: "~".into(),
        };

        assert_eq!(driver.regex_path("/workspace/w/endpoint/n"), "~^/workspace/w/endpoint/n");
    }

    #[test]
    fn serve_url_joins_proxy_base_and_route_path() {
        let driver = KongDriver {
            http: reqwest::Client::new(),
            admin_url: "http://kong-admin".into(),
            proxy_url: "https://proxy".into(),
            regex_path_prefix: "~".into(),
        };

        let key = Key::new("w", "endpoint", 1, "n");
        let projection =
            projection::endpoint_projection(&key, "w", "n", "/v1/chat/completions", "http://cluster:9000").unwrap();

        assert_eq!(driver.serve_url(&projection), "https://proxy/workspace/w/endpoint/n");
    }

    #[test]
    fn service_differs_detects_changed_fields() {
        let desired = DesiredService {
            name: "neutree-endpoint-abc".into(),
            scheme: "http".into(),
            host: "cluster-host".into(),
            port: 9000,
            path: "/w/n".into(),
            read_timeout_ms: 3_600_000,
        };

        let matching = json!({"host": "cluster-host", "port": 9000, "protocol": "http", "path": "/w/n", "read_timeout": 3_600_000});
        assert!(!KongDriver::service_differs(&matching, &desired));

        let changed = json!({"host": "other-host", "port": 9000, "protocol": "http", "path": "/w/n", "read_timeout": 3_600_000});
        assert!(KongDriver::service_differs(&changed, &desired));
    }
}
