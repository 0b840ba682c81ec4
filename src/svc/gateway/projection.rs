//! # Projection module
//!
//! Pure, driver-independent half of the gateway projection engine (C7):
//! deterministic object naming and the Service/Route/Plugin derivation
//! rules of spec §4.5. Kept free of any HTTP concern so the rules that
//! decide *what* the gateway should look like can be exercised without
//! a live gateway; `gateway::kong` owns *how* to converge a live Kong
//! instance onto the values computed here.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use url::Url;

use crate::svc::key::Key;

// -----------------------------------------------------------------------------
// Naming

/// First 16 hex characters of the resource `Key`'s SHA-256 digest --
/// stable across reconciliations, collision-free for distinct keys
/// (inherited from `Key`'s own no-collision invariant).
fn hash_key(key: &Key) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_str().as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest).chars().take(16).collect()
}

/// `"neutree-<resource_kind>-" + H(key)`, used for both the Service and
/// the Route backing `key` -- they never collide because a gateway
/// keeps services and routes in separate namespaces (spec §4.5
/// "Naming rule").
pub fn object_name(resource_kind: &str, key: &Key) -> String {
    format!("neutree-{resource_kind}-{}", hash_key(key))
}

/// `"neutree-<role>-" + H(key)`, e.g. `neutree-ai-statistics-<H>` or
/// `neutree-external-endpoint-auth-<H>`.
pub fn plugin_instance_name(role: &str, key: &Key) -> String {
    format!("neutree-{role}-{}", hash_key(key))
}

// -----------------------------------------------------------------------------
// Desired-state types

#[derive(Clone, Debug, PartialEq)]
pub struct DesiredService {
    pub name: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub read_timeout_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesiredRoute {
    pub name: String,
    pub path: String,
    pub protocols: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesiredPlugin {
    pub instance_name: String,
    pub plugin_name: String,
    pub config: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DesiredProjection {
    pub service: DesiredService,
    pub route: DesiredRoute,
    pub plugins: Vec<DesiredPlugin>,
}

impl DesiredProjection {
    pub fn plugin_names(&self) -> BTreeMap<String, ()> {
        self.plugins
            .iter()
            .map(|p| (p.instance_name.clone(), ()))
            .collect()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectionError {
    #[error("failed to parse upstream url '{0}', {1}")]
    InvalidUrl(String, url::ParseError),
}

/// AI-statistics plugin config route-type, chosen by model task for
/// `Endpoint` and taken verbatim from `Spec.RouteType` for
/// `ExternalEndpoint` (spec §4.5 "Plugin set derivation").
pub const ROUTE_TYPE_CHAT_COMPLETIONS: &str = "/v1/chat/completions";
pub const ROUTE_TYPE_EMBEDDINGS: &str = "/v1/embeddings";
pub const ROUTE_TYPE_RERANK: &str = "/v1/rerank";

/// Internal Endpoint Service/Route/Plugin derivation (spec §4.5,
/// scenario S1). `cluster_serve_address` is the already-validated
/// `Cluster.Status.ServeAddress`.
pub fn endpoint_projection(
    key: &Key,
    workspace: &str,
    name: &str,
    route_type: &str,
    cluster_serve_address: &str,
) -> Result<DesiredProjection, ProjectionError> {
    let upstream = Url::parse(cluster_serve_address)
        .map_err(|err| ProjectionError::InvalidUrl(cluster_serve_address.to_string(), err))?;

    let object_name = object_name("endpoint", key);

    let service = DesiredService {
        name: object_name.clone(),
        scheme: upstream.scheme().to_string(),
        host: upstream.host_str().unwrap_or_default().to_string(),
        port: upstream
            .port_or_known_default()
            .unwrap_or(if upstream.scheme() == "https" { 443 } else { 80 }),
        path: format!("/{workspace}/{name}"),
        read_timeout_ms: 60_000 * 60,
    };

    let route = DesiredRoute {
        name: object_name,
        path: format!("/workspace/{workspace}/endpoint/{name}"),
        protocols: vec!["http".to_string(), "https".to_string()],
    };

    let plugins = vec![DesiredPlugin {
        instance_name: plugin_instance_name("ai-statistics", key),
        plugin_name: "ai-statistics".to_string(),
        config: serde_json::json!({"route_type": route_type}),
    }];

    Ok(DesiredProjection { service, route, plugins })
}

/// Header value forwarded by the External Endpoint auth plugin:
/// `"Bearer " + credential` for `bearer`, the credential verbatim for
/// anything else (`api_key` and unknown types alike, spec §4.5).
pub fn external_auth_header_value(auth_type: &str, credential: &str) -> String {
    if auth_type == "bearer" {
        format!("Bearer {credential}")
    } else {
        credential.to_string()
    }
}

/// External Endpoint Service/Route/Plugin derivation (spec §4.5,
/// scenarios S2/S3). `auth_header_value`, when present, is the fully
/// rendered `Authorization` header value computed by
/// `external_auth_header_value`.
pub fn external_endpoint_projection(
    key: &Key,
    workspace: &str,
    name: &str,
    upstream_url: &str,
    route_type: &str,
    timeout_ms: u64,
    auth_header_value: Option<&str>,
) -> Result<DesiredProjection, ProjectionError> {
    let upstream =
        Url::parse(upstream_url).map_err(|err| ProjectionError::InvalidUrl(upstream_url.to_string(), err))?;

    let object_name = object_name("external-endpoint", key);

    let service = DesiredService {
        name: object_name.clone(),
        scheme: upstream.scheme().to_string(),
        host: upstream.host_str().unwrap_or_default().to_string(),
        port: upstream
            .port_or_known_default()
            .unwrap_or(if upstream.scheme() == "https" { 443 } else { 80 }),
        path: {
            let path = upstream.path();
            if path.is_empty() { "/".to_string() } else { path.to_string() }
        },
        read_timeout_ms: timeout_ms,
    };

    let route = DesiredRoute {
        name: object_name,
        path: format!("/workspace/{workspace}/external-endpoint/{name}"),
        protocols: vec!["http".to_string(), "https".to_string()],
    };

    let mut plugins = vec![DesiredPlugin {
        instance_name: plugin_instance_name("ai-statistics", key),
        plugin_name: "ai-statistics".to_string(),
        config: serde_json::json!({"route_type": route_type}),
    }];

    if let Some(header_value) = auth_header_value {
        plugins.push(DesiredPlugin {
            instance_name: plugin_instance_name("external-endpoint-auth", key),
            plugin_name: "request-transformer".to_string(),
            config: serde_json::json!({
                "add": {"headers": [format!("Authorization:{header_value}")]},
                "replace": {"headers": [format!("Authorization:{header_value}")]},
            }),
        });
    }

    Ok(DesiredProjection { service, route, plugins })
}

/// Recursively merge `desired` into `remote`, with `desired` winning on
/// scalar conflicts and nested objects merged key-by-key. Arrays are
/// replaced wholesale by `desired` rather than concatenated -- a plugin
/// config's list fields (e.g. allowed origins) are owned in full by
/// whichever resource last converged them. A `desired` list or scalar
/// only wins when it is non-empty; an empty list or string, or `null`,
/// leaves `remote`'s value in place (spec §4.5 "lists/scalars: desired
/// wins if non-empty") so clearing a field isn't confused with never
/// having set it.
pub fn deep_merge(remote: &serde_json::Value, desired: &serde_json::Value) -> serde_json::Value {
    match (remote, desired) {
        (serde_json::Value::Object(remote_map), serde_json::Value::Object(desired_map)) => {
            let mut merged = remote_map.clone();
            for (key, desired_value) in desired_map {
                let next = match merged.get(key) {
                    Some(remote_value) => deep_merge(remote_value, desired_value),
                    None => desired_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            serde_json::Value::Object(merged)
        }
        (remote, desired) if is_empty_scalar(desired) => remote.clone(),
        (_, desired) => desired.clone(),
    }
}

fn is_empty_scalar(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn object_name_is_stable_and_distinct_per_key() {
        let a = Key::new("w", "endpoint", 1, "n");
        let b = Key::new("w", "endpoint", 2, "n");

        assert_eq!(object_name("endpoint", &a), object_name("endpoint", &a));
        assert_ne!(object_name("endpoint", &a), object_name("endpoint", &b));
    }

    #[test]
    fn service_and_route_share_a_name_across_namespaces() {
        let key = Key::new("w", "endpoint", 1, "n");
        assert_eq!(object_name("endpoint", &key), object_name("endpoint", &key));
    }

    #[test]
    fn endpoint_projection_matches_scenario_s1() {
        let key = Key::new("w", "endpoint", 1, "n");
        let projection =
            endpoint_projection(&key, "w", "n", ROUTE_TYPE_CHAT_COMPLETIONS, "http://cluster-host:9000").unwrap();

        assert_eq!(projection.service.scheme, "http");
        assert_eq!(projection.service.host, "cluster-host");
        assert_eq!(projection.service.port, 9000);
        assert_eq!(projection.service.path, "/w/n");
        assert_eq!(projection.service.read_timeout_ms, 3_600_000);

        assert_eq!(projection.route.path, "/workspace/w/endpoint/n");

        assert_eq!(projection.plugins.len(), 1);
        assert_eq!(
            projection.plugins[0].config,
            json!({"route_type": "/v1/chat/completions"})
        );
    }

    #[test]
    fn external_endpoint_projection_matches_scenario_s2() {
        let key = Key::new("w", "externalendpoint", 1, "n");
        let header = external_auth_header_value("bearer", "sk-xyz");
        let projection = external_endpoint_projection(
            &key,
            "w",
            "n",
            "https://api.openai.com/v1/chat/completions",
            ROUTE_TYPE_CHAT_COMPLETIONS,
            30_000,
            Some(&header),
        )
        .unwrap();

        assert_eq!(projection.service.scheme, "https");
        assert_eq!(projection.service.host, "api.openai.com");
        assert_eq!(projection.service.port, 443);
        assert_eq!(projection.service.path, "/v1/chat/completions");
        assert_eq!(projection.service.read_timeout_ms, 30_000);

        assert_eq!(projection.route.path, "/workspace/w/external-endpoint/n");

        assert_eq!(projection.plugins.len(), 2);
        let auth = projection
            .plugins
            .iter()
            .find(|p| p.plugin_name == "request-transformer")
            .unwrap();
        assert_eq!(
            auth.config,
            json!({
                "add": {"headers": ["Authorization:Bearer sk-xyz"]},
                "replace": {"headers": ["Authorization:Bearer sk-xyz"]},
            })
        );
    }

    #[test]
    fn external_endpoint_projection_without_auth_has_one_plugin() {
        let key = Key::new("w", "externalendpoint", 1, "n");
        let projection = external_endpoint_projection(
            &key,
            "w",
            "n",
            "https://api.openai.com/v1/chat/completions",
            ROUTE_TYPE_CHAT_COMPLETIONS,
            30_000,
            None,
        )
        .unwrap();

        assert_eq!(projection.plugins.len(), 1);
        assert_eq!(projection.plugins[0].plugin_name, "ai-statistics");
    }

    #[test]
    fn non_bearer_auth_forwards_credential_verbatim() {
        assert_eq!(external_auth_header_value("api_key", "raw-key"), "raw-key");
        assert_eq!(external_auth_header_value("unknown", "raw-key"), "raw-key");
        assert_eq!(external_auth_header_value("bearer", "sk-xyz"), "Bearer sk-xyz");
    }

    #[test]
    fn deep_merge_overrides_scalars_and_merges_nested_objects() {
        let remote = json!({"config": {"a": 1, "b": 2}, "enabled": false});
        let desired = json!({"config": {"b": 20, "c": 3}, "enabled": true});

        let merged = deep_merge(&remote, &desired);

        assert_eq!(
            merged,
            json!({"config": {"a": 1, "b": 20, "c": 3}, "enabled": true})
        );
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let remote = json!({"origins": ["a", "b"]});
        let desired = json!({"origins": ["c"]});

        assert_eq!(deep_merge(&remote, &desired), json!({"origins": ["c"]}));
    }

    #[test]
    fn deep_merge_preserves_remote_when_desired_is_empty() {
        let remote = json!({"origins": ["a", "b"], "label": "kept", "note": "kept"});
        let desired = json!({"origins": [], "label": "", "note": null});

        assert_eq!(
            deep_merge(&remote, &desired),
            json!({"origins": ["a", "b"], "label": "kept", "note": "kept"})
        );
    }
}
