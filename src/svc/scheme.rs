//! # Scheme module
//!
//! Maps resource kind-name to table name (C2). Rather than a reflection
//! based registry that allocates typed instances per kind name, this is
//! a plain runtime lookup table built once at startup -- the actual
//! typed CRUD dispatch stays static, handled by generics on
//! `Controller<T>` (C5), not by this registry.

use std::collections::BTreeMap;

use serde::Serialize;

// -----------------------------------------------------------------------------
// KindDescriptor

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct KindDescriptor {
    pub kind: &'static str,
    pub table: &'static str,
}

// -----------------------------------------------------------------------------
// Scheme

#[derive(Clone, Debug)]
pub struct Scheme {
    descriptors: BTreeMap<&'static str, KindDescriptor>,
}

impl Default for Scheme {
    fn default() -> Self {
        let mut scheme = Self {
            descriptors: BTreeMap::new(),
        };

        scheme.register("cluster", "clusters");
        scheme.register("engine", "engines");
        scheme.register("endpoint", "endpoints");
        scheme.register("externalendpoint", "external_endpoints");
        scheme.register("apikey", "api_keys");
        scheme.register("role", "roles");
        scheme.register("workspace", "workspaces");
        scheme.register("imageregistry", "image_registries");
        scheme.register("modelregistry", "model_registries");

        scheme
    }
}

impl Scheme {
    pub fn register(&mut self, kind: &'static str, table: &'static str) {
        self.descriptors.insert(kind, KindDescriptor { kind, table });
    }

    pub fn table_for(&self, kind: &str) -> Option<&'static str> {
        self.descriptors.get(kind).map(|d| d.table)
    }

    pub fn descriptors(&self) -> Vec<KindDescriptor> {
        self.descriptors.values().cloned().collect()
    }
}
