//! # Kinds module
//!
//! One submodule per managed resource kind. Each defines a `Spec`
//! (kind-specific desired state) and wires it into the generic
//! `Resource` trait (C1-C6 are oblivious to these types; they only ever
//! see `T: Resource`).
//!
//! `Endpoint` and `ExternalEndpoint` are the two kinds whose reconciler
//! drives the gateway projection engine (C7); `Cluster` carries a
//! concrete spec/status of its own because the Endpoint projection
//! depends on its discovered serve address. The rest (`ApiKey`, `Role`,
//! `Workspace`, `ImageRegistry`, `ModelRegistry`, `Engine`) exist to
//! register a tenant/resource boundary in the object store without a
//! gateway side effect of their own, so they carry an opaque
//! `serde_json::Value` spec and a reconciler that only walks the phase
//! lattice forward.

pub mod apikey;
pub mod cluster;
pub mod endpoint;
pub mod engine;
pub mod external_endpoint;
pub mod image_registry;
pub mod model_registry;
mod opaque;
pub mod role;
pub mod workspace;

pub use apikey::ApiKey;
pub use cluster::Cluster;
pub use endpoint::Endpoint;
pub use engine::Engine;
pub use external_endpoint::ExternalEndpoint;
pub use image_registry::ImageRegistry;
pub use model_registry::ModelRegistry;
pub use role::Role;
pub use workspace::Workspace;
