//! # ModelRegistry kind
//!
//! Credentials and address of a model registry (e.g. a Hugging Face
//! mirror or a private artifact store) an `Endpoint` pulls weights
//! from.

use super::opaque::define_opaque_kind;

define_opaque_kind!(ModelRegistry, ModelRegistryReconciler, "modelregistry");
