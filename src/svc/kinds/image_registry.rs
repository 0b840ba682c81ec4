//! # ImageRegistry kind
//!
//! Credentials and address of a container image registry clusters pull
//! inference engine images from.

use super::opaque::define_opaque_kind;

define_opaque_kind!(ImageRegistry, ImageRegistryReconciler, "imageregistry");
