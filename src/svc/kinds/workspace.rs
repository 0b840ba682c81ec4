//! # Workspace kind
//!
//! A tenant boundary: clusters, endpoints, registries and roles are
//! addressed relative to the workspace named in their own `Metadata`.

use super::opaque::define_opaque_kind;

define_opaque_kind!(Workspace, WorkspaceReconciler, "workspace");
