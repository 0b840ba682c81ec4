//! # Role kind
//!
//! A named bundle of permissions assignable within a `Workspace`.

use super::opaque::define_opaque_kind;

define_opaque_kind!(Role, RoleReconciler, "role");
