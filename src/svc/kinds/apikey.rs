//! # ApiKey kind
//!
//! A credential handed out to callers of the gateway, or referenced by
//! an `ExternalEndpoint` as the upstream credential it forwards.

use super::opaque::define_opaque_kind;

define_opaque_kind!(ApiKey, ApiKeyReconciler, "apikey");
