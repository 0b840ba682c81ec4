//! # Engine kind
//!
//! The inference-serving engine image/runtime (e.g. vLLM, TGI) a
//! `Cluster` is configured to run. Engine selection and version pinning
//! is per-kind domain logic out of scope for this core (spec §1); the
//! kind still needs a controller so its lifecycle converges through the
//! same generic machinery as every other managed resource.

use super::opaque::define_opaque_kind;

define_opaque_kind!(Engine, EngineReconciler, "engine");
