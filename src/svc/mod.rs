//! # Services module
//!
//! This module provides the generic reconciliation engine (work queue,
//! informer, controller runtime, reconciler contract), the gateway
//! projection engine, the resource kinds the engine drives, and the
//! ambient configuration/HTTP/telemetry surface.

pub mod cfg;
pub mod controller;
pub mod gateway;
pub mod http;
pub mod informer;
pub mod kinds;
pub mod key;
pub mod orchestrator;
pub mod queue;
pub mod reconciler;
pub mod resource;
pub mod scheme;
pub mod store;
pub mod telemetry;
