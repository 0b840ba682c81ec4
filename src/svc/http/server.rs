//! # Server module
//!
//! This module provides the admin HTTP surface (health checks and, when
//! enabled, a Prometheus exposition endpoint). It never exposes the
//! resource API itself -- the store and gateway are reached by the
//! engine only.

use std::{net::AddrParseError, sync::Arc};

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::svc::{cfg::Configuration, http};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to parse listen address '{0}', {1}")]
    Listen(String, AddrParseError),
    #[error("failed to bind server, {0}")]
    Bind(std::io::Error),
    #[error("failed to serve content, {0}")]
    Serve(std::io::Error),
}

fn router() -> Router {
    let router = Router::new().route("/healthz", get(http::healthz));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(http::metrics::handler));

    router
        .fallback(http::not_found)
        .layer(middleware::from_fn(http::layer::access))
}

#[tracing::instrument(skip(config))]
pub async fn serve(config: Arc<Configuration>) -> Result<(), Error> {
    let addr = config
        .server
        .listen
        .parse()
        .map_err(|err| Error::Listen(config.server.listen.to_owned(), err))?;

    info!("start to listen for http request on {addr}");

    let listener = TcpListener::bind(addr).await.map_err(Error::Bind)?;

    axum::serve(listener, router())
        .await
        .map_err(Error::Serve)
}
