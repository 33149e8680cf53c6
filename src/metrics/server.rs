//! Prometheus endpoint for the duration of a load.
//!
//! A run is a single pass, so the endpoint is bound before the pipeline
//! starts and shut down once it finishes. Scrapers can follow a long load
//! while it is in progress; the final values are logged at shutdown since
//! nothing will scrape them afterwards.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{BindSnafu, MetricsError, PrometheusInitSnafu};

/// A running metrics endpoint.
pub struct MetricsEndpoint {
    addr: SocketAddr,
    handle: PrometheusHandle,
    stop: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl MetricsEndpoint {
    /// Address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving and log the final metric values.
    pub async fn shutdown(self) {
        debug!("Final metrics:\n{}", self.handle.render());
        let _ = self.stop.send(());
        if let Err(e) = self.server.await {
            error!("Metrics server task failed: {}", e);
        }
        info!("Metrics endpoint on {} closed", self.addr);
    }
}

/// Install the Prometheus recorder and serve it on `addr` until
/// [`MetricsEndpoint::shutdown`].
///
/// Binding happens before this returns, so an unusable address fails the
/// run up front. Must be called from within a tokio runtime.
pub async fn init(addr: SocketAddr) -> Result<MetricsEndpoint, MetricsError> {
    let listener = TcpListener::bind(addr).await.context(BindSnafu { addr })?;
    let addr = listener.local_addr().context(BindSnafu { addr })?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    let (stop, stopped) = oneshot::channel();
    let server = tokio::spawn(serve(listener, handle.clone(), stopped));
    info!("Metrics endpoint listening on http://{}/metrics for this run", addr);

    Ok(MetricsEndpoint {
        addr,
        handle,
        stop,
        server,
    })
}

async fn serve(listener: TcpListener, handle: PrometheusHandle, stopped: oneshot::Receiver<()>) {
    let app = Router::new()
        .route("/metrics", get(render))
        .route("/health", get(|| async { "ok\n" }))
        .layer(Extension(handle));

    let shutdown = async {
        let _ = stopped.await;
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Metrics server error: {}", e);
    }
}

async fn render(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}
