//! Metrics exporter and periodic collectors.

mod periodic;
pub use periodic::{BalanceCollector, MetricCollector, spawn_periodic_collectors};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;
use std::{net::SocketAddr, time::Duration};

/// Starts a Prometheus exporter on `metrics_addr`, returning a handle.
///
/// The recorder performs upkeep every 5 seconds. Calling this more than once returns the handle
/// of the first exporter.
pub fn setup_exporter(metrics_addr: impl Into<SocketAddr>) -> eyre::Result<PrometheusHandle> {
    static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

    let mut lock = HANDLE.lock();
    if let Some(handle) = &*lock {
        return Ok(handle.clone());
    }

    let addr: SocketAddr = metrics_addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| eyre::eyre!("could not set metrics recorder"))?;
    tokio::spawn(exporter);

    tracing::info!(target: "relay::metrics", %addr, "Started metrics server");

    *lock = Some(handle.clone());

    Ok(handle)
}
