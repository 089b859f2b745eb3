//! Prometheus exporter setup. Counters and histograms are recorded through the
//! `metrics` facade at their call sites; without an installed recorder they are
//! no-ops.

use std::net::SocketAddr;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

pub const RESOURCES_FETCHED: &str = "dinesafe_resources_fetched_total";
pub const RESOURCE_BYTES: &str = "dinesafe_resource_bytes";
pub const ROWS_NORMALIZED: &str = "dinesafe_rows_normalized_total";
pub const SNAPSHOTS_SAVED: &str = "dinesafe_snapshots_saved_total";
pub const SNAPSHOTS_LOADED: &str = "dinesafe_snapshots_loaded_total";
pub const REFRESH_DURATION: &str = "dinesafe_refresh_duration_seconds";

fn describe_all() {
    describe_counter!(RESOURCES_FETCHED, "Datastore resources downloaded");
    describe_histogram!(RESOURCE_BYTES, Unit::Bytes, "Size of each downloaded resource");
    describe_counter!(ROWS_NORMALIZED, "Rows successfully cast to typed records");
    describe_counter!(SNAPSHOTS_SAVED, "Snapshots written to storage");
    describe_counter!(SNAPSHOTS_LOADED, "Snapshots read from storage");
    describe_histogram!(REFRESH_DURATION, Unit::Seconds, "Wall time of a full refresh");
}

/// Installs the Prometheus recorder with an HTTP listener at `addr`. Must be
/// called from within a tokio runtime.
pub fn init_metrics(addr: Option<&str>) {
    let Some(addr_str) = addr else {
        return;
    };

    let addr: SocketAddr = match addr_str.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics addr '{}': {}", addr_str, e);
            return;
        }
    };

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_all();
            info!("Prometheus HTTP exporter started at http://{}/metrics", addr);
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}
