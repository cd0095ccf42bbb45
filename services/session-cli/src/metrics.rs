//! Prometheus recorder for `--metrics`

use api_client::metrics::{REFRESH_DURATION_BUCKETS, REFRESH_DURATION_METRIC};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(REFRESH_DURATION_METRIC.to_string()),
        REFRESH_DURATION_BUCKETS,
    )
}

/// Install the global recorder and return a handle for rendering on exit.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Recorder that is not installed globally.
#[cfg(test)]
fn build_recorder() -> Result<metrics_exporter_prometheus::PrometheusRecorder, BuildError> {
    Ok(builder()?.build_recorder())
}
