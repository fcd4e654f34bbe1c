use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus text exposition of the status API's registry.
pub async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
