use metrics::counter;
use metrics::gauge;
use metrics::histogram;
use metrics::SharedString;

pub(crate) struct Metrics {}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self {}
    }

    pub(crate) fn increment_api_requests(
        &self,
        route: &'static str,
    ) {
        counter!("ethbox_api_requests_total", "route" => route).increment(1);
    }

    pub(crate) fn increment_api_errors(
        &self,
        route: &'static str,
        kind: &str,
    ) {
        let kind = SharedString::from(String::from(kind));
        counter!("ethbox_api_errors_total", "route" => route, "kind" => kind).increment(1);
    }

    pub(crate) fn observe_block_size(
        &self,
        route: &'static str,
        size: usize,
    ) {
        histogram!("ethbox_api_block_size_bytes", "route" => route).record(size as f64);
    }

    pub(crate) fn set_node_online(
        &self,
        online: bool,
    ) {
        gauge!("ethbox_node_online").set(if online { 1.0 } else { 0.0 });
    }
}
