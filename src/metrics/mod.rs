//! Prometheus metrics of the agent, exposed by the status server at `/metrics`.


use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;

lazy_static! {
    pub static ref MANIFEST_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("manifest_events_total", "Manifest events handled by the engine"),
        &["event_type"]
    )
    .expect("metric can not be created");

    pub static ref MANIFEST_PARSE_FAILURES: IntCounter = IntCounter::new(
        "manifest_parse_failures_total",
        "Manifest files that could not be read or decoded"
    )
    .expect("metric can not be created");

    pub static ref RUNTIME_SYNC_FAILURES: IntCounter = IntCounter::new(
        "runtime_sync_failures_total",
        "Runtime synchronizations that failed to list sandboxes"
    )
    .expect("metric can not be created");

    pub static ref SANDBOX_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("sandbox_operations_total", "Sandbox start/stop/remove requests by outcome"),
        &["operation", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref WORKLOADS_TRACKED: IntGauge = IntGauge::new(
        "workloads_tracked",
        "Workloads currently held in the store"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("kubeless".to_string()), None)
            .expect("registry can be created");
        register_custom_metrics(&registry);
        registry
    };
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MANIFEST_EVENTS.clone()),
        Box::new(MANIFEST_PARSE_FAILURES.clone()),
        Box::new(RUNTIME_SYNC_FAILURES.clone()),
        Box::new(SANDBOX_OPERATIONS.clone()),
        Box::new(WORKLOADS_TRACKED.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector could not be registered: {}", e);
        }
    }
}

pub(crate) fn record_sandbox_operation(
    operation: &str,
    succeeded: bool,
) {
    let outcome = if succeeded { "ok" } else { "error" };
    SANDBOX_OPERATIONS
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        warn!("metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
