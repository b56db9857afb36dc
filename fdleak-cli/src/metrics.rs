use fdleak_core::{FunctionId, InvocationResponse};
use lazy_static::lazy_static;
use prometheus::{
    histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, IntGaugeVec, Registry,
    TextEncoder,
};

lazy_static! {
    /// Process-wide registry; every metric name gets the `fdleak_` prefix.
    static ref REGISTRY: Registry =
        Registry::new_custom(Some("fdleak".to_string()), None).unwrap_or_default();
}

pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Per-function invocation metrics.
#[derive(Clone)]
pub struct InvocationMetrics {
    invocations: IntCounterVec,
    open_descriptors: IntGaugeVec,
    duration: HistogramVec,
}

impl InvocationMetrics {
    /// Create the metrics and register them with `registry`.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let invocations = IntCounterVec::new(
            opts!("invocations_total", "Total number of invocations by outcome"),
            &["function_id", "outcome"],
        )?;
        let open_descriptors = IntGaugeVec::new(
            opts!(
                "open_descriptors",
                "Descriptors held by the process after the last invocation"
            ),
            &["function_id"],
        )?;
        let duration = HistogramVec::new(
            histogram_opts!(
                "invocation_duration_seconds",
                "Time spent issuing requests in one invocation",
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            ),
            &["function_id"],
        )?;

        registry.register(Box::new(invocations.clone()))?;
        registry.register(Box::new(open_descriptors.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            invocations,
            open_descriptors,
            duration,
        })
    }

    pub fn observe_success(&self, function_id: &FunctionId, response: &InvocationResponse) {
        let id = function_id.as_str();
        self.invocations.with_label_values(&[id, "success"]).inc();
        self.open_descriptors
            .with_label_values(&[id])
            .set(response.report().descriptors().total() as i64);
        self.duration
            .with_label_values(&[id])
            .observe(response.elapsed().as_secs_f64());
    }

    pub fn observe_failure(&self, function_id: &FunctionId) {
        self.invocations
            .with_label_values(&[function_id.as_str(), "failure"])
            .inc();
    }
}

/// Prometheus text exposition of everything in `registry`.
pub fn encode(registry: &Registry) -> String {
    let encoder = TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}
