//! Metric names emitted by the detector

/// Classified queries, labelled by `decision` (`allow` / `refuse`)
pub const QUERIES_TOTAL: &str = "dnstun_queries_total";

/// Inference latency per classified query
pub const INFERENCE_LATENCY_US: &str = "dnstun_inference_latency_us";

/// Failed queries, labelled by error `kind`
pub const ERRORS_TOTAL: &str = "dnstun_errors_total";

/// Register metric descriptions with the installed recorder
pub fn describe() {
    metrics::describe_counter!(QUERIES_TOTAL, "Total number of classified queries by decision");
    metrics::describe_histogram!(
        INFERENCE_LATENCY_US,
        metrics::Unit::Microseconds,
        "Model inference latency in microseconds"
    );
    metrics::describe_counter!(ERRORS_TOTAL, "Total number of failed queries by error kind");
}
