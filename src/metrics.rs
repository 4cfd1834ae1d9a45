use prometheus::{Counter, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static::lazy_static! {
    // Retrieval pipeline metrics
    pub static ref RETRIEVAL_REQUESTS: Counter = Counter::with_opts(
        Opts::new("candor_retrieval_requests_total", "Total number of bucketed message retrievals")
    ).unwrap();

    pub static ref RETRIEVAL_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("candor_retrieval_duration_seconds", "Time spent serving a bucketed retrieval")
    ).unwrap();

    // Sentiment client metrics
    pub static ref SENTIMENT_BATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("candor_sentiment_batch_duration_seconds", "Time spent on batch sentiment calls")
    ).unwrap();

    pub static ref SENTIMENT_SINGLE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("candor_sentiment_single_duration_seconds", "Time spent on per-text sentiment calls")
    ).unwrap();

    pub static ref SENTIMENT_FALLBACKS: Counter = Counter::with_opts(
        Opts::new("candor_sentiment_fallbacks_total", "Batch attempts abandoned in favor of per-text calls")
    ).unwrap();

    // Inbound traffic metrics
    pub static ref MESSAGES_RECEIVED: Counter = Counter::with_opts(
        Opts::new("candor_messages_received_total", "Anonymous messages accepted")
    ).unwrap();

    pub static ref SUGGESTION_REQUESTS: Counter = Counter::with_opts(
        Opts::new("candor_suggestion_requests_total", "Suggested-question generations attempted")
    ).unwrap();

    pub static ref RATE_LIMIT_REJECTIONS: Counter = Counter::with_opts(
        Opts::new("candor_rate_limit_rejections_total", "Requests rejected by the rate limiter")
    ).unwrap();
}

pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        registry.register(Box::new(RETRIEVAL_REQUESTS.clone())).unwrap();
        registry.register(Box::new(RETRIEVAL_DURATION.clone())).unwrap();
        registry.register(Box::new(SENTIMENT_BATCH_DURATION.clone())).unwrap();
        registry.register(Box::new(SENTIMENT_SINGLE_DURATION.clone())).unwrap();
        registry.register(Box::new(SENTIMENT_FALLBACKS.clone())).unwrap();
        registry.register(Box::new(MESSAGES_RECEIVED.clone())).unwrap();
        registry.register(Box::new(SUGGESTION_REQUESTS.clone())).unwrap();
        registry.register(Box::new(RATE_LIMIT_REJECTIONS.clone())).unwrap();

        Self { registry }
    }

    pub fn gather_metrics(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metric_families).unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
