use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};

static EVENTS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "inbound_events_processed_total",
            "Inbound event deliveries by final outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create inbound_events_processed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register inbound_events_processed_total");
    counter
});

static DELIVERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "inbound_event_delivery_duration_seconds",
            "Time spent handling one inbound delivery, retries included",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        &["outcome"],
    )
    .expect("failed to create inbound_event_delivery_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register inbound_event_delivery_duration_seconds");
    histogram
});

pub fn observe_delivery(outcome: &str, elapsed: Duration) {
    EVENTS_PROCESSED_TOTAL.with_label_values(&[outcome]).inc();
    DELIVERY_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(elapsed.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
