//! Metrics collection for the API service.
//!
//! Each [`ServiceMetrics`] owns its own Prometheus [`Registry`], so several
//! instances (one per test router, for example) never collide on metric
//! names.

use std::sync::Arc;
use std::time::Duration;

use lead_relay_core::{LeadError, LeadOutcome};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: Histogram,

    // Lead processing metrics
    pub leads_received_total: IntCounter,
    pub leads_created_total: IntCounter,
    pub leads_updated_total: IntCounter,
    pub leads_skipped_total: IntCounterVec,
    pub leads_failed_total: IntCounterVec,
    pub lead_processing_duration: Histogram,

    // Security metrics
    pub signature_rejections_total: IntCounter,
    pub authentication_failures_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("lead_relay".to_string()), None)?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status"],
        )?;
        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;

        let leads_received_total =
            IntCounter::new("leads_received_total", "Leads received for processing")?;
        let leads_created_total =
            IntCounter::new("leads_created_total", "Leads that created a contact")?;
        let leads_updated_total =
            IntCounter::new("leads_updated_total", "Leads that updated a contact")?;
        let leads_skipped_total = IntCounterVec::new(
            Opts::new("leads_skipped_total", "Leads skipped without a contact write"),
            &["reason"],
        )?;
        let leads_failed_total = IntCounterVec::new(
            Opts::new("leads_failed_total", "Leads that failed processing"),
            &["category", "transient"],
        )?;
        let lead_processing_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lead_processing_duration_seconds",
                "Time to process one webhook delivery or direct lead",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let signature_rejections_total = IntCounter::new(
            "signature_rejections_total",
            "Webhook deliveries rejected for a bad signature",
        )?;
        let authentication_failures_total = IntCounter::new(
            "authentication_failures_total",
            "Direct lead pushes and handshakes rejected for bad credentials",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(leads_received_total.clone()))?;
        registry.register(Box::new(leads_created_total.clone()))?;
        registry.register(Box::new(leads_updated_total.clone()))?;
        registry.register(Box::new(leads_skipped_total.clone()))?;
        registry.register(Box::new(leads_failed_total.clone()))?;
        registry.register(Box::new(lead_processing_duration.clone()))?;
        registry.register(Box::new(signature_rejections_total.clone()))?;
        registry.register(Box::new(authentication_failures_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            leads_received_total,
            leads_created_total,
            leads_updated_total,
            leads_skipped_total,
            leads_failed_total,
            lead_processing_duration,
            signature_rejections_total,
            authentication_failures_total,
        }))
    }

    pub fn record_http_request(&self, method: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, status.as_str()])
            .inc();
        self.http_request_duration.observe(duration.as_secs_f64());
    }

    /// Count the result of processing one lead
    pub fn record_lead_result(&self, result: &Result<LeadOutcome, LeadError>) {
        match result {
            Ok(LeadOutcome::Created { .. }) => self.leads_created_total.inc(),
            Ok(LeadOutcome::Updated { .. }) => self.leads_updated_total.inc(),
            Ok(LeadOutcome::Skipped { reason }) => self
                .leads_skipped_total
                .with_label_values(&[reason.as_str()])
                .inc(),
            Err(e) => self.record_lead_error(e),
        }
    }

    pub fn record_lead_error(&self, error: &LeadError) {
        let transient = if error.is_transient() { "true" } else { "false" };
        self.leads_failed_total
            .with_label_values(&[error.error_category().as_str(), transient])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
