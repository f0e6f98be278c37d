use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub const OUTCOME_ISSUED: &str = "issued";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_FAILED: &str = "failed";

#[derive(Clone)]
pub struct TokenMetrics {
    registry: Registry,
    token_requests: IntCounterVec,
}

impl TokenMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let token_requests = IntCounterVec::new(
            Opts::new(
                "token_requests_total",
                "Count of token endpoint requests grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(token_requests.clone()))?;

        Ok(Self {
            registry,
            token_requests,
        })
    }

    /// Classify a token endpoint response by status.
    pub fn outcome_for(status: StatusCode) -> &'static str {
        if status.is_success() {
            OUTCOME_ISSUED
        } else if status.is_client_error() {
            OUTCOME_REJECTED
        } else {
            OUTCOME_FAILED
        }
    }

    pub fn token_request(&self, outcome: &str) {
        self.token_requests.with_label_values(&[outcome]).inc();
    }

    pub fn count(&self, outcome: &str) -> u64 {
        self.token_requests.with_label_values(&[outcome]).get()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_follow_status_class() {
        assert_eq!(TokenMetrics::outcome_for(StatusCode::OK), OUTCOME_ISSUED);
        assert_eq!(TokenMetrics::outcome_for(StatusCode::BAD_REQUEST), OUTCOME_REJECTED);
        assert_eq!(
            TokenMetrics::outcome_for(StatusCode::INTERNAL_SERVER_ERROR),
            OUTCOME_FAILED
        );
    }

    #[test]
    fn counters_are_tracked_per_outcome() {
        let metrics = TokenMetrics::new().unwrap();
        metrics.token_request(OUTCOME_ISSUED);
        metrics.token_request(OUTCOME_ISSUED);
        metrics.token_request(OUTCOME_REJECTED);
        assert_eq!(metrics.count(OUTCOME_ISSUED), 2);
        assert_eq!(metrics.count(OUTCOME_REJECTED), 1);
        assert_eq!(metrics.count(OUTCOME_FAILED), 0);
    }
}
