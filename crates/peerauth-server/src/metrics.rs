use prometheus::{register_counter_with_registry, Counter, Encoder, Registry, TextEncoder};
use std::sync::Arc;

pub struct AuthMetrics {
    pub challenges_issued: Counter,
    pub handshakes_completed: Counter,
    pub bearer_tokens_accepted: Counter,
    pub auth_failures: Counter,
    pub rejected_requests: Counter,
    pub registry: Arc<Registry>,
}

impl AuthMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Arc::new(Registry::new());

        let challenges_issued = register_counter_with_registry!(
            "peerauth_challenges_issued_total",
            "Total number of challenges handed out",
            registry
        )?;

        let handshakes_completed = register_counter_with_registry!(
            "peerauth_handshakes_completed_total",
            "Total number of signed responses accepted",
            registry
        )?;

        let bearer_tokens_accepted = register_counter_with_registry!(
            "peerauth_bearer_tokens_accepted_total",
            "Total number of requests authenticated by bearer token",
            registry
        )?;

        let auth_failures = register_counter_with_registry!(
            "peerauth_auth_failures_total",
            "Total number of credentials that failed verification",
            registry
        )?;

        let rejected_requests = register_counter_with_registry!(
            "peerauth_rejected_requests_total",
            "Total number of requests rejected without a challenge",
            registry
        )?;

        Ok(Self {
            challenges_issued,
            handshakes_completed,
            bearer_tokens_accepted,
            auth_failures,
            rejected_requests,
            registry,
        })
    }

    pub fn export_prometheus(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
