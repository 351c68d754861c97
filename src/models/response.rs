//! Response Types
//!
//! Responses shared by every transport route.

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    /// Name of the configured text-generation provider
    pub provider: String,
    /// Model the provider sends requests to
    pub model: String,
}

impl HealthResponse {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: "proof-cascade".to_string(),
            provider: provider.into(),
            model: model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response() {
        let health = HealthResponse::new("deepseek", "deepseek-chat");
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "proof-cascade");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }
}
