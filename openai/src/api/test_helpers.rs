//! Test helpers for the OpenAI API

use super::{Client, ClientConfig, RetryConfig};

/// Client against a mock server with both keys set and fast retries
pub fn test_client(url: &str) -> Client {
    Client::new(ClientConfig {
        api_key: Some("sk-test".to_string()),
        admin_key: Some("sk-admin".to_string()),
        base_url: Some(url.to_string()),
        organization_id: None,
        retry: RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        },
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 120);
    }

    #[test]
    fn default_base_url() {
        let client = Client::new(ClientConfig::default()).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }
}
