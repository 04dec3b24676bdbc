//! Provider data structure passed to resources and data sources

use crate::api::{Client, PollConfig};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tfplug::Diagnostic;

/// Intervals and deadlines for the operations that have to wait on the API
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    /// Deleting a file the API still uses answers 409 until it is released
    pub file_delete: PollConfig,
    /// Job creation answers 400 until the training file is processed
    pub fine_tune_create: PollConfig,
    /// Waiting for a job to finish when `wait = true`
    pub fine_tune_wait: PollConfig,
    /// Waiting for vector store file ingestion
    pub vector_store_files: PollConfig,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            file_delete: PollConfig::new(Duration::from_secs(5), Duration::from_secs(20 * 60)),
            fine_tune_create: PollConfig::new(
                Duration::from_secs(10),
                Duration::from_secs(100 * 60 * 60),
            ),
            fine_tune_wait: PollConfig::new(
                Duration::from_secs(30),
                Duration::from_secs(100 * 60 * 60),
            ),
            vector_store_files: PollConfig::new(
                Duration::from_secs(5),
                Duration::from_secs(60 * 60),
            ),
        }
    }
}

#[derive(Clone)]
pub struct OpenAIProviderData {
    pub client: Arc<Client>,
    pub polling: Polling,
}

impl OpenAIProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            polling: Polling::default(),
        }
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    /// Recovers the provider data handed to a resource or data source.
    /// `Ok(None)` when the provider has not been configured yet.
    pub fn from_any(data: Option<Arc<dyn Any + Send + Sync>>) -> Result<Option<Self>, Diagnostic> {
        let Some(data) = data else {
            return Ok(None);
        };
        data.downcast_ref::<OpenAIProviderData>()
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract OpenAIProviderData from provider data",
                )
            })
    }
}

pub fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "The provider has not been configured. Ensure the provider block is present and valid.",
    )
}

/// Wraps an API failure into an error diagnostic
pub fn api_error(summary: impl Into<String>, error: &crate::api::ApiError) -> Diagnostic {
    Diagnostic::error(summary, format!("API error: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientConfig;

    #[test]
    fn downcasts_provider_data() {
        let data = OpenAIProviderData::new(Client::new(ClientConfig::default()).unwrap());
        let any: Arc<dyn Any + Send + Sync> = Arc::new(data);
        assert!(OpenAIProviderData::from_any(Some(any)).unwrap().is_some());
        assert!(OpenAIProviderData::from_any(None).unwrap().is_none());

        let wrong: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
        assert!(OpenAIProviderData::from_any(Some(wrong)).is_err());
    }

    #[test]
    fn default_polling_deadlines() {
        let polling = Polling::default();
        assert_eq!(polling.file_delete.timeout, Duration::from_secs(1200));
        assert_eq!(polling.vector_store_files.timeout, Duration::from_secs(3600));
    }
}
