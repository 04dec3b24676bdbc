//! Test helpers shared by resource and data source tests

use crate::api::test_helpers::test_client;
use crate::api::PollConfig;
use crate::provider_data::{OpenAIProviderData, Polling};
use std::time::Duration;
use tfplug::{AttributePath, Dynamic, DynamicValue};

/// Provider data against a mock server with millisecond polling
pub fn provider_data(url: &str) -> OpenAIProviderData {
    let fast = PollConfig::new(Duration::from_millis(1), Duration::from_secs(5));
    OpenAIProviderData::new(test_client(url)).with_polling(Polling {
        file_delete: fast,
        fine_tune_create: fast,
        fine_tune_wait: fast,
        vector_store_files: fast,
    })
}

/// Builds a state or config value from top level attributes
pub fn value<const N: usize>(fields: [(&str, Dynamic); N]) -> DynamicValue {
    DynamicValue::new(crate::state::object(fields))
}

pub fn string_at(value: &DynamicValue, name: &str) -> String {
    value.get_string(&AttributePath::new(name)).unwrap()
}
