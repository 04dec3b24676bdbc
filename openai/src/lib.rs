pub mod api;
pub mod data_sources;
pub mod provider_data;
pub mod resources;
pub mod state;

#[cfg(test)]
mod test_helpers;

use async_trait::async_trait;
use provider_data::{OpenAIProviderData, Polling};
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderSchemaRequest, ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::{AttributePath, Diagnostic, DynamicValue};

pub struct OpenAIProvider {
    polling: Polling,
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAIProvider {
    pub fn new() -> Self {
        Self {
            polling: Polling::default(),
        }
    }

    /// Overrides the poll intervals and deadlines handed to resources
    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }
}

/// Reads a provider setting, falling back to the environment when the
/// attribute is null or empty. Unknown values cannot be resolved yet.
fn setting(config: &DynamicValue, name: &str, env: &str) -> Result<Option<String>, Diagnostic> {
    let path = AttributePath::new(name);
    if config.is_unknown_at(&path) {
        return Err(Diagnostic::error(
            format!("Unknown OpenAI {}", name),
            format!(
                "The provider cannot create the OpenAI API client as there is an unknown configuration value for {}. \
                 Either set the value statically in the configuration, or use the {} environment variable.",
                name, env
            ),
        )
        .with_attribute(path));
    }

    Ok(config
        .get_string(&path)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env).ok().filter(|v| !v.is_empty())))
}

fn resource<R>() -> ResourceFactory
where
    R: ResourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(R::default()) as Box<dyn ResourceWithConfigure>)
}

fn data_source<D>() -> DataSourceFactory
where
    D: DataSourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(D::default()) as Box<dyn DataSourceWithConfigure>)
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn type_name(&self) -> &str {
        "openai"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Interact with the OpenAI API")
            .attribute(
                AttributeBuilder::new("api_key", AttributeType::String)
                    .description("Project API key. May also be provided via the OPENAI_API_KEY environment variable.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("admin_key", AttributeType::String)
                    .description("Admin API key for organization endpoints. May also be provided via the OPENAI_ADMIN_KEY environment variable.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("base_url", AttributeType::String)
                    .description("Base URL of the API. May also be provided via the OPENAI_BASE_URL environment variable.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("organization_id", AttributeType::String)
                    .description("Organization sent with every request. May also be provided via the OPENAI_ORGANIZATION_ID environment variable.")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = &request.config;
        let settings = [
            ("api_key", "OPENAI_API_KEY"),
            ("admin_key", "OPENAI_ADMIN_KEY"),
            ("base_url", "OPENAI_BASE_URL"),
            ("organization_id", "OPENAI_ORGANIZATION_ID"),
        ]
        .map(|(name, env)| setting(config, name, env));

        let diagnostics: Vec<Diagnostic> = settings
            .iter()
            .filter_map(|s| s.as_ref().err().cloned())
            .collect();
        if !diagnostics.is_empty() {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        }
        let [api_key, admin_key, base_url, organization_id] =
            settings.map(|s| s.unwrap_or_default());

        if api_key.is_none() && admin_key.is_none() {
            tracing::warn!("Neither api_key nor admin_key is set; API calls will fail");
        }
        tracing::info!(
            "Configuring OpenAI provider for {} (terraform {})",
            base_url.as_deref().unwrap_or(api::DEFAULT_BASE_URL),
            request.terraform_version
        );

        let client = api::Client::new(api::ClientConfig {
            api_key,
            admin_key,
            base_url,
            organization_id,
            ..Default::default()
        });
        match client {
            Ok(client) => ConfigureProviderResponse {
                diagnostics: vec![],
                provider_data: Some(Arc::new(
                    OpenAIProviderData::new(client).with_polling(self.polling),
                )),
            },
            Err(e) => ConfigureProviderResponse {
                diagnostics: vec![Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                )
                .with_attribute(AttributePath::new("base_url"))],
                provider_data: None,
            },
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        HashMap::from([
            ("openai_assistant".to_string(), resource::<resources::AssistantResource>()),
            ("openai_file".to_string(), resource::<resources::FileResource>()),
            (
                "openai_finetuning_job".to_string(),
                resource::<resources::FineTuningJobResource>(),
            ),
            ("openai_project".to_string(), resource::<resources::ProjectResource>()),
            (
                "openai_project_service_account".to_string(),
                resource::<resources::ProjectServiceAccountResource>(),
            ),
            (
                "openai_vector_store".to_string(),
                resource::<resources::VectorStoreResource>(),
            ),
        ])
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        use data_sources::*;

        HashMap::from([
            ("openai_file".to_string(), data_source::<FileDataSource>()),
            ("openai_files".to_string(), data_source::<FilesDataSource>()),
            (
                "openai_finetuning_job".to_string(),
                data_source::<FineTuningJobDataSource>(),
            ),
            (
                "openai_finetuning_jobs".to_string(),
                data_source::<FineTuningJobsDataSource>(),
            ),
            ("openai_model".to_string(), data_source::<ModelDataSource>()),
            ("openai_models".to_string(), data_source::<ModelsDataSource>()),
            ("openai_project".to_string(), data_source::<ProjectDataSource>()),
            ("openai_projects".to_string(), data_source::<ProjectsDataSource>()),
            (
                "openai_project_service_account".to_string(),
                data_source::<ProjectServiceAccountDataSource>(),
            ),
            (
                "openai_project_service_accounts".to_string(),
                data_source::<ProjectServiceAccountsDataSource>(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::ClientCapabilities;
    use tfplug::Dynamic;

    const ENV_VARS: [&str; 4] = [
        "OPENAI_API_KEY",
        "OPENAI_ADMIN_KEY",
        "OPENAI_BASE_URL",
        "OPENAI_ORGANIZATION_ID",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn configure_request(config: DynamicValue) -> ConfigureProviderRequest {
        ConfigureProviderRequest {
            terraform_version: "1.9.0".to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    fn configured_client(response: &ConfigureProviderResponse) -> Arc<api::Client> {
        let data = OpenAIProviderData::from_any(response.provider_data.clone())
            .unwrap()
            .unwrap();
        data.client
    }

    #[tokio::test]
    #[serial]
    async fn configure_prefers_config_over_environment() {
        clear_env();
        std::env::set_var("OPENAI_BASE_URL", "https://env.example.com/v1");

        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("base_url"), "https://config.example.com/v1")
            .unwrap();
        config.set_string(&AttributePath::new("api_key"), "sk-config").unwrap();

        let response = OpenAIProvider::new()
            .configure(Context::new(), configure_request(config))
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            configured_client(&response).base_url(),
            "https://config.example.com/v1"
        );
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn configure_falls_back_to_environment() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "sk-env");
        std::env::set_var("OPENAI_BASE_URL", "https://env.example.com/v1");

        let response = OpenAIProvider::new()
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(configured_client(&response).base_url(), "https://env.example.com/v1");
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn configure_uses_default_base_url() {
        clear_env();
        let response = OpenAIProvider::new()
            .configure(Context::new(), configure_request(DynamicValue::object()))
            .await;
        assert!(response.diagnostics.is_empty());
        assert_eq!(configured_client(&response).base_url(), api::DEFAULT_BASE_URL);
    }

    #[tokio::test]
    #[serial]
    async fn configure_rejects_unknown_keys() {
        clear_env();
        let mut config = DynamicValue::object();
        config.mark_unknown(&AttributePath::new("api_key")).unwrap();
        config.mark_unknown(&AttributePath::new("admin_key")).unwrap();

        let response = OpenAIProvider::new()
            .configure(Context::new(), configure_request(config))
            .await;
        assert!(response.provider_data.is_none());
        assert_eq!(response.diagnostics.len(), 2);
        assert_eq!(response.diagnostics[0].summary, "Unknown OpenAI api_key");
        assert_eq!(
            response.diagnostics[1].attribute,
            Some(AttributePath::new("admin_key"))
        );
    }

    #[tokio::test]
    #[serial]
    async fn configure_rejects_invalid_base_url() {
        clear_env();
        let config = DynamicValue::new(Dynamic::Map(HashMap::from([(
            "base_url".to_string(),
            Dynamic::from("not a url"),
        )])));

        let response = OpenAIProvider::new()
            .configure(Context::new(), configure_request(config))
            .await;
        assert!(response.provider_data.is_none());
        assert_eq!(response.diagnostics[0].summary, "Failed to create API client");
    }

    #[test]
    fn registers_every_component() {
        let provider = OpenAIProvider::new();
        let resources = provider.resources();
        assert_eq!(resources.len(), 6);
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name.as_str());
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 10);
        for (name, factory) in &data_sources {
            assert_eq!(factory().type_name(), name.as_str());
        }
    }
}
