//! `openai_model` and `openai_models` data sources

use super::{computed, computed_list, configure_data_source, read_failed, read_ok, required};
use crate::api::models::Model;
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{object, required_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeType, SchemaBuilder};
use tfplug::{Dynamic, DynamicValue};

fn model_object(model: &Model) -> Dynamic {
    object([
        ("id", model.id.as_str().into()),
        ("created", model.created.into()),
        ("object", model.object.as_str().into()),
        ("owned_by", model.owned_by.as_str().into()),
    ])
}

fn model_attributes(id: Attribute) -> Vec<Attribute> {
    vec![
        id,
        computed(
            "created",
            AttributeType::Number,
            "The Unix timestamp (in seconds) when the model was created.",
        ),
        computed("object", AttributeType::String, "The object type, which is always model."),
        computed("owned_by", AttributeType::String, "The organization that owns the model."),
    ]
}

#[derive(Default)]
pub struct ModelDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl ModelDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ModelDataSource {
    fn type_name(&self) -> &str {
        "openai_model"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = model_attributes(required("id", "The model identifier."))
            .into_iter()
            .fold(
                SchemaBuilder::new().description("Reads a model"),
                |builder, attribute| builder.attribute(attribute),
            )
            .build();
        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return read_failed(request.config, not_configured());
        };
        let id = match required_string(&request.config, "id") {
            Ok(id) => id,
            Err(diag) => return read_failed(request.config, diag),
        };

        match provider_data.client.models().retrieve(&id).await {
            Ok(model) => read_ok(DynamicValue::new(model_object(&model))),
            Err(e) => read_failed(request.config, api_error("Failed to read model", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ModelDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ModelsDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl ModelsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ModelsDataSource {
    fn type_name(&self) -> &str {
        "openai_models"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Lists the models available to the API key")
            .attribute(computed("id", AttributeType::String, "Identifier of this listing."))
            .attribute(computed_list(
                "models",
                model_attributes(computed("id", AttributeType::String, "The model identifier.")),
                "The available models.",
            ))
            .build();
        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return read_failed(request.config, not_configured());
        };

        match provider_data.client.models().list().await {
            Ok(models) => read_ok(DynamicValue::new(object([
                ("id", "models".into()),
                ("models", Dynamic::List(models.iter().map(model_object).collect())),
            ]))),
            Err(e) => read_failed(request.config, api_error("Failed to list models", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ModelsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
