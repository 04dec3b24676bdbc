//! `openai_project` and `openai_projects` data sources. Both need an admin key.

use super::{computed, computed_list, configure_data_source, read_failed, read_ok, required};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::resources::project::project_state;
use crate::state::{object, required_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::{AttributePath, Dynamic, DynamicValue};

fn project_attributes(id: Attribute) -> Vec<Attribute> {
    vec![
        id,
        computed("object", AttributeType::String, "The object type, which is always organization.project."),
        computed("name", AttributeType::String, "The name of the project."),
        computed(
            "created_at",
            AttributeType::Number,
            "The Unix timestamp (in seconds) of when the project was created.",
        ),
        computed(
            "archived_at",
            AttributeType::Number,
            "The Unix timestamp (in seconds) of when the project was archived.",
        ),
        computed("status", AttributeType::String, "active or archived."),
    ]
}

#[derive(Default)]
pub struct ProjectDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl ProjectDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ProjectDataSource {
    fn type_name(&self) -> &str {
        "openai_project"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = project_attributes(required("id", "The project identifier."))
            .into_iter()
            .fold(
                SchemaBuilder::new().description("Reads an organization project"),
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

        match provider_data.client.projects().retrieve(&id).await {
            Ok(project) => read_ok(project_state(&project)),
            Err(e) => read_failed(request.config, api_error("Failed to read project", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ProjectDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ProjectsDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl ProjectsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ProjectsDataSource {
    fn type_name(&self) -> &str {
        "openai_projects"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Lists the organization's projects")
            .attribute(computed("id", AttributeType::String, "Identifier of this listing."))
            .attribute(
                AttributeBuilder::new("include_archived", AttributeType::Bool)
                    .description("Also return archived projects. Defaults to false.")
                    .optional()
                    .build(),
            )
            .attribute(computed_list(
                "projects",
                project_attributes(computed("id", AttributeType::String, "The project identifier.")),
                "The organization's projects.",
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
        let include_archived = request
            .config
            .get_bool(&AttributePath::new("include_archived"))
            .ok();

        let listed = provider_data
            .client
            .projects()
            .list(include_archived.unwrap_or(false))
            .await;
        match listed {
            Ok(projects) => read_ok(DynamicValue::new(object([
                (
                    "id",
                    if include_archived == Some(true) { "all" } else { "active" }.into(),
                ),
                ("include_archived", include_archived.into()),
                (
                    "projects",
                    Dynamic::List(projects.iter().map(|p| project_state(p).value).collect()),
                ),
            ]))),
            Err(e) => read_failed(request.config, api_error("Failed to list projects", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ProjectsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
