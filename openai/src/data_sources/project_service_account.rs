//! `openai_project_service_account` and `openai_project_service_accounts`
//! data sources

use super::{computed, computed_list, configure_data_source, read_failed, read_ok, required};
use crate::api::projects::ServiceAccount;
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

fn account_object(account: &ServiceAccount) -> Dynamic {
    object([
        ("id", account.id.as_str().into()),
        ("object", account.object.as_str().into()),
        ("name", account.name.as_str().into()),
        ("role", account.role.as_str().into()),
        ("created_at", account.created_at.into()),
    ])
}

fn account_attributes(id: Attribute) -> Vec<Attribute> {
    vec![
        id,
        computed(
            "object",
            AttributeType::String,
            "The object type, which is always organization.project.service_account.",
        ),
        computed("name", AttributeType::String, "The name of the service account."),
        computed("role", AttributeType::String, "owner or member."),
        computed(
            "created_at",
            AttributeType::Number,
            "The Unix timestamp (in seconds) of when the service account was created.",
        ),
    ]
}

#[derive(Default)]
pub struct ProjectServiceAccountDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl ProjectServiceAccountDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ProjectServiceAccountDataSource {
    fn type_name(&self) -> &str {
        "openai_project_service_account"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = account_attributes(required("id", "The service account identifier."))
            .into_iter()
            .fold(
                SchemaBuilder::new()
                    .description("Reads a project service account")
                    .attribute(required("project_id", "The project the service account belongs to.")),
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
        let ids = required_string(&request.config, "project_id")
            .and_then(|project_id| Ok((project_id, required_string(&request.config, "id")?)));
        let (project_id, id) = match ids {
            Ok(ids) => ids,
            Err(diag) => return read_failed(request.config, diag),
        };

        let retrieved = provider_data
            .client
            .projects()
            .service_accounts(&project_id)
            .retrieve(&id)
            .await;
        match retrieved {
            Ok(account) => {
                let mut state = DynamicValue::new(account_object(&account));
                // Setting a top level attribute on an object value cannot fail.
                let _ = state.set_string(&tfplug::AttributePath::new("project_id"), project_id);
                read_ok(state)
            }
            Err(e) => read_failed(
                request.config,
                api_error("Failed to read project service account", &e),
            ),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ProjectServiceAccountDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct ProjectServiceAccountsDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl ProjectServiceAccountsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ProjectServiceAccountsDataSource {
    fn type_name(&self) -> &str {
        "openai_project_service_accounts"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Lists the service accounts of a project")
            .attribute(computed("id", AttributeType::String, "Identifier of this listing."))
            .attribute(required("project_id", "The project to list service accounts for."))
            .attribute(computed_list(
                "project_service_accounts",
                account_attributes(computed(
                    "id",
                    AttributeType::String,
                    "The service account identifier.",
                )),
                "The project's service accounts.",
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
        let project_id = match required_string(&request.config, "project_id") {
            Ok(project_id) => project_id,
            Err(diag) => return read_failed(request.config, diag),
        };

        let listed = provider_data
            .client
            .projects()
            .service_accounts(&project_id)
            .list()
            .await;
        match listed {
            Ok(accounts) => read_ok(DynamicValue::new(object([
                ("id", project_id.as_str().into()),
                ("project_id", project_id.as_str().into()),
                (
                    "project_service_accounts",
                    Dynamic::List(accounts.iter().map(account_object).collect()),
                ),
            ]))),
            Err(e) => read_failed(
                request.config,
                api_error("Failed to list project service accounts", &e),
            ),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ProjectServiceAccountsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{provider_data, string_at, value};
    use mockito::{Matcher, Server};
    use tfplug::AttributePath;

    fn read_request(config: DynamicValue) -> ReadDataSourceRequest {
        ReadDataSourceRequest {
            type_name: String::new(),
            config,
            provider_meta: None,
            client_capabilities: Default::default(),
        }
    }

    #[tokio::test]
    async fn reads_service_account() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/organization/projects/proj_1/service_accounts/svc_1")
            .with_body(r#"{"id":"svc_1","object":"organization.project.service_account","name":"ci","role":"member","created_at":1700000000}"#)
            .create_async()
            .await;

        let data_source = ProjectServiceAccountDataSource {
            provider_data: Some(provider_data(&server.url())),
        };
        let response = data_source
            .read(
                Context::new(),
                read_request(value([("project_id", "proj_1".into()), ("id", "svc_1".into())])),
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.state, "project_id"), "proj_1");
        assert_eq!(string_at(&response.state, "role"), "member");
    }

    #[tokio::test]
    async fn missing_project_id_is_reported() {
        let data_source = ProjectServiceAccountsDataSource {
            provider_data: Some(provider_data("http://127.0.0.1:1")),
        };
        let response = data_source
            .read(Context::new(), read_request(DynamicValue::object()))
            .await;
        assert_eq!(response.diagnostics[0].summary, "Missing project_id");
    }

    #[tokio::test]
    async fn lists_service_accounts() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/organization/projects/proj_1/service_accounts")
            .match_query(Matcher::Any)
            .with_body(r#"{"object":"list","data":[{"id":"svc_1","object":"organization.project.service_account","name":"ci","role":"member","created_at":1}],"has_more":false}"#)
            .create_async()
            .await;

        let data_source = ProjectServiceAccountsDataSource {
            provider_data: Some(provider_data(&server.url())),
        };
        let response = data_source
            .read(Context::new(), read_request(value([("project_id", "proj_1".into())])))
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.state, "id"), "proj_1");
        assert_eq!(
            response
                .state
                .get_string(
                    &AttributePath::new("project_service_accounts")
                        .index(0)
                        .attribute("name")
                )
                .unwrap(),
            "ci"
        );
    }
}
