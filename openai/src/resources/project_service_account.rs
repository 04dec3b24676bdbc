//! Project service account resource implementation

use crate::api::projects::{CreatedServiceAccount, ServiceAccount};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{carry, object, required_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_split_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::{AttributePath, Dynamic, DynamicValue};

#[derive(Default)]
pub struct ProjectServiceAccountResource {
    provider_data: Option<OpenAIProviderData>,
}

impl ProjectServiceAccountResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn service_account_state(
    project_id: &str,
    account: &ServiceAccount,
    api_key: Dynamic,
) -> DynamicValue {
    DynamicValue::new(object([
        ("id", account.id.as_str().into()),
        ("project_id", project_id.into()),
        ("object", account.object.as_str().into()),
        ("name", account.name.as_str().into()),
        ("role", account.role.as_str().into()),
        ("created_at", account.created_at.into()),
        ("api_key", api_key),
    ]))
}

fn created_state(project_id: &str, created: &CreatedServiceAccount) -> DynamicValue {
    let key = &created.api_key;
    let api_key = object([
        ("id", key.id.as_str().into()),
        ("object", key.object.as_str().into()),
        ("name", key.name.clone().into()),
        ("value", key.value.as_str().into()),
        ("created_at", key.created_at.into()),
    ]);
    let account = ServiceAccount {
        id: created.id.clone(),
        object: created.object.clone(),
        name: created.name.clone(),
        role: created.role.clone(),
        created_at: created.created_at,
    };
    service_account_state(project_id, &account, api_key)
}

#[async_trait]
impl Resource for ProjectServiceAccountResource {
    fn type_name(&self) -> &str {
        "openai_project_service_account"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let computed = |name: &str, ty: AttributeType, description: &str| {
            AttributeBuilder::new(name, ty)
                .description(description)
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build()
        };

        let schema = SchemaBuilder::new()
            .description("Manages a service account of a project. Requires an admin key.")
            .attribute(computed(
                "id",
                AttributeType::String,
                "The identifier, which can be referenced in API endpoints.",
            ))
            .attribute(
                AttributeBuilder::new("project_id", AttributeType::String)
                    .description("The ID of the project the service account belongs to.")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the service account.")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(computed(
                "object",
                AttributeType::String,
                "The object type, which is always organization.project.service_account.",
            ))
            .attribute(computed(
                "role",
                AttributeType::String,
                "owner or member.",
            ))
            .attribute(computed(
                "created_at",
                AttributeType::Number,
                "The Unix timestamp (in seconds) of when the service account was created.",
            ))
            .attribute(
                AttributeBuilder::nested(
                    "api_key",
                    NestedType::single(vec![
                        computed("id", AttributeType::String, "The API key identifier."),
                        computed("object", AttributeType::String, "The object type."),
                        computed("name", AttributeType::String, "The name of the API key."),
                        AttributeBuilder::new("value", AttributeType::String)
                            .description("The API key. Only available right after creation.")
                            .computed()
                            .sensitive()
                            .plan_modifier(UseStateForUnknown::create())
                            .build(),
                        computed(
                            "created_at",
                            AttributeType::Number,
                            "The Unix timestamp (in seconds) of when the key was created.",
                        ),
                    ]),
                )
                .description("The API key created together with the service account.")
                .computed()
                .plan_modifier(UseStateForUnknown::create())
                .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let (project_id, name) = match (
            required_string(&request.planned_state, "project_id"),
            required_string(&request.planned_state, "name"),
        ) {
            (Ok(project_id), Ok(name)) => (project_id, name),
            (Err(diag), _) | (_, Err(diag)) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Creating service account {} in project {}", name, project_id);
        let result = provider_data
            .client
            .projects()
            .service_accounts(&project_id)
            .create(&name)
            .await;
        match result {
            Ok(created) => CreateResourceResponse {
                new_state: created_state(&project_id, &created),
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to create project service account", &e)],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
                private: request.private,
                deferred: None,
            };
        };
        let (Ok(project_id), Ok(id)) = (
            required_string(&request.current_state, "project_id"),
            required_string(&request.current_state, "id"),
        ) else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            };
        };

        let result = provider_data
            .client
            .projects()
            .service_accounts(&project_id)
            .retrieve(&id)
            .await;
        match result {
            // The key value is only returned on creation.
            Ok(account) => ReadResourceResponse {
                new_state: Some(service_account_state(
                    &project_id,
                    &account,
                    carry(&request.current_state, "api_key"),
                )),
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read project service account", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    /// Both arguments force replacement; nothing can change in place.
    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: request.planned_private,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };
        let (project_id, id) = match (
            required_string(&request.prior_state, "project_id"),
            required_string(&request.prior_state, "id"),
        ) {
            (Ok(project_id), Ok(id)) => (project_id, id),
            (Err(diag), _) | (_, Err(diag)) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Deleting service account {} from project {}", id, project_id);
        let result = provider_data
            .client
            .projects()
            .service_accounts(&project_id)
            .delete(&id)
            .await;
        let diagnostics = match result {
            Ok(_) => vec![],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![api_error("Failed to delete project service account", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

    /// Imported with `<project_id>/<service_account_id>`
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };
        import_state_split_id(
            &ctx,
            '/',
            &[AttributePath::new("project_id"), AttributePath::new("id")],
            &request,
            &mut response,
        );
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for ProjectServiceAccountResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let diagnostics = match OpenAIProviderData::from_any(request.provider_data) {
            Ok(data) => {
                self.provider_data = data;
                vec![]
            }
            Err(diag) => vec![diag],
        };
        ConfigureResourceResponse { diagnostics }
    }
}
