//! Project resource implementation. Projects are archived rather than
//! deleted, and an archived project is treated as gone.

use crate::api::projects::{Project, STATUS_ARCHIVED};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{object, required_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::validator::StringLengthValidator;
use tfplug::{AttributePath, Dynamic, DynamicValue};

#[derive(Default)]
pub struct ProjectResource {
    provider_data: Option<OpenAIProviderData>,
}

impl ProjectResource {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn project_state(project: &Project) -> DynamicValue {
    DynamicValue::new(object([
        ("id", project.id.as_str().into()),
        ("object", project.object.as_str().into()),
        ("name", project.name.as_str().into()),
        ("created_at", project.created_at.into()),
        ("archived_at", project.archived_at.into()),
        ("status", project.status.as_str().into()),
    ]))
}

#[async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &str {
        "openai_project"
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
            .description("Manages an organization project. Requires an admin key.")
            .attribute(computed(
                "id",
                AttributeType::String,
                "The identifier, which can be referenced in API endpoints.",
            ))
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the project. This appears in reporting.")
                    .required()
                    .validator(StringLengthValidator::between(1, 255))
                    .build(),
            )
            .attribute(computed(
                "object",
                AttributeType::String,
                "The object type, which is always organization.project.",
            ))
            .attribute(computed(
                "created_at",
                AttributeType::Number,
                "The Unix timestamp (in seconds) of when the project was created.",
            ))
            .attribute(computed(
                "archived_at",
                AttributeType::Number,
                "The Unix timestamp (in seconds) of when the project was archived or null.",
            ))
            .attribute(computed(
                "status",
                AttributeType::String,
                "active or archived.",
            ))
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
        let name = match required_string(&request.planned_state, "name") {
            Ok(name) => name,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Creating project {}", name);
        match provider_data.client.projects().create(&name).await {
            Ok(project) => CreateResourceResponse {
                new_state: project_state(&project),
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to create project", &e)],
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
        let Ok(id) = required_string(&request.current_state, "id") else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            };
        };

        match provider_data.client.projects().retrieve(&id).await {
            Ok(project) if project.status == STATUS_ARCHIVED => {
                tracing::warn!("Project {} is archived, removing from state", id);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Ok(project) => ReadResourceResponse {
                new_state: Some(project_state(&project)),
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
                diagnostics: vec![api_error("Failed to read project", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let (id, name) = match (
            required_string(&request.prior_state, "id"),
            required_string(&request.planned_state, "name"),
        ) {
            (Ok(id), Ok(name)) => (id, name),
            (Err(diag), _) | (_, Err(diag)) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Renaming project {} to {}", id, name);
        match provider_data.client.projects().modify(&id, &name).await {
            Ok(project) => UpdateResourceResponse {
                new_state: project_state(&project),
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update project", &e)],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };
        let id = match required_string(&request.prior_state, "id") {
            Ok(id) => id,
            Err(diag) => return DeleteResourceResponse { diagnostics: vec![diag] },
        };

        tracing::info!("Archiving project {}", id);
        let diagnostics = match provider_data.client.projects().archive(&id).await {
            Ok(_) => vec![],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![api_error("Failed to archive project", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }

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
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[async_trait]
impl ResourceWithConfigure for ProjectResource {
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
