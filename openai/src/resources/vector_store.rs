//! Vector store resource implementation
//!
//! Creation returns before the attached files are processed, so create
//! polls the store until no file is in progress and fails when any file
//! did not complete.

use crate::api::vector_stores::{
    CreateVectorStoreRequest, ExpiresAfter, ModifyVectorStoreRequest, VectorStore,
};
use crate::api::{retry_until, Poll};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{carry, object, required_string, string_list, string_map};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplace, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::validator::{ListLengthValidator, NumberRangeValidator, StringOneOfValidator};
use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue};

#[derive(Default)]
pub struct VectorStoreResource {
    provider_data: Option<OpenAIProviderData>,
}

impl VectorStoreResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `known` is the plan or prior state the API object replaces.
fn vector_store_state(store: &VectorStore, file_ids: Dynamic, known: &DynamicValue) -> DynamicValue {
    let counts = &store.file_counts;
    let expires_after = store
        .expires_after
        .as_ref()
        .map(|e| {
            object([
                ("anchor", e.anchor.as_str().into()),
                ("days", e.days.into()),
            ])
        })
        .unwrap_or(Dynamic::Null);

    DynamicValue::new(object([
        ("id", store.id.as_str().into()),
        ("object", store.object.as_str().into()),
        ("created_at", store.created_at.into()),
        ("name", store.name.clone().into()),
        ("file_ids", file_ids),
        ("usage_bytes", store.usage_bytes.into()),
        (
            "file_counts",
            object([
                ("in_progress", counts.in_progress.into()),
                ("completed", counts.completed.into()),
                ("failed", counts.failed.into()),
                ("cancelled", counts.cancelled.into()),
                ("total", counts.total.into()),
            ]),
        ),
        ("status", store.status.as_str().into()),
        ("expires_after", expires_after),
        ("expires_at", store.expires_at.into()),
        ("last_active_at", store.last_active_at.into()),
        (
            "metadata",
            string_map(known.get(&AttributePath::new("metadata")), store.metadata.as_ref()),
        ),
    ]))
}

fn expires_after(value: &DynamicValue) -> Option<ExpiresAfter> {
    let path = AttributePath::new("expires_after");
    let days = value.get_i64(&path.clone().attribute("days")).ok()?;
    let anchor = value
        .get_string(&path.attribute("anchor"))
        .unwrap_or_else(|_| "last_active_at".to_string());
    Some(ExpiresAfter { anchor, days })
}

fn metadata(value: &DynamicValue) -> Option<std::collections::HashMap<String, String>> {
    value.get_string_map(&AttributePath::new("metadata")).ok()
}

/// Polls until ingestion settles and checks every file made it
async fn wait_for_files(
    ctx: &Context,
    provider_data: &OpenAIProviderData,
    id: &str,
) -> Result<VectorStore, Diagnostic> {
    let stores = provider_data.client.vector_stores();
    let store = retry_until(ctx, provider_data.polling.vector_store_files, || async {
        let store = stores.retrieve(id).await?;
        if store.file_counts.in_progress > 0 {
            return Ok(Poll::Retry(format!(
                "{} of {} files still in progress",
                store.file_counts.in_progress, store.file_counts.total
            )));
        }
        Ok(Poll::Done(store))
    })
    .await
    .map_err(|e| api_error("Failed waiting for vector store files", &e))?;

    if store.file_counts.completed != store.file_counts.total {
        return Err(Diagnostic::error(
            "Vector store file processing failed",
            format!(
                "Only {} of {} files were processed for vector store {} ({} failed, {} cancelled)",
                store.file_counts.completed,
                store.file_counts.total,
                store.id,
                store.file_counts.failed,
                store.file_counts.cancelled
            ),
        ));
    }
    Ok(store)
}

#[async_trait]
impl Resource for VectorStoreResource {
    fn type_name(&self) -> &str {
        "openai_vector_store"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let count = |name: &str| {
            AttributeBuilder::new(name, AttributeType::Number)
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .description("Manages a vector store used by the file_search tool")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The identifier, which can be referenced in API endpoints.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("object", AttributeType::String)
                    .description("The object type, which is always vector_store.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::Number)
                    .description("The Unix timestamp (in seconds) for when the vector store was created.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the vector store.")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("file_ids", AttributeType::list(AttributeType::String))
                    .description("A list of File IDs that the vector store should use.")
                    .required()
                    .validator(ListLengthValidator::between(1, 500))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("usage_bytes", AttributeType::Number)
                    .description("The total number of bytes used by the files in the vector store.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "file_counts",
                    NestedType::single(vec![
                        count("in_progress"),
                        count("completed"),
                        count("failed"),
                        count("cancelled"),
                        count("total"),
                    ]),
                )
                .description("File processing counts of the vector store.")
                .computed()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("The status of the vector store: expired, in_progress, or completed.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "expires_after",
                    NestedType::single(vec![
                        AttributeBuilder::new("anchor", AttributeType::String)
                            .description("Anchor timestamp after which the expiration policy applies.")
                            .optional()
                            .computed()
                            .default(StaticDefault::string("last_active_at"))
                            .validator(StringOneOfValidator::create(&["last_active_at"]))
                            .build(),
                        AttributeBuilder::new("days", AttributeType::Number)
                            .description("The number of days after the anchor time that the vector store will expire.")
                            .required()
                            .validator(NumberRangeValidator::between(1.0, 365.0))
                            .build(),
                    ]),
                )
                .description("The expiration policy for the vector store.")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("expires_at", AttributeType::Number)
                    .description("The Unix timestamp (in seconds) for when the vector store will expire.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("last_active_at", AttributeType::Number)
                    .description("The Unix timestamp (in seconds) for when the vector store was last active.")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::map(AttributeType::String))
                    .description("Set of 16 key-value pairs that can be attached to the vector store.")
                    .optional()
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let planned = &request.planned_state;
        let name = match required_string(planned, "name") {
            Ok(name) => name,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };
        let file_ids = planned
            .get_string_list(&AttributePath::new("file_ids"))
            .unwrap_or_default();

        let create = CreateVectorStoreRequest {
            name,
            file_ids: file_ids.clone(),
            expires_after: expires_after(planned),
            metadata: metadata(planned),
        };

        tracing::info!("Creating vector store {} with {} files", create.name, file_ids.len());
        let store = match provider_data.client.vector_stores().create(&create).await {
            Ok(store) => store,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create vector store", &e)],
                }
            }
        };
        tracing::info!("Created vector store {}, waiting for file processing", store.id);

        match wait_for_files(&ctx, provider_data, &store.id).await {
            Ok(store) => CreateResourceResponse {
                new_state: vector_store_state(&store, string_list(&file_ids), planned),
                private: vec![],
                diagnostics: vec![],
            },
            // The store exists; hand back its state so Terraform taints it.
            Err(diag) => CreateResourceResponse {
                new_state: vector_store_state(&store, string_list(&file_ids), planned),
                private: vec![],
                diagnostics: vec![diag],
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

        let stores = provider_data.client.vector_stores();
        let store = match stores.retrieve(&id).await {
            Ok(store) => store,
            Err(e) if e.is_not_found() => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => {
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics: vec![api_error("Failed to read vector store", &e)],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        // file_ids is kept from state; only an import has to look them up.
        let mut file_ids = carry(&request.current_state, "file_ids");
        if file_ids.is_null() {
            match stores.list_file_ids(&id).await {
                Ok(ids) => file_ids = string_list(&ids),
                Err(e) => {
                    return ReadResourceResponse {
                        new_state: Some(request.current_state),
                        diagnostics: vec![api_error("Failed to list vector store files", &e)],
                        private: request.private,
                        deferred: None,
                    }
                }
            }
        }

        ReadResourceResponse {
            new_state: Some(vector_store_state(&store, file_ids, &request.current_state)),
            diagnostics: vec![],
            private: request.private,
            deferred: None,
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
        let planned = &request.planned_state;
        let (id, name) = match (
            required_string(&request.prior_state, "id"),
            required_string(planned, "name"),
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

        let modify = ModifyVectorStoreRequest {
            name,
            expires_after: expires_after(planned),
            metadata: metadata(planned).unwrap_or_default(),
        };

        tracing::info!("Updating vector store {}", id);
        match provider_data.client.vector_stores().modify(&id, &modify).await {
            Ok(store) => UpdateResourceResponse {
                new_state: vector_store_state(&store, carry(planned, "file_ids"), planned),
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update vector store", &e)],
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

        tracing::info!("Deleting vector store {}", id);
        let diagnostics = match provider_data.client.vector_stores().delete(&id).await {
            Ok(deleted) if deleted.deleted => vec![],
            Ok(_) => vec![Diagnostic::error(
                "Failed to delete vector store",
                format!("The API did not delete vector store {}", id),
            )],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![api_error("Failed to delete vector store", &e)],
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
impl ResourceWithConfigure for VectorStoreResource {
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
