//! File resource implementation

use crate::api::files::File;
use crate::api::{retry_until, Poll};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{carry, object, required_string};
use async_trait::async_trait;
use std::path::PathBuf;
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
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::validator::StringOneOfValidator;
use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub const FILE_PURPOSES: &[&str] = &[
    "fine-tune",
    "assistants",
    "batch",
    "vision",
    "user_data",
    "evals",
];

#[derive(Default)]
pub struct FileResource {
    provider_data: Option<OpenAIProviderData>,
}

impl FileResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_schema() -> Schema {
        SchemaBuilder::new()
            .description("Uploads a file that can be used across OpenAI endpoints")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The file identifier, which can be referenced in the API endpoints.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("filepath", AttributeType::String)
                    .description("Path of the local file to upload, relative to the working directory.")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("purpose", AttributeType::String)
                    .description("The intended purpose of the uploaded file. Defaults to fine-tune.")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("fine-tune"))
                    .validator(StringOneOfValidator::create(FILE_PURPOSES))
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bytes", AttributeType::Number)
                    .description("The size of the file, in bytes.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created", AttributeType::Number)
                    .description("The Unix timestamp (in seconds) for when the file was created.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("filename", AttributeType::String)
                    .description("The name of the file.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("object", AttributeType::String)
                    .description("The object type, which is always file.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .build()
    }
}

/// State for an uploaded file. `filepath` only exists locally so it is
/// passed in; imports fall back to the remote filename.
pub(crate) fn file_state(file: &File, filepath: Dynamic) -> DynamicValue {
    let filepath = if filepath.is_null() {
        Dynamic::from(file.filename.as_str())
    } else {
        filepath
    };
    DynamicValue::new(object([
        ("id", file.id.as_str().into()),
        ("filepath", filepath),
        ("purpose", file.purpose.as_str().into()),
        ("bytes", file.bytes.into()),
        ("created", file.created_at.into()),
        ("filename", file.filename.as_str().into()),
        ("object", file.object.as_str().into()),
    ]))
}

fn resolve_path(filepath: &str) -> Result<PathBuf, Diagnostic> {
    let path = PathBuf::from(filepath);
    if path.is_absolute() {
        return Ok(path);
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| {
            Diagnostic::error(
                "Failed to resolve file path",
                format!("Unable to read the working directory: {}", e),
            )
        })
}

#[async_trait]
impl Resource for FileResource {
    fn type_name(&self) -> &str {
        "openai_file"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::resource_schema(),
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let fail = |diagnostic: Diagnostic, planned_state: DynamicValue| CreateResourceResponse {
            new_state: planned_state,
            private: vec![],
            diagnostics: vec![diagnostic],
        };

        let Some(provider_data) = &self.provider_data else {
            return fail(not_configured(), request.planned_state);
        };

        let filepath = match required_string(&request.planned_state, "filepath") {
            Ok(filepath) => filepath,
            Err(diag) => return fail(diag, request.planned_state),
        };
        let purpose = crate::state::optional_string(&request.planned_state, "purpose")
            .unwrap_or_else(|| "fine-tune".to_string());
        let path = match resolve_path(&filepath) {
            Ok(path) => path,
            Err(diag) => return fail(diag, request.planned_state),
        };

        tracing::info!("Uploading file {} with purpose {}", path.display(), purpose);
        match provider_data.client.files().upload(&path, &purpose).await {
            Ok(file) => {
                tracing::info!("Uploaded file {}", file.id);
                CreateResourceResponse {
                    new_state: file_state(&file, Dynamic::String(filepath)),
                    private: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => fail(api_error("Failed to upload file", &e), request.planned_state),
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

        let id = match required_string(&request.current_state, "id") {
            Ok(id) => id,
            Err(_) => {
                return ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
        };

        match provider_data.client.files().retrieve(&id).await {
            Ok(file) => ReadResourceResponse {
                new_state: Some(file_state(&file, carry(&request.current_state, "filepath"))),
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(e) if e.is_not_found() => {
                tracing::warn!("File {} not found, removing from state", id);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read file", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    /// Every argument forces replacement, so an update only refreshes the
    /// computed attributes.
    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let read = self
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: request.type_name,
                    current_state: request.planned_state.clone(),
                    private: request.planned_private,
                    provider_meta: request.provider_meta,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        UpdateResourceResponse {
            new_state: read.new_state.unwrap_or(request.planned_state),
            private: read.private,
            diagnostics: read.diagnostics,
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(provider_data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };
        let id = match required_string(&request.prior_state, "id") {
            Ok(id) => id,
            Err(diag) => return DeleteResourceResponse { diagnostics: vec![diag] },
        };

        tracing::info!("Deleting file {}", id);
        let files = provider_data.client.files();
        let result = retry_until(&ctx, provider_data.polling.file_delete, || async {
            match files.delete(&id).await {
                Ok(deleted) => Ok(Poll::Done(deleted.deleted)),
                Err(e) if e.is_not_found() => Ok(Poll::Done(true)),
                Err(e) if e.is_conflict() => Ok(Poll::Retry(e.to_string())),
                Err(e) => Err(e),
            }
        })
        .await;

        let diagnostics = match result {
            Ok(true) => vec![],
            Ok(false) => vec![Diagnostic::error(
                "Failed to delete file",
                format!("The API did not delete file {}", id),
            )],
            Err(e) => vec![api_error("Failed to delete file", &e)],
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
impl ResourceWithConfigure for FileResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match OpenAIProviderData::from_any(request.provider_data) {
            Ok(data) => {
                self.provider_data = data;
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{provider_data, string_at, value};
    use mockito::Server;
    use std::io::Write;

    const FILE: &str = r#"{"id":"file-abc","object":"file","bytes":18,"created_at":1700000000,"filename":"train.jsonl","purpose":"fine-tune"}"#;

    fn resource(url: &str) -> FileResource {
        FileResource {
            provider_data: Some(provider_data(url)),
        }
    }

    #[tokio::test]
    async fn create_uploads_and_keeps_filepath() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/files")
            .with_body(FILE)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        writeln!(std::fs::File::create(&path).unwrap(), r#"{{"prompt":"a"}}"#).unwrap();
        let filepath = path.to_string_lossy().to_string();

        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "openai_file".to_string(),
                    planned_state: value([
                        ("filepath", filepath.as_str().into()),
                        ("purpose", "fine-tune".into()),
                        ("id", Dynamic::Unknown),
                    ]),
                    config: value([("filepath", filepath.as_str().into())]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(string_at(&response.new_state, "id"), "file-abc");
        assert_eq!(string_at(&response.new_state, "filepath"), filepath);
        assert_eq!(
            response.new_state.get_i64(&AttributePath::new("created")).unwrap(),
            1700000000
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_removes_missing_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/file-gone")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No such File object: file-gone"}}"#)
            .create_async()
            .await;

        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "openai_file".to_string(),
                    current_state: value([("id", "file-gone".into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn read_after_import_uses_filename() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/file-abc")
            .with_body(FILE)
            .create_async()
            .await;

        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "openai_file".to_string(),
                    current_state: value([("id", "file-abc".into())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        let state = response.new_state.unwrap();
        assert_eq!(string_at(&state, "filepath"), "train.jsonl");
        assert_eq!(string_at(&state, "purpose"), "fine-tune");
    }

    #[tokio::test]
    async fn delete_retries_while_file_in_use() {
        let mut server = Server::new_async().await;
        let busy = server
            .mock("DELETE", "/files/file-abc")
            .with_status(409)
            .with_body(r#"{"error":{"message":"File is still in use"}}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let resource = resource(&server.url());
        let deleting = tokio::spawn(async move {
            resource
                .delete(
                    Context::new(),
                    DeleteResourceRequest {
                        type_name: "openai_file".to_string(),
                        prior_state: value([("id", "file-abc".into())]),
                        planned_private: vec![],
                        provider_meta: None,
                    },
                )
                .await
        });

        // Let the first attempts hit the conflict before the file is released.
        while !busy.matched_async().await {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        let _released = server
            .mock("DELETE", "/files/file-abc")
            .with_body(r#"{"id":"file-abc","object":"file","deleted":true}"#)
            .create_async()
            .await;
        busy.remove_async().await;

        let response = deleting.await.unwrap();
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn unconfigured_resource_reports_error() {
        let response = FileResource::new()
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "openai_file".to_string(),
                    prior_state: value([("id", "file-abc".into())]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn import_sets_id() {
        let response = FileResource::new()
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: "openai_file".to_string(),
                    id: "file-abc".to_string(),
                    client_capabilities: Default::default(),
                },
            )
            .await;
        assert_eq!(
            string_at(&response.imported_resources[0].state, "id"),
            "file-abc"
        );
    }
}
