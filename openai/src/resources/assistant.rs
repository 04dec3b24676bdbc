//! Assistant resource implementation

use crate::api::assistants::{
    Assistant, AssistantRequest, AssistantTool, CodeInterpreterResources, FileSearchResources,
    FunctionDefinition, JsonSchemaFormat, ResponseFormat, ResponseFormatObject, ToolResources,
};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{
    json_string_keeping, object, optional_string, parse_json, required_string, string_list,
    string_map,
};
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::validator::{
    JsonStringValidator, NumberRangeValidator, StringLengthValidator, StringOneOfValidator,
};
use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue};

const TOOL_TYPES: &[&str] = &["code_interpreter", "file_search", "function"];
const RESPONSE_FORMAT_TYPES: &[&str] = &["text", "json_object", "json_schema"];

#[derive(Default)]
pub struct AssistantResource {
    provider_data: Option<OpenAIProviderData>,
}

impl AssistantResource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn invalid(path: AttributePath, error: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::error("Invalid assistant configuration", error.to_string()).with_attribute(path)
}

fn tools(planned: &DynamicValue) -> Result<Vec<AssistantTool>, Diagnostic> {
    let count = planned
        .get_list(&AttributePath::new("tools"))
        .map(|tools| tools.len())
        .unwrap_or(0);

    (0..count)
        .map(|i| {
            let tool = AttributePath::new("tools").index(i as i64);
            let type_path = tool.clone().attribute("type");
            let tool_type = planned
                .get_string(&type_path)
                .map_err(|e| invalid(type_path, e))?;

            let function_path = tool.attribute("function");
            let function = if planned.is_null_at(&function_path) {
                None
            } else {
                let name_path = function_path.clone().attribute("name");
                Some(FunctionDefinition {
                    name: planned
                        .get_string(&name_path)
                        .map_err(|e| invalid(name_path, e))?,
                    description: planned
                        .get_string(&function_path.clone().attribute("description"))
                        .ok(),
                    parameters: parse_json(planned, function_path.attribute("parameters"))?,
                })
            };

            Ok(AssistantTool {
                tool_type,
                function,
            })
        })
        .collect()
}

fn tool_resources(planned: &DynamicValue) -> Option<ToolResources> {
    let root = AttributePath::new("tool_resources");
    if planned.is_null_at(&root) {
        return None;
    }
    let code_interpreter = planned
        .get_string_list(&root.clone().attribute("code_interpreter").attribute("file_ids"))
        .ok()
        .map(|file_ids| CodeInterpreterResources { file_ids });
    let file_search = planned
        .get_string_list(&root.attribute("file_search").attribute("vector_store_ids"))
        .ok()
        .map(|vector_store_ids| FileSearchResources { vector_store_ids });
    Some(ToolResources {
        code_interpreter,
        file_search,
    })
}

fn response_format(planned: &DynamicValue) -> Result<Option<ResponseFormat>, Diagnostic> {
    let root = AttributePath::new("response_format");
    if planned.is_null_at(&root) {
        return Ok(None);
    }
    let type_path = root.clone().attribute("type");
    let format_type = planned
        .get_string(&type_path)
        .map_err(|e| invalid(type_path, e))?;

    let schema_path = root.attribute("json_schema");
    let json_schema = if planned.is_null_at(&schema_path) {
        None
    } else {
        let name_path = schema_path.clone().attribute("name");
        Some(JsonSchemaFormat {
            name: planned
                .get_string(&name_path)
                .map_err(|e| invalid(name_path, e))?,
            description: planned
                .get_string(&schema_path.clone().attribute("description"))
                .ok(),
            schema: parse_json(planned, schema_path.clone().attribute("schema"))?,
            strict: planned.get_bool(&schema_path.attribute("strict")).ok(),
        })
    };

    Ok(Some(ResponseFormat::Format(ResponseFormatObject {
        format_type,
        json_schema,
    })))
}

fn assistant_request(planned: &DynamicValue) -> Result<AssistantRequest, Diagnostic> {
    Ok(AssistantRequest {
        model: required_string(planned, "model")?,
        name: optional_string(planned, "name"),
        description: optional_string(planned, "description"),
        instructions: optional_string(planned, "instructions"),
        tools: tools(planned)?,
        tool_resources: tool_resources(planned),
        metadata: planned
            .get_string_map(&AttributePath::new("metadata"))
            .ok(),
        temperature: planned.get_number(&AttributePath::new("temperature")).ok(),
        top_p: planned.get_number(&AttributePath::new("top_p")).ok(),
        response_format: response_format(planned)?,
    })
}

/// Builds state from the API object. `known` is the plan or prior state,
/// used to keep JSON text as written and to tell an empty list from null.
fn assistant_state(assistant: &Assistant, known: &DynamicValue) -> DynamicValue {
    let tools = if assistant.tools.is_empty() {
        match known.get(&AttributePath::new("tools")) {
            Some(Dynamic::List(items)) if items.is_empty() => Dynamic::List(vec![]),
            _ => Dynamic::Null,
        }
    } else {
        Dynamic::List(
            assistant
                .tools
                .iter()
                .enumerate()
                .map(|(i, tool)| {
                    let parameters_path = AttributePath::new("tools")
                        .index(i as i64)
                        .attribute("function")
                        .attribute("parameters");
                    let function = tool
                        .function
                        .as_ref()
                        .map(|f| {
                            object([
                                ("name", f.name.as_str().into()),
                                ("description", f.description.clone().into()),
                                (
                                    "parameters",
                                    json_string_keeping(
                                        known.get(&parameters_path),
                                        f.parameters.as_ref(),
                                    ),
                                ),
                            ])
                        })
                        .unwrap_or(Dynamic::Null);
                    object([("type", tool.tool_type.as_str().into()), ("function", function)])
                })
                .collect(),
        )
    };

    let resources = assistant.tool_resources.clone().unwrap_or_default();
    let code_interpreter = resources
        .code_interpreter
        .filter(|r| !r.file_ids.is_empty())
        .map(|r| object([("file_ids", string_list(&r.file_ids))]));
    let file_search = resources
        .file_search
        .filter(|r| !r.vector_store_ids.is_empty())
        .map(|r| object([("vector_store_ids", string_list(&r.vector_store_ids))]));
    let tool_resources = if code_interpreter.is_none() && file_search.is_none() {
        Dynamic::Null
    } else {
        object([
            ("code_interpreter", code_interpreter.into()),
            ("file_search", file_search.into()),
        ])
    };

    // "auto" is the API default and reads as unset.
    let response_format = match &assistant.response_format {
        Some(ResponseFormat::Format(format)) => {
            let schema_path = AttributePath::new("response_format")
                .attribute("json_schema")
                .attribute("schema");
            let json_schema = format
                .json_schema
                .as_ref()
                .map(|s| {
                    object([
                        ("name", s.name.as_str().into()),
                        ("description", s.description.clone().into()),
                        (
                            "schema",
                            json_string_keeping(known.get(&schema_path), s.schema.as_ref()),
                        ),
                        ("strict", s.strict.into()),
                    ])
                })
                .unwrap_or(Dynamic::Null);
            object([
                ("type", format.format_type.as_str().into()),
                ("json_schema", json_schema),
            ])
        }
        Some(ResponseFormat::Auto(_)) | None => Dynamic::Null,
    };

    DynamicValue::new(object([
        ("id", assistant.id.as_str().into()),
        ("object", assistant.object.as_str().into()),
        ("created_at", assistant.created_at.into()),
        ("model", assistant.model.as_str().into()),
        ("name", assistant.name.clone().into()),
        ("description", assistant.description.clone().into()),
        ("instructions", assistant.instructions.clone().into()),
        ("temperature", assistant.temperature.into()),
        ("top_p", assistant.top_p.into()),
        ("tools", tools),
        ("tool_resources", tool_resources),
        ("response_format", response_format),
        (
            "metadata",
            string_map(
                known.get(&AttributePath::new("metadata")),
                assistant.metadata.as_ref(),
            ),
        ),
    ]))
}

#[async_trait]
impl Resource for AssistantResource {
    fn type_name(&self) -> &str {
        "openai_assistant"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let id_list = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::list(AttributeType::String))
                .description(description)
                .optional()
                .build()
        };

        let function = AttributeBuilder::nested(
            "function",
            NestedType::single(vec![
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the function to be called.")
                    .required()
                    .validator(StringLengthValidator::between(1, 64))
                    .build(),
                AttributeBuilder::new("description", AttributeType::String)
                    .description("A description of what the function does.")
                    .optional()
                    .build(),
                AttributeBuilder::new("parameters", AttributeType::String)
                    .description("The parameters the function accepts, described as a JSON Schema object.")
                    .optional()
                    .validator(JsonStringValidator::create())
                    .build(),
            ]),
        )
        .description("The function definition, required for function tools.")
        .optional()
        .build();

        let json_schema = AttributeBuilder::nested(
            "json_schema",
            NestedType::single(vec![
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the response format.")
                    .required()
                    .build(),
                AttributeBuilder::new("description", AttributeType::String)
                    .description("A description of what the response format is for.")
                    .optional()
                    .build(),
                AttributeBuilder::new("schema", AttributeType::String)
                    .description("The schema for the response format, described as a JSON Schema object.")
                    .optional()
                    .validator(JsonStringValidator::create())
                    .build(),
                AttributeBuilder::new("strict", AttributeType::Bool)
                    .description("Whether to enable strict schema adherence.")
                    .optional()
                    .build(),
            ]),
        )
        .description("Structured Outputs configuration, used with type json_schema.")
        .optional()
        .build();

        let schema = SchemaBuilder::new()
            .description("Manages an assistant that can call models and use tools")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The identifier, which can be referenced in API endpoints.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("object", AttributeType::String)
                    .description("The object type, which is always assistant.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::Number)
                    .description("The Unix timestamp (in seconds) for when the assistant was created.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("model", AttributeType::String)
                    .description("ID of the model to use.")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the assistant.")
                    .optional()
                    .validator(StringLengthValidator::at_most(256))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("The description of the assistant.")
                    .optional()
                    .validator(StringLengthValidator::at_most(512))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instructions", AttributeType::String)
                    .description("The system instructions that the assistant uses.")
                    .optional()
                    .validator(StringLengthValidator::at_most(256_000))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("temperature", AttributeType::Number)
                    .description("Sampling temperature to use, between 0 and 2.")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::between(0.0, 2.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("top_p", AttributeType::Number)
                    .description("Nucleus sampling probability mass, between 0 and 1.")
                    .optional()
                    .computed()
                    .validator(NumberRangeValidator::between(0.0, 1.0))
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "tools",
                    NestedType::list(vec![
                        AttributeBuilder::new("type", AttributeType::String)
                            .description("The type of tool: code_interpreter, file_search or function.")
                            .required()
                            .validator(StringOneOfValidator::create(TOOL_TYPES))
                            .build(),
                        function,
                    ]),
                )
                .description("A list of tools enabled on the assistant.")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "tool_resources",
                    NestedType::single(vec![
                        AttributeBuilder::nested(
                            "code_interpreter",
                            NestedType::single(vec![id_list(
                                "file_ids",
                                "File IDs made available to the code_interpreter tool.",
                            )]),
                        )
                        .optional()
                        .build(),
                        AttributeBuilder::nested(
                            "file_search",
                            NestedType::single(vec![id_list(
                                "vector_store_ids",
                                "The vector store attached to this assistant.",
                            )]),
                        )
                        .optional()
                        .build(),
                    ]),
                )
                .description("Resources used by the assistant's tools.")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::nested(
                    "response_format",
                    NestedType::single(vec![
                        AttributeBuilder::new("type", AttributeType::String)
                            .description("The type of response format: text, json_object or json_schema.")
                            .required()
                            .validator(StringOneOfValidator::create(RESPONSE_FORMAT_TYPES))
                            .build(),
                        json_schema,
                    ]),
                )
                .description("The format that the model must output.")
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("metadata", AttributeType::map(AttributeType::String))
                    .description("Set of 16 key-value pairs that can be attached to the assistant.")
                    .optional()
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
        let body = match assistant_request(&request.planned_state) {
            Ok(body) => body,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Creating assistant for model {}", body.model);
        match provider_data.client.assistants().create(&body).await {
            Ok(assistant) => {
                tracing::info!("Created assistant {}", assistant.id);
                CreateResourceResponse {
                    new_state: assistant_state(&assistant, &request.planned_state),
                    private: vec![],
                    diagnostics: vec![],
                }
            }
            Err(e) => CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to create assistant", &e)],
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

        match provider_data.client.assistants().retrieve(&id).await {
            Ok(assistant) => ReadResourceResponse {
                new_state: Some(assistant_state(&assistant, &request.current_state)),
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(e) if e.is_not_found() => {
                tracing::warn!("Assistant {} no longer exists", id);
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read assistant", &e)],
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
        let prepared = required_string(&request.prior_state, "id")
            .and_then(|id| Ok((id, assistant_request(&request.planned_state)?)));
        let (id, body) = match prepared {
            Ok(prepared) => prepared,
            Err(diag) => {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        tracing::info!("Updating assistant {}", id);
        match provider_data.client.assistants().modify(&id, &body).await {
            Ok(assistant) => UpdateResourceResponse {
                new_state: assistant_state(&assistant, &request.planned_state),
                private: vec![],
                diagnostics: vec![],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update assistant", &e)],
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

        tracing::info!("Deleting assistant {}", id);
        let diagnostics = match provider_data.client.assistants().delete(&id).await {
            Ok(deleted) if deleted.deleted => vec![],
            Ok(_) => vec![Diagnostic::error(
                "Failed to delete assistant",
                format!("The API did not delete assistant {}", id),
            )],
            Err(e) if e.is_not_found() => vec![],
            Err(e) => vec![api_error("Failed to delete assistant", &e)],
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
impl ResourceWithConfigure for AssistantResource {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{provider_data, string_at, value};
    use mockito::{Matcher, Server};

    const PARAMETERS: &str = "{\n  \"type\": \"object\",\n  \"properties\": {\"city\": {\"type\": \"string\"}}\n}";

    fn assistant_json() -> String {
        serde_json::json!({
            "id": "asst_1",
            "object": "assistant",
            "created_at": 1700000000,
            "name": "Weather",
            "description": null,
            "model": "gpt-4o",
            "instructions": "Answer weather questions",
            "tools": [
                {"type": "code_interpreter"},
                {"type": "function", "function": {
                    "name": "get_weather",
                    "description": "Current weather",
                    "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}
                }}
            ],
            "tool_resources": {"code_interpreter": {"file_ids": []}},
            "metadata": {},
            "temperature": 1.0,
            "top_p": 1.0,
            "response_format": "auto"
        })
        .to_string()
    }

    fn planned() -> DynamicValue {
        value([
            ("id", Dynamic::Unknown),
            ("model", "gpt-4o".into()),
            ("name", "Weather".into()),
            ("instructions", "Answer weather questions".into()),
            ("temperature", Dynamic::Unknown),
            (
                "tools",
                Dynamic::List(vec![
                    object([("type", "code_interpreter".into()), ("function", Dynamic::Null)]),
                    object([
                        ("type", "function".into()),
                        (
                            "function",
                            object([
                                ("name", "get_weather".into()),
                                ("description", "Current weather".into()),
                                ("parameters", PARAMETERS.into()),
                            ]),
                        ),
                    ]),
                ]),
            ),
        ])
    }

    fn resource(url: &str) -> AssistantResource {
        AssistantResource {
            provider_data: Some(provider_data(url)),
        }
    }

    #[tokio::test]
    async fn create_sends_tools_and_keeps_json_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/assistants")
            .match_header("openai-beta", "assistants=v2")
            .match_body(Matcher::Json(serde_json::json!({
                "model": "gpt-4o",
                "name": "Weather",
                "instructions": "Answer weather questions",
                "tools": [
                    {"type": "code_interpreter"},
                    {"type": "function", "function": {
                        "name": "get_weather",
                        "description": "Current weather",
                        "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}
                    }}
                ]
            })))
            .with_body(assistant_json())
            .create_async()
            .await;

        let planned = planned();
        let response = resource(&server.url())
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "openai_assistant".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state;
        assert_eq!(string_at(&state, "id"), "asst_1");
        assert_eq!(
            state
                .get_string(
                    &AttributePath::new("tools")
                        .index(1)
                        .attribute("function")
                        .attribute("parameters")
                )
                .unwrap(),
            PARAMETERS
        );
        assert_eq!(state.get_number(&AttributePath::new("temperature")).unwrap(), 1.0);
        assert!(state.is_null_at(&AttributePath::new("tool_resources")));
        assert!(state.is_null_at(&AttributePath::new("response_format")));
        assert!(state.is_null_at(&AttributePath::new("metadata")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_parameters_are_reported_on_the_attribute() {
        let mut planned = planned();
        let path = AttributePath::new("tools")
            .index(1)
            .attribute("function")
            .attribute("parameters");
        planned.set_string(&path, "{broken").unwrap();

        let response = resource("http://127.0.0.1:1")
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: "openai_assistant".to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Invalid JSON");
        assert_eq!(response.diagnostics[0].attribute, Some(path));
    }

    #[tokio::test]
    async fn update_sends_response_format() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/assistants/asst_1")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "forecast", "schema": {"type": "object"}, "strict": true}
                },
                "tool_resources": {"file_search": {"vector_store_ids": ["vs_1"]}}
            })))
            .with_body(
                serde_json::json!({
                    "id": "asst_1", "object": "assistant", "created_at": 1700000000,
                    "model": "gpt-4o", "tools": [{"type": "file_search"}],
                    "tool_resources": {"file_search": {"vector_store_ids": ["vs_1"]}},
                    "temperature": 1.0, "top_p": 1.0,
                    "response_format": {
                        "type": "json_schema",
                        "json_schema": {"name": "forecast", "schema": {"type": "object"}, "strict": true}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let planned = value([
            ("id", "asst_1".into()),
            ("model", "gpt-4o".into()),
            (
                "tools",
                Dynamic::List(vec![object([
                    ("type", "file_search".into()),
                    ("function", Dynamic::Null),
                ])]),
            ),
            (
                "tool_resources",
                object([
                    ("code_interpreter", Dynamic::Null),
                    (
                        "file_search",
                        object([("vector_store_ids", Dynamic::List(vec!["vs_1".into()]))]),
                    ),
                ]),
            ),
            (
                "response_format",
                object([
                    ("type", "json_schema".into()),
                    (
                        "json_schema",
                        object([
                            ("name", "forecast".into()),
                            ("description", Dynamic::Null),
                            ("schema", r#"{ "type": "object" }"#.into()),
                            ("strict", true.into()),
                        ]),
                    ),
                ]),
            ),
        ]);

        let response = resource(&server.url())
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: "openai_assistant".to_string(),
                    prior_state: value([("id", "asst_1".into())]),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let schema_path = AttributePath::new("response_format")
            .attribute("json_schema")
            .attribute("schema");
        assert_eq!(
            response.new_state.get_string(&schema_path).unwrap(),
            r#"{ "type": "object" }"#
        );
        assert_eq!(
            response
                .new_state
                .get_string_list(
                    &AttributePath::new("tool_resources")
                        .attribute("file_search")
                        .attribute("vector_store_ids")
                )
                .unwrap(),
            vec!["vs_1".to_string()]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_keeps_empty_metadata_from_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/assistants/asst_1")
            .with_body(assistant_json())
            .create_async()
            .await;

        let empty = Dynamic::Map(Default::default());
        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "openai_assistant".to_string(),
                    current_state: value([("id", "asst_1".into()), ("metadata", empty.clone())]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = response.new_state.unwrap();
        assert_eq!(state.get(&AttributePath::new("metadata")), Some(&empty));
    }

    #[tokio::test]
    async fn read_removes_deleted_assistant() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/assistants/asst_1")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No assistant found","type":"invalid_request_error"}}"#)
            .create_async()
            .await;

        let response = resource(&server.url())
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: "openai_assistant".to_string(),
                    current_state: value([("id", "asst_1".into())]),
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
    async fn delete_ignores_missing_assistant() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/assistants/asst_1")
            .with_status(404)
            .with_body(r#"{"error":{"message":"No assistant found","type":"invalid_request_error"}}"#)
            .create_async()
            .await;

        let response = resource(&server.url())
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: "openai_assistant".to_string(),
                    prior_state: value([("id", "asst_1".into())]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
    }
}
