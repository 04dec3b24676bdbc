//! Fine-tuning job resource implementation

use crate::api::fine_tuning::{
    CreateFineTuningJobRequest, FineTuningJob, Hyperparameters, NEpochs, STATUS_SUCCEEDED,
};
use crate::api::{retry_until, Poll};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::state::{carry, object, optional_string, required_string, string_list};
use async_trait::async_trait;
use std::sync::Mutex;
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
use tfplug::validator::NumberRangeValidator;
use tfplug::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Statuses of a job that is still making progress
const PENDING_STATUSES: &[&str] = &["validating_files", "queued", "running"];

#[derive(Default)]
pub struct FineTuningJobResource {
    provider_data: Option<OpenAIProviderData>,
}

impl FineTuningJobResource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Job attributes as reported by the API
pub(crate) fn job_object(job: &FineTuningJob) -> Dynamic {
    let n_epochs = job
        .hyperparameters
        .as_ref()
        .and_then(|h| h.n_epochs.as_ref())
        .and_then(NEpochs::count);

    object([
        ("id", job.id.as_str().into()),
        ("object", job.object.as_str().into()),
        ("created_at", job.created_at.into()),
        ("finished_at", job.finished_at.into()),
        ("model", job.model.as_str().into()),
        ("fine_tuned_model", job.fine_tuned_model.clone().into()),
        ("organization_id", job.organization_id.clone().into()),
        ("status", job.status.as_str().into()),
        ("training_file", job.training_file.as_str().into()),
        ("validation_file", job.validation_file.clone().into()),
        ("result_files", string_list(&job.result_files)),
        ("trained_tokens", job.trained_tokens.into()),
        ("suffix", job.suffix.clone().into()),
        ("hyperparams", object([("n_epochs", n_epochs.into())])),
    ])
}

/// State for the resource; the arguments come from `config` since the API
/// echoes resolved values (an `auto` epoch count, a decorated suffix).
fn job_state(job: &FineTuningJob, config: &DynamicValue) -> DynamicValue {
    let mut state = DynamicValue::new(job_object(job));
    for name in ["validation_file", "suffix", "hyperparams"] {
        // Setting a top level attribute on an object value cannot fail.
        let _ = state.set_value(&AttributePath::new(name), carry(config, name));
    }
    let wait = match carry(config, "wait") {
        Dynamic::Null => Dynamic::Bool(false),
        wait => wait,
    };
    let _ = state.set_value(&AttributePath::new("wait"), wait);
    state
}

fn create_request(planned: &DynamicValue) -> Result<CreateFineTuningJobRequest, Diagnostic> {
    let n_epochs = planned
        .get_i64(&AttributePath::new("hyperparams").attribute("n_epochs"))
        .ok();
    Ok(CreateFineTuningJobRequest {
        model: required_string(planned, "model")?,
        training_file: required_string(planned, "training_file")?,
        validation_file: optional_string(planned, "validation_file"),
        suffix: optional_string(planned, "suffix"),
        hyperparameters: n_epochs.map(|n| Hyperparameters {
            n_epochs: Some(NEpochs::Count(n)),
        }),
    })
}

/// Follows a job until it succeeds, logging its events along the way
async fn wait_for_job(
    ctx: &Context,
    provider_data: &OpenAIProviderData,
    id: &str,
) -> Result<FineTuningJob, Diagnostic> {
    let api = provider_data.client.fine_tuning();
    let last_event: Mutex<Option<String>> = Mutex::new(None);

    let job = retry_until(ctx, provider_data.polling.fine_tune_wait, || async {
        let last_seen = last_event
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let events = api.events_since(id, last_seen.as_deref()).await?;
        if let Some(last) = events.last() {
            *last_event.lock().unwrap_or_else(|e| e.into_inner()) = Some(last.id.clone());
        }
        for event in &events {
            tracing::info!("Fine-tuning job {}: [{}] {}", id, event.level, event.message);
        }

        let job = api.retrieve(id).await?;
        if PENDING_STATUSES.contains(&job.status.as_str()) {
            return Ok(Poll::Retry(format!("job is {}", job.status)));
        }
        Ok(Poll::Done(job))
    })
    .await
    .map_err(|e| api_error("Fine-tuning job did not succeed", &e))?;

    if job.status != STATUS_SUCCEEDED {
        return Err(Diagnostic::error(
            "Fine-tuning job did not succeed",
            format!("Fine-tuning job {} ended with status {}", id, job.status),
        ));
    }
    Ok(job)
}

#[async_trait]
impl Resource for FineTuningJobResource {
    fn type_name(&self) -> &str {
        "openai_finetuning_job"
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        let computed = |name: &str, kind: AttributeType, description: &str| {
            AttributeBuilder::new(name, kind)
                .description(description)
                .computed()
                .build()
        };
        let replace = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .plan_modifier(RequiresReplace::create())
                .build()
        };

        let schema = SchemaBuilder::new()
            .description("Creates a fine-tuning job which begins the process of creating a new model from a given dataset")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The object identifier, which can be referenced in the API endpoints.")
                    .computed()
                    .plan_modifier(UseStateForUnknown::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("model", AttributeType::String)
                    .description("The name of the model to fine-tune.")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("training_file", AttributeType::String)
                    .description("The ID of an uploaded file that contains training data.")
                    .required()
                    .plan_modifier(RequiresReplace::create())
                    .build(),
            )
            .attribute(replace(
                "validation_file",
                "The ID of an uploaded file that contains validation data.",
            ))
            .attribute(replace(
                "suffix",
                "A string of up to 64 characters that will be added to your fine-tuned model name.",
            ))
            .attribute(
                AttributeBuilder::nested(
                    "hyperparams",
                    NestedType::single(vec![AttributeBuilder::new("n_epochs", AttributeType::Number)
                        .description("The number of epochs to train the model for.")
                        .optional()
                        .validator(NumberRangeValidator::between(1.0, 50.0))
                        .build()]),
                )
                .description("The hyperparameters used for the fine-tuning job.")
                .optional()
                .plan_modifier(RequiresReplace::create())
                .build(),
            )
            .attribute(
                AttributeBuilder::new("wait", AttributeType::Bool)
                    .description("Wait for the job to succeed during apply. Defaults to false.")
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .attribute(computed("object", AttributeType::String, "The object type, which is always fine_tuning.job."))
            .attribute(computed("created_at", AttributeType::Number, "The Unix timestamp (in seconds) for when the job was created."))
            .attribute(computed("finished_at", AttributeType::Number, "The Unix timestamp (in seconds) for when the job was finished."))
            .attribute(computed("fine_tuned_model", AttributeType::String, "The name of the fine-tuned model that is being created."))
            .attribute(computed("organization_id", AttributeType::String, "The organization that owns the job."))
            .attribute(computed("status", AttributeType::String, "The current status of the job."))
            .attribute(computed(
                "result_files",
                AttributeType::list(AttributeType::String),
                "The compiled results file ID(s) for the job.",
            ))
            .attribute(computed("trained_tokens", AttributeType::Number, "The total number of billable tokens processed by this job."))
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
        let body = match create_request(planned) {
            Ok(body) => body,
            Err(diag) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![diag],
                }
            }
        };

        // The API rejects a job with 400 until the training file is processed.
        let api = provider_data.client.fine_tuning();
        let created = retry_until(&ctx, provider_data.polling.fine_tune_create, || async {
            match api.create(&body).await {
                Ok(job) => Ok(Poll::Done(job)),
                Err(e) if e.is_bad_request() => Ok(Poll::Retry(e.to_string())),
                Err(e) => Err(e),
            }
        })
        .await;

        let job = match created {
            Ok(job) => job,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create fine-tuning job", &e)],
                }
            }
        };
        tracing::info!("Created fine-tuning job {} for model {}", job.id, job.model);

        if !planned.get_bool(&AttributePath::new("wait")).unwrap_or(false) {
            return CreateResourceResponse {
                new_state: job_state(&job, planned),
                private: vec![],
                diagnostics: vec![],
            };
        }

        match wait_for_job(&ctx, provider_data, &job.id).await {
            Ok(finished) => CreateResourceResponse {
                new_state: job_state(&finished, planned),
                private: vec![],
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: job_state(&job, planned),
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

        match provider_data.client.fine_tuning().retrieve(&id).await {
            Ok(job) => {
                // An imported job has no arguments in state yet.
                let imported = request.current_state.is_null_at(&AttributePath::new("model"));
                let arguments = if imported {
                    DynamicValue::new(job_object(&job))
                } else {
                    request.current_state
                };
                ReadResourceResponse {
                    new_state: Some(job_state(&job, &arguments)),
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) if e.is_not_found() => ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read fine-tuning job", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        // Every other argument forces replacement, so only `wait` changes here.
        let mut new_state = request.prior_state;
        let diagnostics = match new_state.set_value(
            &AttributePath::new("wait"),
            carry(&request.planned_state, "wait"),
        ) {
            Ok(()) => vec![],
            Err(e) => vec![Diagnostic::error("Failed to update wait", e.to_string())],
        };
        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
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

        let client = &provider_data.client;
        let job = match client.fine_tuning().retrieve(&id).await {
            Ok(job) => job,
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics: vec![] },
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to read fine-tuning job", &e)],
                }
            }
        };

        if !job.is_finished() {
            tracing::info!("Cancelling fine-tuning job {} ({})", id, job.status);
            if let Err(e) = client.fine_tuning().cancel(&id).await {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to cancel fine-tuning job", &e)],
                };
            }
        }

        let mut diagnostics = vec![];
        for file_id in &job.result_files {
            tracing::debug!("Deleting result file {} of job {}", file_id, id);
            match client.files().delete(file_id).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => diagnostics.push(api_error("Failed to delete result file", &e)),
            }
        }

        if let Some(model) = &job.fine_tuned_model {
            tracing::info!("Deleting fine-tuned model {}", model);
            match client.models().delete(model).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => diagnostics.push(api_error("Failed to delete fine-tuned model", &e)),
            }
        }

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
impl ResourceWithConfigure for FineTuningJobResource {
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
