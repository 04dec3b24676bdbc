//! `openai_finetuning_job` and `openai_finetuning_jobs` data sources

use super::{computed, computed_list, configure_data_source, read_failed, read_ok, required};
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::resources::finetuning_job::job_object;
use crate::state::{object, required_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType, SchemaBuilder};
use tfplug::{Dynamic, DynamicValue};

fn job_attributes(id: Attribute) -> Vec<Attribute> {
    let string = |name: &str, description: &str| computed(name, AttributeType::String, description);
    let number = |name: &str, description: &str| computed(name, AttributeType::Number, description);
    vec![
        id,
        string("object", "The object type, which is always fine_tuning.job."),
        number("created_at", "The Unix timestamp (in seconds) for when the job was created."),
        number("finished_at", "The Unix timestamp (in seconds) for when the job was finished."),
        string("model", "The base model that is being fine-tuned."),
        string("fine_tuned_model", "The name of the fine-tuned model that is being created."),
        string("organization_id", "The organization that owns the job."),
        string("status", "The current status of the job."),
        string("training_file", "The file ID used for training."),
        string("validation_file", "The file ID used for validation."),
        computed(
            "result_files",
            AttributeType::list(AttributeType::String),
            "The compiled results file ID(s) for the job.",
        ),
        number("trained_tokens", "The total number of billable tokens processed by this job."),
        string("suffix", "The suffix added to the fine-tuned model name."),
        AttributeBuilder::nested(
            "hyperparams",
            NestedType::single(vec![number("n_epochs", "The number of epochs to train the model for.")]),
        )
        .description("The hyperparameters used for the job.")
        .computed()
        .build(),
    ]
}

#[derive(Default)]
pub struct FineTuningJobDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl FineTuningJobDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for FineTuningJobDataSource {
    fn type_name(&self) -> &str {
        "openai_finetuning_job"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = job_attributes(required("id", "The fine-tuning job identifier."))
            .into_iter()
            .fold(
                SchemaBuilder::new().description("Reads a fine-tuning job"),
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

        match provider_data.client.fine_tuning().retrieve(&id).await {
            Ok(job) => read_ok(DynamicValue::new(job_object(&job))),
            Err(e) => read_failed(request.config, api_error("Failed to read fine-tuning job", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for FineTuningJobDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct FineTuningJobsDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl FineTuningJobsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for FineTuningJobsDataSource {
    fn type_name(&self) -> &str {
        "openai_finetuning_jobs"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Lists the organization's fine-tuning jobs")
            .attribute(computed("id", AttributeType::String, "Identifier of this listing."))
            .attribute(computed_list(
                "jobs",
                job_attributes(computed("id", AttributeType::String, "The fine-tuning job identifier.")),
                "Every fine-tuning job, newest first.",
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

        match provider_data.client.fine_tuning().list().await {
            Ok(jobs) => read_ok(DynamicValue::new(object([
                ("id", "finetuning_jobs".into()),
                ("jobs", Dynamic::List(jobs.iter().map(job_object).collect())),
            ]))),
            Err(e) => read_failed(request.config, api_error("Failed to list fine-tuning jobs", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for FineTuningJobsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
