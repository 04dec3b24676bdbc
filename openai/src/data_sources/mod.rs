//! Data source implementations
//!
//! Each module holds the single-object data source and its list
//! counterpart, which share one attribute set.

pub mod file;
pub mod finetuning_job;
pub mod model;
pub mod project;
pub mod project_service_account;

pub use file::{FileDataSource, FilesDataSource};
pub use finetuning_job::{FineTuningJobDataSource, FineTuningJobsDataSource};
pub use model::{ModelDataSource, ModelsDataSource};
pub use project::{ProjectDataSource, ProjectsDataSource};
pub use project_service_account::{
    ProjectServiceAccountDataSource, ProjectServiceAccountsDataSource,
};

use crate::provider_data::OpenAIProviderData;
use tfplug::data_source::{ConfigureDataSourceRequest, ConfigureDataSourceResponse, ReadDataSourceResponse};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedType};
use tfplug::{Diagnostic, DynamicValue};

pub(crate) fn computed(name: &str, kind: AttributeType, description: &str) -> Attribute {
    AttributeBuilder::new(name, kind)
        .description(description)
        .computed()
        .build()
}

pub(crate) fn required(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .build()
}

/// Computed list of objects, the payload of every list data source
pub(crate) fn computed_list(name: &str, attributes: Vec<Attribute>, description: &str) -> Attribute {
    AttributeBuilder::nested(name, NestedType::list(attributes))
        .description(description)
        .computed()
        .build()
}

/// Read outcome carrying the config back with a single error
pub(crate) fn read_failed(config: DynamicValue, diagnostic: Diagnostic) -> ReadDataSourceResponse {
    ReadDataSourceResponse {
        state: config,
        diagnostics: vec![diagnostic],
        deferred: None,
    }
}

pub(crate) fn read_ok(state: DynamicValue) -> ReadDataSourceResponse {
    ReadDataSourceResponse {
        state,
        diagnostics: vec![],
        deferred: None,
    }
}

pub(crate) fn configure_data_source(
    slot: &mut Option<OpenAIProviderData>,
    request: ConfigureDataSourceRequest,
) -> ConfigureDataSourceResponse {
    let diagnostics = match OpenAIProviderData::from_any(request.provider_data) {
        Ok(data) => {
            *slot = data;
            vec![]
        }
        Err(diag) => vec![diag],
    };
    ConfigureDataSourceResponse { diagnostics }
}
