//! Resource implementations

pub mod assistant;
pub mod file;
pub mod finetuning_job;
pub mod project;
pub mod project_service_account;
pub mod vector_store;

pub use assistant::AssistantResource;
pub use file::FileResource;
pub use finetuning_job::FineTuningJobResource;
pub use project::ProjectResource;
pub use project_service_account::ProjectServiceAccountResource;
pub use vector_store::VectorStoreResource;
