//! `openai_file` and `openai_files` data sources

use super::{computed, computed_list, configure_data_source, read_failed, read_ok, required};
use crate::api::files::File;
use crate::provider_data::{api_error, not_configured, OpenAIProviderData};
use crate::resources::file::FILE_PURPOSES;
use crate::state::{object, optional_string, required_string};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::validator::StringOneOfValidator;
use tfplug::{Dynamic, DynamicValue};

fn file_object(file: &File) -> Dynamic {
    object([
        ("id", file.id.as_str().into()),
        ("bytes", file.bytes.into()),
        ("created", file.created_at.into()),
        ("filename", file.filename.as_str().into()),
        ("object", file.object.as_str().into()),
        ("purpose", file.purpose.as_str().into()),
    ])
}

fn file_attributes(id: Attribute) -> Vec<Attribute> {
    vec![
        id,
        computed("bytes", AttributeType::Number, "The size of the file, in bytes."),
        computed(
            "created",
            AttributeType::Number,
            "The Unix timestamp (in seconds) for when the file was created.",
        ),
        computed("filename", AttributeType::String, "The name of the file."),
        computed("object", AttributeType::String, "The object type, which is always file."),
        computed("purpose", AttributeType::String, "The intended purpose of the file."),
    ]
}

#[derive(Default)]
pub struct FileDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl FileDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    fn type_name(&self) -> &str {
        "openai_file"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = file_attributes(required("id", "The file identifier."))
            .into_iter()
            .fold(
                SchemaBuilder::new().description("Reads an uploaded file"),
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

        match provider_data.client.files().retrieve(&id).await {
            Ok(file) => read_ok(DynamicValue::new(file_object(&file))),
            Err(e) => read_failed(request.config, api_error("Failed to read file", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for FileDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}

#[derive(Default)]
pub struct FilesDataSource {
    provider_data: Option<OpenAIProviderData>,
}

impl FilesDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for FilesDataSource {
    fn type_name(&self) -> &str {
        "openai_files"
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("Lists the files uploaded to the organization")
            .attribute(computed("id", AttributeType::String, "Identifier of this listing."))
            .attribute(
                AttributeBuilder::new("purpose", AttributeType::String)
                    .description("Only return files with the given purpose.")
                    .optional()
                    .validator(StringOneOfValidator::create(FILE_PURPOSES))
                    .build(),
            )
            .attribute(computed_list(
                "files",
                file_attributes(computed("id", AttributeType::String, "The file identifier.")),
                "The matching files.",
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
        let purpose = optional_string(&request.config, "purpose");

        match provider_data.client.files().list(purpose.as_deref()).await {
            Ok(files) => {
                tracing::debug!("Listed {} files", files.len());
                read_ok(DynamicValue::new(object([
                    ("id", purpose.as_deref().unwrap_or("all").into()),
                    ("purpose", purpose.clone().into()),
                    ("files", Dynamic::List(files.iter().map(file_object).collect())),
                ])))
            }
            Err(e) => read_failed(request.config, api_error("Failed to list files", &e)),
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for FilesDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        configure_data_source(&mut self.provider_data, request)
    }
}
