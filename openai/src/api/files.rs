//! Files API, `/files`

use super::common::{ApiQueryParams, DeletedObject, ListResponse};
use super::error::ApiError;
use super::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub bytes: i64,
    pub created_at: i64,
    pub filename: String,
    pub purpose: String,
}

pub struct FilesApi<'a> {
    client: &'a Client,
}

impl<'a> FilesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, purpose: Option<&str>) -> Result<Vec<File>, ApiError> {
        let params = ApiQueryParams::new().add_optional("purpose", purpose);
        let response: ListResponse<File> = self
            .client
            .get(&format!("/files{}", params.to_query_string()))
            .await?;
        Ok(response.data)
    }

    pub async fn retrieve(&self, id: &str) -> Result<File, ApiError> {
        self.client.get(&format!("/files/{}", id)).await
    }

    /// Uploads the file at `path` as a multipart form
    pub async fn upload(&self, path: &Path, purpose: &str) -> Result<File, ApiError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| ApiError::FileError {
                path: path.display().to_string(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        tracing::debug!("Uploading {} ({} bytes)", filename, contents.len());
        self.client
            .post_multipart("/files", || {
                Form::new().text("purpose", purpose.to_string()).part(
                    "file",
                    Part::bytes(contents.clone()).file_name(filename.clone()),
                )
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<DeletedObject, ApiError> {
        self.client.delete(&format!("/files/{}", id)).await
    }
}
