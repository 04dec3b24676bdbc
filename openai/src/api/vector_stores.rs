//! Vector stores API (v2), `/vector_stores`

use super::common::{ApiQueryParams, DeletedObject, ListResponse};
use super::error::ApiError;
use super::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub created_at: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub usage_bytes: i64,
    #[serde(default)]
    pub file_counts: FileCounts,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub expires_after: Option<ExpiresAfter>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub last_active_at: Option<i64>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCounts {
    #[serde(default)]
    pub in_progress: i64,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub failed: i64,
    #[serde(default)]
    pub cancelled: i64,
    #[serde(default)]
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiresAfter {
    pub anchor: String,
    pub days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateVectorStoreRequest {
    pub name: String,
    pub file_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<ExpiresAfter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// `expires_after` is sent as null to remove the expiration policy
#[derive(Debug, Clone, Serialize)]
pub struct ModifyVectorStoreRequest {
    pub name: String,
    pub expires_after: Option<ExpiresAfter>,
    pub metadata: HashMap<String, String>,
}

pub struct VectorStoresApi<'a> {
    client: &'a Client,
}

impl<'a> VectorStoresApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateVectorStoreRequest) -> Result<VectorStore, ApiError> {
        self.client.post("/vector_stores", request).await
    }

    pub async fn retrieve(&self, id: &str) -> Result<VectorStore, ApiError> {
        self.client.get(&format!("/vector_stores/{}", id)).await
    }

    pub async fn modify(
        &self,
        id: &str,
        request: &ModifyVectorStoreRequest,
    ) -> Result<VectorStore, ApiError> {
        self.client
            .post(&format!("/vector_stores/{}", id), request)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<DeletedObject, ApiError> {
        self.client.delete(&format!("/vector_stores/{}", id)).await
    }

    /// IDs of the files attached to a vector store
    pub async fn list_file_ids(&self, id: &str) -> Result<Vec<String>, ApiError> {
        let mut ids = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let params = ApiQueryParams::new()
                .add("limit", 100)
                .add("order", "asc")
                .add_optional("after", after.as_deref());
            let page: ListResponse<VectorStoreFile> = self
                .client
                .get(&format!(
                    "/vector_stores/{}/files{}",
                    id,
                    params.to_query_string()
                ))
                .await?;

            let last = page.data.last().map(|f| f.id.clone());
            ids.extend(page.data.into_iter().map(|f| f.id));

            match (page.has_more, last) {
                (true, Some(last)) => after = Some(last),
                _ => return Ok(ids),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::test_client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn create_vector_store() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/vector_stores")
            .match_header("openai-beta", "assistants=v2")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "docs",
                "file_ids": ["file-1", "file-2"],
                "expires_after": {"anchor": "last_active_at", "days": 7}
            })))
            .with_body(
                r#"{"id":"vs_1","object":"vector_store","created_at":1700000000,"name":"docs",
                    "usage_bytes":0,"file_counts":{"in_progress":2,"completed":0,"failed":0,"cancelled":0,"total":2},
                    "status":"in_progress","expires_after":{"anchor":"last_active_at","days":7},
                    "expires_at":null,"last_active_at":1700000000,"metadata":{}}"#,
            )
            .create_async()
            .await;

        let store = test_client(&server.url())
            .vector_stores()
            .create(&CreateVectorStoreRequest {
                name: "docs".to_string(),
                file_ids: vec!["file-1".to_string(), "file-2".to_string()],
                expires_after: Some(ExpiresAfter {
                    anchor: "last_active_at".to_string(),
                    days: 7,
                }),
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(store.file_counts.in_progress, 2);
        assert_eq!(store.status, "in_progress");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_file_ids_pages_through_files() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/vector_stores/vs_1/files")
            .match_query(Matcher::Exact("limit=100&order=asc".to_string()))
            .with_body(r#"{"object":"list","data":[{"id":"file-1","status":"completed"}],"has_more":true}"#)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/vector_stores/vs_1/files")
            .match_query(Matcher::Exact("limit=100&order=asc&after=file-1".to_string()))
            .with_body(r#"{"object":"list","data":[{"id":"file-2","status":"completed"}],"has_more":false}"#)
            .create_async()
            .await;

        let ids = test_client(&server.url())
            .vector_stores()
            .list_file_ids("vs_1")
            .await
            .unwrap();
        assert_eq!(ids, vec!["file-1".to_string(), "file-2".to_string()]);
    }

    #[test]
    fn modify_request_sends_null_expiration() {
        let request = ModifyVectorStoreRequest {
            name: "docs".to_string(),
            expires_after: None,
            metadata: HashMap::new(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"name": "docs", "expires_after": null, "metadata": {}})
        );
    }
}
