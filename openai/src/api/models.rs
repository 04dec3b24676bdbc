//! Models API, `/models`

use super::common::{DeletedObject, ListResponse};
use super::error::ApiError;
use super::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub created: i64,
    #[serde(default)]
    pub object: String,
    pub owned_by: String,
}

pub struct ModelsApi<'a> {
    client: &'a Client,
}

impl<'a> ModelsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Model>, ApiError> {
        let response: ListResponse<Model> = self.client.get("/models").await?;
        Ok(response.data)
    }

    pub async fn retrieve(&self, id: &str) -> Result<Model, ApiError> {
        self.client.get(&format!("/models/{}", id)).await
    }

    /// Deletes a fine-tuned model owned by the organization
    pub async fn delete(&self, id: &str) -> Result<DeletedObject, ApiError> {
        self.client.delete(&format!("/models/{}", id)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::api::test_helpers::test_client;
    use mockito::Server;

    #[tokio::test]
    async fn retrieve_model() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/models/gpt-4o")
            .with_body(r#"{"id":"gpt-4o","object":"model","created":1715367049,"owned_by":"system"}"#)
            .create_async()
            .await;

        let model = test_client(&server.url())
            .models()
            .retrieve("gpt-4o")
            .await
            .unwrap();
        assert_eq!(model.owned_by, "system");
        assert_eq!(model.created, 1715367049);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delete_fine_tuned_model() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/models/ft:gpt-4o-mini:org::abc")
            .with_body(r#"{"id":"ft:gpt-4o-mini:org::abc","object":"model","deleted":true}"#)
            .create_async()
            .await;

        let deleted = test_client(&server.url())
            .models()
            .delete("ft:gpt-4o-mini:org::abc")
            .await
            .unwrap();
        assert!(deleted.deleted);
        mock.assert_async().await;
    }
}
