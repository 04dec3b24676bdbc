//! Organization projects and their service accounts,
//! `/organization/projects`. All of these require the admin key.

use super::common::{ApiQueryParams, DeletedObject, ListResponse};
use super::error::ApiError;
use super::Client;
use serde::{Deserialize, Serialize};

pub const STATUS_ARCHIVED: &str = "archived";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub name: String,
    pub created_at: i64,
    #[serde(default)]
    pub archived_at: Option<i64>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
struct ProjectRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub name: String,
    pub role: String,
    pub created_at: i64,
}

/// Creation is the only response that carries the key value
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedServiceAccount {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub name: String,
    pub role: String,
    pub created_at: i64,
    pub api_key: ServiceAccountApiKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountApiKey {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub name: Option<String>,
    pub value: String,
    pub created_at: i64,
}

pub struct ProjectsApi<'a> {
    client: &'a Client,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn service_accounts(&self, project_id: &'a str) -> ServiceAccountsApi<'a> {
        ServiceAccountsApi {
            client: self.client,
            project_id,
        }
    }

    pub async fn list(&self, include_archived: bool) -> Result<Vec<Project>, ApiError> {
        let mut projects = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let params = ApiQueryParams::new()
                .add("limit", 100)
                .add("include_archived", include_archived)
                .add_optional("after", after.as_deref());
            let page: ListResponse<Project> = self
                .client
                .get(&format!("/organization/projects{}", params.to_query_string()))
                .await?;

            let next = page
                .last_id
                .clone()
                .or_else(|| page.data.last().map(|p| p.id.clone()));
            projects.extend(page.data);

            match (page.has_more, next) {
                (true, Some(next)) => after = Some(next),
                _ => return Ok(projects),
            }
        }
    }

    pub async fn retrieve(&self, id: &str) -> Result<Project, ApiError> {
        self.client
            .get(&format!("/organization/projects/{}", id))
            .await
    }

    pub async fn create(&self, name: &str) -> Result<Project, ApiError> {
        self.client
            .post("/organization/projects", &ProjectRequest { name })
            .await
    }

    pub async fn modify(&self, id: &str, name: &str) -> Result<Project, ApiError> {
        self.client
            .post(
                &format!("/organization/projects/{}", id),
                &ProjectRequest { name },
            )
            .await
    }

    /// Projects cannot be deleted, only archived
    pub async fn archive(&self, id: &str) -> Result<Project, ApiError> {
        self.client
            .post_empty(&format!("/organization/projects/{}/archive", id))
            .await
    }
}

pub struct ServiceAccountsApi<'a> {
    client: &'a Client,
    project_id: &'a str,
}

impl<'a> ServiceAccountsApi<'a> {
    fn path(&self) -> String {
        format!("/organization/projects/{}/service_accounts", self.project_id)
    }

    pub async fn list(&self) -> Result<Vec<ServiceAccount>, ApiError> {
        let mut accounts = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let params = ApiQueryParams::new()
                .add("limit", 100)
                .add_optional("after", after.as_deref());
            let page: ListResponse<ServiceAccount> = self
                .client
                .get(&format!("{}{}", self.path(), params.to_query_string()))
                .await?;

            let next = page
                .last_id
                .clone()
                .or_else(|| page.data.last().map(|a| a.id.clone()));
            accounts.extend(page.data);

            match (page.has_more, next) {
                (true, Some(next)) => after = Some(next),
                _ => return Ok(accounts),
            }
        }
    }

    pub async fn retrieve(&self, id: &str) -> Result<ServiceAccount, ApiError> {
        self.client.get(&format!("{}/{}", self.path(), id)).await
    }

    pub async fn create(&self, name: &str) -> Result<CreatedServiceAccount, ApiError> {
        self.client
            .post(&self.path(), &ProjectRequest { name })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<DeletedObject, ApiError> {
        self.client.delete(&format!("{}/{}", self.path(), id)).await
    }
}
