//! Fine-tuning jobs API, `/fine_tuning/jobs`

use super::common::{ApiQueryParams, ListResponse};
use super::error::ApiError;
use super::Client;
use serde::{Deserialize, Serialize};

pub const STATUS_SUCCEEDED: &str = "succeeded";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTuningJob {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub created_at: i64,
    #[serde(default)]
    pub finished_at: Option<i64>,
    pub model: String,
    #[serde(default)]
    pub fine_tuned_model: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub hyperparameters: Option<Hyperparameters>,
    pub training_file: String,
    #[serde(default)]
    pub validation_file: Option<String>,
    #[serde(default)]
    pub result_files: Vec<String>,
    #[serde(default)]
    pub trained_tokens: Option<i64>,
    #[serde(default, alias = "user_provided_suffix")]
    pub suffix: Option<String>,
}

impl FineTuningJob {
    /// True once the job can no longer change
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status.as_str(),
            STATUS_SUCCEEDED | STATUS_FAILED | STATUS_CANCELLED
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hyperparameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_epochs: Option<NEpochs>,
}

/// The API reports `"auto"` until it has picked an epoch count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NEpochs {
    Count(i64),
    Auto(String),
}

impl NEpochs {
    pub fn count(&self) -> Option<i64> {
        match self {
            NEpochs::Count(n) => Some(*n),
            NEpochs::Auto(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFineTuningJobRequest {
    pub model: String,
    pub training_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparameters: Option<Hyperparameters>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FineTuningEvent {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub level: String,
    pub message: String,
}

/// Keeps the events of a newest-first page that come after `last_seen`,
/// returned oldest first.
fn unseen_events(page: Vec<FineTuningEvent>, last_seen: Option<&str>) -> Vec<FineTuningEvent> {
    let mut events: Vec<FineTuningEvent> = page
        .into_iter()
        .take_while(|event| Some(event.id.as_str()) != last_seen)
        .collect();
    events.reverse();
    events
}

pub struct FineTuningApi<'a> {
    client: &'a Client,
}

impl<'a> FineTuningApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &CreateFineTuningJobRequest) -> Result<FineTuningJob, ApiError> {
        self.client.post("/fine_tuning/jobs", request).await
    }

    pub async fn retrieve(&self, id: &str) -> Result<FineTuningJob, ApiError> {
        self.client.get(&format!("/fine_tuning/jobs/{}", id)).await
    }

    /// Lists every job, following `has_more` pagination
    pub async fn list(&self) -> Result<Vec<FineTuningJob>, ApiError> {
        let mut jobs = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let params = ApiQueryParams::new()
                .add("limit", 100)
                .add_optional("after", after.as_deref());
            let page: ListResponse<FineTuningJob> = self
                .client
                .get(&format!("/fine_tuning/jobs{}", params.to_query_string()))
                .await?;

            let has_more = page.has_more;
            let last = page.data.last().map(|job| job.id.clone());
            jobs.extend(page.data);

            match (has_more, last) {
                (true, Some(last)) => after = Some(last),
                _ => return Ok(jobs),
            }
        }
    }

    /// Events recorded after `last_seen`, oldest first.
    ///
    /// The API lists events newest first and its `after` cursor pages
    /// towards older events, so the latest page is fetched and cut at the
    /// event that was already seen. Without `last_seen` the whole page is new.
    pub async fn events_since(
        &self,
        id: &str,
        last_seen: Option<&str>,
    ) -> Result<Vec<FineTuningEvent>, ApiError> {
        let params = ApiQueryParams::new().add("limit", 100);
        let page: ListResponse<FineTuningEvent> = self
            .client
            .get(&format!(
                "/fine_tuning/jobs/{}/events{}",
                id,
                params.to_query_string()
            ))
            .await?;

        Ok(unseen_events(page.data, last_seen))
    }

    pub async fn cancel(&self, id: &str) -> Result<FineTuningJob, ApiError> {
        self.client
            .post_empty(&format!("/fine_tuning/jobs/{}/cancel", id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::test_client;
    use mockito::{Matcher, Server};

    fn job(id: &str, status: &str) -> String {
        format!(
            r#"{{"id":"{}","object":"fine_tuning.job","created_at":1700000000,"finished_at":null,"model":"gpt-4o-mini-2024-07-18","fine_tuned_model":null,"organization_id":"org-1","status":"{}","hyperparameters":{{"n_epochs":"auto"}},"training_file":"file-train","validation_file":null,"result_files":[],"trained_tokens":null}}"#,
            id, status
        )
    }

    #[test]
    fn parses_auto_and_numeric_epochs() {
        let auto: Hyperparameters = serde_json::from_str(r#"{"n_epochs":"auto"}"#).unwrap();
        assert_eq!(auto.n_epochs.and_then(|n| n.count()), None);
        let fixed: Hyperparameters = serde_json::from_str(r#"{"n_epochs":3}"#).unwrap();
        assert_eq!(fixed.n_epochs.and_then(|n| n.count()), Some(3));
    }

    #[test]
    fn create_request_omits_unset_fields() {
        let request = CreateFineTuningJobRequest {
            model: "gpt-4o-mini".to_string(),
            training_file: "file-train".to_string(),
            validation_file: None,
            suffix: None,
            hyperparameters: Some(Hyperparameters {
                n_epochs: Some(NEpochs::Count(2)),
            }),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "gpt-4o-mini",
                "training_file": "file-train",
                "hyperparameters": {"n_epochs": 2}
            })
        );
    }

    #[tokio::test]
    async fn list_follows_pagination() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/fine_tuning/jobs")
            .match_query(Matcher::Exact("limit=100".to_string()))
            .with_body(format!(
                r#"{{"object":"list","data":[{}],"has_more":true}}"#,
                job("ftjob-1", "running")
            ))
            .create_async()
            .await;
        let second = server
            .mock("GET", "/fine_tuning/jobs")
            .match_query(Matcher::Exact("limit=100&after=ftjob-1".to_string()))
            .with_body(format!(
                r#"{{"object":"list","data":[{}],"has_more":false}}"#,
                job("ftjob-2", "succeeded")
            ))
            .create_async()
            .await;

        let jobs = test_client(&server.url()).fine_tuning().list().await.unwrap();
        assert_eq!(
            jobs.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(),
            vec!["ftjob-1", "ftjob-2"]
        );
        assert!(jobs[1].is_finished());
        first.assert_async().await;
        second.assert_async().await;
    }

    fn event(id: &str, message: &str) -> FineTuningEvent {
        FineTuningEvent {
            id: id.to_string(),
            created_at: 0,
            level: "info".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn unseen_events_stop_at_last_seen() {
        let page = vec![
            event("ev-3", "Step 2/10"),
            event("ev-2", "Step 1/10"),
            event("ev-1", "Job started"),
        ];
        let ids = |events: Vec<FineTuningEvent>| {
            events.into_iter().map(|e| e.id).collect::<Vec<_>>()
        };

        assert_eq!(ids(unseen_events(page.clone(), None)), ["ev-1", "ev-2", "ev-3"]);
        assert_eq!(ids(unseen_events(page.clone(), Some("ev-2"))), ["ev-3"]);
        assert!(unseen_events(page.clone(), Some("ev-3")).is_empty());
        // An id that scrolled off the page keeps the whole page.
        assert_eq!(ids(unseen_events(page, Some("ev-0"))).len(), 3);
    }

    #[tokio::test]
    async fn events_since_reads_latest_page_oldest_first() {
        let mut server = Server::new_async().await;
        let latest = server
            .mock("GET", "/fine_tuning/jobs/ftjob-1/events")
            .match_query(Matcher::Exact("limit=100".to_string()))
            .with_body(
                r#"{"object":"list","data":[
                    {"id":"ev-3","created_at":3,"level":"info","message":"Step 2/10"},
                    {"id":"ev-2","created_at":2,"level":"info","message":"Step 1/10"},
                    {"id":"ev-1","created_at":1,"level":"info","message":"Job started"}
                ],"has_more":false}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let events = client.fine_tuning().events_since("ftjob-1", None).await.unwrap();
        assert_eq!(events[0].message, "Job started");
        assert_eq!(events[2].id, "ev-3");

        let events = client
            .fine_tuning()
            .events_since("ftjob-1", Some("ev-2"))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ev-3");
        latest.assert_async().await;
    }
}
