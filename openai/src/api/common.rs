//! Common types shared by the OpenAI endpoints

use serde::Deserialize;

/// Paged list envelope, `{"object":"list","data":[...],"has_more":..}`
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

/// Response of every DELETE endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedObject {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub deleted: bool,
}

/// The error body the API sends with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub details: super::error::ApiErrorDetails,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            return String::new();
        }
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("?{}", encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encodes_values() {
        let params = ApiQueryParams::new()
            .add("purpose", "fine tune")
            .add_optional("after", None::<String>)
            .add_optional("limit", Some(100));
        assert_eq!(params.to_query_string(), "?purpose=fine+tune&limit=100");
        assert_eq!(ApiQueryParams::new().to_query_string(), "");
    }

    #[test]
    fn list_response_defaults_pagination_fields() {
        let list: ListResponse<serde_json::Value> =
            serde_json::from_str(r#"{"object":"list","data":[{"id":"a"}]}"#).unwrap();
        assert_eq!(list.data.len(), 1);
        assert!(!list.has_more);
        assert!(list.last_id.is_none());
    }

    #[test]
    fn error_body_parses_details() {
        let body: ApiErrorResponse = serde_json::from_str(
            r#"{"error":{"message":"No such File object: file-1","type":"invalid_request_error","param":"id","code":null}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "No such File object: file-1");
        assert_eq!(
            body.error.details.error_type.as_deref(),
            Some("invalid_request_error")
        );
        assert_eq!(body.error.details.param.as_deref(), Some("id"));
        assert!(body.error.details.code.is_none());
    }
}
