use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Uniform success envelope: `{status, token?, results?, requestedAt?,
/// message?, data?}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            token: None,
            results: None,
            requested_at: None,
            message: None,
            data: Some(data),
        }
    }

    /// List envelope: adds the result count and the request timestamp.
    pub fn list(data: T, results: usize) -> Self {
        let requested_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        Self {
            status: "success",
            token: None,
            results: Some(results),
            requested_at,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl Envelope<serde_json::Value> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            token: None,
            results: None,
            requested_at: None,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn token_only(token: String) -> Self {
        Self {
            status: "success",
            token: Some(token),
            results: None,
            requested_at: None,
            message: None,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_omits_absent_fields() {
        let envelope = Envelope::success(json!({"name": "The Forest Hiker"}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["name"], "The Forest Hiker");
        assert!(value.get("token").is_none());
        assert!(value.get("results").is_none());
        assert!(value.get("message").is_none());
    }

    #[test]
    fn list_envelope_counts_results_and_stamps_request_time() {
        let envelope = Envelope::list(json!([1, 2, 3]), 3);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["results"], 3);
        assert!(value["requestedAt"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn token_only_envelope_carries_just_the_token() {
        let envelope = Envelope::token_only("abc".into());
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["token"], "abc");
        assert!(value.get("data").is_none());
    }
}
