use serde::Deserialize;

/// Profile update payload. The password fields are captured only so their
/// presence can be rejected; this route never changes credentials.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<serde_json::Value>,
    pub password_confirm: Option<serde_json::Value>,
}
