use jiff::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateUrlRequest {
    pub original_url: String,
    /// Requested code. An empty string is treated as absent.
    #[serde(default)]
    pub custom_code: Option<String>,
    /// Lifetime in hours. Absent means the configured default.
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUrlResponse {
    pub short_url: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
