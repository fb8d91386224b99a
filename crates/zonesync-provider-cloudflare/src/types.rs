//! Cloudflare API v4 wire types

use serde::{Deserialize, Serialize};

/// Envelope every Cloudflare API response is wrapped in
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<CloudflareResultInfo>,
}

impl<T> CloudflareResponse<T> {
    /// Joined error messages, for logs and error values
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "Unknown error".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// DNS record as returned by the API
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: Option<bool>,
}

/// Request body for create (POST) and overwrite (PUT)
#[derive(Debug, Serialize)]
pub(crate) struct DnsRecordBody<'a> {
    #[serde(rename = "type")]
    pub record_type: &'a str,
    pub name: &'a str,
    pub content: &'a str,
    pub ttl: u32,
    pub proxied: bool,
}

/// A zone setting such as `ssl`
#[derive(Debug, Deserialize)]
pub(crate) struct ZoneSetting {
    pub value: serde_json::Value,
}

/// Request body for PATCH `/settings/:name`
#[derive(Debug, Serialize)]
pub(crate) struct ZoneSettingBody<'a> {
    pub value: &'a str,
}

/// Zone-level Authenticated Origin Pull state, read and written as-is
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OriginPullSettings {
    pub enabled: bool,
}
