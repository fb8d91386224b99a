// # Cloudflare DNS Provider
//
// Record-level `DnsProvider` over the Cloudflare API v4.
//
// ## Behavior
//
// - One logical operation per trait call; listing follows every page
// - HTTP timeout of 30 seconds; a timeout surfaces as `Error::Timeout`
// - Status codes map onto the core error taxonomy (401/403, 404, 429, other)
// - Dry-run mode performs reads and only logs mutations
//
// Retries, caching and zone scope checks belong to the record store in
// `zonesync-core`; this crate does none of them.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails fast if the token or zone ID is empty
//
// ## API Reference
//
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=&name=&page=&per_page=`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`
// - SSL setting: GET/PATCH `/zones/:zone_id/settings/ssl`
// - Authenticated Origin Pull: GET/PUT `/zones/:zone_id/origin_tls_client_auth/settings`

mod settings;
mod types;

pub use settings::SslMode;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use types::{CloudflareDnsRecord, CloudflareResponse, DnsRecordBody};
use zonesync_core::config::ProviderConfig;
use zonesync_core::traits::{
    DnsProvider, DnsProviderFactory, ProviderRecord, RecordFilter, RecordSpec, RecordType,
};
use zonesync_core::{Error, Result};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per page when listing
const PAGE_SIZE: u32 = 100;

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests
/// - Log the intended POST/PUT/DELETE
/// - **NOT** modify any DNS record; mutations report synthetic success
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone the records live in
    zone_id: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// If true, perform GET requests but skip mutations
    dry_run: bool,

    /// API root, without a trailing slash
    base_url: String,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("dry_run", &self.dry_run)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport failure; only timeouts are retryable
fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(PROVIDER, e.to_string())
    } else {
        Error::http(e.to_string())
    }
}

fn status_error(status: StatusCode, detail: &str, what: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions ({}): {}",
            status, detail
        )),
        404 => Error::not_found(format!("{}: {}", what, detail)),
        429 => Error::rate_limited(format!("{} ({})", detail, status)),
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", what, status, detail)),
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permission
    /// - `zone_id`: Zone the managed records live in
    /// - `dry_run`: If true, perform GET requests but skip mutations
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the token or zone ID is empty, or the HTTP client
    /// cannot be built.
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        Ok(Self {
            api_token,
            zone_id,
            client: build_client(DEFAULT_HTTP_TIMEOUT)?,
            dry_run,
            base_url: CLOUDFLARE_API_BASE.to_string(),
        })
    }

    /// Point the provider at another API root (a mock server in tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Whether mutations are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.records_url(), id)
    }

    /// Send an authenticated request and unwrap the response envelope
    ///
    /// `what` names the operation in error messages.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<CloudflareResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        tracing::debug!(status = %status, operation = what, "Cloudflare response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<CloudflareResponse<serde_json::Value>>(&body)
                .map(|envelope| envelope.error_summary())
                .unwrap_or(body);
            return Err(status_error(status, &detail, what));
        }

        let envelope: CloudflareResponse<T> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                transport_error(e)
            } else {
                Error::provider(PROVIDER, format!("Failed to parse {} response: {}", what, e))
            }
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", what, envelope.error_summary()),
            ));
        }

        Ok(envelope)
    }
}

fn record_body(spec: &RecordSpec) -> DnsRecordBody<'_> {
    DnsRecordBody {
        record_type: spec.record_type.as_str(),
        name: &spec.name,
        content: &spec.content,
        ttl: spec.ttl,
        proxied: spec.proxied,
    }
}

fn into_provider_record(record: CloudflareDnsRecord) -> Option<ProviderRecord> {
    let record_type = RecordType::parse(&record.record_type)?;
    Some(ProviderRecord {
        id: record.id,
        name: record.name,
        record_type,
        content: record.content,
        ttl: record.ttl,
        proxied: record.proxied.unwrap_or(false),
    })
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<ProviderRecord>> {
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ];
            if let Some(record_type) = filter.record_type {
                query.push(("type", record_type.as_str().to_string()));
            }
            if let Some(name) = &filter.name {
                query.push(("name", name.clone()));
            }

            let request = self.client.get(self.records_url()).query(&query);
            let envelope: CloudflareResponse<Vec<CloudflareDnsRecord>> =
                self.send(request, "List DNS records").await?;

            let batch = envelope.result.unwrap_or_default();
            let batch_len = batch.len();
            records.extend(batch.into_iter().filter_map(into_provider_record));

            let total_pages = envelope.result_info.map_or(1, |info| {
                tracing::debug!(page = info.page, total_pages = info.total_pages, "Listed page");
                info.total_pages
            });
            if batch_len == 0 || page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(records
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect())
    }

    async fn create_record(&self, spec: &RecordSpec) -> Result<ProviderRecord> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would POST {} with payload: {}",
                self.records_url(),
                serde_json::to_string(&record_body(spec))?
            );
            return Ok(ProviderRecord {
                id: format!("dry-run-{}-{}", spec.record_type, spec.name),
                name: spec.name.clone(),
                record_type: spec.record_type,
                content: spec.content.clone(),
                ttl: spec.ttl,
                proxied: spec.proxied,
            });
        }

        let request = self.client.post(self.records_url()).json(&record_body(spec));
        let envelope: CloudflareResponse<CloudflareDnsRecord> =
            self.send(request, "Create DNS record").await?;

        envelope
            .result
            .and_then(into_provider_record)
            .ok_or_else(|| Error::provider(PROVIDER, "Create response carried no A/AAAA record"))
    }

    async fn update_record(&self, id: &str, spec: &RecordSpec) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PUT {} with payload: {}",
                self.record_url(id),
                serde_json::to_string(&record_body(spec))?
            );
            return Ok(());
        }

        let request = self.client.put(self.record_url(id)).json(&record_body(spec));
        let _: CloudflareResponse<serde_json::Value> =
            self.send(request, "Update DNS record").await?;
        Ok(())
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would DELETE {}", self.record_url(id));
            return Ok(());
        }

        let request = self.client.delete(self.record_url(id));
        let _: CloudflareResponse<serde_json::Value> =
            self.send(request, "Delete DNS record").await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Whether the process runs in dry-run mode (`ZONESYNC_MODE=dry-run`)
fn dry_run_from_env() -> bool {
    std::env::var("ZONESYNC_MODE")
        .map(|mode| mode.eq_ignore_ascii_case("dry-run"))
        .unwrap_or(false)
}

impl CloudflareProvider {
    /// Build a provider from a [`ProviderConfig::Cloudflare`]
    ///
    /// Dry-run mode is taken from `ZONESYNC_MODE`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        match config {
            ProviderConfig::Cloudflare { api_token, zone_id } => {
                let dry_run = dry_run_from_env();
                if dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }
                Self::new(api_token.clone(), zone_id.clone(), dry_run)
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<std::sync::Arc<dyn DnsProvider>> {
        Ok(std::sync::Arc::new(CloudflareProvider::from_config(config)?))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// zonesync_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &zonesync_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
