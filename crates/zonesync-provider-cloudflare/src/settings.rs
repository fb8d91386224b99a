//! Zone settings used when records are edge-proxied
//!
//! Proxied traffic reaches the origin over HTTPS, so the zone needs SSL mode
//! `full` (or `strict`), and Authenticated Origin Pull lets the origin verify
//! that requests come from the edge.

use crate::types::{CloudflareResponse, OriginPullSettings, ZoneSetting, ZoneSettingBody};
use crate::{CloudflareProvider, PROVIDER};
use std::fmt;
use zonesync_core::{Error, Result};

/// SSL/TLS encryption mode of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    /// No HTTPS
    Off,
    /// HTTPS to the edge, HTTP to the origin
    Flexible,
    /// HTTPS to the origin without certificate validation
    Full,
    /// HTTPS to the origin with certificate validation
    Strict,
}

impl SslMode {
    /// Wire value of the setting
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Off => "off",
            SslMode::Flexible => "flexible",
            SslMode::Full => "full",
            SslMode::Strict => "strict",
        }
    }

    /// Parse a wire value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(SslMode::Off),
            "flexible" => Some(SslMode::Flexible),
            "full" => Some(SslMode::Full),
            "strict" => Some(SslMode::Strict),
            _ => None,
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CloudflareProvider {
    fn zone_url(&self, path: &str) -> String {
        format!("{}/zones/{}/{}", self.base_url, self.zone_id, path)
    }

    /// Current SSL mode of the zone
    pub async fn ssl_mode(&self) -> Result<SslMode> {
        let request = self.client.get(self.zone_url("settings/ssl"));
        let envelope: CloudflareResponse<ZoneSetting> =
            self.send(request, "Get SSL mode").await?;

        let value = envelope
            .result
            .and_then(|setting| setting.value.as_str().map(str::to_string))
            .ok_or_else(|| Error::provider(PROVIDER, "SSL setting carried no string value"))?;

        SslMode::parse(&value)
            .ok_or_else(|| Error::provider(PROVIDER, format!("Unknown SSL mode: {}", value)))
    }

    /// Set the zone's SSL mode
    pub async fn set_ssl_mode(&self, mode: SslMode) -> Result<()> {
        let url = self.zone_url("settings/ssl");
        let body = ZoneSettingBody {
            value: mode.as_str(),
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PATCH {} with payload: {}",
                url,
                serde_json::to_string(&body)?
            );
            return Ok(());
        }

        let request = self.client.patch(url).json(&body);
        let _: CloudflareResponse<serde_json::Value> =
            self.send(request, "Set SSL mode").await?;

        tracing::info!(mode = %mode, zone_id = %self.zone_id, "Set Cloudflare SSL mode");
        Ok(())
    }

    /// Whether Authenticated Origin Pull is enabled for the zone
    pub async fn authenticated_origin_pull(&self) -> Result<bool> {
        let request = self
            .client
            .get(self.zone_url("origin_tls_client_auth/settings"));
        let envelope: CloudflareResponse<OriginPullSettings> = self
            .send(request, "Get Authenticated Origin Pull")
            .await?;

        Ok(envelope.result.is_some_and(|settings| settings.enabled))
    }

    /// Enable or disable Authenticated Origin Pull (origin mTLS)
    pub async fn set_authenticated_origin_pull(&self, enabled: bool) -> Result<()> {
        let url = self.zone_url("origin_tls_client_auth/settings");
        let body = OriginPullSettings { enabled };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would PUT {} with payload: {}",
                url,
                serde_json::to_string(&body)?
            );
            return Ok(());
        }

        let request = self.client.put(url).json(&body);
        let _: CloudflareResponse<serde_json::Value> = self
            .send(request, "Set Authenticated Origin Pull")
            .await?;

        tracing::info!(enabled, zone_id = %self.zone_id, "Set Cloudflare Authenticated Origin Pull");
        Ok(())
    }

    /// Prepare the zone for edge-proxied records
    ///
    /// Sets SSL mode `full` (the origin may present a self-signed or Origin CA
    /// certificate) and enables Authenticated Origin Pull. Stops at the first
    /// failure.
    pub async fn configure_for_proxy_mode(&self) -> Result<()> {
        self.set_ssl_mode(SslMode::Full).await?;
        self.set_authenticated_origin_pull(true).await
    }
}
