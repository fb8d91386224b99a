//! Configuration types for the zonesync engine
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum TTL accepted for non-proxied records (seconds)
pub const MIN_TTL_SECONDS: u32 = 60;

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSyncConfig {
    /// Zone to keep synchronized
    pub zone: ZoneConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Retry policy for provider calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ZoneSyncConfig {
    /// Create a configuration for a zone with default provider and engine settings
    pub fn new(zone: ZoneConfig) -> Self {
        Self {
            zone,
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.zone.validate()?;
        self.provider.validate()?;
        self.retry.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Zone configuration
///
/// `base_domain` is not stored: it is derived from `root_domain` and
/// `prefix_mode`, which keeps it a parent suffix of the root by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Root domain that owns every service record (e.g. "home.example.com")
    pub root_domain: String,

    /// Flatten service names into `service-zone.parent` labels
    #[serde(default)]
    pub prefix_mode: bool,

    /// Route records through the provider's edge proxy
    #[serde(default)]
    pub proxied: bool,

    /// TTL for non-proxied records, in seconds
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u32,
}

impl ZoneConfig {
    /// Create a zone configuration in direct mode with default TTL
    pub fn new(root_domain: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into(),
            prefix_mode: false,
            proxied: false,
            ttl_seconds: default_ttl_seconds(),
        }
    }

    /// Enable or disable prefix mode
    pub fn with_prefix_mode(mut self, prefix_mode: bool) -> Self {
        self.prefix_mode = prefix_mode;
        self
    }

    /// Enable or disable edge proxying
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Set the TTL
    pub fn with_ttl_seconds(mut self, ttl_seconds: u32) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Base domain records are published under
    ///
    /// In prefix mode this is the parent of the root domain
    /// ("zone.example.com" -> "example.com"); otherwise the root itself.
    pub fn base_domain(&self) -> String {
        let root = crate::zone::normalize_name(&self.root_domain);
        if self.prefix_mode {
            if let Some((_, parent)) = root.split_once('.') {
                return parent.to_string();
            }
        }
        root
    }

    /// Validate the zone configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let root = crate::zone::normalize_name(&self.root_domain);
        crate::zone::validate_domain_name(&root)?;

        if !root.contains('.') {
            return Err(crate::Error::config(format!(
                "Root domain must have at least two labels. Got: {}",
                self.root_domain
            )));
        }

        if self.prefix_mode && !self.base_domain().contains('.') {
            return Err(crate::Error::config(format!(
                "Prefix mode needs a root domain with at least three labels, \
                 otherwise records would be published under a top-level domain. Got: {}",
                self.root_domain
            )));
        }

        if self.ttl_seconds < MIN_TTL_SECONDS {
            return Err(crate::Error::config(format!(
                "TTL must be at least {} seconds. Got: {}",
                MIN_TTL_SECONDS, self.ttl_seconds
            )));
        }

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID the records live in
        zone_id: String,
    },

    /// In-memory provider (nothing leaves the process)
    #[default]
    Memory,

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, zone_id } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if zone_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare zone ID cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Memory => Ok(()),
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Memory => "memory",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry (milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound for any single backoff (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Validate the retry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_retries must be at most 10. Got: {}",
                self.max_retries
            )));
        }
        if self.min_delay_ms > self.max_delay_ms {
            return Err(crate::Error::config(format!(
                "min_delay_ms ({}) cannot exceed max_delay_ms ({})",
                self.min_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Backoff before the first retry
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Upper bound for any single backoff
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between periodic reconciliation passes (in seconds)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.reconcile_interval_secs == 0 {
            return Err(crate::Error::config("Reconcile interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_ttl_seconds() -> u32 {
    300
}

fn default_max_retries() -> u32 {
    1
}

fn default_min_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1000
}
