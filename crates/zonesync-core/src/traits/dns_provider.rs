// # DNS Provider Trait
//
// Defines the record-level interface the record store drives.
//
// ## Implementations
//
// - Cloudflare: `zonesync-provider-cloudflare` crate
// - In-memory: `zonesync_core::provider::MemoryProvider`
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::traits::{DnsProvider, RecordFilter, RecordType};
//
// let records = provider
//     .list_records(&RecordFilter::by_name_and_type("app.example.com", RecordType::A))
//     .await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// DNS record types the engine manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Every managed record type, in publishing order
    pub const ALL: [RecordType; 2] = [RecordType::A, RecordType::Aaaa];

    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Record type matching an address family
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Parse a wire name ("A" / "AAAA", case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("A") {
            Some(RecordType::A)
        } else if value.eq_ignore_ascii_case("AAAA") {
            Some(RecordType::Aaaa)
        } else {
            None
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired shape of a record, sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Literal IPv4 or IPv6 address
    pub content: String,
    /// TTL in seconds (`1` means automatic)
    pub ttl: u32,
    /// Route through the provider's edge proxy
    pub proxied: bool,
}

/// A record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Provider-assigned record ID
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Record content
    pub content: String,
    /// TTL in seconds
    pub ttl: u32,
    /// Whether the record is edge-proxied
    pub proxied: bool,
}

/// Filter for [`DnsProvider::list_records`]
///
/// `None` fields match everything. Name matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Exact record name
    pub name: Option<String>,
    /// Record type
    pub record_type: Option<RecordType>,
}

impl RecordFilter {
    /// Match every record of a type
    pub fn by_type(record_type: RecordType) -> Self {
        Self {
            name: None,
            record_type: Some(record_type),
        }
    }

    /// Match one name and type
    pub fn by_name_and_type(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: Some(name.into()),
            record_type: Some(record_type),
        }
    }

    /// Whether `record` passes this filter
    pub fn matches(&self, record: &ProviderRecord) -> bool {
        let name_ok = self.name.as_ref().is_none_or(|name| {
            crate::zone::normalize_name(name) == crate::zone::normalize_name(&record.name)
        });
        let type_ok = self
            .record_type
            .is_none_or(|record_type| record_type == record.record_type);
        name_ok && type_ok
    }
}

/// Trait for DNS provider implementations
///
/// Implementations execute exactly one logical API operation per call and
/// report failures through [`crate::Error`]:
///
/// - transport timeouts as [`crate::Error::Timeout`] (the record store retries these)
/// - a missing record as [`crate::Error::NotFound`]
/// - everything the provider rejects as a provider-semantic error
///
/// Providers do not retry, cache, or check domain scope. The record store
/// owns all three.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List records matching `filter`
    ///
    /// Must reflect live provider state and return every page.
    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<ProviderRecord>, crate::Error>;

    /// Create a record, returning it with its assigned ID
    async fn create_record(&self, spec: &RecordSpec) -> Result<ProviderRecord, crate::Error>;

    /// Replace the record `id` with `spec`
    async fn update_record(&self, id: &str, spec: &RecordSpec) -> Result<(), crate::Error>;

    /// Delete the record `id`
    ///
    /// Returns [`crate::Error::NotFound`] if the record does not exist.
    async fn delete_record(&self, id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<std::sync::Arc<dyn DnsProvider>, crate::Error>;
}
