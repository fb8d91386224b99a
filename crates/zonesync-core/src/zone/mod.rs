// # Zone
//
// Normalized, validated view of a `ZoneConfig`, and the pure name predicates
// built on it:
//
// - scope: may this record name be mutated at all?
// - mapper: which record names does a service publish?
// - ownership: was this record name created by us?
//
// None of these perform I/O. They are the only place dot-boundary matching
// happens; callers must not re-implement suffix checks.

mod mapper;
mod ownership;
mod scope;

pub use mapper::{TargetRecord, prefixed_service_name};

use crate::config::ZoneConfig;
use crate::error::{Error, Result};

/// Lower-case a DNS name and strip one trailing dot
pub fn normalize_name(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}

/// Validate that a string is a syntactically valid domain name
///
/// Basic RFC 1035 checks: total length, label length, alphanumeric/hyphen
/// characters, no leading or trailing hyphen.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }
        if !is_valid_service_label(label) {
            return Err(Error::config(format!(
                "Domain label '{}' is invalid. Valid: 1-63 alphanumeric or hyphen \
                 characters, not starting or ending with a hyphen.",
                label
            )));
        }
    }

    Ok(())
}

/// Whether `label` is a single DNS-label-safe name
///
/// Must start and end with an ASCII alphanumeric, may contain hyphens, and is
/// at most 63 characters.
pub fn is_valid_service_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

/// A validated zone
///
/// All stored names are normalized (lower-case, no trailing dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    root: String,
    base: String,
    /// First label of the root ("zone" for "zone.example.com")
    zone_label: String,
    prefix_mode: bool,
    proxied: bool,
    ttl_seconds: u32,
}

/// TTL value the provider interprets as "automatic"
pub const AUTOMATIC_TTL: u32 = 1;

impl Zone {
    /// Build a zone from configuration
    ///
    /// Fails for malformed or single-label root domains and TTLs below the
    /// provider minimum.
    pub fn new(config: &ZoneConfig) -> Result<Self> {
        config.validate()?;

        let root = normalize_name(&config.root_domain);
        let zone_label = root
            .split_once('.')
            .map(|(label, _)| label.to_string())
            .ok_or_else(|| Error::config(format!("Root domain has a single label: {}", root)))?;

        Ok(Self {
            base: config.base_domain(),
            root,
            zone_label,
            prefix_mode: config.prefix_mode,
            proxied: config.proxied,
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Normalized root domain
    pub fn root_domain(&self) -> &str {
        &self.root
    }

    /// Normalized base domain (equals the root outside prefix mode)
    pub fn base_domain(&self) -> &str {
        &self.base
    }

    /// Whether prefix addressing is active
    pub fn prefix_mode(&self) -> bool {
        self.prefix_mode
    }

    /// Whether records are edge-proxied
    pub fn proxied(&self) -> bool {
        self.proxied
    }

    /// Configured TTL for non-proxied records
    pub fn ttl_seconds(&self) -> u32 {
        self.ttl_seconds
    }

    /// TTL to send to the provider
    ///
    /// Proxied records always use the provider's automatic TTL.
    pub fn record_ttl(&self) -> u32 {
        if self.proxied {
            AUTOMATIC_TTL
        } else {
            self.ttl_seconds
        }
    }

    /// Wildcard name covering every direct subdomain of the root
    pub fn wildcard_name(&self) -> String {
        format!("*.{}", self.root)
    }

    /// Whether prefix mode publishes under a different parent than the root
    fn has_distinct_base(&self) -> bool {
        self.prefix_mode && self.base != self.root
    }
}
