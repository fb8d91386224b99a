//! Record store client
//!
//! [`RecordStore`] is the only component that talks to a [`DnsProvider`].
//! Every operation:
//!
//! 1. normalizes the record name
//! 2. checks it against the zone scope (denials never reach the provider)
//! 3. routes each provider call through [`with_retry`]
//!
//! A read-through cache maps `(fqdn, type)` to provider record IDs. The cache
//! is never authoritative: listing always goes to the provider, and a cached ID
//! that the provider no longer knows is dropped and looked up again.

mod cache;

use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, with_retry};
use crate::traits::{DnsProvider, RecordFilter, RecordSpec, RecordType};
use crate::zone::{Zone, normalize_name};
use cache::RecordCache;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a successful upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed; one was created
    Created { id: String },
    /// An existing record was overwritten
    Updated { id: String },
}

impl UpsertOutcome {
    /// Provider ID of the record now in place
    pub fn id(&self) -> &str {
        match self {
            UpsertOutcome::Created { id } | UpsertOutcome::Updated { id } => id,
        }
    }
}

/// Result of a successful delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record existed and was removed
    Deleted { id: String },
    /// There was nothing to remove
    Absent,
}

/// Scope-checked, retrying, caching front end to a [`DnsProvider`]
pub struct RecordStore {
    provider: Arc<dyn DnsProvider>,
    zone: Zone,
    retry: RetryPolicy,
    cache: RecordCache,
}

impl RecordStore {
    /// Create a record store for `zone`
    pub fn new(provider: Arc<dyn DnsProvider>, zone: Zone, retry: RetryPolicy) -> Self {
        Self {
            provider,
            zone,
            retry,
            cache: RecordCache::new(),
        }
    }

    /// Zone every mutation is checked against
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Create or overwrite the `(fqdn, type)` record with `content`
    ///
    /// The TTL sent is automatic when the zone is proxied and the configured
    /// TTL otherwise; the zone's proxied flag is passed through.
    ///
    /// # Errors
    ///
    /// - [`Error::ScopeDenied`] if `fqdn` is outside the zone (no provider call)
    /// - [`Error::InvalidInput`] if `content` is not an address of `record_type`
    /// - [`Error::Cancelled`] if `cancel` fires
    /// - any provider error left after retries
    pub async fn upsert(
        &self,
        cancel: &CancellationToken,
        fqdn: &str,
        record_type: RecordType,
        content: &str,
    ) -> Result<UpsertOutcome> {
        self.check_scope(fqdn, "upsert")?;
        check_content(record_type, content)?;

        let fqdn = normalize_name(fqdn);
        let spec = RecordSpec {
            name: fqdn.clone(),
            record_type,
            content: content.to_string(),
            ttl: self.zone.record_ttl(),
            proxied: self.zone.proxied(),
        };

        if let Some(id) = self.cache.get(&fqdn, record_type) {
            debug!(fqdn = %fqdn, record_type = %record_type, id = %id, "Record ID cache hit");
            match self.update(cancel, &id, &spec).await {
                Ok(()) => return Ok(UpsertOutcome::Updated { id }),
                Err(err) if err.is_not_found() => {
                    warn!(
                        fqdn = %fqdn,
                        record_type = %record_type,
                        id = %id,
                        "Cached record no longer exists, looking it up again"
                    );
                    self.cache.remove(&fqdn, record_type);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(id) = self.lookup_live_id(cancel, &fqdn, record_type).await? {
            self.update(cancel, &id, &spec).await?;
            return Ok(UpsertOutcome::Updated { id });
        }

        let provider = self.provider.as_ref();
        let spec_ref = &spec;
        let created = with_retry(&self.retry, cancel, "create_record", move || {
            provider.create_record(spec_ref)
        })
        .await?;

        info!(
            fqdn = %fqdn,
            record_type = %record_type,
            content,
            id = %created.id,
            provider = self.provider_name(),
            "Created DNS record"
        );
        self.cache.insert(&fqdn, record_type, created.id.clone());

        Ok(UpsertOutcome::Created { id: created.id })
    }

    /// Remove the `(fqdn, type)` record if it exists
    ///
    /// A record that is already gone, either before the call or reported
    /// missing by the provider, is [`DeleteOutcome::Absent`]. A cached ID the
    /// provider no longer knows is purged and the live record, if one was
    /// recreated under another ID, is deleted instead.
    pub async fn delete(
        &self,
        cancel: &CancellationToken,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<DeleteOutcome> {
        self.check_scope(fqdn, "delete")?;

        let fqdn = normalize_name(fqdn);

        if let Some(id) = self.cache.get(&fqdn, record_type) {
            debug!(fqdn = %fqdn, record_type = %record_type, id = %id, "Record ID cache hit");
            if self.delete_by_id(cancel, &fqdn, record_type, &id).await? {
                return Ok(DeleteOutcome::Deleted { id });
            }
            warn!(
                fqdn = %fqdn,
                record_type = %record_type,
                id = %id,
                "Cached record no longer exists, looking it up again"
            );
        }

        let Some(id) = self.lookup_live_id(cancel, &fqdn, record_type).await? else {
            debug!(fqdn = %fqdn, record_type = %record_type, "No record to delete");
            return Ok(DeleteOutcome::Absent);
        };

        if self.delete_by_id(cancel, &fqdn, record_type, &id).await? {
            Ok(DeleteOutcome::Deleted { id })
        } else {
            Ok(DeleteOutcome::Absent)
        }
    }

    /// Names of every record at the provider that this engine manages
    ///
    /// Reads live provider state for both A and AAAA. Wildcards and the bare
    /// root and base names are never included. The result is deduplicated
    /// and sorted.
    pub async fn list_managed_fqdns(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let mut managed = BTreeSet::new();
        let provider = self.provider.as_ref();

        for record_type in RecordType::ALL {
            let filter = RecordFilter::by_type(record_type);
            let filter_ref = &filter;
            let records = with_retry(&self.retry, cancel, "list_records", move || {
                provider.list_records(filter_ref)
            })
            .await?;

            for record in records {
                let name = normalize_name(&record.name);
                if name.starts_with("*.")
                    || name == self.zone.root_domain()
                    || name == self.zone.base_domain()
                {
                    continue;
                }
                if self.zone.is_managed(&name) {
                    managed.insert(name);
                }
            }
        }

        debug!(count = managed.len(), "Listed managed records");
        Ok(managed.into_iter().collect())
    }

    /// Cached provider ID for `(fqdn, type)`, if any
    pub fn cached_id(&self, fqdn: &str, record_type: RecordType) -> Option<String> {
        self.cache.get(&normalize_name(fqdn), record_type)
    }

    /// Number of cached record IDs
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached record ID
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn check_scope(&self, fqdn: &str, operation: &str) -> Result<()> {
        self.zone.validate(fqdn).inspect_err(|_| {
            error!(
                target: "zonesync::security",
                security = true,
                name = fqdn,
                operation,
                root_domain = self.zone.root_domain(),
                base_domain = self.zone.base_domain(),
                "Refusing to modify a record outside the managed zone"
            );
        })
    }

    async fn update(&self, cancel: &CancellationToken, id: &str, spec: &RecordSpec) -> Result<()> {
        let provider = self.provider.as_ref();
        with_retry(&self.retry, cancel, "update_record", move || {
            provider.update_record(id, spec)
        })
        .await?;

        info!(
            fqdn = %spec.name,
            record_type = %spec.record_type,
            content = %spec.content,
            id,
            provider = self.provider_name(),
            "Updated DNS record"
        );
        Ok(())
    }

    /// Delete record `id`, purging its cache entry
    ///
    /// Returns `false` when the provider reports the record missing.
    async fn delete_by_id(
        &self,
        cancel: &CancellationToken,
        fqdn: &str,
        record_type: RecordType,
        id: &str,
    ) -> Result<bool> {
        let provider = self.provider.as_ref();
        let result = with_retry(&self.retry, cancel, "delete_record", move || {
            provider.delete_record(id)
        })
        .await;

        match result {
            Ok(()) => {
                self.cache.remove(fqdn, record_type);
                info!(
                    fqdn,
                    record_type = %record_type,
                    id,
                    provider = self.provider_name(),
                    "Deleted DNS record"
                );
                Ok(true)
            }
            Err(err) if err.is_not_found() => {
                self.cache.remove(fqdn, record_type);
                debug!(fqdn, record_type = %record_type, id, "Record already deleted");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Ask the provider for the record ID, caching the first match
    async fn lookup_live_id(
        &self,
        cancel: &CancellationToken,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<Option<String>> {
        let provider = self.provider.as_ref();
        let filter = RecordFilter::by_name_and_type(fqdn, record_type);
        let filter_ref = &filter;
        let records = with_retry(&self.retry, cancel, "list_records", move || {
            provider.list_records(filter_ref)
        })
        .await?;

        let id = records.into_iter().next().map(|record| record.id);
        match &id {
            Some(id) => {
                debug!(fqdn, record_type = %record_type, id = %id, "Found existing record");
                self.cache.insert(fqdn, record_type, id.clone());
            }
            None => debug!(fqdn, record_type = %record_type, "No existing record"),
        }

        Ok(id)
    }
}

/// `content` must be a literal address of the family `record_type` carries
fn check_content(record_type: RecordType, content: &str) -> Result<()> {
    let ip: IpAddr = content.parse().map_err(|_| {
        Error::invalid_input(format!("'{}' is not an IP address", content))
    })?;

    if RecordType::for_ip(&ip) != record_type {
        return Err(Error::invalid_input(format!(
            "{} cannot be published as a {} record",
            content, record_type
        )));
    }

    Ok(())
}
