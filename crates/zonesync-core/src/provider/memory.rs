// # Memory Provider
//
// In-memory implementation of DnsProvider.
//
// ## Purpose
//
// Behaves like a hosted zone without any network: records get opaque IDs,
// updates and deletes of unknown IDs fail with NotFound, and listing reflects
// every mutation immediately.
//
// ## When to Use
//
// - Tests of the record store and reconciler
// - Local dry runs of the daemon (`ZONESYNC_PROVIDER_TYPE=memory`)
//
// All records are lost when the process exits.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::ProviderConfig;
use crate::traits::{
    DnsProvider, DnsProviderFactory, ProviderRecord, RecordFilter, RecordSpec, RecordType,
};

/// In-memory DNS provider
///
/// Records are kept in a `BTreeMap` keyed by ID behind a `RwLock`. Clones share
/// the same records, so a test can hold one handle while the record store
/// owns another.
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::provider::MemoryProvider;
/// use zonesync_core::traits::{DnsProvider, RecordSpec, RecordType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryProvider::new();
///
///     let record = provider
///         .create_record(&RecordSpec {
///             name: "app.example.com".to_string(),
///             record_type: RecordType::A,
///             content: "1.2.3.4".to_string(),
///             ttl: 300,
///             proxied: false,
///         })
///         .await?;
///
///     assert_eq!(provider.len().await, 1);
///     provider.delete_record(&record.id).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    records: Arc<RwLock<BTreeMap<String, ProviderRecord>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryProvider {
    /// Create an empty zone
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, ordered by ID
    pub async fn records(&self) -> Vec<ProviderRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Seed a record with a caller-chosen ID, replacing any record with that ID
    pub async fn insert(&self, record: ProviderRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    /// Remove a record out-of-band, returning it if it existed
    pub async fn remove(&self, id: &str) -> Option<ProviderRecord> {
        self.records.write().await.remove(id)
    }

    /// Number of records in the zone
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the zone holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("mem-{:08}", n)
    }
}

/// Providers accept only a literal address of the matching family
fn check_spec(spec: &RecordSpec) -> Result<(), Error> {
    match spec.content.parse::<IpAddr>() {
        Ok(ip) if RecordType::for_ip(&ip) == spec.record_type => Ok(()),
        _ => Err(Error::invalid_input(format!(
            "Invalid {} content: {}",
            spec.record_type, spec.content
        ))),
    }
}

fn materialize(id: String, spec: &RecordSpec) -> ProviderRecord {
    ProviderRecord {
        id,
        name: spec.name.clone(),
        record_type: spec.record_type,
        content: spec.content.clone(),
        ttl: spec.ttl,
        proxied: spec.proxied,
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<ProviderRecord>, Error> {
        let guard = self.records.read().await;
        Ok(guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn create_record(&self, spec: &RecordSpec) -> Result<ProviderRecord, Error> {
        check_spec(spec)?;
        let record = materialize(self.allocate_id(), spec);
        let mut guard = self.records.write().await;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_record(&self, id: &str, spec: &RecordSpec) -> Result<(), Error> {
        check_spec(spec)?;
        let mut guard = self.records.write().await;
        match guard.get_mut(id) {
            Some(existing) => {
                *existing = materialize(id.to_string(), spec);
                Ok(())
            }
            None => Err(Error::not_found(format!("Record {} does not exist", id))),
        }
    }

    async fn delete_record(&self, id: &str) -> Result<(), Error> {
        let mut guard = self.records.write().await;
        guard
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("Record {} does not exist", id)))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemoryProvider`]
pub struct MemoryProviderFactory;

impl DnsProviderFactory for MemoryProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>, Error> {
        match config {
            ProviderConfig::Memory => Ok(Arc::new(MemoryProvider::new())),
            other => Err(Error::config(format!(
                "Memory provider cannot be built from '{}' configuration",
                other.type_name()
            ))),
        }
    }
}
