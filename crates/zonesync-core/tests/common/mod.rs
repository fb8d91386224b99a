//! Test doubles and common utilities for contract tests
//!
//! [`JournalingProvider`] wraps the in-memory provider, records every call in
//! order, and can inject failures per operation and per record name.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zonesync_core::config::{EngineConfig, ZoneConfig};
use zonesync_core::engine::{ReconcileEvent, Reconciler};
use zonesync_core::error::{Error, Result};
use zonesync_core::provider::MemoryProvider;
use zonesync_core::retry::RetryPolicy;
use zonesync_core::store::RecordStore;
use zonesync_core::traits::{DnsProvider, ProviderRecord, RecordFilter, RecordSpec, RecordType};
use zonesync_core::zone::Zone;

/// Provider operation, for journaling and fault targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List,
    Create,
    Update,
    Delete,
}

/// A journaled provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    /// Record name involved, when known
    pub name: Option<String>,
    pub record_type: Option<RecordType>,
}

/// Failure to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Transport timeout (retryable)
    Timeout,
    /// Provider rejected the request
    Semantic,
    /// Record does not exist
    NotFound,
}

impl Fault {
    fn to_error(self) -> Error {
        match self {
            Fault::Timeout => Error::timeout("journal", "injected timeout"),
            Fault::Semantic => Error::provider("journal", "injected rejection"),
            Fault::NotFound => Error::not_found("injected missing record"),
        }
    }
}

struct Injection {
    op: Op,
    name: Option<String>,
    fault: Fault,
    remaining: usize,
}

#[derive(Default)]
struct Shared {
    journal: Vec<Call>,
    injections: Vec<Injection>,
    cancel_on: Option<(Op, CancellationToken)>,
}

/// In-memory provider that journals calls and injects failures
#[derive(Clone, Default)]
pub struct JournalingProvider {
    inner: MemoryProvider,
    shared: Arc<Mutex<Shared>>,
}

impl JournalingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backing records
    pub fn memory(&self) -> &MemoryProvider {
        &self.inner
    }

    /// Fail the next `times` calls of `op`
    pub fn fail(&self, op: Op, fault: Fault, times: usize) {
        self.inject(op, None, fault, times);
    }

    /// Fail the next `times` calls of `op` touching `name`
    pub fn fail_name(&self, op: Op, name: &str, fault: Fault, times: usize) {
        self.inject(op, Some(name.to_string()), fault, times);
    }

    /// Cancel `token` when `op` is first called (the call itself succeeds)
    pub fn cancel_on(&self, op: Op, token: CancellationToken) {
        self.shared.lock().unwrap().cancel_on = Some((op, token));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.lock().unwrap().journal.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls().iter().filter(|call| call.op == op).count()
    }

    /// Journaled mutations (create, update, delete) in order
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.op != Op::List)
            .collect()
    }

    pub fn clear_journal(&self) {
        self.shared.lock().unwrap().journal.clear();
    }

    fn inject(&self, op: Op, name: Option<String>, fault: Fault, times: usize) {
        self.shared.lock().unwrap().injections.push(Injection {
            op,
            name,
            fault,
            remaining: times,
        });
    }

    /// Journal the call, fire any cancel hook, and consume a matching fault
    fn enter(&self, op: Op, name: Option<&str>, record_type: Option<RecordType>) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        shared.journal.push(Call {
            op,
            name: name.map(str::to_string),
            record_type,
        });

        if let Some((hook_op, token)) = &shared.cancel_on {
            if *hook_op == op {
                token.cancel();
            }
        }

        let injection = shared.injections.iter_mut().find(|injection| {
            injection.op == op
                && injection.remaining > 0
                && injection
                    .name
                    .as_deref()
                    .is_none_or(|wanted| Some(wanted) == name)
        });

        match injection {
            Some(injection) => {
                injection.remaining -= 1;
                Err(injection.fault.to_error())
            }
            None => Ok(()),
        }
    }

    async fn name_of(&self, id: &str) -> Option<(String, RecordType)> {
        self.inner
            .records()
            .await
            .into_iter()
            .find(|record| record.id == id)
            .map(|record| (record.name, record.record_type))
    }
}

#[async_trait::async_trait]
impl DnsProvider for JournalingProvider {
    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<ProviderRecord>> {
        self.enter(Op::List, filter.name.as_deref(), filter.record_type)?;
        self.inner.list_records(filter).await
    }

    async fn create_record(&self, spec: &RecordSpec) -> Result<ProviderRecord> {
        self.enter(Op::Create, Some(&spec.name), Some(spec.record_type))?;
        self.inner.create_record(spec).await
    }

    async fn update_record(&self, id: &str, spec: &RecordSpec) -> Result<()> {
        self.enter(Op::Update, Some(&spec.name), Some(spec.record_type))?;
        self.inner.update_record(id, spec).await
    }

    async fn delete_record(&self, id: &str) -> Result<()> {
        let target = self.name_of(id).await;
        self.enter(
            Op::Delete,
            target.as_ref().map(|(name, _)| name.as_str()),
            target.as_ref().map(|(_, record_type)| *record_type),
        )?;
        self.inner.delete_record(id).await
    }

    fn provider_name(&self) -> &'static str {
        "journal"
    }
}

/// Record store over a fresh journaling provider
pub fn store(zone: ZoneConfig, retry: RetryPolicy) -> (Arc<RecordStore>, JournalingProvider) {
    let provider = JournalingProvider::new();
    let store = RecordStore::new(
        Arc::new(provider.clone()),
        Zone::new(&zone).unwrap(),
        retry,
    );
    (Arc::new(store), provider)
}

/// Reconciler over a fresh journaling provider, without retries
pub fn reconciler(
    zone: ZoneConfig,
) -> (Reconciler, mpsc::Receiver<ReconcileEvent>, JournalingProvider) {
    let (store, provider) = store(zone, RetryPolicy::no_retry());
    let (reconciler, rx) = Reconciler::new(store, &EngineConfig::default());
    (reconciler, rx, provider)
}

/// Seed a record directly into the backing zone
pub async fn seed(provider: &JournalingProvider, id: &str, name: &str, content: &str) {
    let record_type = if content.contains(':') {
        RecordType::Aaaa
    } else {
        RecordType::A
    };
    provider
        .memory()
        .insert(ProviderRecord {
            id: id.to_string(),
            name: name.to_string(),
            record_type,
            content: content.to_string(),
            ttl: 300,
            proxied: false,
        })
        .await;
}

/// Sorted record names currently in the zone
pub async fn names(provider: &JournalingProvider) -> Vec<String> {
    let mut names: Vec<String> = provider
        .memory()
        .records()
        .await
        .into_iter()
        .map(|record| record.name)
        .collect();
    names.sort();
    names
}

/// Drain every event currently queued
pub fn drain(rx: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
