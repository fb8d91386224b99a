//! Reconciliation engine
//!
//! The [`Reconciler`] converges the provider's zone on the desired service set:
//!
//! - Publishing the zone apex and wildcard for the detected public address
//! - Creating or updating one record per service and address family
//! - Deleting managed records whose service has disappeared
//!
//! ## Architecture
//!
//! ```text
//!  DesiredState stream ──┐
//!                        ▼
//!               ┌──────────────┐        ┌──────────────┐
//!               │  Reconciler  │───────▶│    Events    │
//!               └──────────────┘        │   (notify)   │
//!                        │              └──────────────┘
//!                        ▼
//!               ┌──────────────┐
//!               │ RecordStore  │── scope check ── retry ── DnsProvider
//!               └──────────────┘
//! ```
//!
//! ## Pass Order
//!
//! 1. Apex and wildcard upserts (skipped when proxied)
//! 2. Service record upserts
//! 3. Listing of live managed records (failure aborts the pass)
//! 4. Stale record deletes
//!
//! Upserts always precede deletes. Per-record failures are collected into the
//! [`ReconcileReport`] and the pass continues; cancellation aborts it.

use crate::config::EngineConfig;
use crate::error::{Error, ErrorClass, Result};
use crate::store::{DeleteOutcome, RecordStore, UpsertOutcome};
use crate::traits::RecordType;
use crate::zone::is_valid_service_label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A service that should be reachable under the zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    /// DNS-label-safe service name
    pub name: String,
    /// Service-specific IPv4 address
    #[serde(default)]
    pub ipv4: Option<Ipv4Addr>,
    /// Service-specific IPv6 address
    #[serde(default)]
    pub ipv6: Option<Ipv6Addr>,
}

impl ServiceTarget {
    /// A service that publishes the public address
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ipv4: None,
            ipv6: None,
        }
    }

    /// Publish `ip` instead of the public IPv4
    pub fn with_ipv4(mut self, ip: Ipv4Addr) -> Self {
        self.ipv4 = Some(ip);
        self
    }

    /// Publish `ip` instead of the public IPv6
    pub fn with_ipv6(mut self, ip: Ipv6Addr) -> Self {
        self.ipv6 = Some(ip);
        self
    }

    /// The service's own address for `record_type`
    pub fn address(&self, record_type: RecordType) -> Option<IpAddr> {
        match record_type {
            RecordType::A => self.ipv4.map(IpAddr::V4),
            RecordType::Aaaa => self.ipv6.map(IpAddr::V6),
        }
    }
}

/// Detected public address of the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAddress {
    /// Public IPv4, if detected
    #[serde(default)]
    pub ipv4: Option<Ipv4Addr>,
    /// Public IPv6, if detected
    #[serde(default)]
    pub ipv6: Option<Ipv6Addr>,
}

impl PublicAddress {
    /// Address from whichever families were detected
    pub fn new(ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Self {
        Self { ipv4, ipv6 }
    }

    /// Address of the family `record_type` carries
    pub fn address(&self, record_type: RecordType) -> Option<IpAddr> {
        match record_type {
            RecordType::A => self.ipv4.map(IpAddr::V4),
            RecordType::Aaaa => self.ipv6.map(IpAddr::V6),
        }
    }

    /// Whether no family was detected
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }
}

/// Input of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    /// Services to publish
    pub services: Vec<ServiceTarget>,
    /// Detected public address
    pub address: PublicAddress,
}

impl DesiredState {
    /// Pair a service list with the address it falls back to
    pub fn new(services: Vec<ServiceTarget>, address: PublicAddress) -> Self {
        Self { services, address }
    }
}

/// Kind of record operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upsert,
    Delete,
}

/// A record touched by a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub fqdn: String,
    pub record_type: RecordType,
    pub id: String,
}

/// A record operation that failed during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub fqdn: String,
    pub record_type: RecordType,
    pub operation: Operation,
    pub class: ErrorClass,
    pub message: String,
}

/// Outcome of a completed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub created: Vec<RecordRef>,
    pub updated: Vec<RecordRef>,
    pub deleted: Vec<RecordRef>,
    pub failures: Vec<RecordFailure>,
    /// Services skipped for having an invalid name
    pub skipped_services: Vec<String>,
    /// Sorted services that produced at least one desired record
    pub active_services: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl ReconcileReport {
    fn new() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            failures: Vec::new(),
            skipped_services: Vec::new(),
            active_services: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    /// Whether every record operation succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A pass began
    PassStarted { services: usize },

    RecordCreated {
        fqdn: String,
        record_type: RecordType,
    },

    RecordUpdated {
        fqdn: String,
        record_type: RecordType,
    },

    RecordDeleted {
        fqdn: String,
        record_type: RecordType,
    },

    /// A mutation was refused for falling outside the zone
    ScopeDenied { fqdn: String, root_domain: String },

    /// A record operation failed after retries
    RecordFailed {
        fqdn: String,
        record_type: RecordType,
        operation: Operation,
        error: String,
    },

    /// A pass finished; per-record failures may still have occurred
    PassCompleted {
        created: usize,
        updated: usize,
        deleted: usize,
        failed: usize,
    },

    /// A pass stopped before finishing
    PassAborted { error: String },

    /// The run loop exited
    Stopped { reason: String },
}

/// Drives a [`RecordStore`] toward a desired service set
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::reconcile()`] per pass, or hand a trigger stream to
///    [`Reconciler::run()`]
/// 3. Cancel the token to stop
///
/// Passes must not overlap. [`Reconciler::run()`] serializes them.
pub struct Reconciler {
    store: Arc<RecordStore>,

    /// Services published by the last completed pass
    active: RwLock<Vec<String>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// reconcile events
    pub fn new(
        store: Arc<RecordStore>,
        config: &EngineConfig,
    ) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let reconciler = Self {
            store,
            active: RwLock::new(Vec::new()),
            event_tx: tx,
        };

        (reconciler, rx)
    }

    /// Record store this reconciler drives
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Sorted services that produced a record in the last completed pass
    pub fn active_subdomains(&self) -> Vec<String> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(report)`: the pass ran to the end; see `report.failures`
    /// - `Err(Error::Cancelled)`: `cancel` fired
    /// - `Err(_)`: the live record listing failed
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        services: &[ServiceTarget],
        address: &PublicAddress,
    ) -> Result<ReconcileReport> {
        self.emit_event(ReconcileEvent::PassStarted {
            services: services.len(),
        });

        let mut report = ReconcileReport::new();
        if let Err(err) = self.run_pass(cancel, services, address, &mut report).await {
            if err.is_cancelled() {
                info!("Reconcile pass cancelled");
            } else {
                error!(error = %err, "Reconcile pass aborted");
            }
            self.emit_event(ReconcileEvent::PassAborted {
                error: err.to_string(),
            });
            return Err(err);
        }

        report.completed_at = Utc::now();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) =
            report.active_services.clone();

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            skipped = report.skipped_services.len(),
            active = report.active_services.len(),
            "Reconcile pass complete"
        );
        self.emit_event(ReconcileEvent::PassCompleted {
            created: report.created.len(),
            updated: report.updated.len(),
            deleted: report.deleted.len(),
            failed: report.failures.len(),
        });

        Ok(report)
    }

    /// Reconcile every desired state from `triggers`, in order
    ///
    /// Returns when the stream ends or `cancel` fires. Failed passes are
    /// logged and the loop continues with the next trigger.
    pub async fn run<S>(&self, triggers: S, cancel: &CancellationToken) -> Result<()>
    where
        S: Stream<Item = DesiredState>,
    {
        tokio::pin!(triggers);

        let reason = loop {
            let desired = tokio::select! {
                biased;
                _ = cancel.cancelled() => break "cancelled",
                next = triggers.next() => match next {
                    Some(desired) => desired,
                    None => break "trigger stream ended",
                },
            };

            match self
                .reconcile(cancel, &desired.services, &desired.address)
                .await
            {
                Ok(report) => debug!(failures = report.failures.len(), "Pass finished"),
                Err(err) if err.is_cancelled() => break "cancelled",
                Err(err) => error!(error = %err, "Reconcile pass failed, waiting for next trigger"),
            }
        };

        info!(reason, "Reconciler stopped");
        self.emit_event(ReconcileEvent::Stopped {
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn run_pass(
        &self,
        cancel: &CancellationToken,
        services: &[ServiceTarget],
        address: &PublicAddress,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let zone = self.store.zone();

        if zone.proxied() {
            debug!("Proxied zone, apex records are left alone");
        } else {
            let apex = [zone.root_domain().to_string(), zone.wildcard_name()];
            for record_type in RecordType::ALL {
                let Some(ip) = address.address(record_type) else {
                    continue;
                };
                for name in &apex {
                    self.apply_upsert(cancel, report, name, record_type, ip)
                        .await?;
                }
            }
        }

        let mut desired: BTreeMap<(String, RecordType), IpAddr> = BTreeMap::new();
        let mut active = BTreeSet::new();

        for service in services {
            if !is_valid_service_label(&service.name) {
                warn!(service = %service.name, "Skipping service with an invalid DNS label");
                report.skipped_services.push(service.name.clone());
                continue;
            }

            for target in zone.map_service_name(&service.name) {
                // the edge serves IPv6 for proxied zones; origins get no AAAA fallback
                let fallback = match target.record_type {
                    RecordType::Aaaa if zone.proxied() => None,
                    record_type => address.address(record_type),
                };
                let content = service.address(target.record_type).or(fallback);
                if let Some(ip) = content {
                    desired.entry((target.fqdn, target.record_type)).or_insert(ip);
                    active.insert(service.name.to_ascii_lowercase());
                }
            }
        }

        for ((fqdn, record_type), ip) in &desired {
            self.apply_upsert(cancel, report, fqdn, *record_type, *ip)
                .await?;
        }

        let desired_fqdns: BTreeSet<&str> =
            desired.keys().map(|(fqdn, _)| fqdn.as_str()).collect();
        let managed = self.store.list_managed_fqdns(cancel).await?;

        for fqdn in managed
            .iter()
            .filter(|fqdn| !desired_fqdns.contains(fqdn.as_str()))
        {
            debug!(fqdn = %fqdn, "Removing stale record");
            for record_type in RecordType::ALL {
                self.apply_delete(cancel, report, fqdn, record_type).await?;
            }
        }

        report.active_services = active.into_iter().collect();
        Ok(())
    }

    /// Upsert one record, recording the outcome
    ///
    /// Only cancellation is returned as an error.
    async fn apply_upsert(
        &self,
        cancel: &CancellationToken,
        report: &mut ReconcileReport,
        fqdn: &str,
        record_type: RecordType,
        ip: IpAddr,
    ) -> Result<()> {
        match self
            .store
            .upsert(cancel, fqdn, record_type, &ip.to_string())
            .await
        {
            Ok(UpsertOutcome::Created { id }) => {
                self.emit_event(ReconcileEvent::RecordCreated {
                    fqdn: fqdn.to_string(),
                    record_type,
                });
                report.created.push(record_ref(fqdn, record_type, id));
            }
            Ok(UpsertOutcome::Updated { id }) => {
                self.emit_event(ReconcileEvent::RecordUpdated {
                    fqdn: fqdn.to_string(),
                    record_type,
                });
                report.updated.push(record_ref(fqdn, record_type, id));
            }
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => self.record_failure(report, fqdn, record_type, Operation::Upsert, err),
        }
        Ok(())
    }

    /// Delete one record, recording the outcome
    async fn apply_delete(
        &self,
        cancel: &CancellationToken,
        report: &mut ReconcileReport,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<()> {
        match self.store.delete(cancel, fqdn, record_type).await {
            Ok(DeleteOutcome::Deleted { id }) => {
                self.emit_event(ReconcileEvent::RecordDeleted {
                    fqdn: fqdn.to_string(),
                    record_type,
                });
                report.deleted.push(record_ref(fqdn, record_type, id));
            }
            Ok(DeleteOutcome::Absent) => {}
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => self.record_failure(report, fqdn, record_type, Operation::Delete, err),
        }
        Ok(())
    }

    fn record_failure(
        &self,
        report: &mut ReconcileReport,
        fqdn: &str,
        record_type: RecordType,
        operation: Operation,
        err: Error,
    ) {
        if err.is_scope_denied() {
            self.emit_event(ReconcileEvent::ScopeDenied {
                fqdn: fqdn.to_string(),
                root_domain: self.store.zone().root_domain().to_string(),
            });
        } else {
            error!(
                fqdn,
                record_type = %record_type,
                operation = ?operation,
                class = ?err.class(),
                error = %err,
                "Record operation failed"
            );
        }

        self.emit_event(ReconcileEvent::RecordFailed {
            fqdn: fqdn.to_string(),
            record_type,
            operation,
            error: err.to_string(),
        });
        report.failures.push(RecordFailure {
            fqdn: fqdn.to_string(),
            record_type,
            operation,
            class: err.class(),
            message: err.to_string(),
        });
    }

    /// Emit a reconcile event
    fn emit_event(&self, event: ReconcileEvent) {
        // A full channel means the consumer is behind; drop rather than block a pass
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

fn record_ref(fqdn: &str, record_type: RecordType, id: String) -> RecordRef {
    RecordRef {
        fqdn: fqdn.to_string(),
        record_type,
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneConfig;
    use crate::provider::MemoryProvider;
    use crate::retry::RetryPolicy;
    use crate::traits::ProviderRecord;
    use crate::zone::Zone;

    fn reconciler(zone: ZoneConfig) -> (Reconciler, mpsc::Receiver<ReconcileEvent>, MemoryProvider) {
        let provider = MemoryProvider::new();
        let store = RecordStore::new(
            Arc::new(provider.clone()),
            Zone::new(&zone).unwrap(),
            RetryPolicy::no_retry(),
        );
        let (reconciler, rx) = Reconciler::new(Arc::new(store), &EngineConfig::default());
        (reconciler, rx, provider)
    }

    fn app(ip: [u8; 4]) -> ServiceTarget {
        ServiceTarget::new("app").with_ipv4(Ipv4Addr::from(ip))
    }

    fn drain(rx: &mut mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn single_service_converges_to_one_record() {
        let (reconciler, _rx, provider) = reconciler(ZoneConfig::new("example.com"));
        let cancel = CancellationToken::new();

        let report = reconciler
            .reconcile(&cancel, &[app([1, 2, 3, 4])], &PublicAddress::default())
            .await
            .unwrap();

        assert_eq!(report.created.len(), 1);
        assert!(report.is_clean());

        let records = provider.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "app.example.com");
        assert_eq!(records[0].record_type, RecordType::A);
        assert_eq!(records[0].content, "1.2.3.4");
    }

    #[tokio::test]
    async fn removed_service_is_deleted() {
        let (reconciler, _rx, provider) = reconciler(ZoneConfig::new("example.com"));
        let cancel = CancellationToken::new();
        provider
            .insert(ProviderRecord {
                id: "foreign".to_string(),
                name: "mail.other.org".to_string(),
                record_type: RecordType::A,
                content: "9.9.9.9".to_string(),
                ttl: 300,
                proxied: false,
            })
            .await;

        reconciler
            .reconcile(&cancel, &[app([1, 2, 3, 4])], &PublicAddress::default())
            .await
            .unwrap();
        let report = reconciler
            .reconcile(&cancel, &[], &PublicAddress::default())
            .await
            .unwrap();

        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.deleted[0].fqdn, "app.example.com");
        assert!(report.created.is_empty() && report.updated.is_empty());

        let records = provider.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "foreign");
    }

    #[tokio::test]
    async fn apex_and_wildcard_follow_public_address() {
        let (reconciler, _rx, provider) = reconciler(ZoneConfig::new("example.com"));
        let address = PublicAddress::new(Some(Ipv4Addr::new(5, 6, 7, 8)), None);

        let report = reconciler
            .reconcile(&CancellationToken::new(), &[], &address)
            .await
            .unwrap();

        let mut names: Vec<String> = report.created.iter().map(|r| r.fqdn.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["*.example.com".to_string(), "example.com".to_string()]);
        assert!(provider.records().await.iter().all(|r| r.record_type == RecordType::A));
    }

    #[tokio::test]
    async fn proxied_zone_skips_apex() {
        let (reconciler, _rx, provider) =
            reconciler(ZoneConfig::new("example.com").with_proxied(true));
        let address = PublicAddress::new(Some(Ipv4Addr::new(5, 6, 7, 8)), None);

        reconciler
            .reconcile(&CancellationToken::new(), &[ServiceTarget::new("app")], &address)
            .await
            .unwrap();

        let records = provider.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "app.example.com");
        assert_eq!(records[0].content, "5.6.7.8");
    }

    #[tokio::test]
    async fn service_address_falls_back_to_public() {
        let (reconciler, _rx, provider) = reconciler(ZoneConfig::new("example.com"));
        let address = PublicAddress::new(
            Some(Ipv4Addr::new(5, 6, 7, 8)),
            Some("2001:db8::1".parse().unwrap()),
        );

        reconciler
            .reconcile(&CancellationToken::new(), &[app([10, 0, 0, 1])], &address)
            .await
            .unwrap();

        let records = provider.records().await;
        let app_records: Vec<_> = records.iter().filter(|r| r.name == "app.example.com").collect();
        let a = app_records.iter().find(|r| r.record_type == RecordType::A).unwrap();
        let aaaa = app_records.iter().find(|r| r.record_type == RecordType::Aaaa).unwrap();
        assert_eq!(a.content, "10.0.0.1");
        assert_eq!(aaaa.content, "2001:db8::1");
    }

    #[tokio::test]
    async fn proxied_zone_never_falls_back_to_public_ipv6() {
        let (reconciler, _rx, provider) =
            reconciler(ZoneConfig::new("example.com").with_proxied(true));
        let address = PublicAddress::new(
            Some(Ipv4Addr::new(5, 6, 7, 8)),
            Some("2001:db8::1".parse().unwrap()),
        );
        let services = [
            ServiceTarget::new("app"),
            ServiceTarget::new("v6").with_ipv6("2001:db8::6".parse().unwrap()),
        ];

        let report = reconciler
            .reconcile(&CancellationToken::new(), &services, &address)
            .await
            .unwrap();

        let mut published: Vec<(String, RecordType, String)> = provider
            .records()
            .await
            .into_iter()
            .map(|r| (r.name, r.record_type, r.content))
            .collect();
        published.sort();
        assert_eq!(
            published,
            vec![
                ("app.example.com".to_string(), RecordType::A, "5.6.7.8".to_string()),
                ("v6.example.com".to_string(), RecordType::A, "5.6.7.8".to_string()),
                ("v6.example.com".to_string(), RecordType::Aaaa, "2001:db8::6".to_string()),
            ]
        );
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn invalid_services_are_skipped() {
        let (reconciler, _rx, provider) = reconciler(ZoneConfig::new("example.com"));

        let report = reconciler
            .reconcile(
                &CancellationToken::new(),
                &[
                    ServiceTarget::new("bad.name").with_ipv4(Ipv4Addr::new(1, 1, 1, 1)),
                    ServiceTarget::new("-bad").with_ipv4(Ipv4Addr::new(1, 1, 1, 1)),
                    app([1, 2, 3, 4]),
                ],
                &PublicAddress::default(),
            )
            .await
            .unwrap();

        assert_eq!(report.skipped_services, vec!["bad.name".to_string(), "-bad".to_string()]);
        assert_eq!(provider.len().await, 1);
    }

    #[tokio::test]
    async fn active_subdomains_track_last_completed_pass() {
        let (reconciler, _rx, _provider) = reconciler(ZoneConfig::new("example.com"));
        let cancel = CancellationToken::new();
        assert!(reconciler.active_subdomains().is_empty());

        let services = vec![
            ServiceTarget::new("web").with_ipv4(Ipv4Addr::new(1, 1, 1, 1)),
            app([1, 2, 3, 4]),
            ServiceTarget::new("dark"),
        ];
        reconciler
            .reconcile(&cancel, &services, &PublicAddress::default())
            .await
            .unwrap();

        assert_eq!(
            reconciler.active_subdomains(),
            vec!["app".to_string(), "web".to_string()]
        );

        cancel.cancel();
        let err = reconciler
            .reconcile(&cancel, &[], &PublicAddress::default())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(reconciler.active_subdomains().len(), 2);
    }

    #[tokio::test]
    async fn events_describe_the_pass() {
        let (reconciler, mut rx, _provider) = reconciler(ZoneConfig::new("example.com"));
        let cancel = CancellationToken::new();

        reconciler
            .reconcile(&cancel, &[app([1, 2, 3, 4])], &PublicAddress::default())
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ReconcileEvent::PassStarted { services: 1 },
                ReconcileEvent::RecordCreated {
                    fqdn: "app.example.com".to_string(),
                    record_type: RecordType::A,
                },
                ReconcileEvent::PassCompleted {
                    created: 1,
                    updated: 0,
                    deleted: 0,
                    failed: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn full_event_channel_does_not_block() {
        let provider = MemoryProvider::new();
        let store = RecordStore::new(
            Arc::new(provider.clone()),
            Zone::new(&ZoneConfig::new("example.com")).unwrap(),
            RetryPolicy::no_retry(),
        );
        let config = EngineConfig {
            event_channel_capacity: 1,
            ..EngineConfig::default()
        };
        let (reconciler, mut rx) = Reconciler::new(Arc::new(store), &config);

        let report = reconciler
            .reconcile(&CancellationToken::new(), &[app([1, 2, 3, 4])], &PublicAddress::default())
            .await
            .unwrap();

        assert_eq!(report.created.len(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn run_processes_triggers_in_order() {
        let (reconciler, mut rx, provider) = reconciler(ZoneConfig::new("example.com"));
        let triggers = tokio_stream::iter(vec![
            DesiredState::new(vec![app([1, 2, 3, 4])], PublicAddress::default()),
            DesiredState::new(vec![app([5, 6, 7, 8])], PublicAddress::default()),
        ]);

        reconciler
            .run(triggers, &CancellationToken::new())
            .await
            .unwrap();

        let records = provider.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "5.6.7.8");

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&ReconcileEvent::Stopped {
                reason: "trigger stream ended".to_string()
            })
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (reconciler, mut rx, _provider) = reconciler(ZoneConfig::new("example.com"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        reconciler
            .run(tokio_stream::pending::<DesiredState>(), &cancel)
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![ReconcileEvent::Stopped {
                reason: "cancelled".to_string()
            }]
        );
    }
}
