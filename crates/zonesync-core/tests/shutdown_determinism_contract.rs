//! Contract Test: Run Loop and Shutdown Determinism
//!
//! Constraints verified:
//! - The run loop reconciles only when a trigger arrives
//! - Cancellation terminates the loop, even mid-call to a stalled provider
//! - A stopped loop reports why it stopped
//!
//! If this test fails, someone has added:
//! - Background polling that ignores the trigger stream
//! - Provider calls that ignore cancellation
//! - Leaked tasks that outlive shutdown

mod common;

use common::*;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use zonesync_core::config::{EngineConfig, ZoneConfig};
use zonesync_core::engine::{DesiredState, PublicAddress, ReconcileEvent, Reconciler, ServiceTarget};
use zonesync_core::error::Result;
use zonesync_core::retry::RetryPolicy;
use zonesync_core::store::RecordStore;
use zonesync_core::traits::{DnsProvider, ProviderRecord, RecordFilter, RecordSpec};
use zonesync_core::zone::Zone;

fn desired(ip: [u8; 4]) -> DesiredState {
    DesiredState::new(
        vec![ServiceTarget::new("app").with_ipv4(Ipv4Addr::from(ip))],
        PublicAddress::default(),
    )
}

#[tokio::test]
async fn idle_loop_makes_no_provider_calls() {
    let (reconciler, _rx, provider) = reconciler(ZoneConfig::new("example.com"));
    let reconciler = Arc::new(reconciler);
    let cancel = CancellationToken::new();
    let (_trigger_tx, trigger_rx) = mpsc::channel::<DesiredState>(4);

    let handle = {
        let reconciler = reconciler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { reconciler.run(ReceiverStream::new(trigger_rx), &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(provider.calls().is_empty());

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "run loop should stop within 5 seconds");
}

#[tokio::test]
async fn triggers_drive_passes_until_cancelled() {
    let (reconciler, mut rx, provider) = reconciler(ZoneConfig::new("example.com"));
    let reconciler = Arc::new(reconciler);
    let cancel = CancellationToken::new();
    let (trigger_tx, trigger_rx) = mpsc::channel(4);

    let handle = {
        let reconciler = reconciler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { reconciler.run(ReceiverStream::new(trigger_rx), &cancel).await })
    };

    trigger_tx.send(desired([1, 2, 3, 4])).await.unwrap();
    trigger_tx.send(desired([4, 3, 2, 1])).await.unwrap();

    let mut completed = 0;
    while completed < 2 {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(ReconcileEvent::PassCompleted { .. })) => completed += 1,
            Ok(Some(_)) => {}
            other => panic!("expected pass events, got {:?}", other),
        }
    }

    let records = provider.memory().records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, "4.3.2.1");
    assert_eq!(reconciler.active_subdomains(), vec!["app".to_string()]);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run loop stops")
        .expect("run task does not panic")
        .expect("run loop returns Ok");

    assert_eq!(
        drain(&mut rx).last(),
        Some(&ReconcileEvent::Stopped {
            reason: "cancelled".to_string()
        })
    );
}

/// Provider whose every call hangs forever
struct StalledProvider;

#[async_trait::async_trait]
impl DnsProvider for StalledProvider {
    async fn list_records(&self, _filter: &RecordFilter) -> Result<Vec<ProviderRecord>> {
        std::future::pending().await
    }

    async fn create_record(&self, _spec: &RecordSpec) -> Result<ProviderRecord> {
        std::future::pending().await
    }

    async fn update_record(&self, _id: &str, _spec: &RecordSpec) -> Result<()> {
        std::future::pending().await
    }

    async fn delete_record(&self, _id: &str) -> Result<()> {
        std::future::pending().await
    }

    fn provider_name(&self) -> &'static str {
        "stalled"
    }
}

#[tokio::test]
async fn shutdown_during_stalled_provider_call() {
    let store = RecordStore::new(
        Arc::new(StalledProvider),
        Zone::new(&ZoneConfig::new("example.com")).unwrap(),
        RetryPolicy::default(),
    );
    let (reconciler, mut rx) = Reconciler::new(Arc::new(store), &EngineConfig::default());
    let reconciler = Arc::new(reconciler);
    let cancel = CancellationToken::new();

    let handle = {
        let reconciler = reconciler.clone();
        let cancel = cancel.clone();
        let triggers = tokio_stream::iter(vec![desired([1, 2, 3, 4])]);
        tokio::spawn(async move { reconciler.run(triggers, &cancel).await })
    };

    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(ReconcileEvent::PassStarted { services: 1 })) => {}
        other => panic!("expected PassStarted, got {:?}", other),
    }

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "stalled call must not block shutdown");

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(ReconcileEvent::PassAborted { .. })));
    assert_eq!(
        events.last(),
        Some(&ReconcileEvent::Stopped {
            reason: "cancelled".to_string()
        })
    );
}

#[tokio::test]
async fn multiple_cancel_calls_are_safe() {
    let (reconciler, mut rx, _provider) = reconciler(ZoneConfig::new("example.com"));
    let cancel = CancellationToken::new();
    cancel.cancel();
    cancel.cancel();

    reconciler
        .run(tokio_stream::pending::<DesiredState>(), &cancel)
        .await
        .unwrap();
    reconciler
        .run(tokio_stream::pending::<DesiredState>(), &cancel)
        .await
        .unwrap();

    let stops = drain(&mut rx)
        .into_iter()
        .filter(|event| matches!(event, ReconcileEvent::Stopped { .. }))
        .count();
    assert_eq!(stops, 2);
}
