// # zonesync-core
//
// Core library for the zonesync DNS reconciliation engine.
//
// ## Architecture Overview
//
// - **Zone**: validated zone configuration and the pure name rules built on
//   it (scope validation, service name mapping, ownership)
// - **DnsProvider**: trait for record-level access to a DNS provider API
// - **RecordStore**: scope-checked, retrying, caching client over a provider
// - **Reconciler**: converges the zone on a desired service set
// - **ProviderRegistry**: plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **Scope first**: no record outside the zone is ever mutated
// 2. **Ownership by name**: managed records are recognized from name shape alone
// 3. **Plugin-Based**: providers are registered dynamically
// 4. **Library-First**: the daemon is a thin shell over this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod store;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, RetryConfig, ZoneConfig, ZoneSyncConfig};
pub use engine::{
    DesiredState, PublicAddress, ReconcileEvent, ReconcileReport, Reconciler, ServiceTarget,
};
pub use error::{Error, ErrorClass, Result};
pub use provider::MemoryProvider;
pub use registry::ProviderRegistry;
pub use retry::{RetryPolicy, with_retry};
pub use store::{DeleteOutcome, RecordStore, UpsertOutcome};
pub use traits::{DnsProvider, RecordType};
pub use zone::Zone;
