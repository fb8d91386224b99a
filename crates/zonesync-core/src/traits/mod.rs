//! Core traits for the zonesync engine
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Record-level access to a DNS provider API

pub mod dns_provider;

pub use dns_provider::{
    DnsProvider, DnsProviderFactory, ProviderRecord, RecordFilter, RecordSpec, RecordType,
};
