// # Built-in Providers
//
// Providers that ship with the core library. Network-backed providers live in
// their own crates and register through the provider registry.

pub mod memory;

pub use memory::{MemoryProvider, MemoryProviderFactory};
