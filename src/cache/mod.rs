//! Cache Module
//!
//! Key derivation, payload encoding, storage backends and the memoization
//! gate that ties them together.

mod codec;
mod entry;
mod gate;
mod key;
mod staleness;
mod stats;
pub mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::Codec;
pub use entry::StoreEntry;
pub use gate::{InFlightRegistry, MemoizationGate};
pub use key::{CacheKey, KeyDeriver, Operation};
pub use staleness::{Project, Resolution, StalenessPolicy};
pub use stats::CacheStats;
pub use store::{EmbeddedStore, EphemeralStore, NetworkedStore, RedisConfig, Store, StoreChain};
