//! Cache tiers
//!
//! `persistent` owns the on-disk record format, `fixed` freezes a loaded
//! table into the read-only front tier and `lru` is the bounded dynamic tier
//! that reads through it.

pub mod fixed;
pub mod lru;
pub mod persistent;

pub use fixed::{FixedTierCache, FixedTierSource, CACHE_PATH_ENV, PAIRED_CACHE_EXTENSION};
pub use lru::BoundedLruCache;
pub use persistent::PersistentStore;
