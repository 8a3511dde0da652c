//! Binary persistence for preloaded cache tables

pub mod binary_format;
pub mod store;

pub use store::PersistentStore;
