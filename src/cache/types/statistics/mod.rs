//! Statistics collected by the cache tiers

pub mod access_counter;

pub use access_counter::{AccessCounter, AccessSnapshot};
