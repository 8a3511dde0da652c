//! Bounded dynamic tier

pub mod bounded;
pub mod recency_list;

pub use bounded::BoundedLruCache;
