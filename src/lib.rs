//! Cycle cost cache - memoizing cost resolution for VPU workloads
//!
//! A two-tier cache of raw predictor outputs plus the resolver that decides,
//! per request, where a cycle estimate comes from.
//!
//! # Features
//!
//! - **Fixed tier**: immutable table preloaded from a headerless binary file
//! - **Dynamic tier**: bounded LRU, safe to share across threads
//! - **Cascading resolution**: cache, measurement service, predictor, analytical fallback
//! - **Dual sparsity handling**: resolved as two variants, the smaller estimate wins
//! - **Per-thread execution contexts**: predictor buffers created once per thread
//!
//! Fingerprint collisions are not detected in either tier. Keys that hash to
//! the same fingerprint share a slot.

pub mod cache;
pub mod prelude;
pub mod resolver;

pub use prelude::*;
