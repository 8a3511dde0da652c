//! Cache key capabilities and the shared error type

pub mod fingerprint;
pub mod types_and_enums;

pub use fingerprint::{Fingerprint, FingerprintContext, Fingerprintable};
pub use types_and_enums::CacheOperationError;
