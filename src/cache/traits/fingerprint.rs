//! Stable key fingerprints for both cache tiers
//!
//! Every key is reduced to a 64-bit fingerprint before it touches a tier.
//! Float slices are hashed bit-exactly (`f32::to_bits`), so `0.0` and `-0.0`
//! are different keys and NaN payloads are preserved.
//!
//! Neither tier detects fingerprint collisions: two distinct keys that hash to
//! the same fingerprint share one slot, and the later write to the fixed tier
//! silently replaces the earlier one.

use std::hash::{BuildHasher, Hasher};

use ahash::{AHasher, RandomState};

/// Fixed-width cache key derived from a feature vector or workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    #[inline(always)]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Seeded hashing context
///
/// The seed is fixed per context, so the same logical input always produces
/// the same fingerprint for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerprintContext {
    seed: u64,
}

impl FingerprintContext {
    pub const DEFAULT_SEED: u64 = 0x517c_c1b7_2722_0a95;

    #[inline(always)]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    #[inline(always)]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    fn build_hasher(&self) -> AHasher {
        RandomState::with_seeds(
            self.seed,
            self.seed.rotate_left(17) ^ 0x9e37_79b9_7f4a_7c15,
            self.seed.rotate_left(31),
            !self.seed,
        )
        .build_hasher()
    }

    /// Hash a float slice bit-exactly
    pub fn hash_floats(&self, values: &[f32]) -> Fingerprint {
        let mut hasher = self.build_hasher();
        hasher.write_usize(values.len());
        for value in values {
            hasher.write_u32(value.to_bits());
        }
        Fingerprint(hasher.finish())
    }
}

impl Default for FingerprintContext {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

/// Anything that can be reduced to a cache fingerprint
pub trait Fingerprintable {
    fn fingerprint(&self, context: &FingerprintContext) -> Fingerprint;
}

impl Fingerprintable for [f32] {
    #[inline]
    fn fingerprint(&self, context: &FingerprintContext) -> Fingerprint {
        context.hash_floats(self)
    }
}

impl Fingerprintable for Vec<f32> {
    #[inline]
    fn fingerprint(&self, context: &FingerprintContext) -> Fingerprint {
        context.hash_floats(self.as_slice())
    }
}

impl<const N: usize> Fingerprintable for [f32; N] {
    #[inline]
    fn fingerprint(&self, context: &FingerprintContext) -> Fingerprint {
        context.hash_floats(self.as_slice())
    }
}

/// Precomputed fingerprints pass through unchanged
impl Fingerprintable for Fingerprint {
    #[inline(always)]
    fn fingerprint(&self, _context: &FingerprintContext) -> Fingerprint {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_input_same_fingerprint() {
        let ctx = FingerprintContext::default();
        let a = vec![1.0f32, 2.5, -3.0];
        let b = vec![1.0f32, 2.5, -3.0];
        assert_eq!(a.fingerprint(&ctx), b.fingerprint(&ctx));
        assert_eq!(a.fingerprint(&ctx), ctx.hash_floats(&[1.0, 2.5, -3.0]));
    }

    #[test]
    fn test_bit_exact_hashing() {
        let ctx = FingerprintContext::default();
        assert_ne!(ctx.hash_floats(&[0.0]), ctx.hash_floats(&[-0.0]));
        assert_ne!(ctx.hash_floats(&[1.0, 2.0]), ctx.hash_floats(&[2.0, 1.0]));
        // length participates in the hash
        assert_ne!(ctx.hash_floats(&[0.0]), ctx.hash_floats(&[0.0, 0.0]));
    }

    #[test]
    fn test_seed_changes_fingerprint() {
        let key = [4.0f32, 8.0];
        let a = key.fingerprint(&FingerprintContext::new(1));
        let b = key.fingerprint(&FingerprintContext::new(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_passthrough() {
        let ctx = FingerprintContext::default();
        let fp = Fingerprint(42);
        assert_eq!(fp.fingerprint(&ctx), fp);
    }
}
