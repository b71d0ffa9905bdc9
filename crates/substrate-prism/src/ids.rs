// crates/substrate-prism/src/ids.rs
// ============================================================================
// Module: Prism Identifier Generation
// Description: The seam Prism uses to mint identifiers for new canon entities.
// Purpose: Keep identifier generation swappable and deterministic in tests,
//          mirroring the Clock seam in substrate-core::core::time.
// Dependencies: uuid
// ============================================================================

//! ## Overview
//! `spec.md` leaves identifier generation to "callers (or a concrete
//! `Repository`)" (`substrate-core::core::identifiers`). Prism is the only
//! place new canon identifiers are minted, so it owns this seam:
//! [`IdGenerator`] is implemented by [`UuidGenerator`] in production and by a
//! sequential test double in this crate's tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use uuid::Uuid;

// ============================================================================
// SECTION: Id Generator
// ============================================================================

/// Mints opaque identifier strings for newly created canon entities.
pub trait IdGenerator: Send + Sync {
    /// Returns a freshly minted identifier string. Implementations must never
    /// return an empty string.
    fn generate(&self) -> String;
}

/// Production [`IdGenerator`] backed by random UUIDv4s.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_generator_never_produces_empty_ids() {
        let generator = UuidGenerator;
        for _ in 0 .. 16 {
            assert!(!generator.generate().is_empty());
        }
    }

    #[test]
    fn uuid_generator_produces_distinct_ids() {
        let generator = UuidGenerator;
        let a = generator.generate();
        let b = generator.generate();
        assert_ne!(a, b);
    }
}
