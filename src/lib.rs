//! Key-space patterns for distributed brute-force key search
//!
//! A key space is written as a template of literal characters and bracketed
//! character classes:
//!
//! ```text
//! AB[C-F]D[0-9]   →   ABCD0, ABCD1, ..., ABFD9   (4 × 10 keys)
//! ```
//!
//! The space is a mixed-radix number, one digit per class, which gives:
//! - Deterministic odometer enumeration (rightmost class moves fastest)
//! - Random access to any key ahead of the cursor
//! - Exact bisection for dynamic work stealing ([`KeyPattern::split`])
//! - Near-equal, disjoint partitions for fan-out ([`KeyPatternPool`])
//! - A compact binary record for shipping partitions ([`wire`])
//!
//! Sizes are arbitrary-precision (`BigUint`), so key spaces far beyond
//! 2^128 are handled exactly.
//!
//! # Example Usage
//!
//! ```rust
//! use keyspace_pool::{KeyPattern, KeyPatternPool};
//! use num_bigint::BigUint;
//!
//! # fn main() -> Result<(), keyspace_pool::PatternError> {
//! let pattern = KeyPattern::with_wildcard_key("KEY-[0-9A-F][0-9A-F]", "KEY-[0-7]*")?;
//! assert_eq!(pattern.size(), BigUint::from(128u32));
//!
//! // 8 partitions of 16 keys, one per worker
//! let pool = KeyPatternPool::builder().pattern(pattern).partitions(8u32).build()?;
//! for partition in pool.iter() {
//!     let bytes = partition.serialize()?;
//!     let received = KeyPattern::deserialize(&bytes)?;
//!     for key in received.into_keys() {
//!         // decrypt-and-score goes here
//!         assert!(key.starts_with("KEY-"));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod keyspace;
pub mod movement;
pub mod pattern;
pub mod pool;
pub mod search;
pub mod wildcard;
pub mod wire;

// Re-exports for convenience
pub use dispatch::{split_for_workers, Claim, PartitionQueue};
pub use error::{PatternError, Result};
pub use keyspace::calculate_keyspace;
pub use movement::KeyMovement;
pub use pattern::{KeyPattern, Keys};
pub use pool::{KeyPatternPool, KeyPatternPoolBuilder, Partitions};
pub use search::{search, SearchConfig, SearchReport};
pub use wildcard::Wildcard;

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn test_pool_of_split_half() {
        // A half produced by bisection partitions like any other pattern
        let pattern = KeyPattern::new("[a-h][0-3]").unwrap();
        let (_, upper) = pattern.split().unwrap();
        assert_eq!(upper.wildcard_key(), "[e-h]*");

        let pool = KeyPatternPool::new(&upper, 4u32);
        assert_eq!(pool.len(), BigUint::from(4u32));
        assert_eq!(
            pool.get(&BigUint::from(3u32)).unwrap().wildcard_key(),
            "h*"
        );
    }

    #[test]
    fn test_missing_pattern() {
        let result = KeyPatternPool::builder().part_size(4u32).build();
        assert!(matches!(result, Err(PatternError::InvalidPool(_))));
    }
}
