//! Keyspace calculation and mixed-radix index arithmetic
//!
//! Every key space in this crate is a product of per-position alphabets, so a
//! key is a mixed-radix number whose digits are alphabet offsets:
//!
//! ```text
//! For radices [r0, r1, ..., rn] (leftmost = most significant):
//!
//! digit[n] = i % rn
//! i = i / rn
//! digit[n-1] = i % rn-1
//! i = i / rn-1
//! ...
//! ```
//!
//! The same decomposition drives random access into a pattern (radices are
//! wildcard lengths) and partition lookup in a pool (radices are split
//! factors). All sizes are `BigUint`; only single digits are machine integers
//! since each is bounded by an alphabet length.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

/// Calculate the total keyspace size for a sequence of radices
///
/// # Example
///
/// ```
/// use keyspace_pool::keyspace::calculate_keyspace;
/// use num_bigint::BigUint;
///
/// assert_eq!(calculate_keyspace(&[3, 2, 3]), BigUint::from(18u32));
/// ```
pub fn calculate_keyspace(radices: &[usize]) -> BigUint {
    radices
        .iter()
        .fold(BigUint::one(), |acc, &radix| acc * BigUint::from(radix))
}

/// Convert an index into per-position digits
///
/// Returns `None` when `index` lies outside the keyspace.
///
/// # Example
///
/// ```
/// use keyspace_pool::keyspace::index_to_digits;
/// use num_bigint::BigUint;
///
/// let radices = [3, 2];
/// assert_eq!(index_to_digits(&BigUint::from(0u32), &radices), Some(vec![0, 0]));
/// assert_eq!(index_to_digits(&BigUint::from(3u32), &radices), Some(vec![1, 1]));
/// assert_eq!(index_to_digits(&BigUint::from(6u32), &radices), None);
/// ```
pub fn index_to_digits(index: &BigUint, radices: &[usize]) -> Option<Vec<usize>> {
    let mut digits = vec![0usize; radices.len()];
    let mut remaining = index.clone();

    // Right to left (least significant to most significant)
    for pos in (0..radices.len()).rev() {
        let radix = BigUint::from(radices[pos]);
        if radix.is_zero() {
            return None;
        }
        let (quotient, digit) = remaining.div_rem(&radix);
        digits[pos] = digit.to_usize()?;
        remaining = quotient;
    }

    if remaining.is_zero() {
        Some(digits)
    } else {
        None
    }
}

/// Inverse of [`index_to_digits`]
///
/// Digits are assumed to be in range for their radix.
pub fn digits_to_index(digits: &[usize], radices: &[usize]) -> BigUint {
    debug_assert_eq!(digits.len(), radices.len());

    digits
        .iter()
        .zip(radices)
        .fold(BigUint::zero(), |acc, (&digit, &radix)| {
            acc * BigUint::from(radix) + BigUint::from(digit)
        })
}
