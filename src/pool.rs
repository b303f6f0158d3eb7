//! Partitioning a key pattern into many disjoint sub-patterns
//!
//! Each wildcard `i` is cut into `split_factors[i]` equal contiguous slices,
//! where the factor divides the wildcard length exactly. A partition picks one
//! slice per wildcard, so partition `n` is a mixed-radix number over the
//! factors and every key belongs to exactly one partition.
//!
//! The factors come from a greedy local search: each wildcard's divisor is
//! chosen with the others held fixed, keeping a candidate only if it brings
//! the partition size strictly closer to the target. The result is close to
//! the target but not guaranteed to be the best divisor tuple.

use log::debug;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::{PatternError, Result};
use crate::keyspace::{calculate_keyspace, index_to_digits};
use crate::pattern::KeyPattern;
use crate::wildcard::Wildcard;

/// Indexed, disjoint, near-equal partitions of a key pattern
#[derive(Clone, Debug)]
pub struct KeyPatternPool {
    source: KeyPattern,
    target_partition_size: BigUint,
    split_factors: Vec<usize>,
}

impl KeyPatternPool {
    /// Partition `pattern` into parts of roughly `target_partition_size` keys
    ///
    /// The pattern's cursors are ignored; partitions always start fresh.
    ///
    /// # Example
    ///
    /// ```
    /// use keyspace_pool::{KeyPattern, KeyPatternPool};
    /// use num_bigint::BigUint;
    ///
    /// let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
    /// let pool = KeyPatternPool::new(&pattern, 3u32);
    ///
    /// assert_eq!(pool.len(), BigUint::from(3u32));
    /// let second = pool.get(&BigUint::from(1u32)).unwrap();
    /// assert_eq!(second.into_keys().collect::<Vec<_>>(), ["KB0", "KB1"]);
    /// ```
    pub fn new<N: Into<BigUint>>(pattern: &KeyPattern, target_partition_size: N) -> Self {
        let mut source = pattern.clone();
        source.rewind();

        let target_partition_size = target_partition_size.into();
        let lengths: Vec<usize> = source.wildcards().iter().map(Wildcard::len).collect();
        let split_factors = calculate_split_factors(&lengths, &target_partition_size);

        let pool = Self {
            source,
            target_partition_size,
            split_factors,
        };

        debug!(
            "Pool over '{}': split factors {:?}, {} partitions of {} keys (target {})",
            pool.source.wildcard_key(),
            pool.split_factors,
            pool.len(),
            pool.part_size(),
            pool.target_partition_size
        );

        pool
    }

    /// Create a new builder
    pub fn builder() -> KeyPatternPoolBuilder {
        KeyPatternPoolBuilder::new()
    }

    /// The partitioned pattern, rewound
    pub fn source(&self) -> &KeyPattern {
        &self.source
    }

    /// Requested keys per partition
    pub fn target_partition_size(&self) -> &BigUint {
        &self.target_partition_size
    }

    /// One divisor per wildcard
    pub fn split_factors(&self) -> &[usize] {
        &self.split_factors
    }

    /// Number of partitions
    pub fn len(&self) -> BigUint {
        calculate_keyspace(&self.split_factors)
    }

    /// Always false: a pool has at least one partition
    pub fn is_empty(&self) -> bool {
        self.len().is_zero()
    }

    /// Keys in every partition
    pub fn part_size(&self) -> BigUint {
        let lengths: Vec<usize> = self.source.wildcards().iter().map(Wildcard::len).collect();
        part_size(&lengths, &self.split_factors)
    }

    fn slice_len(&self, slot: usize) -> usize {
        self.source.wildcards()[slot].len() / self.split_factors[slot]
    }

    /// Partition `index`, or `None` if out of range
    ///
    /// The first wildcard is the most significant digit of the index.
    pub fn get(&self, index: &BigUint) -> Option<KeyPattern> {
        let digits = index_to_digits(index, &self.split_factors)?;

        let wildcards = self
            .source
            .wildcards()
            .iter()
            .zip(digits)
            .enumerate()
            .map(|(slot, (wildcard, digit))| {
                let slice = self.slice_len(slot);
                wildcard.slice(digit * slice..(digit + 1) * slice)
            })
            .collect();

        Some(self.source.with_wildcards(wildcards))
    }

    /// Partitions in index order
    pub fn iter(&self) -> Partitions<'_> {
        Partitions {
            pool: self,
            next: BigUint::zero(),
            end: self.len(),
        }
    }

    /// Wildcard key covering partitions `from..=to` as one pattern
    ///
    /// Each slot is the union of the slices the range uses at that position,
    /// so for ranges not aligned to the factors the result may cover more
    /// keys than the partitions themselves. Returns `None` for an empty or
    /// out-of-range interval.
    pub fn range_representation(&self, from: &BigUint, to: &BigUint) -> Option<String> {
        if from > to || to >= &self.len() {
            return None;
        }

        let n = self.split_factors.len();
        let mut wildcards = Vec::with_capacity(n);

        for slot in 0..n {
            let factor = self.split_factors[slot];
            let stride = calculate_keyspace(&self.split_factors[slot + 1..]);
            let first = from / &stride;
            let last = to / &stride;

            // Digits at this slot are consecutive quotients modulo the factor
            let span = &last - &first + BigUint::one();
            let mut digits: Vec<usize> = if span >= BigUint::from(factor) {
                (0..factor).collect()
            } else {
                let start = first.mod_floor(&BigUint::from(factor)).to_usize()?;
                let count = span.to_usize()?;
                (0..count).map(|k| (start + k) % factor).collect()
            };
            digits.sort_unstable();

            let slice = self.slice_len(slot);
            let source = &self.source.wildcards()[slot];
            let chars = digits
                .iter()
                .flat_map(|&digit| source.chars()[digit * slice..(digit + 1) * slice].iter())
                .copied()
                .collect();
            wildcards.push(Wildcard::from_chars(chars));
        }

        Some(self.source.with_wildcards(wildcards).wildcard_key())
    }
}

/// Iterator over the partitions of a pool
pub struct Partitions<'a> {
    pool: &'a KeyPatternPool,
    next: BigUint,
    end: BigUint,
}

impl<'a> Iterator for Partitions<'a> {
    type Item = KeyPattern;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }

        let partition = self.pool.get(&self.next);
        self.next += 1u32;
        partition
    }
}

fn part_size(lengths: &[usize], factors: &[usize]) -> BigUint {
    lengths
        .iter()
        .zip(factors)
        .fold(BigUint::one(), |acc, (&len, &factor)| {
            acc * BigUint::from(len / factor)
        })
}

fn distance(a: &BigUint, b: &BigUint) -> BigUint {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Greedy per-wildcard divisor search, repeated until no factor moves
fn calculate_split_factors(lengths: &[usize], target: &BigUint) -> Vec<usize> {
    let mut factors = vec![1usize; lengths.len()];
    let mut best = distance(&part_size(lengths, &factors), target);

    loop {
        let mut changed = false;

        for (slot, &len) in lengths.iter().enumerate() {
            for divisor in 1..=len {
                if len % divisor != 0 || divisor == factors[slot] {
                    continue;
                }

                let mut candidate = factors.clone();
                candidate[slot] = divisor;
                let diff = distance(&part_size(lengths, &candidate), target);
                if diff < best {
                    best = diff;
                    factors = candidate;
                    changed = true;
                }
            }
        }

        if !changed {
            return factors;
        }
    }
}

/// Builder for [`KeyPatternPool`]
#[derive(Default)]
pub struct KeyPatternPoolBuilder {
    pattern: Option<KeyPattern>,
    part_size: Option<BigUint>,
    partitions: Option<BigUint>,
}

impl KeyPatternPoolBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pattern to partition
    pub fn pattern(mut self, pattern: KeyPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Target keys per partition
    pub fn part_size<N: Into<BigUint>>(mut self, size: N) -> Self {
        self.part_size = Some(size.into());
        self
    }

    /// Target number of partitions; the part size becomes `size / partitions`
    pub fn partitions<N: Into<BigUint>>(mut self, count: N) -> Self {
        self.partitions = Some(count.into());
        self
    }

    /// Build the pool
    pub fn build(self) -> Result<KeyPatternPool> {
        let pattern = self
            .pattern
            .ok_or_else(|| PatternError::InvalidPool("pattern not set".to_string()))?;

        let target = match (self.part_size, self.partitions) {
            (Some(_), Some(_)) => {
                return Err(PatternError::InvalidPool(
                    "set either a part size or a partition count, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(PatternError::InvalidPool(
                    "part size or partition count required".to_string(),
                ))
            }
            (Some(size), None) => {
                if size.is_zero() {
                    return Err(PatternError::InvalidPool("part size must be positive".to_string()));
                }
                size
            }
            (None, Some(count)) => {
                if count.is_zero() {
                    return Err(PatternError::InvalidPool(
                        "partition count must be positive".to_string(),
                    ));
                }
                // More partitions than keys: one key each
                (pattern.size() / count).max(BigUint::one())
            }
        };

        Ok(KeyPatternPool::new(&pattern, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_split_factors_scenario() {
        let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        let pool = KeyPatternPool::new(&pattern, 3u32);

        assert_eq!(pool.split_factors(), &[3, 1]);
        assert_eq!(pool.len(), big(3));
        assert_eq!(pool.part_size(), big(2));

        let parts: Vec<Vec<String>> = pool.iter().map(|p| p.into_keys().collect()).collect();
        assert_eq!(
            parts,
            vec![
                vec!["KA0", "KA1"],
                vec!["KB0", "KB1"],
                vec!["KC0", "KC1"]
            ]
        );
    }

    #[test]
    fn test_factors_divide_lengths() {
        let pattern = KeyPattern::new("[a-z][0-9][A-F]").unwrap();
        let pool = KeyPatternPool::new(&pattern, 100u32);

        for (wc, &factor) in pattern.wildcards().iter().zip(pool.split_factors()) {
            assert_eq!(wc.len() % factor, 0);
        }
        assert_eq!(pool.len() * pool.part_size(), pattern.size());
        assert_eq!(pool.split_factors(), &[13, 1, 1]);
        assert_eq!(pool.part_size(), big(120));
    }

    #[test]
    fn test_extreme_targets() {
        let pattern = KeyPattern::new("[a-d][0-5]").unwrap();

        let whole = KeyPatternPool::new(&pattern, 1_000u32);
        assert_eq!(whole.len(), big(1));
        assert_eq!(whole.part_size(), big(24));

        let singles = KeyPatternPool::new(&pattern, 1u32);
        assert_eq!(singles.len(), big(24));
        assert_eq!(singles.part_size(), big(1));
    }

    #[test]
    fn test_partitions_are_disjoint_and_cover() {
        let pattern = KeyPattern::new("x[a-f]-[0-3][pq]").unwrap();
        let pool = KeyPatternPool::new(&pattern, 5u32);

        let mut seen = HashSet::new();
        for partition in pool.iter() {
            assert_eq!(partition.size(), pool.part_size());
            for key in partition.into_keys() {
                assert!(seen.insert(key.clone()), "duplicate key {key}");
            }
        }
        let all: HashSet<String> = pattern.into_keys().collect();
        assert_eq!(seen, all);
    }

    #[test]
    fn test_get_out_of_range() {
        let pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        let pool = KeyPatternPool::new(&pattern, 3u32);
        assert!(pool.get(&big(2)).is_some());
        assert!(pool.get(&big(3)).is_none());
    }

    #[test]
    fn test_pool_ignores_cursor() {
        let mut pattern = KeyPattern::new("K[A-C][0-1]").unwrap();
        pattern.advance(&big(3));
        let pool = KeyPatternPool::new(&pattern, 2u32);
        assert_eq!(pool.get(&big(0)).unwrap().current_key(), "KA0");
    }

    #[test]
    fn test_range_representation() {
        let pattern = KeyPattern::new("[a-d][0-5]").unwrap();
        let pool = KeyPatternPool::new(&pattern, 3u32);
        assert_eq!(pool.split_factors(), &[4, 2]);

        // Partition 0 = a[0-2], 1 = a[3-5], 2 = b[0-2]
        assert_eq!(pool.range_representation(&big(0), &big(0)).unwrap(), "a[0-2]");
        assert_eq!(pool.range_representation(&big(0), &big(1)).unwrap(), "a*");
        assert_eq!(pool.range_representation(&big(2), &big(5)).unwrap(), "[b-c]*");
        assert_eq!(pool.range_representation(&big(0), &big(7)).unwrap(), "**");

        assert!(pool.range_representation(&big(3), &big(2)).is_none());
        assert!(pool.range_representation(&big(0), &big(8)).is_none());
    }

    #[test]
    fn test_builder() {
        let pattern = KeyPattern::new("[a-d][0-5]").unwrap();

        let pool = KeyPatternPool::builder()
            .pattern(pattern.clone())
            .partitions(8u32)
            .build()
            .unwrap();
        assert_eq!(pool.target_partition_size(), &big(3));
        assert_eq!(pool.len(), big(8));

        assert!(KeyPatternPool::builder().partitions(2u32).build().is_err());
        assert!(KeyPatternPool::builder()
            .pattern(pattern.clone())
            .build()
            .is_err());
        assert!(KeyPatternPool::builder()
            .pattern(pattern.clone())
            .part_size(0u32)
            .build()
            .is_err());
        assert!(KeyPatternPool::builder()
            .pattern(pattern)
            .part_size(2u32)
            .partitions(2u32)
            .build()
            .is_err());
    }
}
