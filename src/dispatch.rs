//! Handing partitions to workers
//!
//! Two ways to fan a key space out:
//!
//! - [`split_for_workers`]: repeated bisection for a fixed set of local
//!   threads, always splitting the part with the most keys left.
//! - [`PartitionQueue`]: sequential issuance of pool partitions with
//!   re-queueing of abandoned ones. The pool stays a pure index -> partition
//!   function; all issuance state lives here.

use std::fmt;

use crossbeam::queue::SegQueue;
use log::{debug, trace, warn};
use num_bigint::BigUint;
use num_traits::Zero;
use parking_lot::Mutex;

use crate::pattern::KeyPattern;
use crate::pool::KeyPatternPool;

/// Bisect `pattern` until there are `workers` parts or nothing splits further
///
/// The parts are disjoint and together cover the unvisited keys of `pattern`.
pub fn split_for_workers(pattern: KeyPattern, workers: usize) -> Vec<KeyPattern> {
    if workers == 0 {
        return Vec::new();
    }

    let mut parts = vec![pattern];
    while parts.len() < workers {
        let largest = parts
            .iter()
            .enumerate()
            .max_by_key(|(_, part)| part.remaining())
            .map(|(idx, _)| idx);

        let Some(largest) = largest else { break };
        let Some((first, second)) = parts[largest].split() else {
            debug!("Key space exhausted after {} parts", parts.len());
            break;
        };

        parts[largest] = first;
        parts.push(second);
    }

    parts
}

/// A partition handed to a worker
#[derive(Clone, Debug)]
pub struct Claim {
    /// Pool index, used to release the partition again
    pub index: BigUint,
    /// The partition itself, owned by the worker
    pub pattern: KeyPattern,
}

/// Issues pool partitions to concurrent workers
///
/// Returned (abandoned) partitions are handed out again before new ones.
pub struct PartitionQueue {
    pool: KeyPatternPool,
    total: BigUint,
    next: Mutex<BigUint>,
    returned: SegQueue<BigUint>,
}

impl PartitionQueue {
    /// Create a queue over every partition of `pool`
    pub fn new(pool: KeyPatternPool) -> Self {
        let total = pool.len();
        Self {
            pool,
            total,
            next: Mutex::new(BigUint::zero()),
            returned: SegQueue::new(),
        }
    }

    /// The underlying pool
    pub fn pool(&self) -> &KeyPatternPool {
        &self.pool
    }

    /// Take the next partition, preferring returned ones
    pub fn claim(&self) -> Option<Claim> {
        if let Some(index) = self.returned.pop() {
            trace!("Reissuing partition {index}");
            return self.claim_index(index);
        }

        let index = {
            let mut next = self.next.lock();
            if *next >= self.total {
                return None;
            }
            let index = next.clone();
            *next += 1u32;
            index
        };

        trace!("Issuing partition {index}");
        self.claim_index(index)
    }

    fn claim_index(&self, index: BigUint) -> Option<Claim> {
        let pattern = self.pool.get(&index)?;
        Some(Claim { index, pattern })
    }

    /// Give a partition back for reassignment
    pub fn release(&self, index: BigUint) {
        warn!("Partition {index} returned for reassignment");
        self.returned.push(index);
    }

    /// Number of fresh partitions issued so far
    pub fn issued(&self) -> BigUint {
        self.next.lock().clone()
    }

    /// Number of returned partitions waiting to be reissued
    pub fn pending_returns(&self) -> usize {
        self.returned.len()
    }

    /// True once every partition was issued and nothing waits for reissue
    pub fn is_drained(&self) -> bool {
        self.returned.is_empty() && *self.next.lock() >= self.total
    }
}

impl fmt::Debug for PartitionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionQueue")
            .field("total", &self.total)
            .field("issued", &self.issued())
            .field("pending_returns", &self.pending_returns())
            .finish()
    }
}
