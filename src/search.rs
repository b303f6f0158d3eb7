//! Parallel brute-force driver
//!
//! Runs a caller-supplied key test over every partition of a
//! [`PartitionQueue`] on a fixed-size thread pool. Each worker owns the
//! pattern it is enumerating.
//!
//! Once the queue runs dry, a worker without keys registers as idle and
//! blocks on a hand-off channel. Busy workers publish how many keys they
//! have left; the busiest one bisects its in-progress pattern with
//! [`KeyPattern::split`], keeps the first half (which resumes at its cursor)
//! and sends the second half to the idle worker. The run ends when every
//! worker is idle or a match stops it early.
//!
//! [`KeyPattern::split`]: crate::KeyPattern::split

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Sender};
use log::{debug, info};
use num_bigint::BigUint;
use num_traits::Zero;
use parking_lot::Mutex;
use serde::Serialize;

use crate::dispatch::PartitionQueue;
use crate::pattern::KeyPattern;

/// Keys a worker tests between two load publications
const PUBLISH_INTERVAL: u64 = 64;

/// Search settings
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Worker threads (at least one is used)
    pub threads: usize,
    /// Stop every worker after the first matching key
    pub stop_on_first: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            stop_on_first: false,
        }
    }
}

/// Outcome of a search run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    /// Matching keys, sorted
    pub matches: Vec<String>,
    /// Keys passed to the predicate
    pub keys_tested: u64,
    /// Partitions enumerated to the end, counting split-off pieces
    pub partitions_completed: u64,
    /// Patterns handed from a busy worker to an idle one
    pub splits: u64,
    /// True if workers stopped before the queue drained
    pub stopped_early: bool,
}

/// A pattern being enumerated, tagged with the partition it came from
struct Piece {
    partition: BigUint,
    pattern: KeyPattern,
}

/// Idle workers and the number of workers holding keys
struct Board {
    waiting: Vec<Sender<Piece>>,
    busy: usize,
}

/// State shared by the workers of one run
struct Shared<'q> {
    queue: &'q PartitionQueue,
    stop: AtomicBool,
    board: Mutex<Board>,
    /// Mirror of `board.waiting.len()`, read without locking
    idle: AtomicUsize,
    /// Last published `remaining()` of every worker
    loads: Mutex<Vec<BigUint>>,
    /// Pieces still being enumerated, per partition
    pieces: Mutex<HashMap<BigUint, usize>>,
    interrupted: Mutex<BTreeSet<BigUint>>,
    splits: AtomicU64,
    report: Mutex<SearchReport>,
}

impl<'q> Shared<'q> {
    fn new(queue: &'q PartitionQueue, threads: usize) -> Self {
        Self {
            queue,
            stop: AtomicBool::new(false),
            board: Mutex::new(Board {
                waiting: Vec::new(),
                busy: 0,
            }),
            idle: AtomicUsize::new(0),
            loads: Mutex::new(vec![BigUint::zero(); threads]),
            pieces: Mutex::new(HashMap::new()),
            interrupted: Mutex::new(BTreeSet::new()),
            splits: AtomicU64::new(0),
            report: Mutex::new(SearchReport::default()),
        }
    }

    /// Stop every worker and wake the idle ones
    fn halt(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let mut board = self.board.lock();
        board.waiting.clear();
        self.idle.store(0, Ordering::SeqCst);
    }

    /// A fresh partition, else the second half of a busy worker's pattern
    fn next_piece(&self, worker: usize) -> Option<Piece> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }

        if let Some(claim) = self.queue.claim() {
            *self.pieces.lock().entry(claim.index.clone()).or_insert(0) += 1;
            return Some(Piece {
                partition: claim.index,
                pattern: claim.pattern,
            });
        }

        self.wait_for_split(worker)
    }

    fn wait_for_split(&self, worker: usize) -> Option<Piece> {
        self.loads.lock()[worker] = BigUint::zero();

        let receiver = {
            let mut board = self.board.lock();
            board.busy -= 1;
            if board.busy == 0 || self.stop.load(Ordering::SeqCst) {
                // Nobody holds keys any more; dropping the senders wakes everyone
                board.waiting.clear();
                self.idle.store(0, Ordering::SeqCst);
                return None;
            }

            let (sender, receiver) = bounded(1);
            board.waiting.push(sender);
            self.idle.store(board.waiting.len(), Ordering::SeqCst);
            receiver
        };

        debug!("Worker {worker} waiting for new keys");
        let piece = receiver.recv().ok()?;
        debug!(
            "Worker {worker} woke up with '{}'",
            piece.pattern.wildcard_key()
        );
        Some(piece)
    }

    /// Publish this worker's load and, if it is the busiest while another
    /// worker is idle, hand it the second half of `piece`
    fn balance(&self, worker: usize, piece: &mut Piece) {
        let remaining = piece.pattern.remaining();
        let busiest = {
            let mut loads = self.loads.lock();
            loads[worker] = remaining;
            loads
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1))
                .map(|(idx, _)| idx)
                == Some(worker)
        };
        if !busiest || self.idle.load(Ordering::SeqCst) == 0 {
            return;
        }

        let mut board = self.board.lock();
        let Some(sender) = board.waiting.pop() else {
            return;
        };
        let Some((first, second)) = piece.pattern.split() else {
            board.waiting.push(sender);
            return;
        };

        *self.pieces.lock().entry(piece.partition.clone()).or_insert(0) += 1;
        board.busy += 1;
        self.idle.store(board.waiting.len(), Ordering::SeqCst);
        self.splits.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Worker {worker} shares '{}' of partition {}",
            second.wildcard_key(),
            piece.partition
        );
        piece.pattern = first;
        let handoff = Piece {
            partition: piece.partition.clone(),
            pattern: second,
        };
        if let Err(lost) = sender.send(handoff) {
            // Receiver gone: requeue the whole partition after the run
            board.busy -= 1;
            drop(board);
            self.finish(&lost.into_inner(), true);
        }
    }

    /// Retire a piece; true when it was the last piece of an uninterrupted partition
    fn finish(&self, piece: &Piece, interrupted: bool) -> bool {
        let mut pieces = self.pieces.lock();
        let mut interrupted_set = self.interrupted.lock();
        if interrupted {
            interrupted_set.insert(piece.partition.clone());
        }

        let left = match pieces.get_mut(&piece.partition) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => 0,
        };
        if left > 0 {
            return false;
        }

        pieces.remove(&piece.partition);
        !interrupted_set.contains(&piece.partition)
    }

    fn run_worker<F>(&self, worker: usize, config: &SearchConfig, predicate: &F)
    where
        F: Fn(&str) -> bool,
    {
        self.board.lock().busy += 1;

        let mut found = Vec::new();
        let mut tested = 0u64;
        let mut completed = 0u64;

        while let Some(mut piece) = self.next_piece(worker) {
            let mut interrupted = false;
            let mut since_publish = 0u64;

            loop {
                let key = piece.pattern.current_key();
                tested += 1;
                if predicate(&key) {
                    found.push(key);
                    if config.stop_on_first {
                        self.halt();
                    }
                }
                if !piece.pattern.next() {
                    break;
                }
                if self.stop.load(Ordering::Relaxed) {
                    interrupted = true;
                    break;
                }

                since_publish += 1;
                if since_publish == PUBLISH_INTERVAL {
                    since_publish = 0;
                    self.balance(worker, &mut piece);
                }
            }

            if self.finish(&piece, interrupted) {
                completed += 1;
                debug!("Worker {worker} finished partition {}", piece.partition);
            }
        }

        let mut report = self.report.lock();
        report.matches.extend(found);
        report.keys_tested += tested;
        report.partitions_completed += completed;
    }
}

/// Test every key handed out by `queue` with `predicate`
///
/// Partitions interrupted by an early stop are released back to the queue
/// once all workers have stopped, so a later run picks them up again.
pub fn search<F>(queue: &PartitionQueue, config: &SearchConfig, predicate: F) -> Result<SearchReport>
where
    F: Fn(&str) -> bool + Sync,
{
    let threads = config.threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("keysearch-{i}"))
        .build()
        .context("Failed to build search thread pool")?;

    info!(
        "Searching {} partitions of {} keys on {} threads",
        queue.pool().len(),
        queue.pool().part_size(),
        threads
    );

    let shared = Shared::new(queue, threads);

    pool.scope(|scope| {
        for worker in 0..threads {
            let (shared, predicate) = (&shared, &predicate);
            scope.spawn(move |_| shared.run_worker(worker, config, predicate));
        }
    });

    let stopped_early = shared.stop.load(Ordering::SeqCst);
    let splits = shared.splits.load(Ordering::Relaxed);
    for index in shared.interrupted.into_inner() {
        queue.release(index);
    }

    let mut report = shared.report.into_inner();
    report.matches.sort();
    report.splits = splits;
    report.stopped_early = stopped_early;

    info!(
        "Search finished: {} keys tested, {} partitions completed, {} splits, {} matches",
        report.keys_tested,
        report.partitions_completed,
        report.splits,
        report.matches.len()
    );

    Ok(report)
}
