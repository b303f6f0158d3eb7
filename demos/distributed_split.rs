//! # Distributed Split Example
//!
//! Walks through the full hand-off path of a key search:
//! - Building a pattern from a template and a wildcard key
//! - Partitioning it into a pool sized for a number of nodes
//! - Serializing partitions as a remote node would receive them
//! - Work stealing inside a node with `split()`
//! - Running the parallel search driver
//!
//! Run with `cargo run --example distributed_split`.

use anyhow::{Context, Result};
use keyspace_pool::{
    search, split_for_workers, KeyPattern, KeyPatternPool, PartitionQueue, SearchConfig,
};
use num_bigint::BigUint;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("Key Pattern - Distributed Split Example\n");

    // 8 × 16 × 36 keys: the first hex digit is restricted to 0-7
    let pattern =
        KeyPattern::with_wildcard_key("PIN-[0-9A-F][0-9A-F]-[0-9a-z]", "PIN-[0-7]*-*")?;
    println!("Pattern:   {}", pattern);
    println!("Key space: {} keys\n", pattern.size());

    // Example 1: one partition per node
    println!("Example 1: Pool for 4 nodes");
    let pool = KeyPatternPool::builder()
        .pattern(pattern.clone())
        .partitions(4u32)
        .build()?;
    for (i, partition) in pool.iter().enumerate() {
        let bytes = partition.serialize()?;
        println!(
            "  node {}: {:<22} {} keys, {} bytes on the wire",
            i,
            partition.wildcard_key(),
            partition.size(),
            bytes.len()
        );
    }
    let all = pool.range_representation(&BigUint::from(0u32), &(pool.len() - 1u32));
    println!("  all partitions as one key: {}\n", all.unwrap_or_default());

    // Example 2: a node receives its partition and shares it with 3 threads
    println!("Example 2: Work stealing inside a node");
    let shipped = pool
        .get(&BigUint::from(2u32))
        .context("pool has fewer than 3 partitions")?
        .serialize()?;
    let received = KeyPattern::deserialize(&shipped)?;
    for part in split_for_workers(received, 3) {
        println!(
            "  thread part {:<22} first key {}",
            part.wildcard_key(),
            part.current_key()
        );
    }
    println!();

    // Example 3: brute force for a known key
    println!("Example 3: Parallel search");
    let target = "PIN-5C-q";
    let queue = PartitionQueue::new(KeyPatternPool::new(&pattern, 512u32));
    let config = SearchConfig {
        threads: 4,
        stop_on_first: true,
    };
    let report = search(&queue, &config, |key| key == target)?;
    println!(
        "  found {:?} after testing {} keys",
        report.matches, report.keys_tested
    );

    Ok(())
}
