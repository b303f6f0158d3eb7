//! Key pattern CLI
//!
//! Command-line front end for sizing, enumerating, splitting and partitioning
//! key spaces.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use keyspace_pool::{
    search, split_for_workers, KeyMovement, KeyPattern, KeyPatternPool, PartitionQueue,
    SearchConfig,
};
use num_bigint::BigUint;
use serde::Serialize;

/// Key-space pattern workbench
#[derive(Parser, Debug)]
#[command(name = "keypattern")]
#[command(about = "Enumerate, split and partition key-space patterns", long_about = None)]
#[command(version)]
struct Args {
    /// Wildcard key restricting the pattern (e.g. "AB*D[0-4]")
    #[arg(short, long, global = true, value_name = "WILDCARD_KEY")]
    key: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the number of keys
    Size {
        /// Key template (e.g. "AB[C-F]D[0-9]")
        pattern: String,
    },

    /// Print keys in enumeration order
    Enumerate {
        pattern: String,

        /// Keys to skip before printing
        #[arg(long, value_name = "N")]
        skip: Option<BigUint>,

        /// Maximum number of keys to print
        #[arg(long, value_name = "N")]
        limit: Option<u64>,
    },

    /// Print the key at an offset from the first key
    KeyAt { pattern: String, offset: BigUint },

    /// Bisect the pattern for local worker threads
    Split {
        pattern: String,

        /// Number of parts
        #[arg(short, long, default_value_t = 2)]
        workers: usize,
    },

    /// Partition the pattern into near-equal chunks
    Pool {
        pattern: String,

        /// Target keys per partition
        #[arg(long, value_name = "N", conflicts_with = "partitions", required_unless_present = "partitions")]
        part_size: Option<BigUint>,

        /// Target number of partitions
        #[arg(long, value_name = "N")]
        partitions: Option<BigUint>,

        /// Show a single partition
        #[arg(long, value_name = "I")]
        index: Option<BigUint>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the wire record as hex
    Serialize { pattern: String },

    /// Decode a hex wire record
    Deserialize {
        #[arg(value_name = "HEX")]
        hex: String,
    },

    /// Brute-force the pattern for a known key
    Search {
        pattern: String,

        /// Key to look for
        #[arg(long, value_name = "KEY")]
        expect: String,

        /// Worker threads (defaults to available cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct PoolSummary {
    template: String,
    wildcard_key: String,
    size: String,
    target_partition_size: String,
    split_factors: Vec<usize>,
    partitions: String,
    part_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    partition: Option<PartitionSummary>,
}

#[derive(Serialize)]
struct PartitionSummary {
    index: String,
    wildcard_key: String,
    first_key: String,
    global_index: String,
    movements: Vec<KeyMovement>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    log::debug!("keypattern v{}", env!("CARGO_PKG_VERSION"));

    let key = args.key.as_deref();
    match args.command {
        Command::Size { pattern } => {
            let pattern = load_pattern(&pattern, key)?;
            println!("{}", pattern.size());
        }
        Command::Enumerate {
            pattern,
            skip,
            limit,
        } => {
            let mut pattern = load_pattern(&pattern, key)?;
            if let Some(skip) = skip {
                if !pattern.advance(&skip) {
                    bail!("Cannot skip {} keys, pattern has only {}", skip, pattern.size());
                }
            }

            let keys = pattern.into_keys();
            match limit {
                Some(limit) => keys.take(limit as usize).for_each(|k| println!("{k}")),
                None => keys.for_each(|k| println!("{k}")),
            }
        }
        Command::KeyAt { pattern, offset } => {
            let pattern = load_pattern(&pattern, key)?;
            let size = pattern.size();
            let found = pattern
                .key_at(offset.clone())
                .with_context(|| format!("Offset {offset} outside key space of {size}"))?;
            println!("{found}");
        }
        Command::Split { pattern, workers } => {
            let pattern = load_pattern(&pattern, key)?;
            for part in split_for_workers(pattern, workers) {
                println!("{}\t{}", part.wildcard_key(), part.size());
            }
        }
        Command::Pool {
            pattern,
            part_size,
            partitions,
            index,
            json,
        } => {
            let pattern = load_pattern(&pattern, key)?;
            let mut builder = KeyPatternPool::builder().pattern(pattern);
            if let Some(size) = part_size {
                builder = builder.part_size(size);
            }
            if let Some(count) = partitions {
                builder = builder.partitions(count);
            }
            let pool = builder.build()?;
            print_pool(&pool, index, json)?;
        }
        Command::Serialize { pattern } => {
            let pattern = load_pattern(&pattern, key)?;
            let bytes = pattern.serialize()?;
            println!("{}", to_hex(&bytes));
        }
        Command::Deserialize { hex } => {
            let bytes = from_hex(&hex)?;
            let pattern = KeyPattern::deserialize(&bytes)?;
            println!("{pattern}");
            println!("size: {}", pattern.size());
        }
        Command::Search {
            pattern,
            expect,
            threads,
            json,
        } => {
            let pattern = load_pattern(&pattern, key)?;
            let mut config = SearchConfig {
                stop_on_first: true,
                ..SearchConfig::default()
            };
            if let Some(threads) = threads {
                config.threads = threads;
            }

            // A few partitions per thread keeps every worker busy
            let pool = KeyPatternPool::builder()
                .pattern(pattern)
                .partitions(config.threads.max(1) as u64 * 8)
                .build()?;
            let queue = PartitionQueue::new(pool);

            let report = search(&queue, &config, |candidate| candidate == expect)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.matches.is_empty() {
                println!("not found ({} keys tested)", report.keys_tested);
            } else {
                for found in &report.matches {
                    println!("found: {found}");
                }
            }
        }
    }

    Ok(())
}

fn load_pattern(template: &str, key: Option<&str>) -> Result<KeyPattern> {
    let pattern = match key {
        Some(key) => KeyPattern::with_wildcard_key(template, key),
        None => KeyPattern::new(template),
    };
    pattern.with_context(|| format!("Failed to load pattern '{template}'"))
}

fn print_pool(pool: &KeyPatternPool, index: Option<BigUint>, json: bool) -> Result<()> {
    let partition = match index {
        Some(index) => {
            let part = pool
                .get(&index)
                .with_context(|| format!("Partition {index} outside pool of {}", pool.len()))?;
            Some(PartitionSummary {
                index: index.to_string(),
                wildcard_key: part.wildcard_key(),
                first_key: part.current_key(),
                global_index: part.global_index().to_string(),
                movements: part.key_movements(),
            })
        }
        None => None,
    };

    let source = pool.source();
    let summary = PoolSummary {
        template: source.template().to_string(),
        wildcard_key: source.wildcard_key(),
        size: source.size().to_string(),
        target_partition_size: pool.target_partition_size().to_string(),
        split_factors: pool.split_factors().to_vec(),
        partitions: pool.len().to_string(),
        part_size: pool.part_size().to_string(),
        partition,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Pattern:        {}", summary.template);
    println!("Wildcard key:   {}", summary.wildcard_key);
    println!("Keys:           {}", summary.size);
    println!("Split factors:  {:?}", summary.split_factors);
    println!("Partitions:     {}", summary.partitions);
    println!(
        "Part size:      {} (target {})",
        summary.part_size, summary.target_partition_size
    );
    if let Some(part) = &summary.partition {
        println!("Partition {}:   {}", part.index, part.wildcard_key);
        println!("  first key:    {} (global index {})", part.first_key, part.global_index);
    }

    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(hex: &str) -> Result<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        bail!("Hex string has odd length {}", hex.len());
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            let pair = hex.get(i..i + 2).context("Hex string is not ASCII")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte '{pair}'"))
        })
        .collect()
}
