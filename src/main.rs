use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rb_map::RbMap;

#[derive(Debug)]
enum ConfigError {
    Invalid { var: &'static str, value: String },
    Zero(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { var, value } => {
                write!(f, "{} must be an unsigned integer, got {:?}", var, value)
            }
            ConfigError::Zero(var) => write!(f, "{} must be greater than zero", var),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Benchmark parameters, read from `RB_MAP_*` environment variables.
#[derive(Clone, Copy, Debug)]
struct BenchConfig {
    ops: usize,
    key_space: u64,
    seed: u64,
}

impl BenchConfig {
    const DEFAULT_OPS: u64 = 100_000;
    const DEFAULT_KEY_SPACE: u64 = 1 << 20;
    const DEFAULT_SEED: u64 = 42;

    fn from_env() -> Result<Self, ConfigError> {
        let ops = read_var("RB_MAP_OPS", Self::DEFAULT_OPS)?;
        let key_space = read_var("RB_MAP_KEY_SPACE", Self::DEFAULT_KEY_SPACE)?;
        if key_space == 0 {
            return Err(ConfigError::Zero("RB_MAP_KEY_SPACE"));
        }
        let seed = read_var("RB_MAP_SEED", Self::DEFAULT_SEED)?;
        let ops = usize::try_from(ops).map_err(|_| ConfigError::Invalid {
            var: "RB_MAP_OPS",
            value: ops.to_string(),
        })?;
        Ok(BenchConfig {
            ops,
            key_space,
            seed,
        })
    }
}

fn read_var(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Insert(u64, u64),
    Find(u64),
    Erase(u64),
}

fn generate_ops(config: &BenchConfig) -> Vec<Op> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    (0..config.ops)
        .map(|_| {
            let key = rng.gen_range(0..config.key_space);
            match rng.gen_range(0..10) {
                0..=4 => Op::Insert(key, rng.gen()),
                5..=7 => Op::Find(key),
                _ => Op::Erase(key),
            }
        })
        .collect()
}

/// Per-operation outcomes, compared between the two maps.
#[derive(Debug, Default, PartialEq, Eq)]
struct Outcome {
    inserted: usize,
    hits: usize,
    erased: usize,
    checksum: u64,
}

fn run_rb_map(ops: &[Op]) -> (Outcome, Duration, RbMap<u64, u64>) {
    let mut map = RbMap::new();
    let mut out = Outcome::default();
    let start = Instant::now();
    for op in ops {
        match *op {
            Op::Insert(k, v) => {
                if map.insert(k, v).1 {
                    out.inserted += 1;
                }
            }
            Op::Find(k) => {
                if let Some(v) = map.get(&k) {
                    out.hits += 1;
                    out.checksum = out.checksum.wrapping_add(*v);
                }
            }
            Op::Erase(k) => {
                let pos = map.find(&k);
                if !pos.is_end() && map.erase(pos).is_ok() {
                    out.erased += 1;
                }
            }
        }
    }
    (out, start.elapsed(), map)
}

fn run_std_map(ops: &[Op]) -> (Outcome, Duration, BTreeMap<u64, u64>) {
    let mut map = BTreeMap::new();
    let mut out = Outcome::default();
    let start = Instant::now();
    for op in ops {
        match *op {
            Op::Insert(k, v) => {
                if !map.contains_key(&k) {
                    map.insert(k, v);
                    out.inserted += 1;
                }
            }
            Op::Find(k) => {
                if let Some(v) = map.get(&k) {
                    out.hits += 1;
                    out.checksum = out.checksum.wrapping_add(*v);
                }
            }
            Op::Erase(k) => {
                if map.remove(&k).is_some() {
                    out.erased += 1;
                }
            }
        }
    }
    (out, start.elapsed(), map)
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match BenchConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {}", e);
            eprintln!("rb_map_main: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("benchmark config: {:?}", config);

    let ops = generate_ops(&config);
    debug!("generated {} operations", ops.len());

    let (ours, ours_time, rb) = run_rb_map(&ops);
    info!("RbMap: {:?} in {:?}", ours, ours_time);
    let (theirs, std_time, std) = run_std_map(&ops);
    info!("BTreeMap: {:?} in {:?}", theirs, std_time);

    if ours != theirs || rb.len() != std.len() || !rb.iter().eq(std.iter()) {
        error!("RbMap diverged from BTreeMap");
        eprintln!("rb_map_main: results differ from std::collections::BTreeMap");
        return ExitCode::FAILURE;
    }

    println!(
        "{} ops over {} keys (seed {}): {} live entries",
        config.ops,
        config.key_space,
        config.seed,
        rb.len()
    );
    println!("  RbMap    {:>10.3?}", ours_time);
    println!("  BTreeMap {:>10.3?}", std_time);
    ExitCode::SUCCESS
}
