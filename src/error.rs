//! Configuration-time error types.
//!
//! The simulation tick itself never fails: degenerate numeric states are
//! recovered in place. These errors only surface while loading settings or
//! content tables, before a run starts.

use std::path::PathBuf;

use thiserror::Error;

/// Problems found while parsing or validating content tables
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse content tables: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("content table `{table}` is empty")]
    EmptyTable { table: &'static str },
    #[error("duplicate {table} id `{id}`")]
    DuplicateId { table: &'static str, id: String },
    #[error("spawn bracket {bracket} references unknown archetype `{archetype}`")]
    UnknownArchetype { bracket: usize, archetype: String },
    #[error("spawn bracket {bracket} has an empty archetype pool")]
    EmptyPool { bracket: usize },
    #[error("archetype `{archetype}` has non-positive spawn cost {cost}")]
    InvalidSpawnCost { archetype: String, cost: f32 },
    #[error("passive `{passive}` must allow at least one stack")]
    ZeroMaxStacks { passive: String },
    #[error("no boss-tier archetype defined")]
    MissingBoss,
    #[error("starting weapon `{weapon}` is not in the weapon table")]
    UnknownWeapon { weapon: String },
}

/// Problems loading simulation settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("setting `{name}` = {value} is outside its valid range {range}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        range: &'static str,
    },
}
