//! Simulation settings
//!
//! Run-level knobs that are not content: caps, intervals, arena size, seed.
//! Loaded from JSON; missing fields fall back to defaults.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SettingsError;

/// Simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// RNG seed for the run
    pub seed: u64,

    // === Arena ===
    /// Arena half width
    pub arena_half_width: f32,
    /// Arena half height
    pub arena_half_height: f32,

    // === Spawning ===
    /// Hard population cap; no spawn ever exceeds it
    pub population_cap: usize,
    /// Force one boss every N waves
    pub boss_interval: u32,
    /// Seconds between spawn attempts
    pub spawn_interval: f32,

    // === Loop ===
    /// Largest frame delta accepted (seconds)
    pub max_frame_dt: f32,

    // === Spatial index ===
    /// Points per quadtree node before it subdivides
    pub quadtree_capacity: usize,

    // === Debug ===
    /// Player ignores all damage
    pub god_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0x5eed_f411,

            arena_half_width: ARENA_HALF_WIDTH,
            arena_half_height: ARENA_HALF_HEIGHT,

            population_cap: 120,
            boss_interval: 5,
            spawn_interval: 1.5,

            max_frame_dt: MAX_FRAME_DT,

            quadtree_capacity: 8,

            god_mode: false,
        }
    }
}

impl Settings {
    /// Parse settings from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject values that would stall or break the simulation
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.arena_half_width <= 0.0 || self.arena_half_height <= 0.0 {
            return Err(SettingsError::OutOfRange {
                name: "arena_half_extents",
                value: self.arena_half_width.min(self.arena_half_height),
                range: "(0, inf)",
            });
        }
        if self.spawn_interval <= 0.0 {
            return Err(SettingsError::OutOfRange {
                name: "spawn_interval",
                value: self.spawn_interval,
                range: "(0, inf)",
            });
        }
        if self.max_frame_dt <= 0.0 || self.max_frame_dt > 1.0 {
            return Err(SettingsError::OutOfRange {
                name: "max_frame_dt",
                value: self.max_frame_dt,
                range: "(0, 1]",
            });
        }
        if self.boss_interval == 0 {
            return Err(SettingsError::OutOfRange {
                name: "boss_interval",
                value: 0.0,
                range: "[1, inf)",
            });
        }
        if self.quadtree_capacity == 0 {
            return Err(SettingsError::OutOfRange {
                name: "quadtree_capacity",
                value: 0.0,
                range: "[1, inf)",
            });
        }
        Ok(())
    }

    /// Arena half extents as a vector
    pub fn arena_half_extents(&self) -> Vec2 {
        Vec2::new(self.arena_half_width, self.arena_half_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{ "population_cap": 40, "god_mode": true }"#)
            .expect("valid settings");
        assert_eq!(settings.population_cap, 40);
        assert!(settings.god_mode);
        assert_eq!(settings.boss_interval, 5);
    }

    #[test]
    fn test_rejects_zero_boss_interval() {
        let err = Settings::from_json(r#"{ "boss_interval": 0 }"#).unwrap_err();
        assert!(matches!(err, SettingsError::OutOfRange { name: "boss_interval", .. }));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let settings = Settings::load(Path::new("/definitely/not/here.json")).expect("defaults");
        assert_eq!(settings.population_cap, Settings::default().population_cap);
    }
}
