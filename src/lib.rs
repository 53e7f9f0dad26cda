//! Shieldfall - A wave-survival arena shooter simulation core
//!
//! Core modules:
//! - `sim`: Simulation (stats, layered damage, collisions, spawning, game state)
//! - `settings`: Runtime simulation settings
//! - `tuning`: Data-driven content tables (archetypes, weapons, modifiers)
//! - `error`: Configuration-time error types
//!
//! Rendering, audio, input capture and persistence are external collaborators.
//! They feed a [`sim::TickInput`] in and read a [`sim::Snapshot`] out.

pub mod error;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::{ContentError, SettingsError};
pub use settings::Settings;
pub use tuning::Tuning;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta accepted by the driver (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Arena half extents (arena is centered on the origin)
    pub const ARENA_HALF_WIDTH: f32 = 1200.0;
    pub const ARENA_HALF_HEIGHT: f32 = 900.0;

    /// Player ship defaults
    pub const PLAYER_RADIUS: f32 = 14.0;

    /// Hard cap applied to every resistance source
    pub const RESIST_CAP: f32 = 0.9;
    /// Marginal value retained by each additional passive stack
    pub const STACK_DECAY: f32 = 0.8;

    /// XP orb defaults
    pub const ORB_RADIUS: f32 = 6.0;
    pub const ORB_MAGNET_SPEED: f32 = 420.0;

    /// Ion marks (EM) and their consumption by kinetic hits
    pub const MAX_ION_MARKS: u32 = 5;
    pub const OVERLOAD_THRESHOLD: u32 = 3;
    pub const MARK_BONUS_PER_STACK: f32 = 0.15;
    pub const OVERLOAD_RADIUS: f32 = 90.0;
    pub const OVERLOAD_DAMAGE: f32 = 18.0;

    /// Abilities
    pub const DASH_IMPULSE: f32 = 900.0;
    pub const DASH_COOLDOWN: f32 = 3.0;
    pub const DASH_INVULN: f32 = 0.25;
    pub const OVERDRIVE_COOLDOWN: f32 = 12.0;
    pub const OVERDRIVE_DURATION: f32 = 4.0;
    pub const OVERDRIVE_FIRE_RATE: f32 = 1.6;
}

/// Normalize a vector, returning zero for degenerate (zero or non-finite) input
#[inline]
pub fn safe_normalize(v: Vec2) -> Vec2 {
    v.normalize_or_zero()
}

/// Clamp a point into the arena bounds, keeping a margin for the entity radius
#[inline]
pub fn clamp_to_arena(pos: Vec2, radius: f32, half_extents: Vec2) -> Vec2 {
    let limit = (half_extents - Vec2::splat(radius)).max(Vec2::ZERO);
    pos.clamp(-limit, limit)
}

/// Unit vector for a heading angle (radians)
#[inline]
pub fn heading_to_dir(heading: f32) -> Vec2 {
    Vec2::new(heading.cos(), heading.sin())
}
