//! Simulation core
//!
//! All gameplay logic lives here. Nothing in this module touches rendering,
//! audio, input devices or storage:
//! - Fixed timestep driven by [`Simulation`]
//! - Seeded RNG only
//! - Side effects reported as [`GameEvent`]s in each [`Snapshot`]

pub mod ai;
pub mod collision;
pub mod damage;
pub mod quadtree;
pub mod spawn;
pub mod state;
pub mod stats;
pub mod tick;

pub use collision::{CollisionSummary, resolve_collisions};
pub use damage::{
    DamagePacket, DamageReport, DamageType, Defense, DefenseLayer, apply_damage, resolve_layers,
};
pub use quadtree::{Boundary, QuadPoint, QuadTree, build_index};
pub use spawn::{SpawnDirector, SpawnRequest};
pub use state::{
    Ability, Actor, ActorKind, ActorView, BudgetState, EntityId, Faction, GameEvent, GamePhase,
    GameState, Pickup, PickupView, PlayerState, PlayerView, Projectile, ProjectileView, Snapshot,
};
pub use stats::{
    KeystoneDef, Loadout, Modifier, ModifierKind, PassiveDef, StatKind, Stats,
    compute_runtime_stats, efficiency_sum,
};
pub use tick::{AbilitySet, Simulation, TickInput, tick};
