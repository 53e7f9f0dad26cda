//! Game state and core simulation types
//!
//! Everything a tick mutates lives in [`GameState`]. Consumers never see it
//! directly; they read the owned [`Snapshot`] produced after each tick.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::damage::{DamagePacket, DamageType, Defense, DefenseLayer};
use super::spawn::{SpawnDirector, SpawnRequest};
use super::stats::{Loadout, Modifier, StatKind, Stats, compute_runtime_stats};
use crate::settings::Settings;
use crate::tuning::{ArchetypeDef, Behavior, Multipliers, Tier, Tuning, WeaponDef};
use crate::{clamp_to_arena, heading_to_dir};

pub type EntityId = u32;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// Player hull reached zero
    GameOver,
}

/// Which side fired a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Enemy,
}

/// What an actor is
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActorKind {
    Player,
    Enemy {
        /// Index into `Tuning::archetypes`
        archetype: usize,
        tier: Tier,
        behavior: Behavior,
        contact_damage: f32,
        xp: u32,
    },
}

/// A ship: the player or an enemy
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: EntityId,
    pub kind: ActorKind,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Facing angle (radians)
    pub heading: f32,
    pub radius: f32,
    pub base_stats: Stats,
    /// Actor-owned modifiers (enemy buffs)
    pub modifiers: Vec<Modifier>,
    /// Cached aggregate, valid while `stats_dirty` is false
    pub runtime_stats: Stats,
    stats_dirty: bool,
    pub defense: Defense,
    /// Sim time of the last hit that landed
    pub last_damage_time: f32,
    pub alive: bool,
    /// Ignores damage entirely
    pub god_mode: bool,
    /// Seconds of invulnerability left
    pub invuln_timer: f32,
    /// EM marks waiting to be consumed by a kinetic hit
    pub ion_marks: u32,
    /// Seconds until the next shot or volley
    pub fire_timer: f32,
    /// Behavior-specific phase (orbit angle)
    pub ai_phase: f32,
}

impl Actor {
    pub fn new(id: EntityId, kind: ActorKind, pos: Vec2, radius: f32, base_stats: Stats) -> Self {
        let runtime_stats = compute_runtime_stats(&base_stats, None, &[]);
        Self {
            id,
            kind,
            pos,
            vel: Vec2::ZERO,
            heading: 0.0,
            radius,
            base_stats,
            modifiers: Vec::new(),
            runtime_stats,
            stats_dirty: false,
            defense: Defense::full(&runtime_stats),
            last_damage_time: f32::NEG_INFINITY,
            alive: true,
            god_mode: false,
            invuln_timer: 0.0,
            ion_marks: 0,
            fire_timer: 0.0,
            ai_phase: 0.0,
        }
    }

    /// Spawn an enemy from its archetype, scaled by the current difficulty
    pub fn from_archetype(
        id: EntityId,
        index: usize,
        def: &ArchetypeDef,
        pos: Vec2,
        scale: Multipliers,
    ) -> Self {
        let mut base = def.stats;
        for layer in [StatKind::MaxShield, StatKind::MaxArmor, StatKind::MaxHull] {
            base[layer] *= scale.health;
        }
        base[StatKind::Speed] *= scale.speed;

        let kind = ActorKind::Enemy {
            archetype: index,
            tier: def.tier,
            behavior: def.behavior,
            contact_damage: def.contact_damage,
            xp: def.xp,
        };
        let mut actor = Actor::new(id, kind, pos, def.radius, base);
        actor.modifiers = def.modifiers.clone();
        actor.mark_stats_dirty();
        actor.refresh_stats(None);
        // Start at full strength after buffs are folded in
        actor.defense = Defense::full(&actor.runtime_stats);
        actor
    }

    pub fn is_boss(&self) -> bool {
        matches!(self.kind, ActorKind::Enemy { tier: Tier::Boss, .. })
    }

    pub fn is_invulnerable(&self) -> bool {
        self.god_mode || self.invuln_timer > 0.0
    }

    pub fn stats_dirty(&self) -> bool {
        self.stats_dirty
    }

    /// Flag runtime stats for recomputation on the next refresh
    pub fn mark_stats_dirty(&mut self) {
        self.stats_dirty = true;
    }

    /// Recompute runtime stats if dirty, then clamp defense to the new maxima.
    /// Returns true if a recompute happened.
    pub fn refresh_stats(&mut self, loadout: Option<&Loadout>) -> bool {
        if !self.stats_dirty {
            return false;
        }
        self.runtime_stats = compute_runtime_stats(&self.base_stats, loadout, &self.modifiers);
        self.defense.clamp_to(&self.runtime_stats);
        self.stats_dirty = false;
        true
    }

    /// Maximum of each defense layer
    pub fn max_defense(&self) -> Defense {
        Defense::full(&self.runtime_stats)
    }

    pub fn forward(&self) -> Vec2 {
        heading_to_dir(self.heading)
    }

    /// Integrate velocity and keep inside the arena
    pub fn integrate(&mut self, dt: f32, half_extents: Vec2) {
        self.pos = clamp_to_arena(self.pos + self.vel * dt, self.radius, half_extents);
    }

    /// Circle-circle overlap
    pub fn overlaps(&self, pos: Vec2, radius: f32) -> bool {
        let r = self.radius + radius;
        self.pos.distance_squared(pos) < r * r
    }
}

/// A projectile in flight
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub owner: EntityId,
    pub faction: Faction,
    pub packet: DamagePacket,
    pub radius: f32,
    pub traveled: f32,
    pub max_range: f32,
    pub alive: bool,
}

impl Projectile {
    pub fn advance(&mut self, dt: f32) {
        let step = self.vel * dt;
        self.pos += step;
        self.traveled += step.length();
    }

    pub fn out_of_range(&self) -> bool {
        self.traveled >= self.max_range
    }
}

/// An XP orb
#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: EntityId,
    pub pos: Vec2,
    pub radius: f32,
    pub xp: u32,
    pub alive: bool,
}

/// Player-triggered abilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ability {
    Dash,
    Overdrive,
    CycleWeapon,
}

/// Player ship plus everything only the player carries
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub actor: Actor,
    pub loadout: Loadout,
    pub weapon: WeaponDef,
    pub heat: f32,
    pub overheated: bool,
    /// Seconds until the weapon may fire again
    pub fire_cooldown: f32,
    pub dash_cooldown: f32,
    pub overdrive_cooldown: f32,
    pub overdrive_timer: f32,
    pub xp: u32,
    pub level: u32,
    /// Level-ups not yet spent on an upgrade
    pub pending_upgrades: u32,
}

/// Tagged occurrences since the last snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    EnemySpawned {
        id: EntityId,
        archetype: String,
        boss: bool,
    },
    EnemyKilled {
        id: EntityId,
        archetype: String,
        pos: Vec2,
        xp: u32,
    },
    /// Kamikaze reached the player and self-destructed
    EnemyDetonated { id: EntityId, pos: Vec2 },
    EnemyHit {
        id: EntityId,
        amount: f32,
        layer: DefenseLayer,
        crit: bool,
    },
    PlayerHit {
        amount: f32,
        layer: DefenseLayer,
        damage_type: DamageType,
    },
    ShieldBroken { id: EntityId },
    ProjectileMissed { id: EntityId },
    PickupCollected { id: EntityId, xp: u32 },
    Overload {
        pos: Vec2,
        radius: f32,
        targets: u32,
    },
    LevelUp { level: u32 },
    WaveAdvanced { wave: u32 },
    BossSpawned { id: EntityId, wave: u32 },
    AbilityUsed { ability: Ability },
    WeaponChanged { weapon: String },
    Overheated,
    PlayerDestroyed,
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct GameState {
    pub settings: Settings,
    pub tuning: Tuning,
    pub rng: Pcg32,
    /// Simulation time (seconds)
    pub time: f32,
    pub time_ticks: u64,
    pub phase: GamePhase,
    pub score: u64,
    pub player: PlayerState,
    /// Live enemies (dead ones are pruned at the end of each tick)
    pub enemies: Vec<Actor>,
    pub projectiles: Vec<Projectile>,
    pub pickups: Vec<Pickup>,
    pub director: SpawnDirector,
    /// Events since the last snapshot
    pub events: Vec<GameEvent>,
    next_id: EntityId,
}

impl GameState {
    /// Create a new run. Falls back to the first weapon if the starting one is missing.
    pub fn new(settings: Settings, tuning: Tuning) -> Self {
        let rng = Pcg32::seed_from_u64(settings.seed);
        let weapon = tuning
            .weapon(&tuning.player.starting_weapon)
            .or_else(|| tuning.weapons.first())
            .cloned()
            .unwrap_or_else(|| {
                log::warn!("no weapons defined, player starts unarmed");
                unarmed()
            });

        let mut actor = Actor::new(
            1,
            ActorKind::Player,
            Vec2::ZERO,
            tuning.player.radius,
            tuning.player.stats,
        );
        actor.god_mode = settings.god_mode;
        actor.heading = std::f32::consts::FRAC_PI_2;

        let player = PlayerState {
            actor,
            loadout: Loadout::new(),
            weapon,
            heat: 0.0,
            overheated: false,
            fire_cooldown: 0.0,
            dash_cooldown: 0.0,
            overdrive_cooldown: 0.0,
            overdrive_timer: 0.0,
            xp: 0,
            level: 1,
            pending_upgrades: 0,
        };

        Self {
            settings,
            tuning,
            rng,
            time: 0.0,
            time_ticks: 0,
            phase: GamePhase::Playing,
            score: 0,
            player,
            enemies: Vec::new(),
            projectiles: Vec::new(),
            pickups: Vec::new(),
            director: SpawnDirector::new(),
            events: Vec::new(),
            next_id: 2,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Live enemy count
    pub fn population(&self) -> usize {
        self.enemies.iter().filter(|e| e.alive).count()
    }

    /// Random point on the arena edge, away from the player
    fn spawn_point(&mut self, radius: f32) -> Vec2 {
        let half = self.settings.arena_half_extents();
        let inset = half - Vec2::splat(radius + 1.0);
        let mut best = Vec2::ZERO;
        for _ in 0..4 {
            let along = self.rng.random_range(-1.0f32..1.0);
            let candidate = match self.rng.random_range(0..4u32) {
                0 => Vec2::new(along * inset.x, inset.y),
                1 => Vec2::new(along * inset.x, -inset.y),
                2 => Vec2::new(inset.x, along * inset.y),
                _ => Vec2::new(-inset.x, along * inset.y),
            };
            best = candidate;
            // Keep spawns out of the player's face
            if candidate.distance(self.player.actor.pos) > 300.0 {
                break;
            }
        }
        best
    }

    /// Instantiate a spawn request. Returns the new enemy's id.
    pub fn spawn_enemy(&mut self, request: &SpawnRequest) -> Option<EntityId> {
        let Some(def) = self.tuning.archetypes.get(request.archetype).cloned() else {
            log::warn!("spawn request for unknown archetype #{}", request.archetype);
            return None;
        };
        let id = self.next_entity_id();
        let pos = self.spawn_point(def.radius);
        let mut enemy = Actor::from_archetype(id, request.archetype, &def, pos, request.scale);
        let to_player = self.player.actor.pos - pos;
        enemy.heading = to_player.y.atan2(to_player.x);
        enemy.ai_phase = self.rng.random_range(0.0..std::f32::consts::TAU);
        if let Behavior::Shooter { fire_interval, .. } = def.behavior {
            enemy.fire_timer = fire_interval;
        }
        if let Behavior::Boss {
            volley_interval, ..
        } = def.behavior
        {
            enemy.fire_timer = volley_interval;
        }
        self.enemies.push(enemy);

        log::debug!("spawned {} #{} at ({:.0}, {:.0})", def.id, id, pos.x, pos.y);
        self.events.push(GameEvent::EnemySpawned {
            id,
            archetype: def.id.clone(),
            boss: request.forced_boss,
        });
        if request.forced_boss {
            log::info!("boss {} spawned on wave {}", def.id, self.director.wave);
            self.events.push(GameEvent::BossSpawned {
                id,
                wave: self.director.wave,
            });
        }
        Some(id)
    }

    /// Take one stack of a passive. Returns the new stack count, or None if unknown.
    pub fn apply_passive(&mut self, id: &str) -> Option<u32> {
        let Some(def) = self.tuning.passive(id) else {
            log::warn!("unknown passive `{}`", id);
            return None;
        };
        let stacks = self.player.loadout.add_passive(def);
        self.player.actor.mark_stats_dirty();
        self.player.pending_upgrades = self.player.pending_upgrades.saturating_sub(1);
        Some(stacks)
    }

    /// Take a keystone. Returns false if unknown or already owned.
    pub fn apply_keystone(&mut self, id: &str) -> bool {
        let Some(def) = self.tuning.keystone(id) else {
            log::warn!("unknown keystone `{}`", id);
            return false;
        };
        if !self.player.loadout.add_keystone(def) {
            return false;
        }
        self.player.actor.mark_stats_dirty();
        self.player.pending_upgrades = self.player.pending_upgrades.saturating_sub(1);
        true
    }

    /// Drop every passive and keystone
    pub fn reset_loadout(&mut self) {
        self.player.loadout.clear();
        self.player.actor.mark_stats_dirty();
    }

    /// Switch to a weapon from the table
    pub fn equip_weapon(&mut self, id: &str) -> bool {
        let Some(weapon) = self.tuning.weapon(id).cloned() else {
            log::warn!("unknown weapon `{}`", id);
            return false;
        };
        self.events.push(GameEvent::WeaponChanged {
            weapon: weapon.id.clone(),
        });
        self.player.weapon = weapon;
        true
    }

    /// Add XP and process any level-ups
    pub fn grant_xp(&mut self, amount: u32) {
        let player = &mut self.player;
        player.xp += amount;
        loop {
            let needed = self.tuning.xp.xp_to_next(player.level);
            if player.xp < needed {
                break;
            }
            player.xp -= needed;
            player.level += 1;
            player.pending_upgrades += 1;
            log::info!("level up: {}", player.level);
            self.events.push(GameEvent::LevelUp {
                level: player.level,
            });
        }
    }

    /// Recompute stats for every actor flagged dirty
    pub fn refresh_dirty_stats(&mut self) {
        let player = &mut self.player;
        player.actor.refresh_stats(Some(&player.loadout));
        for enemy in self.enemies.iter_mut() {
            enemy.refresh_stats(None);
        }
    }

    /// Archetype id for an actor
    pub fn archetype_name(&self, actor: &Actor) -> String {
        match actor.kind {
            ActorKind::Player => "player".to_string(),
            ActorKind::Enemy { archetype, .. } => self
                .tuning
                .archetypes
                .get(archetype)
                .map(|a| a.id.clone())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    /// Take a read-only snapshot and drain pending events
    pub fn snapshot(&mut self) -> Snapshot {
        let events = std::mem::take(&mut self.events);
        let player = &self.player;
        let budget = self.director.budget_state(
            &self.tuning,
            &self.settings,
            self.population(),
        );

        Snapshot {
            time: self.time,
            phase: self.phase,
            score: self.score,
            player: PlayerView {
                ship: ActorView::of(&player.actor, "player".to_string()),
                weapon: player.weapon.id.clone(),
                heat: player.heat,
                heat_cap: player.actor.runtime_stats[StatKind::HeatCap],
                overheated: player.overheated,
                xp: player.xp,
                xp_to_next: self.tuning.xp.xp_to_next(player.level),
                level: player.level,
                pending_upgrades: player.pending_upgrades,
                dash_cooldown: player.dash_cooldown,
                overdrive_cooldown: player.overdrive_cooldown,
            },
            enemies: self
                .enemies
                .iter()
                .filter(|e| e.alive)
                .map(|e| ActorView::of(e, self.archetype_name(e)))
                .collect(),
            projectiles: self
                .projectiles
                .iter()
                .filter(|p| p.alive)
                .map(|p| ProjectileView {
                    id: p.id,
                    pos: p.pos,
                    vel: p.vel,
                    radius: p.radius,
                    faction: p.faction,
                    damage_type: p.packet.damage_type,
                })
                .collect(),
            pickups: self
                .pickups
                .iter()
                .filter(|p| p.alive)
                .map(|p| PickupView {
                    id: p.id,
                    pos: p.pos,
                    xp: p.xp,
                })
                .collect(),
            budget,
            events,
        }
    }
}

fn unarmed() -> WeaponDef {
    WeaponDef {
        id: "none".to_string(),
        damage: 0.0,
        damage_type: DamageType::Kinetic,
        fire_rate: 0.0,
        heat_per_shot: 0.0,
        range: 0.0,
        projectile_speed: 0.0,
        projectile_radius: 0.0,
        penetration: 0.0,
    }
}

/// Renderable view of an actor
#[derive(Debug, Clone, Serialize)]
pub struct ActorView {
    pub id: EntityId,
    pub archetype: String,
    pub pos: Vec2,
    pub vel: Vec2,
    pub heading: f32,
    pub radius: f32,
    pub defense: Defense,
    pub max_defense: Defense,
    pub boss: bool,
    pub ion_marks: u32,
    pub invulnerable: bool,
}

impl ActorView {
    fn of(actor: &Actor, archetype: String) -> Self {
        Self {
            id: actor.id,
            archetype,
            pos: actor.pos,
            vel: actor.vel,
            heading: actor.heading,
            radius: actor.radius,
            defense: actor.defense,
            max_defense: actor.max_defense(),
            boss: actor.is_boss(),
            ion_marks: actor.ion_marks,
            invulnerable: actor.is_invulnerable(),
        }
    }
}

/// Player HUD data
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub ship: ActorView,
    pub weapon: String,
    pub heat: f32,
    pub heat_cap: f32,
    pub overheated: bool,
    pub xp: u32,
    pub xp_to_next: u32,
    pub level: u32,
    pub pending_upgrades: u32,
    pub dash_cooldown: f32,
    pub overdrive_cooldown: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileView {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub faction: Faction,
    pub damage_type: DamageType,
}

#[derive(Debug, Clone, Serialize)]
pub struct PickupView {
    pub id: EntityId,
    pub pos: Vec2,
    pub xp: u32,
}

/// Spawn director status for HUD/debug consumers
#[derive(Debug, Clone, Serialize)]
pub struct BudgetState {
    pub wave: u32,
    pub budget: f32,
    pub kills_this_wave: u32,
    pub kill_quota: u32,
    pub population: usize,
    pub population_cap: usize,
    pub multipliers: Multipliers,
}

/// Immutable view of the simulation after a tick
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub time: f32,
    pub phase: GamePhase,
    pub score: u64,
    pub player: PlayerView,
    pub enemies: Vec<ActorView>,
    pub projectiles: Vec<ProjectileView>,
    pub pickups: Vec<PickupView>,
    pub budget: BudgetState,
    pub events: Vec<GameEvent>,
}

impl Snapshot {
    pub fn wave(&self) -> u32 {
        self.budget.wave
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::stats::PassiveDef;
    use proptest::prelude::*;

    fn state() -> GameState {
        GameState::new(Settings::default(), Tuning::default())
    }

    #[test]
    fn test_new_state_has_full_player() {
        let state = state();
        let player = &state.player.actor;
        assert_eq!(player.defense, player.max_defense());
        assert_eq!(state.player.weapon.id, "pulse_laser");
        assert_eq!(state.phase, GamePhase::Playing);
    }

    #[test]
    fn test_stats_only_recompute_when_dirty() {
        let mut state = state();
        let def = PassiveDef {
            id: "hull".to_string(),
            max_stacks: 3,
            modifiers: vec![Modifier::add(StatKind::MaxHull, 50.0)],
        };
        state.player.loadout.add_passive(&def);

        // Not flagged: cache stays stale on purpose
        state.refresh_dirty_stats();
        assert_eq!(state.player.actor.runtime_stats[StatKind::MaxHull], 100.0);

        state.player.actor.mark_stats_dirty();
        state.refresh_dirty_stats();
        assert_eq!(state.player.actor.runtime_stats[StatKind::MaxHull], 150.0);
        assert!(!state.player.actor.stats_dirty());
    }

    #[test]
    fn test_recompute_clamps_defense() {
        let mut state = state();
        assert!(state.apply_keystone("glass_cannon"));
        state.refresh_dirty_stats();
        let actor = &state.player.actor;
        assert!((actor.runtime_stats[StatKind::MaxHull] - 60.0).abs() < 1e-4);
        assert!(actor.defense.hull <= actor.runtime_stats[StatKind::MaxHull]);
    }

    #[test]
    fn test_unknown_upgrades_are_ignored() {
        let mut state = state();
        assert_eq!(state.apply_passive("nope"), None);
        assert!(!state.apply_keystone("nope"));
        assert!(!state.player.actor.stats_dirty());
    }

    #[test]
    fn test_grant_xp_levels_up() {
        let mut state = state();
        state.grant_xp(5 + 6 + 1);
        assert_eq!(state.player.level, 3);
        assert_eq!(state.player.pending_upgrades, 2);
        assert_eq!(state.player.xp, 1);
        let level_ups = state
            .events
            .iter()
            .filter(|e| matches!(e, GameEvent::LevelUp { .. }))
            .count();
        assert_eq!(level_ups, 2);
    }

    #[test]
    fn test_spawned_enemy_is_scaled() {
        let mut state = state();
        let index = state.tuning.archetype_index("drone").expect("drone exists");
        let request = SpawnRequest {
            archetype: index,
            scale: Multipliers {
                count: 1.0,
                health: 2.0,
                speed: 1.5,
            },
            forced_boss: false,
        };
        let id = state.spawn_enemy(&request).expect("spawned");
        let enemy = state.enemies.iter().find(|e| e.id == id).expect("present");
        assert_eq!(enemy.runtime_stats[StatKind::MaxHull], 40.0);
        assert_eq!(enemy.runtime_stats[StatKind::Speed], 165.0);
        assert_eq!(enemy.defense.hull, 40.0);
    }

    #[test]
    fn test_snapshot_drains_events() {
        let mut state = state();
        state.events.push(GameEvent::Overheated);
        let snap = state.snapshot();
        assert_eq!(snap.events.len(), 1);
        assert!(state.events.is_empty());
        assert_eq!(snap.wave(), 1);
    }

    proptest! {
        #[test]
        fn prop_defense_within_runtime_max_after_recompute(
            passives in prop::collection::vec(0usize..64, 0..16),
            keystones in prop::collection::vec(0usize..64, 0..4),
            start_full in any::<bool>(),
            reset_midway in any::<bool>(),
        ) {
            let mut state = state();
            let passive_ids: Vec<String> =
                state.tuning.passives.iter().map(|p| p.id.clone()).collect();
            let keystone_ids: Vec<String> =
                state.tuning.keystones.iter().map(|k| k.id.clone()).collect();

            for (n, pick) in passives.iter().enumerate() {
                if !passive_ids.is_empty() {
                    state.apply_passive(&passive_ids[pick % passive_ids.len()]);
                }
                if reset_midway && n == passives.len() / 2 {
                    state.refresh_dirty_stats();
                    state.player.actor.defense = state.player.actor.max_defense();
                    state.reset_loadout();
                }
            }
            if start_full {
                state.refresh_dirty_stats();
                state.player.actor.defense = state.player.actor.max_defense();
            }
            for pick in &keystones {
                if !keystone_ids.is_empty() {
                    state.apply_keystone(&keystone_ids[pick % keystone_ids.len()]);
                }
            }
            state.refresh_dirty_stats();

            let actor = &state.player.actor;
            let max = actor.max_defense();
            prop_assert!(!actor.stats_dirty());
            prop_assert!(actor.defense.shield >= 0.0 && actor.defense.shield <= max.shield);
            prop_assert!(actor.defense.armor >= 0.0 && actor.defense.armor <= max.armor);
            prop_assert!(actor.defense.hull >= 0.0 && actor.defense.hull <= max.hull);
        }
    }
}
