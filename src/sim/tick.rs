//! Fixed timestep simulation tick
//!
//! Core game loop that advances the simulation one step at a time, plus the
//! [`Simulation`] driver that turns variable frame deltas into fixed steps.

use glam::Vec2;
use rand::Rng;

use super::ai::step_enemies;
use super::collision::resolve_collisions;
use super::damage::DamagePacket;
use super::state::{Ability, Actor, Faction, GameEvent, GamePhase, GameState, Projectile, Snapshot};
use super::stats::StatKind;
use crate::consts::*;
use crate::safe_normalize;
use crate::settings::Settings;
use crate::tuning::Tuning;

/// How quickly the player's velocity chases the requested one (per second)
const PLAYER_RESPONSE: f32 = 12.0;

/// Set of abilities triggered this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbilitySet {
    bits: u8,
}

impl AbilitySet {
    fn bit(ability: Ability) -> u8 {
        match ability {
            Ability::Dash => 1,
            Ability::Overdrive => 1 << 1,
            Ability::CycleWeapon => 1 << 2,
        }
    }

    pub fn with(mut self, ability: Ability) -> Self {
        self.insert(ability);
        self
    }

    pub fn insert(&mut self, ability: Ability) {
        self.bits |= Self::bit(ability);
    }

    pub fn contains(&self, ability: Ability) -> bool {
        self.bits & Self::bit(ability) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Union with another set
    pub fn merge(&mut self, other: AbilitySet) {
        self.bits |= other.bits;
    }
}

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Requested movement; longer than 1 is clamped
    pub move_vector: Vec2,
    /// Hold to fire the current weapon
    pub firing: bool,
    /// Abilities pressed this tick
    pub abilities: AbilitySet,
    /// Aim point in world space (falls back to movement direction)
    pub cursor_world_pos: Option<Vec2>,
    /// Pause toggle
    pub pause: bool,
}

/// Clamp a frame delta to `[0, max]`. Non-finite deltas and a bad `max`
/// never panic.
fn clamp_frame(dt: f32, max: f32) -> f32 {
    if dt.is_finite() { dt.min(max).max(0.0) } else { 0.0 }
}

/// Advance the game state by one step
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                log::debug!("paused at {:.2}s", state.time);
                return;
            }
            GamePhase::Paused => state.phase = GamePhase::Playing,
            GamePhase::GameOver => {}
        }
    }

    // Don't tick if paused or game over
    if state.phase != GamePhase::Playing {
        return;
    }

    let dt = clamp_frame(dt, state.settings.max_frame_dt);
    if dt <= 0.0 {
        return;
    }

    state.time_ticks += 1;
    state.time += dt;

    // Upgrades taken between ticks
    state.refresh_dirty_stats();

    use_abilities(state, input);
    move_player(state, input, dt);
    update_timers(state, dt);
    update_weapon(state, input.firing, dt);

    step_enemies(state, dt);
    for proj in state.projectiles.iter_mut().filter(|p| p.alive) {
        proj.advance(dt);
    }
    attract_pickups(state, dt);

    let summary = resolve_collisions(state, dt);
    if summary.kills > 0 || summary.detonations > 0 {
        log::trace!("tick {}: {:?}", state.time_ticks, summary);
    }

    if state.phase == GamePhase::Playing {
        let population = state.population();
        let requests = state.director.update(
            dt,
            population,
            &state.tuning,
            &state.settings,
            &mut state.rng,
        );
        for request in &requests {
            state.spawn_enemy(request);
        }
    }

    state.refresh_dirty_stats();
}

fn use_abilities(state: &mut GameState, input: &TickInput) {
    let abilities = input.abilities;
    if abilities.is_empty() || !state.player.actor.alive {
        return;
    }

    let player = &mut state.player;
    if abilities.contains(Ability::Dash) && player.dash_cooldown <= 0.0 {
        let mut dir = safe_normalize(input.move_vector);
        if dir == Vec2::ZERO {
            dir = player.actor.forward();
        }
        player.actor.vel = dir * DASH_IMPULSE;
        player.actor.invuln_timer = player.actor.invuln_timer.max(DASH_INVULN);
        player.dash_cooldown = DASH_COOLDOWN;
        state.events.push(GameEvent::AbilityUsed {
            ability: Ability::Dash,
        });
    }

    if abilities.contains(Ability::Overdrive) && player.overdrive_cooldown <= 0.0 {
        player.overdrive_timer = OVERDRIVE_DURATION;
        player.overdrive_cooldown = OVERDRIVE_COOLDOWN;
        // Overdrive vents the weapon
        player.heat = 0.0;
        player.overheated = false;
        state.events.push(GameEvent::AbilityUsed {
            ability: Ability::Overdrive,
        });
    }

    if abilities.contains(Ability::CycleWeapon) && state.tuning.weapons.len() > 1 {
        let weapons = &state.tuning.weapons;
        let current = weapons
            .iter()
            .position(|w| w.id == state.player.weapon.id)
            .unwrap_or(weapons.len() - 1);
        let next = weapons[(current + 1) % weapons.len()].id.clone();
        if state.equip_weapon(&next) {
            state.player.heat = 0.0;
            state.player.overheated = false;
            state.events.push(GameEvent::AbilityUsed {
                ability: Ability::CycleWeapon,
            });
        }
    }
}

fn move_player(state: &mut GameState, input: &TickInput, dt: f32) {
    let half = state.settings.arena_half_extents();
    let player = &mut state.player.actor;
    if !player.alive {
        return;
    }

    let intent = if input.move_vector.is_finite() {
        input.move_vector.clamp_length_max(1.0)
    } else {
        Vec2::ZERO
    };
    let desired = intent * player.runtime_stats[StatKind::Speed];
    let blend = (PLAYER_RESPONSE * dt).min(1.0);
    player.vel = player.vel.lerp(desired, blend);
    player.integrate(dt, half);

    let aim = input
        .cursor_world_pos
        .map(|cursor| cursor - player.pos)
        .filter(|v| v.is_finite() && v.length_squared() > 0.0)
        .or_else(|| (intent.length_squared() > 0.0).then_some(intent));
    if let Some(aim) = aim {
        player.heading = aim.y.atan2(aim.x);
    }
}

/// Tick down every decrementing timer and regenerate shields
fn update_timers(state: &mut GameState, dt: f32) {
    let time = state.time;
    let player = &mut state.player;
    player.actor.invuln_timer = (player.actor.invuln_timer - dt).max(0.0);
    player.fire_cooldown = (player.fire_cooldown - dt).max(0.0);
    player.dash_cooldown = (player.dash_cooldown - dt).max(0.0);
    player.overdrive_cooldown = (player.overdrive_cooldown - dt).max(0.0);
    player.overdrive_timer = (player.overdrive_timer - dt).max(0.0);

    regen_shield(&mut player.actor, time, dt);
    for enemy in state.enemies.iter_mut().filter(|e| e.alive) {
        enemy.invuln_timer = (enemy.invuln_timer - dt).max(0.0);
        regen_shield(enemy, time, dt);
    }
}

/// Refill the shield once the regen delay has passed since the last hit
fn regen_shield(actor: &mut Actor, time: f32, dt: f32) {
    if !actor.alive {
        return;
    }
    let stats = &actor.runtime_stats;
    let max = stats[StatKind::MaxShield];
    let rate = stats[StatKind::ShieldRegen];
    if rate <= 0.0 || actor.defense.shield >= max {
        return;
    }
    if time - actor.last_damage_time < stats[StatKind::ShieldRegenDelay] {
        return;
    }
    actor.defense.shield = (actor.defense.shield + rate * dt).min(max);
}

/// Cool the weapon and fire if allowed
fn update_weapon(state: &mut GameState, firing: bool, dt: f32) {
    let player = &mut state.player;
    let stats = player.actor.runtime_stats;

    player.heat = (player.heat - stats[StatKind::Cooling] * dt).max(0.0);
    if player.overheated && player.heat <= 0.0 {
        player.overheated = false;
        log::debug!("weapon cooled down");
    }

    if !firing || !player.actor.alive || player.overheated || player.fire_cooldown > 0.0 {
        return;
    }
    let weapon = &player.weapon;
    let mut rate = weapon.fire_rate * stats[StatKind::FireRate];
    if player.overdrive_timer > 0.0 {
        rate *= OVERDRIVE_FIRE_RATE;
    }
    if rate <= 0.0 || !rate.is_finite() {
        return;
    }
    player.fire_cooldown = 1.0 / rate;

    let is_crit = state.rng.random::<f32>() < stats[StatKind::CritChance];
    let mut amount = weapon.damage * stats[StatKind::DamageMult];
    if is_crit {
        amount *= stats[StatKind::CritMult];
    }
    let packet = DamagePacket {
        amount,
        damage_type: weapon.damage_type,
        penetration: weapon.penetration,
        is_crit,
    };

    let dir = player.actor.forward();
    let pos = player.actor.pos + dir * (player.actor.radius + weapon.projectile_radius);
    let vel = dir * weapon.projectile_speed * stats[StatKind::ProjectileSpeed];
    let max_range = weapon.range * stats[StatKind::Range];
    let radius = weapon.projectile_radius;
    let owner = player.actor.id;

    player.heat += weapon.heat_per_shot;
    let cap = stats[StatKind::HeatCap];
    let overheated = player.heat >= cap;
    if overheated {
        player.heat = cap;
        player.overheated = true;
    }

    let id = state.next_entity_id();
    state.projectiles.push(Projectile {
        id,
        pos,
        vel,
        owner,
        faction: Faction::Player,
        packet,
        radius,
        traveled: 0.0,
        max_range,
        alive: true,
    });
    if overheated {
        log::debug!("weapon overheated");
        state.events.push(GameEvent::Overheated);
    }
}

/// Pull XP orbs inside the magnet range toward the player
fn attract_pickups(state: &mut GameState, dt: f32) {
    let player = &state.player.actor;
    let range = player.runtime_stats[StatKind::MagnetRange];
    for pickup in state.pickups.iter_mut().filter(|p| p.alive) {
        let to_player = player.pos - pickup.pos;
        let distance = to_player.length();
        if distance > range || distance <= 0.0 {
            continue;
        }
        let step = (ORB_MAGNET_SPEED * dt).min(distance);
        pickup.pos += safe_normalize(to_player) * step;
    }
}

/// Fixed-step driver: owns the state and turns frame deltas into ticks
#[derive(Debug, Clone)]
pub struct Simulation {
    state: GameState,
    accumulator: f32,
    /// One-shot inputs held until a step consumes them
    pending_pause: bool,
    pending_abilities: AbilitySet,
}

impl Simulation {
    pub fn new(settings: Settings, tuning: Tuning) -> Self {
        log::info!("new run with seed {}", settings.seed);
        Self::from_state(GameState::new(settings, tuning))
    }

    pub fn from_state(state: GameState) -> Self {
        Self {
            state,
            accumulator: 0.0,
            pending_pause: false,
            pending_abilities: AbilitySet::default(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable access for collaborators applying upgrades between frames
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Run as many fixed steps as `frame_dt` covers and snapshot the result
    pub fn advance(&mut self, input: &TickInput, frame_dt: f32) -> Snapshot {
        let frame_dt = clamp_frame(frame_dt, self.state.settings.max_frame_dt);
        self.accumulator += frame_dt;
        self.pending_pause |= input.pause;
        self.pending_abilities.merge(input.abilities);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let step = TickInput {
                pause: self.pending_pause,
                abilities: self.pending_abilities,
                ..input.clone()
            };
            tick(&mut self.state, &step, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;

            // Clear one-shot inputs after processing
            self.pending_pause = false;
            self.pending_abilities = AbilitySet::default();
        }

        self.state.snapshot()
    }
}
