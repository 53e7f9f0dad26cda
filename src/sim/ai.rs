//! Enemy behavior step
//!
//! One exhaustive match over [`Behavior`] drives every enemy. Shots fired this
//! step are collected first and pushed once the enemy borrow is released.

use std::f32::consts::{PI, TAU};

use glam::Vec2;

use super::damage::DamagePacket;
use super::state::{Actor, ActorKind, EntityId, Faction, GameState, Projectile};
use super::stats::StatKind;
use crate::tuning::Behavior;
use crate::{heading_to_dir, safe_normalize};

/// Enemy shots live until they leave the arena or travel this far
const ENEMY_SHOT_RANGE: f32 = 1600.0;
const ENEMY_SHOT_RADIUS: f32 = 5.0;
/// Shooters hold inside this band around their preferred range
const RANGE_SLACK: f32 = 0.15;
/// Boss volleys rotate by this much so gaps move
const VOLLEY_ROTATION: f32 = 0.3;

struct PendingShot {
    owner: EntityId,
    pos: Vec2,
    vel: Vec2,
    packet: DamagePacket,
}

/// Rotate `current` toward `desired` by at most `max_step` radians
fn turn_toward(current: f32, desired: f32, max_step: f32) -> f32 {
    let delta = (desired - current + PI).rem_euclid(TAU) - PI;
    current + delta.clamp(-max_step, max_step)
}

fn angle_of(v: Vec2) -> Option<f32> {
    (v.length_squared() > 0.0).then(|| v.y.atan2(v.x))
}

/// Advance every live enemy by one step
pub fn step_enemies(state: &mut GameState, dt: f32) {
    let target = state.player.actor.pos;
    let half = state.settings.arena_half_extents();
    let mut shots = Vec::new();

    for enemy in state.enemies.iter_mut().filter(|e| e.alive) {
        let ActorKind::Enemy { behavior, .. } = enemy.kind else {
            continue;
        };
        steer(enemy, behavior, target, dt, &mut shots);
        enemy.integrate(dt, half);
    }

    for shot in shots {
        let id = state.next_entity_id();
        state.projectiles.push(Projectile {
            id,
            pos: shot.pos,
            vel: shot.vel,
            owner: shot.owner,
            faction: Faction::Enemy,
            packet: shot.packet,
            radius: ENEMY_SHOT_RADIUS,
            traveled: 0.0,
            max_range: ENEMY_SHOT_RANGE,
            alive: true,
        });
    }
}

fn steer(enemy: &mut Actor, behavior: Behavior, target: Vec2, dt: f32, shots: &mut Vec<PendingShot>) {
    let speed = enemy.runtime_stats[StatKind::Speed];
    let to_target = target - enemy.pos;
    let distance = to_target.length();
    let dir = safe_normalize(to_target);

    match behavior {
        Behavior::Chaser { turn_rate } => {
            if let Some(desired) = angle_of(to_target) {
                enemy.heading = turn_toward(enemy.heading, desired, turn_rate * dt);
            }
            enemy.vel = enemy.forward() * speed;
        }
        Behavior::Kamikaze {
            sprint_radius,
            sprint_mult,
            ..
        } => {
            let boost = if distance < sprint_radius { sprint_mult } else { 1.0 };
            enemy.vel = dir * speed * boost;
            if let Some(heading) = angle_of(to_target) {
                enemy.heading = heading;
            }
        }
        Behavior::Shooter {
            preferred_range,
            fire_interval,
            projectile_speed,
            damage,
            damage_type,
        } => {
            enemy.vel = if distance > preferred_range * (1.0 + RANGE_SLACK) {
                dir * speed
            } else if distance < preferred_range * (1.0 - RANGE_SLACK) {
                -dir * speed
            } else {
                // Strafe while in the band
                dir.perp() * speed * 0.5
            };
            if let Some(heading) = angle_of(to_target) {
                enemy.heading = heading;
            }

            enemy.fire_timer -= dt;
            if enemy.fire_timer <= 0.0 && distance <= preferred_range * 2.0 && dir != Vec2::ZERO {
                enemy.fire_timer = fire_interval;
                shots.push(PendingShot {
                    owner: enemy.id,
                    pos: enemy.pos + dir * (enemy.radius + ENEMY_SHOT_RADIUS),
                    vel: dir * projectile_speed,
                    packet: DamagePacket::new(damage, damage_type),
                });
            }
        }
        Behavior::Orbiter {
            orbit_radius,
            angular_speed,
        } => {
            enemy.ai_phase = (enemy.ai_phase + angular_speed * dt).rem_euclid(TAU);
            let slot = target + heading_to_dir(enemy.ai_phase) * orbit_radius;
            let to_slot = slot - enemy.pos;
            let step = to_slot.length();
            // Never overshoot the slot within one step
            let max_speed = if dt > 0.0 { speed.min(step / dt) } else { 0.0 };
            enemy.vel = safe_normalize(to_slot) * max_speed;
            if let Some(heading) = angle_of(to_target) {
                enemy.heading = heading;
            }
        }
        Behavior::Boss {
            volley_interval,
            volley_count,
            projectile_speed,
            damage,
            damage_type,
        } => {
            enemy.vel = dir * speed;
            if let Some(heading) = angle_of(to_target) {
                enemy.heading = heading;
            }

            enemy.fire_timer -= dt;
            if enemy.fire_timer <= 0.0 && volley_count > 0 {
                enemy.fire_timer = volley_interval;
                let spacing = TAU / volley_count as f32;
                for k in 0..volley_count {
                    let d = heading_to_dir(enemy.ai_phase + spacing * k as f32);
                    shots.push(PendingShot {
                        owner: enemy.id,
                        pos: enemy.pos + d * (enemy.radius + ENEMY_SHOT_RADIUS),
                        vel: d * projectile_speed,
                        packet: DamagePacket::new(damage, damage_type),
                    });
                }
                enemy.ai_phase = (enemy.ai_phase + VOLLEY_ROTATION).rem_euclid(TAU);
            }
        }
    }
}
