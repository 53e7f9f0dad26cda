//! Collision resolution for projectiles, ships and pickups
//!
//! Runs once per tick after everything has moved. Player shots are matched
//! against a quadtree rebuilt over the live enemies; enemy shots, ship contact
//! and pickups only ever test against the player. Nothing is removed while
//! iterating: hits flip `alive` flags and a single prune pass at the end drops
//! the dead.

use glam::Vec2;

use super::damage::{DamagePacket, DamageType, apply_damage};
use super::quadtree::{Boundary, QuadPoint, QuadTree, build_index};
use super::state::{Actor, ActorKind, Faction, GameEvent, GamePhase, GameState, Pickup};
use super::stats::StatKind;
use crate::consts::*;
use crate::tuning::Behavior;

/// Counts of what happened during one collision pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionSummary {
    pub enemy_hits: u32,
    pub player_hits: u32,
    pub kills: u32,
    pub detonations: u32,
    pub misses: u32,
    pub pickups: u32,
}

/// Resolve every overlap for this tick, then prune dead entities
pub fn resolve_collisions(state: &mut GameState, dt: f32) -> CollisionSummary {
    let mut summary = CollisionSummary::default();
    let mut killed = Vec::new();

    let live: Vec<(Vec2, usize)> = state
        .enemies
        .iter()
        .enumerate()
        .filter(|(_, e)| e.alive)
        .map(|(i, e)| (e.pos, i))
        .collect();
    let max_radius = state
        .enemies
        .iter()
        .filter(|e| e.alive)
        .map(|e| e.radius)
        .fold(0.0, f32::max);

    if let Some(index) = build_index(live.iter().copied(), state.settings.quadtree_capacity) {
        player_projectiles(state, &index, max_radius, &mut killed, &mut summary);
    }
    enemy_projectiles(state, &mut summary);
    ship_contact(state, dt, &mut summary);
    collect_pickups(state, &mut summary);
    expire_projectiles(state, &mut summary);
    process_kills(state, &killed, &mut summary);
    check_player_destroyed(state);

    state.enemies.retain(|e| e.alive);
    state.projectiles.retain(|p| p.alive);
    state.pickups.retain(|p| p.alive);

    summary
}

/// Closest live enemy whose circle overlaps the given one
fn nearest_overlap(
    enemies: &[Actor],
    candidates: &[QuadPoint<usize>],
    pos: Vec2,
    radius: f32,
) -> Option<usize> {
    candidates
        .iter()
        .map(|c| c.data)
        .filter(|&i| enemies[i].alive && enemies[i].overlaps(pos, radius))
        .min_by(|&a, &b| {
            let da = enemies[a].pos.distance_squared(pos);
            let db = enemies[b].pos.distance_squared(pos);
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        })
}

/// EM hits leave an ion mark. Kinetic hits cash marks in for bonus damage and
/// report whether enough were consumed to overload.
fn apply_type_interactions(enemy: &mut Actor, mut packet: DamagePacket) -> (DamagePacket, bool) {
    match packet.damage_type {
        DamageType::Em => {
            enemy.ion_marks = (enemy.ion_marks + 1).min(MAX_ION_MARKS);
            (packet, false)
        }
        DamageType::Kinetic if enemy.ion_marks > 0 => {
            let marks = enemy.ion_marks;
            enemy.ion_marks = 0;
            packet.amount *= 1.0 + MARK_BONUS_PER_STACK * marks as f32;
            (packet, marks >= OVERLOAD_THRESHOLD)
        }
        _ => (packet, false),
    }
}

/// Damage one enemy and record the outcome
fn strike(
    enemy: &mut Actor,
    index: usize,
    packet: &DamagePacket,
    time: f32,
    events: &mut Vec<GameEvent>,
    killed: &mut Vec<usize>,
) {
    let report = apply_damage(enemy, packet, time);
    if report.ignored {
        return;
    }
    if let Some(layer) = report.deepest_layer {
        events.push(GameEvent::EnemyHit {
            id: enemy.id,
            amount: report.total(),
            layer,
            crit: packet.is_crit,
        });
    }
    if report.shield_broken {
        events.push(GameEvent::ShieldBroken { id: enemy.id });
    }
    if report.destroyed && enemy.alive {
        enemy.alive = false;
        killed.push(index);
    }
}

fn player_projectiles(
    state: &mut GameState,
    index: &QuadTree<usize>,
    max_radius: f32,
    killed: &mut Vec<usize>,
    summary: &mut CollisionSummary,
) {
    let time = state.time;
    let damage_mult = state.player.actor.runtime_stats[StatKind::DamageMult];
    let mut candidates = Vec::new();

    for p in 0..state.projectiles.len() {
        let proj = &state.projectiles[p];
        if !proj.alive || proj.faction != Faction::Player {
            continue;
        }
        let (pos, radius, packet) = (proj.pos, proj.radius, proj.packet);

        candidates.clear();
        index.query_into(&Boundary::around(pos, radius + max_radius), &mut candidates);
        let Some(target) = nearest_overlap(&state.enemies, &candidates, pos, radius) else {
            continue;
        };

        // Single hit, no piercing
        state.projectiles[p].alive = false;
        summary.enemy_hits += 1;

        let (packet, overload) = apply_type_interactions(&mut state.enemies[target], packet);
        strike(
            &mut state.enemies[target],
            target,
            &packet,
            time,
            &mut state.events,
            killed,
        );
        if !overload {
            continue;
        }

        let center = state.enemies[target].pos;
        let blast = DamagePacket::new(OVERLOAD_DAMAGE * damage_mult, DamageType::Em);
        candidates.clear();
        index.query_into(
            &Boundary::around(center, OVERLOAD_RADIUS + max_radius),
            &mut candidates,
        );
        let mut targets = 0;
        for i in candidates.iter().map(|c| c.data) {
            let enemy = &mut state.enemies[i];
            if i == target || !enemy.alive || !enemy.overlaps(center, OVERLOAD_RADIUS) {
                continue;
            }
            // Marks only; an overload never consumes them, so it cannot chain
            let (blast, _) = apply_type_interactions(enemy, blast);
            strike(enemy, i, &blast, time, &mut state.events, killed);
            targets += 1;
        }
        log::debug!(
            "overload at ({:.0}, {:.0}) hit {} enemies",
            center.x,
            center.y,
            targets
        );
        state.events.push(GameEvent::Overload {
            pos: center,
            radius: OVERLOAD_RADIUS,
            targets,
        });
    }
}

/// Damage the player and record the outcome
fn hit_player(
    player: &mut Actor,
    packet: &DamagePacket,
    time: f32,
    events: &mut Vec<GameEvent>,
    summary: &mut CollisionSummary,
) {
    let report = apply_damage(player, packet, time);
    if report.ignored {
        return;
    }
    summary.player_hits += 1;
    if let Some(layer) = report.deepest_layer {
        events.push(GameEvent::PlayerHit {
            amount: report.total(),
            layer,
            damage_type: packet.damage_type,
        });
    }
    if report.shield_broken {
        events.push(GameEvent::ShieldBroken { id: player.id });
    }
}

fn enemy_projectiles(state: &mut GameState, summary: &mut CollisionSummary) {
    let time = state.time;
    let player = &mut state.player.actor;
    if !player.alive {
        return;
    }
    for proj in state
        .projectiles
        .iter_mut()
        .filter(|p| p.alive && p.faction == Faction::Enemy)
    {
        if !player.overlaps(proj.pos, proj.radius) {
            continue;
        }
        proj.alive = false;
        hit_player(player, &proj.packet, time, &mut state.events, summary);
    }
}

/// Ramming: steady brush damage, or a one-shot blast for kamikazes
fn ship_contact(state: &mut GameState, dt: f32, summary: &mut CollisionSummary) {
    let time = state.time;
    let player = &mut state.player.actor;
    if !player.alive {
        return;
    }
    for enemy in state.enemies.iter_mut().filter(|e| e.alive) {
        if !player.overlaps(enemy.pos, enemy.radius) {
            continue;
        }
        let ActorKind::Enemy {
            behavior,
            contact_damage,
            ..
        } = enemy.kind
        else {
            continue;
        };
        match behavior {
            Behavior::Kamikaze { blast_damage, .. } => {
                enemy.alive = false;
                summary.detonations += 1;
                state.events.push(GameEvent::EnemyDetonated {
                    id: enemy.id,
                    pos: enemy.pos,
                });
                let blast = DamagePacket::new(blast_damage, DamageType::Explosive);
                hit_player(player, &blast, time, &mut state.events, summary);
                // Counts toward the wave, but drops nothing
                if let Some(wave) = state.director.record_kill(&state.tuning) {
                    state.events.push(GameEvent::WaveAdvanced { wave });
                }
            }
            _ if contact_damage > 0.0 => {
                let brush = DamagePacket::new(contact_damage * dt, DamageType::Kinetic);
                hit_player(player, &brush, time, &mut state.events, summary);
            }
            _ => {}
        }
    }
}

fn collect_pickups(state: &mut GameState, summary: &mut CollisionSummary) {
    let player = &state.player.actor;
    if !player.alive {
        return;
    }
    let mut xp = 0;
    for pickup in state.pickups.iter_mut().filter(|p| p.alive) {
        if !player.overlaps(pickup.pos, pickup.radius) {
            continue;
        }
        pickup.alive = false;
        xp += pickup.xp;
        summary.pickups += 1;
        state.events.push(GameEvent::PickupCollected {
            id: pickup.id,
            xp: pickup.xp,
        });
    }
    if xp > 0 {
        state.grant_xp(xp);
    }
}

/// Kill shots that ran out of range or left the arena
fn expire_projectiles(state: &mut GameState, summary: &mut CollisionSummary) {
    let half = state.settings.arena_half_extents();
    for proj in state.projectiles.iter_mut().filter(|p| p.alive) {
        let outside =
            proj.pos.x.abs() > half.x + proj.radius || proj.pos.y.abs() > half.y + proj.radius;
        if proj.out_of_range() || outside {
            proj.alive = false;
            summary.misses += 1;
            state.events.push(GameEvent::ProjectileMissed { id: proj.id });
        }
    }
}

/// Score, XP orbs and wave progress for enemies destroyed this pass
fn process_kills(state: &mut GameState, killed: &[usize], summary: &mut CollisionSummary) {
    for &i in killed {
        let enemy = &state.enemies[i];
        let ActorKind::Enemy { xp, .. } = enemy.kind else {
            continue;
        };
        let (id, pos) = (enemy.id, enemy.pos);
        let archetype = state.archetype_name(enemy);

        state.score += u64::from(xp) * 10;
        summary.kills += 1;
        state.events.push(GameEvent::EnemyKilled {
            id,
            archetype,
            pos,
            xp,
        });

        if xp > 0 {
            let orb = state.next_entity_id();
            state.pickups.push(Pickup {
                id: orb,
                pos,
                radius: ORB_RADIUS,
                xp,
                alive: true,
            });
        }
        if let Some(wave) = state.director.record_kill(&state.tuning) {
            state.events.push(GameEvent::WaveAdvanced { wave });
        }
    }
}

fn check_player_destroyed(state: &mut GameState) {
    let player = &mut state.player.actor;
    if !player.alive || !player.defense.is_destroyed() {
        return;
    }
    player.alive = false;
    state.phase = GamePhase::GameOver;
    log::info!(
        "player destroyed at {:.1}s (wave {}, score {})",
        state.time,
        state.director.wave,
        state.score
    );
    state.events.push(GameEvent::PlayerDestroyed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::damage::Defense;
    use crate::sim::spawn::SpawnRequest;
    use crate::sim::state::Projectile;
    use crate::tuning::{Multipliers, Tuning};

    fn state() -> GameState {
        let mut state = GameState::new(Settings::default(), Tuning::default());
        state.events.clear();
        state
    }

    fn spawn_at(state: &mut GameState, archetype: &str, pos: Vec2) -> usize {
        let index = state.tuning.archetype_index(archetype).expect("archetype");
        let id = state
            .spawn_enemy(&SpawnRequest {
                archetype: index,
                scale: Multipliers::ONE,
                forced_boss: false,
            })
            .expect("spawned");
        state.events.clear();
        let i = state.enemies.iter().position(|e| e.id == id).expect("present");
        state.enemies[i].pos = pos;
        i
    }

    fn shoot(state: &mut GameState, faction: Faction, pos: Vec2, packet: DamagePacket) {
        let id = state.next_entity_id();
        let owner = state.player.actor.id;
        state.projectiles.push(Projectile {
            id,
            pos,
            vel: Vec2::ZERO,
            owner,
            faction,
            packet,
            radius: 4.0,
            traveled: 0.0,
            max_range: 500.0,
            alive: true,
        });
    }

    fn count(state: &GameState, pred: impl Fn(&GameEvent) -> bool) -> usize {
        state.events.iter().filter(|e| pred(e)).count()
    }

    #[test]
    fn test_projectile_hits_nearest_enemy_once() {
        let mut state = state();
        spawn_at(&mut state, "drone", Vec2::new(300.0, 0.0));
        spawn_at(&mut state, "drone", Vec2::new(320.0, 0.0));
        shoot(
            &mut state,
            Faction::Player,
            Vec2::new(306.0, 0.0),
            DamagePacket::new(5.0, DamageType::Kinetic),
        );

        let summary = resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(summary.enemy_hits, 1);
        assert!(state.projectiles.is_empty());
        assert_eq!(state.enemies[0].defense.hull, 15.0);
        assert_eq!(state.enemies[1].defense.hull, 20.0);
        assert_eq!(count(&state, |e| matches!(e, GameEvent::EnemyHit { .. })), 1);
    }

    #[test]
    fn test_kill_drops_orb_and_scores() {
        let mut state = state();
        spawn_at(&mut state, "drone", Vec2::new(300.0, 0.0));
        shoot(
            &mut state,
            Faction::Player,
            Vec2::new(300.0, 0.0),
            DamagePacket::new(50.0, DamageType::Kinetic),
        );

        let summary = resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(summary.kills, 1);
        assert!(state.enemies.is_empty());
        assert_eq!(state.pickups.len(), 1);
        assert_eq!(state.pickups[0].xp, 1);
        assert_eq!(state.score, 10);
        assert_eq!(state.director.kills_this_wave, 1);
        assert_eq!(count(&state, |e| matches!(e, GameEvent::EnemyKilled { .. })), 1);
    }

    #[test]
    fn test_out_of_range_projectile_misses() {
        let mut state = state();
        shoot(
            &mut state,
            Faction::Player,
            Vec2::new(300.0, 0.0),
            DamagePacket::new(5.0, DamageType::Kinetic),
        );
        state.projectiles[0].traveled = 600.0;

        let summary = resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(summary.misses, 1);
        assert!(state.projectiles.is_empty());
        assert_eq!(count(&state, |e| matches!(e, GameEvent::ProjectileMissed { .. })), 1);
    }

    #[test]
    fn test_kinetic_consumes_ion_marks_and_overloads() {
        let mut state = state();
        let target = spawn_at(&mut state, "drone", Vec2::new(300.0, 0.0));
        let neighbor = spawn_at(&mut state, "drone", Vec2::new(350.0, 0.0));
        for _ in 0..3 {
            shoot(
                &mut state,
                Faction::Player,
                Vec2::new(300.0, 0.0),
                DamagePacket::new(1.0, DamageType::Em),
            );
        }
        resolve_collisions(&mut state, crate::consts::SIM_DT);
        assert_eq!(state.enemies[target].ion_marks, 3);
        assert!((state.enemies[target].defense.hull - 17.0).abs() < 1e-4);

        shoot(
            &mut state,
            Faction::Player,
            Vec2::new(300.0, 0.0),
            DamagePacket::new(2.0, DamageType::Kinetic),
        );
        resolve_collisions(&mut state, crate::consts::SIM_DT);

        let hit = &state.enemies[target];
        assert_eq!(hit.ion_marks, 0);
        assert!((hit.defense.hull - (17.0 - 2.0 * 1.45)).abs() < 1e-4);

        let splashed = &state.enemies[neighbor];
        assert!((splashed.defense.hull - (20.0 - OVERLOAD_DAMAGE)).abs() < 1e-4);
        assert_eq!(splashed.ion_marks, 1);
        assert!(state.events.iter().any(|e| matches!(
            e,
            GameEvent::Overload { targets: 1, .. }
        )));
    }

    #[test]
    fn test_kamikaze_detonates_without_xp() {
        let mut state = state();
        spawn_at(&mut state, "bomber", Vec2::new(20.0, 0.0));

        let summary = resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(summary.detonations, 1);
        assert!(state.enemies.is_empty());
        assert!(state.pickups.is_empty());
        assert_eq!(state.score, 0);
        assert_eq!(state.director.kills_this_wave, 1);
        // 35 explosive into a 60 shield at 0.8 efficiency
        assert!((state.player.actor.defense.shield - 32.0).abs() < 1e-4);
        assert_eq!(count(&state, |e| matches!(e, GameEvent::EnemyDetonated { .. })), 1);
    }

    #[test]
    fn test_brush_contact_scales_with_dt() {
        let mut state = state();
        spawn_at(&mut state, "drone", Vec2::new(20.0, 0.0));
        let before = state.player.actor.defense.shield;

        resolve_collisions(&mut state, 0.5);

        // 12 dps kinetic for half a second at 0.8 shield efficiency
        let taken = before - state.player.actor.defense.shield;
        assert!((taken - 12.0 * 0.5 * 0.8).abs() < 1e-4);
        assert_eq!(state.enemies.len(), 1);
    }

    #[test]
    fn test_pickup_grants_xp() {
        let mut state = state();
        let id = state.next_entity_id();
        state.pickups.push(Pickup {
            id,
            pos: Vec2::new(5.0, 0.0),
            radius: ORB_RADIUS,
            xp: 3,
            alive: true,
        });

        let summary = resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(summary.pickups, 1);
        assert_eq!(state.player.xp, 3);
        assert!(state.pickups.is_empty());
    }

    #[test]
    fn test_god_mode_ignores_enemy_fire() {
        let settings = Settings {
            god_mode: true,
            ..Settings::default()
        };
        let mut state = GameState::new(settings, Tuning::default());
        let before = state.player.actor.defense;
        shoot(
            &mut state,
            Faction::Enemy,
            Vec2::ZERO,
            DamagePacket::new(50.0, DamageType::Thermal),
        );

        let summary = resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(summary.player_hits, 0);
        assert!(state.projectiles.is_empty());
        assert_eq!(state.player.actor.defense, before);
    }

    #[test]
    fn test_player_destroyed_ends_run() {
        let mut state = state();
        state.player.actor.defense = Defense {
            shield: 0.0,
            armor: 0.0,
            hull: 1.0,
        };
        shoot(
            &mut state,
            Faction::Enemy,
            Vec2::ZERO,
            DamagePacket::new(10.0, DamageType::Thermal),
        );

        resolve_collisions(&mut state, crate::consts::SIM_DT);

        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(!state.player.actor.alive);
        assert_eq!(count(&state, |e| matches!(e, GameEvent::PlayerDestroyed)), 1);
    }
}
