//! Shieldfall headless runner
//!
//! Drives the simulation with a scripted pilot and logs how the run went.
//!
//! Usage: `shieldfall [settings.json] [content.json] [seconds]`

use std::path::Path;

use glam::Vec2;
use shieldfall::consts::SIM_DT;
use shieldfall::sim::{Ability, AbilitySet, GameEvent, GamePhase, Simulation, Snapshot, TickInput};
use shieldfall::{Settings, Tuning};

/// Default run length (seconds of sim time)
const DEFAULT_RUN_SECONDS: f32 = 180.0;

fn main() {
    env_logger::init();
    log::info!("Shieldfall (headless) starting...");

    let args: Vec<String> = std::env::args().skip(1).collect();

    let settings = match args.first() {
        Some(path) => Settings::load(Path::new(path)),
        None => Ok(Settings::default()),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let tuning = match args.get(1) {
        Some(path) => Tuning::load(Path::new(path)),
        None => Ok(Tuning::default()),
    };
    let tuning = match tuning {
        Ok(tuning) => tuning,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let seconds = args
        .get(2)
        .and_then(|s| s.parse::<f32>().ok())
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(DEFAULT_RUN_SECONDS);

    run(settings, tuning, seconds);
}

/// Simple autopilot: circle the arena, aim at the nearest enemy, dash away
/// from anything too close
struct Pilot {
    upgrade_cursor: usize,
}

impl Pilot {
    fn input(&self, snap: &Snapshot) -> TickInput {
        let me = snap.player.ship.pos;
        let nearest = snap
            .enemies
            .iter()
            .min_by(|a, b| {
                a.pos
                    .distance_squared(me)
                    .partial_cmp(&b.pos.distance_squared(me))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        let orbit = Vec2::new((snap.time * 0.4).cos(), (snap.time * 0.4).sin()) * 300.0;
        let mut move_vector = (orbit - me) / 100.0;
        let mut abilities = AbilitySet::default();

        if let Some(enemy) = nearest {
            let away = me - enemy.pos;
            if away.length() < 80.0 {
                move_vector = away;
                if snap.player.dash_cooldown <= 0.0 {
                    abilities.insert(Ability::Dash);
                }
            }
        }
        if snap.enemies.len() > 15 && snap.player.overdrive_cooldown <= 0.0 {
            abilities.insert(Ability::Overdrive);
        }

        TickInput {
            move_vector,
            firing: nearest.is_some(),
            abilities,
            cursor_world_pos: nearest.map(|e| e.pos),
            pause: false,
        }
    }

    /// Spend level-ups: a keystone every fifth level, passives otherwise
    fn spend_upgrades(&mut self, sim: &mut Simulation) {
        let state = sim.state_mut();
        while state.player.pending_upgrades > 0 {
            let level = state.player.level;
            let keystone = (level % 5 == 0)
                .then(|| {
                    state
                        .tuning
                        .keystones
                        .iter()
                        .find(|k| !state.player.loadout.has_keystone(&k.id))
                        .map(|k| k.id.clone())
                })
                .flatten();
            if let Some(id) = keystone {
                if state.apply_keystone(&id) {
                    log::info!("took keystone {}", id);
                    continue;
                }
            }

            let passives = &state.tuning.passives;
            if passives.is_empty() {
                state.player.pending_upgrades = 0;
                break;
            }
            let id = passives[self.upgrade_cursor % passives.len()].id.clone();
            self.upgrade_cursor += 1;
            if let Some(stacks) = state.apply_passive(&id) {
                log::info!("took passive {} (x{})", id, stacks);
            }
        }
    }
}

fn run(settings: Settings, tuning: Tuning, seconds: f32) {
    let mut sim = Simulation::new(settings, tuning);
    let mut pilot = Pilot { upgrade_cursor: 0 };
    let mut input = TickInput::default();
    let mut kills = 0u32;
    let mut bosses = 0u32;
    let mut last = None;

    // Frames of slightly uneven length, like a real display
    let mut frame = 0u32;
    while sim.state().time < seconds {
        let frame_dt = SIM_DT * if frame % 3 == 0 { 1.5 } else { 0.75 };
        frame += 1;

        let snap = sim.advance(&input, frame_dt);
        for event in &snap.events {
            match event {
                GameEvent::EnemyKilled { .. } => kills += 1,
                GameEvent::BossSpawned { id, wave } => {
                    bosses += 1;
                    log::info!("boss #{} arrived on wave {}", id, wave);
                }
                GameEvent::WaveAdvanced { wave } => {
                    log::info!(
                        "wave {} at {:.1}s: {} enemies, score {}",
                        wave,
                        snap.time,
                        snap.enemies.len(),
                        snap.score
                    );
                }
                GameEvent::LevelUp { level } => log::debug!("level {}", level),
                _ => {}
            }
        }

        if snap.phase == GamePhase::GameOver {
            last = Some(snap);
            break;
        }
        pilot.spend_upgrades(&mut sim);
        input = pilot.input(&snap);
        last = Some(snap);
    }

    let Some(snap) = last else {
        log::warn!("run ended before the first frame");
        return;
    };
    log::info!(
        "run over after {:.1}s: wave {}, level {}, score {}, {} kills, {} bosses",
        snap.time,
        snap.wave(),
        snap.player.level,
        snap.score,
        kills,
        bosses
    );
    match serde_json::to_string_pretty(&snap.budget) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("could not serialize final budget state: {}", e),
    }
}
