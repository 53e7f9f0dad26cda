//! Data-driven game balance
//!
//! Archetype, weapon and upgrade tables plus the difficulty curve. All of it is
//! plain data: the simulation reads it, never mutates it. `Tuning::default()`
//! is the built-in content set; `Tuning::from_json` loads a replacement.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::sim::damage::DamageType;
use crate::sim::stats::{
    KeystoneDef, Modifier, PassiveDef, StatKind, Stats, deserialize_modifiers,
};

/// Enemy tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Normal,
    Elite,
    Boss,
}

/// Enemy behavior and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Behavior {
    /// Steer straight at the player with a limited turn rate
    Chaser { turn_rate: f32 },
    /// Sprint in when close and detonate on contact
    Kamikaze {
        blast_damage: f32,
        sprint_radius: f32,
        sprint_mult: f32,
    },
    /// Hold a firing distance and shoot
    Shooter {
        preferred_range: f32,
        fire_interval: f32,
        projectile_speed: f32,
        damage: f32,
        damage_type: DamageType,
    },
    /// Circle the player at a fixed radius
    Orbiter { orbit_radius: f32, angular_speed: f32 },
    /// Slow advance with periodic radial volleys
    Boss {
        volley_interval: f32,
        volley_count: u32,
        projectile_speed: f32,
        damage: f32,
        damage_type: DamageType,
    },
}

/// A named enemy template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeDef {
    pub id: String,
    #[serde(default)]
    pub tier: Tier,
    pub radius: f32,
    pub spawn_cost: f32,
    /// Relative pick weight among affordable archetypes
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Damage per second while touching the player
    #[serde(default)]
    pub contact_damage: f32,
    pub xp: u32,
    pub stats: Stats,
    /// Archetype-level buffs, applied as actor-owned modifiers
    #[serde(default, deserialize_with = "deserialize_modifiers")]
    pub modifiers: Vec<Modifier>,
    pub behavior: Behavior,
}

fn default_weight() -> f32 {
    1.0
}

/// Player weapon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponDef {
    pub id: String,
    pub damage: f32,
    pub damage_type: DamageType,
    /// Shots per second before the fire-rate stat
    pub fire_rate: f32,
    pub heat_per_shot: f32,
    pub range: f32,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    #[serde(default)]
    pub penetration: f32,
}

/// Spawn pool and budget rate up to (and including) `until_wave`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnBracket {
    pub until_wave: u32,
    pub budget_per_second: f32,
    pub pool: Vec<String>,
}

/// Count / health / speed scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    pub count: f32,
    pub health: f32,
    pub speed: f32,
}

impl Multipliers {
    pub const ONE: Multipliers = Multipliers {
        count: 1.0,
        health: 1.0,
        speed: 1.0,
    };

    pub fn lerp(self, to: Multipliers, t: f32) -> Multipliers {
        let t = t.clamp(0.0, 1.0);
        Multipliers {
            count: self.count + (to.count - self.count) * t,
            health: self.health + (to.health - self.health) * t,
            speed: self.speed + (to.speed - self.speed) * t,
        }
    }
}

/// Difficulty curve over wave number and elapsed minutes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyCurve {
    /// Waves 1..=ease_waves blend from `baseline` toward the steady formula
    pub ease_waves: u32,
    pub baseline: Multipliers,
    pub count_per_wave: f32,
    pub health_per_wave: f32,
    pub speed_per_wave: f32,
    pub count_per_minute: f32,
    pub health_per_minute: f32,
    pub speed_cap: f32,
}

impl DifficultyCurve {
    /// Steady-state multipliers for a wave (1-based)
    pub fn steady(&self, wave: u32, elapsed_secs: f32) -> Multipliers {
        let w = wave.saturating_sub(1) as f32;
        let minutes = elapsed_secs.max(0.0) / 60.0;
        Multipliers {
            count: 1.0 + self.count_per_wave * w + self.count_per_minute * minutes,
            health: 1.0 + self.health_per_wave * w + self.health_per_minute * minutes,
            speed: (1.0 + self.speed_per_wave * w).min(self.speed_cap),
        }
    }

    /// Multipliers with the early-wave easing applied
    pub fn at(&self, wave: u32, elapsed_secs: f32) -> Multipliers {
        let steady = self.steady(wave, elapsed_secs);
        if self.ease_waves == 0 || wave > self.ease_waves {
            return steady;
        }
        let t = wave.saturating_sub(1) as f32 / self.ease_waves as f32;
        self.baseline.lerp(steady, t)
    }
}

/// Kill quota and soft population cap per wave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveRules {
    pub base_kill_quota: u32,
    pub kill_quota_per_wave: u32,
    pub base_soft_cap: usize,
    pub soft_cap_per_wave: usize,
    /// Unspent budget is capped at this many seconds of accrual
    pub max_banked_seconds: f32,
}

impl WaveRules {
    pub fn kill_quota(&self, wave: u32) -> u32 {
        self.base_kill_quota + self.kill_quota_per_wave * wave.saturating_sub(1)
    }

    pub fn soft_cap(&self, wave: u32) -> usize {
        self.base_soft_cap + self.soft_cap_per_wave * wave.saturating_sub(1) as usize
    }
}

/// XP needed per level: `base * growth^(level - 1)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpCurve {
    pub base: f32,
    pub growth: f32,
}

impl XpCurve {
    pub fn xp_to_next(&self, level: u32) -> u32 {
        let exp = level.saturating_sub(1) as i32;
        (self.base * self.growth.powi(exp)).round().max(1.0) as u32
    }
}

/// Player ship template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDef {
    pub radius: f32,
    pub stats: Stats,
    pub starting_weapon: String,
}

/// All content tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    pub player: PlayerDef,
    pub archetypes: Vec<ArchetypeDef>,
    pub weapons: Vec<WeaponDef>,
    pub passives: Vec<PassiveDef>,
    pub keystones: Vec<KeystoneDef>,
    pub brackets: Vec<SpawnBracket>,
    pub difficulty: DifficultyCurve,
    pub waves: WaveRules,
    pub xp: XpCurve,
}

impl Tuning {
    /// Parse content tables from JSON and validate them
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load content tables from a JSON file
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let json = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let tuning = Self::from_json(&json)?;
        log::info!(
            "Loaded {} archetypes and {} weapons from {}",
            tuning.archetypes.len(),
            tuning.weapons.len(),
            path.display()
        );
        Ok(tuning)
    }

    /// Check cross-references and degenerate values
    pub fn validate(&self) -> Result<(), ContentError> {
        if self.archetypes.is_empty() {
            return Err(ContentError::EmptyTable { table: "archetypes" });
        }
        if self.weapons.is_empty() {
            return Err(ContentError::EmptyTable { table: "weapons" });
        }
        if self.brackets.is_empty() {
            return Err(ContentError::EmptyTable { table: "brackets" });
        }

        check_unique("archetype", self.archetypes.iter().map(|a| a.id.as_str()))?;
        check_unique("weapon", self.weapons.iter().map(|w| w.id.as_str()))?;
        check_unique("passive", self.passives.iter().map(|p| p.id.as_str()))?;
        check_unique("keystone", self.keystones.iter().map(|k| k.id.as_str()))?;

        for archetype in &self.archetypes {
            if archetype.spawn_cost <= 0.0 {
                return Err(ContentError::InvalidSpawnCost {
                    archetype: archetype.id.clone(),
                    cost: archetype.spawn_cost,
                });
            }
        }
        if !self.archetypes.iter().any(|a| a.tier == Tier::Boss) {
            return Err(ContentError::MissingBoss);
        }
        for passive in &self.passives {
            if passive.max_stacks == 0 {
                return Err(ContentError::ZeroMaxStacks {
                    passive: passive.id.clone(),
                });
            }
        }
        for (bracket, spec) in self.brackets.iter().enumerate() {
            if spec.pool.is_empty() {
                return Err(ContentError::EmptyPool { bracket });
            }
            for name in &spec.pool {
                if self.archetype_index(name).is_none() {
                    return Err(ContentError::UnknownArchetype {
                        bracket,
                        archetype: name.clone(),
                    });
                }
            }
        }
        if self.weapon(&self.player.starting_weapon).is_none() {
            return Err(ContentError::UnknownWeapon {
                weapon: self.player.starting_weapon.clone(),
            });
        }
        Ok(())
    }

    pub fn archetype_index(&self, id: &str) -> Option<usize> {
        self.archetypes.iter().position(|a| a.id == id)
    }

    pub fn weapon(&self, id: &str) -> Option<&WeaponDef> {
        self.weapons.iter().find(|w| w.id == id)
    }

    pub fn passive(&self, id: &str) -> Option<&PassiveDef> {
        self.passives.iter().find(|p| p.id == id)
    }

    pub fn keystone(&self, id: &str) -> Option<&KeystoneDef> {
        self.keystones.iter().find(|k| k.id == id)
    }

    /// Index of the bracket covering a wave (last bracket past the table)
    pub fn bracket_for_wave(&self, wave: u32) -> usize {
        self.brackets
            .iter()
            .position(|b| wave <= b.until_wave)
            .unwrap_or(self.brackets.len().saturating_sub(1))
    }

    /// Boss-tier archetype indices
    pub fn bosses(&self) -> Vec<usize> {
        self.archetypes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.tier == Tier::Boss)
            .map(|(i, _)| i)
            .collect()
    }
}

fn check_unique<'a>(
    table: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ContentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ContentError::DuplicateId {
                table,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn stats(entries: &[(StatKind, f32)]) -> Stats {
    entries
        .iter()
        .fold(Stats::neutral(), |acc, &(kind, value)| acc.with(kind, value))
}

fn passive(id: &str, max_stacks: u32, modifiers: Vec<Modifier>) -> PassiveDef {
    PassiveDef {
        id: id.to_string(),
        max_stacks,
        modifiers,
    }
}

fn keystone(id: &str, modifiers: Vec<Modifier>) -> KeystoneDef {
    KeystoneDef {
        id: id.to_string(),
        modifiers,
    }
}

fn pool(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

impl Default for Tuning {
    fn default() -> Self {
        use StatKind::*;

        let player = PlayerDef {
            radius: crate::consts::PLAYER_RADIUS,
            stats: stats(&[
                (Speed, 260.0),
                (CritChance, 0.05),
                (CritMult, 1.5),
                (Cooling, 30.0),
                (HeatCap, 100.0),
                (MagnetRange, 120.0),
                (MaxShield, 60.0),
                (MaxArmor, 40.0),
                (MaxHull, 100.0),
                (ShieldRegen, 12.0),
                (ShieldRegenDelay, 2.5),
                (ArmorHardness, 0.1),
            ]),
            starting_weapon: "pulse_laser".to_string(),
        };

        let archetypes = vec![
            ArchetypeDef {
                id: "drone".to_string(),
                tier: Tier::Normal,
                radius: 12.0,
                spawn_cost: 1.0,
                weight: 10.0,
                contact_damage: 12.0,
                xp: 1,
                stats: stats(&[(MaxHull, 20.0), (Speed, 110.0)]),
                modifiers: Vec::new(),
                behavior: Behavior::Chaser { turn_rate: 3.0 },
            },
            ArchetypeDef {
                id: "interceptor".to_string(),
                tier: Tier::Normal,
                radius: 10.0,
                spawn_cost: 2.0,
                weight: 6.0,
                contact_damage: 10.0,
                xp: 2,
                stats: stats(&[(MaxShield, 12.0), (MaxHull, 18.0), (Speed, 170.0)]),
                modifiers: Vec::new(),
                behavior: Behavior::Chaser { turn_rate: 5.5 },
            },
            ArchetypeDef {
                id: "bomber".to_string(),
                tier: Tier::Normal,
                radius: 14.0,
                spawn_cost: 3.0,
                weight: 4.0,
                contact_damage: 0.0,
                xp: 3,
                stats: stats(&[(MaxArmor, 10.0), (MaxHull, 30.0), (Speed, 90.0)]),
                modifiers: Vec::new(),
                behavior: Behavior::Kamikaze {
                    blast_damage: 35.0,
                    sprint_radius: 220.0,
                    sprint_mult: 2.2,
                },
            },
            ArchetypeDef {
                id: "gunship".to_string(),
                tier: Tier::Normal,
                radius: 16.0,
                spawn_cost: 4.0,
                weight: 3.0,
                contact_damage: 8.0,
                xp: 4,
                stats: stats(&[
                    (MaxShield, 25.0),
                    (MaxArmor, 15.0),
                    (MaxHull, 30.0),
                    (Speed, 80.0),
                    (ResistKinetic, 0.2),
                ]),
                modifiers: Vec::new(),
                behavior: Behavior::Shooter {
                    preferred_range: 320.0,
                    fire_interval: 1.8,
                    projectile_speed: 380.0,
                    damage: 9.0,
                    damage_type: DamageType::Thermal,
                },
            },
            ArchetypeDef {
                id: "warden".to_string(),
                tier: Tier::Elite,
                radius: 20.0,
                spawn_cost: 6.0,
                weight: 2.0,
                contact_damage: 15.0,
                xp: 6,
                stats: stats(&[
                    (MaxShield, 40.0),
                    (MaxArmor, 30.0),
                    (MaxHull, 40.0),
                    (Speed, 120.0),
                    (ResistEm, 0.25),
                ]),
                modifiers: vec![
                    Modifier::add(ArmorHardness, 0.2),
                    Modifier::mul(MaxArmor, 1.25),
                ],
                behavior: Behavior::Orbiter {
                    orbit_radius: 200.0,
                    angular_speed: 0.5,
                },
            },
            ArchetypeDef {
                id: "dreadnought".to_string(),
                tier: Tier::Boss,
                radius: 42.0,
                spawn_cost: 40.0,
                weight: 1.0,
                contact_damage: 40.0,
                xp: 50,
                stats: stats(&[
                    (MaxShield, 300.0),
                    (MaxArmor, 300.0),
                    (MaxHull, 500.0),
                    (Speed, 45.0),
                    (ArmorHardness, 0.2),
                    (ResistExplosive, 0.3),
                ]),
                modifiers: Vec::new(),
                behavior: Behavior::Boss {
                    volley_interval: 3.0,
                    volley_count: 12,
                    projectile_speed: 260.0,
                    damage: 12.0,
                    damage_type: DamageType::Explosive,
                },
            },
        ];

        let weapons = vec![
            WeaponDef {
                id: "pulse_laser".to_string(),
                damage: 8.0,
                damage_type: DamageType::Em,
                fire_rate: 6.0,
                heat_per_shot: 4.0,
                range: 650.0,
                projectile_speed: 900.0,
                projectile_radius: 4.0,
                penetration: 0.0,
            },
            WeaponDef {
                id: "autocannon".to_string(),
                damage: 10.0,
                damage_type: DamageType::Kinetic,
                fire_rate: 5.0,
                heat_per_shot: 5.0,
                range: 600.0,
                projectile_speed: 800.0,
                projectile_radius: 4.0,
                penetration: 0.1,
            },
            WeaponDef {
                id: "plasma_lance".to_string(),
                damage: 16.0,
                damage_type: DamageType::Thermal,
                fire_rate: 2.5,
                heat_per_shot: 9.0,
                range: 500.0,
                projectile_speed: 700.0,
                projectile_radius: 6.0,
                penetration: 0.0,
            },
            WeaponDef {
                id: "flak".to_string(),
                damage: 22.0,
                damage_type: DamageType::Explosive,
                fire_rate: 1.5,
                heat_per_shot: 12.0,
                range: 420.0,
                projectile_speed: 600.0,
                projectile_radius: 7.0,
                penetration: 0.2,
            },
        ];

        let passives = vec![
            passive("capacitor_bank", 5, vec![Modifier::add(MaxShield, 25.0)]),
            passive("reactive_plating", 5, vec![Modifier::add(MaxArmor, 30.0)]),
            passive("hull_bracing", 5, vec![Modifier::add(MaxHull, 40.0)]),
            passive("trigger_tuning", 5, vec![Modifier::mul(FireRate, 1.15)]),
            passive(
                "heat_sinks",
                5,
                vec![Modifier::mul(Cooling, 1.25), Modifier::add(HeatCap, 20.0)],
            ),
            passive("tractor_coil", 5, vec![Modifier::add(MagnetRange, 40.0)]),
            passive(
                "targeting_ai",
                5,
                vec![Modifier::add(CritChance, 0.05), Modifier::add(CritMult, 0.25)],
            ),
            passive("em_dampers", 5, vec![Modifier::add(ResistEm, 0.1)]),
            passive("thrusters", 5, vec![Modifier::mul(Speed, 1.1)]),
            passive("overcharged_rounds", 5, vec![Modifier::mul(DamageMult, 1.12)]),
        ];

        let keystones = vec![
            keystone(
                "glass_cannon",
                vec![Modifier::mul(DamageMult, 1.6), Modifier::mul(MaxHull, 0.6)],
            ),
            keystone(
                "fortress",
                vec![
                    Modifier::mul(MaxArmor, 1.8),
                    Modifier::mul(Speed, 0.8),
                    Modifier::add(ArmorHardness, 0.15),
                ],
            ),
            keystone(
                "regenerative_field",
                vec![
                    Modifier::mul(ShieldRegen, 2.0),
                    Modifier::mul(ShieldRegenDelay, 0.5),
                ],
            ),
            keystone(
                "thermal_exchange",
                vec![
                    Modifier::mul(HeatCap, 1.5),
                    Modifier::mul(Cooling, 1.5),
                    Modifier::mul(DamageTaken, 1.1),
                ],
            ),
        ];

        let brackets = vec![
            SpawnBracket {
                until_wave: 4,
                budget_per_second: 3.0,
                pool: pool(&["drone", "interceptor"]),
            },
            SpawnBracket {
                until_wave: 9,
                budget_per_second: 5.0,
                pool: pool(&["drone", "interceptor", "bomber", "gunship"]),
            },
            SpawnBracket {
                until_wave: 14,
                budget_per_second: 7.5,
                pool: pool(&["drone", "interceptor", "bomber", "gunship", "warden"]),
            },
            SpawnBracket {
                until_wave: u32::MAX,
                budget_per_second: 10.0,
                pool: pool(&["interceptor", "bomber", "gunship", "warden"]),
            },
        ];

        Self {
            player,
            archetypes,
            weapons,
            passives,
            keystones,
            brackets,
            difficulty: DifficultyCurve {
                ease_waves: 3,
                baseline: Multipliers {
                    count: 0.6,
                    health: 0.5,
                    speed: 0.85,
                },
                count_per_wave: 0.12,
                health_per_wave: 0.15,
                speed_per_wave: 0.03,
                count_per_minute: 0.02,
                health_per_minute: 0.03,
                speed_cap: 1.6,
            },
            waves: WaveRules {
                base_kill_quota: 8,
                kill_quota_per_wave: 4,
                base_soft_cap: 20,
                soft_cap_per_wave: 6,
                max_banked_seconds: 10.0,
            },
            xp: XpCurve {
                base: 5.0,
                growth: 1.25,
            },
        }
    }
}
