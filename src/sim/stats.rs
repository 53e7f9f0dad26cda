//! Stat aggregation
//!
//! Runtime stats are folded from three sources, in order:
//! 1. Stacked passives, with diminishing returns per extra stack
//! 2. Keystones, applied once at full strength
//! 3. Modifiers owned by the actor itself (enemy buffs)
//!
//! Within each source, every additive modifier lands before any multiplicative one.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Deserializer, Serialize};

use super::damage::DamageType;
use crate::consts::{RESIST_CAP, STACK_DECAY};

/// Every stat an actor can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    DamageMult,
    FireRate,
    Speed,
    CritChance,
    CritMult,
    ResistEm,
    ResistKinetic,
    ResistExplosive,
    ResistThermal,
    Cooling,
    HeatCap,
    MagnetRange,
    MaxShield,
    MaxArmor,
    MaxHull,
    ShieldRegen,
    ShieldRegenDelay,
    ArmorHardness,
    HullResist,
    DamageTaken,
    ProjectileSpeed,
    Range,
}

impl StatKind {
    pub const COUNT: usize = 22;

    pub const ALL: [StatKind; StatKind::COUNT] = [
        StatKind::DamageMult,
        StatKind::FireRate,
        StatKind::Speed,
        StatKind::CritChance,
        StatKind::CritMult,
        StatKind::ResistEm,
        StatKind::ResistKinetic,
        StatKind::ResistExplosive,
        StatKind::ResistThermal,
        StatKind::Cooling,
        StatKind::HeatCap,
        StatKind::MagnetRange,
        StatKind::MaxShield,
        StatKind::MaxArmor,
        StatKind::MaxHull,
        StatKind::ShieldRegen,
        StatKind::ShieldRegenDelay,
        StatKind::ArmorHardness,
        StatKind::HullResist,
        StatKind::DamageTaken,
        StatKind::ProjectileSpeed,
        StatKind::Range,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatKind::DamageMult => "damage_mult",
            StatKind::FireRate => "fire_rate",
            StatKind::Speed => "speed",
            StatKind::CritChance => "crit_chance",
            StatKind::CritMult => "crit_mult",
            StatKind::ResistEm => "resist_em",
            StatKind::ResistKinetic => "resist_kinetic",
            StatKind::ResistExplosive => "resist_explosive",
            StatKind::ResistThermal => "resist_thermal",
            StatKind::Cooling => "cooling",
            StatKind::HeatCap => "heat_cap",
            StatKind::MagnetRange => "magnet_range",
            StatKind::MaxShield => "max_shield",
            StatKind::MaxArmor => "max_armor",
            StatKind::MaxHull => "max_hull",
            StatKind::ShieldRegen => "shield_regen",
            StatKind::ShieldRegenDelay => "shield_regen_delay",
            StatKind::ArmorHardness => "armor_hardness",
            StatKind::HullResist => "hull_resist",
            StatKind::DamageTaken => "damage_taken",
            StatKind::ProjectileSpeed => "projectile_speed",
            StatKind::Range => "range",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Neutral value: 1.0 for multipliers, 0.0 for flat quantities
    pub fn neutral(self) -> f32 {
        match self {
            StatKind::DamageMult
            | StatKind::FireRate
            | StatKind::CritMult
            | StatKind::DamageTaken
            | StatKind::ProjectileSpeed
            | StatKind::Range => 1.0,
            _ => 0.0,
        }
    }

    /// Resistance stat guarding against a damage type
    pub fn resistance_for(ty: DamageType) -> Self {
        match ty {
            DamageType::Em => StatKind::ResistEm,
            DamageType::Kinetic => StatKind::ResistKinetic,
            DamageType::Explosive => StatKind::ResistExplosive,
            DamageType::Thermal => StatKind::ResistThermal,
        }
    }
}

/// Flat stat block indexed by [`StatKind`]
///
/// Serializes as a name -> value map. Unknown names are dropped with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f32>", into = "BTreeMap<String, f32>")]
pub struct Stats {
    values: [f32; StatKind::COUNT],
}

impl Default for Stats {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Stats {
    /// Every stat at its neutral value
    pub fn neutral() -> Self {
        let mut values = [0.0; StatKind::COUNT];
        for kind in StatKind::ALL {
            values[kind as usize] = kind.neutral();
        }
        Self { values }
    }

    /// Builder-style setter
    pub fn with(mut self, kind: StatKind, value: f32) -> Self {
        self[kind] = value;
        self
    }

    /// Resistance against a damage type, hard-capped
    pub fn resistance(&self, ty: DamageType) -> f32 {
        self[StatKind::resistance_for(ty)].min(RESIST_CAP)
    }

    /// Replace non-finite values and floor quantities that cannot go negative
    fn sanitize(&mut self) {
        for kind in StatKind::ALL {
            let value = &mut self.values[kind as usize];
            if !value.is_finite() {
                log::warn!("stat {} became {}, resetting to neutral", kind.name(), value);
                *value = kind.neutral();
            }
            match kind {
                // Resistances may go negative (vulnerability)
                StatKind::ResistEm
                | StatKind::ResistKinetic
                | StatKind::ResistExplosive
                | StatKind::ResistThermal
                | StatKind::HullResist => {}
                _ => *value = value.max(0.0),
            }
        }
    }
}

impl Index<StatKind> for Stats {
    type Output = f32;

    fn index(&self, kind: StatKind) -> &f32 {
        &self.values[kind as usize]
    }
}

impl IndexMut<StatKind> for Stats {
    fn index_mut(&mut self, kind: StatKind) -> &mut f32 {
        &mut self.values[kind as usize]
    }
}

impl From<BTreeMap<String, f32>> for Stats {
    fn from(map: BTreeMap<String, f32>) -> Self {
        let mut stats = Stats::neutral();
        for (name, value) in map {
            match StatKind::from_name(&name) {
                Some(kind) => stats[kind] = value,
                None => log::warn!("ignoring unknown stat `{}` in stat table", name),
            }
        }
        stats
    }
}

impl From<Stats> for BTreeMap<String, f32> {
    fn from(stats: Stats) -> Self {
        StatKind::ALL
            .into_iter()
            .map(|kind| (kind.name().to_string(), stats[kind]))
            .collect()
    }
}

/// How a modifier combines with the running value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Additive,
    Multiplicative,
}

/// A resolved stat modifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Modifier {
    #[serde(rename = "property")]
    pub stat: StatKind,
    pub value: f32,
    pub kind: ModifierKind,
}

impl Modifier {
    pub fn add(stat: StatKind, value: f32) -> Self {
        Self {
            stat,
            value,
            kind: ModifierKind::Additive,
        }
    }

    pub fn mul(stat: StatKind, value: f32) -> Self {
        Self {
            stat,
            value,
            kind: ModifierKind::Multiplicative,
        }
    }
}

/// Modifier as written in content tables (stat named by string)
#[derive(Debug, Clone, Deserialize)]
pub struct ModifierSpec {
    pub property: String,
    pub value: f32,
    pub kind: ModifierKind,
}

impl ModifierSpec {
    /// Resolve the property name; unknown names are logged and dropped
    pub fn resolve(&self) -> Option<Modifier> {
        match StatKind::from_name(&self.property) {
            Some(stat) => Some(Modifier {
                stat,
                value: self.value,
                kind: self.kind,
            }),
            None => {
                log::warn!("ignoring modifier on unknown stat `{}`", self.property);
                None
            }
        }
    }
}

/// Serde helper: read a modifier list, skipping entries with unknown stats
pub fn deserialize_modifiers<'de, D>(deserializer: D) -> Result<Vec<Modifier>, D::Error>
where
    D: Deserializer<'de>,
{
    let specs = Vec::<ModifierSpec>::deserialize(deserializer)?;
    Ok(specs.iter().filter_map(ModifierSpec::resolve).collect())
}

/// A stackable passive upgrade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassiveDef {
    pub id: String,
    pub max_stacks: u32,
    #[serde(deserialize_with = "deserialize_modifiers")]
    pub modifiers: Vec<Modifier>,
}

/// A unique, non-stacking upgrade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoneDef {
    pub id: String,
    #[serde(deserialize_with = "deserialize_modifiers")]
    pub modifiers: Vec<Modifier>,
}

/// A passive and how many times it has been taken
#[derive(Debug, Clone)]
pub struct PassiveStack {
    pub def: PassiveDef,
    pub stacks: u32,
}

impl PassiveStack {
    /// Stacks that actually count, clamped to the passive's limit
    pub fn effective_stacks(&self) -> u32 {
        self.stacks.min(self.def.max_stacks)
    }
}

/// The player's accumulated upgrades for the run
#[derive(Debug, Clone, Default)]
pub struct Loadout {
    passives: Vec<PassiveStack>,
    keystones: Vec<KeystoneDef>,
}

impl Loadout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one stack of a passive. Returns the stack count afterwards.
    ///
    /// Stacks never exceed `max_stacks`; extra picks are absorbed.
    pub fn add_passive(&mut self, def: &PassiveDef) -> u32 {
        if let Some(entry) = self.passives.iter_mut().find(|p| p.def.id == def.id) {
            entry.stacks = (entry.stacks + 1).min(def.max_stacks);
            return entry.stacks;
        }
        let stacks = 1u32.min(def.max_stacks);
        self.passives.push(PassiveStack {
            def: def.clone(),
            stacks,
        });
        stacks
    }

    /// Add a keystone. Returns false if it was already owned.
    pub fn add_keystone(&mut self, def: &KeystoneDef) -> bool {
        if self.has_keystone(&def.id) {
            return false;
        }
        self.keystones.push(def.clone());
        true
    }

    pub fn has_keystone(&self, id: &str) -> bool {
        self.keystones.iter().any(|k| k.id == id)
    }

    pub fn stacks_of(&self, id: &str) -> u32 {
        self.passives
            .iter()
            .find(|p| p.def.id == id)
            .map(|p| p.stacks)
            .unwrap_or(0)
    }

    pub fn passives(&self) -> &[PassiveStack] {
        &self.passives
    }

    pub fn keystones(&self) -> &[KeystoneDef] {
        &self.keystones
    }

    pub fn clear(&mut self) {
        self.passives.clear();
        self.keystones.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.passives.is_empty() && self.keystones.is_empty()
    }
}

/// Diminishing-returns factor for `n` stacks: sum of `0.8^i` for `i` in `0..n`
pub fn efficiency_sum(n: u32) -> f32 {
    let mut sum = 0.0;
    let mut term = 1.0;
    for _ in 0..n {
        sum += term;
        term *= STACK_DECAY;
    }
    sum
}

/// Apply modifiers at full strength, additive pass first
fn apply_flat(stats: &mut Stats, modifiers: &[Modifier]) {
    for m in modifiers.iter().filter(|m| m.kind == ModifierKind::Additive) {
        stats[m.stat] += m.value;
    }
    for m in modifiers.iter().filter(|m| m.kind == ModifierKind::Multiplicative) {
        stats[m.stat] *= m.value;
    }
}

/// Fold base stats, a loadout and actor-owned modifiers into runtime stats
pub fn compute_runtime_stats(base: &Stats, loadout: Option<&Loadout>, own: &[Modifier]) -> Stats {
    let mut result = *base;

    if let Some(loadout) = loadout {
        let stacked: Vec<(f32, &PassiveStack)> = loadout
            .passives()
            .iter()
            .filter(|p| p.effective_stacks() > 0)
            .map(|p| (efficiency_sum(p.effective_stacks()), p))
            .collect();

        for (eff, passive) in &stacked {
            for m in passive.def.modifiers.iter() {
                if m.kind == ModifierKind::Additive {
                    result[m.stat] += m.value * eff;
                }
            }
        }
        // Only the bonus portion of a multiplier decays
        for (eff, passive) in &stacked {
            for m in passive.def.modifiers.iter() {
                if m.kind == ModifierKind::Multiplicative {
                    result[m.stat] *= 1.0 + (m.value - 1.0) * eff;
                }
            }
        }

        // Keystones are one source regardless of pick order
        let keystone_mods: Vec<Modifier> = loadout
            .keystones()
            .iter()
            .flat_map(|k| k.modifiers.iter().copied())
            .collect();
        apply_flat(&mut result, &keystone_mods);
    }

    apply_flat(&mut result, own);
    result.sanitize();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn passive(id: &str, max_stacks: u32, modifiers: Vec<Modifier>) -> PassiveDef {
        PassiveDef {
            id: id.to_string(),
            max_stacks,
            modifiers,
        }
    }

    #[test]
    fn test_efficiency_first_stack_is_full() {
        assert_eq!(efficiency_sum(0), 0.0);
        assert_eq!(efficiency_sum(1), 1.0);
        assert!((efficiency_sum(2) - 1.8).abs() < 1e-6);
        assert!((efficiency_sum(3) - 2.44).abs() < 1e-5);
    }

    #[test]
    fn test_additive_passive_decays() {
        let base = Stats::neutral().with(StatKind::MaxShield, 50.0);
        let def = passive("shield_cap", 5, vec![Modifier::add(StatKind::MaxShield, 10.0)]);
        let mut loadout = Loadout::new();
        loadout.add_passive(&def);
        loadout.add_passive(&def);

        let stats = compute_runtime_stats(&base, Some(&loadout), &[]);
        assert!((stats[StatKind::MaxShield] - 68.0).abs() < 1e-4);
    }

    #[test]
    fn test_multiplicative_passive_decays_bonus_only() {
        let base = Stats::neutral().with(StatKind::FireRate, 2.0);
        let def = passive("rof", 5, vec![Modifier::mul(StatKind::FireRate, 1.2)]);
        let mut loadout = Loadout::new();
        loadout.add_passive(&def);
        loadout.add_passive(&def);

        let stats = compute_runtime_stats(&base, Some(&loadout), &[]);
        // 2.0 * (1 + 0.2 * 1.8)
        assert!((stats[StatKind::FireRate] - 2.72).abs() < 1e-4);
    }

    #[test]
    fn test_additive_lands_before_multiplicative() {
        let base = Stats::neutral().with(StatKind::Speed, 100.0);
        let mul = passive("fast", 3, vec![Modifier::mul(StatKind::Speed, 1.5)]);
        let add = passive("thrusters", 3, vec![Modifier::add(StatKind::Speed, 20.0)]);
        let mut loadout = Loadout::new();
        // Multiplier picked first still applies after the flat bonus
        loadout.add_passive(&mul);
        loadout.add_passive(&add);

        let stats = compute_runtime_stats(&base, Some(&loadout), &[]);
        assert!((stats[StatKind::Speed] - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_keystone_is_undecayed() {
        let base = Stats::neutral();
        let keystone = KeystoneDef {
            id: "glass_cannon".to_string(),
            modifiers: vec![
                Modifier::mul(StatKind::DamageMult, 2.0),
                Modifier::mul(StatKind::DamageTaken, 1.5),
            ],
        };
        let mut loadout = Loadout::new();
        assert!(loadout.add_keystone(&keystone));
        assert!(!loadout.add_keystone(&keystone));

        let stats = compute_runtime_stats(&base, Some(&loadout), &[]);
        assert_eq!(stats[StatKind::DamageMult], 2.0);
        assert_eq!(stats[StatKind::DamageTaken], 1.5);
    }

    #[test]
    fn test_keystone_order_does_not_matter() {
        let double = KeystoneDef {
            id: "double_hull".to_string(),
            modifiers: vec![Modifier::mul(StatKind::MaxHull, 2.0)],
        };
        let plating = KeystoneDef {
            id: "plating".to_string(),
            modifiers: vec![Modifier::add(StatKind::MaxHull, 10.0)],
        };
        let base = Stats::neutral().with(StatKind::MaxHull, 100.0);

        let mut mul_first = Loadout::new();
        mul_first.add_keystone(&double);
        mul_first.add_keystone(&plating);
        let mut add_first = Loadout::new();
        add_first.add_keystone(&plating);
        add_first.add_keystone(&double);

        let a = compute_runtime_stats(&base, Some(&mul_first), &[]);
        let b = compute_runtime_stats(&base, Some(&add_first), &[]);
        assert_eq!(a[StatKind::MaxHull], 220.0);
        assert_eq!(b[StatKind::MaxHull], 220.0);
    }

    #[test]
    fn test_own_modifiers_apply_last() {
        let base = Stats::neutral().with(StatKind::MaxArmor, 40.0);
        let own = [
            Modifier::mul(StatKind::MaxArmor, 2.0),
            Modifier::add(StatKind::MaxArmor, 10.0),
        ];
        let stats = compute_runtime_stats(&base, None, &own);
        assert_eq!(stats[StatKind::MaxArmor], 100.0);
    }

    #[test]
    fn test_stacks_clamped_to_max() {
        let def = passive("hull", 2, vec![Modifier::add(StatKind::MaxHull, 10.0)]);
        let mut loadout = Loadout::new();
        for _ in 0..6 {
            loadout.add_passive(&def);
        }
        assert_eq!(loadout.stacks_of("hull"), 2);

        let stats = compute_runtime_stats(&Stats::neutral(), Some(&loadout), &[]);
        assert!((stats[StatKind::MaxHull] - 18.0).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_property_is_skipped() {
        let json = r#"{
            "id": "mystery",
            "max_stacks": 3,
            "modifiers": [
                { "property": "warp_factor", "value": 9.0, "kind": "additive" },
                { "property": "speed", "value": 5.0, "kind": "additive" }
            ]
        }"#;
        let def: PassiveDef = serde_json::from_str(json).expect("parses");
        assert_eq!(def.modifiers.len(), 1);
        assert_eq!(def.modifiers[0].stat, StatKind::Speed);
    }

    #[test]
    fn test_stats_from_map_ignores_unknown() {
        let stats: Stats =
            serde_json::from_str(r#"{ "max_hull": 80.0, "bogus": 1.0 }"#).expect("parses");
        assert_eq!(stats[StatKind::MaxHull], 80.0);
        assert_eq!(stats[StatKind::DamageMult], 1.0);
    }

    #[test]
    fn test_non_negative_stats_floor_at_zero() {
        let base = Stats::neutral().with(StatKind::MaxShield, 10.0);
        let stats = compute_runtime_stats(&base, None, &[Modifier::add(StatKind::MaxShield, -50.0)]);
        assert_eq!(stats[StatKind::MaxShield], 0.0);
    }

    #[test]
    fn test_resistance_capped() {
        let stats = Stats::neutral().with(StatKind::ResistThermal, 1.4);
        assert_eq!(stats.resistance(DamageType::Thermal), RESIST_CAP);
    }

    #[test]
    fn test_names_round_trip() {
        for kind in StatKind::ALL {
            assert_eq!(StatKind::from_name(kind.name()), Some(kind));
        }
    }

    proptest! {
        #[test]
        fn prop_efficiency_increasing_and_sublinear(n in 1u32..30) {
            let a = efficiency_sum(n);
            let b = efficiency_sum(n + 1);
            prop_assert!(b > a);
            prop_assert!(b - a < 1.0);
            prop_assert!(a <= n as f32);
            prop_assert!(b - a <= a - efficiency_sum(n - 1));
        }

        #[test]
        fn prop_resistance_cap(value in 0.9f32..10.0) {
            let stats = Stats::neutral().with(StatKind::ResistKinetic, value);
            prop_assert_eq!(stats.resistance(DamageType::Kinetic), RESIST_CAP);
        }
    }
}
