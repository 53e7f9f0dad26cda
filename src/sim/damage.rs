//! Layered damage resolution
//!
//! Incoming damage peels shield, then armor, then hull. Each layer converts raw
//! damage with its own per-type efficiency. When a layer breaks, the leftover is
//! converted back to raw damage (divided by that layer's efficiency) before the
//! next layer sees it.

use serde::{Deserialize, Serialize};

use super::state::Actor;
use super::stats::{StatKind, Stats};
use crate::consts::RESIST_CAP;

/// Damage types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Em,
    Kinetic,
    Explosive,
    Thermal,
}

impl DamageType {
    pub const ALL: [DamageType; 4] = [
        DamageType::Em,
        DamageType::Kinetic,
        DamageType::Explosive,
        DamageType::Thermal,
    ];

    /// Raw -> shield conversion
    pub fn shield_efficiency(self) -> f32 {
        match self {
            DamageType::Em => 1.5,
            _ => 0.8,
        }
    }

    /// Raw -> armor conversion
    pub fn armor_efficiency(self) -> f32 {
        match self {
            DamageType::Kinetic | DamageType::Explosive => 1.2,
            _ => 0.7,
        }
    }

    /// Raw -> hull conversion
    pub fn hull_efficiency(self) -> f32 {
        match self {
            DamageType::Thermal | DamageType::Explosive => 1.3,
            _ => 1.0,
        }
    }
}

/// A single hit, consumed once
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamagePacket {
    pub amount: f32,
    pub damage_type: DamageType,
    /// Subtracted from the target's armor hardness
    pub penetration: f32,
    pub is_crit: bool,
}

impl DamagePacket {
    pub fn new(amount: f32, damage_type: DamageType) -> Self {
        Self {
            amount,
            damage_type,
            penetration: 0.0,
            is_crit: false,
        }
    }
}

/// Defense layers, outermost first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefenseLayer {
    Shield,
    Armor,
    Hull,
}

/// Current defense pool
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Defense {
    pub shield: f32,
    pub armor: f32,
    pub hull: f32,
}

impl Defense {
    /// A full pool for the given runtime stats
    pub fn full(stats: &Stats) -> Self {
        Self {
            shield: stats[StatKind::MaxShield],
            armor: stats[StatKind::MaxArmor],
            hull: stats[StatKind::MaxHull],
        }
    }

    /// Clamp every layer into `[0, max]` for the given stats
    pub fn clamp_to(&mut self, stats: &Stats) {
        self.shield = self.shield.clamp(0.0, stats[StatKind::MaxShield]);
        self.armor = self.armor.clamp(0.0, stats[StatKind::MaxArmor]);
        self.hull = self.hull.clamp(0.0, stats[StatKind::MaxHull]);
    }

    pub fn is_destroyed(&self) -> bool {
        self.hull <= 0.0
    }
}

/// What a hit did to each layer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DamageReport {
    pub shield_damage: f32,
    pub armor_damage: f32,
    pub hull_damage: f32,
    /// Innermost layer that took damage
    pub deepest_layer: Option<DefenseLayer>,
    /// Shield went from positive to zero on this hit
    pub shield_broken: bool,
    /// Hull reached zero on this hit
    pub destroyed: bool,
    /// Target ignored the hit (invulnerable)
    pub ignored: bool,
}

impl DamageReport {
    pub fn total(&self) -> f32 {
        self.shield_damage + self.armor_damage + self.hull_damage
    }
}

/// Drain one layer. Returns the raw damage carried past it (0 if absorbed).
fn drain_layer(layer: &mut f32, raw: f32, efficiency: f32) -> (f32, f32) {
    let effective = raw * efficiency;
    if *layer >= effective {
        *layer -= effective;
        return (effective, 0.0);
    }
    let absorbed = *layer;
    let carried = (raw - absorbed / efficiency).max(0.0);
    *layer = 0.0;
    (absorbed, carried)
}

/// Resolve a packet against a defense pool. Pure: no timestamps, no flags.
pub fn resolve_layers(defense: &mut Defense, stats: &Stats, packet: &DamagePacket) -> DamageReport {
    let mut report = DamageReport::default();
    let ty = packet.damage_type;

    let mut remaining = packet.amount.max(0.0) * stats[StatKind::DamageTaken];
    remaining *= 1.0 - stats.resistance(ty);
    if !remaining.is_finite() || remaining <= 0.0 {
        return report;
    }

    if defense.shield > 0.0 {
        let (dealt, carried) = drain_layer(&mut defense.shield, remaining, ty.shield_efficiency());
        report.shield_damage = dealt;
        report.deepest_layer = Some(DefenseLayer::Shield);
        report.shield_broken = defense.shield <= 0.0;
        remaining = carried;
    }

    if remaining > 0.0 && defense.armor > 0.0 {
        let hardness = (stats[StatKind::ArmorHardness] - packet.penetration).clamp(0.0, RESIST_CAP);
        remaining *= 1.0 - hardness;
        let (dealt, carried) = drain_layer(&mut defense.armor, remaining, ty.armor_efficiency());
        report.armor_damage = dealt;
        report.deepest_layer = Some(DefenseLayer::Armor);
        remaining = carried;
    }

    if remaining > 0.0 {
        let resist = stats[StatKind::HullResist].min(RESIST_CAP);
        let effective = remaining * ty.hull_efficiency() * (1.0 - resist);
        let dealt = effective.min(defense.hull).max(0.0);
        defense.hull = (defense.hull - effective).max(0.0);
        report.hull_damage = dealt;
        report.deepest_layer = Some(DefenseLayer::Hull);
        report.destroyed = defense.hull <= 0.0;
    }

    report
}

/// Apply a hit to an actor, recording the hit time for shield regen
pub fn apply_damage(actor: &mut Actor, packet: &DamagePacket, timestamp: f32) -> DamageReport {
    if actor.is_invulnerable() {
        return DamageReport {
            ignored: true,
            ..Default::default()
        };
    }
    actor.last_damage_time = timestamp;
    let was_alive = actor.defense.hull > 0.0;
    let mut report = resolve_layers(&mut actor.defense, &actor.runtime_stats, packet);
    report.destroyed = was_alive && actor.defense.hull <= 0.0;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stats(shield: f32, armor: f32, hull: f32) -> Stats {
        Stats::neutral()
            .with(StatKind::MaxShield, shield)
            .with(StatKind::MaxArmor, armor)
            .with(StatKind::MaxHull, hull)
    }

    #[test]
    fn test_shield_then_armor_em() {
        let stats = stats(10.0, 20.0, 50.0);
        let mut defense = Defense::full(&stats);
        let report = resolve_layers(&mut defense, &stats, &DamagePacket::new(20.0, DamageType::Em));

        assert_eq!(defense.shield, 0.0);
        assert!(report.shield_broken);
        // 20 - 10/1.5 = 13.33 raw reaches armor at 0.7x = 9.33
        let carried = 20.0 - 10.0 / 1.5;
        assert!((report.armor_damage - carried * 0.7).abs() < 1e-4);
        assert!((defense.armor - (20.0 - carried * 0.7)).abs() < 1e-4);
        assert_eq!(defense.hull, 50.0);
        assert_eq!(report.deepest_layer, Some(DefenseLayer::Armor));
    }

    #[test]
    fn test_shield_absorbs_whole_hit() {
        let stats = stats(100.0, 20.0, 50.0);
        let mut defense = Defense::full(&stats);
        let report =
            resolve_layers(&mut defense, &stats, &DamagePacket::new(10.0, DamageType::Kinetic));
        assert!((defense.shield - 92.0).abs() < 1e-4);
        assert_eq!(defense.armor, 20.0);
        assert!(!report.shield_broken);
        assert_eq!(report.deepest_layer, Some(DefenseLayer::Shield));
    }

    #[test]
    fn test_hull_efficiency_and_floor() {
        let stats = stats(0.0, 0.0, 10.0);
        let mut defense = Defense::full(&stats);
        let report =
            resolve_layers(&mut defense, &stats, &DamagePacket::new(5.0, DamageType::Thermal));
        assert!((defense.hull - 3.5).abs() < 1e-4);

        let report2 =
            resolve_layers(&mut defense, &stats, &DamagePacket::new(500.0, DamageType::Explosive));
        assert_eq!(defense.hull, 0.0);
        assert!(report2.destroyed);
        assert!((report2.hull_damage - 3.5).abs() < 1e-4);
        assert!(!report.destroyed);
    }

    #[test]
    fn test_type_resistance_is_capped() {
        let stats = stats(0.0, 0.0, 100.0).with(StatKind::ResistKinetic, 5.0);
        let mut defense = Defense::full(&stats);
        resolve_layers(&mut defense, &stats, &DamagePacket::new(50.0, DamageType::Kinetic));
        // 90% cap leaves 5 damage
        assert!((defense.hull - 95.0).abs() < 1e-4);
    }

    #[test]
    fn test_armor_hardness_and_penetration() {
        let stats = stats(0.0, 100.0, 100.0).with(StatKind::ArmorHardness, 0.5);
        let mut defense = Defense::full(&stats);
        resolve_layers(&mut defense, &stats, &DamagePacket::new(10.0, DamageType::Kinetic));
        // 10 * 0.5 * 1.2
        assert!((defense.armor - 94.0).abs() < 1e-4);

        let mut defense = Defense::full(&stats);
        let packet = DamagePacket {
            penetration: 0.5,
            ..DamagePacket::new(10.0, DamageType::Kinetic)
        };
        resolve_layers(&mut defense, &stats, &packet);
        assert!((defense.armor - 88.0).abs() < 1e-4);
    }

    #[test]
    fn test_damage_taken_multiplier() {
        let stats = stats(0.0, 0.0, 100.0).with(StatKind::DamageTaken, 2.0);
        let mut defense = Defense::full(&stats);
        resolve_layers(&mut defense, &stats, &DamagePacket::new(10.0, DamageType::Em));
        assert!((defense.hull - 80.0).abs() < 1e-4);
    }

    fn damage_type() -> impl Strategy<Value = DamageType> {
        prop_oneof![
            Just(DamageType::Em),
            Just(DamageType::Kinetic),
            Just(DamageType::Explosive),
            Just(DamageType::Thermal),
        ]
    }

    proptest! {
        #[test]
        fn prop_layers_peel_in_order(
            shield in 0.0f32..200.0,
            armor in 0.0f32..200.0,
            hull in 1.0f32..200.0,
            amount in 0.0f32..500.0,
            hardness in 0.0f32..1.0,
            ty in damage_type(),
        ) {
            let stats = stats(shield, armor, hull).with(StatKind::ArmorHardness, hardness);
            let mut defense = Defense::full(&stats);
            let report = resolve_layers(&mut defense, &stats, &DamagePacket::new(amount, ty));

            prop_assert!(defense.shield >= 0.0 && defense.armor >= 0.0 && defense.hull >= 0.0);
            if report.armor_damage > 0.0 {
                prop_assert_eq!(defense.shield, 0.0);
            }
            if report.hull_damage > 0.0 {
                prop_assert_eq!(defense.shield, 0.0);
                prop_assert_eq!(defense.armor, 0.0);
            }
            if defense.hull < hull {
                prop_assert_eq!(defense.shield, 0.0);
                prop_assert_eq!(defense.armor, 0.0);
            }
        }

        #[test]
        fn prop_resistance_never_immune(resist in 0.9f32..50.0, amount in 1.0f32..100.0) {
            let stats = stats(0.0, 0.0, 1000.0).with(StatKind::ResistThermal, resist);
            let mut defense = Defense::full(&stats);
            resolve_layers(&mut defense, &stats, &DamagePacket::new(amount, DamageType::Thermal));
            let expected = 1000.0 - amount * 0.1 * 1.3;
            prop_assert!((defense.hull - expected).abs() < 1e-2);
        }
    }
}
