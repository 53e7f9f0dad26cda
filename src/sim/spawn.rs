//! Budget-based spawn director
//!
//! Budget accrues continuously at the current bracket's rate (scaled by the
//! count multiplier). Each spawn interval, affordable archetypes from the
//! bracket's pool are picked at random until the budget runs dry or the
//! population cap is hit. Every `boss_interval` waves one boss is forced in,
//! once per wave, regardless of budget. The boss is owed from the moment its
//! wave begins, so a wave cleared between spawn intervals still gets one.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::state::BudgetState;
use crate::settings::Settings;
use crate::tuning::{Multipliers, Tier, Tuning};

/// One enemy to instantiate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    /// Index into `Tuning::archetypes`
    pub archetype: usize,
    pub scale: Multipliers,
    /// Forced boss spawn (ignores budget)
    pub forced_boss: bool,
}

/// Wave progression and spawn budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnDirector {
    /// Current wave (1-based, monotonic)
    pub wave: u32,
    pub kills_this_wave: u32,
    pub budget: f32,
    /// Seconds since the last spawn attempt
    pub spawn_timer: f32,
    /// Seconds since the run started
    pub elapsed: f32,
    pub boss_spawned_this_wave: bool,
    /// Latest boss wave whose boss has been queued
    #[serde(default)]
    pub last_boss_wave: u32,
}

impl Default for SpawnDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl SpawnDirector {
    pub fn new() -> Self {
        Self {
            wave: 1,
            kills_this_wave: 0,
            budget: 0.0,
            spawn_timer: 0.0,
            elapsed: 0.0,
            boss_spawned_this_wave: false,
            last_boss_wave: 0,
        }
    }

    /// Difficulty multipliers for the current wave and time
    pub fn multipliers(&self, tuning: &Tuning) -> Multipliers {
        tuning.difficulty.at(self.wave, self.elapsed)
    }

    /// Effective population cap: the wave's soft cap, never above the hard cap
    pub fn population_cap(&self, tuning: &Tuning, settings: &Settings) -> usize {
        tuning.waves.soft_cap(self.wave).min(settings.population_cap)
    }

    pub fn kill_quota(&self, tuning: &Tuning) -> u32 {
        tuning.waves.kill_quota(self.wave)
    }

    fn budget_rate(&self, tuning: &Tuning) -> f32 {
        let bracket = tuning.bracket_for_wave(self.wave);
        let base = tuning
            .brackets
            .get(bracket)
            .map(|b| b.budget_per_second)
            .unwrap_or(0.0);
        base * self.multipliers(tuning).count
    }

    /// Latest boss wave at or below the current wave, if any
    fn latest_boss_wave(&self, settings: &Settings) -> Option<u32> {
        if settings.boss_interval == 0 {
            return None;
        }
        let latest = self.wave - self.wave % settings.boss_interval;
        (latest > 0).then_some(latest)
    }

    /// Queue the owed boss, if one is owed and the hard cap has room
    fn force_boss<R: Rng>(
        &mut self,
        population: usize,
        tuning: &Tuning,
        settings: &Settings,
        rng: &mut R,
    ) -> Option<SpawnRequest> {
        let latest = self.latest_boss_wave(settings)?;
        let already = latest <= self.last_boss_wave
            || (latest == self.wave && self.boss_spawned_this_wave);
        if already || population >= settings.population_cap {
            return None;
        }

        let Some(&archetype) = tuning.bosses().choose(rng) else {
            log::warn!("wave {} wants a boss but none are defined", latest);
            self.last_boss_wave = latest;
            return None;
        };
        if latest != self.wave {
            log::info!("boss for wave {} arrives late on wave {}", latest, self.wave);
        }
        self.last_boss_wave = latest;
        self.boss_spawned_this_wave = latest == self.wave;
        Some(SpawnRequest {
            archetype,
            scale: self.multipliers(tuning),
            forced_boss: true,
        })
    }

    /// Accrue budget and, when the spawn interval elapses, spend it.
    /// An owed boss is queued right away.
    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        population: usize,
        tuning: &Tuning,
        settings: &Settings,
        rng: &mut R,
    ) -> Vec<SpawnRequest> {
        let dt = dt.max(0.0);
        self.elapsed += dt;
        let rate = self.budget_rate(tuning);
        let bank_cap = rate * tuning.waves.max_banked_seconds;
        self.budget = (self.budget + rate * dt).min(bank_cap.max(0.0)).max(0.0);

        let mut requests: Vec<SpawnRequest> =
            self.force_boss(population, tuning, settings, rng).into_iter().collect();

        self.spawn_timer += dt;
        if self.spawn_timer < settings.spawn_interval {
            return requests;
        }
        self.spawn_timer = 0.0;
        let population = population + requests.len();
        requests.extend(self.trigger_wave_spawns(population, tuning, settings, rng));
        requests
    }

    /// Spend the budget on the current bracket's pool, plus any forced boss
    pub fn trigger_wave_spawns<R: Rng>(
        &mut self,
        population: usize,
        tuning: &Tuning,
        settings: &Settings,
        rng: &mut R,
    ) -> Vec<SpawnRequest> {
        let scale = self.multipliers(tuning);
        let mut requests = Vec::new();
        let mut population = population;

        if let Some(boss) = self.force_boss(population, tuning, settings, rng) {
            requests.push(boss);
            population += 1;
        }

        let cap = self.population_cap(tuning, settings);
        let bracket = tuning.bracket_for_wave(self.wave);
        let pool: Vec<usize> = tuning
            .brackets
            .get(bracket)
            .map(|b| {
                b.pool
                    .iter()
                    .filter_map(|name| tuning.archetype_index(name))
                    .filter(|&i| tuning.archetypes[i].tier != Tier::Boss)
                    .collect()
            })
            .unwrap_or_default();
        if pool.is_empty() {
            log::warn!("spawn bracket {} has no usable archetypes", bracket);
            return requests;
        }

        while population < cap {
            let affordable: Vec<usize> = pool
                .iter()
                .copied()
                .filter(|&i| tuning.archetypes[i].spawn_cost <= self.budget)
                .collect();
            let Ok(&archetype) =
                affordable.choose_weighted(rng, |&i| tuning.archetypes[i].weight.max(0.0))
            else {
                break;
            };
            self.budget -= tuning.archetypes[archetype].spawn_cost;
            requests.push(SpawnRequest {
                archetype,
                scale,
                forced_boss: false,
            });
            population += 1;
        }
        self.budget = self.budget.max(0.0);

        if !requests.is_empty() {
            log::debug!(
                "wave {}: spawning {} (budget left {:.1}, population {})",
                self.wave,
                requests.len(),
                self.budget,
                population
            );
        }
        requests
    }

    /// Count a kill. Returns the new wave number if the quota was met.
    pub fn record_kill(&mut self, tuning: &Tuning) -> Option<u32> {
        self.kills_this_wave += 1;
        if self.kills_this_wave < self.kill_quota(tuning) {
            return None;
        }
        self.wave += 1;
        self.kills_this_wave = 0;
        self.boss_spawned_this_wave = false;
        log::info!("wave {} begins", self.wave);
        Some(self.wave)
    }

    /// HUD view of the director
    pub fn budget_state(&self, tuning: &Tuning, settings: &Settings, population: usize) -> BudgetState {
        BudgetState {
            wave: self.wave,
            budget: self.budget,
            kills_this_wave: self.kills_this_wave,
            kill_quota: self.kill_quota(tuning),
            population,
            population_cap: self.population_cap(tuning, settings),
            multipliers: self.multipliers(tuning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (Tuning, Settings, Pcg32) {
        (Tuning::default(), Settings::default(), Pcg32::seed_from_u64(7))
    }

    #[test]
    fn test_budget_accrues_between_intervals() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        let spawned = director.update(0.5, 0, &tuning, &settings, &mut rng);
        assert!(spawned.is_empty());
        // Wave 1: 3.0/s scaled by the eased count multiplier (0.6)
        assert!((director.budget - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_spends_until_budget_exhausted() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        director.budget = 7.5;
        let requests = director.trigger_wave_spawns(0, &tuning, &settings, &mut rng);
        assert!(!requests.is_empty());
        let cheapest = tuning.archetypes[tuning.archetype_index("drone").expect("drone")].spawn_cost;
        assert!(director.budget >= 0.0);
        assert!(director.budget < cheapest);
        let spent: f32 = requests
            .iter()
            .map(|r| tuning.archetypes[r.archetype].spawn_cost)
            .sum();
        assert!((spent + director.budget - 7.5).abs() < 1e-4);
    }

    #[test]
    fn test_population_cap_stops_spawning() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        director.budget = 1000.0;
        let cap = director.population_cap(&tuning, &settings);
        let requests = director.trigger_wave_spawns(cap - 2, &tuning, &settings, &mut rng);
        assert_eq!(requests.len(), 2);
        // Budget is not refunded
        assert!(director.budget < 1000.0);
    }

    #[test]
    fn test_boss_forced_once_per_wave() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        director.wave = 10;

        let first = director.trigger_wave_spawns(0, &tuning, &settings, &mut rng);
        let second = director.trigger_wave_spawns(0, &tuning, &settings, &mut rng);

        let bosses_first = first.iter().filter(|r| r.forced_boss).count();
        let bosses_second = second.iter().filter(|r| r.forced_boss).count();
        assert_eq!(bosses_first, 1);
        assert_eq!(bosses_second, 0);
        assert!(director.boss_spawned_this_wave);
        let boss = &tuning.archetypes[first[0].archetype];
        assert_eq!(boss.tier, Tier::Boss);
    }

    #[test]
    fn test_boss_forced_when_wave_clears_between_intervals() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        director.wave = 4;

        let mut bosses = 0;
        let mut saw_boss_wave = false;
        while director.wave < 6 {
            saw_boss_wave |= director.wave == 5;
            let requests = director.update(0.1, 0, &tuning, &settings, &mut rng);
            bosses += requests.iter().filter(|r| r.forced_boss).count();
            for _ in 0..4 {
                director.record_kill(&tuning);
            }
        }
        assert!(saw_boss_wave);
        assert_eq!(bosses, 1);
        assert_eq!(director.last_boss_wave, 5);
    }

    #[test]
    fn test_skipped_boss_wave_still_gets_its_boss() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        // Wave 5 started and ended inside one collision pass
        director.wave = 6;
        let first = director.update(0.01, 0, &tuning, &settings, &mut rng);
        let second = director.update(0.01, 0, &tuning, &settings, &mut rng);
        assert_eq!(first.iter().filter(|r| r.forced_boss).count(), 1);
        assert!(second.iter().all(|r| !r.forced_boss));
        assert!(!director.boss_spawned_this_wave);
    }

    #[test]
    fn test_no_boss_off_interval() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        director.wave = 7;
        director.last_boss_wave = 5;
        director.budget = 100.0;
        let requests = director.trigger_wave_spawns(0, &tuning, &settings, &mut rng);
        assert!(requests.iter().all(|r| !r.forced_boss));
        assert!(requests.iter().all(|r| tuning.archetypes[r.archetype].tier != Tier::Boss));
    }

    #[test]
    fn test_wave_advances_on_quota() {
        let (tuning, _, _) = setup();
        let mut director = SpawnDirector::new();
        director.boss_spawned_this_wave = true;
        let quota = director.kill_quota(&tuning);
        for _ in 0..quota - 1 {
            assert_eq!(director.record_kill(&tuning), None);
        }
        assert_eq!(director.record_kill(&tuning), Some(2));
        assert_eq!(director.kills_this_wave, 0);
        assert!(!director.boss_spawned_this_wave);
    }

    #[test]
    fn test_banked_budget_is_capped() {
        let (tuning, settings, mut rng) = setup();
        let mut director = SpawnDirector::new();
        let cap = director.population_cap(&tuning, &settings);
        for _ in 0..10_000 {
            director.update(0.1, cap, &tuning, &settings, &mut rng);
        }
        let rate = director.budget_rate(&tuning);
        assert!(director.budget <= rate * tuning.waves.max_banked_seconds + 1e-3);
    }

    proptest! {
        #[test]
        fn prop_budget_and_population_bounded(
            seed in any::<u64>(),
            wave in 1u32..40,
            budget in 0.0f32..500.0,
            population in 0usize..150,
            hard_cap in 1usize..150,
        ) {
            let tuning = Tuning::default();
            let settings = Settings { population_cap: hard_cap, ..Settings::default() };
            let mut rng = Pcg32::seed_from_u64(seed);
            let mut director = SpawnDirector { wave, budget, ..SpawnDirector::new() };

            let requests = director.trigger_wave_spawns(population, &tuning, &settings, &mut rng);
            prop_assert!(director.budget >= 0.0);
            if population >= hard_cap {
                prop_assert!(requests.is_empty());
            } else {
                prop_assert!(population + requests.len() <= hard_cap);
            }
        }
    }
}
