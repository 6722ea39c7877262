//! Single-draw roll engine: pity counters, base rates and the 50/50.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{Banner, Catalog, Item, Rarity};
use crate::constants::{
    FIVE_STAR_PITY_CAP, FIVE_STAR_RATE, FOUR_STAR_PITY_CAP, FOUR_STAR_RATE, LOG_TARGET,
    RATE_UP_CHANCE,
};
use crate::pity::PityState;
use crate::rng::{UniformSource, pick_index};

/// Odds and caps for the roll engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RollConfig {
    pub five_star_rate: f64,
    pub four_star_rate: f64,
    pub five_star_cap: u32,
    pub four_star_cap: u32,
    pub rate_up_chance: f64,
    /// A five-star hit also clears the four-star counter.
    pub five_star_resets_four_star: bool,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            five_star_rate: FIVE_STAR_RATE,
            four_star_rate: FOUR_STAR_RATE,
            five_star_cap: FIVE_STAR_PITY_CAP,
            four_star_cap: FOUR_STAR_PITY_CAP,
            rate_up_chance: RATE_UP_CHANCE,
            five_star_resets_four_star: true,
        }
    }
}

impl RollConfig {
    /// Clamp probabilities into `[0, 1]` and caps to at least one draw.
    pub fn sanitize(&mut self) {
        self.five_star_rate = sanitize_probability(self.five_star_rate);
        self.four_star_rate = sanitize_probability(self.four_star_rate);
        self.rate_up_chance = sanitize_probability(self.rate_up_chance);
        self.five_star_cap = self.five_star_cap.max(1);
        self.four_star_cap = self.four_star_cap.max(1);
    }
}

fn sanitize_probability(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Outcome of one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Roll {
    pub item: Item,
    /// Pity state after this draw; feed it to the next one.
    pub state: PityState,
    pub rarity: Rarity,
    /// The draw resolved into the banner's featured pool.
    pub rate_up: bool,
    /// The tier was forced by a pity cap rather than the base rate.
    pub hard_pity: bool,
    /// The requested pool was empty and a fallback item was used.
    pub pool_fallback: bool,
}

/// Item picked for a tier, and whether the pool had to be bypassed.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub item: &'a Item,
    pub fallback: bool,
}

/// Pure draw function over a shared catalog.
#[derive(Debug, Clone)]
pub struct RollEngine {
    catalog: Arc<Catalog>,
    config: RollConfig,
}

impl RollEngine {
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_config(catalog, RollConfig::default())
    }

    #[must_use]
    pub fn with_config(catalog: Arc<Catalog>, mut config: RollConfig) -> Self {
        config.sanitize();
        Self { catalog, config }
    }

    #[must_use]
    pub const fn config(&self) -> &RollConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Perform one draw on `banner` starting from `state`.
    ///
    /// The input state is taken by value and left untouched; the successor
    /// is returned in [`Roll::state`]. Each probability check consumes a
    /// fresh value from `rng`.
    pub fn roll<U: UniformSource + ?Sized>(
        &self,
        banner: &Banner,
        state: PityState,
        rng: &mut U,
    ) -> Roll {
        let cfg = &self.config;
        let mut next = state;
        next.pity5 = next.pity5.saturating_add(1);
        next.pity4 = next.pity4.saturating_add(1);

        let five_hard = next.pity5 >= cfg.five_star_cap;
        let r5 = rng.next_unit();
        let (rarity, rate_up, hard_pity) = if five_hard || r5 < cfg.five_star_rate {
            let rate_up = resolve_rate_up(
                &banner.rate_up5,
                &mut next.guarantee5,
                cfg.rate_up_chance,
                rng,
            );
            next.pity5 = 0;
            if cfg.five_star_resets_four_star {
                next.pity4 = 0;
            }
            (Rarity::Five, rate_up, five_hard)
        } else {
            let four_hard = next.pity4 >= cfg.four_star_cap;
            let r4 = rng.next_unit();
            if four_hard || r4 < cfg.four_star_rate {
                let rate_up = resolve_rate_up(
                    &banner.rate_up4,
                    &mut next.guarantee4,
                    cfg.rate_up_chance,
                    rng,
                );
                next.pity4 = 0;
                (Rarity::Four, rate_up, four_hard)
            } else {
                (Rarity::Three, false, false)
            }
        };

        let selection = self.select_item(rarity, rate_up, banner, rng);
        debug!(
            target: LOG_TARGET,
            "draw {rarity} `{}` rate_up={rate_up} hard_pity={hard_pity} pity5={} pity4={}",
            selection.item.id,
            next.pity5,
            next.pity4
        );

        Roll {
            item: selection.item.clone(),
            state: next,
            rarity,
            rate_up,
            hard_pity,
            pool_fallback: selection.fallback,
        }
    }

    /// Pick uniformly from the pool for `rarity` on `banner`.
    ///
    /// An empty pool is a catalog defect: the first item of the tier (or of
    /// the whole catalog) is returned instead and a warning is logged.
    pub fn select_item<U: UniformSource + ?Sized>(
        &self,
        rarity: Rarity,
        rate_up: bool,
        banner: &Banner,
        rng: &mut U,
    ) -> Selection<'_> {
        let pool = self.catalog.pool(rarity, rate_up, banner);
        if let Some(index) = pick_index(rng, pool.len()) {
            return Selection {
                item: pool[index],
                fallback: false,
            };
        }

        let item = self
            .catalog
            .items_of(rarity)
            .next()
            .unwrap_or_else(|| self.catalog.first_item());
        warn!(
            target: LOG_TARGET,
            "no {rarity} items in pool for banner `{}` (rate_up={rate_up}); falling back to `{}`",
            banner.id,
            item.id
        );
        Selection {
            item,
            fallback: true,
        }
    }
}

/// Settle the 50/50 for a tier, updating its guarantee flag.
///
/// Banners without featured items never resolve as rate-up and leave the
/// guarantee untouched.
fn resolve_rate_up<U: UniformSource + ?Sized>(
    featured: &[String],
    guarantee: &mut bool,
    chance: f64,
    rng: &mut U,
) -> bool {
    if featured.is_empty() {
        return false;
    }
    if *guarantee {
        *guarantee = false;
        return true;
    }
    let won = rng.next_unit() < chance;
    if !won {
        *guarantee = true;
    }
    won
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedSource;

    fn engine() -> RollEngine {
        RollEngine::new(Arc::new(Catalog::builtin().unwrap()))
    }

    fn featured(engine: &RollEngine) -> Banner {
        engine
            .catalog()
            .banner("banner_featured_resonator")
            .unwrap()
            .clone()
    }

    #[test]
    fn three_star_draw_only_increments_counters() {
        let engine = engine();
        let banner = featured(&engine);
        let start = PityState::new(4, 2);
        let mut rng = ScriptedSource::new([0.9, 0.9, 0.0]);
        let roll = engine.roll(&banner, start, &mut rng);

        assert_eq!(roll.rarity, Rarity::Three);
        assert_eq!(roll.item.id, "item_nada");
        assert_eq!(roll.state, PityState::new(5, 3));
        assert_eq!(start, PityState::new(4, 2));
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn hard_pity_ignores_the_rate_roll() {
        let engine = engine();
        let banner = featured(&engine);
        let mut rng = ScriptedSource::new([0.999, 0.1, 0.0]);
        let roll = engine.roll(&banner, PityState::new(79, 7), &mut rng);

        assert_eq!(roll.rarity, Rarity::Five);
        assert!(roll.hard_pity);
        assert!(roll.rate_up);
        assert_eq!(roll.item.id, "resonator_aemeath");
        assert_eq!(roll.state.pity5, 0);
        assert_eq!(roll.state.pity4, 0);
    }

    #[test]
    fn losing_five_star_fifty_fifty_sets_guarantee() {
        let engine = engine();
        let banner = featured(&engine);
        let mut rng = ScriptedSource::new([0.001, 0.7, 0.0]);
        let roll = engine.roll(&banner, PityState::default(), &mut rng);

        assert_eq!(roll.rarity, Rarity::Five);
        assert!(!roll.rate_up);
        assert!(!roll.hard_pity);
        assert_eq!(roll.item.id, "resonator_encore");
        assert!(roll.state.guarantee5);

        let mut rng = ScriptedSource::new([0.001, 0.0]);
        let next = engine.roll(&banner, roll.state, &mut rng);
        assert!(next.rate_up);
        assert_eq!(next.item.id, "resonator_aemeath");
        assert!(!next.state.guarantee5);
        assert_eq!(rng.draws(), 2);
    }

    #[test]
    fn four_star_keeps_five_star_counter() {
        let engine = engine();
        let banner = featured(&engine);
        let mut rng = ScriptedSource::new([0.5, 0.01, 0.2, 0.0]);
        let roll = engine.roll(&banner, PityState::new(30, 3), &mut rng);

        assert_eq!(roll.rarity, Rarity::Four);
        assert!(roll.rate_up);
        assert_eq!(roll.item.id, "resonator_danjin");
        assert_eq!(roll.state.pity5, 31);
        assert_eq!(roll.state.pity4, 0);
    }

    #[test]
    fn four_star_hard_pity_and_lost_fifty_fifty() {
        let engine = engine();
        let banner = featured(&engine);
        let mut rng = ScriptedSource::new([0.5, 0.99, 0.8, 0.0]);
        let roll = engine.roll(&banner, PityState::new(9, 9), &mut rng);

        assert_eq!(roll.rarity, Rarity::Four);
        assert!(roll.hard_pity);
        assert!(!roll.rate_up);
        assert!(roll.state.guarantee4);
        assert_ne!(roll.item.id, "resonator_danjin");
        assert_eq!(roll.state.pity5, 10);
    }

    #[test]
    fn pending_four_star_guarantee_skips_the_fifty_fifty() {
        let engine = engine();
        let banner = featured(&engine);
        let start = PityState::new(3, 3).with_guarantees(false, true);
        let mut rng = ScriptedSource::new([0.5, 0.01, 0.0]);
        let roll = engine.roll(&banner, start, &mut rng);

        assert_eq!(roll.rarity, Rarity::Four);
        assert!(roll.rate_up);
        assert!(!roll.hard_pity);
        assert_eq!(roll.item.id, "resonator_danjin");
        assert!(!roll.state.guarantee4);
        assert_eq!(roll.state.pity4, 0);
        assert_eq!(roll.state.pity5, 4);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn decoupled_config_keeps_four_star_counter_on_five_star() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let config = RollConfig {
            five_star_resets_four_star: false,
            ..RollConfig::default()
        };
        let engine = RollEngine::with_config(catalog, config);
        let banner = featured(&engine);
        let mut rng = ScriptedSource::new([0.0, 0.1, 0.0]);
        let roll = engine.roll(&banner, PityState::new(10, 6), &mut rng);

        assert_eq!(roll.rarity, Rarity::Five);
        assert_eq!(roll.state.pity5, 0);
        assert_eq!(roll.state.pity4, 7);
    }

    #[test]
    fn standard_banner_never_touches_guarantees() {
        let engine = engine();
        let banner = engine
            .catalog()
            .banner("banner_standard_resonator")
            .unwrap()
            .clone();
        let start = PityState::default().with_guarantees(true, true);
        let mut rng = ScriptedSource::new([0.0, 0.5]);
        let roll = engine.roll(&banner, start, &mut rng);

        assert_eq!(roll.rarity, Rarity::Five);
        assert!(!roll.rate_up);
        assert!(roll.state.guarantee5);
        assert_eq!(rng.draws(), 2);
    }

    #[test]
    fn empty_pool_falls_back_to_first_item_of_tier() {
        let catalog = Catalog::from_json(
            r#"{
                "banners": [{ "id": "b", "title": "B", "rateUp4": ["four"] }],
                "items": [
                    { "id": "three", "name": "Three", "rarity": 3, "type": "item" },
                    { "id": "four", "name": "Four", "rarity": 4, "type": "resonator" }
                ]
            }"#,
        )
        .unwrap();
        let engine = RollEngine::new(Arc::new(catalog));
        let banner = engine.catalog().default_banner().clone();

        let mut rng = ScriptedSource::new([0.5, 0.01, 0.9]);
        let roll = engine.roll(&banner, PityState::default(), &mut rng);
        assert_eq!(roll.rarity, Rarity::Four);
        assert!(roll.pool_fallback);
        assert_eq!(roll.item.id, "four");

        let mut rng = ScriptedSource::new([0.0, 0.0]);
        let five = engine.roll(&banner, PityState::default(), &mut rng);
        assert_eq!(five.rarity, Rarity::Five);
        assert!(five.pool_fallback);
        assert_eq!(five.item.id, "three");
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut config = RollConfig {
            five_star_rate: 2.0,
            four_star_rate: f64::NAN,
            five_star_cap: 0,
            four_star_cap: 0,
            rate_up_chance: -1.0,
            five_star_resets_four_star: true,
        };
        config.sanitize();
        assert!((config.five_star_rate - 1.0).abs() < f64::EPSILON);
        assert!(config.four_star_rate.abs() < f64::EPSILON);
        assert_eq!(config.five_star_cap, 1);
        assert_eq!(config.four_star_cap, 1);
        assert!(config.rate_up_chance.abs() < f64::EPSILON);
    }
}
