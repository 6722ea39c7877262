use anyhow::{Context, Result};
use convene_game::{Banner, Item, MemoryStore, Rarity, SeededSource, SessionController};

use crate::logic::assets::TesterAssets;

pub mod persistence;
pub mod pity;
pub mod smoke;
pub mod wallet;

/// Everything a scenario check may read for one seeded iteration.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioCtx<'a> {
    pub assets: &'a TesterAssets,
    pub seed: u64,
    pub verbose: bool,
}

impl ScenarioCtx<'_> {
    /// Fresh session over an empty in-memory store, drawing from this seed.
    pub fn fresh_session(&self) -> SessionController<MemoryStore, SeededSource> {
        self.session_over(MemoryStore::new())
    }

    pub fn session_over(&self, store: MemoryStore) -> SessionController<MemoryStore, SeededSource> {
        self.assets.open_session(store, SeededSource::new(self.seed))
    }

    pub fn featured_banner(&self) -> Result<&Banner> {
        let banner = self.assets.featured_banner();
        anyhow::ensure!(
            !banner.rate_up5.is_empty(),
            "catalog has no banner featuring a five-star"
        );
        Ok(banner)
    }

    /// A tier item that `banner` does not feature.
    pub fn off_banner_item(&self, banner: &Banner, rarity: Rarity) -> Result<&Item> {
        self.assets
            .catalog()
            .items_of(rarity)
            .find(|item| !banner.is_rate_up(item))
            .with_context(|| format!("banner {} features every {rarity} item", banner.id))
    }
}

pub type ScenarioCheck = fn(&ScenarioCtx<'_>) -> Result<()>;

// Logic test scenario
#[derive(Clone)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub check: ScenarioCheck,
}

const SCENARIOS: &[TestScenario] = &[
    TestScenario {
        key: "smoke",
        name: "Smoke",
        description: "Ten-pull on a fresh session debits, records and notifies once",
        check: smoke::ten_pull,
    },
    TestScenario {
        key: "hard-pity",
        name: "Hard Pity",
        description: "A draw at the five-star cap is always a five-star",
        check: pity::hard_pity,
    },
    TestScenario {
        key: "pity-coupling",
        name: "Pity Coupling",
        description: "Five-star draws reset the five-star (and coupled four-star) counter",
        check: pity::coupling,
    },
    TestScenario {
        key: "four-star-isolation",
        name: "Four-Star Isolation",
        description: "Four-star draws reset only the four-star counter",
        check: pity::four_star_isolation,
    },
    TestScenario {
        key: "guarantee",
        name: "Guarantee",
        description: "A lost 50/50 guarantees the next five-star is featured",
        check: pity::guarantee,
    },
    TestScenario {
        key: "economy-table",
        name: "Economy Table",
        description: "Duplicate tiers and off-banner bonus pay the configured amounts",
        check: wallet::economy_table,
    },
    TestScenario {
        key: "crystal-clamp",
        name: "Crystal Clamp",
        description: "Crystal balance stays within [0, max] on every change",
        check: wallet::crystal_clamp,
    },
    TestScenario {
        key: "insufficient-funds",
        name: "Insufficient Funds",
        description: "An unaffordable summon is refused without side effects",
        check: wallet::insufficient_funds,
    },
    TestScenario {
        key: "batch-ordering",
        name: "Batch Ordering",
        description: "Batch draws thread pity state one draw at a time",
        check: pity::batch_ordering,
    },
    TestScenario {
        key: "persistence-recovery",
        name: "Persistence Recovery",
        description: "Corrupt snapshots recover field by field and sessions survive reopen",
        check: persistence::recovery,
    },
    TestScenario {
        key: "refill",
        name: "Refill",
        description: "The refill timer grants crystals once per elapsed interval",
        check: wallet::refill,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.key, scenario.description))
}

pub fn all_scenario_keys() -> Vec<String> {
    SCENARIOS
        .iter()
        .map(|scenario| scenario.key.to_string())
        .collect()
}

pub fn get_scenario(name: &str) -> Option<&'static TestScenario> {
    let wanted = name.to_lowercase();
    SCENARIOS.iter().find(|scenario| scenario.key == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_passes_on_bundled_catalog() {
        let assets = TesterAssets::load_default().unwrap();
        for seed in [1, 42, 1337] {
            let ctx = ScenarioCtx {
                assets: &assets,
                seed,
                verbose: false,
            };
            for scenario in SCENARIOS {
                if let Err(err) = (scenario.check)(&ctx) {
                    panic!("{} failed for seed {seed}: {err:#}", scenario.key);
                }
            }
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(get_scenario("Hard-Pity").map(|s| s.key), Some("hard-pity"));
        assert!(get_scenario("missing").is_none());
        assert_eq!(all_scenario_keys().len(), list_scenarios().count());
    }
}
