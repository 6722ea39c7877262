//! Reward resolution for obtained items.
//!
//! Duplicate tiers are keyed on how many copies the player owns once the
//! current draw is counted.
use serde::{Deserialize, Serialize};

use crate::catalog::{Banner, Item, ItemKind, Rarity};
use crate::constants::{
    EVOLUTION_MAX_COPIES, FIVE_STAR_AFTERBURN, FIVE_STAR_AFTERBURN_MAXED,
    FIVE_STAR_OFF_BANNER_BONUS, FOUR_STAR_AFTERBURN, FOUR_STAR_AFTERBURN_MAXED, THREE_STAR_SCRAP,
};

/// Currency granted by a single draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDelta {
    pub afterburn: u32,
    pub scrap: u32,
}

impl CurrencyDelta {
    #[must_use]
    pub const fn afterburn(amount: u32) -> Self {
        Self {
            afterburn: amount,
            scrap: 0,
        }
    }

    #[must_use]
    pub const fn scrap(amount: u32) -> Self {
        Self {
            afterburn: 0,
            scrap: amount,
        }
    }
}

/// Per-draw result handed to presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardOutcome {
    pub item: Item,
    pub is_new: bool,
    /// Copy 2 through 7 also yields an upgrade material.
    pub evolution_item: bool,
    #[serde(rename = "currencyDelta")]
    pub currency: CurrencyDelta,
}

/// Reward amounts per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewardTable {
    pub five_star_afterburn: u32,
    pub five_star_afterburn_maxed: u32,
    pub five_star_off_banner_bonus: u32,
    pub four_star_afterburn: u32,
    pub four_star_afterburn_maxed: u32,
    pub three_star_scrap: u32,
    pub evolution_max_copies: u32,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            five_star_afterburn: FIVE_STAR_AFTERBURN,
            five_star_afterburn_maxed: FIVE_STAR_AFTERBURN_MAXED,
            five_star_off_banner_bonus: FIVE_STAR_OFF_BANNER_BONUS,
            four_star_afterburn: FOUR_STAR_AFTERBURN,
            four_star_afterburn_maxed: FOUR_STAR_AFTERBURN_MAXED,
            three_star_scrap: THREE_STAR_SCRAP,
            evolution_max_copies: EVOLUTION_MAX_COPIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyTier {
    First,
    Duplicate,
    Maxed,
}

impl CopyTier {
    const fn of(owned: u32, evolution_max_copies: u32) -> Self {
        if owned <= 1 {
            Self::First
        } else if owned <= evolution_max_copies {
            Self::Duplicate
        } else {
            Self::Maxed
        }
    }
}

/// Pure reward function over a [`RewardTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EconomyResolver {
    table: RewardTable,
}

impl EconomyResolver {
    #[must_use]
    pub const fn new(table: RewardTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub const fn table(&self) -> &RewardTable {
        &self.table
    }

    /// Resolve the rewards for `item`, given the owned count including this
    /// draw. Counts below one are treated as a first copy.
    #[must_use]
    pub fn resolve(&self, item: &Item, owned_after_draw: u32, banner: &Banner) -> RewardOutcome {
        let table = &self.table;
        let owned = owned_after_draw.max(1);
        let tier = CopyTier::of(owned, table.evolution_max_copies);

        let (currency, evolution_item) = match item.rarity {
            Rarity::Five => {
                let base = match tier {
                    CopyTier::First | CopyTier::Duplicate => table.five_star_afterburn,
                    CopyTier::Maxed => table.five_star_afterburn_maxed,
                };
                let bonus = if banner.is_rate_up(item) {
                    0
                } else {
                    table.five_star_off_banner_bonus
                };
                (
                    CurrencyDelta::afterburn(base.saturating_add(bonus)),
                    tier == CopyTier::Duplicate,
                )
            }
            Rarity::Four if item.kind == ItemKind::Resonator => {
                let amount = match tier {
                    CopyTier::First | CopyTier::Duplicate => table.four_star_afterburn,
                    CopyTier::Maxed => table.four_star_afterburn_maxed,
                };
                (
                    CurrencyDelta::afterburn(amount),
                    tier == CopyTier::Duplicate,
                )
            }
            Rarity::Four => (CurrencyDelta::afterburn(table.four_star_afterburn), false),
            Rarity::Three => (CurrencyDelta::scrap(table.three_star_scrap), false),
        };

        RewardOutcome {
            item: item.clone(),
            is_new: owned == 1,
            evolution_item,
            currency,
        }
    }
}
