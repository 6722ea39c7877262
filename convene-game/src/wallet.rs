//! Player currencies and owned item counts.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::economy::CurrencyDelta;

/// Currency balances. Crystals are capped; reward currencies are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    crystals: u32,
    pub afterburn: u32,
    pub scrap: u32,
    max_crystals: u32,
}

impl Wallet {
    #[must_use]
    pub const fn new(max_crystals: u32) -> Self {
        Self {
            crystals: max_crystals,
            afterburn: 0,
            scrap: 0,
            max_crystals,
        }
    }

    #[must_use]
    pub const fn crystals(&self) -> u32 {
        self.crystals
    }

    #[must_use]
    pub const fn max_crystals(&self) -> u32 {
        self.max_crystals
    }

    /// Clamp an arbitrary amount into `[0, max_crystals]`.
    #[must_use]
    pub fn clamp_crystals(&self, amount: i64) -> u32 {
        let clamped = amount.clamp(0, i64::from(self.max_crystals));
        u32::try_from(clamped).unwrap_or(self.max_crystals)
    }

    pub fn set_crystals(&mut self, amount: i64) {
        self.crystals = self.clamp_crystals(amount);
    }

    pub fn add_crystals(&mut self, delta: i64) {
        self.set_crystals(i64::from(self.crystals).saturating_add(delta));
    }

    /// Debit `cost` if the balance covers it.
    ///
    /// Returns `false` and leaves the balance untouched otherwise.
    pub fn try_spend(&mut self, cost: u64) -> bool {
        if u64::from(self.crystals) < cost {
            return false;
        }
        let cost = i64::try_from(cost).unwrap_or(i64::MAX);
        self.add_crystals(-cost);
        true
    }

    pub fn credit(&mut self, delta: CurrencyDelta) {
        self.afterburn = self.afterburn.saturating_add(delta.afterburn);
        self.scrap = self.scrap.saturating_add(delta.scrap);
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new(crate::constants::MAX_CRYSTALS)
    }
}

/// Owned count per item id. Counts only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    counts: BTreeMap<String, u32>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more copy of `item_id`, returning the new count.
    pub fn add(&mut self, item_id: &str) -> u32 {
        let count = self.counts.entry(item_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Owned copies; absent items count as zero.
    #[must_use]
    pub fn count(&self, item_id: &str) -> u32 {
        self.counts.get(item_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn contains(&self, item_id: &str) -> bool {
        self.counts.contains_key(item_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total copies across all items.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().map(|count| u64::from(*count)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(id, count)| (id.as_str(), *count))
    }
}

impl FromIterator<(String, u32)> for Inventory {
    /// Entries with a zero count are dropped.
    fn from_iter<T: IntoIterator<Item = (String, u32)>>(iter: T) -> Self {
        Self {
            counts: iter.into_iter().filter(|(_, count)| *count > 0).collect(),
        }
    }
}
