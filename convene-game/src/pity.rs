//! Pity counters and rate-up guarantees shared across banners.
use serde::{Deserialize, Serialize};

/// Draw counters since the last hit of each tier, plus pending guarantees.
///
/// Values are threaded draw-to-draw: the roll engine takes one by value and
/// hands back its successor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PityState {
    pub pity5: u32,
    pub pity4: u32,
    /// Set after losing a five-star 50/50.
    pub guarantee5: bool,
    /// Set after losing a four-star 50/50.
    pub guarantee4: bool,
}

impl PityState {
    #[must_use]
    pub const fn new(pity5: u32, pity4: u32) -> Self {
        Self {
            pity5,
            pity4,
            guarantee5: false,
            guarantee4: false,
        }
    }

    #[must_use]
    pub const fn with_guarantees(mut self, guarantee5: bool, guarantee4: bool) -> Self {
        self.guarantee5 = guarantee5;
        self.guarantee4 = guarantee4;
        self
    }

    /// Draws left before the five-star hard pity fires, counting the next one.
    #[must_use]
    pub const fn draws_to_five_star(&self, cap: u32) -> u32 {
        cap.saturating_sub(self.pity5)
    }

    /// Clamp counters into their at-rest ranges.
    #[must_use]
    pub fn clamped(self, five_star_cap: u32, four_star_cap: u32) -> Self {
        Self {
            pity5: self.pity5.min(five_star_cap),
            pity4: self.pity4.min(four_star_cap),
            ..self
        }
    }
}
