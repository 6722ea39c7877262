//! Centralized balance and tuning constants for convene logic.
//!
//! These values define the default odds, caps and rewards of the summon
//! engine. Runtime configuration (`SessionConfig`) starts from these and may
//! override them, but the defaults here are the reference economy.

// Logging -------------------------------------------------------------------
pub(crate) const LOG_TARGET: &str = "convene";

// Roll odds -----------------------------------------------------------------
pub const FIVE_STAR_RATE: f64 = 0.008;
pub const FOUR_STAR_RATE: f64 = 0.06;
pub const RATE_UP_CHANCE: f64 = 0.5;

// Pity caps -----------------------------------------------------------------
pub const FIVE_STAR_PITY_CAP: u32 = 80;
pub const FOUR_STAR_PITY_CAP: u32 = 10;

// Wallet --------------------------------------------------------------------
pub const MAX_CRYSTALS: u32 = 14_000;
pub const SUMMON_COST: u32 = 160;

// Reward table --------------------------------------------------------------
pub const FIVE_STAR_AFTERBURN: u32 = 15;
pub const FIVE_STAR_AFTERBURN_MAXED: u32 = 40;
pub const FIVE_STAR_OFF_BANNER_BONUS: u32 = 30;
pub const FOUR_STAR_AFTERBURN: u32 = 3;
pub const FOUR_STAR_AFTERBURN_MAXED: u32 = 8;
pub const THREE_STAR_SCRAP: u32 = 15;
/// Owned counts in `2..=EVOLUTION_MAX_COPIES` yield an evolution item.
pub const EVOLUTION_MAX_COPIES: u32 = 7;

// Refill --------------------------------------------------------------------
pub const REFILL_INTERVAL_SECS: u64 = 10 * 60;
pub const REFILL_GRANT: u32 = 1_600;

// Storage keys --------------------------------------------------------------
pub const SESSION_STORAGE_KEY: &str = "gacha_state";
pub const REFILL_STORAGE_KEY: &str = "astrite_refill";
