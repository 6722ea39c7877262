//! Session controller owning the wallet, inventory and pity state.
//!
//! Every externally visible mutation follows the same order: apply the change
//! in memory, notify the observer, then persist one snapshot.
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::{Banner, Catalog, CatalogError, Rarity};
use crate::constants::{
    LOG_TARGET, MAX_CRYSTALS, REFILL_STORAGE_KEY, SESSION_STORAGE_KEY, SUMMON_COST,
};
use crate::economy::{EconomyResolver, RewardOutcome, RewardTable};
use crate::persistence::{
    KeyValueStore, PersistenceError, SessionSnapshot, SnapshotBounds, load_snapshot,
    load_timestamp, save_snapshot, save_timestamp,
};
use crate::pity::PityState;
use crate::refill::{RefillSchedule, RefillTimer};
use crate::rng::UniformSource;
use crate::roll::{Roll, RollConfig, RollEngine};
use crate::wallet::{Inventory, Wallet};

/// Upper bound on the draw buffer reserved ahead of a batch.
const PREALLOC_DRAWS: u32 = 1_024;

/// Session tuning. Every field falls back to its default when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub roll: RollConfig,
    pub rewards: RewardTable,
    pub summon_cost: u32,
    pub max_crystals: u32,
    pub storage_key: String,
    pub refill: RefillSchedule,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            roll: RollConfig::default(),
            rewards: RewardTable::default(),
            summon_cost: SUMMON_COST,
            max_crystals: MAX_CRYSTALS,
            storage_key: SESSION_STORAGE_KEY.to_string(),
            refill: RefillSchedule::default(),
        }
    }
}

impl SessionConfig {
    /// Bring the roll tuning into range; sessions only ever see sanitized caps.
    pub fn sanitize(&mut self) {
        self.roll.sanitize();
    }
}

/// Snapshot handed to the observer after each state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub crystals: u32,
    pub afterburn: u32,
    pub scrap: u32,
    pub pity_state: PityState,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not enough crystals: summon costs {cost}, balance is {available}")]
    InsufficientFunds { cost: u64, available: u32 },
    #[error("banner `{0}` not found")]
    BannerNotFound(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One draw of a summon batch with its engine details.
#[derive(Debug, Clone, PartialEq)]
pub struct SummonDraw {
    pub roll: Roll,
    pub outcome: RewardOutcome,
}

/// Serializable view of a summon result for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RewardOutcome>>,
}

impl From<&Result<Vec<RewardOutcome>, SessionError>> for SummonResponse {
    fn from(result: &Result<Vec<RewardOutcome>, SessionError>) -> Self {
        match result {
            Ok(results) => Self {
                success: true,
                message: None,
                results: Some(results.clone()),
            },
            Err(err) => Self {
                success: false,
                message: Some(err.to_string()),
                results: None,
            },
        }
    }
}

type Observer = Box<dyn FnMut(&SessionUpdate)>;

/// Owns one player's session and is the only writer of its state.
pub struct SessionController<S, R>
where
    S: KeyValueStore,
    R: UniformSource,
{
    catalog: Arc<Catalog>,
    engine: RollEngine,
    economy: EconomyResolver,
    config: SessionConfig,
    store: S,
    rng: R,
    wallet: Wallet,
    inventory: Inventory,
    pity: PityState,
    active_banner: String,
    refill: Option<RefillTimer>,
    observer: Option<Observer>,
}

impl<S, R> SessionController<S, R>
where
    S: KeyValueStore,
    R: UniformSource,
{
    /// Open a session with default tuning.
    #[must_use]
    pub fn open(catalog: Arc<Catalog>, store: S, rng: R) -> Self {
        Self::with_config(catalog, SessionConfig::default(), store, rng)
    }

    /// Open a session over the bundled catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Catalog`] if the bundled catalog fails to parse.
    pub fn builtin(store: S, rng: R) -> Result<Self, SessionError> {
        let catalog = Catalog::builtin()?;
        Ok(Self::open(Arc::new(catalog), store, rng))
    }

    /// Open a session, restoring whatever the store holds under the
    /// configured key.
    ///
    /// Unreadable or partially invalid snapshots never fail construction:
    /// bad fields are replaced by defaults and each repair is logged.
    #[must_use]
    pub fn with_config(catalog: Arc<Catalog>, mut config: SessionConfig, store: S, rng: R) -> Self {
        config.sanitize();
        let engine = RollEngine::with_config(Arc::clone(&catalog), config.roll);
        let bounds = SnapshotBounds {
            max_crystals: config.max_crystals,
            five_star_cap: engine.config().five_star_cap,
            four_star_cap: engine.config().four_star_cap,
        };
        let snapshot = restore_snapshot(&store, &config.storage_key, bounds);

        let mut wallet = Wallet::new(config.max_crystals);
        wallet.set_crystals(i64::from(snapshot.crystals));
        wallet.afterburn = snapshot.afterburn;
        wallet.scrap = snapshot.scrap;

        Self {
            active_banner: catalog.default_banner().id.clone(),
            economy: EconomyResolver::new(config.rewards),
            catalog,
            engine,
            config,
            store,
            rng,
            wallet,
            inventory: snapshot.inventory,
            pity: snapshot.pity_state,
            refill: None,
            observer: None,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    #[must_use]
    pub const fn pity(&self) -> PityState {
        self.pity
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn rng(&self) -> &R {
        &self.rng
    }

    /// Currently selected banner.
    #[must_use]
    pub fn active_banner(&self) -> &Banner {
        self.catalog
            .banner(&self.active_banner)
            .unwrap_or_else(|| self.catalog.default_banner())
    }

    #[must_use]
    pub fn update(&self) -> SessionUpdate {
        SessionUpdate {
            crystals: self.wallet.crystals(),
            afterburn: self.wallet.afterburn,
            scrap: self.wallet.scrap,
            pity_state: self.pity,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            crystals: self.wallet.crystals(),
            afterburn: self.wallet.afterburn,
            scrap: self.wallet.scrap,
            pity_state: self.pity,
            inventory: self.inventory.clone(),
        }
    }

    /// Register the observer, replacing any previous one.
    pub fn on_update(&mut self, observer: impl FnMut(&SessionUpdate) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Drop the registered observer, if any.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    /// Set the crystal balance, clamped to `[0, max_crystals]`.
    pub fn set_crystals(&mut self, amount: i64) {
        self.wallet.set_crystals(amount);
        self.commit();
    }

    /// Adjust the crystal balance by `delta`, clamped to `[0, max_crystals]`.
    pub fn add_crystals(&mut self, delta: i64) {
        self.wallet.add_crystals(delta);
        self.commit();
    }

    /// Switch the active banner. Pity is shared across banners and is not
    /// touched; no notification is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::BannerNotFound`] and keeps the previous banner
    /// if `id` is not in the catalog.
    pub fn select_banner(&mut self, id: &str) -> Result<&Banner, SessionError> {
        let Some(banner) = self.catalog.banner(id) else {
            debug!(
                target: LOG_TARGET,
                "unknown banner `{id}`; keeping `{}`",
                self.active_banner
            );
            return Err(SessionError::BannerNotFound(id.to_string()));
        };
        self.active_banner.clone_from(&banner.id);
        debug!(target: LOG_TARGET, "active banner is now `{}`", banner.id);
        Ok(banner)
    }

    /// Pull `count` times on the active banner.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InsufficientFunds`] without touching any state
    /// when the balance does not cover `count * summon_cost`.
    pub fn summon(&mut self, count: u32) -> Result<Vec<RewardOutcome>, SessionError> {
        self.summon_draws(count)
            .map(|draws| draws.into_iter().map(|draw| draw.outcome).collect())
    }

    /// Like [`summon`](Self::summon), but keeps the per-draw engine details.
    ///
    /// Draws run strictly in order: each one starts from the pity state and
    /// inventory left by the previous one. Observer and store see only the
    /// final state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InsufficientFunds`] without touching any state
    /// when the balance does not cover the batch.
    pub fn summon_draws(&mut self, count: u32) -> Result<Vec<SummonDraw>, SessionError> {
        let cost = u64::from(count).saturating_mul(u64::from(self.config.summon_cost));
        if !self.wallet.try_spend(cost) {
            let available = self.wallet.crystals();
            debug!(
                target: LOG_TARGET,
                "summon x{count} refused: cost {cost}, balance {available}"
            );
            return Err(SessionError::InsufficientFunds { cost, available });
        }

        let catalog = Arc::clone(&self.catalog);
        let banner = catalog
            .banner(&self.active_banner)
            .unwrap_or_else(|| catalog.default_banner());
        let mut draws = Vec::with_capacity(draw_reserve(count));
        for _ in 0..count {
            let roll = self.engine.roll(banner, self.pity, &mut self.rng);
            self.pity = roll.state;
            let owned = self.inventory.add(&roll.item.id);
            let outcome = self.economy.resolve(&roll.item, owned, banner);
            self.wallet.credit(outcome.currency);
            draws.push(SummonDraw { roll, outcome });
        }

        let fives = draws
            .iter()
            .filter(|draw| draw.roll.rarity == Rarity::Five)
            .count();
        info!(
            target: LOG_TARGET,
            "summon x{count} on `{}`: {fives} five-star, crystals left {}, pity5={} pity4={}",
            banner.id,
            self.wallet.crystals(),
            self.pity.pity5,
            self.pity.pity4
        );
        self.commit();
        Ok(draws)
    }

    /// Persist the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the store write fails.
    pub fn save(&self) -> Result<(), PersistenceError> {
        save_snapshot(&self.store, &self.config.storage_key, &self.snapshot())
    }

    /// Start or resume the refill countdown from the stored deadline.
    pub fn resume_refill(&mut self, now_ms: u64) -> RefillTimer {
        let stored = load_timestamp(&self.store, REFILL_STORAGE_KEY).unwrap_or_else(|err| {
            warn!(target: LOG_TARGET, "could not read refill deadline: {err}");
            None
        });
        let timer = RefillTimer::resume(self.config.refill, stored, now_ms);
        self.refill = Some(timer);
        self.persist_refill(timer);
        timer
    }

    /// Advance the refill countdown.
    ///
    /// Returns the configured grant when one was due. The grant goes through
    /// [`add_crystals`](Self::add_crystals), so it is clamped, notified and
    /// persisted like any other change.
    pub fn tick_refill(&mut self, now_ms: u64) -> Option<u32> {
        let mut timer = match self.refill {
            Some(timer) => timer,
            None => self.resume_refill(now_ms),
        };
        let due = timer.poll(now_ms);
        self.refill = Some(timer);
        if !due {
            return None;
        }
        self.persist_refill(timer);
        let grant = timer.schedule().grant;
        debug!(target: LOG_TARGET, "refill granted {grant} crystals");
        self.add_crystals(i64::from(grant));
        Some(grant)
    }

    /// Active refill countdown, if one was started.
    #[must_use]
    pub const fn refill(&self) -> Option<RefillTimer> {
        self.refill
    }

    fn persist_refill(&self, timer: RefillTimer) {
        if let Err(err) = save_timestamp(&self.store, REFILL_STORAGE_KEY, timer.deadline_ms()) {
            warn!(target: LOG_TARGET, "could not store refill deadline: {err}");
        }
    }

    fn commit(&mut self) {
        let update = self.update();
        if let Some(observer) = self.observer.as_mut() {
            observer(&update);
        }
        if let Err(err) = self.save() {
            warn!(target: LOG_TARGET, "could not persist session: {err}");
        }
    }
}

impl<S, R> fmt::Debug for SessionController<S, R>
where
    S: KeyValueStore + fmt::Debug,
    R: UniformSource + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("rng", &self.rng)
            .field("wallet", &self.wallet)
            .field("inventory", &self.inventory)
            .field("pity", &self.pity)
            .field("active_banner", &self.active_banner)
            .field("refill", &self.refill)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

fn restore_snapshot<S: KeyValueStore>(
    store: &S,
    key: &str,
    bounds: SnapshotBounds,
) -> SessionSnapshot {
    match load_snapshot(store, key, bounds) {
        Ok(Some(decoded)) => {
            for repair in &decoded.repairs {
                warn!(target: LOG_TARGET, "stored session field repaired: {repair}");
            }
            decoded.snapshot
        }
        Ok(None) => SessionSnapshot::fresh(bounds.max_crystals),
        Err(err) => {
            warn!(target: LOG_TARGET, "stored session unreadable, starting fresh: {err}");
            SessionSnapshot::fresh(bounds.max_crystals)
        }
    }
}

fn draw_reserve(count: u32) -> usize {
    usize::try_from(count.min(PREALLOC_DRAWS)).unwrap_or_default()
}
