//! Convene Summon Engine
//!
//! Platform-agnostic core of a banner-based summon ("gacha") system: pity
//! counters, rate-up guarantees, duplicate rewards, a capped crystal wallet
//! and tolerant session persistence. No UI or platform dependencies; hosts
//! supply data loading, storage and randomness through the traits below.

pub mod catalog;
pub mod constants;
pub mod economy;
pub mod persistence;
pub mod pity;
pub mod refill;
pub mod rng;
pub mod roll;
pub mod session;
pub mod wallet;

use std::sync::Arc;

// Re-export commonly used types
pub use catalog::{Banner, Catalog, CatalogDocument, CatalogError, Item, ItemKind, Rarity};
pub use economy::{CurrencyDelta, EconomyResolver, RewardOutcome, RewardTable};
pub use persistence::{
    DecodedSnapshot, FieldRepair, FileStore, KeyValueStore, MemoryStore, PersistenceError,
    RepairReason, SessionSnapshot, SnapshotBounds, load_snapshot, save_snapshot,
};
pub use pity::PityState;
pub use refill::{RefillSchedule, RefillTimer};
pub use rng::{ScriptedSource, SeededSource, UniformSource, pick_index};
pub use roll::{Roll, RollConfig, RollEngine, Selection};
pub use session::{
    SessionConfig, SessionController, SessionError, SessionUpdate, SummonDraw, SummonResponse,
};
pub use wallet::{Inventory, Wallet};

/// Name under which [`DataLoader::load_config`] is asked for session tuning.
pub const SESSION_CONFIG_NAME: &str = "session";

/// Trait for abstracting data loading operations
/// Platform-specific implementations should provide this
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the item and banner catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or fails validation.
    fn load_catalog(&self) -> Result<Catalog, Self::Error>;

    /// Load configuration data for a specific system
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

/// Loader backed by the catalog bundled with this crate and default tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl DataLoader for BuiltinLoader {
    type Error = CatalogError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        Catalog::builtin()
    }

    fn load_config<T>(&self, _config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(serde_json::from_str("{}")?)
    }
}

/// Main engine for opening summon sessions
pub struct ConveneEngine<L, S>
where
    L: DataLoader,
    S: KeyValueStore + Clone,
{
    data_loader: L,
    store: S,
}

impl<L, S> ConveneEngine<L, S>
where
    L: DataLoader,
    S: KeyValueStore + Clone,
{
    /// Create a new engine with the provided data loader and store
    pub const fn new(data_loader: L, store: S) -> Self {
        Self { data_loader, store }
    }

    /// Borrow the backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load and share the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded.
    pub fn load_catalog(&self) -> Result<Arc<Catalog>, L::Error> {
        self.data_loader.load_catalog().map(Arc::new)
    }

    /// Load session tuning.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    pub fn load_config(&self) -> Result<SessionConfig, L::Error> {
        self.data_loader.load_config(SESSION_CONFIG_NAME)
    }

    /// Open a session drawing from `rng`, restoring any stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or configuration cannot be loaded.
    pub fn open_session<R>(&self, rng: R) -> Result<SessionController<S, R>, L::Error>
    where
        R: UniformSource,
    {
        let catalog = self.load_catalog()?;
        let config = self.load_config()?;
        Ok(SessionController::with_config(
            catalog,
            config,
            self.store.clone(),
            rng,
        ))
    }

    /// Open a session over a deterministic stream derived from `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or configuration cannot be loaded.
    pub fn open_seeded(&self, seed: u64) -> Result<SessionController<S, SeededSource>, L::Error> {
        self.open_session(SeededSource::new(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;
    use std::convert::Infallible;

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl DataLoader for FixtureLoader {
        type Error = Infallible;

        fn load_catalog(&self) -> Result<Catalog, Self::Error> {
            Ok(Catalog::builtin().unwrap())
        }

        fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            assert_eq!(config_name, SESSION_CONFIG_NAME);
            Ok(serde_json::from_str(r#"{ "summonCost": 100 }"#).unwrap())
        }
    }

    #[test]
    fn engine_opens_sessions_sharing_one_store() {
        let engine = ConveneEngine::new(FixtureLoader, MemoryStore::new());
        let mut session = engine
            .open_session(ScriptedSource::new([0.9, 0.9, 0.0]))
            .unwrap();
        assert_eq!(session.config().summon_cost, 100);
        session.summon(1).unwrap();
        assert_eq!(session.wallet().crystals(), 13_900);

        let reopened = engine.open_seeded(7).unwrap();
        assert_eq!(reopened.wallet().crystals(), 13_900);
        assert_eq!(reopened.inventory().count("item_nada"), 1);
        assert!(engine.store().raw("gacha_state").is_some());
    }

    #[test]
    fn builtin_loader_uses_default_tuning() {
        let engine = ConveneEngine::new(BuiltinLoader, MemoryStore::new());
        let config = engine.load_config().unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(engine.load_catalog().unwrap().banners().len(), 2);
    }
}
