//! Catalog and tuning sources for tester runs.
use anyhow::{Context, Result};
use convene_game::{
    Banner, Catalog, CatalogError, ConveneEngine, DataLoader, EconomyResolver, MemoryStore,
    RollEngine, SessionConfig, SessionController, UniformSource,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid `{name}` config: {source}")]
    Config {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a catalog file and sibling `<name>.json` config files.
///
/// Without a catalog path the bundled catalog is used; missing config files
/// fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    catalog_path: Option<PathBuf>,
}

impl FileLoader {
    pub fn new(catalog_path: Option<PathBuf>) -> Self {
        Self { catalog_path }
    }

    fn config_dir(&self) -> Option<&Path> {
        self.catalog_path.as_deref().and_then(Path::parent)
    }
}

impl DataLoader for FileLoader {
    type Error = LoaderError;

    fn load_catalog(&self) -> Result<Catalog, Self::Error> {
        let Some(path) = self.catalog_path.as_ref() else {
            return Ok(Catalog::builtin()?);
        };
        let json = fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Catalog::from_json(&json)?)
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let config_error = |source| LoaderError::Config {
            name: config_name.to_string(),
            source,
        };
        let path = self
            .config_dir()
            .map(|dir| dir.join(format!("{config_name}.json")))
            .filter(|path| path.is_file());
        let Some(path) = path else {
            return serde_json::from_str("{}").map_err(config_error);
        };
        let json = fs::read_to_string(&path).map_err(|source| LoaderError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(config_error)
    }
}

/// Shared, read-only inputs for every scenario and analysis run.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    catalog: Arc<Catalog>,
    config: SessionConfig,
}

impl TesterAssets {
    /// Load from `catalog_path`, or the bundled catalog when absent.
    pub fn load(catalog_path: Option<&Path>) -> Result<Self> {
        let engine = ConveneEngine::new(
            FileLoader::new(catalog_path.map(Path::to_path_buf)),
            MemoryStore::new(),
        );
        let catalog = engine.load_catalog().context("failed to load catalog")?;
        let mut config = engine
            .load_config()
            .context("failed to load session config")?;
        config.sanitize();
        Ok(Self { catalog, config })
    }

    #[cfg(test)]
    pub fn load_default() -> Result<Self> {
        Self::load(None)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn roll_engine(&self) -> RollEngine {
        RollEngine::with_config(Arc::clone(&self.catalog), self.config.roll)
    }

    pub const fn economy(&self) -> EconomyResolver {
        EconomyResolver::new(self.config.rewards)
    }

    /// First banner that features a five-star, falling back to the default.
    pub fn featured_banner(&self) -> &Banner {
        self.catalog
            .banners()
            .iter()
            .find(|banner| !banner.rate_up5.is_empty())
            .unwrap_or_else(|| self.catalog.default_banner())
    }

    pub fn open_session<R: UniformSource>(
        &self,
        store: MemoryStore,
        rng: R,
    ) -> SessionController<MemoryStore, R> {
        SessionController::with_config(Arc::clone(&self.catalog), self.config.clone(), store, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scenario::{ScenarioCtx, get_scenario};

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "convene-assets-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn default_assets_use_bundled_catalog() {
        let assets = TesterAssets::load_default().unwrap();
        assert_eq!(assets.featured_banner().id, "banner_featured_resonator");
        assert_eq!(assets.config(), &SessionConfig::default());
    }

    #[test]
    fn file_loader_reads_catalog_and_sibling_config() {
        let dir = temp_dir("files");
        fs::create_dir_all(&dir).unwrap();
        let catalog_path = dir.join("catalog.json");
        fs::write(
            &catalog_path,
            r#"{
                "banners": [{ "id": "only", "title": "Only" }],
                "items": [{ "id": "x", "name": "X", "rarity": 3, "type": "item" }]
            }"#,
        )
        .unwrap();
        fs::write(dir.join("session.json"), r#"{ "summonCost": 10 }"#).unwrap();

        let assets = TesterAssets::load(Some(&catalog_path)).unwrap();
        assert_eq!(assets.catalog().default_banner().id, "only");
        assert_eq!(assets.config().summon_cost, 10);
        assert_eq!(assets.featured_banner().id, "only");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn zero_caps_are_raised_before_scenarios_read_them() {
        let dir = temp_dir("zero-caps");
        fs::create_dir_all(&dir).unwrap();
        let catalog_path = dir.join("catalog.json");
        fs::write(
            &catalog_path,
            include_str!("../../../convene-game/assets/catalog.json"),
        )
        .unwrap();
        fs::write(
            dir.join("session.json"),
            r#"{ "roll": { "fiveStarCap": 0, "fourStarCap": 0 } }"#,
        )
        .unwrap();

        let assets = TesterAssets::load(Some(&catalog_path)).unwrap();
        assert_eq!(assets.config().roll.five_star_cap, 1);
        assert_eq!(assets.config().roll.four_star_cap, 1);
        assert_eq!(assets.roll_engine().config(), &assets.config().roll);

        let ctx = ScenarioCtx {
            assets: &assets,
            seed: 7,
            verbose: false,
        };
        for key in ["batch-ordering", "persistence-recovery", "guarantee"] {
            let scenario = get_scenario(key).unwrap();
            if let Err(err) = (scenario.check)(&ctx) {
                panic!("{key} failed with zero caps: {err:#}");
            }
        }
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_catalog_file_reports_path() {
        let loader = FileLoader::new(Some(PathBuf::from("/definitely/missing/catalog.json")));
        let err = loader.load_catalog().unwrap_err();
        assert!(err.to_string().contains("catalog.json"));
    }
}
