//! Static catalog of summonable items and banners.
//!
//! The catalog is loaded once and never mutated afterwards. Sessions share it
//! behind an `Arc`.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");

/// Star tier of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rarity {
    Three,
    Four,
    Five,
}

impl Rarity {
    pub const ALL: [Self; 3] = [Self::Three, Self::Four, Self::Five];

    #[must_use]
    pub const fn stars(self) -> u8 {
        match self {
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
        }
    }
}

impl TryFrom<u8> for Rarity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            5 => Ok(Self::Five),
            other => Err(format!("rarity must be 3, 4 or 5 (got {other})")),
        }
    }
}

impl From<Rarity> for u8 {
    fn from(rarity: Rarity) -> Self {
        rarity.stars()
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}★", self.stars())
    }
}

/// What an item is, which drives the four-star reward rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Resonator,
    Weapon,
    Item,
}

/// A summonable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// Opaque asset reference, passed through to presentation untouched.
    #[serde(default, alias = "image")]
    pub image_ref: String,
}

/// A summon banner and its featured (rate-up) items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "image")]
    pub image_ref: String,
    #[serde(default, alias = "type")]
    pub category: String,
    #[serde(default)]
    pub rate_up5: Vec<String>,
    #[serde(default)]
    pub rate_up4: Vec<String>,
}

impl Banner {
    /// Featured ids for a tier. Three-star has no rate-up concept.
    #[must_use]
    pub fn rate_up(&self, rarity: Rarity) -> &[String] {
        match rarity {
            Rarity::Five => &self.rate_up5,
            Rarity::Four => &self.rate_up4,
            Rarity::Three => &[],
        }
    }

    #[must_use]
    pub fn is_rate_up(&self, item: &Item) -> bool {
        self.rate_up(item.rarity).iter().any(|id| *id == item.id)
    }
}

/// Structural problems found while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog defines no items")]
    NoItems,
    #[error("catalog defines no banners")]
    NoBanners,
    #[error("duplicate item id `{0}`")]
    DuplicateItem(String),
    #[error("duplicate banner id `{0}`")]
    DuplicateBanner(String),
    #[error("banner `{banner}` features unknown item `{item}`")]
    UnknownRateUp { banner: String, item: String },
    #[error("banner `{banner}` lists `{item}` as a {expected} rate-up but it is {actual}")]
    RateUpRarity {
        banner: String,
        item: String,
        expected: Rarity,
        actual: Rarity,
    },
}

/// Raw catalog document as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub banners: Vec<Banner>,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Validated container for all banners and items.
///
/// Only constructible through validation, so it always holds at least one
/// item and one banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDocument", into = "CatalogDocument")]
pub struct Catalog {
    banners: Vec<Banner>,
    items: Vec<Item>,
}

impl TryFrom<CatalogDocument> for Catalog {
    type Error = CatalogError;

    fn try_from(document: CatalogDocument) -> Result<Self, Self::Error> {
        Self::from_parts(document.banners, document.items)
    }
}

impl From<Catalog> for CatalogDocument {
    fn from(catalog: Catalog) -> Self {
        Self {
            banners: catalog.banners,
            items: catalog.items,
        }
    }
}

impl Catalog {
    /// Load and validate a catalog from its JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or the catalog is
    /// structurally invalid.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::try_from(document)
    }

    /// Build a catalog from already-parsed parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the parts do not form a valid catalog.
    pub fn from_parts(banners: Vec<Banner>, items: Vec<Item>) -> Result<Self, CatalogError> {
        let catalog = Self { banners, items };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled asset is broken.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Check ids and rate-up references.
    ///
    /// Empty rarity pools are allowed here; selection recovers from them.
    fn validate(&self) -> Result<(), CatalogError> {
        if self.items.is_empty() {
            return Err(CatalogError::NoItems);
        }
        if self.banners.is_empty() {
            return Err(CatalogError::NoBanners);
        }

        let mut item_ids = HashSet::new();
        for item in &self.items {
            if !item_ids.insert(item.id.as_str()) {
                return Err(CatalogError::DuplicateItem(item.id.clone()));
            }
        }

        let mut banner_ids = HashSet::new();
        for banner in &self.banners {
            if !banner_ids.insert(banner.id.as_str()) {
                return Err(CatalogError::DuplicateBanner(banner.id.clone()));
            }
            for expected in [Rarity::Five, Rarity::Four] {
                for id in banner.rate_up(expected) {
                    let item = self.item(id).ok_or_else(|| CatalogError::UnknownRateUp {
                        banner: banner.id.clone(),
                        item: id.clone(),
                    })?;
                    if item.rarity != expected {
                        return Err(CatalogError::RateUpRarity {
                            banner: banner.id.clone(),
                            item: id.clone(),
                            expected,
                            actual: item.rarity,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Last-resort item for misconfigured pools.
    #[must_use]
    pub fn first_item(&self) -> &Item {
        // Validation rejects catalogs without items.
        &self.items[0]
    }

    #[must_use]
    pub fn banner(&self, id: &str) -> Option<&Banner> {
        self.banners.iter().find(|banner| banner.id == id)
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// First banner in catalog order; the session's initial selection.
    #[must_use]
    pub fn default_banner(&self) -> &Banner {
        &self.banners[0]
    }

    pub fn items_of(&self, rarity: Rarity) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |item| item.rarity == rarity)
    }

    /// Selection pool for a tier on a banner.
    ///
    /// Rate-up picks draw only from the featured ids; everything else draws
    /// from the tier with featured ids excluded.
    #[must_use]
    pub fn pool(&self, rarity: Rarity, rate_up: bool, banner: &Banner) -> Vec<&Item> {
        let featured = banner.rate_up(rarity);
        if rate_up && !featured.is_empty() {
            return self
                .items
                .iter()
                .filter(|item| featured.iter().any(|id| *id == item.id))
                .collect();
        }
        self.items_of(rarity)
            .filter(|item| !featured.iter().any(|id| *id == item.id))
            .collect()
    }
}
