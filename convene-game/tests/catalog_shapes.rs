use convene_game::{Catalog, CatalogError, ItemKind, Rarity};
use std::collections::HashSet;

#[test]
fn bundled_catalog_has_non_empty_pools_on_every_banner() {
    let catalog = Catalog::builtin().expect("bundled catalog parses");
    for banner in catalog.banners() {
        for rarity in Rarity::ALL {
            assert!(
                !catalog.pool(rarity, false, banner).is_empty(),
                "{} has no off-banner {rarity} pool",
                banner.id
            );
            if !banner.rate_up(rarity).is_empty() {
                assert!(!catalog.pool(rarity, true, banner).is_empty());
            }
        }
    }
}

#[test]
fn bundled_catalog_features_valid_items() {
    let catalog = Catalog::builtin().unwrap();
    let ids: HashSet<&str> = catalog.items().iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids.len(), catalog.items().len());

    let featured = catalog.default_banner();
    assert_eq!(featured.rate_up5, vec!["resonator_aemeath".to_string()]);
    assert_eq!(featured.rate_up4, vec!["resonator_danjin".to_string()]);
    for id in featured.rate_up5.iter().chain(&featured.rate_up4) {
        let item = catalog.item(id).unwrap();
        assert_eq!(item.kind, ItemKind::Resonator);
        assert!(featured.is_rate_up(item));
    }
    assert!(
        catalog
            .items_of(Rarity::Four)
            .any(|item| item.kind == ItemKind::Weapon)
    );
}

#[test]
fn catalog_serializes_back_to_its_document_shape() {
    let catalog = Catalog::builtin().unwrap();
    let json = serde_json::to_value(&catalog).unwrap();
    assert!(json["banners"][0]["rateUp5"].is_array());
    assert_eq!(json["items"][0]["type"], "resonator");
    assert_eq!(json["items"][0]["rarity"], 5);

    let reparsed: Catalog = serde_json::from_value(json).unwrap();
    assert_eq!(reparsed, catalog);
}

#[test]
fn structural_defects_are_rejected() {
    let unknown = r#"{
        "banners": [{ "id": "b", "title": "B", "rateUp5": ["ghost"] }],
        "items": [{ "id": "x", "name": "X", "rarity": 5, "type": "resonator" }]
    }"#;
    assert!(matches!(
        Catalog::from_json(unknown),
        Err(CatalogError::UnknownRateUp { .. })
    ));

    let wrong_tier = r#"{
        "banners": [{ "id": "b", "title": "B", "rateUp4": ["x"] }],
        "items": [{ "id": "x", "name": "X", "rarity": 5, "type": "resonator" }]
    }"#;
    assert!(matches!(
        Catalog::from_json(wrong_tier),
        Err(CatalogError::RateUpRarity {
            expected: Rarity::Four,
            actual: Rarity::Five,
            ..
        })
    ));

    let bad_rarity = r#"{
        "banners": [{ "id": "b", "title": "B" }],
        "items": [{ "id": "x", "name": "X", "rarity": 6, "type": "item" }]
    }"#;
    assert!(matches!(
        Catalog::from_json(bad_rarity),
        Err(CatalogError::Parse(_))
    ));

    assert!(matches!(
        Catalog::from_json(r#"{ "banners": [], "items": [] }"#),
        Err(CatalogError::NoItems)
    ));
}
