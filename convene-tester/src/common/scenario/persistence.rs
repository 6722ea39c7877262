use anyhow::{Context, Result, ensure};
use convene_game::{KeyValueStore, MemoryStore, SessionSnapshot, SnapshotBounds};

use super::ScenarioCtx;

const GARBAGE: &[&str] = &["not json at all", "[1, 2, 3]", "null", "\"gacha\"", ""];

/// Every field is wrong in a different way.
const DAMAGED: &str = r#"{
    "crystals": "lots",
    "afterburn": -5,
    "scrap": 12.7,
    "pityState": { "pity5": 999, "pity4": 3, "guarantee5": "yes", "guarantee4": true },
    "inventory": { "item_nada": 2, "ghost": 0 }
}"#;

pub fn recovery(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let config = ctx.assets.config();
    let engine = ctx.assets.roll_engine();
    let caps = engine.config();
    let fresh = SessionSnapshot::fresh(config.max_crystals);

    for blob in GARBAGE {
        let store = MemoryStore::new();
        store.set(&config.storage_key, blob)?;
        let session = ctx.session_over(store);
        ensure!(
            session.snapshot() == fresh,
            "blob {blob:?} did not restore to defaults"
        );
    }

    let bounds = SnapshotBounds {
        max_crystals: config.max_crystals,
        five_star_cap: caps.five_star_cap,
        four_star_cap: caps.four_star_cap,
    };
    let decoded = SessionSnapshot::decode(DAMAGED, bounds).context("damaged blob rejected")?;
    ensure!(
        decoded.repairs.len() >= 5,
        "expected a repair per bad field, got {}",
        decoded.repairs.len()
    );

    let store = MemoryStore::new();
    store.set(&config.storage_key, DAMAGED)?;
    let repaired = ctx.session_over(store).snapshot();
    ensure!(
        repaired.crystals == config.max_crystals,
        "invalid crystals restored as {}",
        repaired.crystals
    );
    ensure!(repaired.afterburn == 0, "negative afterburn kept");
    ensure!(repaired.scrap == 12, "fractional scrap restored as {}", repaired.scrap);
    let pity = repaired.pity_state;
    ensure!(
        pity.pity5 == caps.five_star_cap,
        "pity5 restored as {}",
        pity.pity5
    );
    ensure!(
        pity.pity4 == 3.min(caps.four_star_cap),
        "pity4 restored as {}",
        pity.pity4
    );
    ensure!(!pity.guarantee5 && pity.guarantee4, "guarantee flags restored as {pity:?}");
    ensure!(
        repaired.inventory.count("item_nada") == 2 && !repaired.inventory.contains("ghost"),
        "inventory restored as {:?}",
        repaired.inventory
    );

    // A live session survives a reopen over the same store.
    let store = MemoryStore::new();
    let mut session = ctx.session_over(store.clone());
    let pulls = 1 + u32::try_from(ctx.seed % 10).unwrap_or(0);
    session.summon(pulls)?;
    let saved = session.snapshot();
    drop(session);
    let reopened = ctx.session_over(store);
    ensure!(
        reopened.snapshot() == saved,
        "reopened session differs after {pulls} pulls"
    );
    Ok(())
}
