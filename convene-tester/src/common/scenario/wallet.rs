use anyhow::{Context, Result, ensure};
use convene_game::constants::REFILL_STORAGE_KEY;
use convene_game::{ItemKind, Rarity, SessionError, SummonResponse};
use std::cell::Cell;
use std::rc::Rc;

use super::ScenarioCtx;

/// Base wall-clock for refill checks; the seed shifts it within one day.
const REFILL_EPOCH_MS: u64 = 1_700_000_000_000;
const DAY_MS: u64 = 86_400_000;

pub fn economy_table(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let economy = ctx.assets.economy();
    let table = *economy.table();
    let catalog = ctx.assets.catalog();
    let banner = ctx.featured_banner()?;
    let max = table.evolution_max_copies;

    let featured = banner
        .rate_up5
        .first()
        .and_then(|id| catalog.item(id))
        .context("featured five-star missing from catalog")?;

    let first = economy.resolve(featured, 1, banner);
    ensure!(first.is_new, "first copy not flagged new");
    ensure!(
        first.currency.afterburn == table.five_star_afterburn && !first.evolution_item,
        "first featured five-star paid {:?}",
        first.currency
    );

    if max >= 2 {
        let copies = 2 + u32::try_from(ctx.seed % u64::from(max - 1)).unwrap_or(0);
        let duplicate = economy.resolve(featured, copies, banner);
        ensure!(
            duplicate.evolution_item && !duplicate.is_new,
            "copy {copies} of {max} should evolve"
        );
        ensure!(
            duplicate.currency.afterburn == table.five_star_afterburn,
            "copy {copies} paid {} afterburn",
            duplicate.currency.afterburn
        );
    }

    let maxed_copies = max + 1 + u32::try_from(ctx.seed % 3).unwrap_or(0);
    let maxed = economy.resolve(featured, maxed_copies, banner);
    ensure!(
        maxed.currency.afterburn == table.five_star_afterburn_maxed && !maxed.evolution_item,
        "copy {maxed_copies} paid {:?}",
        maxed.currency
    );

    let off_banner = ctx.off_banner_item(banner, Rarity::Five)?;
    let off = economy.resolve(off_banner, 1, banner);
    let expected = table.five_star_afterburn + table.five_star_off_banner_bonus;
    ensure!(
        off.currency.afterburn == expected,
        "off-banner five-star paid {} instead of {expected}",
        off.currency.afterburn
    );

    if let Some(resonator) = catalog
        .items_of(Rarity::Four)
        .find(|item| item.kind == ItemKind::Resonator)
    {
        let first = economy.resolve(resonator, 1, banner);
        let maxed = economy.resolve(resonator, max + 1, banner);
        ensure!(
            first.currency.afterburn == table.four_star_afterburn,
            "four-star resonator first copy paid {}",
            first.currency.afterburn
        );
        ensure!(
            maxed.currency.afterburn == table.four_star_afterburn_maxed,
            "maxed four-star resonator paid {}",
            maxed.currency.afterburn
        );
    }

    if let Some(weapon) = catalog
        .items_of(Rarity::Four)
        .find(|item| item.kind != ItemKind::Resonator)
    {
        for copies in [1, max, max + 5] {
            let outcome = economy.resolve(weapon, copies, banner);
            ensure!(
                outcome.currency.afterburn == table.four_star_afterburn && !outcome.evolution_item,
                "four-star {} at {copies} copies paid {:?}",
                weapon.id,
                outcome.currency
            );
        }
    }

    if let Some(common) = catalog.items_of(Rarity::Three).next() {
        let copies = 1 + u32::try_from(ctx.seed % 50).unwrap_or(0);
        let outcome = economy.resolve(common, copies, banner);
        ensure!(
            outcome.currency.scrap == table.three_star_scrap && outcome.currency.afterburn == 0,
            "three-star paid {:?}",
            outcome.currency
        );
    }
    Ok(())
}

pub fn crystal_clamp(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut session = ctx.fresh_session();
    let max = session.wallet().max_crystals();

    session.set_crystals(-50);
    ensure!(session.wallet().crystals() == 0, "negative balance not clamped to 0");

    session.set_crystals(999_999);
    ensure!(
        session.wallet().crystals() == max,
        "balance above max not clamped to {max}"
    );

    let spend = i64::from(max) + i64::try_from(ctx.seed % 1_000).unwrap_or(0);
    session.add_crystals(-spend);
    ensure!(session.wallet().crystals() == 0, "overdraw not clamped to 0");

    let half = i64::from(max / 2);
    session.add_crystals(half);
    session.add_crystals(half);
    session.add_crystals(half);
    ensure!(
        session.wallet().crystals() == max,
        "repeated credits exceeded {max}: {}",
        session.wallet().crystals()
    );
    Ok(())
}

pub fn insufficient_funds(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut session = ctx.fresh_session();
    let cost = session.config().summon_cost;
    if cost == 0 {
        return Ok(());
    }
    session.set_crystals(i64::from(cost.saturating_sub(60)));

    let before = session.snapshot();
    let stored = session.store().raw(&session.config().storage_key);
    let notifications = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&notifications);
    session.on_update(move |_| counter.set(counter.get() + 1));

    let result = session.summon(1);
    ensure!(
        matches!(result, Err(SessionError::InsufficientFunds { .. })),
        "summon with {} crystals did not fail",
        before.crystals
    );
    let response = SummonResponse::from(&result);
    ensure!(
        !response.success && response.message.is_some() && response.results.is_none(),
        "failed summon produced {response:?}"
    );
    ensure!(session.snapshot() == before, "refused summon changed state");
    ensure!(notifications.get() == 0, "refused summon notified observer");
    ensure!(
        session.store().raw(&session.config().storage_key) == stored,
        "refused summon wrote to storage"
    );
    Ok(())
}

pub fn refill(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut session = ctx.fresh_session();
    let schedule = session.config().refill;
    let max = session.wallet().max_crystals();
    let interval = schedule.interval_millis();
    let t0 = REFILL_EPOCH_MS + ctx.seed % DAY_MS;

    session.set_crystals(0);
    let timer = session.resume_refill(t0);
    let deadline = timer.deadline_ms();
    ensure!(
        deadline == t0 + interval,
        "fresh timer due at {deadline}, expected {}",
        t0 + interval
    );

    if interval > 0 {
        ensure!(
            session.tick_refill(deadline - 1).is_none(),
            "refill granted before its deadline"
        );
    }
    ensure!(
        session.tick_refill(deadline) == Some(schedule.grant),
        "no refill at the deadline"
    );
    ensure!(
        session.wallet().crystals() == schedule.grant.min(max),
        "refill left balance at {}",
        session.wallet().crystals()
    );

    let next = deadline + interval;
    let stored = session.store().raw(REFILL_STORAGE_KEY);
    ensure!(
        stored.as_deref() == Some(next.to_string().as_str()),
        "stored refill deadline {stored:?}, expected {next}"
    );

    // A late poll grants once, not once per missed interval.
    let late = next + interval * 5;
    ensure!(
        session.tick_refill(late) == Some(schedule.grant),
        "late poll did not grant"
    );
    if interval > 0 {
        ensure!(session.tick_refill(late).is_none(), "late poll granted twice");
    }
    ensure!(
        session.wallet().crystals() == schedule.grant.saturating_mul(2).min(max),
        "two refills left balance at {}",
        session.wallet().crystals()
    );
    Ok(())
}
