use anyhow::{Context, Result, ensure};
use convene_game::{
    MemoryStore, PityState, Rarity, ScriptedSource, SeededSource, SessionSnapshot, save_snapshot,
};

use super::ScenarioCtx;

/// Draws per seed for the counter-tracking checks; well past one five-star cap.
const TRACKED_DRAWS: usize = 2_000;

pub fn hard_pity(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let engine = ctx.assets.roll_engine();
    let cap = engine.config().five_star_cap;
    let banner = ctx.featured_banner()?;
    let mut rng = SeededSource::new(ctx.seed);

    let start =
        PityState::new(cap.saturating_sub(1), 0).with_guarantees(ctx.seed % 2 == 0, false);
    let roll = engine.roll(banner, start, &mut rng);
    ensure!(
        roll.rarity == Rarity::Five,
        "draw {cap} came out {} instead of five-star",
        roll.rarity
    );
    ensure!(roll.hard_pity, "draw {cap} was not flagged as hard pity");
    ensure!(roll.state.pity5 == 0, "five-star counter not reset");
    Ok(())
}

pub fn coupling(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let engine = ctx.assets.roll_engine();
    let coupled = engine.config().five_star_resets_four_star;
    let banner = ctx.featured_banner()?;
    let mut rng = SeededSource::new(ctx.seed);
    let mut state = PityState::default();
    let mut fives = 0usize;

    for draw in 1..=TRACKED_DRAWS {
        let roll = engine.roll(banner, state, &mut rng);
        if roll.rarity == Rarity::Five {
            fives += 1;
            ensure!(
                roll.state.pity5 == 0,
                "draw {draw}: five-star left pity5 at {}",
                roll.state.pity5
            );
            if coupled {
                ensure!(
                    roll.state.pity4 == 0,
                    "draw {draw}: five-star left pity4 at {}",
                    roll.state.pity4
                );
            } else {
                ensure!(
                    roll.state.pity4 == state.pity4 + 1,
                    "draw {draw}: uncoupled five-star touched pity4"
                );
            }
        }
        state = roll.state;
    }

    ensure!(fives > 0, "no five-star in {TRACKED_DRAWS} draws");
    Ok(())
}

pub fn four_star_isolation(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let engine = ctx.assets.roll_engine();
    let banner = ctx.featured_banner()?;
    let mut rng = SeededSource::new(ctx.seed);
    let mut state = PityState::default();
    let mut fours = 0usize;

    for draw in 1..=TRACKED_DRAWS {
        let roll = engine.roll(banner, state, &mut rng);
        if roll.rarity == Rarity::Four {
            fours += 1;
            ensure!(
                roll.state.pity4 == 0,
                "draw {draw}: four-star left pity4 at {}",
                roll.state.pity4
            );
            ensure!(
                roll.state.pity5 == state.pity5 + 1,
                "draw {draw}: four-star moved pity5 from {} to {}",
                state.pity5,
                roll.state.pity5
            );
            ensure!(
                roll.state.guarantee5 == state.guarantee5,
                "draw {draw}: four-star changed the five-star guarantee"
            );
        }
        state = roll.state;
    }

    ensure!(fours > 0, "no four-star in {TRACKED_DRAWS} draws");
    Ok(())
}

pub fn guarantee(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let engine = ctx.assets.roll_engine();
    let cfg = *engine.config();
    let banner = ctx.featured_banner()?;
    let at_cap = PityState::new(cfg.five_star_cap.saturating_sub(1), 0);

    // A pending guarantee always lands on a featured item.
    let mut rng = SeededSource::new(ctx.seed);
    let roll = engine.roll(banner, at_cap.with_guarantees(true, false), &mut rng);
    ensure!(roll.rate_up, "guaranteed five-star was not rate-up");
    ensure!(
        banner.is_rate_up(&roll.item),
        "guaranteed five-star `{}` is not featured",
        roll.item.id
    );
    ensure!(!roll.state.guarantee5, "guarantee not consumed");

    // Losing the 50/50 arms the guarantee.
    if cfg.rate_up_chance < ScriptedSource::DEFAULT_FALLBACK {
        let mut script = ScriptedSource::default();
        let lost = engine.roll(banner, at_cap, &mut script);
        ensure!(!lost.rate_up, "scripted 50/50 unexpectedly won");
        ensure!(
            !banner.is_rate_up(&lost.item),
            "lost 50/50 still gave featured `{}`",
            lost.item.id
        );
        ensure!(lost.state.guarantee5, "lost 50/50 did not arm the guarantee");
    }

    // Over a long seeded run, no two consecutive five-stars are off-banner.
    let mut rng = SeededSource::new(ctx.seed);
    let mut state = PityState::default();
    let mut last_lost = false;
    for draw in 1..=TRACKED_DRAWS {
        let roll = engine.roll(banner, state, &mut rng);
        if roll.rarity == Rarity::Five {
            ensure!(
                !(last_lost && !roll.rate_up),
                "draw {draw}: second off-banner five-star in a row"
            );
            last_lost = !roll.rate_up;
        }
        state = roll.state;
    }
    Ok(())
}

pub fn batch_ordering(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let config = ctx.assets.config();
    let cap = ctx.assets.roll_engine().config().five_star_cap;
    let banner = ctx.featured_banner()?;

    let store = MemoryStore::new();
    let mut seeded = SessionSnapshot::fresh(config.max_crystals);
    seeded.pity_state = PityState::new(cap.saturating_sub(1), 0).with_guarantees(true, false);
    save_snapshot(&store, &config.storage_key, &seeded).context("failed to seed store")?;

    let mut session = ctx.session_over(store);
    session
        .select_banner(&banner.id)
        .with_context(|| format!("failed to select {}", banner.id))?;

    let single = session.summon_draws(1)?;
    let first = single.first().context("single summon returned nothing")?;
    ensure!(
        first.roll.rarity == Rarity::Five && banner.is_rate_up(&first.roll.item),
        "pull at cap with guarantee gave {} `{}`",
        first.roll.rarity,
        first.roll.item.id
    );
    ensure!(
        session.pity().pity5 == 0 && !session.pity().guarantee5,
        "pity not reset after guaranteed five-star: {:?}",
        session.pity()
    );

    session.set_crystals(i64::from(config.max_crystals));
    let mut previous = session.pity();
    let draws = session.summon_draws(10)?;
    ensure!(draws.len() == 10, "ten-pull returned {} draws", draws.len());
    for (index, draw) in draws.iter().enumerate() {
        let state = draw.roll.state;
        let expected5 = if draw.roll.rarity == Rarity::Five {
            0
        } else {
            previous.pity5 + 1
        };
        ensure!(
            state.pity5 == expected5,
            "draw {}: pity5 {} but expected {expected5}",
            index + 1,
            state.pity5
        );
        if draw.roll.rarity == Rarity::Four {
            ensure!(state.pity4 == 0, "draw {}: four-star kept pity4", index + 1);
        }
        previous = state;
    }
    ensure!(
        session.pity() == previous,
        "session pity {:?} does not match last draw {previous:?}",
        session.pity()
    );
    ensure!(
        session.inventory().total() == 11,
        "inventory holds {} copies after 11 pulls",
        session.inventory().total()
    );
    Ok(())
}
