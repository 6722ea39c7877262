use anyhow::{Result, ensure};
use std::cell::Cell;
use std::rc::Rc;

use super::ScenarioCtx;

pub fn ten_pull(ctx: &ScenarioCtx<'_>) -> Result<()> {
    let mut session = ctx.fresh_session();
    let start = session.wallet().crystals();
    let cost = u64::from(session.config().summon_cost) * 10;
    ensure!(
        u64::from(start) >= cost,
        "fresh wallet ({start}) cannot afford a ten-pull ({cost})"
    );

    let notifications = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&notifications);
    session.on_update(move |_| counter.set(counter.get() + 1));

    let results = session.summon(10)?;
    ensure!(results.len() == 10, "expected 10 results, got {}", results.len());
    ensure!(
        u64::from(session.wallet().crystals()) == u64::from(start) - cost,
        "ten-pull should cost {cost}"
    );
    ensure!(
        session.inventory().total() == 10,
        "inventory should hold 10 copies, holds {}",
        session.inventory().total()
    );
    ensure!(
        notifications.get() == 1,
        "expected one notification, saw {}",
        notifications.get()
    );

    if ctx.verbose {
        let names: Vec<&str> = results.iter().map(|r| r.item.name.as_str()).collect();
        println!("  🎲 Seed {} pulled: {}", ctx.seed, names.join(", "));
    }
    Ok(())
}
