//! Seeded pull-distribution sweeps.
use anyhow::{Result, anyhow, ensure};
use convene_game::{MemoryStore, Rarity, RollConfig, SeededSource, SummonDraw};
use log::debug;
use serde::Serialize;

use crate::common::ratio;
use crate::logic::assets::TesterAssets;
use crate::logic::seeds::SeedInfo;

/// How many pulls to make per seed and on which banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    pub pulls: u32,
    pub batch: u32,
    /// Banner id; the featured banner when absent.
    pub banner: Option<String>,
}

impl DistributionPlan {
    pub const fn new(pulls: u32, batch: u32) -> Self {
        Self {
            pulls,
            batch,
            banner: None,
        }
    }

    #[must_use]
    pub fn with_banner(mut self, banner: Option<String>) -> Self {
        self.banner = banner;
        self
    }
}

/// Per-seed tallies from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PullRecord {
    pub seed_label: String,
    pub seed: u64,
    pub banner: String,
    pub pulls: u32,
    pub five_star: u32,
    pub four_star: u32,
    pub three_star: u32,
    pub rate_up_five_star: u32,
    /// Mean draws needed per five-star, over completed gaps.
    pub mean_five_star_gap: f64,
    pub max_five_star_gap: u32,
    pub max_four_star_gap: u32,
    pub evolution_items: u32,
    pub afterburn: u64,
    pub scrap: u64,
    pub pool_fallbacks: u32,
}

impl PullRecord {
    pub fn five_star_rate(&self) -> f64 {
        ratio(u64::from(self.five_star), u64::from(self.pulls))
    }
}

/// Cross-seed summary of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionAggregate {
    pub seeds: usize,
    pub total_pulls: u64,
    pub five_star_rate: f64,
    pub std_five_star_rate: f64,
    pub four_star_rate: f64,
    pub three_star_rate: f64,
    pub rate_up_share: f64,
    pub mean_five_star_gap: f64,
    pub max_five_star_gap: u32,
    pub max_four_star_gap: u32,
    pub evolution_items: u64,
    pub afterburn: u64,
    pub scrap: u64,
    pub pool_fallbacks: u64,
}

/// Records plus their aggregate, as written to reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionReport {
    pub aggregate: DistributionAggregate,
    pub records: Vec<PullRecord>,
}

impl DistributionReport {
    pub fn new(records: Vec<PullRecord>) -> Self {
        Self {
            aggregate: aggregate_distribution(&records),
            records,
        }
    }
}

pub fn run_distribution_analysis(
    assets: &TesterAssets,
    seeds: &[SeedInfo],
    plan: &DistributionPlan,
) -> Result<Vec<PullRecord>> {
    let config = assets.config();
    let affordable = if config.summon_cost == 0 {
        plan.batch
    } else {
        config.max_crystals / config.summon_cost
    };
    ensure!(
        affordable > 0,
        "max crystals ({}) cannot fund one pull ({})",
        config.max_crystals,
        config.summon_cost
    );
    let batch = plan.batch.clamp(1, affordable);
    if batch != plan.batch {
        debug!("batch of {} clamped to {batch}", plan.batch);
    }

    let banner_id = match plan.banner.as_deref() {
        Some(id) => id.to_string(),
        None => assets.featured_banner().id.clone(),
    };

    let mut records = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let mut session = assets.open_session(MemoryStore::new(), SeededSource::new(seed.seed));
        session
            .select_banner(&banner_id)
            .map_err(|err| anyhow!("{err}"))?;

        let mut tally = Tally::new(seed, &banner_id);
        let mut remaining = plan.pulls;
        while remaining > 0 {
            let count = remaining.min(batch);
            session.set_crystals(i64::from(config.max_crystals));
            for draw in session.summon_draws(count)? {
                tally.ingest(&draw);
            }
            remaining -= count;
        }
        records.push(tally.finish());
    }

    Ok(records)
}

pub fn aggregate_distribution(records: &[PullRecord]) -> DistributionAggregate {
    let mut rates = RunningStats::default();
    let mut total = DistributionAggregate {
        seeds: records.len(),
        ..DistributionAggregate::default()
    };
    let mut five = 0u64;
    let mut four = 0u64;
    let mut three = 0u64;
    let mut rate_up = 0u64;
    let mut gap_weighted = 0.0;

    for record in records {
        rates.add(record.five_star_rate());
        total.total_pulls += u64::from(record.pulls);
        five += u64::from(record.five_star);
        four += u64::from(record.four_star);
        three += u64::from(record.three_star);
        rate_up += u64::from(record.rate_up_five_star);
        gap_weighted += record.mean_five_star_gap * f64::from(record.five_star);
        total.max_five_star_gap = total.max_five_star_gap.max(record.max_five_star_gap);
        total.max_four_star_gap = total.max_four_star_gap.max(record.max_four_star_gap);
        total.evolution_items += u64::from(record.evolution_items);
        total.afterburn += record.afterburn;
        total.scrap += record.scrap;
        total.pool_fallbacks += u64::from(record.pool_fallbacks);
    }

    total.five_star_rate = ratio(five, total.total_pulls);
    total.std_five_star_rate = rates.std_dev();
    total.four_star_rate = ratio(four, total.total_pulls);
    total.three_star_rate = ratio(three, total.total_pulls);
    total.rate_up_share = ratio(rate_up, five);
    #[allow(clippy::cast_precision_loss)]
    let five_f = five as f64;
    total.mean_five_star_gap = if five == 0 { 0.0 } else { gap_weighted / five_f };
    total
}

/// Fail when any observed gap outruns its pity cap.
pub fn validate_distribution(aggregate: &DistributionAggregate, roll: &RollConfig) -> Result<()> {
    ensure!(
        aggregate.max_five_star_gap <= roll.five_star_cap,
        "five-star gap of {} exceeds cap {}",
        aggregate.max_five_star_gap,
        roll.five_star_cap
    );
    ensure!(
        aggregate.max_four_star_gap <= roll.four_star_cap,
        "four-star-or-better gap of {} exceeds cap {}",
        aggregate.max_four_star_gap,
        roll.four_star_cap
    );
    Ok(())
}

#[derive(Debug)]
struct Tally {
    record: PullRecord,
    since_five: u32,
    since_four: u32,
    gaps: RunningStats,
}

impl Tally {
    fn new(seed: &SeedInfo, banner: &str) -> Self {
        Self {
            record: PullRecord {
                seed_label: seed.label.clone(),
                seed: seed.seed,
                banner: banner.to_string(),
                ..PullRecord::default()
            },
            since_five: 0,
            since_four: 0,
            gaps: RunningStats::default(),
        }
    }

    fn ingest(&mut self, draw: &SummonDraw) {
        let record = &mut self.record;
        record.pulls += 1;
        self.since_five += 1;
        self.since_four += 1;

        match draw.roll.rarity {
            Rarity::Five => {
                record.five_star += 1;
                if draw.roll.rate_up {
                    record.rate_up_five_star += 1;
                }
                self.gaps.add(f64::from(self.since_five));
                record.max_five_star_gap = record.max_five_star_gap.max(self.since_five);
                self.since_five = 0;
            }
            Rarity::Four => record.four_star += 1,
            Rarity::Three => record.three_star += 1,
        }
        if draw.roll.rarity >= Rarity::Four {
            record.max_four_star_gap = record.max_four_star_gap.max(self.since_four);
            self.since_four = 0;
        }

        if draw.outcome.evolution_item {
            record.evolution_items += 1;
        }
        if draw.roll.pool_fallback {
            record.pool_fallbacks += 1;
        }
        record.afterburn += u64::from(draw.outcome.currency.afterburn);
        record.scrap += u64::from(draw.outcome.currency.scrap);
    }

    fn finish(mut self) -> PullRecord {
        // A dry streak at the end still counts against the caps.
        let record = &mut self.record;
        record.max_five_star_gap = record.max_five_star_gap.max(self.since_five);
        record.max_four_star_gap = record.max_four_star_gap.max(self.since_four);
        record.mean_five_star_gap = self.gaps.mean();
        self.record
    }
}

#[derive(Debug, Default, Clone)]
struct RunningStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let count = f64::from(self.count);
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / f64::from(self.count - 1)
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
