use anyhow::{Context, Result, bail, ensure};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Upper bound on seeds produced by a single range token.
const MAX_RANGE_LEN: u64 = 10_000;

static RANGE_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?P<start>[^.]+)\.\.(?P<inclusive>=)?(?P<end>[^.=]+)$").ok());

/// Seed metadata used for scenario and distribution runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    /// Token the seed came from, kept for reports.
    pub label: String,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self {
            seed,
            label: seed.to_string(),
        }
    }

    fn labelled(seed: u64, label: &str) -> Self {
        Self {
            seed,
            label: label.to_string(),
        }
    }
}

/// Resolve CLI seed tokens into distinct seeds, preserving first-seen order.
///
/// Supports decimal integers (negative values use their magnitude),
/// `0x`-prefixed hex, and ranges such as `1..=5` (inclusive) or `1..5`.
/// An empty list resolves to seed 1337.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut pending = Vec::new();

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = parse_range(token)? {
            ensure!(start <= end, "Seed range {token} is reversed");
            ensure!(
                end - start < MAX_RANGE_LEN,
                "Seed range {token} exceeds {MAX_RANGE_LEN} seeds"
            );
            pending.extend((start..=end).map(SeedInfo::from_numeric));
            continue;
        }

        if let Some(seed) = parse_single(token) {
            pending.push(SeedInfo::labelled(seed, token));
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    let mut seen = HashSet::new();
    let mut deduped: Vec<SeedInfo> = pending
        .into_iter()
        .filter(|info| seen.insert(info.seed))
        .collect();

    if deduped.is_empty() {
        deduped.push(SeedInfo::from_numeric(1337));
    }

    Ok(deduped)
}

fn parse_single(token: &str) -> Option<u64> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    if let Ok(value) = token.parse::<u64>() {
        return Some(value);
    }
    token.parse::<i64>().ok().map(i64::unsigned_abs)
}

fn parse_range(token: &str) -> Result<Option<(u64, u64)>> {
    let Some(caps) = RANGE_TOKEN.as_ref().and_then(|re| re.captures(token)) else {
        ensure!(!token.contains(".."), "Malformed seed range {token}");
        return Ok(None);
    };
    let start = parse_single(&caps["start"])
        .with_context(|| format!("Invalid range start in {token}"))?;
    let end =
        parse_single(&caps["end"]).with_context(|| format!("Invalid range end in {token}"))?;
    if caps.name("inclusive").is_some() {
        return Ok(Some((start, end)));
    }
    ensure!(end > start, "Seed range {token} is empty");
    Ok(Some((start, end - 1)))
}
