mod common;
mod logic;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use common::scenario::{all_scenario_keys, get_scenario, list_scenarios};
use common::split_csv;
use logic::{
    DistributionPlan, DistributionReport, LogicTester, SeedInfo, TesterAssets,
    resolve_seed_inputs, run_distribution_analysis, validate_distribution,
};

#[derive(Debug, Parser)]
#[command(name = "convene-tester", version)]
#[command(about = "Deterministic QA and pull-distribution analysis for the Convene summon engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; hex and `a..=b` ranges accepted)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Pulls per seed for distribution analysis (0 skips it)
    #[arg(long, default_value_t = 0)]
    pulls: u32,

    /// Pulls per summon during distribution analysis
    #[arg(long, default_value_t = 10)]
    batch: u32,

    /// Banner id for distribution analysis (defaults to the featured banner)
    #[arg(long)]
    banner: Option<String>,

    /// Catalog JSON to test instead of the bundled one; a sibling
    /// `session.json` overrides session tuning
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seed_tokens = split_csv(&args.seeds);
    let seed_infos = resolve_seed_inputs(&seed_tokens)?;
    let logic_seeds: Vec<u64> = seed_infos.iter().map(|s| s.seed).collect();
    let assets = Arc::new(TesterAssets::load(args.catalog.as_deref())?);

    let all_results = run_logic_scenarios(&args, &scenarios, &logic_seeds, &assets);
    let distribution = gather_distribution(&args, &assets, &seed_infos)?;

    write_reports(&args, &all_results, distribution.as_ref(), start_time)?;

    if let Some(report) = distribution.as_ref() {
        validate_distribution(&report.aggregate, &assets.config().roll)?;
    }

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎰 Convene Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        scenarios.retain(|s| !s.eq_ignore_ascii_case("all"));
        for key in all_scenario_keys() {
            if !scenarios.contains(&key) {
                scenarios.push(key);
            }
        }
    }
    scenarios
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    logic_seeds: &[u64],
    assets: &Arc<TesterAssets>,
) -> Vec<logic::ScenarioResult> {
    let mut results: Vec<logic::ScenarioResult> = Vec::new();
    if scenarios.is_empty() {
        return results;
    }

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(Arc::clone(assets), args.verbose);

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            let scenario_results =
                logic_tester.run_scenario(scenario, logic_seeds, args.iterations);
            results.extend(scenario_results);
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn gather_distribution(
    args: &Args,
    assets: &TesterAssets,
    seed_infos: &[SeedInfo],
) -> Result<Option<DistributionReport>> {
    if args.pulls == 0 {
        return Ok(None);
    }

    println!("{}", "🎲 Running Pull Distribution".bright_magenta().bold());
    println!("{}", "-".repeat(30).magenta());

    let plan = DistributionPlan::new(args.pulls, args.batch).with_banner(args.banner.clone());
    let records = run_distribution_analysis(assets, seed_infos, &plan)
        .context("distribution analysis failed")?;
    Ok(Some(DistributionReport::new(records)))
}

fn write_reports(
    args: &Args,
    results: &[logic::ScenarioResult],
    distribution: Option<&DistributionReport>,
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            logic::reports::generate_json_report(&mut output_target, results, distribution)?;
        }
        "markdown" => {
            if results.is_empty() && distribution.is_none() {
                writeln!(
                    &mut output_target,
                    "# Convene Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(
                    &mut output_target,
                    results,
                    distribution,
                )?;
            }
        }
        "csv" => {
            let records = distribution.map_or(&[][..], |report| report.records.as_slice());
            logic::reports::generate_csv_report(&mut output_target, records)?;
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() && distribution.is_none() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    distribution,
                    duration,
                )?;
            }
        }
    }

    if matches!(args.report.as_str(), "console" | "markdown") {
        let duration = start_time.elapsed();
        writeln!(&mut output_target)?;
        writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
