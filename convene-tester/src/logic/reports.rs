use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;
use super::distribution::{DistributionAggregate, DistributionReport, PullRecord};
use crate::common::{ratio, report_stamp};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: String,
    scenarios: &'a [ScenarioResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution: Option<&'a DistributionReport>,
}

fn success_rate(results: &[ScenarioResult]) -> f64 {
    let passed = results.iter().filter(|r| r.passed).count();
    let passed = u64::try_from(passed).unwrap_or(u64::MAX);
    let total = u64::try_from(results.len()).unwrap_or(u64::MAX);
    ratio(passed, total) * 100.0
}

pub fn generate_console_report(
    out: &mut impl Write,
    results: &[ScenarioResult],
    distribution: Option<&DistributionReport>,
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Logic Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==============================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total scenarios: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
    }

    if let Some(report) = distribution {
        writeln!(out)?;
        writeln!(out, "{}", "🎲 Pull Distribution Summary".bright_magenta().bold())?;
        writeln!(out, "{}", "============================".magenta())?;
        write_aggregate_lines(out, &report.aggregate, "")?;
    }
    Ok(())
}

fn write_aggregate_lines(
    out: &mut impl Write,
    aggregate: &DistributionAggregate,
    bullet: &str,
) -> Result<()> {
    writeln!(
        out,
        "{bullet}Seeds: {} ({} pulls)",
        aggregate.seeds, aggregate.total_pulls
    )?;
    writeln!(
        out,
        "{bullet}5★ rate: {:.2}% (σ {:.2}%), 4★ rate: {:.2}%, 3★ rate: {:.2}%",
        aggregate.five_star_rate * 100.0,
        aggregate.std_five_star_rate * 100.0,
        aggregate.four_star_rate * 100.0,
        aggregate.three_star_rate * 100.0
    )?;
    writeln!(
        out,
        "{bullet}Pulls per 5★: mean {:.1}, max {}; max pulls per 4★+: {}",
        aggregate.mean_five_star_gap, aggregate.max_five_star_gap, aggregate.max_four_star_gap
    )?;
    writeln!(
        out,
        "{bullet}Rate-up share of 5★: {:.1}%",
        aggregate.rate_up_share * 100.0
    )?;
    writeln!(
        out,
        "{bullet}Evolution items: {}, afterburn: {}, scrap: {}",
        aggregate.evolution_items, aggregate.afterburn, aggregate.scrap
    )?;
    if aggregate.pool_fallbacks > 0 {
        writeln!(
            out,
            "{bullet}⚠️  Pool fallbacks (catalog defects): {}",
            aggregate.pool_fallbacks
        )?;
    }
    Ok(())
}

pub fn generate_json_report(
    out: &mut impl Write,
    results: &[ScenarioResult],
    distribution: Option<&DistributionReport>,
) -> Result<()> {
    let report = JsonReport {
        generated_at: report_stamp(),
        scenarios: results,
        distribution,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut impl Write,
    results: &[ScenarioResult],
    distribution: Option<&DistributionReport>,
) -> Result<()> {
    writeln!(out, "# Convene Logic Test Results\n")?;
    writeln!(out, "_Generated {}_\n", report_stamp())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {}", total_tests - passed_tests)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    if !results.is_empty() {
        writeln!(out, "## Detailed Results\n")?;
    }
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };

        writeln!(
            out,
            "### {} {} (seed {})\n",
            status, result.scenario_name, result.seed
        )?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }

    if let Some(report) = distribution {
        writeln!(out, "## Pull Distribution\n")?;
        write_aggregate_lines(out, &report.aggregate, "- ")?;
        writeln!(out)?;
        writeln!(
            out,
            "| Seed | Pulls | 5★ | 4★ | 3★ | Rate-up 5★ | Mean gap | Max gap |"
        )?;
        writeln!(out, "|---|---|---|---|---|---|---|---|")?;
        for record in &report.records {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {:.1} | {} |",
                record.seed_label,
                record.pulls,
                record.five_star,
                record.four_star,
                record.three_star,
                record.rate_up_five_star,
                record.mean_five_star_gap,
                record.max_five_star_gap
            )?;
        }
    }
    Ok(())
}

pub fn generate_csv_report(out: &mut impl Write, records: &[PullRecord]) -> Result<()> {
    writeln!(
        out,
        "seed,seed_value,banner,pulls,five_star,four_star,three_star,rate_up_five_star,\
         mean_five_star_gap,max_five_star_gap,max_four_star_gap,evolution_items,afterburn,scrap,\
         pool_fallbacks"
    )?;
    for record in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{:.3},{},{},{},{},{},{}",
            csv_field(&record.seed_label),
            record.seed,
            csv_field(&record.banner),
            record.pulls,
            record.five_star,
            record.four_star,
            record.three_star,
            record.rate_up_five_star,
            record.mean_five_star_gap,
            record.max_five_star_gap,
            record.max_four_star_gap,
            record.evolution_items,
            record.afterburn,
            record.scrap,
            record.pool_fallbacks
        )?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke".to_string(),
            seed: 42,
            passed,
            iterations_run: 3,
            successful_iterations: if passed { 3 } else { 2 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 3 (seed 44): boom".to_string()]
            },
            average_duration: Duration::from_millis(10),
            performance_data: vec![Duration::from_millis(10)],
        }
    }

    fn sample_distribution() -> DistributionReport {
        DistributionReport::new(vec![PullRecord {
            seed_label: "0x2a".to_string(),
            seed: 42,
            banner: "banner_featured_resonator".to_string(),
            pulls: 160,
            five_star: 2,
            four_star: 20,
            three_star: 138,
            rate_up_five_star: 1,
            mean_five_star_gap: 71.5,
            max_five_star_gap: 80,
            max_four_star_gap: 10,
            evolution_items: 3,
            afterburn: 120,
            scrap: 2_070,
            pool_fallbacks: 1,
        }])
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn console_report_lists_failures_and_distribution() {
        let results = [sample_result(true), sample_result(false)];
        let distribution = sample_distribution();
        let text = render(|out| {
            generate_console_report(out, &results, Some(&distribution), Duration::from_secs(1))
        });
        assert!(text.contains("Total scenarios: 2"));
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("boom"));
        assert!(text.contains("Pull Distribution Summary"));
        assert!(text.contains("Pool fallbacks"));
    }

    #[test]
    fn console_report_handles_no_results() {
        let text = render(|out| generate_console_report(out, &[], None, Duration::ZERO));
        assert!(text.contains("Total scenarios: 0"));
        assert!(!text.contains("Performance Summary"));
    }

    #[test]
    fn json_report_is_one_object() {
        let results = [sample_result(true)];
        let distribution = sample_distribution();
        let text = render(|out| generate_json_report(out, &results, Some(&distribution)));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value["generatedAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["scenarios"][0]["scenario_name"], "Smoke");
        assert_eq!(value["distribution"]["aggregate"]["total_pulls"], 160);
        assert_eq!(value["distribution"]["records"][0]["seed_label"], "0x2a");

        let bare = render(|out| generate_json_report(out, &[], None));
        let value: serde_json::Value = serde_json::from_str(&bare).unwrap();
        assert!(value.get("distribution").is_none());
        assert_eq!(value["scenarios"], serde_json::json!([]));
    }

    #[test]
    fn markdown_report_has_sections() {
        let results = [sample_result(false)];
        let distribution = sample_distribution();
        let text = render(|out| generate_markdown_report(out, &results, Some(&distribution)));
        assert!(text.starts_with("# Convene Logic Test Results"));
        assert!(text.contains("### ❌ Smoke (seed 42)"));
        assert!(text.contains("| 0x2a | 160 | 2 | 20 | 138 | 1 | 71.5 | 80 |"));
    }

    #[test]
    fn csv_report_writes_header_and_rows() {
        let mut record = sample_distribution().records.remove(0);
        record.seed_label = "a,b".to_string();
        let text = render(|out| generate_csv_report(out, &[record]));
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("seed,seed_value,banner,pulls"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"a,b\",42,banner_featured_resonator,160,2,20,138,1,71.500,80,10"));
        assert!(lines.next().is_none());
    }
}
