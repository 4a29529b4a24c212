//! Rendering of finished runs.
use crate::config::RawConfig;
use crate::error::RuntimeError;
use flowmark::{BenchmarkReport, RoundStats, RunConfig, RunSummary};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};
#[allow(unused)]
use tracing::{debug, info};

/// Consumer of a finished run.
pub trait Reporter {
    fn report(&self, report: &BenchmarkReport, config: &RawConfig) -> Result<(), RuntimeError>;
}

/// Builds the reporters enabled by `reportingAndOutput`.
pub fn reporters(config: &RunConfig) -> Vec<Box<dyn Reporter>> {
    let output = &config.benchmark.reporting_and_output;
    let mut reporters: Vec<Box<dyn Reporter>> = vec![];
    if output.print_stats_table {
        reporters.push(Box::new(TableReporter));
    }
    if output.generate_report {
        reporters.push(Box::new(JsonReporter::new(
            output.report_path.clone(),
            config.benchmark.test.network.clone(),
        )));
    }
    reporters
}

/// Prints a metric table per round followed by the cross-round summary.
pub struct TableReporter;

impl TableReporter {
    pub fn render(&self, report: &BenchmarkReport) -> String {
        let mut out = String::new();
        for stats in &report.rounds {
            let _ = writeln!(out, "Round: {}", stats.label);
            if !stats.description.is_empty() {
                let _ = writeln!(out, "{}", stats.description);
            }
            out.push_str(&round_table(stats));
            out.push('\n');
            out.push('\n');
        }
        let _ = writeln!(out, "Summary");
        out.push_str(&summary_table(&report.summary()));
        out.push('\n');
        out
    }
}

impl Reporter for TableReporter {
    fn report(&self, report: &BenchmarkReport, _config: &RawConfig) -> Result<(), RuntimeError> {
        print!("{}", self.render(report));
        Ok(())
    }
}

fn round_table(stats: &RoundStats) -> String {
    let mut builder = Builder::default();
    builder.push_record(["METRIC", "VALUE"]);
    builder.push_record(["Target Rate (tps)".to_string(), stats.target_tps.to_string()]);
    builder.push_record(["Send Rate (tps)".to_string(), rate(stats.send_rate)]);
    builder.push_record(["Seal Rate (tps)".to_string(), rate(stats.seal_rate)]);
    builder.push_record(["Throughput (tps)".to_string(), rate(stats.throughput)]);
    builder.push_record(["Minimum Network Latency".to_string(), millis(stats.min_latency())]);
    builder.push_record(["Maximum Network Latency".to_string(), millis(stats.max_latency())]);
    builder.push_record(["Average Network Latency".to_string(), millis(stats.average_latency())]);
    builder.push_record(["Average Send Latency".to_string(), millis(stats.send_latency.avg)]);
    builder.push_record(["p50 Network Latency".to_string(), millis(stats.settlement_quantiles.p50)]);
    builder.push_record(["p90 Network Latency".to_string(), millis(stats.settlement_quantiles.p90)]);
    builder.push_record(["p99 Network Latency".to_string(), millis(stats.settlement_quantiles.p99)]);
    builder.push_record(["Total Transactions".to_string(), stats.total_tx.to_string()]);
    builder.push_record(["Successful Transactions".to_string(), stats.successful_tx.to_string()]);
    builder.push_record(["Failed Transactions".to_string(), stats.failed_tx.to_string()]);
    builder.push_record([
        "Duration".to_string(),
        humantime::format_duration(Duration::from_millis(stats.duration.as_millis() as u64))
            .to_string(),
    ]);
    builder.build().with(Style::ascii()).to_string()
}

/// One line of the cross-round summary table.
#[derive(Tabled)]
struct SummaryLine {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SEND RATE (TPS)")]
    send_rate: String,
    #[tabled(rename = "SEAL RATE")]
    seal_rate: String,
    #[tabled(rename = "MAX LATENCY")]
    max_latency: String,
    #[tabled(rename = "MIN LATENCY")]
    min_latency: String,
    #[tabled(rename = "AVG LATENCY")]
    avg_latency: String,
    #[tabled(rename = "SUCCESSFUL TRANSACTIONS")]
    successful_tx: u64,
    #[tabled(rename = "FAILED TRANSACTIONS")]
    failed_tx: u64,
}

fn summary_table(summary: &RunSummary) -> String {
    let lines = summary.rows.iter().map(|row| SummaryLine {
        name: row.label.clone(),
        send_rate: rate(row.send_rate),
        seal_rate: rate(row.seal_rate),
        max_latency: millis(row.max_latency),
        min_latency: millis(row.min_latency),
        avg_latency: millis(row.avg_latency),
        successful_tx: row.successful_tx,
        failed_tx: row.failed_tx,
    });
    Table::new(lines).with(Style::ascii()).to_string()
}

fn rate(value: f64) -> String {
    format!("{value:.2}")
}

fn millis(value: Duration) -> String {
    format!("{:.1} ms", value.as_secs_f64() * 1000.)
}

/// Writes the whole run, transaction ids and configuration included, as one JSON document.
pub struct JsonReporter {
    path: PathBuf,
    network: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    generated_at: String,
    network: &'a str,
    elapsed_ms: u128,
    rounds: &'a [RoundStats],
    summary: RunSummary,
    configuration: JsonConfiguration<'a>,
}

#[derive(Serialize)]
struct JsonConfiguration<'a> {
    benchmark: &'a str,
    transaction: &'a str,
}

impl JsonReporter {
    pub fn new(path: PathBuf, network: String) -> Self {
        Self { path, network }
    }

    pub fn render(
        &self,
        report: &BenchmarkReport,
        config: &RawConfig,
    ) -> Result<String, RuntimeError> {
        let document = JsonReport {
            generated_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            network: &self.network,
            elapsed_ms: report.elapsed.as_millis(),
            rounds: &report.rounds,
            summary: report.summary(),
            configuration: JsonConfiguration {
                benchmark: &config.benchmark,
                transaction: &config.transaction,
            },
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

impl Reporter for JsonReporter {
    fn report(&self, report: &BenchmarkReport, config: &RawConfig) -> Result<(), RuntimeError> {
        let json = self.render(report, config)?;
        std::fs::write(&self.path, json).map_err(|source| RuntimeError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!("Report written to {}", self.path.display());
        Ok(())
    }
}
