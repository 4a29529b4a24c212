mod utils;
#[allow(unused)]
use utils::*;

use flowmark::Address;
use flowmark_runtime::runtime::start;
use mock_ledger::MockSettings;
use std::path::Path;
use std::time::Duration;

fn benchmark_yaml(url: &str, report: &Path, rounds: &[(&str, u32, u32)], extra: &str) -> String {
    let rounds: String = rounds
        .iter()
        .map(|(label, tx_number, tps)| {
            format!(
                "    - label: {label}\n      rateControl:\n        txNumber: {tx_number}\n        tps: {tps}\n"
            )
        })
        .collect();

    format!(
        r#"
test:
  name: end-to-end
  network: {url}
  rounds:
{rounds}
settlement:
  pollInterval: 50
  timeout: 10000
retrySettings:
  maxRetryAttempts: 3
  retryInterval: 50
reportingAndOutput:
  printStatsTable: true
  generateReport: true
  reportPath: {report}
{extra}
"#,
        report = report.display()
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn single_round_seals_every_transaction() {
    init();
    let (ledger, url) = spawn_ledger(MockSettings::default(), 1).await.unwrap();
    let report_dir = tempfile::tempdir().unwrap();
    let report_path = report_dir.path().join("report.json");
    let (_dir, args) =
        write_configs(&benchmark_yaml(&url, &report_path, &[("steady", 10, 20)], "")).unwrap();

    let report = start(&args).await.unwrap();

    assert_eq!(report.rounds.len(), 1);
    let round = &report.rounds[0];
    assert_eq!(round.total_tx, 10);
    assert_eq!(round.successful_tx, 10);
    assert_eq!(round.failed_tx, 0);
    assert!(round.min_latency() <= round.average_latency());
    assert!(round.average_latency() <= round.max_latency());
    assert!(round.min_latency() >= Duration::from_millis(200));
    assert_eq!(ledger.transaction_count(), 10);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(written["rounds"][0]["txIds"].as_array().unwrap().len(), 10);
    assert_eq!(written["summary"]["rows"][0]["label"], "steady");
    assert!(!written["configuration"]["transaction"]
        .as_str()
        .unwrap()
        .contains(PRIVATE_KEY));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn key_generation_grows_account_across_rounds() {
    init();
    let (ledger, url) = spawn_ledger(MockSettings::default(), 1).await.unwrap();
    let report_dir = tempfile::tempdir().unwrap();
    let extra = "keyGeneration:\n  enabled: true\n  maxKeys: 3\n";
    let (_dir, args) = write_configs(&benchmark_yaml(
        &url,
        &report_dir.path().join("report.json"),
        &[("first", 4, 20), ("second", 6, 20)],
        extra,
    ))
    .unwrap();

    let report = start(&args).await.unwrap();

    let labels: Vec<_> = report.rounds.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, ["first", "second"]);
    assert!(report.rounds.iter().all(|r| r.failed_tx == 0));

    let account = ledger.account(&ADDRESS.parse::<Address>().unwrap()).unwrap();
    assert_eq!(account.keys.len(), 3);
    let used = account
        .keys
        .iter()
        .filter(|key| key.sequence_number > 0)
        .count();
    assert_eq!(used, 3);
    // NOTE: One key-adding transaction in the first round, none in the second.
    assert_eq!(ledger.transaction_count(), 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn failed_submissions_are_reported_not_retried() {
    init();
    let (ledger, url) = spawn_ledger(MockSettings::default(), 2).await.unwrap();
    ledger.fail_next_submissions(2);
    let report_dir = tempfile::tempdir().unwrap();
    let (_dir, args) = write_configs(&benchmark_yaml(
        &url,
        &report_dir.path().join("report.json"),
        &[("flaky", 6, 20)],
        "",
    ))
    .unwrap();

    let report = start(&args).await.unwrap();

    let round = &report.rounds[0];
    assert_eq!(round.total_tx, 6);
    assert_eq!(round.failed_tx, 2);
    assert_eq!(round.successful_tx, 4);
    assert_eq!(round.tx_ids.len(), 4);
    assert_eq!(ledger.transaction_count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn block_fetch_failures_are_retried() {
    init();
    let (ledger, url) = spawn_ledger(MockSettings::default(), 1).await.unwrap();
    ledger.fail_next_block_fetches(2);
    let report_dir = tempfile::tempdir().unwrap();
    let (_dir, args) = write_configs(&benchmark_yaml(
        &url,
        &report_dir.path().join("report.json"),
        &[("retry", 1, 1)],
        "",
    ))
    .unwrap();

    let report = start(&args).await.unwrap();

    assert_eq!(report.rounds[0].successful_tx, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn short_settlement_timeout_reports_timed_out() {
    init();
    let settings = MockSettings {
        seal_after: Duration::from_secs(5),
        ..Default::default()
    };
    let (_ledger, url) = spawn_ledger(settings, 1).await.unwrap();
    let report_dir = tempfile::tempdir().unwrap();
    let (_dir, mut args) = write_configs(&benchmark_yaml(
        &url,
        &report_dir.path().join("report.json"),
        &[("slow", 2, 10)],
        "",
    ))
    .unwrap();
    args.settlement_timeout = Some(Duration::from_millis(300));

    let report = start(&args).await.unwrap();

    let round = &report.rounds[0];
    assert_eq!(round.total_tx, 2);
    assert_eq!(round.failed_tx, 2);
    assert_eq!(round.successful_tx, 0);
}

#[cfg(feature = "integration")]
mod integration {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(120_000)]
    async fn sustained_multi_round_load() {
        init();
        let settings = MockSettings {
            seal_after: Duration::from_millis(500),
            seal_jitter: Duration::from_millis(500),
            ..Default::default()
        };
        let (_ledger, url) = spawn_ledger(settings, 1).await.unwrap();
        let report_dir = tempfile::tempdir().unwrap();
        let extra = "keyGeneration:\n  enabled: true\n  maxKeys: 64\nconcurrency:\n  strategy: batched\n  batchPause: 1000\n";
        let (_dir, args) = write_configs(&benchmark_yaml(
            &url,
            &report_dir.path().join("report.json"),
            &[("warmup", 100, 50), ("ramp", 400, 100), ("peak", 1000, 200)],
            extra,
        ))
        .unwrap();

        let report = start(&args).await.unwrap();

        for round in &report.rounds {
            assert_eq!(round.failed_tx, 0, "round {}", round.label);
            assert!(round.min_latency() >= Duration::from_millis(500));
            assert!(round.max_latency() < Duration::from_millis(1_500));
        }
        assert!(report.rounds[2].send_rate > report.rounds[0].send_rate);
    }
}
