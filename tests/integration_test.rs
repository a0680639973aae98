//! Integration tests for gharchive-parquet

use arrow::array::{Array, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray};
use flate2::Compression;
use flate2::write::GzEncoder;
use gharchive_parquet::config::Config;
use gharchive_parquet::pipeline::{Pipeline, RunSummary};
use gharchive_parquet::{CommitOutcome, SchemaName};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn gzip(lines: &[String]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for line in lines {
        encoder.write_all(line.as_bytes()).unwrap();
        encoder.write_all(b"\n").unwrap();
    }
    encoder.finish().unwrap()
}

fn write_input(dir: &Path, name: &str, lines: &[String]) {
    std::fs::write(dir.join(name), gzip(lines)).unwrap();
}

fn config(source: &Path, sink: &Path, extra: &str) -> Config {
    let yaml = format!(
        r#"
source:
  path: "{}"
sink:
  path: "{}"
pull_requests:
  sample_ratio: 1.0
metrics:
  enabled: false
{extra}
"#,
        source.display(),
        sink.display()
    );
    Config::from_yaml(&yaml, false).unwrap()
}

async fn run(config: Config) -> RunSummary {
    Pipeline::new(config, CancellationToken::new())
        .await
        .unwrap()
        .run()
        .await
        .unwrap()
}

fn read_partition(sink: &Path, schema: SchemaName) -> Vec<RecordBatch> {
    let dir = sink.join(format!("{schema}.parquet"));
    let mut parts: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    parts.sort();

    let mut batches = Vec::new();
    for part in parts {
        let file = std::fs::File::open(part).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        batches.extend(reader.map(|b| b.unwrap()));
    }
    batches
}

fn row_count(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|b| b.num_rows()).sum()
}

fn strings(batches: &[RecordBatch], column: &str) -> Vec<String> {
    batches
        .iter()
        .flat_map(|b| {
            let array = b
                .column_by_name(column)
                .unwrap()
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap()
                .clone();
            (0..array.len())
                .map(|i| array.value(i).to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn create_event(id: &str, created_at: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"CreateEvent","created_at":"{created_at}","actor":{{"id":7,"login":"alice"}},"repo":{{"id":99,"name":"acme/widget"}},"payload":{{"ref_type":"branch"}},"public":true}}"#
    )
}

fn watch_event(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"WatchEvent","created_at":"2018-04-01T00:00:00Z","actor":{{"id":7,"login":"alice"}},"repo":{{"id":99,"name":"acme/widget"}},"payload":{{"action":"started"}},"public":true}}"#
    )
}

fn repository_event(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"RepositoryEvent","created_at":"2018-04-01T00:00:00Z","actor":{{"id":7,"login":"alice"}},"repo":{{"id":99,"name":"acme/widget"}},"public":true}}"#
    )
}

fn fork_without_actor(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"ForkEvent","created_at":"2018-04-01T00:00:00Z","repo":{{"id":99,"name":"acme/widget"}},"payload":{{"forkee":{{"size":1}}}},"public":true}}"#
    )
}

fn push_event(id: &str, commits: usize) -> String {
    let commits: Vec<String> = (0..commits)
        .map(|i| {
            format!(
                r#"{{"sha":"sha{i}","author":{{"name":"dev{i}"}},"message":"commit {i}","url":"https://example.invalid/{i}"}}"#
            )
        })
        .collect();
    format!(
        r#"{{"id":"{id}","type":"PushEvent","created_at":"2018-04-01T01:00:00Z","actor":{{"id":7,"login":"alice"}},"repo":{{"id":99,"name":"acme/widget"}},"payload":{{"push_id":555,"size":{},"ref":"refs/heads/main","head":"abc","before":"def","commits":[{}]}},"public":true}}"#,
        commits.len(),
        commits.join(",")
    )
}

fn pull_request_without_head(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"PullRequestEvent","created_at":"2018-04-01T02:00:00Z","actor":{{"id":7,"login":"alice"}},"repo":{{"id":99,"name":"acme/widget"}},"payload":{{"action":"closed","number":12,"pull_request":{{"id":3001,"number":12,"state":"closed","title":"Fix","base":{{"ref":"main","repo":{{"id":99,"name":"widget"}}}},"head":{{"ref":"gone","repo":null}}}}}},"public":true}}"#
    )
}

fn pull_request_event(id: &str, extra: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"PullRequestEvent","created_at":"2018-04-01T02:00:00Z","actor":{{"id":7,"login":"alice"}},"repo":{{"id":99,"name":"acme/widget"}},"payload":{{"action":"opened","number":1,"pull_request":{{"id":"pr-{id}","number":1,"state":"open","title":"Change {id}","user":{{"id":8,"login":"eve"}}{extra}}}}},"public":true}}"#
    )
}

mod end_to_end_tests {
    use super::*;

    #[tokio::test]
    async fn test_creates_partition_values() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[
                create_event("1", "2018-04-01T12:00:00Z"),
                create_event("2", "2018-04-01T12:00:01Z"),
            ],
        );

        let summary = run(config(input.path(), output.path(), "")).await;
        assert_eq!(summary.files_listed, 1);
        assert_eq!(summary.files_processed, 1);
        assert!(summary.failed_commits().is_empty());

        let batches = read_partition(output.path(), SchemaName::Creates);
        assert_eq!(row_count(&batches), 2);
        assert_eq!(strings(&batches, "id"), vec!["1", "2"]);
        assert_eq!(strings(&batches, "type"), vec!["CreateEvent", "CreateEvent"]);
        assert_eq!(strings(&batches, "repo_name"), vec!["acme/widget"; 2]);

        let batch = &batches[0];
        let actor = batch
            .column_by_name("actor_id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(actor.value(0), 7);

        let created = batch
            .column_by_name("created_at")
            .unwrap()
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        let expected = chrono::DateTime::parse_from_rfc3339("2018-04-01T12:00:00Z")
            .unwrap()
            .timestamp_micros();
        assert_eq!(created.value(0), expected);
    }

    #[tokio::test]
    async fn test_every_schema_partition_is_written() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[create_event("1", "2018-04-01T00:00:00Z")],
        );

        let summary = run(config(input.path(), output.path(), "")).await;
        assert_eq!(summary.commits.len(), SchemaName::ALL.len());
        for schema in SchemaName::ALL {
            assert!(
                output.path().join(format!("{schema}.parquet")).is_dir(),
                "missing partition for {schema}"
            );
            assert!(matches!(
                summary.commits[&schema],
                CommitOutcome::Committed(_)
            ));
        }
        assert_eq!(row_count(&read_partition(output.path(), SchemaName::Issues)), 0);
        assert!(output.path().join("PushEvents.parquet").is_dir());
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[create_event("1", "2018-04-01T00:00:00Z"), push_event("2", 3)],
        );
        let pull_requests: Vec<String> = (0..40)
            .map(|i| {
                let extra = match i % 4 {
                    0 => r#","additions":3"#,
                    1 => r#","merged":false"#,
                    2 => r#","milestone":{"title":"v1"}"#,
                    _ => "",
                };
                pull_request_event(&format!("p{i}"), extra)
            })
            .collect();
        let mut second_file = vec![create_event("3", "2018-04-01T01:00:00Z")];
        second_file.extend(pull_requests);
        write_input(input.path(), "2018-04-01-1.json.gz", &second_file);

        let sampled_config = || {
            let mut cfg = config(input.path(), output.path(), "");
            cfg.pull_requests.sample_ratio = 0.3;
            cfg
        };
        let part = |schema: SchemaName| {
            std::fs::read(
                output
                    .path()
                    .join(format!("{schema}.parquet"))
                    .join("part-00000.parquet"),
            )
            .unwrap()
        };

        let snapshot = || {
            (
                part(SchemaName::Creates),
                part(SchemaName::Commits),
                part(SchemaName::PullRequests),
            )
        };

        let first_summary = run(sampled_config()).await;
        let first = snapshot();
        let second_summary = run(sampled_config()).await;
        let second = snapshot();
        assert_eq!(first, second);
        assert_eq!(
            first_summary.collector.schema_drift,
            second_summary.collector.schema_drift
        );
        assert_eq!(
            first_summary.pull_request_columns,
            second_summary.pull_request_columns
        );
    }

    #[tokio::test]
    async fn test_rows_follow_listing_order() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        for hour in 0..6 {
            write_input(
                input.path(),
                &format!("2018-04-01-{hour}.json.gz"),
                &[create_event(&format!("h{hour}"), "2018-04-01T00:00:00Z")],
            );
        }

        let mut cfg = config(input.path(), output.path(), "");
        cfg.source.max_concurrent_files = 3;
        run(cfg).await;

        let ids = strings(&read_partition(output.path(), SchemaName::Creates), "id");
        assert_eq!(ids, vec!["h0", "h1", "h2", "h3", "h4", "h5"]);
    }
}

mod record_handling_tests {
    use super::*;

    #[tokio::test]
    async fn test_unextracted_kinds_are_counted_not_written() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[
                watch_event("1"),
                repository_event("2"),
                create_event("3", "2018-04-01T00:00:00Z"),
            ],
        );

        let summary = run(config(input.path(), output.path(), "")).await;
        let c = &summary.collector;
        assert_eq!(c.lines_read, 3);
        assert_eq!(c.lines_parsed, 3);
        assert_eq!(c.dropped["unimplemented"], 2);
        assert_eq!(c.unimplemented.values().sum::<u64>(), 2);
        assert!(c.samples.is_empty());
        assert_eq!(c.total_rows(), 1);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[
                "{not json".to_string(),
                create_event("1", "2018-04-01T00:00:00Z"),
                "[1, 2, 3]".to_string(),
            ],
        );

        let summary = run(config(input.path(), output.path(), "")).await;
        let c = &summary.collector;
        assert_eq!(c.lines_read, 3);
        assert_eq!(c.parse_failures, 2);
        assert_eq!(c.samples.len(), 2);
        assert_eq!(c.samples[0].line, 1);
        assert_eq!(c.samples[1].line, 3);
        assert_eq!(row_count(&read_partition(output.path(), SchemaName::Creates)), 1);
    }

    #[tokio::test]
    async fn test_fork_without_actor_emits_no_row() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(input.path(), "2018-04-01-0.json.gz", &[fork_without_actor("1")]);

        let summary = run(config(input.path(), output.path(), "")).await;
        assert_eq!(summary.collector.row_failures[&SchemaName::ForkEvents], 1);
        assert_eq!(
            row_count(&read_partition(output.path(), SchemaName::ForkEvents)),
            0
        );
    }

    #[tokio::test]
    async fn test_push_fans_out_commits() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(input.path(), "2018-04-01-0.json.gz", &[push_event("10", 2)]);

        let summary = run(config(input.path(), output.path(), "")).await;
        assert_eq!(summary.collector.rows_emitted[&SchemaName::PushEvents], 1);
        assert_eq!(summary.collector.rows_emitted[&SchemaName::Commits], 2);

        let commits = read_partition(output.path(), SchemaName::Commits);
        assert_eq!(strings(&commits, "sha"), vec!["sha0", "sha1"]);
        assert_eq!(strings(&commits, "type"), vec!["Commit", "Commit"]);
        assert_eq!(strings(&commits, "repo_name"), vec!["acme/widget"; 2]);

        let push_ids = commits[0]
            .column_by_name("push_id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(push_ids.value(1), 555);
    }

    #[tokio::test]
    async fn test_pull_request_with_null_head_repo() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[pull_request_without_head("20")],
        );

        let summary = run(config(input.path(), output.path(), "")).await;
        assert!(summary.failed_commits().is_empty());
        assert!(summary.pull_request_columns > 0);

        let batches = read_partition(output.path(), SchemaName::PullRequests);
        assert_eq!(row_count(&batches), 1);
        assert_eq!(strings(&batches, "head_ref"), vec!["gone"]);
        if let Some(column) = batches[0].column_by_name("head_repo_id") {
            assert!(column.is_null(0));
        }
    }

    #[tokio::test]
    async fn test_rare_pull_request_columns_drift_out_of_sample() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let rare = [
            (37, "merged_by", r#","merged_by":{"login":"bob"}"#),
            (111, "requested_teams", r#","requested_teams":[{"slug":"core"}]"#),
            (170, "review_comments", r#","review_comments":4"#),
        ];
        let lines: Vec<String> = (0..200)
            .map(|i| {
                let extra = rare
                    .iter()
                    .find(|(row, _, _)| *row == i)
                    .map_or("", |(_, _, extra)| *extra);
                pull_request_event(&format!("{i}"), extra)
            })
            .collect();
        write_input(input.path(), "2018-04-01-0.json.gz", &lines);

        let mut cfg = config(input.path(), output.path(), "");
        cfg.pull_requests.sample_ratio = 0.01;
        let summary = run(cfg).await;
        assert!(summary.failed_commits().is_empty());

        let batches = read_partition(output.path(), SchemaName::PullRequests);
        assert_eq!(row_count(&batches), 200);
        let written = batches[0].schema();
        assert_eq!(written.fields().len(), summary.pull_request_columns);

        let drift = &summary.collector.schema_drift;
        assert!(drift.contains("locked"), "{drift:?}");
        assert!(
            rare.iter().any(|(_, column, _)| drift.contains(column)),
            "{drift:?}"
        );
        for column in drift {
            assert!(written.column_with_name(column).is_none(), "{column}");
        }
        for (_, column, _) in rare {
            assert_eq!(
                drift.contains(column),
                written.column_with_name(column).is_none(),
                "{column}"
            );
        }
        assert!(written.column_with_name("id").is_some());
        assert!(written.column_with_name("title").is_some());
    }
}

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_date_range_filters_files() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-23.json.gz",
            &[create_event("a", "2018-04-01T23:00:00Z")],
        );
        write_input(
            input.path(),
            "2018-04-02-0.json.gz",
            &[create_event("b", "2018-04-02T00:00:00Z")],
        );
        write_input(
            input.path(),
            "notes.json.gz",
            &[create_event("c", "2018-04-02T00:00:00Z")],
        );
        std::fs::write(input.path().join("README.md"), "not an input").unwrap();

        let summary = run(config(input.path(), output.path(), "")).await;
        assert_eq!(summary.files_listed, 3);

        let mut cfg = config(input.path(), output.path(), "");
        cfg.source.start_date = chrono::NaiveDate::from_ymd_opt(2018, 4, 2);
        cfg.source.end_date = chrono::NaiveDate::from_ymd_opt(2018, 4, 2);
        let summary = run(cfg).await;
        assert_eq!(summary.files_listed, 1);

        let ids = strings(&read_partition(output.path(), SchemaName::Creates), "id");
        assert_eq!(ids, vec!["b"]);
    }
}

mod error_handling_tests {
    use super::*;
    use gharchive_parquet::collector::{ErrorKind, ErrorRecord};
    use gharchive_parquet::error::PipelineError;
    use gharchive_parquet::metrics::events::FailureStage;

    fn dlq_records(dir: &Path) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().map(|ext| ext == "ndjson").unwrap_or(false) {
                let content = std::fs::read_to_string(path).unwrap();
                for line in content.lines() {
                    records.push(serde_json::from_str(line).unwrap());
                }
            }
        }
        records.sort();
        records
    }

    #[tokio::test]
    async fn test_dlq_receives_dead_letters() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let dlq = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[
                "{broken".to_string(),
                watch_event("1"),
                fork_without_actor("2"),
                create_event("3", "2018-04-01T00:00:00Z"),
            ],
        );
        std::fs::write(input.path().join("2018-04-01-1.json.gz"), b"not gzip").unwrap();

        let extra = format!(
            "error_handling:\n  dlq_path: \"{}\"\n",
            dlq.path().display()
        );
        let summary = run(config(input.path(), output.path(), &extra)).await;
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.files_processed, 1);

        let records = dlq_records(dlq.path());
        let kinds: Vec<&str> = records.iter().map(|r| r.error.as_str()).collect();
        assert_eq!(kinds, vec!["parse", "row", "file"]);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].line, 3);
        assert!(matches!(
            records[2].error,
            ErrorKind::File {
                stage: FailureStage::Decompress
            }
        ));
        assert!(records[2].path.ends_with("2018-04-01-1.json.gz"));
    }

    #[tokio::test]
    async fn test_failed_files_are_skipped_without_limit() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join("2018-04-01-0.json.gz"), b"junk").unwrap();
        std::fs::write(input.path().join("2018-04-01-1.json.gz"), b"junk").unwrap();
        write_input(
            input.path(),
            "2018-04-01-2.json.gz",
            &[create_event("1", "2018-04-01T02:00:00Z")],
        );

        let summary = run(config(input.path(), output.path(), "")).await;
        assert_eq!(summary.files_failed, 2);
        assert_eq!(summary.collector.files_failed, 2);
        assert!(summary.failed_commits().is_empty());
        assert_eq!(row_count(&read_partition(output.path(), SchemaName::Creates)), 1);
    }

    #[tokio::test]
    async fn test_max_failures_stops_run() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join("2018-04-01-0.json.gz"), b"junk").unwrap();
        std::fs::write(input.path().join("2018-04-01-1.json.gz"), b"junk").unwrap();

        let cfg = config(
            input.path(),
            output.path(),
            "error_handling:\n  max_failures: 1\n",
        );
        let err = Pipeline::new(cfg, CancellationToken::new())
            .await
            .unwrap()
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MaxFailuresExceeded { count: 1 }));
        assert!(!output.path().join("Creates.parquet").exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_commits_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_input(
            input.path(),
            "2018-04-01-0.json.gz",
            &[create_event("1", "2018-04-01T00:00:00Z")],
        );

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let summary = Pipeline::new(config(input.path(), output.path(), ""), shutdown)
            .await
            .unwrap()
            .run()
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.commits.is_empty());
        assert!(!output.path().join("Creates.parquet").exists());
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
source:
  path: "s3://gharchive/2018"
  compression: gzip
  max_concurrent_files: 8
  start_date: 2018-04-01
sink:
  path: "s3://warehouse/gharchive"
  file_size_mb: 64
  compression: zstd
pull_requests:
  sample_ratio: 0.05
  seed: 7
"#;
        let config = Config::from_yaml(yaml, false).unwrap();
        assert_eq!(config.source.max_concurrent_files, 8);
        assert_eq!(config.source.suffix, ".json.gz");
        assert_eq!(
            config.source.start_date,
            chrono::NaiveDate::from_ymd_opt(2018, 4, 1)
        );
        assert_eq!(config.sink.file_size_mb, 64);
        assert_eq!(config.pull_requests.seed, 7);
        assert_eq!(config.pull_requests.max_sample_rows, 10_000);
    }

    #[test]
    fn test_local_paths_accepted() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = config(input.path(), output.path(), "");
        assert!(!config.metrics.enabled);
        assert_eq!(config.pull_requests.sample_ratio, 1.0);
    }
}
