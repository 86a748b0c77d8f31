// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! GPU accounting snapshots built from `squeue` and `sinfo`.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::command::{CommandError, CommandRunner};
use crate::gres::{aggregate, parse_allocated_gpus, parse_total_gpus, GpuMetrics, ParseError, ParseMode};

/// squeue arguments: GRES held by running jobs, one job per line
pub const ALLOC_QUERY_ARGS: &[&str] = &["--state=RUNNING", "--noheader", "--Format=tres-alloc:."];

/// sinfo arguments: node name and GRES list, one node per line
pub const INVENTORY_QUERY_ARGS: &[&str] = &["--noheader", "--format=%n %G"];

/// Failure to produce a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to parse {query} output: {source}")]
    Parse {
        query: &'static str,
        source: ParseError,
    },
}

/// Produces a fresh per-type GPU snapshot on every call
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> Result<GpuMetrics, SnapshotError>;
}

/// Slurm command locations and parsing policy
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub squeue: String,
    pub sinfo: String,
    pub parse_mode: ParseMode,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            squeue: "squeue".to_string(),
            sinfo: "sinfo".to_string(),
            parse_mode: ParseMode::Permissive,
        }
    }
}

/// Queries Slurm for allocated and provisioned GPUs.
///
/// Holds no state between snapshots: every call runs both commands.
#[derive(Debug)]
pub struct SlurmGpuSource<R> {
    runner: R,
    config: SourceConfig,
}

impl<R: CommandRunner> SlurmGpuSource<R> {
    pub fn new(runner: R, config: SourceConfig) -> Self {
        Self { runner, config }
    }
}

#[async_trait]
impl<R: CommandRunner> MetricsSource for SlurmGpuSource<R> {
    async fn snapshot(&self) -> Result<GpuMetrics, SnapshotError> {
        let start = Instant::now();
        let mode = self.config.parse_mode;

        // Independent reads; a failure of either cancels the other
        let (alloc_output, inventory_output) = tokio::try_join!(
            self.runner.run(&self.config.squeue, ALLOC_QUERY_ARGS),
            self.runner.run(&self.config.sinfo, INVENTORY_QUERY_ARGS),
        )?;

        let alloc = parse_allocated_gpus(&alloc_output, mode)
            .map_err(|source| SnapshotError::Parse { query: "squeue", source })?;
        let totals = parse_total_gpus(&inventory_output, mode)
            .map_err(|source| SnapshotError::Parse { query: "sinfo", source })?;

        let metrics = aggregate(&alloc, &totals);
        debug!(
            types = metrics.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Collected GPU snapshot"
        );

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::gres::GpuMetricRecord;

    /// Replays canned squeue/sinfo output
    #[derive(Default)]
    struct FakeRunner {
        squeue: String,
        sinfo: String,
        fail: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeRunner {
        fn new(squeue: &str, sinfo: &str) -> Self {
            Self {
                squeue: squeue.to_string(),
                sinfo: sinfo.to_string(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail == Some(program) {
                return Err(CommandError::Spawn {
                    program: program.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            match program {
                "squeue" => {
                    assert_eq!(args, ALLOC_QUERY_ARGS);
                    Ok(self.squeue.clone())
                }
                "sinfo" => {
                    assert_eq!(args, INVENTORY_QUERY_ARGS);
                    Ok(self.sinfo.clone())
                }
                other => panic!("unexpected program {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_snapshot_reference_sample() {
        let runner = FakeRunner::new("gres/gpu:a100=2,cpu=1", "node01 gpu:a100:4(S:0)");
        let source = SlurmGpuSource::new(runner, SourceConfig::default());

        let metrics = source.snapshot().await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(
            metrics["a100"],
            GpuMetricRecord {
                alloc: 2.0,
                idle: 2.0,
                total: 4.0,
                utilization: 0.5
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_reruns_commands_every_call() {
        let runner = FakeRunner::new("", "node01 gpu:v100:2\nnode02 gpu:v100:2\n");
        let source = SlurmGpuSource::new(runner, SourceConfig::default());

        let first = source.snapshot().await.unwrap();
        let second = source.snapshot().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first["v100"].total, 4.0);
        assert_eq!(first["v100"].alloc, 0.0);
        assert_eq!(source.runner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_snapshot_empty_outputs() {
        let source = SlurmGpuSource::new(FakeRunner::new("", ""), SourceConfig::default());
        assert!(source.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_drops_allocation_only_types() {
        let runner = FakeRunner::new(
            "gres/gpu:a100=1,gres/gpu:h100=4\n",
            "node01 gpu:a100:4(S:0)\n",
        );
        let source = SlurmGpuSource::new(runner, SourceConfig::default());

        let metrics = source.snapshot().await.unwrap();
        assert!(metrics.contains_key("a100"));
        assert!(!metrics.contains_key("h100"));
    }

    #[tokio::test]
    async fn test_snapshot_command_failure() {
        let runner = FakeRunner {
            fail: Some("sinfo"),
            ..FakeRunner::new("gres/gpu:a100=1", "")
        };
        let source = SlurmGpuSource::new(runner, SourceConfig::default());

        let err = source.snapshot().await.unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Command(CommandError::Spawn { ref program, .. }) if program == "sinfo"
        ));
    }

    #[tokio::test]
    async fn test_snapshot_strict_parse_error() {
        let runner = FakeRunner::new("gres/gpu:a100=xyz", "node01 gpu:a100:4(S:0)");
        let config = SourceConfig {
            parse_mode: ParseMode::Strict,
            ..Default::default()
        };

        let err = SlurmGpuSource::new(runner, config).snapshot().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Parse { query: "squeue", .. }));
    }

    #[tokio::test]
    async fn test_snapshot_permissive_malformed_count() {
        let runner = FakeRunner::new("gres/gpu:a100=xyz", "node01 gpu:a100:4(S:0)");
        let metrics = SlurmGpuSource::new(runner, SourceConfig::default())
            .snapshot()
            .await
            .unwrap();

        assert_eq!(metrics["a100"].alloc, 0.0);
        assert_eq!(metrics["a100"].idle, 4.0);
    }

    #[tokio::test]
    async fn test_snapshot_with_process_runner() {
        use crate::slurm::command::ProcessRunner;

        let config = SourceConfig {
            squeue: "echo".to_string(),
            sinfo: "echo".to_string(),
            parse_mode: ParseMode::Permissive,
        };
        let source = SlurmGpuSource::new(ProcessRunner::default(), config);

        // echo prints the arguments back; neither line carries GPU GRES
        let metrics = source.snapshot().await.unwrap();
        assert!(metrics.is_empty());
    }
}
