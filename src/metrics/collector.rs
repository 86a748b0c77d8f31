// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Pull-based collector exposing per-type GPU gauges.
//!
//! Each scrape takes a fresh snapshot from the injected [`MetricsSource`]
//! and builds new gauge families from it; nothing is cached between scrapes.
//! Scrapes are serialized so concurrent requests never overlap their
//! Slurm command invocations.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use tokio::sync::Mutex;

use crate::gres::{GpuMetricRecord, GpuMetrics};
use crate::slurm::{MetricsSource, SnapshotError};

/// The single variable label on every series
pub const TYPE_LABEL: &str = "type";

/// Failure of a single scrape
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Gauge definition with its pre-built descriptor
struct GaugeDef {
    opts: Opts,
    desc: Desc,
    value: fn(&GpuMetricRecord) -> f64,
}

impl GaugeDef {
    fn new(
        namespace: &str,
        name: &str,
        help: &str,
        value: fn(&GpuMetricRecord) -> f64,
    ) -> prometheus::Result<Self> {
        let opts = Opts::new(name, help).namespace(namespace);
        let desc = Desc::new(
            opts.fq_name(),
            opts.help.clone(),
            vec![TYPE_LABEL.to_string()],
            HashMap::new(),
        )?;
        Ok(Self { opts, desc, value })
    }

    fn build(&self, metrics: &GpuMetrics) -> prometheus::Result<Vec<MetricFamily>> {
        let gauge = GaugeVec::new(self.opts.clone(), &[TYPE_LABEL])?;
        for (gpu_type, record) in metrics {
            gauge
                .with_label_values(&[gpu_type.as_str()])
                .set((self.value)(record));
        }
        Ok(gauge.collect())
    }
}

/// Exposes `<ns>_gpus_{alloc,idle,total,utilization}` labelled by GPU type
pub struct GpusCollector {
    source: Arc<dyn MetricsSource>,
    gauges: [GaugeDef; 4],
    scrape_lock: Mutex<()>,
}

impl GpusCollector {
    pub fn new(source: Arc<dyn MetricsSource>, namespace: &str) -> prometheus::Result<Self> {
        let gauges = [
            GaugeDef::new(namespace, "gpus_alloc", "Allocated GPUs by type", |r| r.alloc)?,
            GaugeDef::new(namespace, "gpus_idle", "Idle GPUs by type", |r| r.idle)?,
            GaugeDef::new(namespace, "gpus_total", "Total GPUs by type", |r| r.total)?,
            GaugeDef::new(
                namespace,
                "gpus_utilization",
                "Total GPU utilization by type",
                |r| r.utilization,
            )?,
        ];

        Ok(Self {
            source,
            gauges,
            scrape_lock: Mutex::new(()),
        })
    }

    /// Descriptors of all series this collector can emit. Never queries Slurm.
    pub fn describe(&self) -> Vec<&Desc> {
        self.gauges.iter().map(|g| &g.desc).collect()
    }

    /// Take one snapshot and turn it into gauge families.
    ///
    /// Families without samples are left out since there is nothing to expose
    /// for them (and the text encoder rejects them).
    pub async fn collect(&self) -> Result<Vec<MetricFamily>, ScrapeError> {
        let _guard = self.scrape_lock.lock().await;
        let metrics = self.source.snapshot().await?;

        let mut families = Vec::with_capacity(self.gauges.len());
        for gauge in &self.gauges {
            families.extend(
                gauge
                    .build(&metrics)?
                    .into_iter()
                    .filter(|mf| !mf.get_metric().is_empty()),
            );
        }
        Ok(families)
    }
}
