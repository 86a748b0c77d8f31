// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Per-type GPU accounting records.
//!
//! All values here are poll-local: built from one pair of Slurm queries,
//! exposed once, then dropped.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// GPU model as reported by Slurm (e.g. "a100"), taken verbatim
pub type ResourceTypeKey = String;

/// Allocated GPUs per type, summed over all running jobs
pub type AllocationMap = HashMap<ResourceTypeKey, f64>;

/// Provisioned GPUs per type, summed over all nodes
pub type InventoryMap = HashMap<ResourceTypeKey, f64>;

/// One poll's worth of derived records, keyed by GPU type
pub type GpuMetrics = BTreeMap<ResourceTypeKey, GpuMetricRecord>;

/// Derived accounting for a single GPU type.
///
/// `idle` and `utilization` are computed from `alloc` and `total` at
/// construction. A zero `total` is not guarded against and yields a
/// non-finite utilization (NaN for 0/0, infinity otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpuMetricRecord {
    pub alloc: f64,
    pub idle: f64,
    pub total: f64,
    pub utilization: f64,
}

impl GpuMetricRecord {
    pub fn new(alloc: f64, total: f64) -> Self {
        Self {
            alloc,
            idle: total - alloc,
            total,
            utilization: alloc / total,
        }
    }
}

/// How the GRES parsers treat malformed counts and lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Malformed counts contribute zero, lines without a GRES field are skipped
    #[default]
    Permissive,
    /// The first malformed count or line aborts the parse
    Strict,
}

/// Malformed Slurm output, only raised in [`ParseMode::Strict`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: invalid GPU count in '{token}'")]
    InvalidCount { line: usize, token: String },

    #[error("line {line}: no GRES field in '{text}'")]
    MissingGresField { line: usize, text: String },
}
