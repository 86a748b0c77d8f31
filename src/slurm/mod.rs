// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm integration: query GPU allocation and capacity via `squeue` and `sinfo`.
//!
//! Architecture:
//! - `command`: runs a Slurm CLI with a timeout and returns its stdout
//! - `source`: runs both queries, parses them and aggregates per GPU type

pub mod command;
pub mod source;

pub use command::ProcessRunner;
pub use source::{MetricsSource, SlurmGpuSource, SnapshotError, SourceConfig};
