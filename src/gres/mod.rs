// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! GRES text parsing and per-type GPU accounting.

pub mod aggregate;
pub mod parser;
pub mod types;

pub use aggregate::aggregate;
pub use parser::{parse_allocated_gpus, parse_total_gpus};
pub use types::{GpuMetricRecord, GpuMetrics, ParseError, ParseMode};
