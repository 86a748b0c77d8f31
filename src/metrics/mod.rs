// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Prometheus exposition of GPU accounting.
//!
//! - `collector`: pull-based collector; one Slurm snapshot per scrape
//! - `server`: axum routes serving `/metrics` and `/health`

pub mod collector;
pub mod server;

pub use collector::GpusCollector;
pub use server::{router, serve};
