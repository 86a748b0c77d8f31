// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Parsers for the GRES columns printed by `squeue` and `sinfo`.

use tracing::debug;

use super::types::{AllocationMap, InventoryMap, ParseError, ParseMode};

/// Typed GPU entry in squeue's tres-alloc column, e.g. "gres/gpu:a100=2"
const TRES_GPU_PREFIX: &str = "gres/gpu:";

/// GPU entry in sinfo's GRES column, e.g. "gpu:a100:4(S:0)"
const GRES_GPU_PREFIX: &str = "gpu:";

/// Yield (1-based line number, content) for every non-blank line, with
/// surrounding whitespace and quote characters removed
fn records(output: &str) -> impl Iterator<Item = (usize, &str)> {
    output
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim().trim_matches('"')))
        .filter(|(_, line)| !line.is_empty())
}

/// Parse a GPU count; malformed text is zero unless `mode` is strict
fn parse_count(text: &str, token: &str, line: usize, mode: ParseMode) -> Result<f64, ParseError> {
    match text.trim().parse::<f64>() {
        Ok(count) => Ok(count),
        Err(_) if mode == ParseMode::Permissive => {
            debug!(line, token, "Treating malformed GPU count as zero");
            Ok(0.0)
        }
        Err(_) => Err(ParseError::InvalidCount {
            line,
            token: token.to_string(),
        }),
    }
}

/// Parse `squeue --Format=tres-alloc` output into allocated GPUs per type.
///
/// Each line is one running job, e.g.
/// `billing=30,cpu=1,gres/gpu:a100=2,gres/gpu=2,mem=100G,node=1`.
/// Only typed entries count; the untyped `gres/gpu=N` total is ignored.
pub fn parse_allocated_gpus(output: &str, mode: ParseMode) -> Result<AllocationMap, ParseError> {
    let mut gpus = AllocationMap::new();

    for (line_no, line) in records(output) {
        for resource in line.split(',') {
            let Some(descriptor) = resource.strip_prefix(TRES_GPU_PREFIX) else {
                continue;
            };

            let mut values = descriptor.split('=');
            let gpu_type = values.next().unwrap_or_default();
            let count = parse_count(values.next().unwrap_or_default(), resource, line_no, mode)?;

            *gpus.entry(gpu_type.to_string()).or_insert(0.0) += count;
        }
    }

    Ok(gpus)
}

/// Parse `sinfo --format="%n %G"` output into provisioned GPUs per type.
///
/// Each line is one node: its name, then a comma-separated GRES list such as
/// `gpu:RTX2070:2(S:0),gpu:v100:1`. Counts for a type on several nodes add up.
pub fn parse_total_gpus(output: &str, mode: ParseMode) -> Result<InventoryMap, ParseError> {
    let mut gpus = InventoryMap::new();

    for (line_no, line) in records(output) {
        let Some(gres) = line.split_whitespace().nth(1) else {
            if mode == ParseMode::Strict {
                return Err(ParseError::MissingGresField {
                    line: line_no,
                    text: line.to_string(),
                });
            }
            debug!(line = line_no, text = line, "Skipping node without GRES field");
            continue;
        };

        for resource in gres.split(',') {
            if !resource.starts_with(GRES_GPU_PREFIX) {
                continue;
            }

            // gpu:<type>:<count>(S:<sockets>)
            let mut segments = resource.split(':').skip(1);
            let gpu_type = segments.next().unwrap_or_default();
            let count_text = segments
                .next()
                .and_then(|s| s.split('(').next())
                .unwrap_or_default();
            let count = parse_count(count_text, resource, line_no, mode)?;

            *gpus.entry(gpu_type.to_string()).or_insert(0.0) += count;
        }
    }

    Ok(gpus)
}
