// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use tracing::warn;

use super::types::{AllocationMap, GpuMetricRecord, GpuMetrics, InventoryMap};

/// Join allocated and provisioned counts into one record per GPU type.
///
/// Output is keyed by the inventory only. A type that running jobs hold but
/// no node reports (e.g. a node drained mid-job) is left out and logged.
pub fn aggregate(alloc: &AllocationMap, totals: &InventoryMap) -> GpuMetrics {
    let mut dropped: Vec<&str> = alloc
        .keys()
        .filter(|gpu_type| !totals.contains_key(*gpu_type))
        .map(String::as_str)
        .collect();
    if !dropped.is_empty() {
        dropped.sort_unstable();
        warn!(types = ?dropped, "Allocated GPU types missing from node inventory");
    }

    totals
        .iter()
        .map(|(gpu_type, &total)| {
            let allocated = alloc.get(gpu_type).copied().unwrap_or(0.0);
            (gpu_type.clone(), GpuMetricRecord::new(allocated, total))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, f64)]) -> std::collections::HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_aggregate_basic() {
        let metrics = aggregate(&map(&[("a100", 2.0)]), &map(&[("a100", 4.0)]));

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics["a100"], GpuMetricRecord::new(2.0, 4.0));
        assert_eq!(metrics["a100"].utilization, 0.5);
    }

    #[test]
    fn test_aggregate_missing_alloc_defaults_to_zero() {
        let metrics = aggregate(&map(&[]), &map(&[("v100", 8.0), ("k80", 2.0)]));

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["v100"].alloc, 0.0);
        assert_eq!(metrics["v100"].idle, 8.0);
        assert_eq!(metrics["v100"].utilization, 0.0);
        assert_eq!(metrics["k80"].idle, 2.0);
    }

    #[test]
    fn test_aggregate_drops_types_missing_from_inventory() {
        let metrics = aggregate(&map(&[("a100", 2.0), ("h100", 1.0)]), &map(&[("a100", 4.0)]));

        assert_eq!(metrics.len(), 1);
        assert!(!metrics.contains_key("h100"));
    }

    #[test]
    fn test_aggregate_invariants() {
        let alloc = map(&[("a", 1.0), ("b", 3.0), ("c", 0.0)]);
        let totals = map(&[("a", 3.0), ("b", 3.0), ("c", 7.0), ("d", 0.0)]);

        for (gpu_type, record) in aggregate(&alloc, &totals) {
            assert_eq!(record.idle, record.total - record.alloc, "{gpu_type}");
            if record.total > 0.0 {
                assert!(record.utilization >= 0.0);
                assert_eq!(record.utilization, record.alloc / record.total);
            } else {
                assert!(!record.utilization.is_finite(), "{gpu_type}");
            }
        }
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(&map(&[]), &map(&[])).is_empty());
        assert!(aggregate(&map(&[("a100", 1.0)]), &map(&[])).is_empty());
    }
}
