//! Cross-algorithm invariants.
//!
//! Every routing algorithm, over every valid region, must conserve
//! endpoints (back-propagation repackages but keeps per-zone totals),
//! keep weights non-negative, cover every zone with at least one slice
//! group, and produce simulator results inside their documented bounds.

use sliceroute::routing::{new_algorithm, RoutingAlgorithm};
use sliceroute::simulator::{TheoreticalSimulator, TrafficSimulator};
use sliceroute::topology::{RegionInfo, SliceGroups, Zone};

const ALGORITHMS: [&str; 7] = [
    "Original",
    "SharedGlobal",
    "SharedMultiZone",
    "Local",
    "LocalWeighted",
    "LocalShared",
    "BackPropagation",
];

fn fixtures() -> Vec<RegionInfo> {
    let specs: Vec<Vec<(&str, i64, i64)>> = vec![
        vec![("a", 30, 60), ("b", 35, 70), ("c", 50, 80)],
        vec![("a", 1, 5), ("b", 2, 20), ("c", 7, 20)],
        vec![("a", 1, 0), ("b", 1, 6), ("c", 1, 7)],
        vec![("a", 30, 100), ("b", 30, 0), ("c", 30, 0)],
        vec![("a", 16, 1), ("b", 16, 1), ("c", 16, 1), ("d", 42, 6)],
        vec![("a", 1, 1)],
        vec![("a", 0, 3), ("b", 5, 3)],
        vec![("a", 245, 1), ("b", 370, 2), ("c", 385, 5)],
    ];
    specs
        .into_iter()
        .map(|zones| {
            RegionInfo::from_zones(
                zones
                    .into_iter()
                    .map(|(name, nodes, endpoints)| Zone::new(name, nodes, endpoints))
                    .collect(),
            )
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")))
        })
        .collect()
}

fn groups_for(name: &str, region: &RegionInfo) -> SliceGroups {
    new_algorithm(name)
        .create_slice_groups(region)
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: {name}: {e}")))
}

// ── Property: endpoint conservation ─────────────────────────────────────

#[test]
fn endpoints_are_conserved_per_zone() {
    for region in fixtures() {
        for name in ALGORITHMS {
            let groups = groups_for(name, &region);
            for (zone, details) in &region.zones {
                let held: i64 = groups
                    .values()
                    .map(|sg| sg.composition_of(zone).number)
                    .sum();
                assert_eq!(
                    held, details.endpoints,
                    "{name}: zone {zone} holds {held}, expected {}",
                    details.endpoints
                );
            }
        }
    }
}

// ── Property: weight non-negativity ─────────────────────────────────────

#[test]
fn weights_are_non_negative() {
    for region in fixtures() {
        for name in ALGORITHMS {
            for group in groups_for(name, &region).values() {
                for entry in group.composition.values() {
                    assert!(entry.number >= 0, "{name}: group {}", group.label);
                    assert!(entry.weight >= 0.0, "{name}: group {}", group.label);
                }
                for weight in group.zone_traffic_weights.values() {
                    assert!(*weight >= 0.0, "{name}: group {}", group.label);
                }
            }
        }
    }
}

// ── Property: zone coverage ─────────────────────────────────────────────

#[test]
fn every_zone_is_covered_by_some_group() {
    for region in fixtures() {
        for name in ALGORITHMS {
            let groups = groups_for(name, &region);
            if groups.is_empty() {
                // only reachable for a region without endpoints
                assert_eq!(region.total_endpoints, 0, "{name}");
                continue;
            }
            for zone in region.zones.keys() {
                let covered = groups
                    .values()
                    .any(|sg| sg.zone_traffic_weights.contains_key(zone));
                assert!(covered, "{name}: zone {zone} reaches no slice group");
            }
        }
    }
}

// ── Property: simulator bounds and determinism ──────────────────────────

#[test]
fn simulated_metrics_stay_in_bounds() {
    for region in fixtures() {
        for name in ALGORITHMS {
            let groups = groups_for(name, &region);
            if groups.is_empty() {
                continue;
            }
            let result = TheoreticalSimulator
                .simulate(&region, &groups)
                .unwrap_or_else(|e| std::panic::panic_any(format!("test: {name}: {e}")));
            assert!(
                (0.0..=1.0 + 1e-9).contains(&result.in_zone_traffic),
                "{name}: in-zone {}",
                result.in_zone_traffic
            );
            assert!(result.mean_deviation >= 0.0, "{name}");
            assert!(result.max_deviation >= 0.0, "{name}");
            assert!(result.deviation_sd >= 0.0, "{name}");
        }
    }
}

#[test]
fn simulation_is_deterministic_across_algorithms() {
    for region in fixtures() {
        for name in ALGORITHMS {
            let groups = groups_for(name, &region);
            if groups.is_empty() {
                continue;
            }
            let first = TheoreticalSimulator
                .simulate(&region, &groups)
                .unwrap_or_else(|e| std::panic::panic_any(format!("test: {name}: {e}")));
            let second = TheoreticalSimulator
                .simulate(&region, &groups)
                .unwrap_or_else(|e| std::panic::panic_any(format!("test: {name}: {e}")));
            assert_eq!(first, second, "{name}");
        }
    }
}

// ── Property: balanced regions stay local ───────────────────────────────

#[test]
fn balanced_regions_keep_traffic_in_zone() {
    // node share equals endpoint share for every zone; the local
    // algorithms keep every endpoint at home
    let region = RegionInfo::from_zones(vec![
        Zone::new("a", 1, 10),
        Zone::new("b", 2, 20),
        Zone::new("c", 1, 10),
    ])
    .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));

    for name in ["Local", "LocalShared"] {
        let groups = groups_for(name, &region);
        let result = TheoreticalSimulator
            .simulate(&region, &groups)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: {name}: {e}")));
        assert!(
            result.in_zone_traffic >= 1.0 - 1e-9,
            "{name}: in-zone {}",
            result.in_zone_traffic
        );
    }
}

// ── Property: fallback equals the original allocation ───────────────────

#[test]
fn local_fallback_matches_original_output() {
    // one endpoint across three zones is unsolvable for the borrow/lend
    // loop; the output must be exactly the original allocation
    let region = RegionInfo::from_zones(vec![
        Zone::new("a", 30, 1),
        Zone::new("b", 30, 0),
        Zone::new("c", 30, 0),
    ])
    .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));

    let original = groups_for("Original", &region);
    assert_eq!(groups_for("Local", &region), original);
    assert_eq!(groups_for("LocalShared", &region), original);
}

#[test]
fn local_shared_fallback_matches_original_output() {
    // the only contributor dries up while feeding the merged group
    let region = RegionInfo::from_zones(vec![
        Zone::new("a", 1, 0),
        Zone::new("b", 6, 0),
        Zone::new("c", 7, 3),
    ])
    .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));

    let original = groups_for("Original", &region);
    assert_eq!(groups_for("LocalShared", &region), original);
}
