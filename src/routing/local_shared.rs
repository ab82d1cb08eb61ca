//! Local slice allocation that merges starved zones into shared groups.
//!
//! A variation of the local algorithm for regions where some zones have no
//! endpoints at all. Those zones are folded into one merged slice group
//! fed by the other zones' surplus, and zones whose deviation cannot be
//! kept below the threshold with whole endpoints get a shared group of
//! pooled extras. Configurations that still cannot be solved fall back to
//! [`OriginalAlgorithm`].

use crate::routing::queue::{
    endpoints_deviation, EndpointDeviation, EndpointsList, QueueOrdering, ZonePriorityQueue,
};
use crate::routing::{OriginalAlgorithm, RoutingAlgorithm};
use crate::topology::{EndpointSliceGroup, RegionInfo, SliceGroups};
use crate::RoutingError;
use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};

/// Borrow/lend allocation with urgent-zone merging.
#[derive(Debug, Clone, Copy)]
pub struct LocalSharedSliceAlgorithm {
    /// Maximum tolerated traffic load deviation per endpoint.
    threshold: f64,
}

impl LocalSharedSliceAlgorithm {
    pub fn new(threshold: f64) -> Result<Self, RoutingError> {
        if threshold < 0.0 {
            return Err(RoutingError::InvalidParameter(format!(
                "deviation threshold must be >= 0, got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    fn deviation_above_threshold(
        &self,
        zone: &str,
        region: &RegionInfo,
        slice_groups: &SliceGroups,
        delta: i64,
    ) -> bool {
        let size = slice_groups
            .get(zone)
            .map(|sg| sg.number_of_endpoints())
            .unwrap_or(0)
            + delta;
        region.expected_endpoints(zone) / size as f64 - 1.0 >= self.threshold
    }

    fn valid_contributor(&self, zone: &str, region: &RegionInfo, slice_groups: &SliceGroups) -> bool {
        let Some(sg) = slice_groups.get(zone) else {
            return false;
        };
        if sg.number_of_endpoints() == 1 {
            return false;
        }
        !self.deviation_above_threshold(zone, region, slice_groups, -1)
    }

    fn balance_slice_groups(
        &self,
        endpoints_needed: &mut EndpointsList,
        urgent: &mut EndpointsList,
        region: &RegionInfo,
        slice_groups: &mut SliceGroups,
        available: &mut ZonePriorityQueue,
        receivers: &mut ZonePriorityQueue,
    ) -> bool {
        available.init(region, slice_groups);

        // Merge the zero-endpoint zones into one shared group. Their
        // fractional expectations are summed exactly and converted to a
        // whole count only after the merge, to avoid accumulating
        // per-zone rounding error.
        let mut merged = EndpointSliceGroup::new("merged");
        let mut merged_label = String::from("merged");
        let mut expected_merged = 0.0;
        while let Some(urgent_zone) = urgent.pop_front() {
            merged_label.push('-');
            merged_label.push_str(&urgent_zone.name);
            expected_merged += urgent_zone.deviation as f64 * urgent_zone.weight;
            merged.zone_traffic_weights.insert(urgent_zone.name, 1.0);
        }
        let mut merged_ed = EndpointDeviation::new(merged_label.clone(), 0);
        if expected_merged >= 1.0 {
            // Constants assigned through f64 arithmetic can land a hair
            // below the intended decimal (1.4999998 for 1.5). Nudging at
            // the third decimal place restores the intended value before
            // rounding; the precision loss only ever shows up far behind
            // the decimal point.
            expected_merged = (expected_merged * 1000.0).ceil() / 1000.0;
            merged_ed.deviation = expected_merged.round() as i64;
        } else {
            // below one expected endpoint the shared group still must not
            // round down to empty
            merged_ed.deviation = expected_merged.ceil() as i64;
        }
        merged.label = merged_label.clone();
        if expected_merged != 0.0 {
            slice_groups.insert(merged_label, merged);
            endpoints_needed.push_front(merged_ed);
        }

        // Feed the needed list one endpoint at a time from the best
        // contributor.
        while let Some(receiver) = endpoints_needed.front_mut() {
            let Some(candidate) = available.pop(region, slice_groups) else {
                // nothing left to give: this input is better served by
                // another algorithm
                return false;
            };
            let receiver_name = receiver.name.clone();
            if let Some(sg) = slice_groups.get_mut(&candidate) {
                sg.add_endpoints(&candidate, -1, 1.0);
            }
            if let Some(sg) = slice_groups.get_mut(&receiver_name) {
                sg.add_endpoints(&candidate, 1, 1.0);
            }
            if self.valid_contributor(&candidate, region, slice_groups) {
                available.push(candidate, region, slice_groups);
            }
            let receiver = match endpoints_needed.front_mut() {
                Some(r) => r,
                None => break,
            };
            receiver.deviation -= 1;
            if receiver.deviation == 0 {
                endpoints_needed.pop_front();
            }
        }

        receivers.init(region, slice_groups);
        if !self.keep_deviation_below_threshold(available, receivers, region, slice_groups) {
            return false;
        }

        // Hand out whole surplus endpoints to the neediest zones, e.g.
        // (nodes, endpoints) (1 3, 2 2, 2 2): the floor approximation makes
        // nobody ask for endpoints, yet the first zone holds one too many.
        while let Some(candidate) = available.pop(region, slice_groups) {
            let Some(deviation) = endpoints_deviation(region, slice_groups, &candidate) else {
                warn!(zone = %candidate, "contributor without a slice group");
                return false;
            };
            if deviation < 1.0 {
                break;
            }
            let Some(receiver) = receivers.pop(region, slice_groups) else {
                break;
            };
            if let Some(sg) = slice_groups.get_mut(&receiver) {
                sg.add_endpoints(&candidate, 1, 1.0);
            }
            receivers.push(receiver, region, slice_groups);

            if let Some(sg) = slice_groups.get_mut(&candidate) {
                sg.add_endpoints(&candidate, -1, 1.0);
            }
            if self.valid_contributor(&candidate, region, slice_groups) {
                available.push(candidate, region, slice_groups);
            }
        }
        true
    }

    /// Bring every zone's deviation below the threshold, pooling extras
    /// into a shared group for the zones that cannot get there alone.
    fn keep_deviation_below_threshold(
        &self,
        available: &mut ZonePriorityQueue,
        receivers: &mut ZonePriorityQueue,
        region: &RegionInfo,
        slice_groups: &mut SliceGroups,
    ) -> bool {
        // the receiver pool is max-deviation first: once the front is below
        // the threshold, everything behind it is too
        let mut urgent_zones: Vec<String> = Vec::new();
        while !receivers.is_empty() {
            let Some(front) = receivers.peek() else {
                break;
            };
            if !self.deviation_above_threshold(front, region, slice_groups, 0) {
                break;
            }
            if let Some(zone) = receivers.pop(region, slice_groups) {
                urgent_zones.push(zone);
            }
        }
        if urgent_zones.is_empty() {
            return true;
        }

        let mut extra_endpoints: BTreeMap<String, i64> = BTreeMap::new();
        let mut extra_number = 0usize;
        // With one extra endpoint per urgent zone, every urgent zone lands
        // below the threshold on its own.
        while extra_number < urgent_zones.len() {
            if let Some(candidate) = available.peek().map(str::to_string) {
                let Some(deviation) = endpoints_deviation(region, slice_groups, &candidate) else {
                    warn!(zone = %candidate, "contributor without a slice group");
                    return false;
                };
                // zones holding whole extra endpoints give them up directly
                if deviation >= 1.0 {
                    available.pop(region, slice_groups);
                    *extra_endpoints.entry(candidate.clone()).or_insert(0) += 1;
                    extra_number += 1;
                    if let Some(sg) = slice_groups.get_mut(&candidate) {
                        sg.add_endpoints(&candidate, -1, 1.0);
                    }
                    if self.valid_contributor(&candidate, region, slice_groups) {
                        available.push(candidate, region, slice_groups);
                    }
                    continue;
                }
            }
            // not enough absolute extras: check whether what we have makes
            // a shared group below the threshold
            if self.sufficient_for_shared_slice(&urgent_zones, region, slice_groups, extra_number) {
                create_shared_slice(&urgent_zones, &extra_endpoints, slice_groups);
                return true;
            }
            // otherwise ask zones that would stay below the threshold after
            // giving one more endpoint out
            if self.collect_extras_for_shared_slice(
                available,
                &mut extra_endpoints,
                &urgent_zones,
                region,
                slice_groups,
            ) {
                create_shared_slice(&urgent_zones, &extra_endpoints, slice_groups);
                return true;
            }
            return false;
        }

        // one extra endpoint per urgent zone, assigned in sorted order
        let mut pending: VecDeque<&String> = urgent_zones.iter().collect();
        for (zone, count) in &extra_endpoints {
            let mut remaining = *count;
            while remaining > 0 {
                let Some(urgent_zone) = pending.pop_front() else {
                    break;
                };
                if let Some(sg) = slice_groups.get_mut(urgent_zone) {
                    sg.add_endpoints(zone, 1, 1.0);
                }
                remaining -= 1;
            }
        }
        true
    }

    /// Whether `extra_number` pooled endpoints plus the urgent zones' own
    /// groups form a shared group with deviation below the threshold.
    fn sufficient_for_shared_slice(
        &self,
        urgent_zones: &[String],
        region: &RegionInfo,
        slice_groups: &SliceGroups,
        extra_number: usize,
    ) -> bool {
        let mut total_endpoints = extra_number as i64;
        for zone in urgent_zones {
            total_endpoints += slice_groups
                .get(zone)
                .map(|sg| sg.number_of_endpoints())
                .unwrap_or(0);
        }
        let mut traffic_load = 0.0;
        for zone in urgent_zones {
            traffic_load += region.expected_endpoints(zone) / total_endpoints as f64;
        }
        traffic_load - 1.0 < self.threshold
    }

    /// Keep draining contributors until the pooled extras are sufficient
    /// for a below-threshold shared group.
    fn collect_extras_for_shared_slice(
        &self,
        available: &mut ZonePriorityQueue,
        extra_endpoints: &mut BTreeMap<String, i64>,
        urgent_zones: &[String],
        region: &RegionInfo,
        slice_groups: &mut SliceGroups,
    ) -> bool {
        let mut extra_number: usize = extra_endpoints.values().map(|n| *n as usize).sum();
        while !self.sufficient_for_shared_slice(urgent_zones, region, slice_groups, extra_number) {
            let Some(candidate) = available.pop(region, slice_groups) else {
                return false;
            };
            if let Some(sg) = slice_groups.get_mut(&candidate) {
                sg.add_endpoints(&candidate, -1, 1.0);
            }
            if self.valid_contributor(&candidate, region, slice_groups) {
                available.push(candidate.clone(), region, slice_groups);
            }
            extra_number += 1;
            *extra_endpoints.entry(candidate).or_insert(0) += 1;
        }
        true
    }
}

/// Build the shared group for zones stuck above the threshold: they donate
/// their whole local groups, the pooled extras are added on top, and each
/// urgent zone routes to the result with weight 1.
fn create_shared_slice(
    urgent_zones: &[String],
    extra_endpoints: &BTreeMap<String, i64>,
    slice_groups: &mut SliceGroups,
) {
    let mut label = String::from("shared");
    let mut shared = EndpointSliceGroup::default();
    for urgent_zone in urgent_zones {
        label.push('-');
        label.push_str(urgent_zone);
        if let Some(group) = slice_groups.remove(urgent_zone) {
            for (zone, contribution) in group.composition {
                shared.add_endpoints(&zone, contribution.number, contribution.weight);
            }
        }
        shared.zone_traffic_weights.insert(urgent_zone.clone(), 1.0);
    }
    for (zone, number) in extra_endpoints {
        shared.add_endpoints(zone, *number, 1.0);
    }
    shared.label = label.clone();
    slice_groups.insert(label, shared);
}

impl RoutingAlgorithm for LocalSharedSliceAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        if region.zones.is_empty() {
            return Err(RoutingError::NilZoneDetails);
        }
        // This algorithm handles small corner cases poorly; below one
        // endpoint per zone the original algorithm simply does better.
        if region.total_endpoints < region.zones.len() as i64 {
            return OriginalAlgorithm.create_slice_groups(region);
        }

        let mut slice_groups = SliceGroups::new();
        let mut endpoints_needed = EndpointsList::default();
        let mut urgent = EndpointsList::default();
        let mut available = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, false);
        let mut receivers = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, true);

        for (name, zone) in &region.zones {
            let expected = region.expected_endpoints(name);
            // negative: needs endpoints from others, positive: has spares
            let deviation = zone.endpoints as f64 - expected;
            if zone.endpoints == 0 {
                // keep the exact fractional deficit; the merge converts to
                // a whole count only after summing all urgent zones
                urgent.push_back(EndpointDeviation::with_weight(name.clone(), 1, -deviation));
                continue;
            }
            let mut local = EndpointSliceGroup::local_to(name);
            local.add_endpoints(name, zone.endpoints, 1.0);
            slice_groups.insert(name.clone(), local);

            if self.valid_contributor(name, region, &slice_groups) {
                available.enroll(name.clone());
            }
            receivers.enroll(name.clone());

            // a deficit in (-1, 0) truncates to zero whole endpoints
            if deviation <= -1.0 {
                endpoints_needed
                    .push_back(EndpointDeviation::new(name.clone(), (-deviation) as i64));
            }
        }

        if !self.balance_slice_groups(
            &mut endpoints_needed,
            &mut urgent,
            region,
            &mut slice_groups,
            &mut available,
            &mut receivers,
        ) {
            info!("local shared allocation unsolvable, switching to the original algorithm");
            return OriginalAlgorithm.create_slice_groups(region);
        }
        Ok(slice_groups)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Zone;

    fn region(zones: &[(&str, i64, i64)]) -> RegionInfo {
        RegionInfo::from_zones(
            zones
                .iter()
                .map(|(name, nodes, endpoints)| Zone::new(*name, *nodes, *endpoints))
                .collect(),
        )
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")))
    }

    fn run(region: &RegionInfo) -> SliceGroups {
        LocalSharedSliceAlgorithm::new(0.5)
            .and_then(|alg| alg.create_slice_groups(region))
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: alg: {e}")))
    }

    fn composition(groups: &SliceGroups, label: &str) -> Vec<(String, i64)> {
        groups[label]
            .composition
            .iter()
            .filter(|(_, w)| w.number != 0)
            .map(|(zone, w)| (zone.clone(), w.number))
            .collect()
    }

    #[test]
    fn test_two_zones_without_endpoints_get_merged_group() {
        let region = region(&[("a", 30, 100), ("b", 30, 0), ("c", 30, 0)]);
        let groups = run(&region);

        assert_eq!(groups.len(), 2);
        assert_eq!(composition(&groups, "a"), vec![("a".into(), 33)]);
        let merged = &groups["merged-b-c"];
        assert_eq!(merged.composition_of("a").number, 67);
        assert_eq!(merged.traffic_weight_of("b"), 1.0);
        assert_eq!(merged.traffic_weight_of("c"), 1.0);
        assert_eq!(merged.traffic_weight_of("a"), 0.0);
    }

    #[test]
    fn test_single_endpoint_region_falls_back_to_original() {
        let region = region(&[("a", 30, 1), ("b", 30, 0), ("c", 30, 0)]);
        let groups = run(&region);
        assert_eq!(groups.len(), 1);
        assert_eq!(composition(&groups, "global"), vec![("a".into(), 1)]);
        for zone in ["a", "b", "c"] {
            assert_eq!(groups["global"].traffic_weight_of(zone), 1.0);
        }
    }

    #[test]
    fn test_mostly_balanced_region_spreads_one_extra() {
        let region = region(&[("a", 1, 3), ("b", 2, 2), ("c", 2, 2)]);
        let groups = run(&region);
        assert_eq!(composition(&groups, "a"), vec![("a".into(), 2)]);
        assert_eq!(
            composition(&groups, "b"),
            vec![("a".into(), 1), ("b".into(), 2)]
        );
        assert_eq!(composition(&groups, "c"), vec![("c".into(), 2)]);
    }

    #[test]
    fn test_merged_group_draws_from_both_contributors() {
        let region = region(&[("a", 3, 0), ("b", 6, 70), ("c", 8, 100)]);
        let groups = run(&region);
        assert_eq!(composition(&groups, "b"), vec![("b".into(), 60)]);
        assert_eq!(composition(&groups, "c"), vec![("c".into(), 80)]);
        assert_eq!(
            composition(&groups, "merged-a"),
            vec![("b".into(), 10), ("c".into(), 20)]
        );
        assert_eq!(groups["merged-a"].traffic_weight_of("a"), 1.0);
    }

    #[test]
    fn test_urgent_zone_receives_absolute_extra() {
        let region = region(&[("a", 7, 1), ("b", 8, 1), ("c", 10, 5)]);
        let groups = run(&region);
        assert_eq!(
            composition(&groups, "a"),
            vec![("a".into(), 1), ("c".into(), 1)]
        );
        assert_eq!(
            composition(&groups, "b"),
            vec![("b".into(), 1), ("c".into(), 1)]
        );
        assert_eq!(composition(&groups, "c"), vec![("c".into(), 3)]);
    }

    #[test]
    fn test_shared_group_from_relative_extras() {
        let region = region(&[("a", 7, 1), ("b", 8, 3), ("c", 10, 3)]);
        let groups = run(&region);
        let shared = &groups["shared-a"];
        assert_eq!(
            composition(&groups, "shared-a"),
            vec![("a".into(), 1), ("b".into(), 1)]
        );
        assert_eq!(shared.traffic_weight_of("a"), 1.0);
        assert_eq!(composition(&groups, "b"), vec![("b".into(), 2)]);
        assert_eq!(composition(&groups, "c"), vec![("c".into(), 3)]);
    }

    #[test]
    fn test_tight_region_gets_one_extra_via_pooling() {
        let region = region(&[("a", 245, 1), ("b", 370, 2), ("c", 385, 5)]);
        let groups = run(&region);
        assert_eq!(
            composition(&groups, "a"),
            vec![("a".into(), 1), ("c".into(), 1)]
        );
        assert_eq!(composition(&groups, "b"), vec![("b".into(), 2)]);
        assert_eq!(composition(&groups, "c"), vec![("c".into(), 4)]);
    }

    #[test]
    fn test_three_urgent_zones_share_one_group() {
        let region = region(&[("a", 16, 1), ("b", 16, 1), ("c", 16, 1), ("d", 42, 6)]);
        let groups = run(&region);
        let shared = &groups["shared-a-b-c"];
        assert_eq!(
            composition(&groups, "shared-a-b-c"),
            vec![
                ("a".into(), 1),
                ("b".into(), 1),
                ("c".into(), 1),
                ("d".into(), 1)
            ]
        );
        for zone in ["a", "b", "c"] {
            assert_eq!(shared.traffic_weight_of(zone), 1.0);
        }
        assert_eq!(shared.traffic_weight_of("d"), 0.0);
        assert_eq!(composition(&groups, "d"), vec![("d".into(), 5)]);
    }

    #[test]
    fn test_merged_and_shared_groups_coexist() {
        let region = region(&[("a", 16, 0), ("b", 16, 1), ("c", 16, 1), ("d", 42, 7)]);
        let groups = run(&region);
        assert_eq!(composition(&groups, "merged-a"), vec![("d".into(), 2)]);
        assert_eq!(groups["merged-a"].traffic_weight_of("a"), 1.0);
        assert_eq!(
            composition(&groups, "shared-b-c"),
            vec![("b".into(), 1), ("c".into(), 1), ("d".into(), 1)]
        );
        assert_eq!(groups["shared-b-c"].traffic_weight_of("b"), 1.0);
        assert_eq!(groups["shared-b-c"].traffic_weight_of("c"), 1.0);
        assert_eq!(composition(&groups, "d"), vec![("d".into(), 4)]);
    }

    #[test]
    fn test_starved_merge_falls_back_to_original() {
        // the only contributor dries up before the merged group is fed
        let region = region(&[("a", 1, 0), ("b", 6, 0), ("c", 7, 3)]);
        let groups = run(&region);
        assert_eq!(groups.len(), 1);
        assert_eq!(composition(&groups, "global"), vec![("c".into(), 3)]);
        for zone in ["a", "b", "c"] {
            assert_eq!(groups["global"].traffic_weight_of(zone), 1.0);
        }
    }

    #[test]
    fn test_fractional_expectations_merge_to_whole_count() {
        // per-zone expectations 0.714 and 4.286 merge to exactly five
        let region = region(&[("a", 1, 0), ("b", 6, 0), ("c", 7, 10)]);
        let groups = run(&region);
        let merged = &groups["merged-a-b"];
        assert_eq!(merged.number_of_endpoints(), 5);
        assert_eq!(merged.traffic_weight_of("a"), 1.0);
        assert_eq!(merged.traffic_weight_of("b"), 1.0);
    }

    #[test]
    fn test_rejects_negative_threshold() {
        assert!(matches!(
            LocalSharedSliceAlgorithm::new(-0.5),
            Err(RoutingError::InvalidParameter(_))
        ));
    }
}
