//! Local slice allocation: one slice group per zone, balanced by
//! borrowing and lending whole endpoints between zones.
//!
//! The node share of a zone is treated as its incoming traffic fraction
//! and compared with its endpoint share. Zones holding fewer endpoints
//! than their node share receive endpoints from zones with surplus, driven
//! by two priority queues, until every zone's traffic load deviation drops
//! below the threshold. A second pass then spreads remaining surplus to
//! the neediest zones, trading in-zone traffic for a smaller maximum
//! deviation. Configurations the borrow/lend loop cannot solve fall back
//! to [`OriginalAlgorithm`].

use crate::routing::queue::{endpoints_deviation, QueueOrdering, ZonePriorityQueue};
use crate::routing::{OriginalAlgorithm, RoutingAlgorithm};
use crate::topology::{EndpointSliceGroup, RegionInfo, SliceGroups};
use crate::RoutingError;
use tracing::{info, warn};

/// Integer borrow/lend allocation with deviation-threshold feedback.
#[derive(Debug, Clone, Copy)]
pub struct LocalSliceAlgorithm {
    /// Maximum tolerated traffic load deviation per zone.
    threshold: f64,
    /// Minimum mean endpoints per zone before the algorithm activates;
    /// smaller regions are handled by the original algorithm.
    starting_threshold: i64,
}

impl LocalSliceAlgorithm {
    pub fn new(threshold: f64, starting_threshold: i64) -> Result<Self, RoutingError> {
        if threshold < 0.0 {
            return Err(RoutingError::InvalidParameter(format!(
                "deviation threshold must be >= 0, got {threshold}"
            )));
        }
        if starting_threshold < 0 {
            return Err(RoutingError::InvalidParameter(format!(
                "starting threshold must be >= 0, got {starting_threshold}"
            )));
        }
        Ok(Self {
            threshold,
            starting_threshold,
        })
    }

    /// Whether the zone's traffic load deviation would sit at or above the
    /// threshold after a hypothetical change of `delta` endpoints.
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
        let deviation = region.expected_endpoints(zone) / size as f64 - 1.0;
        deviation >= self.threshold
    }

    /// A zone may give an endpoint out when its group keeps more than one
    /// endpoint and stays below the threshold afterwards.
    fn valid_contributor(&self, zone: &str, region: &RegionInfo, slice_groups: &SliceGroups) -> bool {
        let Some(sg) = slice_groups.get(zone) else {
            return false;
        };
        if sg.composition.is_empty() || sg.number_of_endpoints() <= 1 {
            return false;
        }
        !self.deviation_above_threshold(zone, region, slice_groups, -1)
    }

    /// Borrow/lend between zones. Returns false when some receiver cannot
    /// be brought below the threshold.
    fn balance_slice_groups(
        &self,
        available: &mut ZonePriorityQueue,
        receivers: &mut ZonePriorityQueue,
        zone_pool: &mut ZonePriorityQueue,
        region: &RegionInfo,
        slice_groups: &mut SliceGroups,
    ) -> bool {
        available.init(region, slice_groups);
        receivers.init(region, slice_groups);

        // First round: bring every receiver below the threshold.
        while let Some(receiver) = receivers.pop(region, slice_groups) {
            while !available.is_empty() {
                if !self.deviation_above_threshold(&receiver, region, slice_groups, 0) {
                    break;
                }
                let Some(candidate) = available.pop(region, slice_groups) else {
                    break;
                };
                move_endpoint(&candidate, &receiver, slice_groups);
                if self.valid_contributor(&candidate, region, slice_groups) {
                    available.push(candidate, region, slice_groups);
                }
            }
            if self.deviation_above_threshold(&receiver, region, slice_groups, 0) {
                return false;
            }
        }

        // Second round: spread remaining whole surplus endpoints to the
        // zones furthest below their expected count. Costs in-zone traffic,
        // buys a smaller mean deviation.
        zone_pool.init(region, slice_groups);
        while let Some(candidate) = available.pop(region, slice_groups) {
            let Some(mut deviation) = endpoints_deviation(region, slice_groups, &candidate) else {
                warn!(zone = %candidate, "no slice group while computing deviation");
                continue;
            };
            if deviation < 1.0 {
                break;
            }
            while !zone_pool.is_empty() {
                let Some(receiver) = zone_pool.pop(region, slice_groups) else {
                    break;
                };
                let Some(mut receiver_deviation) =
                    endpoints_deviation(region, slice_groups, &receiver)
                else {
                    warn!(zone = %receiver, "no slice group while computing deviation");
                    continue;
                };
                // every zone already sits at or above the floor of its
                // expected count: nothing left to spread
                if receiver_deviation > -1.0 {
                    return true;
                }
                while deviation >= 1.0 && receiver_deviation <= -1.0 {
                    move_endpoint(&candidate, &receiver, slice_groups);
                    deviation -= 1.0;
                    receiver_deviation += 1.0;
                }
                zone_pool.push(receiver, region, slice_groups);
                if deviation < 1.0 {
                    break;
                }
            }
        }
        true
    }
}

/// Move one endpoint from the candidate's group into the receiver's.
fn move_endpoint(candidate: &str, receiver: &str, slice_groups: &mut SliceGroups) {
    if let Some(sg) = slice_groups.get_mut(receiver) {
        sg.add_endpoints(candidate, 1, 1.0);
    }
    if let Some(sg) = slice_groups.get_mut(candidate) {
        sg.add_endpoints(candidate, -1, 1.0);
    }
}

impl RoutingAlgorithm for LocalSliceAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        if region.zones.is_empty() {
            return Err(RoutingError::NilZoneDetails);
        }
        if region.total_endpoints < self.starting_threshold * region.zones.len() as i64 {
            return OriginalAlgorithm.create_slice_groups(region);
        }

        let mut slice_groups = SliceGroups::new();
        // zones still below the threshold after giving one endpoint out
        let mut available = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, false);
        // zones above the threshold that need endpoints from others
        let mut receivers = ZonePriorityQueue::new(QueueOrdering::TrafficLoad, true);
        // every zone, for the second rebalance round
        let mut zone_pool = ZonePriorityQueue::new(QueueOrdering::SignedDeviation, true);

        for (name, zone) in &region.zones {
            let mut local = EndpointSliceGroup::local_to(name);
            if zone.endpoints != 0 {
                local.add_endpoints(name, zone.endpoints, 1.0);
            }
            slice_groups.insert(name.clone(), local);

            if self.valid_contributor(name, region, &slice_groups) {
                available.enroll(name.clone());
            }
            if self.deviation_above_threshold(name, region, &slice_groups, 0) {
                receivers.enroll(name.clone());
            }
            zone_pool.enroll(name.clone());
        }

        if !self.balance_slice_groups(
            &mut available,
            &mut receivers,
            &mut zone_pool,
            region,
            &mut slice_groups,
        ) {
            info!("local allocation unsolvable, switching to the original algorithm");
            return OriginalAlgorithm.create_slice_groups(region);
        }
        Ok(slice_groups)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
