//! Local slice allocation with fractional borrow/lend.
//!
//! Splits each zone's endpoint deviation into a whole part, settled by
//! moving endpoints between local groups as in the plain local algorithm,
//! and a fractional part, settled through shared slice groups whose
//! routing weights implement fractions of an endpoint. A surplus of 0.4
//! endpoints for a zone becomes one shared endpoint reachable by that zone
//! with weight 0.4.

use crate::routing::queue::{assign_endpoints, EndpointDeviation, EndpointsList};
use crate::routing::RoutingAlgorithm;
use crate::topology::{EndpointSliceGroup, RegionInfo, SliceGroups, WeightedEndpoints};
use crate::RoutingError;

/// Weighted borrow/lend allocation without float-to-int approximation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWeightedSliceAlgorithm;

impl RoutingAlgorithm for LocalWeightedSliceAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        if region.zones.is_empty() {
            return Err(RoutingError::NilZoneDetails);
        }
        let mut slice_groups = SliceGroups::new();
        let mut endpoints_available = EndpointsList::default();
        let mut endpoints_needed = EndpointsList::default();
        let mut weighted_available = EndpointsList::default();
        let mut weighted_needed = EndpointsList::default();

        for (name, zone) in &region.zones {
            let mut local = EndpointSliceGroup::local_to(name);

            let expected = region.expected_endpoints(name);
            // negative: this zone needs endpoints, positive: it has spares
            let deviation = zone.endpoints as f64 - expected;
            let int_deviation = deviation.trunc() as i64;
            let mut owned = WeightedEndpoints {
                number: 0,
                weight: 1.0,
            };
            if int_deviation == 0 {
                owned.number = expected as i64;
            } else if int_deviation > 0 {
                endpoints_available.push_back(EndpointDeviation::new(name.clone(), int_deviation));
                owned.number = expected as i64;
            } else {
                endpoints_needed.push_back(EndpointDeviation::new(name.clone(), -int_deviation));
                owned.number = zone.endpoints;
            }
            local.composition.insert(name.clone(), owned);
            slice_groups.insert(name.clone(), local);

            // The decimal remainder becomes a one-endpoint share: a zone
            // with 0.7 spare endpoints keeps one endpoint at weight 0.3
            // for itself and lends the remaining 0.7 out.
            let decimal = deviation - int_deviation as f64;
            if decimal > 0.0 {
                weighted_available.push_back(EndpointDeviation {
                    name: name.clone(),
                    deviation: 1,
                    weight: 1.0 - decimal,
                    consume_by_local: true,
                });
            } else if decimal < 0.0 {
                weighted_needed.push_back(EndpointDeviation::with_weight(
                    name.clone(),
                    1,
                    -decimal,
                ));
            }
        }

        balance_slice_groups(
            &mut endpoints_available,
            &mut endpoints_needed,
            &mut weighted_available,
            &mut weighted_needed,
            &mut slice_groups,
        );
        Ok(slice_groups)
    }
}

fn balance_slice_groups(
    endpoints_available: &mut EndpointsList,
    endpoints_needed: &mut EndpointsList,
    weighted_available: &mut EndpointsList,
    weighted_needed: &mut EndpointsList,
    slice_groups: &mut SliceGroups,
) {
    // Whole endpoints first. Receivers the available list cannot satisfy
    // are demoted to the weighted list and settled as partial endpoints.
    while let Some(mut receiver) = endpoints_needed.pop_front() {
        if endpoints_available.is_empty() {
            receiver.weight = 1.0;
            weighted_needed.push_back(receiver);
            continue;
        }
        assign_endpoints(&mut receiver, endpoints_available, slice_groups);
        if receiver.deviation > 0 {
            receiver.weight = 1.0;
            weighted_needed.push_back(receiver);
        }
    }
    // Leftover whole endpoints join the weighted pool at weight 1.
    while let Some(mut extra) = endpoints_available.pop_front() {
        extra.weight = 1.0;
        weighted_available.push_back(extra);
    }

    // Distribute the fractional endpoints. Every available entry forms one
    // shared slice group whose label collects the zones it serves.
    while let Some(mut extra) = weighted_available.pop_front() {
        let mut shared = EndpointSliceGroup::new("shared");
        if extra.consume_by_local {
            // the home zone consumes its own fraction first, the rest is
            // lent out through the remaining weight
            shared
                .zone_traffic_weights
                .insert(extra.name.clone(), extra.weight);
            shared.label.push('-');
            shared.label.push_str(&extra.name);
            extra.weight = 1.0 - extra.weight;
            extra.consume_by_local = false;
        }
        shared.composition.insert(
            extra.name.clone(),
            WeightedEndpoints {
                number: extra.deviation,
                weight: 1.0,
            },
        );

        while let Some(receiver) = weighted_needed.front_mut() {
            let deviation =
                receiver.deviation as f64 * receiver.weight - extra.deviation as f64 * extra.weight;
            if deviation == 0.0 {
                *shared
                    .zone_traffic_weights
                    .entry(receiver.name.clone())
                    .or_insert(0.0) += extra.weight;
                shared.label.push('-');
                shared.label.push_str(&receiver.name);
                weighted_needed.pop_front();
                break;
            }
            if deviation > 0.0 {
                // receiver still needs more than this entry offers: grant
                // everything and leave the remainder in the list
                *shared
                    .zone_traffic_weights
                    .entry(receiver.name.clone())
                    .or_insert(0.0) += extra.weight;
                shared.label.push('-');
                shared.label.push_str(&receiver.name);
                receiver.deviation = 1;
                receiver.weight = deviation;
                break;
            }
            // receiver needs less than this entry offers: satisfy it and
            // move on to the next receiver
            let granted = receiver.deviation as f64 * receiver.weight / extra.deviation as f64;
            *shared
                .zone_traffic_weights
                .entry(receiver.name.clone())
                .or_insert(0.0) += granted;
            shared.label.push('-');
            shared.label.push_str(&receiver.name);
            extra.weight -= granted;
            weighted_needed.pop_front();
        }
        slice_groups.insert(shared.label.clone(), shared);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
