//! # Theoretical Traffic Simulator
//!
//! ## Responsibility
//! Compute the closed-form steady-state traffic distribution a set of
//! slice groups produces over a region: where each zone's traffic lands,
//! how loaded every endpoint is, and how far the loads deviate from the
//! uniform ideal.
//!
//! ## Guarantees
//! - Deterministic: identical inputs produce bit-identical results; there
//!   is no randomness anywhere.
//! - Pure: neither the region nor the slice groups are mutated.
//!
//! ## NOT Responsible For
//! - Producing slice groups (see `routing`)
//! - Scoring results into a report (see `process`)
//!
//! Traffic is modelled as a two-step random routing decision: a client in
//! zone z picks a slice group with probability proportional to
//! `|group| × zone_traffic_weights[z]`, then picks an endpoint inside the
//! group with probability proportional to its weight.

use crate::topology::{RegionInfo, SliceGroups};
use crate::RoutingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Endpoint-level load detail for one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointsTraffic {
    /// Per-endpoint traffic load of this zone's endpoints, by slice group.
    pub load_by_group: BTreeMap<String, f64>,
    /// Per-endpoint load deviation from the uniform ideal, by slice group.
    pub deviation_by_group: BTreeMap<String, f64>,
    /// Label of the slice group carrying the largest absolute deviation.
    pub max_deviation_group: String,
    /// Mean absolute deviation over this zone's endpoints.
    pub mean_deviation: f64,
}

/// Traffic arriving at and leaving one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneTraffic {
    /// Zone this record describes.
    pub zone_name: String,
    /// Fraction of all traffic this zone receives.
    pub incoming: f64,
    /// Fraction of all traffic flowing from this zone to each zone.
    pub outgoing: BTreeMap<String, f64>,
    /// Incoming traffic relative to the zone's endpoint share; 1.0 is
    /// perfectly balanced.
    pub traffic_load: f64,
    /// Endpoint-level detail.
    pub detail: EndpointsTraffic,
}

/// Scalar quality metrics of one simulated allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Set when the configuration admits no meaningful per-endpoint
    /// statistics (a region without endpoints).
    pub invalid: bool,
    /// Fraction of traffic served inside its origin zone.
    pub in_zone_traffic: f64,
    /// Per-zone traffic records.
    pub traffic_distribution: BTreeMap<String, ZoneTraffic>,
    /// Largest absolute per-endpoint load deviation.
    pub max_deviation: f64,
    /// Mean absolute per-endpoint load deviation.
    pub mean_deviation: f64,
    /// Standard deviation of the per-endpoint load deviation.
    pub deviation_sd: f64,
}

/// A traffic simulator: derives a [`SimulationResult`] from a region and
/// its slice groups.
pub trait TrafficSimulator {
    fn simulate(
        &self,
        region: &RegionInfo,
        slice_groups: &SliceGroups,
    ) -> Result<SimulationResult, RoutingError>;
}

/// The closed-form analytical simulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TheoreticalSimulator;

#[derive(Default)]
struct ZoneDetail {
    /// endpoints reachable in each slice group, scaled by routing weight
    reachable: BTreeMap<String, f64>,
    reachable_all: f64,
    /// fraction of the zone's traffic going to each slice group
    traffic_ratio: BTreeMap<String, f64>,
    load_by_group: BTreeMap<String, f64>,
    deviation_by_group: BTreeMap<String, f64>,
}

impl TrafficSimulator for TheoreticalSimulator {
    fn simulate(
        &self,
        region: &RegionInfo,
        slice_groups: &SliceGroups,
    ) -> Result<SimulationResult, RoutingError> {
        if region.zones.is_empty() || slice_groups.is_empty() {
            return Err(RoutingError::EmptyInput);
        }

        let mut details: BTreeMap<String, ZoneDetail> = region
            .zones
            .keys()
            .map(|zone| (zone.clone(), ZoneDetail::default()))
            .collect();

        // Step 1+2: reachable endpoints per (zone, group) and the zone's
        // resulting traffic split over the groups.
        for (zone, detail) in details.iter_mut() {
            for (label, group) in slice_groups {
                let reachable =
                    group.number_of_endpoints() as f64 * group.traffic_weight_of(zone);
                detail.reachable.insert(label.clone(), reachable);
                detail.reachable_all += reachable;
            }
            if detail.reachable_all == 0.0 {
                continue;
            }
            for (label, reachable) in &detail.reachable {
                detail
                    .traffic_ratio
                    .insert(label.clone(), reachable / detail.reachable_all);
            }
        }

        // Step 3: total traffic fraction received by each slice group.
        let mut group_traffic: BTreeMap<&str, f64> = BTreeMap::new();
        for label in slice_groups.keys() {
            let mut total = 0.0;
            for (zone, detail) in &details {
                total += region.zones[zone].nodes_ratio
                    * detail.traffic_ratio.get(label).copied().unwrap_or(0.0);
            }
            group_traffic.insert(label.as_str(), total);
        }

        let invalid = region.total_endpoints == 0;

        // Step 4: per-endpoint load and deviation per (zone, group).
        if !invalid {
            let theoretical_load = 1.0 / region.total_endpoints as f64;
            for (zone, detail) in details.iter_mut() {
                for (label, group) in slice_groups {
                    let owned = group.composition_of(zone);
                    let weighted_total = group.number_of_weighted_endpoints();
                    if owned.number == 0 || weighted_total == 0.0 {
                        continue;
                    }
                    let zone_share = owned.number as f64 * owned.weight / weighted_total;
                    let load = group_traffic.get(label.as_str()).copied().unwrap_or(0.0)
                        * zone_share
                        / owned.number as f64;
                    detail.load_by_group.insert(label.clone(), load);
                    detail
                        .deviation_by_group
                        .insert(label.clone(), load / theoretical_load - 1.0);
                }
            }
        }

        // Step 5: zone-to-zone traffic fractions.
        let mut zone_to_zone: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        for (origin, origin_zone) in &region.zones {
            let row = zone_to_zone.entry(origin.as_str()).or_default();
            for (label, group) in slice_groups {
                let weighted_total = group.number_of_weighted_endpoints();
                if weighted_total == 0.0 {
                    continue;
                }
                let traffic_ratio = details[origin]
                    .traffic_ratio
                    .get(label)
                    .copied()
                    .unwrap_or(0.0);
                for dest in region.zones.keys() {
                    let owned = group.composition_of(dest);
                    let dest_share = owned.number as f64 * owned.weight / weighted_total;
                    *row.entry(dest.as_str()).or_insert(0.0) +=
                        origin_zone.nodes_ratio * traffic_ratio * dest_share;
                }
            }
        }

        // Step 6: aggregate per-zone and global statistics.
        let mut result = SimulationResult {
            invalid,
            ..SimulationResult::default()
        };
        let mut total_deviation = 0.0;
        for (zone, zone_info) in &region.zones {
            result.in_zone_traffic += zone_to_zone[zone.as_str()]
                .get(zone.as_str())
                .copied()
                .unwrap_or(0.0);

            let detail = &details[zone];
            let mut zone_max = 0.0f64;
            let mut zone_deviation = 0.0;
            let mut max_label = String::new();
            for (label, deviation) in &detail.deviation_by_group {
                let owned = slice_groups[label].composition_of(zone).number;
                zone_deviation += deviation.abs() * owned as f64;
                if deviation.abs() > zone_max {
                    zone_max = deviation.abs();
                    max_label = label.clone();
                }
            }
            total_deviation += zone_deviation;
            result.max_deviation = result.max_deviation.max(zone_max);

            let incoming = region
                .zones
                .keys()
                .map(|origin| {
                    zone_to_zone[origin.as_str()]
                        .get(zone.as_str())
                        .copied()
                        .unwrap_or(0.0)
                })
                .sum::<f64>();
            let traffic_load = if zone_info.endpoints_ratio == 0.0 {
                0.0
            } else {
                incoming / zone_info.endpoints_ratio
            };
            let mean_deviation = if zone_info.endpoints == 0 {
                0.0
            } else {
                zone_deviation / zone_info.endpoints as f64
            };

            result.traffic_distribution.insert(
                zone.clone(),
                ZoneTraffic {
                    zone_name: zone.clone(),
                    incoming,
                    outgoing: zone_to_zone[zone.as_str()]
                        .iter()
                        .map(|(dest, traffic)| (dest.to_string(), *traffic))
                        .collect(),
                    traffic_load,
                    detail: EndpointsTraffic {
                        load_by_group: detail.load_by_group.clone(),
                        deviation_by_group: detail.deviation_by_group.clone(),
                        max_deviation_group: max_label,
                        mean_deviation,
                    },
                },
            );
        }

        if !invalid {
            result.mean_deviation = total_deviation / region.total_endpoints as f64;
            let mut square_sum = 0.0;
            for (zone, detail) in &details {
                for (label, deviation) in &detail.deviation_by_group {
                    let owned = slice_groups[label].composition_of(zone).number;
                    square_sum += (deviation - result.mean_deviation).powi(2) * owned as f64;
                }
            }
            result.deviation_sd = (square_sum / region.total_endpoints as f64).sqrt();
        }
        Ok(result)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
