//! # Region Topology Types
//!
//! ## Responsibility
//! Define the fundamental data types for the routing core: zones, the
//! region aggregate, weighted endpoints, and endpoint slice groups.
//!
//! ## Guarantees
//! - `RegionInfo` is immutable after construction and its ratios sum to 1
//!   (within floating tolerance) whenever the respective totals are non-zero.
//! - All maps are `BTreeMap`, so every iteration over zones or slice
//!   groups is deterministic in sorted-name order.
//!
//! ## NOT Responsible For
//! - Allocating endpoints into slice groups (see `routing`)
//! - Traffic math (see `simulator`)

use crate::RoutingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slice groups keyed by label, the output of every routing algorithm.
pub type SliceGroups = BTreeMap<String, EndpointSliceGroup>;

/// A failure/locality domain with a node count (traffic origin weight) and
/// an endpoint count (capacity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone name, unique within a region.
    pub name: String,
    /// Number of client nodes in this zone.
    pub nodes: i64,
    /// Number of service endpoints in this zone.
    pub endpoints: i64,
    /// This zone's share of all nodes. Populated at region creation.
    pub nodes_ratio: f64,
    /// This zone's share of all endpoints. Populated at region creation.
    pub endpoints_ratio: f64,
}

impl Zone {
    /// Create a zone with raw counts. Ratios stay zero until the zone is
    /// folded into a [`RegionInfo`].
    pub fn new(name: impl Into<String>, nodes: i64, endpoints: i64) -> Self {
        Self {
            name: name.into(),
            nodes,
            endpoints,
            nodes_ratio: 0.0,
            endpoints_ratio: 0.0,
        }
    }
}

/// A block of endpoints inside a slice group, with the weight they carry
/// when routing inside that group. Contributes `number × weight` weighted
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedEndpoints {
    /// Number of endpoints.
    pub number: i64,
    /// Weight of these endpoints when routing inside the group.
    pub weight: f64,
}

/// All the endpoint slices sharing one label. One group may be packaged
/// into many fixed-capacity slices; the composition is kept as a whole
/// because routing only depends on the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointSliceGroup {
    /// Unique identifier, usually the consuming topology label.
    pub label: String,
    /// Endpoint contribution per zone.
    pub composition: BTreeMap<String, WeightedEndpoints>,
    /// Routing pull this group exerts on clients in each zone. A zone
    /// absent from this map routes to the group with weight 0.
    pub zone_traffic_weights: BTreeMap<String, f64>,
}

impl EndpointSliceGroup {
    /// Create an empty group with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Create a group that serves exactly one zone with routing weight 1.
    pub fn local_to(zone: &str) -> Self {
        let mut group = Self::new(zone);
        group.zone_traffic_weights.insert(zone.to_string(), 1.0);
        group
    }

    /// Adjust the contribution of `zone` by `delta` endpoints, setting the
    /// block weight. Inserts the entry if absent.
    pub fn add_endpoints(&mut self, zone: &str, delta: i64, weight: f64) {
        let entry = self
            .composition
            .entry(zone.to_string())
            .or_insert(WeightedEndpoints { number: 0, weight });
        entry.number += delta;
        entry.weight = weight;
    }

    /// Total endpoints in this group.
    pub fn number_of_endpoints(&self) -> i64 {
        self.composition.values().map(|w| w.number).sum()
    }

    /// Total weighted endpoints in this group.
    pub fn number_of_weighted_endpoints(&self) -> f64 {
        self.composition
            .values()
            .map(|w| w.number as f64 * w.weight)
            .sum()
    }

    /// Contribution of `zone` to this group, 0 if absent.
    pub fn composition_of(&self, zone: &str) -> WeightedEndpoints {
        self.composition
            .get(zone)
            .copied()
            .unwrap_or(WeightedEndpoints {
                number: 0,
                weight: 0.0,
            })
    }

    /// Routing weight of this group for clients in `zone`, 0 if absent.
    pub fn traffic_weight_of(&self, zone: &str) -> f64 {
        self.zone_traffic_weights.get(zone).copied().unwrap_or(0.0)
    }
}

/// The aggregate of all zones under evaluation, with derived per-zone
/// ratios. Immutable after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Total nodes across all zones.
    pub total_nodes: i64,
    /// Total endpoints across all zones.
    pub total_endpoints: i64,
    /// Zone details keyed by zone name.
    pub zones: BTreeMap<String, Zone>,
}

impl RegionInfo {
    /// Build a region from an ordered, non-empty sequence of zones.
    ///
    /// Computes totals, then writes each zone's `nodes_ratio` and
    /// `endpoints_ratio` (0 when the respective total is 0). Zones with
    /// zero nodes or zero endpoints are permitted; negative counts and an
    /// empty sequence are not.
    pub fn from_zones(zones: Vec<Zone>) -> Result<Self, RoutingError> {
        if zones.is_empty() {
            return Err(RoutingError::EmptyInput);
        }
        let mut total_nodes = 0i64;
        let mut total_endpoints = 0i64;
        for zone in &zones {
            if zone.nodes < 0 || zone.endpoints < 0 {
                return Err(RoutingError::NegativeCount(zone.name.clone()));
            }
            total_nodes += zone.nodes;
            total_endpoints += zone.endpoints;
        }

        let mut region = RegionInfo {
            total_nodes,
            total_endpoints,
            zones: BTreeMap::new(),
        };
        for mut zone in zones {
            zone.endpoints_ratio = if total_endpoints == 0 {
                0.0
            } else {
                zone.endpoints as f64 / total_endpoints as f64
            };
            zone.nodes_ratio = if total_nodes == 0 {
                0.0
            } else {
                zone.nodes as f64 / total_nodes as f64
            };
            region.zones.insert(zone.name.clone(), zone);
        }
        Ok(region)
    }

    /// Expected number of endpoints for `zone` in a perfectly balanced
    /// region: `total_endpoints × nodes_ratio`.
    pub fn expected_endpoints(&self, zone: &str) -> f64 {
        let ratio = self.zones.get(zone).map(|z| z.nodes_ratio).unwrap_or(0.0);
        self.total_endpoints as f64 * ratio
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- RegionInfo ----------------------------------------------------

    #[test]
    fn test_region_ratios_sum_to_one() {
        let region = RegionInfo::from_zones(vec![
            Zone::new("a", 30, 60),
            Zone::new("b", 35, 70),
            Zone::new("c", 50, 80),
        ])
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));

        assert_eq!(region.total_nodes, 115);
        assert_eq!(region.total_endpoints, 210);
        let nodes_sum: f64 = region.zones.values().map(|z| z.nodes_ratio).sum();
        let endpoints_sum: f64 = region.zones.values().map(|z| z.endpoints_ratio).sum();
        assert!((nodes_sum - 1.0).abs() < 1e-12);
        assert!((endpoints_sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_region_zero_totals_give_zero_ratios() {
        let region = RegionInfo::from_zones(vec![Zone::new("a", 0, 0), Zone::new("b", 0, 0)])
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));
        for zone in region.zones.values() {
            assert_eq!(zone.nodes_ratio, 0.0);
            assert_eq!(zone.endpoints_ratio, 0.0);
        }
    }

    #[test]
    fn test_region_rejects_empty_input() {
        assert!(matches!(
            RegionInfo::from_zones(vec![]),
            Err(RoutingError::EmptyInput)
        ));
    }

    #[test]
    fn test_region_rejects_negative_counts() {
        let err = RegionInfo::from_zones(vec![Zone::new("a", -1, 5)]);
        assert!(matches!(err, Err(RoutingError::NegativeCount(name)) if name == "a"));
        let err = RegionInfo::from_zones(vec![Zone::new("b", 1, -5)]);
        assert!(matches!(err, Err(RoutingError::NegativeCount(name)) if name == "b"));
    }

    #[test]
    fn test_zero_endpoint_zone_is_permitted() {
        let region =
            RegionInfo::from_zones(vec![Zone::new("a", 1, 0), Zone::new("b", 1, 6)])
                .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));
        assert_eq!(region.zones["a"].endpoints, 0);
        assert_eq!(region.zones["a"].endpoints_ratio, 0.0);
        assert!((region.zones["a"].nodes_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_expected_endpoints() {
        let region = RegionInfo::from_zones(vec![
            Zone::new("a", 1, 5),
            Zone::new("b", 2, 20),
            Zone::new("c", 7, 20),
        ])
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));
        assert!((region.expected_endpoints("a") - 4.5).abs() < 1e-12);
        assert!((region.expected_endpoints("b") - 9.0).abs() < 1e-12);
        assert!((region.expected_endpoints("c") - 31.5).abs() < 1e-12);
        assert_eq!(region.expected_endpoints("nope"), 0.0);
    }

    // -- EndpointSliceGroup --------------------------------------------

    #[test]
    fn test_group_endpoint_totals() {
        let mut group = EndpointSliceGroup::new("global");
        group.add_endpoints("a", 3, 1.0);
        group.add_endpoints("b", 2, 0.5);
        assert_eq!(group.number_of_endpoints(), 5);
        assert!((group.number_of_weighted_endpoints() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_group_missing_zone_defaults_to_zero() {
        let group = EndpointSliceGroup::local_to("a");
        assert_eq!(group.composition_of("b").number, 0);
        assert_eq!(group.traffic_weight_of("b"), 0.0);
        assert_eq!(group.traffic_weight_of("a"), 1.0);
    }

    #[test]
    fn test_group_add_endpoints_accumulates() {
        let mut group = EndpointSliceGroup::local_to("a");
        group.add_endpoints("a", 5, 1.0);
        group.add_endpoints("a", -2, 1.0);
        assert_eq!(group.composition_of("a").number, 3);
    }

    #[test]
    fn test_group_serde_roundtrip() {
        let mut group = EndpointSliceGroup::local_to("a");
        group.add_endpoints("a", 5, 1.0);
        let json = serde_json::to_string(&group)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: ser: {e}")));
        let back: EndpointSliceGroup = serde_json::from_str(&json)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deser: {e}")));
        assert_eq!(group, back);
    }
}
