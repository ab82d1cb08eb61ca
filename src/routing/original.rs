//! The original routing behavior: every endpoint lives in one global
//! slice group that every zone consumes with equal weight. Serves as the
//! benchmark baseline and as the fallback target for the local
//! algorithms.

use crate::routing::RoutingAlgorithm;
use crate::topology::{EndpointSliceGroup, RegionInfo, SliceGroups};
use crate::RoutingError;

/// Equal-distribution baseline algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginalAlgorithm;

impl RoutingAlgorithm for OriginalAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        if region.zones.is_empty() {
            return Err(RoutingError::NilZoneDetails);
        }
        let mut global = EndpointSliceGroup::new("global");
        for (name, zone) in &region.zones {
            global.zone_traffic_weights.insert(name.clone(), 1.0);
            global.add_endpoints(name, zone.endpoints, 1.0);
        }
        let mut slice_groups = SliceGroups::new();
        slice_groups.insert(global.label.clone(), global);
        Ok(slice_groups)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Zone;

    #[test]
    fn test_single_global_group() {
        let region = RegionInfo::from_zones(vec![
            Zone::new("a", 30, 60),
            Zone::new("b", 35, 70),
            Zone::new("c", 50, 80),
        ])
        .unwrap_or_else(|e| std::panic::panic_any(format!("test: region: {e}")));

        let groups = OriginalAlgorithm
            .create_slice_groups(&region)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: alg: {e}")));

        assert_eq!(groups.len(), 1);
        let global = &groups["global"];
        assert_eq!(global.number_of_endpoints(), 210);
        for zone in ["a", "b", "c"] {
            assert_eq!(global.traffic_weight_of(zone), 1.0);
        }
        assert_eq!(global.composition_of("b").number, 70);
    }

    #[test]
    fn test_empty_region_is_rejected() {
        let region = RegionInfo::default();
        assert!(matches!(
            OriginalAlgorithm.create_slice_groups(&region),
            Err(RoutingError::NilZoneDetails)
        ));
    }
}
