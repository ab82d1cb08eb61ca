//! Shared-global allocation: each zone keeps a local slice group and
//! contributes its surplus (scaled by the global weight) to one shared
//! global group. The multi-zone variant additionally stops contributing
//! zones from consuming the global group they fed.

use crate::routing::{OriginalAlgorithm, RoutingAlgorithm};
use crate::topology::{EndpointSliceGroup, RegionInfo, SliceGroups};
use crate::RoutingError;

/// Core of the shared-global family.
///
/// Below `global_threshold` total endpoints the region is too small to
/// split and the whole allocation degrades to [`OriginalAlgorithm`].
#[derive(Debug, Clone, Copy)]
pub struct SharedGlobalCore {
    /// Routing weight of the global slice group.
    global_weight: f64,
    /// Total-endpoint count at or below which everything stays global.
    global_threshold: i64,
}

impl SharedGlobalCore {
    pub fn new(global_weight: f64, global_threshold: i64) -> Result<Self, RoutingError> {
        if global_weight < 0.0 {
            return Err(RoutingError::InvalidParameter(format!(
                "global weight must be >= 0, got {global_weight}"
            )));
        }
        if global_threshold < 0 {
            return Err(RoutingError::InvalidParameter(format!(
                "global threshold must be >= 0, got {global_threshold}"
            )));
        }
        Ok(Self {
            global_weight,
            global_threshold,
        })
    }

    fn create_slice_groups(
        &self,
        region: &RegionInfo,
        exclude_contributor: bool,
    ) -> Result<SliceGroups, RoutingError> {
        if region.zones.is_empty() {
            return Err(RoutingError::NilZoneDetails);
        }
        if region.total_endpoints <= self.global_threshold {
            return OriginalAlgorithm.create_slice_groups(region);
        }

        let mut slice_groups = SliceGroups::new();
        let mut global = EndpointSliceGroup::new("global");
        for (name, zone) in &region.zones {
            // Surplus endpoints relative to the node share, scaled down by
            // the global weight so the global group stays balanced when
            // consumed at that weight.
            let deviation = zone.endpoints as f64 - region.expected_endpoints(name);
            let global_number =
                ((deviation.max(0.0) / self.global_weight).min(zone.endpoints as f64)) as i64;
            if global_number != 0 {
                global.add_endpoints(name, global_number, 1.0);
            }
            let excluded = exclude_contributor
                && global_number != 0
                && zone.endpoints - global_number != 0;
            if !excluded {
                global
                    .zone_traffic_weights
                    .insert(name.clone(), self.global_weight);
            }

            let mut local = EndpointSliceGroup::local_to(name);
            local.add_endpoints(name, zone.endpoints - global_number, 1.0);
            slice_groups.insert(name.clone(), local);
        }
        slice_groups.insert(global.label.clone(), global);
        Ok(slice_groups)
    }
}

/// Shared-global allocation where every zone consumes the global group.
#[derive(Debug, Clone, Copy)]
pub struct SharedGlobalAlgorithm {
    core: SharedGlobalCore,
}

impl SharedGlobalAlgorithm {
    pub fn new(global_weight: f64, global_threshold: i64) -> Result<Self, RoutingError> {
        Ok(Self {
            core: SharedGlobalCore::new(global_weight, global_threshold)?,
        })
    }
}

impl RoutingAlgorithm for SharedGlobalAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        self.core.create_slice_groups(region, false)
    }
}

/// Shared-global allocation where a zone that contributed endpoints to the
/// global group (while keeping some locally) does not consume it.
#[derive(Debug, Clone, Copy)]
pub struct SharedMultiZoneAlgorithm {
    core: SharedGlobalCore,
}

impl SharedMultiZoneAlgorithm {
    pub fn new(global_weight: f64, global_threshold: i64) -> Result<Self, RoutingError> {
        Ok(Self {
            core: SharedGlobalCore::new(global_weight, global_threshold)?,
        })
    }
}

impl RoutingAlgorithm for SharedMultiZoneAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        self.core.create_slice_groups(region, true)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
