//! Model façade: one region, its current slice groups, and the pair of
//! collaborators (routing algorithm + traffic simulator) that produce and
//! evaluate them.

use crate::routing::RoutingAlgorithm;
use crate::simulator::{SimulationResult, TrafficSimulator};
use crate::topology::{RegionInfo, SliceGroups, Zone};
use crate::RoutingError;
use std::fmt::Write as _;

/// Default maximum endpoints per packaged slice.
pub const DEFAULT_SLICE_CAPACITY: i64 = 100;

/// Holds the current region and slice groups and runs one allocation +
/// simulation round on demand. Not safe for concurrent mutation; a driver
/// owns one model and feeds it rows sequentially.
pub struct Model {
    algorithm: Box<dyn RoutingAlgorithm + Send + Sync>,
    simulator: Box<dyn TrafficSimulator + Send + Sync>,
    slice_capacity: i64,
    region: RegionInfo,
    slice_groups: SliceGroups,
}

impl Model {
    pub fn new(
        algorithm: Box<dyn RoutingAlgorithm + Send + Sync>,
        simulator: Box<dyn TrafficSimulator + Send + Sync>,
    ) -> Self {
        Self {
            algorithm,
            simulator,
            slice_capacity: DEFAULT_SLICE_CAPACITY,
            region: RegionInfo::default(),
            slice_groups: SliceGroups::new(),
        }
    }

    /// Override the per-slice endpoint capacity used for slice counting.
    pub fn set_slice_capacity(&mut self, capacity: i64) {
        self.slice_capacity = capacity.max(1);
    }

    /// Rebuild the region from `zones` and rerun the allocation. Both the
    /// region and the slice groups are replaced together, and only when
    /// the algorithm succeeds; on error the previous state stays intact.
    pub fn update_region(&mut self, zones: Vec<Zone>) -> Result<(), RoutingError> {
        let region = RegionInfo::from_zones(zones)?;
        let slice_groups = self.algorithm.create_slice_groups(&region)?;
        self.region = region;
        self.slice_groups = slice_groups;
        Ok(())
    }

    /// Simulate traffic over the current region and slice groups.
    pub fn start_simulation(&self) -> Result<SimulationResult, RoutingError> {
        self.simulator.simulate(&self.region, &self.slice_groups)
    }

    /// The current slice groups. Read-only; `update_region` is the only
    /// way to change them.
    pub fn slice_groups(&self) -> &SliceGroups {
        &self.slice_groups
    }

    pub fn region(&self) -> &RegionInfo {
        &self.region
    }

    /// Number of fixed-capacity slices the current groups package into.
    pub fn number_of_endpoint_slices(&self) -> i64 {
        self.slice_groups
            .values()
            .map(|sg| {
                let endpoints = sg.number_of_endpoints();
                let mut slices = endpoints / self.slice_capacity;
                if endpoints % self.slice_capacity != 0 {
                    slices += 1;
                }
                slices
            })
            .sum()
    }

    pub fn number_of_endpoints(&self) -> i64 {
        self.region.total_endpoints
    }

    /// Human-readable summary of a simulation result for diagnostics.
    pub fn result_summary(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "in-zone traffic: {:.2}%", result.in_zone_traffic * 100.0);
        let _ = writeln!(out, "endpoint slices: {}", self.number_of_endpoint_slices());
        let _ = writeln!(out, "endpoints: {}", self.number_of_endpoints());
        for (zone, traffic) in &result.traffic_distribution {
            let _ = writeln!(
                out,
                "zone {zone}: incoming {:.2}%, traffic load {:.2}",
                traffic.incoming * 100.0,
                traffic.traffic_load
            );
        }
        out
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
