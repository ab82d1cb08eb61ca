//! # Routing Algorithms
//!
//! ## Responsibility
//! Map a region of zones to labelled endpoint slice groups. Each algorithm
//! implements one placement strategy; the registry hands out configured
//! instances by canonical name.
//!
//! ## Guarantees
//! - Algorithms never mutate the region they are given.
//! - On error the returned map is empty; no partial allocation escapes.
//! - For every algorithm except back-propagation, per-zone endpoint counts
//!   are conserved across the produced slice groups.
//!
//! ## NOT Responsible For
//! - Traffic math over the produced groups (see `simulator`)
//! - Driving rows through a model (see `process`)

pub mod back_propagation;
pub mod local;
pub mod local_shared;
pub mod local_weighted;
pub mod original;
pub mod queue;
pub mod shared_global;

pub use back_propagation::BackPropagationAlgorithm;
pub use local::LocalSliceAlgorithm;
pub use local_shared::LocalSharedSliceAlgorithm;
pub use local_weighted::LocalWeightedSliceAlgorithm;
pub use original::OriginalAlgorithm;
pub use shared_global::{SharedGlobalAlgorithm, SharedMultiZoneAlgorithm};

use crate::topology::{RegionInfo, SliceGroups};
use crate::RoutingError;
use tracing::{info, warn};

/// A routing strategy: allocates a region's endpoints into slice groups.
pub trait RoutingAlgorithm {
    /// Create the slice groups for `region`. Pure with respect to the
    /// region; returns an error instead of a partial map.
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError>;
}

/// Construct a routing algorithm by canonical name with its default
/// parameters. Unknown names fall back to the default local algorithm.
pub fn new_algorithm(name: &str) -> Box<dyn RoutingAlgorithm + Send + Sync> {
    match name {
        "Original" | "OriginalAlgorithm" => {
            info!("original algorithm created");
            Box::new(OriginalAlgorithm)
        }
        "SharedGlobal" | "SharedGlobalAlgorithm" => {
            info!("shared global algorithm created");
            // defaults are validated; construction cannot fail
            match SharedGlobalAlgorithm::new(0.4, 100) {
                Ok(alg) => Box::new(alg),
                Err(_) => Box::new(OriginalAlgorithm),
            }
        }
        "SharedMultiZone" | "SharedMultiZoneAlgorithm" => {
            info!("shared multi-zone algorithm created");
            match SharedMultiZoneAlgorithm::new(1.0, 100) {
                Ok(alg) => Box::new(alg),
                Err(_) => Box::new(OriginalAlgorithm),
            }
        }
        "Local" | "LocalAlgorithm" | "LocalSliceAlgorithm" => {
            info!("local slice algorithm created");
            default_local()
        }
        "LocalWeighted" | "LocalWeightedSliceAlgorithm" => {
            info!("local weighted slice algorithm created");
            Box::new(LocalWeightedSliceAlgorithm)
        }
        "LocalShared" | "LocalSharedSliceAlgorithm" => {
            info!("local shared slice algorithm created");
            match LocalSharedSliceAlgorithm::new(0.5) {
                Ok(alg) => Box::new(alg),
                Err(_) => Box::new(OriginalAlgorithm),
            }
        }
        "BackPropagation" | "BackPropagationAlgorithm" => {
            info!("back-propagation algorithm created");
            Box::new(BackPropagationAlgorithm::new(0.5, 0.3, 100, true))
        }
        other => {
            warn!(algorithm = other, "unknown algorithm, using the local slice algorithm");
            default_local()
        }
    }
}

fn default_local() -> Box<dyn RoutingAlgorithm + Send + Sync> {
    match LocalSliceAlgorithm::new(0.2, 0) {
        Ok(alg) => Box::new(alg),
        Err(_) => Box::new(OriginalAlgorithm),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
