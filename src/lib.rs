//! # sliceroute
//!
//! Evaluates topology-aware routing strategies for a clustered service.
//!
//! ## Architecture
//!
//! A region is a set of zones, each with a node count (traffic origin) and
//! an endpoint count (capacity). A pluggable routing algorithm allocates
//! the endpoints into labelled slice groups, and an analytical simulator
//! derives the steady-state traffic distribution those groups produce:
//! ```text
//! zones → RegionInfo → RoutingAlgorithm → slice groups → TrafficSimulator → SimulationResult
//! ```
//!
//! The [`Model`] façade owns one region and its current slice groups and
//! runs the two steps on demand. The `process` module drives the model
//! over a CSV of input rows and writes a scored report.

use thiserror::Error;

pub mod config;
pub mod model;
pub mod process;
pub mod routing;
pub mod simulator;
pub mod topology;

// Re-exports
pub use model::Model;
pub use routing::{new_algorithm, RoutingAlgorithm};
pub use simulator::{SimulationResult, TheoreticalSimulator, TrafficSimulator};
pub use topology::{EndpointSliceGroup, RegionInfo, SliceGroups, WeightedEndpoints, Zone};

/// Routing and simulation errors
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("empty input: no zones or slice groups to work with")]
    EmptyInput,

    #[error("zone {0} has a negative node or endpoint count")]
    NegativeCount(String),

    #[error("region carries no zone details")]
    NilZoneDetails,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Initialise tracing with env-filter support. Call once at binary startup.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
