//! Scoring and report writing.
//!
//! Each simulated row is condensed into three scores (in-zone traffic,
//! load deviation, slice count overhead) combined into one weighted total
//! and written as a CSV report.

use crate::simulator::SimulationResult;
use crate::RoutingError;
use std::path::Path;
use tracing::info;

/// Endpoints per slice used for the slice-count score baseline.
pub const ENDPOINTS_PER_SLICE: i64 = 100;

const IN_ZONE_TRAFFIC_SCORE_WEIGHT: f64 = 0.4;
const DEVIATION_SCORE_WEIGHT: f64 = 0.4;
const SLICE_SCORE_WEIGHT: f64 = 0.2;

/// One simulated row ready for scoring.
#[derive(Debug, Clone)]
pub struct OutputRow {
    /// Row identifier, copied from the input.
    pub name: String,
    /// Total endpoints of the row's region.
    pub endpoints: i64,
    /// Slices the produced groups package into.
    pub endpoint_slices: i64,
    /// Simulation result for the row.
    pub result: SimulationResult,
}

impl OutputRow {
    /// In-zone traffic percentage.
    fn in_zone_traffic_score(&self) -> f64 {
        self.result.in_zone_traffic * 100.0
    }

    /// Mean load deviation, inverted so that higher is better.
    fn deviation_score(&self) -> f64 {
        100.0 - self.result.mean_deviation * 100.0
    }

    /// Ratio between the minimum possible slice count and the actual one.
    fn slice_score(&self) -> f64 {
        if self.endpoint_slices == 0 {
            return 0.0;
        }
        let original_slices = (self.endpoints as f64 / ENDPOINTS_PER_SLICE as f64).ceil();
        original_slices / self.endpoint_slices as f64 * 100.0
    }

    /// Weighted total of the three scores.
    pub fn total_score(&self) -> f64 {
        IN_ZONE_TRAFFIC_SCORE_WEIGHT * self.in_zone_traffic_score()
            + DEVIATION_SCORE_WEIGHT * self.deviation_score()
            + SLICE_SCORE_WEIGHT * self.slice_score()
    }
}

/// Write the scored report for all rows.
pub fn write_report(path: impl AsRef<Path>, rows: &[OutputRow]) -> Result<(), RoutingError> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    info!(file = %path.display(), "writing report");

    writer.write_record([
        "input name",
        "score",
        "in-zone-traffic score",
        "deviation score",
        "slice score",
        "max deviation",
        "mean deviation",
        "SD of deviation",
    ])?;
    for row in rows {
        writer.write_record([
            row.name.clone(),
            format!("{:.4}", row.total_score()),
            format!("{:.4}", row.in_zone_traffic_score()),
            format!("{:.4}", row.deviation_score()),
            format!("{:.4}", row.slice_score()),
            format!("{:.4}%", row.result.max_deviation * 100.0),
            format!("{:.4}%", row.result.mean_deviation * 100.0),
            format!("{:.4}", row.result.deviation_sd),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────
