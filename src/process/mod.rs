//! # Row Processing Pipeline
//!
//! ## Responsibility
//! Drive a [`Model`] over a CSV of input rows: parse, simulate every row
//! sequentially, score the results, and write the report.
//!
//! ## Guarantees
//! - Rows are processed strictly in input order by a single consumer that
//!   owns the model; the producer hands rows over through a bounded
//!   one-element channel.
//! - A failing row is logged and skipped, never aborting the run.
//!
//! ## NOT Responsible For
//! - Allocation and simulation semantics (see `routing`, `simulator`)

pub mod input;
pub mod report;

pub use input::{parse_input, InputRow};
pub use report::{write_report, OutputRow};

use crate::config::SimulationConfig;
use crate::model::Model;
use crate::simulator::TheoreticalSimulator;
use crate::RoutingError;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Parse `input_path`, simulate every row with the configured algorithm,
/// and write the scored report to `output_path`.
pub async fn run(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &SimulationConfig,
) -> Result<(), RoutingError> {
    let rows = parse_input(input_path)?;
    let outputs = simulate_rows(config, rows).await?;
    write_report(output_path, &outputs)
}

/// Run every input row through a fresh model and collect the outputs.
pub async fn simulate_rows(
    config: &SimulationConfig,
    rows: Vec<InputRow>,
) -> Result<Vec<OutputRow>, RoutingError> {
    let algorithm = config.build_algorithm()?;
    let mut model = Model::new(algorithm, Box::new(TheoreticalSimulator));
    model.set_slice_capacity(config.slice_capacity);

    // Bounded one-element hand-off: the producer stays at most one row
    // ahead of the consumer that owns the model.
    let (tx, mut rx) = mpsc::channel::<InputRow>(1);
    let producer = tokio::spawn(async move {
        for row in rows {
            if tx.send(row).await.is_err() {
                break;
            }
        }
    });
    let consumer = tokio::spawn(async move {
        let mut outputs = Vec::new();
        while let Some(row) = rx.recv().await {
            let name = row.name;
            if let Err(e) = model.update_region(row.zones) {
                warn!(row = %name, error = %e, "cannot update region, skipping row");
                continue;
            }
            match model.start_simulation() {
                Ok(result) => {
                    debug!(row = %name, "{}", model.result_summary(&result));
                    outputs.push(OutputRow {
                        name,
                        endpoints: model.number_of_endpoints(),
                        endpoint_slices: model.number_of_endpoint_slices(),
                        result,
                    });
                }
                Err(e) => warn!(row = %name, error = %e, "simulation failed, skipping row"),
            }
        }
        outputs
    });

    let _ = producer.await;
    consumer
        .await
        .map_err(|e| RoutingError::Other(format!("row consumer failed: {e}")))
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Zone;

    fn rows() -> Vec<InputRow> {
        vec![
            InputRow {
                name: "balanced".to_string(),
                zones: vec![
                    Zone::new("a", 30, 60),
                    Zone::new("b", 35, 70),
                    Zone::new("c", 50, 80),
                ],
            },
            InputRow {
                name: "starved".to_string(),
                zones: vec![Zone::new("a", 30, 100), Zone::new("b", 30, 0)],
            },
        ]
    }

    #[tokio::test]
    async fn test_rows_simulate_in_input_order() {
        let config = SimulationConfig::default();
        let outputs = simulate_rows(&config, rows())
            .await
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: rows: {e}")));
        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["balanced", "starved"]);
        assert_eq!(outputs[0].endpoints, 210);
        assert!(outputs[0].endpoint_slices >= 3);
        assert!(!outputs[0].result.invalid);
    }

    #[tokio::test]
    async fn test_invalid_rows_are_skipped() {
        let config = SimulationConfig::default();
        let mut all_rows = rows();
        all_rows.insert(
            1,
            InputRow {
                name: "negative".to_string(),
                zones: vec![Zone::new("a", -1, 10)],
            },
        );
        let outputs = simulate_rows(&config, all_rows)
            .await
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: rows: {e}")));
        let names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["balanced", "starved"]);
    }

    #[tokio::test]
    async fn test_each_algorithm_processes_rows() {
        for algorithm in [
            "Original",
            "SharedGlobal",
            "SharedMultiZone",
            "Local",
            "LocalWeighted",
            "LocalShared",
            "BackPropagation",
        ] {
            let config = SimulationConfig {
                algorithm: algorithm.to_string(),
                ..SimulationConfig::default()
            };
            let outputs = simulate_rows(&config, rows())
                .await
                .unwrap_or_else(|e| std::panic::panic_any(format!("test: {algorithm}: {e}")));
            assert_eq!(outputs.len(), 2, "{algorithm}");
        }
    }
}
