//! CSV input parsing.
//!
//! Input format: a header row `input name, zone1, zone2, ...` followed by
//! one row per region, where each zone cell holds `"<nodes> <endpoints>"`
//! separated by whitespace. Rows that fail to parse are logged and
//! skipped; the remaining rows still simulate.

use crate::topology::Zone;
use crate::RoutingError;
use std::path::Path;
use tracing::{info, warn};

/// One parsed input row: a named set of zones.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRow {
    /// Row identifier from the first column.
    pub name: String,
    /// Zones in header order.
    pub zones: Vec<Zone>,
}

/// Parse the whole input file. Fails on an unreadable file or a missing
/// header; bad data rows are skipped with a warning.
pub fn parse_input(path: impl AsRef<Path>) -> Result<Vec<InputRow>, RoutingError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    info!(file = %path.display(), "reading input data");

    let mut records = reader.records();
    let header = match records.next() {
        Some(header) => header?,
        None => return Err(RoutingError::EmptyInput),
    };
    let zone_names: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "cannot read input row, skipping");
                continue;
            }
        };
        match parse_row(&zone_names, &record) {
            Ok(row) => rows.push(row),
            Err(e) => warn!(error = %e, "cannot parse input row, skipping"),
        }
    }
    info!(rows = rows.len(), "input parsed");
    Ok(rows)
}

fn parse_row(zone_names: &[String], record: &csv::StringRecord) -> Result<InputRow, RoutingError> {
    let name = record
        .get(0)
        .ok_or_else(|| RoutingError::Other("row without a name column".to_string()))?
        .to_string();
    let mut zones = Vec::new();
    for (index, cell) in record.iter().skip(1).enumerate() {
        let zone_name = zone_names.get(index).ok_or_else(|| {
            RoutingError::Other(format!("row {name}: more cells than header zones"))
        })?;
        let mut fields = cell.split_whitespace();
        let nodes = next_count(&mut fields, &name, zone_name)?;
        let endpoints = next_count(&mut fields, &name, zone_name)?;
        zones.push(Zone::new(zone_name.clone(), nodes, endpoints));
    }
    Ok(InputRow { name, zones })
}

fn next_count<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    row: &str,
    zone: &str,
) -> Result<i64, RoutingError> {
    let field = fields
        .next()
        .ok_or_else(|| RoutingError::Other(format!("row {row}, zone {zone}: missing count")))?;
    field.parse::<i64>().map_err(|e| {
        RoutingError::Other(format!("row {row}, zone {zone}: bad count {field:?}: {e}"))
    })
}

// ── Tests ──────────────────────────────────────────────────────────────
