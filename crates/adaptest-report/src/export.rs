//! Delimited export of answered items.
//!
//! Writes the rows built by [`adaptest_core::export::build_export`] as CSV,
//! plus a JSON sidecar describing every column for statistical packages.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;

use adaptest_core::bank::ItemBank;
use adaptest_core::export::{build_export, header, ExportRow, EXPORT_COLUMNS};
use adaptest_core::session::CompletedSession;

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render rows as CSV with a header line.
pub fn to_csv(rows: &[ExportRow]) -> String {
    let mut out = header().join(",");
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row.values().iter().map(|v| csv_escape(v)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Column metadata document.
///
/// Rows holding a value outside its column's declared range are listed by
/// 1-based row number.
pub fn metadata(rows: &[ExportRow]) -> serde_json::Value {
    let out_of_range: Vec<serde_json::Value> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let columns = row.out_of_range();
            (!columns.is_empty()).then(|| json!({ "row": i + 1, "columns": columns }))
        })
        .collect();
    json!({
        "format": "csv",
        "delimiter": ",",
        "row_count": rows.len(),
        "columns": EXPORT_COLUMNS,
        "out_of_range": out_of_range,
    })
}

/// Files produced by [`write_export`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub data: PathBuf,
    pub metadata: PathBuf,
}

/// Write `<stem>.csv` and `<stem>.meta.json` into `dir`.
pub fn write_export(
    sessions: &[CompletedSession],
    bank: &ItemBank,
    dir: &Path,
    stem: &str,
) -> Result<ExportPaths> {
    let rows = build_export(sessions, bank);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let data = dir.join(format!("{stem}.csv"));
    std::fs::write(&data, to_csv(&rows))
        .with_context(|| format!("failed to write {}", data.display()))?;

    let meta = dir.join(format!("{stem}.meta.json"));
    let json = serde_json::to_string_pretty(&metadata(&rows))
        .context("failed to serialize export metadata")?;
    std::fs::write(&meta, json).with_context(|| format!("failed to write {}", meta.display()))?;

    Ok(ExportPaths {
        data,
        metadata: meta,
    })
}
