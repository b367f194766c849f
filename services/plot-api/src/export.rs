//! Combining per-panel export tables into one CSV document.

use plot_common::{ExportTable, PlotError, PlotResult};

/// Merge panel tables under one header row.
///
/// The first column names the panel's source. Remaining headers are the
/// union of every panel's headers in first-seen order; cells a panel does
/// not have are left empty. A header repeated within one table keeps one
/// column per occurrence.
pub fn combine(tables: &[(String, ExportTable)]) -> ExportTable {
    let mut headers: Vec<String> = vec!["Source".to_string()];
    for (_, table) in tables {
        for (i, h) in table.headers.iter().enumerate() {
            let nth = occurrence(&table.headers[..i], h);
            if nth_position(&headers[1..], h, nth).is_none() {
                headers.push(h.clone());
            }
        }
    }

    let mut combined = ExportTable {
        headers,
        rows: Vec::new(),
    };
    for (source, table) in tables {
        let positions: Vec<usize> = table
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let nth = occurrence(&table.headers[..i], h);
                nth_position(&combined.headers[1..], h, nth).map_or(0, |p| p + 1)
            })
            .collect();
        for row in &table.rows {
            let mut out = vec![String::new(); combined.headers.len()];
            out[0] = source.clone();
            for (cell, &pos) in row.iter().zip(&positions) {
                out[pos] = cell.clone();
            }
            combined.rows.push(out);
        }
    }
    combined
}

fn occurrence(before: &[String], header: &str) -> usize {
    before.iter().filter(|h| *h == header).count()
}

/// Index of the `nth` column named `header`.
fn nth_position(headers: &[String], header: &str, nth: usize) -> Option<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| *h == header)
        .nth(nth)
        .map(|(i, _)| i)
}

/// Serialize a table as CSV with a header row.
pub fn to_csv(table: &ExportTable) -> PlotResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&table.headers)
        .map_err(|e| PlotError::ExportError(e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| PlotError::ExportError(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PlotError::ExportError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PlotError::ExportError(e.to_string()))
}
