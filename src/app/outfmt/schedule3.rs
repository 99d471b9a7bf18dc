//! Export of reported sales for import into tax software, as rows of
//! quantity, ticker, proceeds, ACB and outlays (no header).

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::portfolio::yearly_gains::YearlyGainsReport;
use crate::util::decimal::{money_str, qty_str};

use super::model::Error;

pub fn schedule3_file_name(year: i32) -> String {
    format!("schedule3-{}.csv", year)
}

pub fn schedule3_rows(reports: &[YearlyGainsReport], render_full_values: bool)
    -> Vec<[String; 5]> {
    reports.iter()
        .flat_map(|r| r.deltas.iter())
        .map(|d| [
            qty_str(&d.tx.shares),
            d.tx.security.clone(),
            money_str(&d.proceeds, render_full_values),
            money_str(&d.acb, render_full_values),
            money_str(&d.commission, render_full_values),
        ])
        .collect()
}

pub fn write_schedule3_csv(rows: &[[String; 5]], writer: &mut dyn io::Write) -> Result<(), Error> {
    let mut csv_w = csv::WriterBuilder::new().from_writer(writer);
    for row in rows {
        csv_w.write_record(row).map_err(|e| e.to_string())?;
    }
    csv_w.flush().map_err(|e| e.to_string())
}

/// Writes schedule3-{year}.csv into `dir`, returning its path.
pub fn export_schedule3(
    dir: &Path,
    year: i32,
    reports: &[YearlyGainsReport],
    render_full_values: bool,
) -> Result<PathBuf, Error> {
    let file_path = dir.join(schedule3_file_name(year));
    let mut fp = File::create(&file_path)
        .map_err(|e| format!("Failed to create {}: {}", file_path.display(), e))?;
    write_schedule3_csv(&schedule3_rows(reports, render_full_values), &mut fp)
        .map_err(|e| format!("Failed to write {}: {}", file_path.display(), e))?;
    tracing::debug!("export_schedule3: wrote {}", file_path.display());
    Ok(file_path)
}
