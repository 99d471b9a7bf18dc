use rust_decimal::Decimal;

use crate::util::decimal::{money_str, qty_str};

use super::bookkeeping::{LedgerError, OptionsReportRow};
use super::yearly_gains::YearlyGainsReport;
use super::Security;

/// A table, ready to be printed as text or csv.
#[derive(Default, Debug)]
pub struct RenderTable {
    // Lines printed between the title and the table
    pub preamble: Vec<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Vec<String>,
    pub notes: Vec<String>,
    pub errors: Vec<String>,
    // Right-aligned when rendered as text
    pub numeric_cols: Vec<usize>,
}

pub const NO_CAPITAL_GAINS: &str = "No capital gains";

fn strs(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

pub fn render_yearly_gains_table(report: &YearlyGainsReport, render_full_values: bool)
    -> RenderTable {
    let m = |d: &Decimal| money_str(d, render_full_values);

    if report.is_empty() {
        return RenderTable {
            notes: vec![NO_CAPITAL_GAINS.to_string()],
            ..RenderTable::default()
        };
    }

    let rows = report.deltas.iter().map(|d| vec![
        d.tx.date.to_string(),
        d.tx.description.clone(),
        d.tx.security.clone(),
        qty_str(&d.tx.shares),
        m(&d.proceeds),
        m(&d.acb),
        m(&d.commission),
        m(&d.capital_gain),
    ]).collect();

    RenderTable {
        preamble: vec![format!("[Total Gains = {}]", m(&report.total_gain))],
        header: strs(&["date", "description", "ticker", "qty", "proceeds", "ACB",
                       "outlays", "capital gain/loss"]),
        rows,
        numeric_cols: (3..8).collect(),
        ..RenderTable::default()
    }
}

/// For a security whose ledger could not be computed.
pub fn render_ledger_error(err: &LedgerError) -> RenderTable {
    RenderTable {
        errors: vec![err.to_string()],
        ..RenderTable::default()
    }
}

pub fn render_options_report(rows: &[OptionsReportRow], render_full_values: bool)
    -> RenderTable {
    let m = |d: &Decimal| money_str(d, render_full_values);
    RenderTable {
        header: strs(&["date", "instrument", "action", "qty", "price", "fee",
                       "currency", "acquisition cost (CAD)"]),
        rows: rows.iter().map(|r| vec![
            r.date.to_string(),
            r.security.clone(),
            r.action_str(),
            qty_str(&r.shares),
            m(&r.price),
            m(&r.commission),
            r.currency.to_string(),
            r.acquisition_cost.as_ref().map(m).unwrap_or_else(|| "N/A".to_string()),
        ]).collect(),
        numeric_cols: vec![3, 4, 5, 7],
        ..RenderTable::default()
    }
}

/// Total gains per security, and overall. Securities which failed are
/// listed as errors, and are not part of the total.
pub fn render_aggregate_capital_gains(
    gains: &[(Security, Result<Decimal, String>)],
    render_full_values: bool,
) -> RenderTable {
    let m = |d: &Decimal| money_str(d, render_full_values);

    let mut table = RenderTable {
        header: strs(&["ticker", "capital gain/loss"]),
        numeric_cols: vec![1],
        ..RenderTable::default()
    };
    let mut total = Decimal::ZERO;
    for (sec, res) in gains {
        match res {
            Ok(gain) => {
                total += gain;
                table.rows.push(vec![sec.clone(), m(gain)]);
            },
            Err(e) => {
                table.rows.push(vec![sec.clone(), "N/A".to_string()]);
                table.errors.push(format!("{}: {}", sec, e));
            },
        }
    }
    table.footer = vec!["Total".to_string(), m(&total)];
    if !table.errors.is_empty() {
        table.notes.push("Total excludes securities with errors".to_string());
    }
    table
}
