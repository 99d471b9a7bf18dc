use std::collections::HashMap;

use time::Date;

use super::bookkeeping::superficial_loss::get_last_day_in_superficial_loss_period;
use super::{Security, Tx};

pub fn split_txs_by_security(all_txs: Vec<Tx>) -> HashMap<Security, Vec<Tx>> {
    let mut txs_by_sec: HashMap<Security, Vec<Tx>> = HashMap::new();
    for tx in all_txs {
        txs_by_sec.entry(tx.security.clone()).or_default().push(tx);
    }
    txs_by_sec
}

/// Keeps only txs for the given tickers (case-insensitive).
/// An empty filter keeps everything.
pub fn filter_txs_by_tickers(txs: Vec<Tx>, tickers: &[String]) -> Vec<Tx> {
    if tickers.is_empty() {
        return txs;
    }
    let wanted: Vec<String> = tickers.iter().map(|t| t.trim().to_uppercase()).collect();
    txs.into_iter()
        .filter(|tx| wanted.contains(&tx.security.to_uppercase()))
        .collect()
}

/// The last date whose txs can affect reports for `tax_year`, or for the
/// options report of `as_of_year`: the superficial loss period of a sale on
/// Dec 31 of the later year.
pub fn history_cutoff_date(tax_year: i32, as_of_year: i32) -> Result<Date, String> {
    let last_year = tax_year.max(as_of_year - 1);
    let year_end = crate::util::date::last_day_of_year(last_year)
        .map_err(|e| format!("Invalid year {}: {}", last_year, e))?;
    Ok(get_last_day_in_superficial_loss_period(year_end))
}

/// Drops txs after `cutoff`. `txs` must be sorted.
pub fn truncate_txs_after(mut txs: Vec<Tx>, cutoff: Date) -> Vec<Tx> {
    let keep = txs.partition_point(|tx| tx.date <= cutoff);
    if keep < txs.len() {
        tracing::debug!("truncate_txs_after: ignoring {} txs after {}",
                        txs.len() - keep, cutoff);
    }
    txs.truncate(keep);
    txs
}
