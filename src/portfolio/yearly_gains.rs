use rust_decimal::Decimal;

use super::{InstrumentKind, Security, TxAction, TxDelta};

/// The realized gains of one security in one tax year.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct YearlyGainsReport {
    pub security: Security,
    pub year: i32,
    // Only the reportable deltas, in ledger order
    pub deltas: Vec<TxDelta>,
    pub total_gain: Decimal,
}

impl YearlyGainsReport {
    pub fn title(&self) -> String {
        format!("{}-{}", self.security, self.year)
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Stock sells are reported unless their loss was superficial (those carry
/// no gain, and were added to the ACB instead).
/// Options only realize a gain when folded into the ACB. Their other trades
/// carry a zero gain and are left to the options report.
fn is_reportable(delta: &TxDelta) -> bool {
    match delta.tx.kind {
        InstrumentKind::Stock =>
            delta.tx.action == TxAction::Sell && !delta.superficial_loss,
        InstrumentKind::Option(_) => !delta.capital_gain.is_zero(),
    }
}

pub fn yearly_gains_report(security: &Security, deltas: &[TxDelta], year: i32)
    -> YearlyGainsReport {
    let reported: Vec<TxDelta> = deltas.iter()
        .filter(|d| d.tx.year() == year && is_reportable(d))
        .cloned()
        .collect();
    let total_gain = reported.iter().map(|d| d.capital_gain).sum();
    YearlyGainsReport {
        security: security.clone(),
        year,
        deltas: reported,
        total_gain,
    }
}
