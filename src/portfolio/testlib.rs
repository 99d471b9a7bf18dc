use rust_decimal::Decimal;
use time::{Date, Duration};

use crate::{
    portfolio::{
        Currency, InstrumentKind, OptionType, PortfolioSecurityStatus, Security,
        Tx, TxAction,
    },
    util::{date::pub_testlib::doy_date, decimal::GreaterEqualZeroDecimal},
};

pub fn default_sec() -> Security {
    "FOO".to_string()
}

pub fn mk_date(day: i64) -> Date {
    doy_date(2017, 0).saturating_add(Duration::days(day))
}

// Test Tx. Field names are abbreviated to keep test tables compact.
#[derive(Clone, Debug)]
pub struct TTx {
    pub sec: Security,
    // Days after 2017-01-01. Ignored if date is set.
    pub t_day: i64,
    pub date: Option<Date>,
    pub desc: &'static str,
    pub opt: Option<OptionType>,
    pub act: TxAction,
    pub shares: GreaterEqualZeroDecimal,
    pub price: GreaterEqualZeroDecimal,
    pub comm: GreaterEqualZeroDecimal,
    pub curr: Currency,
    pub read_index: u32,
}

impl TTx {
    pub fn x(&self) -> Tx {
        Tx {
            security: self.sec.clone(),
            date: self.date.unwrap_or_else(|| mk_date(self.t_day)),
            description: if self.desc.is_empty() {
                match self.opt {
                    Some(_) => "Equity and Index Options".to_string(),
                    None => "Stocks".to_string(),
                }
            } else {
                self.desc.to_string()
            },
            kind: match self.opt {
                Some(t) => InstrumentKind::Option(t),
                None => InstrumentKind::Stock,
            },
            action: self.act,
            shares: self.shares,
            amount_per_share: self.price,
            commission: self.comm,
            currency: self.curr.clone(),
            read_index: self.read_index,
        }
    }

    pub fn d() -> Self {
        Self::default()
    }
}

impl Default for TTx {
    fn default() -> Self {
        TTx {
            sec: default_sec(),
            t_day: 0,
            date: None,
            desc: "",
            opt: None,
            act: TxAction::Buy,
            shares: GreaterEqualZeroDecimal::zero(),
            price: GreaterEqualZeroDecimal::zero(),
            comm: GreaterEqualZeroDecimal::zero(),
            curr: Currency::default(),
            read_index: 0,
        }
    }
}

/// Assigns increasing read indices, as if the txs were read from one file.
pub fn x_all(ttxs: Vec<TTx>) -> Vec<Tx> {
    ttxs.into_iter().enumerate()
        .map(|(i, t)| Tx { read_index: i as u32, ..t.x() })
        .collect()
}

// Test PortfolioSecurityStatus
#[derive(Clone, Debug)]
pub struct TPSS {
    pub sec: Security,
    pub shares: Decimal,
    pub total_acb: Decimal,
}

impl TPSS {
    pub fn x(&self) -> PortfolioSecurityStatus {
        PortfolioSecurityStatus {
            security: self.sec.clone(),
            share_balance: self.shares,
            total_acb: self.total_acb,
        }
    }

    pub fn d() -> Self {
        Self::default()
    }
}

impl Default for TPSS {
    fn default() -> Self {
        TPSS { sec: default_sec(), shares: Decimal::ZERO, total_acb: Decimal::ZERO }
    }
}
