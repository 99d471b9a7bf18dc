use std::str::FromStr;

use rust_decimal::Decimal;
use time::Date;

use crate::{
    portfolio::Currency,
    util::{date::parse_standard_date, decimal::PosDecimal},
};

pub type Error = String;

#[derive(PartialEq, Eq, Debug)]
pub struct ManualRate {
    pub currency: Currency,
    pub date: Date,
    pub rate: PosDecimal,
}

/// Takes a list of exchange rate strings, each formatted as:
/// CUR:YYYY-MM-DD:rate. Eg. USD:2022-03-04:1.2745
pub fn parse_manual_rates(rate_strs: &[String]) -> Result<Vec<ManualRate>, Error> {
    rate_strs.iter().map(|s| parse_manual_rate(s)).collect()
}

fn parse_manual_rate(rate_str: &str) -> Result<ManualRate, Error> {
    let parts: Vec<&str> = rate_str.split(':').map(|s| s.trim()).collect();
    let [curr_str, date_str, rate_val_str] = parts[..] else {
        return Err(format!("Invalid rate format '{rate_str}'. Expected CUR:YYYY-MM-DD:rate"));
    };
    if curr_str.is_empty() {
        return Err(format!("Currency was empty in '{rate_str}'"));
    }
    let currency = Currency::new(curr_str);
    if currency.is_default() {
        return Err(format!("Rate for {} is always 1, and cannot be set", currency));
    }

    let date = parse_standard_date(date_str)
        .map_err(|e| format!("Invalid date '{date_str}'. {e}"))?;

    let rate = Decimal::from_str(rate_val_str)
        .map_err(|e| format!("Invalid rate '{rate_val_str}'. {e}"))?;
    let rate = PosDecimal::try_from(rate)
        .map_err(|_| format!("Rate {rate} was not positive"))?;

    Ok(ManualRate { currency, date, rate })
}
