pub mod io;
mod model;

use std::collections::HashMap;

use time::Date;

pub use self::model::*;

use crate::{portfolio::Currency, util::decimal::PosDecimal};

pub type Error = String;

/// Supplies the factor converting an amount in `currency` on `date` to the
/// base currency (CAD). The base currency always resolves to exactly 1.
pub trait RateResolver {
    fn get_rate(&mut self, currency: &Currency, date: Date) -> Result<PosDecimal, Error>;
}

/// Resolves from a fixed set of rates. Exact-date rates take precedence
/// over a currency's flat rate.
pub struct StaticRateResolver {
    day_rates: HashMap<Currency, HashMap<Date, PosDecimal>>,
    flat_rates: HashMap<Currency, PosDecimal>,
}

impl StaticRateResolver {
    pub fn new() -> StaticRateResolver {
        StaticRateResolver { day_rates: HashMap::new(), flat_rates: HashMap::new() }
    }

    pub fn with_flat_rate(mut self, currency: Currency, rate: PosDecimal) -> Self {
        self.flat_rates.insert(currency, rate);
        self
    }

    pub fn with_day_rate(mut self, currency: Currency, date: Date, rate: PosDecimal) -> Self {
        self.add_day_rate(currency, date, rate);
        self
    }

    pub fn add_day_rate(&mut self, currency: Currency, date: Date, rate: PosDecimal) {
        self.day_rates.entry(currency).or_insert_with(HashMap::new).insert(date, rate);
    }

    pub fn lookup(&self, currency: &Currency, date: Date) -> Option<PosDecimal> {
        if currency.is_default() {
            return Some(PosDecimal::one());
        }
        self.day_rates.get(currency)
            .and_then(|m| m.get(&date))
            .or_else(|| self.flat_rates.get(currency))
            .copied()
    }
}

impl RateResolver for StaticRateResolver {
    fn get_rate(&mut self, currency: &Currency, date: Date) -> Result<PosDecimal, Error> {
        self.lookup(currency, date).ok_or_else(|| format!(
            "No {}/{} exchange rate was provided for {}",
            currency, Currency::default(), date))
    }
}
