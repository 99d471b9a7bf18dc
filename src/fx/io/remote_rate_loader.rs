use std::{collections::HashSet, str::FromStr};

use json::JsonValue;
use rust_decimal::Decimal;
use time::Date;
use tracing::debug;

use crate::{
    fx::DailyRate,
    log::WriteHandle,
    portfolio::Currency,
    util::{date, http::HttpRequester},
    verboseln, write_errln,
};

use super::Error;

// Legacy noon rate. Only published for USD, and only until April 2017.
const USD_CAD_NOON_OBSERVATION: &str = "IEXE0101";
const FIRST_DAILY_OBSERVATION_YEAR: u32 = 2017;

/// The Bank of Canada Valet series holding `currency` to CAD rates for `year`.
/// Daily FX series are named like FXUSDCAD, and give the CAD value of one
/// unit of the foreign currency.
pub fn boc_series_name(currency: &Currency, year: u32) -> Result<String, Error> {
    if year >= FIRST_DAILY_OBSERVATION_YEAR {
        Ok(format!("FX{}CAD", currency))
    } else if *currency == Currency::usd() {
        Ok(USD_CAD_NOON_OBSERVATION.to_string())
    } else {
        Err(format!("Bank of Canada does not publish {}/CAD rates before {}",
                    currency, FIRST_DAILY_OBSERVATION_YEAR))
    }
}

fn get_fx_json_url(series: &str, year: u32) -> String {
    format!(
        "https://www.bankofcanada.ca/valet/observations/{}/json?start_date={}-01-01&end_date={}-12-31",
        series, year, year
    )
}

#[derive(Debug)]
pub struct RateParseResult {
    pub rates: Vec<DailyRate>,
    pub non_fatal_errors: Vec<String>,
}

pub type RateLoadResult = RateParseResult;

#[async_trait::async_trait(?Send)]
pub trait RemoteRateLoader {
    async fn get_remote_rates(&mut self, currency: &Currency, year: u32) -> Result<RateLoadResult, Error>;
}

const JSON_DATE_FORMAT: date::StaticDateFormat = date::STANDARD_DATE_FORMAT;

fn json_value_to_decimal(jv: &JsonValue) -> Result<Decimal, Error> {
    match jv {
        JsonValue::String(v) =>
            Decimal::from_str(v).map_err(|e| e.to_string()),
        JsonValue::Short(v) =>
            Decimal::from_str(v.as_str()).map_err(|e| e.to_string()),
        JsonValue::Number(v) =>
            Decimal::from_str(&v.to_string()).map_err(|e| e.to_string()),
        v => Err(format!("Value (not a number): {}", v)),
    }
}

fn json_value_to_positive_decimal(jv: &JsonValue) -> Result<Decimal, Error> {
    let d = json_value_to_decimal(jv)?;
    if crate::util::decimal::is_positive(&d) {
        Ok(d)
    } else {
        Err(format!("Value is not positive: {}", d))
    }
}

fn json_value_to_string(jv: &JsonValue) -> Option<&str> {
    match jv {
        JsonValue::Short(v) => Some(v.as_str()),
        JsonValue::String(s) => Some(s.as_str()),
        _ => None
    }
}

pub(crate) fn parse_rates_json(json_str: &str, series: &str) -> Result<RateParseResult, Error> {
    let fmt_err = |s: &str| -> Result<_, Error> {
        Err(format!("Error parsing {} rates: {}", series, s))
    };

    let json_obj = match json::parse(json_str) {
        Ok(v) => v,
        Err(e) => return fmt_err(&e.to_string()),
    };

    // BoC valet Json schema:
    // {
    //    observations: [
    //      {
    //         d: <date: string, formatted as yyyy-mm-dd>,
    //         <series>: { v: <value: string encoded float> }
    //      }
    //    ]
    // }

    let observations = match &json_obj {
        JsonValue::Object(o) => match o.get("observations") {
            Some(obs) => obs,
            None => return fmt_err("Did not find 'observations'"),
        },
        _ => return fmt_err("Root was not of type object"),
    };

    let mut rates = Vec::new();
    let mut non_fatal_dyn: Vec<String> = vec![];
    let mut non_fatal_static: HashSet<&str> = HashSet::new();

    for v in observations.members() {
        let obs = match v {
            JsonValue::Object(o) => o,
            v => {
                non_fatal_dyn.push(format!("Non-object found in observations: {}", v));
                continue;
            },
        };
        let date_str = match obs.get("d") {
            Some(d) => match json_value_to_string(d) {
                Some(s) => s,
                None => {
                    non_fatal_dyn.push(format!(
                        "Date in rate observation of wrong type: {:?}", d));
                    continue;
                },
            },
            None => {
                non_fatal_static.insert("Rate observation missing date");
                continue;
            },
        };

        let date = match Date::parse(date_str, JSON_DATE_FORMAT) {
            Ok(date) => date,
            Err(e) => {
                non_fatal_dyn.push(format!("Failed to parse date {:?}: {}", date_str, e));
                continue;
            },
        };

        // { v: <value: string encoded float> }
        let rate_res: Result<Option<Decimal>, Error> = match obs.get(series) {
            Some(JsonValue::Object(o)) => match o.get("v") {
                Some(jv) => json_value_to_positive_decimal(jv).map(Some),
                None => Err("No value (\"v\") found".to_string()),
            },
            Some(v) => Err(format!("value container was not an object: {}", v)),
            // No rate published on this date.
            None => Ok(None),
        };

        match rate_res {
            Ok(Some(r)) => rates.push(DailyRate::new(date, r)),
            Ok(None) => (),
            Err(e) => non_fatal_dyn.push(
                format!("Failed to parse rate for {}: {}", date_str, e)),
        }
    }

    let mut non_fatal_errors: Vec<String> =
        Vec::from_iter(non_fatal_static.drain().map(|s| s.to_string()));
    non_fatal_errors.append(&mut non_fatal_dyn);

    Ok(RateParseResult{rates, non_fatal_errors})
}

/// Fetches rates from the Bank of Canada Valet json API.
pub struct JsonRemoteRateLoader {
    http_requester: Box<dyn HttpRequester>,
    user_err_stream: WriteHandle,
}

impl JsonRemoteRateLoader {
    pub fn new(http_requester: Box<dyn HttpRequester>,
               user_err_stream: WriteHandle) -> JsonRemoteRateLoader {
        JsonRemoteRateLoader{http_requester, user_err_stream}
    }
}

#[async_trait::async_trait(?Send)]
impl RemoteRateLoader for JsonRemoteRateLoader {
    async fn get_remote_rates(&mut self, currency: &Currency, year: u32) -> Result<RateLoadResult, Error> {
        let series = boc_series_name(currency, year)?;
        write_errln!(self.user_err_stream,
            "Fetching {}/{} exchange rates for {}", currency, Currency::default(), year);
        let url = get_fx_json_url(&series, year);
        verboseln!("Fetching {}", url);
        debug!(url = url, "JsonRemoteRateLoader::get_remote_rates");

        let text = self.http_requester.get(&url).await
            .map_err(|e| format!("Error getting {}/{} rates: {}",
                                 currency, Currency::default(), e))?;

        parse_rates_json(&text, &series)
    }
}

// Ideally this would be marked as cfg(test), but integration tests
// also need access, so it cannot be test-only.
pub mod pub_testlib {
    use std::collections::HashMap;

    use tracing::trace;

    use crate::{fx::DailyRate, portfolio::Currency, util::rc::RcRefCell};

    use super::{RateLoadResult, RemoteRateLoader, Error};

    pub struct MockRemoteRateLoader {
        pub remote_year_rates: RcRefCell<HashMap<(Currency, u32), Vec<DailyRate>>>,
    }

    #[async_trait::async_trait(?Send)]
    impl RemoteRateLoader for MockRemoteRateLoader {
        async fn get_remote_rates(&mut self, currency: &Currency, year: u32) -> Result<RateLoadResult, Error> {
            trace!(currency = currency.as_str(), year = year, "MockRemoteRateLoader::get_remote_rates");
            match self.remote_year_rates.borrow().get(&(currency.clone(), year)) {
                Some(rates) =>
                    Ok(RateLoadResult{rates: rates.clone(), non_fatal_errors: vec![]}),
                None => Err(format!("No {} rates set for {}", currency, year)),
            }
        }
    }
}
