use std::collections::{HashMap, HashSet};
use std::io::Write;

use rust_decimal::Decimal;
use time::{Date, Duration};
use tracing::{debug, error, info, trace};

use crate::fx::{DailyRate, RateResolver};
use crate::log::WriteHandle;
use crate::portfolio::Currency;
use crate::util::date::{first_day_of_year, today_local};
use crate::util::decimal::PosDecimal;
use crate::write_errln;

use super::{Error, RatesCache, RemoteRateLoader};

const MAX_LOOKBACK_DAYS: usize = 7;

type CurrencyYear = (Currency, u32);

/// Loads exchange rates, from the cache or remotely, and resolves the
/// effective rate for a trade date.
pub struct RateLoader {
    pub force_download: bool,
    pub cache: Box<dyn RatesCache>,
    pub remote_loader: Box<dyn RemoteRateLoader>,
    err_stream: WriteHandle,

    year_rates: HashMap<CurrencyYear, HashMap<Date, DailyRate>>,
    fresh_loaded_years: HashSet<CurrencyYear>,
    // User supplied. These override anything published.
    manual_rates: HashMap<(Currency, Date), PosDecimal>,
}

impl RateLoader {
    pub fn new(force_download: bool,
               cache: Box<dyn RatesCache>,
               remote_loader: Box<dyn RemoteRateLoader>,
               err_stream: WriteHandle) -> RateLoader {
        RateLoader{
            force_download,
            cache,
            remote_loader,
            err_stream,
            year_rates: HashMap::new(),
            fresh_loaded_years: HashSet::new(),
            manual_rates: HashMap::new(),
        }
    }

    pub fn add_manual_rate(&mut self, currency: Currency, date: Date, rate: PosDecimal) {
        self.manual_rates.insert((currency, date), rate);
    }
}

// Fills in gaps in daily rates (for a single year) with zero
// If today is in the same year as the rates, will fill up to yesterday, with the
// assumption that today's rate wouldn't yet be published.
//
// This differentiates which dates in the cache have been previously looked up
// from the ones left empty because they are still in the future.
fn fill_in_unknown_day_rates(rates: &Vec<DailyRate>, year: u32) -> Result<Vec<DailyRate>, Error> {
    let mut filled_rates: Vec<DailyRate> = Vec::with_capacity(366);

    let mut date_to_fill = first_day_of_year(year as i32).map_err(|e| e.to_string())?;
    for rate in rates {
        while date_to_fill < rate.date {
            filled_rates.push(DailyRate::new(date_to_fill, Decimal::ZERO));
            date_to_fill = date_to_fill.saturating_add(Duration::days(1));
        }
        filled_rates.push(rate.clone());
        date_to_fill = date_to_fill.saturating_add(Duration::days(1));
    }

    let today = today_local();
    while date_to_fill < today && date_to_fill.year() == (year as i32) {
        filled_rates.push(DailyRate::new(date_to_fill, Decimal::ZERO));
        date_to_fill = date_to_fill.saturating_add(Duration::days(1));
    }

    filled_rates.shrink_to_fit();
    Ok(filled_rates)
}

fn make_date_to_rate_map(rates: &Vec<DailyRate>) -> HashMap<Date, DailyRate> {
    rates.iter().map(|r| (r.date, r.clone())).collect()
}

impl RateLoader {
    /// The rate on `trade_date`, or failing that, the closest preceding
    /// published rate (at most 7 days back).
    pub async fn get_effective_rate(&mut self, currency: &Currency, trade_date: Date) -> Result<DailyRate, Error> {
        let fmt_err = |e| {
            format!("Unable to retrieve {}/{} exchange rate for {}: {}",
                    currency, Currency::default(), trade_date, e) };
        match self.get_exact_rate(currency, trade_date).await {
            Ok(Some(rate)) => Ok(rate),
            Ok(None) => self.find_preceding_relevant_spot_rate(currency, trade_date).await
                .map_err(fmt_err),
            Err(e) => Err(fmt_err(e)),
        }
    }

    async fn get_exact_rate(&mut self, currency: &Currency, trade_date: Date) -> Result<Option<DailyRate>, Error> {
        if let Some(rate) = self.manual_rates.get(&(currency.clone(), trade_date)) {
            return Ok(Some(DailyRate::new(trade_date, **rate)));
        }

        let key = (currency.clone(), trade_date.year() as u32);
        if !self.year_rates.contains_key(&key) {
            debug!(currency = currency.as_str(), year = key.1,
                   "RateLoader::get_exact_rate year not yet loaded");
            let rates = self.fetch_rates_for_date_year(currency, &trade_date).await?;
            self.year_rates.insert(key.clone(), rates);
        }
        let year_rates = self.year_rates.get(&key)
            .ok_or_else(|| format!("{} rates for {} were not loaded", currency, key.1))?;

        if let Some(rate) = year_rates.get(&trade_date) {
            if rate.is_unpublished() {
                Ok(None)
            } else {
                Ok(Some(rate.clone()))
            }
        } else {
            let today = today_local();
            if trade_date >= today {
                // There is no rate available for today yet.
                // The user must manually provide a rate in this scenario.
                return Err(format!(concat!(
                    "No {}/{} exchange rate is available for {} yet. Provide one ",
                    "explicitly with --rate. If today is a bank holiday, use the rate ",
                    "for the preceding business day."),
                    currency, Currency::default(), trade_date));
            }
            // No rate for this exact date, but it is in the past, so the caller
            // can try a preceding date.
            Ok(None)
        }
    }

    // Loads rates for the year of target_date from cache or from the remote.
    //
    // The cache is used if we are not force downloading, if we already downloaded
    // in this process run, or if `target_date` has a defined value in the cache
    // (even if it is defined as zero). Using `target_date` for invalidation avoids
    // refetching when there are no new transactions.
    async fn fetch_rates_for_date_year(&mut self, currency: &Currency, target_date: &Date) -> Result<HashMap<Date, DailyRate>, Error> {
        let year = target_date.year() as u32;
        let key = (currency.clone(), year);
        if !self.force_download {
            let rates_are_fresh = self.fresh_loaded_years.contains(&key);
            match self.cache.get_rates(currency, year) {
                Err(e) => {
                    if rates_are_fresh {
                        // Already downloaded during this run, and we may not
                        // make the same request again.
                        return Err(e);
                    }
                    write_errln!(self.err_stream, "Could not load cached exchange rates: {}", e);
                },
                Ok(Some(rates)) => {
                    info!("RateLoader::fetch {} {} rates found in cache", currency, year);
                    let rates_map = make_date_to_rate_map(&rates);
                    if rates_are_fresh || rates_map.contains_key(target_date) {
                        return Ok(rates_map);
                    }
                },
                Ok(None) => {
                    info!("RateLoader::fetch NO {} {} rates found in cache", currency, year);
                    if rates_are_fresh {
                        return Err(format!(
                            "Did not find {} rates for {} in cache after they were downloaded",
                            currency, year));
                    }
                },
            }
        }

        self.get_remote_rates(currency, year).await
            .map(|r| make_date_to_rate_map(&r))
    }

    async fn get_remote_rates(&mut self, currency: &Currency, year: u32) -> Result<Vec<DailyRate>, Error> {
        trace!(currency = currency.as_str(), year = year, "RateLoader::get_remote_rates");
        let res = self.remote_loader.get_remote_rates(currency, year).await?;
        for nfe in res.non_fatal_errors {
            write_errln!(self.err_stream, "{}", nfe);
        }
        let rates = fill_in_unknown_day_rates(&res.rates, year)?;

        self.fresh_loaded_years.insert((currency.clone(), year));
        if let Err(e) = self.cache.write_rates(currency, year, &rates) {
            error!("RateLoader::get_remote_rates cache write failed: {}", e);
            write_errln!(self.err_stream, "Failed to update exchange rate cache: {}", e);
            let _ = self.err_stream.flush();
        }

        Ok(rates)
    }

    // As per the CRA's interpretation of Section 261 (1.4)
    // https://www.canada.ca/en/revenue-agency/services/tax/technical-information/income-tax/income-tax-folios-index/series-5-international-residency/series-5-international-residency-folio-4-foreign-currency/income-tax-folio-s5-f4-c1-income-tax-reporting-currency.html
    //
    // The relevant spot rate is the one quoted by the Bank of Canada on that day.
    // If no rate is quoted for that particular day, the closest preceding day for
    // which such a rate is quoted should be used.
    //
    // Must NOT be called for today if the rate is not yet knowable.
    async fn find_preceding_relevant_spot_rate(&mut self, currency: &Currency, trade_date: Date) -> Result<DailyRate, Error> {
        let tax_recommendation = concat!(
            "As per Section 261(1) of the Income Tax Act, the exchange rate ",
            "from the preceding day for which such a rate is quoted should be ",
            "used if no rate is quoted on the day the trade.");

        let mut preceding_date = trade_date;
        for _ in 0..MAX_LOOKBACK_DAYS {
            preceding_date = preceding_date.saturating_sub(Duration::days(1));
            match self.get_exact_rate(currency, preceding_date).await {
                Ok(Some(rate)) => return Ok(rate),
                Ok(None) => (),
                Err(e) => {
                    return Err(format!(
                        "Could not retrieve exchange rates within the {} preceding days ({}). {}",
                        MAX_LOOKBACK_DAYS, e, tax_recommendation));
                },
            }
        }

        Err(format!(
            "Could not find relevant exchange rate within the {} preceding days. {}",
            MAX_LOOKBACK_DAYS, tax_recommendation))
    }
}

impl RateResolver for RateLoader {
    fn get_rate(&mut self, currency: &Currency, date: Date) -> Result<PosDecimal, Error> {
        if currency.is_default() {
            return Ok(PosDecimal::one());
        }
        let rate = async_std::task::block_on(self.get_effective_rate(currency, date))?;
        PosDecimal::try_from(rate.foreign_to_local_rate)
    }
}
