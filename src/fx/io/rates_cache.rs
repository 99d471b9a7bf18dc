use std::{collections::HashMap, fs::File, io::{ErrorKind, Read}, path::PathBuf, str::FromStr};

use rust_decimal::Decimal;

use crate::{
    fx::DailyRate,
    log::WriteHandle,
    portfolio::Currency,
    util::{date, os::{cache_dir_path, mk_writable_dir}, rc::RcRefCell},
    write_errln,
};

use super::Error;

pub trait RatesCache {
    fn write_rates(&mut self, currency: &Currency, year: u32, rates: &Vec<DailyRate>) -> Result<(), Error>;
    /// Ok(None) when nothing has been cached for this currency and year.
    fn get_rates(&mut self, currency: &Currency, year: u32) -> Result<Option<Vec<DailyRate>>, Error>;
}

pub type CurrencyYearRates = HashMap<(Currency, u32), Vec<DailyRate>>;

pub struct InMemoryRatesCache {
    pub rates_by_year: RcRefCell<CurrencyYearRates>,
}

impl RatesCache for InMemoryRatesCache {
    fn write_rates(&mut self, currency: &Currency, year: u32, rates: &Vec<DailyRate>) -> Result<(), Error> {
        self.rates_by_year.borrow_mut().insert((currency.clone(), year), rates.clone());
        Ok(())
    }

    fn get_rates(&mut self, currency: &Currency, year: u32) -> Result<Option<Vec<DailyRate>>, Error> {
        Ok(self.rates_by_year.borrow().get(&(currency.clone(), year)).cloned())
    }
}

/// Stores one csv file (date,rate) per currency and year in the cache
/// directory, eg. rates-USD-2022.csv
pub struct CsvRatesCache {
    dir: Option<PathBuf>,
    err_writer: WriteHandle,
}

impl CsvRatesCache {
    pub fn new(err_writer: WriteHandle) -> CsvRatesCache {
        CsvRatesCache{dir: None, err_writer}
    }

    pub fn new_in_dir(dir: PathBuf, err_writer: WriteHandle) -> CsvRatesCache {
        CsvRatesCache{dir: Some(dir), err_writer}
    }

    fn rates_file_path(&self, currency: &Currency, year: u32) -> Result<PathBuf, Error> {
        let dir = match &self.dir {
            Some(d) => {
                mk_writable_dir(d)
                    .map_err(|e| format!("Unable to create {}: {}", d.display(), e))?;
                d.clone()
            },
            None => cache_dir_path()?,
        };
        Ok(dir.join(format!("rates-{}-{}.csv", currency, year)))
    }

    /// Bad rows are reported and skipped. The next remote fetch rewrites
    /// the whole file anyway.
    fn get_rates_from_csv(&mut self, r: &mut dyn Read) -> Result<Vec<DailyRate>, Error> {
        let mut csv_r = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(r);

        let mut rates = Vec::new();
        for record_res in csv_r.records() {
            let parsed = record_res
                .map_err(|e| format!("Error reading rates csv record: {}", e))
                .and_then(|record| daily_rate_from_record(&record));
            match parsed {
                Ok(rate) => rates.push(rate),
                Err(e) => write_errln!(self.err_writer, "{}", e),
            }
        }
        Ok(rates)
    }
}

fn daily_rate_from_record(record: &csv::StringRecord) -> Result<DailyRate, Error> {
    let date_field = record.get(0)
        .ok_or("Error reading rates from csv: Row has no fields")?;
    let date_val = date::parse_standard_date(date_field)
        .map_err(|e| format!("Error parsing rates csv date: {}", e))?;
    let rate_field = record.get(1)
        .ok_or_else(|| format!("Error reading rates from csv: {} has no rate", date_val))?;
    let rate = Decimal::from_str(rate_field)
        .map_err(|e| format!("Error parsing rates csv rate for {}: {}", date_val, e))?;
    Ok(DailyRate::new(date_val, rate))
}

impl RatesCache for CsvRatesCache {
    fn write_rates(&mut self, currency: &Currency, year: u32, rates: &Vec<DailyRate>) -> Result<(), Error> {
        let path = self.rates_file_path(currency, year)?;
        let file = File::create(&path)
            .map_err(|e| format!("Unable to create {}: {}", path.display(), e))?;

        let mut csv_w = csv::Writer::from_writer(file);
        for rate in rates {
            csv_w.write_record(vec![rate.date.to_string(), rate.foreign_to_local_rate.to_string()])
                .map_err(|e| e.to_string())?;
        }
        csv_w.flush()
            .map_err(|e| e.to_string())
    }

    fn get_rates(&mut self, currency: &Currency, year: u32) -> Result<Option<Vec<DailyRate>>, Error> {
        let path = self.rates_file_path(currency, year)?;
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("Unable to open {}: {}", path.display(), e)),
        };
        self.get_rates_from_csv(&mut file).map(Some)
    }
}
