use std::borrow::BorrowMut;
use std::io::Read;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use time::Date;

use crate::portfolio::{Currency, InstrumentKind, Tx, TxAction};
use crate::util::date::DynDateFormat;
use crate::util::decimal::{is_negative, GreaterEqualZeroDecimal};
use crate::util::rw::{DescribedReader, WriteHandle};
use crate::write_errln;

type Error = String;

pub const N_COLUMNS: usize = 8;

/// Positional column layout of a transaction csv.
pub struct CsvCol;

impl CsvCol {
    pub const DATE: usize = 0;
    pub const DESCRIPTION: usize = 1;
    pub const TICKER: usize = 2;
    pub const ACTION: usize = 3;
    pub const QTY: usize = 4;
    pub const PRICE: usize = 5;
    pub const COMMISSION: usize = 6;
    pub const CURRENCY: usize = 7;

    pub fn name(col: usize) -> &'static str {
        match col {
            Self::DATE => "date",
            Self::DESCRIPTION => "description",
            Self::TICKER => "ticker",
            Self::ACTION => "action",
            Self::QTY => "qty",
            Self::PRICE => "price",
            Self::COMMISSION => "commission",
            Self::CURRENCY => "currency",
            _ => "unknown",
        }
    }
}

const AMOUNT_DECIMAL_PLACES: u32 = 4;

#[derive(Default)]
pub struct TxCsvParseOptions {
    pub date_format: Option<DynDateFormat>,
    // Skip the first line of each file
    pub has_headers: bool,
}

fn parse_csv_date(value: &str, fmt: &Option<DynDateFormat>) -> Result<Date, Error> {
    // Brokers often export "2022-03-04 10:31:00". Only the date matters.
    let date_part = value.split_whitespace().next().unwrap_or("");
    crate::util::date::parse_date(date_part, fmt)
        .map_err(|e| format!("Failed to parse {} \"{}\": {}",
                             CsvCol::name(CsvCol::DATE), value, e))
}

/// Parses a quantity or amount, rounded to 4 decimal places.
/// Negative values are accepted (some brokers sign sells), but are made
/// absolute with a warning.
fn parse_csv_amount(
    value: &str, col: usize, warnings: &mut Vec<String>,
) -> Result<GreaterEqualZeroDecimal, Error> {
    let col_name = CsvCol::name(col);
    let number = Decimal::from_str(value).map_err(|e| {
        format!("Failed to parse number for {} ('{}'): {}", col_name, value, e)
    })?;
    let rounded = number.round_dp_with_strategy(
        AMOUNT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    if is_negative(&rounded) {
        warnings.push(format!("Negative {} ({}) was made positive", col_name, value));
    }
    GreaterEqualZeroDecimal::try_from(rounded.abs())
}

fn tx_from_csv_record(
    record: &csv::StringRecord,
    read_index: u32,
    parse_options: &TxCsvParseOptions,
    warnings: &mut Vec<String>,
) -> Result<Tx, Error> {
    if record.len() != N_COLUMNS {
        return Err(format!("expected {} columns, entry has {}", N_COLUMNS, record.len()));
    }
    let val = |col: usize| record.get(col).unwrap_or("").trim();

    let security = val(CsvCol::TICKER).to_string();
    if security.is_empty() {
        return Err(format!("{} is empty", CsvCol::name(CsvCol::TICKER)));
    }
    let description = val(CsvCol::DESCRIPTION).to_string();
    let kind = InstrumentKind::from_description(&description, &security)?;

    Ok(Tx {
        date: parse_csv_date(val(CsvCol::DATE), &parse_options.date_format)?,
        kind,
        action: TxAction::try_from(val(CsvCol::ACTION))?,
        shares: parse_csv_amount(val(CsvCol::QTY), CsvCol::QTY, warnings)?,
        amount_per_share: parse_csv_amount(val(CsvCol::PRICE), CsvCol::PRICE, warnings)?,
        commission: parse_csv_amount(val(CsvCol::COMMISSION), CsvCol::COMMISSION, warnings)?,
        currency: Currency::new(val(CsvCol::CURRENCY)),
        security,
        description,
        read_index,
    })
}

/// Parses one transaction csv. Rows must be in chronological order.
/// `initial_global_read_index` continues the read order across files.
pub fn parse_tx_csv(
    desc_reader: &DescribedReader,
    initial_global_read_index: u32,
    parse_options: &TxCsvParseOptions,
    err_stream: &mut WriteHandle,
) -> Result<Vec<Tx>, Error> {
    let mut reader_box = desc_reader.reader()
        .map_err(|e| format!("Unable to read {}: {}", desc_reader.desc(), e))?;
    let reader: &mut dyn Read = reader_box.borrow_mut();

    let mut csv_r = csv::ReaderBuilder::new()
        .has_headers(parse_options.has_headers)
        .flexible(true)
        .from_reader(reader);

    let csv_desc = desc_reader.desc();

    let mut txs = Vec::<Tx>::new();
    let mut global_row_index = initial_global_read_index;
    let mut prev_date: Option<Date> = None;

    for (i, record_res) in csv_r.records().enumerate() {
        // Start at 1 for the user, and include any header.
        let row_num = i + if parse_options.has_headers { 2 } else { 1 };

        let record = record_res.map_err(
            |e| format!("Error reading csv record in {csv_desc} at row {row_num}: {e}"))?;

        let mut warnings = Vec::new();
        let tx = tx_from_csv_record(&record, global_row_index, parse_options, &mut warnings)
            .map_err(|e| format!("Error on row {row_num} of {csv_desc}: {e}"))?;
        for w in warnings {
            write_errln!(err_stream, "Warning: row {row_num} of {csv_desc}: {w}");
        }

        if let Some(pd) = prev_date {
            if tx.date < pd {
                return Err(format!(
                    "Error on row {row_num} of {csv_desc}: Transactions are not in \
                    chronological order ({} is before {})", tx.date, pd));
            }
        }
        prev_date = Some(tx.date);

        tracing::trace!("parse_tx_csv: {csv_desc} row {row_num}: {:?}", tx);
        txs.push(tx);
        global_row_index += 1;
    }

    Ok(txs)
}

#[cfg(any(test, feature = "testlib"))]
pub mod testlib {
    use crate::util::rw::DescribedReader;

    // The names here are abbreviated to make test writing as concise and
    // convenient as possible.
    pub struct TestTxCsvRow {
        pub d: &'static str,    // DATE
        pub desc: &'static str, // DESCRIPTION
        pub t: &'static str,    // TICKER
        pub a: &'static str,    // ACTION
        pub q: &'static str,    // QTY
        pub p: &'static str,    // PRICE
        pub c: &'static str,    // COMMISSION
        pub cur: &'static str,  // CURRENCY
    }

    impl Default for TestTxCsvRow {
        fn default() -> Self {
            TestTxCsvRow {
                d: "2022-01-03", desc: "Stocks", t: "FOO", a: "BUY",
                q: "1", p: "1", c: "0", cur: "CAD",
            }
        }
    }

    impl TestTxCsvRow {
        pub fn make_row_line(&self) -> String {
            let parts = [self.d, self.desc, self.t, self.a, self.q, self.p, self.c, self.cur];
            for part in parts {
                if part.contains(",") {
                    panic!("test tx value '{}' contained a comma, which is not supported",
                           part);
                }
            }
            parts.join(",")
        }
    }

    pub struct CsvFileBuilder {
        header: Option<String>,
    }

    impl CsvFileBuilder {
        pub fn without_header() -> CsvFileBuilder {
            CsvFileBuilder { header: None }
        }

        pub fn with_header() -> CsvFileBuilder {
            CsvFileBuilder {
                header: Some(
                    "date,description,ticker,action,qty,price,commission,currency"
                        .to_string()),
            }
        }

        fn csv_reader_from_rows<T: ToString>(
            &self,
            desc: String,
            rows: std::slice::Iter<T>,
        ) -> DescribedReader {
            let mut lines: Vec<String> = self.header.iter().cloned().collect();
            lines.extend(rows.map(|s| s.to_string()));
            DescribedReader::from_string(desc, lines.join("\n"))
        }

        pub fn single_csv_reader_raw<T: ToString>(&self, rows: &Vec<T>) -> DescribedReader {
            self.split_raw_csv_rows(&vec![rows.len()], rows).remove(0)
        }

        pub fn split_raw_csv_rows<T: ToString>(
            &self,
            file_lens: &Vec<usize>,
            rows: &Vec<T>,
        ) -> Vec<DescribedReader> {
            let mut rows_read: usize = 0;
            let mut csv_readers = Vec::new();
            for (i, file_len) in file_lens.iter().enumerate() {
                csv_readers.push(self.csv_reader_from_rows(
                    format!("foo{i}.csv"),
                    rows[rows_read..rows_read + (*file_len)].iter(),
                ));
                rows_read += *file_len;
            }
            csv_readers
        }

        pub fn single_csv_reader(&self, rows: &Vec<TestTxCsvRow>) -> DescribedReader {
            self.split_csv_rows(&vec![rows.len()], rows).remove(0)
        }

        pub fn split_csv_rows(
            &self,
            file_lens: &Vec<usize>,
            tx_rows: &Vec<TestTxCsvRow>,
        ) -> Vec<DescribedReader> {
            let rows: Vec<String> = tx_rows.iter().map(|r| r.make_row_line()).collect();
            self.split_raw_csv_rows(file_lens, &rows)
        }
    }
}
