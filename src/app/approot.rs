use std::collections::HashMap;
use std::path::PathBuf;

use itertools::Itertools;
use rust_decimal::Decimal;

use crate::{
    app::outfmt::{
        csv::CsvWriter,
        model::{OutputType, ReportWriter},
        schedule3::export_schedule3,
        text::TextWriter,
    },
    fx::RateResolver,
    portfolio::{
        bookkeeping::{options_report, txs_to_delta_list, LedgerError, OptionsPolicy},
        io::{tx_csv::TxCsvParseOptions, tx_loader::load_txs},
        misc::{filter_txs_by_tickers, history_cutoff_date, split_txs_by_security,
               truncate_txs_after},
        render::{
            render_aggregate_capital_gains, render_ledger_error, render_options_report,
            render_yearly_gains_table, RenderTable,
        },
        yearly_gains::{yearly_gains_report, YearlyGainsReport},
        Security, TxDelta,
    },
    util::rw::{DescribedReader, WriteHandle},
    verboseln, write_errln,
};

pub type Error = String;

pub const NO_TRANSACTIONS_MSG: &str = "No transactions available";

pub struct Options {
    pub tax_year: i32,
    // The options report covers the year before this one
    pub as_of_year: i32,
    // Empty for all
    pub tickers: Vec<String>,
    pub options_policy: OptionsPolicy,
    pub render_full_dollar_values: bool,
    pub csv_parse_options: TxCsvParseOptions,
    pub csv_output_dir: Option<String>,
    // None disables the schedule 3 export
    pub export_dir: Option<PathBuf>,
}

impl Options {
    pub fn new(tax_year: i32, as_of_year: i32) -> Options {
        Options {
            tax_year,
            as_of_year,
            tickers: Vec::new(),
            options_policy: OptionsPolicy::default(),
            render_full_dollar_values: false,
            csv_parse_options: TxCsvParseOptions::default(),
            csv_output_dir: None,
            export_dir: Some(PathBuf::from(".")),
        }
    }
}

pub type DeltaListResult = Result<Vec<TxDelta>, LedgerError>;

/// Reads and merges all txs, and runs each security through the ledger.
/// Only the history which can affect the requested reports is processed.
///
/// The outer Err is for input errors, which stop everything. Each
/// security's ledger succeeds or fails independently.
pub fn run_capgains_app_to_delta_models(
    csv_file_readers: &[DescribedReader],
    options: &Options,
    rate_resolver: &mut dyn RateResolver,
    mut err_printer: WriteHandle,
) -> Result<HashMap<Security, DeltaListResult>, Error> {
    let all_txs = load_txs(csv_file_readers, &options.csv_parse_options, &mut err_printer)?;
    let all_txs = filter_txs_by_tickers(all_txs, &options.tickers);
    let cutoff = history_cutoff_date(options.tax_year, options.as_of_year)?;
    let all_txs = truncate_txs_after(all_txs, cutoff);
    verboseln!("Processing {} transactions, up to {}", all_txs.len(), cutoff);

    let txs_by_sec = split_txs_by_security(all_txs);

    let mut delta_results = HashMap::<Security, DeltaListResult>::new();
    for (sec, sec_txs) in txs_by_sec {
        let deltas_res = txs_to_delta_list(&sec_txs, rate_resolver, options.options_policy);
        if let Err(e) = &deltas_res {
            tracing::error!("run_capgains_app_to_delta_models: {}", e);
        }
        delta_results.insert(sec, deltas_res);
    }
    Ok(delta_results)
}

pub struct SecurityRenderResult {
    pub security: Security,
    // eg. FOO-2022
    pub title: String,
    pub table: RenderTable,
    pub has_errors: bool,
}

pub struct AppRenderResult {
    pub tax_year: i32,
    pub options_year: i32,
    // Sorted by security
    pub security_tables: Vec<SecurityRenderResult>,
    pub options_table: Option<RenderTable>,
    pub aggregate_gains_table: Option<RenderTable>,
    // Only for securities without errors
    pub yearly_reports: Vec<YearlyGainsReport>,
}

impl AppRenderResult {
    pub fn has_errors(&self) -> bool {
        self.security_tables.iter().any(|t| t.has_errors)
    }

    pub fn is_empty(&self) -> bool {
        self.security_tables.is_empty()
    }
}

/// Renders the delta lists into generic table models, to be fed to a
/// ReportWriter (console text, or csv files).
pub fn render_delta_models(
    delta_results: &HashMap<Security, DeltaListResult>,
    options: &Options,
) -> AppRenderResult {
    let full = options.render_full_dollar_values;

    let mut security_tables = Vec::with_capacity(delta_results.len());
    let mut yearly_reports = Vec::new();
    let mut aggregate = Vec::<(Security, Result<Decimal, String>)>::new();
    let mut option_rows = Vec::new();

    for sec in delta_results.keys().sorted() {
        let title = format!("{}-{}", sec, options.tax_year);
        match &delta_results[sec] {
            Ok(deltas) => {
                let report = yearly_gains_report(sec, deltas, options.tax_year);
                security_tables.push(SecurityRenderResult {
                    security: sec.clone(),
                    title: report.title(),
                    table: render_yearly_gains_table(&report, full),
                    has_errors: false,
                });
                aggregate.push((sec.clone(), Ok(report.total_gain)));
                yearly_reports.push(report);
                if options.options_policy == OptionsPolicy::Exclude {
                    option_rows.extend(options_report(deltas, options.as_of_year));
                }
            },
            Err(e) => {
                security_tables.push(SecurityRenderResult {
                    security: sec.clone(),
                    title,
                    table: render_ledger_error(e),
                    has_errors: true,
                });
                aggregate.push((sec.clone(), Err(e.to_string())));
            },
        }
    }

    let options_table = if option_rows.is_empty() {
        None
    } else {
        option_rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.security.cmp(&b.security)));
        Some(render_options_report(&option_rows, full))
    };

    // A total is only interesting for more than one security
    let aggregate_gains_table = if aggregate.len() > 1 {
        Some(render_aggregate_capital_gains(&aggregate, full))
    } else {
        None
    };

    AppRenderResult {
        tax_year: options.tax_year,
        options_year: options.as_of_year - 1,
        security_tables,
        options_table,
        aggregate_gains_table,
        yearly_reports,
    }
}

pub fn write_render_result(render_res: &AppRenderResult, writer: &mut dyn ReportWriter)
    -> Result<(), Error> {
    if render_res.is_empty() {
        return writer.print_message(NO_TRANSACTIONS_MSG);
    }

    for sec_table in &render_res.security_tables {
        writer.print_render_table(OutputType::YearlyGains, &sec_table.title, &sec_table.table)
            .map_err(|e| format!("Rendering gains for {}: {}", sec_table.security, e))?;
    }

    if let Some(table) = &render_res.options_table {
        writer.print_render_table(
            OutputType::OptionsReport, &render_res.options_year.to_string(), table)
            .map_err(|e| format!("Rendering options report: {e}"))?;
    }
    if let Some(table) = &render_res.aggregate_gains_table {
        writer.print_render_table(
            OutputType::AggregateGains, &render_res.tax_year.to_string(), table)
            .map_err(|e| format!("Rendering aggregate gains: {e}"))?;
    }

    let secs_with_errors: Vec<&str> = render_res.security_tables.iter()
        .filter(|t| t.has_errors)
        .map(|t| t.security.as_str())
        .collect();
    if !secs_with_errors.is_empty() {
        writer.print_message(&format!(
            "[!] There are errors for the following securities: {}",
            secs_with_errors.join(", ")))?;
    }
    Ok(())
}

/// Runs the whole app: ledger, rendering and the schedule 3 export.
///
/// Returned Err is for exit code determination only. All errors are written
/// to err_printer (or the writer, for per-security errors). Securities that
/// fail do not stop the others from being reported, but still produce an Err.
pub fn run_capgains_app_to_writer(
    writer: &mut dyn ReportWriter,
    csv_file_readers: &[DescribedReader],
    options: &Options,
    rate_resolver: &mut dyn RateResolver,
    mut err_printer: WriteHandle,
) -> Result<AppRenderResult, ()> {
    let delta_results = match run_capgains_app_to_delta_models(
        csv_file_readers, options, rate_resolver, err_printer.clone()) {
        Ok(r) => r,
        Err(e) => {
            write_errln!(err_printer, "{}", e);
            return Err(());
        },
    };

    let render_res = render_delta_models(&delta_results, options);

    if let Err(e) = write_render_result(&render_res, writer) {
        write_errln!(err_printer, "{}", e);
        return Err(());
    }

    if let Some(dir) = &options.export_dir {
        if !render_res.is_empty() {
            match export_schedule3(dir, options.tax_year, &render_res.yearly_reports,
                                   options.render_full_dollar_values) {
                Ok(path) => verboseln!("Wrote {}", path.display()),
                Err(e) => {
                    write_errln!(err_printer, "{}", e);
                    return Err(());
                },
            }
        }
    }

    if render_res.has_errors() {
        return Err(());
    }
    Ok(render_res)
}

pub fn run_capgains_app_to_console(
    csv_file_readers: &[DescribedReader],
    options: &Options,
    rate_resolver: &mut dyn RateResolver,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let mut writer: Box<dyn ReportWriter> = match &options.csv_output_dir {
        Some(dir_path) => match CsvWriter::new(dir_path, WriteHandle::stdout_write_handle()) {
            Ok(w) => Box::new(w),
            Err(e) => {
                write_errln!(err_printer, "Unable to use {}: {}", dir_path, e);
                return Err(());
            },
        },
        None => Box::new(TextWriter::new(WriteHandle::stdout_write_handle())),
    };

    run_capgains_app_to_writer(
        writer.as_mut(), csv_file_readers, options, rate_resolver, err_printer)
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::app::outfmt::text::TextWriter;
    use crate::fx::StaticRateResolver;
    use crate::pdec;
    use crate::portfolio::io::tx_csv::testlib::{CsvFileBuilder, TestTxCsvRow as Row};
    use crate::portfolio::Currency;
    use crate::testlib::assert_re;
    use crate::util::rw::WriteHandle;

    use super::{
        render_delta_models, run_capgains_app_to_delta_models,
        run_capgains_app_to_writer, Options,
    };

    fn test_options(tax_year: i32) -> Options {
        Options { export_dir: None, ..Options::new(tax_year, tax_year + 1) }
    }

    #[test]
    #[rustfmt::skip]
    fn test_delta_models_cut_off_and_filter() {
        let readers = CsvFileBuilder::without_header().split_csv_rows(&vec![4], &vec![
            Row{d: "2022-01-03", t: "FOO", a: "BUY", q: "10", p: "1", ..Row::default()},
            Row{d: "2022-01-04", t: "BAR", a: "BUY", q: "10", p: "1", ..Row::default()},
            Row{d: "2023-01-30", t: "FOO", a: "BUY", q: "1", p: "1", ..Row::default()},
            // Past the cutoff. Would otherwise be a negative balance.
            Row{d: "2023-01-31", t: "FOO", a: "SELL", q: "100", p: "1", ..Row::default()},
        ]);

        let mut options = test_options(2022);
        let res = run_capgains_app_to_delta_models(
            &readers, &options, &mut StaticRateResolver::new(),
            WriteHandle::empty_write_handle()).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res["FOO"].as_ref().unwrap().len(), 2);

        options.tickers = vec!["bar".to_string()];
        let res = run_capgains_app_to_delta_models(
            &readers, &options, &mut StaticRateResolver::new(),
            WriteHandle::empty_write_handle()).unwrap();
        assert_eq!(res.len(), 1);
        assert!(res.contains_key("BAR"));
    }

    #[test]
    #[rustfmt::skip]
    fn test_render_models() {
        let readers = CsvFileBuilder::without_header().split_csv_rows(&vec![6], &vec![
            Row{d: "2018-01-02", desc: "ESPP PURCHASE", t: "ANET", a: "BUY", q: "100", p: "50", c: "10", cur: "USD"},
            Row{d: "2018-02-20", desc: "RSU VEST", t: "ANET", a: "SELL", q: "50", p: "120", c: "10", cur: "USD"},
            Row{d: "2018-03-01", t: "GOOGL", a: "BUY", q: "5", p: "1000", ..Row::default()},
            // Fails
            Row{d: "2018-03-01", t: "XYZ", a: "SELL", q: "5", p: "1000", ..Row::default()},
            Row{d: "2018-05-01", desc: "Option", t: "ANET180601C", a: "BUY", q: "1", p: "2", c: "1", cur: "USD"},
            // Past the cutoff
            Row{d: "2019-05-01", desc: "Option", t: "ANET190601C", a: "BUY", q: "1", p: "2", c: "1", cur: "USD"},
        ]);
        let options = Options { as_of_year: 2019, ..test_options(2018) };
        let mut rates = StaticRateResolver::new().with_flat_rate(Currency::usd(), pdec!(2));
        let delta_results = run_capgains_app_to_delta_models(
            &readers, &options, &mut rates, WriteHandle::empty_write_handle()).unwrap();
        let res = render_delta_models(&delta_results, &options);

        let titles: Vec<&str> = res.security_tables.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["ANET-2018", "ANET180601C-2018", "GOOGL-2018", "XYZ-2018"]);
        assert!(res.has_errors());
        assert_eq!(res.security_tables[0].table.preamble, vec!["[Total Gains = 6,970.00]"]);
        assert_eq!(res.security_tables[2].table.notes, vec!["No capital gains"]);
        assert_re(r"^In SELL transaction of XYZ on 2018-03-01 \(entry 3\): share balance",
                  &res.security_tables[3].table.errors[0]);

        let options_table = res.options_table.as_ref().unwrap();
        assert_eq!(options_table.rows.len(), 1);
        assert_eq!(options_table.rows[0][7], "6.00");

        let aggregate = res.aggregate_gains_table.as_ref().unwrap();
        assert_eq!(aggregate.footer, vec!["Total", "6,970.00"]);
        assert_eq!(res.yearly_reports.len(), 3);
        assert_eq!(res.yearly_reports[0].total_gain, dec!(6970));
    }

    #[test]
    fn test_run_to_writer() {
        let (wh, buff) = WriteHandle::string_buff_write_handle();
        let mut writer = TextWriter::new(wh);

        // No transactions at all
        let res = run_capgains_app_to_writer(
            &mut writer, &[], &test_options(2018), &mut StaticRateResolver::new(),
            WriteHandle::empty_write_handle());
        assert!(res.is_ok());
        assert_eq!(buff.borrow().as_str(), "No transactions available\n");
        buff.borrow_mut().clear();

        // Negative balance
        let readers = CsvFileBuilder::without_header().split_csv_rows(&vec![1], &vec![
            Row { d: "2018-03-01", a: "SELL", ..Row::default() },
        ]);
        let res = run_capgains_app_to_writer(
            &mut writer, &readers, &test_options(2018), &mut StaticRateResolver::new(),
            WriteHandle::empty_write_handle());
        assert!(res.is_err());
        let out = buff.borrow().as_str().to_string();
        assert_re(r"^FOO-2018\n\[!\] In SELL transaction of FOO", &out);
        assert_re(r"errors for the following securities: FOO\n$", &out);

        // Input error
        let readers = CsvFileBuilder::without_header().split_raw_csv_rows(
            &vec![1], &vec!["2018-03-01,Stocks,FOO,BUY,1,1"]);
        let (err_wh, err_buff) = WriteHandle::string_buff_write_handle();
        let res = run_capgains_app_to_writer(
            &mut writer, &readers, &test_options(2018), &mut StaticRateResolver::new(),
            err_wh);
        assert!(res.is_err());
        assert_eq!(err_buff.borrow().as_str(),
                   "Error on row 1 of foo0.csv: expected 8 columns, entry has 6\n");
    }
}
