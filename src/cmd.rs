use std::path::PathBuf;

use clap::Parser;

use crate::{
    app::{input_parse::parse_manual_rates, run_capgains_app_to_console, Options},
    fx::io::{CsvRatesCache, JsonRemoteRateLoader, RateLoader},
    portfolio::{bookkeeping::OptionsPolicy, io::tx_csv::TxCsvParseOptions},
    util::{
        date::{parse_dyn_date_format, today_local},
        http::standalone::StandaloneAppRequester,
        rw::{DescribedReader, WriteHandle},
    },
    write_errln,
};

const ABOUT: &str = "Capital gains calculator, using the adjusted cost base (ACB) method";

fn get_long_about() -> String {
    "\
A cli tool which calculates the capital gains and losses realized in a tax
year, from a ledger of stock and option transactions. Losses which are
superficial (the security was re-bought within 30 days of the sale, and was
still held 30 days after it) are denied, and added to the ACB instead.

Each CSV provided should contain rows of these 8 columns, without a header
(see --has-headers):
date, description, ticker, action, qty, price, commission, currency

Transactions may be in any currency for which the Bank of Canada publishes a
daily rate to CAD. Rates are downloaded and cached as needed, or can be
provided with --rate.

Include all transactions of a security, from all years, so its ACB is
accurate."
        .to_string()
}

#[derive(Parser, Debug)]
#[command(version = crate::app::CAPGAINS_APP_VERSION,
          about = ABOUT, long_about = get_long_about())]
pub struct Args {
    #[arg(required = true)]
    csv_files: Vec<String>,

    /// Tax year to report capital gains for
    #[arg(short, long)]
    pub year: i32,

    /// Only report these tickers. May be provided multiple times.
    #[arg(short, long)]
    pub ticker: Vec<String>,

    /// The options report covers the year before this one.
    /// Defaults to the current year.
    #[arg(long)]
    pub as_of_year: Option<i32>,

    /// How option trades affect the ACB: "exclude" lists them in a separate
    /// report, "fold-into-acb" runs them through the ledger of their ticker.
    #[arg(long, default_value = "exclude", value_parser = parse_options_policy)]
    pub options_policy: OptionsPolicy,

    /// Print verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Download exchange rates, even if they are cached
    #[arg(short, long, default_value_t = false)]
    pub force_download: bool,

    /// An exchange rate to CAD to use for a day, overriding any published one.
    ///
    /// Formatted as CUR:YYYY-MM-DD:rate. Eg. USD:2022-03-04:1.2745 .
    /// May be provided multiple times.
    #[arg(short, long)]
    pub rate: Vec<String>,

    /// The first line of each csv file is a header, and is skipped
    #[arg(long, default_value_t = false)]
    pub has_headers: bool,

    /// Format of how dates appear in the csv file.
    /// The default is "[year]-[month]-[day]".
    ///
    /// See https://time-rs.github.io/book/api/format-description.html
    #[arg(long)]
    pub date_fmt: Option<String>,

    /// Print all digits in output values
    #[arg(long, default_value_t = false)]
    pub print_full_values: bool,

    /// Write output tables as CSV to the specified directory
    #[arg(short = 'd', long)]
    pub csv_output_dir: Option<String>,

    /// Directory to write schedule3-YEAR.csv to. The current directory by default.
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Do not write schedule3-YEAR.csv
    #[arg(long, default_value_t = false, conflicts_with = "export_dir")]
    pub no_export: bool,
}

fn parse_options_policy(s: &str) -> Result<OptionsPolicy, String> {
    OptionsPolicy::try_from(s)
}

fn options_from_args(args: &Args) -> Result<Options, String> {
    let date_format = match &args.date_fmt {
        Some(fmt) => Some(parse_dyn_date_format(fmt)
            .map_err(|e| format!("Invalid --date-fmt: {}", e))?),
        None => None,
    };
    let as_of_year = args.as_of_year.unwrap_or_else(|| today_local().year());

    Ok(Options {
        tickers: args.ticker.clone(),
        options_policy: args.options_policy,
        render_full_dollar_values: args.print_full_values,
        csv_parse_options: TxCsvParseOptions { date_format, has_headers: args.has_headers },
        csv_output_dir: args.csv_output_dir.clone(),
        export_dir: if args.no_export {
            None
        } else {
            Some(args.export_dir.clone().unwrap_or_else(|| PathBuf::from(".")))
        },
        ..Options::new(args.year, as_of_year)
    })
}

pub fn command_main() -> Result<(), ()> {
    let args = Args::parse();
    crate::log::set_verbose(args.verbose);
    crate::tracing::setup_tracing();
    tracing::debug!("command_main: {:#?}", args);

    let mut err_printer = WriteHandle::stderr_write_handle();

    let (options, manual_rates) = match options_from_args(&args)
        .and_then(|o| Ok((o, parse_manual_rates(&args.rate)?))) {
        Ok(r) => r,
        Err(e) => {
            write_errln!(err_printer, "{}", e);
            return Err(());
        },
    };

    let mut rate_loader = RateLoader::new(
        args.force_download,
        Box::new(CsvRatesCache::new(err_printer.clone())),
        Box::new(JsonRemoteRateLoader::new(
            StandaloneAppRequester::new_boxed(), err_printer.clone())),
        err_printer.clone());
    for r in manual_rates {
        rate_loader.add_manual_rate(r.currency, r.date, r.rate);
    }

    let csv_readers: Vec<DescribedReader> = args.csv_files.iter()
        .map(|f| DescribedReader::from_file_path(PathBuf::from(f)))
        .collect();

    run_capgains_app_to_console(&csv_readers, &options, &mut rate_loader, err_printer)
}
