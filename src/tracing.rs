use time::macros::format_description;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber};

// Sets up tracing. Goes to stderr, filtered by TRACE env var.
// Levels are: trace, debug, info, warn, error
//
// EnvFilter has a standard syntax, but basically can be boiled down to (for example):
//
// All targets, info level:                   info
// The ledger engine, trace level:            capgains::portfolio::bookkeeping=trace
// Global at info, rate loading as debug:     info,capgains::fx=debug
//
// More generally: target[span{field=value}]=level
// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn setup_tracing() {
    let time_format = format_description!("[hour]:[minute]:[second].[subsecond digits:5]");

    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_env("TRACE"));

    // If the local offset can't be determined, fall back to the default (UTC)
    // timer rather than not tracing at all.
    let res = match crate::util::date::local_utc_offset() {
        Ok(offset) => tracing::subscriber::set_global_default(
            builder.with_timer(fmt::time::OffsetTime::new(offset, time_format)).finish()),
        Err(_) => tracing::subscriber::set_global_default(builder.finish()),
    };
    // Already set (eg. by another test in this process)
    let _ = res;
}
