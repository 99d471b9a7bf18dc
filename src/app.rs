pub mod approot;
pub mod input_parse;
pub mod outfmt;

pub use self::approot::{
    run_capgains_app_to_console, run_capgains_app_to_writer, Options,
};

// Version is of the format 0.YY.MM[.i], or 0.year.month.optional_minor_increment,
// so it is immediately clear when the app was last updated.
pub const CAPGAINS_APP_VERSION: &str = "0.26.10";
