use std::sync::Mutex;

use lazy_static::lazy_static;

pub use crate::util::rw::WriteHandle;

lazy_static! {
    static ref VERBOSE: Mutex<bool> = Mutex::new(false);
}

pub fn set_verbose(verb: bool) {
    if let Ok(mut var) = VERBOSE.lock() {
        *var = verb;
    }
}

pub fn get_verbose() -> bool {
    VERBOSE.lock().map(|v| *v).unwrap_or(false)
}

// tt - TokenTree
// ($($arg:tt)*) Variable number of tts
#[macro_export]
macro_rules! verboseln {
    ($($arg:tt)*) => {{
        if $crate::log::get_verbose() {
            eprintln!($($arg)*);
        }
    }};
}

/// Writes a line to a user-facing error stream (usually a WriteHandle).
/// Write failures are dropped, since there is nowhere left to report them.
#[macro_export]
macro_rules! write_errln {
    ($w:expr, $($arg:tt)*) => {{
        use std::io::Write as _;
        let _ = writeln!($w, $($arg)*);
    }};
}
