mod delta_list;
mod options_report;
pub mod superficial_loss;

pub use self::delta_list::*;
pub use self::options_report::*;
