use std::fmt::Display;

use rust_decimal::Decimal;
use time::Date;

/// The published rate for one day. A zero rate marks a day which was
/// looked up but had no rate published (weekends, holidays).
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DailyRate {
    pub date: Date,
    pub foreign_to_local_rate: Decimal,
}

impl DailyRate {
    pub fn new(date: Date, foreign_to_local_rate: Decimal) -> DailyRate {
        DailyRate { date, foreign_to_local_rate }
    }

    pub fn is_unpublished(&self) -> bool {
        self.foreign_to_local_rate.is_zero()
    }
}

// Auto-implements to_string()
impl Display for DailyRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.date, self.foreign_to_local_rate)
    }
}
