use std::cell::RefCell;

pub use time::Date;
use time::{macros::format_description, Month, OffsetDateTime, UtcOffset};

pub type StaticDateFormat<'a> =
    &'static [time::format_description::BorrowedFormatItem<'a>];
pub type DynDateFormat = time::format_description::OwnedFormatItem;

pub const STANDARD_DATE_FORMAT: StaticDateFormat =
    format_description!("[year]-[month]-[day]");

pub fn parse_standard_date(date_str: &str) -> Result<Date, time::error::Parse> {
    Date::parse(date_str, STANDARD_DATE_FORMAT)
}

pub fn parse_dyn_date_format(fmt: &str) -> Result<DynDateFormat, String> {
    // The documentation recommends version 2
    const VERSION: usize = 2;
    time::format_description::parse_owned::<VERSION>(fmt)
        .map_err(|e| format!("{}", e))
}

pub fn parse_date(
    date_str: &str,
    fmt: &Option<DynDateFormat>,
) -> Result<Date, time::error::Parse> {
    match fmt {
        Some(fmt) => Date::parse(date_str, fmt),
        None => parse_standard_date(date_str),
    }
}

pub fn first_day_of_year(year: i32) -> Result<Date, time::error::ComponentRange> {
    Date::from_calendar_date(year, Month::January, 1)
}

pub fn last_day_of_year(year: i32) -> Result<Date, time::error::ComponentRange> {
    Date::from_calendar_date(year, Month::December, 31)
}

thread_local! {
    // Pins "today", so rate loading tests do not depend on the calendar.
    static TODAY_OVERRIDE: RefCell<Option<Date>> = const { RefCell::new(None) };
}

pub fn set_todays_date_for_test(d: Date) {
    TODAY_OVERRIDE.with_borrow_mut(|today| *today = Some(d));
}

pub fn today_local() -> Date {
    if let Some(d) = TODAY_OVERRIDE.with_borrow(|today| *today) {
        return d;
    }
    let now = OffsetDateTime::now_utc();
    match local_utc_offset() {
        Ok(offset) => now.to_offset(offset).date(),
        Err(_) => now.date(),
    }
}

// UtcOffset::current_local_offset refuses to run on Linux without the
// "unsound" feature, so the offset is taken from chrono instead.
pub fn local_utc_offset() -> Result<UtcOffset, time::error::ComponentRange> {
    let now = chrono::offset::Local::now();
    let offset = now.offset();
    UtcOffset::from_whole_seconds(-offset.utc_minus_local())
}

// Used by both unit and integration tests
pub mod pub_testlib {
    use time::{Date, Duration, Month};

    pub fn doy_date(year: u32, day: i64) -> Date {
        Date::from_calendar_date(year as i32, Month::January, 1)
            .unwrap()
            .saturating_add(Duration::days(day))
    }

    pub fn ymd(year: i32, month: u8, day: u8) -> Date {
        Date::from_calendar_date(year, Month::try_from(month).unwrap(), day).unwrap()
    }
}
