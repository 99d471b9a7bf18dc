use std::fmt::Display;

use lazy_static::lazy_static;
use regex::Regex;
use time::Date;

use crate::util::decimal::GreaterEqualZeroDecimal;

use super::currency::Currency;

pub type Security = String;

type Error = String;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TxAction {
    Buy,
    Sell,
}

impl TxAction {
    pub fn pretty_str(&self) -> &'static str {
        match self {
            TxAction::Buy => "BUY",
            TxAction::Sell => "SELL",
        }
    }
}

impl TryFrom<&str> for TxAction {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "buy" => Ok(TxAction::Buy),
            "sell" => Ok(TxAction::Sell),
            _ => Err(format!("Invalid action '{}'. Must be BUY or SELL", value.trim())),
        }
    }
}

impl Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_str())
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum OptionType {
    Put,
    Call,
}

impl OptionType {
    /// Option tickers encode the type in their final character.
    pub fn from_ticker(ticker: &str) -> Result<OptionType, Error> {
        match ticker.trim().chars().last().map(|c| c.to_ascii_uppercase()) {
            Some('P') => Ok(OptionType::Put),
            Some('C') => Ok(OptionType::Call),
            _ => Err(format!(
                "Option ticker '{}' does not end in P (put) or C (call)", ticker)),
        }
    }
}

impl Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Put => write!(f, "PUT"),
            OptionType::Call => write!(f, "CALL"),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum InstrumentKind {
    Stock,
    Option(OptionType),
}

lazy_static! {
    static ref OPTION_DESCRIPTION_RE: Regex = Regex::new(r"(?i)\boptions?\b").unwrap();
}

impl InstrumentKind {
    /// Brokers describe the instrument in free text ("Stocks",
    /// "Equity and Index Options", "RSU VEST", ...). Anything mentioning
    /// options is an option, and everything else is treated as stock.
    pub fn from_description(description: &str, ticker: &str) -> Result<InstrumentKind, Error> {
        if OPTION_DESCRIPTION_RE.is_match(description) {
            Ok(InstrumentKind::Option(OptionType::from_ticker(ticker)?))
        } else {
            Ok(InstrumentKind::Stock)
        }
    }

    pub fn is_stock(&self) -> bool {
        *self == InstrumentKind::Stock
    }

    pub fn option_type(&self) -> Option<OptionType> {
        match self {
            InstrumentKind::Stock => None,
            InstrumentKind::Option(t) => Some(*t),
        }
    }
}

/// A single ledger entry, exactly as entered. Everything computed from it
/// lives in a TxDelta.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Tx {
    pub security: Security,
    pub date: Date,
    // Kept for display
    pub description: String,
    pub kind: InstrumentKind,
    pub action: TxAction,
    pub shares: GreaterEqualZeroDecimal,
    pub amount_per_share: GreaterEqualZeroDecimal,
    pub commission: GreaterEqualZeroDecimal,
    pub currency: Currency,

    // The absolute order in which the Tx was read from file or entered.
    // Used as a tiebreak in sorting.
    pub read_index: u32,
}

impl Tx {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn is_stock_sell(&self) -> bool {
        self.kind.is_stock() && self.action == TxAction::Sell
    }
}

impl PartialOrd for Tx {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tx {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.date.cmp(&other.date)
            .then_with(|| self.read_index.cmp(&other.read_index))
    }
}
