use std::{borrow::Cow, fmt::Display};

use rust_decimal::Decimal;

use crate::util::decimal::PosDecimal;

/// A currency code (eg. USD), always upper case. CAD is the base currency
/// which every amount is converted to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Currency(Cow<'static, str>);

impl Currency {
    /// An empty code means the base currency.
    pub fn new(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() {
            return Currency::cad();
        }
        Currency(Cow::Owned(code.to_uppercase()))
    }

    pub const fn cad() -> Self {
        Currency(Cow::Borrowed("CAD"))
    }

    pub const fn usd() -> Self {
        Currency(Cow::Borrowed("USD"))
    }

    pub const fn default() -> Self {
        Currency::cad()
    }

    pub fn is_default(&self) -> bool {
        *self == Currency::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The currency a tx was made in, and the rate which converted it to CAD.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CurrencyAndExchangeRate {
    pub currency: Currency,
    pub exchange_rate: PosDecimal,
}

impl CurrencyAndExchangeRate {
    /// CAD may only ever convert at 1.
    pub fn try_new(currency: Currency, exchange_rate: PosDecimal) -> Result<Self, String> {
        if currency.is_default() && *exchange_rate != Decimal::ONE {
            return Err(format!(
                "{} cannot have an exchange rate other than 1 (got {})",
                currency, exchange_rate));
        }
        Ok(CurrencyAndExchangeRate { currency, exchange_rate })
    }

    pub fn cad() -> Self {
        CurrencyAndExchangeRate { currency: Currency::cad(), exchange_rate: PosDecimal::one() }
    }

    /// None if the converted amount does not fit in a Decimal.
    pub fn checked_to_base(&self, amount: Decimal) -> Option<Decimal> {
        amount.checked_mul(*self.exchange_rate)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::pdec;

    use super::{Currency, CurrencyAndExchangeRate};

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::new(" cad "), Currency::cad());
        assert_eq!(Currency::new(""), Currency::default());
        assert_eq!(Currency::new("Usd"), Currency::usd());
        assert_eq!(Currency::new("eur").to_string(), "EUR");
        assert!(!Currency::new("eur").is_default());

        let set: HashSet<Currency> =
            ["USD", "usd", "CAD", "jpy"].iter().map(|c| Currency::new(c)).collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_exchange_rate() {
        let usd = CurrencyAndExchangeRate::try_new(Currency::usd(), pdec!(1.25)).unwrap();
        assert_eq!(usd.checked_to_base(dec!(10)), Some(dec!(12.5)));
        assert_eq!(usd.checked_to_base(Decimal::MAX), None);

        let cad = CurrencyAndExchangeRate::try_new(Currency::new("cad"), pdec!(1.0)).unwrap();
        assert_eq!(cad, CurrencyAndExchangeRate::cad());
        let _ = CurrencyAndExchangeRate::try_new(Currency::cad(), pdec!(1.3)).unwrap_err();
    }
}
