use std::{fmt::Display, marker::PhantomData, ops::Deref};

use rust_decimal::{Decimal, RoundingStrategy};

use self::constraint::{GreaterEqualZero, Pos};

// Decimal's own sign checks treat -0 as negative.
pub fn is_positive(d: &Decimal) -> bool {
    d.is_sign_positive() && !d.is_zero()
}

pub fn is_negative(d: &Decimal) -> bool {
    d.is_sign_negative() && !d.is_zero()
}

fn group_thousands(int_digits: &str) -> String {
    let mut out = String::with_capacity(int_digits.len() + int_digits.len() / 3);
    for (i, c) in int_digits.chars().enumerate() {
        if i > 0 && (int_digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Renders a monetary value with thousands separators, eg. "-12,345.68".
/// Rounds half-to-even to cents unless `full_precision` is set, in which
/// case all significant digits are kept (with at least two).
pub fn money_str(d: &Decimal, full_precision: bool) -> String {
    let mut v = if full_precision {
        d.normalize()
    } else {
        d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
    };
    if v.scale() < 2 {
        v.rescale(2);
    }
    let neg = is_negative(&v);
    let plain = v.abs().to_string();
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (plain, "00".to_string()),
    };
    format!("{}{}.{}", if neg { "-" } else { "" }, group_thousands(&int_part), frac_part)
}

/// Renders a share quantity without trailing zeros, eg. "0.5" or "100".
pub fn qty_str(d: &Decimal) -> String {
    d.normalize().to_string()
}

pub trait DecConstraint {
    fn is_ok(d: &Decimal) -> bool;
}

pub mod constraint {
    use rust_decimal::Decimal;

    use super::{is_positive, DecConstraint};

    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    pub struct GreaterEqualZero(());
    impl DecConstraint for GreaterEqualZero {
        fn is_ok(d: &Decimal) -> bool {
            d.is_sign_positive() || d.is_zero()
        }
    }

    #[derive(PartialEq, Eq, Clone, Copy, Debug)]
    pub struct Pos(());
    impl DecConstraint for Pos {
        fn is_ok(d: &Decimal) -> bool {
            is_positive(d)
        }
    }
}

/// A Decimal which is known to satisfy CONSTRAINT. Only constructible through
/// try_from, so a share count or exchange rate can never be negative once
/// it is in a Tx.
pub struct ConstrainedDecimal<CONSTRAINT>(Decimal, PhantomData<CONSTRAINT>);

impl<CONSTRAINT: DecConstraint> TryFrom<Decimal> for ConstrainedDecimal<CONSTRAINT> {
    type Error = String;

    fn try_from(d: Decimal) -> Result<Self, Self::Error> {
        if CONSTRAINT::is_ok(&d) {
            Ok(Self(d, PhantomData))
        } else {
            Err(format!(
                "{} does not match constraints of {}",
                d,
                std::any::type_name::<CONSTRAINT>()
            ))
        }
    }
}

impl<CONSTRAINT: DecConstraint> Deref for ConstrainedDecimal<CONSTRAINT> {
    type Target = Decimal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<CONSTRAINT: DecConstraint> Display for ConstrainedDecimal<CONSTRAINT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<CONSTRAINT: DecConstraint> std::fmt::Debug for ConstrainedDecimal<CONSTRAINT> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl<CONSTRAINT: DecConstraint> PartialEq for ConstrainedDecimal<CONSTRAINT> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<CONSTRAINT: DecConstraint> Eq for ConstrainedDecimal<CONSTRAINT> {}

impl<CONSTRAINT: DecConstraint> Clone for ConstrainedDecimal<CONSTRAINT> {
    fn clone(&self) -> Self {
        Self(self.0, PhantomData)
    }
}

impl<CONSTRAINT: DecConstraint> Copy for ConstrainedDecimal<CONSTRAINT> {}

impl ConstrainedDecimal<GreaterEqualZero> {
    pub fn zero() -> Self {
        Self(Decimal::ZERO, PhantomData)
    }
}

impl ConstrainedDecimal<Pos> {
    pub fn one() -> Self {
        Self(Decimal::ONE, PhantomData)
    }
}

// Convenience aliases
pub type GreaterEqualZeroDecimal = ConstrainedDecimal<constraint::GreaterEqualZero>;
pub type PosDecimal = ConstrainedDecimal<constraint::Pos>;

#[macro_export]
macro_rules! pdec {
    ($arg:literal) => {{
        use rust_decimal_macros::dec;
        $crate::util::decimal::PosDecimal::try_from(dec!($arg)).unwrap()
    }};
}

#[macro_export]
macro_rules! gezdec {
    ($arg:literal) => {{
        use rust_decimal_macros::dec;
        $crate::util::decimal::GreaterEqualZeroDecimal::try_from(dec!($arg)).unwrap()
    }};
}
