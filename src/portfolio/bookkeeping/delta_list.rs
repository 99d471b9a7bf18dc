use std::fmt::Display;

use rust_decimal::Decimal;
use time::Date;
use tracing::{debug, trace};

use crate::{
    fx::RateResolver,
    portfolio::{
        CurrencyAndExchangeRate, InstrumentKind, PortfolioSecurityStatus, Security,
        Tx, TxAction, TxDelta,
    },
    util::decimal::is_negative,
};

use super::superficial_loss::is_superficial_loss;

/// How option trades interact with the ledger.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum OptionsPolicy {
    /// Options never touch the share balance or ACB, and are listed in a
    /// separate report.
    #[default]
    Exclude,
    /// Options share the balance/ACB stream of their ticker. Selling below
    /// zero opens a short position, which a later buy closes.
    FoldIntoAcb,
}

impl TryFrom<&str> for OptionsPolicy {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "exclude" => Ok(OptionsPolicy::Exclude),
            "fold-into-acb" => Ok(OptionsPolicy::FoldIntoAcb),
            _ => Err(format!(
                "Invalid options policy '{}'. Must be exclude or fold-into-acb", value)),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum LedgerErrorKind {
    OutOfOrder { previous_date: Date },
    MixedSecurities { expected: Security },
    RateResolution(String),
    NegativeBalance { share_balance: Decimal },
    OptionPosition(String),
    AmountOverflow,
}

impl Display for LedgerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerErrorKind::OutOfOrder { previous_date } => write!(f,
                "transactions are not in chronological order (follows one on {})",
                previous_date),
            LedgerErrorKind::MixedSecurities { expected } => write!(f,
                "expected only transactions of {}", expected),
            LedgerErrorKind::RateResolution(e) => write!(f, "{}", e),
            LedgerErrorKind::NegativeBalance { share_balance } => write!(f,
                "share balance would become negative ({}). Make sure all \
                transactions for this security, from all years, are included",
                share_balance),
            LedgerErrorKind::OptionPosition(e) => write!(f, "{}", e),
            LedgerErrorKind::AmountOverflow => write!(f,
                "amount is too large to compute"),
        }
    }
}

/// A fatal condition for one security. Identifies the offending Tx.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct LedgerError {
    pub security: Security,
    pub date: Date,
    pub read_index: u32,
    pub action: TxAction,
    pub kind: LedgerErrorKind,
}

impl LedgerError {
    pub fn new(tx: &Tx, kind: LedgerErrorKind) -> LedgerError {
        LedgerError {
            security: tx.security.clone(),
            date: tx.date,
            read_index: tx.read_index,
            action: tx.action,
            kind,
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "In {} transaction of {} on {} (entry {}): {}",
               self.action, self.security, self.date, self.read_index, self.kind)
    }
}

impl std::error::Error for LedgerError {}

fn check_preconditions(txs: &[Tx]) -> Result<(), LedgerError> {
    let Some(first) = txs.first() else {
        return Ok(());
    };
    for pair in txs.windows(2) {
        let (prev, tx) = (&pair[0], &pair[1]);
        if tx.date < prev.date {
            return Err(LedgerError::new(
                tx, LedgerErrorKind::OutOfOrder { previous_date: prev.date }));
        }
    }
    if let Some(tx) = txs.iter().find(|t| t.security != first.security) {
        return Err(LedgerError::new(
            tx, LedgerErrorKind::MixedSecurities { expected: first.security.clone() }));
    }
    Ok(())
}

// The ledger effect of a single Tx, before any superficial loss adjustment.
struct Effect {
    acb: Decimal,
    capital_gain: Decimal,
}

fn checked(v: Option<Decimal>) -> Result<Decimal, LedgerErrorKind> {
    v.ok_or(LedgerErrorKind::AmountOverflow)
}

fn apply_stock_effect(
    tx: &Tx,
    proceeds: Decimal,
    commission: Decimal,
    status: &mut PortfolioSecurityStatus,
) -> Result<Effect, LedgerErrorKind> {
    let shares = *tx.shares;
    match tx.action {
        TxAction::Buy => {
            let acb = checked(proceeds.checked_add(commission))?;
            status.share_balance = checked(status.share_balance.checked_add(shares))?;
            status.total_acb = checked(status.total_acb.checked_add(acb))?;
            Ok(Effect { acb, capital_gain: Decimal::ZERO })
        },
        TxAction::Sell => {
            // Disposing of the whole position releases exactly the whole ACB,
            // rather than per-share ACB * shares (which may not divide evenly).
            // Selling nothing releases nothing, even from an empty position
            // still carrying ACB.
            let acb = if !shares.is_zero() && shares == status.share_balance {
                status.total_acb
            } else {
                checked(status.per_share_acb().checked_mul(shares))?
            };
            status.share_balance -= shares;
            status.total_acb -= acb;
            Ok(Effect { acb, capital_gain: proceeds - commission - acb })
        },
    }
}

// Options folded into the ledger. The balance may go negative here
// (a short position).
fn apply_folded_option_effect(
    tx: &Tx,
    proceeds: Decimal,
    commission: Decimal,
    status: &mut PortfolioSecurityStatus,
) -> Result<Effect, LedgerErrorKind> {
    let shares = *tx.shares;
    let balance = status.share_balance;
    match tx.action {
        TxAction::Sell if balance - shares < Decimal::ZERO => {
            if balance > Decimal::ZERO {
                return Err(LedgerErrorKind::OptionPosition(format!(
                    "selling {} would turn a long position of {} into a short one",
                    shares, balance)));
            }
            // Sell to open
            let premium = proceeds - commission;
            status.share_balance -= shares;
            status.total_acb = checked(status.total_acb.checked_add(premium))?;
            Ok(Effect { acb: premium, capital_gain: Decimal::ZERO })
        },
        TxAction::Buy if balance < Decimal::ZERO => {
            let short_shares = balance.abs();
            if shares > short_shares {
                return Err(LedgerErrorKind::OptionPosition(format!(
                    "buying {} would close more than the short position of {}",
                    shares, short_shares)));
            }
            // Buy to close
            let released = if shares == short_shares {
                status.total_acb
            } else {
                checked((status.total_acb / short_shares).checked_mul(shares))?
            };
            status.share_balance += shares;
            status.total_acb -= released;
            let cost = checked(proceeds.checked_add(commission))?;
            Ok(Effect { acb: released, capital_gain: released - cost })
        },
        _ => apply_stock_effect(tx, proceeds, commission, status),
    }
}

fn delta_for_tx(
    idx: usize,
    txs: &[Tx],
    pre_status: &PortfolioSecurityStatus,
    rate_resolver: &mut dyn RateResolver,
    options_policy: OptionsPolicy,
) -> Result<TxDelta, LedgerError> {
    let tx = &txs[idx];
    let err = |kind| LedgerError::new(tx, kind);

    let rate = rate_resolver.get_rate(&tx.currency, tx.date)
        .map_err(|e| err(LedgerErrorKind::RateResolution(e)))?;
    let currency_and_rate = CurrencyAndExchangeRate::try_new(tx.currency.clone(), rate)
        .map_err(|e| err(LedgerErrorKind::RateResolution(e)))?;

    let proceeds = tx.shares.checked_mul(*tx.amount_per_share)
        .and_then(|amount| currency_and_rate.checked_to_base(amount))
        .ok_or_else(|| err(LedgerErrorKind::AmountOverflow))?;
    let commission = currency_and_rate.checked_to_base(*tx.commission)
        .ok_or_else(|| err(LedgerErrorKind::AmountOverflow))?;

    let mut post_status = pre_status.clone();

    let effect = match (tx.kind, options_policy) {
        (InstrumentKind::Stock, _) => {
            let effect = apply_stock_effect(tx, proceeds, commission, &mut post_status)
                .map_err(err)?;
            if is_negative(&post_status.share_balance) {
                return Err(err(LedgerErrorKind::NegativeBalance {
                    share_balance: post_status.share_balance }));
            }
            effect
        },
        (InstrumentKind::Option(_), OptionsPolicy::Exclude) =>
            Effect { acb: Decimal::ZERO, capital_gain: Decimal::ZERO },
        (InstrumentKind::Option(_), OptionsPolicy::FoldIntoAcb) =>
            apply_folded_option_effect(tx, proceeds, commission, &mut post_status)
                .map_err(err)?,
    };

    let mut capital_gain = effect.capital_gain;
    let mut superficial_loss = false;
    if tx.is_stock_sell() && is_negative(&capital_gain)
        && is_superficial_loss(idx, txs, post_status.share_balance)
    {
        debug!(security = %tx.security, date = %tx.date, loss = %capital_gain,
               "delta_for_tx: superficial loss");
        // The denied loss is added back to the ACB of the remaining shares.
        post_status.total_acb = post_status.total_acb.checked_sub(capital_gain)
            .ok_or_else(|| err(LedgerErrorKind::AmountOverflow))?;
        capital_gain = Decimal::ZERO;
        superficial_loss = true;
    }

    Ok(TxDelta {
        tx: tx.clone(),
        currency_and_rate,
        proceeds,
        commission,
        acb: effect.acb,
        capital_gain,
        pre_status: pre_status.clone(),
        post_status,
        superficial_loss,
    })
}

/// Runs one security's txs through the ledger, producing one TxDelta per Tx.
///
/// txs must all be of the same security, in chronological order, and should
/// include the full history of the security (not just the year of interest).
pub fn txs_to_delta_list(
    txs: &[Tx],
    rate_resolver: &mut dyn RateResolver,
    options_policy: OptionsPolicy,
) -> Result<Vec<TxDelta>, LedgerError> {
    check_preconditions(txs)?;

    let Some(first) = txs.first() else {
        return Ok(Vec::new());
    };

    let mut deltas = Vec::<TxDelta>::with_capacity(txs.len());
    let mut status = PortfolioSecurityStatus::new(first.security.clone());

    for idx in 0..txs.len() {
        let delta = delta_for_tx(idx, txs, &status, rate_resolver, options_policy)?;
        trace!("txs_to_delta_list: adding post_status for delta: {:#?}", delta.post_status);
        status = delta.post_status.clone();
        deltas.push(delta);
    }

    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::fx::StaticRateResolver;
    use crate::gezdec as gez;
    use crate::pdec;
    use crate::portfolio::testlib::{mk_date, x_all, TPSS, TTx};
    use crate::portfolio::{Currency, OptionType, Tx, TxAction as A, TxDelta};
    use crate::util::date::pub_testlib::ymd;
    use crate::util::decimal::GreaterEqualZeroDecimal;

    use super::{txs_to_delta_list, LedgerError, LedgerErrorKind, OptionsPolicy};

    fn cad_rates() -> StaticRateResolver {
        StaticRateResolver::new()
    }

    fn usd_rates(rate: rust_decimal::Decimal) -> StaticRateResolver {
        StaticRateResolver::new().with_flat_rate(
            Currency::usd(), crate::util::decimal::PosDecimal::try_from(rate).unwrap())
    }

    fn usd() -> Currency {
        Currency::usd()
    }

    fn deltas_ok(txs: &Vec<Tx>, resolver: &mut StaticRateResolver) -> Vec<TxDelta> {
        txs_to_delta_list(txs, resolver, OptionsPolicy::default()).unwrap()
    }

    fn deltas_ok_fold(txs: &Vec<Tx>) -> Vec<TxDelta> {
        txs_to_delta_list(txs, &mut cad_rates(), OptionsPolicy::FoldIntoAcb).unwrap()
    }

    fn deltas_err(txs: &Vec<Tx>, policy: OptionsPolicy) -> LedgerError {
        txs_to_delta_list(txs, &mut cad_rates(), policy).unwrap_err()
    }

    // Test Delta
    #[derive(Debug)]
    struct TDt {
        pub post_st: TPSS,
        pub gain: Decimal,
        pub acb: Option<Decimal>,
        pub sfl: bool,
    }

    impl Default for TDt {
        fn default() -> Self {
            TDt { post_st: TPSS::d(), gain: Decimal::ZERO, acb: None, sfl: false }
        }
    }

    fn def<T: Default>() -> T {
        T::default()
    }

    fn validate_deltas(deltas: &Vec<TxDelta>, exp: Vec<TDt>) {
        assert_eq!(deltas.len(), exp.len(), "{:#?}", deltas);
        for (i, (delta, tdt)) in deltas.iter().zip(exp.iter()).enumerate() {
            let post_st = tdt.post_st.x();
            if delta.post_status != post_st
                || delta.capital_gain != tdt.gain
                || delta.superficial_loss != tdt.sfl
                || tdt.acb.map(|acb| acb != delta.acb).unwrap_or(false)
            {
                panic!(
                    "At index {}:\n\
                    actual:\n  post_st: {:#?}\n  capital_gain: {}\n  acb: {}\n  sfl: {}\n\
                    expected:\n  post_st: {:#?}\n  capital_gain: {}\n  acb: {:?}\n  sfl: {}",
                    i,
                    delta.post_status, delta.capital_gain, delta.acb, delta.superficial_loss,
                    post_st, tdt.gain, tdt.acb, tdt.sfl,
                );
            }
        }
    }

    #[test]
    #[rustfmt::skip]
    fn test_basic_buy_acb() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(3), price: gez!(10.0), ..def()},
            // With commission
            TTx{t_day: 1, act: A::Buy, shares: gez!(2), price: gez!(10.0),
                comm: gez!(1.0), ..def()},
            // With exchange rate
            TTx{t_day: 2, act: A::Buy, shares: gez!(3), price: gez!(12.0),
                comm: gez!(1.0), curr: usd(), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut usd_rates(dec!(2.0)));
        validate_deltas(&deltas, vec![
            TDt{post_st: TPSS{shares: dec!(3), total_acb: dec!(30.0), ..def()},
                acb: Some(dec!(30)), ..def()},
            TDt{post_st: TPSS{shares: dec!(5), total_acb: dec!(51.0), ..def()},
                acb: Some(dec!(21)), ..def()},
            // 51 + (12 * 3 * 2 = 72) + (1 * 2)
            TDt{post_st: TPSS{shares: dec!(8), total_acb: dec!(125.0), ..def()},
                acb: Some(dec!(74)), ..def()},
        ]);
        assert_eq!(deltas[2].currency_and_rate.exchange_rate, pdec!(2.0));
        assert_eq!(deltas[2].proceeds, dec!(72));
        assert_eq!(deltas[2].commission, dec!(2));
        assert_eq!(deltas[2].pre_status, TPSS{shares: dec!(5), total_acb: dec!(51), ..def()}.x());
    }

    #[test]
    #[rustfmt::skip]
    fn test_all_buys_never_gain() {
        let txs = x_all((0..10).map(|i| TTx{
            t_day: i * 3, act: A::Buy, shares: gez!(1.5), price: gez!(7.25),
            comm: gez!(0.5), ..def()}).collect());
        let deltas = deltas_ok(&txs, &mut cad_rates());
        let mut last_balance = Decimal::ZERO;
        for d in &deltas {
            assert_eq!(d.capital_gain, Decimal::ZERO);
            assert!(d.share_balance_after() > last_balance);
            last_balance = d.share_balance_after();
        }
    }

    #[test]
    #[rustfmt::skip]
    fn test_basic_sell_acb() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(3), price: gez!(10.0), ..def()},
            // Sell with commission
            TTx{t_day: 1, act: A::Sell, shares: gez!(2), price: gez!(15.0),
                comm: gez!(1.0), ..def()},
            // Sell all remaining shares
            TTx{t_day: 2, act: A::Sell, shares: gez!(1), price: gez!(15.0), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        validate_deltas(&deltas, vec![
            TDt{post_st: TPSS{shares: dec!(3), total_acb: dec!(30.0), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(1), total_acb: dec!(10.0), ..def()},
                gain: dec!(9.0), acb: Some(dec!(20)), ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(0), ..def()},
                gain: dec!(5.0), acb: Some(dec!(10)), ..def()},
        ]);

        // Sell with exchange rate
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(3), price: gez!(10.0), ..def()},
            TTx{t_day: 1, act: A::Sell, shares: gez!(2), price: gez!(15.0),
                comm: gez!(2.0), curr: usd(), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut usd_rates(dec!(2.0)));
        // (15 * 2 * 2) - 20 - (2 * 2) = 36
        assert_eq!(deltas[1].capital_gain, dec!(36));
        assert_eq!(deltas[1].post_status.total_acb, dec!(10));
    }

    #[test]
    #[rustfmt::skip]
    fn test_sell_whole_position_releases_all_acb() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(3), price: gez!(10.0),
                comm: gez!(0.01), ..def()},
            TTx{t_day: 1, act: A::Sell, shares: gez!(1), price: gez!(10.0), ..def()},
            TTx{t_day: 2, act: A::Sell, shares: gez!(2), price: gez!(10.0), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        assert_eq!(deltas[2].post_status.total_acb, Decimal::ZERO);
        assert_eq!(deltas[1].acb + deltas[2].acb, dec!(30.01));
        assert_eq!(deltas[1].capital_gain + deltas[2].capital_gain, dec!(-0.01));
    }

    #[test]
    #[rustfmt::skip]
    fn test_average_cost_invariant() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(7), price: gez!(13.33), comm: gez!(4.95), ..def()},
            TTx{t_day: 40, act: A::Buy, shares: gez!(5), price: gez!(11.1), comm: gez!(4.95), ..def()},
            TTx{t_day: 80, act: A::Sell, shares: gez!(4), price: gez!(20), comm: gez!(4.95), ..def()},
            TTx{t_day: 120, act: A::Sell, shares: gez!(3), price: gez!(21), comm: gez!(4.95), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        for d in deltas.iter().filter(|d| d.tx.action == A::Sell) {
            assert_eq!(d.acb, d.pre_status.per_share_acb() * *d.tx.shares);
            assert_eq!(d.capital_gain, d.proceeds - d.commission - d.acb);
            assert_eq!(d.post_status.total_acb, d.pre_status.total_acb - d.acb);
        }
    }

    #[test]
    #[rustfmt::skip]
    fn test_idempotent() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(100), price: gez!(100), comm: gez!(10), ..def()},
            TTx{t_day: 1, act: A::Sell, shares: gez!(99), price: gez!(50), comm: gez!(10), ..def()},
            TTx{t_day: 300, act: A::Sell, shares: gez!(1), price: gez!(1000), comm: gez!(10), ..def()},
        ]);
        let mut resolver = cad_rates();
        let first = deltas_ok(&txs, &mut resolver);
        let second = deltas_ok(&txs, &mut resolver);
        crate::testlib::assert_vec_eq(first, second);
    }

    #[test]
    #[rustfmt::skip]
    fn test_negative_balance() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(2), price: gez!(10.0), ..def()},
            TTx{t_day: 5, act: A::Sell, shares: gez!(3), price: gez!(10.0), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::NegativeBalance{share_balance: dec!(-1)});
        assert_eq!(err.date, mk_date(5));
        assert_eq!(err.read_index, 1);
        assert_eq!(err.to_string(),
            "In SELL transaction of FOO on 2017-01-06 (entry 1): share balance would \
            become negative (-1). Make sure all transactions for this security, from \
            all years, are included");

        // Sell with nothing bought
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Sell, shares: gez!(1), price: gez!(10.0), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::NegativeBalance{share_balance: dec!(-1)});
    }

    #[test]
    #[rustfmt::skip]
    fn test_amount_overflow() {
        let max = GreaterEqualZeroDecimal::try_from(Decimal::MAX).unwrap();

        // shares * price
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: max, price: gez!(2), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::AmountOverflow);
        assert_eq!(err.read_index, 0);
        assert_eq!(err.to_string(),
            "In BUY transaction of FOO on 2017-01-01 (entry 0): amount is too large \
            to compute");

        // Conversion to CAD
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(1), price: max, curr: usd(), ..def()},
        ]);
        let err = txs_to_delta_list(&txs, &mut usd_rates(dec!(2)), OptionsPolicy::Exclude)
            .unwrap_err();
        assert_eq!(err.kind, LedgerErrorKind::AmountOverflow);

        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(1), price: gez!(1),
                comm: max, curr: usd(), ..def()},
        ]);
        let err = txs_to_delta_list(&txs, &mut usd_rates(dec!(2)), OptionsPolicy::Exclude)
            .unwrap_err();
        assert_eq!(err.kind, LedgerErrorKind::AmountOverflow);

        // Share balance
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: max, price: gez!(0), ..def()},
            TTx{t_day: 1, act: A::Buy, shares: gez!(1), price: gez!(0), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::AmountOverflow);
        assert_eq!(err.read_index, 1);

        // Total ACB
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(1), price: max, ..def()},
            TTx{t_day: 1, act: A::Buy, shares: gez!(1), price: gez!(1), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::AmountOverflow);
        assert_eq!(err.read_index, 1);

        // Large but representable amounts are fine
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(1), price: max, ..def()},
            TTx{t_day: 1, act: A::Sell, shares: gez!(1), price: max, ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        assert_eq!(deltas[1].acb, Decimal::MAX);
        assert_eq!(deltas[1].capital_gain, dec!(0));
    }

    #[test]
    #[rustfmt::skip]
    fn test_precondition_errors() {
        // Out of order
        let txs = x_all(vec![
            TTx{t_day: 5, act: A::Buy, shares: gez!(2), price: gez!(10.0), ..def()},
            TTx{t_day: 4, act: A::Buy, shares: gez!(3), price: gez!(10.0), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::OutOfOrder{previous_date: mk_date(5)});

        // Mixed securities
        let txs = x_all(vec![
            TTx{t_day: 4, act: A::Buy, shares: gez!(2), price: gez!(10.0), ..def()},
            TTx{t_day: 5, act: A::Buy, shares: gez!(3), price: gez!(10.0),
                sec: "BAR".to_string(), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::MixedSecurities{expected: "FOO".to_string()});
        assert_eq!(err.security, "BAR");

        // Empty
        assert_eq!(deltas_ok(&vec![], &mut cad_rates()), vec![]);
    }

    #[test]
    #[rustfmt::skip]
    fn test_rate_resolution_error() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(2), price: gez!(10.0), ..def()},
            TTx{t_day: 1, act: A::Buy, shares: gez!(2), price: gez!(10.0),
                curr: Currency::new("EUR"), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::Exclude);
        assert_eq!(err.kind, LedgerErrorKind::RateResolution(
            "No EUR/CAD exchange rate was provided for 2017-01-02".to_string()));
        assert_eq!(err.read_index, 1);
    }

    #[test]
    #[rustfmt::skip]
    fn test_superficial_losses() {
        /*
            buy 10
            wait
            sell 5 (loss, not superficial)
        */
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(10), price: gez!(1.0),
                comm: gez!(2.0), ..def()},
            // Sell half at a loss a while later, for a total of $1
            TTx{t_day: 50, act: A::Sell, shares: gez!(5), price: gez!(0.2), ..def()},
        ]);
        validate_deltas(&deltas_ok(&txs, &mut cad_rates()), vec![
            TDt{post_st: TPSS{shares: dec!(10), total_acb: dec!(12), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(5), total_acb: dec!(6), ..def()},
                gain: dec!(-5), ..def()},
        ]);

        /*
            buy 10
            sell 5 (superficial loss, shares still held 30 days later)
        */
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(10), price: gez!(1.0),
                comm: gez!(2.0), ..def()},
            TTx{t_day: 2, act: A::Sell, shares: gez!(5), price: gez!(0.2), ..def()},
        ]);
        validate_deltas(&deltas_ok(&txs, &mut cad_rates()), vec![
            TDt{post_st: TPSS{shares: dec!(10), total_acb: dec!(12), ..def()}, ..def()},
            // 6 + 5 (denied loss)
            TDt{post_st: TPSS{shares: dec!(5), total_acb: dec!(11), ..def()},
                acb: Some(dec!(6)), sfl: true, ..def()},
        ]);

        /*
            buy 10
            wait
            sell 10 (loss)
            buy 5 within 30 days (superficial, ACB carries to new shares)
            wait
            sell 5 (gain)
        */
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(10), price: gez!(1.0), ..def()},
            TTx{t_day: 50, act: A::Sell, shares: gez!(10), price: gez!(0.5), ..def()},
            TTx{t_day: 60, act: A::Buy, shares: gez!(5), price: gez!(0.5), ..def()},
            TTx{t_day: 200, act: A::Sell, shares: gez!(5), price: gez!(2.0), ..def()},
        ]);
        validate_deltas(&deltas_ok(&txs, &mut cad_rates()), vec![
            TDt{post_st: TPSS{shares: dec!(10), total_acb: dec!(10), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(5), ..def()}, sfl: true, ..def()},
            TDt{post_st: TPSS{shares: dec!(5), total_acb: dec!(7.5), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(0), ..def()},
                gain: dec!(2.5), ..def()},
        ]);

        /*
            buy 10
            wait
            sell 10 (superficial loss)
            sell 0 (releases none of the carried ACB)
            buy 5 within 30 days
        */
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(10), price: gez!(1.0), ..def()},
            TTx{t_day: 50, act: A::Sell, shares: gez!(10), price: gez!(0.5), ..def()},
            TTx{t_day: 51, act: A::Sell, shares: gez!(0), price: gez!(0.5), ..def()},
            TTx{t_day: 60, act: A::Buy, shares: gez!(5), price: gez!(0.5), ..def()},
        ]);
        validate_deltas(&deltas_ok(&txs, &mut cad_rates()), vec![
            TDt{post_st: TPSS{shares: dec!(10), total_acb: dec!(10), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(5), ..def()}, sfl: true, ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(5), ..def()},
                acb: Some(dec!(0)), ..def()},
            TDt{post_st: TPSS{shares: dec!(5), total_acb: dec!(7.5), ..def()}, ..def()},
        ]);

        /*
            buy 10
            sell 10 (loss), buy 5 within 30 days, sell 5 within 30 days
            (not superficial, nothing held at end of period)
        */
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(10), price: gez!(1.0), ..def()},
            TTx{t_day: 50, act: A::Sell, shares: gez!(10), price: gez!(0.5), ..def()},
            TTx{t_day: 60, act: A::Buy, shares: gez!(5), price: gez!(0.5), ..def()},
            TTx{t_day: 70, act: A::Sell, shares: gez!(5), price: gez!(0.4), ..def()},
        ]);
        validate_deltas(&deltas_ok(&txs, &mut cad_rates()), vec![
            TDt{post_st: TPSS{shares: dec!(10), total_acb: dec!(10), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(0), ..def()},
                gain: dec!(-5), ..def()},
            TDt{post_st: TPSS{shares: dec!(5), total_acb: dec!(2.5), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(0), ..def()},
                gain: dec!(-0.5), ..def()},
        ]);

        // Gains are never superficial
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(10), price: gez!(1.0), ..def()},
            TTx{t_day: 2, act: A::Sell, shares: gez!(5), price: gez!(2.0), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        assert_eq!(deltas[1].capital_gain, dec!(5));
        assert!(!deltas[1].superficial_loss);
    }

    #[test]
    #[rustfmt::skip]
    fn test_options_excluded() {
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Sell, shares: gez!(2), price: gez!(3.5), comm: gez!(1.0),
                opt: Some(OptionType::Call), ..def()},
            TTx{t_day: 10, act: A::Buy, shares: gez!(2), price: gez!(1.0), comm: gez!(1.0),
                opt: Some(OptionType::Call), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        validate_deltas(&deltas, vec![
            TDt{post_st: TPSS::d(), acb: Some(dec!(0)), ..def()},
            TDt{post_st: TPSS::d(), acb: Some(dec!(0)), ..def()},
        ]);
        assert_eq!(deltas[0].proceeds, dec!(7));
        assert_eq!(deltas[0].commission, dec!(1));
    }

    #[test]
    #[rustfmt::skip]
    fn test_options_folded() {
        // Sell to open, then buy to close in two parts
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Sell, shares: gez!(4), price: gez!(3.0), comm: gez!(2.0),
                opt: Some(OptionType::Put), ..def()},
            TTx{t_day: 10, act: A::Buy, shares: gez!(1), price: gez!(1.0), comm: gez!(1.0),
                opt: Some(OptionType::Put), ..def()},
            TTx{t_day: 20, act: A::Buy, shares: gez!(3), price: gez!(4.0), comm: gez!(1.0),
                opt: Some(OptionType::Put), ..def()},
        ]);
        validate_deltas(&deltas_ok_fold(&txs), vec![
            // 12 - 2 premium
            TDt{post_st: TPSS{shares: dec!(-4), total_acb: dec!(10), ..def()},
                acb: Some(dec!(10)), ..def()},
            // released 10 / 4 * 1 = 2.5, gain 2.5 - 2
            TDt{post_st: TPSS{shares: dec!(-3), total_acb: dec!(7.5), ..def()},
                acb: Some(dec!(2.5)), gain: dec!(0.5), ..def()},
            // released 7.5, gain 7.5 - 13
            TDt{post_st: TPSS{shares: dec!(0), total_acb: dec!(0), ..def()},
                acb: Some(dec!(7.5)), gain: dec!(-5.5), ..def()},
        ]);

        // Long options follow the stock rules, but are never superficial
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(2), price: gez!(3.0),
                opt: Some(OptionType::Call), ..def()},
            TTx{t_day: 2, act: A::Sell, shares: gez!(1), price: gez!(1.0),
                opt: Some(OptionType::Call), ..def()},
        ]);
        validate_deltas(&deltas_ok_fold(&txs), vec![
            TDt{post_st: TPSS{shares: dec!(2), total_acb: dec!(6), ..def()}, ..def()},
            TDt{post_st: TPSS{shares: dec!(1), total_acb: dec!(3), ..def()},
                gain: dec!(-2), ..def()},
        ]);
    }

    #[test]
    #[rustfmt::skip]
    fn test_options_folded_errors() {
        // Crossing from long to short
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Buy, shares: gez!(1), price: gez!(3.0),
                opt: Some(OptionType::Call), ..def()},
            TTx{t_day: 2, act: A::Sell, shares: gez!(2), price: gez!(1.0),
                opt: Some(OptionType::Call), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::FoldIntoAcb);
        assert_eq!(err.kind, LedgerErrorKind::OptionPosition(
            "selling 2 would turn a long position of 1 into a short one".to_string()));

        // Closing more than is short
        let txs = x_all(vec![
            TTx{t_day: 1, act: A::Sell, shares: gez!(1), price: gez!(3.0),
                opt: Some(OptionType::Call), ..def()},
            TTx{t_day: 2, act: A::Buy, shares: gez!(2), price: gez!(1.0),
                opt: Some(OptionType::Call), ..def()},
        ]);
        let err = deltas_err(&txs, OptionsPolicy::FoldIntoAcb);
        assert_eq!(err.kind, LedgerErrorKind::OptionPosition(
            "buying 2 would close more than the short position of 1".to_string()));
    }

    #[test]
    #[rustfmt::skip]
    fn test_scenario_basic_gain() {
        let txs = x_all(vec![
            TTx{date: Some(ymd(2018, 1, 2)), act: A::Buy, shares: gez!(100), price: gez!(100),
                comm: gez!(10), ..def()},
            TTx{date: Some(ymd(2018, 3, 2)), act: A::Sell, shares: gez!(50), price: gez!(240),
                comm: gez!(20), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        assert_eq!(deltas[1].proceeds, dec!(12000));
        // Half of the 10,010 total cost
        assert_eq!(deltas[1].acb, dec!(5005));
        assert_eq!(deltas[1].commission, dec!(20));
        assert_eq!(deltas[1].capital_gain, dec!(6975));

        // The same trade in USD at 2.0
        let txs = x_all(vec![
            TTx{date: Some(ymd(2018, 1, 2)), act: A::Buy, shares: gez!(100), price: gez!(50),
                comm: gez!(10), curr: usd(), ..def()},
            TTx{date: Some(ymd(2018, 2, 20)), act: A::Sell, shares: gez!(50), price: gez!(120),
                comm: gez!(10), curr: usd(), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut usd_rates(dec!(2.0)));
        assert_eq!(deltas[1].proceeds, dec!(12000));
        // Half of the 10,020 total cost
        assert_eq!(deltas[1].acb, dec!(5010));
        assert_eq!(deltas[1].commission, dec!(20));
        assert_eq!(deltas[1].capital_gain, dec!(6970));
    }

    #[test]
    #[rustfmt::skip]
    fn test_scenario_superficial_then_gain_usd() {
        let txs = x_all(vec![
            TTx{date: Some(ymd(2018, 1, 1)), act: A::Buy, shares: gez!(100), price: gez!(100),
                comm: gez!(10), curr: usd(), ..def()},
            TTx{date: Some(ymd(2018, 1, 2)), act: A::Sell, shares: gez!(99), price: gez!(50),
                comm: gez!(10), curr: usd(), ..def()},
            TTx{date: Some(ymd(2018, 12, 1)), act: A::Sell, shares: gez!(1), price: gez!(1000),
                comm: gez!(10), curr: usd(), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut usd_rates(dec!(2.0)));
        assert!(deltas[1].superficial_loss);
        assert_eq!(deltas[1].capital_gain, dec!(0));
        assert_eq!(deltas[1].post_status.total_acb, dec!(10140));

        assert!(!deltas[2].superficial_loss);
        assert_eq!(deltas[2].proceeds, dec!(2000));
        assert_eq!(deltas[2].acb, dec!(10140));
        assert_eq!(deltas[2].commission, dec!(20));
        assert_eq!(deltas[2].capital_gain, dec!(-8160));
    }

    #[test]
    #[rustfmt::skip]
    fn test_scenario_mixed_currency() {
        let txs = x_all(vec![
            TTx{date: Some(ymd(2017, 2, 15)), act: A::Buy, shares: gez!(100), price: gez!(50),
                curr: usd(), ..def()},
            TTx{date: Some(ymd(2018, 2, 20)), act: A::Sell, shares: gez!(100), price: gez!(50),
                ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut usd_rates(dec!(2.0)));
        assert_eq!(deltas[1].acb, dec!(10000));
        assert_eq!(deltas[1].capital_gain, dec!(-5000));
        assert_eq!(deltas[1].currency_and_rate.exchange_rate, pdec!(1));
    }

    #[test]
    #[rustfmt::skip]
    fn test_scenario_fractional() {
        let txs = x_all(vec![
            TTx{t_day: 0, act: A::Buy, shares: gez!(0.5), price: gez!(50), ..def()},
            TTx{t_day: 100, act: A::Sell, shares: gez!(0.5), price: gez!(100), ..def()},
        ]);
        let deltas = deltas_ok(&txs, &mut cad_rates());
        assert_eq!(deltas[1].capital_gain, dec!(25));
        assert_eq!(deltas[1].share_balance_after(), dec!(0));
    }

    #[test]
    fn test_options_policy_parse() {
        assert_eq!(OptionsPolicy::try_from("exclude"), Ok(OptionsPolicy::Exclude));
        assert_eq!(OptionsPolicy::try_from(" Fold-Into-ACB"), Ok(OptionsPolicy::FoldIntoAcb));
        let _ = OptionsPolicy::try_from("fold").unwrap_err();
        assert_eq!(OptionsPolicy::default(), OptionsPolicy::Exclude);
    }
}
