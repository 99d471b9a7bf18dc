use rust_decimal::Decimal;
use time::Date;

use crate::portfolio::{Currency, OptionType, Security, TxAction, TxDelta};

/// One option trade, as listed in the options side report.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct OptionsReportRow {
    pub date: Date,
    pub security: Security,
    pub action: TxAction,
    pub option_type: OptionType,
    pub shares: Decimal,
    // In the tx currency
    pub price: Decimal,
    pub commission: Decimal,
    pub currency: Currency,
    // CAD. Only known for buys.
    pub acquisition_cost: Option<Decimal>,
}

impl OptionsReportRow {
    /// eg. "BUY CALL"
    pub fn action_str(&self) -> String {
        format!("{} {}", self.action, self.option_type)
    }
}

/// Lists the option trades of the year before `as_of_year`.
pub fn options_report(deltas: &[TxDelta], as_of_year: i32) -> Vec<OptionsReportRow> {
    let report_year = as_of_year - 1;
    deltas.iter()
        .filter(|d| d.tx.year() == report_year)
        .filter_map(|d| {
            let option_type = d.tx.kind.option_type()?;
            Some(OptionsReportRow {
                date: d.tx.date,
                security: d.tx.security.clone(),
                action: d.tx.action,
                option_type,
                shares: *d.tx.shares,
                price: *d.tx.amount_per_share,
                commission: *d.tx.commission,
                currency: d.tx.currency.clone(),
                acquisition_cost: match d.tx.action {
                    TxAction::Buy => Some(d.proceeds + d.commission),
                    TxAction::Sell => None,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::fx::StaticRateResolver;
    use crate::gezdec as gez;
    use crate::pdec;
    use crate::portfolio::bookkeeping::{txs_to_delta_list, OptionsPolicy};
    use crate::portfolio::testlib::{x_all, TTx};
    use crate::portfolio::{Currency, OptionType, TxAction as A};
    use crate::util::date::pub_testlib::ymd;

    use super::options_report;

    #[test]
    #[rustfmt::skip]
    fn test_options_report() {
        let txs = x_all(vec![
            // Previous year, not reported
            TTx{date: Some(ymd(2021, 12, 31)), act: A::Buy, shares: gez!(1), price: gez!(2),
                opt: Some(OptionType::Call), ..TTx::d()},
            TTx{date: Some(ymd(2022, 1, 3)), act: A::Sell, shares: gez!(2), price: gez!(3.5),
                comm: gez!(1.25), opt: Some(OptionType::Put), curr: Currency::usd(), ..TTx::d()},
            // Stock, not reported
            TTx{date: Some(ymd(2022, 2, 1)), act: A::Buy, shares: gez!(5), price: gez!(10),
                ..TTx::d()},
            TTx{date: Some(ymd(2022, 3, 1)), act: A::Buy, shares: gez!(2), price: gez!(1.5),
                comm: gez!(1.25), opt: Some(OptionType::Put), curr: Currency::usd(), ..TTx::d()},
            // As-of year, not reported
            TTx{date: Some(ymd(2023, 1, 1)), act: A::Buy, shares: gez!(1), price: gez!(2),
                opt: Some(OptionType::Call), ..TTx::d()},
        ]);
        let mut rates = StaticRateResolver::new().with_flat_rate(Currency::usd(), pdec!(1.3));
        let deltas = txs_to_delta_list(&txs, &mut rates, OptionsPolicy::Exclude).unwrap();

        let rows = options_report(&deltas, 2023);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].date, ymd(2022, 1, 3));
        assert_eq!(rows[0].action_str(), "SELL PUT");
        assert_eq!(rows[0].shares, dec!(2));
        assert_eq!(rows[0].price, dec!(3.5));
        assert_eq!(rows[0].commission, dec!(1.25));
        assert_eq!(rows[0].acquisition_cost, None);

        assert_eq!(rows[1].action_str(), "BUY PUT");
        // (2 * 1.5 + 1.25) * 1.3
        assert_eq!(rows[1].acquisition_cost, Some(dec!(5.525)));

        assert_eq!(options_report(&deltas, 2022).len(), 1);
        assert_eq!(options_report(&deltas, 2020).len(), 0);
    }
}
