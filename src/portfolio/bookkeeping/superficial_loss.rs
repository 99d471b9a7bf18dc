use rust_decimal::Decimal;
use time::{Date, Duration};

use crate::portfolio::{Tx, TxAction};

const SUPERFICIAL_LOSS_PERIOD_DAYS: i64 = 30;

pub fn get_first_day_in_superficial_loss_period(trade_date: Date) -> Date {
    trade_date.saturating_sub(Duration::days(SUPERFICIAL_LOSS_PERIOD_DAYS))
}

pub fn get_last_day_in_superficial_loss_period(trade_date: Date) -> Date {
    trade_date.saturating_add(Duration::days(SUPERFICIAL_LOSS_PERIOD_DAYS))
}

/// Checks if the Sell at idx is a superficial loss: there is a stock Buy
/// within 30 days before or after it (inclusive), AND shares are still held
/// at the end of that period.
///
/// `post_sale_share_balance` is the balance just after the Sell. The balance
/// at the end of the period is projected from it through the stock txs which
/// follow the Sell within the period.
///
/// This does NOT check that the sale is a loss. The caller only asks for
/// stock Sells with a negative gain.
pub fn is_superficial_loss(
    idx: usize,
    txs: &[Tx],
    post_sale_share_balance: Decimal,
) -> bool {
    let tx = &txs[idx];
    debug_assert!(tx.is_stock_sell());

    let first_bad_buy_date = get_first_day_in_superficial_loss_period(tx.date);
    let last_bad_buy_date = get_last_day_in_superficial_loss_period(tx.date);

    let in_period = |t: &&Tx| {
        t.kind.is_stock() && t.date >= first_bad_buy_date && t.date <= last_bad_buy_date
    };

    if !txs.iter().filter(in_period).any(|t| t.action == TxAction::Buy) {
        return false;
    }

    let balance_at_end_of_period = txs[idx + 1..].iter()
        .take_while(|t| t.date <= last_bad_buy_date)
        .filter(in_period)
        .fold(post_sale_share_balance, |balance, t| match t.action {
            TxAction::Buy => balance + *t.shares,
            TxAction::Sell => balance - *t.shares,
        });

    tracing::trace!(security = %tx.security, date = %tx.date,
                    balance_at_end_of_period = %balance_at_end_of_period,
                    "is_superficial_loss");

    crate::util::decimal::is_positive(&balance_at_end_of_period)
}
