use rust_decimal::Decimal;

use super::{currency::CurrencyAndExchangeRate, tx::{Security, Tx}};

/// Running position for a single security.
/// share_balance may only go negative for short option positions.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PortfolioSecurityStatus {
    pub security: Security,
    pub share_balance: Decimal,
    // In CAD
    pub total_acb: Decimal,
}

impl PortfolioSecurityStatus {
    pub fn new(security: Security) -> PortfolioSecurityStatus {
        PortfolioSecurityStatus {
            security,
            share_balance: Decimal::ZERO,
            total_acb: Decimal::ZERO,
        }
    }

    pub fn per_share_acb(&self) -> Decimal {
        if self.share_balance.is_zero() {
            Decimal::ZERO
        } else {
            self.total_acb / self.share_balance
        }
    }
}

/// The computed effect of one Tx on its security's position.
/// All amounts are in CAD.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct TxDelta {
    pub tx: Tx,
    pub currency_and_rate: CurrencyAndExchangeRate,
    pub proceeds: Decimal,
    // Commission converted to CAD (aka. outlays)
    pub commission: Decimal,
    // ACB consumed by a sell, or added by a buy
    pub acb: Decimal,
    pub capital_gain: Decimal,
    pub pre_status: PortfolioSecurityStatus,
    pub post_status: PortfolioSecurityStatus,
    pub superficial_loss: bool,
}

impl TxDelta {
    pub fn share_balance_after(&self) -> Decimal {
        self.post_status.share_balance
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::PortfolioSecurityStatus;

    #[test]
    fn test_per_share_acb() {
        let mut st = PortfolioSecurityStatus::new("FOO".to_string());
        assert_eq!(st.per_share_acb(), dec!(0));

        st.share_balance = dec!(4);
        st.total_acb = dec!(10);
        assert_eq!(st.per_share_acb(), dec!(2.5));

        // Balance zero, with leftover ACB (should not divide)
        st.share_balance = dec!(0);
        assert_eq!(st.per_share_acb(), dec!(0));
    }
}
