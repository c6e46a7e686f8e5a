//! Commission calculator.
//!
//! Pure function mapping a settled amount and a rate configuration to the
//! three-way split (platform total / primary-operator share / partner share).
//! Everything is `Decimal`, rounded half-up to two decimal places; binary
//! floating point never touches money.
//!
//! # Rounding policy
//!
//! `platform_total` and `partner_share` are each rounded independently;
//! `primary_share` is the difference, so the two shares always sum exactly to
//! the platform total and any one-unit rounding remainder lands on the
//! primary share. That tie-break is deterministic and part of the contract.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::account::CommissionRates;

/// A computed three-way commission split.
///
/// `primary_share + partner_share == platform_total` holds exactly by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionSplit {
    pub platform_total: Decimal,
    pub primary_share: Decimal,
    pub partner_share: Decimal,
}

impl CommissionSplit {
    /// Re-check of the split-sum invariant within the 0.01 tolerance. The
    /// constructor guarantees it; the webhook processor still verifies before
    /// persisting, quarantining anything that fails.
    pub fn is_balanced(&self) -> bool {
        (self.primary_share + self.partner_share - self.platform_total).abs() < Decimal::new(1, 2)
    }
}

/// Compute the commission split for a settled amount.
///
/// The rate triple is validated at configuration time
/// ([`CommissionRates::validate`]), not here.
pub fn split(settled_amount: Decimal, rates: &CommissionRates) -> CommissionSplit {
    let platform_total = round_half_up(settled_amount * rates.platform);
    let partner_share = round_half_up(settled_amount * rates.partner);
    let primary_share = platform_total - partner_share;

    CommissionSplit {
        platform_total,
        primary_share,
        partner_share,
    }
}

fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates(platform: Decimal, primary: Decimal, partner: Decimal) -> CommissionRates {
        CommissionRates {
            platform,
            primary,
            partner,
        }
    }

    #[test]
    fn splits_one_percent_three_ways() {
        // 100000.00 at 1% / 0.75% / 0.25%.
        let split = split(
            dec!(100000.00),
            &rates(dec!(0.01), dec!(0.0075), dec!(0.0025)),
        );

        assert_eq!(split.platform_total, dec!(1000.00));
        assert_eq!(split.primary_share, dec!(750.00));
        assert_eq!(split.partner_share, dec!(250.00));
        assert!(split.is_balanced());
    }

    #[test]
    fn shares_always_sum_exactly_to_platform_total() {
        let amounts = [
            dec!(0.01),
            dec!(1),
            dec!(5),
            dec!(33.33),
            dec!(99.99),
            dec!(12345.67),
            dec!(100000.00),
        ];
        let r = rates(dec!(0.015), dec!(0.01), dec!(0.005));
        for amount in amounts {
            let s = split(amount, &r);
            assert_eq!(
                s.primary_share + s.partner_share,
                s.platform_total,
                "amount {amount}"
            );
        }
    }

    #[test]
    fn rounding_remainder_lands_on_the_primary_share() {
        // 5.00 at 0.1% / 0.05% / 0.05%: the platform total rounds up to 0.01
        // while both raw shares (0.0025 each) round down to 0.00. The spare
        // cent must go to the primary operator.
        let split = split(dec!(5), &rates(dec!(0.001), dec!(0.0005), dec!(0.0005)));

        assert_eq!(split.platform_total, dec!(0.01));
        assert_eq!(split.partner_share, dec!(0.00));
        assert_eq!(split.primary_share, dec!(0.01));
    }

    #[test]
    fn midpoints_round_up() {
        // 50.00 * 0.0005 = 0.025, a midpoint: half-up gives 0.03.
        let split = split(dec!(50), &rates(dec!(0.001), dec!(0.0005), dec!(0.0005)));
        assert_eq!(split.platform_total, dec!(0.05));
        assert_eq!(split.partner_share, dec!(0.03));
        assert_eq!(split.primary_share, dec!(0.02));
    }

    #[test]
    fn zero_rates_yield_zero_commission() {
        let split = split(
            dec!(100000.00),
            &rates(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        );
        assert_eq!(split.platform_total, Decimal::ZERO);
        assert_eq!(split.primary_share, Decimal::ZERO);
        assert_eq!(split.partner_share, Decimal::ZERO);
    }
}
