//! Splits a gross amount into tenant shares without losing cents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{round_money, Money, TenantId};

use super::model::{Share, ShareSum};

/// Amount allotted to one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareAllocation {
    pub tenant: TenantId,
    pub amount: Money,
}

/// Split `gross` by the given shares.
///
/// Tenants are processed in id order and zero shares are skipped. When the
/// effective shares add up to one, the last allocation absorbs the rounding
/// residual so the result sums to `gross` exactly. With `normalize` the
/// shares are first rescaled to add up to one; otherwise shares that do not
/// sum to one are applied as configured.
pub fn allocate(gross: Money, shares: &[(TenantId, Share)], normalize: bool) -> Vec<ShareAllocation> {
    let gross = round_money(gross);
    let mut active: Vec<(TenantId, Share)> = shares
        .iter()
        .filter(|(_, share)| !share.is_zero())
        .copied()
        .collect();
    active.sort_by_key(|(tenant, _)| *tenant);

    let share_sum: ShareSum = active.iter().map(|(_, share)| *share).collect();
    if active.is_empty() || share_sum.is_zero() {
        return Vec::new();
    }
    let absorb_residual = normalize || share_sum.is_one();

    let last = active.len() - 1;
    let mut allocated = Decimal::ZERO;
    active
        .into_iter()
        .enumerate()
        .map(|(i, (tenant, share))| {
            let fraction = if normalize {
                share_sum.relative(share)
            } else {
                share.as_decimal()
            };
            let amount = if absorb_residual && i == last {
                gross - allocated
            } else {
                round_money(gross * fraction)
            };
            allocated += amount;
            ShareAllocation { tenant, amount }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn shares(parts: &[(u64, u32, u32)]) -> Vec<(TenantId, Share)> {
        parts
            .iter()
            .map(|(id, n, d)| (TenantId(*id), Share::new(*n, *d)))
            .collect()
    }

    #[test]
    fn test_thirds_residual_on_last_tenant() {
        let result = allocate(dec!(1000), &shares(&[(3, 1, 3), (1, 1, 3), (2, 1, 3)]), false);
        let amounts: Vec<_> = result.iter().map(|a| (a.tenant, a.amount)).collect();
        assert_eq!(
            amounts,
            vec![
                (TenantId(1), dec!(333.33)),
                (TenantId(2), dec!(333.33)),
                (TenantId(3), dec!(333.34)),
            ]
        );
    }

    #[test]
    fn test_zero_share_gets_nothing() {
        let result = allocate(dec!(100), &shares(&[(1, 0, 1), (2, 1, 1)]), false);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tenant, TenantId(2));
        assert_eq!(result[0].amount, dec!(100));
    }

    #[test]
    fn test_incomplete_shares_kept_as_configured() {
        let result = allocate(dec!(100), &shares(&[(1, 1, 2)]), false);
        assert_eq!(result[0].amount, dec!(50.00));
    }

    #[test]
    fn test_normalized_shares_sum_to_gross() {
        let result = allocate(dec!(100), &shares(&[(1, 1, 3), (2, 1, 3)]), true);
        assert_eq!(result[0].amount, dec!(50.00));
        assert_eq!(result[1].amount, dec!(50.00));
    }

    #[test]
    fn test_sum_preserved_for_awkward_amounts() {
        for gross in [dec!(0.01), dec!(10.00), dec!(99.99), dec!(1234.57)] {
            let result = allocate(gross, &shares(&[(1, 1, 7), (2, 2, 7), (3, 4, 7)]), false);
            let total: Decimal = result.iter().map(|a| a.amount).sum();
            assert_eq!(total, gross);
        }
    }

    #[test]
    fn test_negative_gross_split() {
        let result = allocate(dec!(-10), &shares(&[(1, 1, 3), (2, 2, 3)]), false);
        assert_eq!(result[0].amount, dec!(-3.33));
        assert_eq!(result[1].amount, dec!(-6.67));
    }

    #[test]
    fn test_shares_too_fine_for_exact_sum_still_split() {
        let parts = [
            (1, 1, 4294967291),
            (2, 1, 4294967279),
            (3, 1, 4294967231),
            (4, 1, 4294967197),
            (5, 1, 4294967189),
        ];
        let result = allocate(dec!(100), &shares(&parts), true);
        assert_eq!(result.len(), 5);
        assert!(result.iter().all(|a| a.amount == dec!(20.00)));
        let total: Decimal = result.iter().map(|a| a.amount).sum();
        assert_eq!(total, dec!(100));

        let unnormalized = allocate(dec!(100), &shares(&parts), false);
        assert!(unnormalized.iter().all(|a| a.amount == dec!(0.00)));
    }
}
