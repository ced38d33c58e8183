//! VAT split.
//!
//! `calculate_vat`: half-up rounding to 2 decimal places, `base = total` and
//! `vat = 0` for non-VAT-registered workspaces.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatBreakdown {
    pub base_amount: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `total_amount` into base + VAT. `vat_rate` is a percentage (e.g.
/// `17.00` for 17%). Fails `InvalidAmount` for a non-positive total or a
/// negative rate.
pub fn calculate_vat(total_amount: Decimal, vat_rate: Decimal, vat_registered: bool) -> Result<VatBreakdown> {
    if total_amount <= Decimal::ZERO {
        return Err(Error::invalid_amount(format!("total amount must be positive, got {total_amount}")));
    }
    if vat_rate < Decimal::ZERO {
        return Err(Error::invalid_amount(format!("vat rate cannot be negative, got {vat_rate}")));
    }

    let total = round2(total_amount);

    if vat_registered {
        let multiplier = Decimal::ONE + (vat_rate / Decimal::from(100));
        let base = round2(total / multiplier);
        let vat = round2(total - base);
        Ok(VatBreakdown { base_amount: base, vat_amount: vat, total_amount: total })
    } else {
        Ok(VatBreakdown { base_amount: total, vat_amount: Decimal::ZERO, total_amount: total })
    }
}
