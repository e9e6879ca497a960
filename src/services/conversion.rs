//! USD ↔ asset conversion and minimum-deposit validation
//!
//! Pure functions: no I/O, no clock. Prices are passed in by the caller at the
//! moment of computation.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::{LedgerError, LedgerResult};
use crate::models::asset::Asset;

/// Crypto quantities are kept to 8 decimal places
pub const CRYPTO_DECIMALS: u32 = 8;

/// USD values are kept to cents
pub const USD_DECIMALS: u32 = 2;

/// Minimum fiat (USD) deposit
pub const MIN_DEPOSIT_USD: Decimal = dec!(10);

/// Minimum crypto deposit, expressed in USD
pub const MIN_DEPOSIT_CRYPTO: Decimal = dec!(50);

/// Maximum allowed drift between a submitted and a recomputed crypto amount
pub const CONVERSION_TOLERANCE: Decimal = dec!(0.00000001);

/// Maximum relative drift between a client-quoted price and the oracle price
pub const MAX_QUOTE_DRIFT: Decimal = dec!(0.005);

/// Round half away from zero and pad to exactly `CRYPTO_DECIMALS` places
pub fn round_crypto(value: Decimal) -> Decimal {
    fixed_scale(value, CRYPTO_DECIMALS)
}

pub fn round_usd(value: Decimal) -> Decimal {
    fixed_scale(value, USD_DECIMALS)
}

fn fixed_scale(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

/// Amount of `asset` bought by `usd` at `price`.
///
/// USD deposits are not converted, only rounded to cents.
pub fn crypto_from_usd(usd: Decimal, price: Decimal, asset: Asset) -> LedgerResult<Decimal> {
    if asset.is_fiat() {
        return Ok(round_usd(usd));
    }
    if price <= Decimal::ZERO {
        return Err(LedgerError::ValidationFailed(format!(
            "{} price must be positive, got {}",
            asset, price
        )));
    }

    usd.checked_div(price)
        .map(round_crypto)
        .ok_or_else(|| LedgerError::ValidationFailed(format!("{} conversion overflowed", asset)))
}

/// USD value of `crypto` units of `asset` at `price`, rounded to cents.
pub fn usd_from_crypto(crypto: Decimal, price: Decimal, asset: Asset) -> LedgerResult<Decimal> {
    if asset.is_fiat() {
        return Ok(round_usd(crypto));
    }
    if price <= Decimal::ZERO {
        return Err(LedgerError::ValidationFailed(format!(
            "{} price must be positive, got {}",
            asset, price
        )));
    }

    crypto
        .checked_mul(price)
        .map(round_usd)
        .ok_or_else(|| LedgerError::ValidationFailed(format!("{} conversion overflowed", asset)))
}

/// Recompute the expected amount and reject the submission when the client's
/// figure drifted by more than `CONVERSION_TOLERANCE`.
pub fn verify_conversion(
    submitted: Decimal,
    usd: Decimal,
    price: Decimal,
    asset: Asset,
) -> LedgerResult<Decimal> {
    let expected = crypto_from_usd(usd, price, asset)?;
    if (submitted - expected).abs() > CONVERSION_TOLERANCE {
        return Err(LedgerError::ConversionMismatch { submitted, expected });
    }
    Ok(expected)
}

/// Reject a client-quoted price that strayed more than `MAX_QUOTE_DRIFT` from
/// the oracle price. The mismatch reports what `usd` would buy at each price.
pub fn check_quoted_price(
    quoted: Decimal,
    reference: Decimal,
    usd: Decimal,
    asset: Asset,
) -> LedgerResult<()> {
    if asset.is_fiat() {
        return Ok(());
    }
    if reference <= Decimal::ZERO {
        return Err(LedgerError::ValidationFailed(format!(
            "{} price must be positive, got {}",
            asset, reference
        )));
    }

    let drift = ((quoted - reference) / reference).abs();
    if quoted <= Decimal::ZERO || drift > MAX_QUOTE_DRIFT {
        let submitted = if quoted > Decimal::ZERO {
            crypto_from_usd(usd, quoted, asset)?
        } else {
            Decimal::ZERO
        };
        return Err(LedgerError::ConversionMismatch {
            submitted,
            expected: crypto_from_usd(usd, reference, asset)?,
        });
    }
    Ok(())
}

/// Minimum deposit thresholds per asset class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositLimits {
    pub fiat_minimum: Decimal,
    pub crypto_minimum: Decimal,
}

impl Default for DepositLimits {
    fn default() -> Self {
        Self {
            fiat_minimum: MIN_DEPOSIT_USD,
            crypto_minimum: MIN_DEPOSIT_CRYPTO,
        }
    }
}

impl DepositLimits {
    pub fn minimum_for(&self, asset: Asset) -> Decimal {
        if asset.is_fiat() {
            self.fiat_minimum
        } else {
            self.crypto_minimum
        }
    }

    pub fn validate(&self, usd: Decimal, asset: Asset) -> LedgerResult<()> {
        let minimum = self.minimum_for(asset);
        if usd < minimum {
            return Err(LedgerError::ValidationFailed(format!(
                "Minimum {} deposit is ${}",
                asset, minimum
            )));
        }
        Ok(())
    }
}

/// `DepositLimits::validate` with the default thresholds
pub fn validate_minimum(usd: Decimal, asset: Asset) -> LedgerResult<()> {
    DepositLimits::default().validate(usd, asset)
}
