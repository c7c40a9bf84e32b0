//! Monetary amounts and the rental deposit rule.
//!
//! Amounts are held as integer cents. Prices arrive as `f64` (the wire and
//! storage type of `price_per_h`), so before any arithmetic they are converted
//! to an exact decimal built from their shortest round-trip representation:
//! `4.5_f64` becomes `45 × 10⁻¹`, never `4.4999999999999998…`.

use serde::{Serialize, Serializer};
use std::fmt;

/// Deposit charged on top of the estimated cost, in percent.
pub const DEPOSIT_PERCENT: i128 = 120;

/// Most decimals a price may carry.
pub const MAX_PRICE_SCALE: u32 = 6;

/// Highest accepted hourly price.
pub const MAX_PRICE: f64 = 1_000_000_000.0;

const NANOS_PER_HOUR: i128 = 3_600_000_000_000;

/// A non-negative amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// The amount in major units. Exact for any value that fits in 2^53 cents.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Serialized as a plain JSON number with at most two decimals (`10.8`).
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Exact decimal `mantissa × 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    /// Reads the shortest decimal string that round-trips to `value`.
    ///
    /// Returns `None` for negative, non-finite, or unrepresentably precise values.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }

        // f64's Display never uses exponent notation.
        let text = value.to_string();
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text.as_str(), ""),
        };

        let mut mantissa: i128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            if !digit.is_ascii_digit() {
                return None;
            }
            mantissa = mantissa
                .checked_mul(10)?
                .checked_add(i128::from(digit - b'0'))?;
        }

        Some(Decimal {
            mantissa,
            scale: u32::try_from(frac_part.len()).ok()?,
        })
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }
}

/// `num / den` rounded half-up, for `num >= 0` and `den > 0`.
fn div_round_half_up(num: i128, den: i128) -> Option<i128> {
    let doubled = num.checked_mul(2)?.checked_add(den)?;
    Some(doubled / den.checked_mul(2)?)
}

/// Whether `price_per_h` can be priced exactly: positive, at most
/// [`MAX_PRICE`] and with no more than [`MAX_PRICE_SCALE`] decimals.
pub fn is_billable_price(price_per_h: f64) -> bool {
    price_per_h > 0.0
        && price_per_h <= MAX_PRICE
        && Decimal::from_f64(price_per_h).is_some_and(|d| d.scale() <= MAX_PRICE_SCALE)
}

/// Deposit for renting at `price_per_h` for `duration_ns` nanoseconds:
/// 120 % of `hours × price`, rounded half-up to whole cents.
///
/// Fractional hours count as such; nothing is rounded before the final step.
/// Any positive period has a deposit, possibly zero. `None` only for an empty
/// or negative period, or a price outside the billable range.
pub fn deposit_for(duration_ns: i128, price_per_h: f64) -> Option<Money> {
    if duration_ns <= 0 || !is_billable_price(price_per_h) {
        return None;
    }
    let price = Decimal::from_f64(price_per_h)?;

    // cents = ns / 3.6e12 × (m / 10^s) × 120 / 100 × 100
    let num = duration_ns
        .checked_mul(price.mantissa())?
        .checked_mul(DEPOSIT_PERCENT)?;
    let den = NANOS_PER_HOUR.checked_mul(10_i128.checked_pow(price.scale())?)?;

    let cents = div_round_half_up(num, den)?;
    i64::try_from(cents).ok().map(Money::from_cents)
}
