//! Fixed-point decimal arithmetic.
//!
//! Every internal quantity (price, size, margin, PnL) is a signed 18-decimal
//! fixed-point number (`Fixed18`). Collateral tokens are natively denominated
//! with a small number of decimals (`Fixed6` is the common case, USDC-style);
//! conversion between the two only happens at the I/O boundary, parameterized
//! by `Market::collateral_decimals`. Mixing 6-decimal and 18-decimal values
//! without going through that boundary was the single largest source of
//! silent-zero bugs in the reference system this crate replaces, so no
//! implicit `From`/`Into` is provided between the two scales.
//!
//! All arithmetic is checked; there are no panicking operator overloads.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 10^18, the scale of [`Fixed18`].
pub const SCALE_18: i128 = 1_000_000_000_000_000_000;
/// 10^6, the scale of [`Fixed6`].
pub const SCALE_6: i128 = 1_000_000;

/// Signed 18-decimal fixed-point number. Internal unit for prices, sizes,
/// margin, and PnL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed18(i128);

/// Signed 6-decimal fixed-point number. Native collateral-token unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed6(i128);

macro_rules! impl_fixed {
    ($ty:ident, $scale:expr) => {
        impl $ty {
            pub const SCALE: i128 = $scale;
            pub const ZERO: $ty = $ty(0);

            #[inline]
            pub const fn from_raw(raw: i128) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> i128 {
                self.0
            }

            #[inline]
            pub fn from_i64(whole: i64) -> Self {
                Self((whole as i128) * Self::SCALE)
            }

            #[inline]
            pub fn is_zero(self) -> bool {
                self.0 == 0
            }

            #[inline]
            pub fn is_negative(self) -> bool {
                self.0 < 0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn signum(self) -> i128 {
                self.0.signum()
            }

            #[inline]
            pub fn checked_add(self, other: Self) -> Option<Self> {
                self.0.checked_add(other.0).map(Self)
            }

            #[inline]
            pub fn checked_sub(self, other: Self) -> Option<Self> {
                self.0.checked_sub(other.0).map(Self)
            }

            #[inline]
            pub fn checked_neg(self) -> Option<Self> {
                self.0.checked_neg().map(Self)
            }

            /// `self * other`, with the product rescaled back down to this
            /// type's fractional precision. Uses `i128` intermediate math;
            /// overflows on values outside `i128` range after rescale.
            #[inline]
            pub fn checked_mul(self, other: Self) -> Option<Self> {
                let wide = self.0.checked_mul(other.0)?;
                Some(Self(wide / Self::SCALE))
            }

            /// `self * scalar` where `scalar` is a plain integer (not itself
            /// fixed-point), e.g. a basis-point count or a leverage multiple.
            #[inline]
            pub fn checked_mul_int(self, scalar: i128) -> Option<Self> {
                self.0.checked_mul(scalar).map(Self)
            }

            /// `self / other`, rescaled so the result keeps this type's
            /// fractional precision. Returns `None` on division by zero.
            #[inline]
            pub fn checked_div(self, other: Self) -> Option<Self> {
                if other.0 == 0 {
                    return None;
                }
                let wide = self.0.checked_mul(Self::SCALE)?;
                Some(Self(wide / other.0))
            }

            #[inline]
            pub fn checked_div_int(self, scalar: i128) -> Option<Self> {
                if scalar == 0 {
                    return None;
                }
                Some(Self(self.0 / scalar))
            }

            pub fn min(self, other: Self) -> Self {
                if self.0 <= other.0 {
                    self
                } else {
                    other
                }
            }

            pub fn max(self, other: Self) -> Self {
                if self.0 >= other.0 {
                    self
                } else {
                    other
                }
            }

            /// Clamp to `[lo, hi]`.
            pub fn clamp(self, lo: Self, hi: Self) -> Self {
                self.max(lo).min(hi)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let negative = self.0 < 0;
                let magnitude = self.0.unsigned_abs();
                let scale = Self::SCALE as u128;
                let whole = magnitude / scale;
                let frac = magnitude % scale;
                if negative && (whole != 0 || frac != 0) {
                    write!(f, "-")?;
                }
                let digits = (scale.ilog10()) as usize;
                write!(f, "{whole}.{frac:0digits$}")
            }
        }

        impl FromStr for $ty {
            type Err = FixedParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                let (negative, s) = match s.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, s),
                };
                let mut parts = s.splitn(2, '.');
                let whole_part = parts.next().unwrap_or("0");
                let frac_part = parts.next().unwrap_or("");
                if frac_part.len() as u32 > (Self::SCALE as u128).ilog10() {
                    return Err(FixedParseError::TooManyFractionalDigits);
                }
                let whole: i128 = whole_part
                    .parse()
                    .map_err(|_| FixedParseError::InvalidDigits)?;
                let digits_needed = (Self::SCALE as u128).ilog10() as usize;
                let mut frac_str = frac_part.to_string();
                while frac_str.len() < digits_needed {
                    frac_str.push('0');
                }
                let frac: i128 = if frac_str.is_empty() {
                    0
                } else {
                    frac_str
                        .parse()
                        .map_err(|_| FixedParseError::InvalidDigits)?
                };
                let raw = whole * Self::SCALE + frac;
                Ok(Self(if negative { -raw } else { raw }))
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $ty::from_str(&s).map_err(DeError::custom)
            }
        }
    };
}

impl_fixed!(Fixed18, SCALE_18);
impl_fixed!(Fixed6, SCALE_6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FixedParseError {
    #[error("too many fractional digits")]
    TooManyFractionalDigits,
    #[error("invalid digits")]
    InvalidDigits,
}

/// Convert a raw native-collateral amount (`decimals` fractional digits, e.g.
/// 6 for USDC) into the internal 18-decimal representation. This is the one
/// conversion boundary the margin ledger and matching engine are allowed to
/// cross; everywhere else stays in `Fixed18`.
pub fn native_to_fixed18(native: Fixed6, decimals: u8) -> Option<Fixed18> {
    // native.raw() is expressed at `Fixed6::SCALE` regardless of `decimals`;
    // callers are expected to have parsed the wire amount directly into the
    // right scale via `native_raw_to_fixed18` when `decimals != 6`.
    debug_assert_eq!(decimals, 6, "Fixed6 carries a fixed 6-decimal scale");
    Some(Fixed18(native.raw().checked_mul(SCALE_18 / SCALE_6)?))
}

/// Convert an 18-decimal internal amount down to a raw native-collateral
/// integer with `decimals` fractional digits, truncating any precision the
/// native token cannot represent (consistent with how the floor-rounded fee
/// split in the margin ledger truncates rather than rounds to nearest).
pub fn fixed18_to_native_raw(amount: Fixed18, decimals: u8) -> i128 {
    let native_scale = 10i128.pow(decimals as u32);
    // amount.raw() is at SCALE_18; divide down to `decimals` digits.
    let divisor = SCALE_18 / native_scale;
    amount.raw() / divisor
}

/// Convert a raw native-collateral integer (`decimals` fractional digits)
/// directly into `Fixed18`, for collateral tokens whose native decimals
/// differ from 6 (the registry's `collateral_decimals` field).
pub fn native_raw_to_fixed18(raw: i128, decimals: u8) -> Option<Fixed18> {
    let native_scale = 10i128.checked_pow(decimals as u32)?;
    let multiplier = SCALE_18.checked_div(native_scale)?;
    raw.checked_mul(multiplier).map(Fixed18)
}

/// Basis points (1/10000). Used for fees, maintenance margin, and funding
/// rate caps, all of which the registry stores as small integers.
pub fn bps_of(amount: Fixed18, bps: u32) -> Option<Fixed18> {
    let scaled = amount.raw().checked_mul(bps as i128)?;
    Some(Fixed18(scaled / 10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let a: Fixed18 = "100.50".parse().unwrap();
        assert_eq!(a.to_string(), "100.500000000000000000");
        let b: Fixed18 = "-0.01".parse().unwrap();
        assert_eq!(b.to_string(), "-0.010000000000000000");
    }

    #[test]
    fn checked_mul_rescales() {
        let price: Fixed18 = "100.00".parse().unwrap();
        let qty: Fixed18 = "2.5".parse().unwrap();
        let notional = price.checked_mul(qty).unwrap();
        assert_eq!(notional, "250.00".parse().unwrap());
    }

    #[test]
    fn checked_div_rescales() {
        let notional: Fixed18 = "100.00".parse().unwrap();
        let leverage = Fixed18::from_i64(10);
        let margin = notional.checked_div(leverage).unwrap();
        assert_eq!(margin, "10.00".parse().unwrap());
    }

    #[test]
    fn division_by_zero_rejected() {
        let a = Fixed18::from_i64(1);
        assert!(a.checked_div(Fixed18::ZERO).is_none());
    }

    #[test]
    fn native_conversion_boundary() {
        // 1000.25 USDC at 6 decimals -> 18d
        let native = native_raw_to_fixed18(1_000_250_000, 6).unwrap();
        assert_eq!(native, "1000.25".parse().unwrap());
        let back = fixed18_to_native_raw(native, 6);
        assert_eq!(back, 1_000_250_000);
    }

    #[test]
    fn bps_floor_rounding_matches_fee_split_contract() {
        let fee: Fixed18 = "1.00".parse().unwrap();
        let creator_cut = bps_of(fee, 8000).unwrap();
        assert_eq!(creator_cut, "0.80".parse().unwrap());
    }

    #[test]
    fn overflow_is_none_not_panic() {
        let huge = Fixed18::from_raw(i128::MAX);
        assert!(huge.checked_add(Fixed18::from_raw(1)).is_none());
    }
}
