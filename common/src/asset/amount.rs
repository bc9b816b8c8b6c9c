use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::account::string_serde;
use crate::config::MAX_PRECISION;
use crate::error::AmountError;

/// Non-negative decimal quantity carrying its own scale.
///
/// `"100"`, `"100.0"` and `"100.00"` are equal values with different
/// scales. Equality, ordering and hashing work on the value; [`Display`]
/// prints the canonical form with trailing fractional zeros removed.
#[derive(Debug, Clone, Copy)]
pub struct Amount {
    mantissa: u128,
    scale: u8,
}

const fn pow10(exp: u8) -> u128 {
    10u128.pow(exp as u32)
}

impl Amount {
    pub const fn zero() -> Self {
        Self {
            mantissa: 0,
            scale: 0,
        }
    }

    pub fn from_units(mantissa: u128, scale: u8) -> Result<Self, AmountError> {
        if scale > MAX_PRECISION {
            return Err(AmountError::ScaleTooLarge {
                scale,
                max: MAX_PRECISION,
            });
        }
        Ok(Self { mantissa, scale })
    }

    pub const fn from_integer(value: u64) -> Self {
        Self {
            mantissa: value as u128,
            scale: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    // Integer part and fractional part widened to MAX_PRECISION digits
    fn split(&self) -> (u128, u128) {
        let unit = pow10(self.scale);
        let fraction = (self.mantissa % unit) * pow10(MAX_PRECISION - self.scale);
        (self.mantissa / unit, fraction)
    }

    /// Number of fractional digits actually needed to represent the value.
    pub fn significant_scale(&self) -> u8 {
        let mut scale = self.scale;
        let mut mantissa = self.mantissa;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        scale
    }

    /// Whether an asset with `precision` decimals can hold this value.
    pub fn fits_precision(&self, precision: u8) -> bool {
        self.significant_scale() <= precision
    }

    fn rescaled(&self, scale: u8) -> Result<u128, AmountError> {
        debug_assert!(scale >= self.scale);
        self.mantissa
            .checked_mul(pow10(scale - self.scale))
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_add(&self, other: &Amount) -> Result<Amount, AmountError> {
        let scale = self.scale.max(other.scale);
        let mantissa = self
            .rescaled(scale)?
            .checked_add(other.rescaled(scale)?)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount { mantissa, scale })
    }

    pub fn checked_sub(&self, other: &Amount) -> Result<Amount, AmountError> {
        let scale = self.scale.max(other.scale);
        let mantissa = self
            .rescaled(scale)?
            .checked_sub(other.rescaled(scale)?)
            .ok_or_else(|| AmountError::Insufficient {
                need: other.to_string(),
                have: self.to_string(),
            })?;
        Ok(Amount { mantissa, scale })
    }

    pub fn checked_mul(&self, factor: u64) -> Result<Amount, AmountError> {
        let mantissa = self
            .mantissa
            .checked_mul(factor as u128)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount {
            mantissa,
            scale: self.scale,
        })
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.split() == other.split()
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split().cmp(&other.split())
    }
}

impl Hash for Amount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.split().hash(state);
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let invalid = || AmountError::Invalid(s.to_string());
        let (integer, fraction) = match s.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (s, ""),
        };

        if integer.is_empty() || (s.contains('.') && fraction.is_empty()) {
            return Err(invalid());
        }
        if !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let scale = u8::try_from(fraction.len()).map_err(|_| invalid())?;
        if scale > MAX_PRECISION {
            return Err(AmountError::ScaleTooLarge {
                scale,
                max: MAX_PRECISION,
            });
        }

        let mut mantissa: u128 = 0;
        for digit in integer.bytes().chain(fraction.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add((digit - b'0') as u128))
                .ok_or(AmountError::Overflow)?;
        }

        Ok(Self { mantissa, scale })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let unit = pow10(self.scale);
        let integer = self.mantissa / unit;
        let fraction = self.mantissa % unit;
        if fraction == 0 {
            return write!(f, "{}", integer);
        }

        let digits = format!("{:0width$}", fraction, width = self.scale as usize);
        write!(f, "{}.{}", integer, digits.trim_end_matches('0'))
    }
}

string_serde!(Amount);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(amount("100").to_string(), "100");
        assert_eq!(amount("1000.00").to_string(), "1000");
        assert_eq!(amount("3.30").to_string(), "3.3");
        assert_eq!(amount("0.05").to_string(), "0.05");
        assert_eq!(amount("0").to_string(), "0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", ".5", "5.", "-1", "1e5", "1.2.3", " 1", "abc"] {
            assert!(bad.parse::<Amount>().is_err(), "{bad:?} should be rejected");
        }
        assert!(matches!(
            "0.0000000000000000001".parse::<Amount>(),
            Err(AmountError::ScaleTooLarge { .. })
        ));
    }

    #[test]
    fn test_equality_ignores_scale() {
        assert_eq!(amount("100"), amount("100.00"));
        assert!(amount("99.99") < amount("100"));
        assert!(amount("100.01") > amount("100"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(amount("100").checked_sub(&amount("10")).unwrap(), amount("90"));
        assert_eq!(
            amount("100").checked_add(&amount("0.25")).unwrap().to_string(),
            "100.25"
        );
        assert_eq!(amount("1.11").checked_mul(3).unwrap().to_string(), "3.33");
        assert!(matches!(
            amount("10").checked_sub(&amount("10.01")),
            Err(AmountError::Insufficient { .. })
        ));
    }

    #[test]
    fn test_precision_fit() {
        assert!(amount("1000.00").fits_precision(0));
        assert!(amount("1.11").fits_precision(2));
        assert!(!amount("1.111").fits_precision(2));
    }

    proptest! {
        #[test]
        fn prop_add_then_sub_is_identity(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000, scale in 0u8..6) {
            let x = Amount::from_units(a as u128, scale).unwrap();
            let y = Amount::from_units(b as u128, scale).unwrap();
            let sum = x.checked_add(&y).unwrap();
            prop_assert_eq!(sum.checked_sub(&y).unwrap(), x);
        }

        #[test]
        fn prop_display_parses_back(a in 0u64..u64::MAX, scale in 0u8..=MAX_PRECISION) {
            let x = Amount::from_units(a as u128, scale).unwrap();
            let back: Amount = x.to_string().parse().unwrap();
            prop_assert_eq!(back, x);
        }
    }
}
