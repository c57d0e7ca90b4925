use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::EngineError;

/// Signed fuel quantity represented as **integer hundredths of a liter**.
///
/// Use this type for **all** liter values in the engine (balances, check
/// amounts, ledger entries) to avoid floating-point drift.
///
/// On the wire it is a decimal string with two fractional digits
/// (`"50.00"`). Deserialization also accepts JSON numbers, since clients
/// send amounts as plain numbers.
///
/// # Examples
///
/// ```rust
/// use engine::Liters;
///
/// let amount = Liters::new(50_25);
/// assert_eq!(amount.hundredths(), 5025);
/// assert_eq!(amount.to_string(), "50.25");
/// assert_eq!("10,5".parse::<Liters>().unwrap().hundredths(), 1050);
/// assert!("12.345".parse::<Liters>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Liters(i64);

impl Liters {
    pub const ZERO: Liters = Liters(0);

    /// Creates a new amount from integer hundredths.
    #[must_use]
    pub const fn new(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Creates an amount from whole liters.
    #[must_use]
    pub const fn whole(liters: i64) -> Self {
        Self(liters * 100)
    }

    /// Returns the raw value in hundredths of a liter.
    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Liters) -> Option<Liters> {
        self.0.checked_add(rhs.0).map(Liters)
    }

    /// Value as a float, for report rendering only.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Fails with a validation error unless the amount is strictly positive.
    pub fn require_positive(self, label: &str) -> Result<Self, EngineError> {
        if !self.is_positive() {
            return Err(EngineError::Validation(format!("{label} must be > 0")));
        }
        Ok(self)
    }
}

impl fmt::Display for Liters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for Liters {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Liters> for i64 {
    fn from(value: Liters) -> Self {
        value.0
    }
}

impl Add for Liters {
    type Output = Liters;

    fn add(self, rhs: Liters) -> Self::Output {
        Liters(self.0 + rhs.0)
    }
}

impl AddAssign for Liters {
    fn add_assign(&mut self, rhs: Liters) {
        self.0 += rhs.0;
    }
}

impl Sub for Liters {
    type Output = Liters;

    fn sub(self, rhs: Liters) -> Self::Output {
        Liters(self.0 - rhs.0)
    }
}

impl SubAssign for Liters {
    fn sub_assign(&mut self, rhs: Liters) {
        self.0 -= rhs.0;
    }
}

impl Neg for Liters {
    type Output = Liters;

    fn neg(self) -> Self::Output {
        Liters(-self.0)
    }
}

impl Sum for Liters {
    fn sum<I: Iterator<Item = Liters>>(iter: I) -> Self {
        iter.fold(Liters::ZERO, Add::add)
    }
}

impl FromStr for Liters {
    type Err = EngineError;

    /// Parses a decimal string into hundredths.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading
    /// `+`/`-`. At most 2 fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::Validation("empty amount".to_string());
        let invalid = || EngineError::Validation("invalid amount".to_string());
        let overflow = || EngineError::Validation("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim().replace(',', ".");
        if rest.is_empty() {
            return Err(empty());
        }

        let mut parts = rest.split('.');
        let whole_str = parts.next().ok_or_else(invalid)?;
        let frac_str = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: i64 = whole_str.parse().map_err(|_| overflow())?;

        let frac: i64 = match frac_str {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                    2 => frac.parse::<i64>().map_err(|_| invalid())?,
                    _ => return Err(EngineError::Validation("too many decimals".to_string())),
                }
            }
        };

        let total = whole
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(overflow)?;

        Ok(Liters(if negative { -total } else { total }))
    }
}

impl Serialize for Liters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct LitersVisitor;

impl de::Visitor<'_> for LitersVisitor {
    type Value = Liters;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a liter amount as number or decimal string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Liters, E> {
        v.parse().map_err(|err: EngineError| E::custom(err))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Liters, E> {
        v.checked_mul(100)
            .map(Liters)
            .ok_or_else(|| E::custom("amount too large"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Liters, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .map(Liters)
            .ok_or_else(|| E::custom("amount too large"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Liters, E> {
        if !v.is_finite() || v.abs() > (i64::MAX / 100) as f64 {
            return Err(E::custom("invalid amount"));
        }
        Ok(Liters((v * 100.0).round() as i64))
    }
}

impl<'de> Deserialize<'de> for Liters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LitersVisitor)
    }
}
