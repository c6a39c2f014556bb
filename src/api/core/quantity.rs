// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resource quantities (`500m`, `2`, `5Gi`, `20k`).
//!
//! A quantity keeps the string it was written as, so a value set by a user is
//! serialized back unchanged. Numeric access goes through milli-units held in
//! an `i128`; fractional digits beyond milli precision round up, as the API
//! server does.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_DIGITS: usize = 30;

const BINARY_SUFFIXES: &[(&str, i64)] = &[
    ("Ei", 1 << 60),
    ("Pi", 1 << 50),
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

const DECIMAL_SUFFIXES: &[(&str, i64)] = &[
    ("E", 1_000_000_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

/// Errors from parsing or converting a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("quantity {0:?} has no valid number")]
    InvalidNumber(String),
    #[error("quantity {0:?} has an unknown suffix")]
    UnknownSuffix(String),
    #[error("quantity {0:?} is out of range")]
    Overflow(String),
}

/// Quantity is a fixed-point resource amount in Kubernetes notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity(String);

impl Quantity {
    /// Parse and validate a quantity string. Accepts binary (`Ki`..`Ei`) and
    /// decimal (`m`, `k`..`E`) suffixes as well as decimal exponents (`1e3`).
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        parse_milli(s)?;
        Ok(Self(s.to_string()))
    }

    /// A CPU-style quantity: whole units when exact (`2`), milli-units otherwise (`70m`).
    pub fn from_milli(milli: i64) -> Self {
        if milli % 1000 == 0 {
            Self((milli / 1000).to_string())
        } else {
            Self(format!("{}m", milli))
        }
    }

    /// A memory-style quantity using the largest binary suffix that divides exactly.
    pub fn from_binary(value: i64) -> Self {
        Self(format_with_suffixes(value, BINARY_SUFFIXES))
    }

    /// A count-style quantity using the largest decimal suffix that divides exactly.
    pub fn from_decimal(value: i64) -> Self {
        Self(format_with_suffixes(value, DECIMAL_SUFFIXES))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn milli_value(&self) -> Result<i64, QuantityError> {
        let milli = parse_milli(&self.0)?;
        i64::try_from(milli).map_err(|_| QuantityError::Overflow(self.0.clone()))
    }

    /// Whole units, rounded up (`1500m` is 2).
    pub fn value(&self) -> Result<i64, QuantityError> {
        let milli = parse_milli(&self.0)?;
        let units = if milli >= 0 {
            (milli + 999) / 1000
        } else {
            milli / 1000
        };
        i64::try_from(units).map_err(|_| QuantityError::Overflow(self.0.clone()))
    }
}

fn format_with_suffixes(value: i64, suffixes: &[(&str, i64)]) -> String {
    if value == 0 {
        return "0".to_string();
    }
    for (suffix, multiplier) in suffixes {
        if value % multiplier == 0 {
            return format!("{}{}", value / multiplier, suffix);
        }
    }
    value.to_string()
}

fn suffix_milli_factor(suffix: &str) -> Option<i128> {
    if suffix == "m" {
        return Some(1);
    }
    if suffix.is_empty() {
        return Some(1000);
    }
    BINARY_SUFFIXES
        .iter()
        .chain(DECIMAL_SUFFIXES.iter())
        .find(|(s, _)| *s == suffix)
        .map(|(_, multiplier)| i128::from(*multiplier) * 1000)
}

/// Multiplier to milli-units and extra decimal places to divide by for `suffix`.
/// A bare `E` is the exa suffix; `e3`, `E-2` and the like are decimal exponents.
fn suffix_scale(s: &str, suffix: &str) -> Result<(i128, u32), QuantityError> {
    if let Some(factor) = suffix_milli_factor(suffix) {
        return Ok((factor, 0));
    }

    let exponent: i32 = suffix
        .strip_prefix(|c: char| c == 'e' || c == 'E')
        .and_then(|rest| rest.parse().ok())
        .ok_or_else(|| QuantityError::UnknownSuffix(s.to_string()))?;
    if exponent < 0 {
        return Ok((1000, exponent.unsigned_abs()));
    }
    10i128
        .checked_pow(exponent.unsigned_abs())
        .and_then(|power| power.checked_mul(1000))
        .map(|factor| (factor, 0))
        .ok_or_else(|| QuantityError::Overflow(s.to_string()))
}

fn parse_milli(s: &str) -> Result<i128, QuantityError> {
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    let (negative, unsigned) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let number_end = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_end);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(QuantityError::InvalidNumber(s.to_string()));
    }
    if whole.len() + fraction.len() > MAX_DIGITS {
        return Err(QuantityError::Overflow(s.to_string()));
    }

    let (factor, exponent_places) = suffix_scale(s, suffix)?;

    let mantissa: i128 = format!("{}{}", whole, fraction)
        .parse()
        .map_err(|_| QuantityError::InvalidNumber(s.to_string()))?;
    let numerator = mantissa
        .checked_mul(factor)
        .ok_or_else(|| QuantityError::Overflow(s.to_string()))?;

    // Round up without adding to the numerator, which may sit near i128::MAX.
    let places = fraction.len() as u32 + exponent_places;
    let milli = match 10i128.checked_pow(places) {
        Some(scale) => numerator / scale + i128::from(numerator % scale != 0),
        None => i128::from(numerator != 0),
    };

    Ok(if negative { -milli } else { milli })
}

impl Default for Quantity {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Quantity {
    type Error = QuantityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_milli(&s)?;
        Ok(Self(s))
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
