//! Chilean tax identifier (RUT) with its modulo-11 check digit.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use gestor_core::{DomainError, DomainResult, ValueObject};

/// A validated RUT. Displays as `XX.XXX.XXX-X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rut {
    number: u32,
    check_digit: char,
}

impl Rut {
    /// Accepts `12.345.678-5`, `12345678-5` or `123456785` (case-insensitive `K`).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | ' '))
            .collect::<String>()
            .to_uppercase();

        if cleaned.len() < 2 {
            return Err(DomainError::validation("rut: invalid RUT"));
        }
        let (digits, dv) = cleaned.split_at(cleaned.len() - 1);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation("rut: invalid RUT"));
        }
        let number: u32 = digits
            .parse()
            .map_err(|_| DomainError::validation("rut: invalid RUT"))?;

        let expected = check_digit(number);
        if dv.chars().next() != Some(expected) {
            return Err(DomainError::validation("rut: invalid RUT"));
        }

        Ok(Self {
            number,
            check_digit: expected,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn check_digit(&self) -> char {
        self.check_digit
    }
}

/// Modulo-11 check digit: weights 2..=7 from the right, `11 → 0`, `10 → K`.
pub fn check_digit(number: u32) -> char {
    let mut n = number;
    let mut sum = 0u32;
    let mut weight = 2u32;
    while n > 0 {
        sum += (n % 10) * weight;
        n /= 10;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }
    match 11 - sum % 11 {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

impl ValueObject for Rut {}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.number.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{grouped}-{}", self.check_digit)
    }
}

impl FromStr for Rut {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Rut {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Rut> for String {
    fn from(value: Rut) -> Self {
        value.to_string()
    }
}
