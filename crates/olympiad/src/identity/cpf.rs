use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder numbers that satisfy the checksum but are never issued.
const BLACKLIST: [&str; 2] = ["00000000000", "00000000191"];

fn cpf_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]{3})\.?([0-9]{3})\.?([0-9]{3})-?([0-9]{2})$").expect("cpf pattern compiles")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CpfError {
    #[error("CPF must contain 11 digits, optionally formatted as 000.000.000-00")]
    InvalidFormat,
    #[error("CPF is a reserved placeholder number")]
    Blacklisted,
    #[error("CPF check digits do not match")]
    CheckDigitMismatch,
}

/// Rendering style for [`format_cpf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpfStyle {
    /// `52998224725`
    Digits,
    /// `529.982.247-25`
    Punctuated,
}

/// Validated national tax ID held in raw 11-digit form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cpf(String);

impl Cpf {
    pub fn parse(raw: &str) -> Result<Self, CpfError> {
        let digits = normalize_cpf(raw).ok_or(CpfError::InvalidFormat)?;
        if BLACKLIST.contains(&digits.as_str()) {
            return Err(CpfError::Blacklisted);
        }
        if !check_digits_match(&digits) {
            return Err(CpfError::CheckDigitMismatch);
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn display(&self) -> String {
        punctuate(&self.0)
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Serialize for Cpf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cpf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cpf::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Strip the optional `.`/`-` punctuation, returning `None` when the input is not a CPF shape.
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let captures = cpf_pattern().captures(raw.trim())?;
    Some(format!(
        "{}{}{}{}",
        &captures[1], &captures[2], &captures[3], &captures[4]
    ))
}

pub fn validate_cpf(raw: &str) -> bool {
    Cpf::parse(raw).is_ok()
}

/// Render a CPF-shaped string. Only the shape is checked, not the check digits.
pub fn format_cpf(raw: &str, style: CpfStyle) -> Result<String, CpfError> {
    let digits = normalize_cpf(raw).ok_or(CpfError::InvalidFormat)?;
    Ok(match style {
        CpfStyle::Digits => digits,
        CpfStyle::Punctuated => punctuate(&digits),
    })
}

fn punctuate(digits: &str) -> String {
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

fn check_digit(digits: &[u32], top_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .zip((2..=top_weight).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    ((10 * sum) % 11) % 10
}

fn check_digits_match(normalized: &str) -> bool {
    let digits: Vec<u32> = normalized.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 {
        return false;
    }

    check_digit(&digits[..9], 10) == digits[9] && check_digit(&digits[..10], 11) == digits[10]
}
