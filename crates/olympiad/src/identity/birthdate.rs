use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

const DAY: &str = r"(0[1-9]|[12][0-9]|3[01])";
const MONTH: &str = r"(0[1-9]|1[012])";
const YEAR: &str = r"((?:19|20)[0-9]{2})";

fn day_first() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^{DAY}[/-]?{MONTH}[/-]?{YEAR}$")).expect("dmy pattern compiles")
    })
}

fn year_first() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^{YEAR}[/-]?{MONTH}[/-]?{DAY}$")).expect("ymd pattern compiles")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BirthDateError {
    #[error("date must look like dd/mm/yyyy or yyyy-mm-dd")]
    InvalidFormat,
    #[error("day {day} does not exist in {month:02}/{year}")]
    NonexistentDay { year: i32, month: u32, day: u32 },
    #[error("date lies in the future")]
    InFuture,
    #[error("birth year {year} is outside {earliest}..={latest}")]
    OutOfRange { year: i32, earliest: i32, latest: i32 },
}

/// Output layouts supported by [`BirthDate::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    IsoDash,
    IsoSlash,
    DayFirstDash,
    DayFirstSlash,
    /// `yyyymmdd`, the storage form.
    Compact,
}

/// Acceptable birth-year window for the current edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthDatePolicy {
    pub earliest_year: i32,
    pub latest_year: i32,
}

impl BirthDatePolicy {
    pub fn new(earliest_year: i32, latest_year: i32) -> Self {
        Self {
            earliest_year,
            latest_year,
        }
    }

    /// Full acceptance check: calendar-valid, not after `today`, inside the year window.
    pub fn check(&self, raw: &str, today: NaiveDate) -> Result<BirthDate, BirthDateError> {
        let date = parse_birthdate(raw)?;
        if date.0 > today {
            return Err(BirthDateError::InFuture);
        }
        let year = date.0.year();
        if year < self.earliest_year || year > self.latest_year {
            return Err(BirthDateError::OutOfRange {
                year,
                earliest: self.earliest_year,
                latest: self.latest_year,
            });
        }
        Ok(date)
    }
}

impl Default for BirthDatePolicy {
    fn default() -> Self {
        Self::new(1995, 2019)
    }
}

/// Calendar-checked birth date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BirthDate(NaiveDate);

impl BirthDate {
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn format(&self, style: DateStyle) -> String {
        let pattern = match style {
            DateStyle::IsoDash => "%Y-%m-%d",
            DateStyle::IsoSlash => "%Y/%m/%d",
            DateStyle::DayFirstDash => "%d-%m-%Y",
            DateStyle::DayFirstSlash => "%d/%m/%Y",
            DateStyle::Compact => "%Y%m%d",
        };
        self.0.format(pattern).to_string()
    }
}

impl From<NaiveDate> for BirthDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(DateStyle::DayFirstSlash))
    }
}

impl Serialize for BirthDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.format(DateStyle::IsoDash))
    }
}

impl<'de> Deserialize<'de> for BirthDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_birthdate(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let index = (month.clamp(1, 12) - 1) as usize;
    if month == 2 && is_leap_year(year) {
        DAYS_IN_MONTH[index] + 1
    } else {
        DAYS_IN_MONTH[index]
    }
}

/// Parse a day-first or year-first date and check it against the month table.
pub fn parse_birthdate(raw: &str) -> Result<BirthDate, BirthDateError> {
    let raw = raw.trim();
    let (year, month, day) = if let Some(captures) = day_first().captures(raw) {
        (
            captures[3].parse::<i32>(),
            captures[2].parse::<u32>(),
            captures[1].parse::<u32>(),
        )
    } else if let Some(captures) = year_first().captures(raw) {
        (
            captures[1].parse::<i32>(),
            captures[2].parse::<u32>(),
            captures[3].parse::<u32>(),
        )
    } else {
        return Err(BirthDateError::InvalidFormat);
    };

    let year = year.map_err(|_| BirthDateError::InvalidFormat)?;
    let month = month.map_err(|_| BirthDateError::InvalidFormat)?;
    let day = day.map_err(|_| BirthDateError::InvalidFormat)?;

    if day > days_in_month(year, month) {
        return Err(BirthDateError::NonexistentDay { year, month, day });
    }

    NaiveDate::from_ymd_opt(year, month, day)
        .map(BirthDate)
        .ok_or(BirthDateError::NonexistentDay { year, month, day })
}

pub fn validate_birthdate(raw: &str, policy: &BirthDatePolicy, today: NaiveDate) -> bool {
    policy.check(raw, today).is_ok()
}
