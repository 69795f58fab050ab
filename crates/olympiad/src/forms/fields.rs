use chrono::NaiveDate;

use crate::credentials::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::identity::{
    canonical_email, collapse_whitespace, normalize_note, BirthDate, BirthDateError,
    BirthDatePolicy, Cpf, CpfError,
};
use crate::registry::{Level, SchoolId};

use super::ValidationError;

const MAX_TEXT_LEN: usize = 255;

pub fn required(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::new("this field is required"));
    }
    Ok(value.to_string())
}

/// Person or school name with runs of whitespace collapsed.
pub fn name(raw: &str) -> Result<String, ValidationError> {
    let value = collapse_whitespace(&required(raw)?);
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::new(format!(
            "must have at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(value)
}

pub fn email(raw: &str) -> Result<String, ValidationError> {
    required(raw)?;
    canonical_email(raw).map_err(|err| ValidationError::new(err.to_string()))
}

pub fn cpf(raw: &str) -> Result<Cpf, ValidationError> {
    required(raw)?;
    Cpf::parse(raw).map_err(|err| {
        ValidationError::new(match err {
            CpfError::InvalidFormat => "CPF must have 11 digits, punctuation optional",
            CpfError::Blacklisted | CpfError::CheckDigitMismatch => "invalid CPF",
        })
    })
}

/// Validator bound to the edition's birth-year window and the current day.
pub fn birth_date(
    policy: BirthDatePolicy,
    today: NaiveDate,
) -> impl FnOnce(&str) -> Result<BirthDate, ValidationError> {
    move |raw| {
        required(raw)?;
        policy.check(raw, today).map_err(|err| {
            ValidationError::new(match err {
                BirthDateError::InvalidFormat => {
                    "date must look like dd/mm/yyyy or yyyy-mm-dd".to_string()
                }
                other => other.to_string(),
            })
        })
    }
}

pub fn level(raw: &str) -> Result<Level, ValidationError> {
    let value = required(raw)?;
    value
        .parse::<u8>()
        .ok()
        .and_then(|number| Level::try_from(number).ok())
        .ok_or_else(|| ValidationError::new("level must be 1, 2 or 3"))
}

pub fn school_code(raw: &str) -> Result<SchoolId, ValidationError> {
    required(raw)?;
    SchoolId::parse(raw).map_err(|_| ValidationError::new("INEP code must have 8 characters"))
}

/// Optional special-needs note, stored in normalised form.
pub fn note(raw: &str) -> Result<String, ValidationError> {
    let value = normalize_note(raw);
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::new(format!(
            "must have at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(value)
}

pub fn password_pair(password: &str, confirmation: &str) -> Result<String, ValidationError> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&length) {
        return Err(ValidationError::new(format!(
            "password must have between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
        )));
    }
    if password != confirmation {
        return Err(ValidationError::new("passwords do not match"));
    }
    Ok(password.to_string())
}
