//! Pure validators for the identifiers and free text a professor types into forms.

mod birthdate;
mod cpf;
mod text;

pub use birthdate::{
    days_in_month, is_leap_year, parse_birthdate, validate_birthdate, BirthDate, BirthDateError,
    BirthDatePolicy, DateStyle,
};
pub use cpf::{format_cpf, normalize_cpf, validate_cpf, Cpf, CpfError, CpfStyle};
pub use text::{canonical_email, collapse_whitespace, normalize_note, EmailError};
