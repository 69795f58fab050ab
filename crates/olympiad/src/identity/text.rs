use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("e-mail address is not well formed")]
pub struct EmailError;

/// Trimmed, lower-cased address used for every uniqueness lookup.
pub fn canonical_email(raw: &str) -> Result<String, EmailError> {
    let candidate = raw.trim().to_lowercase();
    if candidate.len() > 255 || !email_pattern().is_match(&candidate) {
        return Err(EmailError);
    }
    Ok(candidate)
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Free-text special-needs note: whitespace collapsed, diacritics stripped, lower-cased.
pub fn normalize_note(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    for c in raw.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        match transliterate(c) {
            Some(ascii) => folded.push_str(ascii),
            None => folded.push(c),
        }
    }
    collapse_whitespace(&folded)
}

/// Latin letters with no canonical decomposition, so NFD leaves them intact.
fn transliterate(c: char) -> Option<&'static str> {
    let ascii = match c {
        'ø' => "o",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'ł' => "l",
        'đ' | 'ð' => "d",
        'þ' => "th",
        'ı' => "i",
        'ħ' => "h",
        _ => return None,
    };
    Some(ascii)
}
