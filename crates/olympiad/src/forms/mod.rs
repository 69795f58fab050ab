//! Ordered form validation: each field runs through a pure validator and every
//! failure is collected before the form is rejected.

pub mod fields;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Why a single raw input was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Field-level messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} form field(s) invalid", .fields.len())]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }
}

/// Runs field validators in order and accumulates their failures.
#[derive(Debug, Default)]
pub struct FormCheck {
    errors: FormErrors,
}

impl FormCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T, F>(&mut self, name: &'static str, raw: &str, validator: F) -> Option<T>
    where
        F: FnOnce(&str) -> Result<T, ValidationError>,
    {
        self.check(name, validator(raw))
    }

    /// Record the outcome of a validator that needs more than one raw input.
    pub fn check<T>(&mut self, name: &'static str, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.add(name, err.0);
                None
            }
        }
    }

    /// Cross-field or store-backed rule that only applies once the field parsed.
    pub fn reject(&mut self, name: &'static str, message: impl Into<String>) {
        self.errors.add(name, message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Build the validated value when no field failed.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T, FormErrors> {
        if self.has_errors() {
            return Err(self.errors);
        }
        build().ok_or(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failure_in_field_order() {
        let mut form = FormCheck::new();
        let name = form.field("name", "  ", fields::name);
        let email = form.field("email", "not-an-address", fields::email);
        let level = form.field("level", "2", fields::level);

        let errors = form
            .finish(move || Some((name?, email?, level?)))
            .expect_err("two fields invalid");
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["email", "name"]);
        assert_eq!(errors.messages("level"), &[] as &[String]);
        assert_eq!(errors.to_string(), "2 form field(s) invalid");
    }

    #[test]
    fn builds_the_value_when_everything_passes() {
        let mut form = FormCheck::new();
        let name = form.field("name", " Ana   Souza ", fields::name);
        let level = form.field("level", "3", fields::level);
        let built = form.finish(move || Some((name?, level?))).expect("valid");
        assert_eq!(built.0, "Ana Souza");
        assert_eq!(built.1.number(), 3);
    }

    #[test]
    fn rejected_rules_fail_an_otherwise_valid_form() {
        let mut form = FormCheck::new();
        let email = form.field("email", "ana@escola.br", fields::email);
        form.reject("email", "already registered");
        let errors = form.finish(move || email).expect_err("rejected");
        assert_eq!(errors.messages("email"), &["already registered".to_string()]);
    }

    #[test]
    fn errors_serialize_as_a_field_map() {
        let errors = FormErrors::single("cpf", "invalid CPF");
        assert_eq!(
            serde_json::to_value(&errors).expect("serialize"),
            serde_json::json!({ "cpf": ["invalid CPF"] })
        );
    }
}
