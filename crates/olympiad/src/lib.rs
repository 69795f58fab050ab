//! Registration core for the state mathematics olympiad: identity validators,
//! professor accounts, quota-bound student admission and enrollment reports.

pub mod config;
pub mod credentials;
pub mod error;
pub mod forms;
pub mod identity;
pub mod mail;
pub mod registry;
pub mod telemetry;
pub mod workflows;

pub use credentials::{TokenClaims, TokenSigner};
pub use identity::{format_cpf, validate_birthdate, validate_cpf, CpfStyle};
pub use workflows::enrollment::{
    compute_extract, AdmissionCandidate, AdmissionEngine, AdmissionOutcome, ExtractReport,
};
