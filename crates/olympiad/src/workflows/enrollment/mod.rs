//! Student enrollment: admission under the per-level quota, professor-facing
//! student management and the reports built on top of it.

pub mod admission;
pub mod report;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use admission::{
    AdmissionCandidate, AdmissionEngine, AdmissionError, AdmissionOutcome, AdmissionPolicy,
    MedalistExemption, QuotaBreach, TransferRequest,
};
pub use report::{compute_extract, EnrollmentRow, ExtractReport, SchoolExtract, Tally};
pub use router::enrollment_router;
pub use service::{
    EditionOverview, EnrollmentEditForm, EnrollmentService, EnrollmentServiceError,
    ReenrollmentForm, StudentEditForm, StudentRegistrationForm,
};
