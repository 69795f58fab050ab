//! Read-only aggregations over a professor's enrollments.

mod extract;
mod views;

pub use extract::{compute_extract, ExtractReport, SchoolExtract, Tally};
pub use views::{enrollment_listing, student_listing, EnrollmentRow};
