//! Persistent records: professors, students, schools and enrollments.

pub mod domain;
pub mod memory;
pub mod repository;
pub mod schools;

pub use domain::{
    Award, Edition, Enrollment, EnrollmentKey, Level, LevelError, Professor, QuotaKey, School,
    SchoolId, SchoolIdError, Student,
};
pub use memory::MemoryRegistry;
pub use repository::{
    EnrollmentRepository, ProfessorRepository, RegistryStore, RepositoryError, SchoolRepository,
    StudentRepository,
};
pub use schools::{SchoolImportError, SchoolImporter};
