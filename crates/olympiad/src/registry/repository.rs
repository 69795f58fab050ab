use std::collections::BTreeSet;

use crate::identity::Cpf;

use super::domain::{
    Award, Edition, Enrollment, EnrollmentKey, Professor, School, SchoolId, Student,
};

/// Error enumeration for record store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("identifier already belongs to another professor or student")]
    IdentityInUse,
    #[error("e-mail already belongs to another professor or student")]
    EmailInUse,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub trait ProfessorRepository: Send + Sync {
    fn insert_professor(&self, professor: Professor) -> Result<Professor, RepositoryError>;
    fn update_professor(&self, professor: Professor) -> Result<(), RepositoryError>;
    fn professor(&self, id: &Cpf) -> Result<Option<Professor>, RepositoryError>;
    fn professor_by_email(&self, email: &str) -> Result<Option<Professor>, RepositoryError>;
}

pub trait StudentRepository: Send + Sync {
    fn student(&self, id: &Cpf) -> Result<Option<Student>, RepositoryError>;
    fn student_by_email(&self, email: &str) -> Result<Option<Student>, RepositoryError>;
    /// Overwrite the student stored under `previous`; a changed id re-points its enrollments.
    fn update_student(&self, previous: &Cpf, student: Student) -> Result<(), RepositoryError>;
}

pub trait SchoolRepository: Send + Sync {
    fn school(&self, id: &SchoolId) -> Result<Option<School>, RepositoryError>;
    fn schools(&self) -> Result<Vec<School>, RepositoryError>;
    fn upsert_school(&self, school: School) -> Result<(), RepositoryError>;
}

pub trait EnrollmentRepository: Send + Sync {
    fn enrollments_at(
        &self,
        school: &SchoolId,
        edition: Edition,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    fn enrollments_of_professor(
        &self,
        professor: &Cpf,
        edition: Edition,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    fn enrollments_of_student(&self, student: &Cpf) -> Result<Vec<Enrollment>, RepositoryError>;
    /// Students holding any award other than [`Award::None`] in `edition`.
    fn awarded_students(&self, edition: Edition) -> Result<BTreeSet<Cpf>, RepositoryError>;
    fn contains(&self, key: &EnrollmentKey) -> Result<bool, RepositoryError>;
    /// Insert the student when new and the enrollment, as one unit.
    fn admit(&self, student: Student, enrollment: Enrollment) -> Result<(), RepositoryError>;
    fn replace_enrollment(
        &self,
        previous: &EnrollmentKey,
        enrollment: Enrollment,
    ) -> Result<(), RepositoryError>;
    fn record_award(&self, key: &EnrollmentKey, award: Award) -> Result<(), RepositoryError>;
}

/// Everything the workflows need from the record store.
pub trait RegistryStore:
    ProfessorRepository + StudentRepository + SchoolRepository + EnrollmentRepository
{
}

impl<T> RegistryStore for T where
    T: ProfessorRepository + StudentRepository + SchoolRepository + EnrollmentRepository
{
}
