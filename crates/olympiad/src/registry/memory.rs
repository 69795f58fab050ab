use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::identity::Cpf;

use super::domain::{
    Award, Edition, Enrollment, EnrollmentKey, Professor, School, SchoolId, Student,
};
use super::repository::{
    EnrollmentRepository, ProfessorRepository, RepositoryError, SchoolRepository,
    StudentRepository,
};

#[derive(Debug, Default)]
struct Tables {
    professors: HashMap<Cpf, Professor>,
    students: HashMap<Cpf, Student>,
    schools: BTreeMap<SchoolId, School>,
    enrollments: BTreeMap<EnrollmentKey, Enrollment>,
}

impl Tables {
    fn identity_taken(&self, id: &Cpf) -> bool {
        self.professors.contains_key(id) || self.students.contains_key(id)
    }

    /// Whether `email` is held by anyone other than `owner`.
    fn email_taken(&self, email: &str, owner: Option<&Cpf>) -> bool {
        let professor = self
            .professors
            .values()
            .any(|p| p.email == email && Some(&p.id) != owner);
        let student = self
            .students
            .values()
            .any(|s| s.email == email && Some(&s.id) != owner);
        professor || student
    }
}

/// Mutex-guarded record store enforcing the registry's key and uniqueness rules.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schools(schools: impl IntoIterator<Item = School>) -> Self {
        let registry = Self::default();
        if let Ok(mut tables) = registry.tables.lock() {
            for school in schools {
                tables.schools.insert(school.id.clone(), school);
            }
        }
        registry
    }

    pub fn enrollment_count(&self) -> usize {
        self.lock().map(|tables| tables.enrollments.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("registry mutex poisoned".to_string()))
    }
}

impl ProfessorRepository for MemoryRegistry {
    fn insert_professor(&self, professor: Professor) -> Result<Professor, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.identity_taken(&professor.id) {
            return Err(RepositoryError::IdentityInUse);
        }
        if tables.email_taken(&professor.email, None) {
            return Err(RepositoryError::EmailInUse);
        }
        tables
            .professors
            .insert(professor.id.clone(), professor.clone());
        Ok(professor)
    }

    fn update_professor(&self, professor: Professor) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.professors.contains_key(&professor.id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.email_taken(&professor.email, Some(&professor.id)) {
            return Err(RepositoryError::EmailInUse);
        }
        tables.professors.insert(professor.id.clone(), professor);
        Ok(())
    }

    fn professor(&self, id: &Cpf) -> Result<Option<Professor>, RepositoryError> {
        Ok(self.lock()?.professors.get(id).cloned())
    }

    fn professor_by_email(&self, email: &str) -> Result<Option<Professor>, RepositoryError> {
        Ok(self
            .lock()?
            .professors
            .values()
            .find(|professor| professor.email == email)
            .cloned())
    }
}

impl StudentRepository for MemoryRegistry {
    fn student(&self, id: &Cpf) -> Result<Option<Student>, RepositoryError> {
        Ok(self.lock()?.students.get(id).cloned())
    }

    fn student_by_email(&self, email: &str) -> Result<Option<Student>, RepositoryError> {
        Ok(self
            .lock()?
            .students
            .values()
            .find(|student| student.email == email)
            .cloned())
    }

    fn update_student(&self, previous: &Cpf, student: Student) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.students.contains_key(previous) {
            return Err(RepositoryError::NotFound);
        }
        if &student.id != previous && tables.identity_taken(&student.id) {
            return Err(RepositoryError::IdentityInUse);
        }
        if tables.email_taken(&student.email, Some(previous)) {
            return Err(RepositoryError::EmailInUse);
        }

        if &student.id != previous {
            tables.students.remove(previous);
            let moved: Vec<EnrollmentKey> = tables
                .enrollments
                .keys()
                .filter(|key| &key.student == previous)
                .cloned()
                .collect();
            for key in moved {
                if let Some(mut enrollment) = tables.enrollments.remove(&key) {
                    enrollment.student = student.id.clone();
                    tables.enrollments.insert(enrollment.key(), enrollment);
                }
            }
        }
        tables.students.insert(student.id.clone(), student);
        Ok(())
    }
}

impl SchoolRepository for MemoryRegistry {
    fn school(&self, id: &SchoolId) -> Result<Option<School>, RepositoryError> {
        Ok(self.lock()?.schools.get(id).cloned())
    }

    fn schools(&self) -> Result<Vec<School>, RepositoryError> {
        Ok(self.lock()?.schools.values().cloned().collect())
    }

    fn upsert_school(&self, school: School) -> Result<(), RepositoryError> {
        self.lock()?.schools.insert(school.id.clone(), school);
        Ok(())
    }
}

impl EnrollmentRepository for MemoryRegistry {
    fn enrollments_at(
        &self,
        school: &SchoolId,
        edition: Edition,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .lock()?
            .enrollments
            .values()
            .filter(|e| &e.school == school && e.edition == edition)
            .cloned()
            .collect())
    }

    fn enrollments_of_professor(
        &self,
        professor: &Cpf,
        edition: Edition,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .lock()?
            .enrollments
            .values()
            .filter(|e| &e.professor == professor && e.edition == edition)
            .cloned()
            .collect())
    }

    fn enrollments_of_student(&self, student: &Cpf) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .lock()?
            .enrollments
            .values()
            .filter(|e| &e.student == student)
            .cloned()
            .collect())
    }

    fn awarded_students(&self, edition: Edition) -> Result<BTreeSet<Cpf>, RepositoryError> {
        Ok(self
            .lock()?
            .enrollments
            .values()
            .filter(|e| e.edition == edition && e.award.is_medal())
            .map(|e| e.student.clone())
            .collect())
    }

    fn contains(&self, key: &EnrollmentKey) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.enrollments.contains_key(key))
    }

    fn admit(&self, student: Student, enrollment: Enrollment) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let key = enrollment.key();
        if tables.enrollments.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        if !tables.schools.contains_key(&enrollment.school)
            || !tables.professors.contains_key(&enrollment.professor)
        {
            return Err(RepositoryError::NotFound);
        }

        if !tables.students.contains_key(&student.id) {
            if tables.professors.contains_key(&student.id) {
                return Err(RepositoryError::IdentityInUse);
            }
            if tables.email_taken(&student.email, None) {
                return Err(RepositoryError::EmailInUse);
            }
            tables.students.insert(student.id.clone(), student);
        }
        tables.enrollments.insert(key, enrollment);
        Ok(())
    }

    fn replace_enrollment(
        &self,
        previous: &EnrollmentKey,
        enrollment: Enrollment,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.enrollments.contains_key(previous) {
            return Err(RepositoryError::NotFound);
        }
        let key = enrollment.key();
        if &key != previous && tables.enrollments.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        if !tables.schools.contains_key(&enrollment.school) {
            return Err(RepositoryError::NotFound);
        }
        tables.enrollments.remove(previous);
        tables.enrollments.insert(key, enrollment);
        Ok(())
    }

    fn record_award(&self, key: &EnrollmentKey, award: Award) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let enrollment = tables
            .enrollments
            .get_mut(key)
            .ok_or(RepositoryError::NotFound)?;
        enrollment.award = award;
        Ok(())
    }
}
