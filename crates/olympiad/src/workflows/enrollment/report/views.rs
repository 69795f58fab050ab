use std::collections::BTreeMap;

use serde::Serialize;

use crate::identity::{BirthDate, Cpf};
use crate::registry::{
    Award, Edition, EnrollmentRepository, Level, RepositoryError, SchoolId, SchoolRepository,
    Student, StudentRepository,
};

/// One line of a professor's enrollment listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRow {
    pub student: Cpf,
    pub student_name: String,
    pub birth_date: BirthDate,
    pub level: Level,
    pub special_needs: String,
    pub school: SchoolId,
    pub school_name: String,
    pub award: Award,
}

/// Enrollments of `professor` in `edition`, ordered by level then student name.
pub fn enrollment_listing<S>(
    store: &S,
    professor: &Cpf,
    edition: Edition,
) -> Result<Vec<EnrollmentRow>, RepositoryError>
where
    S: EnrollmentRepository + StudentRepository + SchoolRepository + ?Sized,
{
    let mut school_names: BTreeMap<SchoolId, String> = BTreeMap::new();
    let mut rows = Vec::new();

    for enrollment in store.enrollments_of_professor(professor, edition)? {
        let student = store
            .student(&enrollment.student)?
            .ok_or(RepositoryError::NotFound)?;
        let school_name = match school_names.get(&enrollment.school) {
            Some(name) => name.clone(),
            None => {
                let name = store
                    .school(&enrollment.school)?
                    .map(|school| school.name)
                    .unwrap_or_else(|| enrollment.school.to_string());
                school_names.insert(enrollment.school.clone(), name.clone());
                name
            }
        };
        rows.push(EnrollmentRow {
            student: student.id,
            student_name: student.name,
            birth_date: student.birth_date,
            level: enrollment.level,
            special_needs: enrollment.special_needs,
            school: enrollment.school,
            school_name,
            award: enrollment.award,
        });
    }

    rows.sort_by(|a, b| {
        a.level
            .cmp(&b.level)
            .then_with(|| a.student_name.cmp(&b.student_name))
            .then_with(|| a.student.cmp(&b.student))
    });
    Ok(rows)
}

/// Distinct students `professor` enrolled in `edition`, ordered by name.
pub fn student_listing<S>(
    store: &S,
    professor: &Cpf,
    edition: Edition,
) -> Result<Vec<Student>, RepositoryError>
where
    S: EnrollmentRepository + StudentRepository + ?Sized,
{
    let mut students: BTreeMap<Cpf, Student> = BTreeMap::new();
    for enrollment in store.enrollments_of_professor(professor, edition)? {
        if students.contains_key(&enrollment.student) {
            continue;
        }
        if let Some(student) = store.student(&enrollment.student)? {
            students.insert(student.id.clone(), student);
        }
    }
    let mut students: Vec<Student> = students.into_values().collect();
    students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(students)
}
