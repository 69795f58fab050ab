use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::identity::Cpf;
use crate::registry::{
    Edition, Enrollment, EnrollmentRepository, Level, RepositoryError, SchoolId, SchoolRepository,
};

/// Seats counted for one bucket, with the share held by prior-edition medalists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub enrolled: u32,
    pub medalists: u32,
}

impl Tally {
    /// Seats that count against the quota.
    pub fn quota_seats(&self) -> u32 {
        self.enrolled - self.medalists
    }

    fn record(&mut self, medalist: bool) {
        self.enrolled += 1;
        if medalist {
            self.medalists += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolExtract {
    pub school: SchoolId,
    pub name: String,
    pub levels: BTreeMap<Level, Tally>,
    pub total: Tally,
}

/// A professor's enrollments for one edition, grouped by school and level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub professor: Cpf,
    pub edition: Edition,
    pub schools: Vec<SchoolExtract>,
    pub levels: BTreeMap<Level, Tally>,
    pub total: Tally,
    pub names: BTreeMap<SchoolId, String>,
}

impl ExtractReport {
    pub fn school(&self, id: &SchoolId) -> Option<&SchoolExtract> {
        self.schools.iter().find(|extract| &extract.school == id)
    }
}

pub fn compute_extract<S>(
    store: &S,
    professor: &Cpf,
    edition: Edition,
) -> Result<ExtractReport, RepositoryError>
where
    S: EnrollmentRepository + SchoolRepository + ?Sized,
{
    let enrollments = store.enrollments_of_professor(professor, edition)?;
    let medalists = store.awarded_students(edition.previous())?;
    let mut names = BTreeMap::new();
    for school in enrollments.iter().map(|e| &e.school).collect::<BTreeSet<_>>() {
        let name = store
            .school(school)?
            .map(|record| record.name)
            .unwrap_or_else(|| school.to_string());
        names.insert(school.clone(), name);
    }
    Ok(tally(professor, edition, &enrollments, &medalists, names))
}

fn empty_levels() -> BTreeMap<Level, Tally> {
    Level::ALL.into_iter().map(|level| (level, Tally::default())).collect()
}

pub(crate) fn tally(
    professor: &Cpf,
    edition: Edition,
    enrollments: &[Enrollment],
    medalists: &BTreeSet<Cpf>,
    names: BTreeMap<SchoolId, String>,
) -> ExtractReport {
    let mut by_school: BTreeMap<SchoolId, SchoolExtract> = BTreeMap::new();
    let mut levels = empty_levels();
    let mut total = Tally::default();

    for enrollment in enrollments {
        let medalist = medalists.contains(&enrollment.student);
        let extract = by_school
            .entry(enrollment.school.clone())
            .or_insert_with(|| SchoolExtract {
                school: enrollment.school.clone(),
                name: names
                    .get(&enrollment.school)
                    .cloned()
                    .unwrap_or_else(|| enrollment.school.to_string()),
                levels: empty_levels(),
                total: Tally::default(),
            });
        extract
            .levels
            .entry(enrollment.level)
            .or_default()
            .record(medalist);
        extract.total.record(medalist);
        levels.entry(enrollment.level).or_default().record(medalist);
        total.record(medalist);
    }

    ExtractReport {
        professor: professor.clone(),
        edition,
        schools: by_school.into_values().collect(),
        levels,
        total,
        names,
    }
}
