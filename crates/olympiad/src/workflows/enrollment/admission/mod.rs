mod config;
mod locks;
mod policy;

pub use config::{AdmissionPolicy, MedalistExemption};
pub use locks::AdmissionLocks;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::identity::{normalize_note, Cpf};
use crate::registry::{
    Edition, Enrollment, EnrollmentKey, Level, QuotaKey, RegistryStore, RepositoryError, SchoolId,
    Student,
};

use super::report::{compute_extract, ExtractReport};
use policy::{counted_seats, decide, SeatDecision};

/// A proposed enrollment, already validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionCandidate {
    pub student: Student,
    pub professor: Cpf,
    pub school: SchoolId,
    pub edition: Edition,
    pub level: Level,
    pub special_needs: String,
}

impl AdmissionCandidate {
    fn key(&self) -> EnrollmentKey {
        EnrollmentKey {
            student: self.student.id.clone(),
            professor: self.professor.clone(),
            school: self.school.clone(),
            edition: self.edition,
        }
    }
}

/// Where an existing enrollment should move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub school: SchoolId,
    pub level: Level,
    pub special_needs: String,
}

/// Details shown to the professor when a level is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaBreach {
    pub quota: u32,
    pub school: SchoolId,
    pub edition: Edition,
    pub level: Level,
    pub counted: u32,
    pub extract: ExtractReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdmissionOutcome {
    Admitted,
    QuotaExceeded(QuotaBreach),
    /// The exact (student, professor, school, edition) row already exists.
    AlreadyEnrolled,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Decides and commits enrollments under the per-level quota.
pub struct AdmissionEngine<S> {
    store: Arc<S>,
    policy: AdmissionPolicy,
    locks: AdmissionLocks,
}

impl<S> AdmissionEngine<S>
where
    S: RegistryStore + 'static,
{
    pub fn new(store: Arc<S>, policy: AdmissionPolicy) -> Self {
        Self {
            store,
            policy,
            locks: AdmissionLocks::new(),
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn try_admit(
        &self,
        candidate: AdmissionCandidate,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let quota_key = QuotaKey {
            school: candidate.school.clone(),
            edition: candidate.edition,
            level: candidate.level,
        };

        self.locks.with_key(&quota_key, || -> Result<_, AdmissionError> {
            let key = candidate.key();
            if self.store.contains(&key)? {
                debug!(
                    school = %key.school,
                    edition = %key.edition,
                    "duplicate enrollment absorbed"
                );
                return Ok(AdmissionOutcome::AlreadyEnrolled);
            }

            let medalists = self.medalists(candidate.edition)?;
            let existing = self
                .store
                .enrollments_at(&candidate.school, candidate.edition)?;
            let counted = counted_seats(&existing, candidate.level, &medalists, None);

            match decide(&self.policy, &candidate.student.id, &medalists, counted) {
                SeatDecision::Full { counted } => {
                    return self.breach(&candidate.professor, &quota_key, counted);
                }
                SeatDecision::Exempt => {
                    info!(
                        school = %candidate.school,
                        level = %candidate.level,
                        "medalist seated outside the quota"
                    );
                }
                SeatDecision::Available { .. } => {}
            }

            let enrollment = Enrollment {
                student: candidate.student.id.clone(),
                professor: candidate.professor.clone(),
                school: candidate.school.clone(),
                edition: candidate.edition,
                level: candidate.level,
                special_needs: normalize_note(&candidate.special_needs),
                award: Default::default(),
            };

            match self.store.admit(candidate.student.clone(), enrollment) {
                Ok(()) => {
                    info!(
                        school = %candidate.school,
                        edition = %candidate.edition,
                        level = %candidate.level,
                        counted,
                        "enrollment admitted"
                    );
                    Ok(AdmissionOutcome::Admitted)
                }
                Err(RepositoryError::Conflict) => Ok(AdmissionOutcome::AlreadyEnrolled),
                Err(err) => Err(err.into()),
            }
        })
    }

    /// Move an enrollment to another school or level, re-checking the target quota.
    pub fn try_transfer(
        &self,
        previous: &EnrollmentKey,
        request: TransferRequest,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let current = self
            .store
            .enrollments_of_student(&previous.student)?
            .into_iter()
            .find(|enrollment| &enrollment.key() == previous)
            .ok_or(RepositoryError::NotFound)?;

        let mut moved = current.clone();
        moved.school = request.school;
        moved.level = request.level;
        moved.special_needs = normalize_note(&request.special_needs);

        let source = current.quota_key();
        let target = moved.quota_key();

        if source == target {
            self.locks.with_key(&source, || {
                self.store.replace_enrollment(previous, moved.clone())?;
                Ok::<_, AdmissionError>(())
            })?;
            return Ok(AdmissionOutcome::Admitted);
        }

        self.locks.with_keys(&source, &target, || -> Result<_, AdmissionError> {
            let key = moved.key();
            if &key != previous && self.store.contains(&key)? {
                return Ok(AdmissionOutcome::AlreadyEnrolled);
            }

            let medalists = self.medalists(moved.edition)?;
            let existing = self.store.enrollments_at(&moved.school, moved.edition)?;
            let counted = counted_seats(&existing, moved.level, &medalists, Some(previous));

            if let SeatDecision::Full { counted } =
                decide(&self.policy, &moved.student, &medalists, counted)
            {
                return self.breach(&moved.professor, &target, counted);
            }

            match self.store.replace_enrollment(previous, moved.clone()) {
                Ok(()) => {
                    info!(
                        from_school = %source.school,
                        from_level = %source.level,
                        to_school = %target.school,
                        to_level = %target.level,
                        "enrollment transferred"
                    );
                    Ok(AdmissionOutcome::Admitted)
                }
                Err(RepositoryError::Conflict) => Ok(AdmissionOutcome::AlreadyEnrolled),
                Err(err) => Err(err.into()),
            }
        })
    }

    fn medalists(&self, edition: Edition) -> Result<BTreeSet<Cpf>, RepositoryError> {
        match self.policy.medalists {
            MedalistExemption::PriorEditionAwardees => {
                self.store.awarded_students(edition.previous())
            }
            MedalistExemption::Disabled => Ok(BTreeSet::new()),
        }
    }

    fn breach(
        &self,
        professor: &Cpf,
        key: &QuotaKey,
        counted: u32,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        info!(
            school = %key.school,
            edition = %key.edition,
            level = %key.level,
            counted,
            quota = self.policy.quota_per_level,
            "enrollment refused: quota exceeded"
        );
        let extract = compute_extract(self.store.as_ref(), professor, key.edition)?;
        Ok(AdmissionOutcome::QuotaExceeded(QuotaBreach {
            quota: self.policy.quota_per_level,
            school: key.school.clone(),
            edition: key.edition,
            level: key.level,
            counted,
            extract,
        }))
    }
}
