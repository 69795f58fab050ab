use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{EditionConfig, MailConfig};
use crate::credentials::{CredentialError, EnrollmentTicket, TokenClaims, TokenSigner};
use crate::forms::{fields, FormCheck, FormErrors};
use crate::identity::Cpf;
use crate::mail::{templates, Mailer};
use crate::registry::{
    Edition, EnrollmentKey, Professor, RegistryStore, RepositoryError, School, Student,
};
use crate::workflows::edition::{Countdown, EditionCalendar};

use super::admission::{
    AdmissionCandidate, AdmissionEngine, AdmissionError, AdmissionOutcome, AdmissionPolicy,
    TransferRequest,
};
use super::report::{
    compute_extract, enrollment_listing, student_listing, EnrollmentRow, ExtractReport,
};

/// New student plus the enrollment requested for them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StudentRegistrationForm {
    pub cpf: String,
    pub name: String,
    pub birth_date: String,
    pub email: String,
    pub school: String,
    pub level: String,
    #[serde(default)]
    pub special_needs: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StudentEditForm {
    pub cpf: String,
    pub name: String,
    pub birth_date: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnrollmentEditForm {
    pub school: String,
    pub level: String,
    #[serde(default)]
    pub special_needs: String,
}

/// Enroll a student from an earlier edition; the student confirms by e-mail.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReenrollmentForm {
    pub student: String,
    pub school: String,
    pub level: String,
    #[serde(default)]
    pub special_needs: String,
}

/// Dashboard header: the running edition and its countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditionOverview {
    pub edition: Edition,
    pub quota_per_level: u32,
    pub registration_open: bool,
    pub calendar: EditionCalendar,
    pub days_until: Countdown,
}

/// Professor-facing student registration, editing and reporting.
pub struct EnrollmentService<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    signer: Arc<TokenSigner>,
    engine: AdmissionEngine<S>,
    edition: EditionConfig,
    mail: MailConfig,
}

impl<S, M> EnrollmentService<S, M>
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    pub fn new(
        store: Arc<S>,
        mailer: Arc<M>,
        signer: Arc<TokenSigner>,
        edition: EditionConfig,
        mail: MailConfig,
    ) -> Self {
        let engine = AdmissionEngine::new(store.clone(), AdmissionPolicy::from_config(&edition));
        Self {
            store,
            mailer,
            signer,
            engine,
            edition,
            mail,
        }
    }

    pub fn engine(&self) -> &AdmissionEngine<S> {
        &self.engine
    }

    pub fn current_edition(&self) -> Edition {
        Edition(self.edition.year)
    }

    /// Professor behind a session token.
    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Option<Cpf> {
        self.signer.verify_session(token, now)
    }

    pub fn overview(&self, today: NaiveDate) -> EditionOverview {
        let calendar = self.edition.calendar.clone();
        EditionOverview {
            edition: self.current_edition(),
            quota_per_level: self.engine.policy().quota_per_level,
            registration_open: calendar.registration_open(today),
            days_until: calendar.days_until(today),
            calendar,
        }
    }

    /// School reference table ordered by city, then name.
    pub fn schools(&self) -> Result<Vec<School>, EnrollmentServiceError> {
        let mut schools = self.store.schools()?;
        schools.sort_by(|a, b| a.city.cmp(&b.city).then_with(|| a.name.cmp(&b.name)));
        Ok(schools)
    }

    pub fn register_student(
        &self,
        professor: &Cpf,
        form: StudentRegistrationForm,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, EnrollmentServiceError> {
        self.professor(professor)?;

        let mut check = FormCheck::new();
        let cpf = check.field("cpf", &form.cpf, fields::cpf);
        let name = check.field("name", &form.name, fields::name);
        let birth_date = check.field(
            "birth_date",
            &form.birth_date,
            fields::birth_date(self.edition.birth_years, now.date_naive()),
        );
        let email = check.field("email", &form.email, fields::email);
        let school = check.field("school", &form.school, fields::school_code);
        let level = check.field("level", &form.level, fields::level);
        let special_needs = check.field("special_needs", &form.special_needs, fields::note);

        // A student already on file may be enrolled again only under the same
        // identity, which lets an identical re-submission reach the engine.
        if let (Some(cpf), Some(email)) = (&cpf, &email) {
            let known = self.store.student(cpf)?;
            let same_student = known.as_ref().is_some_and(|s| &s.email == email);
            if !same_student && self.identity_on_file(cpf)? {
                check.reject("cpf", "CPF already registered");
            }
            if self
                .email_owner(email)?
                .is_some_and(|owner| !(same_student && &owner == cpf))
            {
                check.reject("email", "e-mail already registered");
            }
        }
        if let Some(school) = &school {
            if self.store.school(school)?.is_none() {
                check.reject("school", "unknown INEP code");
            }
        }

        let edition = self.current_edition();
        let professor = professor.clone();
        let candidate = check.finish(move || {
            Some(AdmissionCandidate {
                student: Student {
                    id: cpf?,
                    name: name?,
                    birth_date: birth_date?,
                    email: email?,
                },
                professor,
                school: school?,
                edition,
                level: level?,
                special_needs: special_needs?,
            })
        })?;

        Ok(self.engine.try_admit(candidate)?)
    }

    pub fn students(&self, professor: &Cpf) -> Result<Vec<Student>, EnrollmentServiceError> {
        self.professor(professor)?;
        Ok(student_listing(
            self.store.as_ref(),
            professor,
            self.current_edition(),
        )?)
    }

    pub fn enrollments(
        &self,
        professor: &Cpf,
    ) -> Result<Vec<EnrollmentRow>, EnrollmentServiceError> {
        self.professor(professor)?;
        Ok(enrollment_listing(
            self.store.as_ref(),
            professor,
            self.current_edition(),
        )?)
    }

    pub fn extract(&self, professor: &Cpf) -> Result<ExtractReport, EnrollmentServiceError> {
        self.professor(professor)?;
        Ok(compute_extract(
            self.store.as_ref(),
            professor,
            self.current_edition(),
        )?)
    }

    /// Correct a student's personal data. A changed CPF re-keys the student and
    /// every enrollment that points at it.
    pub fn edit_student(
        &self,
        professor: &Cpf,
        student: &Cpf,
        form: StudentEditForm,
        now: DateTime<Utc>,
    ) -> Result<Student, EnrollmentServiceError> {
        self.professor(professor)?;
        self.own_enrollment(professor, student)?;

        let mut check = FormCheck::new();
        let cpf = check.field("cpf", &form.cpf, fields::cpf);
        let name = check.field("name", &form.name, fields::name);
        let birth_date = check.field(
            "birth_date",
            &form.birth_date,
            fields::birth_date(self.edition.birth_years, now.date_naive()),
        );
        let email = check.field("email", &form.email, fields::email);

        if let Some(cpf) = &cpf {
            if cpf != student && self.identity_on_file(cpf)? {
                check.reject("cpf", "CPF already registered");
            }
        }
        if let Some(email) = &email {
            if self
                .email_owner(email)?
                .is_some_and(|owner| &owner != student)
            {
                check.reject("email", "e-mail already registered");
            }
        }

        let updated = check.finish(move || {
            Some(Student {
                id: cpf?,
                name: name?,
                birth_date: birth_date?,
                email: email?,
            })
        })?;

        self.store
            .update_student(student, updated.clone())
            .map_err(|err| match err {
                RepositoryError::IdentityInUse => EnrollmentServiceError::Invalid(
                    FormErrors::single("cpf", "CPF already registered"),
                ),
                RepositoryError::EmailInUse => EnrollmentServiceError::Invalid(
                    FormErrors::single("email", "e-mail already registered"),
                ),
                other => other.into(),
            })?;
        info!(professor = %professor, "student record updated");
        Ok(updated)
    }

    /// Change school, level or note of a current-edition enrollment.
    pub fn edit_enrollment(
        &self,
        professor: &Cpf,
        student: &Cpf,
        form: EnrollmentEditForm,
    ) -> Result<AdmissionOutcome, EnrollmentServiceError> {
        self.professor(professor)?;
        let key = self.own_enrollment(professor, student)?;

        let mut check = FormCheck::new();
        let school = check.field("school", &form.school, fields::school_code);
        let level = check.field("level", &form.level, fields::level);
        let special_needs = check.field("special_needs", &form.special_needs, fields::note);
        if let Some(school) = &school {
            if self.store.school(school)?.is_none() {
                check.reject("school", "unknown INEP code");
            }
        }

        let request = check.finish(move || {
            Some(TransferRequest {
                school: school?,
                level: level?,
                special_needs: special_needs?,
            })
        })?;
        Ok(self.engine.try_transfer(&key, request)?)
    }

    /// Mail a confirmation link to a student from an earlier edition.
    pub fn request_reenrollment(
        &self,
        professor: &Cpf,
        form: ReenrollmentForm,
        now: DateTime<Utc>,
    ) -> Result<(), EnrollmentServiceError> {
        let professor = self.professor(professor)?;
        let edition = self.current_edition();

        let mut check = FormCheck::new();
        let student_id = check.field("student", &form.student, fields::cpf);
        let school_id = check.field("school", &form.school, fields::school_code);
        let level = check.field("level", &form.level, fields::level);
        let special_needs = check.field("special_needs", &form.special_needs, fields::note);

        let mut student = None;
        if let Some(id) = &student_id {
            student = self.store.student(id)?;
            let history = self.store.enrollments_of_student(id)?;
            if student.is_none() || !history.iter().any(|e| e.edition < edition) {
                check.reject("student", "no enrollment from an earlier edition");
            }
        }
        let mut school = None;
        if let Some(id) = &school_id {
            school = self.store.school(id)?;
            if school.is_none() {
                check.reject("school", "unknown INEP code");
            }
        }
        if let (Some(student), Some(school)) = (&student_id, &school_id) {
            let key = EnrollmentKey {
                student: student.clone(),
                professor: professor.id.clone(),
                school: school.clone(),
                edition,
            };
            if self.store.contains(&key)? {
                check.reject("student", "already enrolled in this edition");
            }
        }

        let ticket = check.finish(move || {
            let student = student?;
            let school = school?;
            Some(EnrollmentTicket {
                professor: professor.id,
                professor_name: professor.name,
                student: student.id,
                student_name: student.name,
                birth_date: student.birth_date,
                student_email: student.email,
                school: school.id,
                school_name: school.name,
                level: level?,
                special_needs: special_needs?,
                edition,
            })
        })?;

        let token = self
            .signer
            .issue_at(TokenClaims::EnrollmentConfirmation(ticket.clone()), now)?;
        self.mailer
            .dispatch(templates::enrollment_confirmation(&self.mail, &ticket, &token));
        info!(school = %ticket.school, level = %ticket.level, "re-enrollment confirmation mailed");
        Ok(())
    }

    /// Materialise a re-enrollment the student confirmed.
    pub fn confirm_enrollment(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, EnrollmentServiceError> {
        let ticket = self
            .signer
            .verify_confirmation(token, now)
            .ok_or(EnrollmentServiceError::InvalidToken)?;
        self.professor(&ticket.professor)?;

        let student = match self.store.student(&ticket.student)? {
            Some(student) => student,
            None => Student {
                id: ticket.student.clone(),
                name: ticket.student_name.clone(),
                birth_date: ticket.birth_date,
                email: ticket.student_email.clone(),
            },
        };

        Ok(self.engine.try_admit(AdmissionCandidate {
            student,
            professor: ticket.professor,
            school: ticket.school,
            edition: ticket.edition,
            level: ticket.level,
            special_needs: ticket.special_needs,
        })?)
    }

    fn professor(&self, id: &Cpf) -> Result<Professor, EnrollmentServiceError> {
        self.store
            .professor(id)?
            .ok_or(EnrollmentServiceError::NotFound)
    }

    /// Key of `student`'s current-edition enrollment with `professor`.
    fn own_enrollment(
        &self,
        professor: &Cpf,
        student: &Cpf,
    ) -> Result<EnrollmentKey, EnrollmentServiceError> {
        let edition = self.current_edition();
        self.store
            .enrollments_of_student(student)?
            .into_iter()
            .filter(|e| &e.professor == professor && e.edition == edition)
            .map(|e| e.key())
            .min()
            .ok_or(EnrollmentServiceError::NotFound)
    }

    fn identity_on_file(&self, cpf: &Cpf) -> Result<bool, RepositoryError> {
        Ok(self.store.professor(cpf)?.is_some() || self.store.student(cpf)?.is_some())
    }

    /// Identifier of whoever holds `email`, professor or student.
    fn email_owner(&self, email: &str) -> Result<Option<Cpf>, RepositoryError> {
        if let Some(professor) = self.store.professor_by_email(email)? {
            return Ok(Some(professor.id));
        }
        Ok(self.store.student_by_email(email)?.map(|student| student.id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error(transparent)]
    Invalid(#[from] FormErrors),
    #[error("record not found")]
    NotFound,
    #[error("confirmation link is invalid or expired")]
    InvalidToken,
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
