use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MailConfig;
use crate::credentials::{
    hash_password, verify_password, CredentialError, TokenClaims, TokenSigner,
};
use crate::forms::{fields, FormCheck, FormErrors};
use crate::identity::Cpf;
use crate::mail::{templates, Mailer};
use crate::registry::{Professor, RegistryStore, RepositoryError};

/// Completion form for a verified registration link.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistrationForm {
    pub cpf: String,
    pub name: String,
    pub password: String,
    pub confirmation: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PasswordForm {
    pub password: String,
    pub confirmation: String,
}

/// Authenticated professor session handed back by [`AccountService::login`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub professor: Cpf,
    pub name: String,
    pub expires_at: DateTime<Utc>,
}

/// Public view of a professor account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub cpf: Cpf,
    pub name: String,
    pub email: String,
}

impl From<Professor> for AccountView {
    fn from(professor: Professor) -> Self {
        Self {
            cpf: professor.id,
            name: professor.name,
            email: professor.email,
        }
    }
}

/// Registration, login and password-reset workflows for professors.
pub struct AccountService<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    signer: Arc<TokenSigner>,
    mail: MailConfig,
}

impl<S, M> AccountService<S, M>
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>, signer: Arc<TokenSigner>, mail: MailConfig) -> Self {
        Self {
            store,
            mailer,
            signer,
            mail,
        }
    }

    /// Mail a registration link unless the address is already on file. Both
    /// paths look identical to the caller.
    pub fn request_registration(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let email = fields::email(email).map_err(|err| FormErrors::single("email", err.0))?;
        if self.email_on_file(&email)? {
            debug!("registration requested for an address already on file");
            return Ok(());
        }

        let token = self
            .signer
            .issue_at(TokenClaims::Registration { email: email.clone() }, now)?;
        self.mailer
            .dispatch(templates::registration_request(&self.mail, &email, &token));
        Ok(())
    }

    /// Address a registration token vouches for.
    pub fn registration_email(&self, token: &str, now: DateTime<Utc>) -> Option<String> {
        self.signer.verify_registration(token, now)
    }

    pub fn complete_registration(
        &self,
        token: &str,
        form: RegistrationForm,
        now: DateTime<Utc>,
    ) -> Result<AccountView, AccountError> {
        let email = self
            .registration_email(token, now)
            .ok_or(AccountError::InvalidToken)?;

        let mut check = FormCheck::new();
        let cpf = check.field("cpf", &form.cpf, fields::cpf);
        let name = check.field("name", &form.name, fields::name);
        let password = check.check(
            "password",
            fields::password_pair(&form.password, &form.confirmation),
        );

        if let Some(cpf) = &cpf {
            if self.identity_on_file(cpf)? {
                check.reject("cpf", "CPF already registered");
            }
        }
        if self.email_on_file(&email)? {
            check.reject("email", "e-mail already registered");
        }

        let (cpf, name, password) = check.finish(move || Some((cpf?, name?, password?)))?;
        let professor = Professor {
            id: cpf,
            name,
            email,
            password_hash: hash_password(&password)?,
        };

        let stored = self
            .store
            .insert_professor(professor)
            .map_err(|err| match err {
                RepositoryError::IdentityInUse | RepositoryError::Conflict => {
                    AccountError::Invalid(FormErrors::single("cpf", "CPF already registered"))
                }
                RepositoryError::EmailInUse => {
                    AccountError::Invalid(FormErrors::single("email", "e-mail already registered"))
                }
                other => AccountError::Repository(other),
            })?;
        info!(professor = %stored.id, "professor account created");
        Ok(stored.into())
    }

    /// Unknown account and wrong password are indistinguishable.
    pub fn login(
        &self,
        cpf: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AccountError> {
        let professor = match Cpf::parse(cpf) {
            Ok(id) => self.store.professor(&id)?,
            Err(_) => None,
        };

        let Some(professor) = professor else {
            let _ = verify_password(password, decoy_hash());
            debug!("login rejected");
            return Err(AccountError::InvalidCredentials);
        };
        if !verify_password(password, &professor.password_hash) {
            debug!("login rejected");
            return Err(AccountError::InvalidCredentials);
        }

        let claims = TokenClaims::Session {
            professor: professor.id.clone(),
        };
        let expires_at = self.signer.expires_at(&claims, now)?;
        let token = self.signer.issue_at(claims, now)?;
        info!(professor = %professor.id, "professor logged in");
        Ok(Session {
            token,
            professor: professor.id,
            name: professor.name,
            expires_at,
        })
    }

    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Option<Professor> {
        let id = self.signer.verify_session(token, now)?;
        self.store.professor(&id).ok().flatten()
    }

    /// Mail a reset link to a known professor; silent for unknown addresses.
    pub fn request_password_reset(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let email = fields::email(email).map_err(|err| FormErrors::single("email", err.0))?;
        let Some(professor) = self.store.professor_by_email(&email)? else {
            debug!("password reset requested for an unknown address");
            return Ok(());
        };

        let token = self.signer.issue_at(
            TokenClaims::PasswordReset {
                professor: professor.id.clone(),
            },
            now,
        )?;
        self.mailer
            .dispatch(templates::password_reset(&self.mail, &professor, &token));
        Ok(())
    }

    pub fn reset_password(
        &self,
        token: &str,
        form: PasswordForm,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let id = self
            .signer
            .verify_password_reset(token, now)
            .ok_or(AccountError::InvalidToken)?;
        let mut professor = self
            .store
            .professor(&id)?
            .ok_or(AccountError::InvalidToken)?;

        let mut check = FormCheck::new();
        let password = check.check(
            "password",
            fields::password_pair(&form.password, &form.confirmation),
        );
        let password = check.finish(move || password)?;

        professor.password_hash = hash_password(&password)?;
        self.store.update_professor(professor)?;
        info!(professor = %id, "password reset");
        Ok(())
    }

    fn email_on_file(&self, email: &str) -> Result<bool, RepositoryError> {
        Ok(self.store.professor_by_email(email)?.is_some()
            || self.store.student_by_email(email)?.is_some())
    }

    fn identity_on_file(&self, cpf: &Cpf) -> Result<bool, RepositoryError> {
        Ok(self.store.professor(cpf)?.is_some() || self.store.student(cpf)?.is_some())
    }
}

/// Hash checked when the account does not exist, so both rejections cost the same.
fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("decoy-password").unwrap_or_default())
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Invalid(#[from] FormErrors),
    #[error("token is invalid or expired")]
    InvalidToken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("password worker failed: {0}")]
    Worker(String),
}
