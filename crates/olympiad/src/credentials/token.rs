use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::config::{SecretKey, SecurityConfig};
use crate::identity::{BirthDate, Cpf};
use crate::registry::{Edition, Level, SchoolId};

use super::CredentialError;

type HmacSha256 = Hmac<Sha256>;

/// Everything needed to materialise a re-enrollment once the student confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentTicket {
    pub professor: Cpf,
    pub professor_name: String,
    pub student: Cpf,
    pub student_name: String,
    pub birth_date: BirthDate,
    pub student_email: String,
    pub school: SchoolId,
    pub school_name: String,
    pub level: Level,
    pub special_needs: String,
    pub edition: Edition,
}

/// What a verified token vouches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum TokenClaims {
    Registration { email: String },
    PasswordReset { professor: Cpf },
    EnrollmentConfirmation(EnrollmentTicket),
    Session { professor: Cpf },
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    exp: i64,
    claims: TokenClaims,
}

/// Reasons a token is refused. Never leaves this module.
#[derive(Debug, thiserror::Error)]
enum TokenError {
    #[error("token is not two base64url segments")]
    Malformed,
    #[error("signature mismatch")]
    Signature,
    #[error("claims do not decode")]
    Claims,
    #[error("token expired at {0}")]
    Expired(i64),
}

/// Issues and verifies HMAC-SHA256 signed, self-expiring tokens.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    secret: SecretKey,
    token_ttl: Duration,
    confirmation_ttl: Duration,
    session_ttl: Duration,
}

impl TokenSigner {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            token_ttl: config.token_ttl,
            confirmation_ttl: config.confirmation_ttl,
            session_ttl: config.session_ttl,
        }
    }

    pub fn ttl_for(&self, claims: &TokenClaims) -> Duration {
        match claims {
            TokenClaims::Registration { .. } | TokenClaims::PasswordReset { .. } => self.token_ttl,
            TokenClaims::EnrollmentConfirmation(_) => self.confirmation_ttl,
            TokenClaims::Session { .. } => self.session_ttl,
        }
    }

    /// Instant a token for `claims` issued at `now` stops verifying.
    pub fn expires_at(
        &self,
        claims: &TokenClaims,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, CredentialError> {
        now.checked_add_signed(self.ttl_for(claims))
            .ok_or_else(|| CredentialError::Signing("token lifetime overflows the clock".to_string()))
    }

    pub fn issue_at(
        &self,
        claims: TokenClaims,
        now: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let exp = self.expires_at(&claims, now)?.timestamp();
        let payload = serde_json::to_vec(&Envelope { exp, claims })
            .map_err(|err| CredentialError::Signing(err.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes())?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    pub fn issue(&self, claims: TokenClaims) -> Result<String, CredentialError> {
        self.issue_at(claims, Utc::now())
    }

    pub fn issue_registration_token(&self, email: &str) -> Result<String, CredentialError> {
        self.issue(TokenClaims::Registration {
            email: email.to_string(),
        })
    }

    /// Verified claims, or `None` for any malformed, forged or expired token.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<TokenClaims> {
        match self.decode(token, now) {
            Ok(claims) => Some(claims),
            Err(reason) => {
                debug!(%reason, "token rejected");
                None
            }
        }
    }

    pub fn verify_token(&self, token: &str) -> Option<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_registration(&self, token: &str, now: DateTime<Utc>) -> Option<String> {
        match self.verify_at(token, now)? {
            TokenClaims::Registration { email } => Some(email),
            other => purpose_mismatch("registration", &other),
        }
    }

    pub fn verify_password_reset(&self, token: &str, now: DateTime<Utc>) -> Option<Cpf> {
        match self.verify_at(token, now)? {
            TokenClaims::PasswordReset { professor } => Some(professor),
            other => purpose_mismatch("password_reset", &other),
        }
    }

    pub fn verify_confirmation(&self, token: &str, now: DateTime<Utc>) -> Option<EnrollmentTicket> {
        match self.verify_at(token, now)? {
            TokenClaims::EnrollmentConfirmation(ticket) => Some(ticket),
            other => purpose_mismatch("enrollment_confirmation", &other),
        }
    }

    pub fn verify_session(&self, token: &str, now: DateTime<Utc>) -> Option<Cpf> {
        match self.verify_at(token, now)? {
            TokenClaims::Session { professor } => Some(professor),
            other => purpose_mismatch("session", &other),
        }
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        self.mac(payload.as_bytes())
            .map_err(|_| TokenError::Signature)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::Signature)?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|_| TokenError::Claims)?;
        if envelope.exp <= now.timestamp() {
            return Err(TokenError::Expired(envelope.exp));
        }
        Ok(envelope.claims)
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, CredentialError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|err| CredentialError::Signing(err.to_string()))?;
        mac.update(payload);
        Ok(mac)
    }
}

fn purpose_mismatch<T>(expected: &'static str, claims: &TokenClaims) -> Option<T> {
    let found = match claims {
        TokenClaims::Registration { .. } => "registration",
        TokenClaims::PasswordReset { .. } => "password_reset",
        TokenClaims::EnrollmentConfirmation(_) => "enrollment_confirmation",
        TokenClaims::Session { .. } => "session",
    };
    debug!(expected, found, "token rejected: purpose mismatch");
    None
}
