use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{MailConfig, SecretKey, SecurityConfig};
use crate::credentials::TokenSigner;
use crate::identity::Cpf;
use crate::mail::MemoryMailer;
use crate::registry::MemoryRegistry;
use crate::workflows::accounts::{AccountService, RegistrationForm};

pub(super) const PROFESSOR_CPF: &str = "52998224725";
pub(super) const PROFESSOR_EMAIL: &str = "ana@escola.br";
pub(super) const PASSWORD: &str = "segredo123";

pub(super) type Service = AccountService<MemoryRegistry, MemoryMailer>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 20, 14, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn signer() -> Arc<TokenSigner> {
    Arc::new(TokenSigner::new(&SecurityConfig::with_secret(
        SecretKey::new("account-tests"),
    )))
}

pub(super) fn build_service() -> (Service, Arc<MemoryRegistry>, Arc<MemoryMailer>) {
    let store = Arc::new(MemoryRegistry::new());
    let mailer = Arc::new(MemoryMailer::new());
    let service = AccountService::new(
        store.clone(),
        mailer.clone(),
        signer(),
        MailConfig::default(),
    );
    (service, store, mailer)
}

pub(super) fn registration_form() -> RegistrationForm {
    RegistrationForm {
        cpf: "529.982.247-25".to_string(),
        name: "  Ana   Souza ".to_string(),
        password: PASSWORD.to_string(),
        confirmation: PASSWORD.to_string(),
    }
}

/// Pull the token out of the last link mailed to `recipient`.
pub(super) fn mailed_token(mailer: &MemoryMailer, recipient: &str) -> String {
    let message = mailer
        .sent_to(recipient)
        .pop()
        .expect("a message was mailed");
    message
        .text_body
        .lines()
        .find(|line| line.starts_with("http"))
        .and_then(|link| link.rsplit('/').next())
        .expect("mail carries a link")
        .to_string()
}

/// Service with one registered professor.
pub(super) fn registered() -> (Service, Arc<MemoryRegistry>, Arc<MemoryMailer>) {
    let (service, store, mailer) = build_service();
    service
        .request_registration(PROFESSOR_EMAIL, now())
        .expect("request");
    let token = mailed_token(&mailer, PROFESSOR_EMAIL);
    service
        .complete_registration(&token, registration_form(), now())
        .expect("registration");
    (service, store, mailer)
}

pub(super) fn professor_cpf() -> Cpf {
    Cpf::parse(PROFESSOR_CPF).expect("valid cpf")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
