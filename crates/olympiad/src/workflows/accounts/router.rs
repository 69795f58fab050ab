use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::mail::Mailer;
use crate::registry::RegistryStore;
use crate::workflows::bearer_token;

use super::service::{AccountError, AccountService, AccountView, PasswordForm, RegistrationForm};

#[derive(Debug, Deserialize)]
pub(crate) struct EmailRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    cpf: String,
    password: String,
}

/// Router exposing registration, login and password reset for professors.
pub fn account_router<S, M>(service: Arc<AccountService<S, M>>) -> Router
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route("/accounts/register", post(request_registration_handler::<S, M>))
        .route(
            "/accounts/register/:token",
            get(registration_email_handler::<S, M>).post(complete_registration_handler::<S, M>),
        )
        .route("/accounts/login", post(login_handler::<S, M>))
        .route("/accounts/me", get(me_handler::<S, M>))
        .route("/accounts/password", post(request_reset_handler::<S, M>))
        .route("/accounts/password/:token", post(reset_password_handler::<S, M>))
        .with_state(service)
}

pub(crate) async fn request_registration_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    Json(request): Json<EmailRequest>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    match service.request_registration(&request.email, Utc::now()) {
        Ok(()) => accepted(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn registration_email_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    Path(token): Path<String>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    match service.registration_email(&token, Utc::now()) {
        Some(email) => (StatusCode::OK, Json(json!({ "email": email }))).into_response(),
        None => error_response(AccountError::InvalidToken),
    }
}

pub(crate) async fn complete_registration_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    Path(token): Path<String>,
    Json(form): Json<RegistrationForm>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let outcome =
        run_blocking(move || service.complete_registration(&token, form, Utc::now())).await;
    match outcome {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn login_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    Json(request): Json<LoginRequest>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let outcome =
        run_blocking(move || service.login(&request.cpf, &request.password, Utc::now())).await;
    match outcome {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn me_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    headers: HeaderMap,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let professor = bearer_token(&headers).and_then(|token| service.authenticate(token, Utc::now()));
    match professor {
        Some(professor) => (StatusCode::OK, Json(AccountView::from(professor))).into_response(),
        None => unauthorized(),
    }
}

pub(crate) async fn request_reset_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    Json(request): Json<EmailRequest>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    match service.request_password_reset(&request.email, Utc::now()) {
        Ok(()) => accepted(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reset_password_handler<S, M>(
    State(service): State<Arc<AccountService<S, M>>>,
    Path(token): Path<String>,
    Json(form): Json<PasswordForm>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let outcome = run_blocking(move || service.reset_password(&token, form, Utc::now())).await;
    match outcome {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

/// Argon2 hashing and verification are CPU-bound, so they run on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, AccountError>
where
    F: FnOnce() -> Result<T, AccountError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AccountError::Worker(err.to_string()))?
}

fn accepted() -> Response {
    let payload = json!({
        "status": "if the address can receive it, a message is on its way",
    });
    (StatusCode::ACCEPTED, Json(payload)).into_response()
}

pub(crate) fn unauthorized() -> Response {
    let payload = json!({ "error": "authentication required" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn error_response(err: AccountError) -> Response {
    match err {
        AccountError::Invalid(errors) => {
            let payload = json!({
                "error": "validation failed",
                "fields": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        AccountError::InvalidToken => {
            let payload = json!({ "error": "link is invalid or has expired" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        AccountError::InvalidCredentials => {
            let payload = json!({ "error": "invalid CPF or password" });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        }
        other => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
