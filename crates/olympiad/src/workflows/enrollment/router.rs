use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::identity::Cpf;
use crate::mail::Mailer;
use crate::registry::RegistryStore;
use crate::workflows::accounts::router::unauthorized;
use crate::workflows::bearer_token;

use super::admission::AdmissionOutcome;
use super::service::{
    EnrollmentEditForm, EnrollmentService, EnrollmentServiceError, ReenrollmentForm,
    StudentEditForm, StudentRegistrationForm,
};

type Shared<S, M> = State<Arc<EnrollmentService<S, M>>>;

/// Router for the professor dashboard. Everything except the edition banner,
/// the school table and the confirmation link needs a session bearer token.
pub fn enrollment_router<S, M>(service: Arc<EnrollmentService<S, M>>) -> Router
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    Router::new()
        .route("/enrollments/edition", get(edition_handler::<S, M>))
        .route("/enrollments/schools", get(schools_handler::<S, M>))
        .route(
            "/enrollments/confirm/:token",
            post(confirm_handler::<S, M>),
        )
        .route(
            "/enrollments/students",
            get(students_handler::<S, M>).post(register_student_handler::<S, M>),
        )
        .route(
            "/enrollments/students/:cpf",
            put(edit_student_handler::<S, M>),
        )
        .route("/enrollments", get(enrollments_handler::<S, M>))
        .route("/enrollments/extract", get(extract_handler::<S, M>))
        .route(
            "/enrollments/reenrollments",
            post(reenrollment_handler::<S, M>),
        )
        .route(
            "/enrollments/students/:cpf/enrollment",
            put(edit_enrollment_handler::<S, M>),
        )
        .with_state(service)
}

pub(crate) async fn edition_handler<S, M>(State(service): Shared<S, M>) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let overview = service.overview(Utc::now().date_naive());
    (StatusCode::OK, Json(overview)).into_response()
}

pub(crate) async fn schools_handler<S, M>(State(service): Shared<S, M>) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    match service.schools() {
        Ok(schools) => (StatusCode::OK, Json(schools)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn confirm_handler<S, M>(
    State(service): Shared<S, M>,
    Path(token): Path<String>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    match service.confirm_enrollment(&token, Utc::now()) {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn students_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    match service.students(&professor) {
        Ok(students) => (StatusCode::OK, Json(students)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn register_student_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
    Json(form): Json<StudentRegistrationForm>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    match service.register_student(&professor, form, Utc::now()) {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_student_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
    Path(student): Path<String>,
    Json(form): Json<StudentEditForm>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    let Ok(student) = Cpf::parse(&student) else {
        return error_response(EnrollmentServiceError::NotFound);
    };
    match service.edit_student(&professor, &student, form, Utc::now()) {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn enrollments_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    match service.enrollments(&professor) {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_enrollment_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
    Path(student): Path<String>,
    Json(form): Json<EnrollmentEditForm>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    let Ok(student) = Cpf::parse(&student) else {
        return error_response(EnrollmentServiceError::NotFound);
    };
    match service.edit_enrollment(&professor, &student, form) {
        Ok(AdmissionOutcome::Admitted) => StatusCode::NO_CONTENT.into_response(),
        Ok(outcome) => outcome_response(outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn extract_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    match service.extract(&professor) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reenrollment_handler<S, M>(
    State(service): Shared<S, M>,
    headers: HeaderMap,
    Json(form): Json<ReenrollmentForm>,
) -> Response
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    let Some(professor) = session(&service, &headers) else {
        return unauthorized();
    };
    match service.request_reenrollment(&professor, form, Utc::now()) {
        Ok(()) => {
            let payload = json!({ "status": "confirmation sent to the student" });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn session<S, M>(service: &EnrollmentService<S, M>, headers: &HeaderMap) -> Option<Cpf>
where
    S: RegistryStore + 'static,
    M: Mailer + 'static,
{
    bearer_token(headers).and_then(|token| service.authenticate(token, Utc::now()))
}

fn outcome_response(outcome: AdmissionOutcome) -> Response {
    let status = match &outcome {
        AdmissionOutcome::Admitted => StatusCode::CREATED,
        AdmissionOutcome::AlreadyEnrolled => StatusCode::OK,
        AdmissionOutcome::QuotaExceeded(_) => StatusCode::CONFLICT,
    };
    (status, Json(outcome)).into_response()
}

fn error_response(err: EnrollmentServiceError) -> Response {
    match err {
        EnrollmentServiceError::Invalid(errors) => {
            let payload = json!({
                "error": "validation failed",
                "fields": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        EnrollmentServiceError::NotFound => {
            let payload = json!({ "error": "record not found" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        EnrollmentServiceError::InvalidToken => {
            let payload = json!({ "error": "link is invalid or has expired" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        other => {
            tracing::error!(error = %other, "enrollment request failed");
            let payload = json!({ "error": "internal error" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
