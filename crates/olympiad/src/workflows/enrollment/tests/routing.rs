use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::registry::{Award, Edition, Level};
use crate::workflows::enrollment::enrollment_router;

#[tokio::test]
async fn dashboard_routes_require_a_session() {
    let fixture = build(10);
    let router = enrollment_router(fixture.service.clone());

    for uri in ["/enrollments", "/enrollments/students", "/enrollments/extract"] {
        let response = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = router
        .oneshot(authorized("GET", "/enrollments", "forged.token", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn edition_and_schools_are_public() {
    let fixture = build(10);
    let router = enrollment_router(fixture.service.clone());

    let response = router
        .clone()
        .oneshot(Request::get("/enrollments/edition").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["edition"], 2024);
    assert_eq!(body["quota_per_level"], 10);

    let response = router
        .oneshot(Request::get("/enrollments/schools").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body[0]["id"], OTHER_SCHOOL);
}

#[tokio::test]
async fn registering_a_student_over_http() {
    let fixture = build(10);
    let token = session_token(&fixture);
    let router = enrollment_router(fixture.service.clone());
    let form = serde_json::to_value(student_form(1, SCHOOL, Level::One)).expect("form");

    let response = router
        .clone()
        .oneshot(authorized("POST", "/enrollments/students", &token, Some(form.clone())))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(read_json_body(response).await["outcome"], "admitted");

    let response = router
        .clone()
        .oneshot(authorized("POST", "/enrollments/students", &token, Some(form)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["outcome"], "already_enrolled");

    let response = router
        .oneshot(authorized("GET", "/enrollments", &token, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let rows = read_json_body(response).await;
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["school_name"], "Colégio Estadual Central");
    assert_eq!(rows[0]["level"], 1);
}

#[tokio::test]
async fn a_full_level_answers_conflict_with_the_extract() {
    let fixture = build(1);
    seed(&fixture.store, 1, SCHOOL, CURRENT, Level::One, Award::None);
    let token = session_token(&fixture);
    let form = serde_json::to_value(student_form(2, SCHOOL, Level::One)).expect("form");

    let response = enrollment_router(fixture.service.clone())
        .oneshot(authorized("POST", "/enrollments/students", &token, Some(form)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["outcome"], "quota_exceeded");
    assert_eq!(body["quota"], 1);
    assert_eq!(body["extract"]["total"]["enrolled"], 1);
}

#[tokio::test]
async fn invalid_forms_are_unprocessable() {
    let fixture = build(10);
    let token = session_token(&fixture);
    let mut form = student_form(1, SCHOOL, Level::One);
    form.birth_date = "31/04/2010".to_string();

    let response = enrollment_router(fixture.service.clone())
        .oneshot(authorized(
            "POST",
            "/enrollments/students",
            &token,
            Some(serde_json::to_value(form).expect("form")),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["fields"]["birth_date"].is_array());
}

#[tokio::test]
async fn moving_an_enrollment_over_http() {
    let fixture = build(10);
    seed(&fixture.store, 1, SCHOOL, CURRENT, Level::One, Award::None);
    let token = session_token(&fixture);
    let router = enrollment_router(fixture.service.clone());
    let uri = format!("/enrollments/students/{}/enrollment", student_cpf(1).as_str());

    let response = router
        .clone()
        .oneshot(authorized(
            "PUT",
            &uri,
            &token,
            Some(json!({ "school": OTHER_SCHOOL, "level": "3" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(authorized(
            "PUT",
            "/enrollments/students/00000000000/enrollment",
            &token,
            Some(json!({ "school": OTHER_SCHOOL, "level": "3" })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reenrollment_round_trip_over_http() {
    let fixture = build(10);
    seed(&fixture.store, 5, SCHOOL, Edition(2023), Level::One, Award::Bronze);
    let token = session_token(&fixture);
    let router = enrollment_router(fixture.service.clone());

    let response = router
        .clone()
        .oneshot(authorized(
            "POST",
            "/enrollments/reenrollments",
            &token,
            Some(json!({
                "student": student_cpf(5).as_str(),
                "school": SCHOOL,
                "level": "2",
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let confirmation = mailed_token(&fixture.mailer, &student(5).email);
    let response = router
        .clone()
        .oneshot(
            Request::post(format!("/enrollments/confirm/{confirmation}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::post("/enrollments/confirm/not-a-token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
