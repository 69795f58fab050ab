use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{EditionConfig, MailConfig, SecretKey, SecurityConfig};
use crate::credentials::{TokenClaims, TokenSigner};
use crate::identity::{parse_birthdate, Cpf};
use crate::mail::MemoryMailer;
use crate::registry::{
    Award, Edition, Enrollment, EnrollmentRepository, Level, MemoryRegistry, Professor,
    ProfessorRepository, School, SchoolId, Student,
};
use crate::workflows::enrollment::{EnrollmentService, StudentRegistrationForm};

pub(super) const PROFESSOR_CPF: &str = "52998224725";
pub(super) const SCHOOL: &str = "52012345";
pub(super) const OTHER_SCHOOL: &str = "52098765";
pub(super) const CURRENT: Edition = Edition(2024);

pub(super) type Service = EnrollmentService<MemoryRegistry, MemoryMailer>;

pub(super) struct Fixture {
    pub service: Arc<Service>,
    pub store: Arc<MemoryRegistry>,
    pub mailer: Arc<MemoryMailer>,
    pub signer: Arc<TokenSigner>,
}

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 20, 14, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn professor_cpf() -> Cpf {
    Cpf::parse(PROFESSOR_CPF).expect("valid cpf")
}

pub(super) fn school_id(code: &str) -> SchoolId {
    SchoolId::parse(code).expect("valid inep")
}

fn school(code: &str, name: &str, city: &str) -> School {
    School {
        id: school_id(code),
        name: name.to_string(),
        city: city.to_string(),
        zone: "urbana".to_string(),
        tier: "estadual".to_string(),
        code: "5208707".to_string(),
        phone: None,
        latitude: None,
        longitude: None,
    }
}

/// Service over two schools and one registered professor.
pub(super) fn build(quota_per_level: u32) -> Fixture {
    build_with(EditionConfig {
        quota_per_level,
        ..EditionConfig::default()
    })
}

pub(super) fn build_with(edition: EditionConfig) -> Fixture {
    let store = Arc::new(MemoryRegistry::with_schools([
        school(SCHOOL, "Colégio Estadual Central", "Goiânia"),
        school(OTHER_SCHOOL, "Escola Municipal Aurora", "Anápolis"),
    ]));
    store
        .insert_professor(Professor {
            id: professor_cpf(),
            name: "Ana Souza".to_string(),
            email: "ana@escola.br".to_string(),
            password_hash: String::new(),
        })
        .expect("professor");

    let mailer = Arc::new(MemoryMailer::new());
    let signer = Arc::new(TokenSigner::new(&SecurityConfig::with_secret(
        SecretKey::new("enrollment-tests"),
    )));
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        mailer.clone(),
        signer.clone(),
        edition,
        MailConfig::default(),
    ));
    Fixture {
        service,
        store,
        mailer,
        signer,
    }
}

/// Valid CPF derived from a small number, distinct for each `n`.
pub(super) fn student_cpf(n: u32) -> Cpf {
    let base = 100_000_000 + n * 7_919;
    let mut digits: Vec<u32> = base
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    for weight_start in [10, 11] {
        let sum: u32 = digits
            .iter()
            .zip((2..=weight_start).rev())
            .map(|(digit, weight)| digit * weight)
            .sum();
        let rest = sum % 11;
        digits.push(if rest < 2 { 0 } else { 11 - rest });
    }
    let raw: String = digits.iter().map(|d| d.to_string()).collect();
    Cpf::parse(&raw).expect("generated cpf is valid")
}

pub(super) fn student(n: u32) -> Student {
    Student {
        id: student_cpf(n),
        name: format!("Estudante {n:02}"),
        birth_date: parse_birthdate("2010-03-07").expect("valid date"),
        email: format!("estudante{n}@escola.br"),
    }
}

pub(super) fn student_form(n: u32, school: &str, level: Level) -> StudentRegistrationForm {
    let student = student(n);
    StudentRegistrationForm {
        cpf: student.id.display(),
        name: student.name,
        birth_date: "07/03/2010".to_string(),
        email: student.email,
        school: school.to_string(),
        level: level.to_string(),
        special_needs: String::new(),
    }
}

/// Write an enrollment straight into the store, bypassing the quota.
pub(super) fn seed(
    store: &MemoryRegistry,
    n: u32,
    school: &str,
    edition: Edition,
    level: Level,
    award: Award,
) {
    let student = student(n);
    let enrollment = Enrollment {
        student: student.id.clone(),
        professor: professor_cpf(),
        school: school_id(school),
        edition,
        level,
        special_needs: String::new(),
        award,
    };
    store.admit(student, enrollment).expect("seeded enrollment");
}

pub(super) fn session_token(fixture: &Fixture) -> String {
    fixture
        .signer
        .issue(TokenClaims::Session {
            professor: professor_cpf(),
        })
        .expect("session token")
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

pub(super) fn authorized(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
