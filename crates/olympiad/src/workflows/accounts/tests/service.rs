use chrono::Duration;

use super::common::*;
use crate::credentials::verify_password;
use crate::identity::parse_birthdate;
use crate::registry::{
    Edition, Enrollment, EnrollmentRepository, Level, ProfessorRepository, School, SchoolId,
    SchoolRepository, Student,
};
use crate::workflows::accounts::{AccountError, PasswordForm};

#[test]
fn registration_round_trip_creates_the_account() {
    let (service, store, mailer) = build_service();
    service
        .request_registration("  ANA@escola.br ", now())
        .expect("request");

    let token = mailed_token(&mailer, PROFESSOR_EMAIL);
    assert_eq!(
        service.registration_email(&token, now()),
        Some(PROFESSOR_EMAIL.to_string())
    );

    let account = service
        .complete_registration(&token, registration_form(), now())
        .expect("registration");
    assert_eq!(account.name, "Ana Souza");
    assert_eq!(account.email, PROFESSOR_EMAIL);

    let stored = store
        .professor(&professor_cpf())
        .expect("lookup")
        .expect("professor stored");
    assert!(verify_password(PASSWORD, &stored.password_hash));
    assert_ne!(stored.password_hash, PASSWORD);
}

#[test]
fn known_addresses_get_no_mail_and_no_error() {
    let (service, _, mailer) = registered();
    let before = mailer.messages().len();
    service
        .request_registration(PROFESSOR_EMAIL, now())
        .expect("silent no-op");
    assert_eq!(mailer.messages().len(), before);
}

#[test]
fn student_addresses_also_count_as_on_file() {
    let (service, store, mailer) = registered();
    store
        .upsert_school(School {
            id: SchoolId::parse("52012345").expect("valid inep"),
            name: "Colégio Estadual Central".to_string(),
            city: "Goiânia".to_string(),
            zone: "urbana".to_string(),
            tier: "estadual".to_string(),
            code: "5208707".to_string(),
            phone: None,
            latitude: None,
            longitude: None,
        })
        .expect("school");
    let student = Student {
        id: crate::identity::Cpf::parse("11144477735").expect("valid cpf"),
        name: "Pedro Lima".to_string(),
        birth_date: parse_birthdate("2010-03-07").expect("valid date"),
        email: "pedro@escola.br".to_string(),
    };
    store
        .admit(
            student.clone(),
            Enrollment {
                student: student.id.clone(),
                professor: professor_cpf(),
                school: SchoolId::parse("52012345").expect("valid inep"),
                edition: Edition(2024),
                level: Level::One,
                special_needs: String::new(),
                award: Default::default(),
            },
        )
        .expect("admit");

    service
        .request_registration("pedro@escola.br", now())
        .expect("silent no-op");
    assert!(mailer.sent_to("pedro@escola.br").is_empty());
}

#[test]
fn expired_or_forged_registration_tokens_yield_no_identity() {
    let (service, _, mailer) = build_service();
    service
        .request_registration(PROFESSOR_EMAIL, now())
        .expect("request");
    let token = mailed_token(&mailer, PROFESSOR_EMAIL);

    let later = now() + Duration::seconds(601);
    assert_eq!(service.registration_email(&token, later), None);
    assert!(matches!(
        service.complete_registration(&token, registration_form(), later),
        Err(AccountError::InvalidToken)
    ));
    assert!(matches!(
        service.complete_registration("forged.token", registration_form(), now()),
        Err(AccountError::InvalidToken)
    ));
}

#[test]
fn registration_form_errors_are_reported_per_field() {
    let (service, _, mailer) = build_service();
    service
        .request_registration(PROFESSOR_EMAIL, now())
        .expect("request");
    let token = mailed_token(&mailer, PROFESSOR_EMAIL);

    let mut form = registration_form();
    form.cpf = "000.000.001-91".to_string();
    form.confirmation = "outra-senha".to_string();

    match service.complete_registration(&token, form, now()) {
        Err(AccountError::Invalid(errors)) => {
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["cpf", "password"]);
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn a_cpf_cannot_register_twice() {
    let (service, _, mailer) = registered();
    service
        .request_registration("outra@escola.br", now())
        .expect("request");
    let token = mailed_token(&mailer, "outra@escola.br");

    match service.complete_registration(&token, registration_form(), now()) {
        Err(AccountError::Invalid(errors)) => {
            assert_eq!(errors.messages("cpf"), &["CPF already registered".to_string()]);
        }
        other => panic!("expected duplicate cpf, got {other:?}"),
    }
}

#[test]
fn login_rejections_are_indistinguishable() {
    let (service, _, _) = registered();

    let session = service
        .login("529.982.247-25", PASSWORD, now())
        .expect("login");
    assert_eq!(session.professor, professor_cpf());
    assert_eq!(session.expires_at, now() + Duration::hours(8));

    for (cpf, password) in [
        (PROFESSOR_CPF, "senha-errada"),
        ("11144477735", PASSWORD),
        ("not-a-cpf", PASSWORD),
    ] {
        assert!(matches!(
            service.login(cpf, password, now()),
            Err(AccountError::InvalidCredentials)
        ));
    }
}

#[test]
fn sessions_authenticate_until_they_expire() {
    let (service, _, _) = registered();
    let session = service.login(PROFESSOR_CPF, PASSWORD, now()).expect("login");

    let professor = service
        .authenticate(&session.token, now() + Duration::hours(1))
        .expect("authenticated");
    assert_eq!(professor.id, professor_cpf());
    assert!(service
        .authenticate(&session.token, now() + Duration::hours(9))
        .is_none());
}

#[test]
fn password_reset_overwrites_the_old_password() {
    let (service, _, mailer) = registered();
    service
        .request_password_reset(PROFESSOR_EMAIL, now())
        .expect("request");
    let token = mailed_token(&mailer, PROFESSOR_EMAIL);

    let form = PasswordForm {
        password: "nova-senha-1".to_string(),
        confirmation: "nova-senha-1".to_string(),
    };
    service
        .reset_password(&token, form, now())
        .expect("reset");

    assert!(service.login(PROFESSOR_CPF, PASSWORD, now()).is_err());
    assert!(service.login(PROFESSOR_CPF, "nova-senha-1", now()).is_ok());
}

#[test]
fn reset_requests_for_unknown_addresses_are_silent() {
    let (service, _, mailer) = registered();
    let before = mailer.messages().len();
    service
        .request_password_reset("ninguem@escola.br", now())
        .expect("silent");
    assert_eq!(mailer.messages().len(), before);
}

#[test]
fn registration_tokens_cannot_reset_passwords() {
    let (service, _, mailer) = build_service();
    service
        .request_registration(PROFESSOR_EMAIL, now())
        .expect("request");
    let token = mailed_token(&mailer, PROFESSOR_EMAIL);

    let form = PasswordForm {
        password: "nova-senha-1".to_string(),
        confirmation: "nova-senha-1".to_string(),
    };
    assert!(matches!(
        service.reset_password(&token, form, now()),
        Err(AccountError::InvalidToken)
    ));
}
