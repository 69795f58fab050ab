use crate::config::MailConfig;
use crate::credentials::EnrollmentTicket;
use crate::registry::Professor;

use super::MailMessage;

pub const REGISTRATION_SUBJECT: &str = "[OMEG] Cadastro de Professor";
pub const PASSWORD_RESET_SUBJECT: &str = "[OMEG] Redefinição de senha";
pub const ENROLLMENT_SUBJECT: &str =
    "[OMEG] Inscrição na Olimpíada de Matemática do Estado de Goiás";

pub fn registration_request(config: &MailConfig, email: &str, token: &str) -> MailMessage {
    let link = link(config, "accounts/register", token);
    MailMessage {
        subject: REGISTRATION_SUBJECT.to_string(),
        sender: config.sender.clone(),
        recipients: vec![email.to_string()],
        text_body: format!(
            "Olá,\n\nPara concluir o cadastro de professor, acesse:\n{link}\n\n\
             O link expira em poucos minutos. Se você não pediu o cadastro, ignore esta mensagem.\n"
        ),
        html_body: format!(
            "<p>Olá,</p><p>Para concluir o cadastro de professor, \
             <a href=\"{link}\">clique aqui</a>.</p>\
             <p>O link expira em poucos minutos. Se você não pediu o cadastro, ignore esta mensagem.</p>",
            link = escape_html(&link)
        ),
    }
}

pub fn password_reset(config: &MailConfig, professor: &Professor, token: &str) -> MailMessage {
    let link = link(config, "accounts/password", token);
    MailMessage {
        subject: PASSWORD_RESET_SUBJECT.to_string(),
        sender: config.sender.clone(),
        recipients: vec![professor.email.clone()],
        text_body: format!(
            "Olá, {name}.\n\nPara redefinir sua senha, acesse:\n{link}\n\n\
             Se você não pediu a redefinição, ignore esta mensagem.\n",
            name = professor.name
        ),
        html_body: format!(
            "<p>Olá, {name}.</p><p>Para redefinir sua senha, \
             <a href=\"{link}\">clique aqui</a>.</p>\
             <p>Se você não pediu a redefinição, ignore esta mensagem.</p>",
            name = escape_html(&professor.name),
            link = escape_html(&link)
        ),
    }
}

pub fn enrollment_confirmation(
    config: &MailConfig,
    ticket: &EnrollmentTicket,
    token: &str,
) -> MailMessage {
    let link = link(config, "enrollments/confirm", token);
    let summary = [
        ("Professor", ticket.professor_name.clone()),
        ("Estudante", ticket.student_name.clone()),
        ("CPF", ticket.student.display()),
        ("Nascimento", ticket.birth_date.to_string()),
        ("Escola", format!("{} ({})", ticket.school_name, ticket.school)),
        ("Nível", ticket.level.to_string()),
        ("Edição", ticket.edition.to_string()),
    ];

    let text_rows: String = summary
        .iter()
        .map(|(label, value)| format!("{label}: {value}\n"))
        .collect();
    let html_rows: String = summary
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><th>{label}</th><td>{}</td></tr>",
                escape_html(value)
            )
        })
        .collect();

    MailMessage {
        subject: ENROLLMENT_SUBJECT.to_string(),
        sender: config.sender.clone(),
        recipients: vec![ticket.student_email.clone()],
        text_body: format!(
            "Olá, {name}.\n\nSeu professor pediu sua inscrição na olimpíada:\n\n{text_rows}\n\
             Para confirmar, acesse:\n{link}\n",
            name = ticket.student_name
        ),
        html_body: format!(
            "<p>Olá, {name}.</p><p>Seu professor pediu sua inscrição na olimpíada:</p>\
             <table>{html_rows}</table>\
             <p><a href=\"{link}\">Confirmar inscrição</a></p>",
            name = escape_html(&ticket.student_name),
            link = escape_html(&link)
        ),
    }
}

fn link(config: &MailConfig, path: &str, token: &str) -> String {
    format!("{}/{path}/{token}", config.public_url.trim_end_matches('/'))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
