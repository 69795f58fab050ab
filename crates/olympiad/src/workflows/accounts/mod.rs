//! Professor accounts: e-mail verified registration, login sessions and password reset.

pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use router::account_router;
pub use service::{
    AccountError, AccountService, AccountView, PasswordForm, RegistrationForm, Session,
};
