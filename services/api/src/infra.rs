use metrics_exporter_prometheus::PrometheusHandle;
use olympiad::config::AppConfig;
use olympiad::credentials::TokenSigner;
use olympiad::error::AppError;
use olympiad::mail::Mailer;
use olympiad::registry::{MemoryRegistry, SchoolImporter};
use olympiad::workflows::accounts::AccountService;
use olympiad::workflows::enrollment::EnrollmentService;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// The two workflow services sharing one store, mailer and signer.
pub(crate) struct Services<M> {
    pub(crate) accounts: Arc<AccountService<MemoryRegistry, M>>,
    pub(crate) enrollment: Arc<EnrollmentService<MemoryRegistry, M>>,
}

pub(crate) fn build_registry(schools: Option<&Path>) -> Result<MemoryRegistry, AppError> {
    let Some(path) = schools else {
        return Ok(MemoryRegistry::new());
    };
    let schools = SchoolImporter::from_path(path)?;
    info!(count = schools.len(), path = %path.display(), "school registry loaded");
    Ok(MemoryRegistry::with_schools(schools))
}

pub(crate) fn build_services<M>(
    config: &AppConfig,
    store: Arc<MemoryRegistry>,
    mailer: Arc<M>,
) -> Services<M>
where
    M: Mailer + 'static,
{
    let signer = Arc::new(TokenSigner::new(&config.security));
    let accounts = Arc::new(AccountService::new(
        store.clone(),
        mailer.clone(),
        signer.clone(),
        config.mail.clone(),
    ));
    let enrollment = Arc::new(EnrollmentService::new(
        store,
        mailer,
        signer,
        config.edition.clone(),
        config.mail.clone(),
    ));
    Services {
        accounts,
        enrollment,
    }
}
