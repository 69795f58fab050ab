use crate::cli::ServeArgs;
use crate::infra::{build_registry, build_services, AppState};
use crate::routes::with_platform_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use olympiad::config::AppConfig;
use olympiad::error::AppError;
use olympiad::mail::{LogTransport, Outbox};
use olympiad::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(build_registry(args.schools.as_deref())?);
    let (outbox, mail_worker) = Outbox::spawn(Arc::new(LogTransport), &config.mail);
    let services = build_services(&config, store, Arc::new(outbox));

    let app = with_platform_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        edition = config.edition.year,
        quota = config.edition.quota_per_level,
        "olympiad registration service ready"
    );

    axum::serve(listener, app).await?;

    if let Err(err) = mail_worker.await {
        warn!(error = %err, "mail outbox worker stopped abnormally");
    }
    Ok(())
}
