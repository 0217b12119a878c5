use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use kapsalon::config::AppConfig;
use kapsalon::db;
use kapsalon::handlers;
use kapsalon::services::admission::AdmissionController;
use kapsalon::services::ledger::SqliteLedger;
use kapsalon::services::notify::mailgun::MailgunTransport;
use kapsalon::services::notify::sendgrid::SendgridTransport;
use kapsalon::services::notify::{MailTransport, NotificationGateway};
use kapsalon::services::pipeline::{self, BookingPipeline};
use kapsalon::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let mut transports: Vec<Box<dyn MailTransport>> = Vec::new();
    if !config.sendgrid_api_key.is_empty() {
        tracing::info!("mail: SendGrid transport enabled");
        transports.push(Box::new(SendgridTransport::new(
            config.sendgrid_api_key.clone(),
            config.mail_from.clone(),
        )));
    }
    if !config.mailgun_api_key.is_empty() && !config.mailgun_domain.is_empty() {
        tracing::info!("mail: Mailgun fallback transport enabled");
        transports.push(Box::new(MailgunTransport::new(
            config.mailgun_api_key.clone(),
            config.mailgun_domain.clone(),
            config.mail_from.clone(),
        )));
    }
    if transports.is_empty() {
        tracing::warn!("no mail transports configured, notifications will fail");
    }
    let gateway = Arc::new(NotificationGateway::new(transports));

    let ledger = Arc::new(SqliteLedger::new(db.clone()));
    let controller = AdmissionController::new(
        ledger.clone(),
        config.business_hours(),
        config.slot_interval_minutes,
    );
    let booking_pipeline = BookingPipeline::new(ledger.clone(), controller, gateway, &config);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        ledger,
        pipeline: booking_pipeline,
    });

    // Periodically evict in-flight entries whose task died without cleanup.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sweep_state.pipeline.sweep_stale(pipeline::STALE_AFTER);
        }
    });

    let app = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route(
            "/api/appointments/availability",
            get(handlers::booking::get_availability),
        )
        .route(
            "/api/check-availability",
            post(handlers::booking::check_availability),
        )
        .route("/api/appointments", post(handlers::booking::create_appointment))
        .route(
            "/api/appointments/:date",
            get(handlers::booking::appointments_for_date),
        )
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/:id/status",
            put(handlers::admin::update_booking_status),
        )
        .route(
            "/api/admin/failed-bookings",
            get(handlers::admin::list_failed_bookings),
        )
        .route(
            "/api/admin/failed-bookings/:id/resolve",
            put(handlers::admin::resolve_failed_booking),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
