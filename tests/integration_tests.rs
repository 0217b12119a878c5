use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{Days, NaiveDate, Utc};
use serde_json::json;
use tower::ServiceExt;

use kapsalon::config::AppConfig;
use kapsalon::db::{self, queries};
use kapsalon::errors::AppError;
use kapsalon::handlers;
use kapsalon::models::{Appointment, BookingRequest, FailedBooking};
use kapsalon::services::admission::AdmissionController;
use kapsalon::services::ledger::{Ledger, SqliteLedger};
use kapsalon::services::notify::{MailTransport, Notification, NotificationGateway};
use kapsalon::services::pipeline::BookingPipeline;
use kapsalon::state::AppState;

// ── Mock Transport ──

struct RecordingTransport {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl MailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &Notification) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((message.to.clone(), message.subject.clone()));
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        opening_hour: 9,
        closing_hour: 18,
        slot_interval_minutes: 30,
        salon_email: "salon@example.com".to_string(),
        salon_phone: "+31612345678".to_string(),
        mail_from: "noreply@example.com".to_string(),
        sendgrid_api_key: String::new(),
        mailgun_api_key: String::new(),
        mailgun_domain: String::new(),
        retry_attempts: 3,
        retry_delay: Duration::from_millis(5),
    }
}

fn test_state_with_sent() -> (Arc<AppState>, Arc<Mutex<Vec<(String, String)>>>) {
    let config = test_config();
    let conn = db::init_db(":memory:").unwrap();
    let db = Arc::new(Mutex::new(conn));

    let sent = Arc::new(Mutex::new(vec![]));
    let gateway = Arc::new(NotificationGateway::new(vec![Box::new(
        RecordingTransport {
            sent: Arc::clone(&sent),
        },
    )]));

    let ledger = Arc::new(SqliteLedger::new(db.clone()));
    let controller = AdmissionController::new(
        ledger.clone(),
        config.business_hours(),
        config.slot_interval_minutes,
    );
    let pipeline = BookingPipeline::new(ledger.clone(), controller, gateway, &config);

    let state = Arc::new(AppState {
        db,
        config,
        ledger,
        pipeline,
    });
    (state, sent)
}

fn test_state() -> Arc<AppState> {
    test_state_with_sent().0
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
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
        .with_state(state)
}

/// A date safely in the future so past-date validation never trips.
fn future_date() -> String {
    (Utc::now().date_naive() + Days::new(7))
        .format("%Y-%m-%d")
        .to_string()
}

fn booking_json(date: &str, time: &str) -> serde_json::Value {
    json!({
        "service": "Knippen",
        "date": date,
        "time": time,
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "+31687654321",
        "barber": "Adem",
    })
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "ok");
}

// ── Availability ──

#[tokio::test]
async fn test_availability_shape() {
    let app = test_app(test_state());
    let date = future_date();

    let res = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/appointments/availability?date={date}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["date"], date);
    assert_eq!(json["availableSlots"].as_array().unwrap().len(), 18);
    assert_eq!(json["availableSlots"][0], "09:00");
    assert_eq!(json["availableSlots"][17], "17:30");
    assert_eq!(json["businessHours"]["start"], 9);
    assert_eq!(json["businessHours"]["end"], 18);
    assert_eq!(json["totalSlots"], 18);
    assert_eq!(json["bookedSlots"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_availability_requires_date() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/appointments/availability")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_rejects_garbage_date() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/appointments/availability?date=not-a-date")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_excludes_booked_slot() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "10:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/appointments/availability?date={date}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(res).await;
    assert_eq!(json["availableSlots"].as_array().unwrap().len(), 17);
    assert_eq!(json["bookedSlots"], json!(["10:00"]));
    assert!(!json["availableSlots"]
        .as_array()
        .unwrap()
        .contains(&json!("10:00")));
}

#[tokio::test]
async fn test_availability_returns_503_when_storage_is_down() {
    struct FailingLedger;

    #[async_trait]
    impl Ledger for FailingLedger {
        async fn slot_taken(
            &self,
            _date: NaiveDate,
            _time: &str,
            _barber: &str,
        ) -> Result<bool, AppError> {
            Err(AppError::StorageUnavailable("disk gone".to_string()))
        }

        async fn insert_appointment(&self, _appointment: &Appointment) -> Result<(), AppError> {
            Err(AppError::StorageUnavailable("disk gone".to_string()))
        }

        async fn booked_slots(
            &self,
            _date: NaiveDate,
            _barber: Option<&str>,
        ) -> Result<Vec<String>, AppError> {
            Err(AppError::StorageUnavailable("disk gone".to_string()))
        }

        async fn insert_failed_booking(&self, _failed: &FailedBooking) -> Result<(), AppError> {
            Err(AppError::StorageUnavailable("disk gone".to_string()))
        }
    }

    let config = test_config();
    let conn = db::init_db(":memory:").unwrap();
    let ledger: Arc<dyn Ledger> = Arc::new(FailingLedger);
    let gateway = Arc::new(NotificationGateway::new(vec![]));
    let controller = AdmissionController::new(
        Arc::clone(&ledger),
        config.business_hours(),
        config.slot_interval_minutes,
    );
    let pipeline = BookingPipeline::new(Arc::clone(&ledger), controller, gateway, &config);
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        ledger,
        pipeline,
    });

    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/appointments/availability?date={}", future_date()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // A broken store must never read as "fully available".
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
}

// ── Booking ──

#[tokio::test]
async fn test_create_appointment() {
    let (state, sent) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state)
        .oneshot(post_json("/api/appointments", &booking_json(&date, "10:00")))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["appointment"]["status"], "pending");
    assert_eq!(json["appointment"]["date"], date);
    assert_eq!(json["appointment"]["time"], "10:00");
    assert_eq!(json["appointment"]["barber"], "Adem");

    // Customer confirmation plus internal alert.
    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|(to, _)| to == "jane@example.com"));
    assert!(sent.iter().any(|(to, _)| to == "salon@example.com"));
}

#[tokio::test]
async fn test_double_booking_rejected() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "11:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = test_app(state)
        .oneshot(post_json("/api/appointments", &booking_json(&date, "11:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let json = body_json(res).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_same_slot_different_barber_allowed() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "11:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let mut other = booking_json(&date, "11:00");
    other["barber"] = json!("Mehmet");
    let res = test_app(state)
        .oneshot(post_json("/api/appointments", &other))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_off_grid_time_rejected() {
    let (state, sent) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state)
        .oneshot(post_json("/api/appointments", &booking_json(&date, "10:05")))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_past_date_rejected() {
    let (state, _) = test_state_with_sent();

    let res = test_app(state)
        .oneshot(post_json(
            "/api/appointments",
            &booking_json("2020-01-15", "10:00"),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let mut body = booking_json(&date, "10:00");
    body["email"] = json!("");
    let res = test_app(state)
        .oneshot(post_json("/api/appointments", &body))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_check_availability_roundtrip() {
    let (state, _) = test_state_with_sent();
    let date = future_date();
    let check = json!({ "date": date, "time": "14:00", "barber": "Adem" });

    let res = test_app(state.clone())
        .oneshot(post_json("/api/check-availability", &check))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["available"], true);

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "14:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = test_app(state)
        .oneshot(post_json("/api/check-availability", &check))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["available"], false);
}

#[tokio::test]
async fn test_appointments_for_date() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "09:30")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/appointments/{date}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["time"], "09:30");
    assert_eq!(list[0]["name"], "Jane Doe");
}

// ── Admin API ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_wrong_token() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_list_bookings() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "15:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["status"], "pending");
}

#[tokio::test]
async fn test_admin_confirm_booking() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "15:00")))
        .await
        .unwrap();
    let id = body_json(res).await["appointment"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/bookings/{id}/status"))
                .header("Authorization", "Bearer test-token")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "status": "confirmed" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "confirmed");

    // Confirmed bookings cannot go back to pending.
    let res = test_app(state)
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/bookings/{id}/status"))
                .header("Authorization", "Bearer test-token")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "status": "pending" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancelled_booking_frees_slot() {
    let (state, _) = test_state_with_sent();
    let date = future_date();

    let res = test_app(state.clone())
        .oneshot(post_json("/api/appointments", &booking_json(&date, "16:00")))
        .await
        .unwrap();
    let id = body_json(res).await["appointment"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/bookings/{id}/status"))
                .header("Authorization", "Bearer test-token")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "status": "cancelled" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The slot can be booked again.
    let res = test_app(state)
        .oneshot(post_json("/api/appointments", &booking_json(&date, "16:00")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_admin_unknown_booking() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/admin/bookings/no-such-id/status")
                .header("Authorization", "Bearer test-token")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "status": "confirmed" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Failed bookings ──

fn seed_failed_booking(state: &AppState) -> String {
    let request = BookingRequest {
        service: "Knippen".to_string(),
        date: future_date(),
        time: "12:00".to_string(),
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: "+31687654321".to_string(),
        barber: "Adem".to_string(),
        locale: None,
    };
    let failed = FailedBooking::new(&request, "storage unavailable");
    let db = state.db.lock().unwrap();
    queries::insert_failed_booking(&db, &failed).unwrap();
    failed.id
}

#[tokio::test]
async fn test_admin_failed_bookings() {
    let (state, _) = test_state_with_sent();
    let id = seed_failed_booking(&state);

    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/admin/failed-bookings")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id);
    assert_eq!(list[0]["resolved"], false);

    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/failed-bookings/{id}/resolve"))
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["resolved"], true);

    // Resolved entries drop out of the unresolved view.
    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri("/api/admin/failed-bookings?resolved=false")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_resolve_unknown_failed_booking() {
    let app = test_app(test_state());

    let res = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/admin/failed-bookings/no-such-id/resolve")
                .header("Authorization", "Bearer test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
