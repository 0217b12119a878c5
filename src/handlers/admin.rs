use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, FailedBooking};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/bookings[?date=..][&status=..]
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub date: Option<String>,
    pub status: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let date = query
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| AppError::InvalidRequest(format!("invalid date: {raw}")))
        })
        .transpose()?;

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_appointments(&db, date, query.status.as_deref())?
    };
    Ok(Json(bookings))
}

// PUT /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = AppointmentStatus::parse(&update.status)
        .ok_or_else(|| AppError::InvalidRequest(format!("unknown status: {}", update.status)))?;

    let db = state.db.lock().unwrap();
    let current = queries::get_appointment(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    // Allowed transitions: pending -> confirmed, anything -> cancelled.
    let allowed = matches!(
        (current.status, status),
        (AppointmentStatus::Pending, AppointmentStatus::Confirmed)
            | (_, AppointmentStatus::Cancelled)
    );
    if !allowed {
        return Err(AppError::InvalidRequest(format!(
            "cannot change status from {} to {}",
            current.status.as_str(),
            status.as_str()
        )));
    }

    queries::update_appointment_status(&db, &id, status)?;
    tracing::info!(id = %id, status = status.as_str(), "booking status updated");

    let updated = queries::get_appointment(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    Ok(Json(updated))
}

// GET /api/admin/failed-bookings[?resolved=..]
#[derive(Deserialize)]
pub struct FailedBookingsQuery {
    pub resolved: Option<bool>,
}

pub async fn list_failed_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FailedBookingsQuery>,
) -> Result<Json<Vec<FailedBooking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let failed = {
        let db = state.db.lock().unwrap();
        queries::list_failed_bookings(&db, query.resolved)?
    };
    Ok(Json(failed))
}

// PUT /api/admin/failed-bookings/:id/resolve
pub async fn resolve_failed_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FailedBooking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    if !queries::resolve_failed_booking(&db, &id)? {
        return Err(AppError::NotFound(format!("failed booking {id}")));
    }
    tracing::info!(id = %id, "failed booking marked resolved");

    let resolved = queries::get_failed_booking(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("failed booking {id}")))?;
    Ok(Json(resolved))
}
