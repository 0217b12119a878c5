use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, BookingRequest};
use crate::services::availability;
use crate::services::slots::BusinessHours;
use crate::state::AppState;

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidRequest(format!("invalid date: {raw}")))
}

// GET /api/appointments/availability?date=YYYY-MM-DD[&barber=..]
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub barber: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub date: String,
    pub available_slots: Vec<String>,
    pub business_hours: BusinessHours,
    pub total_slots: usize,
    pub booked_slots: Vec<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let raw = query
        .date
        .ok_or_else(|| AppError::InvalidRequest("date parameter is required".to_string()))?;
    let date = parse_date(&raw)?;

    let hours = state.config.business_hours();
    let day = availability::day_availability(
        state.ledger.as_ref(),
        &hours,
        state.config.slot_interval_minutes,
        date,
        query.barber.as_deref(),
    )
    .await?;

    Ok(Json(AvailabilityResponse {
        date: date.format("%Y-%m-%d").to_string(),
        available_slots: day.available,
        business_hours: hours,
        total_slots: day.total_slots,
        booked_slots: day.booked,
    }))
}

// POST /api/check-availability — lightweight pre-check, not authoritative;
// the admission controller re-checks at commit time.
#[derive(Deserialize)]
pub struct CheckAvailabilityRequest {
    pub date: String,
    pub time: String,
    pub barber: String,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&request.date)?;
    let taken = state
        .ledger
        .slot_taken(date, request.time.trim(), request.barber.trim())
        .await?;
    Ok(Json(json!({ "available": !taken })))
}

// POST /api/appointments
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentResponse {
    pub success: bool,
    pub message: String,
    pub appointment: Appointment,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<CreateAppointmentResponse>), AppError> {
    let appointment = state.pipeline.submit(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAppointmentResponse {
            success: true,
            message: "Appointment created successfully".to_string(),
            appointment,
        }),
    ))
}

// GET /api/appointments/:date — non-cancelled appointments for one day.
pub async fn appointments_for_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let date = parse_date(&date)?;
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::appointments_for_date(&db, date)?
    };
    Ok(Json(appointments))
}
