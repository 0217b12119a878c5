use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus, BookingRequest};
use crate::services::ledger::Ledger;
use crate::services::slots::{self, BusinessHours};

/// The single authority that turns a `BookingRequest` into a durable
/// `Appointment`. Check-then-commit: the availability recheck is advisory,
/// the storage-level uniqueness constraint is what closes the race. Any
/// number of admissions may run concurrently; for a contested slot exactly
/// one insert commits and the rest observe `SlotTaken`.
pub struct AdmissionController {
    ledger: Arc<dyn Ledger>,
    hours: BusinessHours,
    interval_minutes: u32,
}

impl AdmissionController {
    pub fn new(ledger: Arc<dyn Ledger>, hours: BusinessHours, interval_minutes: u32) -> Self {
        Self {
            ledger,
            hours,
            interval_minutes,
        }
    }

    pub async fn admit(&self, request: &BookingRequest) -> Result<Appointment, AppError> {
        let date = self.validate(request)?;

        let time = request.time.trim();
        let barber = request.barber.trim();
        if self.ledger.slot_taken(date, time, barber).await? {
            return Err(AppError::SlotTaken);
        }

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            service: request.service.trim().to_string(),
            date,
            time: time.to_string(),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone.trim().to_string(),
            barber: barber.to_string(),
            status: AppointmentStatus::Pending,
            created_at: Utc::now().naive_utc(),
        };

        // Commit point: the slot index rejects a concurrent winner's double.
        self.ledger.insert_appointment(&appointment).await?;

        tracing::info!(
            id = %appointment.id,
            date = %appointment.date,
            time = %appointment.time,
            barber = %appointment.barber,
            "appointment admitted"
        );
        Ok(appointment)
    }

    /// Shape validation. Past dates are rejected, today is allowed; the time
    /// must sit exactly on the configured slot grid.
    pub fn validate(&self, request: &BookingRequest) -> Result<NaiveDate, AppError> {
        let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
            .map_err(|_| AppError::InvalidRequest(format!("invalid date: {}", request.date)))?;

        if date < Utc::now().date_naive() {
            return Err(AppError::InvalidRequest(
                "date must be today or later".to_string(),
            ));
        }

        let time = request.time.trim();
        let grid = slots::slot_grid(&self.hours, self.interval_minutes);
        if !grid.iter().any(|slot| slot == time) {
            return Err(AppError::InvalidRequest(format!(
                "time {time} is not a bookable slot"
            )));
        }

        for (field, value) in [
            ("service", &request.service),
            ("name", &request.name),
            ("email", &request.email),
            ("phone", &request.phone),
            ("barber", &request.barber),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::InvalidRequest(format!("{field} is required")));
            }
        }
        if !request.email.contains('@') {
            return Err(AppError::InvalidRequest("invalid email address".to_string()));
        }

        Ok(date)
    }
}
