use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, FailedBooking};

/// Durable store of appointments and dead-letter records. The implementation
/// must enforce the slot uniqueness invariant atomically at commit time —
/// admission relies on that, not on an application-level lock.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn slot_taken(&self, date: NaiveDate, time: &str, barber: &str)
        -> Result<bool, AppError>;
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), AppError>;
    async fn booked_slots(&self, date: NaiveDate, barber: Option<&str>)
        -> Result<Vec<String>, AppError>;
    async fn insert_failed_booking(&self, failed: &FailedBooking) -> Result<(), AppError>;
}

pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn slot_taken(
        &self,
        date: NaiveDate,
        time: &str,
        barber: &str,
    ) -> Result<bool, AppError> {
        let conn = self.conn.lock().unwrap();
        queries::slot_taken(&conn, date, time, barber).map_err(storage_error)
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        queries::insert_appointment(&conn, appointment).map_err(storage_error)
    }

    async fn booked_slots(
        &self,
        date: NaiveDate,
        barber: Option<&str>,
    ) -> Result<Vec<String>, AppError> {
        let conn = self.conn.lock().unwrap();
        queries::booked_slots(&conn, date, barber).map_err(storage_error)
    }

    async fn insert_failed_booking(&self, failed: &FailedBooking) -> Result<(), AppError> {
        let conn = self.conn.lock().unwrap();
        queries::insert_failed_booking(&conn, failed)
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))
    }
}

/// A violation of the slot index means the race was lost at commit time;
/// anything else is a transient storage problem.
fn storage_error(e: rusqlite::Error) -> AppError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::SlotTaken
        }
        _ => AppError::StorageUnavailable(e.to_string()),
    }
}
