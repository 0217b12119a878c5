use std::time::Duration;

use chrono::NaiveDate;

use crate::errors::AppError;
use crate::services::ledger::Ledger;
use crate::services::slots::{self, BusinessHours};

/// Availability reads are client-facing; bound their latency instead of
/// letting a stuck store hang the request.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct DayAvailability {
    pub available: Vec<String>,
    pub booked: Vec<String>,
    pub total_slots: usize,
}

/// Slot grid minus booked slots, preserving grid order. A ledger failure is
/// "cannot determine availability", never "fully available".
pub async fn day_availability(
    ledger: &dyn Ledger,
    hours: &BusinessHours,
    interval_minutes: u32,
    date: NaiveDate,
    barber: Option<&str>,
) -> Result<DayAvailability, AppError> {
    let grid = slots::slot_grid(hours, interval_minutes);

    let booked = tokio::time::timeout(READ_TIMEOUT, ledger.booked_slots(date, barber))
        .await
        .map_err(|_| AppError::StorageUnavailable("availability read timed out".to_string()))??;

    let available = grid
        .iter()
        .filter(|slot| !booked.contains(slot))
        .cloned()
        .collect();

    Ok(DayAvailability {
        available,
        booked,
        total_slots: grid.len(),
    })
}
