use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BookingRequest;

/// Dead-letter record for a booking request that exhausted all retries.
/// Never auto-deleted; `resolved` is flipped by an operator after manual
/// follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBooking {
    pub id: String,
    pub request: BookingRequest,
    pub error: String,
    pub created_at: NaiveDateTime,
    pub resolved: bool,
}

impl FailedBooking {
    pub fn new(request: &BookingRequest, error: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request: request.clone(),
            error: error.to_string(),
            created_at: Utc::now().naive_utc(),
            resolved: false,
        }
    }
}
