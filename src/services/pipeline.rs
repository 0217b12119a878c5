use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{Appointment, BookingRequest, FailedBooking};
use crate::services::admission::AdmissionController;
use crate::services::ledger::Ledger;
use crate::services::notify::{Notification, NotificationGateway};

/// In-flight entries older than this are presumed orphaned by a crash and
/// swept. The ledger is the record of truth; the map only prevents leaks.
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

struct InFlight {
    attempts: u32,
    enqueued: Instant,
}

/// Wraps admission and notification delivery with bounded, fixed-delay
/// retries. Transient infrastructure failures are retried up to the ceiling;
/// `InvalidRequest` and `SlotTaken` are definitive and pass straight through.
/// A request that exhausts the ceiling becomes exactly one `FailedBooking`
/// row plus best-effort alerts to both parties.
pub struct BookingPipeline {
    ledger: Arc<dyn Ledger>,
    controller: AdmissionController,
    gateway: Arc<NotificationGateway>,
    salon_email: String,
    salon_phone: String,
    retry_attempts: u32,
    retry_delay: Duration,
    in_flight: Mutex<HashMap<Uuid, InFlight>>,
}

impl BookingPipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        controller: AdmissionController,
        gateway: Arc<NotificationGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            ledger,
            controller,
            gateway,
            salon_email: config.salon_email.clone(),
            salon_phone: config.salon_phone.clone(),
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: config.retry_delay,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn submit(&self, request: BookingRequest) -> Result<Appointment, AppError> {
        let attempt_id = Uuid::new_v4();
        self.in_flight.lock().unwrap().insert(
            attempt_id,
            InFlight {
                attempts: 0,
                enqueued: Instant::now(),
            },
        );

        let result = self.process(attempt_id, &request).await;

        self.in_flight.lock().unwrap().remove(&attempt_id);
        result
    }

    async fn process(
        &self,
        attempt_id: Uuid,
        request: &BookingRequest,
    ) -> Result<Appointment, AppError> {
        match self.admit_with_retry(attempt_id, request).await {
            Ok(appointment) => {
                self.send_confirmations(&appointment).await;
                Ok(appointment)
            }
            Err(e) if e.is_transient() => {
                tracing::error!(
                    error = %e,
                    name = %request.name,
                    date = %request.date,
                    time = %request.time,
                    "booking failed after exhausting retries"
                );
                self.record_failure(request, &e).await;
                Err(AppError::BookingFailed)
            }
            Err(e) => Err(e),
        }
    }

    async fn admit_with_retry(
        &self,
        attempt_id: Uuid,
        request: &BookingRequest,
    ) -> Result<Appointment, AppError> {
        let mut last = AppError::BookingFailed;
        for attempt in 1..=self.retry_attempts {
            if let Some(entry) = self.in_flight.lock().unwrap().get_mut(&attempt_id) {
                entry.attempts = attempt;
            }

            match self.controller.admit(request).await {
                Ok(appointment) => return Ok(appointment),
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt, error = %e, "transient failure during admission");
                    last = e;
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }

    /// Customer confirmation and salon notification, each retried up to the
    /// ceiling on its own; a failure of one never blocks the other. The
    /// appointment is already durable here, so an undeliverable message is
    /// logged, not unwound.
    async fn send_confirmations(&self, appointment: &Appointment) {
        let customer = Notification {
            to: appointment.email.clone(),
            subject: "Appointment Confirmation - Kapsalon Adem".to_string(),
            body: format!(
                "Dear {},\n\nYour appointment is confirmed:\n\nService: {}\nDate: {}\nTime: {}\nBarber: {}\n\nIf you need to cancel or reschedule, please call us at {}.",
                appointment.name,
                appointment.service,
                appointment.date,
                appointment.time,
                appointment.barber,
                self.salon_phone,
            ),
        };
        let salon = Notification {
            to: self.salon_email.clone(),
            subject: "New Booking".to_string(),
            body: format!(
                "New appointment: {} at {} with {} for {} ({}, {}).",
                appointment.date,
                appointment.time,
                appointment.barber,
                appointment.name,
                appointment.email,
                appointment.phone,
            ),
        };

        self.send_with_retry(&customer).await;
        self.send_with_retry(&salon).await;
    }

    async fn send_with_retry(&self, message: &Notification) {
        for attempt in 1..=self.retry_attempts {
            match self.gateway.send(message).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(attempt, to = %message.to, error = %e, "notification send failed");
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        tracing::error!(to = %message.to, "giving up on notification after exhausting retries");
    }

    /// Terminal failure: one dead-letter row, one operator alert, one
    /// customer fallback message. The alerts are sent once, best-effort.
    async fn record_failure(&self, request: &BookingRequest, error: &AppError) {
        let failed = FailedBooking::new(request, &error.to_string());
        if let Err(e) = self.ledger.insert_failed_booking(&failed).await {
            tracing::error!(error = %e, "could not record failed booking");
        }

        let operator = Notification {
            to: self.salon_email.clone(),
            subject: "URGENT: Booking System Failure".to_string(),
            body: format!(
                "Booking failed for {} on {} at {}.\nError: {error}",
                request.name, request.date, request.time,
            ),
        };
        if let Err(e) = self.gateway.send(&operator).await {
            tracing::error!(error = %e, "could not alert operator about failed booking");
        }

        let customer = Notification {
            to: request.email.clone(),
            subject: "Booking Status: Action Required".to_string(),
            body: format!(
                "We apologize, but there was an issue processing your booking. Please call us directly at {} to confirm your appointment.",
                self.salon_phone,
            ),
        };
        if let Err(e) = self.gateway.send(&customer).await {
            tracing::error!(error = %e, "could not send customer fallback message");
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Drops in-flight entries older than `max_age`. Returns the number
    /// swept. Run periodically; purely a leak-prevention measure.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut map = self.in_flight.lock().unwrap();
        let before = map.len();
        map.retain(|id, entry| {
            let keep = entry.enqueued.elapsed() < max_age;
            if !keep {
                tracing::warn!(
                    attempt_id = %id,
                    attempts = entry.attempts,
                    "sweeping stale booking attempt"
                );
            }
            keep
        });
        before - map.len()
    }
}
