use std::env;
use std::time::Duration;

use crate::services::slots::BusinessHours;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub slot_interval_minutes: u32,
    pub salon_email: String,
    pub salon_phone: String,
    pub mail_from: String,
    pub sendgrid_api_key: String,
    pub mailgun_api_key: String,
    pub mailgun_domain: String,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "kapsalon.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            opening_hour: hour_in_day(env::var("OPENING_HOUR").ok(), 9),
            closing_hour: hour_in_day(env::var("CLOSING_HOUR").ok(), 18),
            slot_interval_minutes: env::var("SLOT_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            salon_email: env::var("SALON_EMAIL")
                .unwrap_or_else(|_| "info@kapsalon-adem.nl".to_string()),
            salon_phone: env::var("SALON_PHONE").unwrap_or_else(|_| "+31684262200".to_string()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "noreply@kapsalon-adem.nl".to_string()),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            mailgun_api_key: env::var("MAILGUN_API_KEY").unwrap_or_default(),
            mailgun_domain: env::var("MAILGUN_DOMAIN").unwrap_or_default(),
            retry_attempts: env::var("BOOKING_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            retry_delay: Duration::from_millis(
                env::var("BOOKING_RETRY_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
        }
    }

    pub fn business_hours(&self) -> BusinessHours {
        BusinessHours {
            start: self.opening_hour,
            end: self.closing_hour,
        }
    }
}

/// Hours come from the environment, so an out-of-range value must fall back
/// to the default instead of flowing into slot arithmetic.
fn hour_in_day(raw: Option<String>, default: u32) -> u32 {
    raw.and_then(|v| v.parse().ok())
        .filter(|h| *h <= 24)
        .unwrap_or(default)
}
