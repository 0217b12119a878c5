use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::ledger::Ledger;
use crate::services::pipeline::BookingPipeline;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub ledger: Arc<dyn Ledger>,
    pub pipeline: BookingPipeline,
}
