pub mod admission;
pub mod availability;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod slots;
