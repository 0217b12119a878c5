pub mod appointment;
pub mod failed_booking;

pub use appointment::{Appointment, AppointmentStatus, BookingRequest};
pub use failed_booking::FailedBooking;
