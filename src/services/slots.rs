use serde::Serialize;

/// Opening and closing hour of the business day, whole hours. Embedded in
/// the availability response, hence Serialize.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BusinessHours {
    pub start: u32,
    pub end: u32,
}

/// The ordered grid of bookable "HH:MM" slots for one business day. Pure and
/// deterministic. A trailing partial interval is dropped: the loop stops as
/// soon as a full interval no longer fits before closing.
pub fn slot_grid(hours: &BusinessHours, interval_minutes: u32) -> Vec<String> {
    let mut slots = Vec::new();
    if interval_minutes == 0 || hours.end <= hours.start || hours.end > 24 {
        return slots;
    }

    let closing = hours.end * 60;
    let mut cursor = hours.start * 60;
    while cursor + interval_minutes <= closing {
        slots.push(format!("{:02}:{:02}", cursor / 60, cursor % 60));
        cursor += interval_minutes;
    }
    slots
}
