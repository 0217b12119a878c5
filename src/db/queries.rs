use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};

use crate::models::{Appointment, AppointmentStatus, BookingRequest, FailedBooking};

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, appointment: &Appointment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, service, date, time, name, email, phone, barber, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            appointment.id,
            appointment.service,
            appointment.date.format("%Y-%m-%d").to_string(),
            appointment.time,
            appointment.name,
            appointment.email,
            appointment.phone,
            appointment.barber,
            appointment.status.as_str(),
            appointment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn slot_taken(
    conn: &Connection,
    date: NaiveDate,
    time: &str,
    barber: &str,
) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE date = ?1 AND time = ?2 AND barber = ?3 AND status != 'cancelled'",
        params![date.format("%Y-%m-%d").to_string(), time, barber],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn booked_slots(
    conn: &Connection,
    date: NaiveDate,
    barber: Option<&str>,
) -> rusqlite::Result<Vec<String>> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let mut times = vec![];

    match barber {
        Some(barber) => {
            let mut stmt = conn.prepare(
                "SELECT time FROM appointments
                 WHERE date = ?1 AND barber = ?2 AND status != 'cancelled'
                 ORDER BY time ASC",
            )?;
            let rows = stmt.query_map(params![date_str, barber], |row| row.get(0))?;
            for row in rows {
                times.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT time FROM appointments
                 WHERE date = ?1 AND status != 'cancelled'
                 ORDER BY time ASC",
            )?;
            let rows = stmt.query_map(params![date_str], |row| row.get(0))?;
            for row in rows {
                times.push(row?);
            }
        }
    }

    Ok(times)
}

pub fn appointments_for_date(
    conn: &Connection,
    date: NaiveDate,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, service, date, time, name, email, phone, barber, status, created_at
         FROM appointments WHERE date = ?1 AND status != 'cancelled'
         ORDER BY time ASC",
    )?;

    let rows = stmt.query_map(params![date.format("%Y-%m-%d").to_string()], parse_appointment_row)?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

pub fn list_appointments(
    conn: &Connection,
    date: Option<NaiveDate>,
    status: Option<&str>,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut sql = String::from(
        "SELECT id, service, date, time, name, email, phone, barber, status, created_at
         FROM appointments WHERE 1=1",
    );
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(date) = date {
        values.push(Box::new(date.format("%Y-%m-%d").to_string()));
        sql.push_str(&format!(" AND date = ?{}", values.len()));
    }
    if let Some(status) = status {
        values.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY date ASC, time ASC");

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(refs.as_slice(), parse_appointment_row)?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}

pub fn get_appointment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Appointment>> {
    let result = conn.query_row(
        "SELECT id, service, date, time, name, email, phone, barber, status, created_at
         FROM appointments WHERE id = ?1",
        params![id],
        parse_appointment_row,
    );

    match result {
        Ok(appointment) => Ok(Some(appointment)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> rusqlite::Result<Appointment> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status_str: String = row.get(8)?;
    let status = AppointmentStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown status: {status_str}").into(),
        )
    })?;

    let created_at_str: String = row.get(9)?;
    let created_at =
        NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Appointment {
        id: row.get(0)?,
        service: row.get(1)?,
        date,
        time: row.get(3)?,
        name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        barber: row.get(7)?,
        status,
        created_at,
    })
}

// ── Failed bookings ──

pub fn insert_failed_booking(conn: &Connection, failed: &FailedBooking) -> rusqlite::Result<()> {
    let request_json = serde_json::to_string(&failed.request).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
    })?;

    conn.execute(
        "INSERT INTO failed_bookings (id, request_json, error, created_at, resolved)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            failed.id,
            request_json,
            failed.error,
            failed.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            failed.resolved as i32,
        ],
    )?;
    Ok(())
}

pub fn list_failed_bookings(
    conn: &Connection,
    resolved: Option<bool>,
) -> rusqlite::Result<Vec<FailedBooking>> {
    let mut sql = String::from(
        "SELECT id, request_json, error, created_at, resolved FROM failed_bookings",
    );
    if resolved.is_some() {
        sql.push_str(" WHERE resolved = ?1");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let mut failed = vec![];
    match resolved {
        Some(resolved) => {
            let rows = stmt.query_map(params![resolved as i32], parse_failed_booking_row)?;
            for row in rows {
                failed.push(row?);
            }
        }
        None => {
            let rows = stmt.query_map([], parse_failed_booking_row)?;
            for row in rows {
                failed.push(row?);
            }
        }
    }
    Ok(failed)
}

pub fn get_failed_booking(conn: &Connection, id: &str) -> rusqlite::Result<Option<FailedBooking>> {
    let result = conn.query_row(
        "SELECT id, request_json, error, created_at, resolved FROM failed_bookings WHERE id = ?1",
        params![id],
        parse_failed_booking_row,
    );

    match result {
        Ok(failed) => Ok(Some(failed)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn resolve_failed_booking(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let count = conn.execute(
        "UPDATE failed_bookings SET resolved = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

fn parse_failed_booking_row(row: &rusqlite::Row) -> rusqlite::Result<FailedBooking> {
    let request_json: String = row.get(1)?;
    let request: BookingRequest = serde_json::from_str(&request_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at_str: String = row.get(3)?;
    let created_at =
        NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(FailedBooking {
        id: row.get(0)?,
        request,
        error: row.get(2)?,
        created_at,
        resolved: row.get::<_, i32>(4)? != 0,
    })
}
