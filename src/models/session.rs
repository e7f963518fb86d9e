use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::course::validate_name;
use crate::models::deserialize_some;

/// Largest duration representable with six integer and two fractional digits.
pub const MAX_DURATION: f64 = 999_999.99;

const SECONDS_PER_DAY: i64 = 86_400;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

pub const INSTRUCTOR_IS_ATTENDEE: &str =
    "the instructor of a session may not also be an attendee.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub duration: Option<f64>,
    pub end_date: Option<NaiveDateTime>,
    pub seats: i32,
    pub active: bool,
    pub instructor_id: Option<String>,
    pub course_id: String,
    pub attendee_ids: BTreeSet<String>,
    pub attendees_count: i64,
    pub taken_seats: f64,
    pub color: i32,
    pub updated_at: String,
}

/// A single field edit. Applying one recomputes every derived field that
/// depends on it before returning.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    Name(String),
    StartDate(Option<NaiveDate>),
    Duration(Option<f64>),
    EndDate(Option<NaiveDateTime>),
    Seats(i32),
    Active(bool),
    Instructor(Option<String>),
    Course(String),
    Attendees(BTreeSet<String>),
    Color(i32),
}

/// Non-blocking notice shown to an interactive editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub title: String,
    pub message: String,
}

impl Session {
    pub fn new(
        id: String,
        name: String,
        course_id: String,
        start_date: Option<NaiveDate>,
    ) -> Self {
        let mut session = Session {
            id,
            name,
            start_date,
            duration: None,
            end_date: None,
            seats: 0,
            active: true,
            instructor_id: None,
            course_id,
            attendee_ids: BTreeSet::new(),
            attendees_count: 0,
            taken_seats: 0.0,
            color: 0,
            updated_at: String::new(),
        };
        session.recompute_end_date();
        session.recompute_attendees();
        session
    }

    pub fn apply(&mut self, change: SessionChange) {
        match change {
            SessionChange::Name(name) => self.name = name,
            SessionChange::StartDate(start_date) => {
                self.start_date = start_date;
                self.recompute_end_date();
            }
            SessionChange::Duration(duration) => {
                self.duration = duration.map(round_duration);
                self.recompute_end_date();
            }
            SessionChange::EndDate(end_date) => self.set_end_date(end_date),
            SessionChange::Seats(seats) => {
                self.seats = seats;
                self.recompute_taken_seats();
            }
            SessionChange::Active(active) => self.active = active,
            SessionChange::Instructor(instructor_id) => self.instructor_id = instructor_id,
            SessionChange::Course(course_id) => self.course_id = course_id,
            SessionChange::Attendees(attendee_ids) => {
                self.attendee_ids = attendee_ids;
                self.recompute_attendees();
            }
            SessionChange::Color(color) => self.color = color,
        }
    }

    pub fn apply_all(&mut self, changes: impl IntoIterator<Item = SessionChange>) {
        for change in changes {
            self.apply(change);
        }
    }

    /// Inverse path: an edited end date drives the duration, then the end
    /// date is derived again from the new duration. Without a start date the
    /// edit is kept as written.
    fn set_end_date(&mut self, end_date: Option<NaiveDateTime>) {
        self.end_date = end_date;
        if let Some(duration) = duration_from_end_date(self.start_date, end_date) {
            self.duration = Some(duration);
            self.recompute_end_date();
        }
    }

    fn recompute_end_date(&mut self) {
        self.end_date = end_date_for(self.start_date, self.duration);
    }

    fn recompute_attendees(&mut self) {
        self.attendees_count = self.attendee_ids.len() as i64;
        self.recompute_taken_seats();
    }

    fn recompute_taken_seats(&mut self) {
        self.taken_seats = taken_seats(self.seats, self.attendee_ids.len());
    }

    pub fn seat_warning(&self) -> Option<Warning> {
        seat_warning(self.seats, self.attendee_ids.len())
    }

    /// Checks run before every commit; any error aborts the write.
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)?;

        if let Some(duration) = self.duration {
            if !duration.is_finite() || !(0.0..=MAX_DURATION).contains(&duration) {
                return Err(AppError::Validation(format!(
                    "duration must be between 0 and {MAX_DURATION} days"
                )));
            }
        }

        check_instructor_not_attending(self.instructor_id.as_deref(), &self.attendee_ids)
    }
}

fn round_duration(days: f64) -> f64 {
    (days * 100.0).round() / 100.0
}

/// Occupancy as a percentage of `seats`; zero seats means zero occupancy.
pub fn taken_seats(seats: i32, attendees: usize) -> f64 {
    if seats == 0 {
        0.0
    } else {
        100.0 * attendees as f64 / seats as f64
    }
}

/// Last instant covered by a session starting at midnight on `start_date`
/// and lasting `duration` days. A missing or zero duration yields the start.
pub fn end_date_for(start_date: Option<NaiveDate>, duration: Option<f64>) -> Option<NaiveDateTime> {
    let start = start_date?.and_time(NaiveTime::MIN);
    match duration {
        Some(days) if days != 0.0 => {
            let span = Duration::microseconds((days * MICROS_PER_DAY).round() as i64)
                - Duration::seconds(1);
            start.checked_add_signed(span)
        }
        _ => Some(start),
    }
}

/// Inclusive day count between the start date and an edited end date.
pub fn duration_from_end_date(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDateTime>,
) -> Option<f64> {
    let start = start_date?.and_time(NaiveTime::MIN);
    let end = end_date?;
    let days = (end - start).num_seconds().div_euclid(SECONDS_PER_DAY);
    Some((days + 1) as f64)
}

pub fn seat_warning(seats: i32, attendees: usize) -> Option<Warning> {
    if seats < 0 {
        return Some(Warning {
            title: "Incorrect 'seats' value".to_string(),
            message: "The seat count may not be negative".to_string(),
        });
    }
    if (seats as usize) < attendees {
        return Some(Warning {
            title: "Too many attendees".to_string(),
            message: "Increase seats or reduce attendee count".to_string(),
        });
    }
    None
}

pub fn check_instructor_not_attending(
    instructor_id: Option<&str>,
    attendee_ids: &BTreeSet<String>,
) -> Result<(), AppError> {
    match instructor_id {
        Some(instructor) if attendee_ids.contains(instructor) => {
            Err(AppError::Validation(INSTRUCTOR_IS_ATTENDEE.to_string()))
        }
        _ => Ok(()),
    }
}

fn date_to_instant(date: Option<NaiveDate>) -> Option<NaiveDateTime> {
    date.map(|d| d.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SessionRow {
    pub id: String,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub duration: Option<f64>,
    pub end_date: Option<NaiveDateTime>,
    pub seats: i32,
    pub active: bool,
    pub instructor_id: Option<String>,
    pub course_id: String,
    pub attendees_count: i64,
    pub color: i32,
    pub updated_at: String,
}

impl SessionRow {
    pub fn into_session(self, attendee_ids: BTreeSet<String>) -> Session {
        Session {
            taken_seats: taken_seats(self.seats, attendee_ids.len()),
            id: self.id,
            name: self.name,
            start_date: self.start_date,
            duration: self.duration,
            end_date: self.end_date,
            seats: self.seats,
            active: self.active,
            instructor_id: self.instructor_id,
            course_id: self.course_id,
            attendee_ids,
            attendees_count: self.attendees_count,
            color: self.color,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionRequest {
    pub name: String,
    pub course_id: String,
    /// Omitted means today; an explicit `null` leaves the session undated.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start_date: Option<Option<NaiveDate>>,
    pub duration: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub seats: Option<i32>,
    pub active: Option<bool>,
    pub instructor_id: Option<String>,
    #[serde(default)]
    pub attendee_ids: BTreeSet<String>,
    pub color: Option<i32>,
}

impl NewSessionRequest {
    /// Builds the session to insert; an omitted start date becomes `today`.
    pub fn into_session(self, id: String, today: NaiveDate) -> Session {
        let mut session = Session::new(
            id,
            self.name,
            self.course_id,
            self.start_date.unwrap_or(Some(today)),
        );

        let mut changes = vec![
            SessionChange::Duration(self.duration),
            SessionChange::Seats(self.seats.unwrap_or(0)),
            SessionChange::Active(self.active.unwrap_or(true)),
            SessionChange::Instructor(self.instructor_id),
            SessionChange::Attendees(self.attendee_ids),
            SessionChange::Color(self.color.unwrap_or(0)),
        ];
        if let Some(end_date) = self.end_date {
            changes.push(SessionChange::EndDate(date_to_instant(Some(end_date))));
        }

        session.apply_all(changes);
        session
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    pub name: Option<String>,
    pub course_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub duration: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<NaiveDate>>,
    pub seats: Option<i32>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub instructor_id: Option<Option<String>>,
    pub attendee_ids: Option<BTreeSet<String>>,
    pub color: Option<i32>,
}

impl UpdateSessionRequest {
    /// Field edits in application order. The end date goes last so it wins
    /// over a duration edited in the same request.
    pub fn into_changes(self) -> Vec<SessionChange> {
        let mut changes = Vec::new();
        if let Some(name) = self.name {
            changes.push(SessionChange::Name(name));
        }
        if let Some(course_id) = self.course_id {
            changes.push(SessionChange::Course(course_id));
        }
        if let Some(start_date) = self.start_date {
            changes.push(SessionChange::StartDate(start_date));
        }
        if let Some(duration) = self.duration {
            changes.push(SessionChange::Duration(duration));
        }
        if let Some(seats) = self.seats {
            changes.push(SessionChange::Seats(seats));
        }
        if let Some(active) = self.active {
            changes.push(SessionChange::Active(active));
        }
        if let Some(instructor_id) = self.instructor_id {
            changes.push(SessionChange::Instructor(instructor_id));
        }
        if let Some(attendee_ids) = self.attendee_ids {
            changes.push(SessionChange::Attendees(attendee_ids));
        }
        if let Some(color) = self.color {
            changes.push(SessionChange::Color(color));
        }
        if let Some(end_date) = self.end_date {
            changes.push(SessionChange::EndDate(date_to_instant(end_date)));
        }
        changes
    }
}

/// Form state of a session being edited interactively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnchangeRequest {
    pub start_date: Option<NaiveDate>,
    pub duration: Option<f64>,
    /// Set only when the end date itself was edited.
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub seats: i32,
    #[serde(default)]
    pub attendee_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnchangeResponse {
    pub duration: Option<f64>,
    pub end_date: Option<NaiveDateTime>,
    pub attendees_count: i64,
    pub taken_seats: f64,
    pub warning: Option<Warning>,
}

impl OnchangeRequest {
    pub fn evaluate(self) -> OnchangeResponse {
        let mut draft = Session::new(String::new(), String::new(), String::new(), self.start_date);
        draft.apply_all([
            SessionChange::Duration(self.duration),
            SessionChange::Seats(self.seats),
            SessionChange::Attendees(self.attendee_ids),
        ]);
        if let Some(end_date) = self.end_date {
            draft.apply(SessionChange::EndDate(date_to_instant(Some(end_date))));
        }

        OnchangeResponse {
            warning: draft.seat_warning(),
            duration: draft.duration,
            end_date: draft.end_date,
            attendees_count: draft.attendees_count,
            taken_seats: draft.taken_seats,
        }
    }
}
