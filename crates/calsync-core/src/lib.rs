//! Core types: time intervals, appointments, availability, tracing

pub mod availability;
pub mod error;
pub mod event;
pub mod time;
pub mod tracing;

pub use availability::{AvailabilityWindow, conflicts, has_conflict, merge_busy};
pub use error::{DomainError, DomainResult};
pub use event::{
    APPOINTMENT_COLOR_ID, APPOINTMENT_TITLE_PREFIX, AppointmentDetails, AppointmentRequest,
    BusyInterval, CalendarEvent, NewAppointment, ValidationContext,
};
pub use time::{
    BusinessHours, TimeInterval, local_to_utc, parse_date, parse_instant, parse_timezone,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

pub use chrono_tz::Tz;
