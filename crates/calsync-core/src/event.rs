//! Appointment and calendar event types.
//!
//! This module provides:
//! - [`NewAppointment`]: the raw request shape, as received from a caller
//! - [`AppointmentRequest`]: a validated appointment, only obtainable through
//!   [`NewAppointment::validate`]
//! - [`CalendarEvent`]: the provider-agnostic event representation, with
//!   optional [`AppointmentDetails`] metadata
//! - [`BusyInterval`]: an occupied range reported by the calendar provider

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DomainError, DomainResult};
use crate::time::{TimeInterval, parse_timezone};

/// Title prefix used for every appointment event.
pub const APPOINTMENT_TITLE_PREFIX: &str = "Appointment - ";

/// Google Calendar color id used for appointments (blue).
pub const APPOINTMENT_COLOR_ID: &str = "9";

/// Maximum length of a client name, in characters.
pub const MAX_CLIENT_NAME_LEN: usize = 100;
/// Maximum length of a service type, in characters.
pub const MAX_SERVICE_TYPE_LEN: usize = 200;
/// Maximum length of appointment notes, in characters.
pub const MAX_NOTES_LEN: usize = 500;
/// Minimum number of digits in a phone number.
pub const MIN_PHONE_DIGITS: usize = 10;
/// Maximum length of a phone number as typed, in characters.
pub const MAX_PHONE_LEN: usize = 20;

/// An appointment request as received from the request layer, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub client_name: String,
    pub phone_number: String,
    pub service_type: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    /// IANA timezone name; the configured default is used when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Context needed to validate a [`NewAppointment`].
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// Timezone applied when the request names none.
    pub default_timezone: Tz,
    /// Appointments starting before this instant are rejected, if set.
    pub not_before: Option<DateTime<Utc>>,
}

impl ValidationContext {
    /// Creates a context that accepts any start time.
    pub fn new(default_timezone: Tz) -> Self {
        Self {
            default_timezone,
            not_before: None,
        }
    }

    /// Builder method to reject appointments starting before `instant`.
    pub fn with_not_before(mut self, instant: DateTime<Utc>) -> Self {
        self.not_before = Some(instant);
        self
    }
}

impl NewAppointment {
    /// Creates a new appointment draft.
    pub fn new(
        client_name: impl Into<String>,
        phone_number: impl Into<String>,
        service_type: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            phone_number: phone_number.into(),
            service_type: service_type.into(),
            start,
            end,
            notes: None,
            timezone: None,
        }
    }

    /// Builder method to set notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Builder method to set the timezone name.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Checks every field and produces a validated [`AppointmentRequest`].
    ///
    /// # Errors
    ///
    /// - [`DomainError::Validation`] for malformed fields or a past start time
    /// - [`DomainError::InvalidTimezone`] for an unknown timezone name
    /// - [`DomainError::InvalidInterval`] if `end <= start`
    pub fn validate(self, ctx: &ValidationContext) -> DomainResult<AppointmentRequest> {
        let client_name = required_text("client_name", &self.client_name, MAX_CLIENT_NAME_LEN)?;
        let phone_number = validate_phone(&self.phone_number)?;
        let service_type =
            required_text("service_type", &self.service_type, MAX_SERVICE_TYPE_LEN)?;

        let notes = match self.notes.as_deref().map(str::trim) {
            Some(n) if n.chars().count() > MAX_NOTES_LEN => {
                return Err(DomainError::validation(
                    "notes",
                    format!("must be at most {} characters", MAX_NOTES_LEN),
                ));
            }
            Some(n) if !n.is_empty() => Some(n.to_string()),
            _ => None,
        };

        let timezone = match self.timezone.as_deref() {
            Some(name) if !name.trim().is_empty() => parse_timezone(name)?,
            _ => ctx.default_timezone,
        };

        let interval = TimeInterval::new(self.start, self.end)?;

        if let Some(not_before) = ctx.not_before
            && interval.start() < not_before
        {
            return Err(DomainError::validation(
                "start",
                "start time cannot be in the past",
            ));
        }

        Ok(AppointmentRequest {
            details: AppointmentDetails {
                client_name,
                phone_number,
                service_type,
                notes,
            },
            interval,
            timezone,
        })
    }
}

fn required_text(field: &'static str, value: &str, max: usize) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(value.to_string())
}

fn validate_phone(value: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.chars().count() > MAX_PHONE_LEN {
        return Err(DomainError::validation(
            "phone_number",
            format!("must be at most {} characters", MAX_PHONE_LEN),
        ));
    }
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if digits < MIN_PHONE_DIGITS {
        return Err(DomainError::validation(
            "phone_number",
            format!("must contain at least {} digits", MIN_PHONE_DIGITS),
        ));
    }
    Ok(value.to_string())
}

/// A validated appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentRequest {
    details: AppointmentDetails,
    interval: TimeInterval,
    timezone: Tz,
}

impl AppointmentRequest {
    /// Client, phone, service and notes.
    pub fn details(&self) -> &AppointmentDetails {
        &self.details
    }

    pub fn client_name(&self) -> &str {
        &self.details.client_name
    }

    pub fn service_type(&self) -> &str {
        &self.details.service_type
    }

    pub fn interval(&self) -> TimeInterval {
        self.interval
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Translates the appointment into the event sent to the calendar.
    pub fn to_event(&self) -> CalendarEvent {
        CalendarEvent::new(
            format!("{}{}", APPOINTMENT_TITLE_PREFIX, self.details.client_name),
            self.interval,
        )
        .with_description(self.details.render_description())
        .with_timezone(self.timezone)
        .with_color_id(APPOINTMENT_COLOR_ID)
        .with_appointment(self.details.clone())
    }
}

/// Appointment-specific metadata carried by a [`CalendarEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub client_name: String,
    pub phone_number: String,
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl AppointmentDetails {
    /// Renders the human-readable event description.
    pub fn render_description(&self) -> String {
        let mut out = String::from("📋 APPOINTMENT INFORMATION\n\n");
        out.push_str(&format!("👤 Client: {}\n", self.client_name));
        out.push_str(&format!("📞 Phone: {}\n", self.phone_number));
        out.push_str(&format!("🛠️ Service: {}\n", self.service_type));
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            out.push_str(&format!("\n📝 Notes: {}\n", notes));
        }
        out
    }
}

/// A calendar event, before or after creation by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-assigned id; absent until created.
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub interval: TimeInterval,
    /// Zone the event was scheduled in.
    pub timezone: Option<Tz>,
    /// Spans whole local days in `timezone` rather than fixed instants.
    #[serde(default)]
    pub all_day: bool,
    /// Link to the event in the provider's UI.
    pub link: Option<Url>,
    pub color_id: Option<String>,
    /// Present for events created from an appointment.
    pub appointment: Option<AppointmentDetails>,
}

impl CalendarEvent {
    /// Creates a new event with a title and interval.
    pub fn new(title: impl Into<String>, interval: TimeInterval) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            location: None,
            interval,
            timezone: None,
            all_day: false,
            link: None,
            color_id: None,
            appointment: None,
        }
    }

    /// Builder method to set the provider id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// Builder method to set the provider link.
    pub fn with_link(mut self, link: Url) -> Self {
        self.link = Some(link);
        self
    }

    /// Builder method to set the color id.
    pub fn with_color_id(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }

    /// Builder method to attach appointment metadata.
    pub fn with_appointment(mut self, details: AppointmentDetails) -> Self {
        self.appointment = Some(details);
        self
    }

    /// Marks the event as spanning whole days.
    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    /// Returns a copy scheduled at `interval`.
    ///
    /// The copy is a timed event even if the original spanned whole days.
    pub fn with_interval(mut self, interval: TimeInterval) -> Self {
        self.interval = interval;
        self.all_day = false;
        self
    }

    /// Replaces the appointment notes and regenerates the description.
    ///
    /// Events without appointment metadata get the notes as their description.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        let notes = notes.trim();
        match self.appointment.as_mut() {
            Some(details) => {
                details.notes = (!notes.is_empty()).then(|| notes.to_string());
                self.description = Some(details.render_description());
            }
            None => self.description = Some(notes.to_string()),
        }
        self
    }

    /// True if the event was created as an appointment.
    pub fn is_appointment(&self) -> bool {
        self.appointment.is_some() || self.title.starts_with(APPOINTMENT_TITLE_PREFIX)
    }
}

/// An occupied range reported by the calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub interval: TimeInterval,
    /// Id of the event occupying the range, when known.
    pub event_id: Option<String>,
}

impl BusyInterval {
    /// Creates a busy interval without a source event.
    pub fn new(interval: TimeInterval) -> Self {
        Self {
            interval,
            event_id: None,
        }
    }

    /// Builder method to set the source event id.
    pub fn with_event_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = Some(id.into());
        self
    }
}

impl From<TimeInterval> for BusyInterval {
    fn from(interval: TimeInterval) -> Self {
        Self::new(interval)
    }
}

impl From<&CalendarEvent> for BusyInterval {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            interval: event.interval,
            event_id: event.id.clone(),
        }
    }
}
