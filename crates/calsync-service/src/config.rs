//! Appointment manager configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use calsync_core::{APPOINTMENT_COLOR_ID, BusinessHours, Tz};

/// What to do when a new appointment overlaps a busy interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Log a warning and create the event anyway.
    #[default]
    Advisory,
    /// Refuse to create the event.
    Block,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advisory => "advisory",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" | "warn" => Ok(Self::Advisory),
            "block" | "reject" => Ok(Self::Block),
            other => Err(format!(
                "unknown conflict policy '{}', expected 'advisory' or 'block'",
                other
            )),
        }
    }
}

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Calendar that receives the appointments.
    pub calendar_id: String,

    /// Opening hours used for slot search and day/week listings.
    pub business_hours: BusinessHours,

    /// Zone applied to appointments that do not name one.
    pub default_timezone: Tz,

    pub conflict_policy: ConflictPolicy,

    /// Whether create and reschedule look for overlapping events first.
    pub check_availability: bool,

    /// Upper bound on each provider call.
    pub call_timeout: Duration,

    /// Reject appointments that start before the current instant.
    pub reject_past_start: bool,

    /// Calendar color id for created appointments.
    pub color_id: String,

    /// Shown in health reports and CLI output.
    pub business_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let business_hours = BusinessHours::default();
        Self {
            calendar_id: "primary".to_string(),
            default_timezone: business_hours.timezone(),
            business_hours,
            conflict_policy: ConflictPolicy::default(),
            check_availability: true,
            call_timeout: Duration::from_secs(30),
            reject_past_start: true,
            color_id: APPOINTMENT_COLOR_ID.to_string(),
            business_name: "My Business".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration targeting the given calendar.
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            ..Default::default()
        }
    }

    /// Builder: set business hours. Also sets the default timezone.
    pub fn with_business_hours(mut self, hours: BusinessHours) -> Self {
        self.default_timezone = hours.timezone();
        self.business_hours = hours;
        self
    }

    pub fn with_default_timezone(mut self, timezone: Tz) -> Self {
        self.default_timezone = timezone;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_check_availability(mut self, check: bool) -> Self {
        self.check_availability = check;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_reject_past_start(mut self, reject: bool) -> Self {
        self.reject_past_start = reject;
        self
    }

    pub fn with_color_id(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = color_id.into();
        self
    }

    pub fn with_business_name(mut self, name: impl Into<String>) -> Self {
        self.business_name = name.into();
        self
    }
}
