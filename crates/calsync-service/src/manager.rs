//! The appointment manager.
//!
//! Validates requests, consults the calendar for conflicts and free slots,
//! and forwards appointments to the calendar provider. Every provider call
//! is bounded by the configured timeout. The manager keeps no state between
//! calls besides its configuration, so concurrent requests may race between
//! the conflict check and the create; that race is accepted.

use std::future::Future;
use std::sync::Arc;

use calsync_core::event::MAX_NOTES_LEN;
use calsync_core::{
    APPOINTMENT_TITLE_PREFIX, AvailabilityWindow, BusyInterval, CalendarEvent, DomainError,
    NewAppointment, TimeInterval, ValidationContext, conflicts,
};
use calsync_providers::{CalendarProvider, ProviderResult};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConflictPolicy, ManagerConfig};
use crate::error::{AppointmentError, AppointmentResult};

/// Outcome of [`AppointmentManager::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    /// The calendar answered.
    Healthy {
        calendar_name: String,
        timezone: Option<String>,
    },
    /// The calendar could not be reached.
    Degraded { reason: String },
}

/// Health of the calendar connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub business_name: String,
    pub provider: String,
    pub calendar_id: String,
    #[serde(flatten)]
    pub status: HealthStatus,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy { .. })
    }
}

/// Books appointments into an external calendar.
#[derive(Clone)]
pub struct AppointmentManager {
    provider: Arc<dyn CalendarProvider>,
    config: ManagerConfig,
}

impl std::fmt::Debug for AppointmentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppointmentManager")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl AppointmentManager {
    pub fn new(provider: Arc<dyn CalendarProvider>, config: ManagerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn calendar_id(&self) -> &str {
        &self.config.calendar_id
    }

    /// Runs a provider call under the configured timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = ProviderResult<T>>,
    ) -> AppointmentResult<T> {
        debug!(
            provider = self.provider.name(),
            calendar_id = self.calendar_id(),
            operation,
            "calendar request"
        );
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AppointmentError::external(operation, e)),
            Err(_) => Err(AppointmentError::Timeout {
                operation,
                after: self.config.call_timeout,
            }),
        }
    }

    /// Like [`call`](Self::call), but reports a missing event as `NotFound`.
    async fn call_for_event<T>(
        &self,
        operation: &'static str,
        event_id: &str,
        call: impl Future<Output = ProviderResult<T>>,
    ) -> AppointmentResult<T> {
        self.call(operation, call).await.map_err(|e| match e {
            AppointmentError::ExternalService { ref source, .. } if source.is_not_found() => {
                AppointmentError::NotFound {
                    event_id: event_id.to_string(),
                }
            }
            other => other,
        })
    }

    fn validation_context(&self, now: DateTime<Utc>) -> ValidationContext {
        let ctx = ValidationContext::new(self.config.default_timezone);
        if self.config.reject_past_start {
            ctx.with_not_before(now)
        } else {
            ctx
        }
    }

    /// Busy intervals overlapping `interval`, minus the event being moved.
    async fn conflicts_for(
        &self,
        interval: TimeInterval,
        ignore_event: Option<&str>,
    ) -> AppointmentResult<Vec<BusyInterval>> {
        let busy = self
            .call("list_busy", self.provider.list_busy(self.calendar_id(), interval))
            .await?;
        Ok(conflicts(&interval, &busy)
            .into_iter()
            .filter(|b| ignore_event.is_none() || b.event_id.as_deref() != ignore_event)
            .cloned()
            .collect())
    }

    /// Applies the conflict policy when availability checking is on.
    async fn enforce_availability(
        &self,
        interval: TimeInterval,
        ignore_event: Option<&str>,
    ) -> AppointmentResult<()> {
        if !self.config.check_availability {
            return Ok(());
        }

        let conflicts = self.conflicts_for(interval, ignore_event).await?;
        if conflicts.is_empty() {
            return Ok(());
        }

        match self.config.conflict_policy {
            ConflictPolicy::Block => Err(AppointmentError::Conflict { conflicts }),
            ConflictPolicy::Advisory => {
                warn!(
                    interval = %interval,
                    conflicts = conflicts.len(),
                    "requested time overlaps existing events, booking anyway"
                );
                Ok(())
            }
        }
    }

    /// Validates and books an appointment.
    ///
    /// Invalid requests are rejected before any calendar call. When
    /// availability checking is on, a failed busy lookup aborts the booking
    /// under either conflict policy; nothing is written to a calendar that
    /// could not be read.
    pub async fn create_appointment(
        &self,
        request: NewAppointment,
    ) -> AppointmentResult<CalendarEvent> {
        self.create_appointment_at(request, Utc::now()).await
    }

    /// [`create_appointment`](Self::create_appointment) with an explicit "now".
    pub async fn create_appointment_at(
        &self,
        request: NewAppointment,
        now: DateTime<Utc>,
    ) -> AppointmentResult<CalendarEvent> {
        let request = request.validate(&self.validation_context(now))?;
        let interval = request.interval();

        self.enforce_availability(interval, None).await?;

        let event = request.to_event().with_color_id(&self.config.color_id);
        let created = self
            .call(
                "create_event",
                self.provider.create_event(self.calendar_id(), event),
            )
            .await?;

        info!(
            event_id = created.id.as_deref().unwrap_or_default(),
            client = request.client_name(),
            service = request.service_type(),
            start = %interval.start(),
            "appointment created"
        );
        Ok(created)
    }

    /// Every event overlapping `interval`, as the calendar returns them.
    pub async fn list_appointments_for_range(
        &self,
        interval: TimeInterval,
    ) -> AppointmentResult<Vec<CalendarEvent>> {
        self.call(
            "list_events",
            self.provider.list_events(self.calendar_id(), interval),
        )
        .await
    }

    async fn appointments_in(&self, interval: TimeInterval) -> AppointmentResult<Vec<CalendarEvent>> {
        let mut events = self.list_appointments_for_range(interval).await?;
        events.retain(|e| e.title.starts_with(APPOINTMENT_TITLE_PREFIX));
        Ok(events)
    }

    /// Appointments on a local business day.
    pub async fn appointments_for_day(
        &self,
        date: NaiveDate,
    ) -> AppointmentResult<Vec<CalendarEvent>> {
        let tz = self.config.business_hours.timezone();
        self.appointments_in(TimeInterval::for_date(date, &tz)?).await
    }

    /// Appointments in the seven local days starting at `start`.
    pub async fn appointments_for_week(
        &self,
        start: NaiveDate,
    ) -> AppointmentResult<Vec<CalendarEvent>> {
        let tz = self.config.business_hours.timezone();
        self.appointments_in(TimeInterval::week_from(start, &tz)?).await
    }

    /// Free slots of at least `requested` within business hours on `date`.
    pub async fn find_available_slots(
        &self,
        date: NaiveDate,
        requested: Duration,
    ) -> AppointmentResult<Vec<TimeInterval>> {
        if requested <= Duration::zero() {
            return Err(DomainError::InvalidDuration {
                minutes: requested.num_minutes(),
            }
            .into());
        }

        let window = self.config.business_hours.window_on(date)?;
        let busy = self
            .call("list_busy", self.provider.list_busy(self.calendar_id(), window))
            .await?;
        let slots = AvailabilityWindow::from(window).free_slots(&busy, requested)?;

        debug!(
            %date,
            busy = busy.len(),
            slots = slots.len(),
            "computed free slots"
        );
        Ok(slots)
    }

    /// Busy intervals that overlap `interval`; empty when the time is free.
    pub async fn check_availability(
        &self,
        interval: TimeInterval,
    ) -> AppointmentResult<Vec<BusyInterval>> {
        self.conflicts_for(interval, None).await
    }

    /// Deletes an appointment.
    ///
    /// # Errors
    ///
    /// Returns [`AppointmentError::NotFound`] if the calendar has no such event.
    pub async fn cancel_appointment(&self, event_id: &str) -> AppointmentResult<()> {
        let event_id = require_event_id(event_id)?;
        self.call_for_event(
            "delete_event",
            event_id,
            self.provider.delete_event(self.calendar_id(), event_id),
        )
        .await?;
        info!(event_id, "appointment cancelled");
        Ok(())
    }

    /// Moves an appointment to a new interval.
    pub async fn reschedule_appointment(
        &self,
        event_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppointmentResult<CalendarEvent> {
        self.reschedule_appointment_at(event_id, start, end, Utc::now())
            .await
    }

    /// [`reschedule_appointment`](Self::reschedule_appointment) with an explicit "now".
    pub async fn reschedule_appointment_at(
        &self,
        event_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppointmentResult<CalendarEvent> {
        let event_id = require_event_id(event_id)?;
        let interval = TimeInterval::new(start, end)?;
        if self.config.reject_past_start && interval.start() < now {
            return Err(DomainError::validation("start", "start time cannot be in the past").into());
        }

        let event = self.fetch(event_id).await?;
        self.enforce_availability(interval, Some(event_id)).await?;

        let previous = event.interval;
        let updated = self
            .call_for_event(
                "update_event",
                event_id,
                self.provider
                    .update_event(self.calendar_id(), event.with_interval(interval)),
            )
            .await?;

        info!(event_id, from = %previous, to = %interval, "appointment rescheduled");
        Ok(updated)
    }

    /// Replaces the notes of an appointment and regenerates its description.
    pub async fn update_notes(
        &self,
        event_id: &str,
        notes: &str,
    ) -> AppointmentResult<CalendarEvent> {
        let event_id = require_event_id(event_id)?;
        if notes.trim().chars().count() > MAX_NOTES_LEN {
            return Err(DomainError::validation(
                "notes",
                format!("must be at most {} characters", MAX_NOTES_LEN),
            )
            .into());
        }

        let event = self.fetch(event_id).await?;
        let updated = self
            .call_for_event(
                "update_event",
                event_id,
                self.provider
                    .update_event(self.calendar_id(), event.with_notes(notes)),
            )
            .await?;

        info!(event_id, "appointment notes updated");
        Ok(updated)
    }

    async fn fetch(&self, event_id: &str) -> AppointmentResult<CalendarEvent> {
        self.call_for_event(
            "get_event",
            event_id,
            self.provider.get_event(self.calendar_id(), event_id),
        )
        .await
    }

    /// Probes the calendar. Never fails; problems are reported as `Degraded`.
    pub async fn health_check(&self) -> HealthReport {
        let status = match self
            .call(
                "calendar_info",
                self.provider.calendar_info(self.calendar_id()),
            )
            .await
        {
            Ok(info) => HealthStatus::Healthy {
                calendar_name: info.name,
                timezone: info.timezone,
            },
            Err(e) => {
                warn!("calendar health check failed: {}", e);
                HealthStatus::Degraded {
                    reason: e.to_string(),
                }
            }
        };

        HealthReport {
            business_name: self.config.business_name.clone(),
            provider: self.provider.name().to_string(),
            calendar_id: self.config.calendar_id.clone(),
            status,
        }
    }
}

fn require_event_id(event_id: &str) -> AppointmentResult<&str> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(DomainError::validation("event_id", "must not be empty").into());
    }
    Ok(event_id)
}
