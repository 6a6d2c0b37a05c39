//! The [`CalendarProvider`] trait.
//!
//! A provider is the only component that talks to an external calendar. The
//! appointment manager depends on this trait alone, so any backend (Google,
//! the in-memory store used in tests, or a stub that always fails) can be
//! swapped in without touching scheduling logic.

use std::future::Future;
use std::pin::Pin;

use calsync_core::{BusyInterval, CalendarEvent, TimeInterval};

use crate::error::{ProviderError, ProviderResult};

/// Information about a calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
    pub id: String,
    /// Human-readable name of the calendar.
    pub name: String,
    pub description: Option<String>,
    /// IANA timezone of the calendar.
    pub timezone: Option<String>,
}

impl CalendarInfo {
    /// Creates a new CalendarInfo with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            timezone: None,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set timezone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// A boxed future for async trait methods.
///
/// Boxing keeps the trait object-safe so the manager can hold an
/// `Arc<dyn CalendarProvider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations an external calendar must support.
///
/// All instants are UTC. Implementations handle pagination and
/// authentication internally and report failures as [`ProviderError`]s
/// classified by [`ProviderErrorCode`](crate::ProviderErrorCode).
pub trait CalendarProvider: Send + Sync {
    /// Returns the name of this provider (e.g. "google", "memory").
    fn name(&self) -> &str;

    /// Returns the intervals during which the calendar is occupied.
    ///
    /// The default implementation derives them from [`list_events`]; providers
    /// that know about free ("transparent") or cancelled events override it to
    /// leave those out.
    ///
    /// [`list_events`]: CalendarProvider::list_events
    fn list_busy<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
        Box::pin(async move {
            let events = self.list_events(calendar_id, window).await?;
            Ok(events.iter().map(BusyInterval::from).collect())
        })
    }

    /// Lists events overlapping `window`, ordered by start.
    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>>;

    /// Fetches a single event.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the event does not exist.
    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>>;

    /// Creates an event and returns it as stored, with id and link set.
    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>>;

    /// Replaces an existing event. `event.id` must be set.
    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>>;

    /// Deletes an event.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the event does not exist.
    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>>;

    /// Describes the calendar. Used as a cheap connectivity probe.
    fn calendar_info<'a>(&'a self, calendar_id: &'a str)
    -> BoxFuture<'a, ProviderResult<CalendarInfo>>;
}

/// Returns the id of an event about to be updated.
pub(crate) fn require_event_id(event: &CalendarEvent) -> ProviderResult<&str> {
    event
        .id
        .as_deref()
        .ok_or_else(|| ProviderError::bad_request("cannot update an event without an id"))
}

/// A provider that always returns an error.
///
/// Stands in for a backend that failed to initialize, and lets tests
/// exercise failure paths.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn fail<'a, T: Send + 'a>(&self) -> BoxFuture<'a, ProviderResult<T>> {
        // ProviderError is not Clone; rebuild it from its parts.
        let mut error = match self.error.status() {
            Some(status) => ProviderError::from_http_status(status, self.error.message()),
            None => ProviderError::new(self.error.code(), self.error.message()),
        };
        error = error.with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }
}

impl CalendarProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_busy<'a>(
        &'a self,
        _calendar_id: &'a str,
        _window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
        self.fail()
    }

    fn list_events<'a>(
        &'a self,
        _calendar_id: &'a str,
        _window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
        self.fail()
    }

    fn get_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        _event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        self.fail()
    }

    fn create_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        _event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        self.fail()
    }

    fn update_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        _event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        self.fail()
    }

    fn delete_event<'a>(
        &'a self,
        _calendar_id: &'a str,
        _event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.fail()
    }

    fn calendar_info<'a>(
        &'a self,
        _calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        self.fail()
    }
}
