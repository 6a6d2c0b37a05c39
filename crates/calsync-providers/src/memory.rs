//! An in-process calendar.
//!
//! [`MemoryProvider`] keeps events in a map keyed by calendar id. It backs the
//! `--provider memory` CLI mode and the service integration tests, and counts
//! the calls it receives so tests can assert that rejected requests never
//! reached the calendar.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use calsync_core::{CalendarEvent, TimeInterval};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarInfo, CalendarProvider, require_event_id};

/// Calendar backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    calendars: RwLock<HashMap<String, Vec<CalendarEvent>>>,
    requests: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the calendar with an event, assigning an id if it has none.
    pub fn with_event(self, calendar_id: &str, event: CalendarEvent) -> Self {
        let event = self.stored(calendar_id, event);
        self.calendars
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(calendar_id.to_string())
            .or_default()
            .push(event);
        self
    }

    /// Snapshot of every event in a calendar, ordered by start.
    pub fn events(&self, calendar_id: &str) -> Vec<CalendarEvent> {
        let calendars = self.calendars.read().unwrap_or_else(|e| e.into_inner());
        let mut events = calendars.get(calendar_id).cloned().unwrap_or_default();
        events.sort_by_key(|e| e.interval);
        events
    }

    /// Number of trait calls received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &str, calendar_id: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!(operation, calendar_id, "memory calendar request");
    }

    fn stored(&self, calendar_id: &str, mut event: CalendarEvent) -> CalendarEvent {
        let id = event
            .id
            .get_or_insert_with(|| Uuid::new_v4().simple().to_string())
            .clone();
        if event.link.is_none() {
            event.link = event_link(calendar_id, &id);
        }
        event
    }

    fn not_found(event_id: &str) -> ProviderError {
        ProviderError::not_found(format!("event {} not found", event_id)).with_provider("memory")
    }
}

fn event_link(calendar_id: &str, event_id: &str) -> Option<Url> {
    Url::parse(&format!(
        "memory:///{}/{}",
        urlencoding::encode(calendar_id),
        event_id
    ))
    .ok()
}

impl CalendarProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
        self.record("list_events", calendar_id);
        let events = self
            .events(calendar_id)
            .into_iter()
            .filter(|e| e.interval.overlaps(&window))
            .collect();
        Box::pin(async move { Ok(events) })
    }

    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        self.record("get_event", calendar_id);
        let found = self
            .events(calendar_id)
            .into_iter()
            .find(|e| e.id.as_deref() == Some(event_id))
            .ok_or_else(|| Self::not_found(event_id));
        Box::pin(async move { found })
    }

    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        self.record("create_event", calendar_id);
        let event = self.stored(calendar_id, event);
        self.calendars
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(calendar_id.to_string())
            .or_default()
            .push(event.clone());
        Box::pin(async move { Ok(event) })
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        self.record("update_event", calendar_id);
        let result = require_event_id(&event).map(str::to_string).and_then(|id| {
            let mut calendars = self.calendars.write().unwrap_or_else(|e| e.into_inner());
            let slot = calendars
                .get_mut(calendar_id)
                .and_then(|events| events.iter_mut().find(|e| e.id.as_deref() == Some(id.as_str())))
                .ok_or_else(|| Self::not_found(&id))?;
            let mut event = event;
            if event.link.is_none() {
                event.link = slot.link.clone();
            }
            *slot = event.clone();
            Ok(event)
        });
        Box::pin(async move { result })
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        self.record("delete_event", calendar_id);
        let mut calendars = self.calendars.write().unwrap_or_else(|e| e.into_inner());
        let result = match calendars.get_mut(calendar_id) {
            Some(events) => match events.iter().position(|e| e.id.as_deref() == Some(event_id)) {
                Some(index) => {
                    events.remove(index);
                    Ok(())
                }
                None => Err(Self::not_found(event_id)),
            },
            None => Err(Self::not_found(event_id)),
        };
        Box::pin(async move { result })
    }

    fn calendar_info<'a>(
        &'a self,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        self.record("calendar_info", calendar_id);
        let info = CalendarInfo::new(calendar_id, "In-memory calendar");
        Box::pin(async move { Ok(info) })
    }
}
