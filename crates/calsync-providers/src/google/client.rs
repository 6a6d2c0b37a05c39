//! Google Calendar v3 HTTP client.
//!
//! Translates between [`CalendarEvent`] and the API's event resource.
//! Appointment metadata is stored in the event's private extended properties
//! so it survives a round trip through the calendar.

use std::collections::BTreeMap;
use std::time::Duration;

use calsync_core::{
    AppointmentDetails, BusyInterval, CalendarEvent, TimeInterval, Tz, local_to_utc,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::provider::CalendarInfo;

const PROP_CLIENT_NAME: &str = "calsync_client_name";
const PROP_PHONE_NUMBER: &str = "calsync_phone_number";
const PROP_SERVICE_TYPE: &str = "calsync_service_type";
const PROP_NOTES: &str = "calsync_notes";

/// Page size for events.list.
const MAX_RESULTS: &str = "250";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(
        api_base: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::caused_by(
                    ProviderErrorCode::InternalError,
                    "failed to build HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            http_client,
            api_base: api_base.into(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Lists events overlapping `window`, following pagination.
    ///
    /// Recurring events are expanded server-side into single instances.
    async fn list_raw(
        &self,
        token: &str,
        calendar_id: &str,
        window: TimeInterval,
    ) -> ProviderResult<(Vec<ApiEvent>, Tz)> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut timezone = Tz::UTC;

        loop {
            let mut request = self
                .http_client
                .get(self.events_url(calendar_id))
                .bearer_auth(token)
                .query(&[
                    ("timeMin", window.start().to_rfc3339()),
                    ("timeMax", window.end().to_rfc3339()),
                    ("singleEvents", "true".to_string()),
                    ("orderBy", "startTime".to_string()),
                    ("maxResults", MAX_RESULTS.to_string()),
                ]);
            if let Some(ref page) = page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let page: EventListResponse = read_json(send(request).await?).await?;
            if let Some(tz) = page.time_zone.as_deref().and_then(|name| name.parse().ok()) {
                timezone = tz;
            }
            items.extend(page.items);

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(calendar_id, count = items.len(), "listed google events");
        Ok((items, timezone))
    }

    pub async fn list_events(
        &self,
        token: &str,
        calendar_id: &str,
        window: TimeInterval,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let (items, timezone) = self.list_raw(token, calendar_id, window).await?;
        Ok(items
            .into_iter()
            .filter(|e| !e.is_cancelled())
            .filter_map(|e| e.into_calendar_event(timezone))
            .collect())
    }

    /// Lists the intervals that block the calendar.
    ///
    /// Cancelled events and events marked "free" (transparent) are skipped.
    pub async fn list_busy(
        &self,
        token: &str,
        calendar_id: &str,
        window: TimeInterval,
    ) -> ProviderResult<Vec<BusyInterval>> {
        let (items, timezone) = self.list_raw(token, calendar_id, window).await?;
        Ok(items
            .into_iter()
            .filter(ApiEvent::is_blocking)
            .filter_map(|e| e.into_calendar_event(timezone))
            .map(|e| BusyInterval::from(&e))
            .collect())
    }

    pub async fn get_event(
        &self,
        token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> ProviderResult<CalendarEvent> {
        let request = self
            .http_client
            .get(self.event_url(calendar_id, event_id))
            .bearer_auth(token);
        let event: ApiEvent = read_json(send(request).await?).await?;
        if event.is_cancelled() {
            return Err(ProviderError::not_found(format!(
                "event {} was cancelled",
                event_id
            )));
        }
        // A single event carries no calendar zone; whole-day dates need one.
        let timezone = if event.start.is_date_only() {
            self.calendar_timezone(token, calendar_id).await?
        } else {
            Tz::UTC
        };
        event.into_calendar_event(timezone).ok_or_else(|| {
            ProviderError::invalid_response(format!("event {} has no usable times", event_id))
        })
    }

    pub async fn insert_event(
        &self,
        token: &str,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> ProviderResult<CalendarEvent> {
        let request = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(token)
            .json(&ApiEvent::from_calendar_event(event));
        self.read_written(request, event).await
    }

    /// Replaces an event (HTTP PUT).
    pub async fn update_event(
        &self,
        token: &str,
        calendar_id: &str,
        event_id: &str,
        event: &CalendarEvent,
    ) -> ProviderResult<CalendarEvent> {
        let request = self
            .http_client
            .put(self.event_url(calendar_id, event_id))
            .bearer_auth(token)
            .json(&ApiEvent::from_calendar_event(event));
        self.read_written(request, event).await
    }

    async fn read_written(
        &self,
        request: reqwest::RequestBuilder,
        sent: &CalendarEvent,
    ) -> ProviderResult<CalendarEvent> {
        let stored: ApiEvent = read_json(send(request).await?).await?;
        let timezone = sent.timezone.unwrap_or(Tz::UTC);
        stored.into_calendar_event(timezone).ok_or_else(|| {
            ProviderError::invalid_response("written event is missing id or times")
        })
    }

    pub async fn delete_event(
        &self,
        token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> ProviderResult<()> {
        let request = self
            .http_client
            .delete(self.event_url(calendar_id, event_id))
            .bearer_auth(token);
        send(request).await?;
        Ok(())
    }

    async fn calendar_timezone(&self, token: &str, calendar_id: &str) -> ProviderResult<Tz> {
        let info = self.calendar_info(token, calendar_id).await?;
        Ok(info
            .timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(Tz::UTC))
    }

    pub async fn calendar_info(&self, token: &str, calendar_id: &str) -> ProviderResult<CalendarInfo> {
        let url = format!(
            "{}/calendars/{}",
            self.api_base,
            urlencoding::encode(calendar_id)
        );
        let request = self.http_client.get(url).bearer_auth(token);
        let calendar: ApiCalendar = read_json(send(request).await?).await?;

        let mut info = CalendarInfo::new(calendar.id, calendar.summary.unwrap_or_default());
        info.description = calendar.description;
        info.timezone = calendar.time_zone;
        Ok(info)
    }
}

/// Sends a request and turns non-success statuses into classified errors.
async fn send(request: reqwest::RequestBuilder) -> ProviderResult<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::timeout("request timeout")
        } else if e.is_connect() {
            ProviderError::caused_by(ProviderErrorCode::NetworkError, "connection failed", e)
        } else {
            ProviderError::caused_by(ProviderErrorCode::NetworkError, "request failed", e)
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response.text().await.unwrap_or_default();
    let mut message = api_error_message(&body).unwrap_or_else(|| format!("API error ({})", status));
    if let Some(seconds) = retry_after {
        message.push_str(&format!(", retry after {} seconds", seconds));
    }
    Err(ProviderError::from_http_status(status.as_u16(), message))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ProviderResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| {
            ProviderError::caused_by(ProviderErrorCode::NetworkError, "failed to read response", e)
        })?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::caused_by(ProviderErrorCode::InvalidResponse, "failed to parse response", e)
    })
}

/// Extracts `error.message` from a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
    /// The calendar's timezone.
    time_zone: Option<String>,
}

/// The calendars.get resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCalendar {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    time_zone: Option<String>,
}

/// An event resource, both as sent and as received.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    #[serde(skip_serializing)]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
    #[serde(skip_serializing)]
    html_link: Option<String>,
    #[serde(skip_serializing)]
    status: Option<String>,
    #[serde(skip_serializing)]
    transparency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extended_properties: Option<ApiExtendedProperties>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ApiExtendedProperties {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    private: BTreeMap<String, String>,
}

impl ApiEvent {
    fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    fn is_blocking(&self) -> bool {
        !self.is_cancelled() && self.transparency.as_deref() != Some("transparent")
    }

    fn from_calendar_event(event: &CalendarEvent) -> Self {
        let timezone = event.timezone.unwrap_or(Tz::UTC);
        let time = |instant: DateTime<Utc>| {
            let local = instant.with_timezone(&timezone);
            if event.all_day {
                ApiEventTime {
                    date: Some(local.format("%Y-%m-%d").to_string()),
                    ..ApiEventTime::default()
                }
            } else {
                ApiEventTime {
                    date: None,
                    date_time: Some(local.to_rfc3339()),
                    time_zone: Some(timezone.name().to_string()),
                }
            }
        };

        let extended_properties = event.appointment.as_ref().map(|details| {
            let mut private = BTreeMap::new();
            private.insert(PROP_CLIENT_NAME.to_string(), details.client_name.clone());
            private.insert(PROP_PHONE_NUMBER.to_string(), details.phone_number.clone());
            private.insert(PROP_SERVICE_TYPE.to_string(), details.service_type.clone());
            if let Some(ref notes) = details.notes {
                private.insert(PROP_NOTES.to_string(), notes.clone());
            }
            ApiExtendedProperties { private }
        });

        Self {
            summary: Some(event.title.clone()),
            description: event.description.clone(),
            location: event.location.clone(),
            start: time(event.interval.start()),
            end: time(event.interval.end()),
            color_id: event.color_id.clone(),
            extended_properties,
            ..Self::default()
        }
    }

    /// Converts to a [`CalendarEvent`].
    ///
    /// All-day events become local-midnight intervals in `calendar_tz` and
    /// keep that zone so they are written back as dates.
    /// Returns `None` for events without an id or with unusable times.
    fn into_calendar_event(self, calendar_tz: Tz) -> Option<CalendarEvent> {
        let Some(id) = self.id else {
            warn!("skipping google event without id");
            return None;
        };
        let event_tz = self
            .start
            .time_zone
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok());
        let local_tz = event_tz.unwrap_or(calendar_tz);
        let all_day = self.start.is_date_only();

        let start = self.start.instant(local_tz);
        let end = self.end.instant(local_tz);
        let interval = match (start, end) {
            (Some(start), Some(end)) => TimeInterval::new(start, end).ok(),
            _ => None,
        };
        let Some(interval) = interval else {
            warn!(event_id = %id, "skipping google event with unusable times");
            return None;
        };

        let appointment = self
            .extended_properties
            .and_then(|props| appointment_from_properties(props.private));

        Some(CalendarEvent {
            id: Some(id),
            title: self.summary.unwrap_or_default(),
            description: self.description,
            location: self.location,
            interval,
            timezone: if all_day { Some(local_tz) } else { event_tz },
            all_day,
            link: self.html_link.and_then(|link| Url::parse(&link).ok()),
            color_id: self.color_id,
            appointment,
        })
    }
}

impl ApiEventTime {
    fn is_date_only(&self) -> bool {
        self.date_time.is_none() && self.date.is_some()
    }

    fn instant(&self, tz: Tz) -> Option<DateTime<Utc>> {
        if let Some(ref date_time) = self.date_time {
            return DateTime::parse_from_rfc3339(date_time)
                .map_err(|e| warn!("failed to parse event time {}: {}", date_time, e))
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d")
            .map_err(|e| warn!("failed to parse event date: {}", e))
            .ok()?;
        local_to_utc(&tz, date.and_hms_opt(0, 0, 0)?).ok()
    }
}

fn appointment_from_properties(mut props: BTreeMap<String, String>) -> Option<AppointmentDetails> {
    Some(AppointmentDetails {
        client_name: props.remove(PROP_CLIENT_NAME)?,
        phone_number: props.remove(PROP_PHONE_NUMBER).unwrap_or_default(),
        service_type: props.remove(PROP_SERVICE_TYPE).unwrap_or_default(),
        notes: props.remove(PROP_NOTES),
    })
}
