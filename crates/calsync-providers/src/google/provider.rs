//! [`CalendarProvider`] implementation for Google Calendar.

use std::future::Future;

use calsync_core::{BusyInterval, CalendarEvent, TimeInterval};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::provider::{BoxFuture, CalendarInfo, CalendarProvider, require_event_id};

use super::client::GoogleCalendarClient;
use super::config::{GoogleAuth, GoogleConfig, OAuthCredentials, ServiceAccountKey};
use super::oauth::OAuthClient;
use super::tokens::{TokenInfo, TokenStorage};

enum TokenSource {
    Refresh {
        oauth: OAuthClient,
        credentials: OAuthCredentials,
        refresh_token: String,
    },
    ServiceAccount {
        oauth: OAuthClient,
        key: ServiceAccountKey,
    },
    Static,
}

/// Google Calendar provider.
///
/// Access tokens are obtained lazily: the first call after expiry exchanges
/// the refresh token or a signed service-account assertion, and a 401 from
/// the API drops the cached token so the next call fetches a new one.
pub struct GoogleProvider {
    display_name: String,
    client: GoogleCalendarClient,
    source: TokenSource,
    tokens: TokenStorage,
    refresh_lock: TokioMutex<()>,
}

impl GoogleProvider {
    /// Creates a provider. No network traffic happens until the first call.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let display_name = config.provider_name();
        let client = GoogleCalendarClient::new(&config.api_base, config.timeout, &config.user_agent)?;

        let source = match config.auth {
            GoogleAuth::AccessToken(_) => TokenSource::Static,
            GoogleAuth::RefreshToken {
                ref credentials,
                ref refresh_token,
            } => TokenSource::Refresh {
                oauth: OAuthClient::new(&config.token_url, config.timeout)?,
                credentials: credentials.clone(),
                refresh_token: refresh_token.clone(),
            },
            GoogleAuth::ServiceAccount(ref key) => TokenSource::ServiceAccount {
                oauth: OAuthClient::new(&key.token_uri, config.timeout)?,
                key: key.clone(),
            },
        };

        let tokens = match (&config.auth, &config.token_path) {
            (GoogleAuth::AccessToken(token), _) => {
                let tokens = TokenStorage::in_memory();
                tokens.set(TokenInfo::new(token.clone(), None))?;
                tokens
            }
            (_, Some(path)) => {
                let tokens = TokenStorage::persistent(path);
                if let Err(e) = tokens.load() {
                    warn!("ignoring cached access token: {}", e);
                }
                tokens
            }
            (_, None) => TokenStorage::in_memory(),
        };

        info!(provider = %display_name, "google calendar provider ready");
        Ok(Self {
            display_name,
            client,
            source,
            tokens,
            refresh_lock: TokioMutex::new(()),
        })
    }

    /// Returns a usable access token, refreshing it if needed.
    async fn access_token(&self) -> ProviderResult<String> {
        if let Some(token) = self.tokens.valid() {
            return Ok(token.access_token);
        }

        // Concurrent callers wait for a single refresh.
        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.tokens.valid() {
            return Ok(token.access_token);
        }

        debug!(provider = %self.display_name, "refreshing expired access token");
        let token = match self.source {
            TokenSource::Refresh {
                ref oauth,
                ref credentials,
                ref refresh_token,
            } => oauth.refresh(credentials, refresh_token).await?,
            TokenSource::ServiceAccount { ref oauth, ref key } => {
                oauth.service_account_token(key).await?
            }
            TokenSource::Static => {
                return Err(ProviderError::authentication(
                    "access token was rejected; supply a new one",
                ));
            }
        };
        let access_token = token.access_token.clone();
        if let Err(e) = self.tokens.set(token) {
            warn!("failed to persist access token: {}", e);
        }
        Ok(access_token)
    }

    async fn call<'a, T, F, Fut>(&'a self, operation: &'static str, f: F) -> ProviderResult<T>
    where
        F: FnOnce(&'a GoogleCalendarClient, String) -> Fut,
        Fut: Future<Output = ProviderResult<T>> + 'a,
    {
        debug!(provider = %self.display_name, operation, "google calendar request");
        let result = match self.access_token().await {
            Ok(token) => f(&self.client, token).await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            if e.code() == ProviderErrorCode::AuthenticationFailed {
                self.tokens.invalidate();
            }
            warn!(provider = %self.display_name, operation, "google calendar request failed: {}", e);
            e.with_provider(&self.display_name)
        })
    }
}

impl CalendarProvider for GoogleProvider {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn list_busy<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<BusyInterval>>> {
        Box::pin(self.call("list_busy", move |client, token| async move {
            client.list_busy(&token, calendar_id, window).await
        }))
    }

    fn list_events<'a>(
        &'a self,
        calendar_id: &'a str,
        window: TimeInterval,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(self.call("list_events", move |client, token| async move {
            client.list_events(&token, calendar_id, window).await
        }))
    }

    fn get_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(self.call("get_event", move |client, token| async move {
            client.get_event(&token, calendar_id, event_id).await
        }))
    }

    fn create_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(self.call("create_event", move |client, token| async move {
            client.insert_event(&token, calendar_id, &event).await
        }))
    }

    fn update_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: CalendarEvent,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvent>> {
        Box::pin(self.call("update_event", move |client, token| async move {
            let event_id = require_event_id(&event)?;
            client.update_event(&token, calendar_id, event_id, &event).await
        }))
    }

    fn delete_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(self.call("delete_event", move |client, token| async move {
            client.delete_event(&token, calendar_id, event_id).await
        }))
    }

    fn calendar_info<'a>(
        &'a self,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<CalendarInfo>> {
        Box::pin(self.call("calendar_info", move |client, token| async move {
            client.calendar_info(&token, calendar_id).await
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calsync_core::AppointmentDetails;
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use serde_json::json;

    fn static_provider(server: &MockServer) -> GoogleProvider {
        let config = GoogleConfig::new(GoogleAuth::AccessToken("ya29.static".to_string()))
            .with_api_base(server.base_url());
        GoogleProvider::new(config).unwrap()
    }

    fn day() -> TimeInterval {
        TimeInterval::new(
            Utc.with_ymd_and_hms(2025, 10, 17, 6, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 10, 18, 6, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn hour(h: u32) -> TimeInterval {
        TimeInterval::new(
            Utc.with_ymd_and_hms(2025, 10, 17, h, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 10, 17, h + 1, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn list_busy_skips_free_and_cancelled() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendars/primary/events")
                    .header("authorization", "Bearer ya29.static")
                    .query_param("singleEvents", "true")
                    .query_param("orderBy", "startTime");
                then.status(200).json_body(json!({
                    "timeZone": "America/Mexico_City",
                    "items": [
                        {"id": "busy", "status": "confirmed",
                         "start": {"dateTime": "2025-10-17T15:00:00Z"},
                         "end": {"dateTime": "2025-10-17T16:00:00Z"}},
                        {"id": "free", "transparency": "transparent",
                         "start": {"dateTime": "2025-10-17T17:00:00Z"},
                         "end": {"dateTime": "2025-10-17T18:00:00Z"}},
                        {"id": "gone", "status": "cancelled",
                         "start": {"dateTime": "2025-10-17T19:00:00Z"},
                         "end": {"dateTime": "2025-10-17T20:00:00Z"}}
                    ]
                }));
            })
            .await;

        let provider = static_provider(&server);
        let busy = provider.list_busy("primary", day()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(busy, vec![BusyInterval::new(hour(15)).with_event_id("busy")]);

        // Free events are still listed as events.
        let events = provider.list_events("primary", day()).await.unwrap();
        let ids: Vec<_> = events.iter().filter_map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec!["busy", "free"]);
    }

    #[tokio::test]
    async fn create_sends_appointment_metadata() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/calendars/salon/events")
                    .body_contains("\"calsync_client_name\":\"Ana\"")
                    .body_contains("\"colorId\":\"9\"");
                then.status(200).json_body(json!({
                    "id": "new-event",
                    "summary": "Appointment - Ana",
                    "htmlLink": "https://www.google.com/calendar/event?eid=new",
                    "start": {"dateTime": "2025-10-17T15:00:00Z"},
                    "end": {"dateTime": "2025-10-17T16:00:00Z"},
                    "colorId": "9",
                    "extendedProperties": {"private": {
                        "calsync_client_name": "Ana",
                        "calsync_phone_number": "5512345678",
                        "calsync_service_type": "Haircut"
                    }}
                }));
            })
            .await;

        let event = CalendarEvent::new("Appointment - Ana", hour(15))
            .with_color_id("9")
            .with_appointment(AppointmentDetails {
                client_name: "Ana".to_string(),
                phone_number: "5512345678".to_string(),
                service_type: "Haircut".to_string(),
                notes: None,
            });

        let provider = static_provider(&server);
        let created = provider
            .create_event("salon", event)
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(created.id.as_deref(), Some("new-event"));
        assert_eq!(
            created.link.map(|l| l.to_string()),
            Some("https://www.google.com/calendar/event?eid=new".to_string())
        );
        assert_eq!(created.appointment.unwrap().client_name, "Ana");
    }

    #[tokio::test]
    async fn update_puts_whole_event() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/calendars/primary/events/evt-1");
                then.status(200).json_body(json!({
                    "id": "evt-1",
                    "summary": "Appointment - Ana",
                    "start": {"dateTime": "2025-10-17T17:00:00Z"},
                    "end": {"dateTime": "2025-10-17T18:00:00Z"}
                }));
            })
            .await;

        let provider = static_provider(&server);
        let event = CalendarEvent::new("Appointment - Ana", hour(17)).with_id("evt-1");
        let updated = provider.update_event("primary", event).await.unwrap();
        mock.assert_async().await;
        assert_eq!(updated.interval, hour(17));

        let err = provider
            .update_event("primary", CalendarEvent::new("no id", hour(9)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn all_day_event_keeps_calendar_zone_and_dates() {
        let server = MockServer::start_async().await;
        let calendar_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/calendars/primary");
                then.status(200).json_body(json!({
                    "id": "owner@example.com",
                    "summary": "My Business",
                    "timeZone": "America/Mexico_City"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/calendars/primary/events/holiday");
                then.status(200).json_body(json!({
                    "id": "holiday",
                    "summary": "Closed",
                    "start": {"date": "2025-10-17"},
                    "end": {"date": "2025-10-18"}
                }));
            })
            .await;
        let update_mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/calendars/primary/events/holiday")
                    .body_contains("\"start\":{\"date\":\"2025-10-17\"}")
                    .body_contains("\"end\":{\"date\":\"2025-10-18\"}");
                then.status(200).json_body(json!({
                    "id": "holiday",
                    "summary": "Closed",
                    "description": "inventory",
                    "start": {"date": "2025-10-17"},
                    "end": {"date": "2025-10-18"}
                }));
            })
            .await;

        let provider = static_provider(&server);
        let event = provider.get_event("primary", "holiday").await.unwrap();
        calendar_mock.assert_async().await;
        assert!(event.all_day);
        assert_eq!(event.interval, day());

        let updated = provider
            .update_event("primary", event.with_notes("inventory"))
            .await
            .unwrap();
        update_mock.assert_async().await;
        assert!(updated.all_day);
        assert_eq!(updated.interval, day());
    }

    #[tokio::test]
    async fn delete_maps_gone_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/calendars/primary/events/ok");
                then.status(204);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/calendars/primary/events/deleted");
                then.status(410).json_body(json!({
                    "error": {"code": 410, "message": "Resource has been deleted"}
                }));
            })
            .await;

        let provider = static_provider(&server);
        provider.delete_event("primary", "ok").await.unwrap();

        let err = provider.delete_event("primary", "deleted").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(410));
        assert_eq!(err.message(), "Resource has been deleted");
        assert_eq!(err.provider(), Some("google:default"));
    }

    #[tokio::test]
    async fn http_errors_are_classified() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/calendars/limited");
                then.status(429).header("Retry-After", "30").body("slow down");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/calendars/forbidden");
                then.status(403).body("nope");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/calendars/broken");
                then.status(502).body("bad gateway");
            })
            .await;

        let provider = static_provider(&server);

        let err = provider.calendar_info("limited").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert!(err.message().contains("retry after 30 seconds"));
        assert!(err.is_retryable());

        let err = provider.calendar_info("forbidden").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthorizationFailed);
        assert!(!err.is_retryable());

        let err = provider.calendar_info("broken").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rejected_static_token_stays_rejected() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/calendars/primary");
                then.status(401).body("invalid credentials");
            })
            .await;

        let provider = static_provider(&server);
        let err = provider.calendar_info("primary").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);

        // The token was dropped; the second call fails without hitting the API.
        let err = provider.calendar_info("primary").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn refresh_token_flow() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.fresh", "expires_in": 3600}));
            })
            .await;
        let calendar_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendars/primary")
                    .header("authorization", "Bearer ya29.fresh");
                then.status(200).json_body(json!({
                    "id": "owner@example.com",
                    "summary": "My Business",
                    "timeZone": "America/Mexico_City"
                }));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("tokens.json");
        let config = GoogleConfig::new(GoogleAuth::RefreshToken {
            credentials: OAuthCredentials::new("id.apps.googleusercontent.com", "secret"),
            refresh_token: "1//refresh".to_string(),
        })
        .with_api_base(server.base_url())
        .with_token_url(server.url("/token"))
        .with_token_path(&token_path);

        let provider = GoogleProvider::new(config).unwrap();
        let info = provider.calendar_info("primary").await.unwrap();
        assert_eq!(info.name, "My Business");
        assert_eq!(info.timezone.as_deref(), Some("America/Mexico_City"));

        // The refreshed token is cached in memory and on disk.
        provider.calendar_info("primary").await.unwrap();
        token_mock.assert_hits_async(1).await;
        calendar_mock.assert_hits_async(2).await;
        assert!(token_path.exists());
    }

    #[tokio::test]
    async fn service_account_flow() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_contains("grant-type%3Ajwt-bearer");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.service", "expires_in": 3600}));
            })
            .await;
        let calendar_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendars/primary")
                    .header("authorization", "Bearer ya29.service");
                then.status(200).json_body(json!({
                    "id": "salon@example.com",
                    "summary": "Salon",
                    "timeZone": "America/Mexico_City"
                }));
            })
            .await;

        let key = ServiceAccountKey::new(
            "calsync@salon-123.iam.gserviceaccount.com",
            include_str!("../../testdata/service-account-key.pem"),
        )
        .with_token_uri(server.url("/token"));
        let config = GoogleConfig::new(GoogleAuth::ServiceAccount(key))
            .with_api_base(server.base_url());

        let provider = GoogleProvider::new(config).unwrap();
        provider.calendar_info("primary").await.unwrap();
        let info = provider.calendar_info("primary").await.unwrap();
        assert_eq!(info.name, "Salon");

        token_mock.assert_hits_async(1).await;
        calendar_mock.assert_hits_async(2).await;
    }
}
