//! Appointment commands.

use calsync_core::{
    APPOINTMENT_TITLE_PREFIX, BusyInterval, CalendarEvent, NewAppointment, TimeInterval, Tz,
    parse_date, parse_instant, parse_timezone,
};
use calsync_service::{HealthReport, HealthStatus};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::CommandContext;
use crate::cli::{CreateArgs, ListArgs, RangeArgs, SlotsArgs};
use crate::error::{ClientError, ClientResult};

/// Books an appointment.
pub async fn create(ctx: &CommandContext, args: CreateArgs) -> ClientResult<String> {
    let tz = match args.timezone.as_deref() {
        Some(name) => parse_timezone(name)?,
        None => ctx.timezone(),
    };
    let start = parse_instant(&args.start, &tz)?;
    let end = match (args.end.as_deref(), args.duration) {
        (Some(end), _) => parse_instant(end, &tz)?,
        (None, Some(minutes)) => start + minutes_arg(minutes)?,
        (None, None) => start + ctx.default_duration,
    };

    let mut request = NewAppointment::new(args.client, args.phone, args.service, start, end)
        .with_timezone(tz.name());
    if let Some(notes) = args.notes {
        request = request.with_notes(notes);
    }

    let event = ctx.manager.create_appointment(request).await?;
    ctx.render(&event, |e| render_event("Booked", e, tz))
}

/// Lists appointments on a day, a week or an explicit range.
///
/// Without a range the current local day is listed.
pub async fn list(ctx: &CommandContext, args: ListArgs) -> ClientResult<String> {
    let tz = ctx.timezone();
    let events = match (&args.day, &args.week, &args.from, &args.to) {
        (_, Some(week), _, _) => {
            let start = parse_date(week)?;
            if args.all {
                let range = TimeInterval::week_from(start, &tz)?;
                ctx.manager.list_appointments_for_range(range).await?
            } else {
                ctx.manager.appointments_for_week(start).await?
            }
        }
        (_, _, Some(from), Some(to)) => {
            let range = TimeInterval::new(range_start(from, tz)?, range_end(to, tz)?)?;
            let mut events = ctx.manager.list_appointments_for_range(range).await?;
            if !args.all {
                events.retain(|e| e.title.starts_with(APPOINTMENT_TITLE_PREFIX));
            }
            events
        }
        (day, _, _, _) => {
            let date = match day {
                Some(day) => parse_date(day)?,
                None => Utc::now().with_timezone(&tz).date_naive(),
            };
            if args.all {
                let range = TimeInterval::for_date(date, &tz)?;
                ctx.manager.list_appointments_for_range(range).await?
            } else {
                ctx.manager.appointments_for_day(date).await?
            }
        }
    };

    ctx.render(&events, |events| render_events(events, tz))
}

/// Shows the free slots of a business day.
pub async fn slots(ctx: &CommandContext, args: SlotsArgs) -> ClientResult<String> {
    let date = parse_date(&args.day)?;
    let requested = match args.duration {
        Some(minutes) => minutes_arg(minutes)?,
        None => ctx.default_duration,
    };

    let slots = ctx.manager.find_available_slots(date, requested).await?;
    let tz = ctx.timezone();
    ctx.render(&slots, |slots| render_slots(date, requested, slots, tz))
}

#[derive(Debug, Serialize)]
struct Availability {
    interval: TimeInterval,
    available: bool,
    conflicts: Vec<BusyInterval>,
}

/// Reports the events overlapping a time range.
pub async fn check(ctx: &CommandContext, range: RangeArgs) -> ClientResult<String> {
    let interval = parse_range(&range, ctx.timezone())?;
    let conflicts = ctx.manager.check_availability(interval).await?;
    let availability = Availability {
        interval,
        available: conflicts.is_empty(),
        conflicts,
    };
    let tz = ctx.timezone();
    ctx.render(&availability, |a| render_availability(a, tz))
}

#[derive(Debug, Serialize)]
struct Cancelled<'a> {
    cancelled: &'a str,
}

/// Cancels an appointment.
pub async fn cancel(ctx: &CommandContext, event_id: &str) -> ClientResult<String> {
    ctx.manager.cancel_appointment(event_id).await?;
    ctx.render(&Cancelled { cancelled: event_id }, |c| {
        format!("Cancelled {}.", c.cancelled)
    })
}

/// Moves an appointment.
pub async fn reschedule(
    ctx: &CommandContext,
    event_id: &str,
    range: RangeArgs,
) -> ClientResult<String> {
    let tz = ctx.timezone();
    let interval = parse_range(&range, tz)?;
    let event = ctx
        .manager
        .reschedule_appointment(event_id, interval.start(), interval.end())
        .await?;
    ctx.render(&event, |e| render_event("Rescheduled", e, tz))
}

/// Replaces the notes of an appointment.
pub async fn notes(ctx: &CommandContext, event_id: &str, text: &str) -> ClientResult<String> {
    let event = ctx.manager.update_notes(event_id, text).await?;
    let tz = ctx.timezone();
    ctx.render(&event, |e| render_event("Updated", e, tz))
}

/// Probes the calendar.
pub async fn health(ctx: &CommandContext) -> ClientResult<String> {
    let report = ctx.manager.health_check().await;
    ctx.render(&report, render_health)
}

fn minutes_arg(minutes: u32) -> ClientResult<Duration> {
    if minutes == 0 {
        return Err(ClientError::Input(
            "duration must be at least one minute".to_string(),
        ));
    }
    Ok(Duration::minutes(i64::from(minutes)))
}

fn parse_range(range: &RangeArgs, tz: Tz) -> ClientResult<TimeInterval> {
    let start = parse_instant(&range.start, &tz)?;
    let end = parse_instant(&range.end, &tz)?;
    Ok(TimeInterval::new(start, end)?)
}

/// A bare date starts at local midnight.
fn range_start(text: &str, tz: Tz) -> ClientResult<DateTime<Utc>> {
    match parse_date(text) {
        Ok(date) => Ok(TimeInterval::for_date(date, &tz)?.start()),
        Err(_) => Ok(parse_instant(text, &tz)?),
    }
}

/// A bare date includes the whole local day.
fn range_end(text: &str, tz: Tz) -> ClientResult<DateTime<Utc>> {
    match parse_date(text) {
        Ok(date) => Ok(TimeInterval::for_date(date, &tz)?.end()),
        Err(_) => Ok(parse_instant(text, &tz)?),
    }
}

// ---------------------------------------------------------------------------
// Text rendering
// ---------------------------------------------------------------------------

fn format_interval(interval: &TimeInterval, tz: Tz) -> String {
    let start = interval.start().with_timezone(&tz);
    let end = interval.end().with_timezone(&tz);
    if start.date_naive() == end.date_naive() {
        format!("{}-{}", start.format("%a %Y-%m-%d %H:%M"), end.format("%H:%M"))
    } else {
        format!(
            "{} - {}",
            start.format("%a %Y-%m-%d %H:%M"),
            end.format("%a %Y-%m-%d %H:%M")
        )
    }
}

pub(crate) fn render_event(verb: &str, event: &CalendarEvent, tz: Tz) -> String {
    let mut out = format!("{} {}\n", verb, event.title);
    out.push_str(&format!(
        "  when:    {} ({})\n",
        format_interval(&event.interval, tz),
        tz.name()
    ));
    if let Some(ref details) = event.appointment {
        out.push_str(&format!("  phone:   {}\n", details.phone_number));
        out.push_str(&format!("  service: {}\n", details.service_type));
        if let Some(notes) = details.notes.as_deref().filter(|n| !n.is_empty()) {
            out.push_str(&format!("  notes:   {}\n", notes));
        }
    }
    if let Some(ref id) = event.id {
        out.push_str(&format!("  id:      {}\n", id));
    }
    if let Some(ref link) = event.link {
        out.push_str(&format!("  link:    {}\n", link));
    }
    out
}

pub(crate) fn render_events(events: &[CalendarEvent], tz: Tz) -> String {
    if events.is_empty() {
        return "No appointments.".to_string();
    }

    let mut out = String::new();
    for event in events {
        out.push_str(&format!(
            "{}  {}",
            format_interval(&event.interval, tz),
            event.title
        ));
        if let Some(ref id) = event.id {
            out.push_str(&format!("  [{}]", id));
        }
        out.push('\n');
        if let Some(ref details) = event.appointment {
            out.push_str(&format!(
                "    phone: {}  service: {}\n",
                details.phone_number, details.service_type
            ));
            if let Some(notes) = details.notes.as_deref().filter(|n| !n.is_empty()) {
                out.push_str(&format!("    notes: {}\n", notes));
            }
        }
    }
    out
}

pub(crate) fn render_slots(
    date: NaiveDate,
    requested: Duration,
    slots: &[TimeInterval],
    tz: Tz,
) -> String {
    if slots.is_empty() {
        return format!(
            "No free slot of {} minutes on {}.",
            requested.num_minutes(),
            date
        );
    }

    let mut out = format!(
        "Free on {} ({} minutes or longer):\n",
        date,
        requested.num_minutes()
    );
    for slot in slots {
        out.push_str(&format!(
            "  {}-{}  ({} min)\n",
            slot.start().with_timezone(&tz).format("%H:%M"),
            slot.end().with_timezone(&tz).format("%H:%M"),
            slot.duration().num_minutes()
        ));
    }
    out
}

fn render_availability(availability: &Availability, tz: Tz) -> String {
    let when = format_interval(&availability.interval, tz);
    if availability.available {
        return format!("Available: {}", when);
    }

    let mut out = format!(
        "Busy: {} overlaps {} event(s)\n",
        when,
        availability.conflicts.len()
    );
    for busy in &availability.conflicts {
        out.push_str(&format!(
            "  {}  {}\n",
            format_interval(&busy.interval, tz),
            busy.event_id.as_deref().unwrap_or("-")
        ));
    }
    out
}

pub(crate) fn render_health(report: &HealthReport) -> String {
    match report.status {
        HealthStatus::Healthy {
            ref calendar_name,
            ref timezone,
        } => format!(
            "{}: healthy\n  provider: {}\n  calendar: {} ({}, {})",
            report.business_name,
            report.provider,
            report.calendar_id,
            calendar_name,
            timezone.as_deref().unwrap_or("no timezone")
        ),
        HealthStatus::Degraded { ref reason } => format!(
            "{}: degraded\n  provider: {}\n  calendar: {}\n  reason:   {}",
            report.business_name, report.provider, report.calendar_id, reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use calsync_core::{AppointmentDetails, BusinessHours};
    use calsync_providers::{ErrorProvider, MemoryProvider, ProviderError};
    use calsync_service::{AppointmentError, AppointmentManager, ManagerConfig};
    use chrono::TimeZone;

    use super::*;
    use crate::commands::OutputMode;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, d, h, m, 0).unwrap()
    }

    fn iv(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeInterval {
        TimeInterval::new(at(7, h1, m1), at(7, h2, m2)).unwrap()
    }

    fn appointment(id: &str, interval: TimeInterval) -> CalendarEvent {
        CalendarEvent::new("Appointment - Ana", interval)
            .with_id(id)
            .with_appointment(AppointmentDetails {
                client_name: "Ana".to_string(),
                phone_number: "5512345678".to_string(),
                service_type: "Haircut".to_string(),
                notes: Some("first visit".to_string()),
            })
    }

    fn context(provider: MemoryProvider, output: OutputMode) -> CommandContext {
        let config = ManagerConfig::new("primary")
            .with_business_hours(BusinessHours::from_hours(9, 17, Tz::UTC).unwrap());
        CommandContext::new(AppointmentManager::new(Arc::new(provider), config), output)
    }

    fn create_args() -> CreateArgs {
        CreateArgs {
            client: "Ana".to_string(),
            phone: "5512345678".to_string(),
            service: "Haircut".to_string(),
            start: "2030-01-07 10:00".to_string(),
            end: None,
            duration: Some(45),
            notes: None,
            timezone: None,
        }
    }

    mod render {
        use super::*;

        #[test]
        fn event_list() {
            let lunch = CalendarEvent::new("Lunch", iv(12, 0, 13, 0)).with_id("evt-2");
            let text = render_events(&[appointment("evt-1", iv(10, 0, 11, 0)), lunch], Tz::UTC);
            insta::assert_snapshot!(text, @r"
            Mon 2030-01-07 10:00-11:00  Appointment - Ana  [evt-1]
                phone: 5512345678  service: Haircut
                notes: first visit
            Mon 2030-01-07 12:00-13:00  Lunch  [evt-2]
            ");
        }

        #[test]
        fn event_list_in_business_zone() {
            let text = render_events(
                &[CalendarEvent::new("Lunch", iv(18, 0, 19, 0))],
                Tz::America__Mexico_City,
            );
            assert_eq!(text, "Mon 2030-01-07 12:00-13:00  Lunch\n");
            assert_eq!(render_events(&[], Tz::UTC), "No appointments.");
        }

        #[test]
        fn single_event() {
            let text = render_event("Booked", &appointment("evt-1", iv(10, 0, 11, 0)), Tz::UTC);
            insta::assert_snapshot!(text, @r"
            Booked Appointment - Ana
              when:    Mon 2030-01-07 10:00-11:00 (UTC)
              phone:   5512345678
              service: Haircut
              notes:   first visit
              id:      evt-1
            ");
        }

        #[test]
        fn overnight_event() {
            let interval = TimeInterval::new(at(7, 22, 0), at(8, 1, 0)).unwrap();
            let text = render_events(&[CalendarEvent::new("Inventory", interval)], Tz::UTC);
            assert_eq!(
                text,
                "Mon 2030-01-07 22:00 - Tue 2030-01-08 01:00  Inventory\n"
            );
        }

        #[test]
        fn slots() {
            let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
            let text = render_slots(
                date,
                Duration::minutes(60),
                &[iv(9, 0, 10, 0), iv(11, 30, 17, 0)],
                Tz::UTC,
            );
            insta::assert_snapshot!(text, @r"
            Free on 2030-01-07 (60 minutes or longer):
              09:00-10:00  (60 min)
              11:30-17:00  (330 min)
            ");

            assert_eq!(
                render_slots(date, Duration::minutes(30), &[], Tz::UTC),
                "No free slot of 30 minutes on 2030-01-07."
            );
        }

        #[test]
        fn health() {
            let report = HealthReport {
                business_name: "Salon Rosa".to_string(),
                provider: "google:default".to_string(),
                calendar_id: "primary".to_string(),
                status: HealthStatus::Degraded {
                    reason: "calendar calendar_info failed: boom".to_string(),
                },
            };
            insta::assert_snapshot!(render_health(&report), @r"
            Salon Rosa: degraded
              provider: google:default
              calendar: primary
              reason:   calendar calendar_info failed: boom
            ");
        }
    }

    mod handlers {
        use super::*;

        #[tokio::test]
        async fn create_renders_json() {
            let ctx = context(MemoryProvider::new(), OutputMode::Json);
            let out = create(&ctx, create_args()).await.unwrap();

            let value: serde_json::Value = serde_json::from_str(&out).unwrap();
            assert_eq!(value["title"], "Appointment - Ana");
            assert_eq!(value["appointment"]["phone_number"], "5512345678");
            assert_eq!(value["interval"]["end"], "2030-01-07T10:45:00Z");
        }

        #[tokio::test]
        async fn create_uses_default_duration() {
            let ctx = context(MemoryProvider::new(), OutputMode::Text)
                .with_default_duration(Duration::minutes(30));
            let args = CreateArgs {
                duration: None,
                ..create_args()
            };
            let out = create(&ctx, args).await.unwrap();
            assert!(out.starts_with("Booked Appointment - Ana\n"));
            assert!(out.contains("Mon 2030-01-07 10:00-10:30 (UTC)"));
            assert!(out.contains("link:    memory:///primary/"));
        }

        #[tokio::test]
        async fn create_with_timezone() {
            let provider = MemoryProvider::new();
            let ctx = context(provider, OutputMode::Json);
            let args = CreateArgs {
                timezone: Some("America/Mexico_City".to_string()),
                end: Some("2030-01-07 11:00".to_string()),
                duration: None,
                ..create_args()
            };
            let out = create(&ctx, args).await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&out).unwrap();
            assert_eq!(value["interval"]["start"], "2030-01-07T16:00:00Z");
            assert_eq!(value["timezone"], "America/Mexico_City");
        }

        #[tokio::test]
        async fn create_rejects_bad_input() {
            let ctx = context(MemoryProvider::new(), OutputMode::Text);

            let err = create(
                &ctx,
                CreateArgs {
                    duration: Some(0),
                    ..create_args()
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ClientError::Input(_)));

            let err = create(
                &ctx,
                CreateArgs {
                    start: "next monday".to_string(),
                    ..create_args()
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ClientError::Input(_)));

            let err = create(
                &ctx,
                CreateArgs {
                    phone: "123".to_string(),
                    ..create_args()
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(
                err,
                ClientError::Service(AppointmentError::Validation {
                    field: "phone_number",
                    ..
                })
            ));
        }

        #[tokio::test]
        async fn list_filters_appointments() {
            let provider = MemoryProvider::new()
                .with_event("primary", appointment("evt-1", iv(10, 0, 11, 0)))
                .with_event("primary", CalendarEvent::new("Lunch", iv(12, 0, 13, 0)));
            let ctx = context(provider, OutputMode::Text);

            let day = ListArgs {
                day: Some("2030-01-07".to_string()),
                ..Default::default()
            };
            let out = list(&ctx, day.clone()).await.unwrap();
            assert!(out.contains("Appointment - Ana"));
            assert!(!out.contains("Lunch"));

            let out = list(&ctx, ListArgs { all: true, ..day }).await.unwrap();
            assert!(out.contains("Lunch"));

            let week = ListArgs {
                week: Some("2030-01-06".to_string()),
                ..Default::default()
            };
            let out = list(&ctx, week).await.unwrap();
            assert!(out.contains("[evt-1]"));

            let range = ListArgs {
                from: Some("2030-01-07".to_string()),
                to: Some("2030-01-07T11:30:00Z".to_string()),
                all: true,
                ..Default::default()
            };
            let out = list(&ctx, range).await.unwrap();
            assert!(out.contains("Appointment - Ana"));
            assert!(!out.contains("Lunch"));

            let empty = ListArgs {
                day: Some("2030-01-08".to_string()),
                ..Default::default()
            };
            assert_eq!(list(&ctx, empty).await.unwrap(), "No appointments.");
        }

        #[tokio::test]
        async fn slots_and_check() {
            let provider = MemoryProvider::new()
                .with_event("primary", CalendarEvent::new("Block", iv(9, 0, 10, 0)))
                .with_event("primary", CalendarEvent::new("Block", iv(10, 0, 11, 30)));
            let ctx = context(provider, OutputMode::Text);

            let out = slots(
                &ctx,
                SlotsArgs {
                    day: "2030-01-07".to_string(),
                    duration: Some(60),
                },
            )
            .await
            .unwrap();
            assert_eq!(
                out,
                "Free on 2030-01-07 (60 minutes or longer):\n  11:30-17:00  (330 min)\n"
            );

            let free = RangeArgs {
                start: "2030-01-07 12:00".to_string(),
                end: "2030-01-07 13:00".to_string(),
            };
            assert_eq!(
                check(&ctx, free).await.unwrap(),
                "Available: Mon 2030-01-07 12:00-13:00"
            );

            let busy = RangeArgs {
                start: "2030-01-07 11:00".to_string(),
                end: "2030-01-07 12:00".to_string(),
            };
            let out = check(&ctx, busy).await.unwrap();
            assert!(out.starts_with("Busy: Mon 2030-01-07 11:00-12:00 overlaps 1 event(s)\n"));
        }

        #[tokio::test]
        async fn check_reversed_range_is_input_error() {
            let ctx = context(MemoryProvider::new(), OutputMode::Text);
            let reversed = RangeArgs {
                start: "2030-01-07 13:00".to_string(),
                end: "2030-01-07 12:00".to_string(),
            };
            assert!(matches!(
                check(&ctx, reversed).await,
                Err(ClientError::Input(_))
            ));
        }

        #[tokio::test]
        async fn change_lifecycle() {
            let provider = MemoryProvider::new()
                .with_event("primary", appointment("evt-1", iv(10, 0, 11, 0)));
            let ctx = context(provider, OutputMode::Text);

            let out = reschedule(
                &ctx,
                "evt-1",
                RangeArgs {
                    start: "2030-01-07 14:00".to_string(),
                    end: "2030-01-07 15:00".to_string(),
                },
            )
            .await
            .unwrap();
            assert!(out.starts_with("Rescheduled Appointment - Ana\n"));
            assert!(out.contains("14:00-15:00"));

            let out = notes(&ctx, "evt-1", "bring reference photo").await.unwrap();
            assert!(out.contains("notes:   bring reference photo"));

            assert_eq!(cancel(&ctx, "evt-1").await.unwrap(), "Cancelled evt-1.");
            assert!(matches!(
                cancel(&ctx, "evt-1").await,
                Err(ClientError::Service(AppointmentError::NotFound { .. }))
            ));
        }

        #[tokio::test]
        async fn health_reports_degraded_calendar() {
            let provider = ErrorProvider::new("google:default", ProviderError::server("boom"));
            let config = ManagerConfig::new("primary");
            let ctx = CommandContext::new(
                AppointmentManager::new(Arc::new(provider), config),
                OutputMode::Json,
            );

            let out = health(&ctx).await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&out).unwrap();
            assert_eq!(value["status"], "degraded");
            assert_eq!(value["provider"], "google:default");
        }
    }
}
