//! Appointment booking on top of an external calendar.
//!
//! [`AppointmentManager`] validates appointment requests, checks them against
//! the calendar's busy intervals, enumerates free slots within business
//! hours, and forwards create/cancel/reschedule calls to a
//! [`CalendarProvider`](calsync_providers::CalendarProvider).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calsync_providers::MemoryProvider;
//! use calsync_service::{AppointmentManager, ManagerConfig};
//!
//! # async fn demo() -> Result<(), calsync_service::AppointmentError> {
//! let manager = AppointmentManager::new(Arc::new(MemoryProvider::new()), ManagerConfig::default());
//! let date = chrono::NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
//! let slots = manager.find_available_slots(date, chrono::Duration::minutes(60)).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod manager;

pub use config::{ConflictPolicy, ManagerConfig};
pub use error::{AppointmentError, AppointmentResult};
pub use manager::{AppointmentManager, HealthReport, HealthStatus};
