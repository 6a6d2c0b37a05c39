//! Calendar backends behind the [`CalendarProvider`] trait.
//!
//! - [`CalendarProvider`] - what the appointment manager needs from a calendar
//! - [`google::GoogleProvider`] - Google Calendar v3 (feature `google`)
//! - [`MemoryProvider`] - in-process calendar for tests and dry runs
//! - [`ErrorProvider`] - always fails; stands in for a broken backend
//! - [`ProviderError`] - failures classified by [`ProviderErrorCode`]
//!
//! ```text
//! ┌─────────────────┐   ┌────────────────┐
//! │ Google Calendar │   │ process memory │
//! └────────┬────────┘   └───────┬────────┘
//!          ▼                    ▼
//! ┌─────────────────┐   ┌────────────────┐
//! │ GoogleProvider  │   │ MemoryProvider │
//! └────────┬────────┘   └───────┬────────┘
//!          └─────────┬──────────┘
//!                    ▼
//!            CalendarProvider
//!                    │
//!                    ▼
//!           AppointmentManager
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod memory;
pub mod provider;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use memory::MemoryProvider;
pub use provider::{BoxFuture, CalendarInfo, CalendarProvider, ErrorProvider};
