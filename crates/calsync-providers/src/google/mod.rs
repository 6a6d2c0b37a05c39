//! Google Calendar provider.
//!
//! Talks to the Calendar v3 REST API with `reqwest`. Authentication uses a
//! service-account key, an OAuth refresh token (the `authorized_user`
//! credentials format), or a pre-issued access token.
//!
//! # Example
//!
//! ```ignore
//! use calsync_providers::google::{GoogleAuth, GoogleConfig, GoogleProvider};
//!
//! let auth = GoogleAuth::from_file("credentials.json")?;
//! let provider = GoogleProvider::new(GoogleConfig::new(auth))?;
//! let info = provider.calendar_info("primary").await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{GoogleAuth, GoogleConfig, OAuthCredentials, ServiceAccountKey};
pub use oauth::{CALENDAR_SCOPE, OAuthClient};
pub use provider::GoogleProvider;
pub use tokens::{TokenInfo, TokenStorage};
