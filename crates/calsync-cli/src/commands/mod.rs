//! Command handlers.
//!
//! Handlers return the text to print so they can be tested without
//! capturing stdout.

pub mod appointments;
pub mod config;

use std::sync::Arc;

use calsync_core::Tz;
use calsync_providers::{CalendarProvider, MemoryProvider};
use calsync_service::AppointmentManager;
use serde::Serialize;
use tracing::debug;

use crate::cli::ProviderKind;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Everything an appointment command needs.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub manager: AppointmentManager,
    pub output: OutputMode,
    /// Appointment length when none is given.
    pub default_duration: chrono::Duration,
}

impl CommandContext {
    pub fn new(manager: AppointmentManager, output: OutputMode) -> Self {
        Self {
            manager,
            output,
            default_duration: chrono::Duration::minutes(60),
        }
    }

    pub fn with_default_duration(mut self, duration: chrono::Duration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Zone used to read and print local times.
    pub fn timezone(&self) -> Tz {
        self.manager.config().business_hours.timezone()
    }

    /// Renders `value` as JSON, or with `text` otherwise.
    pub(crate) fn render<T: Serialize>(
        &self,
        value: &T,
        text: impl FnOnce(&T) -> String,
    ) -> ClientResult<String> {
        match self.output {
            OutputMode::Json => serde_json::to_string_pretty(value)
                .map_err(|e| ClientError::Config(format!("failed to serialize output: {}", e))),
            OutputMode::Text => Ok(text(value)),
        }
    }
}

/// Builds the calendar provider selected on the command line.
pub fn build_provider(
    kind: ProviderKind,
    config: &ClientConfig,
) -> ClientResult<Arc<dyn CalendarProvider>> {
    match kind {
        ProviderKind::Memory => {
            debug!("using in-memory calendar; changes are discarded on exit");
            Ok(Arc::new(MemoryProvider::new()))
        }
        #[cfg(feature = "google")]
        ProviderKind::Google => {
            use calsync_providers::google::GoogleProvider;

            let google_config = config
                .google
                .to_provider_config(&ClientConfig::default_data_dir())
                .map_err(ClientError::Config)?;
            Ok(Arc::new(GoogleProvider::new(google_config)?))
        }
        #[cfg(not(feature = "google"))]
        ProviderKind::Google => {
            let _ = config;
            Err(ClientError::Config(
                "this build has no Google support; use --provider memory".to_string(),
            ))
        }
    }
}

/// Builds the manager for the configured calendar.
pub fn build_context(
    kind: ProviderKind,
    config: &ClientConfig,
    output: OutputMode,
) -> ClientResult<CommandContext> {
    let provider = build_provider(kind, config)?;
    let manager = AppointmentManager::new(provider, config.to_manager_config()?);
    Ok(CommandContext::new(manager, output).with_default_duration(config.default_duration()?))
}
