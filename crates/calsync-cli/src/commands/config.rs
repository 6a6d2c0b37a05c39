//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Renders the effective configuration as TOML, with inline secrets masked.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<String> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    Ok(format!("# config.toml ({})\n{}", path.display(), toml_str))
}

/// Validates the configuration, resolving secret references on the way.
pub fn validate(config: &ClientConfig) -> ClientResult<String> {
    let manager = config.to_manager_config()?;
    config.default_duration()?;

    let mut out = format!(
        "Business hours: {}-{} ({})\n",
        manager.business_hours.open().format("%H:%M"),
        manager.business_hours.close().format("%H:%M"),
        manager.business_hours.timezone().name()
    );

    #[cfg(feature = "google")]
    if config.google.has_credentials() {
        config
            .google
            .to_provider_config(&ClientConfig::default_data_dir())
            .map_err(|e| ClientError::Config(format!("invalid Google settings: {}", e)))?;
        out.push_str("Google credentials are valid.\n");
    }

    out.push_str("Configuration is valid.");
    Ok(out)
}

/// Shows the configuration file path.
pub fn path(config_path: &Path) -> String {
    format!("config: {}", config_path.display())
}
