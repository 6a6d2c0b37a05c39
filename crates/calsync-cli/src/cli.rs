//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// calsync - book appointments into a shared calendar
#[derive(Debug, Parser)]
#[command(name = "calsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Calendar backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Google, global = true)]
    pub provider: ProviderKind,

    // --- Overrides for config.toml ---
    /// Calendar that receives appointments
    #[arg(long, env = "GOOGLE_CALENDAR_ID", global = true)]
    pub calendar_id: Option<String>,

    /// Service-account key or authorized-user credentials JSON
    #[arg(long, env = "GOOGLE_CREDENTIALS_FILE", global = true)]
    pub credentials_file: Option<PathBuf>,

    /// Pre-issued Google access token
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub access_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Calendar backends selectable with `--provider`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Google Calendar
    Google,
    /// In-process calendar, discarded on exit
    Memory,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Book an appointment
    Create(CreateArgs),

    /// List appointments
    List(ListArgs),

    /// Show free slots on a day
    Slots(SlotsArgs),

    /// Show events overlapping a time range
    Check(RangeArgs),

    /// Cancel an appointment
    Cancel {
        /// Event id
        id: String,
    },

    /// Move an appointment
    Reschedule {
        /// Event id
        id: String,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Replace the notes of an appointment
    Notes {
        /// Event id
        id: String,

        /// New notes; empty clears them
        text: String,
    },

    /// Check the calendar connection
    Health,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `calsync create`.
#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Client name
    #[arg(long)]
    pub client: String,

    /// Client phone number
    #[arg(long)]
    pub phone: String,

    /// Requested service
    #[arg(long)]
    pub service: String,

    /// Start, RFC 3339 or local `YYYY-MM-DD HH:MM`
    #[arg(long)]
    pub start: String,

    /// End, same formats as --start
    #[arg(long, conflicts_with = "duration")]
    pub end: Option<String>,

    /// Length in minutes, instead of --end
    #[arg(long)]
    pub duration: Option<u32>,

    #[arg(long)]
    pub notes: Option<String>,

    /// IANA timezone of the appointment and of local times given here
    #[arg(long)]
    pub timezone: Option<String>,
}

/// Arguments of `calsync list`.
#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Local day, YYYY-MM-DD (default: today)
    #[arg(long, group = "range")]
    pub day: Option<String>,

    /// Seven days starting on this local day
    #[arg(long, group = "range")]
    pub week: Option<String>,

    /// Range start, requires --to
    #[arg(long, group = "range", requires = "to")]
    pub from: Option<String>,

    /// Range end
    #[arg(long, requires = "from")]
    pub to: Option<String>,

    /// Include events that are not appointments
    #[arg(long)]
    pub all: bool,
}

/// Arguments of `calsync slots`.
#[derive(Debug, Clone, Args)]
pub struct SlotsArgs {
    /// Local day, YYYY-MM-DD
    #[arg(long)]
    pub day: String,

    /// Slot length in minutes (default: booking.default_duration_minutes)
    #[arg(long)]
    pub duration: Option<u32>,
}

/// A start/end pair given on the command line.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    #[arg(long)]
    pub start: String,

    #[arg(long)]
    pub end: String,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
