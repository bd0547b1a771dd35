//! Argument parsing and command dispatch

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use voicehub_core::backend::{Backend, HttpBackend};
use voicehub_core::history::{DateRange, Direction, DurationBucket, HistoryFilter};
use voicehub_core::logging::{parse_log_level, setup_logging, ActivityLog, LoggingConfig};
use voicehub_core::{EventEmitter, HubConfig};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "voicehub", version, about = "Operator client for the VoiceHub telephony backend")]
pub struct Cli {
    /// Config file [default: <config dir>/voicehub/config.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, overriding the config file and VOICEHUB_BACKEND_URL
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "warn", env = "VOICEHUB_LOG")]
    pub log_level: String,

    /// Write logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a voice session credential
    Token {
        /// Identity to request the credential for
        #[arg(long)]
        identity: Option<String>,
    },

    /// Send an SMS
    Sms {
        /// Destination number
        to: String,
        /// Message text; several words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// List call history
    Calls {
        #[command(flatten)]
        filter: FilterArgs,
        /// Only calls of this length: short (<= 60s), medium (<= 300s) or long
        #[arg(long)]
        duration: Option<DurationBucket>,
        /// Calls to request from the backend [default: history.call_limit]
        #[arg(long)]
        limit: Option<u32>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List message history
    Messages {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Call and message counters
    Stats {
        /// Calls to request from the backend [default: history.call_limit]
        #[arg(long)]
        limit: Option<u32>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Move an active call to another number
    Forward {
        /// Conference sid of the active call
        #[arg(long)]
        sid: String,
        /// Number reported as the core call number
        #[arg(long)]
        core_number: String,
        /// Number to forward to
        to: String,
        /// Bearer token [default: calls.forward.auth_token]
        #[arg(long, env = "VOICEHUB_FORWARD_TOKEN", hide_env_values = true)]
        auth_token: Option<String>,
    },

    /// Check whether a destination would be accepted for dialing
    CheckNumber {
        destination: String,
    },

    /// Print the effective configuration
    Config,
}

/// History filters shared by `calls` and `messages`
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Substring of from, to or sid (and body for messages)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Exact status, case-insensitive (completed, failed, delivered, ...)
    #[arg(long)]
    pub status: Option<String>,

    /// inbound or outbound
    #[arg(long)]
    pub direction: Option<Direction>,

    /// First day to include, YYYY-MM-DD
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Last day to include, YYYY-MM-DD [default: same as --since]
    #[arg(long, requires = "since")]
    pub until: Option<NaiveDate>,
}

impl FilterArgs {
    pub fn to_filter(&self, config: &HubConfig) -> Result<HistoryFilter> {
        let mut filter = HistoryFilter::new();
        if let Some(search) = &self.search {
            filter = filter.with_search(search.clone());
        }
        if let Some(status) = &self.status {
            filter = filter.with_status(status.clone());
        }
        if let Some(direction) = self.direction {
            filter = filter.with_direction(direction);
        }
        if let Some(start) = self.since {
            let range = DateRange::new(start, self.until.unwrap_or(start))?.with_offset(config.history.utc_offset()?);
            filter = filter.with_date_range(range);
        }
        Ok(filter)
    }
}

/// Backend-facing pieces the commands share
pub struct AppContext {
    pub config: HubConfig,
    pub backend: Arc<dyn Backend>,
    pub log: ActivityLog,
    pub events: EventEmitter,
}

impl AppContext {
    pub fn new(config: HubConfig) -> Result<Self> {
        let backend = HttpBackend::new(&config.backend).context("could not set up the HTTP backend")?;
        let events = EventEmitter::new(64);
        let log = ActivityLog::new(config.log_capacity, events.clone());
        Ok(Self {
            config,
            backend: Arc::new(backend),
            log,
            events,
        })
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let level = parse_log_level(&self.log_level)?;
        let mut logging = LoggingConfig::new(level, "voicehub");
        if self.json_logs {
            logging = logging.with_json();
        }
        setup_logging(logging)?;

        let config = self.load_config()?;
        debug!(backend = %config.backend.base_url, "configuration loaded");

        match self.command {
            Command::CheckNumber { destination } => commands::check::execute(&destination),
            Command::Config => commands::config::execute(&config),
            Command::Token { identity } => {
                let app = AppContext::new(config)?;
                commands::token::execute(&app, identity.as_deref()).await
            }
            Command::Sms { to, message } => {
                let app = AppContext::new(config)?;
                commands::sms::execute(&app, &to, &message.join(" ")).await
            }
            Command::Calls {
                filter,
                duration,
                limit,
                json,
            } => {
                let mut history_filter = filter.to_filter(&config)?;
                if let Some(bucket) = duration {
                    history_filter = history_filter.with_duration(bucket);
                }
                let limit = limit.unwrap_or(config.history.call_limit);
                let app = AppContext::new(config)?;
                commands::history::calls(&app, &history_filter, limit, json).await
            }
            Command::Messages { filter, json } => {
                let history_filter = filter.to_filter(&config)?;
                let app = AppContext::new(config)?;
                commands::history::messages(&app, &history_filter, json).await
            }
            Command::Stats { limit, json } => {
                let limit = limit.unwrap_or(config.history.call_limit);
                let app = AppContext::new(config)?;
                commands::stats::execute(&app, limit, json).await
            }
            Command::Forward {
                sid,
                core_number,
                to,
                auth_token,
            } => {
                let app = AppContext::new(config)?;
                commands::forward::execute(&app, &sid, &core_number, &to, auth_token).await
            }
        }
    }

    fn load_config(&self) -> Result<HubConfig> {
        let config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                HubConfig::load(path).with_context(|| format!("could not load {}", path.display()))?
            }
            None => match HubConfig::default_path() {
                Some(path) => HubConfig::load(&path).with_context(|| format!("could not load {}", path.display()))?,
                None => HubConfig::default(),
            },
        };

        let mut config = config.apply_env();
        if let Some(url) = &self.backend_url {
            config.backend.base_url = url.clone();
        }
        config.validate()?;
        Ok(config)
    }
}
