//! Command line and environment configuration.

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use pocketledger_core::sync::{CONNECTIVITY_PROBE_INTERVAL_SECS, QUEUE_CLAIM_TTL_SECS};
use pocketledger_remote_store::{RemoteStoreConfig, DEFAULT_TABLE, DEFAULT_TIMEOUT_SECS};

const APP_DIR_NAME: &str = "pocketledger";

#[derive(Parser, Debug)]
#[command(
    name = "pocketledger",
    about = "Offline-first expense tracker",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub config: AppConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_API_URL",
        help = "Base URL of the remote store"
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_API_KEY",
        hide_env_values = true,
        help = "API key sent as `apikey` and bearer token"
    )]
    pub api_key: Option<String>,

    #[arg(long, global = true, env = "POCKETLEDGER_TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "POCKETLEDGER_DATA_DIR",
        help = "Directory of the local database [default: platform data dir]"
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_PROBE_INTERVAL_SECS",
        default_value_t = CONNECTIVITY_PROBE_INTERVAL_SECS
    )]
    pub probe_interval_secs: u64,

    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_CLAIM_TTL_SECS",
        default_value_t = QUEUE_CLAIM_TTL_SECS
    )]
    pub claim_ttl_secs: i64,

    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,

    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_IDEMPOTENCY_COLUMN",
        help = "Remote column holding the local id; turns inserts into upserts"
    )]
    pub idempotency_column: Option<String>,

    #[arg(
        long,
        global = true,
        env = "POCKETLEDGER_APP_URL",
        help = "Origin of the app's static resources for the background cache"
    )]
    pub app_url: Option<String>,
}

impl AppConfig {
    pub fn app_data_dir(&self) -> anyhow::Result<String> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| anyhow!("No platform data directory; set POCKETLEDGER_DATA_DIR"))?
                .join(APP_DIR_NAME),
        };
        Ok(dir.to_string_lossy().into_owned())
    }

    pub fn remote_store_config(&self) -> anyhow::Result<RemoteStoreConfig> {
        let base_url = self
            .api_url
            .clone()
            .context("POCKETLEDGER_API_URL is not set")?;
        let mut config = RemoteStoreConfig::new(base_url);
        config.api_key = self.api_key.clone();
        config.table = self.table.clone();
        config.idempotency_column = self.idempotency_column.clone();
        config.timeout = self.request_timeout();
        Ok(config)
    }

    pub fn claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_ttl_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record an expense. Queued locally when the remote store is unreachable.
    Add(AddArgs),
    /// Change fields of a confirmed expense.
    Edit(EditArgs),
    /// Delete a confirmed expense.
    Delete {
        id: String,
    },
    /// List expenses, newest write first, with their sync state.
    List,
    /// Show the offline queue.
    Pending,
    /// Replay the offline queue now.
    Sync,
    /// Drop every queued entry. Queued expenses are lost.
    ResetQueue {
        #[arg(long, help = "Confirm the reset")]
        yes: bool,
    },
    /// Daily summary and reminder notifications.
    Notify {
        #[command(subcommand)]
        command: NotifyCommand,
    },
    /// Keep syncing in the background until Ctrl-C.
    Run,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub description: String,

    #[arg(long, default_value = "Other")]
    pub category: String,

    #[arg(long, help = "Amount, e.g. 12.50 or 12,50")]
    pub amount: String,

    #[arg(long, help = "Day of the expense (YYYY-MM-DD) [default: now]")]
    pub date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub amount: Option<String>,

    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommand {
    /// Deliver a test notification now.
    Test,
    /// Show or change reminder settings.
    Settings(NotifySettingsArgs),
}

#[derive(Args, Debug)]
pub struct NotifySettingsArgs {
    #[arg(long)]
    pub summary_enabled: Option<bool>,

    #[arg(long, value_name = "HH:MM")]
    pub summary_time: Option<String>,

    #[arg(long)]
    pub reminder_enabled: Option<bool>,

    #[arg(long, value_name = "HH:MM")]
    pub reminder_time: Option<String>,
}

impl NotifySettingsArgs {
    pub fn is_empty(&self) -> bool {
        self.summary_enabled.is_none()
            && self.summary_time.is_none()
            && self.reminder_enabled.is_none()
            && self.reminder_time.is_none()
    }
}
