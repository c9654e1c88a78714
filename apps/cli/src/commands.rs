//! Subcommand handlers. Results go to stdout, diagnostics to the log.

use anyhow::bail;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use pocketledger_core::notifications::NotificationSettings;
use pocketledger_core::sync::{
    spawn_connectivity_probe, CreateOutcome, QueueEntry, ReplayTrigger, SyncEvent,
};
use pocketledger_core::transactions::{
    Category, EntryState, NewTransaction, Transaction, TransactionUpdate,
};
use pocketledger_offline_cache::{register_background_cache, CacheConfig, HttpFetcher};

use crate::config::{AddArgs, AppConfig, Cli, Command, EditArgs, NotifyCommand, NotifySettingsArgs};
use crate::context::{notification_scheduler, LocalStorage, ServiceContext};

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    match cli.command {
        Command::Add(args) => add(&config, args).await,
        Command::Edit(args) => edit(&config, args).await,
        Command::Delete { id } => delete(&config, &id).await,
        Command::List => list(&config).await,
        Command::Pending => pending(&config).await,
        Command::Sync => sync(&config).await,
        Command::ResetQueue { yes } => reset_queue(&config, yes).await,
        Command::Notify { command } => notify(&config, command).await,
        Command::Run => run(&config).await,
    }
}

/// Start of `date` in local time, as UTC.
fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

fn money(amount: Decimal) -> String {
    format!("£{:.2}", amount)
}

fn format_transaction(transaction: &Transaction) -> String {
    let amount = money(transaction.amount);
    format!(
        "{}  {:>10}  {:<13}  {}  [{}]",
        transaction.date.with_timezone(&Local).format("%Y-%m-%d"),
        amount,
        transaction.category,
        transaction.description,
        transaction.id
    )
}

fn format_queue_entry(entry: &QueueEntry) -> String {
    let amount = money(entry.amount);
    format!(
        "{}  {:>10}  {:<13}  {}  [{}] queued {}",
        entry.date.with_timezone(&Local).format("%Y-%m-%d"),
        amount,
        entry.category,
        entry.description,
        entry.local_id,
        entry.enqueued_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    )
}

fn state_label(state: EntryState) -> &'static str {
    match state {
        EntryState::Tentative => "saving",
        EntryState::Queued => "queued",
        EntryState::Confirmed => "synced",
    }
}

async fn start_coordinator(ctx: &ServiceContext) {
    if let Err(err) = ctx.sync_coordinator.start().await {
        warn!("Queue replay on startup failed: {}", err);
    }
}

async fn add(config: &AppConfig, args: AddArgs) -> anyhow::Result<()> {
    let amount = NewTransaction::parse_amount(&args.amount)?;
    let date = args.date.map(local_day_start).unwrap_or_else(Utc::now);
    let draft = NewTransaction::new(
        args.description,
        Category::parse_lenient(&args.category),
        amount,
        date,
    )?;

    let ctx = ServiceContext::initialize(config).await?;
    start_coordinator(&ctx).await;
    match ctx.sync_coordinator.create(draft).await {
        CreateOutcome::Confirmed { transaction, .. } => {
            println!("Saved     {}", format_transaction(&transaction));
        }
        CreateOutcome::Queued {
            local_id,
            durable: true,
        } => {
            println!("Offline: queued {}, it syncs when you are back online", local_id);
        }
        CreateOutcome::Queued {
            local_id,
            durable: false,
        } => {
            println!(
                "Offline: {} could not be stored locally and is lost on exit",
                local_id
            );
        }
        CreateOutcome::RolledBack { message, .. } => {
            bail!("Could not save the expense, please enter it again: {}", message);
        }
    }
    Ok(())
}

async fn edit(config: &AppConfig, args: EditArgs) -> anyhow::Result<()> {
    let amount = args
        .amount
        .as_deref()
        .map(NewTransaction::parse_amount)
        .transpose()?
        .map(|amount| amount.round_dp(2));
    if matches!(amount, Some(amount) if amount <= Decimal::ZERO) {
        bail!("Amount must be greater than zero");
    }
    let description = args.description.map(|d| d.trim().to_string());
    if matches!(&description, Some(d) if d.is_empty()) {
        bail!("Description cannot be empty");
    }
    let fields = TransactionUpdate {
        description,
        category: args.category.as_deref().map(Category::parse_lenient),
        amount,
        date: args.date.map(local_day_start),
    };
    if fields.is_empty() {
        bail!("Nothing to change");
    }

    let ctx = ServiceContext::initialize(config).await?;
    let store = ctx.sync_coordinator.store();
    store.load().await;
    store.update(&args.id, fields).await?;
    println!("Updated {}", args.id);
    Ok(())
}

async fn delete(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let ctx = ServiceContext::initialize(config).await?;
    let store = ctx.sync_coordinator.store();
    store.load().await;
    store.remove(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

async fn list(config: &AppConfig) -> anyhow::Result<()> {
    let ctx = ServiceContext::initialize(config).await?;
    start_coordinator(&ctx).await;
    let entries = ctx.sync_coordinator.store().entries();
    if entries.is_empty() {
        println!("No expenses yet");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{:<7} {}",
            state_label(entry.state),
            format_transaction(&entry.transaction)
        );
    }
    Ok(())
}

async fn pending(config: &AppConfig) -> anyhow::Result<()> {
    let local = LocalStorage::open(config)?;
    let entries = local.offline_queue.list_pending().await?;
    if entries.is_empty() {
        println!("Offline queue is empty");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_queue_entry(entry));
    }
    println!("{} queued", entries.len());
    Ok(())
}

async fn sync(config: &AppConfig) -> anyhow::Result<()> {
    let ctx = ServiceContext::initialize(config).await?;
    if !ctx.connectivity.is_online() {
        let queued = ctx.offline_queue().list_pending().await?.len();
        bail!("Remote store unreachable, {} entries stay queued", queued);
    }
    let summary = ctx.sync_coordinator.replay(ReplayTrigger::Manual).await?;
    println!(
        "Replayed {} entries: {} confirmed, {} failed, {} skipped",
        summary.pending, summary.confirmed, summary.failed, summary.skipped
    );
    if summary.permanent_failures > 0 {
        println!(
            "{} entries were refused by the remote store and stay queued until reset",
            summary.permanent_failures
        );
    }
    Ok(())
}

async fn reset_queue(config: &AppConfig, confirmed: bool) -> anyhow::Result<()> {
    if !confirmed {
        bail!("This drops every queued expense; pass --yes to confirm");
    }
    let local = LocalStorage::open(config)?;
    let dropped = local.offline_queue.list_pending().await?.len();
    local.offline_queue.clear().await?;
    println!("Dropped {} queued entries", dropped);
    Ok(())
}

async fn notify(config: &AppConfig, command: NotifyCommand) -> anyhow::Result<()> {
    let local = LocalStorage::open(config)?;
    let scheduler = notification_scheduler(&local);
    match command {
        NotifyCommand::Test => {
            if scheduler.send_test_notification().await? {
                println!("Test notification sent");
            } else {
                println!("Notifications are not permitted");
            }
        }
        NotifyCommand::Settings(args) => {
            let settings = if args.is_empty() {
                scheduler.settings()
            } else {
                let settings = merge_settings(scheduler.settings(), args);
                scheduler.update_settings(settings.clone()).await?;
                settings
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

fn merge_settings(mut settings: NotificationSettings, args: NotifySettingsArgs) -> NotificationSettings {
    if let Some(enabled) = args.summary_enabled {
        settings.summary_enabled = enabled;
    }
    if let Some(time) = args.summary_time {
        settings.summary_time = time;
    }
    if let Some(enabled) = args.reminder_enabled {
        settings.reminder_enabled = enabled;
    }
    if let Some(time) = args.reminder_time {
        settings.reminder_time = time;
    }
    settings
}

fn report_event(event: &SyncEvent) {
    match event {
        SyncEvent::Confirmed {
            local_id,
            transaction,
        } => info!("Synced {} as {}", local_id, transaction.id),
        SyncEvent::Queued { local_id, durable } => {
            info!("Queued {} (durable={})", local_id, durable)
        }
        SyncEvent::RolledBack { local_id, message } => {
            warn!("Expense {} was not saved, enter it again: {}", local_id, message)
        }
        SyncEvent::ReplayFinished(summary) if summary.pending > 0 => info!(
            "Replay finished: {} confirmed, {} failed",
            summary.confirmed, summary.failed
        ),
        SyncEvent::ReplayFinished(_) => {}
    }
}

async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let ctx = ServiceContext::initialize(config).await?;
    let coordinator = ctx.sync_coordinator();

    let mut events = coordinator.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => report_event(&event),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} sync events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let probe = spawn_connectivity_probe(
        ctx.connectivity.clone(),
        ctx.remote_store(),
        config.probe_interval(),
    );

    let cache = match &config.app_url {
        Some(app_url) => {
            let fetcher = Arc::new(HttpFetcher::new(app_url, config.request_timeout())?);
            register_background_cache(CacheConfig::default(), fetcher).await
        }
        None => {
            info!("POCKETLEDGER_APP_URL not set, only remote-store listings are cached");
            ctx.api_cache.clone()
        }
    };
    let relay = cache
        .as_ref()
        .map(|cache| cache.follow_connectivity(&ctx.connectivity));

    coordinator
        .ensure_background_started(cache.as_ref().map(|cache| cache.subscribe_clients()))
        .await;
    start_coordinator(&ctx).await;

    let scheduler = ctx.notification_scheduler();
    scheduler.start().await;

    info!("PocketLedger is running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    scheduler.stop().await;
    coordinator.ensure_background_stopped().await;
    if let Some(relay) = relay {
        relay.abort();
    }
    if let Some(cache) = cache {
        cache.shutdown();
    }
    probe.abort();
    reporter.abort();
    Ok(())
}
