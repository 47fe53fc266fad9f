//! CLI command definitions for callforge.
//!
//! The `serve` command runs the full engine (migrations, recurrence
//! rebuild, trigger poller, executor) until interrupted. The remaining
//! commands are one-shot management operations issued against the same
//! store and queue the daemon uses.

use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::EngineConfig;
use crate::dialer::TwilioDialer;
use crate::error::parse_schedule_time;
use crate::notify::TelegramNotifier;
use crate::scheduler::{
    CallRequest, CallScheduler, CallStatusView, Executor, Recurrence, RecurrenceEngine,
    RedisQueue, RetryPolicy, ScheduleRequest, TriggerPoller, WorkQueue,
};
use crate::storage::{Database, JobStore, MigrationRunner};

/// Scheduled outbound voice-call engine.
#[derive(Parser)]
#[command(name = "callforge")]
#[command(about = "Schedule, queue and execute outbound voice calls")]
#[command(version)]
#[command(
    long_about = "callforge persists call schedules in PostgreSQL, promotes due work onto a Redis queue, and executes it against the call-placement provider with bounded retry.\n\nExample usage:\n  callforge schedule +15551234567 2023-10-10T10:00:00Z --message \"Stand-up in 10\" --user 42\n  callforge serve"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the engine: poller, executor and recurrence timers.
    Serve,

    /// Queue an immediate call.
    Call(CallArgs),

    /// Schedule a call for later (optionally recurring) execution.
    #[command(alias = "sched")]
    Schedule(ScheduleArgs),

    /// Cancel a scheduled call.
    Cancel(TargetArgs),

    /// Move a scheduled call to a new trigger time.
    Reschedule(RescheduleArgs),

    /// Show the status of a scheduled or executed call.
    Status(TargetArgs),

    /// List call history, newest first.
    History(HistoryArgs),

    /// Show per-owner call statistics.
    Stats(UserArgs),

    /// Run database migrations and exit.
    Migrate,
}

/// Arguments for `callforge call`.
#[derive(Parser, Debug)]
pub struct CallArgs {
    /// Destination number in E.164 format (e.g. +15551234567).
    pub phone_number: String,

    /// Message text to speak.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Language of the message payload.
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Opaque platform hint passed to the call-placement provider.
    #[arg(long)]
    pub platform: Option<String>,

    /// Owner identity notified about the outcome.
    #[arg(short, long)]
    pub user: i64,
}

/// Arguments for `callforge schedule`.
#[derive(Parser, Debug)]
pub struct ScheduleArgs {
    /// Destination number in E.164 format.
    pub phone_number: String,

    /// Trigger time (ISO-8601, e.g. 2023-10-10T10:00:00Z).
    pub time: String,

    /// Recurrence: none, daily or weekly.
    #[arg(short, long, default_value = "none")]
    pub recurrence: String,

    /// Message text to speak.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Language of the message payload.
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Opaque platform hint passed to the call-placement provider.
    #[arg(long)]
    pub platform: Option<String>,

    /// Owner identity notified about outcomes.
    #[arg(short, long)]
    pub user: i64,
}

/// Arguments addressing one call for one owner.
#[derive(Parser, Debug)]
pub struct TargetArgs {
    /// Call id.
    pub id: i64,

    /// Owner identity.
    #[arg(short, long)]
    pub user: i64,
}

/// Arguments for `callforge reschedule`.
#[derive(Parser, Debug)]
pub struct RescheduleArgs {
    /// Scheduled call id.
    pub id: i64,

    /// New trigger time (ISO-8601).
    pub time: String,

    /// Owner identity.
    #[arg(short, long)]
    pub user: i64,
}

/// Arguments for `callforge history`.
#[derive(Parser, Debug)]
pub struct HistoryArgs {
    /// 1-based page number.
    #[arg(short, long, default_value = "1")]
    pub page: u32,

    /// Owner identity.
    #[arg(short, long)]
    pub user: i64,
}

/// Arguments carrying only an owner identity.
#[derive(Parser, Debug)]
pub struct UserArgs {
    /// Owner identity.
    #[arg(short, long)]
    pub user: i64,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Dispatches a parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve => serve().await,
        Commands::Call(args) => call(args).await,
        Commands::Schedule(args) => schedule(args).await,
        Commands::Cancel(args) => cancel(args).await,
        Commands::Reschedule(args) => reschedule(args).await,
        Commands::Status(args) => status(args).await,
        Commands::History(args) => history(args).await,
        Commands::Stats(args) => stats(args).await,
        Commands::Migrate => migrate().await,
    }
}

/// Engine wiring shared by the daemon and the one-shot commands.
struct Engine {
    config: EngineConfig,
    store: Arc<Database>,
    queue: Arc<RedisQueue>,
    recurrence: Arc<RecurrenceEngine>,
    scheduler: CallScheduler,
}

impl Engine {
    async fn connect() -> anyhow::Result<Self> {
        let config = EngineConfig::from_env()?;

        let store = Arc::new(Database::connect(&config.database_url).await?);
        let queue = Arc::new(RedisQueue::connect(&config.redis_url, &config.queue_name).await?);
        let notifier = Arc::new(TelegramNotifier::new(&config.telegram_bot_token));
        let recurrence = Arc::new(RecurrenceEngine::new(
            Arc::clone(&queue) as Arc<dyn WorkQueue>
        ));

        let scheduler = CallScheduler::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::clone(&queue) as Arc<dyn WorkQueue>,
            notifier,
            Arc::clone(&recurrence),
        );

        Ok(Self {
            config,
            store,
            queue,
            recurrence,
            scheduler,
        })
    }
}

async fn serve() -> anyhow::Result<()> {
    let engine = Engine::connect().await?;
    engine.store.run_migrations().await?;

    let rebuilt = engine.recurrence.rebuild(engine.store.as_ref()).await?;
    info!(rebuilt, "Recurrence handles armed");

    let dialer = Arc::new(TwilioDialer::from_config(&engine.config));
    let notifier = Arc::new(TelegramNotifier::new(&engine.config.telegram_bot_token));

    let (shutdown_tx, _) = broadcast::channel(1);

    let poller = TriggerPoller::new(
        Arc::clone(&engine.store) as Arc<dyn JobStore>,
        Arc::clone(&engine.queue) as Arc<dyn WorkQueue>,
        engine.config.poll_interval,
    );
    let executor = Executor::new(
        Arc::clone(&engine.queue) as Arc<dyn WorkQueue>,
        Arc::clone(&engine.store) as Arc<dyn JobStore>,
        dialer,
        notifier,
        engine.config.executor_idle_interval,
        RetryPolicy {
            max_attempts: engine.config.dial_max_attempts,
            delay: engine.config.dial_retry_delay,
        },
    );

    let poller_handle = tokio::spawn(poller.run(shutdown_tx.subscribe()));
    let executor_handle = tokio::spawn(executor.run(shutdown_tx.subscribe()));

    info!("callforge engine running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // Ignore send error - the loops may have already stopped
    let _ = shutdown_tx.send(());
    engine.recurrence.shutdown().await;
    poller_handle.await?;
    executor_handle.await?;

    Ok(())
}

async fn call(args: CallArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;

    engine
        .scheduler
        .place_call_now(CallRequest {
            phone_number: args.phone_number.clone(),
            message: args.message,
            language: args.language,
            platform: args.platform,
            user_id: args.user,
        })
        .await?;

    println!("Call to {} queued for processing.", args.phone_number);
    Ok(())
}

async fn schedule(args: ScheduleArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;

    let schedule_time = parse_schedule_time(&args.time)?;
    let recurrence: Recurrence = args.recurrence.parse()?;

    let call = engine
        .scheduler
        .schedule_call(ScheduleRequest {
            phone_number: args.phone_number,
            message: args.message,
            language: args.language,
            platform: args.platform,
            schedule_time,
            recurrence,
            user_id: args.user,
        })
        .await?;

    println!(
        "Call scheduled to {} at {} (ID: {}).",
        call.phone_number, call.schedule_time, call.id
    );
    Ok(())
}

async fn cancel(args: TargetArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;
    engine.scheduler.cancel(args.id, args.user).await?;
    println!("Scheduled call (ID: {}) has been cancelled.", args.id);
    Ok(())
}

async fn reschedule(args: RescheduleArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;

    let new_time = parse_schedule_time(&args.time)?;
    let call = engine.scheduler.reschedule(args.id, new_time, args.user).await?;

    println!(
        "Scheduled call (ID: {}) rescheduled to {}.",
        call.id, call.schedule_time
    );
    Ok(())
}

async fn status(args: TargetArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;

    match engine.scheduler.status(args.id, args.user).await? {
        Some(CallStatusView::Scheduled(call)) => {
            println!(
                "Scheduled call (ID: {}): status: {}, time: {}, to: {}",
                call.id, call.status, call.schedule_time, call.phone_number
            );
        }
        Some(CallStatusView::History(record)) => {
            println!(
                "Executed call (ID: {}): status: {}, time: {}, to: {}, SID: {}",
                record.id,
                record.status,
                record.timestamp,
                record.phone_number,
                record.call_sid.as_deref().unwrap_or("-")
            );
        }
        None => println!("Call not found."),
    }
    Ok(())
}

async fn history(args: HistoryArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;

    let page = engine.scheduler.history(args.user, args.page).await?;
    if page.records.is_empty() {
        println!("No call history found.");
        return Ok(());
    }

    println!("Call history (page {}/{}):", page.page, page.total_pages);
    for record in &page.records {
        println!(
            "  ID: {}, to: {}, status: {}, time: {}",
            record.id, record.phone_number, record.status, record.timestamp
        );
    }
    Ok(())
}

async fn stats(args: UserArgs) -> anyhow::Result<()> {
    let engine = Engine::connect().await?;

    let stats = engine.scheduler.stats(args.user).await?;
    println!("Total calls: {}", stats.total_calls);
    println!("Completed calls: {}", stats.completed_calls);
    println!("Success rate: {:.2}%", stats.success_rate());
    println!("Pending scheduled calls: {}", stats.pending_scheduled);
    Ok(())
}

async fn migrate() -> anyhow::Result<()> {
    // Migrations only need the database; skip the full engine config so
    // this can run before the collaborator credentials exist.
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let store = Database::connect(&database_url).await?;
    let runner = MigrationRunner::new(store.pool().clone());
    runner.run_migrations().await?;

    let applied = runner.list_applied_migrations().await?;
    println!("Applied migrations:");
    for migration in applied {
        println!("  {} ({})", migration.name, migration.applied_at);
    }
    Ok(())
}
