mod commands;
mod config;
mod dates;
mod db;
mod errors;
mod models;
mod notifier;
mod reminders;
mod routes;
mod scheduler;
mod state;
mod store;
mod telegram;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::poller::run_command_poller;
use crate::config::Config;
use crate::db::create_pool;
use crate::reminders::{ReminderSettings, ScanEngine};
use crate::routes::build_router;
use crate::scheduler::{DailyTrigger, Scheduler};
use crate::state::AppState;
use crate::store::{RecordStore, SqliteRecordStore};
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration errors (missing BOT_TOKEN, bad TZ) abort startup
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting remembrance v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite record store
    let pool = create_pool(&config.db_path, config.store_timeout).await?;
    let store: Arc<dyn RecordStore> =
        Arc::new(SqliteRecordStore::new(pool, config.store_timeout));

    // Initialize Telegram client (notifier + command source)
    let telegram = TelegramClient::new(&config.bot_token, config.delivery_timeout)?;
    info!("Telegram client initialized");

    // Daily reminder scan
    let trigger = DailyTrigger::new(config.reminder_hour, config.reminder_minute, config.timezone)?;
    let settings = ReminderSettings {
        lead_days: config.days_before,
        show_zero_anniversary: config.show_zero_anniversary,
    };
    let engine = ScanEngine::new(
        Arc::clone(&store),
        Arc::new(telegram.clone()),
        settings,
        config.delivery_timeout,
    );
    let scheduler = Scheduler::new(trigger, engine, Arc::clone(&store));
    info!(
        "Reminders scheduled daily at {:02}:{:02} {} with {} days lead time",
        config.reminder_hour, config.reminder_minute, config.timezone, config.days_before
    );

    let state = AppState {
        store,
        telegram,
        config: config.clone(),
    };

    let app = build_router(state.clone()).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {addr}");

    let mut server_task = tokio::spawn(async move { axum::serve(listener, app).await });
    let mut scheduler_task = tokio::spawn(scheduler.run());
    let mut poller_task = tokio::spawn(run_command_poller(state));

    tokio::select! {
        result = &mut server_task => error!("Health server exited: {result:?}"),
        result = &mut scheduler_task => error!("Scheduler exited: {result:?}"),
        result = &mut poller_task => error!("Command poller exited: {result:?}"),
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    server_task.abort();
    scheduler_task.abort();
    poller_task.abort();
    info!("Bot stopped");
    Ok(())
}
