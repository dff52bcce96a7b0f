use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;

const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

/// Application configuration loaded from environment variables.
/// Startup fails if the bot token is missing or a value is out of range.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub timezone: Tz,
    pub reminder_hour: u32,
    pub reminder_minute: u32,
    pub days_before: u32,
    pub db_path: String,
    /// Show the "0-я годовщина" suffix for events in the current year.
    pub show_zero_anniversary: bool,
    pub store_timeout: Duration,
    pub delivery_timeout: Duration,
    pub poll_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let timezone_name = optional_env("TZ").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = Tz::from_str(&timezone_name)
            .map_err(|e| anyhow::anyhow!("TZ '{timezone_name}' is not a known timezone: {e}"))?;

        let reminder_hour: u32 = parse_env("REMINDER_HOUR", 9)?;
        if reminder_hour > 23 {
            bail!("REMINDER_HOUR must be in 0..=23, got {reminder_hour}");
        }
        let reminder_minute: u32 = parse_env("REMINDER_MINUTE", 0)?;
        if reminder_minute > 59 {
            bail!("REMINDER_MINUTE must be in 0..=59, got {reminder_minute}");
        }
        let days_before: u32 = parse_env("DAYS_BEFORE", 3)?;
        if days_before > 366 {
            bail!("DAYS_BEFORE must be at most 366, got {days_before}");
        }

        Ok(Config {
            bot_token: require_env("BOT_TOKEN")?,
            timezone,
            reminder_hour,
            reminder_minute,
            days_before,
            db_path: optional_env("DB_PATH").unwrap_or_else(|| "reminders.db".to_string()),
            show_zero_anniversary: parse_env("SHOW_ZERO_ANNIVERSARY", true)?,
            store_timeout: Duration::from_secs(parse_env("STORE_TIMEOUT_SECS", 10)?),
            delivery_timeout: Duration::from_secs(parse_env("DELIVERY_TIMEOUT_SECS", 30)?),
            poll_timeout: Duration::from_secs(parse_env("POLL_TIMEOUT_SECS", 25)?),
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable's trimmed value, treating empty as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}
