use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;

use crate::watcher::{DailySchedule, ExpiringWindow, WatchError, WatcherConfig};

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error(transparent)]
    Watcher(#[from] WatchError),
}

pub(crate) struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub bind_addr: String,
    pub schedule: DailySchedule,
    pub watcher: WatcherConfig,
}

impl Config {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let zone = lookup("EXPIRATION_TIME_ZONE").unwrap_or_else(|| "Asia/Tokyo".to_string());
        let hour: u32 = try_load(&lookup, "EXPIRATION_NOTICE_HOUR", 15);
        let schedule = DailySchedule::new(&zone, hour)?;

        let tick_secs: u64 = try_load(&lookup, "EXPIRATION_TICK_SECS", 60);
        let watcher = WatcherConfig {
            tick: Duration::from_secs(clamp_tick(tick_secs)),
            window_days: try_load(&lookup, "EXPIRATION_WINDOW_DAYS", ExpiringWindow::DEFAULT_DAYS),
        };

        Ok(Self {
            database_url,
            redis_url,
            bind_addr,
            schedule,
            watcher,
        })
    }
}

//a tick longer than the notice hour could sleep through it
const MAX_TICK_SECS: u64 = 3600;

fn clamp_tick(secs: u64) -> u64 {
    if secs > MAX_TICK_SECS {
        log::warn!(
            "EXPIRATION_TICK_SECS {} would skip the notice hour, using {}",
            secs,
            MAX_TICK_SECS
        );
        return MAX_TICK_SECS;
    }
    secs.max(1)
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            log::info!("{} not set, using default: {}", key, default);
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {} value {:?}: {}, using default: {}", key, raw, e, default);
            default
        }),
    }
}
