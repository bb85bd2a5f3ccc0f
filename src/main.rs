#[macro_use]
extern crate diesel;
use std::io;

use actix_web::{middleware, web, App, HttpServer};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};

mod api;
mod cache;
mod config;
mod error;
mod models;
mod query;
mod schema;
mod watcher;

use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::StateMachine;

use crate::api::ExpiryCalendar;
use crate::cache::FoodCache;
use crate::config::Config;
use crate::watcher::{ExpirationWatcher, LogNotifier, MysqlExpirationStore, SystemClock};

pub(crate) type DbPool = r2d2::Pool<ConnectionManager<MysqlConnection>>;

pub(crate) type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // set up database connection pool
    let manager = ConnectionManager::<MysqlConnection>::new(config.database_url.as_str());
    let pool = r2d2::Pool::builder()
        .build(manager)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let cache = match config.redis_url.as_deref() {
        Some(url) => FoodCache::connect(url).unwrap_or_else(|e| {
            log::warn!("food cache disabled, redis unavailable: {}", e);
            FoodCache::disabled()
        }),
        None => FoodCache::disabled(),
    };

    let circuit_breaker: CircuitBreakerType = failsafe::Config::new().build();

    let expiration_watcher = ExpirationWatcher::new(
        MysqlExpirationStore::new(pool.clone()),
        LogNotifier,
        SystemClock,
        config.schedule,
        config.watcher,
    );
    let watcher_handle = expiration_watcher.spawn()?;
    let probe = watcher_handle.health();
    let calendar = ExpiryCalendar::new(config.schedule, config.watcher.window_days);

    log::info!("starting HTTP server at http://{}", config.bind_addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::new(circuit_breaker.clone()))
            .app_data(web::Data::new(probe.clone()))
            .app_data(web::Data::new(calendar))
            .wrap(api::cors_headers())
            .wrap(middleware::Logger::default())
            .configure(api::configure)
    })
    .bind(config.bind_addr.as_str())?
    .run();

    let result = server.await;
    watcher_handle.shutdown();
    result
}
