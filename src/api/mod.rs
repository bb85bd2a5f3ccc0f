//! HTTP routes under `/backend`.

mod foods;
mod health;
mod recipe_food;
mod recipes;

use actix_web::{guard, middleware, web, HttpResponse};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::MysqlConnection;
use failsafe::CircuitBreaker;

use crate::error::ApiError;
use crate::query::DbError;
use crate::watcher::{Clock, DailySchedule, ExpiringWindow, SystemClock};
use crate::{CircuitBreakerType, DbPool};

/// Where "today" is for the expiring-food listing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpiryCalendar {
    schedule: DailySchedule,
    window_days: u32,
}

impl ExpiryCalendar {
    pub(crate) fn new(schedule: DailySchedule, window_days: u32) -> Self {
        Self {
            schedule,
            window_days,
        }
    }

    pub(crate) fn window_at(&self, clock: &impl Clock) -> ExpiringWindow {
        ExpiringWindow::starting(self.schedule.today(clock.now()), self.window_days)
    }

    fn current_window(&self) -> ExpiringWindow {
        self.window_at(&SystemClock)
    }
}

/// Constraint violations caused by the request body, not by MySQL health.
fn is_client_error(e: &DbError) -> bool {
    matches!(
        e.downcast_ref::<DieselError>(),
        Some(DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation | DatabaseErrorKind::UniqueViolation,
            _,
        ))
    )
}

fn call_guarded<T, F>(circuit_breaker: &CircuitBreakerType, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, DbError>,
{
    match circuit_breaker.call_with(|e: &DbError| !is_client_error(e), f) {
        Ok(value) => Ok(value),
        //rejected which means sql db is not responsive
        Err(failsafe::Error::Rejected) => Err(ApiError::Unavailable),
        Err(failsafe::Error::Inner(e)) if is_client_error(&e) => {
            Err(ApiError::BadRequest(e.to_string()))
        }
        Err(failsafe::Error::Inner(e)) => Err(ApiError::Internal(e)),
    }
}

/// Runs `f` on the blocking pool with a pooled connection, behind the
/// circuit breaker. An open breaker answers 503 without touching MySQL.
/// Foreign key and unique violations answer 400 and leave the breaker alone.
pub(crate) async fn guarded<F, T>(
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&MysqlConnection) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || {
        call_guarded(&circuit_breaker, || -> Result<T, DbError> {
            let conn = pool.get()?;
            f(&*conn)
        })
    })
    .await?
}

pub(crate) fn cors_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE"))
        .add(("Access-Control-Allow-Headers", "*"))
}

async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/backend")
            .service(foods::get_all_foods)
            .service(foods::search_foods)
            .service(foods::get_expiring_foods)
            .service(foods::create_food)
            .service(foods::update_food)
            .service(foods::delete_food)
            .service(recipes::get_all_recipes)
            .service(recipes::get_recipe_detail)
            .service(recipes::create_recipe)
            .service(recipes::update_recipe)
            .service(recipes::delete_recipe)
            .service(recipe_food::get_recipes_with_food)
            .service(recipe_food::create_recipe_food)
            .service(recipe_food::create_recipe_food_batch)
            .service(recipe_food::update_use_amount)
            .service(recipe_food::delete_recipe_food)
            .service(recipe_food::cook_recipe)
            .service(health::get_watcher_health)
            //only OPTIONS, so other methods on unknown paths still 404
            .service(
                web::resource("/{tail:.*}")
                    .guard(guard::Options())
                    .to(preflight),
            ),
    );
}
