use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{guarded, ExpiryCalendar};
use crate::cache::FoodCache;
use crate::error::ApiError;
use crate::models::NewFood;
use crate::query;
use crate::{CircuitBreakerType, DbPool};

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
}

//cached copy first, mysql on a miss, then refill the cache
#[get("/foods")]
pub(crate) async fn get_all_foods(
    circuit_breaker: web::Data<CircuitBreakerType>,
    cache: web::Data<FoodCache>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    if cache.is_enabled() {
        let reader = cache.clone();
        if let Some(foods) = web::block(move || reader.get_all()).await? {
            return Ok(HttpResponse::Ok().json(foods));
        }
    }

    let foods = guarded(circuit_breaker, pool, query::find_all_foods).await?;

    if cache.is_enabled() {
        let to_cache = foods.clone();
        web::block(move || cache.put_all(&to_cache)).await?;
    }
    Ok(HttpResponse::Ok().json(foods))
}

#[get("/foods/search")]
pub(crate) async fn search_foods(
    params: web::Query<SearchParams>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let term = params.into_inner().q;
    let foods = guarded(circuit_breaker, pool, move |conn| {
        query::search_foods_by_name(&term, conn)
    })
    .await?;
    Ok(HttpResponse::Ok().json(foods))
}

/// Recipe links whose food expires inside the window, soonest first.
#[get("/foods/expiring")]
pub(crate) async fn get_expiring_foods(
    calendar: web::Data<ExpiryCalendar>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let window = calendar.current_window();
    let rows = guarded(circuit_breaker, pool, move |conn| {
        query::find_foods_with_expiration(window, conn)
    })
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[post("/foods")]
pub(crate) async fn create_food(
    body: web::Json<NewFood>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    cache: web::Data<FoodCache>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let new_food = body.into_inner();
    new_food.validate().map_err(ApiError::BadRequest)?;

    let food = guarded(circuit_breaker, pool, move |conn| {
        query::insert_food(&new_food, conn)
    })
    .await?;
    web::block(move || cache.invalidate()).await?;
    Ok(HttpResponse::Ok().json(food))
}

#[put("/foods/{food_id}")]
pub(crate) async fn update_food(
    food_id: web::Path<i32>,
    body: web::Json<NewFood>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    cache: web::Data<FoodCache>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let food_id = food_id.into_inner();
    let changes = body.into_inner();
    changes.validate().map_err(ApiError::BadRequest)?;

    let food = guarded(circuit_breaker, pool, move |conn| {
        query::update_food(food_id, &changes, conn)
    })
    .await?
    .ok_or(ApiError::NotFound("food"))?;
    web::block(move || cache.invalidate()).await?;
    Ok(HttpResponse::Ok().json(food))
}

#[delete("/foods/{food_id}")]
pub(crate) async fn delete_food(
    food_id: web::Path<i32>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    cache: web::Data<FoodCache>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let food_id = food_id.into_inner();
    let deleted = guarded(circuit_breaker, pool, move |conn| {
        query::delete_food(food_id, conn)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("food"));
    }
    web::block(move || cache.invalidate()).await?;
    Ok(HttpResponse::Ok().json(json!({ "id": food_id })))
}
