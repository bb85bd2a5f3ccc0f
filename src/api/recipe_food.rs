use actix_web::{delete, get, post, put, web, HttpResponse};

use super::guarded;
use crate::cache::FoodCache;
use crate::error::ApiError;
use crate::models::{NewRecipeFood, RecipeFoodKey};
use crate::query;
use crate::{CircuitBreakerType, DbPool};

#[get("/recipe_food")]
pub(crate) async fn get_recipes_with_food(
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let details = guarded(circuit_breaker, pool, |conn| {
        query::find_recipe_details(None, conn)
    })
    .await?;
    Ok(HttpResponse::Ok().json(details))
}

#[post("/recipe_food")]
pub(crate) async fn create_recipe_food(
    body: web::Json<NewRecipeFood>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let link = body.into_inner();
    link.validate().map_err(ApiError::BadRequest)?;

    let response = link.clone();
    guarded(circuit_breaker, pool, move |conn| {
        query::insert_recipe_food(&link, conn)
    })
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/recipe_food/batch")]
pub(crate) async fn create_recipe_food_batch(
    body: web::Json<Vec<NewRecipeFood>>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let links = body.into_inner();
    if links.is_empty() {
        return Err(ApiError::BadRequest("no links given".to_string()));
    }
    for link in &links {
        link.validate().map_err(ApiError::BadRequest)?;
    }

    let response = links.clone();
    guarded(circuit_breaker, pool, move |conn| {
        query::insert_recipe_food_batch(&links, conn)
    })
    .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[put("/recipe_food")]
pub(crate) async fn update_use_amount(
    body: web::Json<NewRecipeFood>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let change = body.into_inner();
    change.validate().map_err(ApiError::BadRequest)?;

    let key = RecipeFoodKey {
        recipe_id: change.recipe_id,
        food_id: change.food_id,
    };
    let use_amount = change.use_amount;
    let found = guarded(circuit_breaker, pool, move |conn| {
        query::update_use_amount(key, use_amount, conn)
    })
    .await?;
    if !found {
        return Err(ApiError::NotFound("recipe food"));
    }
    Ok(HttpResponse::Ok().json(change))
}

#[delete("/recipe_food")]
pub(crate) async fn delete_recipe_food(
    body: web::Json<RecipeFoodKey>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let key = body.into_inner();
    let deleted = guarded(circuit_breaker, pool, move |conn| {
        query::delete_recipe_food(key, conn)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("recipe food"));
    }
    Ok(HttpResponse::Ok().json(key))
}

/// Subtracts one run of the recipe from stock.
#[put("/recipe_food/cook/{recipe_id}")]
pub(crate) async fn cook_recipe(
    recipe_id: web::Path<i32>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    cache: web::Data<FoodCache>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = recipe_id.into_inner();
    let outcome = guarded(circuit_breaker, pool, move |conn| {
        query::cook_recipe(recipe_id, conn)
    })
    .await?
    .ok_or(ApiError::NotFound("recipe"))?;
    if !outcome.short_food_ids.is_empty() {
        log::info!(
            "recipe {} is short on foods {:?}",
            recipe_id,
            outcome.short_food_ids
        );
    }
    web::block(move || cache.invalidate()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
