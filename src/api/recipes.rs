use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;

use super::guarded;
use crate::error::ApiError;
use crate::models::NewRecipe;
use crate::query;
use crate::{CircuitBreakerType, DbPool};

#[get("/recipes")]
pub(crate) async fn get_all_recipes(
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let recipes = guarded(circuit_breaker, pool, query::find_all_recipes).await?;
    Ok(HttpResponse::Ok().json(recipes))
}

//one row per food the recipe uses
#[get("/recipes/{recipe_id}")]
pub(crate) async fn get_recipe_detail(
    recipe_id: web::Path<i32>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = recipe_id.into_inner();
    let details = guarded(circuit_breaker, pool, move |conn| {
        if query::find_recipe(recipe_id, conn)?.is_none() {
            return Ok(None);
        }
        query::find_recipe_details(Some(recipe_id), conn).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("recipe"))?;
    Ok(HttpResponse::Ok().json(details))
}

#[post("/recipes")]
pub(crate) async fn create_recipe(
    body: web::Json<NewRecipe>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let new_recipe = body.into_inner();
    new_recipe.validate().map_err(ApiError::BadRequest)?;

    let recipe = guarded(circuit_breaker, pool, move |conn| {
        query::insert_recipe(&new_recipe, conn)
    })
    .await?;
    Ok(HttpResponse::Ok().json(recipe))
}

#[put("/recipes/{recipe_id}")]
pub(crate) async fn update_recipe(
    recipe_id: web::Path<i32>,
    body: web::Json<NewRecipe>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = recipe_id.into_inner();
    let changes = body.into_inner();
    changes.validate().map_err(ApiError::BadRequest)?;

    let recipe = guarded(circuit_breaker, pool, move |conn| {
        query::update_recipe(recipe_id, &changes, conn)
    })
    .await?
    .ok_or(ApiError::NotFound("recipe"))?;
    Ok(HttpResponse::Ok().json(recipe))
}

#[delete("/recipes/{recipe_id}")]
pub(crate) async fn delete_recipe(
    recipe_id: web::Path<i32>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = recipe_id.into_inner();
    let deleted = guarded(circuit_breaker, pool, move |conn| {
        query::delete_recipe(recipe_id, conn)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("recipe"));
    }
    Ok(HttpResponse::Ok().json(json!({ "id": recipe_id })))
}
