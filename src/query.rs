use crate::models::{
    CookOutcome, ExpiringFood, ExpiringRecipeFood, Food, FoodWithExpiration, NewFood, NewRecipe,
    NewRecipeFood, Recipe, RecipeFoodDetail, RecipeFoodKey,
};
use crate::schema::{foods, recipe_food, recipes};
use crate::watcher::ExpiringWindow;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sql_types::{Bigint, Unsigned};
pub(crate) type DbError = Box<dyn std::error::Error + Send + Sync>;

no_arg_sql_function!(
    last_insert_id,
    Unsigned<Bigint>,
    "Id generated by the last insert on this connection."
);

fn inserted_id(conn: &MysqlConnection) -> QueryResult<i32> {
    let id = diesel::select(last_insert_id).first::<u64>(conn)?;
    i32::try_from(id).map_err(|e| diesel::result::Error::DeserializationError(Box::new(e)))
}

pub(crate) fn find_all_foods(conn: &MysqlConnection) -> Result<Vec<Food>, DbError> {
    Ok(foods::table.order(foods::id).load::<Food>(conn)?)
}

pub(crate) fn search_foods_by_name(
    term: &str,
    conn: &MysqlConnection,
) -> Result<Vec<Food>, DbError> {
    let pattern = format!("%{}%", term);
    Ok(foods::table
        .filter(foods::name.like(pattern))
        .order(foods::id)
        .load::<Food>(conn)?)
}

pub(crate) fn find_food(food_id: i32, conn: &MysqlConnection) -> Result<Option<Food>, DbError> {
    Ok(foods::table.find(food_id).first::<Food>(conn).optional()?)
}

//mysql has no RETURNING, so read the row back by the id this connection generated
pub(crate) fn insert_food(new_food: &NewFood, conn: &MysqlConnection) -> Result<Food, DbError> {
    let food = conn.transaction::<_, diesel::result::Error, _>(|| {
        diesel::insert_into(foods::table)
            .values(new_food)
            .execute(conn)?;
        foods::table.find(inserted_id(conn)?).first::<Food>(conn)
    })?;
    Ok(food)
}

pub(crate) fn update_food(
    food_id: i32,
    changes: &NewFood,
    conn: &MysqlConnection,
) -> Result<Option<Food>, DbError> {
    //mysql reports 0 affected rows for an unchanged row, so look it up either way
    diesel::update(foods::table.find(food_id))
        .set(changes)
        .execute(conn)?;
    find_food(food_id, conn)
}

/// Deletes the food and every recipe link pointing at it.
pub(crate) fn delete_food(food_id: i32, conn: &MysqlConnection) -> Result<usize, DbError> {
    let deleted = conn.transaction::<_, diesel::result::Error, _>(|| {
        diesel::delete(recipe_food::table.filter(recipe_food::food_id.eq(food_id)))
            .execute(conn)?;
        diesel::delete(foods::table.find(food_id)).execute(conn)
    })?;
    Ok(deleted)
}

pub(crate) fn find_all_recipes(conn: &MysqlConnection) -> Result<Vec<Recipe>, DbError> {
    Ok(recipes::table.order(recipes::id).load::<Recipe>(conn)?)
}

pub(crate) fn find_recipe(
    recipe_id: i32,
    conn: &MysqlConnection,
) -> Result<Option<Recipe>, DbError> {
    Ok(recipes::table
        .find(recipe_id)
        .first::<Recipe>(conn)
        .optional()?)
}

pub(crate) fn insert_recipe(
    new_recipe: &NewRecipe,
    conn: &MysqlConnection,
) -> Result<Recipe, DbError> {
    let recipe = conn.transaction::<_, diesel::result::Error, _>(|| {
        diesel::insert_into(recipes::table)
            .values(new_recipe)
            .execute(conn)?;
        recipes::table.find(inserted_id(conn)?).first::<Recipe>(conn)
    })?;
    Ok(recipe)
}

pub(crate) fn update_recipe(
    recipe_id: i32,
    changes: &NewRecipe,
    conn: &MysqlConnection,
) -> Result<Option<Recipe>, DbError> {
    diesel::update(recipes::table.find(recipe_id))
        .set(changes)
        .execute(conn)?;
    find_recipe(recipe_id, conn)
}

pub(crate) fn delete_recipe(recipe_id: i32, conn: &MysqlConnection) -> Result<usize, DbError> {
    let deleted = conn.transaction::<_, diesel::result::Error, _>(|| {
        diesel::delete(recipe_food::table.filter(recipe_food::recipe_id.eq(recipe_id)))
            .execute(conn)?;
        diesel::delete(recipes::table.find(recipe_id)).execute(conn)
    })?;
    Ok(deleted)
}

pub(crate) fn find_recipe_details(
    recipe_id: Option<i32>,
    conn: &MysqlConnection,
) -> Result<Vec<RecipeFoodDetail>, DbError> {
    let mut query = recipe_food::table
        .inner_join(foods::table)
        .inner_join(recipes::table)
        .select((
            recipe_food::id,
            recipes::id,
            recipes::name,
            recipes::description,
            foods::id,
            foods::name,
            recipe_food::use_amount,
            foods::unit,
            recipes::making_method,
        ))
        .order(recipe_food::id)
        .into_boxed::<diesel::mysql::Mysql>();
    if let Some(recipe_id) = recipe_id {
        query = query.filter(recipes::id.eq(recipe_id));
    }
    Ok(query.load::<RecipeFoodDetail>(conn)?)
}

pub(crate) fn insert_recipe_food(
    link: &NewRecipeFood,
    conn: &MysqlConnection,
) -> Result<usize, DbError> {
    Ok(diesel::insert_into(recipe_food::table)
        .values(link)
        .execute(conn)?)
}

//inserts every link or none of them
pub(crate) fn insert_recipe_food_batch(
    links: &[NewRecipeFood],
    conn: &MysqlConnection,
) -> Result<usize, DbError> {
    let inserted = conn.transaction::<_, diesel::result::Error, _>(|| {
        diesel::insert_into(recipe_food::table)
            .values(links)
            .execute(conn)
    })?;
    Ok(inserted)
}

/// Returns false when no link joins the two ids.
pub(crate) fn update_use_amount(
    key: RecipeFoodKey,
    use_amount: f64,
    conn: &MysqlConnection,
) -> Result<bool, DbError> {
    let link = recipe_food::table
        .filter(recipe_food::recipe_id.eq(key.recipe_id))
        .filter(recipe_food::food_id.eq(key.food_id));
    let updated = diesel::update(link)
        .set(recipe_food::use_amount.eq(use_amount))
        .execute(conn)?;
    //mysql counts an unchanged row as not affected
    if updated > 0 {
        return Ok(true);
    }
    Ok(diesel::select(exists(link)).get_result::<bool>(conn)?)
}

pub(crate) fn delete_recipe_food(
    key: RecipeFoodKey,
    conn: &MysqlConnection,
) -> Result<usize, DbError> {
    Ok(diesel::delete(
        recipe_food::table
            .filter(recipe_food::recipe_id.eq(key.recipe_id))
            .filter(recipe_food::food_id.eq(key.food_id)),
    )
    .execute(conn)?)
}

/// Takes one run of the recipe out of stock. Foods without enough quantity
/// are left untouched and reported as short. `None` when the recipe is missing.
pub(crate) fn cook_recipe(
    recipe_id: i32,
    conn: &MysqlConnection,
) -> Result<Option<CookOutcome>, DbError> {
    let outcome = conn.transaction::<_, diesel::result::Error, _>(|| {
        let recipe = recipes::table
            .find(recipe_id)
            .select(recipes::id)
            .first::<i32>(conn)
            .optional()?;
        if recipe.is_none() {
            return Ok(None);
        }

        let links = recipe_food::table
            .filter(recipe_food::recipe_id.eq(recipe_id))
            .select((recipe_food::food_id, recipe_food::use_amount))
            .load::<(i32, f64)>(conn)?;

        let mut outcome = CookOutcome {
            recipe_id,
            ..CookOutcome::default()
        };
        for (food_id, use_amount) in links {
            let updated = diesel::update(
                foods::table
                    .find(food_id)
                    .filter(foods::quantity.ge(use_amount)),
            )
            .set(foods::quantity.eq(foods::quantity - use_amount))
            .execute(conn)?;
            if updated == 0 {
                outcome.short_food_ids.push(food_id);
            } else {
                outcome.updated_food_ids.push(food_id);
            }
        }
        Ok(Some(outcome))
    })?;
    Ok(outcome)
}

pub(crate) fn find_expiring_foods(
    window: ExpiringWindow,
    conn: &MysqlConnection,
) -> Result<Vec<ExpiringFood>, DbError> {
    Ok(foods::table
        .filter(foods::expiration_date.between(window.start(), window.end()))
        .select((
            foods::name,
            foods::quantity,
            foods::unit,
            foods::expiration_date,
        ))
        .order((foods::expiration_date, foods::id))
        .load::<ExpiringFood>(conn)?)
}

pub(crate) fn find_recipes_using_expiring_foods(
    window: ExpiringWindow,
    conn: &MysqlConnection,
) -> Result<Vec<ExpiringRecipeFood>, DbError> {
    Ok(recipe_food::table
        .inner_join(foods::table)
        .inner_join(recipes::table)
        .filter(foods::expiration_date.between(window.start(), window.end()))
        .select((
            recipe_food::id,
            recipes::name,
            foods::name,
            recipe_food::use_amount,
        ))
        .order(recipe_food::id)
        .load::<ExpiringRecipeFood>(conn)?)
}

pub(crate) fn find_foods_with_expiration(
    window: ExpiringWindow,
    conn: &MysqlConnection,
) -> Result<Vec<FoodWithExpiration>, DbError> {
    Ok(recipe_food::table
        .inner_join(foods::table)
        .inner_join(recipes::table)
        .filter(foods::expiration_date.between(window.start(), window.end()))
        .select((
            recipe_food::id,
            foods::id,
            foods::name,
            foods::quantity,
            foods::unit,
            foods::expiration_date,
            recipes::id,
            recipes::name,
            recipe_food::use_amount,
        ))
        .order((foods::expiration_date, recipe_food::id))
        .load::<FoodWithExpiration>(conn)?)
}
