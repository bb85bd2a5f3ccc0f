use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::{foods, recipe_food, recipes};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub(crate) struct Food {
    pub id: i32,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub expiration_date: NaiveDate,
    #[serde(rename = "type")]
    pub food_type: String,
}

impl Food {
    pub(crate) fn list_from_u8(bytes: &[u8]) -> Result<Vec<Self>, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub(crate) fn list_to_u8(foods: &[Food]) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(foods)
    }
}

/// Request body for creating or replacing a food.
#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[table_name = "foods"]
pub(crate) struct NewFood {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub expiration_date: NaiveDate,
    #[serde(rename = "type", default)]
    pub food_type: String,
}

impl NewFood {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err("quantity must be a non-negative number".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub(crate) struct Recipe {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub making_method: String,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[table_name = "recipes"]
pub(crate) struct NewRecipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub making_method: String,
}

impl NewRecipe {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

/// How much of one food a single run of a recipe uses.
#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[table_name = "recipe_food"]
pub(crate) struct NewRecipeFood {
    pub recipe_id: i32,
    pub food_id: i32,
    pub use_amount: f64,
}

impl NewRecipeFood {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.use_amount.is_finite() || self.use_amount < 0.0 {
            return Err("use_amount must be a non-negative number".to_string());
        }
        Ok(())
    }
}

/// Identifies a link by its two ends rather than by its own id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct RecipeFoodKey {
    pub recipe_id: i32,
    pub food_id: i32,
}

/// Recipe/food link joined with the names and text of both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
pub(crate) struct RecipeFoodDetail {
    pub id: i32,
    pub recipe_id: i32,
    pub recipe_name: String,
    pub recipe_description: String,
    pub food_id: i32,
    pub food_name: String,
    pub use_amount: f64,
    pub food_unit: String,
    pub recipe_making_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
pub(crate) struct FoodWithExpiration {
    pub id: i32,
    pub food_id: i32,
    pub food_name: String,
    pub food_quantity: f64,
    pub food_unit: String,
    pub expiration_date: NaiveDate,
    pub recipe_id: i32,
    pub recipe_name: String,
    pub use_amount: f64,
}

/// A food whose expiration date falls inside the expiring window.
#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
pub(crate) struct ExpiringFood {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub expiration_date: NaiveDate,
}

/// A recipe that could use up an expiring food, and how much of it.
#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
pub(crate) struct ExpiringRecipeFood {
    pub id: i32,
    pub recipe_name: String,
    pub food_name: String,
    pub use_amount: f64,
}

/// Result of cooking a recipe once against the current stock.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub(crate) struct CookOutcome {
    pub recipe_id: i32,
    pub updated_food_ids: Vec<i32>,
    pub short_food_ids: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cabbage() -> Food {
        Food {
            id: 1,
            name: "cabbage".to_string(),
            quantity: 0.3,
            unit: "head".to_string(),
            expiration_date: NaiveDate::from_ymd_opt(2023, 5, 2).unwrap(),
            food_type: "vegetable".to_string(),
        }
    }

    #[test]
    fn food_serializes_type_column_name() {
        let json = serde_json::to_value(cabbage()).unwrap();
        assert_eq!(json["type"], "vegetable");
        assert_eq!(json["expiration_date"], "2023-05-02");
        assert!(json.get("food_type").is_none());
    }

    #[test]
    fn cached_food_list_survives_bincode() {
        let foods = vec![cabbage()];
        let bytes = Food::list_to_u8(&foods).unwrap();
        assert_eq!(Food::list_from_u8(&bytes).unwrap(), foods);
    }

    #[test]
    fn new_food_rejects_negative_quantity() {
        let food: NewFood = serde_json::from_value(serde_json::json!({
            "name": "pork",
            "quantity": -1,
            "unit": "g",
            "expiration_date": "2023-06-10",
            "type": "meat",
        }))
        .unwrap();
        assert!(food.validate().is_err());
    }

    #[test]
    fn new_food_type_defaults_to_empty() {
        let food: NewFood = serde_json::from_str(
            r#"{"name": "pork", "quantity": 250, "unit": "g", "expiration_date": "2023-06-10"}"#,
        )
        .unwrap();
        assert_eq!(food.food_type, "");
        assert!(food.validate().is_ok());
    }

    #[test]
    fn new_recipe_requires_name() {
        let recipe: NewRecipe = serde_json::from_str(r#"{"name": "  "}"#).unwrap();
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn new_link_rejects_nan_amount() {
        let link = NewRecipeFood {
            recipe_id: 1,
            food_id: 3,
            use_amount: f64::NAN,
        };
        assert!(link.validate().is_err());
    }
}
