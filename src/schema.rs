table! {
    foods (id) {
        id -> Integer,
        name -> Varchar,
        quantity -> Double,
        unit -> Varchar,
        expiration_date -> Date,
        #[sql_name = "type"]
        food_type -> Varchar,
    }
}

table! {
    recipes (id) {
        id -> Integer,
        name -> Varchar,
        description -> Text,
        making_method -> Text,
    }
}

table! {
    recipe_food (id) {
        id -> Integer,
        recipe_id -> Integer,
        food_id -> Integer,
        use_amount -> Double,
    }
}

joinable!(recipe_food -> foods (food_id));
joinable!(recipe_food -> recipes (recipe_id));

allow_tables_to_appear_in_same_query!(foods, recipes, recipe_food);
