use crate::models::{ExpiringFood, ExpiringRecipeFood};
use crate::query;
use crate::DbPool;

use super::{ExpiringWindow, WatchError};

/// Both result sets of one expiration check.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ExpirationSnapshot {
    pub foods: Vec<ExpiringFood>,
    pub recipes: Vec<ExpiringRecipeFood>,
}

pub(crate) trait ExpirationStore: Send {
    /// Runs the expiring-food query and the recipe usage query for `window`.
    fn load(&self, window: ExpiringWindow) -> Result<ExpirationSnapshot, WatchError>;
}

/// Reads from MySQL, holding one pooled connection for the duration of a check.
pub(crate) struct MysqlExpirationStore {
    pool: DbPool,
}

impl MysqlExpirationStore {
    pub(crate) fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ExpirationStore for MysqlExpirationStore {
    fn load(&self, window: ExpiringWindow) -> Result<ExpirationSnapshot, WatchError> {
        let conn = self
            .pool
            .get()
            .map_err(|e| WatchError::StorageConnect(Box::new(e)))?;

        let foods = query::find_expiring_foods(window, &conn).map_err(|source| {
            WatchError::StorageQuery {
                query: "expiring foods",
                source,
            }
        })?;
        let recipes = query::find_recipes_using_expiring_foods(window, &conn).map_err(|source| {
            WatchError::StorageQuery {
                query: "recipes using expiring foods",
                source,
            }
        })?;

        Ok(ExpirationSnapshot { foods, recipes })
    }
}
