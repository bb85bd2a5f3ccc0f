use std::ops::DerefMut;
use std::time::Duration;

use diesel::r2d2;
use r2d2_redis::redis::{Commands, RedisError};
use r2d2_redis::RedisConnectionManager;

use crate::models::Food;

pub(crate) type RedisPool = r2d2::Pool<RedisConnectionManager>;

const CACHE_POOL_MAX_OPEN: u32 = 16;
const CACHE_POOL_MIN_IDLE: u32 = 8;
const CACHE_POOL_EXPIRE_SECONDS: u64 = 60;

const GET_ALL_FOOD_KEY: &str = "foods:all";
//bounds how long a refill that raced a write can serve the old list
const CACHE_TTL_SECONDS: usize = 300;

/// Redis copy of the full food list. Every food write drops it.
///
/// Cache trouble never fails a request: reads fall through to MySQL and
/// failed writes are only logged.
#[derive(Clone)]
pub(crate) struct FoodCache {
    pool: Option<RedisPool>,
}

impl FoodCache {
    pub(crate) fn disabled() -> Self {
        Self { pool: None }
    }

    pub(crate) fn connect(url: &str) -> Result<Self, RedisError> {
        let manager = RedisConnectionManager::new(url)?;
        let pool = r2d2::Pool::builder()
            .max_size(CACHE_POOL_MAX_OPEN)
            .max_lifetime(Some(Duration::from_secs(CACHE_POOL_EXPIRE_SECONDS)))
            .min_idle(Some(CACHE_POOL_MIN_IDLE))
            .build_unchecked(manager);
        Ok(Self { pool: Some(pool) })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub(crate) fn get_all(&self) -> Option<Vec<Food>> {
        let pool = self.pool.as_ref()?;
        let mut redis_conn = pool
            .get()
            .map_err(|e| log::warn!("redis pool unavailable: {}", e))
            .ok()?;
        let redis_conn = redis_conn.deref_mut();
        let cached: Option<Vec<u8>> = redis_conn
            .get(GET_ALL_FOOD_KEY)
            .map_err(|e| log::warn!("redis get failed: {}", e))
            .ok()?;
        let bytes = cached.filter(|b| !b.is_empty())?;
        match Food::list_from_u8(&bytes) {
            Ok(foods) => Some(foods),
            Err(e) => {
                log::warn!("dropping unreadable food cache: {}", e);
                self.invalidate();
                None
            }
        }
    }

    pub(crate) fn put_all(&self, foods: &[Food]) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };
        let Some((value, ttl)) = cache_entry(foods) else {
            return;
        };
        match pool.get() {
            Ok(mut redis_conn) => {
                let result: Result<(), RedisError> =
                    redis_conn.deref_mut().set_ex(GET_ALL_FOOD_KEY, value, ttl);
                if let Err(e) = result {
                    log::warn!("redis set failed: {}", e);
                }
            }
            Err(e) => log::warn!("redis pool unavailable: {}", e),
        }
    }

    pub(crate) fn invalidate(&self) {
        let Some(pool) = self.pool.as_ref() else {
            return;
        };
        match pool.get() {
            Ok(mut redis_conn) => {
                let result: Result<(), RedisError> =
                    redis_conn.deref_mut().del(GET_ALL_FOOD_KEY);
                if let Err(e) = result {
                    log::warn!("redis del failed: {}", e);
                }
            }
            Err(e) => log::warn!("redis pool unavailable: {}", e),
        }
    }
}

/// Encoded food list and the expiry to store it with.
fn cache_entry(foods: &[Food]) -> Option<(Vec<u8>, usize)> {
    match Food::list_to_u8(foods) {
        Ok(value) => Some((value, CACHE_TTL_SECONDS)),
        Err(e) => {
            log::warn!("could not encode food list for cache: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn cached_list_always_expires() {
        let foods = vec![Food {
            id: 3,
            name: "tofu".to_string(),
            quantity: 2.0,
            unit: "block".to_string(),
            expiration_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            food_type: "soy".to_string(),
        }];
        let (value, ttl) = cache_entry(&foods).unwrap();
        assert_eq!(ttl, CACHE_TTL_SECONDS);
        assert!(ttl > 0 && ttl <= 600);
        assert_eq!(Food::list_from_u8(&value).unwrap(), foods);
    }

    #[test]
    fn disabled_cache_is_a_no_op() {
        let cache = FoodCache::disabled();
        assert!(!cache.is_enabled());
        assert!(cache.get_all().is_none());
        cache.put_all(&[]);
        cache.invalidate();
    }
}
