use super::{ExpirationSnapshot, ExpiringWindow};

/// Receives the result of every triggered check, including empty ones.
pub(crate) trait ExpirationNotifier: Send {
    fn notify(&self, window: ExpiringWindow, snapshot: &ExpirationSnapshot);
}

/// Writes the notice to the application log.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LogNotifier;

impl ExpirationNotifier for LogNotifier {
    fn notify(&self, window: ExpiringWindow, snapshot: &ExpirationSnapshot) {
        log::info!(
            "{} foods expire between {} and {}, {} recipes can use them",
            snapshot.foods.len(),
            window.start(),
            window.end(),
            snapshot.recipes.len()
        );
        match serde_json::to_string(&snapshot.foods) {
            Ok(foods) => log::info!("expiring foods: {}", foods),
            Err(e) => log::warn!("could not encode expiring foods: {}", e),
        }
        match serde_json::to_string(&snapshot.recipes) {
            Ok(recipes) => log::info!("recipes with expiring foods: {}", recipes),
            Err(e) => log::warn!("could not encode recipe usages: {}", e),
        }
    }
}
