//! Background check for food about to expire.
//!
//! The watcher wakes every `tick`, and during the configured hour of the local
//! day it loads the foods expiring in `[today, today + window_days]` together
//! with the recipes that use them, then hands both lists to a notifier. A day
//! is marked as notified only after a successful check, so a failed check is
//! retried on the next tick inside the same hour.

mod notify;
mod schedule;
mod store;

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::query::DbError;

pub(crate) use notify::{ExpirationNotifier, LogNotifier};
pub(crate) use schedule::{Clock, DailySchedule, ExpiringWindow, SystemClock};
pub(crate) use store::{ExpirationSnapshot, ExpirationStore, MysqlExpirationStore};

#[derive(Debug, Error)]
pub(crate) enum WatchError {
    #[error("could not get a storage connection: {0}")]
    StorageConnect(#[source] DbError),

    #[error("query for {query} failed: {source}")]
    StorageQuery {
        query: &'static str,
        #[source]
        source: DbError,
    },

    #[error("clock unavailable: {0}")]
    Clock(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum WatcherState {
    Checking,
    Sleeping,
    Stopped,
}

/// Liveness snapshot of the watcher thread.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct WatcherHealth {
    pub state: WatcherState,
    pub time_zone: String,
    pub notice_hour: u32,
    pub cycles: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub next_trigger: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl WatcherHealth {
    fn new(schedule: &DailySchedule) -> Self {
        Self {
            state: WatcherState::Checking,
            time_zone: schedule.zone().name().to_string(),
            notice_hour: schedule.hour(),
            cycles: 0,
            last_tick: None,
            last_notified_at: None,
            next_trigger: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

/// Shared read side of the watcher's health, handed to the HTTP layer.
#[derive(Debug, Clone)]
pub(crate) struct HealthProbe(Arc<Mutex<WatcherHealth>>);

impl HealthProbe {
    fn new(health: WatcherHealth) -> Self {
        Self(Arc::new(Mutex::new(health)))
    }

    pub(crate) fn snapshot(&self) -> WatcherHealth {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update(&self, f: impl FnOnce(&mut WatcherHealth)) {
        let mut health = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut health);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    OutsideTriggerHour,
    AlreadyNotified(NaiveDate),
    Notified { foods: usize, recipes: usize },
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WatcherConfig {
    pub tick: Duration,
    pub window_days: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            window_days: ExpiringWindow::DEFAULT_DAYS,
        }
    }
}

pub(crate) struct ExpirationWatcher<S, N, C> {
    store: S,
    notifier: N,
    clock: C,
    schedule: DailySchedule,
    config: WatcherConfig,
    last_notified: Option<NaiveDate>,
    health: HealthProbe,
}

impl<S, N, C> ExpirationWatcher<S, N, C>
where
    S: ExpirationStore,
    N: ExpirationNotifier,
    C: Clock,
{
    pub(crate) fn new(
        store: S,
        notifier: N,
        clock: C,
        schedule: DailySchedule,
        config: WatcherConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            schedule,
            config,
            last_notified: None,
            health: HealthProbe::new(WatcherHealth::new(&schedule)),
        }
    }

    pub(crate) fn health(&self) -> HealthProbe {
        self.health.clone()
    }

    /// One wake-up: check the hour, and when due, query and notify.
    pub(crate) fn run_cycle(&mut self) -> CycleOutcome {
        let now = self.clock.now();
        self.health.update(|h| {
            h.state = WatcherState::Checking;
            h.cycles += 1;
            h.last_tick = Some(now);
        });

        let outcome = self.check(now);

        let next_trigger = self.next_trigger(now, outcome);
        self.health.update(|h| {
            h.state = WatcherState::Sleeping;
            h.next_trigger = Some(next_trigger);
        });
        outcome
    }

    //a failed check is retried on the next tick while the notice hour lasts
    fn next_trigger(&self, now: DateTime<Utc>, outcome: CycleOutcome) -> DateTime<Utc> {
        if outcome == CycleOutcome::Failed {
            let retry = chrono::Duration::from_std(self.config.tick)
                .ok()
                .and_then(|tick| now.checked_add_signed(tick));
            if let Some(retry) = retry.filter(|at| self.schedule.is_trigger_hour(*at)) {
                return retry;
            }
        }
        self.schedule.next_after(now)
    }

    fn check(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        if !self.schedule.is_trigger_hour(now) {
            log::debug!(
                "expiration watcher: {} is outside the notice hour",
                self.schedule.local(now)
            );
            return CycleOutcome::OutsideTriggerHour;
        }

        let today = self.schedule.today(now);
        if self.last_notified == Some(today) {
            return CycleOutcome::AlreadyNotified(today);
        }

        let window = ExpiringWindow::starting(today, self.config.window_days);
        match self.store.load(window) {
            Ok(snapshot) => {
                self.notifier.notify(window, &snapshot);
                self.last_notified = Some(today);
                self.health.update(|h| {
                    h.last_notified_at = Some(now);
                    h.consecutive_failures = 0;
                });
                CycleOutcome::Notified {
                    foods: snapshot.foods.len(),
                    recipes: snapshot.recipes.len(),
                }
            }
            Err(e) => {
                log::error!(
                    "expiration check at {} skipped: {}",
                    self.schedule.local(now),
                    e
                );
                let message = e.to_string();
                self.health.update(|h| {
                    h.last_error = Some(message);
                    h.consecutive_failures += 1;
                });
                CycleOutcome::Failed
            }
        }
    }
}

impl<S, N, C> ExpirationWatcher<S, N, C>
where
    S: ExpirationStore + 'static,
    N: ExpirationNotifier + 'static,
    C: Clock + 'static,
{
    /// Runs the watcher on its own thread. The first check happens right away.
    pub(crate) fn spawn(mut self) -> std::io::Result<WatcherHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let health = self.health();
        let tick = self.config.tick;

        let join = thread::Builder::new()
            .name("expiration-watcher".to_string())
            .spawn(move || {
                log::info!(
                    "expiration watcher started, notice hour {}:00 {}",
                    self.schedule.hour(),
                    self.schedule.zone().name()
                );
                loop {
                    if let CycleOutcome::Notified { foods, recipes } = self.run_cycle() {
                        log::debug!(
                            "expiration notice sent with {} foods and {} recipes",
                            foods,
                            recipes
                        );
                    }
                    match shutdown_rx.recv_timeout(tick) {
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                self.health.update(|h| h.state = WatcherState::Stopped);
                log::info!("expiration watcher stopped");
            })?;

        Ok(WatcherHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            health,
        })
    }
}

/// Handle to stop and join the watcher thread.
#[derive(Debug)]
pub(crate) struct WatcherHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    health: HealthProbe,
}

impl WatcherHandle {
    pub(crate) fn health(&self) -> HealthProbe {
        self.health.clone()
    }

    /// Wakes the watcher out of its sleep and waits for the thread to exit.
    pub(crate) fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("expiration watcher thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpiringFood, ExpiringRecipeFood};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone)]
    struct FixedClock(Arc<Mutex<DateTime<Utc>>>);

    impl FixedClock {
        fn at(now: DateTime<Utc>) -> Self {
            Self(Arc::new(Mutex::new(now)))
        }

        fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct FakeStore {
        foods: Vec<ExpiringFood>,
        // expiration date of the linked food, then the link
        links: Vec<(NaiveDate, ExpiringRecipeFood)>,
        loads: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
    }

    impl ExpirationStore for FakeStore {
        fn load(&self, window: ExpiringWindow) -> Result<ExpirationSnapshot, WatchError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(WatchError::StorageQuery {
                    query: "expiring foods",
                    source: "connection reset".into(),
                });
            }
            Ok(ExpirationSnapshot {
                foods: self
                    .foods
                    .iter()
                    .filter(|f| window.contains(f.expiration_date))
                    .cloned()
                    .collect(),
                recipes: self
                    .links
                    .iter()
                    .filter(|(date, _)| window.contains(*date))
                    .map(|(_, link)| link.clone())
                    .collect(),
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier(Arc<Mutex<Vec<(ExpiringWindow, ExpirationSnapshot)>>>);

    impl RecordingNotifier {
        fn notices(&self) -> Vec<(ExpiringWindow, ExpirationSnapshot)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ExpirationNotifier for RecordingNotifier {
        fn notify(&self, window: ExpiringWindow, snapshot: &ExpirationSnapshot) {
            self.0.lock().unwrap().push((window, snapshot.clone()));
        }
    }

    // 2026-10-16 in Tokyo
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn tokyo(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Tokyo
            .with_ymd_and_hms(2026, 10, 16, h, m, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn food(name: &str, days_from_today: i64) -> ExpiringFood {
        ExpiringFood {
            name: name.to_string(),
            quantity: 250.0,
            unit: "g".to_string(),
            expiration_date: today() + chrono::Duration::days(days_from_today),
        }
    }

    fn watcher(
        store: FakeStore,
        notifier: RecordingNotifier,
        clock: FixedClock,
    ) -> ExpirationWatcher<FakeStore, RecordingNotifier, FixedClock> {
        ExpirationWatcher::new(
            store,
            notifier,
            clock,
            DailySchedule::new("Asia/Tokyo", 15).unwrap(),
            WatcherConfig::default(),
        )
    }

    #[test]
    fn does_nothing_outside_notice_hour() {
        let store = FakeStore::default();
        let notifier = RecordingNotifier::default();
        let clock = FixedClock::at(tokyo(14, 59, 59));
        let mut w = watcher(store.clone(), notifier.clone(), clock.clone());

        assert_eq!(w.run_cycle(), CycleOutcome::OutsideTriggerHour);
        clock.set(tokyo(16, 0, 0));
        assert_eq!(w.run_cycle(), CycleOutcome::OutsideTriggerHour);

        assert_eq!(store.loads.load(Ordering::SeqCst), 0);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn notifies_once_per_day_during_notice_hour() {
        let store = FakeStore::default();
        let notifier = RecordingNotifier::default();
        let clock = FixedClock::at(tokyo(15, 0, 0));
        let mut w = watcher(store.clone(), notifier.clone(), clock.clone());

        assert_eq!(
            w.run_cycle(),
            CycleOutcome::Notified {
                foods: 0,
                recipes: 0
            }
        );
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        clock.set(tokyo(15, 1, 0));
        assert_eq!(w.run_cycle(), CycleOutcome::AlreadyNotified(today()));
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.notices().len(), 1);

        // same hour on the following day
        clock.set(tokyo(15, 30, 0) + chrono::Duration::days(1));
        assert!(matches!(w.run_cycle(), CycleOutcome::Notified { .. }));
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.notices().len(), 2);
    }

    #[test]
    fn window_covers_today_through_five_days() {
        let store = FakeStore {
            foods: vec![
                food("yesterday", -1),
                food("today", 0),
                food("fifth day", 5),
                food("sixth day", 6),
            ],
            ..FakeStore::default()
        };
        let notifier = RecordingNotifier::default();
        let mut w = watcher(store, notifier.clone(), FixedClock::at(tokyo(15, 10, 0)));

        w.run_cycle();

        let notices = notifier.notices();
        let (window, snapshot) = &notices[0];
        assert_eq!(window.start(), today());
        assert_eq!(window.end(), today() + chrono::Duration::days(5));
        let names: Vec<&str> = snapshot.foods.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["today", "fifth day"]);
    }

    #[test]
    fn recipe_usages_are_passed_through_verbatim() {
        let curry = ExpiringRecipeFood {
            id: 7,
            recipe_name: "curry".to_string(),
            food_name: "pork".to_string(),
            use_amount: 250.5,
        };
        let stale = ExpiringRecipeFood {
            id: 8,
            recipe_name: "stew".to_string(),
            food_name: "beef".to_string(),
            use_amount: 300.0,
        };
        let store = FakeStore {
            links: vec![
                (today() + chrono::Duration::days(2), curry.clone()),
                (today() + chrono::Duration::days(9), stale),
            ],
            ..FakeStore::default()
        };
        let notifier = RecordingNotifier::default();
        let mut w = watcher(store, notifier.clone(), FixedClock::at(tokyo(15, 0, 0)));

        assert_eq!(
            w.run_cycle(),
            CycleOutcome::Notified {
                foods: 0,
                recipes: 1
            }
        );
        assert_eq!(notifier.notices()[0].1.recipes, vec![curry]);
    }

    #[test]
    fn empty_results_still_notify() {
        let notifier = RecordingNotifier::default();
        let mut w = watcher(
            FakeStore::default(),
            notifier.clone(),
            FixedClock::at(tokyo(15, 0, 0)),
        );

        w.run_cycle();

        let notices = notifier.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].1.foods.is_empty());
        assert!(notices[0].1.recipes.is_empty());
    }

    #[test]
    fn failed_check_is_logged_and_retried() {
        let store = FakeStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let notifier = RecordingNotifier::default();
        let clock = FixedClock::at(tokyo(15, 0, 0));
        let mut w = watcher(store.clone(), notifier.clone(), clock.clone());

        assert_eq!(w.run_cycle(), CycleOutcome::Failed);
        assert!(notifier.notices().is_empty());
        let health = w.health().snapshot();
        assert_eq!(health.consecutive_failures, 1);
        assert_eq!(health.state, WatcherState::Sleeping);
        assert!(health
            .last_error
            .as_deref()
            .unwrap()
            .contains("expiring foods"));

        store.failing.store(false, Ordering::SeqCst);
        clock.set(tokyo(15, 1, 0));
        assert!(matches!(w.run_cycle(), CycleOutcome::Notified { .. }));
        assert_eq!(notifier.notices().len(), 1);
        assert_eq!(w.health().snapshot().consecutive_failures, 0);
    }

    #[test]
    fn failed_check_reports_retry_on_next_tick() {
        let store = FakeStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let clock = FixedClock::at(tokyo(15, 10, 0));
        let mut w = watcher(store.clone(), RecordingNotifier::default(), clock.clone());

        assert_eq!(w.run_cycle(), CycleOutcome::Failed);
        assert_eq!(w.health().snapshot().next_trigger, Some(tokyo(15, 11, 0)));

        // the last tick of the hour has no retry left today
        clock.set(tokyo(15, 59, 30));
        assert_eq!(w.run_cycle(), CycleOutcome::Failed);
        assert_eq!(
            w.health().snapshot().next_trigger,
            Some(tokyo(15, 0, 0) + chrono::Duration::days(1))
        );

        store.failing.store(false, Ordering::SeqCst);
        clock.set(tokyo(15, 59, 45));
        assert!(matches!(w.run_cycle(), CycleOutcome::Notified { .. }));
        assert_eq!(
            w.health().snapshot().next_trigger,
            Some(tokyo(15, 0, 0) + chrono::Duration::days(1))
        );
    }

    #[test]
    fn health_reports_cycles_and_next_trigger() {
        let clock = FixedClock::at(tokyo(9, 0, 0));
        let mut w = watcher(FakeStore::default(), RecordingNotifier::default(), clock);

        w.run_cycle();
        w.run_cycle();

        let health = w.health().snapshot();
        assert_eq!(health.cycles, 2);
        assert_eq!(health.time_zone, "Asia/Tokyo");
        assert_eq!(health.next_trigger, Some(tokyo(15, 0, 0)));
        assert_eq!(health.last_tick, Some(tokyo(9, 0, 0)));
        assert!(health.last_notified_at.is_none());
    }

    #[test]
    fn shutdown_interrupts_the_tick() {
        let store = FakeStore::default();
        let w = ExpirationWatcher::new(
            store.clone(),
            RecordingNotifier::default(),
            FixedClock::at(tokyo(15, 0, 0)),
            DailySchedule::new("Asia/Tokyo", 15).unwrap(),
            WatcherConfig {
                tick: Duration::from_secs(3600),
                window_days: 5,
            },
        );

        let handle = w.spawn().unwrap();
        let probe = handle.health();
        handle.shutdown();

        let health = probe.snapshot();
        assert_eq!(health.state, WatcherState::Stopped);
        assert!(health.cycles >= 1);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }
}
