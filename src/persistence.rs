use crate::clock::Clock;
use crate::debounce::Debouncer;
use crate::errors::StorageError;
use crate::models::{ProgressSnapshot, Response};
use crate::storage::KeyValueStore;
use crate::store::ResponseStore;
use chrono::{Datelike, Duration, NaiveDate};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info, warn};

pub const KEY_PREFIX: &str = "checkin_progress_";
const EXPIRY_DAYS: i64 = 7;

/// Answers and cursor recovered from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub responses: BTreeMap<u64, Response>,
    pub cursor: usize,
}

/// Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

pub fn progress_key(config_id: u64, week: NaiveDate) -> String {
    format!("{KEY_PREFIX}{config_id}_{}", date_key(week))
}

/// Key written before progress was scoped by week.
pub fn legacy_key(config_id: u64) -> String {
    format!("{KEY_PREFIX}{config_id}")
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Writes snapshots for a single check-in config. Cheap to clone so debounced
/// jobs can own one.
#[derive(Clone)]
struct SnapshotWriter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config_id: u64,
}

impl SnapshotWriter {
    fn current_week(&self) -> NaiveDate {
        week_start(self.clock.now().date_naive())
    }

    fn write(&self, responses: &ResponseStore, cursor: usize) {
        let week = self.current_week();
        let key = progress_key(self.config_id, week);
        self.clear_other_weeks(week);

        let snapshot = ProgressSnapshot {
            responses: responses.to_records(),
            current_question_index: cursor,
            timestamp: self.clock.now().timestamp_millis(),
            config_id: self.config_id,
            week_start: Some(date_key(week)),
        };
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                error!("failed to encode check-in progress: {err}");
                return;
            }
        };

        match self.store.set(&key, payload.clone()) {
            Ok(()) => debug!(
                key = %key,
                responses = responses.len(),
                cursor,
                "check-in progress saved"
            ),
            Err(StorageError::QuotaExceeded { .. }) => {
                warn!("storage full, removing expired check-in progress");
                self.clear_expired();
                match self.store.set(&key, payload) {
                    Ok(()) => info!(key = %key, "check-in progress saved after cleanup"),
                    Err(err) => error!("failed to save check-in progress after cleanup: {err}"),
                }
            }
            Err(err) => error!("failed to save check-in progress: {err}"),
        }
    }

    /// Drops this config's snapshots for any other week, plus the legacy key.
    fn clear_other_weeks(&self, week: NaiveDate) {
        let prefix = format!("{KEY_PREFIX}{}_", self.config_id);
        let suffix = format!("_{}", date_key(week));
        let legacy = legacy_key(self.config_id);

        for key in self.store.keys() {
            let stale_week = key.starts_with(&prefix) && !key.ends_with(&suffix);
            if stale_week || key == legacy {
                self.store.remove(&key);
                info!(key = %key, "removed old check-in progress");
            }
        }
    }

    /// Drops every snapshot, for any config, older than a week or unreadable.
    fn clear_expired(&self) {
        let cutoff =
            self.clock.now().timestamp_millis() - Duration::days(EXPIRY_DAYS).num_milliseconds();

        for key in self.store.keys() {
            if !key.starts_with(KEY_PREFIX) {
                continue;
            }
            let expired = match self
                .store
                .get(&key)
                .map(|raw| serde_json::from_str::<ProgressSnapshot>(&raw))
            {
                Some(Ok(snapshot)) => snapshot.timestamp != 0 && snapshot.timestamp < cutoff,
                Some(Err(_)) => true,
                None => false,
            };
            if expired {
                self.store.remove(&key);
                info!(key = %key, "removed expired check-in progress");
            }
        }
    }
}

/// Week-scoped local persistence of one config's in-progress answers.
pub struct ProgressPersistence {
    writer: SnapshotWriter,
    debouncer: Debouncer,
}

impl ProgressPersistence {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config_id: u64,
        debounce: std::time::Duration,
    ) -> Self {
        Self {
            writer: SnapshotWriter {
                store,
                clock,
                config_id,
            },
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn config_id(&self) -> u64 {
        self.writer.config_id
    }

    pub fn current_week(&self) -> NaiveDate {
        self.writer.current_week()
    }

    pub fn current_key(&self) -> String {
        progress_key(self.writer.config_id, self.current_week())
    }

    /// Writes immediately, replacing any pending debounced write.
    pub fn save(&self, responses: &ResponseStore, cursor: usize) {
        self.debouncer.cancel();
        self.writer.write(responses, cursor);
    }

    /// Coalesces rapid successive answers into one trailing write.
    pub fn schedule_save(&self, responses: &ResponseStore, cursor: usize) {
        let writer = self.writer.clone();
        let responses = responses.clone();
        self.debouncer.schedule(move || writer.write(&responses, cursor));
    }

    /// Progress for the current week, or `None` to start fresh. Other weeks'
    /// snapshots and unreadable ones are removed.
    pub fn load(&self) -> Option<Progress> {
        let week = self.current_week();
        let key = progress_key(self.writer.config_id, week);
        self.writer.clear_other_weeks(week);
        let raw = self.writer.store.get(&key)?;

        let snapshot = match serde_json::from_str::<ProgressSnapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(key = %key, "discarding unreadable check-in progress: {err}");
                self.writer.store.remove(&key);
                return None;
            }
        };

        if snapshot.week_start.as_deref() != Some(date_key(week).as_str()) {
            info!(
                key = %key,
                saved = ?snapshot.week_start,
                current = %week,
                "discarding check-in progress from another week"
            );
            self.writer.store.remove(&key);
            return None;
        }

        Some(Progress {
            responses: snapshot.responses(),
            cursor: snapshot.current_question_index,
        })
    }

    /// Forgets this week's progress. Only called once the backend accepted
    /// the check-in.
    pub fn clear(&self) {
        self.debouncer.cancel();
        self.writer.store.remove(&self.current_key());
        self.writer.store.remove(&legacy_key(self.writer.config_id));
        info!(config_id = self.writer.config_id, "check-in progress cleared");
    }
}
