//! Per-city rolling history.
//!
//! The [`HistoryStore`] is sharded by city: the outer map lock is held only
//! long enough to find or create a city's slot, and each slot has its own
//! mutex. Distinct cities never contend; readings for one city are
//! serialized by that city's lock. Only the anomaly detector writes to it.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::reading::{Field, Reading};

/// The last `capacity` readings of one city, oldest first.
#[derive(Debug, Clone)]
pub struct CityHistory {
    readings: VecDeque<Reading>,
    capacity: usize,
    latest_timestamp: Option<DateTime<Utc>>,
}

impl CityHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            latest_timestamp: None,
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently appended reading.
    pub fn previous(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// The newest timestamp ever seen for this city, including evicted readings.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest_timestamp
    }

    /// Present values of `field` across the window, oldest first.
    pub fn values(&self, field: Field) -> Vec<f64> {
        self.readings.iter().filter_map(|r| r.value(field)).collect()
    }

    /// Appends `reading`, evicting the oldest entry once the window is full.
    pub(crate) fn push(&mut self, reading: Reading) {
        let ts = reading.timestamp();
        if self.latest_timestamp.is_none_or(|latest| ts > latest) {
            self.latest_timestamp = Some(ts);
        }

        if self.capacity == 0 {
            return;
        }
        while self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }
}

/// City-keyed store of [`CityHistory`] windows.
#[derive(Debug)]
pub struct HistoryStore {
    shards: Mutex<HashMap<String, Arc<Mutex<CityHistory>>>>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            shards: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Returns the slot for `city`, creating an empty history on first use.
    pub fn slot(&self, city: &str) -> Arc<Mutex<CityHistory>> {
        let mut shards = self.shards.lock().unwrap_or_else(PoisonError::into_inner);
        shards
            .entry(city.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CityHistory::new(self.capacity))))
            .clone()
    }

    /// A copy of the current window for `city`, if the city has been seen.
    pub fn snapshot(&self, city: &str) -> Option<CityHistory> {
        let shards = self.shards.lock().unwrap_or_else(PoisonError::into_inner);
        shards.get(city).map(|slot| lock(slot).clone())
    }

    /// Cities with a history, sorted.
    pub fn cities(&self) -> Vec<String> {
        let shards = self.shards.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cities: Vec<String> = shards.keys().cloned().collect();
        cities.sort();
        cities
    }
}

/// Locks a city slot. A poisoned lock still guards a structurally valid window.
pub(crate) fn lock(slot: &Mutex<CityHistory>) -> MutexGuard<'_, CityHistory> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
