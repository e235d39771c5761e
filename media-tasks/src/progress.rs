//! Progress Store - latest status snapshot per task
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use vidforge_types::StatusRecord;

/// Outcome of a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The task already reached a terminal state; the write was dropped
    RejectedTerminal,
}

/// Process-wide map from task identifier to its latest status record.
///
/// Every write replaces the whole record under one lock, so a poller never
/// observes fields from two different updates. Once a terminal record is
/// stored it is never replaced.
#[derive(Debug, Default)]
pub struct ProgressStore {
    records: RwLock<HashMap<String, StatusRecord>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the initial state of a freshly submitted task
    pub fn insert(&self, task_id: &str, record: StatusRecord) {
        self.write().insert(task_id.to_string(), record);
    }

    /// Replace a task's record unless it is already terminal
    pub fn update(&self, task_id: &str, record: StatusRecord) -> UpdateOutcome {
        let mut records = self.write();
        match records.get(task_id) {
            Some(current) if current.is_terminal() => {
                debug!(
                    task_id = task_id,
                    current = %current.status,
                    dropped = %record.status,
                    "Ignoring update to finished task"
                );
                UpdateOutcome::RejectedTerminal
            }
            _ => {
                records.insert(task_id.to_string(), record);
                UpdateOutcome::Applied
            }
        }
    }

    /// Latest record, or the `pending` placeholder for unknown identifiers
    pub fn get(&self, task_id: &str) -> StatusRecord {
        self.read()
            .get(task_id)
            .cloned()
            .unwrap_or_else(StatusRecord::pending)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.read().contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written record, so poisoning is ignored
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StatusRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StatusRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}
