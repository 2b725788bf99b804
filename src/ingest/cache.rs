// Copyright 2025 Fernando Borretti
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

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

use crate::types::driver::DriverEntry;
use crate::types::race::RaceResultRecord;
use crate::types::session::SessionRecord;
use crate::types::timestamp::Timestamp;
use crate::types::warning::IngestWarning;

/// Everything one ingestion pass produced. Immutable once published.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generation: u64,
    pub refreshed_at: Timestamp,
    /// Newest first.
    pub results: Vec<RaceResultRecord>,
    pub session: Option<SessionRecord>,
    pub entries: Vec<DriverEntry>,
    pub warnings: Vec<IngestWarning>,
}

impl Snapshot {
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            refreshed_at: Timestamp::now(),
            results: Vec::new(),
            session: None,
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Holds the latest published snapshot. Readers clone the `Arc` and keep a
/// consistent view for as long as they hold it; publishing replaces the
/// `Arc` in one step, so a reader never sees parts of two passes.
pub struct SnapshotCache {
    slot: RwLock<Arc<Snapshot>>,
    next_generation: AtomicU64,
    stale: AtomicBool,
}

impl SnapshotCache {
    /// An empty cache that is stale, so the first read triggers a pass.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Arc::new(Snapshot::empty(0))),
            next_generation: AtomicU64::new(1),
            stale: AtomicBool::new(true),
        }
    }

    pub fn load(&self) -> Arc<Snapshot> {
        match self.slot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Reserve a generation number for a pass that is about to start, and
    /// clear the stale flag. An invalidation that lands while the pass runs
    /// sets the flag again.
    pub fn begin(&self) -> u64 {
        self.stale.store(false, Ordering::SeqCst);
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish a finished pass unless a pass that started later already
    /// published. Returns the snapshot that is current afterwards.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if snapshot.generation > guard.generation {
            *guard = Arc::new(snapshot);
        } else {
            log::debug!(
                "Discarding ingestion pass {} in favour of {}",
                snapshot.generation,
                guard.generation
            );
        }
        Arc::clone(&guard)
    }

    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// True if the cache was invalidated since the last pass began, or if no
    /// pass has ever been published.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst) || self.load().generation == 0
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
