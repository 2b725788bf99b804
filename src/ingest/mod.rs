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

pub mod cache;
pub mod parse;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::ingest::cache::Snapshot;
use crate::ingest::cache::SnapshotCache;
use crate::ingest::parse::parse_entry_list;
use crate::ingest::parse::parse_result;
use crate::ingest::parse::parse_session;
use crate::installation::SESSION_FILE;
use crate::store::ConfigStore;
use crate::store::file::FileBackedStore;
use crate::types::config::ConfigKind;
use crate::types::timestamp::Timestamp;
use crate::types::warning::IngestWarning;

/// Turns the files the server produces into a cached [`Snapshot`].
pub struct Ingestor {
    store: Option<FileBackedStore>,
    cache: SnapshotCache,
    /// Held for the duration of a pass. Readers that find the cache stale
    /// queue here and reuse the pass that finished while they waited.
    pass: Mutex<()>,
}

impl Ingestor {
    pub fn new(store: Option<FileBackedStore>) -> Self {
        Self {
            store,
            cache: SnapshotCache::new(),
            pass: Mutex::new(()),
        }
    }

    /// Run a pass on the blocking pool and publish it.
    pub async fn refresh(&self) -> Fallible<Arc<Snapshot>> {
        let _pass = self.pass.lock().await;
        self.run_pass().await
    }

    /// The cached snapshot, refreshed first if it was never built or has
    /// been invalidated since. Waits for a pass already in flight instead of
    /// returning the snapshot it is about to replace.
    pub async fn snapshot(&self) -> Fallible<Arc<Snapshot>> {
        let _pass = self.pass.lock().await;
        if self.cache.is_stale() {
            return self.run_pass().await;
        }
        Ok(self.cache.load())
    }

    async fn run_pass(&self) -> Fallible<Arc<Snapshot>> {
        let generation = self.cache.begin();
        let store = self.store.clone();
        let snapshot =
            tokio::task::spawn_blocking(move || ingest(store.as_ref(), generation)).await?;
        Ok(self.cache.publish(snapshot))
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}

/// One ingestion pass. Never fails: every problem becomes a warning.
pub fn ingest(store: Option<&FileBackedStore>, generation: u64) -> Snapshot {
    let mut snapshot = Snapshot::empty(generation);
    let store = match store {
        Some(store) => store,
        None => {
            snapshot.warnings.push(IngestWarning::new(
                "installation",
                "no installation root is configured",
            ));
            return snapshot;
        }
    };
    let start = Instant::now();

    match store.read_results_directory() {
        Ok(reader) => {
            for item in reader {
                let parsed = item.and_then(|raw| {
                    parse_result(&raw).map_err(|e| IngestWarning::new(&raw.file_name, e))
                });
                match parsed {
                    Ok(record) => snapshot.results.push(record),
                    Err(warning) => {
                        log::warn!("Skipping result file {warning}");
                        snapshot.warnings.push(warning);
                    }
                }
            }
        }
        Err(e) => {
            log::warn!("Cannot read results directory: {}", e.message());
            snapshot
                .warnings
                .push(IngestWarning::new("results", e.message()));
        }
    }

    match store.read_session_text() {
        Ok(None) => {}
        Ok(Some(text)) => match parse_session(&text) {
            Ok(session) => snapshot.session = Some(session),
            Err(e) => {
                log::warn!("Cannot parse {SESSION_FILE}: {}", e.message());
                snapshot
                    .warnings
                    .push(IngestWarning::new(SESSION_FILE, e.message()));
            }
        },
        Err(e) => snapshot
            .warnings
            .push(IngestWarning::new(SESSION_FILE, e.message())),
    }

    let entrylist = ConfigKind::Entrylist.file_name();
    match store.read(ConfigKind::Entrylist) {
        Ok(document) => match parse_entry_list(&document.body) {
            Ok(entries) => snapshot.entries = entries,
            Err(e) => snapshot
                .warnings
                .push(IngestWarning::new(&entrylist, e.message())),
        },
        Err(e) if e.kind() == ErrorKind::ConfigNotFound => {}
        Err(e) => snapshot
            .warnings
            .push(IngestWarning::new(&entrylist, e.message())),
    }

    snapshot.refreshed_at = Timestamp::now();
    let duration = start.elapsed().as_millis();
    log::info!(
        "Ingested {} results, {} entries, {} warnings in {duration}ms.",
        snapshot.results.len(),
        snapshot.entries.len(),
        snapshot.warnings.len()
    );
    snapshot
}
