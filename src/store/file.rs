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

use std::cmp::Reverse;
use std::fs::read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use serde_json::Value;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_with;
use crate::installation::InstallationPaths;
use crate::installation::SESSION_FILE;
use crate::store::ConfigStore;
use crate::store::validate::validate_document;
use crate::text::decode_text;
use crate::types::config::ConfigDocument;
use crate::types::config::ConfigKind;
use crate::types::timestamp::Timestamp;
use crate::types::warning::IngestWarning;

/// Typed access to the files of one installation.
#[derive(Clone)]
pub struct FileBackedStore {
    paths: InstallationPaths,
}

/// A results file, decoded but not yet parsed.
pub struct RawResult {
    pub file_name: String,
    pub modified: Timestamp,
    pub text: String,
}

struct ListedFile {
    path: PathBuf,
    file_name: String,
    modified: SystemTime,
}

/// Lazily reads the results directory, newest file first. A file that
/// cannot be read yields a warning; the rest are still read.
pub struct ResultsReader {
    files: std::vec::IntoIter<ListedFile>,
}

impl Iterator for ResultsReader {
    type Item = Result<RawResult, IngestWarning>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.files.next()?;
        let item = match read(&file.path) {
            Ok(bytes) => Ok(RawResult {
                file_name: file.file_name,
                modified: Timestamp::from_system_time(file.modified),
                text: decode_text(&bytes),
            }),
            Err(e) => Err(IngestWarning::new(file.file_name, e.to_string())),
        };
        Some(item)
    }
}

impl FileBackedStore {
    pub fn new(paths: InstallationPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &InstallationPaths {
        &self.paths
    }

    pub fn read_results_directory(&self) -> Fallible<ResultsReader> {
        self.paths.require_valid()?;
        let files = list_files(&self.paths.results_dir(), &["json"])?
            .into_iter()
            .filter(|f| f.file_name != SESSION_FILE)
            .collect::<Vec<_>>();
        log::debug!("Found {} result files.", files.len());
        Ok(ResultsReader {
            files: files.into_iter(),
        })
    }

    /// The live session file, if the server has written one.
    pub fn read_session_text(&self) -> Fallible<Option<String>> {
        let path = self.paths.session_file();
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = read(&path)?;
        Ok(Some(decode_text(&bytes)))
    }

    /// The last `max_lines` lines across the newest log files, oldest line
    /// first. A missing or empty log directory yields no lines.
    pub fn read_log_tail(&self, max_lines: usize) -> Vec<String> {
        if max_lines == 0 {
            return Vec::new();
        }
        let dir = self.paths.log_dir();
        if !dir.is_dir() {
            return Vec::new();
        }
        let files = match list_files(&dir, &["log", "txt"]) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot list log directory: {e}");
                return Vec::new();
            }
        };
        let mut chunks: Vec<Vec<String>> = Vec::new();
        let mut remaining = max_lines;
        for file in files {
            let bytes = match read(&file.path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Skipping log file {}: {e}", file.file_name);
                    continue;
                }
            };
            let text = decode_text(&bytes);
            let mut lines: Vec<&str> = text.lines().collect();
            while lines.last().is_some_and(|l| l.trim().is_empty()) {
                lines.pop();
            }
            let take = remaining.min(lines.len());
            let chunk = lines[lines.len() - take..]
                .iter()
                .map(|l| l.to_string())
                .collect();
            chunks.push(chunk);
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }
        chunks.into_iter().rev().flatten().collect()
    }
}

impl ConfigStore for FileBackedStore {
    fn read(&self, kind: ConfigKind) -> Fallible<ConfigDocument> {
        self.paths.require_valid()?;
        let path = self.paths.config_file(kind);
        if !path.is_file() {
            return fail_with(
                ErrorKind::ConfigNotFound,
                format!("{} does not exist", path.display()),
            );
        }
        let bytes = read(&path)?;
        let text = decode_text(&bytes);
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ErrorReport::with_kind(
                ErrorKind::ConfigParseError,
                format!("{}: {e}", kind.file_name()),
            )
        })?;
        Ok(ConfigDocument { kind, body })
    }

    fn write(&self, document: &ConfigDocument) -> Fallible<()> {
        let violations = validate_document(document.kind, &document.body);
        if !violations.is_empty() {
            log::info!(
                "Rejected {}: {}",
                document.kind.file_name(),
                violations.join("; ")
            );
            return Err(ErrorReport::validation(violations));
        }
        self.paths.require_valid()?;
        let path = self.paths.config_file(document.kind);
        write_atomic(&path, &document.body)?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Write JSON next to its destination, then rename it into place, so readers
/// see either the old file or the new one.
fn write_atomic(path: &Path, body: &Value) -> Fallible<()> {
    let dir = path
        .parent()
        .ok_or_else(|| ErrorReport::new("configuration path has no parent"))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    let json = serde_json::to_string_pretty(body)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// The regular files directly inside `dir` with one of `extensions`, newest
/// first. Files modified at the same instant are ordered by name, descending.
fn list_files(dir: &Path, extensions: &[&str]) -> Fallible<Vec<ListedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        if !matches {
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(ListedFile {
            path: path.to_path_buf(),
            file_name: entry.file_name().to_string_lossy().into_owned(),
            modified,
        });
    }
    files.sort_by_key(|f| Reverse((f.modified, f.file_name.clone())));
    Ok(files)
}
