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

use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::error::fail_with;
use crate::types::config::ConfigKind;

/// Name of the file, at the installation root, holding the live session.
pub const SESSION_FILE: &str = "session.json";

/// The layout of a server installation on disk.
#[derive(Clone, Debug)]
pub struct InstallationPaths {
    root: PathBuf,
    executable_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationReport {
    pub valid: bool,
    pub root: Option<String>,
    pub reason: Option<String>,
    pub missing: Vec<String>,
}

impl InstallationPaths {
    pub fn new(root: impl Into<PathBuf>, executable_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            executable_name: executable_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn executable_name(&self) -> &str {
        &self.executable_name
    }

    pub fn cfg_dir(&self) -> PathBuf {
        self.root.join("cfg")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn executable(&self) -> PathBuf {
        self.root.join(&self.executable_name)
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    pub fn config_file(&self, kind: ConfigKind) -> PathBuf {
        self.cfg_dir().join(kind.file_name())
    }

    /// Check that the root and the four required paths exist. Never fails:
    /// problems are described in the report.
    pub fn validate(&self) -> InstallationReport {
        let root = Some(self.root.display().to_string());
        if !self.root.is_dir() {
            return InstallationReport {
                valid: false,
                root,
                reason: Some(format!(
                    "installation root {} is not a directory",
                    self.root.display()
                )),
                missing: vec![self.root.display().to_string()],
            };
        }
        let mut missing = Vec::new();
        for dir in [self.cfg_dir(), self.log_dir(), self.results_dir()] {
            if !dir.is_dir() {
                missing.push(dir.display().to_string());
            }
        }
        let exe = self.executable();
        if !exe.is_file() {
            missing.push(exe.display().to_string());
        }
        let reason = if missing.is_empty() {
            None
        } else {
            Some(format!("missing required paths: {}", missing.join(", ")))
        };
        InstallationReport {
            valid: missing.is_empty(),
            root,
            reason,
            missing,
        }
    }

    /// Like [`InstallationPaths::validate`], but as an error for operations
    /// that cannot proceed on an incomplete installation.
    pub fn require_valid(&self) -> Fallible<()> {
        let report = self.validate();
        match report.reason {
            None => Ok(()),
            Some(reason) => fail_with(ErrorKind::InstallationInvalid, reason),
        }
    }
}

impl InstallationReport {
    /// The report for a manager that was never told where the server lives.
    pub fn unconfigured() -> Self {
        Self {
            valid: false,
            root: None,
            reason: Some(format!(
                "the {} environment variable is not set",
                crate::settings::ROOT_ENV
            )),
            missing: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::create_dir_all;
    use std::fs::remove_dir;

    use super::*;
    use crate::error::Fallible;
    use crate::helper::create_tmp_installation;

    #[test]
    fn test_complete_installation_is_valid() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let paths = InstallationPaths::new(dir.path(), "accServer.exe");
        let report = paths.validate();
        assert!(report.valid);
        assert!(report.reason.is_none());
        assert!(paths.require_valid().is_ok());
        Ok(())
    }

    #[test]
    fn test_missing_results_directory() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        remove_dir(dir.path().join("results"))?;
        let paths = InstallationPaths::new(dir.path(), "accServer.exe");
        let report = paths.validate();
        assert!(!report.valid);
        assert_eq!(report.missing.len(), 1);
        assert!(report.reason.unwrap().contains("results"));
        let err = paths.require_valid().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InstallationInvalid);
        Ok(())
    }

    #[test]
    fn test_missing_executable() -> Fallible<()> {
        let dir = tempfile::tempdir()?;
        for sub in ["cfg", "log", "results"] {
            create_dir_all(dir.path().join(sub))?;
        }
        let paths = InstallationPaths::new(dir.path(), "accServer.exe");
        let report = paths.validate();
        assert!(!report.valid);
        assert!(report.missing[0].ends_with("accServer.exe"));
        Ok(())
    }

    #[test]
    fn test_non_existent_root() {
        let paths = InstallationPaths::new("./derpherp", "accServer.exe");
        let report = paths.validate();
        assert!(!report.valid);
        assert!(report.reason.unwrap().contains("not a directory"));
    }

    #[test]
    fn test_unconfigured_report_names_the_variable() {
        let report = InstallationReport::unconfigured();
        assert!(!report.valid);
        assert!(report.reason.unwrap().contains("ACC_SERVER_PATH"));
    }
}
