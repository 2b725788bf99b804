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

use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Fallible;
use crate::installation::InstallationPaths;

/// Names the installation root directory.
pub const ROOT_ENV: &str = "ACC_SERVER_PATH";

/// Overrides the name of the server executable.
pub const EXECUTABLE_ENV: &str = "ACC_SERVER_EXE";

pub const DEFAULT_SETTINGS_FILE: &str = "acc-manager.toml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerSettings {
    pub root: Option<PathBuf>,
    pub executable: String,
    pub bind: String,
    pub startup_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub startup_grace_ms: u64,
    pub settle_delay_ms: u64,
    pub championship_size: usize,
    pub log_tail_default: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            root: None,
            executable: "accServer.exe".to_string(),
            bind: "127.0.0.1:8080".to_string(),
            startup_timeout_secs: 10,
            stop_timeout_secs: 10,
            startup_grace_ms: 500,
            settle_delay_ms: 2000,
            championship_size: 10,
            log_tail_default: 100,
        }
    }
}

impl ManagerSettings {
    /// Load settings from a TOML file. An explicitly named file must exist;
    /// the default file is optional.
    pub fn load(path: Option<&Path>) -> Fallible<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };
        if !path.exists() {
            if required {
                return crate::error::fail(format!(
                    "settings file {} does not exist.",
                    path.display()
                ));
            }
            log::debug!("No settings file, using defaults.");
            return Ok(Self::default());
        }
        log::debug!("Loading settings from {}", path.display());
        let content = read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Fallible<Self> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Apply the environment on top of the file.
    pub fn with_env(mut self) -> Self {
        if let Some(root) = std::env::var_os(ROOT_ENV) {
            if !root.is_empty() {
                self.root = Some(PathBuf::from(root));
            }
        }
        if let Ok(exe) = std::env::var(EXECUTABLE_ENV) {
            if !exe.is_empty() {
                self.executable = exe;
            }
        }
        self
    }

    pub fn installation(&self) -> Option<InstallationPaths> {
        self.root
            .as_ref()
            .map(|root| InstallationPaths::new(root, &self.executable))
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
