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

use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use serde::Serialize;

/// The stable error kinds reported to API callers.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InstallationInvalid,
    InstallationPathMissing,
    AlreadyRunning,
    NotRunning,
    ProcessControlFailed,
    ProcessControlTimeout,
    ConfigNotFound,
    UnknownConfigType,
    ConfigParseError,
    ConfigValidationError,
    DriverNotFound,
    InvalidRequest,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InstallationInvalid => "installationInvalid",
            ErrorKind::InstallationPathMissing => "installationPathMissing",
            ErrorKind::AlreadyRunning => "alreadyRunning",
            ErrorKind::NotRunning => "notRunning",
            ErrorKind::ProcessControlFailed => "processControlFailed",
            ErrorKind::ProcessControlTimeout => "processControlTimeout",
            ErrorKind::ConfigNotFound => "configNotFound",
            ErrorKind::UnknownConfigType => "unknownConfigType",
            ErrorKind::ConfigParseError => "configParseError",
            ErrorKind::ConfigValidationError => "configValidationError",
            ErrorKind::DriverNotFound => "driverNotFound",
            ErrorKind::InvalidRequest => "invalidRequest",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub struct ErrorReport {
    kind: ErrorKind,
    message: String,
    /// Every rule a rejected document violated. Empty for other kinds.
    violations: Vec<String>,
}

pub type Fallible<T> = Result<T, ErrorReport>;

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Internal, message)
    }

    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            violations: Vec::new(),
        }
    }

    pub fn validation(violations: Vec<String>) -> Self {
        Self {
            kind: ErrorKind::ConfigValidationError,
            message: format!("{} validation rule(s) violated", violations.len()),
            violations,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "error: {}", self.message)
    }
}

impl Error for ErrorReport {}

pub fn fail<T>(message: impl Into<String>) -> Fallible<T> {
    Err(ErrorReport::new(message))
}

pub fn fail_with<T>(kind: ErrorKind, message: impl Into<String>) -> Fallible<T> {
    Err(ErrorReport::with_kind(kind, message))
}

impl From<std::io::Error> for ErrorReport {
    fn from(value: std::io::Error) -> Self {
        ErrorReport::with_kind(ErrorKind::Io, value.to_string())
    }
}

impl From<serde_json::Error> for ErrorReport {
    fn from(value: serde_json::Error) -> Self {
        ErrorReport::new(format!("JSON error: {value}"))
    }
}

impl From<toml::de::Error> for ErrorReport {
    fn from(value: toml::de::Error) -> Self {
        ErrorReport::new(format!("invalid settings file: {value}"))
    }
}

impl From<walkdir::Error> for ErrorReport {
    fn from(value: walkdir::Error) -> Self {
        ErrorReport::with_kind(ErrorKind::Io, value.to_string())
    }
}

impl From<tempfile::PersistError> for ErrorReport {
    fn from(value: tempfile::PersistError) -> Self {
        ErrorReport::with_kind(ErrorKind::Io, value.error.to_string())
    }
}

impl From<tokio::task::JoinError> for ErrorReport {
    fn from(value: tokio::task::JoinError) -> Self {
        ErrorReport::new(format!("background task failed: {value}"))
    }
}

#[cfg(test)]
impl From<reqwest::Error> for ErrorReport {
    fn from(value: reqwest::Error) -> Self {
        ErrorReport::new(format!("HTTP error: {value}"))
    }
}
