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

use serde::Serialize;

use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

/// The supervisor's view of the server process.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    pub state: RunState,
    /// Present only while running or stopping.
    pub process_id: Option<u32>,
    pub start_time: Option<Timestamp>,
    pub last_heartbeat: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl ProcessState {
    pub fn stopped() -> Self {
        Self {
            state: RunState::Stopped,
            process_id: None,
            start_time: None,
            last_heartbeat: None,
            last_error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RunState::Starting | RunState::Running)
    }

    /// Seconds since the process started; zero unless it is running.
    pub fn uptime_seconds(&self, now: Timestamp) -> u64 {
        match (self.state, self.start_time) {
            (RunState::Running, Some(start)) => start.seconds_until(now),
            _ => 0,
        }
    }
}

/// What `status()` and the control operations report.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    #[serde(flatten)]
    pub process: ProcessState,
    pub uptime_seconds: u64,
    /// Set by an idempotent stop that found nothing to stop.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_stopped: bool,
}

impl ProcessStatus {
    pub fn of(process: ProcessState) -> Self {
        let uptime_seconds = process.uptime_seconds(Timestamp::now());
        Self {
            process,
            uptime_seconds,
            already_stopped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_has_no_uptime() {
        let state = ProcessState::stopped();
        assert_eq!(state.uptime_seconds(Timestamp::now()), 0);
        assert!(!state.is_active());
    }

    #[test]
    fn test_running_uptime() {
        let start = Timestamp::now();
        let later = Timestamp::new(start.into_inner() + chrono::Duration::seconds(90));
        let state = ProcessState {
            state: RunState::Running,
            process_id: Some(42),
            start_time: Some(start),
            last_heartbeat: Some(start),
            last_error: None,
        };
        assert_eq!(state.uptime_seconds(later), 90);
    }

    #[test]
    fn test_status_shape() {
        let json = serde_json::to_value(ProcessStatus::of(ProcessState::stopped())).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["uptimeSeconds"], 0);
        assert!(json["processId"].is_null());
        assert!(json.get("alreadyStopped").is_none());
    }
}
