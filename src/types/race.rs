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

use crate::types::driver::RaceDriver;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum SessionType {
    Practice,
    Qualifying,
    Race,
    Unknown,
}

impl SessionType {
    /// Accepts the server's codes (`P`, `FP`, `Q`, `Q1`, `R`, ...) as well as
    /// the full names, ignoring case.
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() {
            return SessionType::Unknown;
        }
        if s == "practice" || s.starts_with('p') || s.starts_with("fp") {
            SessionType::Practice
        } else if s.starts_with('q') {
            SessionType::Qualifying
        } else if s.starts_with('r') {
            SessionType::Race
        } else {
            SessionType::Unknown
        }
    }
}

/// One results file. The file name identifies it.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceResultRecord {
    pub file_name: String,
    pub track: String,
    pub date: Timestamp,
    pub session_type: SessionType,
    pub server_name: String,
    pub session_index: i64,
    pub race_weekend_index: i64,
    pub is_wet: bool,
    /// Finishing order.
    pub lines: Vec<ResultLine>,
    pub penalties: Vec<Penalty>,
}

/// One car's row in a results file.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultLine {
    pub driver: RaceDriver,
    pub car_id: i64,
    pub race_number: i64,
    pub car_model: i64,
    pub car_group: String,
    pub team_name: String,
    /// Milliseconds; `None` when no valid lap was set.
    pub best_lap: Option<u32>,
    pub total_time: Option<u64>,
    pub lap_count: u32,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    pub car_id: i64,
    pub reason: String,
    pub penalty: String,
    pub penalty_value: i64,
    pub violation_in_lap: i64,
    /// Applied after the session ended rather than during it.
    pub post_race: bool,
}

impl RaceResultRecord {
    pub fn penalties_for(&self, car_id: i64) -> impl Iterator<Item = &Penalty> {
        self.penalties.iter().filter(move |p| p.car_id == car_id)
    }

    pub fn best_lap(&self) -> Option<u32> {
        self.lines.iter().filter_map(|l| l.best_lap).min()
    }
}
