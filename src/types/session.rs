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
use crate::types::race::SessionType;

/// The session the server is currently running. Replaced wholesale on every
/// ingestion pass.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_type: SessionType,
    pub track: String,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub weather: Weather,
    /// Ordered by position.
    pub drivers: Vec<LiveDriver>,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub ambient_temp: Option<f64>,
    pub track_temp: Option<f64>,
    pub rain_level: Option<f64>,
    pub cloud_level: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDriver {
    pub driver: RaceDriver,
    pub race_number: i64,
    pub car_model: i64,
    pub position: u32,
    pub lap_count: u32,
    pub current_lap: Option<u32>,
    pub last_lap: Option<u32>,
    pub best_lap: Option<u32>,
    pub sectors: Vec<u32>,
}
