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

//! Parsers from the server's file formats into canonical records.

use serde::Deserialize;

use crate::error::Fallible;
use crate::store::file::RawResult;
use crate::types::driver::DriverEntry;
use crate::types::driver::DriverId;
use crate::types::driver::RaceDriver;
use crate::types::race::Penalty;
use crate::types::race::RaceResultRecord;
use crate::types::race::ResultLine;
use crate::types::race::SessionType;
use crate::types::session::LiveDriver;
use crate::types::session::SessionRecord;
use crate::types::session::Weather;
use crate::types::timestamp::Timestamp;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawDriver {
    first_name: String,
    last_name: String,
    short_name: String,
    #[serde(alias = "playerID")]
    player_id: Option<String>,
    #[serde(alias = "guid")]
    driver_guid: Option<String>,
    nationality: Option<i64>,
}

impl RawDriver {
    fn into_driver(self) -> RaceDriver {
        let id = DriverId::resolve(
            self.player_id.as_deref(),
            self.driver_guid.as_deref(),
            &self.first_name,
            &self.last_name,
        );
        RaceDriver {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            short_name: self.short_name,
            nationality: self.nationality,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResultFile {
    #[serde(default)]
    session_type: String,
    #[serde(default)]
    track_name: String,
    #[serde(default)]
    server_name: String,
    #[serde(default)]
    session_index: i64,
    #[serde(default)]
    race_weekend_index: i64,
    session_result: RawSessionResult,
    #[serde(default)]
    penalties: Vec<RawPenalty>,
    #[serde(default, rename = "post_race_penalties")]
    post_race_penalties: Vec<RawPenalty>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSessionResult {
    is_wet_session: i64,
    leader_board_lines: Vec<RawLine>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawLine {
    car: RawCar,
    current_driver: Option<RawDriver>,
    current_driver_index: usize,
    timing: RawTiming,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawCar {
    car_id: i64,
    race_number: i64,
    car_model: i64,
    car_group: String,
    team_name: String,
    drivers: Vec<RawDriver>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawTiming {
    best_lap: i64,
    total_time: i64,
    lap_count: i64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawPenalty {
    car_id: i64,
    reason: String,
    penalty: String,
    penalty_value: i64,
    violation_in_lap: i64,
}

/// The server writes `i32::MAX` (and sometimes zero) for "no lap".
fn lap_time(ms: i64) -> Option<u32> {
    if ms <= 0 || ms >= i64::from(i32::MAX) {
        None
    } else {
        u32::try_from(ms).ok()
    }
}

fn total_time(ms: i64) -> Option<u64> {
    if ms <= 0 || ms >= i64::from(i32::MAX) {
        None
    } else {
        u64::try_from(ms).ok()
    }
}

pub fn parse_result(raw: &RawResult) -> Result<RaceResultRecord, String> {
    let file: RawResultFile = serde_json::from_str(&raw.text).map_err(|e| e.to_string())?;
    let date = Timestamp::from_result_file_name(&raw.file_name).unwrap_or(raw.modified);
    let lines = file
        .session_result
        .leader_board_lines
        .into_iter()
        .map(parse_line)
        .collect();
    let penalties = file
        .penalties
        .into_iter()
        .map(|p| (p, false))
        .chain(file.post_race_penalties.into_iter().map(|p| (p, true)))
        .map(|(p, post_race)| Penalty {
            car_id: p.car_id,
            reason: p.reason,
            penalty: p.penalty,
            penalty_value: p.penalty_value,
            violation_in_lap: p.violation_in_lap,
            post_race,
        })
        .collect();
    Ok(RaceResultRecord {
        file_name: raw.file_name.clone(),
        track: file.track_name,
        date,
        session_type: SessionType::parse(&file.session_type),
        server_name: file.server_name,
        session_index: file.session_index,
        race_weekend_index: file.race_weekend_index,
        is_wet: file.session_result.is_wet_session != 0,
        lines,
        penalties,
    })
}

fn parse_line(line: RawLine) -> ResultLine {
    let RawLine {
        mut car,
        current_driver,
        current_driver_index,
        timing,
    } = line;
    let raw_driver = match current_driver {
        Some(driver) => driver,
        None if current_driver_index < car.drivers.len() => {
            car.drivers.swap_remove(current_driver_index)
        }
        None => RawDriver {
            last_name: format!("Car #{}", car.race_number),
            ..RawDriver::default()
        },
    };
    ResultLine {
        driver: raw_driver.into_driver(),
        car_id: car.car_id,
        race_number: car.race_number,
        car_model: car.car_model,
        car_group: car.car_group,
        team_name: car.team_name,
        best_lap: lap_time(timing.best_lap),
        total_time: total_time(timing.total_time),
        lap_count: u32::try_from(timing.lap_count).unwrap_or(0),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    #[serde(default)]
    session_type: String,
    #[serde(default)]
    track: String,
    #[serde(default)]
    elapsed_ms: u64,
    #[serde(default)]
    remaining_ms: u64,
    ambient_temp: Option<f64>,
    track_temp: Option<f64>,
    rain_level: Option<f64>,
    cloud_level: Option<f64>,
    #[serde(default)]
    drivers: Vec<RawLiveDriver>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLiveDriver {
    #[serde(flatten)]
    driver: RawDriver,
    #[serde(default)]
    race_number: i64,
    #[serde(default)]
    car_model: i64,
    #[serde(default)]
    position: u32,
    #[serde(default)]
    lap_count: u32,
    #[serde(default)]
    current_lap: i64,
    #[serde(default)]
    last_lap: i64,
    #[serde(default)]
    best_lap: i64,
    #[serde(default)]
    sectors: Vec<i64>,
}

pub fn parse_session(text: &str) -> Fallible<SessionRecord> {
    let raw: RawSession = serde_json::from_str(text)?;
    let mut drivers: Vec<LiveDriver> = raw
        .drivers
        .into_iter()
        .map(|d| LiveDriver {
            driver: d.driver.into_driver(),
            race_number: d.race_number,
            car_model: d.car_model,
            position: d.position,
            lap_count: d.lap_count,
            current_lap: lap_time(d.current_lap),
            last_lap: lap_time(d.last_lap),
            best_lap: lap_time(d.best_lap),
            sectors: d.sectors.into_iter().filter_map(lap_time).collect(),
        })
        .collect();
    drivers.sort_by_key(|d| (d.position == 0, d.position));
    Ok(SessionRecord {
        session_type: SessionType::parse(&raw.session_type),
        track: raw.track,
        elapsed_ms: raw.elapsed_ms,
        remaining_ms: raw.remaining_ms,
        weather: Weather {
            ambient_temp: raw.ambient_temp,
            track_temp: raw.track_temp,
            rain_level: raw.rain_level,
            cloud_level: raw.cloud_level,
        },
        drivers,
    })
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEntryList {
    entries: Vec<RawEntry>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEntry {
    drivers: Vec<RawDriver>,
    race_number: Option<i64>,
    forced_car_model: Option<i64>,
}

/// Every driver of every entry, in file order.
pub fn parse_entry_list(body: &serde_json::Value) -> Fallible<Vec<DriverEntry>> {
    let list = RawEntryList::deserialize(body)?;
    let mut out = Vec::new();
    for entry in list.entries {
        let car_model = entry.forced_car_model.filter(|m| *m >= 0);
        for driver in entry.drivers {
            out.push(DriverEntry {
                driver: driver.into_driver(),
                race_number: entry.race_number,
                car_model,
            });
        }
    }
    Ok(out)
}
