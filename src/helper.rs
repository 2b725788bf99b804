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

use std::fs::create_dir_all;
use std::fs::write;
use std::path::Path;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tempfile::tempdir;

use crate::error::Fallible;

/// Create a complete, empty installation in a temporary directory. The
/// executable is a shell script that sleeps, standing in for the server.
pub fn create_tmp_installation() -> Fallible<TempDir> {
    let dir = tempdir()?;
    for sub in ["cfg", "log", "results"] {
        create_dir_all(dir.path().join(sub))?;
    }
    write_executable(dir.path(), "exec sleep 30")?;
    Ok(dir)
}

/// Replace the stand-in executable with a shell script running `body`.
pub fn write_executable(root: &Path, body: &str) -> Fallible<()> {
    let exe = root.join("accServer.exe");
    write(&exe, format!("#!/bin/sh\n{body}\n"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

/// Encode a string the way the server writes its files.
pub fn utf16le(s: &str) -> Vec<u8> {
    let mut out = vec![0xFF, 0xFE];
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// One finisher in a fixture results file.
pub struct Finisher {
    pub player_id: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub car_id: i64,
    pub car_group: &'static str,
    pub best_lap: i64,
    pub total_time: i64,
    pub lap_count: i64,
}

impl Finisher {
    pub fn new(player_id: &'static str, car_id: i64, best_lap: i64) -> Self {
        Self {
            player_id,
            first_name: "Test",
            last_name: player_id,
            car_id,
            car_group: "GT3",
            best_lap,
            total_time: best_lap * 20,
            lap_count: 20,
        }
    }

    pub fn group(mut self, car_group: &'static str) -> Self {
        self.car_group = car_group;
        self
    }
}

/// Build a results document in the server's format. Finishers are listed in
/// finishing order.
pub fn result_json(track: &str, session_type: &str, finishers: &[Finisher]) -> Value {
    let lines: Vec<Value> = finishers
        .iter()
        .map(|f| {
            let driver = json!({
                "firstName": f.first_name,
                "lastName": f.last_name,
                "shortName": "TST",
                "playerId": f.player_id
            });
            json!({
                "car": {
                    "carId": f.car_id,
                    "raceNumber": f.car_id,
                    "carModel": 30,
                    "cupCategory": 0,
                    "carGroup": f.car_group,
                    "teamName": "",
                    "nationality": 0,
                    "drivers": [driver.clone()]
                },
                "currentDriver": driver,
                "currentDriverIndex": 0,
                "timing": {
                    "lastLap": f.best_lap,
                    "bestLap": f.best_lap,
                    "totalTime": f.total_time,
                    "lapCount": f.lap_count,
                    "bestSplits": [],
                    "lastSplits": []
                },
                "missingMandatoryPitstop": 0
            })
        })
        .collect();
    json!({
        "sessionType": session_type,
        "trackName": track,
        "sessionIndex": 2,
        "raceWeekendIndex": 0,
        "metaData": track,
        "serverName": "Test Server",
        "sessionResult": {
            "bestlap": finishers.iter().map(|f| f.best_lap).min().unwrap_or(0),
            "isWetSession": 0,
            "type": 0,
            "leaderBoardLines": lines
        },
        "laps": [],
        "penalties": [],
        "post_race_penalties": []
    })
}

pub fn write_result(dir: &Path, file_name: &str, body: &Value) -> Fallible<()> {
    write(
        dir.join("results").join(file_name),
        serde_json::to_string_pretty(body)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tmp_installation() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        assert!(dir.path().join("cfg").is_dir());
        assert!(dir.path().join("accServer.exe").is_file());
        Ok(())
    }

    #[test]
    fn test_result_json_orders_lines() {
        let body = result_json(
            "monza",
            "R",
            &[Finisher::new("S1", 1, 100_000), Finisher::new("S2", 2, 101_000)],
        );
        let lines = body["sessionResult"]["leaderBoardLines"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["currentDriver"]["playerId"], "S2");
    }
}
