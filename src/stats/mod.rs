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

//! Standings derived from the full results history. Every function here is
//! pure: the same entries and results always give the same output.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use clap::ValueEnum;
use serde::Deserialize;
use serde::Serialize;

use crate::types::driver::DriverEntry;
use crate::types::driver::DriverId;
use crate::types::driver::RaceDriver;
use crate::types::race::Penalty;
use crate::types::race::RaceResultRecord;
use crate::types::race::SessionType;
use crate::types::timestamp::Timestamp;

pub const BASELINE_RATING: f64 = 1000.0;
pub const WIN_WEIGHT: f64 = 500.0;
pub const PODIUM_WEIGHT: f64 = 250.0;
pub const POINTS_WEIGHT: f64 = 10.0;
pub const FORM_WINDOW: usize = 5;
pub const TOP_DRIVERS: usize = 3;
pub const DEFAULT_CHAMPIONSHIP_SIZE: usize = 10;

/// Points for a 1-based finishing rank: 24 for a win, two fewer per place,
/// nothing from 13th down.
pub fn points_for_rank(rank: usize) -> u32 {
    26usize.saturating_sub(rank.saturating_mul(2)) as u32
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Rating,
    Wins,
    Points,
    #[value(alias = "totalRaces")]
    TotalRaces,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Clone, Debug)]
pub struct LeaderboardQuery {
    pub sort_by: SortKey,
    pub category: Option<String>,
    pub championship_size: usize,
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            sort_by: SortKey::Rating,
            category: None,
            championship_size: DEFAULT_CHAMPIONSHIP_SIZE,
        }
    }
}

/// A driver's derived statistics. Built per request, never stored.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub driver_id: DriverId,
    pub display_name: String,
    pub short_name: String,
    pub nationality: Option<i64>,
    /// Whether the driver is in the entry list.
    pub registered: bool,
    pub car_model: Option<i64>,
    pub categories: BTreeSet<String>,
    pub total_races: u32,
    pub wins: u32,
    pub podiums: u32,
    pub points: u32,
    pub best_lap: Option<u32>,
    /// Finishing ranks, oldest first, at most [`FORM_WINDOW`] of them.
    pub recent_form: Vec<u32>,
    pub average_position: f64,
    pub rating: f64,
    pub trend: Trend,
    /// Races in which no penalty was recorded against the driver's car.
    pub clean_races: u32,
    pub total_laps: u64,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionshipRow {
    pub position: usize,
    pub driver_id: DriverId,
    pub display_name: String,
    pub points: u32,
    pub wins: u32,
    pub podiums: u32,
    pub total_races: u32,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FastestLap {
    pub driver_id: DriverId,
    pub display_name: String,
    pub lap_time: u32,
    pub track: String,
    pub file_name: String,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_drivers: usize,
    pub total_races: usize,
    pub total_laps: u64,
    pub average_rating: f64,
    pub fastest_lap: Option<FastestLap>,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub leaderboard: Vec<DriverStats>,
    pub championship: Vec<ChampionshipRow>,
    pub top_drivers: Vec<DriverStats>,
    pub stats: Summary,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceHistoryEntry {
    pub file_name: String,
    pub track: String,
    pub date: Timestamp,
    pub session_type: SessionType,
    pub position: usize,
    pub points: u32,
    pub best_lap: Option<u32>,
    pub total_time: Option<u64>,
    pub lap_count: u32,
    pub car_model: i64,
    pub car_group: String,
    pub penalties: Vec<Penalty>,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDetail {
    pub stats: DriverStats,
    /// Newest first.
    pub history: Vec<RaceHistoryEntry>,
}

struct Accumulator {
    driver: RaceDriver,
    registered: bool,
    car_model: Option<i64>,
    categories: BTreeSet<String>,
    total_races: u32,
    wins: u32,
    podiums: u32,
    points: u32,
    best_lap: Option<u32>,
    form: VecDeque<u32>,
    clean_races: u32,
    total_laps: u64,
}

impl Accumulator {
    fn new(driver: RaceDriver, registered: bool, car_model: Option<i64>) -> Self {
        Self {
            driver,
            registered,
            car_model,
            categories: BTreeSet::new(),
            total_races: 0,
            wins: 0,
            podiums: 0,
            points: 0,
            best_lap: None,
            form: VecDeque::with_capacity(FORM_WINDOW),
            clean_races: 0,
            total_laps: 0,
        }
    }

    fn record(&mut self, rank: usize, lap: Option<u32>, laps: u32, clean: bool) {
        self.total_races += 1;
        self.points += points_for_rank(rank);
        if rank == 1 {
            self.wins += 1;
        }
        if rank <= 3 {
            self.podiums += 1;
        }
        if let Some(lap) = lap {
            if self.best_lap.is_none_or(|best| lap < best) {
                self.best_lap = Some(lap);
            }
        }
        if self.form.len() == FORM_WINDOW {
            self.form.pop_front();
        }
        self.form.push_back(rank as u32);
        if clean {
            self.clean_races += 1;
        }
        self.total_laps = self.total_laps.saturating_add(u64::from(laps));
    }

    fn finish(self) -> DriverStats {
        let races = f64::from(self.total_races);
        let rating = if self.total_races == 0 {
            BASELINE_RATING
        } else {
            let win_rate = f64::from(self.wins) / races;
            let podium_rate = f64::from(self.podiums) / races;
            let avg_points = f64::from(self.points) / races;
            round2(
                BASELINE_RATING
                    + win_rate * WIN_WEIGHT
                    + podium_rate * PODIUM_WEIGHT
                    + avg_points * POINTS_WEIGHT,
            )
        };
        let recent_form: Vec<u32> = self.form.into_iter().collect();
        let average_position = if recent_form.is_empty() {
            0.0
        } else {
            let sum: u32 = recent_form.iter().sum();
            round2(f64::from(sum) / recent_form.len() as f64)
        };
        let trend = match recent_form.as_slice() {
            [.., previous, last] if last < previous => Trend::Up,
            [.., previous, last] if last > previous => Trend::Down,
            _ => Trend::Stable,
        };
        DriverStats {
            display_name: self.driver.display_name(),
            driver_id: self.driver.id,
            short_name: self.driver.short_name,
            nationality: self.driver.nationality,
            registered: self.registered,
            car_model: self.car_model,
            categories: self.categories,
            total_races: self.total_races,
            wins: self.wins,
            podiums: self.podiums,
            points: self.points,
            best_lap: self.best_lap,
            recent_form,
            average_position,
            rating,
            trend,
            clean_races: self.clean_races,
            total_laps: self.total_laps,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Results in the order they happened: by date, then file name.
fn chronological(results: &[RaceResultRecord]) -> Vec<&RaceResultRecord> {
    let mut ordered: Vec<&RaceResultRecord> = results.iter().collect();
    ordered.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    ordered
}

/// Compute every driver's statistics, keyed by identity.
pub fn driver_stats(
    entries: &[DriverEntry],
    results: &[RaceResultRecord],
) -> BTreeMap<DriverId, DriverStats> {
    let mut acc: BTreeMap<DriverId, Accumulator> = BTreeMap::new();
    for entry in entries {
        acc.entry(entry.driver.id.clone()).or_insert_with(|| {
            Accumulator::new(entry.driver.clone(), true, entry.car_model)
        });
    }
    for result in chronological(results) {
        for (index, line) in result.lines.iter().enumerate() {
            let row = acc
                .entry(line.driver.id.clone())
                .or_insert_with(|| Accumulator::new(line.driver.clone(), false, None));
            if !row.registered {
                // Keep the name from the latest appearance.
                row.driver = line.driver.clone();
            }
            row.car_model = Some(line.car_model);
            if !line.car_group.is_empty() {
                row.categories.insert(line.car_group.to_ascii_uppercase());
            }
            let clean = result.penalties_for(line.car_id).next().is_none();
            row.record(index + 1, line.best_lap, line.lap_count, clean);
        }
    }
    acc.into_iter().map(|(id, a)| (id, a.finish())).collect()
}

fn compare(sort_by: SortKey, a: &DriverStats, b: &DriverStats) -> Ordering {
    let primary = match sort_by {
        SortKey::Rating => b.rating.total_cmp(&a.rating),
        SortKey::Wins => b.wins.cmp(&a.wins),
        SortKey::Points => b.points.cmp(&a.points),
        SortKey::TotalRaces => b.total_races.cmp(&a.total_races),
    };
    primary.then_with(|| a.driver_id.cmp(&b.driver_id))
}

/// Build the leaderboard bundle.
pub fn compute(
    entries: &[DriverEntry],
    results: &[RaceResultRecord],
    query: &LeaderboardQuery,
) -> Leaderboard {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase);
    let mut rows: Vec<DriverStats> = driver_stats(entries, results)
        .into_values()
        .filter(|row| match &category {
            Some(category) => row.categories.contains(category),
            None => true,
        })
        .collect();

    let mut by_points: Vec<&DriverStats> = rows.iter().collect();
    by_points.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.wins.cmp(&a.wins))
            .then_with(|| a.driver_id.cmp(&b.driver_id))
    });
    let championship: Vec<ChampionshipRow> = by_points
        .into_iter()
        .take(query.championship_size)
        .enumerate()
        .map(|(i, row)| ChampionshipRow {
            position: i + 1,
            driver_id: row.driver_id.clone(),
            display_name: row.display_name.clone(),
            points: row.points,
            wins: row.wins,
            podiums: row.podiums,
            total_races: row.total_races,
        })
        .collect();

    rows.sort_by(|a, b| compare(query.sort_by, a, b));
    let top_drivers: Vec<DriverStats> = rows.iter().take(TOP_DRIVERS).cloned().collect();

    let average_rating = if rows.is_empty() {
        0.0
    } else {
        round2(rows.iter().map(|r| r.rating).sum::<f64>() / rows.len() as f64)
    };
    let stats = Summary {
        total_drivers: rows.len(),
        total_races: results.len(),
        total_laps: rows
            .iter()
            .fold(0, |sum: u64, r| sum.saturating_add(r.total_laps)),
        average_rating,
        fastest_lap: fastest_lap(results, category.as_deref()),
    };
    Leaderboard {
        leaderboard: rows,
        championship,
        top_drivers,
        stats,
    }
}

fn fastest_lap(results: &[RaceResultRecord], category: Option<&str>) -> Option<FastestLap> {
    let mut best: Option<FastestLap> = None;
    for result in chronological(results) {
        for line in &result.lines {
            if let Some(category) = category {
                if !line.car_group.eq_ignore_ascii_case(category) {
                    continue;
                }
            }
            let Some(lap) = line.best_lap else {
                continue;
            };
            if best.as_ref().is_none_or(|b| lap < b.lap_time) {
                best = Some(FastestLap {
                    driver_id: line.driver.id.clone(),
                    display_name: line.driver.display_name(),
                    lap_time: lap,
                    track: result.track.clone(),
                    file_name: result.file_name.clone(),
                });
            }
        }
    }
    best
}

/// Statistics and race-by-race history for one driver.
pub fn driver_detail(
    entries: &[DriverEntry],
    results: &[RaceResultRecord],
    id: &DriverId,
) -> Option<DriverDetail> {
    let stats = driver_stats(entries, results).remove(id)?;
    let mut history: Vec<RaceHistoryEntry> = Vec::new();
    for result in chronological(results).into_iter().rev() {
        for (index, line) in result.lines.iter().enumerate() {
            if &line.driver.id != id {
                continue;
            }
            history.push(RaceHistoryEntry {
                file_name: result.file_name.clone(),
                track: result.track.clone(),
                date: result.date,
                session_type: result.session_type,
                position: index + 1,
                points: points_for_rank(index + 1),
                best_lap: line.best_lap,
                total_time: line.total_time,
                lap_count: line.lap_count,
                car_model: line.car_model,
                car_group: line.car_group.clone(),
                penalties: result.penalties_for(line.car_id).cloned().collect(),
            });
        }
    }
    Some(DriverDetail { stats, history })
}
