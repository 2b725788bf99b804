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

use std::collections::HashSet;

use serde_json::Value;

use crate::types::config::AssistRules;
use crate::types::config::ConfigKind;
use crate::types::config::EntryDriver;
use crate::types::config::EntryList;
use crate::types::config::EventConfig;
use crate::types::config::EventRules;
use crate::types::config::Field;
use crate::types::config::NetworkConfig;
use crate::types::config::Schema;
use crate::types::config::ServerSettings;
use crate::types::config::SessionSlot;

pub const PORT_MIN: i64 = 1024;
pub const PORT_MAX: i64 = 65535;
pub const CAR_SLOTS_MIN: i64 = 1;
pub const CAR_SLOTS_MAX: i64 = 82;

const CAR_GROUPS: [&str; 6] = ["FreeForAll", "GT3", "GT4", "GT2", "GTC", "TCX"];
const SESSION_TYPES: [&str; 3] = ["P", "Q", "R"];

/// Check a document body against the rules for its kind. Returns every
/// violated rule; an empty list means the document may be written.
pub fn validate_document(kind: ConfigKind, body: &Value) -> Vec<String> {
    let schema = match Schema::parse(kind, body) {
        Ok(schema) => schema,
        Err(message) => return vec![message],
    };
    let mut v = Violations::default();
    match &schema {
        Schema::Configuration(doc) => validate_configuration(doc, &mut v),
        Schema::Settings(doc) => validate_settings(doc, &mut v),
        Schema::Event(doc) => validate_event(doc, &mut v),
        Schema::EventRules(doc) => validate_event_rules(doc, &mut v),
        Schema::AssistRules(doc) => validate_assist_rules(doc, &mut v),
        Schema::Entrylist(doc) => validate_entrylist(doc, &mut v),
    }
    v.into_inner()
}

#[derive(Default)]
struct Violations {
    rules: Vec<String>,
}

impl Violations {
    fn push(&mut self, rule: impl Into<String>) {
        self.rules.push(rule.into());
    }

    fn required<T>(&mut self, field: &str, value: &Field<T>) {
        if value.is_missing() {
            self.push(format!("{field} is required"));
        }
    }

    /// The field's value if it has the expected type. A value of any other
    /// JSON type is recorded as a violation.
    fn typed<'a, T>(&mut self, field: &str, value: &'a Field<T>, expected: &str) -> Option<&'a T> {
        if let Field::Mistyped(found) = value {
            self.push(format!("{field} must be {expected}, got {found}"));
        }
        value.value()
    }

    fn integer(&mut self, field: &str, value: &Field<i64>) -> Option<i64> {
        self.typed(field, value, "an integer").copied()
    }

    fn text<'a>(&mut self, field: &str, value: &'a Field<String>) -> Option<&'a str> {
        self.typed(field, value, "a string").map(String::as_str)
    }

    fn boolean(&mut self, field: &str, value: &Field<bool>) -> Option<bool> {
        self.typed(field, value, "true or false").copied()
    }

    fn non_empty(&mut self, field: &str, value: &Field<String>) {
        self.required(field, value);
        if let Some(text) = self.text(field, value) {
            if text.trim().is_empty() {
                self.push(format!("{field} must not be empty"));
            }
        }
    }

    fn range(&mut self, field: &str, value: &Field<i64>, min: i64, max: i64) {
        if let Some(value) = self.integer(field, value) {
            if value < min || value > max {
                self.push(format!(
                    "{field} must be between {min} and {max}, got {value}"
                ));
            }
        }
    }

    fn range_f64(&mut self, field: &str, value: &Field<f64>, min: f64, max: f64) {
        if let Some(value) = self.typed(field, value, "a number").copied() {
            if !(min..=max).contains(&value) {
                self.push(format!(
                    "{field} must be between {min} and {max}, got {value}"
                ));
            }
        }
    }

    fn flag(&mut self, field: &str, value: &Field<i64>) {
        if let Some(value) = self.integer(field, value) {
            if value != 0 && value != 1 {
                self.push(format!("{field} must be 0 or 1, got {value}"));
            }
        }
    }

    fn into_inner(self) -> Vec<String> {
        self.rules
    }
}

fn validate_configuration(doc: &NetworkConfig, v: &mut Violations) {
    v.required("tcpPort", &doc.tcp_port);
    v.required("udpPort", &doc.udp_port);
    v.range("tcpPort", &doc.tcp_port, PORT_MIN, PORT_MAX);
    v.range("udpPort", &doc.udp_port, PORT_MIN, PORT_MAX);
    if let (Some(tcp), Some(udp)) = (doc.tcp_port.get(), doc.udp_port.get()) {
        if tcp == udp {
            v.push(format!("tcpPort and udpPort must differ, both are {tcp}"));
        }
    }
    v.range(
        "maxConnections",
        &doc.max_connections,
        CAR_SLOTS_MIN,
        CAR_SLOTS_MAX,
    );
    v.flag("lanDiscovery", &doc.lan_discovery);
    v.flag("registerToLobby", &doc.register_to_lobby);
    v.integer("configVersion", &doc.config_version);
}

fn validate_settings(doc: &ServerSettings, v: &mut Violations) {
    v.non_empty("serverName", &doc.server_name);
    v.text("adminPassword", &doc.admin_password);
    v.text("password", &doc.password);
    v.text("spectatorPassword", &doc.spectator_password);
    v.required("maxCarSlots", &doc.max_car_slots);
    v.range("maxCarSlots", &doc.max_car_slots, CAR_SLOTS_MIN, CAR_SLOTS_MAX);
    v.range(
        "safetyRatingRequirement",
        &doc.safety_rating_requirement,
        -1,
        99,
    );
    v.range(
        "racecraftRatingRequirement",
        &doc.racecraft_rating_requirement,
        -1,
        99,
    );
    v.range("trackMedalsRequirement", &doc.track_medals_requirement, 0, 3);
    if let Some(group) = v.text("carGroup", &doc.car_group) {
        if !CAR_GROUPS.contains(&group) {
            v.push(format!(
                "carGroup must be one of {}, got {group}",
                CAR_GROUPS.join("/")
            ));
        }
    }
    v.flag("isRaceLocked", &doc.is_race_locked);
    v.flag("dumpLeaderboards", &doc.dump_leaderboards);
    v.integer("formationLapType", &doc.formation_lap_type);
}

fn validate_event(doc: &EventConfig, v: &mut Violations) {
    v.non_empty("track", &doc.track);
    v.required("sessions", &doc.sessions);
    if let Some(sessions) = v.typed("sessions", &doc.sessions, "a list of session objects") {
        if sessions.is_empty() {
            v.push("at least one session is required");
        }
        for (i, session) in sessions.iter().enumerate() {
            validate_session(i, session, v);
        }
    }
    v.range("ambientTemp", &doc.ambient_temp, 0, 50);
    v.range_f64("cloudLevel", &doc.cloud_level, 0.0, 1.0);
    v.range_f64("rain", &doc.rain, 0.0, 1.0);
    v.range("weatherRandomness", &doc.weather_randomness, 0, 7);
    v.range(
        "preRaceWaitingTimeSeconds",
        &doc.pre_race_waiting_time_seconds,
        0,
        i64::MAX,
    );
    v.range(
        "sessionOverTimeSeconds",
        &doc.session_over_time_seconds,
        0,
        i64::MAX,
    );
}

fn validate_session(i: usize, session: &SessionSlot, v: &mut Violations) {
    let field = |name: &str| format!("sessions[{i}].{name}");
    v.required(&field("sessionType"), &session.session_type);
    if let Some(t) = v.text(&field("sessionType"), &session.session_type) {
        if !SESSION_TYPES.contains(&t) {
            v.push(format!(
                "{} must be one of P/Q/R, got {t}",
                field("sessionType")
            ));
        }
    }
    v.required(
        &field("sessionDurationMinutes"),
        &session.session_duration_minutes,
    );
    v.range(
        &field("sessionDurationMinutes"),
        &session.session_duration_minutes,
        1,
        i64::MAX,
    );
    v.range(&field("hourOfDay"), &session.hour_of_day, 0, 23);
    v.range(&field("dayOfWeekend"), &session.day_of_weekend, 1, 3);
    v.range(&field("timeMultiplier"), &session.time_multiplier, 0, 24);
}

fn validate_event_rules(doc: &EventRules, v: &mut Violations) {
    v.range("qualifyStandingType", &doc.qualify_standing_type, 1, 2);
    v.range("pitWindowLengthSec", &doc.pit_window_length_sec, -1, i64::MAX);
    v.range("driverStintTimeSec", &doc.driver_stint_time_sec, -1, i64::MAX);
    v.range("mandatoryPitstopCount", &doc.mandatory_pitstop_count, 0, 5);
    v.range("maxDriversCount", &doc.max_drivers_count, 1, 5);
    v.range("tyreSetCount", &doc.tyre_set_count, 1, 50);
    v.range(
        "maxTotalDrivingTime",
        &doc.max_total_driving_time,
        -1,
        i64::MAX,
    );
    for (field, value) in doc.switches() {
        v.boolean(field, value);
    }
    if let Some(stint) = doc.driver_stint_time_sec.get() {
        if stint > 0 {
            match doc.max_total_driving_time.get() {
                Some(-1) | None => {}
                Some(total) if total < stint => v.push(format!(
                    "maxTotalDrivingTime ({total}) must be at least driverStintTimeSec ({stint}) or -1"
                )),
                Some(_) => {}
            }
        }
    }
    if doc.is_mandatory_pitstop_refuelling_required.get() == Some(true)
        && doc.is_refuelling_allowed_in_race.get() == Some(false)
    {
        v.push("a mandatory refuelling pit stop requires isRefuellingAllowedInRace");
    }
}

fn validate_assist_rules(doc: &AssistRules, v: &mut Violations) {
    v.range(
        "stabilityControlLevelMax",
        &doc.stability_control_level_max,
        0,
        100,
    );
    for (field, value) in doc.flags() {
        v.flag(field, value);
    }
}

fn validate_entrylist(doc: &EntryList, v: &mut Violations) {
    v.flag("forceEntryList", &doc.force_entry_list);
    let entries = match v.typed("entries", &doc.entries, "a list of entry objects") {
        Some(entries) => entries,
        None => return,
    };
    let mut seen: HashSet<i64> = HashSet::new();
    for (i, entry) in entries.iter().enumerate() {
        match v.typed(
            &format!("entries[{i}].drivers"),
            &entry.drivers,
            "a list of driver objects",
        ) {
            Some(drivers) if !drivers.is_empty() => {
                for (j, driver) in drivers.iter().enumerate() {
                    validate_entry_driver(i, j, driver, v);
                }
            }
            Some(_) => v.push(format!("entries[{i}] must have at least one driver")),
            None if entry.drivers.is_missing() => {
                v.push(format!("entries[{i}] must have at least one driver"))
            }
            None => {}
        }
        v.range(&format!("entries[{i}].raceNumber"), &entry.race_number, 1, 998);
        if let Some(number) = entry.race_number.get() {
            if !seen.insert(number) {
                v.push(format!("raceNumber {number} is used by more than one entry"));
            }
        }
        v.range(
            &format!("entries[{i}].forcedCarModel"),
            &entry.forced_car_model,
            -1,
            i64::MAX,
        );
        v.flag(
            &format!("entries[{i}].overrideDriverInfo"),
            &entry.override_driver_info,
        );
        v.flag(&format!("entries[{i}].isServerAdmin"), &entry.is_server_admin);
    }
}

fn validate_entry_driver(i: usize, j: usize, driver: &EntryDriver, v: &mut Violations) {
    let field = |name: &str| format!("entries[{i}].drivers[{j}].{name}");
    v.text(&field("firstName"), &driver.first_name);
    v.text(&field("lastName"), &driver.last_name);
    v.text(&field("shortName"), &driver.short_name);
    v.text(&field("playerID"), &driver.player_id);
    v.integer(&field("driverCategory"), &driver.driver_category);
    v.integer(&field("nationality"), &driver.nationality);
}
