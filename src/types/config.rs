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

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ErrorKind;
use crate::error::ErrorReport;

/// The six configuration files of an installation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ConfigKind {
    Configuration,
    Settings,
    Event,
    EventRules,
    AssistRules,
    Entrylist,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 6] = [
        ConfigKind::Configuration,
        ConfigKind::Settings,
        ConfigKind::Event,
        ConfigKind::EventRules,
        ConfigKind::AssistRules,
        ConfigKind::Entrylist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::Configuration => "configuration",
            ConfigKind::Settings => "settings",
            ConfigKind::Event => "event",
            ConfigKind::EventRules => "eventRules",
            ConfigKind::AssistRules => "assistRules",
            ConfigKind::Entrylist => "entrylist",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl Display for ConfigKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConfigKind {
    type Err = ErrorReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                ErrorReport::with_kind(
                    ErrorKind::UnknownConfigType,
                    format!("unknown configuration type: {s}"),
                )
            })
    }
}

impl Serialize for ConfigKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A configuration document as stored on disk. The body is kept verbatim so
/// fields this crate does not know about survive a read-write cycle.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub kind: ConfigKind,
    pub body: Value,
}

/// The typed view of a document, one variant per kind. Every field is a
/// [`Field`], so a missing or mistyped field is reported by validation
/// alongside every other violated rule instead of aborting deserialization.
#[derive(Debug)]
pub enum Schema {
    Configuration(NetworkConfig),
    Settings(ServerSettings),
    Event(EventConfig),
    EventRules(EventRules),
    AssistRules(AssistRules),
    Entrylist(EntryList),
}

impl Schema {
    /// Interpret a JSON body as the schema for `kind`. Only a body that is
    /// not an object is rejected here.
    pub fn parse(kind: ConfigKind, body: &Value) -> Result<Schema, String> {
        fn typed<T: DeserializeOwned>(body: &Value) -> Result<T, String> {
            T::deserialize(body).map_err(|e| e.to_string())
        }
        if !body.is_object() {
            return Err(format!("{kind} must be a JSON object"));
        }
        let schema = match kind {
            ConfigKind::Configuration => Schema::Configuration(typed(body)?),
            ConfigKind::Settings => Schema::Settings(typed(body)?),
            ConfigKind::Event => Schema::Event(typed(body)?),
            ConfigKind::EventRules => Schema::EventRules(typed(body)?),
            ConfigKind::AssistRules => Schema::AssistRules(typed(body)?),
            ConfigKind::Entrylist => Schema::Entrylist(typed(body)?),
        };
        Ok(schema)
    }
}

/// One field of a document: absent (or `null`), of the expected type, or
/// present with a value of some other JSON type.
#[derive(Clone, PartialEq, Debug)]
pub enum Field<T> {
    Missing,
    Valid(T),
    Mistyped(Value),
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Valid(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }
}

impl<T: Copy> Field<T> {
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Field::Missing);
        }
        match T::deserialize(&value) {
            Ok(typed) => Ok(Field::Valid(typed)),
            Err(_) => Ok(Field::Mistyped(value)),
        }
    }
}

/// `configuration.json`: network identity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    pub udp_port: Field<i64>,
    pub tcp_port: Field<i64>,
    pub max_connections: Field<i64>,
    pub lan_discovery: Field<i64>,
    pub register_to_lobby: Field<i64>,
    pub config_version: Field<i64>,
}

/// `settings.json`: server identity and access requirements.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub server_name: Field<String>,
    pub admin_password: Field<String>,
    pub password: Field<String>,
    pub spectator_password: Field<String>,
    pub car_group: Field<String>,
    pub track_medals_requirement: Field<i64>,
    pub safety_rating_requirement: Field<i64>,
    pub racecraft_rating_requirement: Field<i64>,
    pub max_car_slots: Field<i64>,
    pub is_race_locked: Field<i64>,
    pub dump_leaderboards: Field<i64>,
    pub formation_lap_type: Field<i64>,
}

/// `event.json`: track, weather and the ordered session list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventConfig {
    pub track: Field<String>,
    pub pre_race_waiting_time_seconds: Field<i64>,
    pub session_over_time_seconds: Field<i64>,
    pub ambient_temp: Field<i64>,
    pub cloud_level: Field<f64>,
    pub rain: Field<f64>,
    pub weather_randomness: Field<i64>,
    pub sessions: Field<Vec<SessionSlot>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSlot {
    pub hour_of_day: Field<i64>,
    pub day_of_weekend: Field<i64>,
    pub time_multiplier: Field<i64>,
    pub session_type: Field<String>,
    pub session_duration_minutes: Field<i64>,
}

/// `eventRules.json`: pit stop, stint and refuelling rules.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventRules {
    pub qualify_standing_type: Field<i64>,
    pub pit_window_length_sec: Field<i64>,
    pub driver_stint_time_sec: Field<i64>,
    pub mandatory_pitstop_count: Field<i64>,
    pub max_total_driving_time: Field<i64>,
    pub max_drivers_count: Field<i64>,
    pub is_refuelling_allowed_in_race: Field<bool>,
    pub is_refuelling_time_fixed: Field<bool>,
    pub is_mandatory_pitstop_refuelling_required: Field<bool>,
    pub is_mandatory_pitstop_tyre_change_required: Field<bool>,
    pub is_mandatory_pitstop_swap_driver_required: Field<bool>,
    pub tyre_set_count: Field<i64>,
}

impl EventRules {
    pub fn switches(&self) -> [(&'static str, &Field<bool>); 5] {
        [
            ("isRefuellingAllowedInRace", &self.is_refuelling_allowed_in_race),
            ("isRefuellingTimeFixed", &self.is_refuelling_time_fixed),
            (
                "isMandatoryPitstopRefuellingRequired",
                &self.is_mandatory_pitstop_refuelling_required,
            ),
            (
                "isMandatoryPitstopTyreChangeRequired",
                &self.is_mandatory_pitstop_tyre_change_required,
            ),
            (
                "isMandatoryPitstopSwapDriverRequired",
                &self.is_mandatory_pitstop_swap_driver_required,
            ),
        ]
    }
}

/// `assistRules.json`: which driving aids are forced off.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistRules {
    pub stability_control_level_max: Field<i64>,
    pub disable_autosteer: Field<i64>,
    pub disable_auto_lights: Field<i64>,
    pub disable_auto_wiper: Field<i64>,
    pub disable_auto_engine_start: Field<i64>,
    pub disable_auto_pit_limiter: Field<i64>,
    pub disable_auto_gear: Field<i64>,
    pub disable_auto_clutch: Field<i64>,
    pub disable_ideal_line: Field<i64>,
}

impl AssistRules {
    pub fn flags(&self) -> [(&'static str, &Field<i64>); 8] {
        [
            ("disableAutosteer", &self.disable_autosteer),
            ("disableAutoLights", &self.disable_auto_lights),
            ("disableAutoWiper", &self.disable_auto_wiper),
            ("disableAutoEngineStart", &self.disable_auto_engine_start),
            ("disableAutoPitLimiter", &self.disable_auto_pit_limiter),
            ("disableAutoGear", &self.disable_auto_gear),
            ("disableAutoClutch", &self.disable_auto_clutch),
            ("disableIdealLine", &self.disable_ideal_line),
        ]
    }
}

/// `entrylist.json`: the pre-registered roster.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryList {
    pub entries: Field<Vec<Entry>>,
    pub force_entry_list: Field<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entry {
    pub drivers: Field<Vec<EntryDriver>>,
    pub race_number: Field<i64>,
    pub forced_car_model: Field<i64>,
    pub override_driver_info: Field<i64>,
    pub is_server_admin: Field<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryDriver {
    pub first_name: Field<String>,
    pub last_name: Field<String>,
    pub short_name: Field<String>,
    pub driver_category: Field<i64>,
    #[serde(rename = "playerID")]
    pub player_id: Field<String>,
    pub nationality: Field<i64>,
}
