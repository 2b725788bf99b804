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

use serde::Serialize;

/// The key a driver's statistics are grouped under.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DriverId(String);

impl DriverId {
    /// Pick the best available identity: the Steam-style player id, else the
    /// driver GUID, else a `firstName_lastName` composite.
    pub fn resolve(
        player_id: Option<&str>,
        guid: Option<&str>,
        first_name: &str,
        last_name: &str,
    ) -> Self {
        fn usable(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }
        if let Some(id) = usable(player_id) {
            return Self(id.to_string());
        }
        if let Some(guid) = usable(guid) {
            return Self(guid.to_string());
        }
        Self(format!("{}_{}", first_name.trim(), last_name.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DriverId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for DriverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DriverId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// A driver as named in a results or session file.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceDriver {
    pub id: DriverId,
    pub first_name: String,
    pub last_name: String,
    pub short_name: String,
    pub nationality: Option<i64>,
}

impl RaceDriver {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.id.to_string()
        } else {
            name.to_string()
        }
    }
}

/// A driver pre-registered in the entry list.
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverEntry {
    pub driver: RaceDriver,
    pub race_number: Option<i64>,
    /// The car model the entry is locked to, if any.
    pub car_model: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_preferred() {
        let id = DriverId::resolve(Some("S76561198000000001"), Some("guid-1"), "Ayrton", "Senna");
        assert_eq!(id.as_str(), "S76561198000000001");
    }

    #[test]
    fn test_guid_fallback() {
        let id = DriverId::resolve(Some("  "), Some("guid-1"), "Ayrton", "Senna");
        assert_eq!(id.as_str(), "guid-1");
    }

    #[test]
    fn test_ids_are_trimmed() {
        let id = DriverId::resolve(Some(" S1 "), None, "Ayrton", "Senna");
        assert_eq!(id.as_str(), "S1");
        let id = DriverId::resolve(None, Some("\tguid-1\n"), "Ayrton", "Senna");
        assert_eq!(id.as_str(), "guid-1");
    }

    #[test]
    fn test_name_fallback() {
        let id = DriverId::resolve(None, None, "Ayrton", "Senna");
        assert_eq!(id.as_str(), "Ayrton_Senna");
    }

    #[test]
    fn test_display_name() {
        let driver = RaceDriver {
            id: DriverId::from("S1"),
            first_name: "".to_string(),
            last_name: "".to_string(),
            short_name: "".to_string(),
            nationality: None,
        };
        assert_eq!(driver.display_name(), "S1");
    }
}
