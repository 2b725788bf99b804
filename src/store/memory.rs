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

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;
use serde_json::json;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::store::ConfigStore;
use crate::store::validate::validate_document;
use crate::types::config::ConfigDocument;
use crate::types::config::ConfigKind;

/// The in-memory tier: built-in defaults, replaced by every document that is
/// successfully written through the tiered store.
pub struct MemoryFallbackStore {
    documents: RwLock<HashMap<ConfigKind, Value>>,
}

impl MemoryFallbackStore {
    pub fn new() -> Self {
        let documents = ConfigKind::ALL
            .into_iter()
            .map(|kind| (kind, default_document(kind)))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }
}

impl Default for MemoryFallbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryFallbackStore {
    fn read(&self, kind: ConfigKind) -> Fallible<ConfigDocument> {
        let documents = self
            .documents
            .read()
            .map_err(|_| ErrorReport::new("fallback store lock poisoned"))?;
        let body = documents
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| default_document(kind));
        Ok(ConfigDocument { kind, body })
    }

    fn write(&self, document: &ConfigDocument) -> Fallible<()> {
        let violations = validate_document(document.kind, &document.body);
        if !violations.is_empty() {
            return Err(ErrorReport::validation(violations));
        }
        let mut documents = self
            .documents
            .write()
            .map_err(|_| ErrorReport::new("fallback store lock poisoned"))?;
        documents.insert(document.kind, document.body.clone());
        Ok(())
    }
}

/// The configuration a freshly installed server ships with.
pub fn default_document(kind: ConfigKind) -> Value {
    match kind {
        ConfigKind::Configuration => json!({
            "udpPort": 9231,
            "tcpPort": 9232,
            "maxConnections": 30,
            "lanDiscovery": 1,
            "registerToLobby": 1,
            "configVersion": 1
        }),
        ConfigKind::Settings => json!({
            "serverName": "ACC Server",
            "adminPassword": "",
            "carGroup": "FreeForAll",
            "trackMedalsRequirement": 0,
            "safetyRatingRequirement": -1,
            "racecraftRatingRequirement": -1,
            "password": "",
            "spectatorPassword": "",
            "maxCarSlots": 30,
            "dumpLeaderboards": 1,
            "isRaceLocked": 1,
            "randomizeTrackWhenEmpty": 0,
            "centralEntryListPath": "",
            "allowAutoDQ": 1,
            "shortFormationLap": 0,
            "formationLapType": 3,
            "ignorePrematureDisconnects": 1,
            "configVersion": 1
        }),
        ConfigKind::Event => json!({
            "track": "monza",
            "preRaceWaitingTimeSeconds": 80,
            "sessionOverTimeSeconds": 120,
            "ambientTemp": 22,
            "cloudLevel": 0.1,
            "rain": 0.0,
            "weatherRandomness": 1,
            "postQualySeconds": 10,
            "postRaceSeconds": 15,
            "sessions": [
                {"hourOfDay": 12, "dayOfWeekend": 1, "timeMultiplier": 1, "sessionType": "P", "sessionDurationMinutes": 20},
                {"hourOfDay": 14, "dayOfWeekend": 2, "timeMultiplier": 1, "sessionType": "Q", "sessionDurationMinutes": 10},
                {"hourOfDay": 16, "dayOfWeekend": 3, "timeMultiplier": 1, "sessionType": "R", "sessionDurationMinutes": 20}
            ],
            "configVersion": 1
        }),
        ConfigKind::EventRules => json!({
            "qualifyStandingType": 1,
            "pitWindowLengthSec": -1,
            "driverStintTimeSec": -1,
            "mandatoryPitstopCount": 0,
            "maxTotalDrivingTime": -1,
            "maxDriversCount": 1,
            "isRefuellingAllowedInRace": true,
            "isRefuellingTimeFixed": false,
            "isMandatoryPitstopRefuellingRequired": false,
            "isMandatoryPitstopTyreChangeRequired": false,
            "isMandatoryPitstopSwapDriverRequired": false,
            "tyreSetCount": 50
        }),
        ConfigKind::AssistRules => json!({
            "stabilityControlLevelMax": 100,
            "disableAutosteer": 0,
            "disableAutoLights": 0,
            "disableAutoWiper": 0,
            "disableAutoEngineStart": 0,
            "disableAutoPitLimiter": 0,
            "disableAutoGear": 0,
            "disableAutoClutch": 0,
            "disableIdealLine": 0
        }),
        ConfigKind::Entrylist => json!({
            "entries": [],
            "forceEntryList": 0
        }),
    }
}
