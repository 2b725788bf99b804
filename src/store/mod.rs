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

pub mod file;
pub mod memory;
pub mod validate;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::store::memory::MemoryFallbackStore;
use crate::types::config::ConfigDocument;
use crate::types::config::ConfigKind;

/// Read and write access to configuration documents. Writes validate the
/// document first and never apply an invalid one.
pub trait ConfigStore: Send + Sync {
    fn read(&self, kind: ConfigKind) -> Fallible<ConfigDocument>;

    fn write(&self, document: &ConfigDocument) -> Fallible<()>;
}

/// Which tier answered a configuration request.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigSource {
    File,
    MemoryFallback,
}

#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    #[serde(flatten)]
    pub document: ConfigDocument,
    pub source: ConfigSource,
}

/// Answers from the file tier when it can, and from the memory tier when the
/// file is missing, unreadable, or there is no usable installation.
pub struct TieredConfigStore {
    primary: Option<Box<dyn ConfigStore>>,
    fallback: MemoryFallbackStore,
}

impl TieredConfigStore {
    pub fn new(primary: Option<Box<dyn ConfigStore>>) -> Self {
        Self {
            primary,
            fallback: MemoryFallbackStore::new(),
        }
    }

    pub fn read(&self, kind: ConfigKind) -> Fallible<ConfigResponse> {
        if let Some(primary) = &self.primary {
            match primary.read(kind) {
                Ok(document) => {
                    return Ok(ConfigResponse {
                        document,
                        source: ConfigSource::File,
                    });
                }
                Err(e) if falls_back(e.kind()) => {
                    log::warn!("Serving {kind} from memory: {}", e.message());
                }
                Err(e) => return Err(e),
            }
        }
        let document = self.fallback.read(kind)?;
        Ok(ConfigResponse {
            document,
            source: ConfigSource::MemoryFallback,
        })
    }

    pub fn write(&self, document: ConfigDocument) -> Fallible<ConfigResponse> {
        let source = match &self.primary {
            Some(primary) => {
                primary.write(&document)?;
                ConfigSource::File
            }
            None => ConfigSource::MemoryFallback,
        };
        self.fallback.write(&document)?;
        Ok(ConfigResponse { document, source })
    }
}

fn falls_back(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConfigNotFound | ErrorKind::ConfigParseError | ErrorKind::InstallationInvalid
    )
}
