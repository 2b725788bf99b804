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

use crate::error::Fallible;
use crate::manager::ServerManager;
use crate::settings::ManagerSettings;

pub async fn print_logs(settings: ManagerSettings, lines: Option<usize>) -> Fallible<()> {
    let manager = ServerManager::new(settings);
    for line in manager.get_logs(lines).await? {
        println!("{line}");
    }
    Ok(())
}
