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
use crate::stats::Leaderboard;
use crate::stats::SortKey;

pub async fn print_leaderboard(
    settings: ManagerSettings,
    sort_by: Option<SortKey>,
    category: Option<String>,
) -> Fallible<()> {
    let board = leaderboard(settings, sort_by, category).await?;
    let json = serde_json::to_string_pretty(&board)?;
    println!("{json}");
    Ok(())
}

async fn leaderboard(
    settings: ManagerSettings,
    sort_by: Option<SortKey>,
    category: Option<String>,
) -> Fallible<Leaderboard> {
    let manager = ServerManager::new(settings);
    let query = manager.leaderboard_query(sort_by, category);
    manager.get_leaderboard(query).await
}
