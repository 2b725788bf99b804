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

use std::sync::Arc;

use crate::api::server::start_server;
use crate::error::Fallible;
use crate::manager::ServerManager;
use crate::settings::ManagerSettings;

pub async fn serve(mut settings: ManagerSettings, bind: Option<String>) -> Fallible<()> {
    if let Some(bind) = bind {
        settings.bind = bind;
    }
    let manager = Arc::new(ServerManager::new(settings));
    let bind = manager.settings().bind.clone();
    start_server(manager, &bind).await
}
