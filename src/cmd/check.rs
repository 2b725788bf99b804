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

use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::error::fail_with;
use crate::manager::ServerManager;
use crate::settings::ManagerSettings;

pub async fn check_installation(settings: ManagerSettings) -> Fallible<()> {
    let manager = ServerManager::new(settings);
    let report = manager.validate_installation();
    if let Some(reason) = report.reason {
        let kind = match report.root {
            None => ErrorKind::InstallationPathMissing,
            Some(_) => ErrorKind::InstallationInvalid,
        };
        return fail_with(kind, reason);
    }
    let summary = manager.refresh().await?;
    println!("Results: {}", summary.results);
    println!("Entries: {}", summary.entries);
    println!(
        "Session: {}",
        if summary.has_session { "active" } else { "none" }
    );
    for warning in &summary.warnings {
        println!("warning: {warning}");
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::check_installation;
    use crate::error::ErrorKind;
    use crate::error::Fallible;
    use crate::helper::create_tmp_installation;
    use crate::settings::ManagerSettings;

    fn settings(root: &std::path::Path) -> ManagerSettings {
        ManagerSettings {
            root: Some(root.to_path_buf()),
            ..ManagerSettings::default()
        }
    }

    #[tokio::test]
    async fn test_non_existent_directory() {
        let result = check_installation(settings(std::path::Path::new("./derpherp"))).await;
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(ErrorKind::InstallationInvalid)
        );
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let result = check_installation(ManagerSettings::default()).await;
        assert_eq!(
            result.err().map(|e| e.kind()),
            Some(ErrorKind::InstallationPathMissing)
        );
    }

    #[tokio::test]
    async fn test_directory() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        check_installation(settings(dir.path())).await
    }
}
