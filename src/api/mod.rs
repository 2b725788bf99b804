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

mod handlers;
mod response;
pub mod server;
mod state;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use portpicker::pick_unused_port;
    use reqwest::StatusCode;
    use serde_json::Value;
    use serde_json::json;
    use tokio::net::TcpStream;
    use tokio::spawn;
    use tokio::time::sleep;

    use crate::api::server::start_server;
    use crate::error::Fallible;
    use crate::helper::Finisher;
    use crate::helper::create_tmp_installation;
    use crate::helper::result_json;
    use crate::helper::write_result;
    use crate::manager::ServerManager;
    use crate::settings::ManagerSettings;
    use crate::supervisor::locator::NullLocator;

    #[tokio::test]
    async fn test_e2e() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let body = result_json(
            "monza",
            "R",
            &[
                Finisher::new("S1", 1, 107_000),
                Finisher::new("S2", 2, 107_500),
                Finisher::new("S3", 3, 108_000),
            ],
        );
        write_result(dir.path(), "251016_200000_R.json", &body)?;
        std::fs::write(dir.path().join("results/251016_210000_R.json"), "{")?;

        let settings = ManagerSettings {
            root: Some(dir.path().to_path_buf()),
            ..ManagerSettings::default()
        };
        let manager = Arc::new(ServerManager::with_locator(settings, Arc::new(NullLocator)));
        let port = pick_unused_port().unwrap();
        let bind = format!("127.0.0.1:{port}");
        let server_bind = bind.clone();
        spawn(async move { start_server(manager, &server_bind).await });
        loop {
            if let Ok(stream) = TcpStream::connect(&bind).await {
                drop(stream);
                break;
            }
            sleep(Duration::from_millis(1)).await;
        }
        let url = |path: &str| format!("http://{bind}{path}");
        let client = reqwest::Client::new();

        // Installation and status.
        let json: Value = reqwest::get(url("/api/installation")).await?.json().await?;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["valid"], true);
        let json: Value = reqwest::get(url("/api/status")).await?.json().await?;
        assert_eq!(json["data"]["state"], "stopped");
        assert_eq!(json["data"]["uptimeSeconds"], 0);

        // Stopping a stopped server is not an error.
        let response = client.post(url("/api/stop")).send().await?;
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = response.json().await?;
        assert_eq!(json["data"]["alreadyStopped"], true);

        // Rejected configuration.
        let response = client
            .put(url("/api/config/configuration"))
            .json(&json!({"tcpPort": 9600, "udpPort": 9600}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json: Value = response.json().await?;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "configValidationError");
        assert!(!json["error"]["violations"].as_array().unwrap().is_empty());

        // Accepted configuration round-trips.
        let document = json!({"tcpPort": 9600, "udpPort": 9601, "maxConnections": 30});
        let response = client
            .put(url("/api/config/configuration"))
            .json(&document)
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = reqwest::get(url("/api/config/configuration")).await?.json().await?;
        assert_eq!(json["data"]["body"], document);
        assert_eq!(json["data"]["source"], "file");

        // Malformed body.
        let response = client
            .put(url("/api/config/event"))
            .body("{not json")
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Unknown configuration type.
        let response = reqwest::get(url("/api/config/weather")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: Value = response.json().await?;
        assert_eq!(json["error"]["kind"], "unknownConfigType");

        // Reporting.
        let json: Value = client.post(url("/api/refresh")).send().await?.json().await?;
        assert_eq!(json["data"]["results"], 1);
        assert_eq!(json["data"]["warnings"].as_array().unwrap().len(), 1);

        let json: Value = reqwest::get(url("/api/session")).await?.json().await?;
        assert_eq!(json["success"], true);
        assert!(json["data"].is_null());

        let json: Value = reqwest::get(url("/api/results?page=1&pageSize=5")).await?.json().await?;
        assert_eq!(json["data"]["total"], 1);
        assert_eq!(json["data"]["items"][0]["track"], "monza");

        let json: Value = reqwest::get(url("/api/leaderboard?sortBy=points"))
            .await?
            .json()
            .await?;
        let championship = json["data"]["championship"].as_array().unwrap();
        assert_eq!(championship.len(), 3);
        assert_eq!(championship[0]["driverId"], "S1");
        assert!(championship[0]["points"].as_u64() > championship[1]["points"].as_u64());
        assert_eq!(json["data"]["topDrivers"].as_array().unwrap().len(), 3);

        let response = reqwest::get(url("/api/leaderboard?sortBy=bogus")).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json: Value = reqwest::get(url("/api/drivers/S2")).await?.json().await?;
        assert_eq!(json["data"]["history"][0]["position"], 2);
        let response = reqwest::get(url("/api/drivers/nobody")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json: Value = reqwest::get(url("/api/logs?lines=50")).await?.json().await?;
        assert_eq!(json["data"], json!([]));

        // Unknown route.
        let response = reqwest::get(url("/api/nothing-here")).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json: Value = response.json().await?;
        assert_eq!(json["success"], false);
        Ok(())
    }
}
