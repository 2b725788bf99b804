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

use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::QueryRejection;
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;

use crate::api::response::error_reply;
use crate::api::response::reply;
use crate::api::state::ServerState;
use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::manager::Pagination;
use crate::manager::ResultsFilter;
use crate::stats::SortKey;
use crate::types::driver::DriverId;
use crate::types::race::SessionType;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsParams {
    track: Option<String>,
    session_type: Option<String>,
    driver: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardParams {
    sort_by: Option<SortKey>,
    category: Option<String>,
}

#[derive(Deserialize)]
pub struct LogsParams {
    lines: Option<usize>,
}

fn bad_query(rejection: QueryRejection) -> Response {
    error_reply(&ErrorReport::with_kind(
        ErrorKind::InvalidRequest,
        rejection.body_text(),
    ))
}

pub async fn installation(State(state): State<ServerState>) -> Response {
    reply(Ok(state.manager.validate_installation()))
}

pub async fn status(State(state): State<ServerState>) -> Response {
    reply(Ok(state.manager.get_status()))
}

pub async fn start(State(state): State<ServerState>) -> Response {
    reply(state.manager.start().await)
}

pub async fn stop(State(state): State<ServerState>) -> Response {
    reply(state.manager.stop().await)
}

pub async fn restart(State(state): State<ServerState>) -> Response {
    reply(state.manager.restart().await)
}

pub async fn get_config(State(state): State<ServerState>, Path(kind): Path<String>) -> Response {
    reply(state.manager.get_config(&kind).await)
}

/// The body is parsed here rather than by an extractor so malformed JSON is
/// answered in the usual envelope.
pub async fn put_config(
    State(state): State<ServerState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return error_reply(&ErrorReport::with_kind(
                ErrorKind::InvalidRequest,
                format!("request body is not valid JSON: {e}"),
            ));
        }
    };
    reply(state.manager.put_config(&kind, body).await)
}

pub async fn session(State(state): State<ServerState>) -> Response {
    reply(state.manager.get_session().await)
}

pub async fn results(
    State(state): State<ServerState>,
    params: Result<Query<ResultsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return bad_query(rejection),
    };
    let session_type = match parse_session_type(params.session_type.as_deref()) {
        Ok(session_type) => session_type,
        Err(e) => return error_reply(&e),
    };
    let filter = ResultsFilter {
        track: params.track.filter(|t| !t.trim().is_empty()),
        session_type,
        driver: params.driver.as_deref().map(DriverId::from),
    };
    let pagination = Pagination::new(params.page, params.page_size);
    reply(state.manager.get_results(&filter, pagination).await)
}

fn parse_session_type(value: Option<&str>) -> Fallible<Option<SessionType>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match SessionType::parse(value) {
        SessionType::Unknown => Err(ErrorReport::with_kind(
            ErrorKind::InvalidRequest,
            format!("unknown session type: {value}"),
        )),
        session_type => Ok(Some(session_type)),
    }
}

pub async fn leaderboard(
    State(state): State<ServerState>,
    params: Result<Query<LeaderboardParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return bad_query(rejection),
    };
    let query = state
        .manager
        .leaderboard_query(params.sort_by, params.category);
    reply(state.manager.get_leaderboard(query).await)
}

pub async fn driver(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    reply(state.manager.get_driver_detail(&id).await)
}

pub async fn logs(
    State(state): State<ServerState>,
    params: Result<Query<LogsParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return bad_query(rejection),
    };
    reply(state.manager.get_logs(params.lines).await)
}

pub async fn refresh(State(state): State<ServerState>) -> Response {
    reply(state.manager.refresh().await)
}

pub async fn not_found() -> Response {
    let mut response = error_reply(&ErrorReport::with_kind(
        ErrorKind::InvalidRequest,
        "no such endpoint",
    ));
    *response.status_mut() = axum::http::StatusCode::NOT_FOUND;
    response
}
