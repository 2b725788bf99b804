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

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;

/// The envelope every endpoint answers with.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl From<&ErrorReport> for ApiError {
    fn from(value: &ErrorReport) -> Self {
        Self {
            kind: value.kind(),
            message: value.message().to_string(),
            violations: value.violations().to_vec(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InstallationInvalid
        | ErrorKind::InstallationPathMissing
        | ErrorKind::AlreadyRunning
        | ErrorKind::NotRunning => StatusCode::CONFLICT,
        ErrorKind::ConfigNotFound | ErrorKind::UnknownConfigType | ErrorKind::DriverNotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::ConfigValidationError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::ProcessControlTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ProcessControlFailed
        | ErrorKind::ConfigParseError
        | ErrorKind::Io
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn reply<T: Serialize>(result: Fallible<T>) -> Response {
    match result {
        Ok(data) => {
            let body = ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => error_reply(&e),
    }
}

pub fn error_reply(e: &ErrorReport) -> Response {
    let status = status_for(e.kind());
    if status.is_server_error() {
        log::error!("{} ({})", e.message(), e.kind().as_str());
    } else {
        log::debug!("{} ({})", e.message(), e.kind().as_str());
    }
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(ApiError::from(e)),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() -> Fallible<()> {
        let report = ErrorReport::validation(vec!["tcpPort and udpPort must differ".to_string()]);
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError::from(&report)),
        };
        let json = serde_json::to_value(&body)?;
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["kind"], "configValidationError");
        assert_eq!(json["error"]["violations"][0], "tcpPort and udpPort must differ");
        Ok(())
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_for(ErrorKind::DriverNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::ConfigValidationError),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::AlreadyRunning), StatusCode::CONFLICT);
    }
}
