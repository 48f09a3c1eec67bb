// This file is part of the terraform-provider-duplocloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
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

use serde_json::{Map, Value};
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Error returned by any call to the DuploCloud API
///
/// `status` is the HTTP status code of the response, or `-1` when the error
/// did not come from an HTTP response (transport, encoding, unexpected body).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub status: i32,
    pub url: String,
    pub message: String,
    pub response: Map<String, Value>,
}

impl ClientError {
    /// Build an error from a non successful HTTP response
    pub fn http(url: &str, api_path: &str, status: u16, mime: Option<&str>, body: String) -> Self {
        let mut body = body;
        if !api_path.starts_with("/v3/") && !api_path.starts_with("v3/") && (status == 400 || status == 404) {
            body.push_str(". Please verify object exists in duplocloud.");
        }

        let mut response = Map::new();
        if mime.is_some_and(|mime| mime.starts_with("application/json")) {
            if let Ok(Value::Object(parsed)) = serde_json::from_str(&body) {
                response = parsed;
            }
        }

        let message = format!("url: {url}, status: {status}, message: {body}");
        if !response.contains_key("Message") {
            response.insert("Message".to_owned(), Value::String(message.clone()));
        }

        Self {
            status: status.into(),
            url: url.to_owned(),
            message,
            response,
        }
    }

    /// Build an error that did not come from the HTTP status of a response
    pub fn app(url: &str, message: impl Into<String>) -> Self {
        Self {
            status: -1,
            url: url.to_owned(),
            message: message.into(),
            response: Map::new(),
        }
    }

    pub fn custom(message: impl Into<String>, status: i32) -> Self {
        Self {
            status,
            url: String::new(),
            message: message.into(),
            response: Map::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_bad_request(&self) -> bool {
        self.status == 400
    }

    /// `Message` field of the JSON error response, if any
    pub fn response_message(&self) -> Option<&str> {
        self.response.get("Message").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_not_found_hints_at_missing_object() {
        let err = ClientError::http(
            "https://duplo/subscriptions/t/GetX",
            "subscriptions/t/GetX",
            404,
            Some("text/plain"),
            "not here".to_owned(),
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.message,
            "url: https://duplo/subscriptions/t/GetX, status: 404, message: not here. Please verify object exists in duplocloud."
        );
        assert_eq!(err.response_message(), Some(err.message.as_str()));
    }

    #[test]
    fn v3_not_found_keeps_body() {
        let err = ClientError::http(
            "https://duplo/v3/subscriptions/t/x",
            "v3/subscriptions/t/x",
            404,
            None,
            "gone".to_owned(),
        );
        assert_eq!(
            err.message,
            "url: https://duplo/v3/subscriptions/t/x, status: 404, message: gone"
        );
    }

    #[test]
    fn json_body_is_kept_as_response() {
        let err = ClientError::http(
            "https://duplo/v3/x",
            "v3/x",
            400,
            Some("application/json; charset=utf-8"),
            r#"{"Message":"Rate exceeded"}"#.to_owned(),
        );
        assert!(err.is_bad_request());
        assert_eq!(err.response_message(), Some("Rate exceeded"));
    }

    #[test]
    fn app_errors_have_no_status() {
        let err = ClientError::app("https://duplo/x", "boom");
        assert_eq!(err.status, -1);
        assert_eq!(err.to_string(), "boom");
    }
}
