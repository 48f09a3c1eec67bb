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

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

mod error;
mod retry;
mod types;

pub mod aws_batch;
pub mod aws_tag;
pub mod azure_sql;
pub mod gcp_pubsub;
pub mod infrastructure;
pub mod k8s_config_map;
pub mod tenant;
pub mod utils;

pub use error::{ClientError, ClientResult};
pub use retry::{
    retry_with_exponential_backoff, with_rate_retry, BackoffConfig, RetryConf,
};
pub use types::{DuploKeyStringValue, DuploKeyValueUpdate, DuploStringValue};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings used to build a [`Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub token: String,
    pub ssl_no_verify: bool,
    pub timeout: Duration,
}

/// Client of the DuploCloud REST API
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    host: String,
    retry: RetryConf,
}

impl Client {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let host = config.host.trim_end_matches('/').to_owned();

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|err| ClientError::app(&host, format!("invalid token: {err}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.ssl_no_verify)
            .build()
            .map_err(|err| ClientError::app(&host, format!("cannot build HTTP client: {err}")))?;

        Ok(Self {
            http,
            host,
            retry: RetryConf::default(),
        })
    }

    #[cfg(test)]
    pub fn with_retry_conf(mut self, retry: RetryConf) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, api_path: &str) -> String {
        format!("{}/{}", self.host, api_path.trim_start_matches('/'))
    }

    /// Send the request and return the body of a successful response
    async fn execute(
        &self,
        method: Method,
        api_name: &str,
        api_path: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<String> {
        let url = self.url(api_path);
        debug!(api = %api_name, %url, "calling DuploCloud");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            trace!(api = %api_name, body = %String::from_utf8_lossy(&body), "request");
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ClientError::app(&url, format!("{api_name}: {err}")))?;

        let status = response.status();
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|mime| mime.to_str().ok())
            .map(str::to_owned);
        let text = response
            .text()
            .await
            .map_err(|err| ClientError::app(&url, format!("{api_name}: {err}")))?;
        trace!(api = %api_name, status = status.as_u16(), body = %text, "response");

        if status.as_u16() > 300 {
            return Err(ClientError::http(
                &url,
                api_path,
                status.as_u16(),
                mime.as_deref(),
                text,
            ));
        }

        Ok(text)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        api_name: &str,
        api_path: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<T> {
        let api_name = api_label(&method, api_name);
        let text = self.execute(method, &api_name, api_path, body).await?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|err| {
            ClientError::app(
                &self.url(api_path),
                format!("{api_name}: cannot unmarshal response from JSON: {err}"),
            )
        })
    }

    async fn execute_no_content(
        &self,
        method: Method,
        api_name: &str,
        api_path: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<()> {
        let api_name = api_label(&method, api_name);
        let text = self.execute(method, &api_name, api_path, body).await?;
        match text.trim() {
            "" | "null" | "\"\"" => Ok(()),
            other => Err(ClientError::app(
                &self.url(api_path),
                format!("{api_name}: received unexpected response: {other}"),
            )),
        }
    }

    fn encode<B: Serialize + ?Sized>(&self, api_name: &str, api_path: &str, rq: &B) -> ClientResult<Vec<u8>> {
        serde_json::to_vec(rq).map_err(|err| {
            ClientError::app(
                &self.url(api_path),
                format!("{api_name}: cannot marshal request to JSON: {err}"),
            )
        })
    }

    pub async fn get_api<T: DeserializeOwned>(&self, api_name: &str, api_path: &str) -> ClientResult<T> {
        self.execute_json(Method::GET, api_name, api_path, None).await
    }

    pub async fn delete_api<T: DeserializeOwned>(&self, api_name: &str, api_path: &str) -> ClientResult<T> {
        self.execute_json(Method::DELETE, api_name, api_path, None).await
    }

    pub async fn delete_api_no_content(&self, api_name: &str, api_path: &str) -> ClientResult<()> {
        self.execute_no_content(Method::DELETE, api_name, api_path, None).await
    }

    pub async fn post_api<B, T>(&self, api_name: &str, api_path: &str, rq: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.encode(api_name, api_path, rq)?;
        self.execute_json(Method::POST, api_name, api_path, Some(body)).await
    }

    pub async fn post_api_no_content<B>(&self, api_name: &str, api_path: &str, rq: &B) -> ClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        let body = self.encode(api_name, api_path, rq)?;
        self.execute_no_content(Method::POST, api_name, api_path, Some(body)).await
    }

    pub async fn put_api<B, T>(&self, api_name: &str, api_path: &str, rq: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.encode(api_name, api_path, rq)?;
        self.execute_json(Method::PUT, api_name, api_path, Some(body)).await
    }

    pub async fn get_api_with_retry<T: DeserializeOwned>(&self, api_name: &str, api_path: &str) -> ClientResult<T> {
        with_rate_retry(&self.retry, &format!("getAPI {api_name}"), move || {
            self.get_api(api_name, api_path)
        })
        .await
    }

    pub async fn delete_api_with_retry(&self, api_name: &str, api_path: &str) -> ClientResult<()> {
        with_rate_retry(&self.retry, &format!("deleteAPI {api_name}"), move || {
            self.delete_api_no_content(api_name, api_path)
        })
        .await
    }

    pub async fn post_api_with_retry<B, T>(&self, api_name: &str, api_path: &str, rq: &B) -> ClientResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        with_rate_retry(&self.retry, &format!("postAPI {api_name}"), move || {
            self.post_api(api_name, api_path, rq)
        })
        .await
    }

    pub async fn put_api_with_retry<B, T>(&self, api_name: &str, api_path: &str, rq: &B) -> ClientResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        with_rate_retry(&self.retry, &format!("putAPI {api_name}"), move || {
            self.put_api(api_name, api_path, rq)
        })
        .await
    }
}

fn api_label(method: &Method, api_name: &str) -> String {
    format!("{}API {}", method.as_str().to_lowercase(), api_name)
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    pub(crate) fn test_client(server: &MockServer) -> Client {
        Client::new(&ClientConfig {
            host: format!("{}/", server.uri()),
            token: "secret-token".to_owned(),
            ssl_no_verify: false,
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
        .unwrap()
        .with_retry_conf(RetryConf {
            max_retries: 3,
            min_starting_delay: 0,
            max_starting_delay: 0,
            min_delay: 0,
            max_delay: 0,
            min_jitter_delay: 0,
        })
    }

    #[tokio::test]
    async fn test_get_sends_auth_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/GetThing"))
            .and(header("Authorization", "Bearer secret-token"))
            .and(header("Content-Type", "application/json; charset=utf-8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Name": "x"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let value: serde_json::Value = client.get_api("GetThing", "admin/GetThing").await.unwrap();
        assert_eq!(value, json!({"Name": "x"}));
    }

    #[tokio::test]
    async fn test_get_null_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/Nothing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let value: Option<serde_json::Value> = client.get_api("Nothing", "admin/Nothing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_post_no_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/Update"))
            .and(body_json(json!({"Key": "k"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"\""))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/admin/Chatty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        client
            .post_api_no_content("Update", "admin/Update", &json!({"Key": "k"}))
            .await
            .unwrap();
        let err = client
            .post_api_no_content("Chatty", "admin/Chatty", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status, -1);
        assert_eq!(
            err.message,
            "postAPI Chatty: received unexpected response: {\"ok\":true}"
        );
    }

    #[tokio::test]
    async fn test_http_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions/t/Missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/subscriptions/t/Broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let err = client
            .get_api::<serde_json::Value>("Missing", "subscriptions/t/Missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message.ends_with("no such thing. Please verify object exists in duplocloud."));

        let err = client
            .get_api::<serde_json::Value>("Broken", "v3/subscriptions/t/Broken")
            .await
            .unwrap_err();
        assert!(err.message.ends_with("status: 500, message: internal"));
    }

    #[tokio::test]
    async fn test_bad_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/Broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let err = client
            .get_api::<serde_json::Value>("Broken", "admin/Broken")
            .await
            .unwrap_err();
        assert_eq!(err.status, -1);
        assert!(err
            .message
            .starts_with("getAPI Broken: cannot unmarshal response from JSON:"));
    }

    #[tokio::test]
    async fn test_retry_on_rate_exceeded() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v3/x"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"Message": "Rate exceeded"})),
            )
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v3/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Done": true})))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let value: serde_json::Value = client
            .put_api_with_retry("Update", "v3/x", &json!({}))
            .await
            .unwrap();
        assert_eq!(value, json!({"Done": true}));
    }
}
