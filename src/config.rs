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

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{ValueBool, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};
use tokio::sync::RwLock;

use crate::duplosdk::{Client, ClientConfig, DEFAULT_HTTP_TIMEOUT};
use crate::utils::{WithSchema, WithValidate};

/// Configuration block of the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub duplo_host: ValueString<'a>,
    pub duplo_token: ValueString<'a>,
    pub ssl_no_verify: ValueBool,
    pub http_timeout: ValueNumber,
}

impl<'a> WithSchema for ProviderConfig<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "duplo_host" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain(
                            "Base URL to the Duplo REST API. Defaults to the `duplo_host` environment variable",
                        ),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "duplo_token" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain(
                            "Bearer token used to authenticate to the Duplo REST API. Defaults to the `duplo_token` environment variable",
                        ),
                        constraint: AttributeConstraint::Optional,
                        sensitive: true,
                        ..Default::default()
                    },
                    "ssl_no_verify" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Disable SSL certificate verification"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "http_timeout" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Timeout of the HTTP requests in seconds, 30 by default"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("Terraform provider for the DuploCloud platform"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ProviderConfig<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        if let Some(timeout) = self.http_timeout.as_ref_option() {
            if *timeout <= 0 {
                diags.error_short(
                    "`http_timeout` must be positive",
                    AttributePath::new("http_timeout"),
                );
            }
        }
    }
}

fn from_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

impl<'a> ProviderConfig<'a> {
    /// Resolve the client settings, falling back to the environment
    pub fn client_config(&self) -> Option<ClientConfig> {
        let host = self
            .duplo_host
            .as_deref_option()
            .filter(|host| !host.is_empty())
            .map(str::to_owned)
            .or_else(|| from_env(&["duplo_host", "DUPLO_HOST"]))?;
        let token = self
            .duplo_token
            .as_deref_option()
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .or_else(|| from_env(&["duplo_token", "DUPLO_TOKEN"]))?;
        let timeout = self
            .http_timeout
            .as_ref_option()
            .filter(|timeout| **timeout > 0)
            .map_or(DEFAULT_HTTP_TIMEOUT, |timeout| {
                Duration::from_secs(*timeout as u64)
            });

        Some(ClientConfig {
            host: host.trim_end_matches('/').to_owned(),
            token,
            ssl_no_verify: self.ssl_no_verify.unwrap_or_default(),
            timeout,
        })
    }
}

/// Shared access to the client, filled when the provider is configured
#[derive(Debug, Clone, Default)]
pub struct ClientHandle(Arc<RwLock<Option<Arc<Client>>>>);

impl ClientHandle {
    pub async fn set(&self, client: Client) {
        *self.0.write().await = Some(Arc::new(client));
    }

    /// Get the configured client, reporting an error if there is none
    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Client>> {
        let client = self.0.read().await.clone();
        if client.is_none() {
            diags.root_error_short("Provider is not configured");
        }
        client
    }

    #[cfg(test)]
    pub fn configured(client: Client) -> Self {
        Self(Arc::new(RwLock::new(Some(Arc::new(client)))))
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::value::Value;

    use super::*;

    #[test]
    fn explicit_config() {
        let config = ProviderConfig {
            duplo_host: Value::Value("https://duplo.example.com/".into()),
            duplo_token: Value::Value("token".into()),
            ssl_no_verify: Value::Value(true),
            http_timeout: Value::Value(5),
        };
        let client = config.client_config().unwrap();
        assert_eq!(client.host, "https://duplo.example.com");
        assert_eq!(client.token, "token");
        assert!(client.ssl_no_verify);
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_timeout() {
        let config = ProviderConfig {
            http_timeout: Value::Value(0),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_handle() {
        let mut diags = Diagnostics::default();
        assert!(ClientHandle::default().get(&mut diags).await.is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
