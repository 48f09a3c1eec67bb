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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};
use tracing::debug;

use crate::config::ClientHandle;
use crate::utils::{check_string, validate_uuid, WithSchema, WithValidate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct K8ConfigMapDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub data: ValueString<'a>,
    pub metadata: ValueString<'a>,
}

impl<'a> WithSchema for K8ConfigMapDataSourceState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Id of the configmap, as `{tenant_id}/{name}`"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant of the configmap"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The name of the configmap"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "data" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::markdown(
                            "A JSON encoded string representing the configmap data. You can use the `jsondecode()` function to parse this, if needed",
                        ),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "metadata" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::markdown(
                            "A JSON encoded string representing the configmap metadata. You can use the `jsondecode()` function to parse this, if needed",
                        ),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::markdown(
                    "`duplocloud_k8_config_map` retrieves a kubernetes configmap in Duplo.",
                ),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for K8ConfigMapDataSourceState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
    }
}

#[derive(Debug, Default, Clone)]
pub struct K8ConfigMapDataSource {
    client: ClientHandle,
}

impl K8ConfigMapDataSource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for K8ConfigMapDataSource {
    type State<'a> = K8ConfigMapDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(K8ConfigMapDataSourceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags).await?;
        let tenant_id = config.tenant_id.as_str();
        let name = config.name.as_str();
        let id = format!("{tenant_id}/{name}");
        debug!(%id, "reading configmap");

        let config_map = match client.k8s_config_map_get(tenant_id, name).await {
            Ok(Some(config_map)) if config_map.name().is_some() => config_map,
            Ok(_) => {
                diags.root_error_short(format!("tenant configmap '{id}' not found"));
                return None;
            }
            Err(err) if err.is_not_found() => {
                diags.root_error_short(format!("tenant configmap '{id}' not found"));
                return None;
            }
            Err(err) => {
                diags.root_error(format!("unable to read tenant configmap '{id}'"), err.to_string());
                return None;
            }
        };

        let encoded = serde_json::to_string(&config_map.data)
            .and_then(|data| Ok((data, serde_json::to_string(&config_map.metadata)?)));
        let (data, metadata) = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                diags.root_error(format!("Invalid configmap '{id}'"), err.to_string());
                return None;
            }
        };

        let mut state = config.clone();
        state.id = Value::Value(id.into());
        state.data = Value::Value(data.into());
        state.metadata = Value::Value(metadata.into());
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::duplosdk::tests::test_client;

    use super::*;

    const TENANT: &str = "6f8e3e4c-0000-4000-8000-000000000001";

    fn config<'a>() -> K8ConfigMapDataSourceState<'a> {
        K8ConfigMapDataSourceState {
            tenant_id: Value::Value(TENANT.into()),
            name: Value::Value("settings".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_read_encodes_data() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/subscriptions/{TENANT}/K8ConfigMapApiV2/settings")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"name": "settings"},
                "data": {"b": "2", "a": "1"}
            })))
            .mount(&mock_server)
            .await;

        let data_source =
            K8ConfigMapDataSource::new(ClientHandle::configured(test_client(&mock_server)));
        let mut diags = Diagnostics::default();
        let state = data_source
            .read(&mut diags, config(), Default::default())
            .await
            .unwrap();
        assert_eq!(state.id.as_str(), format!("{TENANT}/settings"));
        assert_eq!(state.data.as_str(), r#"{"a":"1","b":"2"}"#);
        assert_eq!(state.metadata.as_str(), r#"{"name":"settings"}"#);
    }

    #[tokio::test]
    async fn test_missing_config_map_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/subscriptions/{TENANT}/K8ConfigMapApiV2/settings")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let data_source =
            K8ConfigMapDataSource::new(ClientHandle::configured(test_client(&mock_server)));
        let mut diags = Diagnostics::default();
        assert!(data_source
            .read(&mut diags, config(), Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].summary,
            format!("tenant configmap '{TENANT}/settings' not found")
        );
    }
}
