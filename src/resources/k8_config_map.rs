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
use serde_json::{Map, Value as JsonValue};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::debug;

use crate::config::ClientHandle;
use crate::duplosdk::k8s_config_map::{k8s_config_map_path, DuploK8sConfigMap};
use crate::timeouts::{
    create_timeout, delete_timeout, timeouts_block, update_timeout, DefaultTimeouts, TimeoutsState,
};
use crate::utils::{
    check_string, invalid_id, split_id, suppress_equivalent_json, validate_json_object,
    validate_subdomain, validate_uuid, WithSchema, WithValidate,
};
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create,
    WaitError,
};

use super::with_timeout;

const KIND: &str = "k8s config map";
const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(15, 15, 15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct K8ConfigMapState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub data: ValueString<'a>,
    pub metadata: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for K8ConfigMapState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Id of the config map"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant that the configmap will be created in"),
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
                        description: Description::plain("A JSON encoded string representing the configmap data"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "metadata" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("A JSON encoded string representing the configmap metadata"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_k8_config_map` manages a kubernetes configmap in a Duplo tenant.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithValidate for K8ConfigMapState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
        check_string(diags, &self.name, AttributePath::new("name"), validate_subdomain);
        check_string(diags, &self.data, AttributePath::new("data"), validate_json_object);
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

fn config_map_id(tenant_id: &str, name: &str) -> String {
    format!("{}/{name}", k8s_config_map_path(tenant_id))
}

/// Parse `v2/subscriptions/{tenant}/K8ConfigMapApiV2/{name}`
fn parse_id(id: &str) -> Option<(&str, &str)> {
    match split_id(id, 5)?.as_slice() {
        ["v2", "subscriptions", tenant_id, "K8ConfigMapApiV2", name] => Some((tenant_id, name)),
        _ => None,
    }
}

fn parse_data(data: &str) -> Result<Map<String, JsonValue>, serde_json::Error> {
    serde_json::from_str(data)
}

/// Copy the config map into the state, keeping the configured data text when equivalent
fn flatten(state: &mut K8ConfigMapState, config_map: &DuploK8sConfigMap) -> Result<(), serde_json::Error> {
    let data = serde_json::to_string(&config_map.data)?;
    let keep = state
        .data
        .as_deref_option()
        .is_some_and(|current| suppress_equivalent_json(current, &data));
    if !keep {
        state.data = Value::Value(data.into());
    }
    state.metadata = Value::Value(serde_json::to_string(&config_map.metadata)?.into());
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct K8ConfigMapResource {
    client: ClientHandle,
}

impl K8ConfigMapResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: K8ConfigMapState<'a>,
    ) -> Option<K8ConfigMapState<'a>> {
        let client = self.client.get(diags).await?;
        let id = state.id.as_str().to_owned();
        let Some((tenant_id, name)) = parse_id(&id) else {
            invalid_id(diags, "duplocloud_k8_config_map", &id, "v2/subscriptions/{tenant_id}/K8ConfigMapApiV2/{name}");
            return None;
        };

        let config_map = match client.k8s_config_map_get(tenant_id, name).await {
            Ok(Some(config_map)) => config_map,
            Ok(None) => return None,
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve tenant {tenant_id} configmap '{name}'"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.tenant_id = Value::Value(tenant_id.to_owned().into());
        state.name = Value::Value(name.to_owned().into());
        if let Err(err) = flatten(&mut state, &config_map) {
            diags.root_error(format!("Invalid configmap '{name}'"), err.to_string());
            return None;
        }
        Some(state)
    }

    fn request(diags: &mut Diagnostics, state: &K8ConfigMapState) -> Option<DuploK8sConfigMap> {
        match parse_data(state.data.as_str()) {
            Ok(data) => Some(DuploK8sConfigMap::new(state.name.as_str(), data)),
            Err(err) => {
                diags.error(
                    "Invalid configmap data",
                    err.to_string(),
                    AttributePath::new("data"),
                );
                None
            }
        }
    }
}

#[async_trait]
impl Resource for K8ConfigMapResource {
    type State<'a> = K8ConfigMapState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(K8ConfigMapState::schema())
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
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = self.refresh(diags, state).await?;
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state.clone();
        state.id = match (state.tenant_id.as_deref_option(), state.name.as_deref_option()) {
            (Some(tenant_id), Some(name)) => Value::Value(config_map_id(tenant_id, name).into()),
            _ => Value::Unknown,
        };
        state.metadata = Value::Unknown;

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state.clone();
        let mut trigger_replace = Vec::new();
        for (name, proposed, prior) in [
            ("tenant_id", &state.tenant_id, &prior_state.tenant_id),
            ("name", &state.name, &prior_state.name),
        ] {
            if proposed != prior {
                trigger_replace.push(AttributePath::new(name));
            }
        }

        if !trigger_replace.is_empty() {
            state.id = match (state.tenant_id.as_deref_option(), state.name.as_deref_option()) {
                (Some(tenant_id), Some(name)) => Value::Value(config_map_id(tenant_id, name).into()),
                _ => Value::Unknown,
            };
            state.metadata = Value::Unknown;
        } else if !data_equivalent(&state.data, &prior_state.data) {
            state.metadata = Value::Unknown;
        }

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let client = client.as_ref();
        let mut state = planned_state.clone();
        let tenant_id = state.tenant_id.as_str().to_owned();
        let name = state.name.as_str().to_owned();
        let id = config_map_id(&tenant_id, &name);
        let timeout = create_timeout(&state.timeouts, TIMEOUTS);
        debug!(%tenant_id, %name, "creating configmap");

        let rq = Self::request(diags, &state)?;
        let created = with_timeout(timeout, async {
            client.k8s_config_map_create(&tenant_id, &rq).await?;
            wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.k8s_config_map_get(&tenant_id, &name)
            })
            .await
        })
        .await;
        let config_map = match created {
            Ok(config_map) => config_map,
            Err(err) => {
                diags.root_error(
                    format!("Error creating tenant {tenant_id} configmap '{name}'"),
                    err,
                );
                return None;
            }
        };

        state.id = Value::Value(id.into());
        if let Err(err) = flatten(&mut state, &config_map) {
            diags.root_error(format!("Invalid configmap '{name}'"), err.to_string());
            return None;
        }

        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let mut state = planned_state.clone();
        if data_equivalent(&state.data, &prior_state.data) {
            state.metadata = prior_state.metadata;
            return Some((state, planned_private_state));
        }

        let tenant_id = state.tenant_id.as_str().to_owned();
        let name = state.name.as_str().to_owned();
        debug!(%tenant_id, %name, "updating configmap");

        let rq = Self::request(diags, &state)?;
        if let Err(err) = with_timeout(
            update_timeout(&state.timeouts, TIMEOUTS),
            client.k8s_config_map_update(&tenant_id, &rq),
        )
        .await
        {
            diags.root_error(
                format!("Error updating tenant {tenant_id} configmap '{name}'"),
                err,
            );
            return None;
        }

        let planned_data = state.data.clone();
        state.id = Value::Value(config_map_id(&tenant_id, &name).into());
        let mut state = self.refresh(diags, state).await?;
        state.data = planned_data;

        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags).await?;
        let client = client.as_ref();
        let id = state.id.as_str();
        let Some((tenant_id, name)) = parse_id(id) else {
            invalid_id(diags, "duplocloud_k8_config_map", id, "v2/subscriptions/{tenant_id}/K8ConfigMapApiV2/{name}");
            return None;
        };
        let timeout = delete_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, name, "deleting configmap");

        let deleted = with_timeout(timeout, async {
            match client.k8s_config_map_get(tenant_id, name).await {
                Ok(Some(_)) => (),
                Ok(None) => return Ok(()),
                Err(err) if err.is_not_found() => return Ok(()),
                Err(err) => return Err(WaitError::from(err)),
            }
            client.k8s_config_map_delete(tenant_id, name).await?;
            wait_for_resource_to_be_missing_after_delete(KIND, id, timeout, || {
                client.k8s_config_map_get(tenant_id, name)
            })
            .await
        })
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                format!("Error deleting tenant {tenant_id} configmap '{name}'"),
                err,
            );
            return None;
        }

        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = K8ConfigMapState {
            id: Value::Value(id.into()),
            ..Default::default()
        };
        let state = self.refresh(diags, state).await?;
        Some((state, Default::default()))
    }
}

/// Whether both values hold the same JSON value
fn data_equivalent(new: &ValueString, old: &ValueString) -> bool {
    match (new.as_deref_option(), old.as_deref_option()) {
        (Some(new), Some(old)) => suppress_equivalent_json(old, new),
        _ => new == old,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::duplosdk::tests::test_client;

    use super::*;

    const TENANT: &str = "6f8e3e4c-0000-4000-8000-000000000001";

    fn resource(mock_server: &MockServer) -> K8ConfigMapResource {
        K8ConfigMapResource::new(ClientHandle::configured(test_client(mock_server)))
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(
            parse_id(&format!("v2/subscriptions/{TENANT}/K8ConfigMapApiV2/app")),
            Some((TENANT, "app"))
        );
        assert_eq!(parse_id(&format!("{TENANT}/app")), None);
        assert_eq!(parse_id("v2/subscriptions/t1/Other/app"), None);
    }

    #[tokio::test]
    async fn test_validate() {
        let config = K8ConfigMapState {
            tenant_id: Value::Value("not-a-uuid".into()),
            name: Value::Value("Invalid_Name".into()),
            data: Value::Value("[1, 2]".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(K8ConfigMapResource::default()
            .validate(&mut diags, config)
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 3);
    }

    #[tokio::test]
    async fn test_create_waits_for_config_map() {
        let mock_server = MockServer::start().await;
        let api = format!("/v2/subscriptions/{TENANT}/K8ConfigMapApiV2");
        Mock::given(method("POST"))
            .and(path(api.clone()))
            .and(body_json(json!({
                "metadata": {"name": "app"},
                "data": {"LOG_LEVEL": "debug"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{api}/app")))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{api}/app")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": {"name": "app", "namespace": "duploservices-dev"},
                "data": {"LOG_LEVEL": "debug"}
            })))
            .mount(&mock_server)
            .await;

        let planned = K8ConfigMapState {
            tenant_id: Value::Value(TENANT.into()),
            name: Value::Value("app".into()),
            data: Value::Value("{ \"LOG_LEVEL\" : \"debug\" }".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let resource = resource(&mock_server);
        let (planned, _) = resource
            .plan_create(&mut diags, planned.clone(), planned, Default::default())
            .await
            .unwrap();
        assert!(planned.metadata.is_unknown());

        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
        assert_eq!(
            state.id.as_str(),
            format!("v2/subscriptions/{TENANT}/K8ConfigMapApiV2/app")
        );
        assert_eq!(state.data.as_str(), "{ \"LOG_LEVEL\" : \"debug\" }");
        assert_eq!(
            state.metadata.as_str(),
            r#"{"name":"app","namespace":"duploservices-dev"}"#
        );
    }

    #[tokio::test]
    async fn test_equivalent_data_skips_update() {
        let prior = K8ConfigMapState {
            id: Value::Value(format!("v2/subscriptions/{TENANT}/K8ConfigMapApiV2/app").into()),
            tenant_id: Value::Value(TENANT.into()),
            name: Value::Value("app".into()),
            data: Value::Value(r#"{"a":"1","b":"2"}"#.into()),
            metadata: Value::Value(r#"{"name":"app"}"#.into()),
            ..Default::default()
        };
        let proposed = K8ConfigMapState {
            data: Value::Value(r#"{"b": "2", "a": "1"}"#.into()),
            ..prior.clone()
        };

        let mut diags = Diagnostics::default();
        let (planned, _, replace) = K8ConfigMapResource::default()
            .plan_update(
                &mut diags,
                prior.clone(),
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(replace.is_empty());
        assert_eq!(planned.metadata, prior.metadata);

        // Nothing is mounted, any request would fail
        let mock_server = MockServer::start().await;
        let (state, _) = resource(&mock_server)
            .update(
                &mut diags,
                prior,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(state.data.as_str(), r#"{"b": "2", "a": "1"}"#);
    }

    #[tokio::test]
    async fn test_delete_missing_config_map() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/subscriptions/{TENANT}/K8ConfigMapApiV2/app")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let state = K8ConfigMapState {
            id: Value::Value(format!("v2/subscriptions/{TENANT}/K8ConfigMapApiV2/app").into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(resource(&mock_server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .is_some());
        assert!(diags.errors.is_empty());
    }
}
