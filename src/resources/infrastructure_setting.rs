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
use tf_provider::value::{self, Value, ValueBool, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::{debug, trace};

use crate::config::ClientHandle;
use crate::tags::{
    declared_keys, expand_key_values, expand_string_list, flatten_key_values, key_value_block,
    key_value_list_type, KeyValueList,
};
use crate::timeouts::{
    create_timeout, delete_timeout, timeouts_block, update_timeout, DefaultTimeouts, TimeoutsState,
};
use crate::utils::{WithNormalize, WithSchema, WithValidate};

use super::settings::{apply_settings, read_settings, remove_settings, InfrastructureSettingApi};
use super::with_timeout;

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(2, 2, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InfrastructureSettingState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub infra_name: ValueString<'a>,
    pub setting: KeyValueList<'a>,
    pub delete_unspecified_settings: ValueBool,
    pub custom_data: KeyValueList<'a>,
    pub specified_settings: ValueList<ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for InfrastructureSettingState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the infrastructure"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "infra_name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The name of the infrastructure to configure"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "delete_unspecified_settings" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::markdown(
                            "Whether or not this resource should delete any settings not specified by this resource. **WARNING:** It is not recommended to change the default value of `false`",
                        ),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "custom_data" => Attribute {
                        attr_type: key_value_list_type(),
                        description: Description::plain(
                            "A complete list of configuration settings for this infrastructure, even ones not being managed by this resource",
                        ),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "specified_settings" => Attribute {
                        attr_type: AttributeType::List(AttributeType::String.into()),
                        description: Description::plain(
                            "A list of configuration setting keys being managed by this resource",
                        ),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "setting" => key_value_block(
                        "A list of configuration settings to manage, expressed as key / value pairs",
                    ),
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_infrastructure_setting` manages an infrastructure's configuration in Duplo. Infrastructure settings are initially populated by Duplo when an infrastructure is created. This resource allows you to take control of individual configuration settings for a specific infrastructure.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithNormalize for InfrastructureSettingState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.delete_unspecified_settings.is_null() {
            self.delete_unspecified_settings = Value::Value(false);
        }
        if self.setting.is_null() {
            self.setting = Value::Value(Vec::new());
        }
    }
}

impl<'a> WithValidate for InfrastructureSettingState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        if let Some(infra_name) = self.infra_name.as_deref_option() {
            if infra_name.is_empty() {
                diags.error_short("`infra_name` must not be empty", AttributePath::new("infra_name"));
            }
        }
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

#[derive(Debug, Default, Clone)]
pub struct InfrastructureSettingResource {
    client: ClientHandle,
}

impl InfrastructureSettingResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    /// Refresh the computed attributes, `None` if the infrastructure is gone
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: InfrastructureSettingState<'a>,
    ) -> Option<InfrastructureSettingState<'a>> {
        let client = self.client.get(diags).await?;
        let infra_name = state.id.as_str().to_owned();
        let specified = state
            .specified_settings
            .is_value()
            .then(|| expand_string_list(&state.specified_settings));

        let read =
            read_settings::<InfrastructureSettingApi>(&client, &infra_name, specified.as_deref()).await;
        match read {
            Ok(Some(read)) => {
                trace!(%infra_name, all = ?read.all, "infrastructure settings read");
                state.infra_name = Value::Value(infra_name.into());
                state.custom_data = flatten_key_values(&read.all);
                if specified.is_some() {
                    state.setting = flatten_key_values(&read.managed);
                }
                Some(state)
            }
            Ok(None) => None,
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve infrastructure settings for '{infra_name}'"),
                    err.to_string(),
                );
                None
            }
        }
    }
}

#[async_trait]
impl Resource for InfrastructureSettingResource {
    type State<'a> = InfrastructureSettingState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InfrastructureSettingState::schema())
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
        let mut state = state;
        state.normalize(diags);
        let state = self.refresh(diags, state).await?;
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state.clone();
        state.normalize(diags);
        state.id = state.infra_name.clone();
        state.custom_data = Value::Unknown;
        state.specified_settings = declared_keys(&state.setting);

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state.clone();
        state.normalize(diags);
        state.specified_settings = declared_keys(&state.setting);

        let mut trigger_replace = Vec::new();
        if state.infra_name != prior_state.infra_name {
            trigger_replace.push(AttributePath::new("infra_name"));
            state.id = state.infra_name.clone();
        }
        if state.setting != prior_state.setting
            || state.delete_unspecified_settings != prior_state.delete_unspecified_settings
            || !trigger_replace.is_empty()
        {
            state.custom_data = Value::Unknown;
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
        let mut state = planned_state.clone();
        let infra_name = state.infra_name.as_str().to_owned();
        debug!(%infra_name, "creating infrastructure settings");

        let desired = expand_key_values(&state.setting).unwrap_or_default();
        let delete_unspecified = state.delete_unspecified_settings.unwrap_or_default();
        if let Err(err) = with_timeout(
            create_timeout(&state.timeouts, TIMEOUTS),
            apply_settings::<InfrastructureSettingApi>(&client, &infra_name, &[], desired, delete_unspecified),
        )
        .await
        {
            diags.root_error(format!("Error updating infrastructure settings for '{infra_name}'"), err);
            return None;
        }

        state.id = Value::Value(infra_name.clone().into());
        let planned_setting = state.setting.clone();
        let Some(mut state) = self.refresh(diags, state).await else {
            if diags.errors.is_empty() {
                diags.root_error_short(format!("Infrastructure '{infra_name}' disappeared after its configuration"));
            }
            return None;
        };
        state.setting = planned_setting;

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
        let state = planned_state.clone();
        let infra_name = state.id.as_str().to_owned();
        debug!(%infra_name, "updating infrastructure settings");

        let previously_specified = expand_string_list(&prior_state.specified_settings);
        let desired = expand_key_values(&state.setting).unwrap_or_default();
        let delete_unspecified = state.delete_unspecified_settings.unwrap_or_default();
        if let Err(err) = with_timeout(
            update_timeout(&state.timeouts, TIMEOUTS),
            apply_settings::<InfrastructureSettingApi>(
                &client,
                &infra_name,
                &previously_specified,
                desired,
                delete_unspecified,
            ),
        )
        .await
        {
            diags.root_error(format!("Error updating infrastructure settings for '{infra_name}'"), err);
            return None;
        }

        let planned_setting = state.setting.clone();
        let mut state = self.refresh(diags, state).await?;
        state.setting = planned_setting;

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
        let infra_name = state.id.as_str();
        debug!(infra_name, "deleting infrastructure settings");

        let specified = expand_string_list(&state.specified_settings);
        let delete_unspecified = state.delete_unspecified_settings.unwrap_or_default();
        if let Err(err) = with_timeout(
            delete_timeout(&state.timeouts, TIMEOUTS),
            remove_settings::<InfrastructureSettingApi>(&client, infra_name, &specified, delete_unspecified),
        )
        .await
        {
            diags.root_error(format!("Error deleting infrastructure settings for '{infra_name}'"), err);
            return None;
        }

        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = InfrastructureSettingState {
            id: Value::Value(id.clone().into()),
            infra_name: Value::Value(id.into()),
            ..Default::default()
        };
        state.normalize(diags);
        let state = self.refresh(diags, state).await?;
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::duplosdk::tests::test_client;
    use crate::duplosdk::DuploKeyStringValue;

    use super::*;

    #[tokio::test]
    async fn test_update_changes_only_managed_keys() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/adminproxy/GetInfrastructureConfig/default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Name": "default",
                "CustomData": [
                    {"Key": "EnableAwsAlbIngress", "Value": "false"},
                    {"Key": "EksControlplaneLogs", "Value": "api"}
                ]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/adminproxy/UpdateInfrastructureConfigCustomData"))
            .and(body_json(json!({
                "ComponentId": "default", "Key": "EnableAwsAlbIngress", "Value": "true"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resource =
            InfrastructureSettingResource::new(ClientHandle::configured(test_client(&mock_server)));
        let specified = Value::Value(vec![Value::Value("EnableAwsAlbIngress".into())]);
        let prior = InfrastructureSettingState {
            id: Value::Value("default".into()),
            infra_name: Value::Value("default".into()),
            setting: flatten_key_values(&[DuploKeyStringValue::new("EnableAwsAlbIngress", "false")]),
            delete_unspecified_settings: Value::Value(false),
            specified_settings: specified.clone(),
            ..Default::default()
        };
        let planned = InfrastructureSettingState {
            setting: flatten_key_values(&[DuploKeyStringValue::new("EnableAwsAlbIngress", "true")]),
            custom_data: Value::Unknown,
            ..prior.clone()
        };

        let mut diags = Diagnostics::default();
        let (state, _) = resource
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
        assert_eq!(state.specified_settings, specified);
        assert_eq!(expand_key_values(&state.custom_data).unwrap().len(), 2);
    }

    async fn mount_custom_data(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/adminproxy/GetInfrastructureConfig/default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Name": "default",
                "CustomData": [
                    {"Key": "EnableAwsAlbIngress", "Value": "false"},
                    {"Key": "EksControlplaneLogs", "Value": "api"}
                ]
            })))
            .mount(mock_server)
            .await;
    }

    async fn expect_update(mock_server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/adminproxy/UpdateInfrastructureConfigCustomData"))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_update_deletes_unspecified_settings() {
        let mock_server = MockServer::start().await;
        mount_custom_data(&mock_server).await;
        expect_update(
            &mock_server,
            json!({"ComponentId": "default", "Key": "EksControlplaneLogs", "Value": "", "State": "delete"}),
        )
        .await;
        expect_update(
            &mock_server,
            json!({"ComponentId": "default", "Key": "EnableAwsAlbIngress", "Value": "true"}),
        )
        .await;

        let resource =
            InfrastructureSettingResource::new(ClientHandle::configured(test_client(&mock_server)));
        let prior = InfrastructureSettingState {
            id: Value::Value("default".into()),
            infra_name: Value::Value("default".into()),
            setting: flatten_key_values(&[DuploKeyStringValue::new("EnableAwsAlbIngress", "false")]),
            delete_unspecified_settings: Value::Value(false),
            specified_settings: Value::Value(vec![Value::Value("EnableAwsAlbIngress".into())]),
            ..Default::default()
        };
        let planned = InfrastructureSettingState {
            setting: flatten_key_values(&[DuploKeyStringValue::new("EnableAwsAlbIngress", "true")]),
            delete_unspecified_settings: Value::Value(true),
            custom_data: Value::Unknown,
            ..prior.clone()
        };

        let mut diags = Diagnostics::default();
        resource
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
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
    }

    #[tokio::test]
    async fn test_destroy_deletes_every_setting() {
        let mock_server = MockServer::start().await;
        mount_custom_data(&mock_server).await;
        for key in ["EnableAwsAlbIngress", "EksControlplaneLogs"] {
            expect_update(
                &mock_server,
                json!({"ComponentId": "default", "Key": key, "Value": "", "State": "delete"}),
            )
            .await;
        }

        let resource =
            InfrastructureSettingResource::new(ClientHandle::configured(test_client(&mock_server)));
        let state = InfrastructureSettingState {
            id: Value::Value("default".into()),
            infra_name: Value::Value("default".into()),
            delete_unspecified_settings: Value::Value(true),
            specified_settings: Value::Value(vec![Value::Value("EnableAwsAlbIngress".into())]),
            ..Default::default()
        };

        let mut diags = Diagnostics::default();
        resource
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
    }

    #[tokio::test]
    async fn test_plan_update_replaces_on_new_infrastructure() {
        let prior = InfrastructureSettingState {
            id: Value::Value("default".into()),
            infra_name: Value::Value("default".into()),
            ..Default::default()
        };
        let proposed = InfrastructureSettingState {
            infra_name: Value::Value("other".into()),
            ..prior.clone()
        };
        let mut diags = Diagnostics::default();
        let (state, _, replace) = InfrastructureSettingResource::default()
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace, vec![AttributePath::new("infra_name")]);
        assert_eq!(state.id.as_str(), "other");
        assert!(state.custom_data.is_unknown());
    }
}
