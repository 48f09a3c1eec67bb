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
use crate::utils::{check_string, validate_uuid, WithNormalize, WithSchema, WithValidate};

use super::settings::{apply_settings, read_settings, remove_settings, TenantConfigApi};
use super::with_timeout;

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(2, 2, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TenantConfigState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub setting: KeyValueList<'a>,
    pub delete_unspecified_settings: ValueBool,
    pub metadata: KeyValueList<'a>,
    pub specified_settings: ValueList<ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for TenantConfigState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("GUID of the tenant"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant to configure"),
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
                    "metadata" => Attribute {
                        attr_type: key_value_list_type(),
                        description: Description::plain(
                            "A complete list of configuration settings for this tenant, even ones not being managed by this resource",
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
                    "`duplocloud_tenant_config` manages a tenant's configuration in Duplo. Tenant configuration is initially populated by Duplo when a tenant is created. This resource allows you to take control of individual configuration settings for a specific tenant.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithNormalize for TenantConfigState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.delete_unspecified_settings.is_null() {
            self.delete_unspecified_settings = Value::Value(false);
        }
        if self.setting.is_null() {
            self.setting = Value::Value(Vec::new());
        }
    }
}

impl<'a> WithValidate for TenantConfigState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(
            diags,
            &self.tenant_id,
            AttributePath::new("tenant_id"),
            validate_uuid,
        );
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

#[derive(Debug, Default, Clone)]
pub struct TenantConfigResource {
    client: ClientHandle,
}

impl TenantConfigResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    /// Refresh the computed attributes, `None` if the tenant is gone
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: TenantConfigState<'a>,
    ) -> Option<TenantConfigState<'a>> {
        let client = self.client.get(diags).await?;
        let tenant_id = state.id.as_str().to_owned();
        let specified = state
            .specified_settings
            .is_value()
            .then(|| expand_string_list(&state.specified_settings));

        let read = read_settings::<TenantConfigApi>(&client, &tenant_id, specified.as_deref()).await;
        match read {
            Ok(Some(read)) => {
                trace!(%tenant_id, all = ?read.all, "tenant config read");
                state.tenant_id = Value::Value(tenant_id.into());
                state.metadata = flatten_key_values(&read.all);
                if specified.is_some() {
                    state.setting = flatten_key_values(&read.managed);
                }
                Some(state)
            }
            Ok(None) => None,
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve tenant config for '{tenant_id}'"),
                    err.to_string(),
                );
                None
            }
        }
    }
}

#[async_trait]
impl Resource for TenantConfigResource {
    type State<'a> = TenantConfigState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(TenantConfigState::schema())
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
        state.id = state.tenant_id.clone();
        state.metadata = Value::Unknown;
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
        if state.tenant_id != prior_state.tenant_id {
            trigger_replace.push(AttributePath::new("tenant_id"));
            state.id = state.tenant_id.clone();
        }
        if state.setting != prior_state.setting
            || state.delete_unspecified_settings != prior_state.delete_unspecified_settings
            || !trigger_replace.is_empty()
        {
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
        let mut state = planned_state.clone();
        let tenant_id = state.tenant_id.as_str().to_owned();
        debug!(%tenant_id, "creating tenant config");

        let desired = expand_key_values(&state.setting).unwrap_or_default();
        let delete_unspecified = state.delete_unspecified_settings.unwrap_or_default();
        if let Err(err) = with_timeout(
            create_timeout(&state.timeouts, TIMEOUTS),
            apply_settings::<TenantConfigApi>(&client, &tenant_id, &[], desired, delete_unspecified),
        )
        .await
        {
            diags.root_error(format!("Error updating tenant config for '{tenant_id}'"), err);
            return None;
        }

        state.id = Value::Value(tenant_id.clone().into());
        let planned_setting = state.setting.clone();
        let Some(mut state) = self.refresh(diags, state).await else {
            if diags.errors.is_empty() {
                diags.root_error_short(format!("Tenant '{tenant_id}' disappeared after its configuration"));
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
        let tenant_id = state.id.as_str().to_owned();
        debug!(%tenant_id, "updating tenant config");

        let previously_specified = expand_string_list(&prior_state.specified_settings);
        let desired = expand_key_values(&state.setting).unwrap_or_default();
        let delete_unspecified = state.delete_unspecified_settings.unwrap_or_default();
        if let Err(err) = with_timeout(
            update_timeout(&state.timeouts, TIMEOUTS),
            apply_settings::<TenantConfigApi>(
                &client,
                &tenant_id,
                &previously_specified,
                desired,
                delete_unspecified,
            ),
        )
        .await
        {
            diags.root_error(format!("Error updating tenant config for '{tenant_id}'"), err);
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
        let tenant_id = state.id.as_str();
        debug!(tenant_id, "deleting tenant config");

        let specified = expand_string_list(&state.specified_settings);
        let delete_unspecified = state.delete_unspecified_settings.unwrap_or_default();
        if let Err(err) = with_timeout(
            delete_timeout(&state.timeouts, TIMEOUTS),
            remove_settings::<TenantConfigApi>(&client, tenant_id, &specified, delete_unspecified),
        )
        .await
        {
            diags.root_error(format!("Error deleting tenant config for '{tenant_id}'"), err);
            return None;
        }

        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = TenantConfigState {
            id: Value::Value(id.clone().into()),
            tenant_id: Value::Value(id.into()),
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

    const TENANT: &str = "6f8e3e4c-0000-4000-8000-000000000001";

    fn resource(mock_server: &MockServer) -> TenantConfigResource {
        TenantConfigResource::new(ClientHandle::configured(test_client(mock_server)))
    }

    #[tokio::test]
    async fn test_plan_records_specified_settings() {
        let mut diags = Diagnostics::default();
        let proposed = TenantConfigState {
            tenant_id: Value::Value(TENANT.into()),
            setting: flatten_key_values(&[DuploKeyStringValue::new("delete_protection", "true")]),
            ..Default::default()
        };
        let (state, _) = TenantConfigResource::default()
            .plan_create(&mut diags, proposed.clone(), proposed, ValueEmpty::default())
            .await
            .unwrap();
        assert_eq!(state.id.as_str(), TENANT);
        assert!(state.metadata.is_unknown());
        assert_eq!(state.delete_unspecified_settings, Value::Value(false));
        assert_eq!(
            expand_string_list(&state.specified_settings),
            vec!["delete_protection".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_validate_tenant_id() {
        let mut diags = Diagnostics::default();
        let config = TenantConfigState {
            tenant_id: Value::Value("tenant".into()),
            ..Default::default()
        };
        assert!(TenantConfigResource::default()
            .validate(&mut diags, config)
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_reports_managed_settings() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/admin/GetTenantConfigData/{TENANT}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Key": "external", "Value": "a"},
                {"Key": "delete_protection", "Value": "true"}
            ])))
            .mount(&mock_server)
            .await;

        let mut diags = Diagnostics::default();
        let state = TenantConfigState {
            id: Value::Value(TENANT.into()),
            specified_settings: Value::Value(vec![Value::Value("delete_protection".into())]),
            ..Default::default()
        };
        let (state, _) = resource(&mock_server)
            .read(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert_eq!(state.tenant_id.as_str(), TENANT);
        assert_eq!(expand_key_values(&state.metadata).unwrap().len(), 2);
        assert_eq!(
            expand_key_values(&state.setting),
            Some(vec![DuploKeyStringValue::new("delete_protection", "true")])
        );
    }

    async fn mount_config(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/admin/GetTenantConfigData/{TENANT}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Key": "external", "Value": "a"},
                {"Key": "delete_protection", "Value": "false"}
            ])))
            .mount(mock_server)
            .await;
    }

    async fn expect_update(mock_server: &MockServer, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/admin/UpdateTenantConfigData"))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_create_deletes_unspecified_settings() {
        let mock_server = MockServer::start().await;
        mount_config(&mock_server).await;
        expect_update(
            &mock_server,
            json!({"ComponentId": TENANT, "Key": "external", "Value": "", "State": "delete"}),
        )
        .await;
        expect_update(
            &mock_server,
            json!({"ComponentId": TENANT, "Key": "delete_protection", "Value": "true"}),
        )
        .await;

        let planned = TenantConfigState {
            id: Value::Value(TENANT.into()),
            tenant_id: Value::Value(TENANT.into()),
            setting: flatten_key_values(&[DuploKeyStringValue::new("delete_protection", "true")]),
            delete_unspecified_settings: Value::Value(true),
            metadata: Value::Unknown,
            specified_settings: Value::Value(vec![Value::Value("delete_protection".into())]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (state, _) = resource(&mock_server)
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
        assert_eq!(state.id.as_str(), TENANT);
        assert_eq!(
            expand_key_values(&state.setting),
            Some(vec![DuploKeyStringValue::new("delete_protection", "true")])
        );
    }

    #[tokio::test]
    async fn test_destroy_deletes_every_setting() {
        let mock_server = MockServer::start().await;
        mount_config(&mock_server).await;
        for key in ["external", "delete_protection"] {
            expect_update(
                &mock_server,
                json!({"ComponentId": TENANT, "Key": key, "Value": "", "State": "delete"}),
            )
            .await;
        }

        let state = TenantConfigState {
            id: Value::Value(TENANT.into()),
            tenant_id: Value::Value(TENANT.into()),
            delete_unspecified_settings: Value::Value(true),
            specified_settings: Value::Value(vec![Value::Value("delete_protection".into())]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        resource(&mock_server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
    }

    #[tokio::test]
    async fn test_destroy_keeps_unmanaged_settings() {
        let mock_server = MockServer::start().await;
        mount_config(&mock_server).await;
        expect_update(
            &mock_server,
            json!({"ComponentId": TENANT, "Key": "delete_protection", "Value": "", "State": "delete"}),
        )
        .await;

        let state = TenantConfigState {
            id: Value::Value(TENANT.into()),
            tenant_id: Value::Value(TENANT.into()),
            delete_unspecified_settings: Value::Value(false),
            specified_settings: Value::Value(vec![Value::Value("delete_protection".into())]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        resource(&mock_server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
    }

    #[tokio::test]
    async fn test_read_missing_tenant_removes_resource() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/admin/GetTenantConfigData/{TENANT}")))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        let mut diags = Diagnostics::default();
        let state = TenantConfigState {
            id: Value::Value(TENANT.into()),
            ..Default::default()
        };
        let read = resource(&mock_server)
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }
}
