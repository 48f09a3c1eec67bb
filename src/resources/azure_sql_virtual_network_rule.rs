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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::{debug, trace};

use crate::config::ClientHandle;
use crate::duplosdk::azure_sql::AzureSqlServerVnetRule;
use crate::duplosdk::{Client, ClientResult};
use crate::timeouts::{create_timeout, delete_timeout, timeouts_block, DefaultTimeouts, TimeoutsState};
use crate::utils::{
    check_string, invalid_id, split_id, validate_uuid, WithNormalize, WithSchema, WithValidate,
};
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create,
    StateChangeConf, WaitError,
};

const KIND: &str = "azure sql virtual network rule";
const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(60, 60, 15);
const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AzureSqlVirtualNetworkRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub server_name: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub ignore_missing_vnet_service_endpoint: ValueBool,
    pub wait_until_ready: ValueBool,
    pub azure_id: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for AzureSqlVirtualNetworkRuleState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Id of the rule, as `{tenant_id}/{server_name}/{name}`"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant that the sql virtual network rule will be created in"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The name of the SQL virtual network rule"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "server_name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The name of the SQL Server to which this SQL virtual network rule will be applied to"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "subnet_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The ID of the subnet that the SQL server will be connected to"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "ignore_missing_vnet_service_endpoint" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain(
                            "Create the virtual network rule before the subnet has the virtual network service endpoint enabled",
                        ),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "wait_until_ready" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Whether or not to wait until the rule is ready after its creation, true by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "azure_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The ID of the SQL virtual network rule"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_azure_sql_virtual_network_rule` allows you to add, update, or remove an Azure SQL server to a subnet of a virtual network.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithNormalize for AzureSqlVirtualNetworkRuleState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.wait_until_ready.is_null() {
            self.wait_until_ready = Value::Value(true);
        }
    }
}

impl<'a> WithValidate for AzureSqlVirtualNetworkRuleState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

/// Parse `{tenant_id}/{server_name}/{name}`
pub(crate) fn parse_rule_id(id: &str) -> Option<(&str, &str, &str)> {
    match split_id(id, 3)?.as_slice() {
        [tenant_id, server_name, name] => Some((tenant_id, server_name, name)),
        _ => None,
    }
}

pub(crate) fn rule_id(tenant_id: &ValueString, server_name: &ValueString, name: &ValueString) -> ValueString<'static> {
    match (
        tenant_id.as_deref_option(),
        server_name.as_deref_option(),
        name.as_deref_option(),
    ) {
        (Some(tenant_id), Some(server_name), Some(name)) => {
            Value::Value(format!("{tenant_id}/{server_name}/{name}").into())
        }
        _ => Value::Unknown,
    }
}

fn flatten_rule(state: &mut AzureSqlVirtualNetworkRuleState, rule: &AzureSqlServerVnetRule) {
    state.name = Value::Value(rule.name.clone().into());
    state.subnet_id = Value::Value(rule.virtual_network_subnet_id.clone().into());
    state.ignore_missing_vnet_service_endpoint = Value::Value(rule.ignore_missing_vnet_service_endpoint);
    state.azure_id = Value::Value(rule.id.clone().into());
}

/// Wait until the provisioning of the rule is over, successful or not
async fn rule_until_ready(
    client: &Client,
    tenant_id: &str,
    server_name: &str,
    name: &str,
    timeout: Duration,
) -> Result<AzureSqlServerVnetRule, WaitError> {
    debug!(tenant_id, server_name, name, "waiting for sql virtual network rule");
    StateChangeConf::new(["pending"], ["ready"], timeout)
        .with_poll_interval(POLL_INTERVAL)
        .wait_for_state(move || async move {
            let rule = client
                .azure_sql_server_vnet_rule_get(tenant_id, server_name, name)
                .await?;
            let ready = rule.as_ref().is_some_and(|rule| {
                trace!(state = %rule.state, "sql virtual network rule provisioning state");
                rule.state == "Ready" || rule.state == "Failed"
            });
            ClientResult::Ok((rule, if ready { "ready" } else { "pending" }.to_owned()))
        })
        .await
}

#[derive(Debug, Default, Clone)]
pub struct AzureSqlVirtualNetworkRuleResource {
    client: ClientHandle,
}

impl AzureSqlVirtualNetworkRuleResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: AzureSqlVirtualNetworkRuleState<'a>,
    ) -> Option<AzureSqlVirtualNetworkRuleState<'a>> {
        let client = self.client.get(diags).await?;
        let id = state.id.as_str().to_owned();
        let Some((tenant_id, server_name, name)) = parse_rule_id(&id) else {
            invalid_id(diags, "duplocloud_azure_sql_virtual_network_rule", &id, "{tenant_id}/{server_name}/{name}");
            return None;
        };

        let rule = match client.azure_sql_server_vnet_rule_get(tenant_id, server_name, name).await {
            Ok(Some(rule)) => rule,
            Ok(None) => return None,
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve tenant {tenant_id} azure sql virtual network rule {server_name}, {name}"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.tenant_id = Value::Value(tenant_id.to_owned().into());
        state.server_name = Value::Value(server_name.to_owned().into());
        flatten_rule(&mut state, &rule);
        Some(state)
    }
}

#[async_trait]
impl Resource for AzureSqlVirtualNetworkRuleResource {
    type State<'a> = AzureSqlVirtualNetworkRuleState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AzureSqlVirtualNetworkRuleState::schema())
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
        state.id = rule_id(&state.tenant_id, &state.server_name, &state.name);
        state.azure_id = Value::Unknown;
        if state.ignore_missing_vnet_service_endpoint.is_null() {
            state.ignore_missing_vnet_service_endpoint = Value::Unknown;
        }

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

        let mut trigger_replace = Vec::new();
        for (name, proposed, prior) in [
            ("tenant_id", &state.tenant_id, &prior_state.tenant_id),
            ("name", &state.name, &prior_state.name),
            ("server_name", &state.server_name, &prior_state.server_name),
            ("subnet_id", &state.subnet_id, &prior_state.subnet_id),
        ] {
            if proposed != prior {
                trigger_replace.push(AttributePath::new(name));
            }
        }
        if state.ignore_missing_vnet_service_endpoint != prior_state.ignore_missing_vnet_service_endpoint {
            trigger_replace.push(AttributePath::new("ignore_missing_vnet_service_endpoint"));
        }
        if !trigger_replace.is_empty() {
            state.id = rule_id(&state.tenant_id, &state.server_name, &state.name);
            state.azure_id = Value::Unknown;
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
        let server_name = state.server_name.as_str().to_owned();
        let name = state.name.as_str().to_owned();
        let id = format!("{tenant_id}/{server_name}/{name}");
        let timeout = create_timeout(&state.timeouts, TIMEOUTS);
        debug!(%tenant_id, %server_name, %name, "creating sql virtual network rule");

        let rq = AzureSqlServerVnetRule {
            name: name.clone(),
            virtual_network_subnet_id: state.subnet_id.as_str().to_owned(),
            ignore_missing_vnet_service_endpoint: state
                .ignore_missing_vnet_service_endpoint
                .as_ref_option()
                .copied()
                .unwrap_or_default(),
            ..Default::default()
        };
        let created = async {
            client
                .azure_sql_server_vnet_rule_create(&tenant_id, &server_name, &rq)
                .await?;
            let rule = wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.azure_sql_server_vnet_rule_get(&tenant_id, &server_name, &name)
            })
            .await?;
            if state.wait_until_ready.unwrap_or(true) {
                return rule_until_ready(client, &tenant_id, &server_name, &name, timeout).await;
            }
            Ok::<_, WaitError>(rule)
        }
        .await;
        let rule = match created {
            Ok(rule) => rule,
            Err(err) => {
                diags.root_error(
                    format!("Error creating tenant {tenant_id} azure sql virtual network rule '{server_name}', '{name}'"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.id = Value::Value(id.into());
        flatten_rule(&mut state, &rule);
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        // Only `wait_until_ready` can change in place
        Some((planned_state, planned_private_state))
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
        let Some((tenant_id, server_name, name)) = parse_rule_id(id) else {
            invalid_id(diags, "duplocloud_azure_sql_virtual_network_rule", id, "{tenant_id}/{server_name}/{name}");
            return None;
        };
        let timeout = delete_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, server_name, name, "deleting sql virtual network rule");

        let deleted = async {
            match client
                .azure_sql_server_vnet_rule_delete(tenant_id, server_name, name)
                .await
            {
                Err(err) if err.is_not_found() => return Ok(()),
                result => result?,
            }
            wait_for_resource_to_be_missing_after_delete(KIND, id, timeout, || {
                client.azure_sql_server_vnet_rule_get(tenant_id, server_name, name)
            })
            .await
        }
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                format!("Unable to delete tenant {tenant_id} azure sql virtual network rule '{server_name}', '{name}'"),
                err.to_string(),
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
        let mut state = AzureSqlVirtualNetworkRuleState {
            id: Value::Value(id.into()),
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::duplosdk::tests::test_client;

    use super::*;

    const TENANT: &str = "6f8e3e4c-0000-4000-8000-000000000001";

    #[test]
    fn test_parse_rule_id() {
        assert_eq!(
            parse_rule_id(&format!("{TENANT}/sqlserver/rule")),
            Some((TENANT, "sqlserver", "rule"))
        );
        assert_eq!(parse_rule_id(&format!("{TENANT}/sqlserver")), None);
        assert_eq!(parse_rule_id(&format!("{TENANT}//rule")), None);
    }

    #[tokio::test]
    async fn test_create_waits_until_ready() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/subscriptions/{TENANT}/AddSqlServerVirtualNetworkRule/sqlserver")))
            .and(body_partial_json(json!({
                "name": "rule",
                "properties.virtualNetworkSubnetId": "/subscriptions/s/subnets/default",
                "properties.ignoreMissingVnetServiceEndpoint": false
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{TENANT}/GetSqlServerVirtualNetworkRules/sqlserver")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "name": "rule",
                "id": "/subscriptions/s/servers/sqlserver/virtualNetworkRules/rule",
                "properties.virtualNetworkSubnetId": "/subscriptions/s/subnets/default",
                "properties.ignoreMissingVnetServiceEndpoint": false,
                "properties.state": "Ready"
            }])))
            .mount(&mock_server)
            .await;

        let resource =
            AzureSqlVirtualNetworkRuleResource::new(ClientHandle::configured(test_client(&mock_server)));
        let proposed = AzureSqlVirtualNetworkRuleState {
            tenant_id: Value::Value(TENANT.into()),
            name: Value::Value("rule".into()),
            server_name: Value::Value("sqlserver".into()),
            subnet_id: Value::Value("/subscriptions/s/subnets/default".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(&mut diags, proposed.clone(), proposed, Default::default())
            .await
            .unwrap();
        assert_eq!(planned.wait_until_ready, Value::Value(true));
        assert!(planned.ignore_missing_vnet_service_endpoint.is_unknown());

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
        assert_eq!(state.id.as_str(), format!("{TENANT}/sqlserver/rule"));
        assert_eq!(
            state.azure_id.as_str(),
            "/subscriptions/s/servers/sqlserver/virtualNetworkRules/rule"
        );
        assert_eq!(state.ignore_missing_vnet_service_endpoint, Value::Value(false));
    }

    #[tokio::test]
    async fn test_read_missing_rule() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/subscriptions/{TENANT}/GetSqlServerVirtualNetworkRules/sqlserver")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let resource =
            AzureSqlVirtualNetworkRuleResource::new(ClientHandle::configured(test_client(&mock_server)));
        let state = AzureSqlVirtualNetworkRuleState {
            id: Value::Value(format!("{TENANT}/sqlserver/rule").into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await
            .is_none());
        assert!(diags.errors.is_empty());
    }
}
