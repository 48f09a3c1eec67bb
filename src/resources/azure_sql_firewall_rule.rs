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
use tf_provider::value::{self, Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::debug;

use crate::config::ClientHandle;
use crate::duplosdk::azure_sql::AzureSqlServerFirewallRule;
use crate::timeouts::{create_timeout, delete_timeout, timeouts_block, DefaultTimeouts, TimeoutsState};
use crate::utils::{check_string, invalid_id, validate_uuid, WithSchema, WithValidate};
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create,
};

use super::azure_sql_virtual_network_rule::{parse_rule_id, rule_id};

const KIND: &str = "azure sql firewall rule";
const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(60, 60, 15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AzureSqlFirewallRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub server_name: ValueString<'a>,
    pub start_ip_address: ValueString<'a>,
    pub end_ip_address: ValueString<'a>,
    pub azure_id: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for AzureSqlFirewallRuleState<'a> {
    fn schema() -> Schema {
        let required_string = |description: &'static str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        };
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
                    "tenant_id" => required_string("The GUID of the tenant that the sql firewall rule will be created in"),
                    "name" => required_string("The name of the firewall rule"),
                    "server_name" => required_string("The name of the SQL Server on which to create the Firewall Rule"),
                    "start_ip_address" => required_string("The starting IP address to allow through the firewall for this rule"),
                    "end_ip_address" => required_string("The ending IP address to allow through the firewall for this rule"),
                    "azure_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The ID of the SQL firewall rule"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_azure_sql_firewall_rule` allows you to manage an Azure SQL Firewall Rule.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithValidate for AzureSqlFirewallRuleState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

fn flatten_rule(state: &mut AzureSqlFirewallRuleState, rule: &AzureSqlServerFirewallRule) {
    state.name = Value::Value(rule.name.clone().into());
    state.start_ip_address = Value::Value(rule.start_ip_address.clone().into());
    state.end_ip_address = Value::Value(rule.end_ip_address.clone().into());
    state.azure_id = Value::Value(rule.id.clone().into());
}

#[derive(Debug, Default, Clone)]
pub struct AzureSqlFirewallRuleResource {
    client: ClientHandle,
}

impl AzureSqlFirewallRuleResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: AzureSqlFirewallRuleState<'a>,
    ) -> Option<AzureSqlFirewallRuleState<'a>> {
        let client = self.client.get(diags).await?;
        let id = state.id.as_str().to_owned();
        let Some((tenant_id, server_name, name)) = parse_rule_id(&id) else {
            invalid_id(diags, "duplocloud_azure_sql_firewall_rule", &id, "{tenant_id}/{server_name}/{name}");
            return None;
        };

        let rule = match client
            .azure_sql_server_firewall_rule_get(tenant_id, server_name, name)
            .await
        {
            Ok(Some(rule)) => rule,
            Ok(None) => return None,
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve tenant {tenant_id} azure sql firewall rule {server_name}, {name}"),
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
impl Resource for AzureSqlFirewallRuleResource {
    type State<'a> = AzureSqlFirewallRuleState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AzureSqlFirewallRuleState::schema())
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
        state.id = rule_id(&state.tenant_id, &state.server_name, &state.name);
        state.azure_id = Value::Unknown;

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
            ("server_name", &state.server_name, &prior_state.server_name),
            ("start_ip_address", &state.start_ip_address, &prior_state.start_ip_address),
            ("end_ip_address", &state.end_ip_address, &prior_state.end_ip_address),
        ] {
            if proposed != prior {
                trigger_replace.push(AttributePath::new(name));
            }
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
        debug!(%tenant_id, %server_name, %name, "creating sql firewall rule");

        let rq = AzureSqlServerFirewallRule {
            name: name.clone(),
            start_ip_address: state.start_ip_address.as_str().to_owned(),
            end_ip_address: state.end_ip_address.as_str().to_owned(),
            ..Default::default()
        };
        let created = async {
            client
                .azure_sql_server_firewall_rule_create(&tenant_id, &server_name, &rq)
                .await?;
            wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.azure_sql_server_firewall_rule_get(&tenant_id, &server_name, &name)
            })
            .await
        }
        .await;
        let rule = match created {
            Ok(rule) => rule,
            Err(err) => {
                diags.root_error(
                    format!("Error creating tenant {tenant_id} azure sql firewall rule '{server_name}', '{name}'"),
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
        // Every input forces a replacement, only the timeouts can change in place
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
            invalid_id(diags, "duplocloud_azure_sql_firewall_rule", id, "{tenant_id}/{server_name}/{name}");
            return None;
        };
        let timeout = delete_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, server_name, name, "deleting sql firewall rule");

        let deleted = async {
            match client
                .azure_sql_server_firewall_rule_delete(tenant_id, server_name, name)
                .await
            {
                Err(err) if err.is_not_found() => return Ok(()),
                result => result?,
            }
            wait_for_resource_to_be_missing_after_delete(KIND, id, timeout, || {
                client.azure_sql_server_firewall_rule_get(tenant_id, server_name, name)
            })
            .await
        }
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                format!("Unable to delete tenant {tenant_id} azure sql firewall rule '{server_name}', '{name}'"),
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
        let state = AzureSqlFirewallRuleState {
            id: Value::Value(id.into()),
            ..Default::default()
        };
        let state = self.refresh(diags, state).await?;
        Some((state, Default::default()))
    }
}
