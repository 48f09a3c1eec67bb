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

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};
use tracing::debug;

use crate::config::ClientHandle;
use crate::duplosdk::tenant::DuploTenant;
use crate::tags::{flatten_key_values, key_value_list_type, KeyValueList};
use crate::utils::{WithSchema, WithValidate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TenantPolicyState {
    pub allow_volume_mapping: ValueBool,
    pub block_external_ep: ValueBool,
}

/// Tenant visible to the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TenantState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub plan_id: ValueString<'a>,
    pub infra_owner: ValueString<'a>,
    pub policy: ValueList<Value<TenantPolicyState>>,
    pub tags: KeyValueList<'a>,
}

fn policy_type() -> AttributeType {
    AttributeType::List(
        AttributeType::Object(map! {
            "allow_volume_mapping" => AttributeType::Bool,
            "block_external_ep" => AttributeType::Bool,
        })
        .into(),
    )
}

fn tenant_type() -> AttributeType {
    AttributeType::Object(map! {
        "id" => AttributeType::String,
        "name" => AttributeType::String,
        "plan_id" => AttributeType::String,
        "infra_owner" => AttributeType::String,
        "policy" => policy_type(),
        "tags" => key_value_list_type(),
    })
}

fn computed(attr_type: AttributeType, description: &'static str) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    }
}

fn tenant_attributes() -> HashMap<String, Attribute> {
    map! {
        "id" => Attribute {
            attr_type: AttributeType::String,
            description: Description::markdown("The GUID of the tenant. Exactly one of `id` and `name` must be set"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "name" => Attribute {
            attr_type: AttributeType::String,
            description: Description::markdown("The name of the tenant. Exactly one of `id` and `name` must be set"),
            constraint: AttributeConstraint::OptionalComputed,
            ..Default::default()
        },
        "plan_id" => computed(AttributeType::String, "The plan, or infrastructure, of the tenant"),
        "infra_owner" => computed(AttributeType::String, "The owner of the infrastructure of the tenant"),
        "policy" => computed(policy_type(), "The policy of the tenant"),
        "tags" => computed(key_value_list_type(), "The tags of the tenant"),
    }
}

impl<'a> WithSchema for TenantState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: tenant_attributes(),
                description: Description::markdown("`duplocloud_tenant` retrieves a tenant in Duplo."),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for TenantState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        // Unknown values still count as set
        if self.id.is_null() == self.name.is_null() {
            diags.root_error_short("Exactly one of `id` and `name` must be set");
        }
    }
}

fn flatten_tenant<'a>(tenant: &DuploTenant) -> TenantState<'a> {
    let policy = match &tenant.tenant_policy {
        Some(policy) => Value::Value(vec![Value::Value(TenantPolicyState {
            allow_volume_mapping: Value::Value(policy.allow_volume_mapping),
            block_external_ep: Value::Value(policy.block_external_ep),
        })]),
        None => Value::Value(Vec::new()),
    };
    TenantState {
        id: Value::Value(tenant.tenant_id.clone().into()),
        name: Value::Value(tenant.account_name.clone().into()),
        plan_id: Value::Value(tenant.plan_id.clone().into()),
        infra_owner: Value::Value(tenant.infra_owner.clone().into()),
        policy,
        tags: flatten_key_values(tenant.tags.as_deref().unwrap_or_default()),
    }
}

#[derive(Debug, Default, Clone)]
pub struct TenantDataSource {
    client: ClientHandle,
}

impl TenantDataSource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for TenantDataSource {
    type State<'a> = TenantState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(TenantState::schema())
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
        let (tenant, lookup) = match config.id.as_deref_option() {
            Some(tenant_id) => (client.get_tenant_for_user(tenant_id).await, tenant_id),
            None => {
                let name = config.name.as_str();
                (client.get_tenant_by_name_for_user(name).await, name)
            }
        };
        debug!(lookup, "reading tenant");

        match tenant {
            Ok(Some(tenant)) => Some(flatten_tenant(&tenant)),
            Ok(None) => {
                diags.root_error_short(format!("tenant '{lookup}' not found"));
                None
            }
            Err(err) => {
                diags.root_error("failed to get tenant", err.to_string());
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TenantsState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub plan_id: ValueString<'a>,
    pub tenants: ValueList<Value<TenantState<'a>>>,
}

impl<'a> WithSchema for TenantsState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => computed(AttributeType::String, "Always `user-tenants`"),
                    "plan_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Only list the tenants of this plan"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "tenants" => computed(
                        AttributeType::List(tenant_type().into()),
                        "The tenants visible to the current user",
                    ),
                },
                description: Description::markdown(
                    "`duplocloud_tenants` lists the tenants visible to the current user.",
                ),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TenantsDataSource {
    client: ClientHandle,
}

impl TenantsDataSource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for TenantsDataSource {
    type State<'a> = TenantsState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(TenantsState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags).await?;
        let tenants = match config.plan_id.as_deref_option().filter(|plan| !plan.is_empty()) {
            Some(plan_id) => client.list_tenants_for_user_by_plan(plan_id).await,
            None => client.list_tenants_for_user().await,
        };
        let tenants = match tenants {
            Ok(tenants) => tenants,
            Err(err) => {
                diags.root_error("failed to list tenants", err.to_string());
                return None;
            }
        };

        let mut state = config;
        state.id = Value::Value("user-tenants".into());
        state.tenants = Value::Value(
            tenants
                .iter()
                .map(|tenant| Value::Value(flatten_tenant(tenant)))
                .collect(),
        );
        Some(state)
    }
}
