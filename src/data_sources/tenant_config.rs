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
use crate::tags::{flatten_key_values, key_value_list_type, KeyValueList};
use crate::utils::{check_string, validate_uuid, WithSchema, WithValidate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TenantConfigDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub metadata: KeyValueList<'a>,
}

impl<'a> WithSchema for TenantConfigDataSourceState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant to read the configuration of"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "metadata" => Attribute {
                        attr_type: key_value_list_type(),
                        description: Description::plain("The complete configuration of the tenant"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::markdown(
                    "`duplocloud_tenant_config` retrieves the configuration of a tenant in Duplo.",
                ),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for TenantConfigDataSourceState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
    }
}

#[derive(Debug, Default, Clone)]
pub struct TenantConfigDataSource {
    client: ClientHandle,
}

impl TenantConfigDataSource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for TenantConfigDataSource {
    type State<'a> = TenantConfigDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(TenantConfigDataSourceState::schema())
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
        let tenant_id = config.tenant_id.as_str().to_owned();
        debug!(%tenant_id, "reading tenant config");

        let metadata = match client.tenant_get_config(&tenant_id).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                diags.root_error_short(format!("tenant config for '{tenant_id}' not found"));
                return None;
            }
            Err(err) => {
                diags.root_error(
                    format!("unable to retrieve tenant config for '{tenant_id}'"),
                    err.to_string(),
                );
                return None;
            }
        };

        let mut state = config;
        state.id = Value::Value(tenant_id.into());
        state.metadata = flatten_key_values(&metadata);
        Some(state)
    }
}
