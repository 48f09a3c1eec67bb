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
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, Diagnostics, DynamicDataSource, DynamicResource, Provider};
use tracing::debug;

use crate::config::{ClientHandle, ProviderConfig};
use crate::data_sources::{
    K8ConfigMapDataSource, TenantConfigDataSource, TenantDataSource, TenantsDataSource,
};
use crate::duplosdk::Client;
use crate::resources::{
    AwsBatchJobQueueResource, AwsTagResource, AzureSqlFirewallRuleResource,
    AzureSqlVirtualNetworkRuleResource, GcpPubSubSubscriptionResource,
    InfrastructureSettingResource, K8ConfigMapResource, TenantConfigResource,
};
use crate::utils::{WithSchema, WithValidate};

#[derive(Debug, Default, Clone)]
pub struct DuploProvider {
    client: ClientHandle,
}

#[async_trait]
impl Provider for DuploProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags, Default::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        debug!(%terraform_version, "configuring duplocloud provider");
        let Some(client_config) = config.client_config() else {
            diags.root_error(
                "Duplocloud Unable to create Duplocloud client",
                "missing provider config for 'duplo_token' 'duplo_host'. Not defined in environment var / main.tf",
            );
            return None;
        };

        match Client::new(&client_config) {
            Ok(client) => {
                self.client.set(client).await;
                Some(())
            }
            Err(err) => {
                diags.root_error("Duplocloud Unable to create Duplocloud client", err.to_string());
                None
            }
        }
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let client = &self.client;
        Some(map! {
            "duplocloud_tenant_config" => TenantConfigResource::new(client.clone()),
            "duplocloud_infrastructure_setting" => InfrastructureSettingResource::new(client.clone()),
            "duplocloud_k8_config_map" => K8ConfigMapResource::new(client.clone()),
            "duplocloud_aws_batch_job_queue" => AwsBatchJobQueueResource::new(client.clone()),
            "duplocloud_aws_tag" => AwsTagResource::new(client.clone()),
            "duplocloud_azure_sql_virtual_network_rule" => AzureSqlVirtualNetworkRuleResource::new(client.clone()),
            "duplocloud_azure_sql_firewall_rule" => AzureSqlFirewallRuleResource::new(client.clone()),
            "duplocloud_gcp_pubsub_subscription" => GcpPubSubSubscriptionResource::new(client.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let client = &self.client;
        Some(map! {
            "duplocloud_tenant" => TenantDataSource::new(client.clone()),
            "duplocloud_tenants" => TenantsDataSource::new(client.clone()),
            "duplocloud_tenant_config" => TenantConfigDataSource::new(client.clone()),
            "duplocloud_k8_config_map" => K8ConfigMapDataSource::new(client.clone()),
        })
    }
}
