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

use serde::{Deserialize, Serialize};

use super::{Client, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AzureSqlServerVnetRule {
    #[serde(rename = "properties.virtualNetworkSubnetId", default)]
    pub virtual_network_subnet_id: String,
    #[serde(rename = "properties.ignoreMissingVnetServiceEndpoint", default)]
    pub ignore_missing_vnet_service_endpoint: bool,
    #[serde(rename = "properties.state", default)]
    pub state: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AzureSqlServerFirewallRule {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "properties.startIpAddress", default)]
    pub start_ip_address: String,
    #[serde(rename = "properties.endIpAddress", default)]
    pub end_ip_address: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub rule_type: String,
}

impl Client {
    pub async fn azure_sql_server_vnet_rule_create(
        &self,
        tenant_id: &str,
        server_name: &str,
        rq: &AzureSqlServerVnetRule,
    ) -> ClientResult<()> {
        self.post_api_no_content(
            &format!("AzureSqlServerVnetRuleCreate({tenant_id}, {server_name})"),
            &format!("subscriptions/{tenant_id}/AddSqlServerVirtualNetworkRule/{server_name}"),
            rq,
        )
        .await
    }

    pub async fn azure_sql_server_vnet_rule_list(
        &self,
        tenant_id: &str,
        server_name: &str,
    ) -> ClientResult<Vec<AzureSqlServerVnetRule>> {
        let list: Option<Vec<AzureSqlServerVnetRule>> = self
            .get_api(
                &format!("AzureSqlServerVnetRuleList({tenant_id}, {server_name})"),
                &format!("subscriptions/{tenant_id}/GetSqlServerVirtualNetworkRules/{server_name}"),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    pub async fn azure_sql_server_vnet_rule_get(
        &self,
        tenant_id: &str,
        server_name: &str,
        rule_name: &str,
    ) -> ClientResult<Option<AzureSqlServerVnetRule>> {
        Ok(self
            .azure_sql_server_vnet_rule_list(tenant_id, server_name)
            .await?
            .into_iter()
            .find(|rule| rule.name == rule_name))
    }

    pub async fn azure_sql_server_vnet_rule_delete(
        &self,
        tenant_id: &str,
        server_name: &str,
        rule_name: &str,
    ) -> ClientResult<()> {
        self.post_api_no_content(
            &format!("AzureSqlServerVnetRuleDelete({tenant_id}, {server_name}, {rule_name})"),
            &format!("subscriptions/{tenant_id}/DeleteSqlServerVirtualNetworkRule/{server_name}"),
            &AzureSqlServerVnetRule {
                name: rule_name.to_owned(),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn azure_sql_server_firewall_rule_create(
        &self,
        tenant_id: &str,
        server_name: &str,
        rq: &AzureSqlServerFirewallRule,
    ) -> ClientResult<()> {
        self.post_api_no_content(
            &format!("AzureSqlServerFirewallRuleCreate({tenant_id}, {server_name})"),
            &format!("subscriptions/{tenant_id}/AddSqlServerFirewallRule/{server_name}"),
            rq,
        )
        .await
    }

    pub async fn azure_sql_server_firewall_rule_list(
        &self,
        tenant_id: &str,
        server_name: &str,
    ) -> ClientResult<Vec<AzureSqlServerFirewallRule>> {
        let list: Option<Vec<AzureSqlServerFirewallRule>> = self
            .get_api(
                &format!("AzureSqlServerFirewallRuleList({tenant_id}, {server_name})"),
                &format!("subscriptions/{tenant_id}/GetSqlServerFirewallRules/{server_name}"),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    pub async fn azure_sql_server_firewall_rule_get(
        &self,
        tenant_id: &str,
        server_name: &str,
        rule_name: &str,
    ) -> ClientResult<Option<AzureSqlServerFirewallRule>> {
        Ok(self
            .azure_sql_server_firewall_rule_list(tenant_id, server_name)
            .await?
            .into_iter()
            .find(|rule| rule.name == rule_name))
    }

    pub async fn azure_sql_server_firewall_rule_delete(
        &self,
        tenant_id: &str,
        server_name: &str,
        rule_name: &str,
    ) -> ClientResult<()> {
        self.post_api_no_content(
            &format!("AzureSqlServerFirewallRuleDelete({tenant_id}, {server_name}, {rule_name})"),
            &format!("subscriptions/{tenant_id}/DeleteSqlServerFirewallRule/{server_name}"),
            &AzureSqlServerFirewallRule {
                name: rule_name.to_owned(),
                ..Default::default()
            },
        )
        .await
    }
}
