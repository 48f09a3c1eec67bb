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

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::tags::diff_string_maps;

use super::{
    retry_with_exponential_backoff, BackoffConfig, Client, ClientError, ClientResult,
    DuploKeyStringValue, DuploKeyValueUpdate,
};

const DUPLO_SERVICES_PREFIX: &str = "duploservices";

/// Tenant as returned by the tenant listing of the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenant {
    pub tenant_id: String,
    pub account_name: String,
    #[serde(rename = "PlanID", default)]
    pub plan_id: String,
    #[serde(default)]
    pub infra_owner: String,
    #[serde(default)]
    pub tenant_policy: Option<DuploTenantPolicy>,
    #[serde(default)]
    pub tags: Option<Vec<DuploKeyStringValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenantPolicy {
    #[serde(default)]
    pub allow_volume_mapping: bool,
    #[serde(default)]
    pub block_external_ep: bool,
}

/// Entry of the tenant configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DuploTenantConfigEntry {
    #[serde(default)]
    pub component_id: String,
    #[serde(rename = "Type", default)]
    pub kind: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Backoff applied to configuration updates, which sporadically fail with a 400 during a refresh
pub(super) fn config_update_backoff() -> BackoffConfig {
    BackoffConfig {
        min_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(5),
        max_jitter: 2000,
        timeout: Duration::from_secs(60),
        is_retryable: |err| err.is_bad_request() || err.message.contains("deadline"),
    }
}

/// Apply the difference between two key/value lists with single key updates
pub(super) async fn change_key_values(
    client: &Client,
    api_name: &str,
    api_path: &str,
    component_id: &str,
    old: &[DuploKeyStringValue],
    new: &[DuploKeyStringValue],
) -> ClientResult<()> {
    let old: BTreeMap<String, String> = old.iter().map(|kv| (kv.key.clone(), kv.value.clone())).collect();
    let new: BTreeMap<String, String> = new.iter().map(|kv| (kv.key.clone(), kv.value.clone())).collect();
    let (upsert, remove) = diff_string_maps(&old, &new);
    let backoff = config_update_backoff();

    for key in remove.keys().filter(|key| !upsert.contains_key(*key)) {
        debug!(component_id, %key, "deleting configuration key");
        let rq = DuploKeyValueUpdate {
            component_id: component_id.to_owned(),
            key: key.clone(),
            value: String::new(),
            state: Some("delete".to_owned()),
        };
        retry_with_exponential_backoff(&backoff, || client.post_api_no_content(api_name, api_path, &rq)).await?;
    }

    for (key, value) in &upsert {
        debug!(component_id, %key, "updating configuration key");
        let rq = DuploKeyValueUpdate {
            component_id: component_id.to_owned(),
            key: key.clone(),
            value: value.clone(),
            state: None,
        };
        retry_with_exponential_backoff(&backoff, || client.post_api_no_content(api_name, api_path, &rq)).await?;
    }

    Ok(())
}

impl Client {
    pub async fn list_tenants_for_user(&self) -> ClientResult<Vec<DuploTenant>> {
        let tenants: Option<Vec<DuploTenant>> = self
            .get_api("ListTenantsForUser()", "admin/GetTenantsForUser")
            .await?;
        Ok(tenants.unwrap_or_default())
    }

    pub async fn list_tenants_for_user_by_plan(&self, plan_id: &str) -> ClientResult<Vec<DuploTenant>> {
        let mut tenants = self.list_tenants_for_user().await?;
        tenants.retain(|tenant| tenant.plan_id == plan_id);
        Ok(tenants)
    }

    pub async fn get_tenant_for_user(&self, tenant_id: &str) -> ClientResult<Option<DuploTenant>> {
        Ok(self
            .list_tenants_for_user()
            .await?
            .into_iter()
            .find(|tenant| tenant.tenant_id == tenant_id))
    }

    pub async fn get_tenant_by_name_for_user(&self, name: &str) -> ClientResult<Option<DuploTenant>> {
        Ok(self
            .list_tenants_for_user()
            .await?
            .into_iter()
            .find(|tenant| tenant.account_name == name))
    }

    /// Full name of a resource managed by DuploCloud: `duploservices-{account}-{name}`
    pub async fn get_duplo_services_name(&self, tenant_id: &str, name: &str) -> ClientResult<String> {
        match self.get_tenant_for_user(tenant_id).await? {
            Some(tenant) => Ok(format!(
                "{DUPLO_SERVICES_PREFIX}-{}-{name}",
                tenant.account_name
            )),
            None => Err(ClientError::custom(format!("tenant '{tenant_id}' not found"), 404)),
        }
    }

    /// Configuration of the tenant, `None` if the tenant does not exist
    pub async fn tenant_get_config(&self, tenant_id: &str) -> ClientResult<Option<Vec<DuploKeyStringValue>>> {
        let entries: Option<Vec<DuploTenantConfigEntry>> = self
            .get_api(
                &format!("TenantGetConfig({tenant_id})"),
                &format!("admin/GetTenantConfigData/{tenant_id}"),
            )
            .await?;
        trace!(tenant_id, ?entries, "tenant configuration");
        Ok(entries.map(|entries| {
            entries
                .into_iter()
                .filter(|entry| entry.state.as_deref() != Some("delete"))
                .map(|entry| DuploKeyStringValue::new(entry.key, entry.value))
                .collect()
        }))
    }

    /// Upsert the keys that changed and delete the keys that disappeared
    pub async fn tenant_change_config(
        &self,
        tenant_id: &str,
        old: &[DuploKeyStringValue],
        new: &[DuploKeyStringValue],
    ) -> ClientResult<()> {
        change_key_values(
            self,
            &format!("TenantChangeConfig({tenant_id})"),
            "admin/UpdateTenantConfigData",
            tenant_id,
            old,
            new,
        )
        .await
    }

    /// Make the configuration of the tenant exactly `config`
    pub async fn tenant_replace_config(
        &self,
        tenant_id: &str,
        config: &[DuploKeyStringValue],
    ) -> ClientResult<()> {
        let existing = self.tenant_get_config(tenant_id).await?.unwrap_or_default();
        self.tenant_change_config(tenant_id, &existing, config).await
    }
}
