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
use serde_json::{Map, Value};

use super::{Client, ClientResult};

/// Kubernetes config map, as stored by DuploCloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DuploK8sConfigMap {
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl DuploK8sConfigMap {
    pub fn new(name: &str, data: Map<String, Value>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("name".to_owned(), Value::String(name.to_owned()));
        Self { metadata, data }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }
}

pub fn k8s_config_map_path(tenant_id: &str) -> String {
    format!("v2/subscriptions/{tenant_id}/K8ConfigMapApiV2")
}

impl Client {
    pub async fn k8s_config_map_get(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> ClientResult<Option<DuploK8sConfigMap>> {
        self.get_api(
            &format!("K8sConfigMapGet({tenant_id}, {name})"),
            &format!("{}/{name}", k8s_config_map_path(tenant_id)),
        )
        .await
    }

    pub async fn k8s_config_map_create(
        &self,
        tenant_id: &str,
        rq: &DuploK8sConfigMap,
    ) -> ClientResult<Option<DuploK8sConfigMap>> {
        self.post_api(
            &format!("K8sConfigMapCreate({tenant_id}, {})", rq.name().unwrap_or_default()),
            &k8s_config_map_path(tenant_id),
            rq,
        )
        .await
    }

    pub async fn k8s_config_map_update(
        &self,
        tenant_id: &str,
        rq: &DuploK8sConfigMap,
    ) -> ClientResult<Option<DuploK8sConfigMap>> {
        self.put_api(
            &format!("K8sConfigMapUpdate({tenant_id}, {})", rq.name().unwrap_or_default()),
            &k8s_config_map_path(tenant_id),
            rq,
        )
        .await
    }

    pub async fn k8s_config_map_delete(&self, tenant_id: &str, name: &str) -> ClientResult<()> {
        let _: Option<Value> = self
            .delete_api(
                &format!("K8sConfigMapDelete({tenant_id}, {name})"),
                &format!("{}/{name}", k8s_config_map_path(tenant_id)),
            )
            .await?;
        Ok(())
    }
}
