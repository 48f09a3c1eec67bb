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

use super::tenant::change_key_values;
use super::{Client, ClientResult, DuploKeyStringValue};

/// Configuration of an infrastructure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DuploInfrastructureConfig {
    pub name: String,
    #[serde(default)]
    pub custom_data: Option<Vec<DuploKeyStringValue>>,
}

impl Client {
    /// Custom data of the infrastructure, `None` if the infrastructure does not exist
    pub async fn infrastructure_get_setting(
        &self,
        infra_name: &str,
    ) -> ClientResult<Option<Vec<DuploKeyStringValue>>> {
        let config: Option<DuploInfrastructureConfig> = self
            .get_api(
                &format!("InfrastructureGetSetting({infra_name})"),
                &format!("adminproxy/GetInfrastructureConfig/{infra_name}"),
            )
            .await?;
        Ok(config.map(|config| config.custom_data.unwrap_or_default()))
    }

    pub async fn infrastructure_change_setting(
        &self,
        infra_name: &str,
        old: &[DuploKeyStringValue],
        new: &[DuploKeyStringValue],
    ) -> ClientResult<()> {
        change_key_values(
            self,
            &format!("InfrastructureChangeSetting({infra_name})"),
            "adminproxy/UpdateInfrastructureConfigCustomData",
            infra_name,
            old,
            new,
        )
        .await
    }

    pub async fn infrastructure_replace_setting(
        &self,
        infra_name: &str,
        setting: &[DuploKeyStringValue],
    ) -> ClientResult<()> {
        let existing = self
            .infrastructure_get_setting(infra_name)
            .await?
            .unwrap_or_default();
        self.infrastructure_change_setting(infra_name, &existing, setting)
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::duplosdk::tests::test_client;

    use super::*;

    #[tokio::test]
    async fn test_replace_setting() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/adminproxy/GetInfrastructureConfig/nonprod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Name": "nonprod",
                "CustomData": [
                    {"Key": "EnableAwsAlbIngress", "Value": "true"},
                    {"Key": "ExternalSetting", "Value": "x"}
                ]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/adminproxy/UpdateInfrastructureConfigCustomData"))
            .and(body_json(json!({
                "ComponentId": "nonprod",
                "Key": "ExternalSetting",
                "Value": "",
                "State": "delete"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        client
            .infrastructure_replace_setting(
                "nonprod",
                &[DuploKeyStringValue::new("EnableAwsAlbIngress", "true")],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_infrastructure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/adminproxy/GetInfrastructureConfig/unknown"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        assert!(client
            .infrastructure_get_setting("unknown")
            .await
            .unwrap()
            .is_none());
    }
}
