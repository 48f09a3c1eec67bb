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

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::utils::format_duration;

mod aws_batch_job_queue;
mod aws_tag;
mod azure_sql_firewall_rule;
mod azure_sql_virtual_network_rule;
mod gcp_pubsub_subscription;
mod infrastructure_setting;
mod k8_config_map;
mod settings;
mod tenant_config;

pub use aws_batch_job_queue::AwsBatchJobQueueResource;
pub use aws_tag::AwsTagResource;
pub use azure_sql_firewall_rule::AzureSqlFirewallRuleResource;
pub use azure_sql_virtual_network_rule::AzureSqlVirtualNetworkRuleResource;
pub use gcp_pubsub_subscription::GcpPubSubSubscriptionResource;
pub use infrastructure_setting::InfrastructureSettingResource;
pub use k8_config_map::K8ConfigMapResource;
pub use tenant_config::TenantConfigResource;

/// Run `operation`, failing once `timeout` has elapsed
pub(crate) async fn with_timeout<T, E, F>(timeout: Duration, operation: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(_) => Err(format!(
            "operation timed out after {}",
            format_duration(timeout)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_expires() {
        let err = with_timeout(Duration::from_secs(120), async {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok::<(), String>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err, "operation timed out after 2m0s");

        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, String>(3) }).await;
        assert_eq!(ok, Ok(3));
    }
}
