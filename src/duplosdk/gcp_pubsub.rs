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
use serde_json::Value;

use super::{Client, ClientResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubBigQuery {
    #[serde(default)]
    pub table: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub state: Value,
    #[serde(default)]
    pub use_topic_schema: bool,
    #[serde(default)]
    pub write_metadata: bool,
    #[serde(default)]
    pub drop_unknown_fields: bool,
    #[serde(default)]
    pub use_table_schema: bool,
    #[serde(default)]
    pub service_account_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubCloudStorageConfig {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub filename_prefix: String,
    #[serde(default)]
    pub filename_suffix: String,
    #[serde(default)]
    pub filename_datetime_format: String,
    #[serde(default)]
    pub max_duration: String,
    #[serde(default)]
    pub max_bytes: i64,
    #[serde(default)]
    pub max_messages: i64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub state: Value,
    #[serde(default)]
    pub service_account_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubOidcToken {
    #[serde(default)]
    pub service_account_email: String,
    #[serde(default)]
    pub audience: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubPushConfig {
    #[serde(default)]
    pub push_endpoint: String,
    #[serde(default)]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub oidc_token: Option<DuploPubSubOidcToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubExpirationPolicy {
    pub ttl: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubDeadLetterPolicy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dead_letter_topic: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_delivery_attempts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubRetryPolicy {
    pub minimum_backoff: String,
    pub maximum_backoff: String,
}

/// Request body of a subscription creation or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubSubscription {
    pub name: String,
    pub topic: String,
    #[serde(rename = "bigqueryConfig", skip_serializing_if = "Option::is_none")]
    pub big_query: Option<DuploPubSubBigQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage_config: Option<DuploPubSubCloudStorageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_config: Option<DuploPubSubPushConfig>,
    pub ack_deadline_seconds: i64,
    pub message_retention_duration: String,
    pub retain_acked_messages: bool,
    pub filter: String,
    pub enable_message_ordering: bool,
    pub enable_exactly_once_delivery: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_policy: Option<DuploPubSubExpirationPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_policy: Option<DuploPubSubDeadLetterPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<DuploPubSubRetryPolicy>,
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub subscription_type: String,
}

/// Duration as returned by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SecondNano {
    #[serde(default)]
    pub seconds: i64,
    #[serde(rename = "naono", default)]
    pub nanos: i64,
}

impl SecondNano {
    /// `None` for negative durations
    pub fn to_duration(self) -> Option<Duration> {
        let seconds = u64::try_from(self.seconds).ok()?;
        let nanos = u32::try_from(self.nanos).ok()?;
        Some(Duration::from_secs(seconds) + Duration::from_nanos(nanos.into()))
    }

    /// Render the duration the way it is written in configurations: `"600s"`
    pub fn to_duration_string(self) -> String {
        format!("{}s", self.seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DuploPubSubExpirationPolicyResponse {
    #[serde(default)]
    pub ttl: SecondNano,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubRetryPolicyResponse {
    #[serde(default)]
    pub minimum_backoff: SecondNano,
    #[serde(default)]
    pub maximum_backoff: SecondNano,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DuploPubSubSubscriptionResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "bigqueryConfig", default)]
    pub big_query: Option<DuploPubSubBigQuery>,
    #[serde(default)]
    pub cloud_storage_config: Option<DuploPubSubCloudStorageConfig>,
    #[serde(default)]
    pub push_config: Option<DuploPubSubPushConfig>,
    #[serde(default)]
    pub ack_deadline_seconds: i64,
    #[serde(default)]
    pub message_retention_duration: String,
    #[serde(default)]
    pub retain_acked_messages: bool,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub enable_message_ordering: bool,
    #[serde(default)]
    pub enable_exactly_once_delivery: bool,
    #[serde(default)]
    pub expiration_policy: Option<DuploPubSubExpirationPolicyResponse>,
    #[serde(default)]
    pub dead_letter_policy: Option<DuploPubSubDeadLetterPolicy>,
    #[serde(default)]
    pub retry_policy: Option<DuploPubSubRetryPolicyResponse>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Name of a BigQuery or Cloud Storage subscription state
pub fn pubsub_state_name(state: &Value) -> String {
    const STATES: [&str; 6] = [
        "STATE_UNSPECIFIED",
        "ACTIVE",
        "PERMISSION_DENIED",
        "NOT_FOUND",
        "SCHEMA_MISMATCH",
        "IN_TRANSIT_LOCATION_RESTRICTION",
    ];
    match state {
        Value::String(state) => state.clone(),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| STATES.get(n as usize))
            .map_or_else(|| n.to_string(), |name| (*name).to_owned()),
        _ => STATES[0].to_owned(),
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn subscription_path(tenant_id: &str, name: &str) -> String {
    format!("v3/subscriptions/{tenant_id}/google/subscription/{name}")
}

impl Client {
    pub async fn gcp_pubsub_subscription_create(
        &self,
        tenant_id: &str,
        rq: &DuploPubSubSubscription,
    ) -> ClientResult<Option<DuploPubSubSubscriptionResponse>> {
        let rp: Option<DuploPubSubSubscriptionResponse> = self
            .post_api(
                &format!("GcpPubSubSubscriptionCreate({tenant_id}, {})", rq.name),
                &subscription_path(tenant_id, &rq.topic),
                rq,
            )
            .await?;
        Ok(rp.filter(|rp| !rp.name.is_empty()))
    }

    pub async fn gcp_pubsub_subscription_get(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> ClientResult<Option<DuploPubSubSubscriptionResponse>> {
        let rp: Option<DuploPubSubSubscriptionResponse> = self
            .get_api(
                &format!("GcpPubSubSubscriptionGet({tenant_id}, {name})"),
                &subscription_path(tenant_id, name),
            )
            .await?;
        Ok(rp.filter(|rp| !rp.name.is_empty()))
    }

    pub async fn gcp_pubsub_subscription_update(
        &self,
        tenant_id: &str,
        rq: &DuploPubSubSubscription,
    ) -> ClientResult<Option<DuploPubSubSubscriptionResponse>> {
        self.put_api(
            &format!("GcpPubSubSubscriptionUpdate({tenant_id}, {})", rq.name),
            &subscription_path(tenant_id, &rq.topic),
            rq,
        )
        .await
    }

    pub async fn gcp_pubsub_subscription_delete(&self, tenant_id: &str, name: &str) -> ClientResult<()> {
        let _: Option<Value> = self
            .delete_api(
                &format!("GcpPubSubSubscriptionDelete({tenant_id}, {name})"),
                &subscription_path(tenant_id, name),
            )
            .await?;
        Ok(())
    }
}
