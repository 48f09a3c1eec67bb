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

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::DuploStringValue;
use super::{Client, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DuploAwsBatchJobQueue {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_environment_order: Option<Vec<DuploAwsBatchComputeEnvironmentOrder>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_queue_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_queue_arn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheduling_policy_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DuploStringValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DuploStringValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_queue: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DuploAwsBatchComputeEnvironmentOrder {
    #[serde(default)]
    pub compute_environment: String,
    #[serde(default)]
    pub order: i64,
}

impl DuploAwsBatchJobQueue {
    pub fn state(&self) -> &str {
        self.state.as_ref().map_or("", |state| state.value.as_str())
    }

    pub fn status(&self) -> &str {
        self.status.as_ref().map_or("", |status| status.value.as_str())
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

fn job_queue_path(tenant_id: &str) -> String {
    format!("v3/subscriptions/{tenant_id}/aws/batchJobQueue")
}

impl Client {
    pub async fn aws_batch_job_queue_create(
        &self,
        tenant_id: &str,
        rq: &DuploAwsBatchJobQueue,
    ) -> ClientResult<()> {
        let _: Option<Value> = self
            .post_api(
                &format!("AwsBatchJobQueueCreate({tenant_id}, {})", rq.job_queue_name),
                &job_queue_path(tenant_id),
                rq,
            )
            .await?;
        Ok(())
    }

    pub async fn aws_batch_job_queue_update(
        &self,
        tenant_id: &str,
        rq: &DuploAwsBatchJobQueue,
    ) -> ClientResult<()> {
        let _: Option<Value> = self
            .put_api(
                &format!("AwsBatchJobQueueUpdate({tenant_id}, {})", rq.job_queue),
                &job_queue_path(tenant_id),
                rq,
            )
            .await?;
        Ok(())
    }

    pub async fn aws_batch_job_queue_list(
        &self,
        tenant_id: &str,
    ) -> ClientResult<Vec<DuploAwsBatchJobQueue>> {
        let list: Option<Vec<DuploAwsBatchJobQueue>> = self
            .get_api(
                &format!("AwsBatchJobQueueList({tenant_id})"),
                &job_queue_path(tenant_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    /// Look up a job queue by its full name
    pub async fn aws_batch_job_queue_get(
        &self,
        tenant_id: &str,
        full_name: &str,
    ) -> ClientResult<Option<DuploAwsBatchJobQueue>> {
        Ok(self
            .aws_batch_job_queue_list(tenant_id)
            .await?
            .into_iter()
            .find(|queue| queue.job_queue_name == full_name))
    }

    pub async fn aws_batch_job_queue_delete(&self, tenant_id: &str, full_name: &str) -> ClientResult<()> {
        let _: Option<Value> = self
            .delete_api(
                &format!("AwsBatchJobQueueDelete({tenant_id}, {full_name})"),
                &format!("{}/{full_name}", job_queue_path(tenant_id)),
            )
            .await?;
        Ok(())
    }

    pub async fn aws_batch_job_queue_disable(&self, tenant_id: &str, full_name: &str) -> ClientResult<()> {
        let _: Option<Value> = self
            .delete_api(
                &format!("AwsBatchJobQueueDisable({tenant_id}, {full_name})"),
                &format!("v3/subscriptions/{tenant_id}/aws/batchJobQueueDisable/{full_name}"),
            )
            .await?;
        Ok(())
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
    async fn test_get_filters_by_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/subscriptions/t1/aws/batchJobQueue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "JobQueueName": "duploservices-dev-other",
                    "Priority": 1
                },
                {
                    "JobQueueName": "duploservices-dev-queue",
                    "JobQueueArn": "arn:aws:batch:us-west-2:1234:job-queue/duploservices-dev-queue",
                    "Priority": 10,
                    "State": {"Value": "ENABLED"},
                    "Status": {"Value": "VALID"},
                    "ComputeEnvironmentOrder": [
                        {"ComputeEnvironment": "ce-b", "Order": 1},
                        {"ComputeEnvironment": "ce-a"}
                    ],
                    "Tags": {"team": "core"}
                }
            ])))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        let queue = client
            .aws_batch_job_queue_get("t1", "duploservices-dev-queue")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.priority, 10);
        assert_eq!(queue.state(), "ENABLED");
        assert_eq!(queue.status(), "VALID");
        assert_eq!(queue.compute_environment_order.unwrap()[1].order, 0);

        assert!(client
            .aws_batch_job_queue_get("t1", "duploservices-dev-missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_omits_empty_fields() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/subscriptions/t1/aws/batchJobQueue"))
            .and(body_json(json!({
                "Priority": 5,
                "JobQueueName": "queue",
                "State": {"Value": "ENABLED"},
                "ComputeEnvironmentOrder": [{"ComputeEnvironment": "ce", "Order": 0}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server);
        client
            .aws_batch_job_queue_create(
                "t1",
                &DuploAwsBatchJobQueue {
                    priority: 5,
                    job_queue_name: "queue".to_owned(),
                    state: Some(DuploStringValue::new("ENABLED")),
                    compute_environment_order: Some(vec![DuploAwsBatchComputeEnvironmentOrder {
                        compute_environment: "ce".to_owned(),
                        order: 0,
                    }]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
}
