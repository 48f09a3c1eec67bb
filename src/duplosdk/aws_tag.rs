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

use serde_json::Value;

use super::utils::encode_path_param;
use super::{Client, ClientResult, DuploKeyStringValue};

fn tag_path(tenant_id: &str, arn: &str) -> String {
    format!(
        "v3/subscriptions/{tenant_id}/aws/tags/arn/{}",
        encode_path_param(arn)
    )
}

fn tag_key_path(tenant_id: &str, arn: &str, key: &str) -> String {
    format!("{}/{}", tag_path(tenant_id, arn), encode_path_param(key))
}

// AWS throttles tagging calls, so every call goes through the rate limit retry.
impl Client {
    pub async fn aws_tag_create(&self, tenant_id: &str, arn: &str, rq: &DuploKeyStringValue) -> ClientResult<()> {
        let _: Option<Value> = self
            .post_api_with_retry(
                &format!("AwsTagCreate({tenant_id}, {arn})"),
                &tag_path(tenant_id, arn),
                rq,
            )
            .await?;
        Ok(())
    }

    pub async fn aws_tag_get(
        &self,
        tenant_id: &str,
        arn: &str,
        key: &str,
    ) -> ClientResult<Option<DuploKeyStringValue>> {
        let tag: Option<DuploKeyStringValue> = self
            .get_api_with_retry(
                &format!("AwsTagGet({tenant_id}, {arn}, {key})"),
                &tag_key_path(tenant_id, arn, key),
            )
            .await?;
        Ok(tag.filter(|tag| !tag.key.is_empty()))
    }

    pub async fn aws_tag_update(
        &self,
        tenant_id: &str,
        arn: &str,
        key: &str,
        rq: &DuploKeyStringValue,
    ) -> ClientResult<()> {
        let _: Option<Value> = self
            .put_api_with_retry(
                &format!("AwsTagUpdate({tenant_id}, {arn}, {key})"),
                &tag_key_path(tenant_id, arn, key),
                rq,
            )
            .await?;
        Ok(())
    }

    pub async fn aws_tag_delete(&self, tenant_id: &str, arn: &str, key: &str) -> ClientResult<()> {
        self.delete_api_with_retry(
            &format!("AwsTagDelete({tenant_id}, {arn}, {key})"),
            &tag_key_path(tenant_id, arn, key),
        )
        .await
    }
}
