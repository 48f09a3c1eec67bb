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
use tf_provider::value::{self, Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::debug;

use crate::config::ClientHandle;
use crate::duplosdk::utils::{decode_slash_in_id_part, encode_slash_in_id_part};
use crate::duplosdk::DuploKeyStringValue;
use crate::timeouts::{
    create_timeout, delete_timeout, timeouts_block, update_timeout, DefaultTimeouts, TimeoutsState,
};
use crate::utils::{check_string, invalid_id, validate_uuid, WithSchema, WithValidate};
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create,
};

const KIND: &str = "AWS Tag";
const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(15, 15, 15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AwsTagState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub arn: ValueString<'a>,
    pub key: ValueString<'a>,
    pub value: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for AwsTagState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Id of the tag, as `{tenant_id}/{arn}/{key}`"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant that the custom tag for a resource will be created in"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "arn" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The resource arn of which custom tag need to be created"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "key" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The tag name"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "value" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The value of the tag"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_aws_tag` manages an AWS custom tag for resources in Duplo.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithValidate for AwsTagState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

/// Id of a tag: the key comes last, with its slashes escaped
fn tag_id(tenant_id: &str, arn: &str, key: &str) -> String {
    format!("{tenant_id}/{arn}/{}", encode_slash_in_id_part(key))
}

/// Parse `{tenant_id}/{arn}/{key}`, the ARN may contain slashes
fn parse_id(id: &str) -> Option<(&str, &str, String)> {
    let (tenant_id, rest) = id.split_once('/')?;
    let (arn, key) = rest.rsplit_once('/')?;
    if tenant_id.is_empty() || arn.is_empty() || key.is_empty() {
        return None;
    }
    Some((tenant_id, arn, decode_slash_in_id_part(key)))
}

#[derive(Debug, Default, Clone)]
pub struct AwsTagResource {
    client: ClientHandle,
}

impl AwsTagResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    async fn refresh<'a>(&self, diags: &mut Diagnostics, mut state: AwsTagState<'a>) -> Option<AwsTagState<'a>> {
        let client = self.client.get(diags).await?;
        let id = state.id.as_str().to_owned();
        let Some((tenant_id, arn, key)) = parse_id(&id) else {
            invalid_id(diags, "duplocloud_aws_tag", &id, "{tenant_id}/{arn}/{key}");
            return None;
        };

        let tag = match client.aws_tag_get(tenant_id, arn, &key).await {
            Ok(Some(tag)) => tag,
            Ok(None) => return None,
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve AWS tag - (Tenant: {tenant_id}, Arn: {arn}, TagKey: {key})"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.tenant_id = Value::Value(tenant_id.to_owned().into());
        state.arn = Value::Value(arn.to_owned().into());
        state.key = Value::Value(key.into());
        state.value = Value::Value(tag.value.into());
        Some(state)
    }
}

#[async_trait]
impl Resource for AwsTagResource {
    type State<'a> = AwsTagState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AwsTagState::schema())
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
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = self.refresh(diags, state).await?;
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state.clone();
        state.id = match (
            state.tenant_id.as_deref_option(),
            state.arn.as_deref_option(),
            state.key.as_deref_option(),
        ) {
            (Some(tenant_id), Some(arn), Some(key)) => Value::Value(tag_id(tenant_id, arn, key).into()),
            _ => Value::Unknown,
        };

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state.clone();
        let mut trigger_replace = Vec::new();
        for (name, proposed, prior) in [
            ("tenant_id", &state.tenant_id, &prior_state.tenant_id),
            ("arn", &state.arn, &prior_state.arn),
            ("key", &state.key, &prior_state.key),
        ] {
            if proposed != prior {
                trigger_replace.push(AttributePath::new(name));
            }
        }
        if !trigger_replace.is_empty() {
            state.id = match (
                state.tenant_id.as_deref_option(),
                state.arn.as_deref_option(),
                state.key.as_deref_option(),
            ) {
                (Some(tenant_id), Some(arn), Some(key)) => Value::Value(tag_id(tenant_id, arn, key).into()),
                _ => Value::Unknown,
            };
        }

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let client = client.as_ref();
        let mut state = planned_state.clone();
        let tenant_id = state.tenant_id.as_str().to_owned();
        let arn = state.arn.as_str().to_owned();
        let tag = DuploKeyStringValue::new(state.key.as_str(), state.value.as_str());
        let id = tag_id(&tenant_id, &arn, &tag.key);
        let timeout = create_timeout(&state.timeouts, TIMEOUTS);
        debug!(%tenant_id, %arn, key = %tag.key, "creating aws tag");

        let created = async {
            client.aws_tag_create(&tenant_id, &arn, &tag).await?;
            wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.aws_tag_get(&tenant_id, &arn, &tag.key)
            })
            .await
        }
        .await;
        let remote = match created {
            Ok(remote) => remote,
            Err(err) => {
                diags.root_error(
                    format!(
                        "Error creating aws tag - (Tenant: {tenant_id}, arn: {arn}, TagKey: {})",
                        tag.key
                    ),
                    err.to_string(),
                );
                return None;
            }
        };

        state.id = Value::Value(id.into());
        state.value = Value::Value(remote.value.into());
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let client = client.as_ref();
        let state = planned_state.clone();
        if state.value == prior_state.value {
            return Some((state, planned_private_state));
        }

        let id = state.id.as_str().to_owned();
        let Some((tenant_id, arn, key)) = parse_id(&id) else {
            invalid_id(diags, "duplocloud_aws_tag", &id, "{tenant_id}/{arn}/{key}");
            return None;
        };
        let tag = DuploKeyStringValue::new(key.as_str(), state.value.as_str());
        let timeout = update_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, arn, %key, "updating aws tag");

        let updated = async {
            client.aws_tag_update(tenant_id, arn, &key, &tag).await?;
            wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.aws_tag_get(tenant_id, arn, &key)
            })
            .await
        }
        .await;
        if let Err(err) = updated {
            diags.root_error(
                format!("Error updating aws tag - (Tenant: {tenant_id}, arn: {arn}, TagKey: {key})"),
                err.to_string(),
            );
            return None;
        }

        let state = self.refresh(diags, state).await?;
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags).await?;
        let client = client.as_ref();
        let id = state.id.as_str();
        let Some((tenant_id, arn, key)) = parse_id(id) else {
            invalid_id(diags, "duplocloud_aws_tag", id, "{tenant_id}/{arn}/{key}");
            return None;
        };
        let timeout = delete_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, arn, %key, "deleting aws tag");

        let deleted = async {
            match client.aws_tag_delete(tenant_id, arn, &key).await {
                Err(err) if err.is_not_found() => return Ok(()),
                result => result?,
            }
            wait_for_resource_to_be_missing_after_delete(KIND, id, timeout, || {
                client.aws_tag_get(tenant_id, arn, &key)
            })
            .await
        }
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                format!("Unable to delete aws tag - (Tenant: {tenant_id}, Arn: {arn}, TagKey: {key})"),
                err.to_string(),
            );
            return None;
        }

        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = AwsTagState {
            id: Value::Value(id.into()),
            ..Default::default()
        };
        let state = self.refresh(diags, state).await?;
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::duplosdk::tests::test_client;

    use super::*;

    const TENANT: &str = "6f8e3e4c-0000-4000-8000-000000000001";
    const ARN: &str = "arn:aws:s3:::bucket/prefix";

    #[test]
    fn test_parse_id() {
        let id = tag_id(TENANT, ARN, "kubernetes.io/role");
        assert_eq!(
            id,
            format!("{TENANT}/arn:aws:s3:::bucket/prefix/kubernetes.io_SLASH_role")
        );
        assert_eq!(
            parse_id(&id),
            Some((TENANT, ARN, "kubernetes.io/role".to_owned()))
        );
        assert_eq!(parse_id(&format!("{TENANT}/key")), None);
        assert_eq!(parse_id("/arn/key"), None);
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let mock_server = MockServer::start().await;
        let tag_path = format!("/v3/subscriptions/{TENANT}/aws/tags/arn/arn:aws:s3:::bucket%252Fprefix");
        Mock::given(method("POST"))
            .and(path(tag_path.clone()))
            .and(body_json(json!({"Key": "env", "Value": "dev"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{tag_path}/env")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "env", "Value": "dev"})))
            .mount(&mock_server)
            .await;

        let resource = AwsTagResource::new(ClientHandle::configured(test_client(&mock_server)));
        let proposed = AwsTagState {
            tenant_id: Value::Value(TENANT.into()),
            arn: Value::Value(ARN.into()),
            key: Value::Value("env".into()),
            value: Value::Value("dev".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(&mut diags, proposed.clone(), proposed, Default::default())
            .await
            .unwrap();
        assert_eq!(planned.id.as_str(), format!("{TENANT}/{ARN}/env"));

        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned.clone(),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
        assert_eq!(state, planned);

        let imported = resource
            .import(&mut diags, format!("{TENANT}/{ARN}/env"))
            .await
            .unwrap()
            .0;
        assert_eq!(imported, state);
    }

    #[tokio::test]
    async fn test_plan_update_only_value_in_place() {
        let prior = AwsTagState {
            id: Value::Value(format!("{TENANT}/{ARN}/env").into()),
            tenant_id: Value::Value(TENANT.into()),
            arn: Value::Value(ARN.into()),
            key: Value::Value("env".into()),
            value: Value::Value("dev".into()),
            ..Default::default()
        };
        let resource = AwsTagResource::default();
        let mut diags = Diagnostics::default();

        let proposed = AwsTagState {
            value: Value::Value("prod".into()),
            ..prior.clone()
        };
        let (_, _, replace) = resource
            .plan_update(
                &mut diags,
                prior.clone(),
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(replace.is_empty());

        let proposed = AwsTagState {
            key: Value::Value("team".into()),
            ..prior.clone()
        };
        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace, vec![AttributePath::new("key")]);
        assert_eq!(state.id.as_str(), format!("{TENANT}/{ARN}/team"));
    }
}
