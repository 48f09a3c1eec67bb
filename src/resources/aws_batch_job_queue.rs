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

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{
    self, Value, ValueBool, ValueEmpty, ValueList, ValueMap, ValueNumber, ValueString,
};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::{debug, trace};

use crate::config::ClientHandle;
use crate::duplosdk::aws_batch::{DuploAwsBatchComputeEnvironmentOrder, DuploAwsBatchJobQueue};
use crate::duplosdk::{Client, ClientResult, DuploStringValue};
use crate::tags::{expand_string_list, expand_string_map, flatten_string_list, flatten_string_map};
use crate::timeouts::{
    create_timeout, delete_timeout, timeouts_block, update_timeout, DefaultTimeouts, TimeoutsState,
};
use crate::utils::{
    check_string, invalid_id, split_id, validate_string_in_slice, validate_uuid, WithNormalize,
    WithSchema, WithValidate,
};
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create,
    StateChangeConf, WaitError,
};

const KIND: &str = "aws batch Job queue";
const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(60, 60, 15);
const POLL_INTERVAL: Duration = Duration::from_secs(30);
const QUEUE_STATES: &[&str] = &["ENABLED", "DISABLED"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AwsBatchJobQueueState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub fullname: ValueString<'a>,
    pub compute_environments: ValueList<ValueString<'a>>,
    pub priority: ValueNumber,
    pub scheduling_policy_arn: ValueString<'a>,
    pub state: ValueString<'a>,
    pub arn: ValueString<'a>,
    pub wait_for_deployment: ValueBool,
    pub tags: ValueMap<'a, ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

impl<'a> WithSchema for AwsBatchJobQueueState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Id of the job queue, as `{tenant_id}/{name}`"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tenant_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The GUID of the tenant that the aws batch Job queue will be created in"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Specifies the name of the Job queue"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "fullname" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The full name of the Job queue"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "compute_environments" => Attribute {
                        attr_type: AttributeType::List(AttributeType::String.into()),
                        description: Description::plain(
                            "Specifies the set of compute environments mapped to a job queue and their order. The position of the compute environments in the list will dictate the order",
                        ),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "priority" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain(
                            "The priority of the job queue. Job queues with a higher priority are evaluated first when associated with the same compute environment",
                        ),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "scheduling_policy_arn" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain(
                            "The ARN of the fair share scheduling policy. After a job queue is created, you can replace but can't remove the fair share scheduling policy",
                        ),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "state" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::markdown("The state of the job queue. Must be one of: `ENABLED` or `DISABLED`"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "arn" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("The Amazon Resource Name of the Job queue"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "wait_for_deployment" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Wait for the job queue to be valid, true by default"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "tags" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Key-value map of resource tags"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_aws_batch_job_queue` manages an aws batch Job queue in Duplo.",
                ),
                deprecated: false,
            },
        }
    }
}

impl<'a> WithNormalize for AwsBatchJobQueueState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.wait_for_deployment.is_null() {
            self.wait_for_deployment = Value::Value(true);
        }
    }
}

impl<'a> WithValidate for AwsBatchJobQueueState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
        check_string(
            diags,
            &self.state,
            AttributePath::new("state"),
            validate_string_in_slice(QUEUE_STATES, true),
        );
        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

fn expand_compute_environments(
    compute_environments: &ValueList<ValueString>,
) -> Vec<DuploAwsBatchComputeEnvironmentOrder> {
    expand_string_list(compute_environments)
        .into_iter()
        .zip(0..)
        .map(|(compute_environment, order)| DuploAwsBatchComputeEnvironmentOrder {
            compute_environment,
            order,
        })
        .collect()
}

/// Compute environment names, by increasing order
fn flatten_compute_environments<'a>(
    order: Option<&[DuploAwsBatchComputeEnvironmentOrder]>,
) -> ValueList<ValueString<'a>> {
    let mut order = order.unwrap_or_default().to_vec();
    order.sort_by_key(|env| env.order);
    let names: Vec<String> = order.into_iter().map(|env| env.compute_environment).collect();
    flatten_string_list(&names)
}

fn expand_job_queue(state: &AwsBatchJobQueueState) -> DuploAwsBatchJobQueue {
    DuploAwsBatchJobQueue {
        job_queue_name: state.name.as_str().to_owned(),
        priority: state.priority.unwrap_or_default(),
        state: Some(DuploStringValue::new(state.state.as_str().to_uppercase())),
        compute_environment_order: Some(expand_compute_environments(&state.compute_environments)),
        scheduling_policy_arn: state
            .scheduling_policy_arn
            .as_deref_option()
            .unwrap_or_default()
            .to_owned(),
        tags: expand_string_map(&state.tags).filter(|tags| !tags.is_empty()),
        ..Default::default()
    }
}

fn flatten_job_queue(state: &mut AwsBatchJobQueueState, job_queue: &DuploAwsBatchJobQueue) {
    state.fullname = Value::Value(job_queue.job_queue_name.clone().into());
    state.arn = Value::Value(job_queue.job_queue_arn.clone().into());
    state.priority = Value::Value(job_queue.priority);
    state.scheduling_policy_arn = Value::Value(job_queue.scheduling_policy_arn.clone().into());
    state.tags = flatten_string_map(job_queue.tags.as_ref());
    state.compute_environments =
        flatten_compute_environments(job_queue.compute_environment_order.as_deref());

    // The configured spelling is kept, as the state is case-insensitive
    let remote_state = job_queue.state();
    if !state.state.as_str().eq_ignore_ascii_case(remote_state) {
        state.state = Value::Value(remote_state.to_owned().into());
    }
}

/// Parse `{tenant_id}/{name}`
fn parse_id(id: &str) -> Option<(&str, &str)> {
    match split_id(id, 2)?.as_slice() {
        [tenant_id, name] => Some((tenant_id, name)),
        _ => None,
    }
}

fn job_queue_id(state: &AwsBatchJobQueueState) -> ValueString<'static> {
    match (state.tenant_id.as_deref_option(), state.name.as_deref_option()) {
        (Some(tenant_id), Some(name)) => Value::Value(format!("{tenant_id}/{name}").into()),
        _ => Value::Unknown,
    }
}

/// Wait for the job queue to be valid, and disabled if requested
async fn job_queue_until_valid(
    client: &Client,
    tenant_id: &str,
    full_name: &str,
    disabled: bool,
    timeout: Duration,
) -> Result<DuploAwsBatchJobQueue, WaitError> {
    debug!(tenant_id, full_name, disabled, "waiting for batch job queue");
    StateChangeConf::new(["pending"], ["ready"], timeout)
        .with_poll_interval(POLL_INTERVAL)
        .wait_for_state(move || async move {
            let job_queue = client.aws_batch_job_queue_get(tenant_id, full_name).await?;
            let ready = job_queue.as_ref().is_some_and(|job_queue| {
                trace!(state = job_queue.state(), status = job_queue.status(), "batch job queue");
                job_queue.status() == "VALID" && (!disabled || job_queue.state() == "DISABLED")
            });
            ClientResult::Ok((job_queue, if ready { "ready" } else { "pending" }.to_owned()))
        })
        .await
}

#[derive(Debug, Default, Clone)]
pub struct AwsBatchJobQueueResource {
    client: ClientHandle,
}

impl AwsBatchJobQueueResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: AwsBatchJobQueueState<'a>,
    ) -> Option<AwsBatchJobQueueState<'a>> {
        let client = self.client.get(diags).await?;
        let id = state.id.as_str().to_owned();
        let Some((tenant_id, name)) = parse_id(&id) else {
            invalid_id(diags, "duplocloud_aws_batch_job_queue", &id, "{tenant_id}/{name}");
            return None;
        };

        let job_queue = match client.get_duplo_services_name(tenant_id, name).await {
            Ok(full_name) => client.aws_batch_job_queue_get(tenant_id, &full_name).await,
            Err(err) => Err(err),
        };
        let job_queue = match job_queue {
            Ok(Some(job_queue)) => job_queue,
            Ok(None) => return None,
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve tenant {tenant_id} aws batch Job queue '{name}'"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.tenant_id = Value::Value(tenant_id.to_owned().into());
        state.name = Value::Value(name.to_owned().into());
        flatten_job_queue(&mut state, &job_queue);
        Some(state)
    }
}

#[async_trait]
impl Resource for AwsBatchJobQueueResource {
    type State<'a> = AwsBatchJobQueueState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AwsBatchJobQueueState::schema())
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
        let mut state = state;
        state.normalize(diags);
        let state = self.refresh(diags, state).await?;
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state.clone();
        state.normalize(diags);
        state.id = job_queue_id(&state);
        state.fullname = Value::Unknown;
        state.arn = Value::Unknown;
        if state.scheduling_policy_arn.is_null() {
            state.scheduling_policy_arn = Value::Unknown;
        }
        if state.tags.is_null() {
            state.tags = Value::Unknown;
        }

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state.clone();
        state.normalize(diags);

        if config_state.scheduling_policy_arn.as_deref_option() == Some("")
            && !prior_state.scheduling_policy_arn.as_str().is_empty()
        {
            diags.error_short(
                "Cannot remove the fair share scheduling policy",
                AttributePath::new("scheduling_policy_arn"),
            );
            return None;
        }

        let mut trigger_replace = Vec::new();
        for (name, proposed, prior) in [
            ("tenant_id", &state.tenant_id, &prior_state.tenant_id),
            ("name", &state.name, &prior_state.name),
        ] {
            if proposed != prior {
                trigger_replace.push(AttributePath::new(name));
            }
        }
        if state.tags != prior_state.tags {
            trigger_replace.push(AttributePath::new("tags"));
        }

        if !trigger_replace.is_empty() {
            state.id = job_queue_id(&state);
            state.fullname = Value::Unknown;
            state.arn = Value::Unknown;
            if config_state.scheduling_policy_arn.is_null() {
                state.scheduling_policy_arn = Value::Unknown;
            }
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
        let name = state.name.as_str().to_owned();
        let id = format!("{tenant_id}/{name}");
        let timeout = create_timeout(&state.timeouts, TIMEOUTS);
        debug!(%tenant_id, %name, "creating batch job queue");

        let rq = expand_job_queue(&state);
        let created = async {
            let full_name = client.get_duplo_services_name(&tenant_id, &name).await?;
            client.aws_batch_job_queue_create(&tenant_id, &rq).await?;
            let job_queue = wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.aws_batch_job_queue_get(&tenant_id, &full_name)
            })
            .await?;
            if state.wait_for_deployment.unwrap_or(true) {
                return job_queue_until_valid(client, &tenant_id, &full_name, false, timeout).await;
            }
            Ok::<_, WaitError>(job_queue)
        }
        .await;
        let job_queue = match created {
            Ok(job_queue) => job_queue,
            Err(err) => {
                diags.root_error(
                    format!("Error creating tenant {tenant_id} aws batch Job queue '{name}'"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.id = Value::Value(id.into());
        flatten_job_queue(&mut state, &job_queue);

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
        let changed = state.compute_environments != prior_state.compute_environments
            || state.priority != prior_state.priority
            || state.scheduling_policy_arn != prior_state.scheduling_policy_arn
            || !state.state.as_str().eq_ignore_ascii_case(prior_state.state.as_str());
        if !changed {
            return Some((state, planned_private_state));
        }

        let tenant_id = state.tenant_id.as_str().to_owned();
        let name = state.name.as_str().to_owned();
        let full_name = prior_state.fullname.as_str().to_owned();
        let timeout = update_timeout(&state.timeouts, TIMEOUTS);
        debug!(%tenant_id, %name, "updating batch job queue");

        let mut rq = expand_job_queue(&state);
        rq.job_queue_name = String::new();
        rq.tags = None;
        rq.job_queue = full_name.clone();
        rq.job_queue_arn = prior_state.arn.as_str().to_owned();

        let updated = async {
            client.aws_batch_job_queue_update(&tenant_id, &rq).await?;
            wait_for_resource_to_be_present_after_create(KIND, &full_name, timeout, || {
                client.aws_batch_job_queue_get(&tenant_id, &full_name)
            })
            .await?;
            if state.wait_for_deployment.unwrap_or(true) {
                job_queue_until_valid(client, &tenant_id, &full_name, false, timeout).await?;
            }
            Ok::<_, WaitError>(())
        }
        .await;
        if let Err(err) = updated {
            diags.root_error(
                format!("Error updating tenant {tenant_id} aws batch Job queue '{name}'"),
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
        let Some((tenant_id, name)) = parse_id(id) else {
            invalid_id(diags, "duplocloud_aws_batch_job_queue", id, "{tenant_id}/{name}");
            return None;
        };
        let timeout = delete_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, name, "deleting batch job queue");

        let deleted = async {
            let full_name = client.get_duplo_services_name(tenant_id, name).await?;
            let Some(job_queue) = client.aws_batch_job_queue_get(tenant_id, &full_name).await? else {
                return Ok(());
            };

            if job_queue.state() == "ENABLED" {
                debug!(tenant_id, %full_name, "disabling batch job queue before its deletion");
                match client.aws_batch_job_queue_disable(tenant_id, &full_name).await {
                    Err(err) if err.is_not_found() => return Ok(()),
                    result => result?,
                }
                job_queue_until_valid(client, tenant_id, &full_name, true, timeout).await?;
            }

            match client.aws_batch_job_queue_delete(tenant_id, &full_name).await {
                Err(err) if err.is_not_found() => return Ok(()),
                result => result?,
            }
            wait_for_resource_to_be_missing_after_delete(KIND, id, timeout, || {
                client.aws_batch_job_queue_get(tenant_id, &full_name)
            })
            .await
        }
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                format!("Unable to delete tenant {tenant_id} aws batch Job queue '{name}'"),
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
        let mut state = AwsBatchJobQueueState {
            id: Value::Value(id.into()),
            ..Default::default()
        };
        state.normalize(diags);
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
    const API: &str = "/v3/subscriptions/6f8e3e4c-0000-4000-8000-000000000001/aws/batchJobQueue";

    async fn mount_tenants(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/admin/GetTenantsForUser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"TenantId": TENANT, "AccountName": "dev"}
            ])))
            .mount(mock_server)
            .await;
    }

    fn job_queue(state: &str, status: &str) -> serde_json::Value {
        json!({
            "JobQueueName": "duploservices-dev-queue",
            "JobQueueArn": "arn:aws:batch:us-west-2:1234:job-queue/duploservices-dev-queue",
            "Priority": 10,
            "State": {"Value": state},
            "Status": {"Value": status},
            "ComputeEnvironmentOrder": [
                {"ComputeEnvironment": "ce-b", "Order": 1},
                {"ComputeEnvironment": "ce-a", "Order": 0}
            ]
        })
    }

    fn resource(mock_server: &MockServer) -> AwsBatchJobQueueResource {
        AwsBatchJobQueueResource::new(ClientHandle::configured(test_client(mock_server)))
    }

    #[tokio::test]
    async fn test_validate_state() {
        let config = AwsBatchJobQueueState {
            tenant_id: Value::Value(TENANT.into()),
            state: Value::Value("enabled".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(AwsBatchJobQueueResource::default()
            .validate(&mut diags, config.clone())
            .await
            .is_some());

        let config = AwsBatchJobQueueState {
            state: Value::Value("PAUSED".into()),
            ..config
        };
        assert!(AwsBatchJobQueueResource::default()
            .validate(&mut diags, config)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_plan_rejects_scheduling_policy_removal() {
        let prior = AwsBatchJobQueueState {
            id: Value::Value(format!("{TENANT}/queue").into()),
            tenant_id: Value::Value(TENANT.into()),
            name: Value::Value("queue".into()),
            scheduling_policy_arn: Value::Value("arn:aws:batch:policy".into()),
            ..Default::default()
        };
        let config = AwsBatchJobQueueState {
            scheduling_policy_arn: Value::Value("".into()),
            ..prior.clone()
        };
        let mut diags = Diagnostics::default();
        let planned = AwsBatchJobQueueResource::default()
            .plan_update(
                &mut diags,
                prior,
                config.clone(),
                config,
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(planned.is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_create_waits_until_valid() {
        let mock_server = MockServer::start().await;
        mount_tenants(&mock_server).await;
        Mock::given(method("POST"))
            .and(path(API))
            .and(body_json(json!({
                "Priority": 10,
                "JobQueueName": "queue",
                "State": {"Value": "ENABLED"},
                "ComputeEnvironmentOrder": [
                    {"ComputeEnvironment": "ce-a", "Order": 0},
                    {"ComputeEnvironment": "ce-b", "Order": 1}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(API))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([job_queue("ENABLED", "VALID")])))
            .mount(&mock_server)
            .await;

        let proposed = AwsBatchJobQueueState {
            tenant_id: Value::Value(TENANT.into()),
            name: Value::Value("queue".into()),
            priority: Value::Value(10),
            state: Value::Value("enabled".into()),
            compute_environments: flatten_string_list(&["ce-a".to_owned(), "ce-b".to_owned()]),
            ..Default::default()
        };
        let resource = resource(&mock_server);
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(&mut diags, proposed.clone(), proposed, Default::default())
            .await
            .unwrap();
        assert_eq!(planned.wait_for_deployment, Value::Value(true));
        assert!(planned.arn.is_unknown());

        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
        assert_eq!(state.id.as_str(), format!("{TENANT}/queue"));
        assert_eq!(state.fullname.as_str(), "duploservices-dev-queue");
        assert_eq!(state.state.as_str(), "enabled");
        assert_eq!(
            expand_string_list(&state.compute_environments),
            vec!["ce-a", "ce-b"]
        );
    }

    #[tokio::test]
    async fn test_delete_disables_first() {
        let mock_server = MockServer::start().await;
        mount_tenants(&mock_server).await;
        Mock::given(method("GET"))
            .and(path(API))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([job_queue("ENABLED", "VALID")])))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(API))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([job_queue("DISABLED", "VALID")])))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(API))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!(
                "/v3/subscriptions/{TENANT}/aws/batchJobQueueDisable/duploservices-dev-queue"
            )))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{API}/duploservices-dev-queue")))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let state = AwsBatchJobQueueState {
            id: Value::Value(format!("{TENANT}/queue").into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(resource(&mock_server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .is_some());
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
    }
}
