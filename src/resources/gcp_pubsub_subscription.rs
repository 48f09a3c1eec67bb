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
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{
    self, Value, ValueBool, ValueEmpty, ValueMap, ValueNumber, ValueString,
};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::debug;

use crate::config::ClientHandle;
use crate::duplosdk::gcp_pubsub::{
    pubsub_state_name, DuploPubSubBigQuery, DuploPubSubCloudStorageConfig,
    DuploPubSubDeadLetterPolicy, DuploPubSubExpirationPolicy, DuploPubSubOidcToken,
    DuploPubSubPushConfig, DuploPubSubRetryPolicy, DuploPubSubSubscription,
    DuploPubSubSubscriptionResponse, SecondNano,
};
use crate::tags::{expand_string_map, flatten_string_map};
use crate::timeouts::{
    create_timeout, delete_timeout, timeouts_block, update_timeout, DefaultTimeouts, TimeoutsState,
};
use crate::utils::{
    check_number, check_string, invalid_id, parse_unit_duration, split_id,
    validate_duration_between, validate_int_between, validate_uuid, WithNormalize, WithSchema,
    WithValidate,
};
use crate::wait::{
    wait_for_resource_to_be_missing_after_delete, wait_for_resource_to_be_present_after_create,
};

use super::with_timeout;

const KIND: &str = "pubsub subscription";
const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(5, 5, 2);
const DEFAULT_ACK_DEADLINE: i64 = 10;
const DEFAULT_RETENTION: &str = "604800s";
const DURATION_FRACTION_DIGITS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OidcTokenState<'a> {
    #[serde(borrow = "'a")]
    pub service_account_email: ValueString<'a>,
    pub audience: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PushConfigState<'a> {
    #[serde(borrow = "'a")]
    pub push_endpoint: ValueString<'a>,
    pub attributes: ValueMap<'a, ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub oidc_token: Value<OidcTokenState<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BigQueryState<'a> {
    #[serde(borrow = "'a")]
    pub table: ValueString<'a>,
    pub use_topic_schema: ValueBool,
    pub use_table_schema: ValueBool,
    pub drop_unknown_fields: ValueBool,
    pub write_metadata: ValueBool,
    pub service_account_email: ValueString<'a>,
    pub state: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CloudStorageConfigState<'a> {
    #[serde(borrow = "'a")]
    pub bucket: ValueString<'a>,
    pub filename_prefix: ValueString<'a>,
    pub filename_suffix: ValueString<'a>,
    pub filename_datetime_format: ValueString<'a>,
    pub max_duration: ValueString<'a>,
    pub max_bytes: ValueNumber,
    pub max_messages: ValueNumber,
    pub service_account_email: ValueString<'a>,
    pub state: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExpirationPolicyState<'a> {
    #[serde(borrow = "'a")]
    pub ttl: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeadLetterPolicyState<'a> {
    #[serde(borrow = "'a")]
    pub dead_letter_topic: ValueString<'a>,
    pub max_delivery_attempts: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetryPolicyState<'a> {
    #[serde(borrow = "'a")]
    pub minimum_backoff: ValueString<'a>,
    pub maximum_backoff: ValueString<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GcpPubSubSubscriptionState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub tenant_id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub topic: ValueString<'a>,
    pub ack_deadline_seconds: ValueNumber,
    pub message_retention_duration: ValueString<'a>,
    pub retain_acked_messages: ValueBool,
    pub filter: ValueString<'a>,
    pub enable_message_ordering: ValueBool,
    pub enable_exactly_once_delivery: ValueBool,
    pub labels: ValueMap<'a, ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub push_config: Value<PushConfigState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub big_query: Value<BigQueryState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub cloud_storage_config: Value<CloudStorageConfigState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub expiration_policy: Value<ExpirationPolicyState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub dead_letter_policy: Value<DeadLetterPolicyState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub retry_policy: Value<RetryPolicyState<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<TimeoutsState<'a>>,
}

fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &'static str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

fn push_config_block() -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: map! {
            "push_endpoint" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "A URL locating the endpoint to which messages should be pushed",
            ),
            "attributes" => attribute(
                AttributeType::Map(AttributeType::String.into()),
                AttributeConstraint::OptionalComputed,
                "Endpoint configuration attributes",
            ),
        },
        blocks: map! {
            "oidc_token" => NestedBlock::Optional(Block {
                attributes: map! {
                    "service_account_email" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Required,
                        "Service account email to be used for generating the OIDC token",
                    ),
                    "audience" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Optional,
                        "Audience to be used when generating the OIDC token",
                    ),
                },
                description: Description::plain("Send an OIDC JWT token as a bearer token with every push request"),
                ..Default::default()
            }),
        },
        description: Description::plain("Deliver the messages to a push endpoint"),
        ..Default::default()
    })
}

fn big_query_block() -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: map! {
            "table" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "The name of the table to which to write data",
            ),
            "use_topic_schema" => attribute(
                AttributeType::Bool,
                AttributeConstraint::OptionalComputed,
                "Use the topic's schema as the columns to write to in BigQuery, false by default",
            ),
            "use_table_schema" => attribute(
                AttributeType::Bool,
                AttributeConstraint::OptionalComputed,
                "Use the table schema as the columns to write to in BigQuery, false by default",
            ),
            "drop_unknown_fields" => attribute(
                AttributeType::Bool,
                AttributeConstraint::OptionalComputed,
                "Drop the fields of the messages that are not part of the BigQuery table schema, false by default",
            ),
            "write_metadata" => attribute(
                AttributeType::Bool,
                AttributeConstraint::OptionalComputed,
                "Write the subscription name, messageId, publishTime, attributes and orderingKey as additional fields, false by default",
            ),
            "service_account_email" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "The service account used to write to BigQuery",
            ),
            "state" => attribute(
                AttributeType::String,
                AttributeConstraint::Computed,
                "Whether the subscription can receive messages",
            ),
        },
        description: Description::plain("Deliver the messages to a BigQuery table"),
        ..Default::default()
    })
}

fn cloud_storage_config_block() -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: map! {
            "bucket" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "Name of the Cloud Storage bucket, without any prefix like `gs://`",
            ),
            "filename_prefix" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "Prefix of the Cloud Storage filenames",
            ),
            "filename_suffix" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "Suffix of the Cloud Storage filenames, must not end in `/`",
            ),
            "filename_datetime_format" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "Format of the datetimes in the Cloud Storage filenames",
            ),
            "max_duration" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "The maximum duration that can elapse before a new Cloud Storage file is created, between 1 and 10 minutes, `300s` by default",
            ),
            "max_bytes" => attribute(
                AttributeType::Number,
                AttributeConstraint::OptionalComputed,
                "The maximum bytes that can be written to a Cloud Storage file before a new file is created",
            ),
            "max_messages" => attribute(
                AttributeType::Number,
                AttributeConstraint::OptionalComputed,
                "The maximum messages that can be written to a Cloud Storage file before a new file is created, at least 1000",
            ),
            "service_account_email" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "The service account used to write to Cloud Storage",
            ),
            "state" => attribute(
                AttributeType::String,
                AttributeConstraint::Computed,
                "Whether the subscription can receive messages",
            ),
        },
        description: Description::plain("Deliver the messages to a Cloud Storage bucket"),
        ..Default::default()
    })
}

fn expiration_policy_block() -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: map! {
            "ttl" => attribute(
                AttributeType::String,
                AttributeConstraint::Required,
                "Time-to-live of an inactive subscription, like `3.5s`. An empty string means the subscription never expires",
            ),
        },
        description: Description::plain("Conditions for the expiration of the subscription"),
        ..Default::default()
    })
}

fn dead_letter_policy_block() -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: map! {
            "dead_letter_topic" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "The name of the topic to which dead letter messages should be published",
            ),
            "max_delivery_attempts" => attribute(
                AttributeType::Number,
                AttributeConstraint::OptionalComputed,
                "The maximum number of delivery attempts for any message, between 5 and 100, 5 by default",
            ),
        },
        description: Description::plain("Dead lettering of the messages, disabled when not set"),
        ..Default::default()
    })
}

fn retry_policy_block() -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: map! {
            "minimum_backoff" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "The minimum delay between consecutive deliveries of a message, between 0 and 600 seconds, `10s` by default",
            ),
            "maximum_backoff" => attribute(
                AttributeType::String,
                AttributeConstraint::OptionalComputed,
                "The maximum delay between consecutive deliveries of a message, between 0 and 600 seconds, `600s` by default",
            ),
        },
        description: Description::plain("How Pub/Sub retries the delivery of a message"),
        ..Default::default()
    })
}

impl<'a> WithSchema for GcpPubSubSubscriptionState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Computed,
                        "Id of the subscription, as `{tenant_id}/{name}`",
                    ),
                    "tenant_id" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Required,
                        "The GUID of the tenant that the subscription will be created in",
                    ),
                    "name" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Required,
                        "Name of the subscription",
                    ),
                    "topic" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Required,
                        "The topic the subscription is attached to",
                    ),
                    "ack_deadline_seconds" => attribute(
                        AttributeType::Number,
                        AttributeConstraint::OptionalComputed,
                        "Maximum time after a subscriber receives a message before it should acknowledge it, between 10 and 600, 10 by default",
                    ),
                    "message_retention_duration" => attribute(
                        AttributeType::String,
                        AttributeConstraint::OptionalComputed,
                        "How long to retain unacknowledged messages, between `600s` and `604800s`, 7 days by default",
                    ),
                    "retain_acked_messages" => attribute(
                        AttributeType::Bool,
                        AttributeConstraint::OptionalComputed,
                        "Retain acknowledged messages, false by default",
                    ),
                    "filter" => attribute(
                        AttributeType::String,
                        AttributeConstraint::Optional,
                        "Only deliver the messages matching this filter. It cannot be modified after the creation",
                    ),
                    "enable_message_ordering" => attribute(
                        AttributeType::Bool,
                        AttributeConstraint::OptionalComputed,
                        "Deliver the messages sharing an ordering key in the order they were received, false by default",
                    ),
                    "enable_exactly_once_delivery" => attribute(
                        AttributeType::Bool,
                        AttributeConstraint::OptionalComputed,
                        "Do not resend acknowledged messages, nor messages before their acknowledgement deadline, false by default",
                    ),
                    "labels" => attribute(
                        AttributeType::Map(AttributeType::String.into()),
                        AttributeConstraint::OptionalComputed,
                        "Key/value labels of the subscription",
                    ),
                },
                blocks: map! {
                    "push_config" => push_config_block(),
                    "big_query" => big_query_block(),
                    "cloud_storage_config" => cloud_storage_config_block(),
                    "expiration_policy" => expiration_policy_block(),
                    "dead_letter_policy" => dead_letter_policy_block(),
                    "retry_policy" => retry_policy_block(),
                    "timeouts" => timeouts_block(),
                },
                description: Description::markdown(
                    "`duplocloud_gcp_pubsub_subscription` manages a GCP Pub/Sub subscription in Duplo. \
                     The delivery type is `Push`, `BigQuery` or `CloudStorage` when the matching block is set, `Pull` otherwise.",
                ),
                deprecated: false,
            },
        }
    }
}

fn default_string(value: &mut ValueString, default: &'static str) {
    if value.is_null() {
        *value = Value::Value(default.into());
    }
}

fn default_value<T>(value: &mut Value<T>, default: T) {
    if value.is_null() {
        *value = Value::Value(default);
    }
}

impl<'a> WithNormalize for GcpPubSubSubscriptionState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        default_value(&mut self.ack_deadline_seconds, DEFAULT_ACK_DEADLINE);
        default_string(&mut self.message_retention_duration, DEFAULT_RETENTION);
        default_value(&mut self.retain_acked_messages, false);
        default_value(&mut self.enable_message_ordering, false);
        default_value(&mut self.enable_exactly_once_delivery, false);

        if let Value::Value(big_query) = &mut self.big_query {
            default_value(&mut big_query.use_topic_schema, false);
            default_value(&mut big_query.use_table_schema, false);
            default_value(&mut big_query.drop_unknown_fields, false);
            default_value(&mut big_query.write_metadata, false);
        }
        if let Value::Value(cloud_storage) = &mut self.cloud_storage_config {
            default_string(&mut cloud_storage.max_duration, "300s");
            default_value(&mut cloud_storage.max_messages, 1000);
        }
        if let Value::Value(dead_letter) = &mut self.dead_letter_policy {
            default_value(&mut dead_letter.max_delivery_attempts, 5);
        }
        if let Value::Value(retry) = &mut self.retry_policy {
            default_string(&mut retry.minimum_backoff, "10s");
            default_string(&mut retry.maximum_backoff, "600s");
        }
    }
}

impl<'a> WithValidate for GcpPubSubSubscriptionState<'a> {
    fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        let up_to_ten_minutes = || {
            validate_duration_between(
                Duration::ZERO,
                Duration::from_secs(600),
                DURATION_FRACTION_DIGITS,
            )
        };

        check_string(diags, &self.tenant_id, AttributePath::new("tenant_id"), validate_uuid);
        check_number(
            diags,
            &self.ack_deadline_seconds,
            AttributePath::new("ack_deadline_seconds"),
            validate_int_between(10, 600),
        );
        check_string(
            diags,
            &self.message_retention_duration,
            AttributePath::new("message_retention_duration"),
            validate_duration_between(
                Duration::from_secs(600),
                Duration::from_secs(604800),
                DURATION_FRACTION_DIGITS,
            ),
        );

        let delivery_blocks = [
            self.push_config.is_value(),
            self.big_query.is_value(),
            self.cloud_storage_config.is_value(),
        ];
        if delivery_blocks.into_iter().filter(|set| *set).count() > 1 {
            diags.root_error_short(
                "Only one of `push_config`, `big_query` or `cloud_storage_config` can be set",
            );
        }

        if let Value::Value(big_query) = &self.big_query {
            if big_query.use_topic_schema == Value::Value(true)
                && big_query.use_table_schema == Value::Value(true)
            {
                diags.error_short(
                    "Only one of `use_topic_schema` and `use_table_schema` can be set",
                    AttributePath::new("big_query").index(0),
                );
            }
        }
        if let Value::Value(cloud_storage) = &self.cloud_storage_config {
            let path = AttributePath::new("cloud_storage_config").index(0);
            check_string(
                diags,
                &cloud_storage.max_duration,
                path.clone().attribute("max_duration"),
                validate_duration_between(
                    Duration::from_secs(60),
                    Duration::from_secs(600),
                    DURATION_FRACTION_DIGITS,
                ),
            );
            check_number(
                diags,
                &cloud_storage.max_messages,
                path.attribute("max_messages"),
                validate_int_between(1000, i64::MAX),
            );
        }
        if let Value::Value(dead_letter) = &self.dead_letter_policy {
            check_number(
                diags,
                &dead_letter.max_delivery_attempts,
                AttributePath::new("dead_letter_policy")
                    .index(0)
                    .attribute("max_delivery_attempts"),
                validate_int_between(5, 100),
            );
        }
        if let Value::Value(retry) = &self.retry_policy {
            let path = AttributePath::new("retry_policy").index(0);
            check_string(
                diags,
                &retry.minimum_backoff,
                path.clone().attribute("minimum_backoff"),
                up_to_ten_minutes(),
            );
            check_string(
                diags,
                &retry.maximum_backoff,
                path.attribute("maximum_backoff"),
                up_to_ten_minutes(),
            );
        }

        self.timeouts.validate(diags, AttributePath::new("timeouts"));
    }
}

fn set_unknown_if_null<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}

/// Computed attributes the configuration leaves unset are unknown until applied
fn plan_computed(state: &mut GcpPubSubSubscriptionState) {
    set_unknown_if_null(&mut state.labels);
    if let Value::Value(push) = &mut state.push_config {
        set_unknown_if_null(&mut push.attributes);
    }
    if let Value::Value(big_query) = &mut state.big_query {
        set_unknown_if_null(&mut big_query.service_account_email);
        set_unknown_if_null(&mut big_query.state);
    }
    if let Value::Value(cloud_storage) = &mut state.cloud_storage_config {
        set_unknown_if_null(&mut cloud_storage.filename_prefix);
        set_unknown_if_null(&mut cloud_storage.filename_suffix);
        set_unknown_if_null(&mut cloud_storage.filename_datetime_format);
        set_unknown_if_null(&mut cloud_storage.max_bytes);
        set_unknown_if_null(&mut cloud_storage.service_account_email);
        set_unknown_if_null(&mut cloud_storage.state);
    }
    if let Value::Value(dead_letter) = &mut state.dead_letter_policy {
        set_unknown_if_null(&mut dead_letter.dead_letter_topic);
    }
}

fn expand_push_config(push: &PushConfigState) -> DuploPubSubPushConfig {
    DuploPubSubPushConfig {
        push_endpoint: push.push_endpoint.as_str().to_owned(),
        attributes: expand_string_map(&push.attributes),
        oidc_token: push.oidc_token.as_ref_option().map(|token| DuploPubSubOidcToken {
            service_account_email: token.service_account_email.as_str().to_owned(),
            audience: token.audience.as_str().to_owned(),
        }),
    }
}

fn expand_big_query(big_query: &BigQueryState) -> DuploPubSubBigQuery {
    DuploPubSubBigQuery {
        table: big_query.table.as_str().to_owned(),
        use_topic_schema: big_query.use_topic_schema.unwrap_or_default(),
        use_table_schema: big_query.use_table_schema.unwrap_or_default(),
        drop_unknown_fields: big_query.drop_unknown_fields.unwrap_or_default(),
        write_metadata: big_query.write_metadata.unwrap_or_default(),
        service_account_email: big_query.service_account_email.as_str().to_owned(),
        ..Default::default()
    }
}

fn expand_cloud_storage_config(cloud_storage: &CloudStorageConfigState) -> DuploPubSubCloudStorageConfig {
    DuploPubSubCloudStorageConfig {
        bucket: cloud_storage.bucket.as_str().to_owned(),
        filename_prefix: cloud_storage.filename_prefix.as_str().to_owned(),
        filename_suffix: cloud_storage.filename_suffix.as_str().to_owned(),
        filename_datetime_format: cloud_storage.filename_datetime_format.as_str().to_owned(),
        max_duration: cloud_storage.max_duration.as_str().to_owned(),
        max_bytes: cloud_storage.max_bytes.unwrap_or_default(),
        max_messages: cloud_storage.max_messages.unwrap_or_default(),
        service_account_email: cloud_storage.service_account_email.as_str().to_owned(),
        ..Default::default()
    }
}

fn expand_subscription(state: &GcpPubSubSubscriptionState) -> DuploPubSubSubscription {
    let mut rq = DuploPubSubSubscription {
        name: state.name.as_str().to_owned(),
        topic: state.topic.as_str().to_owned(),
        ack_deadline_seconds: state.ack_deadline_seconds.unwrap_or(DEFAULT_ACK_DEADLINE),
        message_retention_duration: state
            .message_retention_duration
            .as_deref_option()
            .unwrap_or(DEFAULT_RETENTION)
            .to_owned(),
        retain_acked_messages: state.retain_acked_messages.unwrap_or_default(),
        filter: state.filter.as_str().to_owned(),
        enable_message_ordering: state.enable_message_ordering.unwrap_or_default(),
        enable_exactly_once_delivery: state.enable_exactly_once_delivery.unwrap_or_default(),
        expiration_policy: state
            .expiration_policy
            .as_ref_option()
            .map(|policy| DuploPubSubExpirationPolicy {
                ttl: policy.ttl.as_str().to_owned(),
            }),
        dead_letter_policy: state
            .dead_letter_policy
            .as_ref_option()
            .map(|policy| DuploPubSubDeadLetterPolicy {
                dead_letter_topic: policy.dead_letter_topic.as_str().to_owned(),
                max_delivery_attempts: policy.max_delivery_attempts.unwrap_or_default(),
            }),
        retry_policy: state
            .retry_policy
            .as_ref_option()
            .map(|policy| DuploPubSubRetryPolicy {
                minimum_backoff: policy.minimum_backoff.as_str().to_owned(),
                maximum_backoff: policy.maximum_backoff.as_str().to_owned(),
            }),
        labels: expand_string_map(&state.labels).unwrap_or_default(),
        subscription_type: "Pull".to_owned(),
        ..Default::default()
    };

    if let Some(big_query) = state.big_query.as_ref_option() {
        rq.big_query = Some(expand_big_query(big_query));
        rq.subscription_type = "BigQuery".to_owned();
    }
    if let Some(cloud_storage) = state.cloud_storage_config.as_ref_option() {
        rq.cloud_storage_config = Some(expand_cloud_storage_config(cloud_storage));
        rq.subscription_type = "CloudStorage".to_owned();
    }
    if let Some(push) = state.push_config.as_ref_option() {
        rq.push_config = Some(expand_push_config(push));
        rq.subscription_type = "Push".to_owned();
    }
    rq
}

fn string<'a>(value: &str) -> ValueString<'a> {
    Value::Value(value.to_owned().into())
}

/// Keep the configured name when the API returns its fully qualified form
fn keep_reference<'a>(configured: &ValueString<'a>, remote: &str) -> ValueString<'a> {
    match configured.as_deref_option() {
        Some(name) if remote == name || remote.ends_with(&format!("/{name}")) => configured.clone(),
        _ => string(remote),
    }
}

fn same_duration(configured: &str, remote: Duration) -> bool {
    if configured.is_empty() {
        return remote.is_zero();
    }
    parse_unit_duration(configured, DURATION_FRACTION_DIGITS) == Some(remote)
}

/// Keep the configured spelling of a duration the API returns in seconds
fn keep_duration<'a>(configured: Option<&ValueString<'a>>, remote: SecondNano) -> ValueString<'a> {
    match (configured, remote.to_duration()) {
        (Some(configured), Some(remote))
            if configured
                .as_deref_option()
                .is_some_and(|duration| same_duration(duration, remote)) =>
        {
            configured.clone()
        }
        _ => string(&remote.to_duration_string()),
    }
}

fn keep_duration_text<'a>(configured: &ValueString<'a>, remote: &str) -> ValueString<'a> {
    let remote_duration = parse_unit_duration(remote, DURATION_FRACTION_DIGITS);
    match (configured.as_deref_option(), remote_duration) {
        (Some(_), _) if remote.is_empty() => configured.clone(),
        (Some(duration), Some(remote)) if same_duration(duration, remote) => configured.clone(),
        _ => string(remote),
    }
}

fn flatten_push_config<'a>(
    configured: Option<&PushConfigState<'a>>,
    push: &DuploPubSubPushConfig,
    import: bool,
) -> PushConfigState<'a> {
    let oidc_configured = configured.is_some_and(|configured| configured.oidc_token.is_value());
    let oidc_token = match &push.oidc_token {
        Some(token) if (import || oidc_configured) && !token.service_account_email.is_empty() => {
            let audience = configured
                .and_then(|configured| configured.oidc_token.as_ref_option())
                .map(|configured| &configured.audience)
                .filter(|audience| audience.is_null() && token.audience.is_empty())
                .cloned()
                .unwrap_or_else(|| string(&token.audience));
            Value::Value(OidcTokenState {
                service_account_email: string(&token.service_account_email),
                audience,
            })
        }
        _ => Value::Null,
    };
    PushConfigState {
        push_endpoint: string(&push.push_endpoint),
        attributes: flatten_string_map(push.attributes.as_ref()),
        oidc_token,
    }
}

fn flatten_big_query<'a>(big_query: &DuploPubSubBigQuery) -> BigQueryState<'a> {
    BigQueryState {
        table: string(&big_query.table),
        use_topic_schema: Value::Value(big_query.use_topic_schema),
        use_table_schema: Value::Value(big_query.use_table_schema),
        drop_unknown_fields: Value::Value(big_query.drop_unknown_fields),
        write_metadata: Value::Value(big_query.write_metadata),
        service_account_email: string(&big_query.service_account_email),
        state: string(&pubsub_state_name(&big_query.state)),
    }
}

fn flatten_cloud_storage_config<'a>(
    configured: Option<&CloudStorageConfigState<'a>>,
    cloud_storage: &DuploPubSubCloudStorageConfig,
) -> CloudStorageConfigState<'a> {
    let max_duration = match configured.map(|configured| &configured.max_duration) {
        Some(duration) => keep_duration_text(duration, &cloud_storage.max_duration),
        None => string(&cloud_storage.max_duration),
    };
    CloudStorageConfigState {
        bucket: string(&cloud_storage.bucket),
        filename_prefix: string(&cloud_storage.filename_prefix),
        filename_suffix: string(&cloud_storage.filename_suffix),
        filename_datetime_format: string(&cloud_storage.filename_datetime_format),
        max_duration,
        max_bytes: Value::Value(cloud_storage.max_bytes),
        max_messages: Value::Value(cloud_storage.max_messages),
        service_account_email: string(&cloud_storage.service_account_email),
        state: string(&pubsub_state_name(&cloud_storage.state)),
    }
}

/// Copy the subscription into the state
///
/// Optional blocks absent from the state are only filled on import.
fn flatten_subscription<'a>(
    state: &mut GcpPubSubSubscriptionState<'a>,
    rp: &DuploPubSubSubscriptionResponse,
    import: bool,
) {
    state.topic = keep_reference(&state.topic, &rp.topic);
    state.ack_deadline_seconds = Value::Value(rp.ack_deadline_seconds);
    state.message_retention_duration =
        keep_duration_text(&state.message_retention_duration, &rp.message_retention_duration);
    state.retain_acked_messages = Value::Value(rp.retain_acked_messages);
    if !rp.filter.is_empty() || state.filter.is_value() {
        state.filter = string(&rp.filter);
    }
    state.enable_message_ordering = Value::Value(rp.enable_message_ordering);
    state.enable_exactly_once_delivery = Value::Value(rp.enable_exactly_once_delivery);
    state.labels = flatten_string_map(rp.labels.as_ref());

    state.push_config = match &rp.push_config {
        Some(push) if import || state.push_config.is_value() => Value::Value(flatten_push_config(
            state.push_config.as_ref_option(),
            push,
            import,
        )),
        _ => Value::Null,
    };
    state.big_query = match &rp.big_query {
        Some(big_query) if import || state.big_query.is_value() => {
            Value::Value(flatten_big_query(big_query))
        }
        _ => Value::Null,
    };
    state.cloud_storage_config = match &rp.cloud_storage_config {
        Some(cloud_storage) if import || state.cloud_storage_config.is_value() => Value::Value(
            flatten_cloud_storage_config(state.cloud_storage_config.as_ref_option(), cloud_storage),
        ),
        _ => Value::Null,
    };
    state.expiration_policy = match &rp.expiration_policy {
        Some(policy) if import || state.expiration_policy.is_value() => {
            let configured = state.expiration_policy.as_ref_option().map(|p| &p.ttl);
            Value::Value(ExpirationPolicyState {
                ttl: keep_duration(configured, policy.ttl),
            })
        }
        _ => Value::Null,
    };
    state.dead_letter_policy = match &rp.dead_letter_policy {
        Some(policy) if import || state.dead_letter_policy.is_value() => {
            let dead_letter_topic = match state.dead_letter_policy.as_ref_option() {
                Some(configured) => keep_reference(&configured.dead_letter_topic, &policy.dead_letter_topic),
                None => string(&policy.dead_letter_topic),
            };
            Value::Value(DeadLetterPolicyState {
                dead_letter_topic,
                max_delivery_attempts: Value::Value(policy.max_delivery_attempts),
            })
        }
        _ => Value::Null,
    };
    state.retry_policy = match &rp.retry_policy {
        Some(policy) if import || state.retry_policy.is_value() => {
            let configured = state.retry_policy.as_ref_option();
            Value::Value(RetryPolicyState {
                minimum_backoff: keep_duration(
                    configured.map(|p| &p.minimum_backoff),
                    policy.minimum_backoff,
                ),
                maximum_backoff: keep_duration(
                    configured.map(|p| &p.maximum_backoff),
                    policy.maximum_backoff,
                ),
            })
        }
        _ => Value::Null,
    };
}

/// Parse `{tenant_id}/{name}`
fn parse_id(id: &str) -> Option<(&str, &str)> {
    match split_id(id, 2)?.as_slice() {
        [tenant_id, name] => Some((tenant_id, name)),
        _ => None,
    }
}

fn subscription_id(state: &GcpPubSubSubscriptionState) -> ValueString<'static> {
    match (state.tenant_id.as_deref_option(), state.name.as_deref_option()) {
        (Some(tenant_id), Some(name)) => Value::Value(format!("{tenant_id}/{name}").into()),
        _ => Value::Unknown,
    }
}

#[derive(Debug, Default, Clone)]
pub struct GcpPubSubSubscriptionResource {
    client: ClientHandle,
}

impl GcpPubSubSubscriptionResource {
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: GcpPubSubSubscriptionState<'a>,
        import: bool,
    ) -> Option<GcpPubSubSubscriptionState<'a>> {
        let client = self.client.get(diags).await?;
        let id = state.id.as_str().to_owned();
        let Some((tenant_id, name)) = parse_id(&id) else {
            invalid_id(diags, "duplocloud_gcp_pubsub_subscription", &id, "{tenant_id}/{name}");
            return None;
        };

        let subscription = match client.gcp_pubsub_subscription_get(tenant_id, name).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return None,
            Err(err) if err.is_not_found() => return None,
            Err(err) => {
                diags.root_error(
                    format!("Unable to retrieve tenant {tenant_id} pubsub subscription '{name}'"),
                    err.to_string(),
                );
                return None;
            }
        };

        state.tenant_id = string(tenant_id);
        state.name = string(name);
        flatten_subscription(&mut state, &subscription, import);
        Some(state)
    }
}

#[async_trait]
impl Resource for GcpPubSubSubscriptionResource {
    type State<'a> = GcpPubSubSubscriptionState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(GcpPubSubSubscriptionState::schema())
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
        let state = self.refresh(diags, state, false).await?;
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
        state.id = subscription_id(&state);
        plan_computed(&mut state);

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state.clone();
        state.normalize(diags);

        let mut trigger_replace = Vec::new();
        for (name, proposed, prior) in [
            ("tenant_id", &state.tenant_id, &prior_state.tenant_id),
            ("name", &state.name, &prior_state.name),
            ("topic", &state.topic, &prior_state.topic),
            ("filter", &state.filter, &prior_state.filter),
        ] {
            if proposed != prior {
                trigger_replace.push(AttributePath::new(name));
            }
        }

        if !trigger_replace.is_empty() {
            state.id = subscription_id(&state);
        }
        plan_computed(&mut state);

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

        let rq = expand_subscription(&state);
        debug!(%tenant_id, %name, subscription_type = %rq.subscription_type, "creating pubsub subscription");

        let created = async {
            client.gcp_pubsub_subscription_create(&tenant_id, &rq).await?;
            wait_for_resource_to_be_present_after_create(KIND, &id, timeout, || {
                client.gcp_pubsub_subscription_get(&tenant_id, &name)
            })
            .await
        }
        .await;
        let subscription = match created {
            Ok(subscription) => subscription,
            Err(err) => {
                diags.root_error(
                    format!(
                        "Unable to create tenant {tenant_id} pubsub subscription '{name}' on topic '{}'",
                        rq.topic
                    ),
                    err.to_string(),
                );
                return None;
            }
        };

        state.id = Value::Value(id.into());
        flatten_subscription(&mut state, &subscription, false);

        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let state = planned_state.clone();
        let tenant_id = state.tenant_id.as_str().to_owned();
        let name = state.name.as_str().to_owned();

        let rq = expand_subscription(&state);
        debug!(%tenant_id, %name, subscription_type = %rq.subscription_type, "updating pubsub subscription");

        if let Err(err) = with_timeout(
            update_timeout(&state.timeouts, TIMEOUTS),
            client.gcp_pubsub_subscription_update(&tenant_id, &rq),
        )
        .await
        {
            diags.root_error(
                format!("Unable to update tenant {tenant_id} pubsub subscription '{name}'"),
                err,
            );
            return None;
        }

        let Some(state) = self.refresh(diags, state, false).await else {
            if diags.errors.is_empty() {
                diags.root_error_short(format!(
                    "Tenant {tenant_id} pubsub subscription '{name}' disappeared after its update"
                ));
            }
            return None;
        };
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
            invalid_id(diags, "duplocloud_gcp_pubsub_subscription", id, "{tenant_id}/{name}");
            return None;
        };
        let timeout = delete_timeout(&state.timeouts, TIMEOUTS);
        debug!(tenant_id, name, "deleting pubsub subscription");

        let deleted = async {
            match client.gcp_pubsub_subscription_delete(tenant_id, name).await {
                Err(err) if err.is_not_found() => return Ok(()),
                result => result?,
            }
            wait_for_resource_to_be_missing_after_delete(KIND, id, timeout, || {
                client.gcp_pubsub_subscription_get(tenant_id, name)
            })
            .await
        }
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                format!("Unable to delete tenant {tenant_id} pubsub subscription '{name}'"),
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
        let state = GcpPubSubSubscriptionState {
            id: Value::Value(id.into()),
            ..Default::default()
        };
        let state = self.refresh(diags, state, true).await?;
        Some((state, Default::default()))
    }
}
