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

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::WithValidate;

/// Optional `timeouts` block of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeoutsState<'a> {
    #[serde(borrow = "'a")]
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

/// Timeouts used when the configuration does not set them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTimeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl DefaultTimeouts {
    pub const fn new(create: Duration, update: Duration, delete: Duration) -> Self {
        Self {
            create,
            update,
            delete,
        }
    }

    pub const fn minutes(create: u64, update: u64, delete: u64) -> Self {
        Self::new(
            Duration::from_secs(create * 60),
            Duration::from_secs(update * 60),
            Duration::from_secs(delete * 60),
        )
    }
}

pub fn timeouts_block() -> NestedBlock {
    let timeout_attribute = |description: &'static str| Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    };
    NestedBlock::Optional(Block {
        attributes: map! {
            "create" => timeout_attribute("Timeout of the creation, like `30s`, `15m` or `1h30m`"),
            "update" => timeout_attribute("Timeout of an update, like `30s`, `15m` or `1h30m`"),
            "delete" => timeout_attribute("Timeout of the deletion, like `30s`, `15m` or `1h30m`"),
        },
        description: Description::plain("Operation timeouts"),
        ..Default::default()
    })
}

lazy_static! {
    static ref DURATION_RE: Option<Regex> = Regex::new(r"^(\d+(\.\d+)?(h|ms|m|s))+$").ok();
    static ref DURATION_PART_RE: Option<Regex> = Regex::new(r"(\d+(?:\.\d+)?)(h|ms|m|s)").ok();
}

/// Parse a duration made of decimal numbers with a unit suffix, like `1h30m` or `2.5s`
///
/// Durations too large to be represented are rejected.
pub fn parse_duration(value: &str) -> Option<Duration> {
    if !DURATION_RE.as_ref()?.is_match(value) {
        return None;
    }
    let mut seconds = 0.0;
    for captures in DURATION_PART_RE.as_ref()?.captures_iter(value) {
        let number: f64 = captures[1].parse().ok()?;
        seconds += number
            * match &captures[2] {
                "h" => 3600.0,
                "m" => 60.0,
                "s" => 1.0,
                _ => 0.001,
            };
    }
    Duration::try_from_secs_f64(seconds).ok()
}

fn timeout_or(value: &ValueString, default: Duration) -> Duration {
    value
        .as_deref_option()
        .and_then(parse_duration)
        .unwrap_or(default)
}

pub fn create_timeout(timeouts: &Value<TimeoutsState>, defaults: DefaultTimeouts) -> Duration {
    timeouts
        .as_ref_option()
        .map_or(defaults.create, |t| timeout_or(&t.create, defaults.create))
}

pub fn update_timeout(timeouts: &Value<TimeoutsState>, defaults: DefaultTimeouts) -> Duration {
    timeouts
        .as_ref_option()
        .map_or(defaults.update, |t| timeout_or(&t.update, defaults.update))
}

pub fn delete_timeout(timeouts: &Value<TimeoutsState>, defaults: DefaultTimeouts) -> Duration {
    timeouts
        .as_ref_option()
        .map_or(defaults.delete, |t| timeout_or(&t.delete, defaults.delete))
}

impl<'a> WithValidate for Value<TimeoutsState<'a>> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let Value::Value(timeouts) = self else {
            return;
        };
        for (name, value) in [
            ("create", &timeouts.create),
            ("update", &timeouts.update),
            ("delete", &timeouts.delete),
        ] {
            if let Some(value) = value.as_deref_option() {
                if parse_duration(value).is_none() {
                    diags.error(
                        format!("Invalid `{name}` timeout"),
                        format!("`{value}` is not a valid duration, expected something like `30s`, `15m` or `1h30m`"),
                        attr_path.clone().index(0).attribute(name),
                    );
                }
            }
        }
    }
}
