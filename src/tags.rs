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

//! Reconciliation of key/value lists partially managed by Terraform
//!
//! DuploCloud objects often carry key/value lists that are written by several
//! actors. Only the keys declared in the configuration are owned by Terraform:
//! they are recorded in a computed `specified_*` attribute so that later plans
//! only touch those keys and leave the others alone.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{Value, ValueList, ValueMap, ValueString};

use crate::duplosdk::DuploKeyStringValue;

/// Element of a key/value list in Terraform state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct KeyValueState<'a> {
    #[serde(borrow = "'a")]
    pub key: ValueString<'a>,
    pub value: ValueString<'a>,
}

pub type KeyValueList<'a> = ValueList<Value<KeyValueState<'a>>>;

/// Nested block for a configurable key/value list
pub fn key_value_block(description: &'static str) -> NestedBlock {
    NestedBlock::List(Block {
        attributes: map! {
            "key" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Key"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "value" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Value"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        },
        description: Description::plain(description),
        ..Default::default()
    })
}

/// Attribute type of a computed key/value list
pub fn key_value_list_type() -> AttributeType {
    AttributeType::List(
        AttributeType::Object(map! {
            "key" => AttributeType::String,
            "value" => AttributeType::String,
        })
        .into(),
    )
}

/// Convert a Terraform key/value list into API key/values
///
/// Returns `None` if the list is null or unknown.
pub fn expand_key_values(list: &KeyValueList) -> Option<Vec<DuploKeyStringValue>> {
    list.as_ref_option().map(|list| {
        list.iter()
            .flatten()
            .map(|kv| DuploKeyStringValue::new(kv.key.as_str(), kv.value.as_str()))
            .collect()
    })
}

/// Convert API key/values into a Terraform key/value list
pub fn flatten_key_values<'a>(list: &[DuploKeyStringValue]) -> KeyValueList<'a> {
    Value::Value(
        list.iter()
            .map(|kv| {
                Value::Value(KeyValueState {
                    key: Value::Value(Cow::Owned(kv.key.clone())),
                    value: Value::Value(Cow::Owned(kv.value.clone())),
                })
            })
            .collect(),
    )
}

pub fn expand_string_list(list: &ValueList<ValueString>) -> Vec<String> {
    list.iter()
        .flatten()
        .filter_map(|s| s.as_ref_option().map(|s| s.to_string()))
        .collect()
}

pub fn flatten_string_list<'a>(list: &[String]) -> ValueList<ValueString<'a>> {
    Value::Value(
        list.iter()
            .map(|s| Value::Value(Cow::Owned(s.clone())))
            .collect(),
    )
}

/// Convert a Terraform string map, `None` if the map is null or unknown
pub fn expand_string_map(map: &ValueMap<ValueString>) -> Option<BTreeMap<String, String>> {
    let map = map.as_ref_option()?;
    Some(
        map.iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref_option()
                    .map(|value| (key.to_string(), value.to_string()))
            })
            .collect(),
    )
}

pub fn flatten_string_map<'a>(map: Option<&BTreeMap<String, String>>) -> ValueMap<'a, ValueString<'a>> {
    Value::Value(
        map.into_iter()
            .flatten()
            .map(|(key, value)| (Cow::Owned(key.clone()), Value::Value(Cow::Owned(value.clone()))))
            .collect(),
    )
}

/// Keys declared in a key/value list, unknown while any of them is unknown
pub fn declared_keys<'a>(list: &KeyValueList<'a>) -> ValueList<ValueString<'a>> {
    match list {
        Value::Value(list) => {
            let mut keys = Vec::with_capacity(list.len());
            for kv in list {
                match kv {
                    Value::Value(kv) if kv.key.is_value() => keys.push(kv.key.clone()),
                    Value::Null => (),
                    _ => return Value::Unknown,
                }
            }
            Value::Value(keys)
        }
        Value::Null => Value::Value(Vec::new()),
        Value::Unknown => Value::Unknown,
    }
}

/// Keep the entries of `all` whose key is in `keys`, in the order of `all`
pub fn select_key_values(all: &[DuploKeyStringValue], keys: &[String]) -> Vec<DuploKeyStringValue> {
    let keys: HashSet<&str> = keys.iter().map(String::as_str).collect();
    all.iter()
        .filter(|kv| keys.contains(kv.key.as_str()))
        .cloned()
        .collect()
}

/// Keep the entries of `all` whose key is in `keys`, in the order of `keys`
pub fn select_key_values_ordered(all: &[DuploKeyStringValue], keys: &[String]) -> Vec<DuploKeyStringValue> {
    keys.iter()
        .filter_map(|key| all.iter().find(|kv| &kv.key == key))
        .cloned()
        .collect()
}

/// Changes to apply to the Terraform managed part of a key/value list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManagedChanges {
    /// Managed entries currently present upstream
    pub existing: Vec<DuploKeyStringValue>,
    /// Entries that must be present after the change
    pub desired: Vec<DuploKeyStringValue>,
    /// Keys that were managed and must be removed
    pub deleted_keys: Vec<String>,
    /// Keys managed after the change
    pub specified: Vec<String>,
}

/// Compute the changes of the Terraform managed keys
///
/// * `all` - every entry currently present upstream
/// * `previously_specified` - keys managed until now
/// * `desired` - entries declared in the configuration, `None` if the attribute is absent
pub fn tf_managed_changes(
    all: &[DuploKeyStringValue],
    previously_specified: &[String],
    desired: Option<Vec<DuploKeyStringValue>>,
) -> ManagedChanges {
    let existing = select_key_values(all, previously_specified);

    match desired {
        Some(desired) => {
            let specified: Vec<String> = desired.iter().map(|kv| kv.key.clone()).collect();
            let deleted_keys = existing
                .iter()
                .filter(|kv| !specified.contains(&kv.key))
                .map(|kv| kv.key.clone())
                .collect();
            ManagedChanges {
                existing,
                desired,
                deleted_keys,
                specified,
            }
        }
        None => ManagedChanges {
            deleted_keys: previously_specified.to_vec(),
            existing,
            desired: Vec::new(),
            specified: Vec::new(),
        },
    }
}

/// Split upstream entries into everything and the Terraform managed subset
///
/// The managed subset follows the order of `specified`. Without any
/// previously specified keys, nothing is managed.
pub fn flatten_tf_managed(
    all: &[DuploKeyStringValue],
    specified: Option<&[String]>,
) -> (Vec<DuploKeyStringValue>, Vec<DuploKeyStringValue>) {
    let managed = match specified {
        Some(keys) => select_key_values_ordered(all, keys),
        None => Vec::new(),
    };
    (all.to_vec(), managed)
}

/// Keys to create and keys to remove to go from `old` to `new`
///
/// A key whose value changed appears in both maps: with its new value in the
/// first one and its old value in the second one. Unchanged keys appear in
/// neither.
pub fn diff_string_maps(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let mut create = new.clone();
    let mut remove = BTreeMap::new();

    for (key, value) in old {
        match create.get(key) {
            Some(new_value) if new_value == value => {
                create.remove(key);
            }
            _ => {
                remove.insert(key.clone(), value.clone());
            }
        }
    }

    (create, remove)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(key: &str, value: &str) -> DuploKeyStringValue {
        DuploKeyStringValue::new(key, value)
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn select_keeps_upstream_order() {
        let all = vec![kv("a", "1"), kv("b", "2"), kv("c", "3")];
        assert_eq!(
            select_key_values(&all, &keys(&["c", "a", "missing"])),
            vec![kv("a", "1"), kv("c", "3")]
        );
        assert_eq!(
            select_key_values_ordered(&all, &keys(&["c", "a", "missing"])),
            vec![kv("c", "3"), kv("a", "1")]
        );
        assert!(select_key_values(&all, &[]).is_empty());
    }

    #[test]
    fn managed_changes_leave_external_keys_alone() {
        let all = vec![kv("managed", "1"), kv("dropped", "2"), kv("external", "3")];
        let changes = tf_managed_changes(
            &all,
            &keys(&["managed", "dropped"]),
            Some(vec![kv("managed", "10"), kv("added", "4")]),
        );
        assert_eq!(changes.existing, vec![kv("managed", "1"), kv("dropped", "2")]);
        assert_eq!(changes.deleted_keys, keys(&["dropped"]));
        assert_eq!(changes.specified, keys(&["managed", "added"]));
        assert_eq!(changes.desired, vec![kv("managed", "10"), kv("added", "4")]);
    }

    #[test]
    fn managed_changes_without_configuration_drop_everything_managed() {
        let all = vec![kv("managed", "1"), kv("external", "3")];
        let changes = tf_managed_changes(&all, &keys(&["managed", "gone"]), None);
        assert_eq!(changes.existing, vec![kv("managed", "1")]);
        assert_eq!(changes.deleted_keys, keys(&["managed", "gone"]));
        assert!(changes.specified.is_empty());
        assert!(changes.desired.is_empty());
    }

    #[test]
    fn flatten_only_reports_specified_keys() {
        let all = vec![kv("a", "1"), kv("b", "2")];
        let specified = keys(&["b", "a", "c"]);
        let (everything, managed) = flatten_tf_managed(&all, Some(&specified));
        assert_eq!(everything, all);
        assert_eq!(managed, vec![kv("b", "2"), kv("a", "1")]);

        let (_, managed) = flatten_tf_managed(&all, None);
        assert!(managed.is_empty());
    }

    #[test]
    fn diff_maps() {
        let old = map(&[("same", "1"), ("changed", "old"), ("removed", "x")]);
        let new = map(&[("same", "1"), ("changed", "new"), ("added", "y")]);
        let (create, remove) = diff_string_maps(&old, &new);
        assert_eq!(create, map(&[("changed", "new"), ("added", "y")]));
        assert_eq!(remove, map(&[("changed", "old"), ("removed", "x")]));
    }

    #[test]
    fn state_conversions() {
        let list = flatten_key_values(&[kv("a", "1"), kv("b", "")]);
        assert_eq!(expand_key_values(&list), Some(vec![kv("a", "1"), kv("b", "")]));
        assert_eq!(expand_key_values(&Value::Null), None);
        assert_eq!(expand_key_values(&Value::Unknown), None);

        let strings = flatten_string_list(&keys(&["x", "y"]));
        assert_eq!(expand_string_list(&strings), keys(&["x", "y"]));
    }

    #[test]
    fn declared() {
        let list = flatten_key_values(&[kv("a", "1"), kv("b", "2")]);
        assert_eq!(expand_string_list(&declared_keys(&list)), keys(&["a", "b"]));
        assert_eq!(declared_keys(&Value::Null), Value::Value(Vec::new()));

        let partially_known: KeyValueList = Value::Value(vec![Value::Value(KeyValueState {
            key: Value::Unknown,
            value: Value::Value("1".into()),
        })]);
        assert!(declared_keys(&partially_known).is_unknown());
    }
}
