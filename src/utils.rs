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
use tf_provider::schema::Schema;
use tf_provider::value::{ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

/// Split a resource id made of `n` non-empty parts separated by `/`
///
/// The last part keeps any remaining `/`.
pub(crate) fn split_id(id: &str, n: usize) -> Option<Vec<&str>> {
    let parts: Vec<&str> = id.splitn(n, '/').collect();
    if parts.len() == n && parts.iter().all(|part| !part.is_empty()) {
        Some(parts)
    } else {
        None
    }
}

/// Report an invalid resource id
pub(crate) fn invalid_id(diags: &mut Diagnostics, kind: &str, id: &str, expected: &str) {
    diags.root_error(
        format!("Invalid `{kind}` id"),
        format!("Invalid resource ID '{id}', expected '{expected}'"),
    );
}

/// Run a validator on a known string value and report its error at `attr_path`
pub(crate) fn check_string<F>(
    diags: &mut Diagnostics,
    value: &ValueString,
    attr_path: AttributePath,
    validator: F,
) where
    F: FnOnce(&str, &str) -> Result<(), String>,
{
    if let Some(value) = value.as_deref_option() {
        let key = attr_path.to_string();
        if let Err(err) = validator(&key, value) {
            diags.error("Invalid attribute value", err, attr_path);
        }
    }
}

/// Run a validator on a known number and report its error at `attr_path`
pub(crate) fn check_number<F>(
    diags: &mut Diagnostics,
    value: &ValueNumber,
    attr_path: AttributePath,
    validator: F,
) where
    F: FnOnce(&str, i64) -> Result<(), String>,
{
    if let Some(value) = value.as_ref_option() {
        let key = attr_path.to_string();
        if let Err(err) = validator(&key, *value) {
            diags.error("Invalid attribute value", err, attr_path);
        }
    }
}

pub(crate) fn validate_uuid(key: &str, value: &str) -> Result<(), String> {
    match uuid::Uuid::parse_str(value) {
        Ok(_) if value.len() == 36 => Ok(()),
        _ => Err(format!("expected {key:?} to be a valid UUID, got {value}")),
    }
}

pub(crate) fn validate_json_object(key: &str, value: &str) -> Result<(), String> {
    if !value.starts_with('{') {
        return Err(format!("{key:?} contains invalid JSON"));
    }
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("{key:?} contains an invalid JSON: {err}")),
    }
}

lazy_static! {
    static ref SUBDOMAIN_RE: Option<Regex> = Regex::new(r"^[a-z0-9]([a-z0-9.-]*[a-z0-9])?$").ok();
}

/// Kubernetes object names: lowercase RFC 1123 subdomain of at most 253 characters
pub(crate) fn validate_subdomain(key: &str, value: &str) -> Result<(), String> {
    if value.is_empty() || value.len() > 253 {
        return Err(format!(
            "expected length of {key} to be in the range (1 - 253), got {value}"
        ));
    }
    let valid = SUBDOMAIN_RE.as_ref().is_some_and(|re| re.is_match(value));
    if !valid {
        return Err(format!("invalid value for {key} (Invalid Kubernetes configmap name)"));
    }
    if value.contains("..") {
        return Err(format!("expected {key} to not contain '..', got {value}"));
    }
    Ok(())
}

pub(crate) fn validate_int_between(min: i64, max: i64) -> impl Fn(&str, i64) -> Result<(), String> {
    move |key, value| {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(format!(
                "expected {key} to be in the range ({min} - {max}), got {value}"
            ))
        }
    }
}

pub(crate) fn validate_string_in_slice(
    valid: &'static [&'static str],
    ignore_case: bool,
) -> impl Fn(&str, &str) -> Result<(), String> {
    move |key, value| {
        let found = valid.iter().any(|candidate| {
            if ignore_case {
                candidate.eq_ignore_ascii_case(value)
            } else {
                *candidate == value
            }
        });
        if found {
            Ok(())
        } else {
            Err(format!("expected {key} to be one of {valid:?}, got {value}"))
        }
    }
}

lazy_static! {
    static ref UNIT_DURATION_RE: Option<Regex> = Regex::new(r"^(\d+)(\.\d+)?([smh])$").ok();
}

/// Parse a duration like `600s`, `10m`, `1h` or `3.5s`
///
/// The fractional part has at most `max_fraction_digits` digits.
pub(crate) fn parse_unit_duration(value: &str, max_fraction_digits: usize) -> Option<Duration> {
    let captures = UNIT_DURATION_RE.as_ref()?.captures(value)?;
    let whole: f64 = captures[1].parse().ok()?;
    let fraction: f64 = match captures.get(2) {
        Some(fraction) if fraction.len() > max_fraction_digits + 1 => return None,
        Some(fraction) => fraction.as_str().parse().ok()?,
        None => 0.0,
    };
    let unit = match &captures[3] {
        "s" => 1.0,
        "m" => 60.0,
        _ => 3600.0,
    };
    Duration::try_from_secs_f64((whole + fraction) * unit).ok()
}

pub(crate) fn validate_duration_between(
    min: Duration,
    max: Duration,
    max_fraction_digits: usize,
) -> impl Fn(&str, &str) -> Result<(), String> {
    move |key, value| {
        let duration = parse_unit_duration(value, max_fraction_digits).ok_or_else(|| {
            format!(
                "invalid duration format for key '{key}', must be in the form of '600s', '10m', '1h', or fractional like '600.{max_fraction_digits}s'"
            )
        })?;
        if duration < min || duration > max {
            return Err(format!(
                "duration for key '{key}' must be between {} and {}",
                format_duration(min),
                format_duration(max)
            ));
        }
        Ok(())
    }
}

/// Format a duration as `1h2m3s`, dropping leading zero units
pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Whether two JSON texts hold the same value
pub(crate) fn suppress_equivalent_json(old: &str, new: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(old),
        serde_json::from_str::<serde_json::Value>(new),
    ) {
        (Ok(old), Ok(new)) => old == new,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids() {
        assert_eq!(split_id("t/name", 2), Some(vec!["t", "name"]));
        assert_eq!(
            split_id("t/arn:aws:s3:::b/p/key", 2),
            Some(vec!["t", "arn:aws:s3:::b/p/key"])
        );
        assert_eq!(split_id("t", 2), None);
        assert_eq!(split_id("t//rule", 3), None);
    }

    #[test]
    fn uuid() {
        assert!(validate_uuid("tenant_id", "1b6f2c2a-3f5f-4b52-9d4e-0a4f1f7f3c11").is_ok());
        assert_eq!(
            validate_uuid("tenant_id", "not-a-uuid"),
            Err("expected \"tenant_id\" to be a valid UUID, got not-a-uuid".to_owned())
        );
    }

    #[test]
    fn json_object() {
        assert!(validate_json_object("data", r#"{"a": 1}"#).is_ok());
        assert!(validate_json_object("data", "[1]").is_err());
        assert!(validate_json_object("data", "{").is_err());
        assert!(validate_json_object("data", "").is_err());
    }

    #[test]
    fn subdomain() {
        assert!(validate_subdomain("name", "my-config.v1").is_ok());
        assert!(validate_subdomain("name", "a").is_ok());
        assert!(validate_subdomain("name", "My-Config").is_err());
        assert!(validate_subdomain("name", "-bad").is_err());
        assert!(validate_subdomain("name", "bad.").is_err());
        assert!(validate_subdomain("name", "a..b").is_err());
        assert!(validate_subdomain("name", &"a".repeat(254)).is_err());
    }

    #[test]
    fn ranges() {
        let check = validate_int_between(10, 600);
        assert!(check("ack_deadline_seconds", 10).is_ok());
        assert!(check("ack_deadline_seconds", 600).is_ok());
        assert_eq!(
            check("ack_deadline_seconds", 5),
            Err("expected ack_deadline_seconds to be in the range (10 - 600), got 5".to_owned())
        );

        let check = validate_string_in_slice(&["ENABLED", "DISABLED"], true);
        assert!(check("state", "enabled").is_ok());
        assert!(check("state", "paused").is_err());
        let check = validate_string_in_slice(&["ENABLED", "DISABLED"], false);
        assert!(check("state", "enabled").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_unit_duration("600s", 9), Some(Duration::from_secs(600)));
        assert_eq!(parse_unit_duration("10m", 9), Some(Duration::from_secs(600)));
        assert_eq!(parse_unit_duration("1h", 9), Some(Duration::from_secs(3600)));
        assert_eq!(parse_unit_duration("3.5s", 9), Some(Duration::from_millis(3500)));
        assert_eq!(parse_unit_duration("3.5s", 0), None);
        assert_eq!(parse_unit_duration("10d", 9), None);

        let check = validate_duration_between(
            Duration::from_secs(600),
            Duration::from_secs(604800),
            9,
        );
        assert!(check("message_retention_duration", "604800s").is_ok());
        assert_eq!(
            check("message_retention_duration", "60s"),
            Err("duration for key 'message_retention_duration' must be between 10m0s and 168h0m0s".to_owned())
        );
        assert!(check("message_retention_duration", "ten").is_err());
    }

    #[test]
    fn oversized_duration_is_rejected() {
        assert_eq!(parse_unit_duration("99999999999999999999999h", 9), None);
        let check = validate_duration_between(
            Duration::from_secs(600),
            Duration::from_secs(604800),
            9,
        );
        assert!(check("message_retention_duration", "99999999999999999999999h").is_err());
    }

    #[test]
    fn json() {
        assert!(suppress_equivalent_json(r#"{"a":1,"b":2}"#, r#"{ "b": 2, "a": 1 }"#));
        assert!(!suppress_equivalent_json(r#"{"a":1}"#, r#"{"a":2}"#));
        assert!(!suppress_equivalent_json("{", "{"));
    }
}
