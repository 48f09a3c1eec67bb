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

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in a single path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

const SLASH: &str = "/";
const SLASH_MARKER: &str = "_SLASH_";

/// Escape a value so it can be embedded in a URL path
///
/// The value is escaped twice as the backend decodes the path before routing.
pub fn encode_path_param(param: &str) -> String {
    let once = utf8_percent_encode(param, PATH_SEGMENT).to_string();
    utf8_percent_encode(&once, PATH_SEGMENT).to_string()
}

/// Replace `/` so the value can be used as a single part of a resource id
pub fn encode_slash_in_id_part(part: &str) -> String {
    part.replace(SLASH, SLASH_MARKER)
}

pub fn decode_slash_in_id_part(part: &str) -> String {
    part.replace(SLASH_MARKER, SLASH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_param_is_escaped_twice() {
        assert_eq!(encode_path_param("plain-name_1.2~x"), "plain-name_1.2~x");
        assert_eq!(encode_path_param("a/b"), "a%252Fb");
        assert_eq!(encode_path_param("a b"), "a%2520b");
        assert_eq!(
            encode_path_param("arn:aws:sqs:us-west-2:1234:queue"),
            "arn:aws:sqs:us-west-2:1234:queue"
        );
    }

    #[test]
    fn slash_in_id_part() {
        let encoded = encode_slash_in_id_part("kubernetes.io/cluster/dev");
        assert_eq!(encoded, "kubernetes.io_SLASH_cluster_SLASH_dev");
        assert_eq!(decode_slash_in_id_part(&encoded), "kubernetes.io/cluster/dev");
    }
}
