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

//! Key/value settings owned by another DuploCloud object
//!
//! Tenant configuration and infrastructure custom data are lists of settings
//! shared with DuploCloud itself. Resources only manage the keys they declare,
//! unless `delete_unspecified_settings` is set.

use async_trait::async_trait;
use tracing::debug;

use crate::duplosdk::{Client, ClientResult, DuploKeyStringValue};
use crate::tags::{flatten_tf_managed, tf_managed_changes};

#[async_trait]
pub(crate) trait SettingsApi: Send + Sync + 'static {
    /// Human readable kind, used in messages
    const KIND: &'static str;

    async fn get(client: &Client, id: &str) -> ClientResult<Option<Vec<DuploKeyStringValue>>>;
    async fn change(
        client: &Client,
        id: &str,
        old: &[DuploKeyStringValue],
        new: &[DuploKeyStringValue],
    ) -> ClientResult<()>;
    async fn replace(client: &Client, id: &str, settings: &[DuploKeyStringValue]) -> ClientResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TenantConfigApi;

#[async_trait]
impl SettingsApi for TenantConfigApi {
    const KIND: &'static str = "tenant config";

    async fn get(client: &Client, id: &str) -> ClientResult<Option<Vec<DuploKeyStringValue>>> {
        client.tenant_get_config(id).await
    }
    async fn change(
        client: &Client,
        id: &str,
        old: &[DuploKeyStringValue],
        new: &[DuploKeyStringValue],
    ) -> ClientResult<()> {
        client.tenant_change_config(id, old, new).await
    }
    async fn replace(client: &Client, id: &str, settings: &[DuploKeyStringValue]) -> ClientResult<()> {
        client.tenant_replace_config(id, settings).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct InfrastructureSettingApi;

#[async_trait]
impl SettingsApi for InfrastructureSettingApi {
    const KIND: &'static str = "infrastructure settings";

    async fn get(client: &Client, id: &str) -> ClientResult<Option<Vec<DuploKeyStringValue>>> {
        client.infrastructure_get_setting(id).await
    }
    async fn change(
        client: &Client,
        id: &str,
        old: &[DuploKeyStringValue],
        new: &[DuploKeyStringValue],
    ) -> ClientResult<()> {
        client.infrastructure_change_setting(id, old, new).await
    }
    async fn replace(client: &Client, id: &str, settings: &[DuploKeyStringValue]) -> ClientResult<()> {
        client.infrastructure_replace_setting(id, settings).await
    }
}

/// Settings as read upstream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SettingsRead {
    /// Every setting, managed or not
    pub all: Vec<DuploKeyStringValue>,
    /// Managed settings, in the order of the managed keys, empty when nothing is managed yet
    pub managed: Vec<DuploKeyStringValue>,
}

/// Read the settings, `None` if the owner does not exist
pub(crate) async fn read_settings<A: SettingsApi>(
    client: &Client,
    id: &str,
    specified: Option<&[String]>,
) -> ClientResult<Option<SettingsRead>> {
    let Some(all) = A::get(client, id).await? else {
        debug!(kind = A::KIND, id, "owner of the settings is missing");
        return Ok(None);
    };
    let (all, managed) = flatten_tf_managed(&all, specified);
    Ok(Some(SettingsRead { all, managed }))
}

/// Make the managed settings match `desired`
///
/// With `delete_unspecified`, every other setting is removed too.
pub(crate) async fn apply_settings<A: SettingsApi>(
    client: &Client,
    id: &str,
    previously_specified: &[String],
    desired: Vec<DuploKeyStringValue>,
    delete_unspecified: bool,
) -> ClientResult<()> {
    if delete_unspecified {
        debug!(kind = A::KIND, id, "replacing every setting");
        return A::replace(client, id, &desired).await;
    }

    let all = A::get(client, id).await?.unwrap_or_default();
    let changes = tf_managed_changes(&all, previously_specified, Some(desired));
    debug!(
        kind = A::KIND,
        id,
        deleted = ?changes.deleted_keys,
        specified = ?changes.specified,
        "changing managed settings"
    );
    A::change(client, id, &changes.existing, &changes.desired).await
}

/// Remove the managed settings
///
/// With `delete_unspecified`, every setting is removed.
pub(crate) async fn remove_settings<A: SettingsApi>(
    client: &Client,
    id: &str,
    specified: &[String],
    delete_unspecified: bool,
) -> ClientResult<()> {
    if delete_unspecified {
        return A::replace(client, id, &[]).await;
    }

    let all = A::get(client, id).await?.unwrap_or_default();
    let changes = tf_managed_changes(&all, specified, None);
    debug!(kind = A::KIND, id, deleted = ?changes.deleted_keys, "removing managed settings");
    A::change(client, id, &changes.existing, &[]).await
}
