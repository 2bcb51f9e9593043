//! NetBackup protection of a VDC, vApp or VM
//!
//! The resource owns the set of protection levels (policies) applied to one
//! target. Targets are located in the NetBackup inventory by vCD id or name.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use cloudavenue_common::api::backup::{BackupTarget, TargetKind};
use cloudavenue_common::{Client, NetBackupClient, KV_MUTEX};
use tracing::info;

use super::{DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    get_optional_string_attr, get_string_attr, get_string_list_attr, make_state,
    string_list_value, string_value, DynamicValue,
};

fn target_attributes(force_new: bool) -> Vec<Attribute> {
    let mut attributes = vec![
        Attribute::string("type")
            .required()
            .validate(Validator::OneOf(TargetKind::ALL))
            .describe("The kind of object to protect: `vdc`, `vapp` or `vm`."),
        Attribute::string("target_id")
            .optional_computed()
            .stable()
            .describe("The vCD ID of the protected object. Exactly one of `target_id` or `target_name` must be set."),
        Attribute::string("target_name")
            .optional_computed()
            .stable()
            .describe("The name of the protected object. Exactly one of `target_id` or `target_name` must be set."),
    ];
    if force_new {
        attributes = attributes.into_iter().map(Attribute::force_new).collect();
    }
    attributes
}

fn backup_block() -> Block {
    let mut attributes = vec![Attribute::id()];
    attributes.extend(target_attributes(true));
    attributes.push(
        Attribute::set("policies", AttrType::String)
            .required()
            .describe("The names of the protection levels applied to the object (e.g. `GOLD-D6-H1`)."),
    );
    Block::new(
        "Provides the NetBackup protection of a VDC, vApp or VM.",
        attributes,
    )
    .validate(BlockValidator::ExactlyOneOf(&["target_id", "target_name"]))
}

async fn locate(nbu: &NetBackupClient, value: &DynamicValue) -> Result<(TargetKind, BackupTarget)> {
    let kind = TargetKind::parse(&get_string_attr(value, "type"))?;
    if let Some(id) = get_optional_string_attr(value, "id") {
        let id: i64 = id
            .parse()
            .with_context(|| format!("invalid backup id {:?}", id))?;
        return Ok((kind, nbu.get_target(kind, id).await?));
    }
    let key = get_optional_string_attr(value, "target_id")
        .or_else(|| get_optional_string_attr(value, "target_name"))
        .context("one of target_id or target_name must be set")?;
    Ok((kind, nbu.find_target(kind, &key).await?))
}

async fn applied(
    nbu: &NetBackupClient,
    kind: TargetKind,
    target: &BackupTarget,
) -> Result<BTreeSet<String>> {
    Ok(nbu
        .get_protection(kind, target.id)
        .await?
        .into_iter()
        .map(|p| p.protection_level_name)
        .collect())
}

fn to_state(kind: TargetKind, target: &BackupTarget, policies: BTreeSet<String>) -> DynamicValue {
    make_state(vec![
        ("id", string_value(target.id.to_string())),
        ("type", string_value(kind.as_str())),
        ("target_id", string_value(&target.identifier)),
        ("target_name", string_value(&target.name)),
        ("policies", string_list_value(policies)),
    ])
}

/// Applies and removes protection levels until the target has exactly `wanted`.
async fn reconcile(
    nbu: &NetBackupClient,
    kind: TargetKind,
    target: &BackupTarget,
    wanted: &BTreeSet<String>,
) -> Result<()> {
    let _lock = KV_MUTEX.lock(target.identifier.clone()).await;
    let current = applied(nbu, kind, target).await?;
    for name in current.difference(wanted) {
        let level = nbu.protection_level_by_name(name).await?;
        nbu.unprotect(kind, target.id, level.id).await?;
    }
    for name in wanted.difference(&current) {
        let level = nbu.protection_level_by_name(name).await?;
        nbu.protect(kind, target.id, level.id).await?;
    }
    info!(target = %target.name, policies = wanted.len(), "Backup policies in place");
    Ok(())
}

fn wanted(plan: &DynamicValue) -> BTreeSet<String> {
    get_string_list_attr(plan, "policies").into_iter().collect()
}

pub struct BackupResource;

#[async_trait::async_trait]
impl Resource for BackupResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_backup"
    }

    fn schema(&self) -> Schema {
        Schema::new(backup_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let nbu = client.netbackup()?;
        let (kind, target) = locate(nbu, plan).await?;
        let wanted = wanted(plan);
        reconcile(nbu, kind, &target, &wanted).await?;
        Ok(to_state(kind, &target, wanted))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let nbu = client.netbackup()?;
        let (kind, target) = locate(nbu, state).await?;
        let policies = applied(nbu, kind, &target).await?;
        Ok(to_state(kind, &target, policies))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let nbu = client.netbackup()?;
        let (kind, target) = locate(nbu, prior).await?;
        let wanted = wanted(plan);
        reconcile(nbu, kind, &target, &wanted).await?;
        Ok(to_state(kind, &target, wanted))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let nbu = client.netbackup()?;
        let (kind, target) = locate(nbu, state).await?;
        reconcile(nbu, kind, &target, &BTreeSet::new()).await
    }

    /// `type.targetName` (e.g. `vdc.VDC_Production`)
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        let (kind, name) = id
            .split_once('.')
            .filter(|(k, n)| !k.is_empty() && !n.is_empty())
            .with_context(|| {
                format!(
                    "unexpected import identifier {:?}, expected type.targetName",
                    id
                )
            })?;
        TargetKind::parse(kind)?;
        Ok(make_state(vec![
            ("type", string_value(kind)),
            ("target_name", string_value(name)),
        ]))
    }
}

pub struct BackupDataSource;

#[async_trait::async_trait]
impl DataSource for BackupDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_backup"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            backup_block()
                .computed_except(target_attributes(false))
                .validate(BlockValidator::ExactlyOneOf(&["target_id", "target_name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        BackupResource.read(client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_target() {
        let target = BackupTarget {
            id: 42,
            name: "VDC_Production".into(),
            identifier: "urn:vcloud:vdc:1".into(),
        };
        let policies: BTreeSet<String> = ["SILVER-D1".to_string(), "GOLD-D6-H1".to_string()].into();
        let state = to_state(TargetKind::Vdc, &target, policies);
        assert_eq!(get_string_attr(&state, "id"), "42");
        assert_eq!(
            get_string_list_attr(&state, "policies"),
            vec!["GOLD-D6-H1", "SILVER-D1"]
        );
    }

    #[test]
    fn test_import() {
        let state = BackupResource.import_state("vapp.web-app").unwrap();
        assert_eq!(get_string_attr(&state, "type"), "vapp");
        assert_eq!(get_string_attr(&state, "target_name"), "web-app");
        assert!(BackupResource.import_state("org.web").is_err());
        assert!(BackupResource.import_state("vdc").is_err());
    }

    #[test]
    fn test_target_changes_force_replacement() {
        let schema = BackupResource.schema();
        for name in ["type", "target_id", "target_name"] {
            assert!(schema.block.attribute(name).unwrap().force_new, "{name}");
        }
        assert!(!schema.block.attribute("policies").unwrap().force_new);
    }
}
