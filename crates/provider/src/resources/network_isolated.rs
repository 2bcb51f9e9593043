//! Isolated network resource and data source
//!
//! Isolated networks belong to a VDC or to a VDC group and have no uplink.

use anyhow::Result;
use cloudavenue_common::api::network::{OrgVdcNetwork, ISOLATED};
use cloudavenue_common::api::vdc::vdc_urn;
use cloudavenue_common::{Client, EntityRef, KV_MUTEX};

use super::network_routed::{subnet_attributes, subnet_to_api, subnet_to_state};
use super::{DataSource, Resource};
use crate::schema::{Attribute, Block, BlockValidator, Schema};
use crate::state::{
    get_optional_string_attr, get_string_attr, make_state, string_value, DynamicValue,
};

fn isolated_block() -> Block {
    let mut attributes = vec![
        Attribute::id(),
        Attribute::string("name")
            .required()
            .describe("The name of the network."),
        Attribute::string("description")
            .optional_computed()
            .describe("The description of the network."),
        Attribute::string("vdc")
            .optional()
            .force_new()
            .describe("The VDC owning the network. Defaults to the provider VDC when `vdc_group_name` is not set."),
        Attribute::string("vdc_group_name")
            .optional()
            .force_new()
            .describe("The VDC group owning the network."),
        Attribute::string("owner_id")
            .computed()
            .stable()
            .describe("The ID of the VDC or VDC group owning the network."),
    ];
    attributes.extend(subnet_attributes());
    Block::new("Provides an isolated network owned by a VDC or a VDC group.", attributes)
        .validate(BlockValidator::ConflictsWith("vdc", "vdc_group_name"))
}

/// Owner reference from `vdc` / `vdc_group_name` (provider VDC as fallback).
async fn resolve_owner(client: &Client, value: &DynamicValue) -> Result<EntityRef> {
    if let Some(group) = get_optional_string_attr(value, "vdc_group_name") {
        let group = client.get_vdc_group_by_name(&group).await?;
        return Ok(EntityRef::named(group.id, group.name));
    }
    let name = super::resolve_vdc(client, value)?;
    let vdc = client.get_vdc(&name).await?;
    Ok(EntityRef::named(vdc_urn(&vdc.vdc_uuid), name))
}

fn to_api(plan: &DynamicValue, owner: EntityRef) -> OrgVdcNetwork {
    OrgVdcNetwork {
        id: String::new(),
        name: get_string_attr(plan, "name"),
        description: get_string_attr(plan, "description"),
        owner_ref: owner,
        network_type: ISOLATED.to_string(),
        connection: None,
        subnets: subnet_to_api(plan),
        guest_vlan_allowed: false,
    }
}

/// `vdc` and `vdc_group_name` come from the prior state or config since
/// the API only reports the owner reference.
fn from_api(network: &OrgVdcNetwork, known: &DynamicValue) -> DynamicValue {
    let owner = |key: &str| match get_optional_string_attr(known, key) {
        Some(v) => string_value(v),
        None => DynamicValue::Null,
    };
    let mut attrs = vec![
        ("id", string_value(&network.id)),
        ("name", string_value(&network.name)),
        ("description", string_value(&network.description)),
        ("vdc", owner("vdc")),
        ("vdc_group_name", owner("vdc_group_name")),
        ("owner_id", string_value(&network.owner_ref.id)),
    ];
    attrs.extend(subnet_to_state(network, known));
    make_state(attrs)
}

pub struct NetworkIsolatedResource;

#[async_trait::async_trait]
impl Resource for NetworkIsolatedResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_network_isolated"
    }

    fn schema(&self) -> Schema {
        Schema::new(isolated_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let owner = resolve_owner(client, plan).await?;
        let _lock = KV_MUTEX.lock(owner.id.clone()).await;
        let created = client.create_network(&to_api(plan, owner)).await?;
        Ok(from_api(&created, plan))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let network = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_network(&id).await?,
            None => {
                let owner = resolve_owner(client, state).await?;
                client
                    .get_network_by_name(&owner.id, &get_string_attr(state, "name"))
                    .await?
            }
        };
        Ok(from_api(&network, state))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = get_string_attr(prior, "id");
        let owner_id = get_string_attr(prior, "owner_id");
        let _lock = KV_MUTEX.lock(owner_id.clone()).await;
        let current = client.get_network(&id).await?;
        let updated = client
            .update_network(&id, &to_api(plan, current.owner_ref))
            .await?;
        Ok(from_api(&updated, plan))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let _lock = KV_MUTEX.lock(get_string_attr(state, "owner_id")).await;
        client.delete_network(&get_string_attr(state, "id")).await?;
        Ok(())
    }

    /// `vdcName.networkName`
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        let parts = super::import_parts(id, &["vdcName", "networkName"])?;
        Ok(make_state(vec![
            ("vdc", string_value(&parts[0])),
            ("name", string_value(&parts[1])),
        ]))
    }
}

pub struct NetworkIsolatedDataSource;

#[async_trait::async_trait]
impl DataSource for NetworkIsolatedDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_network_isolated"
    }

    fn schema(&self) -> Schema {
        let lookups = vec![
            Attribute::string("name").required().describe("The name of the network."),
            Attribute::string("vdc").optional().describe("The VDC owning the network."),
            Attribute::string("vdc_group_name")
                .optional()
                .describe("The VDC group owning the network."),
        ];
        Schema::new(
            isolated_block()
                .computed_except(lookups)
                .validate(BlockValidator::ConflictsWith("vdc", "vdc_group_name")),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        NetworkIsolatedResource.read(client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::int_value;

    #[test]
    fn test_owner_attributes_come_from_config() {
        let plan = make_state(vec![
            ("name", string_value("iso")),
            ("vdc_group_name", string_value("grp")),
            ("gateway", string_value("10.0.0.1")),
            ("prefix_length", int_value(24)),
        ]);
        let mut network = to_api(&plan, EntityRef::named("urn:vcloud:vdcGroup:1", "grp"));
        network.id = "urn:vcloud:network:9".into();
        let state = from_api(&network, &plan);
        assert_eq!(get_string_attr(&state, "owner_id"), "urn:vcloud:vdcGroup:1");
        assert!(state.get("vdc").unwrap().is_null());
        assert_eq!(get_string_attr(&state, "vdc_group_name"), "grp");
        assert!(network.connection.is_none());
    }

    #[test]
    fn test_vdc_conflicts_with_group() {
        let config = make_state(vec![
            ("name", string_value("iso")),
            ("vdc", string_value("VDC_Test")),
            ("vdc_group_name", string_value("grp")),
        ]);
        let violations = NetworkIsolatedResource.schema().block.check(&config);
        assert_eq!(violations.len(), 1);
    }
}
