//! VDC group security group resource and data source

use anyhow::Result;
use cloudavenue_common::api::firewall::{FirewallGroup, SECURITY_GROUP};
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::{Client, EntityRef, KV_MUTEX};

use super::{import_parts, resolve_vdc_group, vdc_group_attributes, DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    empty_list_as, get_optional_string_attr, get_string_attr, get_string_list_attr, make_state,
    null_value, string_list_value, string_value, DynamicValue,
};

fn security_group_block() -> Block {
    let mut attributes = vec![
        Attribute::id(),
        Attribute::string("name")
            .required()
            .describe("The name of the security group."),
        Attribute::string("description")
            .optional_computed()
            .describe("The description of the security group."),
    ];
    attributes.extend(vdc_group_attributes(true));
    attributes.push(
        Attribute::set("member_org_network_ids", AttrType::String)
            .optional()
            .validate(Validator::Urn("network"))
            .describe("The IDs of the org networks whose VMs are members of the group."),
    );
    Block::new(
        "Provides a security group of a VDC group, usable as source or destination of firewall rules.",
        attributes,
    )
    .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"]))
}

fn to_api(plan: &DynamicValue, group: &VdcGroup) -> FirewallGroup {
    FirewallGroup {
        id: String::new(),
        name: get_string_attr(plan, "name"),
        description: get_string_attr(plan, "description"),
        owner_ref: EntityRef::named(&group.id, &group.name),
        type_value: SECURITY_GROUP.to_string(),
        members: get_string_list_attr(plan, "member_org_network_ids")
            .into_iter()
            .map(EntityRef::id)
            .collect(),
        ip_addresses: Vec::new(),
    }
}

fn from_api(sg: &FirewallGroup, known: &DynamicValue) -> DynamicValue {
    let members = if sg.members.is_empty() {
        empty_list_as(known, "member_org_network_ids")
    } else {
        string_list_value(sg.members.iter().map(|m| m.id.clone()))
    };
    make_state(vec![
        ("id", string_value(&sg.id)),
        ("name", string_value(&sg.name)),
        ("description", string_value(&sg.description)),
        ("vdc_group_id", string_value(&sg.owner_ref.id)),
        ("vdc_group_name", string_value(&sg.owner_ref.name)),
        ("member_org_network_ids", members),
    ])
}

pub struct SecurityGroupResource;

#[async_trait::async_trait]
impl Resource for SecurityGroupResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_security_group"
    }

    fn schema(&self) -> Schema {
        Schema::new(security_group_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, plan).await?;
        let _lock = KV_MUTEX.lock(group.id.clone()).await;
        let created = client.create_firewall_group(&to_api(plan, &group)).await?;
        Ok(from_api(&created, plan))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let sg = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_firewall_group(&id).await?,
            None => {
                let group = resolve_vdc_group(client, state).await?;
                client
                    .get_firewall_group_by_name(
                        &group.id,
                        &get_string_attr(state, "name"),
                        SECURITY_GROUP,
                    )
                    .await?
            }
        };
        Ok(from_api(&sg, state))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, prior).await?;
        let _lock = KV_MUTEX.lock(group.id.clone()).await;
        let updated = client
            .update_firewall_group(&get_string_attr(prior, "id"), &to_api(plan, &group))
            .await?;
        Ok(from_api(&updated, plan))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let _lock = KV_MUTEX.lock(get_string_attr(state, "vdc_group_id")).await;
        client.delete_firewall_group(&get_string_attr(state, "id")).await?;
        Ok(())
    }

    /// `vdcGroupName.securityGroupName`
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        let parts = import_parts(id, &["vdcGroupName", "securityGroupName"])?;
        Ok(make_state(vec![
            ("vdc_group_name", string_value(&parts[0])),
            ("name", string_value(&parts[1])),
        ]))
    }
}

pub struct SecurityGroupDataSource;

#[async_trait::async_trait]
impl DataSource for SecurityGroupDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_security_group"
    }

    fn schema(&self) -> Schema {
        let mut lookups = vec![Attribute::string("name")
            .required()
            .describe("The name of the security group.")];
        lookups.extend(vdc_group_attributes(false));
        Schema::new(
            security_group_block()
                .computed_except(lookups)
                .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        SecurityGroupResource.read(client, config).await
    }
}
