//! VDC group resource and data source

use anyhow::Result;
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::{Client, KV_MUTEX};

use super::{DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    bool_value, get_optional_string_attr, get_string_attr, get_string_list_attr, make_state,
    string_list_value, string_value, DynamicValue,
};

fn vdcg_block() -> Block {
    Block::new(
        "Provides a VDC group. A VDC group lets VDCs of the organization share networks and a distributed firewall.",
        vec![
            Attribute::id(),
            Attribute::string("name")
                .required()
                .describe("The name of the VDC group."),
            Attribute::string("description")
                .optional_computed()
                .describe("The description of the VDC group."),
            Attribute::set("vdc_ids", AttrType::String)
                .required()
                .validate(Validator::Urn("vdc"))
                .describe("The IDs of the VDCs participating in the group."),
            Attribute::string("status")
                .computed()
                .describe("The status of the VDC group."),
            Attribute::string("type")
                .computed()
                .stable()
                .describe("The type of the VDC group."),
            Attribute::bool("dfw_enabled")
                .computed()
                .describe("Whether the distributed firewall is enabled on the group."),
        ],
    )
}

fn from_api(group: &VdcGroup) -> DynamicValue {
    make_state(vec![
        ("id", string_value(&group.id)),
        ("name", string_value(&group.name)),
        ("description", string_value(&group.description)),
        ("vdc_ids", string_list_value(group.vdc_ids())),
        ("status", string_value(&group.status)),
        ("type", string_value(&group.group_type)),
        ("dfw_enabled", bool_value(group.dfw_enabled)),
    ])
}

/// Builds the group document, resolving participants through the
/// organization's candidate VDCs.
async fn to_api(client: &Client, plan: &DynamicValue, base: VdcGroup) -> Result<VdcGroup> {
    let org = client.get_org().await?;
    let vdc_ids = get_string_list_attr(plan, "vdc_ids");
    let participants = client.participants(&org.id, &vdc_ids).await?;
    Ok(VdcGroup {
        name: get_string_attr(plan, "name"),
        description: get_string_attr(plan, "description"),
        org_id: org.id,
        participating_org_vdcs: participants,
        ..base
    })
}

pub struct VdcGroupResource;

#[async_trait::async_trait]
impl Resource for VdcGroupResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg"
    }

    fn schema(&self) -> Schema {
        Schema::new(vdcg_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let base = VdcGroup {
            group_type: "LOCAL".into(),
            network_provider_type: "NSX_T".into(),
            ..Default::default()
        };
        let group = to_api(client, plan, base).await?;
        let created = client.create_vdc_group(&group).await?;
        Ok(from_api(&created))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let group = match get_optional_string_attr(state, "id") {
            Some(id) => client.find_vdc_group(&id).await?,
            None => client.get_vdc_group_by_name(&get_string_attr(state, "name")).await?,
        };
        Ok(from_api(&group))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = get_string_attr(prior, "id");
        let _lock = KV_MUTEX.lock(id.clone()).await;
        let current = client.get_vdc_group(&id).await?;
        let group = to_api(client, plan, current).await?;
        Ok(from_api(&client.update_vdc_group(&id, &group).await?))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let id = get_string_attr(state, "id");
        let _lock = KV_MUTEX.lock(id.clone()).await;
        client.delete_vdc_group(&id).await?;
        Ok(())
    }

    /// Imported by id or by name.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        if cloudavenue_common::is_urn(id, "vdcGroup") {
            Ok(make_state(vec![("id", string_value(id))]))
        } else {
            Ok(make_state(vec![("name", string_value(id))]))
        }
    }
}

pub struct VdcGroupDataSource;

#[async_trait::async_trait]
impl DataSource for VdcGroupDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            vdcg_block()
                .computed_except(vec![
                    Attribute::string("id")
                        .optional_computed()
                        .validate(Validator::Urn("vdcGroup"))
                        .describe("The ID of the VDC group."),
                    Attribute::string("name")
                        .optional_computed()
                        .describe("The name of the VDC group."),
                ])
                .validate(BlockValidator::ExactlyOneOf(&["id", "name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        VdcGroupResource.read(client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudavenue_common::api::vdcg::ParticipatingVdc;
    use cloudavenue_common::EntityRef;

    #[test]
    fn test_from_api() {
        let group = VdcGroup {
            id: "urn:vcloud:vdcGroup:1".into(),
            name: "grp".into(),
            group_type: "LOCAL".into(),
            participating_org_vdcs: vec![ParticipatingVdc {
                vdc_ref: EntityRef::named("urn:vcloud:vdc:1", "vdc1"),
                ..Default::default()
            }],
            ..Default::default()
        };
        let state = from_api(&group);
        assert_eq!(get_string_list_attr(&state, "vdc_ids"), vec!["urn:vcloud:vdc:1"]);
        assert_eq!(get_string_attr(&state, "type"), "LOCAL");
    }

    #[test]
    fn test_import_by_name_or_id() {
        let by_id = VdcGroupResource.import_state("urn:vcloud:vdcGroup:abc").unwrap();
        assert_eq!(get_string_attr(&by_id, "id"), "urn:vcloud:vdcGroup:abc");
        let by_name = VdcGroupResource.import_state("my-group").unwrap();
        assert_eq!(get_string_attr(&by_name, "name"), "my-group");
    }

    #[test]
    fn test_data_source_requires_id_xor_name() {
        let schema = VdcGroupDataSource.schema();
        let both = make_state(vec![
            ("id", string_value("urn:vcloud:vdcGroup:1")),
            ("name", string_value("grp")),
        ]);
        assert_eq!(schema.block.check(&both).len(), 1);
        let one = make_state(vec![("name", string_value("grp"))]);
        assert!(schema.block.check(&one).is_empty());
    }
}
