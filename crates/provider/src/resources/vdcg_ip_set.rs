//! VDC group IP set resource and data source

use anyhow::Result;
use cloudavenue_common::api::firewall::{FirewallGroup, IP_SET};
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::{Client, EntityRef, KV_MUTEX};

use super::{import_parts, resolve_vdc_group, vdc_group_attributes, DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    empty_list_as, get_optional_string_attr, get_string_attr, get_string_list_attr, make_state,
    null_value, string_list_value, string_value, DynamicValue,
};

fn ip_set_block() -> Block {
    let mut attributes = vec![
        Attribute::id(),
        Attribute::string("name")
            .required()
            .describe("The name of the IP set."),
        Attribute::string("description")
            .optional_computed()
            .describe("The description of the IP set."),
    ];
    attributes.extend(vdc_group_attributes(true));
    attributes.push(
        Attribute::set("ip_addresses", AttrType::String)
            .optional()
            .validate(Validator::AddressOrRange)
            .describe("IP addresses, CIDR networks or IP ranges (`192.168.1.1-192.168.1.10`) of the set."),
    );
    Block::new(
        "Provides an IP set of a VDC group, usable as source or destination of firewall rules.",
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
        type_value: IP_SET.to_string(),
        members: Vec::new(),
        ip_addresses: get_string_list_attr(plan, "ip_addresses"),
    }
}

fn from_api(set: &FirewallGroup, known: &DynamicValue) -> DynamicValue {
    let addresses = if set.ip_addresses.is_empty() {
        empty_list_as(known, "ip_addresses")
    } else {
        string_list_value(set.ip_addresses.iter().cloned())
    };
    make_state(vec![
        ("id", string_value(&set.id)),
        ("name", string_value(&set.name)),
        ("description", string_value(&set.description)),
        ("vdc_group_id", string_value(&set.owner_ref.id)),
        ("vdc_group_name", string_value(&set.owner_ref.name)),
        ("ip_addresses", addresses),
    ])
}

pub struct IpSetResource;

#[async_trait::async_trait]
impl Resource for IpSetResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_ip_set"
    }

    fn schema(&self) -> Schema {
        Schema::new(ip_set_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, plan).await?;
        let _lock = KV_MUTEX.lock(group.id.clone()).await;
        let created = client.create_firewall_group(&to_api(plan, &group)).await?;
        Ok(from_api(&created, plan))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let set = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_firewall_group(&id).await?,
            None => {
                let group = resolve_vdc_group(client, state).await?;
                client
                    .get_firewall_group_by_name(&group.id, &get_string_attr(state, "name"), IP_SET)
                    .await?
            }
        };
        Ok(from_api(&set, state))
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

    /// `vdcGroupName.ipSetName`
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        let parts = import_parts(id, &["vdcGroupName", "ipSetName"])?;
        Ok(make_state(vec![
            ("vdc_group_name", string_value(&parts[0])),
            ("name", string_value(&parts[1])),
        ]))
    }
}

pub struct IpSetDataSource;

#[async_trait::async_trait]
impl DataSource for IpSetDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_ip_set"
    }

    fn schema(&self) -> Schema {
        let mut lookups = vec![Attribute::string("name")
            .required()
            .describe("The name of the IP set.")];
        lookups.extend(vdc_group_attributes(false));
        Schema::new(
            ip_set_block()
                .computed_except(lookups)
                .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        IpSetResource.read(client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::list_value;

    #[test]
    fn test_address_validation() {
        let config = make_state(vec![
            ("name", string_value("office")),
            ("vdc_group_name", string_value("grp")),
            (
                "ip_addresses",
                string_list_value(vec![
                    "192.168.1.1",
                    "10.0.0.0/8",
                    "192.168.1.1-192.168.1.10",
                    "192.168.1.300",
                ]),
            ),
        ]);
        let violations = IpSetResource.schema().block.check(&config);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].detail.contains("192.168.1.300"));
    }

    #[test]
    fn test_to_api_is_an_ip_set() {
        let group = VdcGroup {
            id: "urn:vcloud:vdcGroup:1".into(),
            ..Default::default()
        };
        let plan = make_state(vec![
            ("name", string_value("office")),
            ("ip_addresses", string_list_value(vec!["10.0.0.0/8"])),
        ]);
        let set = to_api(&plan, &group);
        assert_eq!(set.type_value, IP_SET);
        assert_eq!(set.ip_addresses, vec!["10.0.0.0/8"]);
        assert!(set.members.is_empty());
    }

    #[test]
    fn test_empty_addresses_keep_configured_shape() {
        let prior = make_state(vec![("ip_addresses", list_value(vec![]))]);
        let state = from_api(&FirewallGroup::default(), &prior);
        assert_eq!(state.get("ip_addresses"), Some(&list_value(vec![])));

        let state = from_api(&FirewallGroup::default(), &null_value());
        assert!(state.get("ip_addresses").unwrap().is_null());
    }
}
