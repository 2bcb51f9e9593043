//! Bare metal servers data source

use anyhow::Result;
use cloudavenue_common::api::bms::{BmsDisk, BmsGroup};
use cloudavenue_common::Client;

use super::DataSource;
use crate::schema::{Attribute, Block, Schema};
use crate::state::{list_value, make_state, null_value, string_value, DynamicValue};

fn disk_attributes() -> Vec<Attribute> {
    vec![
        Attribute::string("size").computed().describe("The size of the disk."),
        Attribute::string("storage_class").computed().describe("The storage class of the disk."),
    ]
}

fn disk(d: &BmsDisk) -> DynamicValue {
    make_state(vec![
        ("size", string_value(&d.size)),
        ("storage_class", string_value(&d.storage_class)),
    ])
}

fn disks(list: &[BmsDisk]) -> DynamicValue {
    list_value(list.iter().map(disk).collect())
}

fn from_api(org: &str, groups: &[BmsGroup]) -> DynamicValue {
    let groups = groups
        .iter()
        .map(|g| {
            let networks = g
                .network
                .iter()
                .map(|n| {
                    make_state(vec![
                        ("vlan_id", string_value(&n.vlan_id)),
                        ("subnet", string_value(&n.subnet)),
                        ("prefix", string_value(&n.prefix)),
                    ])
                })
                .collect();
            let servers = g
                .bms
                .iter()
                .map(|s| {
                    make_state(vec![
                        ("hostname", string_value(&s.hostname)),
                        ("bms_type", string_value(&s.bms_type)),
                        ("os", string_value(&s.os)),
                        ("bios_configuration", string_value(&s.bios_configuration)),
                        (
                            "storage_system",
                            s.storages.system.as_ref().map(disk).unwrap_or_else(null_value),
                        ),
                        ("storage_data", disks(&s.storages.data)),
                        ("storage_shared", disks(&s.storages.shared)),
                    ])
                })
                .collect();
            make_state(vec![
                ("networks", list_value(networks)),
                ("servers", list_value(servers)),
            ])
        })
        .collect();
    make_state(vec![("id", string_value(org)), ("groups", list_value(groups))])
}

pub struct BmsDataSource;

#[async_trait::async_trait]
impl DataSource for BmsDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_bms"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(
            "Lists the bare metal servers of the organization, grouped by the networks they share.",
            vec![
                Attribute::string("id").computed().describe("The organization name."),
                Attribute::list_nested(
                    "groups",
                    vec![
                        Attribute::list_nested(
                            "networks",
                            vec![
                                Attribute::string("vlan_id").computed(),
                                Attribute::string("subnet").computed(),
                                Attribute::string("prefix").computed(),
                            ],
                        )
                        .computed()
                        .describe("The networks the servers are attached to."),
                        Attribute::list_nested(
                            "servers",
                            vec![
                                Attribute::string("hostname").computed(),
                                Attribute::string("bms_type").computed(),
                                Attribute::string("os").computed(),
                                Attribute::string("bios_configuration").computed(),
                                Attribute::single_nested("storage_system", disk_attributes())
                                    .computed(),
                                Attribute::list_nested("storage_data", disk_attributes())
                                    .computed(),
                                Attribute::list_nested("storage_shared", disk_attributes())
                                    .computed(),
                            ],
                        )
                        .computed()
                        .describe("The servers of the group."),
                    ],
                )
                .computed(),
            ],
        ))
    }

    async fn read(&self, client: &Client, _config: &DynamicValue) -> Result<DynamicValue> {
        let groups = client.list_bms().await?;
        Ok(from_api(&client.config().org, &groups))
    }
}
