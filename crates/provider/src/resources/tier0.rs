//! Tier-0 VRF data sources

use anyhow::Result;
use cloudavenue_common::api::tier0::Tier0Vrf;
use cloudavenue_common::Client;

use super::DataSource;
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{
    get_string_attr, list_value, make_state, string_list_value, string_value, DynamicValue,
};

fn from_api(vrf: &Tier0Vrf) -> DynamicValue {
    make_state(vec![
        ("id", string_value(&vrf.name)),
        ("name", string_value(&vrf.name)),
        ("tier0_provider", string_value(&vrf.tier0_provider)),
        ("class_service", string_value(&vrf.class_service)),
        (
            "services",
            list_value(
                vrf.services
                    .iter()
                    .map(|s| {
                        make_state(vec![
                            ("service", string_value(&s.service)),
                            ("vlan_id", string_value(s.vlan())),
                        ])
                    })
                    .collect(),
            ),
        ),
    ])
}

pub struct Tier0VrfDataSource;

#[async_trait::async_trait]
impl DataSource for Tier0VrfDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_tier0_vrf"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(
            "Retrieves a tier-0 VRF of the organization.",
            vec![
                Attribute::string("id").computed(),
                Attribute::string("name").required().describe("The name of the tier-0 VRF."),
                Attribute::string("tier0_provider")
                    .computed()
                    .describe("The provider router of the VRF."),
                Attribute::string("class_service")
                    .computed()
                    .describe("The class of service of the VRF."),
                Attribute::list_nested(
                    "services",
                    vec![
                        Attribute::string("service").computed(),
                        Attribute::string("vlan_id").computed(),
                    ],
                )
                .computed()
                .describe("The services attached to the VRF."),
            ],
        ))
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let vrf = client.get_tier0_vrf(&get_string_attr(config, "name")).await?;
        Ok(from_api(&vrf))
    }
}

pub struct Tier0VrfsDataSource;

#[async_trait::async_trait]
impl DataSource for Tier0VrfsDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_tier0_vrfs"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(
            "Lists the tier-0 VRFs available to the organization.",
            vec![
                Attribute::string("id").computed(),
                Attribute::list("names", AttrType::String)
                    .computed()
                    .describe("The names of the tier-0 VRFs."),
            ],
        ))
    }

    async fn read(&self, client: &Client, _config: &DynamicValue) -> Result<DynamicValue> {
        let names = client.list_tier0_vrfs().await?;
        Ok(make_state(vec![
            ("id", string_value(names.join(","))),
            ("names", string_list_value(names)),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudavenue_common::api::tier0::Tier0Service;
    use crate::state::get_list_attr;

    #[test]
    fn test_services_flatten_vlan() {
        let vrf = Tier0Vrf {
            name: "prvrf01".into(),
            services: vec![Tier0Service {
                service: "SVC1".into(),
                vlan_id: Some(serde_json::json!(101)),
            }],
            ..Default::default()
        };
        let state = from_api(&vrf);
        let service = &get_list_attr(&state, "services")[0];
        assert_eq!(get_string_attr(service, "vlan_id"), "101");
    }
}
