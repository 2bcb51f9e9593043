//! VDC group application port profile resource and data source

use anyhow::Result;
use cloudavenue_common::api::app_port_profile::{AppPort, AppPortProfile, PROTOCOLS};
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::{Client, EntityRef, KV_MUTEX};

use super::{import_parts, resolve_vdc_group, vdc_group_attributes, DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    get_list_attr, get_optional_string_attr, get_string_attr, get_string_list_attr, list_value,
    make_state, null_value, string_list_value, string_value, DynamicValue,
};

fn profile_block() -> Block {
    let mut attributes = vec![
        Attribute::id(),
        Attribute::string("name")
            .required()
            .describe("The name of the application port profile."),
        Attribute::string("description")
            .optional_computed()
            .describe("The description of the application port profile."),
    ];
    attributes.extend(vdc_group_attributes(true));
    attributes.push(
        Attribute::list_nested(
            "app_ports",
            vec![
                Attribute::string("protocol")
                    .required()
                    .validate(Validator::OneOf(PROTOCOLS))
                    .describe("The protocol of the ports."),
                Attribute::set("ports", AttrType::String)
                    .optional()
                    .validate(Validator::PortRange)
                    .describe("Ports or port ranges (`1000-2000`). Not used with ICMP."),
            ],
        )
        .required()
        .describe("The protocols and ports of the profile."),
    );
    Block::new(
        "Provides an application port profile scoped to a VDC group.",
        attributes,
    )
    .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"]))
}

fn to_api(plan: &DynamicValue, group: &VdcGroup, org: EntityRef) -> AppPortProfile {
    AppPortProfile {
        id: String::new(),
        name: get_string_attr(plan, "name"),
        description: get_string_attr(plan, "description"),
        scope: "TENANT".to_string(),
        org_ref: org,
        context_entity_id: group.id.clone(),
        application_ports: get_list_attr(plan, "app_ports")
            .iter()
            .map(|p| AppPort {
                protocol: get_string_attr(p, "protocol"),
                destination_ports: get_string_list_attr(p, "ports"),
            })
            .collect(),
    }
}

fn from_api(profile: &AppPortProfile, group: &VdcGroup) -> DynamicValue {
    let ports = profile
        .application_ports
        .iter()
        .map(|p| {
            let ports = if p.destination_ports.is_empty() {
                null_value()
            } else {
                string_list_value(p.destination_ports.iter().cloned())
            };
            make_state(vec![
                ("protocol", string_value(&p.protocol)),
                ("ports", ports),
            ])
        })
        .collect();
    make_state(vec![
        ("id", string_value(&profile.id)),
        ("name", string_value(&profile.name)),
        ("description", string_value(&profile.description)),
        ("vdc_group_id", string_value(&group.id)),
        ("vdc_group_name", string_value(&group.name)),
        ("app_ports", list_value(ports)),
    ])
}

async fn org_ref(client: &Client) -> Result<EntityRef> {
    let org = client.get_org().await?;
    Ok(EntityRef::named(org.id, org.name))
}

pub struct AppPortProfileResource;

#[async_trait::async_trait]
impl Resource for AppPortProfileResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_app_port_profile"
    }

    fn schema(&self) -> Schema {
        Schema::new(profile_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, plan).await?;
        let org = org_ref(client).await?;
        let _lock = KV_MUTEX.lock(group.id.clone()).await;
        let created = client
            .create_app_port_profile(&to_api(plan, &group, org))
            .await?;
        Ok(from_api(&created, &group))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, state).await?;
        let profile = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_app_port_profile(&id).await?,
            None => {
                client
                    .get_app_port_profile_by_name(&group.id, &get_string_attr(state, "name"))
                    .await?
            }
        };
        Ok(from_api(&profile, &group))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, prior).await?;
        let org = org_ref(client).await?;
        let _lock = KV_MUTEX.lock(group.id.clone()).await;
        let updated = client
            .update_app_port_profile(&get_string_attr(prior, "id"), &to_api(plan, &group, org))
            .await?;
        Ok(from_api(&updated, &group))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let _lock = KV_MUTEX.lock(get_string_attr(state, "vdc_group_id")).await;
        client
            .delete_app_port_profile(&get_string_attr(state, "id"))
            .await?;
        Ok(())
    }

    /// `vdcGroupName.profileName`
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        let parts = import_parts(id, &["vdcGroupName", "profileName"])?;
        Ok(make_state(vec![
            ("vdc_group_name", string_value(&parts[0])),
            ("name", string_value(&parts[1])),
        ]))
    }
}

pub struct AppPortProfileDataSource;

#[async_trait::async_trait]
impl DataSource for AppPortProfileDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_app_port_profile"
    }

    fn schema(&self) -> Schema {
        let mut lookups = vec![Attribute::string("name")
            .required()
            .describe("The name of the application port profile.")];
        lookups.extend(vdc_group_attributes(false));
        Schema::new(
            profile_block()
                .computed_except(lookups)
                .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        AppPortProfileResource.read(client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_port(protocol: &str, ports: Vec<&str>) -> DynamicValue {
        make_state(vec![
            ("protocol", string_value(protocol)),
            (
                "ports",
                if ports.is_empty() { null_value() } else { string_list_value(ports) },
            ),
        ])
    }

    #[test]
    fn test_profile_is_tenant_scoped_to_group() {
        let group = VdcGroup {
            id: "urn:vcloud:vdcGroup:1".into(),
            name: "grp".into(),
            ..Default::default()
        };
        let plan = make_state(vec![
            ("name", string_value("web")),
            (
                "app_ports",
                list_value(vec![
                    app_port("TCP", vec!["80", "443"]),
                    app_port("ICMPv4", vec![]),
                ]),
            ),
        ]);
        let profile = to_api(&plan, &group, EntityRef::named("urn:vcloud:org:1", "cav01"));
        assert_eq!(profile.scope, "TENANT");
        assert_eq!(profile.context_entity_id, "urn:vcloud:vdcGroup:1");
        assert_eq!(profile.application_ports.len(), 2);
        assert!(profile.application_ports[1].destination_ports.is_empty());

        let state = from_api(&profile, &group);
        let ports = get_list_attr(&state, "app_ports");
        assert!(ports[1].get("ports").unwrap().is_null());
        assert_eq!(get_string_attr(&state, "vdc_group_name"), "grp");
    }

    #[test]
    fn test_invalid_port_and_protocol() {
        let config = make_state(vec![
            ("name", string_value("web")),
            ("vdc_group_id", string_value("urn:vcloud:vdcGroup:1")),
            (
                "app_ports",
                list_value(vec![app_port("SCTP", vec!["80"]), app_port("TCP", vec!["2000-1000"])]),
            ),
        ]);
        let violations = AppPortProfileResource.schema().block.check(&config);
        assert_eq!(violations.len(), 2);
    }
}
