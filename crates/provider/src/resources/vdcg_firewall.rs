//! VDC group distributed firewall
//!
//! The resource owns the complete rule list of the group's default DFW
//! policy. Rules configured elsewhere are overwritten on apply.

use anyhow::Result;
use cloudavenue_common::api::firewall::{DfwRule, ACTIONS, DIRECTIONS, IP_PROTOCOLS};
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::{Client, EntityRef, KV_MUTEX};
use tracing::info;

use super::{resolve_vdc_group, vdc_group_attributes, DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    bool_value, empty_list_as, get_bool_attr, get_list_attr, get_optional_string_attr,
    get_string_attr, get_string_list_attr, list_value, make_state, null_value, string_list_value,
    string_value, DynamicValue,
};

fn rule_attributes() -> Vec<Attribute> {
    vec![
        Attribute::string("id").computed().describe("The ID of the rule."),
        Attribute::string("name").required().describe("The name of the rule."),
        Attribute::string("description")
            .optional_computed()
            .describe("The description of the rule."),
        Attribute::bool("enabled")
            .default(bool_value(true))
            .describe("Whether the rule is enabled."),
        Attribute::string("direction")
            .default(string_value("IN_OUT"))
            .validate(Validator::OneOf(DIRECTIONS))
            .describe("The direction of the traffic matched by the rule."),
        Attribute::string("ip_protocol")
            .default(string_value("IPV4_IPV6"))
            .validate(Validator::OneOf(IP_PROTOCOLS))
            .describe("The IP protocol matched by the rule."),
        Attribute::string("action")
            .required()
            .validate(Validator::OneOf(ACTIONS))
            .describe("What to do with matched traffic."),
        Attribute::bool("logging")
            .default(bool_value(false))
            .describe("Whether matched packets are logged."),
        Attribute::set("source_ids", AttrType::String)
            .optional()
            .describe("IDs of the security groups or IP sets matched as source. Empty matches any."),
        Attribute::set("destination_ids", AttrType::String)
            .optional()
            .describe("IDs of the security groups or IP sets matched as destination. Empty matches any."),
        Attribute::set("app_port_profile_ids", AttrType::String)
            .optional()
            .describe("IDs of the application port profiles matched by the rule. Empty matches any."),
        Attribute::bool("source_groups_excluded")
            .default(bool_value(false))
            .describe("Match everything except the source groups."),
        Attribute::bool("destination_groups_excluded")
            .default(bool_value(false))
            .describe("Match everything except the destination groups."),
    ]
}

fn firewall_block() -> Block {
    let mut attributes = vec![Attribute::id()];
    attributes.extend(vdc_group_attributes(true));
    attributes.push(
        Attribute::list_nested("rules", rule_attributes())
            .required()
            .describe("The ordered list of rules of the default policy."),
    );
    Block::new(
        "Manages the distributed firewall rules of a VDC group.",
        attributes,
    )
    .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"]))
}

fn refs(ids: Vec<String>) -> Option<Vec<EntityRef>> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.into_iter().map(EntityRef::id).collect())
    }
}

/// `known` is the matching rule of the plan or prior state, if any.
fn ids(refs: &Option<Vec<EntityRef>>, known: Option<&DynamicValue>, key: &str) -> DynamicValue {
    match refs {
        Some(refs) if !refs.is_empty() => string_list_value(refs.iter().map(|r| r.id.clone())),
        _ => known.map(|k| empty_list_as(k, key)).unwrap_or_else(null_value),
    }
}

fn rules_to_api(plan: &DynamicValue) -> Vec<DfwRule> {
    get_list_attr(plan, "rules")
        .iter()
        .map(|r| DfwRule {
            id: None,
            name: get_string_attr(r, "name"),
            description: get_string_attr(r, "description"),
            enabled: get_bool_attr(r, "enabled", true),
            direction: get_string_attr(r, "direction"),
            ip_protocol: get_string_attr(r, "ip_protocol"),
            action_value: get_string_attr(r, "action"),
            logging: get_bool_attr(r, "logging", false),
            source_firewall_groups: refs(get_string_list_attr(r, "source_ids")),
            destination_firewall_groups: refs(get_string_list_attr(r, "destination_ids")),
            application_port_profiles: refs(get_string_list_attr(r, "app_port_profile_ids")),
            source_groups_excluded: get_bool_attr(r, "source_groups_excluded", false),
            destination_groups_excluded: get_bool_attr(r, "destination_groups_excluded", false),
        })
        .collect()
}

fn from_api(group: &VdcGroup, rules: &[DfwRule], known: &DynamicValue) -> DynamicValue {
    let known_rules = get_list_attr(known, "rules");
    make_state(vec![
        ("id", string_value(&group.id)),
        ("vdc_group_id", string_value(&group.id)),
        ("vdc_group_name", string_value(&group.name)),
        (
            "rules",
            list_value(
                rules
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        let k = known_rules.get(i);
                        make_state(vec![
                            ("id", string_value(r.id.clone().unwrap_or_default())),
                            ("name", string_value(&r.name)),
                            ("description", string_value(&r.description)),
                            ("enabled", bool_value(r.enabled)),
                            ("direction", string_value(&r.direction)),
                            ("ip_protocol", string_value(&r.ip_protocol)),
                            ("action", string_value(&r.action_value)),
                            ("logging", bool_value(r.logging)),
                            ("source_ids", ids(&r.source_firewall_groups, k, "source_ids")),
                            (
                                "destination_ids",
                                ids(&r.destination_firewall_groups, k, "destination_ids"),
                            ),
                            (
                                "app_port_profile_ids",
                                ids(&r.application_port_profiles, k, "app_port_profile_ids"),
                            ),
                            ("source_groups_excluded", bool_value(r.source_groups_excluded)),
                            (
                                "destination_groups_excluded",
                                bool_value(r.destination_groups_excluded),
                            ),
                        ])
                    })
                    .collect(),
            ),
        ),
    ])
}

async fn group_of(client: &Client, state: &DynamicValue) -> Result<VdcGroup> {
    match get_optional_string_attr(state, "id") {
        Some(id) => Ok(client.get_vdc_group(&id).await?),
        None => resolve_vdc_group(client, state).await,
    }
}

async fn write_rules(
    client: &Client,
    group: &VdcGroup,
    plan: &DynamicValue,
) -> Result<DynamicValue> {
    let _lock = KV_MUTEX.lock(group.id.clone()).await;
    if !client.get_dfw_policies(&group.id).await?.enabled {
        info!(vdc_group = %group.name, "Enabling distributed firewall");
        client.set_dfw_enabled(&group.id, true).await?;
    }
    let policy = client.default_dfw_policy(&group.id).await?;
    let rules = client
        .set_dfw_rules(&group.id, &policy, rules_to_api(plan))
        .await?;
    Ok(from_api(group, &rules, plan))
}

pub struct VdcGroupFirewallResource;

#[async_trait::async_trait]
impl Resource for VdcGroupFirewallResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_firewall"
    }

    fn schema(&self) -> Schema {
        Schema::new(firewall_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, plan).await?;
        write_rules(client, &group, plan).await
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let group = group_of(client, state).await?;
        let policy = client.default_dfw_policy(&group.id).await?;
        let rules = client.get_dfw_rules(&group.id, &policy).await?;
        Ok(from_api(&group, &rules, state))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let group = group_of(client, prior).await?;
        write_rules(client, &group, plan).await
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let group = group_of(client, state).await?;
        let _lock = KV_MUTEX.lock(group.id.clone()).await;
        let policy = client.default_dfw_policy(&group.id).await?;
        client.set_dfw_rules(&group.id, &policy, Vec::new()).await?;
        Ok(())
    }

    /// Imported by VDC group id or name.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        if cloudavenue_common::is_urn(id, "vdcGroup") {
            Ok(make_state(vec![("id", string_value(id))]))
        } else {
            Ok(make_state(vec![("vdc_group_name", string_value(id))]))
        }
    }
}

pub struct VdcGroupFirewallDataSource;

#[async_trait::async_trait]
impl DataSource for VdcGroupFirewallDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcg_firewall"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            firewall_block()
                .computed_except(vdc_group_attributes(false))
                .validate(BlockValidator::ExactlyOneOf(&["vdc_group_id", "vdc_group_name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let group = resolve_vdc_group(client, config).await?;
        let policy = client.default_dfw_policy(&group.id).await?;
        let rules = client.get_dfw_rules(&group.id, &policy).await?;
        Ok(from_api(&group, &rules, &null_value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_change;

    fn rule(name: &str, sources: Vec<&str>) -> DynamicValue {
        make_state(vec![
            ("name", string_value(name)),
            ("action", string_value("ALLOW")),
            ("direction", string_value("IN")),
            ("ip_protocol", string_value("IPV4")),
            ("enabled", bool_value(true)),
            ("logging", bool_value(false)),
            (
                "source_ids",
                if sources.is_empty() {
                    null_value()
                } else {
                    string_list_value(sources)
                },
            ),
        ])
    }

    #[test]
    fn test_rules_to_api_keeps_order_and_any() {
        let plan = make_state(vec![(
            "rules",
            list_value(vec![
                rule("allow-web", vec!["urn:vcloud:firewallGroup:1"]),
                rule("allow-any", vec![]),
            ]),
        )]);
        let rules = rules_to_api(&plan);
        assert_eq!(rules[0].name, "allow-web");
        assert_eq!(
            rules[0].source_firewall_groups,
            Some(vec![EntityRef::id("urn:vcloud:firewallGroup:1")])
        );
        assert_eq!(rules[1].source_firewall_groups, None);
        assert!(rules.iter().all(|r| r.id.is_none()));
    }

    #[test]
    fn test_from_api_sets_group_and_rule_ids() {
        let group = VdcGroup {
            id: "urn:vcloud:vdcGroup:1".into(),
            name: "grp".into(),
            ..Default::default()
        };
        let rule = DfwRule {
            id: Some("r-1".into()),
            name: "allow-web".into(),
            action_value: "ALLOW".into(),
            destination_firewall_groups: Some(vec![]),
            ..Default::default()
        };
        let state = from_api(&group, &[rule], &null_value());
        assert_eq!(get_string_attr(&state, "id"), "urn:vcloud:vdcGroup:1");
        let rule = &get_list_attr(&state, "rules")[0];
        assert_eq!(get_string_attr(rule, "id"), "r-1");
        assert!(rule.get("destination_ids").unwrap().is_null());
    }

    #[test]
    fn test_empty_rule_ids_survive_apply() {
        let block = firewall_block();
        let config = block.conform(&make_state(vec![
            ("vdc_group_name", string_value("grp")),
            (
                "rules",
                list_value(vec![make_state(vec![
                    ("name", string_value("r")),
                    ("action", string_value("ALLOW")),
                    ("source_ids", list_value(vec![])),
                ])]),
            ),
        ]));
        let plan = plan_change(&block, &DynamicValue::Null, &config, &config);

        // The API returns the rule without any references.
        let group = VdcGroup {
            id: "urn:vcloud:vdcGroup:1".into(),
            name: "grp".into(),
            ..Default::default()
        };
        let applied = DfwRule {
            id: Some("r-1".into()),
            name: "r".into(),
            action_value: "ALLOW".into(),
            ..Default::default()
        };
        let state = from_api(&group, &[applied], &plan.planned);
        let rule = &get_list_attr(&state, "rules")[0];
        let planned = &get_list_attr(&plan.planned, "rules")[0];
        assert_eq!(rule.get("source_ids"), Some(&list_value(vec![])));
        assert_eq!(rule.get("source_ids"), planned.get("source_ids"));
        assert!(rule.get("destination_ids").unwrap().is_null());
    }

    #[test]
    fn test_plan_fills_rule_defaults() {
        let block = firewall_block();
        let config = block.conform(&make_state(vec![
            ("vdc_group_name", string_value("grp")),
            (
                "rules",
                list_value(vec![make_state(vec![
                    ("name", string_value("r")),
                    ("action", string_value("DROP")),
                ])]),
            ),
        ]));
        let plan = plan_change(&block, &DynamicValue::Null, &config, &config);
        let rule = &get_list_attr(&plan.planned, "rules")[0];
        assert_eq!(rule.get("direction"), Some(&string_value("IN_OUT")));
        assert_eq!(rule.get("enabled"), Some(&bool_value(true)));
        assert!(rule.get("id").unwrap().is_unknown());
        assert!(plan.planned.get("vdc_group_id").unwrap().is_unknown());
    }
}
