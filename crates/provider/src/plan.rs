//! Plan computation for PlanResourceChange
//!
//! Terraform hands over the prior state, the proposed new state (config
//! merged with prior computed values) and the raw config. The planned state
//! marks values the provider will only learn during apply as unknown.

use crate::schema::{Attribute, Block, Nesting, PathStep};
use crate::state::DynamicValue;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub planned: DynamicValue,
    pub requires_replace: Vec<Vec<PathStep>>,
}

pub fn plan_change(
    block: &Block,
    prior: &DynamicValue,
    proposed: &DynamicValue,
    config: &DynamicValue,
) -> Plan {
    if proposed.is_null() {
        return Plan {
            planned: DynamicValue::Null,
            requires_replace: vec![],
        };
    }

    let creating = prior.is_null();
    let changed = creating || prior != proposed;
    let planned = plan_object(&block.attributes, prior, proposed, config, changed);

    let requires_replace = if creating {
        vec![]
    } else {
        block
            .attributes
            .iter()
            .filter(|attr| attr.force_new)
            .filter(|attr| {
                let before = prior.get(&attr.name).cloned().unwrap_or_default();
                let after = planned.get(&attr.name).cloned().unwrap_or_default();
                before != after
            })
            .map(|attr| vec![PathStep::Attribute(attr.name.clone())])
            .collect()
    };

    Plan {
        planned,
        requires_replace,
    }
}

fn plan_object(
    attrs: &[Attribute],
    prior: &DynamicValue,
    proposed: &DynamicValue,
    config: &DynamicValue,
    changed: bool,
) -> DynamicValue {
    if proposed.is_null() || proposed.is_unknown() {
        return proposed.clone();
    }
    DynamicValue::Map(
        attrs
            .iter()
            .map(|attr| {
                let prior = prior.get(&attr.name).cloned().unwrap_or_default();
                let proposed = proposed.get(&attr.name).cloned().unwrap_or_default();
                let config = config.get(&attr.name).cloned().unwrap_or_default();
                (
                    attr.name.clone(),
                    plan_attribute(attr, &prior, &proposed, &config, changed),
                )
            })
            .collect(),
    )
}

fn plan_attribute(
    attr: &Attribute,
    prior: &DynamicValue,
    proposed: &DynamicValue,
    config: &DynamicValue,
    changed: bool,
) -> DynamicValue {
    if config.is_null() && attr.computed {
        if !changed {
            return proposed.clone();
        }
        if let Some(default) = &attr.default {
            return default.clone();
        }
        if attr.stable && !proposed.is_null() {
            return proposed.clone();
        }
        return DynamicValue::Unknown;
    }

    match attr.nested() {
        Some((Nesting::Single, attrs)) => plan_object(attrs, prior, proposed, config, changed),
        Some((_, attrs)) => match proposed.as_list() {
            Some(items) => DynamicValue::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let prior = element(prior, i);
                        let config = element(config, i);
                        plan_object(attrs, &prior, item, &config, changed)
                    })
                    .collect(),
            ),
            None => proposed.clone(),
        },
        None => proposed.clone(),
    }
}

fn element(value: &DynamicValue, index: usize) -> DynamicValue {
    value
        .as_list()
        .and_then(|items| items.get(index))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::state::{bool_value, list_value, make_state, null_value, string_value};

    fn block() -> Block {
        Block::new(
            "test",
            vec![
                Attribute::id(),
                Attribute::string("name").required().force_new(),
                Attribute::string("description").optional(),
                Attribute::string("status").computed(),
                Attribute::bool("enabled").default(bool_value(true)),
                Attribute::list_nested(
                    "rules",
                    vec![
                        Attribute::string("id").computed(),
                        Attribute::string("name").required(),
                    ],
                )
                .optional(),
            ],
        )
    }

    #[test]
    fn test_create_marks_computed_unknown_and_applies_defaults() {
        let config = make_state(vec![
            ("id", null_value()),
            ("name", string_value("a")),
            ("description", null_value()),
            ("status", null_value()),
            ("enabled", null_value()),
            (
                "rules",
                list_value(vec![make_state(vec![
                    ("id", null_value()),
                    ("name", string_value("r1")),
                ])]),
            ),
        ]);
        let plan = plan_change(&block(), &DynamicValue::Null, &config, &config);

        assert!(plan.planned.get("id").unwrap().is_unknown());
        assert!(plan.planned.get("status").unwrap().is_unknown());
        assert!(plan.planned.get("description").unwrap().is_null());
        assert_eq!(plan.planned.get("enabled"), Some(&bool_value(true)));
        let rule = &plan.planned.get("rules").unwrap().as_list().unwrap()[0];
        assert!(rule.get("id").unwrap().is_unknown());
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn test_update_keeps_id_and_flags_force_new() {
        let prior = make_state(vec![
            ("id", string_value("urn:1")),
            ("name", string_value("a")),
            ("description", null_value()),
            ("status", string_value("READY")),
            ("enabled", bool_value(true)),
            ("rules", null_value()),
        ]);
        let mut proposed = prior.clone();
        proposed.set("name", string_value("b"));
        let config = make_state(vec![("name", string_value("b"))]);

        let plan = plan_change(&block(), &prior, &proposed, &config);
        assert_eq!(plan.planned.get("id"), Some(&string_value("urn:1")));
        assert!(plan.planned.get("status").unwrap().is_unknown());
        assert_eq!(plan.requires_replace, vec![vec![PathStep::Attribute("name".into())]]);
    }

    #[test]
    fn test_no_change_is_a_noop() {
        let prior = make_state(vec![
            ("id", string_value("urn:1")),
            ("name", string_value("a")),
            ("description", null_value()),
            ("status", string_value("READY")),
            ("enabled", bool_value(true)),
            ("rules", null_value()),
        ]);
        let config = make_state(vec![("name", string_value("a"))]);
        let plan = plan_change(&block(), &prior, &prior, &config);
        assert_eq!(plan.planned, prior);
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn test_destroy_plans_null() {
        let prior = make_state(vec![("id", string_value("urn:1"))]);
        let plan = plan_change(&block(), &prior, &DynamicValue::Null, &DynamicValue::Null);
        assert!(plan.planned.is_null());
    }
}
