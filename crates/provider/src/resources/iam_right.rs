//! Rights known to the organization (read only)

use anyhow::Result;
use cloudavenue_common::api::iam::Right;
use cloudavenue_common::Client;

use super::DataSource;
use crate::schema::{AttrType, Attribute, Block, Schema};
use crate::state::{get_string_attr, make_state, string_list_value, string_value, DynamicValue};

fn from_api(right: &Right) -> DynamicValue {
    make_state(vec![
        ("id", string_value(&right.id)),
        ("name", string_value(&right.name)),
        ("description", string_value(&right.description)),
        ("category_id", string_value(&right.category)),
        ("bundle_key", string_value(&right.bundle_key)),
        ("right_type", string_value(&right.right_type)),
        (
            "implied_rights",
            string_list_value(right.implied_rights.iter().map(|r| r.name.clone())),
        ),
    ])
}

pub struct RightDataSource;

#[async_trait::async_trait]
impl DataSource for RightDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_iam_right"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(
            "Reads a right, for use in `cloudavenue_iam_role.rights`.",
            vec![
                Attribute::string("name").required().describe("The name of the right."),
                Attribute::id(),
                Attribute::string("description")
                    .computed()
                    .describe("The description of the right."),
                Attribute::string("category_id")
                    .computed()
                    .describe("The ID of the right category."),
                Attribute::string("bundle_key")
                    .computed()
                    .describe("The key of the right's localized name."),
                Attribute::string("right_type").computed().describe("`VIEW` or `MODIFY`."),
                Attribute::set("implied_rights", AttrType::String)
                    .computed()
                    .describe("The names of the rights this right implies."),
            ],
        ))
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let right = client
            .get_right_by_name(&get_string_attr(config, "name"))
            .await?;
        Ok(from_api(&right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudavenue_common::EntityRef;

    #[test]
    fn test_implied_rights_by_name() {
        let right = Right {
            id: "urn:vcloud:right:1".into(),
            name: "vApp: Edit Properties".into(),
            right_type: "MODIFY".into(),
            implied_rights: vec![EntityRef::named("urn:vcloud:right:2", "vApp: View")],
            ..Default::default()
        };
        let state = from_api(&right);
        assert_eq!(
            crate::state::get_string_list_attr(&state, "implied_rights"),
            vec!["vApp: View"]
        );
        assert_eq!(get_string_attr(&state, "right_type"), "MODIFY");
    }
}
