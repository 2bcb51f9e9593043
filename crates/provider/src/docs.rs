//! Documentation and schema export
//!
//! Renders one markdown page per resource and data source in the layout of
//! the Terraform registry, and the whole provider schema as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::resources::{self, PREFIX};
use crate::schema::{self, Attribute, Schema};

/// Registry address the schema JSON is keyed by.
pub const PROVIDER_ADDRESS: &str = "registry.terraform.io/orange-cloudavenue/cloudavenue";

/// Same shape as `terraform providers schema -json`.
pub fn schema_json() -> serde_json::Value {
    let resource_schemas: serde_json::Map<_, _> = resources::resources()
        .iter()
        .map(|r| (r.type_name().to_string(), r.schema().to_json()))
        .collect();
    let data_source_schemas: serde_json::Map<_, _> = resources::data_sources()
        .iter()
        .map(|d| (d.type_name().to_string(), d.schema().to_json()))
        .collect();
    json!({
        "format_version": "1.0",
        "provider_schemas": {
            PROVIDER_ADDRESS: {
                "provider": schema::provider_schema().to_json(),
                "resource_schemas": resource_schemas,
                "data_source_schemas": data_source_schemas,
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Resource,
    DataSource,
}

impl PageKind {
    fn title(self) -> &'static str {
        match self {
            PageKind::Resource => "Resource",
            PageKind::DataSource => "Data Source",
        }
    }

    fn dir(self) -> &'static str {
        match self {
            PageKind::Resource => "resources",
            PageKind::DataSource => "data-sources",
        }
    }
}

fn attribute_line(attr: &Attribute, anchor_prefix: &str) -> String {
    let mut line = format!("- `{}` ({})", attr.name, attr.type_label());
    if attr.sensitive {
        line.push_str(", Sensitive");
    }
    if !attr.description.is_empty() {
        line.push(' ');
        line.push_str(&attr.description);
    }
    if attr.force_new {
        line.push_str(" Changing this forces a new resource.");
    }
    if attr.nested().is_some() {
        line.push_str(&format!(
            " (see [below for nested schema](#{}--{}))",
            anchor_prefix, attr.name
        ));
    }
    line
}

/// Required / Optional / Read-Only sections, then nested schemas.
fn render_attributes(out: &mut String, attrs: &[Attribute], anchor_prefix: &str, top: bool) {
    let sections: [(&str, Box<dyn Fn(&Attribute) -> bool>); 3] = [
        ("Required", Box::new(|a: &Attribute| a.required)),
        ("Optional", Box::new(|a: &Attribute| a.optional)),
        ("Read-Only", Box::new(|a: &Attribute| a.computed && !a.optional)),
    ];
    for (title, matches) in sections.iter() {
        let mut selected: Vec<&Attribute> = attrs.iter().filter(|a| matches(a)).collect();
        if selected.is_empty() {
            continue;
        }
        selected.sort_by(|a, b| a.name.cmp(&b.name));
        if top {
            out.push_str(&format!("\n### {}\n\n", title));
        } else {
            out.push_str(&format!("\n{}:\n\n", title));
        }
        for attr in selected {
            out.push_str(&attribute_line(attr, anchor_prefix));
            out.push('\n');
        }
    }

    for attr in attrs {
        if let Some((_, inner)) = attr.nested() {
            let anchor = format!("{}--{}", anchor_prefix, attr.name);
            out.push_str(&format!(
                "\n<a id=\"{}\"></a>\n### Nested Schema for `{}`\n",
                anchor,
                anchor.trim_start_matches("nestedatt--").replace("--", ".")
            ));
            render_attributes(out, inner, &anchor, false);
        }
    }
}

/// Markdown page of one resource or data source.
pub fn render_page(kind: PageKind, type_name: &str, schema: &Schema) -> String {
    let description = schema.block.description.trim();
    let mut out = format!(
        "---\npage_title: \"{} {} - cloudavenue\"\nsubcategory: \"\"\ndescription: |-\n  {}\n---\n\n# {} ({})\n\n{}\n\n## Schema\n",
        type_name,
        kind.title(),
        description,
        type_name,
        kind.title(),
        description
    );
    render_attributes(&mut out, &schema.block.attributes, "nestedatt", true);
    out
}

/// Provider index page with the configuration block.
pub fn render_index() -> String {
    let mut out = String::from(
        "---\npage_title: \"cloudavenue Provider\"\ndescription: |-\n  Manage Orange Business Cloud Avenue resources.\n---\n\n# cloudavenue Provider\n\n",
    );
    let provider = schema::provider_schema();
    out.push_str(&provider.block.description);
    out.push_str("\n\n## Schema\n");
    render_attributes(&mut out, &provider.block.attributes, "nestedatt", true);
    out
}

/// Writes `index.md`, `resources/*.md` and `data-sources/*.md` under `out`.
pub fn write_docs(out: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut write = |path: PathBuf, content: String| -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
        Ok(())
    };

    write(out.join("index.md"), render_index())?;
    for r in resources::resources() {
        let short = r.type_name().trim_start_matches(PREFIX);
        let path = out.join(PageKind::Resource.dir()).join(format!("{}.md", short));
        write(path, render_page(PageKind::Resource, r.type_name(), &r.schema()))?;
    }
    for d in resources::data_sources() {
        let short = d.type_name().trim_start_matches(PREFIX);
        let path = out.join(PageKind::DataSource.dir()).join(format!("{}.md", short));
        write(path, render_page(PageKind::DataSource, d.type_name(), &d.schema()))?;
    }

    info!(pages = written.len(), out = %out.display(), "Documentation written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_docs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_docs(dir.path()).unwrap();
        assert_eq!(
            written.len(),
            1 + resources::resources().len() + resources::data_sources().len()
        );
        assert!(dir.path().join("resources/vdc.md").exists());
        assert!(dir.path().join("data-sources/tier0_vrfs.md").exists());

        let page = fs::read_to_string(dir.path().join("resources/vdcg_firewall.md")).unwrap();
        assert!(page.starts_with("---\npage_title: \"cloudavenue_vdcg_firewall Resource"));
        assert!(page.contains("### Required"));
        assert!(page.contains("<a id=\"nestedatt--rules\"></a>"));
        assert!(page.contains("### Nested Schema for `rules`"));
    }

    #[test]
    fn test_sensitive_and_force_new_are_documented() {
        let page = render_page(
            PageKind::Resource,
            "cloudavenue_iam_user",
            &resources::resources()
                .into_iter()
                .find(|r| r.type_name() == "cloudavenue_iam_user")
                .unwrap()
                .schema(),
        );
        assert!(page.contains("- `password` (String), Sensitive"));
        assert!(page.contains("Changing this forces a new resource."));
    }

    #[test]
    fn test_schema_json_shape() {
        let json = schema_json();
        let provider = &json["provider_schemas"][PROVIDER_ADDRESS];
        assert_eq!(
            provider["provider"]["block"]["attributes"]["password"]["sensitive"],
            true
        );
        assert!(provider["resource_schemas"]["cloudavenue_vdc"].is_object());
        assert!(provider["data_source_schemas"]["cloudavenue_bms"].is_object());
    }
}
