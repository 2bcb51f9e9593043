//! Terraform Schema Definitions
//!
//! Attribute and block builders, config validation, and conversion of the
//! in-memory schema into tfplugin6 messages.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use regex::Regex;
use serde_json::json;

use crate::generated::tfplugin6;
use crate::state::DynamicValue;

/// Primitive and collection types, encoded as cty type JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    String,
    Number,
    Bool,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Map(Box<AttrType>),
}

impl AttrType {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrType::String => json!("string"),
            AttrType::Number => json!("number"),
            AttrType::Bool => json!("bool"),
            AttrType::List(inner) => json!(["list", inner.to_json()]),
            AttrType::Set(inner) => json!(["set", inner.to_json()]),
            AttrType::Map(inner) => json!(["map", inner.to_json()]),
        }
    }

    pub fn label(&self) -> String {
        match self {
            AttrType::String => "String".into(),
            AttrType::Number => "Number".into(),
            AttrType::Bool => "Boolean".into(),
            AttrType::List(inner) => format!("List of {}", inner.label()),
            AttrType::Set(inner) => format!("Set of {}", inner.label()),
            AttrType::Map(inner) => format!("Map of {}", inner.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    Single,
    List,
    Set,
}

#[derive(Debug, Clone)]
pub enum AttrKind {
    Primitive(AttrType),
    Nested(Nesting, Vec<Attribute>),
}

/// Checks applied to known, non-null string or number values.
#[derive(Debug, Clone)]
pub enum Validator {
    OneOf(&'static [&'static str]),
    OneOfInt(&'static [i64]),
    IntBetween(i64, i64),
    LengthBetween(usize, usize),
    Pattern(&'static str, &'static str),
    IpAddress,
    Cidr,
    /// An address, a CIDR network or an `a.b.c.d-e.f.g.h` range.
    AddressOrRange,
    Urn(&'static str),
    PortRange,
    Pem(&'static str),
}

/// Checks across sibling attributes of one object.
#[derive(Debug, Clone)]
pub enum BlockValidator {
    ExactlyOneOf(&'static [&'static str]),
    AtLeastOneOf(&'static [&'static str]),
    ConflictsWith(&'static str, &'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Attribute(String),
    Index(i64),
}

/// A config problem scoped to an attribute path.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: Vec<PathStep>,
    pub summary: String,
    pub detail: String,
}

impl Violation {
    fn new(path: &[PathStep], summary: &str, detail: String) -> Self {
        Self {
            path: path.to_vec(),
            summary: summary.to_string(),
            detail,
        }
    }
}

pub fn path_to_proto(path: &[PathStep]) -> tfplugin6::AttributePath {
    use tfplugin6::attribute_path::step::Selector;
    tfplugin6::AttributePath {
        steps: path
            .iter()
            .map(|step| tfplugin6::attribute_path::Step {
                selector: Some(match step {
                    PathStep::Attribute(name) => Selector::AttributeName(name.clone()),
                    PathStep::Index(i) => Selector::ElementKeyInt(*i),
                }),
            })
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttrKind,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub force_new: bool,
    /// Keep the prior value in plans instead of marking it unknown.
    pub stable: bool,
    pub default: Option<DynamicValue>,
    pub validators: Vec<Validator>,
}

impl Attribute {
    fn new(name: &str, kind: AttrKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_new: false,
            stable: false,
            default: None,
            validators: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttrKind::Primitive(AttrType::String))
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, AttrKind::Primitive(AttrType::Number))
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttrKind::Primitive(AttrType::Bool))
    }

    pub fn list(name: &str, element: AttrType) -> Self {
        Self::new(name, AttrKind::Primitive(AttrType::List(Box::new(element))))
    }

    pub fn set(name: &str, element: AttrType) -> Self {
        Self::new(name, AttrKind::Primitive(AttrType::Set(Box::new(element))))
    }

    pub fn map(name: &str, element: AttrType) -> Self {
        Self::new(name, AttrKind::Primitive(AttrType::Map(Box::new(element))))
    }

    pub fn single_nested(name: &str, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttrKind::Nested(Nesting::Single, attributes))
    }

    pub fn list_nested(name: &str, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttrKind::Nested(Nesting::List, attributes))
    }

    pub fn set_nested(name: &str, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttrKind::Nested(Nesting::Set, attributes))
    }

    /// The resource `id`: computed and kept across updates.
    pub fn id() -> Self {
        Self::string("id")
            .computed()
            .stable()
            .describe("The ID of the resource.")
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional_computed(self) -> Self {
        self.optional().computed()
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn stable(mut self) -> Self {
        self.stable = true;
        self
    }

    /// Default used when the config leaves the attribute null; implies computed.
    pub fn default(mut self, value: DynamicValue) -> Self {
        self.default = Some(value);
        self.optional = true;
        self.computed = true;
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn nested(&self) -> Option<(Nesting, &[Attribute])> {
        match &self.kind {
            AttrKind::Nested(nesting, attrs) => Some((*nesting, attrs)),
            AttrKind::Primitive(_) => None,
        }
    }

    /// Read-only copy of the attribute, as exposed by data sources.
    pub fn into_computed(mut self) -> Self {
        self.required = false;
        self.optional = false;
        self.computed = true;
        self.force_new = false;
        self.default = None;
        self.validators.clear();
        self.kind = match std::mem::replace(&mut self.kind, AttrKind::Primitive(AttrType::String)) {
            AttrKind::Nested(nesting, attrs) => AttrKind::Nested(
                nesting,
                attrs.into_iter().map(Attribute::into_computed).collect(),
            ),
            primitive => primitive,
        };
        self
    }

    pub fn type_label(&self) -> String {
        match &self.kind {
            AttrKind::Primitive(t) => t.label(),
            AttrKind::Nested(Nesting::Single, _) => "Attributes".into(),
            AttrKind::Nested(Nesting::List, _) => "Attributes List".into(),
            AttrKind::Nested(Nesting::Set, _) => "Attributes Set".into(),
        }
    }

    fn to_proto(&self) -> tfplugin6::schema::Attribute {
        let (r#type, nested_type) = match &self.kind {
            AttrKind::Primitive(t) => (t.to_json().to_string().into_bytes(), None),
            AttrKind::Nested(nesting, attrs) => {
                use tfplugin6::schema::object::NestingMode;
                let mode = match nesting {
                    Nesting::Single => NestingMode::Single,
                    Nesting::List => NestingMode::List,
                    Nesting::Set => NestingMode::Set,
                };
                (
                    Vec::new(),
                    Some(tfplugin6::schema::Object {
                        attributes: attrs.iter().map(Attribute::to_proto).collect(),
                        nesting: mode as i32,
                        min_items: 0,
                        max_items: 0,
                    }),
                )
            }
        };

        tfplugin6::schema::Attribute {
            name: self.name.clone(),
            r#type,
            nested_type,
            description: self.description.clone(),
            required: self.required,
            optional: self.optional,
            computed: self.computed,
            sensitive: self.sensitive,
            description_kind: tfplugin6::StringKind::Markdown as i32,
            deprecated: false,
        }
    }

    /// Brings a value to the attribute's shape: nested objects get every
    /// declared attribute, unknown keys are dropped.
    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        match (&self.kind, value) {
            (_, DynamicValue::Null) | (_, DynamicValue::Unknown) => value.clone(),
            (AttrKind::Nested(Nesting::Single, attrs), v) => conform_object(attrs, v),
            (AttrKind::Nested(_, attrs), DynamicValue::List(items)) => DynamicValue::List(
                items.iter().map(|item| conform_object(attrs, item)).collect(),
            ),
            (AttrKind::Nested(_, _), _) => DynamicValue::Null,
            (AttrKind::Primitive(_), v) => v.clone(),
        }
    }

    fn check(&self, value: &DynamicValue, path: &mut Vec<PathStep>, out: &mut Vec<Violation>) {
        if value.is_null() || value.is_unknown() {
            return;
        }
        match &self.kind {
            AttrKind::Primitive(AttrType::List(_))
            | AttrKind::Primitive(AttrType::Set(_)) => {
                for (i, item) in value.as_list().unwrap_or(&[]).iter().enumerate() {
                    path.push(PathStep::Index(i as i64));
                    for validator in &self.validators {
                        check_value(validator, item, path, out);
                    }
                    path.pop();
                }
            }
            AttrKind::Primitive(_) => {
                for validator in &self.validators {
                    check_value(validator, value, path, out);
                }
            }
            AttrKind::Nested(Nesting::Single, attrs) => {
                check_object(attrs, &[], value, path, out);
            }
            AttrKind::Nested(_, attrs) => {
                for (i, item) in value.as_list().unwrap_or(&[]).iter().enumerate() {
                    path.push(PathStep::Index(i as i64));
                    check_object(attrs, &[], item, path, out);
                    path.pop();
                }
            }
        }
    }
}

fn conform_object(attrs: &[Attribute], value: &DynamicValue) -> DynamicValue {
    if value.is_null() || value.is_unknown() {
        return value.clone();
    }
    DynamicValue::Map(
        attrs
            .iter()
            .map(|attr| {
                let inner = value.get(&attr.name).cloned().unwrap_or_default();
                (attr.name.clone(), attr.conform(&inner))
            })
            .collect(),
    )
}

fn check_object(
    attrs: &[Attribute],
    validators: &[BlockValidator],
    value: &DynamicValue,
    path: &mut Vec<PathStep>,
    out: &mut Vec<Violation>,
) {
    if value.is_null() || value.is_unknown() {
        return;
    }
    for attr in attrs {
        if let Some(inner) = value.get(&attr.name) {
            path.push(PathStep::Attribute(attr.name.clone()));
            attr.check(inner, path, out);
            path.pop();
        }
    }
    for validator in validators {
        check_block(validator, value, path, out);
    }
}

fn is_set(value: &DynamicValue, name: &str) -> bool {
    value.get(name).map(|v| !v.is_null()).unwrap_or(false)
}

fn check_block(
    validator: &BlockValidator,
    value: &DynamicValue,
    path: &[PathStep],
    out: &mut Vec<Violation>,
) {
    match validator {
        BlockValidator::ExactlyOneOf(names) => {
            let set = names.iter().filter(|n| is_set(value, n)).count();
            if set != 1 {
                out.push(Violation::new(
                    path,
                    "Invalid Attribute Combination",
                    format!(
                        "Exactly one of these attributes must be configured: [{}]",
                        names.join(",")
                    ),
                ));
            }
        }
        BlockValidator::AtLeastOneOf(names) => {
            if !names.iter().any(|n| is_set(value, n)) {
                out.push(Violation::new(
                    path,
                    "Invalid Attribute Combination",
                    format!(
                        "At least one of these attributes must be configured: [{}]",
                        names.join(",")
                    ),
                ));
            }
        }
        BlockValidator::ConflictsWith(a, b) => {
            if is_set(value, a) && is_set(value, b) {
                let mut at = path.to_vec();
                at.push(PathStep::Attribute(b.to_string()));
                out.push(Violation::new(
                    &at,
                    "Invalid Attribute Combination",
                    format!("Attribute \"{}\" cannot be specified when \"{}\" is specified", b, a),
                ));
            }
        }
    }
}

fn check_value(
    validator: &Validator,
    value: &DynamicValue,
    path: &[PathStep],
    out: &mut Vec<Violation>,
) {
    if value.is_unknown() || value.is_null() {
        return;
    }
    let text = value.as_string().unwrap_or_default();
    let problem = match validator {
        Validator::OneOf(allowed) => (!allowed.contains(&text)).then(|| {
            format!("value must be one of: [{}], got: \"{}\"", allowed.join(" "), text)
        }),
        Validator::OneOfInt(allowed) => {
            let n = value.as_i64().unwrap_or_default();
            (!allowed.contains(&n)).then(|| {
                let list: Vec<String> = allowed.iter().map(i64::to_string).collect();
                format!("value must be one of: [{}], got: {}", list.join(" "), n)
            })
        }
        Validator::IntBetween(min, max) => {
            let n = value.as_i64().unwrap_or_default();
            (n < *min || n > *max)
                .then(|| format!("value must be between {} and {}, got: {}", min, max, n))
        }
        Validator::LengthBetween(min, max) => {
            let len = text.chars().count();
            (len < *min || len > *max).then(|| {
                format!("string length must be between {} and {}, got: {}", min, max, len)
            })
        }
        Validator::Pattern(pattern, message) => match Regex::new(pattern) {
            Ok(re) if re.is_match(text) => None,
            Ok(_) => Some(format!("{}, got: \"{}\"", message, text)),
            Err(e) => Some(format!("invalid validation pattern: {}", e)),
        },
        Validator::IpAddress => text
            .parse::<IpAddr>()
            .is_err()
            .then(|| format!("value must be a valid IP address, got: \"{}\"", text)),
        Validator::Cidr => text
            .parse::<IpNetwork>()
            .is_err()
            .then(|| format!("value must be a valid CIDR network, got: \"{}\"", text)),
        Validator::AddressOrRange => {
            let valid = match text.split_once('-') {
                Some((start, end)) => {
                    start.trim().parse::<IpAddr>().is_ok() && end.trim().parse::<IpAddr>().is_ok()
                }
                None => text.parse::<IpNetwork>().is_ok(),
            };
            (!valid).then(|| {
                format!(
                    "value must be an IP address, a CIDR network or an IP range, got: \"{}\"",
                    text
                )
            })
        }
        Validator::Urn(kind) => (!cloudavenue_common::types::is_urn(text, kind)).then(|| {
            format!(
                "value must be a valid urn:vcloud:{} identifier, got: \"{}\"",
                kind, text
            )
        }),
        Validator::PortRange => {
            (!cloudavenue_common::api::app_port_profile::valid_port_range(text)).then(|| {
                format!(
                    "value must be a port or a port range (e.g. 8000-8080), got: \"{}\"",
                    text
                )
            })
        }
        Validator::Pem(label) => {
            (!cloudavenue_common::api::certificate::looks_like_pem(text, label))
                .then(|| format!("value must be a PEM encoded {}", label))
        }
    };

    if let Some(detail) = problem {
        out.push(Violation::new(path, "Invalid Attribute Value", detail));
    }
}

/// Top-level configuration block of a resource, data source or provider.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub description: String,
    pub attributes: Vec<Attribute>,
    pub validators: Vec<BlockValidator>,
}

impl Block {
    pub fn new(description: &str, attributes: Vec<Attribute>) -> Self {
        Self {
            description: description.to_string(),
            attributes,
            validators: Vec::new(),
        }
    }

    pub fn validate(mut self, validator: BlockValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Data source shape of a resource block: every attribute computed,
    /// except `lookups`, which replace the attributes of the same name.
    pub fn computed_except(self, lookups: Vec<Attribute>) -> Self {
        let mut attributes: Vec<Attribute> = self
            .attributes
            .into_iter()
            .filter(|a| !lookups.iter().any(|l| l.name == a.name))
            .map(Attribute::into_computed)
            .collect();
        attributes.extend(lookups);
        Self {
            description: self.description,
            attributes,
            validators: Vec::new(),
        }
    }

    pub fn without(mut self, names: &[&str]) -> Self {
        self.attributes.retain(|a| !names.contains(&a.name.as_str()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        conform_object(&self.attributes, value)
    }

    /// Runs every validator against a (possibly partially unknown) config.
    pub fn check(&self, config: &DynamicValue) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        check_object(&self.attributes, &self.validators, config, &mut path, &mut out);
        out
    }

    fn to_proto(&self, version: i64) -> tfplugin6::schema::Block {
        tfplugin6::schema::Block {
            version,
            attributes: self.attributes.iter().map(Attribute::to_proto).collect(),
            block_types: vec![],
            description: self.description.clone(),
            description_kind: tfplugin6::StringKind::Markdown as i32,
            deprecated: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    pub fn new(block: Block) -> Self {
        Self { version: 0, block }
    }

    pub fn to_proto(&self) -> tfplugin6::Schema {
        tfplugin6::Schema {
            version: self.version,
            block: Some(self.block.to_proto(self.version)),
        }
    }

    /// JSON rendering in the shape of `terraform providers schema -json`.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "version": self.version,
            "block": block_json(&self.block.attributes, &self.block.description),
        })
    }
}

fn block_json(attrs: &[Attribute], description: &str) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = attrs
        .iter()
        .map(|attr| {
            let mut entry = serde_json::Map::new();
            match &attr.kind {
                AttrKind::Primitive(t) => {
                    entry.insert("type".into(), t.to_json());
                }
                AttrKind::Nested(nesting, inner) => {
                    let mode = match nesting {
                        Nesting::Single => "single",
                        Nesting::List => "list",
                        Nesting::Set => "set",
                    };
                    let mut nested = block_json(inner, "");
                    nested["nesting_mode"] = json!(mode);
                    entry.insert("nested_type".into(), nested);
                }
            }
            if !attr.description.is_empty() {
                entry.insert("description".into(), json!(attr.description));
                entry.insert("description_kind".into(), json!("markdown"));
            }
            for (flag, on) in [
                ("required", attr.required),
                ("optional", attr.optional),
                ("computed", attr.computed),
                ("sensitive", attr.sensitive),
            ] {
                if on {
                    entry.insert(flag.into(), json!(true));
                }
            }
            (attr.name.clone(), serde_json::Value::Object(entry))
        })
        .collect();

    let mut block = json!({ "attributes": attributes });
    if !description.is_empty() {
        block["description"] = json!(description);
        block["description_kind"] = json!("markdown");
    }
    block
}

/// Provider configuration block
pub fn provider_schema() -> Schema {
    use cloudavenue_common::config::{DEFAULT_NETBACKUP_URL, DEFAULT_URL};

    Schema::new(Block::new(
        "The Cloud Avenue provider manages Orange Business Cloud Avenue resources.",
        vec![
            Attribute::string("url")
                .optional()
                .describe(&format!(
                    "The URL of the Cloud Avenue API. Defaults to `{}`. Can also be set with `CLOUDAVENUE_URL`.",
                    DEFAULT_URL
                )),
            Attribute::string("user")
                .optional()
                .describe("The username to use to connect to the Cloud Avenue API. Can also be set with `CLOUDAVENUE_USER`."),
            Attribute::string("password")
                .optional()
                .sensitive()
                .describe("The password to use to connect to the Cloud Avenue API. Can also be set with `CLOUDAVENUE_PASSWORD`."),
            Attribute::string("org")
                .optional()
                .describe("The organization used on Cloud Avenue API. Can also be set with `CLOUDAVENUE_ORG`."),
            Attribute::string("vdc")
                .optional()
                .describe("The default VDC used by resources that do not set one. Can also be set with `CLOUDAVENUE_VDC`."),
            Attribute::string("netbackup_url")
                .optional()
                .describe(&format!(
                    "The URL of the NetBackup API. Defaults to `{}`. Can also be set with `NETBACKUP_URL`.",
                    DEFAULT_NETBACKUP_URL
                )),
            Attribute::string("netbackup_user")
                .optional()
                .describe("The username of the NetBackup API. Can also be set with `NETBACKUP_USER`."),
            Attribute::string("netbackup_password")
                .optional()
                .sensitive()
                .describe("The password of the NetBackup API. Can also be set with `NETBACKUP_PASSWORD`."),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{int_value, list_value, make_state, string_value};

    fn sample() -> Block {
        Block::new(
            "sample",
            vec![
                Attribute::id(),
                Attribute::string("name").optional(),
                Attribute::string("mode").optional().validate(Validator::OneOf(&["IN", "OUT"])),
                Attribute::set("cidrs", AttrType::String).optional().validate(Validator::Cidr),
                Attribute::list_nested(
                    "ports",
                    vec![
                        Attribute::string("protocol").required(),
                        Attribute::number("limit")
                            .optional()
                            .validate(Validator::IntBetween(1, 10)),
                    ],
                )
                .optional(),
            ],
        )
        .validate(BlockValidator::ExactlyOneOf(&["id", "name"]))
    }

    #[test]
    fn test_type_json() {
        let t = AttrType::Set(Box::new(AttrType::List(Box::new(AttrType::String))));
        assert_eq!(t.to_json().to_string(), r#"["set",["list","string"]]"#);
        assert_eq!(t.label(), "Set of List of String");
    }

    #[test]
    fn test_conform_fills_missing_and_drops_extra() {
        let block = sample();
        let value = make_state(vec![
            ("name", string_value("a")),
            ("extra", string_value("x")),
            ("ports", list_value(vec![make_state(vec![("protocol", string_value("TCP"))])])),
        ]);
        let conformed = block.conform(&value);
        let map = conformed.as_map().unwrap();
        assert_eq!(map.len(), 5);
        assert!(map["id"].is_null());
        assert!(!map.contains_key("extra"));
        let port = &map["ports"].as_list().unwrap()[0];
        assert!(port.get("limit").unwrap().is_null());
    }

    #[test]
    fn test_check_reports_paths() {
        let block = sample();
        let config = make_state(vec![
            ("name", string_value("a")),
            ("mode", string_value("BOTH")),
            ("cidrs", list_value(vec![string_value("10.0.0.0/24"), string_value("nope")])),
            (
                "ports",
                list_value(vec![make_state(vec![
                    ("protocol", string_value("TCP")),
                    ("limit", int_value(50)),
                ])]),
            ),
        ]);
        let violations = block.check(&config);
        assert_eq!(violations.len(), 3);
        assert_eq!(violations[0].path, vec![PathStep::Attribute("mode".into())]);
        assert_eq!(
            violations[1].path,
            vec![PathStep::Attribute("cidrs".into()), PathStep::Index(1)]
        );
        assert_eq!(
            violations[2].path,
            vec![
                PathStep::Attribute("ports".into()),
                PathStep::Index(0),
                PathStep::Attribute("limit".into())
            ]
        );
    }

    #[test]
    fn test_exactly_one_of() {
        let block = sample();
        let both = make_state(vec![("id", string_value("x")), ("name", string_value("y"))]);
        assert_eq!(block.check(&both).len(), 1);
        let none = make_state(vec![]);
        assert_eq!(block.check(&none).len(), 1);
        // unknown values count as configured
        let unknown = make_state(vec![("name", DynamicValue::Unknown)]);
        assert!(block.check(&unknown).is_empty());
    }

    #[test]
    fn test_proto_conversion() {
        let proto = Schema::new(sample()).to_proto();
        let block = proto.block.unwrap();
        let ports = block.attributes.iter().find(|a| a.name == "ports").unwrap();
        assert!(ports.r#type.is_empty());
        assert_eq!(ports.nested_type.as_ref().unwrap().attributes.len(), 2);
        let id = block.attributes.iter().find(|a| a.name == "id").unwrap();
        assert_eq!(id.r#type, br#""string""#.to_vec());
        assert!(id.computed && !id.optional);
    }

    #[test]
    fn test_default_implies_optional_computed() {
        let attr = Attribute::bool("enabled").default(crate::state::bool_value(true));
        assert!(attr.optional && attr.computed);
    }
}
