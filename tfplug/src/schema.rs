//! Schema types and builders for tfplug
//!
//! Resources, data sources and the provider describe their attributes with
//! these types. The gRPC layer turns them into protocol schemas, and the
//! planning logic walks them to apply defaults, plan modifiers and
//! validators.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        AttributeType::List(Box::new(element))
    }

    pub fn map(element: AttributeType) -> Self {
        AttributeType::Map(Box::new(element))
    }

    /// Terraform's JSON type encoding, e.g. `["list","string"]`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};

        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(elem) => json!(["list", elem.to_json()]),
            AttributeType::Set(elem) => json!(["set", elem.to_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                json!(["object", fields])
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    fn normalize(&self, value: &Dynamic) -> Dynamic {
        match (self, value) {
            (AttributeType::Object(fields), Dynamic::Map(map)) => Dynamic::Map(
                fields
                    .iter()
                    .map(|(name, ty)| {
                        let v = map.get(name).map_or(Dynamic::Null, |v| ty.normalize(v));
                        (name.clone(), v)
                    })
                    .collect(),
            ),
            (AttributeType::List(elem) | AttributeType::Set(elem), Dynamic::List(items)) => {
                Dynamic::List(items.iter().map(|v| elem.normalize(v)).collect())
            }
            (AttributeType::Map(elem), Dynamic::Map(map)) => Dynamic::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), elem.normalize(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }
}

/// Schema is returned by providers/resources/data sources.
/// Version is used for state migration.
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

impl Schema {
    /// Fills in every declared attribute missing from `value` with null and
    /// drops undeclared keys, recursing into nested attributes. Null and
    /// unknown values are returned unchanged.
    pub fn normalize(&self, value: &DynamicValue) -> DynamicValue {
        DynamicValue::new(normalize_attributes(&self.block.attributes, &value.value))
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }
}

fn normalize_attributes(attributes: &[Attribute], value: &Dynamic) -> Dynamic {
    let Dynamic::Map(map) = value else {
        return value.clone();
    };

    Dynamic::Map(
        attributes
            .iter()
            .map(|attr| {
                let v = map.get(&attr.name).map_or(Dynamic::Null, |v| attr.normalize(v));
                (attr.name.clone(), v)
            })
            .collect(),
    )
}

/// Block represents the root configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
    pub nested_type: Option<NestedType>,
    pub deprecated: bool,
}

impl Attribute {
    /// The value type, derived from the nested attributes when present.
    pub fn value_type(&self) -> AttributeType {
        match &self.nested_type {
            None => self.r#type.clone(),
            Some(nested) => {
                let object = AttributeType::Object(
                    nested
                        .attributes
                        .iter()
                        .map(|a| (a.name.clone(), a.value_type()))
                        .collect(),
                );
                match nested.nesting {
                    ObjectNestingMode::Single => object,
                    ObjectNestingMode::List => AttributeType::List(Box::new(object)),
                    ObjectNestingMode::Set => AttributeType::Set(Box::new(object)),
                    ObjectNestingMode::Map => AttributeType::Map(Box::new(object)),
                }
            }
        }
    }

    fn normalize(&self, value: &Dynamic) -> Dynamic {
        match &self.nested_type {
            None => self.r#type.normalize(value),
            Some(nested) => match (nested.nesting, value) {
                (ObjectNestingMode::Single, _) => normalize_attributes(&nested.attributes, value),
                (ObjectNestingMode::List | ObjectNestingMode::Set, Dynamic::List(items)) => {
                    Dynamic::List(
                        items
                            .iter()
                            .map(|v| normalize_attributes(&nested.attributes, v))
                            .collect(),
                    )
                }
                (ObjectNestingMode::Map, Dynamic::Map(map)) => Dynamic::Map(
                    map.iter()
                        .map(|(k, v)| (k.clone(), normalize_attributes(&nested.attributes, v)))
                        .collect(),
                ),
                _ => value.clone(),
            },
        }
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .field("default", &self.default.is_some())
            .field("nested_type", &self.nested_type)
            .finish()
    }
}

/// NestedType for attributes with nested structures
#[derive(Debug, Clone)]
pub struct NestedType {
    pub attributes: Vec<Attribute>,
    pub nesting: ObjectNestingMode,
}

impl NestedType {
    pub fn single(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::Single,
        }
    }

    pub fn list(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            nesting: ObjectNestingMode::List,
        }
    }
}

/// ObjectNestingMode for nested attribute objects
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectNestingMode {
    Single,
    List,
    Set,
    Map,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// Validator checks attribute values during config validation.
/// Null and unknown values are never passed to validators.
pub trait Validator: Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier modifies planned values during planning
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
    /// Whether the whole resource is being created
    pub resource_created: bool,
}

pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides values for optional+computed attributes left unset
pub trait Default: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

pub struct DefaultRequest {
    pub path: AttributePath,
}

pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides fluent API for building attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                nested_type: None,
                deprecated: false,
            },
        }
    }

    /// Starts an attribute whose value is described by nested attributes.
    pub fn nested(name: &str, nested: NestedType) -> Self {
        let mut builder = Self::new(name, AttributeType::String);
        builder.attribute.nested_type = Some(nested);
        builder.attribute.r#type = builder.attribute.value_type();
        builder
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(Arc::from(modifier));
        self
    }

    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(Arc::from(default));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    description_kind: StringKind::Plain,
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::RequiresReplace;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn clone_keeps_plan_modifiers() {
        let attr = AttributeBuilder::new("model", AttributeType::String)
            .required()
            .plan_modifier(RequiresReplace::create())
            .build();

        assert_eq!(attr.clone().plan_modifiers.len(), 1);
    }

    #[test]
    fn type_encoding_matches_terraform_json() {
        assert_eq!(AttributeType::String.to_bytes(), br#""string""#.to_vec());
        assert_eq!(
            AttributeType::list(AttributeType::String).to_json(),
            serde_json::json!(["list", "string"])
        );
        let object = AttributeType::Object(HashMap::from([(
            "n_epochs".to_string(),
            AttributeType::Number,
        )]));
        assert_eq!(
            object.to_json(),
            serde_json::json!(["object", {"n_epochs": "number"}])
        );
    }

    #[test]
    fn nested_attribute_value_type() {
        let attr = AttributeBuilder::nested(
            "tools",
            NestedType::list(vec![AttributeBuilder::new("type", AttributeType::String)
                .required()
                .build()]),
        )
        .optional()
        .build();

        assert_eq!(
            attr.value_type(),
            AttributeType::list(AttributeType::Object(HashMap::from([(
                "type".to_string(),
                AttributeType::String
            )])))
        );
    }

    #[test]
    fn normalize_fills_missing_attributes() {
        let schema = SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(
                AttributeBuilder::nested(
                    "file_counts",
                    NestedType::single(vec![
                        AttributeBuilder::new("total", AttributeType::Number)
                            .computed()
                            .build(),
                        AttributeBuilder::new("failed", AttributeType::Number)
                            .computed()
                            .build(),
                    ]),
                )
                .computed()
                .build(),
            )
            .build();

        let mut value = DynamicValue::object();
        value
            .set_i64(&AttributePath::new("file_counts").attribute("total"), 2)
            .unwrap();
        value
            .set_string(&AttributePath::new("stray"), "dropped")
            .unwrap();

        let normalized = schema.normalize(&value);
        assert!(normalized.is_null_at(&AttributePath::new("id")));
        assert!(normalized.get(&AttributePath::new("stray")).is_none());
        assert_eq!(
            normalized.get(&AttributePath::new("file_counts").attribute("failed")),
            Some(&Dynamic::Null)
        );
    }

    #[test]
    fn normalize_leaves_null_root_alone() {
        let schema = SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .build();
        assert!(schema.normalize(&DynamicValue::null()).is_null());
    }
}
