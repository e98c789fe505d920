//! `EXT_structural_metadata`: schemas, classes, enums and property tables.
//!
//! The schema lives in the document-level extension object together with
//! the property tables whose columns are packed into the main buffer by
//! [`table`].

pub mod table;

use gltfx_core::{Document, Extension, ExtensionRegistry, GltfError, NamedExtension, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use table::{
    add_property, add_property_table, read_property, read_property_table, MetadataEncodeOptions, NumericData,
    Padding, PropertyColumn, PropertyValues,
};

pub const EXTENSION_NAME: &str = "EXT_structural_metadata";

pub const DEFAULT_SCHEMA_ID: &str = "default_schema";

fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Types
// ============================================================================

/// Element type of a class property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    String,
    Boolean,
    Enum,
}

impl ElementType {
    /// Components per element; 1 for the non-numeric types.
    pub const fn components(self) -> usize {
        match self {
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 | ElementType::Mat2 => 4,
            ElementType::Mat3 => 9,
            ElementType::Mat4 => 16,
            _ => 1,
        }
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, ElementType::String | ElementType::Boolean | ElementType::Enum)
    }
}

/// Component type of numeric and enum properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertyComponentType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl PropertyComponentType {
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Integer type of `arrayOffsets` and `stringOffsets`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OffsetType {
    Uint8,
    Uint16,
    #[default]
    Uint32,
    Uint64,
}

impl OffsetType {
    pub const fn size(self) -> usize {
        match self {
            OffsetType::Uint8 => 1,
            OffsetType::Uint16 => 2,
            OffsetType::Uint32 => 4,
            OffsetType::Uint64 => 8,
        }
    }

    fn is_default(&self) -> bool {
        *self == OffsetType::Uint32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassProperty {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<PropertyComponentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub array: bool,
    /// Fixed array length; variable-length arrays leave it unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
}

impl ClassProperty {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            name: None,
            description: None,
            element_type,
            component_type: None,
            enum_type: None,
            array: false,
            count: None,
            normalized: false,
            offset: None,
            scale: None,
            min: None,
            max: None,
            required: false,
            no_data: None,
            default: None,
            semantic: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, ClassProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: i64,
}

fn default_enum_value_type() -> PropertyComponentType {
    PropertyComponentType::Uint16
}

fn is_default_enum_value_type(value: &PropertyComponentType) -> bool {
    *value == PropertyComponentType::Uint16
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default = "default_enum_value_type",
        skip_serializing_if = "is_default_enum_value_type"
    )]
    pub value_type: PropertyComponentType,
    pub values: Vec<EnumValue>,
}

impl Enum {
    pub fn new(values: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self {
            name: None,
            description: None,
            value_type: default_enum_value_type(),
            values: values
                .into_iter()
                .map(|(name, value)| EnumValue {
                    name,
                    description: None,
                    value,
                })
                .collect(),
        }
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }
}

fn default_schema_id() -> String {
    DEFAULT_SCHEMA_ID.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default = "default_schema_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub classes: IndexMap<String, Class>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub enums: IndexMap<String, Enum>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            id: default_schema_id(),
            name: None,
            description: None,
            version: None,
            classes: IndexMap::new(),
            enums: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTableProperty {
    pub values: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_offsets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_offsets: Option<u32>,
    #[serde(default, skip_serializing_if = "OffsetType::is_default")]
    pub array_offset_type: OffsetType,
    #[serde(default, skip_serializing_if = "OffsetType::is_default")]
    pub string_offset_type: OffsetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub class: String,
    pub count: usize,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyTableProperty>,
}

/// The document-level extension object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_tables: Vec<PropertyTable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_textures: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_attributes: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl NamedExtension for StructuralMetadata {
    const NAME: &'static str = EXTENSION_NAME;
}

impl StructuralMetadata {
    /// Checks that a schema is present and that every table names one of
    /// its classes. With only `schemaUri` the classes cannot be checked.
    pub fn validate(&self) -> Result<()> {
        let schema = match (&self.schema, &self.schema_uri) {
            (Some(schema), _) => schema,
            (None, Some(_)) => return Ok(()),
            (None, None) => return Err(GltfError::schema("structural metadata has no schema")),
        };
        for (i, table) in self.property_tables.iter().enumerate() {
            if !schema.classes.contains_key(&table.class) {
                return Err(GltfError::schema(format!(
                    "property table {} uses class {:?}, which the schema does not define",
                    i, table.class
                )));
            }
        }
        Ok(())
    }

    pub fn schema(&self) -> Result<&Schema> {
        self.schema
            .as_ref()
            .ok_or_else(|| GltfError::schema("structural metadata has no embedded schema"))
    }

    pub fn class(&self, class_id: &str) -> Result<&Class> {
        self.schema()?
            .classes
            .get(class_id)
            .ok_or_else(|| GltfError::schema(format!("class {:?} is not in the schema", class_id)))
    }

    pub fn property_table(&self, index: u32) -> Result<&PropertyTable> {
        gltfx_core::error::get_checked(&self.property_tables, index, "property table")
    }
}

/// Registers a decoder that rejects metadata without a schema or with
/// tables naming unknown classes.
pub fn register(registry: &ExtensionRegistry) -> bool {
    registry.register(EXTENSION_NAME, |bytes: &[u8]| {
        let metadata: StructuralMetadata =
            serde_json::from_slice(bytes).map_err(|e| GltfError::extension_parse(EXTENSION_NAME, e))?;
        metadata
            .validate()
            .map_err(|e| GltfError::extension_parse(EXTENSION_NAME, e))?;
        Ok(Box::new(metadata) as Box<dyn Extension>)
    })
}

// ============================================================================
// Schema construction
// ============================================================================

/// One property to declare on a class.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub element_type: ElementType,
    pub component_type: Option<PropertyComponentType>,
    pub enum_type: Option<String>,
    pub array: bool,
    pub count: Option<usize>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            element_type,
            component_type: None,
            enum_type: None,
            array: false,
            count: None,
        }
    }

    pub fn numeric(name: impl Into<String>, element_type: ElementType, ct: PropertyComponentType) -> Self {
        Self {
            component_type: Some(ct),
            ..Self::new(name, element_type)
        }
    }

    pub fn enumeration(name: impl Into<String>, enum_type: impl Into<String>) -> Self {
        Self {
            enum_type: Some(enum_type.into()),
            ..Self::new(name, ElementType::Enum)
        }
    }

    /// Marks the property as an array, fixed-length when `count` is set.
    pub fn array(mut self, count: Option<usize>) -> Self {
        self.array = true;
        self.count = count;
        self
    }
}

/// Ensures `schema` and its class `class_id` exist and (re)declares every
/// property of `specs` on that class.
pub fn create_or_update_schema(schema: Option<Schema>, class_id: &str, specs: &[PropertySpec]) -> Schema {
    let mut schema = schema.unwrap_or_default();
    let class = schema.classes.entry(class_id.to_string()).or_default();
    for spec in specs {
        let property = ClassProperty {
            component_type: spec.component_type,
            enum_type: spec.enum_type.clone(),
            array: spec.array,
            count: spec.count,
            ..ClassProperty::new(spec.element_type)
        };
        class.properties.insert(spec.name.clone(), property);
    }
    schema
}

/// The document's metadata object, decoded in place.
pub fn metadata(doc: &Document) -> Result<Option<StructuralMetadata>> {
    doc.extensions.read::<StructuralMetadata>()
}

/// The document's metadata object, created when missing.
pub fn metadata_mut(doc: &mut Document) -> Result<&mut StructuralMetadata> {
    if !doc.extensions.contains(EXTENSION_NAME) {
        doc.extensions.insert(StructuralMetadata::default());
    }
    doc.mark_extension_used(EXTENSION_NAME, false);
    doc.extensions
        .decode::<StructuralMetadata>()?
        .ok_or_else(|| GltfError::schema("structural metadata extension is missing"))
}

/// Declares `specs` on class `class_id` of the document's schema.
pub fn define_class(doc: &mut Document, class_id: &str, specs: &[PropertySpec]) -> Result<()> {
    let metadata = metadata_mut(doc)?;
    let schema = metadata.schema.take();
    metadata.schema = Some(create_or_update_schema(schema, class_id, specs));
    tracing::debug!(class = class_id, properties = specs.len(), "defined metadata class");
    Ok(())
}

/// Adds or replaces enum `enum_id` in the document's schema.
pub fn define_enum(doc: &mut Document, enum_id: &str, definition: Enum) -> Result<()> {
    let metadata = metadata_mut(doc)?;
    metadata
        .schema
        .get_or_insert_with(Schema::default)
        .enums
        .insert(enum_id.to_string(), definition);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_defaults() {
        let schema = create_or_update_schema(
            None,
            "building",
            &[
                PropertySpec::numeric("height", ElementType::Scalar, PropertyComponentType::Float32),
                PropertySpec::new("name", ElementType::String),
            ],
        );
        assert_eq!(schema.id, DEFAULT_SCHEMA_ID);
        let class = &schema.classes["building"];
        assert_eq!(class.properties.len(), 2);
        assert_eq!(
            class.properties["height"].component_type,
            Some(PropertyComponentType::Float32)
        );
    }

    #[test]
    fn test_update_overwrites_property() {
        let schema = create_or_update_schema(None, "c", &[PropertySpec::new("p", ElementType::String)]);
        let schema = create_or_update_schema(
            Some(schema),
            "c",
            &[PropertySpec::numeric("p", ElementType::Vec3, PropertyComponentType::Uint8).array(Some(2))],
        );
        let property = &schema.classes["c"].properties["p"];
        assert_eq!(property.element_type, ElementType::Vec3);
        assert!(property.array);
        assert_eq!(property.count, Some(2));
    }

    #[test]
    fn test_json_shape() {
        let schema = create_or_update_schema(
            None,
            "c",
            &[PropertySpec::numeric("v", ElementType::Vec2, PropertyComponentType::Int16)],
        );
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "default_schema",
                "classes": { "c": { "properties": {
                    "v": { "type": "VEC2", "componentType": "INT16" }
                } } }
            })
        );
    }

    #[test]
    fn test_registered_decoder_validates() {
        let registry = ExtensionRegistry::new();
        register(&registry);
        let missing = registry.decode(EXTENSION_NAME, br#"{"propertyTables":[]}"#).unwrap();
        assert!(missing.is_err());
        let unknown_class = registry
            .decode(
                EXTENSION_NAME,
                br#"{"schema":{"id":"s"},"propertyTables":[{"class":"x","count":1,"properties":{}}]}"#,
            )
            .unwrap();
        assert!(unknown_class.is_err());
        let ok = registry
            .decode(EXTENSION_NAME, br#"{"schemaUri":"schema.json"}"#)
            .unwrap();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_enum_lookup() {
        let e = Enum::new([("A".to_string(), 0), ("B".to_string(), 7)]);
        assert_eq!(e.value_of("B"), Some(7));
        assert_eq!(e.name_of(0), Some("A"));
        assert_eq!(e.name_of(3), None);
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("valueType").is_none());
    }

    #[test]
    fn test_define_class_marks_used() {
        let mut doc = Document::new();
        define_class(&mut doc, "c", &[PropertySpec::new("flag", ElementType::Boolean)]).unwrap();
        assert!(doc.is_extension_used(EXTENSION_NAME));
        let metadata = metadata(&doc).unwrap().unwrap();
        assert!(metadata.class("c").is_ok());
        assert!(metadata.class("d").is_err());
    }
}
