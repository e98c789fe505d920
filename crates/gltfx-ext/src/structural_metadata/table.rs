//! Property-table columns: packing into the main buffer and decoding back.
//!
//! Layout per element type:
//!
//! - numeric: contiguous little-endian components at the native width
//! - boolean: bit-packed, LSB first
//! - string: UTF-8 bytes plus `count + 1` u32 `stringOffsets`
//! - enum: the enum's `valueType` integers
//!
//! Variable-length arrays add `count + 1` u32 `arrayOffsets` counted in
//! elements; fixed-length arrays have none.
//!
//! String arrays nest one level deeper. Each row contributes its own
//! `len + 1` byte offsets to `stringOffsets`, and `arrayOffsets` index into
//! that concatenated list. Rows `[["a", "bc"], [], ["d"]]` become
//! `stringOffsets = [0, 1, 3, 3, 3, 4]` and `arrayOffsets = [0, 3, 4, 6]`.
//! Fixed-length string arrays omit `arrayOffsets`; row `i` then starts at
//! entry `i * (count + 1)`.
//!
//! Single-row columns may be inlined into the property's `extras` when
//! they hold a string, a boolean, or a scalar of a 32-bit, `INT64` or
//! `FLOAT64` component type.

use std::ops::Range;

use gltfx_core::builder::{append_bytes_aligned, pack_offset_strings, unpack_offset_strings};
use gltfx_core::bytes::{self, LeScalar, BIN_PADDING, JSON_PADDING};
use gltfx_core::{Document, GltfError, Result};
use indexmap::IndexMap;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    metadata, metadata_mut, ClassProperty, ElementType, OffsetType, PropertyComponentType, PropertyTable,
    PropertyTableProperty, Schema, EXTENSION_NAME,
};

/// Key of an inlined value in a property's `extras`.
pub const INLINE_VALUE_KEY: &str = "_inlineValue";

// ============================================================================
// Values
// ============================================================================

/// Components of a numeric column, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericData {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! with_numeric {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            NumericData::I8($v) => $body,
            NumericData::U8($v) => $body,
            NumericData::I16($v) => $body,
            NumericData::U16($v) => $body,
            NumericData::I32($v) => $body,
            NumericData::U32($v) => $body,
            NumericData::I64($v) => $body,
            NumericData::U64($v) => $body,
            NumericData::F32($v) => $body,
            NumericData::F64($v) => $body,
        }
    };
}

macro_rules! map_numeric {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            NumericData::I8($v) => NumericData::I8($body),
            NumericData::U8($v) => NumericData::U8($body),
            NumericData::I16($v) => NumericData::I16($body),
            NumericData::U16($v) => NumericData::U16($body),
            NumericData::I32($v) => NumericData::I32($body),
            NumericData::U32($v) => NumericData::U32($body),
            NumericData::I64($v) => NumericData::I64($body),
            NumericData::U64($v) => NumericData::U64($body),
            NumericData::F32($v) => NumericData::F32($body),
            NumericData::F64($v) => NumericData::F64($body),
        }
    };
}

macro_rules! numeric_from {
    ($ct:expr, $helper:ident($($arg:expr),*)) => {
        match $ct {
            PropertyComponentType::Int8 => NumericData::I8($helper::<i8>($($arg),*)?),
            PropertyComponentType::Uint8 => NumericData::U8($helper::<u8>($($arg),*)?),
            PropertyComponentType::Int16 => NumericData::I16($helper::<i16>($($arg),*)?),
            PropertyComponentType::Uint16 => NumericData::U16($helper::<u16>($($arg),*)?),
            PropertyComponentType::Int32 => NumericData::I32($helper::<i32>($($arg),*)?),
            PropertyComponentType::Uint32 => NumericData::U32($helper::<u32>($($arg),*)?),
            PropertyComponentType::Int64 => NumericData::I64($helper::<i64>($($arg),*)?),
            PropertyComponentType::Uint64 => NumericData::U64($helper::<u64>($($arg),*)?),
            PropertyComponentType::Float32 => NumericData::F32($helper::<f32>($($arg),*)?),
            PropertyComponentType::Float64 => NumericData::F64($helper::<f64>($($arg),*)?),
        }
    };
}

fn decode_le<T: LeScalar>(data: &[u8]) -> Result<Vec<T>> {
    bytes::from_bytes(data)
}

fn cast_i64<T: LeScalar>(values: &[i64]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            num_traits::cast::<i64, T>(v)
                .ok_or_else(|| GltfError::invalid_input(format!("{} does not fit the component type", v)))
        })
        .collect()
}

fn cast_json<T: LeScalar>(values: &[Value]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|v| {
            let cast = if let Some(i) = v.as_i64() {
                num_traits::cast::<i64, T>(i)
            } else if let Some(u) = v.as_u64() {
                num_traits::cast::<u64, T>(u)
            } else {
                v.as_f64().and_then(num_traits::cast::<f64, T>)
            };
            cast.ok_or_else(|| GltfError::invalid_input(format!("{} is not a valid component value", v)))
        })
        .collect()
}

impl NumericData {
    pub fn component_type(&self) -> PropertyComponentType {
        match self {
            NumericData::I8(_) => PropertyComponentType::Int8,
            NumericData::U8(_) => PropertyComponentType::Uint8,
            NumericData::I16(_) => PropertyComponentType::Int16,
            NumericData::U16(_) => PropertyComponentType::Uint16,
            NumericData::I32(_) => PropertyComponentType::Int32,
            NumericData::U32(_) => PropertyComponentType::Uint32,
            NumericData::I64(_) => PropertyComponentType::Int64,
            NumericData::U64(_) => PropertyComponentType::Uint64,
            NumericData::F32(_) => PropertyComponentType::Float32,
            NumericData::F64(_) => PropertyComponentType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        with_numeric!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        with_numeric!(self, v => bytes::to_bytes(v))
    }

    pub fn from_bytes(ct: PropertyComponentType, data: &[u8]) -> Result<Self> {
        Ok(numeric_from!(ct, decode_le(data)))
    }

    pub fn from_i64(ct: PropertyComponentType, values: &[i64]) -> Result<Self> {
        Ok(numeric_from!(ct, cast_i64(values)))
    }

    pub fn from_json(ct: PropertyComponentType, values: &[Value]) -> Result<Self> {
        Ok(numeric_from!(ct, cast_json(values)))
    }

    pub fn to_f64(&self) -> Vec<f64> {
        with_numeric!(self, v => v.iter().map(|x| x.to_f64().unwrap_or(f64::NAN)).collect())
    }

    pub fn to_i64(&self) -> Vec<Option<i64>> {
        with_numeric!(self, v => v.iter().map(|x| x.to_i64()).collect())
    }

    pub fn to_json(&self) -> Vec<Value> {
        with_numeric!(self, v => v.iter().map(|&x| Value::from(x)).collect())
    }

    pub fn slice(&self, range: Range<usize>) -> Self {
        map_numeric!(self, v => v[range.clone()].to_vec())
    }
}

/// Decoded or to-be-encoded values of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValues {
    Boolean(Vec<bool>),
    String(Vec<String>),
    Numeric(NumericData),
    /// Enum values by name.
    Enum(Vec<String>),
    BooleanArray(Vec<Vec<bool>>),
    StringArray(Vec<Vec<String>>),
    NumericArray(Vec<NumericData>),
    EnumArray(Vec<Vec<String>>),
}

impl PropertyValues {
    fn kind(&self) -> &'static str {
        match self {
            PropertyValues::Boolean(_) => "boolean",
            PropertyValues::String(_) => "string",
            PropertyValues::Numeric(_) => "numeric",
            PropertyValues::Enum(_) => "enum",
            PropertyValues::BooleanArray(_) => "boolean array",
            PropertyValues::StringArray(_) => "string array",
            PropertyValues::NumericArray(_) => "numeric array",
            PropertyValues::EnumArray(_) => "enum array",
        }
    }

    fn is_array(&self) -> bool {
        matches!(
            self,
            PropertyValues::BooleanArray(_)
                | PropertyValues::StringArray(_)
                | PropertyValues::NumericArray(_)
                | PropertyValues::EnumArray(_)
        )
    }

    fn matches(&self, element_type: ElementType) -> bool {
        match self {
            PropertyValues::Boolean(_) | PropertyValues::BooleanArray(_) => element_type == ElementType::Boolean,
            PropertyValues::String(_) | PropertyValues::StringArray(_) => element_type == ElementType::String,
            PropertyValues::Enum(_) | PropertyValues::EnumArray(_) => element_type == ElementType::Enum,
            PropertyValues::Numeric(_) | PropertyValues::NumericArray(_) => element_type.is_numeric(),
        }
    }

    /// Number of table rows the values fill.
    pub fn row_count(&self, components: usize) -> Result<usize> {
        match self {
            PropertyValues::Boolean(v) => Ok(v.len()),
            PropertyValues::String(v) | PropertyValues::Enum(v) => Ok(v.len()),
            PropertyValues::Numeric(data) => {
                if data.len() % components != 0 {
                    return Err(GltfError::invalid_input(format!(
                        "{} components do not form whole elements of {}",
                        data.len(),
                        components
                    )));
                }
                Ok(data.len() / components)
            }
            PropertyValues::BooleanArray(rows) => Ok(rows.len()),
            PropertyValues::StringArray(rows) | PropertyValues::EnumArray(rows) => Ok(rows.len()),
            PropertyValues::NumericArray(rows) => Ok(rows.len()),
        }
    }
}

/// A named column to add to a property table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyColumn {
    pub name: String,
    pub values: PropertyValues,
}

impl PropertyColumn {
    pub fn new(name: impl Into<String>, values: PropertyValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// How column payloads are aligned in the main buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Padding {
    /// 4-byte alignment filled with zeros.
    #[default]
    Binary,
    /// 8-byte alignment filled with spaces, for payloads stored next to JSON.
    JsonAdjacent,
}

impl Padding {
    pub const fn alignment(self) -> usize {
        match self {
            Padding::Binary => 4,
            Padding::JsonAdjacent => 8,
        }
    }

    pub const fn fill(self) -> u8 {
        match self {
            Padding::Binary => BIN_PADDING,
            Padding::JsonAdjacent => JSON_PADDING,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEncodeOptions {
    pub padding: Padding,
    /// Store the value of single-row string, boolean and scalar columns in
    /// `extras` instead of the buffer.
    pub inline_single_values: bool,
}

// ============================================================================
// Encoding
// ============================================================================

#[derive(Debug, Default)]
struct EncodedColumn {
    values: Vec<u8>,
    array_offsets: Option<Vec<u32>>,
    string_offsets: Option<Vec<u32>>,
    min: Option<Value>,
    max: Option<Value>,
    inline: Option<Value>,
}

fn pack_bits(values: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; values.len().div_ceil(8)];
    for (i, &value) in values.iter().enumerate() {
        if value {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

fn unpack_bits(data: &[u8], count: usize) -> Result<Vec<bool>> {
    if data.len() * 8 < count {
        return Err(GltfError::BufferOverflow(format!(
            "{} booleans need {} bytes, view has {}",
            count,
            count.div_ceil(8),
            data.len()
        )));
    }
    Ok((0..count).map(|i| data[i / 8] & (1 << (i % 8)) != 0).collect())
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| GltfError::invalid_input("column exceeds the u32 offset range"))
}

/// UTF-8 bytes, per-row `len + 1` string offsets concatenated, and the
/// offsets of every row into that list.
fn pack_nested_strings(rows: &[Vec<String>]) -> Result<(Vec<u8>, Vec<u32>, Vec<u32>)> {
    let mut values = Vec::new();
    let mut inner = Vec::new();
    let mut outer = Vec::with_capacity(rows.len() + 1);
    outer.push(0);
    for row in rows {
        inner.push(to_u32(values.len())?);
        for s in row {
            values.extend_from_slice(s.as_bytes());
            inner.push(to_u32(values.len())?);
        }
        outer.push(to_u32(inner.len())?);
    }
    Ok((values, inner, outer))
}

fn inlinable(ct: PropertyComponentType) -> bool {
    use PropertyComponentType as Ct;
    matches!(ct, Ct::Int32 | Ct::Uint32 | Ct::Int64 | Ct::Float32 | Ct::Float64)
}

/// `arrayOffsets` for variable-length arrays; `None` for fixed-length ones
/// after checking every row has the fixed length.
fn array_offsets(lengths: &[usize], fixed: Option<usize>, name: &str) -> Result<Option<Vec<u32>>> {
    if let Some(n) = fixed {
        if let Some(bad) = lengths.iter().find(|&&len| len != n) {
            return Err(GltfError::invalid_input(format!(
                "property {:?} has fixed array length {} but a row has {}",
                name, n, bad
            )));
        }
        return Ok(None);
    }
    let mut offsets = Vec::with_capacity(lengths.len() + 1);
    let mut total = 0usize;
    offsets.push(0);
    for len in lengths {
        total += len;
        offsets.push(to_u32(total)?);
    }
    Ok(Some(offsets))
}

fn bounds(data: &NumericData, components: usize) -> Option<(Value, Value)> {
    let values = data.to_f64();
    if values.is_empty() {
        return None;
    }
    let mut min = vec![f64::INFINITY; components];
    let mut max = vec![f64::NEG_INFINITY; components];
    for element in values.chunks_exact(components) {
        for (k, &v) in element.iter().enumerate() {
            min[k] = min[k].min(v);
            max[k] = max[k].max(v);
        }
    }
    if components == 1 {
        Some((Value::from(min[0]), Value::from(max[0])))
    } else {
        Some((Value::from(min), Value::from(max)))
    }
}

fn enum_values(schema: &Schema, property: &ClassProperty, names: &[String]) -> Result<NumericData> {
    let enum_id = property
        .enum_type
        .as_deref()
        .ok_or_else(|| GltfError::schema("enum property has no enumType"))?;
    let definition = schema
        .enums
        .get(enum_id)
        .ok_or_else(|| GltfError::schema(format!("enum {:?} is not in the schema", enum_id)))?;
    let values = names
        .iter()
        .map(|name| {
            definition.value_of(name).ok_or_else(|| {
                GltfError::invalid_input(format!("{:?} is not a value of enum {:?}", name, enum_id))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    NumericData::from_i64(definition.value_type, &values)
}

fn check_component_type(property: &ClassProperty, data: &NumericData, name: &str) -> Result<()> {
    let declared = property
        .component_type
        .ok_or_else(|| GltfError::schema(format!("numeric property {:?} has no componentType", name)))?;
    if declared != data.component_type() {
        return Err(GltfError::schema(format!(
            "property {:?} is declared {:?} but values are {:?}",
            name,
            declared,
            data.component_type()
        )));
    }
    Ok(())
}

fn encode_column(
    schema: &Schema,
    property: &ClassProperty,
    column: &PropertyColumn,
    options: &MetadataEncodeOptions,
) -> Result<EncodedColumn> {
    let name = column.name.as_str();
    if !column.values.matches(property.element_type) || column.values.is_array() != property.array {
        return Err(GltfError::schema(format!(
            "property {:?} is declared {:?}{} but {} values were given",
            name,
            property.element_type,
            if property.array { " array" } else { "" },
            column.values.kind()
        )));
    }
    let components = property.element_type.components();
    let rows = column.values.row_count(components)?;

    let inline_allowed = options.inline_single_values && rows == 1;
    let encoded = match &column.values {
        PropertyValues::Boolean(values) if inline_allowed => EncodedColumn {
            inline: Some(Value::from(values[0])),
            ..EncodedColumn::default()
        },
        PropertyValues::String(values) if inline_allowed => EncodedColumn {
            inline: Some(Value::from(values[0].clone())),
            ..EncodedColumn::default()
        },
        PropertyValues::Numeric(data)
            if inline_allowed
                && property.element_type == ElementType::Scalar
                && inlinable(data.component_type()) =>
        {
            check_component_type(property, data, name)?;
            let value = data.to_json().swap_remove(0);
            EncodedColumn {
                min: Some(value.clone()),
                max: Some(value.clone()),
                inline: Some(value),
                ..EncodedColumn::default()
            }
        }
        PropertyValues::Boolean(values) => EncodedColumn {
            values: pack_bits(values),
            ..EncodedColumn::default()
        },
        PropertyValues::String(values) => {
            let (bytes, offsets) = pack_offset_strings(values)?;
            EncodedColumn {
                values: bytes,
                string_offsets: Some(offsets),
                ..EncodedColumn::default()
            }
        }
        PropertyValues::Numeric(data) => {
            check_component_type(property, data, name)?;
            let (min, max) = bounds(data, components).unzip();
            EncodedColumn {
                values: data.to_bytes(),
                min,
                max,
                ..EncodedColumn::default()
            }
        }
        PropertyValues::Enum(names) => EncodedColumn {
            values: enum_values(schema, property, names)?.to_bytes(),
            ..EncodedColumn::default()
        },
        PropertyValues::BooleanArray(rows) => {
            let lengths: Vec<usize> = rows.iter().map(Vec::len).collect();
            let flat: Vec<bool> = rows.concat();
            EncodedColumn {
                values: pack_bits(&flat),
                array_offsets: array_offsets(&lengths, property.count, name)?,
                ..EncodedColumn::default()
            }
        }
        PropertyValues::StringArray(rows) => {
            let lengths: Vec<usize> = rows.iter().map(Vec::len).collect();
            let variable = array_offsets(&lengths, property.count, name)?.is_some();
            let (bytes, string_offsets, row_offsets) = pack_nested_strings(rows)?;
            EncodedColumn {
                values: bytes,
                string_offsets: Some(string_offsets),
                array_offsets: variable.then_some(row_offsets),
                ..EncodedColumn::default()
            }
        }
        PropertyValues::NumericArray(rows) => {
            let mut lengths = Vec::with_capacity(rows.len());
            let mut bytes = Vec::new();
            for row in rows {
                check_component_type(property, row, name)?;
                lengths.push(PropertyValues::Numeric(row.clone()).row_count(components)?);
                bytes.extend_from_slice(&row.to_bytes());
            }
            EncodedColumn {
                values: bytes,
                array_offsets: array_offsets(&lengths, property.count, name)?,
                ..EncodedColumn::default()
            }
        }
        PropertyValues::EnumArray(rows) => {
            let lengths: Vec<usize> = rows.iter().map(Vec::len).collect();
            let flat: Vec<String> = rows.concat();
            EncodedColumn {
                values: enum_values(schema, property, &flat)?.to_bytes(),
                array_offsets: array_offsets(&lengths, property.count, name)?,
                ..EncodedColumn::default()
            }
        }
    };
    Ok(encoded)
}

/// Appends the encoded buffers of a column and returns its table entry.
fn write_column(
    doc: &mut Document,
    encoded: EncodedColumn,
    options: &MetadataEncodeOptions,
    placeholder: &mut Option<u32>,
) -> Result<PropertyTableProperty> {
    let append = |doc: &mut Document, data: &[u8]| {
        append_bytes_aligned(doc, data, options.padding.alignment(), options.padding.fill(), None, None)
    };

    if let Some(value) = encoded.inline {
        let values = match *placeholder {
            Some(view) => view,
            None => {
                let view = append(doc, &[0u8; 4])?;
                *placeholder = Some(view);
                view
            }
        };
        return Ok(PropertyTableProperty {
            values,
            min: encoded.min,
            max: encoded.max,
            extras: Some(json!({ INLINE_VALUE_KEY: value, "offset": 0 })),
            ..PropertyTableProperty::default()
        });
    }

    let values = append(doc, &encoded.values)?;
    let string_offsets = match &encoded.string_offsets {
        Some(offsets) => Some(append(doc, &bytes::to_bytes(offsets))?),
        None => None,
    };
    let array_offsets = match &encoded.array_offsets {
        Some(offsets) => Some(append(doc, &bytes::to_bytes(offsets))?),
        None => None,
    };
    Ok(PropertyTableProperty {
        values,
        array_offsets,
        string_offsets,
        min: encoded.min,
        max: encoded.max,
        ..PropertyTableProperty::default()
    })
}

/// Packs `columns` into a new property table of class `class_id`.
///
/// The class must already be in the document's schema and declare every
/// column; all columns must have the same row count, which becomes the
/// table's `count`. An empty column list changes nothing and returns `None`.
pub fn add_property_table(
    doc: &mut Document,
    class_id: &str,
    columns: &[PropertyColumn],
    options: &MetadataEncodeOptions,
) -> Result<Option<u32>> {
    if columns.is_empty() {
        return Ok(None);
    }
    let metadata = metadata(doc)?
        .ok_or_else(|| GltfError::schema("document has no structural metadata schema"))?;
    let schema = metadata.schema()?;
    let class = metadata.class(class_id)?;

    let mut rows = None;
    let mut encoded = Vec::with_capacity(columns.len());
    for column in columns {
        let property = class.properties.get(&column.name).ok_or_else(|| {
            GltfError::schema(format!("class {:?} has no property {:?}", class_id, column.name))
        })?;
        let count = column.values.row_count(property.element_type.components())?;
        match rows {
            None => rows = Some(count),
            Some(expected) if expected != count => {
                return Err(GltfError::invalid_input(format!(
                    "column {:?} has {} rows, expected {}",
                    column.name, count, expected
                )))
            }
            Some(_) => {}
        }
        encoded.push((column.name.clone(), encode_column(schema, property, column, options)?));
    }

    let mut placeholder = None;
    let mut properties = IndexMap::new();
    for (name, column) in encoded {
        properties.insert(name, write_column(doc, column, options, &mut placeholder)?);
    }
    let table = PropertyTable {
        name: None,
        class: class_id.to_string(),
        count: rows.unwrap_or(0),
        properties,
    };
    let metadata = metadata_mut(doc)?;
    metadata.property_tables.push(table);
    let index = metadata.property_tables.len() - 1;
    tracing::debug!(class = class_id, table = index, columns = columns.len(), "added property table");
    Document::index(index)
        .map(Some)
        .ok_or_else(|| GltfError::invalid_input("too many property tables"))
}

/// Adds one more column to an existing table; its row count must equal the
/// table's `count`.
pub fn add_property(
    doc: &mut Document,
    table_index: u32,
    column: &PropertyColumn,
    options: &MetadataEncodeOptions,
) -> Result<()> {
    let metadata = metadata(doc)?
        .ok_or_else(|| GltfError::schema("document has no structural metadata schema"))?;
    let table = metadata.property_table(table_index)?;
    let class = metadata.class(&table.class)?;
    let property = class.properties.get(&column.name).ok_or_else(|| {
        GltfError::schema(format!("class {:?} has no property {:?}", table.class, column.name))
    })?;
    let rows = column.values.row_count(property.element_type.components())?;
    if rows != table.count {
        return Err(GltfError::invalid_input(format!(
            "column {:?} has {} rows but table {} has {}",
            column.name, rows, table_index, table.count
        )));
    }
    let encoded = encode_column(metadata.schema()?, property, column, options)?;
    let entry = write_column(doc, encoded, options, &mut None)?;
    metadata_mut(doc)?.property_tables[table_index as usize]
        .properties
        .insert(column.name.clone(), entry);
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

fn read_offsets(doc: &Document, view: Option<u32>, ty: OffsetType, count: usize, what: &str) -> Result<Vec<u32>> {
    let view = view.ok_or_else(|| GltfError::schema(format!("property is missing {}", what)))?;
    let data = doc.view_data(view)?;
    let needed = bytes::checked_size(count, ty.size())?;
    if data.len() < needed {
        return Err(GltfError::BufferOverflow(format!(
            "{} needs {} bytes, view {} has {}",
            what,
            needed,
            view,
            data.len()
        )));
    }
    let data = &data[..needed];
    let offsets = match ty {
        OffsetType::Uint8 => data.iter().map(|&b| u32::from(b)).collect(),
        OffsetType::Uint16 => bytes::from_bytes::<u16>(data)?.into_iter().map(u32::from).collect(),
        OffsetType::Uint32 => bytes::from_bytes::<u32>(data)?,
        OffsetType::Uint64 => bytes::from_bytes::<u64>(data)?
            .into_iter()
            .map(|v| u32::try_from(v).map_err(|_| GltfError::invalid_input("offset exceeds the u32 range")))
            .collect::<Result<Vec<_>>>()?,
    };
    Ok(offsets)
}

/// Element range of every row.
fn row_ranges(
    doc: &Document,
    property: &ClassProperty,
    entry: &PropertyTableProperty,
    rows: usize,
) -> Result<Vec<Range<usize>>> {
    if let Some(n) = property.count {
        bytes::checked_size(rows, n)?;
        return Ok((0..rows).map(|i| i * n..(i + 1) * n).collect());
    }
    let offsets = read_offsets(
        doc,
        entry.array_offsets,
        entry.array_offset_type,
        rows.saturating_add(1),
        "arrayOffsets",
    )?;
    offsets
        .windows(2)
        .map(|pair| {
            if pair[0] > pair[1] {
                Err(GltfError::schema(format!(
                    "arrayOffsets decrease from {} to {}",
                    pair[0], pair[1]
                )))
            } else {
                Ok(pair[0] as usize..pair[1] as usize)
            }
        })
        .collect()
}

/// Decodes a string-array column laid out as nested offsets.
fn decode_string_rows(
    doc: &Document,
    property: &ClassProperty,
    entry: &PropertyTableProperty,
    rows: usize,
    values: &[u8],
) -> Result<Vec<Vec<String>>> {
    let row_offsets = match property.count {
        Some(n) => {
            let per_row = n.saturating_add(1);
            bytes::checked_size(rows, per_row)?;
            (0..=rows).map(|i| to_u32(i * per_row)).collect::<Result<Vec<_>>>()?
        }
        None => read_offsets(
            doc,
            entry.array_offsets,
            entry.array_offset_type,
            rows.saturating_add(1),
            "arrayOffsets",
        )?,
    };
    let entries = row_offsets.last().map_or(0, |&last| last as usize);
    let string_offsets = read_offsets(doc, entry.string_offsets, entry.string_offset_type, entries, "stringOffsets")?;
    if let Some(&last) = string_offsets.last() {
        if last as usize != values.len() {
            return Err(GltfError::schema(format!(
                "stringOffsets end at {} but the values hold {} bytes",
                last,
                values.len()
            )));
        }
    }
    row_offsets
        .windows(2)
        .map(|pair| {
            let row = string_offsets
                .get(pair[0] as usize..pair[1] as usize)
                .filter(|row| !row.is_empty())
                .ok_or_else(|| {
                    GltfError::schema(format!(
                        "arrayOffsets [{}, {}) do not select a row of stringOffsets",
                        pair[0], pair[1]
                    ))
                })?;
            let end = row.last().map_or(0, |&e| e as usize);
            let bytes = values.get(..end).ok_or_else(|| {
                GltfError::BufferOverflow(format!("string offset {} outside {} value bytes", end, values.len()))
            })?;
            unpack_offset_strings(bytes, row)
        })
        .collect()
}

fn split_rows<T: Clone>(flat: &[T], ranges: &[Range<usize>]) -> Result<Vec<Vec<T>>> {
    ranges
        .iter()
        .map(|r| {
            flat.get(r.clone()).map(<[T]>::to_vec).ok_or_else(|| {
                GltfError::BufferOverflow(format!("array row {:?} exceeds {} elements", r, flat.len()))
            })
        })
        .collect()
}

fn numeric_prefix(values: &[u8], ct: PropertyComponentType, count: usize) -> Result<NumericData> {
    let needed = bytes::checked_size(count, ct.size())?;
    let data = values.get(..needed).ok_or_else(|| {
        GltfError::BufferOverflow(format!(
            "{} {:?} components need {} bytes, view has {}",
            count,
            ct,
            needed,
            values.len()
        ))
    })?;
    NumericData::from_bytes(ct, data)
}

fn enum_names(schema: &Schema, property: &ClassProperty, data: &NumericData) -> Result<Vec<String>> {
    let enum_id = property
        .enum_type
        .as_deref()
        .ok_or_else(|| GltfError::schema("enum property has no enumType"))?;
    let definition = schema
        .enums
        .get(enum_id)
        .ok_or_else(|| GltfError::schema(format!("enum {:?} is not in the schema", enum_id)))?;
    data.to_i64()
        .into_iter()
        .map(|value| {
            value
                .and_then(|v| definition.name_of(v))
                .map(str::to_string)
                .ok_or_else(|| GltfError::schema(format!("value {:?} is not in enum {:?}", value, enum_id)))
        })
        .collect()
}

fn decode_inline(property: &ClassProperty, value: &Value, name: &str) -> Result<PropertyValues> {
    let invalid = || GltfError::schema(format!("inline value of {:?} does not match its type", name));
    match property.element_type {
        ElementType::String => Ok(PropertyValues::String(vec![value
            .as_str()
            .ok_or_else(invalid)?
            .to_string()])),
        ElementType::Boolean => Ok(PropertyValues::Boolean(vec![value.as_bool().ok_or_else(invalid)?])),
        ElementType::Scalar => {
            let ct = property
                .component_type
                .ok_or_else(|| GltfError::schema(format!("numeric property {:?} has no componentType", name)))?;
            Ok(PropertyValues::Numeric(NumericData::from_json(ct, std::slice::from_ref(value))?))
        }
        _ => Err(invalid()),
    }
}

fn decode_column(
    doc: &Document,
    schema: &Schema,
    property: &ClassProperty,
    entry: &PropertyTableProperty,
    rows: usize,
    name: &str,
) -> Result<PropertyValues> {
    if let Some(value) = entry.extras.as_ref().and_then(|e| e.get(INLINE_VALUE_KEY)) {
        return decode_inline(property, value, name);
    }
    let values = doc.view_data(entry.values)?;
    if property.array && property.element_type == ElementType::String {
        return Ok(PropertyValues::StringArray(decode_string_rows(doc, property, entry, rows, values)?));
    }
    let ranges = if property.array {
        Some(row_ranges(doc, property, entry, rows)?)
    } else {
        None
    };
    let elements = ranges.as_ref().map_or(rows, |r| r.last().map_or(0, |last| last.end));

    let decoded = match property.element_type {
        ElementType::String => {
            let offsets = read_offsets(
                doc,
                entry.string_offsets,
                entry.string_offset_type,
                elements.saturating_add(1),
                "stringOffsets",
            )?;
            PropertyValues::String(unpack_offset_strings(values, &offsets)?)
        }
        ElementType::Boolean => {
            let flat = unpack_bits(values, elements)?;
            match ranges {
                Some(ranges) => PropertyValues::BooleanArray(split_rows(&flat, &ranges)?),
                None => PropertyValues::Boolean(flat),
            }
        }
        ElementType::Enum => {
            let value_type = property
                .enum_type
                .as_deref()
                .and_then(|id| schema.enums.get(id))
                .map(|e| e.value_type)
                .ok_or_else(|| GltfError::schema(format!("enum property {:?} has no known enumType", name)))?;
            let names = enum_names(schema, property, &numeric_prefix(values, value_type, elements)?)?;
            match ranges {
                Some(ranges) => PropertyValues::EnumArray(split_rows(&names, &ranges)?),
                None => PropertyValues::Enum(names),
            }
        }
        element_type => {
            let ct = property
                .component_type
                .ok_or_else(|| GltfError::schema(format!("numeric property {:?} has no componentType", name)))?;
            let components = element_type.components();
            let data = numeric_prefix(values, ct, bytes::checked_size(elements, components)?)?;
            match ranges {
                Some(ranges) => PropertyValues::NumericArray(
                    ranges
                        .iter()
                        .map(|r| data.slice(r.start * components..r.end * components))
                        .collect(),
                ),
                None => PropertyValues::Numeric(data),
            }
        }
    };
    Ok(decoded)
}

/// Decodes column `name` of property table `table_index`.
pub fn read_property(doc: &Document, table_index: u32, name: &str) -> Result<PropertyValues> {
    let metadata = metadata(doc)?.ok_or_else(|| GltfError::schema(format!("{} is not present", EXTENSION_NAME)))?;
    let table = metadata.property_table(table_index)?;
    let entry = table
        .properties
        .get(name)
        .ok_or_else(|| GltfError::schema(format!("property table {} has no column {:?}", table_index, name)))?;
    let class = metadata.class(&table.class)?;
    let property = class.properties.get(name).ok_or_else(|| {
        GltfError::schema(format!("class {:?} does not define property {:?}", table.class, name))
    })?;
    decode_column(doc, metadata.schema()?, property, entry, table.count, name)
}

/// Decodes every column of property table `table_index`, in table order.
pub fn read_property_table(doc: &Document, table_index: u32) -> Result<IndexMap<String, PropertyValues>> {
    let metadata = metadata(doc)?.ok_or_else(|| GltfError::schema(format!("{} is not present", EXTENSION_NAME)))?;
    let table = metadata.property_table(table_index)?;
    table
        .properties
        .keys()
        .map(|name| Ok((name.clone(), read_property(doc, table_index, name)?)))
        .collect()
}
