//! Polymorphic extension field and the name-keyed decoder registry.
//!
//! Every glTF object carries an [`Extensions`] map. After parsing, each entry
//! is [`ExtensionValue::Raw`]; running [`ExtensionRegistry::resolve_document`]
//! replaces the entries it has decoders for with [`ExtensionValue::Decoded`].
//! A decoder failure is never fatal: the entry stays raw and a notice is
//! returned to the caller.
//!
//! # Example
//!
//! ```ignore
//! let registry = ExtensionRegistry::new();
//! registry.register_type::<Clearcoat>();
//! let notices = registry.resolve_document(&mut doc);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::document::Document;
use crate::error::{GltfError, Result};

// ============================================================================
// Extension values
// ============================================================================

/// A decoded extension payload.
pub trait Extension: Any + fmt::Debug + Send + Sync {
    /// Registered extension name, e.g. `KHR_materials_clearcoat`.
    fn name(&self) -> &str;

    /// Serializes the value back to its JSON form.
    fn to_json(&self) -> serde_json::Result<Value>;

    fn clone_extension(&self) -> Box<dyn Extension>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A serde type bound to one extension name.
///
/// Implementing this is all a typed extension needs; [`Extension`] follows
/// from the blanket impl.
pub trait NamedExtension:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const NAME: &'static str;
}

impl<T: NamedExtension> Extension for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn clone_extension(&self) -> Box<dyn Extension> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One entry of an [`Extensions`] map.
#[derive(Debug)]
pub enum ExtensionValue {
    Decoded(Box<dyn Extension>),
    /// Verbatim JSON text, emitted unchanged on encode.
    Raw(Box<RawValue>),
}

impl ExtensionValue {
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw = RawValue::from_string(serde_json::to_string(value)?)?;
        Ok(ExtensionValue::Raw(raw))
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, ExtensionValue::Decoded(_))
    }

    /// Raw JSON bytes, if the value has not been decoded.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match self {
            ExtensionValue::Raw(raw) => Some(raw.get().as_bytes()),
            ExtensionValue::Decoded(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            ExtensionValue::Decoded(ext) => ext.to_json(),
            ExtensionValue::Raw(raw) => serde_json::from_str(raw.get()),
        }
    }

    pub fn downcast_ref<T: NamedExtension>(&self) -> Option<&T> {
        match self {
            ExtensionValue::Decoded(ext) => ext.as_any().downcast_ref::<T>(),
            ExtensionValue::Raw(_) => None,
        }
    }

    pub fn downcast_mut<T: NamedExtension>(&mut self) -> Option<&mut T> {
        match self {
            ExtensionValue::Decoded(ext) => ext.as_any_mut().downcast_mut::<T>(),
            ExtensionValue::Raw(_) => None,
        }
    }

    /// Reads the value as `T`, parsing raw JSON when needed.
    pub fn read<T: NamedExtension>(&self) -> Result<T> {
        if let Some(value) = self.downcast_ref::<T>() {
            return Ok(value.clone());
        }
        let json = self
            .to_json()
            .map_err(|e| GltfError::extension_parse(T::NAME, e))?;
        serde_json::from_value(json).map_err(|e| GltfError::extension_parse(T::NAME, e))
    }
}

impl Clone for ExtensionValue {
    fn clone(&self) -> Self {
        match self {
            ExtensionValue::Decoded(ext) => ExtensionValue::Decoded(ext.clone_extension()),
            ExtensionValue::Raw(raw) => ExtensionValue::Raw(raw.clone()),
        }
    }
}

impl PartialEq for ExtensionValue {
    /// Compares the JSON forms, so a decoded value equals its raw text.
    fn eq(&self, other: &Self) -> bool {
        match (self.to_json(), other.to_json()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for ExtensionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ExtensionValue::Decoded(ext) => ext
                .to_json()
                .map_err(serde::ser::Error::custom)?
                .serialize(serializer),
            ExtensionValue::Raw(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ExtensionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Box::<RawValue>::deserialize(deserializer).map(ExtensionValue::Raw)
    }
}

// ============================================================================
// Extensions map
// ============================================================================

/// Insertion-ordered map from extension name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extensions(IndexMap<String, ExtensionValue>);

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtensionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ExtensionValue)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionValue> {
        self.0.get(name)
    }

    /// Inserts a typed value under its registered name, replacing any previous entry.
    pub fn insert<T: NamedExtension>(&mut self, value: T) {
        self.0
            .insert(T::NAME.to_string(), ExtensionValue::Decoded(Box::new(value)));
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: ExtensionValue) {
        self.0.insert(name.into(), value);
    }

    pub fn insert_json(&mut self, name: impl Into<String>, value: &Value) -> Result<()> {
        let value = ExtensionValue::from_json(value)?;
        self.0.insert(name.into(), value);
        Ok(())
    }

    /// Typed reference to an already decoded entry.
    pub fn get_typed<T: NamedExtension>(&self) -> Option<&T> {
        self.0.get(T::NAME).and_then(ExtensionValue::downcast_ref)
    }

    pub fn get_typed_mut<T: NamedExtension>(&mut self) -> Option<&mut T> {
        self.0.get_mut(T::NAME).and_then(ExtensionValue::downcast_mut)
    }

    /// Reads the entry for `T` whether it is decoded or raw.
    pub fn read<T: NamedExtension>(&self) -> Result<Option<T>> {
        self.0.get(T::NAME).map(ExtensionValue::read).transpose()
    }

    /// Decodes the entry for `T` in place and returns it.
    pub fn decode<T: NamedExtension>(&mut self) -> Result<Option<&mut T>> {
        let Some(entry) = self.0.get_mut(T::NAME) else {
            return Ok(None);
        };
        if entry.downcast_ref::<T>().is_none() {
            *entry = ExtensionValue::Decoded(Box::new(entry.read::<T>()?));
        }
        Ok(entry.downcast_mut::<T>())
    }

    /// Removes an entry, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<ExtensionValue> {
        self.0.shift_remove(name)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Decoder from raw JSON bytes to a typed extension.
pub type DecodeFn = dyn Fn(&[u8]) -> Result<Box<dyn Extension>> + Send + Sync;

/// A decode that failed and was downgraded to raw retention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNotice {
    pub name: String,
    pub message: String,
}

impl fmt::Display for ExtensionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Thread-safe map from extension name to decoder.
///
/// Registration is idempotent: the first decoder registered for a name wins.
#[derive(Default)]
pub struct ExtensionRegistry {
    decoders: RwLock<HashMap<String, Arc<DecodeFn>>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort();
        f.debug_struct("ExtensionRegistry")
            .field("names", &names)
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decoder` for `name`. Returns `false` if a decoder was already present.
    pub fn register<F>(&self, name: impl Into<String>, decoder: F) -> bool
    where
        F: Fn(&[u8]) -> Result<Box<dyn Extension>> + Send + Sync + 'static,
    {
        let mut decoders = self.decoders.write().unwrap_or_else(PoisonError::into_inner);
        let name = name.into();
        if decoders.contains_key(&name) {
            return false;
        }
        decoders.insert(name, Arc::new(decoder));
        true
    }

    /// Registers the serde decoder of a typed extension.
    pub fn register_type<T: NamedExtension>(&self) -> bool {
        self.register(T::NAME, |bytes: &[u8]| {
            serde_json::from_slice::<T>(bytes)
                .map(|value| Box::new(value) as Box<dyn Extension>)
                .map_err(|e| GltfError::extension_parse(T::NAME, e))
        })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.decoders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.decoders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Runs the decoder for `name`, or returns `None` if there is none.
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Option<Result<Box<dyn Extension>>> {
        let decoder = self
            .decoders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()?;
        Some(decoder(bytes))
    }

    /// Decodes every raw entry of `extensions` that has a decoder.
    pub fn resolve(&self, extensions: &mut Extensions) -> Vec<ExtensionNotice> {
        let mut notices = Vec::new();
        for (name, value) in extensions.iter_mut() {
            let Some(bytes) = value.raw_bytes() else {
                continue;
            };
            match self.decode(name, bytes) {
                Some(Ok(decoded)) => *value = ExtensionValue::Decoded(decoded),
                Some(Err(err)) => {
                    tracing::warn!(extension = name, error = %err, "keeping extension as raw JSON");
                    notices.push(ExtensionNotice {
                        name: name.to_string(),
                        message: err.to_string(),
                    });
                }
                None => {}
            }
        }
        notices
    }

    /// Resolves the extensions of every object in `doc`.
    pub fn resolve_document(&self, doc: &mut Document) -> Vec<ExtensionNotice> {
        let mut notices = Vec::new();
        doc.for_each_extensions_mut(|extensions| notices.extend(self.resolve(extensions)));
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Strength {
        strength: f32,
    }

    impl NamedExtension for Strength {
        const NAME: &'static str = "TEST_strength";
    }

    fn raw_extensions(json: &str) -> Extensions {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_deserialize_is_raw() {
        let ext = raw_extensions(r#"{"TEST_strength":{"strength":2.0},"OTHER":{"a":[1,2]}}"#);
        assert_eq!(ext.len(), 2);
        assert!(!ext.get("OTHER").unwrap().is_decoded());
        assert_eq!(ext.get("OTHER").unwrap().raw_bytes(), Some(br#"{"a":[1,2]}"#.as_slice()));
    }

    #[test]
    fn test_resolve_decodes_registered() {
        let registry = ExtensionRegistry::new();
        assert!(registry.register_type::<Strength>());
        assert!(!registry.register_type::<Strength>());

        let mut ext = raw_extensions(r#"{"TEST_strength":{"strength":2.0},"OTHER":{}}"#);
        let notices = registry.resolve(&mut ext);
        assert!(notices.is_empty());
        assert_eq!(ext.get_typed::<Strength>(), Some(&Strength { strength: 2.0 }));
        assert!(!ext.get("OTHER").unwrap().is_decoded());
    }

    #[test]
    fn test_resolve_failure_keeps_raw() {
        let registry = ExtensionRegistry::new();
        registry.register_type::<Strength>();
        let mut ext = raw_extensions(r#"{"TEST_strength":{"strength":"high"}}"#);
        let notices = registry.resolve(&mut ext);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].name, "TEST_strength");
        assert!(ext.get_typed::<Strength>().is_none());
        assert!(ext.get("TEST_strength").unwrap().raw_bytes().is_some());
    }

    #[test]
    fn test_raw_passes_through_verbatim() {
        let text = r#"{"VENDOR_x":{"z":1,"a":[true,null]}}"#;
        let ext = raw_extensions(text);
        assert_eq!(serde_json::to_string(&ext).unwrap(), text);
    }

    #[test]
    fn test_decoded_equals_raw() {
        let mut typed = Extensions::new();
        typed.insert(Strength { strength: 0.5 });
        let raw = raw_extensions(r#"{"TEST_strength":{"strength":0.5}}"#);
        assert_eq!(typed, raw);
        assert_eq!(serde_json::to_value(&typed).unwrap(), json!({"TEST_strength": {"strength": 0.5}}));
    }

    #[test]
    fn test_decode_in_place() {
        let mut ext = raw_extensions(r#"{"TEST_strength":{"strength":1.5}}"#);
        ext.decode::<Strength>().unwrap().unwrap().strength = 3.0;
        assert_eq!(ext.read::<Strength>().unwrap(), Some(Strength { strength: 3.0 }));
        assert!(ext.remove("TEST_strength").is_some());
        assert!(ext.is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ExtensionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register_type::<Strength>())
            })
            .collect();
        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&first| first)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(registry.names(), vec!["TEST_strength".to_string()]);
    }
}
