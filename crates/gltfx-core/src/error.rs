//! Error type shared by every gltfx crate.
//!
//! Writers abort on the first error and leave the document in an undefined
//! state; callers should discard a document after a failed write.

use std::io;

use thiserror::Error;

/// Errors surfaced by document, codec and extension operations.
#[derive(Error, Debug)]
pub enum GltfError {
    /// Empty required array, mismatched column lengths, out-of-domain enum.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Property not defined in class, class not in schema, missing schema.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A column's element type is not one of the supported runtime types.
    #[error("Type inference failed: {0}")]
    TypeInference(String),

    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    /// Accessor span exceeds its view, or view exceeds its buffer.
    #[error("Buffer overflow: {0}")]
    BufferOverflow(String),

    #[error("Alignment violation: {0}")]
    AlignmentViolation(String),

    #[error("Extension '{name}' failed to parse: {message}")]
    ExtensionParse { name: String, message: String },

    /// Draco or meshopt engine reported failure.
    #[error("Codec failure: {0}")]
    CodecFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GltfError>;

impl GltfError {
    pub fn index_out_of_range(kind: &'static str, index: usize, len: usize) -> Self {
        GltfError::IndexOutOfRange { kind, index, len }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        GltfError::InvalidInput(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        GltfError::SchemaViolation(message.into())
    }

    pub fn codec(message: impl Into<String>) -> Self {
        GltfError::CodecFailure(message.into())
    }

    pub fn extension_parse(name: impl Into<String>, message: impl ToString) -> Self {
        GltfError::ExtensionParse {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

/// Looks up `items[index]`, reporting `kind` on failure.
pub fn get_checked<'a, T>(items: &'a [T], index: u32, kind: &'static str) -> Result<&'a T> {
    items
        .get(index as usize)
        .ok_or_else(|| GltfError::index_out_of_range(kind, index as usize, items.len()))
}

/// Mutable counterpart of [`get_checked`].
pub fn get_checked_mut<'a, T>(
    items: &'a mut [T],
    index: u32,
    kind: &'static str,
) -> Result<&'a mut T> {
    let len = items.len();
    items
        .get_mut(index as usize)
        .ok_or_else(|| GltfError::index_out_of_range(kind, index as usize, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_range_message() {
        let err = GltfError::index_out_of_range("accessor", 7, 3);
        assert_eq!(err.to_string(), "accessor index 7 out of range (len 3)");
    }

    #[test]
    fn test_get_checked() {
        let items = [1, 2, 3];
        assert_eq!(*get_checked(&items, 2, "item").unwrap(), 3);
        assert!(matches!(
            get_checked(&items, 3, "item"),
            Err(GltfError::IndexOutOfRange { index: 3, len: 3, .. })
        ));
    }
}
