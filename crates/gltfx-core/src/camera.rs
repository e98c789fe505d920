//! Cameras. The JSON `type` tag is derived from which projection is set.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::GltfError;
use crate::extension::Extensions;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "CameraRepr")]
pub struct Camera {
    pub name: Option<String>,
    pub perspective: Option<Perspective>,
    pub orthographic: Option<Orthographic>,
    pub extensions: Extensions,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perspective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f32>,
    pub yfov: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zfar: Option<f32>,
    pub znear: f32,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orthographic {
    pub xmag: f32,
    pub ymag: f32,
    pub zfar: f32,
    pub znear: f32,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Camera {
    pub fn perspective(perspective: Perspective) -> Self {
        Self {
            perspective: Some(perspective),
            ..Self::default()
        }
    }

    pub fn orthographic(orthographic: Orthographic) -> Self {
        Self {
            orthographic: Some(orthographic),
            ..Self::default()
        }
    }

    /// JSON type tag; `None` when no projection is set.
    pub fn type_tag(&self) -> Option<&'static str> {
        if self.perspective.is_some() {
            Some("perspective")
        } else if self.orthographic.is_some() {
            Some("orthographic")
        } else {
            None
        }
    }
}

#[derive(Serialize)]
struct CameraOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    perspective: Option<&'a Perspective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orthographic: Option<&'a Orthographic>,
    #[serde(skip_serializing_if = "Extensions::is_empty")]
    extensions: &'a Extensions,
    #[serde(skip_serializing_if = "Option::is_none")]
    extras: Option<&'a Value>,
}

impl Serialize for Camera {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self.type_tag().ok_or_else(|| {
            serde::ser::Error::custom("camera has neither perspective nor orthographic projection")
        })?;
        let perspective = self.perspective.as_ref().filter(|_| kind == "perspective");
        CameraOut {
            name: self.name.as_deref(),
            kind,
            perspective,
            orthographic: self.orthographic.as_ref().filter(|_| perspective.is_none()),
            extensions: &self.extensions,
            extras: self.extras.as_ref(),
        }
        .serialize(serializer)
    }
}

#[derive(Deserialize)]
struct CameraRepr {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    perspective: Option<Perspective>,
    #[serde(default)]
    orthographic: Option<Orthographic>,
    #[serde(default)]
    extensions: Extensions,
    #[serde(default)]
    extras: Option<Value>,
}

impl TryFrom<CameraRepr> for Camera {
    type Error = GltfError;

    fn try_from(repr: CameraRepr) -> Result<Self, Self::Error> {
        let (perspective, orthographic) = match repr.kind.as_str() {
            "perspective" => {
                let p = repr.perspective.ok_or_else(|| {
                    GltfError::invalid_input("perspective camera without perspective object")
                })?;
                (Some(p), None)
            }
            "orthographic" => {
                let o = repr.orthographic.ok_or_else(|| {
                    GltfError::invalid_input("orthographic camera without orthographic object")
                })?;
                (None, Some(o))
            }
            other => {
                return Err(GltfError::invalid_input(format!(
                    "unknown camera type '{}'",
                    other
                )))
            }
        };
        Ok(Camera {
            name: repr.name,
            perspective,
            orthographic,
            extensions: repr.extensions,
            extras: repr.extras,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_injected() {
        let camera = Camera::perspective(Perspective {
            yfov: 0.8,
            znear: 0.1,
            ..Perspective::default()
        });
        let value = serde_json::to_value(&camera).unwrap();
        assert_eq!(value["type"], json!("perspective"));
        assert!(value.get("orthographic").is_none());
    }

    #[test]
    fn test_neither_projection_fails() {
        assert!(serde_json::to_string(&Camera::default()).is_err());
    }

    #[test]
    fn test_tag_selects_projection() {
        let camera: Camera = serde_json::from_str(
            r#"{"type":"orthographic","orthographic":{"xmag":1,"ymag":1,"zfar":10,"znear":0.5}}"#,
        )
        .unwrap();
        assert!(camera.perspective.is_none());
        assert_eq!(camera.orthographic.as_ref().unwrap().zfar, 10.0);
        assert_eq!(camera.type_tag(), Some("orthographic"));

        let bad = serde_json::from_str::<Camera>(r#"{"type":"fisheye"}"#);
        assert!(bad.is_err());
    }
}
