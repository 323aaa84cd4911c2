//! Built-in feature formats.

use geo::Geometry;
use serde_json::{Map, Value};

use super::{CodecFactory, FeatureFormat, FeatureParts};
use crate::Feature;
use crate::error::{CodecError, CodecErrorKind};

const ID: &str = "id";
const TYPE: &str = "type";
const PROPERTIES_TYPE: &str = "propertiesType";
const VERSION: &str = "version";
const GEOMETRY: &str = "geometry";

/// Assembles parts into [`Feature`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoFeatureFormat;

impl FeatureFormat for GeoFeatureFormat {
    type Feature = Feature;

    fn disassemble(feature: &Feature, parts: &mut FeatureParts) -> Result<(), CodecError> {
        let json = serde_json::to_string(feature)
            .map_err(|source| CodecError::new(CodecErrorKind::Serialize, source.to_string()))?;
        parts.set_id(Some(feature.id.clone()));
        parts.set_version(feature.version.clone());
        parts.set_feature_type(Some(feature.feature_type.clone()));
        parts.set_properties_type(feature.properties_type.clone());
        parts.set_json(Some(json));
        parts.set_geometry(feature.geometry.clone());
        Ok(())
    }

    fn assemble(parts: &FeatureParts) -> Result<Feature, CodecError> {
        let json = parts.json().unwrap_or("{}");
        let mut feature: Feature = serde_json::from_str(json)
            .map_err(|source| CodecError::new(CodecErrorKind::Deserialize, source.to_string()))?;
        if let Some(id) = parts.id() {
            id.clone_into(&mut feature.id);
        }
        if let Some(feature_type) = parts.feature_type() {
            feature_type.clone_into(&mut feature.feature_type);
        }
        if parts.properties_type().is_some() {
            feature.properties_type = parts.properties_type().map(String::from);
        }
        if parts.version().is_some() {
            feature.version = parts.version().map(String::from);
        }
        feature.geometry = parts.geometry().peek_parsed().cloned();
        Ok(feature)
    }
}

impl CodecFactory for GeoFeatureFormat {
    type Format = Self;
}

/// Assembles parts into `serde_json::Value` objects.
///
/// The geometry is embedded under `"geometry"` using the serde encoding of
/// `geo::Geometry`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFeatureFormat;

impl FeatureFormat for JsonFeatureFormat {
    type Feature = Value;

    fn disassemble(feature: &Value, parts: &mut FeatureParts) -> Result<(), CodecError> {
        let Value::Object(object) = feature else {
            return Err(CodecError::new(
                CodecErrorKind::Serialize,
                "feature must be a JSON object",
            ));
        };
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(String::from);
        let geometry = match object.get(GEOMETRY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<Geometry<f64>>(value.clone()).map_err(|source| {
                    CodecError::new(CodecErrorKind::Geometry, source.to_string())
                })?,
            ),
        };
        let mut body = object.clone();
        body.remove(GEOMETRY);
        let json = serde_json::to_string(&body)
            .map_err(|source| CodecError::new(CodecErrorKind::Serialize, source.to_string()))?;

        parts.set_id(text(ID));
        parts.set_version(text(VERSION));
        parts.set_feature_type(text(TYPE));
        parts.set_properties_type(text(PROPERTIES_TYPE));
        parts.set_json(Some(json));
        parts.set_geometry(geometry);
        Ok(())
    }

    fn assemble(parts: &FeatureParts) -> Result<Value, CodecError> {
        let json = parts.json().unwrap_or("{}");
        let mut object: Map<String, Value> = serde_json::from_str(json)
            .map_err(|source| CodecError::new(CodecErrorKind::Deserialize, source.to_string()))?;
        let fields = [
            (ID, parts.id()),
            (TYPE, parts.feature_type()),
            (PROPERTIES_TYPE, parts.properties_type()),
            (VERSION, parts.version()),
        ];
        for (key, field) in fields {
            if let Some(text) = field {
                object.insert(String::from(key), Value::from(text));
            }
        }
        if let Some(geometry) = parts.geometry().peek_parsed() {
            let value = serde_json::to_value(geometry)
                .map_err(|source| CodecError::new(CodecErrorKind::Geometry, source.to_string()))?;
            object.insert(String::from(GEOMETRY), value);
        }
        Ok(Value::Object(object))
    }
}

impl CodecFactory for JsonFeatureFormat {
    type Format = Self;
}
