//! The assembled geospatial feature handled by [`GeoFeatureFormat`].
//!
//! [`GeoFeatureFormat`]: crate::GeoFeatureFormat

use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Feature type used when none is given.
pub const DEFAULT_FEATURE_TYPE: &str = "Feature";

fn default_feature_type() -> String {
    String::from(DEFAULT_FEATURE_TYPE)
}

/// A single stored geospatial record.
///
/// The geometry is excluded from the serialised body; codecs carry it
/// separately in binary or parsed form.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point};
/// use tessera_core::Feature;
///
/// let feature = Feature::new("museum")
///     .with_property("name", "Museum")
///     .with_geometry(Geometry::Point(Point::new(13.4, 52.5)));
/// assert_eq!(feature.id, "museum");
/// assert!(feature.geometry.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Identifier within the collection.
    pub id: String,
    /// Feature type discriminator.
    #[serde(rename = "type", default = "default_feature_type")]
    pub feature_type: String,
    /// Optional discriminator for the properties object.
    #[serde(
        rename = "propertiesType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub properties_type: Option<String>,
    /// Version token of the state this feature was read at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Free-form attributes.
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Parsed geometry, carried outside the JSON body.
    #[serde(skip)]
    pub geometry: Option<Geometry<f64>>,
}

impl Feature {
    /// Create a feature with no properties and no geometry.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            feature_type: default_feature_type(),
            properties_type: None,
            version: None,
            properties: Map::new(),
            geometry: None,
        }
    }

    /// Set a property, replacing any previous value.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Attach a geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Geometry<f64>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Attach the version token used for optimistic concurrency.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Override the feature type discriminator.
    #[must_use]
    pub fn with_feature_type(mut self, feature_type: impl Into<String>) -> Self {
        self.feature_type = feature_type.into();
        self
    }

    /// Set the properties type discriminator.
    #[must_use]
    pub fn with_properties_type(mut self, properties_type: impl Into<String>) -> Self {
        self.properties_type = Some(properties_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use rstest::rstest;

    #[rstest]
    fn body_excludes_geometry() {
        let feature = Feature::new("a")
            .with_property("name", "A")
            .with_geometry(Geometry::Point(Point::new(1.0, 2.0)));
        let json = serde_json::to_value(&feature).expect("serialise feature");
        assert!(json.get("geometry").is_none());
        assert_eq!(json.get("type"), Some(&Value::from("Feature")));
    }

    #[rstest]
    fn missing_type_defaults_to_feature() {
        let feature: Feature = serde_json::from_str(r#"{"id":"a"}"#).expect("parse feature");
        assert_eq!(feature.feature_type, DEFAULT_FEATURE_TYPE);
        assert!(feature.properties.is_empty());
    }
}
