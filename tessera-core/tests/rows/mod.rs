//! Backend rows for the cursor tests.

use tessera_core::codec::encode_geometry;
use tessera_core::{DEFAULT_FEATURE_TYPE, FeatureParts};

use crate::support::point;

/// Parts as a backend would load them for `support::feature(id)` at
/// `version`.
pub fn parts(id: &str, version: &str) -> FeatureParts {
    let mut parts = FeatureParts::new()
        .with_id(id)
        .with_version(version)
        .with_json(format!(
            r#"{{"id":"{id}","type":"Feature","properties":{{"name":"Feature {id}"}}}}"#
        ))
        .with_binary_geometry(encode_geometry(&point(id)).expect("encode point"));
    parts.set_feature_type(Some(String::from(DEFAULT_FEATURE_TYPE)));
    parts
}
