//! Fixture builders shared by the integration tests.
//!
//! Integration tests link the crate without the `test-support` feature, so
//! the few helpers they need live here.

use geo::{Geometry, Point};
use tessera_core::Feature;

/// Unversioned feature `id` with a name and a point geometry.
pub fn feature(id: &str) -> Feature {
    Feature::new(id)
        .with_property("name", format!("Feature {id}"))
        .with_geometry(point(id))
}

/// Point derived from the id so different features get different shapes.
pub fn point(id: &str) -> Geometry<f64> {
    let x = id.bytes().map(f64::from).sum::<f64>();
    Geometry::Point(Point::new(x, 51.5))
}
