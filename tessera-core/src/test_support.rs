//! Fixtures shared by unit, behaviour and property tests.

use std::cell::Cell;
use std::rc::Rc;

use geo::{Geometry, Point};

use crate::Feature;
use crate::codec::{FeatureParts, encode_geometry};
use crate::cursor::{RowSupplier, VecRowSupplier};
use crate::error::StoreError;

/// Feature `id` at `version` with one property and a point geometry.
#[must_use]
pub fn sample_feature(id: &str, version: &str) -> Feature {
    Feature::new(id)
        .with_version(version)
        .with_property("name", format!("Feature {id}"))
        .with_geometry(sample_point(id))
}

/// Parts as a backend would load them for [`sample_feature`].
///
/// The geometry is present only in binary form.
#[must_use]
pub fn sample_parts(id: &str, version: &str) -> FeatureParts {
    let mut parts = FeatureParts::new()
        .with_id(id)
        .with_version(version)
        .with_json(format!(
            r#"{{"id":"{id}","type":"Feature","properties":{{"name":"Feature {id}"}}}}"#
        ));
    parts.set_feature_type(Some(String::from(crate::DEFAULT_FEATURE_TYPE)));
    if let Ok(binary) = encode_geometry(&sample_point(id)) {
        parts.set_binary_geometry(Some(binary));
    }
    parts
}

/// Point derived from the id so different features get different shapes.
#[must_use]
pub fn sample_point(id: &str) -> Geometry<f64> {
    let x = id.bytes().map(f64::from).sum::<f64>();
    Geometry::Point(Point::new(x, 51.5))
}

/// [`RowSupplier`] counting backend fetches and closes.
#[derive(Debug, Default)]
pub struct CountingSupplier {
    inner: VecRowSupplier,
    fail_when_drained: bool,
    loads: Rc<Cell<usize>>,
    closes: Rc<Cell<usize>>,
}

impl CountingSupplier {
    /// Supply `rows` in order.
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = FeatureParts>) -> Self {
        Self {
            inner: VecRowSupplier::new(rows),
            ..Self::default()
        }
    }

    /// Supply `rows`, then fail instead of reporting exhaustion.
    #[must_use]
    pub fn failing_after(rows: impl IntoIterator<Item = FeatureParts>) -> Self {
        Self {
            fail_when_drained: true,
            ..Self::new(rows)
        }
    }

    /// Shared counter of `try_load_next` calls.
    #[must_use]
    pub fn loads(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.loads)
    }

    /// Shared counter of `close` calls.
    #[must_use]
    pub fn closes(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.closes)
    }
}

impl RowSupplier for CountingSupplier {
    fn try_load_next(&mut self, parts: &mut FeatureParts) -> Result<bool, StoreError> {
        self.loads.set(self.loads.get().saturating_add(1));
        if self.fail_when_drained && self.inner.remaining() == 0 {
            return Err(StoreError::Backend {
                operation: "load row",
                message: String::from("connection reset"),
            });
        }
        self.inner.try_load_next(parts)
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get().saturating_add(1));
        self.inner.close();
    }
}
