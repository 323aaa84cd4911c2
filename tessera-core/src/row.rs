//! Reusable row slot used for cursor buffering.

use crate::codec::{Codec, FeatureFormat};
use crate::cursor::RowSupplier;
use crate::error::StoreError;

/// One codec plus a validity flag.
///
/// Streaming cursors own exactly two rows and swap them on every step, so a
/// long iteration reuses the same slots instead of allocating per row.
#[derive(Debug, Clone)]
pub struct Row<F: FeatureFormat> {
    /// The codec holding the row's feature.
    pub codec: Codec<F>,
    /// Whether the slot holds a loaded row.
    pub valid: bool,
}

impl<F: FeatureFormat> Default for Row<F> {
    fn default() -> Self {
        Self {
            codec: Codec::new(),
            valid: false,
        }
    }
}

impl<F: FeatureFormat> Row<F> {
    /// Create an empty, invalid row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the codec and mark the row invalid.
    pub fn clear(&mut self) {
        self.codec.clear();
        self.valid = false;
    }

    /// Load the next backend row from `supplier` into this slot.
    ///
    /// On error the slot is left invalid.
    pub fn load_from(&mut self, supplier: &mut dyn RowSupplier) -> Result<bool, StoreError> {
        self.valid = false;
        self.valid = self
            .codec
            .load_with(|parts| supplier.try_load_next(parts))?;
        Ok(self.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoFeatureFormat;
    use crate::codec::FeatureParts;
    use crate::cursor::VecRowSupplier;
    use rstest::rstest;

    #[rstest]
    fn load_from_marks_row_valid_until_exhausted() {
        let mut supplier = VecRowSupplier::new(vec![FeatureParts::new().with_id("a")]);
        let mut row = Row::<GeoFeatureFormat>::new();

        assert!(row.load_from(&mut supplier).expect("first load"));
        assert!(row.valid);
        assert_eq!(row.codec.id(), Some("a"));

        assert!(!row.load_from(&mut supplier).expect("second load"));
        assert!(!row.valid);
        assert!(row.codec.id().is_none());
    }
}
