//! Forward cursor streaming rows from a backend supplier.

use std::collections::VecDeque;
use std::mem;

use super::{CursorResource, ForwardCursor, retarget};
use crate::codec::{Codec, CodecFactory, FeatureFormat, FeatureParts};
use crate::error::{CursorError, StoreError};
use crate::row::Row;

/// Backend source of rows for a [`StreamingCursor`].
pub trait RowSupplier {
    /// Fill `parts` with the next backend row.
    ///
    /// Returns `false` once the result is exhausted; `parts` is then left
    /// untouched.
    fn try_load_next(&mut self, parts: &mut FeatureParts) -> Result<bool, StoreError>;

    /// Release the backend handle.
    fn close(&mut self) {}
}

/// Supplies rows from an in-memory queue.
#[derive(Debug, Default, Clone)]
pub struct VecRowSupplier {
    rows: VecDeque<FeatureParts>,
}

impl VecRowSupplier {
    /// Create a supplier yielding `rows` in order.
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = FeatureParts>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    /// Rows not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowSupplier for VecRowSupplier {
    fn try_load_next(&mut self, parts: &mut FeatureParts) -> Result<bool, StoreError> {
        let Some(row) = self.rows.pop_front() else {
            return Ok(false);
        };
        *parts = row;
        Ok(true)
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}

/// [`ForwardCursor`] over a [`RowSupplier`] with one row of lookahead.
///
/// The cursor owns two row slots. [`has_next`](ForwardCursor::has_next)
/// loads the following row into the lookahead slot once, and
/// [`next`](ForwardCursor::next) swaps the slots, so each row costs a single
/// backend fetch however often the caller asks whether more rows exist.
pub struct StreamingCursor<F: FeatureFormat> {
    supplier: Option<Box<dyn RowSupplier>>,
    current: Row<F>,
    lookahead: Row<F>,
    lookahead_loaded: bool,
    position: i64,
    exhausted: bool,
}

impl<F: FeatureFormat> StreamingCursor<F> {
    /// Create a cursor positioned before the first row of `supplier`.
    #[must_use]
    pub fn new(supplier: impl RowSupplier + 'static) -> Self {
        Self::from_boxed(Box::new(supplier))
    }

    /// Create a cursor over an already boxed supplier.
    #[must_use]
    pub fn from_boxed(supplier: Box<dyn RowSupplier>) -> Self {
        Self {
            supplier: Some(supplier),
            current: Row::new(),
            lookahead: Row::new(),
            lookahead_loaded: false,
            position: -1,
            exhausted: false,
        }
    }

    /// Continue the cursor with codecs produced by `factory`.
    ///
    /// Buffered rows are moved onto the new format; with `re_encode` they
    /// are rebuilt from their parts and encoded immediately.
    #[must_use]
    pub fn with_format<C>(mut self, factory: &C, re_encode: bool) -> StreamingCursor<C::Format>
    where
        C: CodecFactory,
    {
        let current = retarget_row(factory, mem::take(&mut self.current), re_encode);
        let lookahead = retarget_row(factory, mem::take(&mut self.lookahead), re_encode);
        StreamingCursor {
            supplier: self.supplier.take(),
            current,
            lookahead,
            lookahead_loaded: self.lookahead_loaded,
            position: self.position,
            exhausted: self.exhausted,
        }
    }
}

fn retarget_row<C, G>(factory: &C, row: Row<G>, re_encode: bool) -> Row<C::Format>
where
    C: CodecFactory,
    G: FeatureFormat,
{
    if !row.valid {
        return Row::new();
    }
    Row {
        codec: retarget(factory, row.codec, re_encode),
        valid: true,
    }
}

impl<F: FeatureFormat> CursorResource for StreamingCursor<F> {
    fn close(&mut self) {
        let Some(mut supplier) = self.supplier.take() else {
            return;
        };
        log::debug!("closing streaming cursor at position {}", self.position);
        supplier.close();
        self.current.clear();
        self.lookahead.clear();
        self.lookahead_loaded = false;
    }

    fn is_closed(&self) -> bool {
        self.supplier.is_none()
    }
}

impl<F: FeatureFormat> ForwardCursor for StreamingCursor<F> {
    type Format = F;

    fn has_next(&mut self) -> Result<bool, CursorError> {
        let supplier = self.supplier.as_deref_mut().ok_or(CursorError::Closed)?;
        if self.lookahead_loaded {
            return Ok(self.lookahead.valid);
        }
        if self.exhausted {
            return Ok(false);
        }
        let loaded = self.lookahead.load_from(supplier)?;
        self.lookahead_loaded = true;
        Ok(loaded)
    }

    fn next(&mut self) -> Result<(), CursorError> {
        if !self.has_next()? {
            if !self.exhausted {
                self.exhausted = true;
                self.position = self.position.saturating_add(1);
                self.current.clear();
            }
            return Err(CursorError::Exhausted);
        }
        mem::swap(&mut self.current, &mut self.lookahead);
        self.position = self.position.saturating_add(1);
        self.lookahead.clear();
        self.lookahead_loaded = false;
        Ok(())
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn current_codec(&self) -> Result<&Codec<F>, CursorError> {
        if self.supplier.is_none() {
            return Err(CursorError::Closed);
        }
        if !self.current.valid {
            return Err(CursorError::OutOfBounds {
                position: self.position,
            });
        }
        Ok(&self.current.codec)
    }

    fn current_codec_mut(&mut self) -> Result<&mut Codec<F>, CursorError> {
        if self.supplier.is_none() {
            return Err(CursorError::Closed);
        }
        if !self.current.valid {
            return Err(CursorError::OutOfBounds {
                position: self.position,
            });
        }
        Ok(&mut self.current.codec)
    }
}

impl<F: FeatureFormat> Drop for StreamingCursor<F> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<F: FeatureFormat> std::fmt::Debug for StreamingCursor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCursor")
            .field("position", &self.position)
            .field("on_row", &self.current.valid)
            .field("lookahead_loaded", &self.lookahead_loaded)
            .field("exhausted", &self.exhausted)
            .field("closed", &self.supplier.is_none())
            .finish_non_exhaustive()
    }
}
