//! Cursors over feature result sets.
//!
//! A [`ForwardCursor`] moves through rows one step at a time and is what a
//! backend hands out for streaming reads. A [`SeekableCursor`] adds random
//! access and a [`MutableCursor`] adds in-place edits; both need the whole
//! result in memory, which only [`HeapCacheCursor`] provides.
//!
//! Cursors move through three states: before the first row (position `-1`),
//! on a row, and after the last row. Row accessors fail with
//! [`CursorError::OutOfBounds`] unless the cursor is on a row and with
//! [`CursorError::Closed`] once it has been closed.

mod heap;
mod streaming;

use geo::Geometry;

pub use heap::HeapCacheCursor;
pub use streaming::{RowSupplier, StreamingCursor, VecRowSupplier};

use crate::codec::{Codec, CodecFactory, FeatureFormat};
use crate::error::{CodecError, CodecErrorKind, CursorError};
use crate::write::ExecutedOp;

/// Something holding backend resources that must be released exactly once.
pub trait CursorResource {
    /// Release the resources. Closing twice is a no-op.
    fn close(&mut self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

/// Forward-only navigation with lazy row accessors.
pub trait ForwardCursor: CursorResource {
    /// Format of the codecs the cursor yields.
    type Format: FeatureFormat;

    /// Whether another row follows the current one.
    ///
    /// Repeated calls without an intervening [`next`](Self::next) do not
    /// touch the backend again.
    fn has_next(&mut self) -> Result<bool, CursorError>;

    /// Move to the next row, failing with [`CursorError::Exhausted`] when
    /// there is none.
    fn next(&mut self) -> Result<(), CursorError>;

    /// Current position; `-1` before the first row.
    fn position(&self) -> i64;

    /// Codec of the current row.
    fn current_codec(&self) -> Result<&Codec<Self::Format>, CursorError>;

    /// Mutable codec of the current row.
    fn current_codec_mut(&mut self) -> Result<&mut Codec<Self::Format>, CursorError>;

    /// Advance when another row exists, reporting whether it moved.
    fn try_next(&mut self) -> Result<bool, CursorError> {
        if !self.has_next()? {
            return Ok(false);
        }
        self.next()?;
        Ok(true)
    }

    /// Identifier of the current row.
    fn id(&mut self) -> Result<Option<&str>, CursorError> {
        Ok(self.current_codec_mut()?.id())
    }

    /// Version token of the current row.
    fn version(&mut self) -> Result<Option<&str>, CursorError> {
        Ok(self.current_codec_mut()?.version())
    }

    /// Feature type tag of the current row.
    fn feature_type(&mut self) -> Result<Option<&str>, CursorError> {
        Ok(self.current_codec_mut()?.feature_type())
    }

    /// Properties type tag of the current row.
    fn properties_type(&mut self) -> Result<Option<&str>, CursorError> {
        Ok(self.current_codec_mut()?.properties_type())
    }

    /// JSON body of the current row.
    fn json(&mut self) -> Result<Option<&str>, CursorError> {
        Ok(self.current_codec_mut()?.json())
    }

    /// Executed operation reported for the current row.
    fn op(&self) -> Result<Option<ExecutedOp>, CursorError> {
        Ok(self.current_codec()?.op())
    }

    /// Parsed geometry of the current row.
    fn geometry(&mut self) -> Result<Option<&Geometry<f64>>, CursorError> {
        Ok(self.current_codec_mut()?.geometry()?)
    }

    /// Binary geometry of the current row.
    fn binary_geometry(&mut self) -> Result<Option<&[u8]>, CursorError> {
        Ok(self.current_codec_mut()?.binary_geometry()?)
    }

    /// Assembled feature of the current row, encoded on first access.
    ///
    /// A failed encode is not an `Err`; it is recorded on the codec and
    /// visible through [`error`](Self::error).
    fn feature(
        &mut self,
    ) -> Result<Option<&<Self::Format as FeatureFormat>::Feature>, CursorError> {
        Ok(self.current_codec_mut()?.feature())
    }

    /// Error recorded on the current row's codec.
    fn error(&self) -> Result<Option<&CodecError>, CursorError> {
        Ok(self.current_codec()?.error())
    }
}

/// Random access over a materialized result.
pub trait SeekableCursor: ForwardCursor {
    /// Number of rows.
    fn len(&self) -> usize;

    /// Whether the result holds no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move to `position`.
    ///
    /// Positions past the last row move after the last row and positions at
    /// or before `-1` move before the first row; both return `false`.
    fn absolute(&mut self, position: i64) -> Result<bool, CursorError>;

    /// Every buffered codec, in cursor order.
    fn codecs(&self) -> &[Codec<Self::Format>];

    /// Move `offset` rows from the current position.
    fn relative(&mut self, offset: i64) -> Result<bool, CursorError> {
        self.absolute(self.position().saturating_add(offset))
    }

    /// Move one row back.
    fn previous(&mut self) -> Result<bool, CursorError> {
        self.relative(-1)
    }

    /// Move before the first row.
    fn before_first(&mut self) -> Result<(), CursorError> {
        self.absolute(-1).map(|_| ())
    }

    /// Move to the first row.
    fn first(&mut self) -> Result<bool, CursorError> {
        self.absolute(0)
    }

    /// Move to the last row.
    fn last(&mut self) -> Result<bool, CursorError> {
        self.absolute(row_count(self.len()).saturating_sub(1))
    }

    /// Move after the last row.
    fn after_last(&mut self) -> Result<(), CursorError> {
        self.absolute(row_count(self.len())).map(|_| ())
    }
}

/// In-place edits of a materialized result.
///
/// Edits at the current position are visible through the row accessors
/// immediately. Removing the row at or before the current position moves
/// the cursor one step back, so the following row is not skipped.
pub trait MutableCursor: SeekableCursor {
    /// Append `feature`, returning its position.
    fn add_feature(
        &mut self,
        feature: <Self::Format as FeatureFormat>::Feature,
    ) -> Result<i64, CursorError>;

    /// Replace the feature at `position`, returning the previous one.
    fn set_feature_at(
        &mut self,
        position: i64,
        feature: <Self::Format as FeatureFormat>::Feature,
    ) -> Result<Option<<Self::Format as FeatureFormat>::Feature>, CursorError>;

    /// Remove the row at `position`, returning its feature.
    fn remove_feature_at(
        &mut self,
        position: i64,
    ) -> Result<Option<<Self::Format as FeatureFormat>::Feature>, CursorError>;

    /// Put the rows back into the order the caller submitted them in.
    ///
    /// Returns `false`, leaving the order untouched, when no order is known
    /// or a row's id is not part of it. Adding or replacing features forgets
    /// the order.
    fn restore_input_order(&mut self) -> bool;

    /// Replace the feature at the current position.
    fn set_feature(
        &mut self,
        feature: <Self::Format as FeatureFormat>::Feature,
    ) -> Result<Option<<Self::Format as FeatureFormat>::Feature>, CursorError> {
        let position = self.position();
        self.set_feature_at(position, feature)
    }

    /// Remove the row at the current position.
    fn remove_feature(
        &mut self,
    ) -> Result<Option<<Self::Format as FeatureFormat>::Feature>, CursorError> {
        let position = self.position();
        self.remove_feature_at(position)
    }
}

/// Move `codec` onto the format produced by `factory`.
///
/// With `re_encode` the codec is always rebuilt from its parts and encoded
/// at once; otherwise a codec already of the target format is reused as is.
/// Rejected-write errors survive the move.
pub(crate) fn retarget<C, G>(factory: &C, mut codec: Codec<G>, re_encode: bool) -> Codec<C::Format>
where
    C: CodecFactory,
    G: FeatureFormat,
{
    if !re_encode && factory.is_instance(&codec) {
        return factory.adopt(codec);
    }
    if !codec.is_decoded() && codec.feature_ref().is_some() {
        codec.decode(false);
    }
    let mut fresh = factory.new_instance();
    fresh.with_parts(&codec);
    if re_encode {
        fresh.encode(true);
    }
    if let Some(error) = codec
        .error()
        .filter(|error| matches!(error.kind, CodecErrorKind::Write(_)))
    {
        fresh.set_error(Some(error.clone()));
    }
    fresh
}

fn row_count(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
