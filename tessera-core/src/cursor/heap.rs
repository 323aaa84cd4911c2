//! Fully materialized cursor with random access and in-place edits.

use std::collections::HashMap;
use std::fmt;
use std::mem;

use super::{CursorResource, ForwardCursor, MutableCursor, SeekableCursor, retarget, row_count};
use crate::codec::{Codec, CodecFactory, FeatureFormat};
use crate::error::CursorError;

/// Cursor over an in-memory, ordered collection of codecs.
///
/// Built either from a list of codecs or by draining a [`ForwardCursor`].
/// The current row is the codec at the current index, so edits through the
/// cursor are never out of step with what the accessors return.
pub struct HeapCacheCursor<F: FeatureFormat> {
    codecs: Vec<Codec<F>>,
    position: i64,
    original_order: Option<HashMap<String, usize>>,
    upstream: Option<Box<dyn CursorResource>>,
    closed: bool,
}

impl<F: FeatureFormat> HeapCacheCursor<F> {
    /// Create a cursor over `codecs`, positioned before the first row.
    #[must_use]
    pub fn from_codecs(codecs: Vec<Codec<F>>) -> Self {
        Self {
            codecs,
            position: -1,
            original_order: None,
            upstream: None,
            closed: false,
        }
    }

    /// Create a cursor over assembled features.
    #[must_use]
    pub fn from_features(features: impl IntoIterator<Item = F::Feature>) -> Self {
        Self::from_codecs(features.into_iter().map(Codec::from_feature).collect())
    }

    /// Drain `upstream` into memory, moving each row onto `factory`'s format.
    ///
    /// The upstream cursor is kept and closed together with this one.
    pub fn materialize<C, S>(factory: &C, mut upstream: S) -> Result<Self, CursorError>
    where
        C: CodecFactory<Format = F>,
        S: ForwardCursor + 'static,
    {
        let mut codecs = Vec::new();
        while upstream.try_next()? {
            let codec = mem::take(upstream.current_codec_mut()?);
            codecs.push(retarget(factory, codec, false));
        }
        log::debug!("materialized {} rows", codecs.len());
        let mut cursor = Self::from_codecs(codecs);
        cursor.upstream = Some(Box::new(upstream));
        Ok(cursor)
    }

    /// Attach the `id -> submission index` map used by
    /// [`restore_input_order`](MutableCursor::restore_input_order).
    #[must_use]
    pub fn with_original_order(mut self, order: HashMap<String, usize>) -> Self {
        self.original_order = Some(order);
        self
    }

    /// Whether a submission order is still known.
    #[must_use]
    pub const fn has_original_order(&self) -> bool {
        self.original_order.is_some()
    }

    /// Move every codec onto `factory`'s format, keeping position and order.
    ///
    /// With `re_encode` each codec is rebuilt from its parts and encoded
    /// immediately.
    #[must_use]
    pub fn with_format<C>(mut self, factory: &C, re_encode: bool) -> HeapCacheCursor<C::Format>
    where
        C: CodecFactory,
    {
        let codecs = mem::take(&mut self.codecs)
            .into_iter()
            .map(|codec| retarget(factory, codec, re_encode))
            .collect();
        HeapCacheCursor {
            codecs,
            position: self.position,
            original_order: self.original_order.take(),
            upstream: self.upstream.take(),
            closed: self.closed,
        }
    }

    /// Take every codec out of the cursor, closing it.
    #[must_use]
    pub fn into_codecs(mut self) -> Vec<Codec<F>> {
        let codecs = mem::take(&mut self.codecs);
        self.close();
        codecs
    }

    fn index_of(&self, position: i64) -> Option<usize> {
        usize::try_from(position)
            .ok()
            .filter(|index| *index < self.codecs.len())
    }

    fn ensure_open(&self) -> Result<(), CursorError> {
        if self.closed {
            return Err(CursorError::Closed);
        }
        Ok(())
    }

    fn checked_index(&self, position: i64) -> Result<usize, CursorError> {
        self.ensure_open()?;
        self.index_of(position)
            .ok_or(CursorError::OutOfBounds { position })
    }
}

impl<F: FeatureFormat> CursorResource for HeapCacheCursor<F> {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.codecs.clear();
        self.original_order = None;
        if let Some(mut upstream) = self.upstream.take() {
            upstream.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<F: FeatureFormat> ForwardCursor for HeapCacheCursor<F> {
    type Format = F;

    fn has_next(&mut self) -> Result<bool, CursorError> {
        self.ensure_open()?;
        Ok(self.position.saturating_add(1) < row_count(self.codecs.len()))
    }

    fn next(&mut self) -> Result<(), CursorError> {
        if !self.has_next()? {
            self.position = row_count(self.codecs.len());
            return Err(CursorError::Exhausted);
        }
        self.position = self.position.saturating_add(1);
        Ok(())
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn current_codec(&self) -> Result<&Codec<F>, CursorError> {
        let index = self.checked_index(self.position)?;
        self.codecs
            .get(index)
            .ok_or(CursorError::OutOfBounds {
                position: self.position,
            })
    }

    fn current_codec_mut(&mut self) -> Result<&mut Codec<F>, CursorError> {
        let position = self.position;
        let index = self.checked_index(position)?;
        self.codecs
            .get_mut(index)
            .ok_or(CursorError::OutOfBounds { position })
    }
}

impl<F: FeatureFormat> SeekableCursor for HeapCacheCursor<F> {
    fn len(&self) -> usize {
        self.codecs.len()
    }

    fn absolute(&mut self, position: i64) -> Result<bool, CursorError> {
        self.ensure_open()?;
        let len = row_count(self.codecs.len());
        if position >= len {
            self.position = len;
            return Ok(false);
        }
        if position < 0 {
            self.position = -1;
            return Ok(false);
        }
        self.position = position;
        Ok(true)
    }

    fn codecs(&self) -> &[Codec<F>] {
        &self.codecs
    }
}

impl<F: FeatureFormat> MutableCursor for HeapCacheCursor<F> {
    fn add_feature(&mut self, feature: F::Feature) -> Result<i64, CursorError> {
        self.ensure_open()?;
        self.original_order = None;
        self.codecs.push(Codec::from_feature(feature));
        Ok(row_count(self.codecs.len()).saturating_sub(1))
    }

    fn set_feature_at(
        &mut self,
        position: i64,
        feature: F::Feature,
    ) -> Result<Option<F::Feature>, CursorError> {
        let index = self.checked_index(position)?;
        let codec = self
            .codecs
            .get_mut(index)
            .ok_or(CursorError::OutOfBounds { position })?;
        let previous = codec.take_feature();
        codec.set_feature(feature);
        self.original_order = None;
        Ok(previous)
    }

    fn remove_feature_at(&mut self, position: i64) -> Result<Option<F::Feature>, CursorError> {
        let index = self.checked_index(position)?;
        let mut removed = self.codecs.remove(index);
        if position <= self.position {
            self.position = self.position.saturating_sub(1);
        }
        Ok(removed.take_feature())
    }

    fn restore_input_order(&mut self) -> bool {
        let Some(order) = self.original_order.as_ref() else {
            return false;
        };
        let mut ranks = Vec::with_capacity(self.codecs.len());
        for codec in &mut self.codecs {
            let Some(rank) = codec.id().and_then(|id| order.get(id)).copied() else {
                return false;
            };
            ranks.push(rank);
        }
        let mut ranked: Vec<(usize, Codec<F>)> =
            ranks.into_iter().zip(mem::take(&mut self.codecs)).collect();
        // Stable, so both results of one PURGE keep their relative order.
        ranked.sort_by_key(|(rank, _)| *rank);
        self.codecs = ranked.into_iter().map(|(_, codec)| codec).collect();
        self.position = -1;
        true
    }
}

impl<F: FeatureFormat> fmt::Debug for HeapCacheCursor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapCacheCursor")
            .field("codecs", &self.codecs)
            .field("position", &self.position)
            .field("original_order", &self.original_order)
            .field("has_upstream", &self.upstream.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}
