//! Conversion between assembled features and their disassembled parts.
//!
//! A [`Codec`] owns both representations of one feature. At any moment one of
//! them is the source of truth and the other is a cache: [`Codec::decode`]
//! derives the parts from the assembled feature, [`Codec::encode`] assembles
//! the feature from the parts. Both are no-ops while the cache is current
//! unless forced.
//!
//! The assembled type is chosen by a [`FeatureFormat`]. Two formats ship with
//! the crate: [`GeoFeatureFormat`] producing [`Feature`](crate::Feature) and
//! [`JsonFeatureFormat`] producing a `serde_json::Value` object.

mod format;
mod geometry;

use std::any::{Any, TypeId};
use std::fmt;

use geo::Geometry;

pub use format::{GeoFeatureFormat, JsonFeatureFormat};
pub use geometry::{GeometryCache, GeometryState, decode_geometry, encode_geometry};

use crate::error::CodecError;
use crate::write::ExecutedOp;

/// Converts between an assembled feature type and [`FeatureParts`].
pub trait FeatureFormat: 'static {
    /// The assembled feature produced by this format.
    type Feature: Clone + fmt::Debug + 'static;

    /// Split `feature` into `parts`.
    ///
    /// `parts` arrives empty apart from the operation kind.
    fn disassemble(feature: &Self::Feature, parts: &mut FeatureParts) -> Result<(), CodecError>;

    /// Assemble a feature from `parts`.
    ///
    /// The parsed geometry has already been derived when this is called, so
    /// implementations read it with [`GeometryCache::peek_parsed`].
    fn assemble(parts: &FeatureParts) -> Result<Self::Feature, CodecError>;
}

/// Disassembled representation of a feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureParts {
    op: Option<ExecutedOp>,
    id: Option<String>,
    version: Option<String>,
    feature_type: Option<String>,
    properties_type: Option<String>,
    json: Option<String>,
    geometry: GeometryCache,
}

impl FeatureParts {
    /// Create empty parts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operation kind attached by the backend.
    #[must_use]
    pub const fn op(&self) -> Option<ExecutedOp> {
        self.op
    }

    /// Feature identifier.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Version token.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Feature type tag.
    #[must_use]
    pub fn feature_type(&self) -> Option<&str> {
        self.feature_type.as_deref()
    }

    /// Properties type tag.
    #[must_use]
    pub fn properties_type(&self) -> Option<&str> {
        self.properties_type.as_deref()
    }

    /// JSON body without geometry.
    #[must_use]
    pub fn json(&self) -> Option<&str> {
        self.json.as_deref()
    }

    /// Geometry cache.
    #[must_use]
    pub const fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    /// Mutable geometry cache.
    pub const fn geometry_mut(&mut self) -> &mut GeometryCache {
        &mut self.geometry
    }

    /// Set the operation kind.
    pub const fn set_op(&mut self, op: Option<ExecutedOp>) {
        self.op = op;
    }

    /// Set the identifier.
    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// Set the version token.
    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    /// Set the feature type tag.
    pub fn set_feature_type(&mut self, feature_type: Option<String>) {
        self.feature_type = feature_type;
    }

    /// Set the properties type tag.
    pub fn set_properties_type(&mut self, properties_type: Option<String>) {
        self.properties_type = properties_type;
    }

    /// Set the JSON body.
    pub fn set_json(&mut self, json: Option<String>) {
        self.json = json;
    }

    /// Set the binary geometry, dropping any parsed geometry.
    pub fn set_binary_geometry(&mut self, binary: Option<Vec<u8>>) {
        self.geometry.set_binary(binary);
    }

    /// Set the parsed geometry, dropping any binary geometry.
    pub fn set_geometry(&mut self, geometry: Option<Geometry<f64>>) {
        self.geometry.set_parsed(geometry);
    }

    /// Builder variant of [`Self::set_id`].
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder variant of [`Self::set_version`].
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Builder variant of [`Self::set_json`].
    #[must_use]
    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    /// Builder variant of [`Self::set_op`].
    #[must_use]
    pub const fn with_op(mut self, op: ExecutedOp) -> Self {
        self.op = Some(op);
        self
    }

    /// Builder variant of [`Self::set_binary_geometry`].
    #[must_use]
    pub fn with_binary_geometry(mut self, binary: Vec<u8>) -> Self {
        self.geometry.set_binary(Some(binary));
        self
    }

    /// Reset everything but the operation kind.
    fn reset_keep_op(&mut self) {
        let op = self.op;
        *self = Self::default();
        self.op = op;
    }
}

/// One feature in assembled and/or disassembled form.
///
/// A codec is owned by exactly one row or collection slot and is not meant to
/// be shared between threads.
pub struct Codec<F: FeatureFormat> {
    parts: FeatureParts,
    feature: Option<F::Feature>,
    decoded: bool,
    encoded: bool,
    error: Option<CodecError>,
}

impl<F: FeatureFormat> Default for Codec<F> {
    fn default() -> Self {
        Self {
            parts: FeatureParts::default(),
            feature: None,
            decoded: false,
            encoded: false,
            error: None,
        }
    }
}

impl<F: FeatureFormat> Clone for Codec<F> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
            feature: self.feature.clone(),
            decoded: self.decoded,
            encoded: self.encoded,
            error: self.error.clone(),
        }
    }
}

impl<F: FeatureFormat> fmt::Debug for Codec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("parts", &self.parts)
            .field("feature", &self.feature)
            .field("decoded", &self.decoded)
            .field("encoded", &self.encoded)
            .field("error", &self.error)
            .finish()
    }
}

impl<F: FeatureFormat> Codec<F> {
    /// Create an empty codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec whose source of truth is `feature`.
    #[must_use]
    pub fn from_feature(feature: F::Feature) -> Self {
        let mut codec = Self::new();
        codec.set_feature(feature);
        codec
    }

    /// Create a codec whose source of truth is `parts`.
    #[must_use]
    pub fn from_parts(parts: FeatureParts) -> Self {
        Self {
            parts,
            decoded: true,
            ..Self::default()
        }
    }

    /// Derive the parts from the assembled feature.
    ///
    /// Does nothing when the parts are current unless `force` is set. On
    /// failure the error is recorded on the codec; its state is then
    /// undefined and the caller must [`clear`](Self::clear) it before reuse.
    pub fn decode(&mut self, force: bool) -> &mut Self {
        if self.decoded && !force {
            return self;
        }
        let Some(feature) = self.feature.as_ref() else {
            self.decoded = false;
            self.error = Some(CodecError::missing_feature());
            return self;
        };
        let mut parts = FeatureParts::default();
        parts.op = self.parts.op;
        match F::disassemble(feature, &mut parts) {
            Ok(()) => {
                self.parts = parts;
                self.decoded = true;
                self.error = None;
            }
            Err(error) => {
                self.decoded = false;
                self.error = Some(error);
            }
        }
        self
    }

    /// Assemble the feature from the parts.
    ///
    /// Does nothing when the feature is current unless `force` is set, and
    /// does nothing at all when there is no JSON body, so write-only codecs
    /// carrying just an id and version are tolerated.
    pub fn encode(&mut self, force: bool) -> &mut Self {
        if (self.encoded && !force) || self.parts.json.is_none() {
            return self;
        }
        let assembled = self
            .parts
            .geometry
            .ensure_parsed()
            .and_then(|()| F::assemble(&self.parts));
        match assembled {
            Ok(feature) => {
                self.feature = Some(feature);
                self.encoded = true;
                self.error = None;
            }
            Err(error) => {
                self.encoded = false;
                self.error = Some(error);
            }
        }
        self
    }

    /// Reset parts, feature, error and both flags.
    pub fn clear(&mut self) -> &mut Self {
        self.parts = FeatureParts::default();
        self.feature = None;
        self.decoded = false;
        self.encoded = false;
        self.error = None;
        self
    }

    /// Reset only the parts, keeping the assembled feature.
    pub fn clear_parts(&mut self) -> &mut Self {
        self.parts = FeatureParts::default();
        self.decoded = false;
        self
    }

    /// Reset only the assembled feature, keeping the parts.
    pub fn clear_feature(&mut self) -> &mut Self {
        self.feature = None;
        self.encoded = false;
        self
    }

    /// Duplicate another codec of the same format, including flags and error.
    pub fn copy_from(&mut self, other: &Self) -> &mut Self {
        self.clone_from(other);
        self
    }

    /// Copy only the parts of a codec, possibly of a different format.
    ///
    /// The assembled feature is dropped; the copied parts become the source
    /// of truth and a later [`encode`](Self::encode) produces this codec's
    /// feature type from them.
    pub fn with_parts<G: FeatureFormat>(&mut self, other: &Codec<G>) -> &mut Self {
        self.parts = other.parts.clone();
        self.feature = None;
        self.decoded = true;
        self.encoded = false;
        self.error = None;
        self
    }

    /// Fill the parts through `loader`, as a row supplier does.
    ///
    /// The codec is cleared first. When the loader reports a row, the loaded
    /// parts become the source of truth.
    pub fn load_with<E>(
        &mut self,
        loader: impl FnOnce(&mut FeatureParts) -> Result<bool, E>,
    ) -> Result<bool, E> {
        self.clear();
        let loaded = loader(&mut self.parts)?;
        self.decoded = loaded;
        Ok(loaded)
    }

    /// Whether the parts are derived from the current feature.
    #[must_use]
    pub const fn is_decoded(&self) -> bool {
        self.decoded
    }

    /// Whether the feature is assembled from the current parts.
    #[must_use]
    pub const fn is_encoded(&self) -> bool {
        self.encoded
    }

    /// Whether the last decode, encode or write failed.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Error of the last failed decode, encode or write.
    #[must_use]
    pub const fn error(&self) -> Option<&CodecError> {
        self.error.as_ref()
    }

    /// Record an error, e.g. the cause of a rejected write.
    pub fn set_error(&mut self, error: Option<CodecError>) {
        self.error = error;
    }

    /// Raw access to the parts without decoding.
    #[must_use]
    pub const fn parts(&self) -> &FeatureParts {
        &self.parts
    }

    /// Assembled feature as it currently is, without encoding.
    #[must_use]
    pub const fn feature_ref(&self) -> Option<&F::Feature> {
        self.feature.as_ref()
    }

    /// Assembled feature, encoding it from the parts when stale.
    pub fn feature(&mut self) -> Option<&F::Feature> {
        self.encode(false);
        self.feature.as_ref()
    }

    /// Take the assembled feature out of the codec, encoding it first.
    pub fn take_feature(&mut self) -> Option<F::Feature> {
        self.encode(false);
        self.encoded = false;
        self.feature.take()
    }

    /// Replace the assembled feature.
    ///
    /// The new feature is definitionally encoded. Parts derived from the old
    /// feature are discarded, except the operation kind.
    pub fn set_feature(&mut self, feature: F::Feature) -> &mut Self {
        self.feature = Some(feature);
        self.encoded = true;
        self.parts.reset_keep_op();
        self.decoded = false;
        self.error = None;
        self
    }

    /// Operation kind attached by the backend.
    #[must_use]
    pub const fn op(&self) -> Option<ExecutedOp> {
        self.parts.op
    }

    /// Set the operation kind; the feature is unaffected.
    pub const fn set_op(&mut self, op: Option<ExecutedOp>) -> &mut Self {
        self.parts.op = op;
        self
    }

    /// Identifier, decoding the parts when stale.
    pub fn id(&mut self) -> Option<&str> {
        self.sync_parts();
        self.parts.id()
    }

    /// Version token, decoding the parts when stale.
    pub fn version(&mut self) -> Option<&str> {
        self.sync_parts();
        self.parts.version()
    }

    /// Feature type tag, decoding the parts when stale.
    pub fn feature_type(&mut self) -> Option<&str> {
        self.sync_parts();
        self.parts.feature_type()
    }

    /// Properties type tag, decoding the parts when stale.
    pub fn properties_type(&mut self) -> Option<&str> {
        self.sync_parts();
        self.parts.properties_type()
    }

    /// JSON body, decoding the parts when stale.
    pub fn json(&mut self) -> Option<&str> {
        self.sync_parts();
        self.parts.json()
    }

    /// Parsed geometry, decoding the parts and parsing the binary form when
    /// needed.
    pub fn geometry(&mut self) -> Result<Option<&Geometry<f64>>, CodecError> {
        self.sync_parts();
        self.parts.geometry.parsed()
    }

    /// Binary geometry, decoding the parts and encoding the parsed form when
    /// needed.
    pub fn binary_geometry(&mut self) -> Result<Option<&[u8]>, CodecError> {
        self.sync_parts();
        self.parts.geometry.binary()
    }

    /// Set the identifier; the assembled feature becomes stale.
    pub fn set_id(&mut self, id: Option<String>) -> &mut Self {
        self.edit_parts(|parts| parts.set_id(id))
    }

    /// Set the version token; the assembled feature becomes stale.
    pub fn set_version(&mut self, version: Option<String>) -> &mut Self {
        self.edit_parts(|parts| parts.set_version(version))
    }

    /// Set the feature type tag; the assembled feature becomes stale.
    pub fn set_feature_type(&mut self, feature_type: Option<String>) -> &mut Self {
        self.edit_parts(|parts| parts.set_feature_type(feature_type))
    }

    /// Set the properties type tag; the assembled feature becomes stale.
    pub fn set_properties_type(&mut self, properties_type: Option<String>) -> &mut Self {
        self.edit_parts(|parts| parts.set_properties_type(properties_type))
    }

    /// Set the JSON body; the assembled feature becomes stale.
    pub fn set_json(&mut self, json: Option<String>) -> &mut Self {
        self.edit_parts(|parts| parts.set_json(json))
    }

    /// Set the parsed geometry; the binary form and the assembled feature
    /// become stale.
    pub fn set_geometry(&mut self, geometry: Option<Geometry<f64>>) -> &mut Self {
        self.edit_parts(|parts| parts.set_geometry(geometry))
    }

    /// Set the binary geometry; the parsed form and the assembled feature
    /// become stale.
    pub fn set_binary_geometry(&mut self, binary: Option<Vec<u8>>) -> &mut Self {
        self.edit_parts(|parts| parts.set_binary_geometry(binary))
    }

    /// Decode lazily when only the assembled feature is current.
    fn sync_parts(&mut self) {
        if !self.decoded && self.feature.is_some() {
            self.decode(false);
        }
    }

    fn edit_parts(&mut self, edit: impl FnOnce(&mut FeatureParts)) -> &mut Self {
        self.sync_parts();
        edit(&mut self.parts);
        self.decoded = true;
        self.clear_feature()
    }
}

/// Produces codecs of one format for cursors.
pub trait CodecFactory {
    /// Format of the codecs produced.
    type Format: FeatureFormat;

    /// Create an empty codec.
    fn new_instance(&self) -> Codec<Self::Format> {
        Codec::new()
    }

    /// Whether `codec` already has the produced format.
    fn is_instance<G: FeatureFormat>(&self, _codec: &Codec<G>) -> bool {
        TypeId::of::<G>() == TypeId::of::<Self::Format>()
    }

    /// Reuse `codec` when it already has the produced format, otherwise
    /// re-home its parts onto a fresh codec.
    ///
    /// A codec holding only its assembled feature is decoded first, so the
    /// feature travels as parts.
    fn adopt<G: FeatureFormat>(&self, mut codec: Codec<G>) -> Codec<Self::Format> {
        if self.is_instance(&codec)
            && let Some(same) = (&mut codec as &mut dyn Any).downcast_mut::<Codec<Self::Format>>()
        {
            return std::mem::take(same);
        }
        if !codec.is_decoded() && codec.feature_ref().is_some() {
            codec.decode(false);
        }
        let mut fresh = self.new_instance();
        fresh.with_parts(&codec);
        fresh
    }
}
