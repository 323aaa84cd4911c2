//! Two-slot geometry cache holding the binary and parsed forms.
//!
//! Either form can be derived from the other. Reading a missing form derives
//! and caches it; writing one form drops the other.

use geo::Geometry;

use crate::error::{CodecError, CodecErrorKind};

/// Which geometry forms a [`GeometryCache`] currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryState {
    /// No geometry.
    Neither,
    /// Only the binary encoding.
    Binary,
    /// Only the parsed geometry.
    Parsed,
    /// Both forms, known to agree.
    Both,
}

/// Binary and parsed geometry kept mutually derivable.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GeometryCache {
    /// No geometry.
    #[default]
    Neither,
    /// Only the binary encoding is present.
    Binary(Vec<u8>),
    /// Only the parsed geometry is present.
    Parsed(Geometry<f64>),
    /// Both forms are present.
    Both {
        /// Binary encoding.
        binary: Vec<u8>,
        /// Parsed geometry.
        parsed: Geometry<f64>,
    },
}

impl GeometryCache {
    /// Build a cache holding only the binary form.
    #[must_use]
    pub fn from_binary(binary: Option<Vec<u8>>) -> Self {
        binary.map_or(Self::Neither, Self::Binary)
    }

    /// Build a cache holding only the parsed form.
    #[must_use]
    pub fn from_parsed(parsed: Option<Geometry<f64>>) -> Self {
        parsed.map_or(Self::Neither, Self::Parsed)
    }

    /// Report which forms are cached.
    #[must_use]
    pub const fn state(&self) -> GeometryState {
        match self {
            Self::Neither => GeometryState::Neither,
            Self::Binary(_) => GeometryState::Binary,
            Self::Parsed(_) => GeometryState::Parsed,
            Self::Both { .. } => GeometryState::Both,
        }
    }

    /// Return the parsed geometry if it is cached, without deriving it.
    #[must_use]
    pub const fn peek_parsed(&self) -> Option<&Geometry<f64>> {
        match self {
            Self::Parsed(parsed) | Self::Both { parsed, .. } => Some(parsed),
            Self::Neither | Self::Binary(_) => None,
        }
    }

    /// Return the binary geometry if it is cached, without deriving it.
    #[must_use]
    pub fn peek_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(binary) | Self::Both { binary, .. } => Some(binary.as_slice()),
            Self::Neither | Self::Parsed(_) => None,
        }
    }

    /// Return the parsed geometry, parsing the binary form on first use.
    pub fn parsed(&mut self) -> Result<Option<&Geometry<f64>>, CodecError> {
        self.ensure_parsed()?;
        Ok(self.peek_parsed())
    }

    /// Return the binary geometry, encoding the parsed form on first use.
    pub fn binary(&mut self) -> Result<Option<&[u8]>, CodecError> {
        self.ensure_binary()?;
        Ok(self.peek_binary())
    }

    /// Replace the parsed geometry and drop the binary form.
    pub fn set_parsed(&mut self, parsed: Option<Geometry<f64>>) {
        *self = Self::from_parsed(parsed);
    }

    /// Replace the binary geometry and drop the parsed form.
    pub fn set_binary(&mut self, binary: Option<Vec<u8>>) {
        *self = Self::from_binary(binary);
    }

    pub(crate) fn ensure_parsed(&mut self) -> Result<(), CodecError> {
        match std::mem::take(self) {
            Self::Binary(binary) => match decode_geometry(&binary) {
                Ok(parsed) => {
                    *self = Self::Both { binary, parsed };
                    Ok(())
                }
                Err(error) => {
                    *self = Self::Binary(binary);
                    Err(error)
                }
            },
            other => {
                *self = other;
                Ok(())
            }
        }
    }

    pub(crate) fn ensure_binary(&mut self) -> Result<(), CodecError> {
        match std::mem::take(self) {
            Self::Parsed(parsed) => match encode_geometry(&parsed) {
                Ok(binary) => {
                    *self = Self::Both { binary, parsed };
                    Ok(())
                }
                Err(error) => {
                    *self = Self::Parsed(parsed);
                    Err(error)
                }
            },
            other => {
                *self = other;
                Ok(())
            }
        }
    }
}

/// Encode a geometry into its binary form.
pub fn encode_geometry(geometry: &Geometry<f64>) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(geometry)
        .map_err(|source| CodecError::new(CodecErrorKind::Geometry, source.to_string()))
}

/// Parse a geometry from its binary form.
pub fn decode_geometry(binary: &[u8]) -> Result<Geometry<f64>, CodecError> {
    bincode::deserialize(binary)
        .map_err(|source| CodecError::new(CodecErrorKind::Geometry, source.to_string()))
}
