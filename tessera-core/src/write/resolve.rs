//! Resolution of write intents against the stored state of a feature.
//!
//! Backends look up the stored state of the targeted id, call [`resolve`]
//! and carry out the returned [`Decision`]. A PURGE that resolves to
//! [`Decision::Delete`] is compound: after the implied delete the backend
//! hands the new deleted-state version to [`resolve_purge`] and carries out
//! that decision as well.

use super::{ErrorCause, IfConflict, IfExists, IfNotExists, WriteOp};

/// State of the stored feature targeted by an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredState {
    /// No live or deleted state exists.
    Absent,
    /// A live feature exists at `version`.
    Live {
        /// Current version token.
        version: String,
    },
    /// Only a deleted state exists at `version`.
    Deleted {
        /// Version token of the deleted state.
        version: String,
    },
}

impl StoredState {
    /// Version of the live feature, if any.
    #[must_use]
    pub fn live_version(&self) -> Option<&str> {
        match self {
            Self::Live { version } => Some(version),
            Self::Absent | Self::Deleted { .. } => None,
        }
    }
}

/// The parts of a write intent the resolver looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentView {
    /// Requested operation.
    pub op: WriteOp,
    /// Policy when the feature exists.
    pub if_exists: IfExists,
    /// Policy on a version mismatch.
    pub if_conflict: IfConflict,
    /// Policy when the feature does not exist.
    pub if_not_exists: IfNotExists,
    /// Version token; `Some` makes the intent atomic.
    pub version: Option<String>,
    /// Whether a feature body was supplied.
    pub has_feature: bool,
}

/// What the backend must do for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Insert the supplied feature as a new live state.
    Create,
    /// Replace the live feature with the supplied one.
    Update,
    /// Move the live feature to the deleted state.
    Delete,
    /// Remove the deleted state.
    Purge,
    /// Move the deleted state back to live.
    Restore,
    /// Change nothing.
    Retain {
        /// Whether the stored feature is reported, or `null`.
        with_current: bool,
    },
    /// Reject the intent.
    Fail {
        /// Why the intent was rejected.
        cause: ErrorCause,
        /// Whether the stored feature is attached to the error.
        with_current: bool,
    },
}

/// Decide how `intent` applies to `stored`.
///
/// - CREATE fails with [`ErrorCause::Exists`] on an id collision.
/// - UPDATE requires a live feature, failing with [`ErrorCause::NotFound`]
///   otherwise; a version token must match the live version.
/// - PUT creates when no live feature exists, otherwise follows UPDATE.
/// - DELETE retains with `null` when the feature is already gone.
/// - PURGE resolves its implied delete here; see [`resolve_purge`].
/// - RESTORE requires a deleted state, retaining a live feature as is.
///
/// A version mismatch is resolved by the intent's [`IfConflict`] policy;
/// with the default [`IfConflict::Fail`] it yields
/// [`ErrorCause::Conflict`] with the current feature attached.
#[must_use]
pub fn resolve(intent: &IntentView, stored: &StoredState) -> Decision {
    let version = intent.version.as_deref();
    match (intent.op, stored) {
        (WriteOp::Purge, StoredState::Absent | StoredState::Deleted { .. }) => {
            return resolve_purge(version, stored);
        }
        (WriteOp::Restore, StoredState::Deleted { version: current }) => {
            return if mismatched(version, current) {
                Decision::Fail {
                    cause: ErrorCause::Conflict,
                    with_current: true,
                }
            } else {
                Decision::Restore
            };
        }
        _ => {}
    }

    if intent.op.requires_feature() && !intent.has_feature {
        return Decision::Fail {
            cause: ErrorCause::Invalid,
            with_current: false,
        };
    }

    let Some(current) = stored.live_version() else {
        return match intent.if_not_exists {
            IfNotExists::Fail => Decision::Fail {
                cause: ErrorCause::NotFound,
                with_current: false,
            },
            IfNotExists::Retain => Decision::Retain {
                with_current: false,
            },
            IfNotExists::Create if intent.has_feature => Decision::Create,
            IfNotExists::Create => Decision::Fail {
                cause: ErrorCause::Invalid,
                with_current: false,
            },
        };
    };

    let proceed = match intent.if_exists {
        IfExists::Fail => {
            return Decision::Fail {
                cause: ErrorCause::Exists,
                with_current: true,
            };
        }
        IfExists::Retain => return Decision::Retain { with_current: true },
        IfExists::Replace if intent.has_feature => Decision::Update,
        IfExists::Replace => {
            return Decision::Fail {
                cause: ErrorCause::Invalid,
                with_current: true,
            };
        }
        IfExists::Delete | IfExists::Purge => Decision::Delete,
    };

    if !mismatched(version, current) {
        return proceed;
    }
    match intent.if_conflict {
        IfConflict::Fail => Decision::Fail {
            cause: ErrorCause::Conflict,
            with_current: true,
        },
        IfConflict::Retain => Decision::Retain { with_current: true },
        IfConflict::Replace => {
            log::debug!("ignoring version mismatch on {}", intent.op.as_str());
            proceed
        }
    }
}

/// Decide the purge step of a PURGE intent.
///
/// Called directly when the feature is already deleted or absent, and again
/// after a successful implied delete with the new deleted-state version.
#[must_use]
pub fn resolve_purge(version: Option<&str>, stored: &StoredState) -> Decision {
    match stored {
        StoredState::Absent => Decision::Retain {
            with_current: false,
        },
        StoredState::Deleted { version: current } if mismatched(version, current) => {
            Decision::Fail {
                cause: ErrorCause::Conflict,
                with_current: true,
            }
        }
        StoredState::Deleted { .. } => Decision::Purge,
        StoredState::Live { .. } => Decision::Fail {
            cause: ErrorCause::Conflict,
            with_current: true,
        },
    }
}

fn mismatched(expected: Option<&str>, current: &str) -> bool {
    expected.is_some_and(|token| token != current)
}
