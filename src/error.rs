//! Error type
//!
//! Every fallible operation in the crate returns [`Result`]. Per-build
//! problems that the merge engine can skip over never surface here; what
//! does surface is either an I/O / format failure or a fault that would
//! leave the history inconsistent.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

use crate::diff::Action;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors this crate can return.
///
/// # Error Categories
///
/// ## I/O and format errors
/// - [`Error::Io`] - Filesystem or stream failure
/// - [`Error::Json`] - JSON encoding or decoding failure
/// - [`Error::Version`] - Unparseable build version string
///
/// ## Archive errors
/// - [`Error::Archive`] - Archive metadata could not be listed or read
///
/// ## History errors
/// - [`Error::Corrupt`] - Persisted history violates its own structure
/// - [`Error::Inconsistent`] - Re-diffing a recorded build disagrees with the record
/// - [`Error::Detached`] - A recorded update could not be reached by replay
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem or stream I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// A build version string could not be parsed.
    #[error("invalid version {0:?}")]
    Version(String),

    /// Archive metadata could not be read.
    ///
    /// There is no partial view of an archive to fall back to, so this is
    /// fatal to a merge.
    #[error("archive: {0}")]
    Archive(String),

    /// A persisted history refers outside of itself.
    ///
    /// Raised when decoding a history whose update ranges, owner indexes or
    /// index offsets do not line up with its flat change list.
    #[error("corrupt history: {0}")]
    Corrupt(String),

    /// Re-diffing a previously recorded build produced a different number of
    /// actions than the record holds.
    ///
    /// Either the diff is not deterministic or the stored history no longer
    /// matches the archive. Continuing would fork the record, so the merge
    /// stops and hands back both action lists for inspection.
    ///
    /// # Fields
    ///
    /// * `guid` - Build whose record disagrees
    /// * `recorded` - Actions held by the stored history
    /// * `computed` - Actions produced by this run
    #[error("build {guid}: recorded {} actions, computed {}", recorded.len(), computed.len())]
    Inconsistent {
        /// The build GUID
        guid: String,
        /// Actions from the stored history
        recorded: Vec<Action>,
        /// Actions from this run
        computed: Vec<Action>,
    },

    /// A recorded update could not be reached from the cursor's position.
    #[error("build {guid}: recorded update is not reachable by replay")]
    Detached {
        /// The build GUID
        guid: String,
    },
}
