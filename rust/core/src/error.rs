// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the recolor pipeline.

use thiserror::Error;

use crate::SessionId;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, reconciling or patching a model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The object tree could not be enumerated. The whole load is aborted.
    #[error("Tree enumeration failed: {0}")]
    Enumeration(String),

    /// A single property lookup failed. The whole extraction is aborted.
    #[error("Property fetch failed for element {session_id}: {reason}")]
    PropertyFetch { session_id: SessionId, reason: String },

    /// A color string is not `#rgb` / `#rrggbb`.
    #[error("Invalid color format: {0:?}")]
    InvalidColorFormat(String),

    /// An element or spreadsheet row has no category.
    #[error("Missing category")]
    MissingCategory,

    /// The workbook does not contain the designated sheet.
    #[error("The workbook does not contain a sheet named {0:?}")]
    MissingSheet(String),

    /// A grid row index is out of range.
    #[error("Grid row {0} does not exist")]
    RowOutOfRange(usize),

    /// The STEP file could not be read or patched.
    #[error("STEP error at entity #{id}: {message}")]
    Step { id: u32, message: String },
}

impl Error {
    /// Create a STEP error for an entity.
    pub fn step(id: u32, message: impl Into<String>) -> Self {
        Error::Step {
            id,
            message: message.into(),
        }
    }
}
