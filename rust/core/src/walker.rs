// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tree walking: every session id of the loaded model.

use crate::capability::ObjectTree;
use crate::error::{Error, Result};
use crate::SessionId;

/// Collect all session ids of the model, root included.
///
/// Fails as a whole if the tree reports any fault.
pub fn walk_tree<T: ObjectTree + ?Sized>(tree: &T) -> Result<Vec<SessionId>> {
    let root = tree.root_id();
    let ids = tree
        .enumerate_descendants(root)
        .map_err(|fault| Error::Enumeration(fault.to_string()))?;

    tracing::debug!(root, count = ids.len(), "Walked object tree");
    Ok(ids)
}
