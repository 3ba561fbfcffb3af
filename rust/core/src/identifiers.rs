// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session id to external id (IFC GlobalId) lookup for one loaded model.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// Maps viewer session ids to the GlobalIds stored in the source model.
///
/// Only valid for the model it was built from. Elements without a GlobalId
/// simply have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMap {
    entries: FxHashMap<SessionId, String>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: SessionId, external_id: impl Into<String>) {
        self.entries.insert(id, external_id.into());
    }

    pub fn get(&self, id: SessionId) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Resolve ids in order, dropping the ones without a non-empty entry.
    pub fn resolve<'a>(&'a self, ids: &'a [SessionId]) -> impl Iterator<Item = &'a str> + 'a {
        ids.iter()
            .filter_map(move |id| self.get(*id))
            .filter(|guid| !guid.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(SessionId, String)> for IdentifierMap {
    fn from_iter<I: IntoIterator<Item = (SessionId, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
