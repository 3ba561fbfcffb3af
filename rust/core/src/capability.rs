// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capabilities the pipeline consumes from the viewer.
//!
//! The browser binding implements these over the live viewer; tests use
//! in-memory fakes.

use std::fmt;
use std::future::Future;

use rustc_hash::FxHashSet;

use crate::property::PropertyBag;
use crate::SessionId;

/// A fault reported by a viewer capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault(pub String);

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Fault(message.into())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Fault {}

/// The loaded model's object tree.
pub trait ObjectTree {
    /// Root node of the tree.
    fn root_id(&self) -> SessionId;

    /// Direct children of a node.
    fn children(&self, id: SessionId) -> Result<Vec<SessionId>, Fault>;

    /// The node and every node below it.
    ///
    /// Walks with an explicit stack so deep hierarchies cannot exhaust the
    /// call stack. Each node is reported once even if the tree is malformed.
    fn enumerate_descendants(&self, id: SessionId) -> Result<Vec<SessionId>, Fault> {
        let mut visited = FxHashSet::default();
        let mut out = Vec::new();
        let mut stack = vec![id];

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            out.push(node);
            let mut children = self.children(node)?;
            // Reverse so children come out in declaration order
            children.reverse();
            stack.extend(children);
        }

        Ok(out)
    }
}

/// Per-element property lookup.
pub trait PropertySource {
    /// Fetch the property bag of one element.
    fn get_properties(
        &self,
        id: SessionId,
    ) -> impl Future<Output = Result<PropertyBag, Fault>>;
}

/// Applies theming colors to elements in the viewer.
pub trait ThemingSink {
    /// Set the color of a single element (not its children).
    fn apply_color(&self, id: SessionId, rgba: [f32; 4]) -> Result<(), Fault>;
}
