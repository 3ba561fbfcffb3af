// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC Recolor Core
//!
//! Color reconciliation between a BIM viewer, an editable grid and an IFC
//! file on disk.
//!
//! ## Overview
//!
//! - **Tree walking**: every node reachable from the viewer's root
//! - **Property extraction**: concurrent property fetches, fail-fast
//! - **Deduplication**: one grid row per `(category, color)` pair
//! - **Reconciliation**: spreadsheet import, viewer theming and the save
//!   payload keyed by IFC GlobalId
//! - **Restyling**: writing saved colors back into the STEP file
//!
//! The viewer is reached through the traits in [`capability`], so the same
//! pipeline runs against the browser viewer or test doubles.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_recolor_core::{ExtractOptions, ExtractionRules, ModelSession};
//!
//! let mut session = ModelSession::load(&viewer, &viewer, &ExtractionRules::default(),
//!     ExtractOptions::default()).await?;
//! session.set_row_color(0, "#ff0000", &viewer, &viewer)?;
//! let payload = session.save_request(project_id, version_id, token);
//! ```

pub mod capability;
pub mod color;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod identifiers;
pub mod property;
pub mod reconcile;
pub mod restyle;
pub mod session;
pub mod spreadsheet;
pub mod step;
pub mod walker;

/// Viewer-assigned node identifier, valid for one loaded model only.
pub type SessionId = u32;

pub use capability::{Fault, ObjectTree, PropertySource, ThemingSink};
pub use color::{hex_to_rgba, hex_to_unit_rgb, is_valid_hex, parse_hex, DisplayColor, NO_COLOR};
pub use dedup::{deduplicate, merge_rows, GridRow};
pub use error::{Error, Result};
pub use extract::{extract_elements, read_element, Element, ExtractOptions, Extraction};
pub use identifiers::IdentifierMap;
pub use property::{ExtractionRules, Property, PropertyBag};
pub use reconcile::{
    apply_sheet, build_save_elements, propagate_color, propagate_rows, ElementColor,
    ImportReport, SaveRequest, SheetPair, SkipReason, SkippedPair,
};
pub use restyle::{restyle, PlanEntry, RecolorPlan, RestyleStats};
pub use session::ModelSession;
pub use spreadsheet::{read_rows, read_workbook, ImportOptions, SheetRows, Workbook};
pub use step::{StepEdit, StepFile};
pub use walker::walk_tree;
