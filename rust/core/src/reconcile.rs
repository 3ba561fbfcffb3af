// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciling grid rows with spreadsheets, the viewer and the backend.
//!
//! - Import: spreadsheet `(category, color)` pairs overwrite row colors by
//!   substring match, then the new colors are pushed into the viewer.
//! - Export: rows become a save payload keyed by GlobalId.

use serde::{Deserialize, Serialize};

use crate::capability::{ObjectTree, ThemingSink};
use crate::color::{is_valid_hex, DisplayColor};
use crate::dedup::GridRow;
use crate::error::Error;
use crate::identifiers::IdentifierMap;
use crate::SessionId;

/// One `(category, color)` row read from a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetPair {
    pub category: Option<String>,
    pub color: Option<String>,
}

impl SheetPair {
    pub fn new(category: &str, color: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            color: Some(color.to_string()),
        }
    }
}

/// Why a spreadsheet pair was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    MissingCategory,
    InvalidColor,
}

/// A spreadsheet pair that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPair {
    /// Position of the pair in the input.
    pub index: usize,
    pub pair: SheetPair,
    pub reason: SkipReason,
}

/// Outcome of applying a spreadsheet to the grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Indices of rows whose color changed, in order of first update.
    pub updated_rows: Vec<usize>,
    pub skipped: Vec<SkippedPair>,
}

/// Apply spreadsheet colors to the grid.
///
/// Every row whose category contains the pair's category (case-sensitive)
/// takes the pair's color. Later pairs overwrite earlier ones. Pairs without
/// a category or with a color that is not `#rgb`/`#rrggbb` are skipped.
pub fn apply_sheet(rows: &mut [GridRow], pairs: &[SheetPair]) -> ImportReport {
    let mut report = ImportReport::default();

    for (index, pair) in pairs.iter().enumerate() {
        let category = match pair.category.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => {
                tracing::warn!(index, error = %Error::MissingCategory, "Skipping spreadsheet row");
                report.skipped.push(SkippedPair {
                    index,
                    pair: pair.clone(),
                    reason: SkipReason::MissingCategory,
                });
                continue;
            }
        };

        let color = match pair.color.as_deref() {
            Some(c) if is_valid_hex(Some(c)) => c,
            other => {
                let err = Error::InvalidColorFormat(other.unwrap_or_default().to_string());
                tracing::warn!(index, category, error = %err, "Skipping spreadsheet row");
                report.skipped.push(SkippedPair {
                    index,
                    pair: pair.clone(),
                    reason: SkipReason::InvalidColor,
                });
                continue;
            }
        };

        for (row_index, row) in rows.iter_mut().enumerate() {
            if row.category.contains(category) {
                row.color = DisplayColor::Hex(color.to_string());
                if !report.updated_rows.contains(&row_index) {
                    report.updated_rows.push(row_index);
                }
            }
        }
    }

    tracing::info!(
        pairs = pairs.len(),
        updated = report.updated_rows.len(),
        skipped = report.skipped.len(),
        "Applied spreadsheet colors"
    );

    report
}

/// Color an element and everything below it in the viewer.
///
/// Returns how many elements were colored. Tree and sink faults are logged.
pub fn propagate_color<T, S>(tree: &T, sink: &S, id: SessionId, rgba: [f32; 4]) -> usize
where
    T: ObjectTree + ?Sized,
    S: ThemingSink + ?Sized,
{
    let nodes = match tree.enumerate_descendants(id) {
        Ok(nodes) => nodes,
        Err(fault) => {
            tracing::warn!(id, %fault, "Element not found in the object tree");
            return 0;
        }
    };

    let mut colored = 0;
    for node in nodes {
        match sink.apply_color(node, rgba) {
            Ok(()) => colored += 1,
            Err(fault) => tracing::warn!(id = node, %fault, "Failed to set theming color"),
        }
    }
    colored
}

/// Push the colors of the given rows into the viewer.
///
/// Rows whose color is not usable (no color, malformed hex) are left alone.
pub fn propagate_rows<T, S>(tree: &T, sink: &S, rows: &[GridRow], indices: &[usize]) -> usize
where
    T: ObjectTree + ?Sized,
    S: ThemingSink + ?Sized,
{
    let mut colored = 0;
    for &index in indices {
        let Some(row) = rows.get(index) else {
            continue;
        };
        let Some(rgba) = row.color.to_rgba() else {
            tracing::warn!(row = index, color = %row.color, "Row color cannot be shown");
            continue;
        };
        for &id in &row.session_ids {
            colored += propagate_color(tree, sink, id, rgba);
        }
        tracing::debug!(row = index, category = %row.category, color = %row.color, "Updated viewer colors");
    }
    colored
}

/// Colors to save for one grid row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementColor {
    #[serde(rename = "ifcGUIDs", alias = "externalIds")]
    pub external_ids: Vec<String>,
    pub color: String,
}

/// Body of the backend save call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    #[serde(rename = "versionID", default)]
    pub version_id: String,
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    #[serde(default)]
    pub elements: Vec<ElementColor>,
    #[serde(rename = "accessToken", default)]
    pub access_token: String,
}

/// Turn grid rows into save entries keyed by GlobalId.
///
/// Ids without a GlobalId are dropped. Rows that end up with no GlobalIds
/// are kept so the backend sees every row.
pub fn build_save_elements(rows: &[GridRow], identifiers: &IdentifierMap) -> Vec<ElementColor> {
    rows.iter()
        .map(|row| ElementColor {
            external_ids: identifiers
                .resolve(&row.session_ids)
                .map(str::to_string)
                .collect(),
            color: row.color.to_string(),
        })
        .collect()
}
