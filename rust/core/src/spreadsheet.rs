// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading `(category, color)` pairs out of an uploaded workbook.
//!
//! Workbook decoding happens in the browser; this module receives each sheet
//! as rows of JSON cells (the shape `sheet_to_json(sheet, { header: 1 })`
//! produces).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::reconcile::SheetPair;

/// Rows of cells, row-major.
pub type SheetRows = Vec<Vec<Value>>;

/// Sheets of a workbook by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workbook {
    pub sheets: BTreeMap<String, SheetRows>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Result<&SheetRows> {
        self.sheets
            .get(name)
            .ok_or_else(|| Error::MissingSheet(name.to_string()))
    }
}

/// Where the colors live in the workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportOptions {
    pub sheet_name: String,
    /// Zero-based column of the element category.
    pub category_column: usize,
    /// Zero-based column of the hex color.
    pub color_column: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sheet_name: "Tabelle1".into(),
            category_column: 0,
            color_column: 2,
        }
    }
}

/// Read the pairs of the designated sheet.
pub fn read_workbook(workbook: &Workbook, options: &ImportOptions) -> Result<Vec<SheetPair>> {
    let rows = workbook.sheet(&options.sheet_name)?;
    Ok(read_rows(rows, options))
}

/// Read pairs from sheet rows. Rows without a category are left out.
pub fn read_rows(rows: &[Vec<Value>], options: &ImportOptions) -> Vec<SheetPair> {
    let mut pairs = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let Some(category) = cell_text(row.get(options.category_column)) else {
            tracing::trace!(row = index, "No category, skipping");
            continue;
        };
        pairs.push(SheetPair {
            category: Some(category),
            color: cell_text(row.get(options.color_column)),
        });
    }
    pairs
}

/// Text of a cell, or `None` for blank cells (missing, null, empty, zero, false).
fn cell_text(cell: Option<&Value>) -> Option<String> {
    match cell? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
