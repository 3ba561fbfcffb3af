// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grid editing, spreadsheet import and the save payload

use super::{to_js, RecolorAPI};
use crate::bridge::ViewerBridge;
use crate::error::BindingError;
use crate::utils::warn;
use ifc_recolor_core::{propagate_rows, read_workbook, Workbook};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl RecolorAPI {
    /// Current grid rows: `[{ category, color, sessionIds }]`
    pub fn rows(&self) -> Result<JsValue, JsValue> {
        Ok(self.with_session(|session| to_js(session.rows()))?)
    }

    /// Session ids of one row, for selecting and fitting it in the viewer
    #[wasm_bindgen(js_name = rowSessionIds)]
    pub fn row_session_ids(&self, index: usize) -> Result<Vec<u32>, JsValue> {
        Ok(self.with_session(|session| Ok(session.row_session_ids(index)?.to_vec()))?)
    }

    /// Set one row's color from the grid and recolor its elements
    ///
    /// Returns the number of viewer nodes that were colored.
    #[wasm_bindgen(js_name = setRowColor)]
    pub fn set_row_color(
        &self,
        viewer: &ViewerBridge,
        index: usize,
        hex: &str,
    ) -> Result<usize, JsValue> {
        let row = self.with_session(|session| Ok(session.update_row_color(index, hex)?.clone()))?;
        // Viewer callbacks may call back into the API
        Ok(propagate_rows(viewer, viewer, std::slice::from_ref(&row), &[0]))
    }

    /// Apply a decoded workbook (`{ [sheetName]: cell[][] }`) to the grid
    ///
    /// Updated rows are recolored in the viewer. Resolves to
    /// `{ updatedRows, skipped }`.
    ///
    /// Example:
    /// ```javascript
    /// const wb = XLSX.read(bytes, { type: 'array' });
    /// const sheets = Object.fromEntries(wb.SheetNames.map((name) =>
    ///   [name, XLSX.utils.sheet_to_json(wb.Sheets[name], { header: 1 })]));
    /// const report = api.importWorkbook(viewerBridge, sheets);
    /// ```
    #[wasm_bindgen(js_name = importWorkbook)]
    pub fn import_workbook(
        &self,
        viewer: &ViewerBridge,
        workbook: JsValue,
    ) -> Result<JsValue, JsValue> {
        let workbook: Workbook = serde_wasm_bindgen::from_value(workbook).map_err(BindingError::from)?;
        let pairs = read_workbook(&workbook, &self.config.import).map_err(BindingError::from)?;

        let (report, rows) = self.with_session(|session| {
            let report = session.merge_sheet(&pairs);
            Ok((report, session.rows().to_vec()))
        })?;
        propagate_rows(viewer, viewer, &rows, &report.updated_rows);
        if !report.skipped.is_empty() {
            warn(&format!(
                "[RecolorAPI] Skipped {} spreadsheet rows without category or hex color",
                report.skipped.len()
            ));
        }
        Ok(to_js(&report)?)
    }

    /// Body for the backend save call, keyed by IFC GlobalId
    #[wasm_bindgen(js_name = savePayload)]
    pub fn save_payload(
        &self,
        project_id: &str,
        version_id: &str,
        access_token: &str,
    ) -> Result<JsValue, JsValue> {
        let request = self.with_session(|session| {
            Ok(session.save_request(project_id, version_id, access_token))
        })?;
        Ok(to_js(&request)?)
    }
}
