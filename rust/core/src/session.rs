// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State of one loaded model: grid rows plus the GlobalId lookup.
//!
//! Session ids are only meaningful for the model they came from, so a new
//! load builds a new [`ModelSession`] instead of updating the old one.

use serde::Serialize;

use crate::capability::{ObjectTree, PropertySource, ThemingSink};
use crate::color::{is_valid_hex, DisplayColor};
use crate::dedup::{deduplicate, GridRow};
use crate::error::{Error, Result};
use crate::extract::{extract_elements, ExtractOptions};
use crate::identifiers::IdentifierMap;
use crate::property::ExtractionRules;
use crate::reconcile::{
    apply_sheet, build_save_elements, propagate_rows, ImportReport, SaveRequest, SheetPair,
};
use crate::SessionId;

/// Grid and identifier state for the currently loaded model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSession {
    rows: Vec<GridRow>,
    #[serde(skip)]
    identifiers: IdentifierMap,
}

impl ModelSession {
    /// Build a session from already extracted parts.
    pub fn new(rows: Vec<GridRow>, identifiers: IdentifierMap) -> Self {
        Self { rows, identifiers }
    }

    /// Walk the tree, read every element's properties and build the grid.
    pub async fn load<T, P>(
        tree: &T,
        source: &P,
        rules: &ExtractionRules,
        options: ExtractOptions,
    ) -> Result<Self>
    where
        T: ObjectTree + ?Sized,
        P: PropertySource,
    {
        let ids = crate::walker::walk_tree(tree)?;
        let extraction = extract_elements(&ids, source, rules, options).await?;
        let rows = deduplicate(&extraction.elements);

        tracing::info!(
            nodes = ids.len(),
            rows = rows.len(),
            identifiers = extraction.identifiers.len(),
            "Model session loaded"
        );

        Ok(Self::new(rows, extraction.identifiers))
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn identifiers(&self) -> &IdentifierMap {
        &self.identifiers
    }

    /// Session ids of a row, for selecting and framing it in the viewer.
    pub fn row_session_ids(&self, index: usize) -> Result<&[SessionId]> {
        self.rows
            .get(index)
            .map(|row| row.session_ids.as_slice())
            .ok_or(Error::RowOutOfRange(index))
    }

    /// Set one row's color without touching the viewer.
    pub fn update_row_color(&mut self, index: usize, hex: &str) -> Result<&GridRow> {
        if !is_valid_hex(Some(hex)) {
            return Err(Error::InvalidColorFormat(hex.to_string()));
        }
        let row = self.rows.get_mut(index).ok_or(Error::RowOutOfRange(index))?;
        row.color = DisplayColor::Hex(hex.to_string());
        Ok(row)
    }

    /// Set one row's color from the grid's color picker and show it.
    pub fn set_row_color<T, S>(&mut self, index: usize, hex: &str, tree: &T, sink: &S) -> Result<usize>
    where
        T: ObjectTree + ?Sized,
        S: ThemingSink + ?Sized,
    {
        self.update_row_color(index, hex)?;
        Ok(propagate_rows(tree, sink, &self.rows, &[index]))
    }

    /// Apply spreadsheet pairs to the grid without touching the viewer.
    pub fn merge_sheet(&mut self, pairs: &[SheetPair]) -> ImportReport {
        apply_sheet(&mut self.rows, pairs)
    }

    /// Apply spreadsheet pairs and show the updated rows in the viewer.
    pub fn import_sheet<T, S>(&mut self, pairs: &[SheetPair], tree: &T, sink: &S) -> ImportReport
    where
        T: ObjectTree + ?Sized,
        S: ThemingSink + ?Sized,
    {
        let report = self.merge_sheet(pairs);
        propagate_rows(tree, sink, &self.rows, &report.updated_rows);
        report
    }

    /// Save payload for the backend.
    pub fn save_request(&self, project_id: &str, version_id: &str, access_token: &str) -> SaveRequest {
        SaveRequest {
            version_id: version_id.to_string(),
            project_id: project_id.to_string(),
            elements: build_save_elements(&self.rows, &self.identifiers),
            access_token: access_token.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Fault;
    use std::cell::RefCell;

    struct Flat;

    impl ObjectTree for Flat {
        fn root_id(&self) -> SessionId {
            0
        }

        fn children(&self, _id: SessionId) -> std::result::Result<Vec<SessionId>, Fault> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct Sink(RefCell<Vec<SessionId>>);

    impl ThemingSink for Sink {
        fn apply_color(&self, id: SessionId, _rgba: [f32; 4]) -> std::result::Result<(), Fault> {
            self.0.borrow_mut().push(id);
            Ok(())
        }
    }

    fn session() -> ModelSession {
        let identifiers: IdentifierMap = [(1, "g1".to_string()), (2, "g2".to_string())]
            .into_iter()
            .collect();
        ModelSession::new(
            vec![
                GridRow::new("Wall", DisplayColor::rgb(1, 2, 3), vec![1, 3]),
                GridRow::new("Door", DisplayColor::NoColor, vec![2]),
            ],
            identifiers,
        )
    }

    #[test]
    fn grid_edit_updates_row_and_viewer() {
        let mut session = session();
        let sink = Sink::default();

        let colored = session.set_row_color(0, "#abcdef", &Flat, &sink).unwrap();
        assert_eq!(colored, 2);
        assert_eq!(*sink.0.borrow(), vec![1, 3]);
        assert_eq!(session.rows()[0].color, DisplayColor::Hex("#abcdef".into()));
    }

    #[test]
    fn grid_changes_can_be_shown_later() {
        let mut session = session();
        let sink = Sink::default();

        let row = session.update_row_color(1, "#000").unwrap().clone();
        let report = session.merge_sheet(&[SheetPair::new("Wall", "#fff")]);
        assert!(sink.0.borrow().is_empty());
        assert_eq!(row.color, DisplayColor::Hex("#000".into()));
        assert_eq!(report.updated_rows, vec![0]);

        let rows = session.rows().to_vec();
        propagate_rows(&Flat, &sink, &rows, &report.updated_rows);
        propagate_rows(&Flat, &sink, std::slice::from_ref(&row), &[0]);
        assert_eq!(*sink.0.borrow(), vec![1, 3, 2]);
    }

    #[test]
    fn grid_edit_rejects_bad_input() {
        let mut session = session();
        let sink = Sink::default();
        assert_eq!(
            session.set_row_color(0, "blue", &Flat, &sink),
            Err(Error::InvalidColorFormat("blue".into()))
        );
        assert_eq!(
            session.set_row_color(5, "#000", &Flat, &sink),
            Err(Error::RowOutOfRange(5))
        );
    }

    #[test]
    fn save_request_follows_the_grid() {
        let mut session = session();
        session.import_sheet(&[SheetPair::new("Door", "#ffffff")], &Flat, &Sink::default());

        let request = session.save_request("p", "v", "t");
        assert_eq!(request.elements.len(), 2);
        assert_eq!(request.elements[0].external_ids, vec!["g1".to_string()]);
        assert_eq!(request.elements[0].color, "rgb(1, 2, 3)");
        assert_eq!(request.elements[1].external_ids, vec!["g2".to_string()]);
        assert_eq!(request.elements[1].color, "#ffffff");
    }

    #[test]
    fn selection_returns_row_ids() {
        let session = session();
        assert_eq!(session.row_session_ids(0).unwrap(), &[1, 3]);
        assert!(session.row_session_ids(2).is_err());
    }
}
