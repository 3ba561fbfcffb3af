// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grid rows: one per distinct (category, color).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::color::DisplayColor;
use crate::extract::Element;
use crate::SessionId;

/// One editable row of the color grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub category: String,
    pub color: DisplayColor,
    pub session_ids: Vec<SessionId>,
}

impl GridRow {
    pub fn new(category: impl Into<String>, color: DisplayColor, session_ids: Vec<SessionId>) -> Self {
        Self {
            category: category.into(),
            color,
            session_ids,
        }
    }
}

impl From<&Element> for GridRow {
    fn from(element: &Element) -> Self {
        GridRow::new(
            element.category.clone(),
            element.color.clone(),
            vec![element.session_id],
        )
    }
}

/// Group elements by category and rendered color.
///
/// Rows come out in first-seen order and each row's ids in encounter order.
pub fn deduplicate<'a, I>(elements: I) -> Vec<GridRow>
where
    I: IntoIterator<Item = &'a Element>,
{
    merge_rows(elements.into_iter().map(GridRow::from))
}

/// Merge rows that share category and rendered color.
///
/// Used by [`deduplicate`] and safe to run on its own output.
pub fn merge_rows<I>(rows: I) -> Vec<GridRow>
where
    I: IntoIterator<Item = GridRow>,
{
    let mut index: FxHashMap<(String, String), usize> = FxHashMap::default();
    let mut out: Vec<GridRow> = Vec::new();

    for row in rows {
        let key = (row.category.clone(), row.color.to_string());
        match index.get(&key) {
            Some(&slot) => out[slot].session_ids.extend(row.session_ids),
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(category: &str, color: DisplayColor, id: SessionId) -> Element {
        Element {
            session_id: id,
            external_id: None,
            category: category.into(),
            color,
        }
    }

    #[test]
    fn groups_by_category_and_color() {
        let elements = vec![
            element("Wall", DisplayColor::rgb(1, 2, 3), 5),
            element("Wall", DisplayColor::rgb(1, 2, 3), 7),
            element("Door", DisplayColor::rgb(9, 9, 9), 2),
        ];

        let rows = deduplicate(&elements);
        assert_eq!(
            rows,
            vec![
                GridRow::new("Wall", DisplayColor::rgb(1, 2, 3), vec![5, 7]),
                GridRow::new("Door", DisplayColor::rgb(9, 9, 9), vec![2]),
            ]
        );
    }

    #[test]
    fn same_category_different_color_stays_apart() {
        let elements = vec![
            element("Wall", DisplayColor::rgb(1, 2, 3), 1),
            element("Wall", DisplayColor::NoColor, 2),
            element("Wall", DisplayColor::rgb(1, 2, 3), 3),
        ];

        let rows = deduplicate(&elements);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].session_ids, vec![1, 3]);
        assert_eq!(rows[1].session_ids, vec![2]);
    }

    #[test]
    fn key_is_the_pair_not_a_joined_string() {
        // "A-B" + "C" and "A" + "B-C" would collide if the key were joined with '-'
        let elements = vec![
            element("A-B", DisplayColor::Hex("C".into()), 1),
            element("A", DisplayColor::Hex("B-C".into()), 2),
        ];
        assert_eq!(deduplicate(&elements).len(), 2);
    }

    #[test]
    fn equal_rendering_merges_across_variants() {
        // A hex edit that renders like an rgb value lands in the same row
        let elements = vec![
            element("Wall", DisplayColor::rgb(1, 2, 3), 1),
            element("Wall", DisplayColor::Hex("rgb(1, 2, 3)".into()), 2),
        ];
        assert_eq!(deduplicate(&elements).len(), 1);
    }

    #[test]
    fn rerunning_on_output_changes_nothing() {
        let elements = vec![
            element("Wall", DisplayColor::rgb(1, 2, 3), 5),
            element("Door", DisplayColor::NoColor, 2),
            element("Wall", DisplayColor::rgb(1, 2, 3), 7),
            element("Roof", DisplayColor::rgb(0, 0, 0), 8),
        ];
        let rows = deduplicate(&elements);

        let as_elements: Vec<Element> = rows
            .iter()
            .map(|row| element(&row.category, row.color.clone(), row.session_ids[0]))
            .collect();
        let again = deduplicate(&as_elements);

        assert_eq!(again.len(), rows.len());
        for (a, b) in rows.iter().zip(&again) {
            assert_eq!(a.category, b.category);
            assert_eq!(a.color, b.color);
        }
        assert_eq!(merge_rows(rows.clone()), rows);
    }

    #[test]
    fn empty_input_gives_no_rows() {
        assert!(deduplicate(&Vec::<Element>::new()).is_empty());
    }
}
