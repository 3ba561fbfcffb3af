// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property extraction: category, color and GlobalId per element.
//!
//! Lookups fan out over all ids and are joined before anything is returned.
//! A single failed lookup fails the whole extraction so a partial tree never
//! turns into a misleading grid.

use std::num::NonZeroUsize;

use futures_util::future::try_join_all;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::capability::PropertySource;
use crate::color::DisplayColor;
use crate::error::{Error, Result};
use crate::identifiers::IdentifierMap;
use crate::property::{ExtractionRules, PropertyBag};
use crate::SessionId;

/// One element that carries a grid category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub session_id: SessionId,
    pub external_id: Option<String>,
    pub category: String,
    pub color: DisplayColor,
}

/// Tuning for [`extract_elements`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractOptions {
    /// Maximum lookups in flight. `None` issues all of them at once, which
    /// is what the viewer front-end has always done; very large models may
    /// want a bound.
    pub max_in_flight: Option<NonZeroUsize>,
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Elements with a category, in input id order.
    pub elements: Vec<Element>,
    /// GlobalIds of every element that has one, with or without category.
    pub identifiers: IdentifierMap,
}

/// Read one property bag.
///
/// Returns the grid element (if the bag has a category) and the external id
/// (if it has one). The two are independent.
pub fn read_element(
    id: SessionId,
    bag: &PropertyBag,
    rules: &ExtractionRules,
) -> (Option<Element>, Option<String>) {
    let external_id = bag
        .find_by_name(&rules.external_id_label)
        .map(|p| p.display_value.clone());

    let color = bag
        .find(&rules.material_group, &rules.color_label)
        .filter(|p| !p.display_value.is_empty())
        .map(|p| DisplayColor::from_material_value(&p.display_value))
        .unwrap_or(DisplayColor::NoColor);

    let element = bag
        .find(&rules.category_group, &rules.category_label)
        .map(|p| Element {
            session_id: id,
            external_id: external_id.clone(),
            category: p.display_value.clone(),
            color,
        });

    (element, external_id)
}

/// Fetch and read the properties of every id.
pub async fn extract_elements<P: PropertySource>(
    ids: &[SessionId],
    source: &P,
    rules: &ExtractionRules,
    options: ExtractOptions,
) -> Result<Extraction> {
    let fetch = move |id: SessionId| async move {
        source
            .get_properties(id)
            .await
            .map(|bag| (id, bag))
            .map_err(|fault| Error::PropertyFetch {
                session_id: id,
                reason: fault.to_string(),
            })
    };

    let bags: Vec<(SessionId, PropertyBag)> = match options.max_in_flight {
        None => try_join_all(ids.iter().map(|&id| fetch(id))).await?,
        Some(limit) => {
            stream::iter(ids.iter().copied())
                .map(fetch)
                .buffered(limit.get())
                .try_collect()
                .await?
        }
    };

    let mut extraction = Extraction::default();
    for (id, bag) in &bags {
        let (element, external_id) = read_element(*id, bag, rules);
        if let Some(external_id) = external_id {
            extraction.identifiers.insert(*id, external_id);
        }
        if let Some(element) = element {
            extraction.elements.push(element);
        }
    }

    tracing::info!(
        fetched = bags.len(),
        elements = extraction.elements.len(),
        identifiers = extraction.identifiers.len(),
        "Extracted element properties"
    );

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Fault;
    use crate::property::Property;
    use rustc_hash::FxHashMap;

    struct Bags(FxHashMap<SessionId, PropertyBag>);

    impl PropertySource for Bags {
        async fn get_properties(&self, id: SessionId) -> std::result::Result<PropertyBag, Fault> {
            self.0
                .get(&id)
                .cloned()
                .ok_or_else(|| Fault::new(format!("no properties for {}", id)))
        }
    }

    fn bag(category: Option<&str>, guid: Option<&str>, color: Option<&str>) -> PropertyBag {
        let mut props = Vec::new();
        if let Some(category) = category {
            props.push(Property::new("HLS", "Systemabkürzung", category));
        }
        if let Some(guid) = guid {
            props.push(Property::new("IFC", "IfcGUID", guid));
        }
        if let Some(color) = color {
            props.push(Property::new("IFC Material", "Color", color));
        }
        PropertyBag::new(props)
    }

    #[test]
    fn reads_all_three_fields() {
        let rules = ExtractionRules::default();
        let (element, guid) = read_element(
            5,
            &bag(Some("HZG"), Some("guid-5"), Some("RGB(10, 20, 30)")),
            &rules,
        );
        assert_eq!(guid.as_deref(), Some("guid-5"));
        assert_eq!(
            element,
            Some(Element {
                session_id: 5,
                external_id: Some("guid-5".into()),
                category: "HZG".into(),
                color: DisplayColor::rgb(10, 20, 30),
            })
        );
    }

    #[test]
    fn missing_category_still_yields_guid() {
        let rules = ExtractionRules::default();
        let (element, guid) = read_element(9, &bag(None, Some("guid-9"), None), &rules);
        assert!(element.is_none());
        assert_eq!(guid.as_deref(), Some("guid-9"));
    }

    #[test]
    fn category_in_wrong_group_is_ignored() {
        let rules = ExtractionRules::default();
        let bag = PropertyBag::new(vec![Property::new("Other", "Systemabkürzung", "HZG")]);
        let (element, _) = read_element(1, &bag, &rules);
        assert!(element.is_none());
    }

    #[test]
    fn unparseable_or_empty_color_is_sentinel() {
        let rules = ExtractionRules::default();
        let (a, _) = read_element(1, &bag(Some("A"), None, Some("blue")), &rules);
        let (b, _) = read_element(2, &bag(Some("A"), None, Some("")), &rules);
        let (c, _) = read_element(3, &bag(Some("A"), None, None), &rules);
        for element in [a, b, c] {
            assert_eq!(element.unwrap().color, DisplayColor::NoColor);
        }
    }

    #[tokio::test]
    async fn extraction_keeps_input_order_and_all_guids() {
        let mut bags = FxHashMap::default();
        bags.insert(1, bag(Some("Wall"), Some("g1"), Some("1,2,3")));
        bags.insert(2, bag(None, Some("g2"), None));
        bags.insert(3, bag(Some("Door"), None, None));
        let source = Bags(bags);

        let result = extract_elements(
            &[3, 2, 1],
            &source,
            &ExtractionRules::default(),
            ExtractOptions::default(),
        )
        .await
        .unwrap();

        let ids: Vec<SessionId> = result.elements.iter().map(|e| e.session_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(result.identifiers.get(1), Some("g1"));
        assert_eq!(result.identifiers.get(2), Some("g2"));
        assert_eq!(result.identifiers.get(3), None);
    }

    #[tokio::test]
    async fn bounded_fan_out_gives_same_result() {
        let mut bags = FxHashMap::default();
        for id in 0..20 {
            bags.insert(id, bag(Some("Pipe"), Some(&format!("g{}", id)), None));
        }
        let source = Bags(bags);
        let ids: Vec<SessionId> = (0..20).collect();
        let rules = ExtractionRules::default();

        let unbounded = extract_elements(&ids, &source, &rules, ExtractOptions::default())
            .await
            .unwrap();
        let bounded = extract_elements(
            &ids,
            &source,
            &rules,
            ExtractOptions {
                max_in_flight: NonZeroUsize::new(3),
            },
        )
        .await
        .unwrap();

        assert_eq!(unbounded, bounded);
    }

    #[tokio::test]
    async fn one_failed_lookup_fails_everything() {
        let mut bags = FxHashMap::default();
        for id in 0..100 {
            if id != 57 {
                bags.insert(id, bag(Some("Duct"), None, None));
            }
        }
        let source = Bags(bags);
        let ids: Vec<SessionId> = (0..100).collect();

        let err = extract_elements(
            &ids,
            &source,
            &ExtractionRules::default(),
            ExtractOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::PropertyFetch { session_id: 57, .. }));
    }
}
