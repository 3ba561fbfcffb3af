// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writing saved grid colors into an IFC file.
//!
//! For every GlobalId the element and its decomposition children are
//! visited, and each representation item gets an `IfcStyledItem` pointing at
//! a surface style of the requested color:
//!
//! ```text
//! IfcStyledItem → [IfcPresentationStyleAssignment →] IfcSurfaceStyle
//!               → IfcSurfaceStyleRendering → IfcColourRgb
//! ```
//!
//! The assignment level is only written for IFC2X3 files; later schemas
//! reference the surface style directly.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;

use crate::color::{hex_to_unit_rgb, is_valid_hex};
use crate::error::Result;
use crate::reconcile::ElementColor;
use crate::step::{StepEdit, StepFile, Value};

/// Name given to the surface styles this module creates.
pub const STYLE_NAME: &str = "ElementColor";

/// One color to apply to a set of GlobalIds.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub global_ids: Vec<String>,
    /// Lower-case `#rrggbb` form, used to share style chains.
    pub hex: String,
    /// Normalized 0–1 components.
    pub rgb: [f64; 3],
}

/// Validated colors from a save request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecolorPlan {
    pub entries: Vec<PlanEntry>,
    /// Entries dropped because their color was not a hex color.
    pub skipped: usize,
}

impl RecolorPlan {
    /// Keep the entries whose color is `#rgb`/`#rrggbb`.
    pub fn from_elements(elements: &[ElementColor]) -> Self {
        let mut plan = RecolorPlan::default();
        for element in elements {
            let rgb = match hex_to_unit_rgb(&element.color) {
                Ok(rgb) if is_valid_hex(Some(&element.color)) => rgb,
                _ => {
                    tracing::debug!(color = %element.color, "Skipping entry without hex color");
                    plan.skipped += 1;
                    continue;
                }
            };
            plan.entries.push(PlanEntry {
                global_ids: element.external_ids.clone(),
                hex: canonical_hex(rgb),
                rgb,
            });
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total GlobalIds across all entries.
    pub fn global_id_count(&self) -> usize {
        self.entries.iter().map(|e| e.global_ids.len()).sum()
    }
}

fn canonical_hex(rgb: [f64; 3]) -> String {
    let [r, g, b] = rgb.map(|c| (c * 255.0).round() as u8);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// What a restyle pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestyleStats {
    pub elements_requested: usize,
    pub elements_found: usize,
    pub missing_global_ids: Vec<String>,
    pub styles_created: usize,
    pub styled_items_created: usize,
    pub styled_items_updated: usize,
}

/// Apply a plan to a STEP file and return the patched file.
///
/// A color's style chain is only written once an item is actually styled
/// with it.
pub fn restyle(file: &StepFile, plan: &RecolorPlan) -> Result<(Vec<u8>, RestyleStats)> {
    let guid_index = file.global_id_index();
    let decomposition = decomposition_index(file);
    let mut styled_items = styled_item_index(file);
    let with_assignment = file
        .schema()
        .map_or(true, |s| s.to_ascii_uppercase().starts_with("IFC2X"));

    let mut edit = StepEdit::new(file);
    let mut styles: FxHashMap<&str, u32> = FxHashMap::default();
    let mut stats = RestyleStats::default();

    for entry in &plan.entries {
        for guid in &entry.global_ids {
            stats.elements_requested += 1;
            let Some(&root) = guid_index.get(guid) else {
                tracing::warn!(guid = %guid, "GlobalId not found in model");
                stats.missing_global_ids.push(guid.clone());
                continue;
            };
            stats.elements_found += 1;

            for element in subtree(root, &decomposition) {
                for item in representation_items(file, element) {
                    let style = *styles.entry(entry.hex.as_str()).or_insert_with(|| {
                        stats.styles_created += 1;
                        add_style_chain(&mut edit, entry.rgb, with_assignment)
                    });
                    match styled_items.get(&item) {
                        Some(&styled) => {
                            let name = file
                                .attributes(styled)
                                .ok()
                                .and_then(|attrs| attrs.get(2).cloned())
                                .unwrap_or(Value::Null);
                            edit.replace(
                                styled,
                                "IFCSTYLEDITEM",
                                &[Value::Ref(item), Value::refs([style]), name],
                            )?;
                            stats.styled_items_updated += 1;
                        }
                        None => {
                            let id = edit.add(
                                "IFCSTYLEDITEM",
                                &[Value::Ref(item), Value::refs([style]), Value::Null],
                            );
                            styled_items.insert(item, id);
                            stats.styled_items_created += 1;
                        }
                    }
                }
            }
        }
    }

    tracing::info!(
        requested = stats.elements_requested,
        found = stats.elements_found,
        missing = stats.missing_global_ids.len(),
        created = stats.styled_items_created,
        updated = stats.styled_items_updated,
        "Restyled IFC model"
    );

    Ok((edit.finish(), stats))
}

/// Append the color → rendering → surface style (→ assignment) chain.
fn add_style_chain(edit: &mut StepEdit<'_>, rgb: [f64; 3], with_assignment: bool) -> u32 {
    let colour = edit.add(
        "IFCCOLOURRGB",
        &[
            Value::Null,
            Value::Real(rgb[0]),
            Value::Real(rgb[1]),
            Value::Real(rgb[2]),
        ],
    );
    let rendering = edit.add(
        "IFCSURFACESTYLERENDERING",
        &[
            Value::Ref(colour),
            Value::Real(0.0),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::enumeration("MATT"),
        ],
    );
    let surface = edit.add(
        "IFCSURFACESTYLE",
        &[
            Value::string(STYLE_NAME),
            Value::enumeration("BOTH"),
            Value::refs([rendering]),
        ],
    );
    if with_assignment {
        edit.add("IFCPRESENTATIONSTYLEASSIGNMENT", &[Value::refs([surface])])
    } else {
        surface
    }
}

/// Parent → children over `IfcRelAggregates` and `IfcRelNests`.
fn decomposition_index(file: &StepFile) -> FxHashMap<u32, SmallVec<[u32; 4]>> {
    let mut index: FxHashMap<u32, SmallVec<[u32; 4]>> = FxHashMap::default();
    let rels = file
        .ids_of_type("IFCRELAGGREGATES")
        .chain(file.ids_of_type("IFCRELNESTS"));

    for rel in rels {
        let attrs = match file.attributes(rel) {
            Ok(attrs) => attrs,
            Err(e) => {
                tracing::warn!(rel, error = %e, "Skipping unreadable decomposition");
                continue;
            }
        };
        // RelatingObject (4), RelatedObjects (5)
        if let (Some(parent), Some(children)) = (
            attrs.get(4).and_then(Value::as_entity_ref),
            attrs.get(5),
        ) {
            index.entry(parent).or_default().extend(children.entity_refs());
        }
    }
    index
}

/// Representation item → the `IfcStyledItem` that styles it.
fn styled_item_index(file: &StepFile) -> FxHashMap<u32, u32> {
    let mut index = FxHashMap::default();
    for styled in file.ids_of_type("IFCSTYLEDITEM") {
        if let Some(item) = file
            .attributes(styled)
            .ok()
            .and_then(|attrs| attrs.first().and_then(Value::as_entity_ref))
        {
            index.entry(item).or_insert(styled);
        }
    }
    index
}

/// An element and everything it decomposes into, each once.
fn subtree(root: u32, decomposition: &FxHashMap<u32, SmallVec<[u32; 4]>>) -> Vec<u32> {
    let mut visited = FxHashSet::default();
    let mut out = Vec::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(children) = decomposition.get(&id) {
            stack.extend(children.iter().rev().copied());
        }
    }
    out
}

/// Items of every shape representation of a product.
///
/// IfcProduct.Representation (6) → IfcProductDefinitionShape.Representations (2)
/// → IfcShapeRepresentation.Items (3).
fn representation_items(file: &StepFile, element: u32) -> SmallVec<[u32; 8]> {
    let mut items = SmallVec::new();

    let shape = file
        .attributes(element)
        .ok()
        .and_then(|attrs| attrs.get(6).and_then(Value::as_entity_ref))
        .filter(|&id| file.type_name(id) == Some("IFCPRODUCTDEFINITIONSHAPE"));
    let Some(shape) = shape else {
        return items;
    };

    let representations = file
        .attributes(shape)
        .ok()
        .and_then(|attrs| attrs.get(2).map(Value::entity_refs))
        .unwrap_or_default();

    for rep in representations {
        if let Some(rep_items) = file
            .attributes(rep)
            .ok()
            .and_then(|attrs| attrs.get(3).map(Value::entity_refs))
        {
            items.extend(rep_items);
        }
    }
    items
}
