// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load → edit → import → save → restyle against an in-memory viewer.

use std::cell::RefCell;
use std::collections::HashMap;

use ifc_recolor_core::{
    read_workbook, restyle, DisplayColor, Error, ExtractOptions, ExtractionRules, Fault,
    ImportOptions, ModelSession, ObjectTree, Property, PropertyBag, PropertySource,
    RecolorPlan, SaveRequest, SessionId, SkipReason, StepFile, ThemingSink, Workbook,
};
use serde_json::json;

#[derive(Default)]
struct FakeViewer {
    children: HashMap<SessionId, Vec<SessionId>>,
    bags: HashMap<SessionId, PropertyBag>,
    colors: RefCell<HashMap<SessionId, [f32; 4]>>,
}

impl FakeViewer {
    fn element(&mut self, id: SessionId, category: &str, rgb: Option<&str>, guid: Option<&str>) {
        let mut props = vec![Property::new("HLS", "Systemabkürzung", category)];
        if let Some(rgb) = rgb {
            props.push(Property::new("IFC Material", "Color", rgb));
        }
        if let Some(guid) = guid {
            props.push(Property::new("IFC", "IfcGUID", guid));
        }
        self.bags.insert(id, PropertyBag::new(props));
    }
}

impl ObjectTree for FakeViewer {
    fn root_id(&self) -> SessionId {
        1
    }

    fn children(&self, id: SessionId) -> Result<Vec<SessionId>, Fault> {
        Ok(self.children.get(&id).cloned().unwrap_or_default())
    }
}

impl PropertySource for FakeViewer {
    async fn get_properties(&self, id: SessionId) -> Result<PropertyBag, Fault> {
        Ok(self.bags.get(&id).cloned().unwrap_or_default())
    }
}

impl ThemingSink for FakeViewer {
    fn apply_color(&self, id: SessionId, rgba: [f32; 4]) -> Result<(), Fault> {
        self.colors.borrow_mut().insert(id, rgba);
        Ok(())
    }
}

const WALL_GUID: &str = "2O2Fr$t4X7Zf8NOew3FLOH";
const DUCT_GUID: &str = "1kTvXnbbzCWw8lcMd1dR4o";

fn viewer() -> FakeViewer {
    let mut viewer = FakeViewer::default();
    viewer.children.insert(1, vec![2, 3, 4, 5]);
    viewer.element(2, "HZG", Some("255, 0, 0"), Some(WALL_GUID));
    viewer.element(3, "HZG", Some("255, 0, 0"), None);
    viewer.element(4, "LUE", None, Some(DUCT_GUID));
    viewer.bags.insert(
        5,
        PropertyBag::new(vec![Property::new("IFC", "IfcGUID", "3cUkl32yn9qRSPvBJVyWYp")]),
    );
    viewer
}

const MODEL: &str = "ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#10=IFCFLOWSEGMENT('2O2Fr$t4X7Zf8NOew3FLOH',$,'Pipe',$,$,$,#11,$);
#11=IFCPRODUCTDEFINITIONSHAPE($,$,(#12));
#12=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#13));
#13=IFCEXTRUDEDAREASOLID($,$,$,1.);
#20=IFCFLOWSEGMENT('1kTvXnbbzCWw8lcMd1dR4o',$,'Duct',$,$,$,#21,$);
#21=IFCPRODUCTDEFINITIONSHAPE($,$,(#22));
#22=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#23));
#23=IFCEXTRUDEDAREASOLID($,$,$,2.);
ENDSEC;
END-ISO-10303-21;
";

#[tokio::test]
async fn full_round_trip() {
    let viewer = viewer();
    let mut session = ModelSession::load(
        &viewer,
        &viewer,
        &ExtractionRules::default(),
        ExtractOptions::default(),
    )
    .await
    .unwrap();

    let rows = session.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].category, "HZG");
    assert_eq!(rows[0].color, DisplayColor::rgb(255, 0, 0));
    assert_eq!(rows[0].session_ids, vec![2, 3]);
    assert_eq!(rows[1].color, DisplayColor::NoColor);
    assert_eq!(session.identifiers().len(), 3);

    let workbook: Workbook = serde_json::from_value(json!({
        "Tabelle1": [
            ["LU", "Lüftung", "#00FF00"],
            ["HZG", "Heizung", "red"]
        ]
    }))
    .unwrap();
    let pairs = read_workbook(&workbook, &ImportOptions::default()).unwrap();
    let report = session.import_sheet(&pairs, &viewer, &viewer);

    // "LU" is a substring of "LUE"; "red" is not a hex color
    assert_eq!(report.updated_rows, vec![1]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::InvalidColor);
    assert_eq!(viewer.colors.borrow().get(&4), Some(&[0.0, 1.0, 0.0, 1.0]));

    session.set_row_color(0, "#00f", &viewer, &viewer).unwrap();
    assert_eq!(viewer.colors.borrow().len(), 3);

    let request = session.save_request("b.project", "urn:version?version=2", "token");
    let wire = serde_json::to_value(&request).unwrap();
    assert_eq!(wire["versionID"], "urn:version?version=2");
    assert_eq!(wire["elements"][0]["ifcGUIDs"], json!([WALL_GUID]));
    assert_eq!(wire["elements"][0]["color"], "#00f");
    assert_eq!(wire["elements"][1]["ifcGUIDs"], json!([DUCT_GUID]));

    let received: SaveRequest = serde_json::from_value(wire).unwrap();
    let plan = RecolorPlan::from_elements(&received.elements);
    let file = StepFile::parse(MODEL).unwrap();
    let (patched, stats) = restyle(&file, &plan).unwrap();
    let patched = String::from_utf8(patched).unwrap();

    assert_eq!(stats.elements_found, 2);
    assert_eq!(stats.styles_created, 2);
    assert_eq!(stats.styled_items_created, 2);
    assert!(patched.contains("IFCCOLOURRGB($,0.0,0.0,1.0)"));
    assert!(patched.contains("IFCCOLOURRGB($,0.0,1.0,0.0)"));

    let reparsed = StepFile::parse(patched).unwrap();
    assert_eq!(reparsed.ids_of_type("IFCSTYLEDITEM").count(), 2);
}

#[tokio::test]
async fn bounded_fan_out_builds_the_same_grid() {
    let viewer = viewer();
    let rules = ExtractionRules::default();
    let unbounded = ModelSession::load(&viewer, &viewer, &rules, ExtractOptions::default())
        .await
        .unwrap();
    let bounded = ModelSession::load(
        &viewer,
        &viewer,
        &rules,
        ExtractOptions {
            max_in_flight: std::num::NonZeroUsize::new(1),
        },
    )
    .await
    .unwrap();
    assert_eq!(unbounded, bounded);
}

struct Broken;

impl ObjectTree for Broken {
    fn root_id(&self) -> SessionId {
        0
    }

    fn children(&self, _id: SessionId) -> Result<Vec<SessionId>, Fault> {
        Err(Fault::new("model unloaded"))
    }
}

#[tokio::test]
async fn enumeration_fault_stops_the_load() {
    let err = ModelSession::load(
        &Broken,
        &viewer(),
        &ExtractionRules::default(),
        ExtractOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Enumeration(_)));
}
