// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adapter from the JavaScript viewer object to the core capability traits.
//!
//! The page passes an object shaped like:
//!
//! ```typescript
//! interface ViewerBridge {
//!   rootId(): number;
//!   children(id: number): number[];
//!   getProperties(id: number): Promise<{ name?: string, properties: Property[] }>;
//!   setThemingColor(id: number, r: number, g: number, b: number, a: number): void;
//! }
//! ```

use ifc_recolor_core::{Fault, ObjectTree, PropertyBag, PropertySource, SessionId, ThemingSink};
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::utils::js_message;

#[wasm_bindgen]
extern "C" {
    /// Viewer object supplied by the page
    #[derive(Clone)]
    pub type ViewerBridge;

    #[wasm_bindgen(method, js_name = rootId)]
    fn js_root_id(this: &ViewerBridge) -> u32;

    #[wasm_bindgen(method, catch, js_name = children)]
    fn js_children(this: &ViewerBridge, id: u32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = getProperties)]
    fn js_get_properties(this: &ViewerBridge, id: u32) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, catch, js_name = setThemingColor)]
    fn set_theming_color(
        this: &ViewerBridge,
        id: u32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> Result<(), JsValue>;
}

fn fault(value: JsValue) -> Fault {
    Fault::new(js_message(&value))
}

impl ObjectTree for ViewerBridge {
    fn root_id(&self) -> SessionId {
        self.js_root_id()
    }

    fn children(&self, id: SessionId) -> Result<Vec<SessionId>, Fault> {
        let value = self.js_children(id).map_err(fault)?;
        if value.is_undefined() || value.is_null() {
            return Ok(Vec::new());
        }
        serde_wasm_bindgen::from_value(value).map_err(|e| Fault::new(e.to_string()))
    }
}

impl PropertySource for ViewerBridge {
    async fn get_properties(&self, id: SessionId) -> Result<PropertyBag, Fault> {
        let promise = self.js_get_properties(id).map_err(fault)?;
        let value = JsFuture::from(promise).await.map_err(fault)?;
        serde_wasm_bindgen::from_value(value).map_err(|e| Fault::new(e.to_string()))
    }
}

impl ThemingSink for ViewerBridge {
    fn apply_color(&self, id: SessionId, rgba: [f32; 4]) -> Result<(), Fault> {
        let [r, g, b, a] = rgba;
        self.set_theming_color(id, r, g, b, a).map_err(fault)
    }
}
