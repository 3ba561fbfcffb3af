// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model loading for the color grid API

use super::{to_js, RecolorAPI};
use crate::bridge::ViewerBridge;
use crate::error::BindingError;
use crate::utils::{debug, warn};
use ifc_recolor_core::ModelSession;
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

#[wasm_bindgen]
impl RecolorAPI {
    /// Walk the viewer's tree, read every element's properties and build the grid
    ///
    /// Resolves with the grid rows. Rejects if the tree cannot be walked or
    /// any property lookup fails. The previous model's session is dropped as
    /// soon as loading starts, so after a rejection no model is loaded.
    ///
    /// Example:
    /// ```javascript
    /// const api = new RecolorAPI();
    /// const rows = await api.loadModel({
    ///   rootId: () => tree.getRootId(),
    ///   children: (id) => childrenOf(tree, id),
    ///   getProperties: (id) => new Promise((ok, fail) => model.getProperties(id, ok, fail)),
    ///   setThemingColor: (id, r, g, b, a) =>
    ///     viewer.setThemingColor(id, new THREE.Vector4(r, g, b, a), model),
    /// });
    /// console.log(rows.length, 'categories');
    /// ```
    #[wasm_bindgen(js_name = loadModel)]
    pub fn load_model(&self, viewer: ViewerBridge) -> Promise {
        let promise = Promise::new(&mut |resolve, reject| {
            let viewer = viewer.clone();
            let config = self.config.clone();
            let session = self.session.clone();
            if session.borrow_mut().take().is_some() {
                debug("[RecolorAPI] Dropped previous model session");
            }
            spawn_local(async move {
                let loaded = ModelSession::load(&viewer, &viewer, &config.rules, config.extract).await;
                let loaded = match loaded {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        warn(&format!("[RecolorAPI] Model load failed: {}", e));
                        let _ = reject.call1(&JsValue::NULL, &BindingError::from(e).into());
                        return;
                    }
                };

                debug(&format!(
                    "[RecolorAPI] Loaded {} rows, {} identifiers",
                    loaded.rows().len(),
                    loaded.identifiers().len()
                ));

                let rows = to_js(loaded.rows());
                *session.borrow_mut() = Some(loaded);

                match rows {
                    Ok(rows) => {
                        if let Err(e) = resolve.call1(&JsValue::NULL, &rows) {
                            let _ = reject.call1(&JsValue::NULL, &e);
                        }
                    }
                    Err(e) => {
                        let _ = reject.call1(&JsValue::NULL, &e.into());
                    }
                }
            });
        });

        promise
    }
}
