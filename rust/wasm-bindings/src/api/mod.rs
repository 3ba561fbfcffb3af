// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JavaScript API for the color grid
//!
//! One [`RecolorAPI`] holds the session of the currently loaded model.
//! Loading a new model replaces it.

mod grid;
mod loading;

use std::cell::RefCell;
use std::rc::Rc;

use ifc_recolor_core::{ExtractOptions, ExtractionRules, ImportOptions, ModelSession};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

use crate::error::{BindingError, Result};

/// Settings accepted by the [`RecolorAPI`] constructor.
///
/// Every field is optional; omitted ones keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecolorConfig {
    pub rules: ExtractionRules,
    pub extract: ExtractOptions,
    pub import: ImportOptions,
}

impl RecolorConfig {
    fn from_js(value: JsValue) -> Result<Self> {
        if value.is_undefined() || value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_wasm_bindgen::from_value(value)?)
    }
}

/// Color grid API
#[wasm_bindgen]
pub struct RecolorAPI {
    config: Rc<RecolorConfig>,
    session: Rc<RefCell<Option<ModelSession>>>,
}

#[wasm_bindgen]
impl RecolorAPI {
    /// Create the API, optionally with `{ rules, extract, import }` overrides
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> std::result::Result<RecolorAPI, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        Ok(Self {
            config: Rc::new(RecolorConfig::from_js(config)?),
            session: Rc::new(RefCell::new(None)),
        })
    }

    /// Whether a model has been loaded
    #[wasm_bindgen(getter, js_name = hasModel)]
    pub fn has_model(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Forget the loaded model
    pub fn clear(&self) {
        self.session.borrow_mut().take();
    }

    /// Get version string
    #[wasm_bindgen(getter)]
    pub fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Check a `#rgb` / `#rrggbb` color string
    #[wasm_bindgen(js_name = isValidHex)]
    pub fn is_valid_hex(value: Option<String>) -> bool {
        ifc_recolor_core::is_valid_hex(value.as_deref())
    }
}

impl RecolorAPI {
    /// Run `f` against the loaded session.
    ///
    /// The session stays borrowed while `f` runs, so `f` must not call back
    /// into the viewer.
    fn with_session<T>(&self, f: impl FnOnce(&mut ModelSession) -> Result<T>) -> Result<T> {
        let mut guard = self.session.borrow_mut();
        let session = guard.as_mut().ok_or(BindingError::NoModel)?;
        f(session)
    }
}

fn to_js<T: serde::Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}
