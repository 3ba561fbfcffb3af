// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors surfaced to JavaScript

use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("No model loaded")]
    NoModel,

    #[error(transparent)]
    Core(#[from] ifc_recolor_core::Error),

    #[error("Invalid value: {0}")]
    Conversion(#[from] serde_wasm_bindgen::Error),
}

impl From<BindingError> for JsValue {
    fn from(err: BindingError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

pub type Result<T> = std::result::Result<T, BindingError>;
