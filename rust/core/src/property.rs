// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer property bags and the rules used to read them.

use serde::{Deserialize, Deserializer, Serialize};

/// One property as reported by the viewer's property API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub display_category: Option<String>,
    #[serde(default, deserialize_with = "value_as_text")]
    pub display_value: String,
}

impl Property {
    pub fn new(category: &str, name: &str, value: &str) -> Self {
        Self {
            display_name: name.to_string(),
            display_category: Some(category.to_string()),
            display_value: value.to_string(),
        }
    }

    fn is(&self, category: &str, name: &str) -> bool {
        self.display_name == name && self.display_category.as_deref() == Some(category)
    }
}

/// All properties of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyBag {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl PropertyBag {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            name: None,
            properties,
        }
    }

    /// First property in `category` named `name`.
    pub fn find(&self, category: &str, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.is(category, name))
    }

    /// First property named `name`, in any category.
    pub fn find_by_name(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.display_name == name)
    }
}

/// Which properties hold the category, external id and material color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractionRules {
    /// Display category of the grid category property.
    pub category_group: String,
    /// Display name of the grid category property.
    pub category_label: String,
    /// Display name of the external identifier property (any category).
    pub external_id_label: String,
    /// Display category of the material color property.
    pub material_group: String,
    /// Display name of the material color property.
    pub color_label: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            category_group: "HLS".into(),
            category_label: "Systemabkürzung".into(),
            external_id_label: "IfcGUID".into(),
            material_group: "IFC Material".into(),
            color_label: "Color".into(),
        }
    }
}

/// Accept strings, numbers, booleans or null and keep their text.
fn value_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
