// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display colors shown in the grid and hex color handling.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Text shown when an element has no usable material color.
pub const NO_COLOR: &str = "No color defined";

/// Color of an element or grid row, as rendered in the grid.
///
/// `Rgb` comes from the model's material property and keeps each component's
/// digits as written, `NoColor` is the sentinel for elements without one, and
/// `Hex` holds whatever the user picked in the grid or imported from a
/// spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DisplayColor {
    Rgb(String, String, String),
    NoColor,
    Hex(String),
}

impl DisplayColor {
    pub fn rgb(r: impl ToString, g: impl ToString, b: impl ToString) -> Self {
        DisplayColor::Rgb(r.to_string(), g.to_string(), b.to_string())
    }

    /// Derive a display color from a material "Color" property value.
    ///
    /// The value must contain exactly three runs of digits, e.g.
    /// `"RGB(204, 51, 0)"` or `"204,51,0"`. Anything else is `NoColor`.
    pub fn from_material_value(value: &str) -> Self {
        let mut runs = value
            .split(|c: char| !c.is_ascii_digit())
            .filter(|run| !run.is_empty());

        match (runs.next(), runs.next(), runs.next(), runs.next()) {
            (Some(r), Some(g), Some(b), None) => DisplayColor::rgb(r, g, b),
            _ => DisplayColor::NoColor,
        }
    }

    /// Parse a rendered color back into its variant.
    pub fn parse(rendered: &str) -> Self {
        if rendered == NO_COLOR {
            return DisplayColor::NoColor;
        }
        if let Some(inner) = rendered
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let color = Self::from_material_value(inner);
            if color != DisplayColor::NoColor && color.to_string() == rendered {
                return color;
            }
        }
        DisplayColor::Hex(rendered.to_string())
    }

    /// Normalized RGBA for the viewer's theming API, if the color is usable.
    pub fn to_rgba(&self) -> Option<[f32; 4]> {
        match self {
            DisplayColor::Rgb(r, g, b) => Some([channel(r), channel(g), channel(b), 1.0]),
            DisplayColor::NoColor => None,
            DisplayColor::Hex(hex) => hex_to_rgba(hex).ok(),
        }
    }
}

/// Digit run as a 0–1 channel, clamped at 255.
fn channel(digits: &str) -> f32 {
    // Only digits reach here, so a failed parse means overflow
    let value = digits.parse::<u32>().map_or(255, |n| n.min(255));
    value as f32 / 255.0
}

impl fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayColor::Rgb(r, g, b) => write!(f, "rgb({}, {}, {})", r, g, b),
            DisplayColor::NoColor => f.write_str(NO_COLOR),
            DisplayColor::Hex(hex) => f.write_str(hex),
        }
    }
}

impl Serialize for DisplayColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DisplayColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let rendered = String::deserialize(deserializer)?;
        Ok(DisplayColor::parse(&rendered))
    }
}

/// Check whether a value is `#` followed by exactly 3 or 6 hex digits.
pub fn is_valid_hex(value: Option<&str>) -> bool {
    let Some(digits) = value.and_then(|v| v.strip_prefix('#')) else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse `#rgb` or `#rrggbb` into 8-bit components.
///
/// Shorthand digits are doubled, so `#abc` is `#aabbcc`.
pub fn parse_hex(value: &str) -> Result<[u8; 3]> {
    if !is_valid_hex(Some(value)) {
        return Err(Error::InvalidColorFormat(value.to_string()));
    }
    let digits = &value[1..];
    let channel = |s: &str| {
        u8::from_str_radix(s, 16).map_err(|_| Error::InvalidColorFormat(value.to_string()))
    };

    if digits.len() == 3 {
        let mut out = [0u8; 3];
        for (i, c) in digits.chars().enumerate() {
            let nibble = channel(&c.to_string())?;
            out[i] = nibble * 17;
        }
        Ok(out)
    } else {
        Ok([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ])
    }
}

/// Hex color as normalized RGBA with full opacity.
pub fn hex_to_rgba(value: &str) -> Result<[f32; 4]> {
    let [r, g, b] = parse_hex(value)?;
    Ok([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0])
}

/// Hex color as normalized RGB for IFC colour entities.
pub fn hex_to_unit_rgb(value: &str) -> Result<[f64; 3]> {
    let [r, g, b] = parse_hex(value)?;
    Ok([r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0])
}
