//! Placement of the QR code and the attendee name on a pass template
//!
//! All coordinates are in template pixel space with a top-left origin.
//! Rotations are in degrees, clockwise. Values are validated on construction
//! and on deserialization, so a geometry that exists is always renderable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Font family used when a stored name layout carries none
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Reasons a geometry or color value is rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("size must be greater than zero, got {0}")]
    NonPositiveSize(f64),

    #[error("invalid color: {0:?}")]
    InvalidColor(String),
}

/// RGBA color, 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn channels(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `transparent` or a basic
    /// color name.
    pub fn parse(input: &str) -> Result<Self, GeometryError> {
        let value = input.trim().to_ascii_lowercase();
        let invalid = || GeometryError::InvalidColor(input.to_string());

        let named = match value.as_str() {
            "transparent" => Some(Self::TRANSPARENT),
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "red" => Some(Self::rgb(255, 0, 0)),
            "green" => Some(Self::rgb(0, 128, 0)),
            "blue" => Some(Self::rgb(0, 0, 255)),
            "yellow" => Some(Self::rgb(255, 255, 0)),
            "gray" | "grey" => Some(Self::rgb(128, 128, 128)),
            _ => None,
        };
        if let Some(color) = named {
            return Ok(color);
        }

        let hex = value.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map(|n| n * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

        let channels = match hex.len() {
            3 => (nibble(0), nibble(1), nibble(2), Ok(255)),
            4 => (nibble(0), nibble(1), nibble(2), nibble(3)),
            6 => (byte(0), byte(2), byte(4), Ok(255)),
            8 => (byte(0), byte(2), byte(4), byte(6)),
            _ => return Err(invalid()),
        };

        match channels {
            (Ok(r), Ok(g), Ok(b), Ok(a)) => Ok(Self { r, g, b, a }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = GeometryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, GeometryError> {
    if value.is_finite() {
        // Adding zero folds -0.0 into 0.0 so equality and serialization agree
        Ok(value + 0.0)
    } else {
        Err(GeometryError::NonFinite { field })
    }
}

fn positive_size(size: f64) -> Result<f64, GeometryError> {
    let size = finite("size", size)?;
    if size > 0.0 {
        Ok(size)
    } else {
        Err(GeometryError::NonPositiveSize(size))
    }
}

/// Where the QR code goes on the template
///
/// `x`/`y` is the top-left corner of the unrotated square and may lie outside
/// the template. Rotation pivots on the square's center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QrGeometryFields", into = "QrGeometryFields")]
pub struct QrGeometry {
    x: f64,
    y: f64,
    size: f64,
    rotation: f64,
    color: Option<Color>,
    bg_color: Option<Color>,
}

impl QrGeometry {
    pub fn new(x: f64, y: f64, size: f64, rotation: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            x: finite("x", x)?,
            y: finite("y", y)?,
            size: positive_size(size)?,
            rotation: finite("rotation", rotation)?,
            color: None,
            bg_color: None,
        })
    }

    /// Set module and background colors; `None` keeps the renderer defaults
    pub fn with_colors(mut self, color: Option<Color>, bg_color: Option<Color>) -> Self {
        self.color = color;
        self.bg_color = bg_color;
        self
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn color(&self) -> Option<Color> {
        self.color
    }

    pub fn bg_color(&self) -> Option<Color> {
        self.bg_color
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrGeometryFields {
    x: f64,
    y: f64,
    size: f64,
    #[serde(default)]
    rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bg_color: Option<Color>,
}

impl TryFrom<QrGeometryFields> for QrGeometry {
    type Error = GeometryError;

    fn try_from(fields: QrGeometryFields) -> Result<Self, Self::Error> {
        Ok(QrGeometry::new(
            fields.x,
            fields.y,
            fields.size,
            fields.rotation.unwrap_or(0.0),
        )?
        .with_colors(fields.color, fields.bg_color))
    }
}

impl From<QrGeometry> for QrGeometryFields {
    fn from(geometry: QrGeometry) -> Self {
        Self {
            x: geometry.x,
            y: geometry.y,
            size: geometry.size,
            rotation: Some(geometry.rotation),
            color: geometry.color,
            bg_color: geometry.bg_color,
        }
    }
}

/// Where and how the attendee name is written
///
/// `x`/`y` is the top-left of the text line and also the rotation pivot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NameGeometryFields", into = "NameGeometryFields")]
pub struct NameGeometry {
    x: f64,
    y: f64,
    size: f64,
    color: Color,
    font: String,
    rotation: f64,
}

impl NameGeometry {
    pub fn new(
        x: f64,
        y: f64,
        size: f64,
        color: Color,
        font: impl Into<String>,
        rotation: f64,
    ) -> Result<Self, GeometryError> {
        Ok(Self {
            x: finite("x", x)?,
            y: finite("y", y)?,
            size: positive_size(size)?,
            color,
            font: font.into(),
            rotation: finite("rotation", rotation)?,
        })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Font size in pixels
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn font(&self) -> &str {
        &self.font
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct NameGeometryFields {
    x: f64,
    y: f64,
    size: f64,
    color: Color,
    #[serde(default)]
    font: Option<String>,
    #[serde(default)]
    rotation: Option<f64>,
}

impl TryFrom<NameGeometryFields> for NameGeometry {
    type Error = GeometryError;

    fn try_from(fields: NameGeometryFields) -> Result<Self, Self::Error> {
        NameGeometry::new(
            fields.x,
            fields.y,
            fields.size,
            fields.color,
            fields
                .font
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            fields.rotation.unwrap_or(0.0),
        )
    }
}

impl From<NameGeometry> for NameGeometryFields {
    fn from(geometry: NameGeometry) -> Self {
        Self {
            x: geometry.x,
            y: geometry.y,
            size: geometry.size,
            color: geometry.color,
            font: Some(geometry.font),
            rotation: Some(geometry.rotation),
        }
    }
}
