//! Drawing style primitives handed to the renderer.

use serde::{Deserialize, Serialize};

/// Linear RGBA color.
pub type Color = [f32; 4];

/// Line style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Line color.
    pub color: Color,
    /// Width in pixels.
    pub width: f32,
}

/// Area fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill color.
    pub color: Color,
}

/// Point symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Marker {
    /// Vector circle.
    Circle {
        /// Radius in pixels.
        radius: f32,
        /// Interior.
        fill: Option<Fill>,
        /// Outline.
        stroke: Option<Stroke>,
    },
    /// Raster icon.
    Icon {
        /// Image source.
        src: String,
        /// Image size in pixels `[w, h]`.
        size: [f32; 2],
        /// Scale factor applied to `size`.
        scale: f32,
    },
}

impl Marker {
    /// Radius of the circle that covers the drawn symbol.
    pub fn radius(&self) -> f32 {
        match self {
            Self::Circle { radius, .. } => *radius,
            Self::Icon { size, scale, .. } => size[0].max(size[1]) * scale * 0.5,
        }
    }
}

/// Label text and its rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Text to draw. For label rules this is a template until resolved.
    #[serde(default)]
    pub text: String,
    /// Font size in pixels.
    pub font_size_px: f32,
    /// Glyph color.
    pub color: Color,
    /// Halo color.
    pub halo_color: Color,
    /// Halo width in pixels.
    pub halo_width_px: f32,
    /// Pixel offset from the anchor `[x, y]`.
    #[serde(default)]
    pub offset: [f32; 2],
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size_px: 14.0,
            color: [1.0, 1.0, 1.0, 1.0],
            halo_color: [0.0, 0.0, 0.0, 0.85],
            halo_width_px: 2.0,
            offset: [0.0, 0.0],
        }
    }
}

/// One entry in a feature's style stack.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Style {
    /// Outline or line style.
    #[serde(default)]
    pub stroke: Option<Stroke>,
    /// Polygon interior.
    #[serde(default)]
    pub fill: Option<Fill>,
    /// Point symbol.
    #[serde(default)]
    pub marker: Option<Marker>,
    /// Label.
    #[serde(default)]
    pub text: Option<TextStyle>,
    /// Draw order hint within a layer.
    #[serde(default)]
    pub z_index: i32,
}

impl Style {
    /// Style that only carries a label.
    pub fn label(text: TextStyle) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

/// Defaults and scale factors for selection and highlight overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Overlay template for selected features.
    pub selection: Style,
    /// Overlay template for highlighted features.
    pub highlight: Style,
    /// Overlay stroke width relative to the base stroke.
    pub stroke_scale: f32,
    /// Overlay radius relative to a base circle marker.
    pub circle_scale: f32,
    /// Overlay radius relative to a base icon's covering radius.
    pub icon_scale: f32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        let overlay = |color: Color| Style {
            stroke: Some(Stroke { color, width: 1.0 }),
            fill: Some(Fill {
                color: [color[0], color[1], color[2], 0.25],
            }),
            marker: Some(Marker::Circle {
                radius: 5.0,
                fill: Some(Fill { color }),
                stroke: None,
            }),
            text: None,
            z_index: 0,
        };
        Self {
            selection: overlay([0.0, 0.6, 1.0, 1.0]),
            highlight: overlay([1.0, 0.85, 0.0, 1.0]),
            stroke_scale: 3.0,
            circle_scale: 2.0,
            icon_scale: 1.5,
        }
    }
}
