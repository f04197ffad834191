//! Overlay styling: identifiers, paint, filters and configuration
//!
//! The overlay owns exactly one source and three layers on a surface. Their identifiers
//! are fixed so that a re-install always replaces what a previous install left behind.

use crate::feature::{CanonicalFeature, GeometryKind};
use crate::viewport::FitConfig;
use serde_json::{Value, json};

/// Vector source holding the whole canonical collection
pub const SOURCE_ID: &str = "geojson-data";
/// Base line layer (LineString, MultiLineString and Polygon outlines)
pub const LINE_LAYER_ID: &str = "geojson-layer";
/// Hover highlight, stacked above the base line layer
pub const HIGHLIGHT_LAYER_ID: &str = "geojson-layer-highlight";
/// Circle layer for Point features
pub const POINT_LAYER_ID: &str = "geojson-points";

/// Identifier that no real feature can carry; the highlight filter's resting value
pub const NO_MATCH_ID: &str = "___no_match___";

/// An sRGB color with alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Build a color from CSS-style `hsl(h, s%, l%)` components
    pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let s = (saturation / 100.0).clamp(0.0, 1.0);
        let l = (lightness / 100.0).clamp(0.0, 1.0);
        let h = hue.rem_euclid(360.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = l - c / 2.0;

        let (r, g, b) = if h < 60.0 {
            (c, x, 0.0)
        } else if h < 120.0 {
            (x, c, 0.0)
        } else if h < 180.0 {
            (0.0, c, x)
        } else if h < 240.0 {
            (0.0, x, c)
        } else if h < 300.0 {
            (x, 0.0, c)
        } else {
            (c, 0.0, x)
        };

        let channel = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self::rgb(channel(r), channel(g), channel(b))
    }

    /// Same color with alpha set from an opacity in `0.0..=1.0`
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: (opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }
}

/// Paint properties of a layer; the variant also decides which geometries it draws
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Paint {
    /// Draws LineString, MultiLineString and Polygon outlines
    Line { color: Color, width: f32, opacity: f32 },
    /// Draws Point features as circles
    Circle {
        radius: f32,
        color: Color,
        stroke_color: Color,
        stroke_width: f32,
    },
}

impl Paint {
    /// Whether a layer with this paint draws the given feature at all
    pub fn draws(&self, feature: &CanonicalFeature) -> bool {
        match self {
            Self::Line { .. } => feature.geometry.renders_as_line(),
            Self::Circle { .. } => feature.geometry.kind() == GeometryKind::Point,
        }
    }
}

/// Attribute filter of a layer
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every feature the paint can draw
    All,
    /// Only the feature with this identifier
    IdEquals(String),
    /// Only features of this geometry type
    GeometryType(GeometryKind),
}

impl Filter {
    /// The highlight filter's resting state: matches nothing
    pub fn no_match() -> Self {
        Self::IdEquals(NO_MATCH_ID.to_string())
    }

    pub fn matches(&self, feature: &CanonicalFeature) -> bool {
        match self {
            Self::All => true,
            Self::IdEquals(id) => feature.id() == id,
            Self::GeometryType(kind) => feature.geometry.kind() == *kind,
        }
    }

    /// Style-expression form, as understood by MapLibre-compatible backends
    pub fn to_expression(&self) -> Option<Value> {
        match self {
            Self::All => None,
            Self::IdEquals(id) => Some(json!(["==", ["get", "id"], id])),
            Self::GeometryType(kind) => Some(json!(["==", "$type", kind.as_str()])),
        }
    }
}

/// A styled layer over a source
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: Paint,
    pub filter: Filter,
}

impl LayerSpec {
    /// Whether this layer renders the feature (paint kind and filter both accept it)
    pub fn renders(&self, feature: &CanonicalFeature) -> bool {
        self.paint.draws(feature) && self.filter.matches(feature)
    }
}

/// Overlay configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OverlayConfig {
    /// Base trail lines
    pub line_paint: Paint,
    /// Hovered trail
    pub highlight_paint: Paint,
    /// Point features
    pub point_paint: Paint,
    /// Initial viewport parameters
    pub fit: FitConfig,
    /// Close the open popup when a click hits no feature
    pub close_popup_on_empty_click: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let teal = Color::hsl(173.0, 80.0, 40.0);
        Self {
            line_paint: Paint::Line {
                color: teal,
                width: 3.0,
                opacity: 0.8,
            },
            highlight_paint: Paint::Line {
                color: Color::hsl(48.0, 95.0, 50.0),
                width: 5.0,
                opacity: 0.9,
            },
            point_paint: Paint::Circle {
                radius: 8.0,
                color: teal,
                stroke_color: Color::hsl(222.0, 47.0, 6.0),
                stroke_width: 2.0,
            },
            fit: FitConfig::default(),
            close_popup_on_empty_click: true,
        }
    }
}

impl OverlayConfig {
    /// The three overlay layers in paint order (bottom first)
    pub fn layers(&self) -> [LayerSpec; 3] {
        [
            LayerSpec {
                id: LINE_LAYER_ID.to_string(),
                source: SOURCE_ID.to_string(),
                paint: self.line_paint.clone(),
                filter: Filter::All,
            },
            LayerSpec {
                id: HIGHLIGHT_LAYER_ID.to_string(),
                source: SOURCE_ID.to_string(),
                paint: self.highlight_paint.clone(),
                filter: Filter::no_match(),
            },
            LayerSpec {
                id: POINT_LAYER_ID.to_string(),
                source: SOURCE_ID.to_string(),
                paint: self.point_paint.clone(),
                filter: Filter::GeometryType(GeometryKind::Point),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{AttributePatch, TrailAttributes, TrailGeometry};
    use geo::{LineString, Point};

    fn feature(id: &str, geometry: TrailGeometry) -> CanonicalFeature {
        CanonicalFeature {
            geometry,
            attributes: TrailAttributes::from_patch(AttributePatch::default(), || id.to_string()),
        }
    }

    #[test]
    fn test_hsl_conversion() {
        assert_eq!(Color::hsl(0.0, 100.0, 50.0), Color::rgb(255, 0, 0));
        assert_eq!(Color::hsl(120.0, 100.0, 50.0), Color::rgb(0, 255, 0));
        assert_eq!(Color::hsl(0.0, 0.0, 100.0), Color::rgb(255, 255, 255));
        // hsl(173, 80%, 40%)
        assert_eq!(Color::hsl(173.0, 80.0, 40.0), Color::rgb(20, 184, 165));
    }

    #[test]
    fn test_with_opacity() {
        assert_eq!(Color::rgb(1, 2, 3).with_opacity(0.0).a, 0);
        assert_eq!(Color::rgb(1, 2, 3).with_opacity(1.0).a, 255);
    }

    #[test]
    fn test_no_match_filter_matches_nothing() {
        let trail = feature("t1", TrailGeometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])));
        assert!(!Filter::no_match().matches(&trail));
        assert!(Filter::IdEquals("t1".into()).matches(&trail));
    }

    #[test]
    fn test_layers_stacking_order_and_targets() {
        let layers = OverlayConfig::default().layers();
        let ids: Vec<&str> = layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![LINE_LAYER_ID, HIGHLIGHT_LAYER_ID, POINT_LAYER_ID]);
        assert!(layers.iter().all(|l| l.source == SOURCE_ID));

        let trail = feature("t1", TrailGeometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])));
        let poi = feature("p1", TrailGeometry::Point(Point::new(0.0, 0.0)));
        assert!(layers[0].renders(&trail));
        assert!(!layers[0].renders(&poi));
        assert!(!layers[1].renders(&trail));
        assert!(layers[2].renders(&poi));
        assert!(!layers[2].renders(&trail));
    }

    #[test]
    fn test_filter_expressions() {
        assert_eq!(Filter::All.to_expression(), None);
        assert_eq!(
            Filter::no_match().to_expression(),
            Some(json!(["==", ["get", "id"], NO_MATCH_ID]))
        );
        assert_eq!(
            Filter::GeometryType(GeometryKind::Point).to_expression(),
            Some(json!(["==", "$type", "Point"]))
        );
    }
}
