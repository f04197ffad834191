//! Initial viewport selection and Web Mercator helpers
//!
//! The overlay prefers framing the first trail (LineString or MultiLineString) of a
//! collection, so the user lands on a trail rather than on the whole data set. When no
//! line exists it frames every feature. Concrete surfaces can use [`FitRequest::camera`]
//! to turn a fit into a centre and zoom for their viewport size.

use crate::feature::{CanonicalCollection, TrailGeometry};
use geo::{Coord, Point, Rect};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;
pub const EARTH_SIZE_METERS: f64 = 2.0 * EARTH_MERCATOR_MAX;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Highest zoom level a fit will ever produce
pub const MAX_ZOOM: f64 = 22.0;

/// Tile edge in pixels at which zoom levels are defined
pub const TILE_SIZE: f64 = 256.0;

/// Growing lon/lat bounding envelope
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Envelope {
    rect: Option<Rect<f64>>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the envelope to include `coord`; non-finite coordinates are ignored
    pub fn extend(&mut self, coord: Coord<f64>) {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return;
        }
        self.rect = Some(match self.rect {
            None => Rect::new(coord, coord),
            Some(rect) => Rect::new(
                Coord {
                    x: rect.min().x.min(coord.x),
                    y: rect.min().y.min(coord.y),
                },
                Coord {
                    x: rect.max().x.max(coord.x),
                    y: rect.max().y.max(coord.y),
                },
            ),
        });
    }

    pub fn extend_all<I: IntoIterator<Item = Coord<f64>>>(&mut self, coords: I) {
        for coord in coords {
            self.extend(coord);
        }
    }

    /// Include every coordinate of a geometry (exterior ring only for polygons)
    pub fn extend_geometry(&mut self, geometry: &TrailGeometry) {
        match geometry {
            TrailGeometry::Point(point) => self.extend(point.0),
            TrailGeometry::LineString(line) => self.extend_all(line.coords().copied()),
            TrailGeometry::MultiLineString(lines) => {
                for line in lines {
                    self.extend_all(line.coords().copied());
                }
            }
            TrailGeometry::Polygon(polygon) => self.extend_all(polygon.exterior().coords().copied()),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rect.is_none()
    }

    #[inline]
    pub fn rect(&self) -> Option<Rect<f64>> {
        self.rect
    }
}

/// Padding and zoom limits used when fitting
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Padding in pixels when framing the first line feature
    pub line_padding: f64,
    /// Zoom ceiling when framing the first line feature (avoids over-zooming short trails)
    pub line_max_zoom: Option<f64>,
    /// Padding in pixels when framing every feature
    pub fallback_padding: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            line_padding: 80.0,
            line_max_zoom: Some(15.0),
            fallback_padding: 50.0,
        }
    }
}

/// A viewport change: lon/lat bounds to frame, padding in pixels and optional zoom ceiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest {
    pub bounds: Rect<f64>,
    pub padding: f64,
    pub max_zoom: Option<f64>,
}

/// Choose the initial viewport for a collection
///
/// Returns `None` for an empty collection (or one without any usable coordinate), in
/// which case the viewport must be left alone.
pub fn compute_fit(collection: &CanonicalCollection, config: &FitConfig) -> Option<FitRequest> {
    if let Some(first_line) = collection.iter().find(|f| f.geometry.is_line()) {
        let mut line_bounds = Envelope::new();
        line_bounds.extend_geometry(&first_line.geometry);
        if let Some(bounds) = line_bounds.rect() {
            return Some(FitRequest {
                bounds,
                padding: config.line_padding,
                max_zoom: config.line_max_zoom,
            });
        }
        tracing::debug!(
            "First line feature '{}' has no coordinates, framing all features",
            first_line.id()
        );
    }

    let mut all_bounds = Envelope::new();
    for feature in collection {
        all_bounds.extend_geometry(&feature.geometry);
    }
    all_bounds.rect().map(|bounds| FitRequest {
        bounds,
        padding: config.fallback_padding,
        max_zoom: None,
    })
}

/// Camera position resulting from a fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Centre, `x` = longitude and `y` = latitude
    pub center: Point<f64>,
    pub zoom: f64,
}

impl FitRequest {
    /// Centre and zoom that frame the bounds inside a viewport of `width` x `height` pixels
    pub fn camera(&self, width: f64, height: f64) -> Camera {
        let min = lon_lat_to_mercator(self.bounds.min().x, self.bounds.min().y);
        let max = lon_lat_to_mercator(self.bounds.max().x, self.bounds.max().y);
        let (lat, lon) =
            mercator_to_wgs84((min.x() + max.x()) / 2.0, (min.y() + max.y()) / 2.0);

        let available_width = (width - 2.0 * self.padding).max(1.0);
        let available_height = (height - 2.0 * self.padding).max(1.0);
        let zoom_x = zoom_for_span(max.x() - min.x(), available_width);
        let zoom_y = zoom_for_span(max.y() - min.y(), available_height);

        let ceiling = self.max_zoom.unwrap_or(MAX_ZOOM).min(MAX_ZOOM);
        Camera {
            center: Point::new(lon, lat),
            zoom: zoom_x.min(zoom_y).clamp(0.0, ceiling),
        }
    }
}

/// Zoom at which `span_meters` of Mercator extent covers `pixels` screen pixels
fn zoom_for_span(span_meters: f64, pixels: f64) -> f64 {
    if span_meters <= 0.0 {
        return MAX_ZOOM;
    }
    (pixels * EARTH_SIZE_METERS / (TILE_SIZE * span_meters)).log2()
}

/// Convert WGS84 (lon, lat) to Web Mercator (x, y) in meters
///
/// Latitude is clamped to the representable Web Mercator range.
#[inline]
pub fn lon_lat_to_mercator(lon: f64, lat: f64) -> Point<f64> {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = lon * EARTH_MERCATOR_MAX / 180.0;
    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * EARTH_MERCATOR_MAX / std::f64::consts::PI;
    Point::new(x, y)
}

/// Convert Web Mercator (x, y) in meters back to WGS84, returned as (lat, lon)
#[inline]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / EARTH_MERCATOR_MAX;
    let lat = (std::f64::consts::PI / 2.0
        - 2.0 * (-y * std::f64::consts::PI / EARTH_MERCATOR_MAX).exp().atan())
    .to_degrees();
    (lat, lon)
}
