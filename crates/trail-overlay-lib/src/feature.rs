//! Canonical feature model
//!
//! Every trail ends up as a [`CanonicalFeature`]: one geometry of a supported kind plus a
//! typed attribute bag. A [`CanonicalCollection`] is an ordered, immutable list of them
//! that serializes to a standard GeoJSON `FeatureCollection`.

use geo::{Coord, LineString, MultiLineString, Point, Polygon};
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value, json};
use std::fmt;

/// Name used when neither the record nor the pre-built feature carries one
pub const DEFAULT_TRAIL_NAME: &str = "Trail";

/// Geometry kinds the overlay knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    MultiLineString,
    Polygon,
}

impl GeometryKind {
    /// GeoJSON `type` tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::MultiLineString => "MultiLineString",
            Self::Polygon => "Polygon",
        }
    }
}

/// A trail geometry in WGS84, `x` = longitude and `y` = latitude
#[derive(Debug, Clone, PartialEq)]
pub enum TrailGeometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    MultiLineString(MultiLineString<f64>),
    Polygon(Polygon<f64>),
}

impl TrailGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::LineString(_) => GeometryKind::LineString,
            Self::MultiLineString(_) => GeometryKind::MultiLineString,
            Self::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// True for LineString and MultiLineString (the trail shapes the viewport prefers)
    pub fn is_line(&self) -> bool {
        matches!(self, Self::LineString(_) | Self::MultiLineString(_))
    }

    /// True for every geometry drawn by the line layers
    pub fn renders_as_line(&self) -> bool {
        !matches!(self, Self::Point(_))
    }

    /// Parse a GeoJSON geometry object
    ///
    /// Positions may carry extra dimensions (elevation), only `[lon, lat]` is kept.
    /// Unsupported types and malformed coordinates yield `None`.
    pub fn from_geojson(value: &Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?;
        let coordinates = value.get("coordinates")?;
        match kind {
            "Point" => parse_position(coordinates).map(|c| Self::Point(Point::from(c))),
            "LineString" => parse_line(coordinates).map(Self::LineString),
            "MultiLineString" => coordinates
                .as_array()?
                .iter()
                .map(parse_line)
                .collect::<Option<Vec<_>>>()
                .map(|lines| Self::MultiLineString(MultiLineString::new(lines))),
            "Polygon" => {
                let mut rings = coordinates
                    .as_array()?
                    .iter()
                    .map(parse_line)
                    .collect::<Option<Vec<_>>>()?
                    .into_iter();
                let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
                Some(Self::Polygon(Polygon::new(exterior, rings.collect())))
            }
            _ => None,
        }
    }

    /// GeoJSON geometry object
    pub fn to_geojson(&self) -> Value {
        let coordinates = match self {
            Self::Point(p) => json!([p.x(), p.y()]),
            Self::LineString(line) => line_to_json(line),
            Self::MultiLineString(lines) => Value::Array(lines.iter().map(line_to_json).collect()),
            Self::Polygon(polygon) => Value::Array(
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(line_to_json)
                    .collect(),
            ),
        };
        json!({ "type": self.kind().as_str(), "coordinates": coordinates })
    }
}

fn parse_position(value: &Value) -> Option<Coord<f64>> {
    let position = value.as_array()?;
    if position.len() < 2 {
        return None;
    }
    Some(Coord {
        x: position[0].as_f64()?,
        y: position[1].as_f64()?,
    })
}

fn parse_line(value: &Value) -> Option<LineString<f64>> {
    value
        .as_array()?
        .iter()
        .map(parse_position)
        .collect::<Option<Vec<_>>>()
        .map(LineString::new)
}

fn line_to_json(line: &LineString<f64>) -> Value {
    Value::Array(line.coords().map(|c| json!([c.x, c.y])).collect())
}

/// A scalar display attribute (distance, duration, pace)
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayValue {
    Number(f64),
    Text(String),
}

impl DisplayValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Bool(b) => Some(Self::Text(b.to_string())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) if is_integral(*n) => Value::from(*n as i64),
            Self::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 1e15
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if is_integral(*n) => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Property keys with a typed slot; anything else lands in `extra`
const KNOWN_KEYS: &[&str] = &[
    "id",
    "name",
    "distance",
    "duration",
    "pace",
    "description",
    "startLatitude",
    "startLongitude",
];

/// A partial attribute bag, used on both sides of a merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePatch {
    pub id: Option<String>,
    pub name: Option<String>,
    pub distance: Option<DisplayValue>,
    pub duration: Option<DisplayValue>,
    pub pace: Option<DisplayValue>,
    pub description: Option<String>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    /// Properties without a typed slot, preserved verbatim
    pub extra: Map<String, Value>,
}

impl AttributePatch {
    /// Read a GeoJSON `properties` object
    pub fn from_properties(properties: &Map<String, Value>) -> Self {
        let text = |key: &str| match properties.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let display = |key: &str| properties.get(key).and_then(DisplayValue::from_json);
        let float = |key: &str| properties.get(key).and_then(Value::as_f64);

        let extra = properties
            .iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            id: text("id").filter(|id| !id.is_empty()),
            name: text("name"),
            distance: display("distance"),
            duration: display("duration"),
            pace: display("pace"),
            description: text("description"),
            start_latitude: float("startLatitude"),
            start_longitude: float("startLongitude"),
            extra,
        }
    }

    /// Combine a pre-built feature's patch (`self`) with a record's patch
    ///
    /// The record owns `name`, `distance` and `duration`: they are taken from `overlay`
    /// even when absent there. Every other value in `overlay` wins only when present.
    pub fn merge(self, overlay: AttributePatch) -> AttributePatch {
        let mut extra = self.extra;
        extra.extend(overlay.extra);
        AttributePatch {
            id: overlay.id.or(self.id),
            name: overlay.name,
            distance: overlay.distance,
            duration: overlay.duration,
            pace: overlay.pace.or(self.pace),
            description: overlay.description.or(self.description),
            start_latitude: overlay.start_latitude.or(self.start_latitude),
            start_longitude: overlay.start_longitude.or(self.start_longitude),
            extra,
        }
    }
}

/// Resolved attributes of a canonical feature
#[derive(Debug, Clone, PartialEq)]
pub struct TrailAttributes {
    /// Unique within a collection, equal to the source record's identifier
    pub id: String,
    pub name: String,
    pub distance: Option<DisplayValue>,
    pub duration: Option<DisplayValue>,
    pub pace: Option<DisplayValue>,
    pub description: Option<String>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub extra: Map<String, Value>,
}

impl TrailAttributes {
    /// Resolve a patch, using `fallback_id` when the patch has no identifier
    pub fn from_patch(patch: AttributePatch, fallback_id: impl FnOnce() -> String) -> Self {
        Self {
            id: patch.id.unwrap_or_else(fallback_id),
            name: patch
                .name
                .unwrap_or_else(|| DEFAULT_TRAIL_NAME.to_string()),
            distance: patch.distance,
            duration: patch.duration,
            pace: patch.pace,
            description: patch.description,
            start_latitude: patch.start_latitude,
            start_longitude: patch.start_longitude,
            extra: patch.extra,
        }
    }

    /// GeoJSON `properties` object; absent values are omitted
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut properties = self.extra.clone();
        properties.insert("id".to_string(), Value::String(self.id.clone()));
        properties.insert("name".to_string(), Value::String(self.name.clone()));
        let optional = [
            ("distance", self.distance.as_ref().map(DisplayValue::to_json)),
            ("duration", self.duration.as_ref().map(DisplayValue::to_json)),
            ("pace", self.pace.as_ref().map(DisplayValue::to_json)),
            ("description", self.description.clone().map(Value::String)),
            ("startLatitude", self.start_latitude.map(Value::from)),
            ("startLongitude", self.start_longitude.map(Value::from)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                properties.insert(key.to_string(), value);
            }
        }
        properties
    }
}

/// One normalized trail
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFeature {
    pub geometry: TrailGeometry,
    pub attributes: TrailAttributes,
}

impl CanonicalFeature {
    pub fn id(&self) -> &str {
        &self.attributes.id
    }

    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    /// GeoJSON `Feature` object
    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "properties": Value::Object(self.attributes.to_properties()),
            "geometry": self.geometry.to_geojson(),
        })
    }
}

/// Ordered list of canonical features, built fresh on each normalization pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalCollection {
    features: Vec<CanonicalFeature>,
}

impl CanonicalCollection {
    pub fn new(features: Vec<CanonicalFeature>) -> Self {
        Self { features }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn features(&self) -> &[CanonicalFeature] {
        &self.features
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalFeature> {
        self.features.iter()
    }

    /// Look up a feature by identifier
    pub fn get(&self, id: &str) -> Option<&CanonicalFeature> {
        self.features.iter().find(|f| f.id() == id)
    }

    /// GeoJSON `FeatureCollection` document
    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features.iter().map(CanonicalFeature::to_geojson).collect::<Vec<_>>(),
        })
    }
}

impl<'a> IntoIterator for &'a CanonicalCollection {
    type Item = &'a CanonicalFeature;
    type IntoIter = std::slice::Iter<'a, CanonicalFeature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(feature = "serde")]
impl Serialize for CanonicalCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}
